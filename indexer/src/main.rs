use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use searchcore::analyzer::{Analyzer, DEFAULT_ANALYZER};
use searchcore::corpus::{open_corpus, ReadOutcome};
use searchcore::fields::{default_mappings, load_mappings};
use searchcore::index::IndexWriter;
use searchcore::ingest::ingest_path;
use searchcore::metadata::{KEY_SIMILARITY, KEY_STOPWORDS};
use searchcore::ranking::RankingModel;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build a searchable index from stream corpus files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a corpus file or directory tree (raw or compressed)
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// JSON list of field mappings; defaults to docno/epoch/text
        #[arg(long)]
        fields: Option<String>,
        /// Analyzer identifier (standard, english, snowball, whitespace)
        #[arg(long, default_value = DEFAULT_ANALYZER)]
        analyzer: String,
        /// Stopword list replacing the analyzer's built-in one
        #[arg(long)]
        stopwords: Option<String>,
        /// Similarity recorded in the index metadata, e.g. method:bm25,k1:1.2,b:0.75
        #[arg(long)]
        similarity: Option<String>,
        /// Number of files ingested concurrently
        #[arg(long, default_value_t = 1)]
        threads: usize,
        /// Add to an existing index instead of replacing it
        #[arg(long, default_value_t = false)]
        append: bool,
    },
    /// Decode a corpus file and print one line per record
    Dump {
        /// Corpus file
        #[arg(long)]
        input: String,
    },
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, fields, analyzer, stopwords, similarity, threads, append } => {
            build_index(&input, &output, fields.as_deref(), &analyzer, stopwords.as_deref(), similarity.as_deref(), threads, append)
        }
        Commands::Dump { input } => dump(&input),
    }
}

#[allow(clippy::too_many_arguments)]
fn build_index(
    input: &str,
    output: &str,
    fields: Option<&str>,
    analyzer: &str,
    stopwords: Option<&str>,
    similarity: Option<&str>,
    threads: usize,
    append: bool,
) -> Result<()> {
    let mappings = match fields {
        Some(path) => load_mappings(Path::new(path)).with_context(|| format!("loading field config {path}"))?,
        None => default_mappings(),
    };
    let analyzer = Analyzer::from_registry(analyzer, stopwords.map(Path::new))?;
    let writer = if append {
        IndexWriter::open_or_create(output, analyzer)?
    } else {
        IndexWriter::create(output, analyzer)?
    };
    if let Some(spec) = similarity {
        // reject malformed specs before any data is written
        let parsed = RankingModel::parse(spec)?;
        writer.set_metadata(KEY_SIMILARITY, &parsed.model.to_string());
    }
    if let Some(path) = stopwords {
        writer.set_metadata(KEY_STOPWORDS, path);
    }

    let outcome = ingest_path(Path::new(input), &mappings, &writer, threads.max(1));
    // documents added before a failure are kept
    writer.commit().context("committing index")?;
    let stats = outcome?;
    tracing::info!(
        output,
        files = stats.files,
        records = stats.records,
        documents = stats.documents,
        skipped = stats.skipped,
        "index build complete"
    );
    Ok(())
}

fn dump(input: &str) -> Result<()> {
    let (compression, mut reader) = open_corpus(Path::new(input)).with_context(|| format!("opening {input}"))?;
    tracing::info!(input, %compression, "dumping records");
    loop {
        match reader.next_record() {
            ReadOutcome::Record(r) => {
                let ts = r.timestamp.map(|t| t.to_string()).unwrap_or_else(|| "-".into());
                let body = r.body.as_ref().map(|b| b.len().to_string()).unwrap_or_else(|| "-".into());
                println!("{}\t{}\t{}", r.id, ts, body);
            }
            ReadOutcome::EndOfStream => break,
            ReadOutcome::DecodeError(e) => return Err(e).with_context(|| format!("decoding {input}")),
        }
    }
    tracing::info!(records = reader.records_read(), "dump complete");
    Ok(())
}
