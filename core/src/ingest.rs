use crate::corpus::{open_corpus, ReadOutcome, RecordReader};
use crate::error::{Error, Result};
use crate::fields::{map_record, FieldMapping};
use crate::index::DocumentSink;
use rayon::prelude::*;
use std::io::{self, BufRead};
use std::ops::Add;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub files: u64,
    pub records: u64,
    pub documents: u64,
    /// Records dropped for lack of a body.
    pub skipped: u64,
}

impl Add for IngestStats {
    type Output = IngestStats;

    fn add(self, o: IngestStats) -> IngestStats {
        IngestStats {
            files: self.files + o.files,
            records: self.records + o.records,
            documents: self.documents + o.documents,
            skipped: self.skipped + o.skipped,
        }
    }
}

/// Feed every record of one decoded stream to `sink`, in stream order.
///
/// Documents added before a decode or sink failure stay added.
pub fn ingest_stream<R: BufRead>(
    mut reader: RecordReader<R>,
    mappings: &[FieldMapping],
    sink: &dyn DocumentSink,
) -> Result<IngestStats> {
    let mut stats = IngestStats::default();
    loop {
        let record = match reader.next_record() {
            ReadOutcome::Record(record) => record,
            ReadOutcome::EndOfStream => break,
            ReadOutcome::DecodeError(err) => return Err(err),
        };
        stats.records += 1;
        match map_record(&record, mappings) {
            Some(doc) => {
                sink.add(doc)?;
                stats.documents += 1;
            }
            None => {
                tracing::debug!(id = %record.id, "record has no body, skipped");
                stats.skipped += 1;
            }
        }
    }
    Ok(stats)
}

/// Ingest one corpus file, compressed or not.
pub fn ingest_file(path: &Path, mappings: &[FieldMapping], sink: &dyn DocumentSink) -> Result<IngestStats> {
    let wrap = |source: Error| Error::Ingest { path: path.to_path_buf(), source: Box::new(source) };
    let (compression, reader) = open_corpus(path).map_err(wrap)?;
    let mut stats = ingest_stream(reader, mappings, sink).map_err(wrap)?;
    stats.files = 1;
    tracing::info!(file = %path.display(), %compression, records = stats.records, documents = stats.documents, "file ingested");
    Ok(stats)
}

/// Corpus files under `input`: the file itself, or every file of a directory tree in name order.
pub fn collect_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(Error::Io(io::Error::new(io::ErrorKind::NotFound, format!("no such input: {}", input.display()))));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(input).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Ingest a file or directory. With `threads > 1` files are ingested concurrently,
/// each on its own decode stream; record order is kept within each file only.
/// The first fatal error aborts the run.
pub fn ingest_path(input: &Path, mappings: &[FieldMapping], sink: &dyn DocumentSink, threads: usize) -> Result<IngestStats> {
    let files = collect_files(input)?;
    tracing::info!(input = %input.display(), files = files.len(), threads, "starting ingestion");
    if threads <= 1 {
        let mut total = IngestStats::default();
        for file in &files {
            total = total + ingest_file(file, mappings, sink)?;
        }
        return Ok(total);
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))?;
    pool.install(|| {
        files
            .par_iter()
            .map(|file| ingest_file(file, mappings, sink))
            .try_reduce(IngestStats::default, |a, b| Ok(a + b))
    })
}
