use anyhow::{bail, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use runquery::{normalize_args, run, Cli, ConfigSource, RunQueryConfig};
use std::io::{self, BufWriter, Write};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();
    let cli = Cli::parse_from(normalize_args(std::env::args()));
    let config = match cli.source() {
        Ok(ConfigSource::File(path)) => RunQueryConfig::from_file(&path)?,
        Ok(ConfigSource::Flags(config)) => config,
        Err(msg) => Cli::command().error(ErrorKind::MissingRequiredArgument, msg).exit(),
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let summary = run(&config, &mut out)?;
    out.flush()?;
    tracing::info!(queries = summary.queries, lines = summary.lines, failed = summary.failed.len(), "run finished");
    if !summary.failed.is_empty() {
        bail!("{} of {} queries failed: {}", summary.failed.len(), summary.queries, summary.failed.join(", "));
    }
    Ok(())
}
