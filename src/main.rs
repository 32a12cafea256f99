use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bqsplit::bq::Bq;
use bqsplit::{split, LogProgress, NoProgress, ProgressSink, SplitConfig};

/// Split a BINSEQ .bq file into chunk files with a fixed number of reads each.
///
/// Chunks are written in parallel as `{base}.{index}.{ext}` into the output
/// directory, with a zero-padded index starting at 00000.
#[derive(Parser, Debug)]
#[command(name = "bqsplit", version)]
struct Args {
    /// The .bq file to split
    input: PathBuf,

    /// Number of reads per chunk file. Values below 1 are treated as 1.
    #[arg(
        long,
        short,
        default_value_t = SplitConfig::DEFAULT_CHUNK_SIZE as i64,
        allow_negative_numbers = true
    )]
    reads: i64,

    /// Directory to write the chunk files to, created if missing. Defaults to
    /// the current directory.
    #[arg(long, short)]
    out: Option<PathBuf>,

    /// Base name of the chunk files. Defaults to the input file stem.
    #[arg(long, short)]
    base: Option<String>,

    /// Number of worker threads. Defaults to the number of logical CPUs.
    #[arg(long, short, allow_negative_numbers = true)]
    threads: Option<i64>,

    /// Do not show a progress bar
    #[arg(long, short)]
    quiet: bool,
}

impl Args {
    fn config(&self) -> SplitConfig {
        let mut config = SplitConfig::default().chunk_size(SplitConfig::clamp_count(self.reads));
        if let Some(out) = &self.out {
            config = config.output_dir(out);
        }
        if let Some(base) = &self.base {
            config = config.base_name(base);
        }
        if let Some(threads) = self.threads {
            config = config.threads(SplitConfig::clamp_count(threads));
        }
        config
    }
}

fn progress_sink(quiet: bool) -> Result<Box<dyn ProgressSink>> {
    if quiet {
        return Ok(Box::new(NoProgress));
    }
    if !std::io::stderr().is_terminal() {
        return Ok(Box::new(LogProgress::default()));
    }
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] {bar:60.cyan/blue} {pos:>7}/{len:7} reads")?
            .progress_chars("##-"),
    );
    pb.set_message("Splitting");
    Ok(Box::new(pb))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.config();
    info!(
        input = %args.input.display(),
        reads = config.get_chunk_size(),
        threads = config.get_threads(),
        "splitting"
    );

    let sink = progress_sink(args.quiet)?;
    match split(Bq, &args.input, &config, sink) {
        Ok(summary) => {
            info!(
                "Wrote {} reads into {} chunk files",
                summary.total_records,
                summary.num_chunks()
            );
            Ok(())
        }
        Err(e) => {
            error!("{e}");
            Err(e.into())
        }
    }
}
