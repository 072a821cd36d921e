use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod error;
mod mutate;

/// Corrupts a percentage of the bytes of a file and writes the fuzzed copy to another
/// directory, under the same file name.
#[derive(Parser, Debug)]
#[command(name = "fuzzify", version)]
struct Args {
    /// Input file
    #[arg(short = 'f', long = "file")]
    file: PathBuf,

    /// Output directory destination
    #[arg(short = 'o', long = "outdir")]
    outdir: PathBuf,

    /// Percentage of mutations
    #[arg(
        short = 'p',
        long = "percent",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    percent: u32,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> anyhow::Result<()> {
    let mut rand = rand::thread_rng();
    let report = mutate::mutate_file(&mut rand, &args.file, &args.outdir, args.percent)
        .context("file modification failure")?;

    info!(
        output = %report.output.display(),
        mutated = report.nbytes,
        fsize = report.fsize,
        sha1 = %report.sha1,
        "wrote fuzzed file"
    );
    debug!(positions = ?report.positions, "mutated positions");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
