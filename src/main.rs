use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use brickstorm_fixture::fixture::{DEFAULT_GAP, MAX_GAP};
use brickstorm_fixture::{build_fixture, layout, FixtureOptions, DEFAULT_FILENAME};
use clap::{ArgAction, Parser};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(
    name = "brickstorm-fixture",
    about = "Write a benign test file matching the BRICKSTORM detection signatures"
)]
struct Cli {
    /// Destination file
    #[arg(default_value = DEFAULT_FILENAME)]
    path: PathBuf,
    /// Omit the 64-byte ELF preamble
    #[arg(long)]
    no_header: bool,
    /// Filler bytes before the final call (0-5)
    #[arg(long, default_value_t = DEFAULT_GAP as u8,
          value_parser = clap::value_parser!(u8).range(0..=MAX_GAP as i64))]
    gap: u8,
    /// Print section offsets after writing
    #[arg(long)]
    describe: bool,
    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let options = FixtureOptions::default()
        .with_destination(cli.path)
        .with_header(!cli.no_header)
        .with_gap(usize::from(cli.gap));

    let fixture = build_fixture(&options)
        .with_context(|| format!("generating {}", options.destination.display()))?;

    println!("[+] Test file created: {}", options.destination.display());
    if cli.describe {
        print!("{}", layout::render(&fixture));
    }
    Ok(())
}
