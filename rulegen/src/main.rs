// rulegen/src/main.rs
//
// Command-line front end: parse arguments, install the tracing
// subscriber, and run the ingest + generation pipeline with stdout as
// the rule sink. Every failure path exits with code 1.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rulegen_core::{BufferedSink, Config};

/// Analyses password-mangling rules and cooks up new combinations using
/// markov chains. Generated rules go to stdout, one per line; all
/// diagnostics go to stderr.
#[derive(Debug, Parser)]
#[command(name = "rulegen", version, about)]
struct Args {
    /// Rule files to analyse, one rule per line
    #[arg(required = true, value_name = "RULEFILE")]
    rulefiles: Vec<PathBuf>,

    /// Minimum rule length (operations)
    #[arg(short = 'm', long, value_name = "N",
          value_parser = clap::value_parser!(u64).range(1..=10))]
    min_length: Option<u64>,

    /// Maximum rule length (operations)
    #[arg(short = 'M', long, value_name = "N",
          value_parser = clap::value_parser!(u64).range(1..=16))]
    max_length: Option<u64>,

    /// Limit starting chains to the top N starters (0 = no limit)
    #[arg(short = 'l', long, value_name = "N",
          value_parser = clap::value_parser!(u64).range(0..=65535))]
    limit: Option<u64>,

    /// Minimum probability threshold (0.0-1.0)
    #[arg(short = 'p', long = "probability", value_name = "X")]
    probability: Option<f64>,

    /// Read generation settings from a TOML file (flags override it)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose mode (show analysis and statistics on stderr)
    #[arg(short = 'v', long)]
    verbose: bool,
}

/// Merge the optional config file with explicit flags; flags win.
fn build_config(args: &Args) -> Result<Config> {
    let mut cfg = match &args.config {
        Some(path) => Config::load_toml(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(n) = args.min_length {
        cfg.min_length = n as usize;
    }
    if let Some(n) = args.max_length {
        cfg.max_length = n as usize;
    }
    if let Some(n) = args.limit {
        cfg.limit = n as usize;
    }
    if let Some(p) = args.probability {
        cfg.min_probability = p;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // Help and argument errors both land on stderr and exit 1.
            eprint!("{}", err.render());
            return ExitCode::FAILURE;
        }
    };

    init_tracing(args.verbose);

    let cfg = match build_config(&args) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("rulegen: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    let stdout = io::stdout();
    let mut sink = BufferedSink::new(stdout.lock());
    match rulegen::run(&args.rulefiles, &cfg, &mut sink) {
        Ok(_) => match sink.finish() {
            Ok(_) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("rulegen: flushing output: {err}");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            eprintln!("rulegen: {err:#}");
            ExitCode::FAILURE
        }
    }
}
