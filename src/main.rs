use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use wardlog::config::HospitalConfig;
use wardlog::error::Result;
use wardlog::shell;
use wardlog::validation::WardRules;
use wardlog::Hospital;

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about = "Hospital patient records", long_about = None)]
struct Args {
    /// JSON config file; flags below override it
    #[clap(long)]
    config: Option<PathBuf>,

    /// Directory holding patients.dat and the logs
    #[clap(long)]
    data_dir: Option<PathBuf>,

    /// Skip fsync before replacing patients.dat
    #[clap(long)]
    relaxed_durability: bool,
}

fn main() -> ExitCode {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,wardlog=info");
    }
    tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_target(false)
    .with_level(true)
    .with_writer(io::stderr)
    .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[\u{2717}] {}", e);
            if e.is_fatal() {
                eprintln!("    Cannot continue safely, terminating.");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => HospitalConfig::load(path)?,
        None => HospitalConfig::default(),
    };
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if args.relaxed_durability {
        config.strict_durability = false;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    shell::print_banner(&mut out)?;

    writeln!(out, "Initializing patient records in {}...", config.data_dir.display())?;
    let (mut hospital, outcome) = Hospital::open(config)?;
    shell::report_load(&outcome, hospital.count(), &mut out)?;

    let stdin = io::stdin();
    let result = shell::run_shell(&mut hospital, stdin.lock(), &mut out, &WardRules);

    // Shell error wins over shutdown error
    let shutdown = hospital.shutdown();
    result?;
    shutdown?;
    writeln!(out, "Exiting program, have a nice day!")?;
    Ok(())
}
