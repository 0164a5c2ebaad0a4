use std::process::ExitCode;

use clap::Parser;

use loopcheck::cli::{Args, run};

fn main() -> ExitCode {
    let args = Args::parse();

    // stdout carries the report, logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.parse().unwrap_or_default()),
        )
        .init();

    match run(&args) {
        Ok(true) => ExitCode::from(1),
        Ok(false) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[loopcheck] Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
