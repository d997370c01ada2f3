use std::process::ExitCode;

use clap::Parser;
use control::{ControlOptions, handle_control};

mod control;

fn main() -> ExitCode {
    let opts = ControlOptions::parse();

    let level = if opts.trace {
        tracing::Level::TRACE
    } else if opts.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match handle_control(opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("Lib ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}
