//! Runs the built-in sensitivity battery.
//!
//! ```text
//! sens-battery [--case NAME]... [--config FILE] [--json FILE]
//! ```
//!
//! `--config` replaces the configuration of every case. Log verbosity
//! follows `RUST_LOG`, defaulting to `info`.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use cad_kernel::Context;
use cad_sensitivity::{battery, run_battery, HarnessConfig, HarnessError};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

#[derive(Debug, Default)]
struct Args {
    cases: Vec<String>,
    config: Option<PathBuf>,
    json: Option<PathBuf>,
}

fn parse_args() -> Result<Args, HarnessError> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(flag) = it.next() {
        let mut value = || {
            it.next()
                .ok_or_else(|| HarnessError::Config(format!("{flag} needs a value")))
        };
        match flag.as_str() {
            "--case" => args.cases.push(value()?),
            "--config" => args.config = Some(value()?.into()),
            "--json" => args.json = Some(value()?.into()),
            other => return Err(HarnessError::Config(format!("unknown argument {other}"))),
        }
    }
    Ok(args)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);
    Registry::default().with(filter).with(fmt_layer).init();
}

fn run() -> Result<bool, HarnessError> {
    let args = parse_args()?;
    let mut cases = battery();
    if !args.cases.is_empty() {
        cases.retain(|c| args.cases.contains(&c.name));
        if cases.is_empty() {
            return Err(HarnessError::Config(format!("no case named {:?}", args.cases)));
        }
    }
    if let Some(path) = &args.config {
        let config = HarnessConfig::load(path)?;
        for case in &mut cases {
            case.config = config;
        }
    }

    let mut ctx = Context::new();
    let report = run_battery(&mut ctx, &cases);
    print!("{report}");

    if let Some(path) = &args.json {
        std::fs::write(path, report.to_json()?)
            .map_err(|e| HarnessError::Config(format!("writing {}: {e}", path.display())))?;
        info!(path = %path.display(), "report written");
    }
    Ok(report.passed() && report.cases.len() == cases.len())
}

fn main() -> ExitCode {
    init_tracing();
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "battery did not run");
            ExitCode::from(2)
        }
    }
}
