// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Modulwerk — command-line host for the capability bridge.
//
// Entry point. Initialises logging (stderr), loads configuration, starts a
// bridge host over the demo package and runs one subcommand.  Results are
// printed to stdout as JSON.

mod config;
mod demo;
mod services;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use modulwerk_core::{NarrowingMode, Result};
use serde::Serialize;
use tracing::error;

use config::CliConfig;
use services::host::{self, BridgeHost};

#[derive(Debug, Parser)]
#[command(name = "modulwerk", version, about = "Drive the Modulwerk capability bridge from the command line")]
struct Cli {
    /// JSON configuration file (defaults are used if it does not exist).
    #[arg(long, global = true, default_value = "modulwerk.json")]
    config: PathBuf,

    /// Caller-side timeout per call, in milliseconds.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Reject fractional numbers passed to integral parameters.
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print exported methods, module constants and view managers.
    Manifest,
    /// Call one exported method and print its settlement.
    Call {
        module: String,
        method: String,
        /// Positional arguments as a JSON array.
        #[arg(default_value = "[]")]
        args: String,
    },
    /// Replay calls from a JSON-lines file of {"module", "method", "args"}.
    Replay { file: PathBuf },
    /// Mount a view, apply props from a JSON object, and unmount it.
    Props {
        manager: String,
        /// Props as a JSON object.
        props: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(code = e.code(), error = %e, "modulwerk failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = CliConfig::load_or_default(&cli.config)?;
    if let Some(ms) = cli.timeout_ms {
        config.call_timeout_ms = Some(ms);
    }
    if cli.strict {
        config.bridge.numeric_narrowing = NarrowingMode::Strict;
    }

    let bridge = BridgeHost::start(&config)?;
    let code = match cli.command {
        Command::Manifest => {
            print_json(&bridge.manifest())?;
            ExitCode::SUCCESS
        }
        Command::Call {
            module,
            method,
            args,
        } => {
            let report = bridge.call(&module, &method, host::parse_args(&args)?).await;
            print_json(&report)?;
            exit_code(report.is_resolved())
        }
        Command::Replay { file } => {
            let reports = bridge.replay(BufReader::new(File::open(&file)?)).await?;
            let all_resolved = reports.iter().all(|r| r.is_resolved());
            print_json(&reports)?;
            exit_code(all_resolved)
        }
        Command::Props { manager, props } => {
            let report = bridge.apply_props(&manager, host::parse_props(&props)?)?;
            let clean = report.report.skipped.is_empty();
            print_json(&report)?;
            exit_code(clean)
        }
    };
    bridge.shutdown();
    Ok(code)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
