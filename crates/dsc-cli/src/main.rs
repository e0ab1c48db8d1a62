//! # dsc CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules.

use std::process::ExitCode;

use clap::Parser;
use dsc_cli::Report;
use tracing_subscriber::EnvFilter;

/// Dataspace connector toolchain.
///
/// Inspects and evaluates usage policies and runs the provider/consumer
/// handshake in-process.
#[derive(Parser, Debug)]
#[command(name = "dsc", version, about)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List, show, and evaluate usage policies.
    Policy(dsc_cli::policy::PolicyArgs),
    /// Run a provider and a consumer through the full handshake.
    Demo(dsc_cli::demo::DemoArgs),
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Policy(args) => dsc_cli::policy::run(args),
        Commands::Demo(args) => dsc_cli::demo::run(args).await,
    };

    match result {
        Ok(report) => print_report(&report),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn print_report(report: &Report) -> ExitCode {
    match serde_json::to_string_pretty(&report.output) {
        Ok(text) => println!("{text}"),
        Err(err) => {
            eprintln!("error: failed to render output: {err}");
            return ExitCode::FAILURE;
        }
    }
    if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}
