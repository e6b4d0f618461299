use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use autot1_cli::{run_lookup, run_submission, AppConfig, RunReport};

#[derive(Parser)]
#[command(name = "autot1", version, about = "Unattended customs declaration batch tool")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = "autot1.json")]
    config: PathBuf,

    /// Override the spreadsheet path from the config file.
    #[arg(long)]
    sheet: Option<PathBuf>,

    /// Run the browser headless regardless of the config file.
    #[arg(long)]
    headless: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit every record in the sheet as a new arrival declaration.
    Run,
    /// Verify submitted records and push unloading remarks where due.
    Verify,
}

fn print_summary(report: &RunReport) {
    let outcome = &report.outcome;
    info!(
        total = outcome.total,
        succeeded = outcome.succeeded,
        failed = outcome.failed,
        aborted = outcome.aborted,
        "run finished"
    );
    for record in &outcome.records {
        let status = if record.success { "ok" } else { "failed" };
        info!(
            mrn = %record.mrn,
            status,
            detail = record.detail.as_deref().unwrap_or(""),
            "record"
        );
    }
    if let Some(fatal) = &report.fatal {
        error!(%fatal, "batch aborted");
    }
}

fn exit_code(report: &RunReport) -> ExitCode {
    if report.fatal.is_some() {
        ExitCode::from(2)
    } else if report.outcome.failed > 0 || report.outcome.aborted {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match AppConfig::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %format!("{err:#}"), "configuration error");
            return ExitCode::from(2);
        }
    };
    if let Some(sheet) = cli.sheet {
        config.sheet.path = sheet;
    }
    if cli.headless {
        config.session.headless = true;
    }

    let result = match cli.command {
        Command::Run => run_submission(config).await,
        Command::Verify => run_lookup(config).await,
    };

    match result {
        Ok(report) => {
            print_summary(&report);
            exit_code(&report)
        }
        Err(err) => {
            error!(error = %format!("{err:#}"), "run failed to start");
            ExitCode::from(2)
        }
    }
}
