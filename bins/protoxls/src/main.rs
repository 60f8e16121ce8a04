mod cmd;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cmd::config::{Effective, ExportArgs};
use cmd::error::CliError;

/// Log filter when `RUST_LOG` is unset: progress from the exporter,
/// warnings from everything else.
const DEFAULT_LOG_FILTER: &str = "warn,protoxls=info,protoxls_engine=info";

#[derive(Parser)]
#[command(name = "protoxls", version, about = "Export spreadsheet tables described by protobuf messages")]
struct Cli {
    #[command(flatten)]
    args: ExportArgs,
}

/// Logs go to stderr so rendered output piped from stdout stays clean.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// `Ok(false)` when some message or format failed; those failures are
/// already logged.
async fn export(args: &ExportArgs) -> Result<bool, CliError> {
    let eff = Effective::new(args)?;
    let report = cmd::export::run(eff).await?;
    Ok(report.is_success())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match export(&cli.args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("protoxls: {e}");
            ExitCode::FAILURE
        }
    }
}
