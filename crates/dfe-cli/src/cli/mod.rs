mod commands;
mod helpers;
mod registry;

use clap::Parser;
use dfe_core::domain::DfeError;
use tracing_subscriber::EnvFilter;

pub fn run_from_env() -> i32 {
    match run(std::env::args().skip(1)) {
        Ok(code) => code,
        Err(error) => {
            let diagnostic = error.as_dfe_error();
            eprintln!("{}", diagnostic.diagnostic_line());
            eprintln!("{}", diagnostic.fatal_exit_line());
            diagnostic.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("dfe-cache".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            init_tracing(cli.verbose);
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

/// Diagnostics go to stderr so stdout stays machine-readable JSON.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    // A subscriber may already be installed when `run` is called repeatedly.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "dfe-cache",
    about = "Spectrum cache inspection and DFE integration"
)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Print the gamma grid a cache configuration would solve
    Gammas(commands::GammasArgs),
    /// Summarize a persisted spectrum cache
    Inspect(commands::InspectArgs),
    /// Integrate a cached library over a density
    Integrate(commands::IntegrateArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Gammas(args) => commands::run_gammas_command(args),
        CliCommand::Inspect(args) => commands::run_inspect_command(args),
        CliCommand::Integrate(args) => commands::run_integrate_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(DfeError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_dfe_error(&self) -> DfeError {
        match self {
            Self::Usage(message) => DfeError::input_validation("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => DfeError::internal("RUN.CLI", format!("{error:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CliError, run};
    use dfe_core::domain::DfeErrorCategory;

    #[test]
    fn unknown_subcommand_is_a_usage_error() {
        let error = run(["frobnicate"]).expect_err("unknown command");
        assert!(matches!(error, CliError::Usage(_)));
        assert_eq!(
            error.as_dfe_error().category(),
            DfeErrorCategory::InputValidationError
        );
        assert_eq!(error.as_dfe_error().placeholder(), "INPUT.CLI_USAGE");
    }

    #[test]
    fn help_exits_cleanly() {
        assert_eq!(run(["--help"]).expect("help"), 0);
    }

    #[test]
    fn gammas_requires_a_source() {
        let error = run(["gammas"]).expect_err("config or preset is required");
        assert!(matches!(error, CliError::Usage(_)));
    }
}
