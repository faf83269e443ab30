use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use scholar::cli::{self, Cli, Commands, ConfigSubcommands};
use scholar::config::{AppConfig, ConfigPersister};
use scholar::core::{ExchangeOutcome, Result};
use scholar::logging;

fn handle_config(command: &ConfigSubcommands) -> ExitCode {
    match command {
        ConfigSubcommands::Init => match AppConfig::init_default() {
            Ok(path) => {
                println!("✓ Created config file at {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("✗ Failed to create config: {e}");
                ExitCode::FAILURE
            }
        },
        ConfigSubcommands::Where => match AppConfig::get_config_path() {
            Some(path) => {
                println!("{}", path.display());
                ExitCode::SUCCESS
            }
            None => {
                eprintln!("✗ Could not determine config path");
                ExitCode::FAILURE
            }
        },
        ConfigSubcommands::Set { .. } => {
            let patch = command.patch().unwrap_or_default();
            if patch.is_empty() {
                eprintln!("✗ Nothing to set. Pass --endpoint, --framing or --prompt-key");
                return ExitCode::FAILURE;
            }
            let result = ConfigPersister::with_default_path().and_then(|persister| {
                persister.apply_patch(&patch)?;
                Ok(persister.path().clone())
            });
            match result {
                Ok(path) => {
                    println!("✓ Updated {}", path.display());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("✗ Failed to update config: {e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn exit_code(outcome: ExchangeOutcome) -> ExitCode {
    match outcome {
        ExchangeOutcome::Completed => ExitCode::SUCCESS,
        ExchangeOutcome::Failed => ExitCode::FAILURE,
        ExchangeOutcome::Cancelled => ExitCode::from(130),
    }
}

async fn run(cli: &Cli, config: &AppConfig) -> Result<ExitCode> {
    let timeout = cli.timeout.map(Duration::from_secs);
    let options = config.exchange_options();

    match &cli.command {
        Some(Commands::Config { command }) => Ok(handle_config(command)),
        Some(Commands::Ask { question, json }) => {
            let mut session = cli::build_session(config)?;
            let outcome =
                cli::run_ask(&mut session, question.join(" "), options, timeout, *json).await?;
            Ok(exit_code(outcome))
        }
        None | Some(Commands::Chat) => {
            let mut session = cli::build_session(config)?;
            let interrupted = cli::run_chat(&mut session, options, timeout).await?;
            Ok(if interrupted {
                ExitCode::from(130)
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.verbose);

    let mut config = AppConfig::load();
    cli.apply_to(&mut config);

    match run(&cli, &config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            eprintln!("✗ {e}");
            ExitCode::FAILURE
        }
    }
}
