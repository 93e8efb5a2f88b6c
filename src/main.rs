//! # oidc-setup
//!
//! Entry point: parses arguments, initializes logging and runs the setup flow
//! on a single-threaded runtime.
//!
//! Exit codes: `0` on success, when the sandbox is unsupported, or when the
//! operator declines; `1` on any error, argument errors included.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use oidc_setup::cli::Cli;
use oidc_setup::config::SetupConfig;
use oidc_setup::controller::{self, Collaborators, Outcome};
use oidc_setup::error::SetupError;
use oidc_setup::prompt::StdinPrompter;
use oidc_setup::provider::azure::AzureCli;
use oidc_setup::provider::github::GithubCli;
use oidc_setup::tools::{SystemToolRunner, ToolRunner};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version are not failures
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
            let _ = e.print();
            return code;
        }
    };

    let config = SetupConfig::from_env();
    init_tracing(&config);

    match run(cli, &config) {
        Ok(outcome) => {
            match outcome {
                Outcome::Completed(report) => {
                    println!();
                    println!("{report}");
                    println!("✔ setup complete");
                }
                Outcome::Unsupported(reason) => println!("► {reason}"),
                Outcome::Declined => println!("► nothing was changed"),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Setup failed: {:#}", e);
            eprintln!("✗ {e:#}");
            if let Some(hint) = e.downcast_ref::<SetupError>().and_then(SetupError::remediation) {
                eprintln!("  {hint}");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(config: &SetupConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("oidc_setup={}", config.log_level).into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli, config: &SetupConfig) -> Result<Outcome> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build the async runtime")?;

    info!(
        "oidc-setup {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_GIT_HASH")
    );

    let runner: Arc<dyn ToolRunner> = Arc::new(SystemToolRunner);
    let identity = AzureCli::new(Arc::clone(&runner));
    let hosting = GithubCli::new(Arc::clone(&runner));
    let mut prompter = StdinPrompter;

    let deps = Collaborators {
        runner: runner.as_ref(),
        identity: &identity,
        hosting: &hosting,
        prompter: &mut prompter,
    };

    let outcome = runtime.block_on(controller::run(
        config,
        cli.into_input(),
        |key| std::env::var(key).ok(),
        deps,
    ))?;
    Ok(outcome)
}
