//! `supallm-run`: run a flow from the terminal.
//!
//! Streams every text fragment to stdout as it arrives, node logs to stderr,
//! and finishes with the final result.
//!
//! ```ignore
//! use supallm::cli::{parse_args, run_cli_command};
//!
//! let command = parse_args(std::env::args())?;
//! run_cli_command(command).await?;
//! ```

pub mod args;
pub mod version;

pub use args::{parse_args, ArgsError, CliCommand, RunArgs, USAGE};
pub use version::{version_line, VERSION};

use std::io::Write;

use color_eyre::eyre::{eyre, Result, WrapErr};

use crate::client::{RunFlowParams, SupallmClient};
use crate::config::ClientConfig;
use crate::error::FlowError;
use crate::events::{EventKind, FlowEvent};
use crate::response::FlowOutcome;

pub async fn run_cli_command(command: CliCommand) -> Result<()> {
    match command {
        CliCommand::Version => {
            println!("{}", version_line());
            Ok(())
        }
        CliCommand::Help => {
            println!("{}", USAGE);
            Ok(())
        }
        CliCommand::Run(run) => run_flow(run).await,
    }
}

/// Server mode when a secret key is configured, browser mode otherwise.
fn build_client(config: ClientConfig) -> Result<SupallmClient> {
    let client = if config.secret_key.is_some() || config.mocked {
        SupallmClient::server(config)
    } else {
        SupallmClient::browser(config)
    };
    client.wrap_err("Invalid Supallm configuration")
}

async fn run_flow(run: RunArgs) -> Result<()> {
    let config = if run.mocked {
        ClientConfig::from_env()
            .unwrap_or_else(|_| ClientConfig::new("mock"))
            .with_mocked(true)
    } else {
        ClientConfig::from_env().wrap_err("Missing Supallm settings")?
    };
    let client = build_client(config)?;

    let mut params = RunFlowParams::new(run.flow_id).with_inputs(run.inputs);
    if let Some(session_id) = run.session_id {
        params = params.with_session_id(session_id);
    }
    let response = client
        .run(params)
        .map_err(|err| eyre!(describe_error(&FlowError::from(err))))?;

    let subscription = response.subscribe();
    if !run.json {
        subscription.on(EventKind::FlowResultFragment, |event| {
            if let FlowEvent::FlowResultFragment(fragment) = event {
                print!("{}", fragment.value);
                let _ = std::io::stdout().flush();
            }
        });
    }
    subscription.on(EventKind::NodeLog, |event| {
        if let FlowEvent::NodeLog(log) = event {
            eprintln!("[{}] {}", log.node_id, log.message);
        }
    });

    let outcome = response
        .wait()
        .await
        .map_err(|err| eyre!(describe_error(&err)))?;
    match outcome {
        FlowOutcome::Success { result } => {
            if run.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!();
            }
            Ok(())
        }
        FlowOutcome::Failure { error } => Err(eyre!("Flow failed: {}", error)),
    }
}

/// One-line report of a run error with its category and what to try next.
fn describe_error(err: &FlowError) -> String {
    let category = err.category();
    let retry = if err.is_retryable() {
        " Retrying may succeed."
    } else {
        ""
    };
    format!(
        "{} [{}: {}] {}.{}",
        err,
        category,
        err.error_code(),
        category.recovery_hint(),
        retry
    )
}
