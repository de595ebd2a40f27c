//! Command-line argument parsing for `supallm-run`.

use thiserror::Error;

use crate::events::{FlowInputs, InputValue};

pub const USAGE: &str = "\
Usage: supallm-run <flow-id> [options]

Options:
  -i, --input <name=value>  Flow input, repeatable
  -s, --session <id>        Continue an existing session
      --mocked              Use the offline transport
      --json                Print the final result as JSON
  -V, --version             Print version
  -h, --help                Print this help

Settings are read from SUPALLM_API_URL, SUPALLM_PROJECT_ID,
SUPALLM_SECRET_KEY and SUPALLM_USER_TOKEN.";

/// Options of a flow run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunArgs {
    pub flow_id: String,
    pub inputs: FlowInputs,
    pub session_id: Option<String>,
    pub mocked: bool,
    pub json: bool,
}

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Version,
    Help,
    Run(RunArgs),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgsError {
    #[error("missing flow id")]
    MissingFlowId,

    #[error("option '{0}' expects a value")]
    MissingValue(String),

    #[error("input '{0}' must look like name=value")]
    InvalidInput(String),

    #[error("unexpected argument '{0}'")]
    Unexpected(String),
}

/// Parse command-line arguments, program name included.
///
/// # Examples
///
/// ```
/// use supallm::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["supallm-run".to_string(), "--version".to_string()];
/// assert_eq!(parse_args(args.into_iter()), Ok(CliCommand::Version));
/// ```
pub fn parse_args<I>(args: I) -> Result<CliCommand, ArgsError>
where
    I: Iterator<Item = String>,
{
    let mut run = RunArgs::default();
    let mut flow_id = None;
    let mut args = args.skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => return Ok(CliCommand::Version),
            "--help" | "-h" => return Ok(CliCommand::Help),
            "--mocked" => run.mocked = true,
            "--json" => run.json = true,
            "--input" | "-i" => {
                let raw = args.next().ok_or_else(|| ArgsError::MissingValue(arg.clone()))?;
                let (name, value) = parse_input(&raw)?;
                run.inputs.insert(name, value);
            }
            "--session" | "-s" => {
                run.session_id =
                    Some(args.next().ok_or_else(|| ArgsError::MissingValue(arg.clone()))?);
            }
            other if other.starts_with('-') => return Err(ArgsError::Unexpected(arg)),
            _ if flow_id.is_none() => flow_id = Some(arg),
            _ => return Err(ArgsError::Unexpected(arg)),
        }
    }

    run.flow_id = flow_id.ok_or(ArgsError::MissingFlowId)?;
    Ok(CliCommand::Run(run))
}

/// Split `name=value`. Numbers and booleans keep their type, anything else
/// is a string.
fn parse_input(raw: &str) -> Result<(String, InputValue), ArgsError> {
    let (name, value) = raw
        .split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| ArgsError::InvalidInput(raw.to_string()))?;

    let value = match serde_json::from_str::<serde_json::Value>(value) {
        Ok(v @ (serde_json::Value::Number(_) | serde_json::Value::Bool(_))) => {
            InputValue::try_from(v).map_err(|_| ArgsError::InvalidInput(raw.to_string()))?
        }
        _ => InputValue::from(value),
    };
    Ok((name.to_string(), value))
}
