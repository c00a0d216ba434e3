use thiserror::Error;

use crate::{
    command::{CommandOutput, RunError},
    header::HeaderError,
};

/// Error returned by the plugin generator.
#[derive(Error, Debug)]
pub enum PluginError {
    /// The plugin command could not be run, or exited with a nonzero status.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    /// The output of the plugin has no complete first line.
    #[error("while reading the first line of command {command}: no header line in the output")]
    MissingHeader { command: String },
    /// The first line of the output is not a valid plugin header.
    #[error(transparent)]
    BadHeader(#[from] HeaderError),
    /// The header declares a version of the metadata schema that we do not support.
    #[error("unsupported plugin meta version: {0:?}")]
    UnsupportedVersion(String),
    /// The body of the metadata is not a valid JSON document.
    #[error("while reading plugin configuration: {0}")]
    InvalidMeta(#[source] serde_json::Error),
}

/// Failure of a plugin command, with everything we know about the run.
#[derive(Error, Debug)]
#[error("running {command} failed: {source}, exit={} stderr={stderr:?}", .exit_code.unwrap_or(-1))]
pub struct ExecutionError {
    pub command: String,
    pub exit_code: Option<i32>,
    pub stderr: String,
    #[source]
    pub source: RunError,
}

impl ExecutionError {
    /// Extracts the failure of a command run, if any.
    pub(crate) fn check(command: String, output: &mut CommandOutput) -> Result<(), ExecutionError> {
        match output.error.take() {
            None => Ok(()),
            Some(source) => Err(ExecutionError {
                command,
                exit_code: output.exit_code,
                stderr: output.stderr.clone(),
                source,
            }),
        }
    }
}
