use anyhow::Context;
use assert_cmd::cargo::{CargoError, CommandCargoExt};
use std::{
    path::Path,
    process::{Command, Output},
};

/// Constructs a `Command` that execute a binary.
///
/// This does NOT call `cargo run`, see [`assert_cmd::Command::cargo_bin`].
pub fn command_run_agent(binary: &str, bin_args: &[&str]) -> Result<Command, CargoError> {
    let mut cmd = Command::cargo_bin(binary)?;
    cmd.args(bin_args);
    cmd.env_remove("PLUGIN_METRICS_CONFIG");
    Ok(cmd)
}

/// Executes an agent binary in `workdir` and returns its output.
///
/// The stderr of the agent is copied to the current stderr, to see the logs of failed tests.
pub fn run_agent(binary: &str, bin_args: &[&str], workdir: &Path) -> anyhow::Result<Output> {
    let mut cmd = command_run_agent(binary, bin_args)?;
    let output = cmd
        .current_dir(workdir)
        .output()
        .with_context(|| format!("could not run process {cmd:?}"))?;
    eprintln!("{}", String::from_utf8_lossy(&output.stderr));
    Ok(output)
}

/// Parses the JSON printed by the agent.
pub fn stdout_json(output: &Output) -> anyhow::Result<serde_json::Value> {
    serde_json::from_slice(&output.stdout)
        .with_context(|| format!("invalid JSON output: {}", String::from_utf8_lossy(&output.stdout)))
}
