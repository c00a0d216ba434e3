use std::path::{Path, PathBuf};

pub mod run;

/// Writes a plugin script in `dir` and returns the TOML value of a command that runs it.
///
/// The script goes through `sh` instead of being executed directly, to avoid "text file busy" errors.
pub fn write_plugin(dir: &Path, name: &str, script: &str) -> anyhow::Result<String> {
    let path = dir.join(name);
    std::fs::write(&path, script)?;
    Ok(format!("[\"/bin/sh\", {:?}]", path.to_string_lossy()))
}

/// Writes the agent config file in `dir` and returns its path.
pub fn write_config(dir: &Path, content: &str) -> anyhow::Result<PathBuf> {
    let path = dir.join("plugin-metrics.toml");
    std::fs::write(&path, content)?;
    Ok(path)
}
