//! Collection of metric values.
//!
//! In emit mode, a plugin prints one measurement per line:
//!
//! ```txt
//! tcp.ESTABLISHED 42 1397031808
//! tcp.CLOSING 0 1397031808
//! ```
//!
//! Each line holds the raw key, the value and a unix timestamp, separated by whitespace.
//! Further tokens are ignored. The timestamp must be present but its value is not used.

use regex::Regex;
use rustc_hash::FxHashMap;

use crate::{
    EMIT_MODE, PLUGIN_META_ENV, PLUGIN_PREFIX,
    command::CommandRunner,
    diagnostics::Diagnostics,
    error::{ExecutionError, PluginError},
};

/// Values obtained from one run of a plugin, by namespaced metric key.
pub type Values = FxHashMap<String, f64>;

/// Selects metrics by raw key (before namespacing).
///
/// The exclude pattern takes precedence over the include pattern.
#[derive(Debug, Clone, Default)]
pub struct KeyFilter {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl KeyFilter {
    pub fn new(include: Option<Regex>, exclude: Option<Regex>) -> Self {
        Self { include, exclude }
    }

    pub fn accepts(&self, key: &str) -> bool {
        if let Some(include) = &self.include
            && !include.is_match(key)
        {
            return false;
        }
        if let Some(exclude) = &self.exclude
            && exclude.is_match(key)
        {
            return false;
        }
        true
    }
}

/// Parses the emit-mode output of a plugin.
///
/// Lines with less than three tokens are skipped silently, lines with an invalid
/// value are skipped with a warning. If a key appears several times, the last
/// value wins.
pub fn parse_values(stdout: &str, filter: &KeyFilter, diagnostics: &Diagnostics) -> Values {
    let mut values = Values::default();
    for line in stdout.lines() {
        // key, value, timestamp
        let mut items = line.split_whitespace();
        let (Some(key), Some(value), Some(_timestamp)) = (items.next(), items.next(), items.next()) else {
            continue;
        };

        let value: f64 = match value.parse() {
            Ok(v) => v,
            Err(e) => {
                diagnostics.warn(format_args!("Failed to parse values: {value:?}: {e}"));
                continue;
            }
        };

        if !filter.accepts(key) {
            continue;
        }
        values.insert(format!("{PLUGIN_PREFIX}{key}"), value);
    }
    values
}

/// Runs the plugin in emit mode and parses its output.
pub fn collect_values(
    runner: &dyn CommandRunner,
    filter: &KeyFilter,
    diagnostics: &Diagnostics,
) -> Result<Values, PluginError> {
    let command = runner.command_string();
    let mut output = runner.run_with_env(&[(PLUGIN_META_ENV, EMIT_MODE)]);

    if !output.stderr.is_empty() {
        diagnostics.info(format_args!("command {command} outputted to STDERR: {:?}", output.stderr));
    }
    if let Err(e) = ExecutionError::check(command.clone(), &mut output) {
        diagnostics.error(format_args!(
            "Failed to execute command {command} (skip these metrics): {e}"
        ));
        return Err(e.into());
    }

    let values = parse_values(&output.stdout, filter, diagnostics);
    diagnostics.debug(format_args!("command {command} produced {} value(s)", values.len()));
    Ok(values)
}
