//! Metadata of a plugin: the graphs it draws.
//!
//! The plugin is run in describe mode and is supposed to print something like this:
//!
//! ```txt
//! # mackerel-agent-plugin
//! {
//!   "graphs": {
//!     "dice": {
//!       "label": "My Dice",
//!       "unit": "integer",
//!       "metrics": [
//!         { "name": "d6", "label": "Die (d6)" },
//!         { "name": "d20", "label": "Die (d20)" }
//!       ]
//!     }
//!   }
//! }
//! ```
//!
//! The first line is parsed by [`crate::header`], the rest is a JSON document
//! decoded into [`PluginMeta`]. Anything after the JSON document is ignored.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    DESCRIBE_MODE, PLUGIN_META_ENV,
    command::CommandRunner,
    diagnostics::Diagnostics,
    error::{ExecutionError, PluginError},
    header::{PluginHeader, SUPPORTED_VERSION},
    units::{self, GraphUnit},
};

/// Graphs declared by a plugin, by graph key.
///
/// The graphs are kept in the order of the plugin output. Field names are also
/// accepted capitalized, and `null` stands for the default value of a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginMeta {
    #[serde(default, alias = "Graphs", deserialize_with = "null_as_default")]
    pub graphs: IndexMap<String, GraphDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDef {
    #[serde(default, alias = "Label", deserialize_with = "null_as_default")]
    pub label: String,
    /// `None` if the plugin did not declare a unit.
    #[serde(
        default,
        alias = "Unit",
        deserialize_with = "units::deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub unit: Option<GraphUnit>,
    /// Metrics of the graph, in display order.
    #[serde(default, alias = "Metrics", deserialize_with = "null_as_default")]
    pub metrics: Vec<MetricDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDef {
    #[serde(default, alias = "Name", deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, alias = "Label", deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(default, alias = "Stacked", deserialize_with = "null_as_default")]
    pub stacked: bool,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parses the describe-mode output of a plugin.
///
/// `command` is only used in error messages.
pub fn parse_plugin_meta(command: &str, stdout: &str) -> Result<PluginMeta, PluginError> {
    let (header_line, body) = stdout.split_once('\n').ok_or_else(|| PluginError::MissingHeader {
        command: command.to_owned(),
    })?;

    let header: PluginHeader = header_line.parse()?;
    let version = header.version();
    if version != SUPPORTED_VERSION {
        return Err(PluginError::UnsupportedVersion(version.to_owned()));
    }

    // Decode the first JSON value and ignore what follows.
    let mut deserializer = serde_json::Deserializer::from_str(body);
    PluginMeta::deserialize(&mut deserializer).map_err(PluginError::InvalidMeta)
}

/// Runs the plugin in describe mode and parses its output.
pub fn load_plugin_meta(runner: &dyn CommandRunner, diagnostics: &Diagnostics) -> Result<PluginMeta, PluginError> {
    let command = runner.command_string();
    let mut output = runner.run_with_env(&[(PLUGIN_META_ENV, DESCRIBE_MODE)]);
    ExecutionError::check(command.clone(), &mut output)?;

    let meta = parse_plugin_meta(&command, &output.stdout)?;
    diagnostics.debug(format_args!(
        "command {command} described {} graph(s)",
        meta.graphs.len()
    ));
    Ok(meta)
}
