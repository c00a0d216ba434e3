//! Metrics from external plugin commands.
//!
//! A "plugin" is an executable configured by the user. It is invoked in two modes,
//! selected by the [`PLUGIN_META_ENV`] environment variable:
//!
//! - **describe mode** (`MACKEREL_AGENT_PLUGIN_META=1`): the plugin prints a header line
//!   followed by a JSON document that describes its graphs, see [`meta`];
//! - **emit mode** (`MACKEREL_AGENT_PLUGIN_META=`): the plugin prints one
//!   `<key> <value> <timestamp>` line per measurement, see [`collect`].
//!
//! Everything produced by this crate is namespaced with [`PLUGIN_PREFIX`] so that it
//! cannot collide with the built-in metrics of the agent.
//!
//! The entry point is [`MetricPluginGenerator`], which implements [`PluginGenerator`].
//!
//! # Example
//!
//! ```no_run
//! use plugin_metrics::{MetricPluginGenerator, PluginConfig, PluginGenerator, command::CommandSpec};
//!
//! let config = PluginConfig::new(CommandSpec::Shell(String::from("/usr/local/bin/tcp-states")));
//! let mut generator = MetricPluginGenerator::new(config);
//!
//! let graphs = generator.prepare_graph_defs()?;
//! let values = generator.generate()?;
//! for (key, value) in &values {
//!     println!("{key} = {value}");
//! }
//! # Ok::<(), plugin_metrics::PluginError>(())
//! ```

pub mod collect;
pub mod command;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod generator;
pub mod graphdef;
pub mod header;
pub mod meta;
pub mod units;

mod serde_regex;

pub use collect::Values;
pub use config::PluginConfig;
pub use diagnostics::Diagnostics;
pub use error::{ExecutionError, PluginError};
pub use generator::{MetaState, MetricPluginGenerator, PluginGenerator};
pub use graphdef::{GraphDefsMetric, GraphDefsParam};
pub use meta::{GraphDef, MetricDef, PluginMeta};
pub use units::GraphUnit;

/// Prefix of every metric and graph name produced from plugin output.
pub const PLUGIN_PREFIX: &str = "custom.";

/// Environment variable that selects the invocation mode of a plugin.
///
/// It is always set: `"1"` asks for the metadata, `""` asks for the values.
pub const PLUGIN_META_ENV: &str = "MACKEREL_AGENT_PLUGIN_META";

/// Value of [`PLUGIN_META_ENV`] in describe mode.
pub const DESCRIBE_MODE: &str = "1";

/// Value of [`PLUGIN_META_ENV`] in emit mode.
pub const EMIT_MODE: &str = "";
