//! Configuration of one plugin.

use std::{collections::BTreeMap, time::Duration};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{collect::KeyFilter, command::CommandSpec, serde_regex};

/// Settings of a metric plugin, as read from the agent configuration.
///
/// # Example
///
/// ```toml
/// command = ["/usr/local/bin/tcp-states", "--all"]
/// include_pattern = '^tcp\.'
/// exclude_pattern = 'CLOSING$'
/// custom_identifier = "db-primary.example.com"
/// timeout = "30s"
/// env = { LANG = "C" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginConfig {
    pub command: CommandSpec,

    /// Only the metrics whose raw key matches this pattern are kept.
    #[serde(default, with = "serde_regex")]
    pub include_pattern: Option<Regex>,

    /// The metrics whose raw key matches this pattern are dropped, even if they match `include_pattern`.
    #[serde(default, with = "serde_regex")]
    pub exclude_pattern: Option<Regex>,

    /// Attributes the values to another host than the local one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_identifier: Option<String>,

    /// Maximum run time of one invocation of the command.
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    /// Additional environment variables.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl PluginConfig {
    pub fn new(command: CommandSpec) -> Self {
        Self {
            command,
            include_pattern: None,
            exclude_pattern: None,
            custom_identifier: None,
            timeout: None,
            env: BTreeMap::new(),
        }
    }

    /// The include/exclude filter applied to raw metric keys.
    pub fn key_filter(&self) -> KeyFilter {
        KeyFilter::new(self.include_pattern.clone(), self.exclude_pattern.clone())
    }
}
