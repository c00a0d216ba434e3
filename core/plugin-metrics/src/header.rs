//! Header line of the plugin metadata.
//!
//! In describe mode, the first line printed by a plugin must look like this:
//!
//! ```txt
//! # mackerel-agent-plugin version=1 some-flag
//! ```
//!
//! that is: optional whitespace, `#`, optional whitespace, the marker
//! `mackerel-agent-plugin`, then any number of whitespace-separated fields,
//! each being either `key` or `key=value`. Anything after a second `=` is dropped,
//! so `version=1=x` declares version `1`.

use std::{collections::BTreeMap, str::FromStr};

use thiserror::Error;

/// The token that identifies a plugin header.
pub const HEADER_MARKER: &str = "mackerel-agent-plugin";

/// The only version of the metadata schema that we understand.
pub const SUPPORTED_VERSION: &str = "1";

/// Fields of a header line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginHeader {
    fields: BTreeMap<String, String>,
}

/// The line does not follow the header grammar.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("bad format of first line: {line:?}")]
pub struct HeaderError {
    pub line: String,
}

impl PluginHeader {
    /// Value of a field. A field without `=` has an empty value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Version of the metadata schema, `"1"` if the header does not say.
    pub fn version(&self) -> &str {
        self.get("version").unwrap_or(SUPPORTED_VERSION)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromStr for PluginHeader {
    type Err = HeaderError;

    /// Parses a header line. The line terminator, if any, is ignored.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let bad_format = || HeaderError { line: line.to_owned() };

        let rest = line
            .trim_start()
            .strip_prefix('#')
            .map(str::trim_start)
            .and_then(|s| s.strip_prefix(HEADER_MARKER))
            .ok_or_else(bad_format)?;

        // The marker must be a whole word.
        if rest.chars().next().is_some_and(|c| !c.is_whitespace()) {
            return Err(bad_format());
        }

        // When a key appears several times, the last one wins.
        let fields = rest
            .split_whitespace()
            .map(|field| {
                // In `key=value=extra`, only `value` is kept.
                let mut parts = field.split('=');
                let key = parts.next().unwrap_or_default();
                let value = parts.next().unwrap_or_default();
                (key.to_owned(), value.to_owned())
            })
            .collect();
        Ok(PluginHeader { fields })
    }
}
