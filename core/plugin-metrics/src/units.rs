//! Units of plugin graphs.

use std::{
    convert::Infallible,
    fmt::{self, Display},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The unit of a graph, as understood by the monitoring backend.
///
/// Units that we do not know are kept as [`GraphUnit::Other`]: validating them is
/// the job of the backend, not ours.
///
/// # Example
/// ```
/// use plugin_metrics::GraphUnit;
///
/// let unit: GraphUnit = "bytes/sec".parse().unwrap();
/// assert_eq!(unit, GraphUnit::BytesPerSecond);
/// assert_eq!(unit.to_string(), "bytes/sec");
/// ```
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub enum GraphUnit {
    /// Default unit, for graphs that do not declare one.
    #[default]
    Float,
    Integer,
    /// Between 0 and 100.
    Percentage,
    Seconds,
    Milliseconds,
    Bytes,
    BytesPerSecond,
    BitsPerSecond,
    /// I/O operations per second.
    Iops,
    /// A unit that is not in the list above.
    Other(String),
}

impl GraphUnit {
    /// Returns the name of the unit in the plugin protocol.
    pub fn as_str(&self) -> &str {
        match self {
            GraphUnit::Float => "float",
            GraphUnit::Integer => "integer",
            GraphUnit::Percentage => "percentage",
            GraphUnit::Seconds => "seconds",
            GraphUnit::Milliseconds => "milliseconds",
            GraphUnit::Bytes => "bytes",
            GraphUnit::BytesPerSecond => "bytes/sec",
            GraphUnit::BitsPerSecond => "bits/sec",
            GraphUnit::Iops => "iops",
            GraphUnit::Other(name) => name,
        }
    }

    /// Returns `true` if this is one of the documented units.
    pub fn is_known(&self) -> bool {
        !matches!(self, GraphUnit::Other(_))
    }
}

impl Display for GraphUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GraphUnit {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let res = match s {
            "float" => GraphUnit::Float,
            "integer" => GraphUnit::Integer,
            "percentage" => GraphUnit::Percentage,
            "seconds" => GraphUnit::Seconds,
            "milliseconds" => GraphUnit::Milliseconds,
            "bytes" => GraphUnit::Bytes,
            "bytes/sec" => GraphUnit::BytesPerSecond,
            "bits/sec" => GraphUnit::BitsPerSecond,
            "iops" => GraphUnit::Iops,
            other => GraphUnit::Other(other.to_owned()),
        };
        Ok(res)
    }
}

impl Serialize for GraphUnit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for GraphUnit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let Ok(unit) = s.parse::<GraphUnit>();
        Ok(unit)
    }
}

/// Deserializes an optional unit: a missing, `null` or empty unit is `None`.
pub(crate) fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<GraphUnit>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = Option::<String>::deserialize(deserializer)?;
    Ok(s.filter(|s| !s.is_empty()).map(|s| {
        let Ok(unit) = s.parse::<GraphUnit>();
        unit
    }))
}
