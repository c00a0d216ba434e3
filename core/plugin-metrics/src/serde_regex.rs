//! (De)serialization support for optional Regex.
//!
//! An empty string means "no pattern".

use regex::Regex;
use serde::{Deserialize, Deserializer, Serializer, de::Error};

pub fn serialize<S>(opt: &Option<Regex>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match opt {
        Some(regex) => serializer.serialize_str(regex.as_str()),
        None => serializer.serialize_str(""),
    }
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Regex>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        Ok(None)
    } else {
        let regex = Regex::new(&s).map_err(|e| D::Error::custom(format!("invalid pattern {s:?}: {e}")))?;
        Ok(Some(regex))
    }
}
