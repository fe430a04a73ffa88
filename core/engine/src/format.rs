//! Backup artifact formats.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use kvbackup_common::{Error, Result};

use crate::aggregate::AggregateMap;

/// Serialized form of an aggregate mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Flat JSON object, tab-indented.
    #[default]
    Json,
    /// Flat YAML mapping.
    #[serde(alias = "yml")]
    Yaml,
    /// `key = value` lines. Write-only.
    Kv,
}

impl OutputFormat {
    /// Serialize an aggregate mapping.
    pub fn serialize(&self, aggregate: &AggregateMap) -> Result<Vec<u8>> {
        match self {
            OutputFormat::Json => {
                let mut out = Vec::new();
                let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
                let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
                aggregate
                    .serialize(&mut serializer)
                    .map_err(|e| Error::Serialization(format!("JSON: {}", e)))?;
                out.push(b'\n');
                Ok(out)
            }
            OutputFormat::Yaml => serde_yaml::to_string(aggregate)
                .map(String::into_bytes)
                .map_err(|e| Error::Serialization(format!("YAML: {}", e))),
            OutputFormat::Kv => {
                let mut out = String::new();
                for (key, value) in aggregate {
                    out.push_str(key);
                    out.push_str(" = ");
                    out.push_str(value);
                    out.push('\n');
                }
                Ok(out.into_bytes())
            }
        }
    }

    /// Parse an artifact back into an aggregate mapping.
    ///
    /// # Errors
    /// - Artifact is not a flat mapping of strings to strings
    /// - Format is `kv`, which has no reader
    pub fn deserialize(&self, bytes: &[u8]) -> Result<AggregateMap> {
        match self {
            OutputFormat::Json => serde_json::from_slice(bytes)
                .map_err(|e| Error::Format(format!("Expected a flat JSON object of strings: {}", e))),
            OutputFormat::Yaml => serde_yaml::from_slice(bytes)
                .map_err(|e| Error::Format(format!("Expected a flat YAML mapping of strings: {}", e))),
            OutputFormat::Kv => Err(Error::Format(
                "The kv format is write-only and cannot be restored".to_string(),
            )),
        }
    }

    /// Whether artifacts in this format can be restored.
    pub fn is_readable(&self) -> bool {
        !matches!(self, OutputFormat::Kv)
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "kv" => Ok(OutputFormat::Kv),
            other => Err(Error::Config(format!(
                "Unsupported format '{}'. Use: json, yaml, kv",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
            OutputFormat::Kv => write!(f, "kv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> AggregateMap {
        let mut map = AggregateMap::new();
        map.insert("b/x".to_string(), "1".to_string());
        map.insert("a/c/y".to_string(), "2".to_string());
        map
    }

    #[test]
    fn test_json_is_tab_indented() {
        let out = OutputFormat::Json.serialize(&sample()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "{\n\t\"a/c/y\": \"2\",\n\t\"b/x\": \"1\"\n}\n");
    }

    #[test]
    fn test_json_rejects_array() {
        let result = OutputFormat::Json.deserialize(b"[\"a/x\", \"1\"]");
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[test]
    fn test_json_rejects_nested_values() {
        let result = OutputFormat::Json.deserialize(b"{\"a/x\": {\"b\": \"1\"}}");
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[test]
    fn test_yaml_round_trip() {
        let out = OutputFormat::Yaml.serialize(&sample()).unwrap();
        let back = OutputFormat::Yaml.deserialize(&out).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_kv_lines() {
        let out = OutputFormat::Kv.serialize(&sample()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.contains(&"b/x = 1"));
        assert!(lines.contains(&"a/c/y = 2"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_kv_is_write_only() {
        assert!(!OutputFormat::Kv.is_readable());
        assert!(matches!(
            OutputFormat::Kv.deserialize(b"a/x = 1\n"),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("yml".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert_eq!("kv".parse::<OutputFormat>().unwrap(), OutputFormat::Kv);
        assert!(matches!("toml".parse::<OutputFormat>(), Err(Error::Config(_))));
        assert!(matches!("".parse::<OutputFormat>(), Err(Error::Config(_))));
    }

    proptest! {
        #[test]
        fn json_round_trip(
            leaves in prop::collection::btree_map(
                "[a-z]{1,6}(/[a-z]{1,6}){0,2}",
                prop::collection::btree_map("[A-Za-z0-9_]{1,8}", "\\PC{0,16}", 1..4),
                0..6,
            ),
        ) {
            let mut aggregate = AggregateMap::new();
            for (path, fields) in &leaves {
                for (field, value) in fields {
                    aggregate.insert(format!("{}/{}", path, field), value.clone());
                }
            }

            let bytes = OutputFormat::Json.serialize(&aggregate).unwrap();
            let back = OutputFormat::Json.deserialize(&bytes).unwrap();
            prop_assert_eq!(back, aggregate);
        }
    }
}
