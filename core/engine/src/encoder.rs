//! Value encoders applied to every field during backup.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use kvbackup_common::{Error, Result, SecretValue};

/// How field values are turned into artifact strings.
///
/// Selected once per run; never path-dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueEncoding {
    /// Stringify as-is.
    #[default]
    Plain,
    /// Stringify, then standard base64 with padding.
    Base64,
}

impl ValueEncoding {
    /// Encode a field value.
    ///
    /// Byte values are base64-encoded from their raw bytes rather than
    /// from a lossy text rendering.
    pub fn encode(&self, value: &SecretValue) -> String {
        match self {
            ValueEncoding::Plain => value.to_plain_string(),
            ValueEncoding::Base64 => STANDARD.encode(value.as_bytes()),
        }
    }

    /// Reverse [`encode`](Self::encode) for a restore.
    ///
    /// Decoded bytes that are valid UTF-8 come back as a string value.
    ///
    /// # Errors
    /// - Input is not valid base64 (base64 encoding only)
    pub fn decode(&self, encoded: &str) -> Result<SecretValue> {
        match self {
            ValueEncoding::Plain => Ok(SecretValue::String(encoded.to_string())),
            ValueEncoding::Base64 => {
                let bytes = STANDARD
                    .decode(encoded)
                    .map_err(|e| Error::Encoding(format!("Invalid base64 value: {}", e)))?;
                Ok(match String::from_utf8(bytes) {
                    Ok(s) => SecretValue::String(s),
                    Err(e) => SecretValue::Bytes(e.into_bytes()),
                })
            }
        }
    }
}

impl FromStr for ValueEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "plain" => Ok(ValueEncoding::Plain),
            "base64" => Ok(ValueEncoding::Base64),
            other => Err(Error::Config(format!(
                "Unsupported encoding '{}'. Use: plain, base64",
                other
            ))),
        }
    }
}

impl fmt::Display for ValueEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueEncoding::Plain => write!(f, "plain"),
            ValueEncoding::Base64 => write!(f, "base64"),
        }
    }
}
