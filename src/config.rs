//! Engine configuration.
//!
//! Embedders (protocol gateways, filter plugins) often configure their
//! tokenizers declaratively, so the config deserializes from JSON bytes
//! with per-field defaults. Programmatic construction goes through
//! [`ScannerConfig::default`] plus field updates.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigurationError;

/// How incoming chunks are appended to the scan buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum Encoding {
    /// Text mode: an incomplete trailing multi-byte sequence is held back
    /// and prefixed onto the next chunk instead of entering the buffer.
    #[default]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    /// Raw mode: chunks are appended verbatim.
    #[serde(rename = "binary", alias = "raw")]
    Binary,
}

impl FromStr for Encoding {
    type Err = ConfigurationError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "binary" | "raw" => Ok(Encoding::Binary),
            _ => Err(ConfigurationError::UnknownEncoding(name.to_string())),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Utf8 => write!(f, "utf-8"),
            Encoding::Binary => write!(f, "binary"),
        }
    }
}

/// Scanner configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ScannerConfig {
    /// Chunk append mode.
    #[serde(default)]
    pub encoding: Encoding,

    /// Initial global trim-left flag applied to subsequently built rules.
    #[serde(default = "default_trim")]
    pub trim_left: bool,

    /// Initial global trim-right flag applied to subsequently built rules.
    #[serde(default = "default_trim")]
    pub trim_right: bool,

    /// Initial reservation for the scan buffer.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Emit structured per-iteration trace events on the `log` facade.
    #[serde(default)]
    pub debug: bool,
}

fn default_trim() -> bool {
    true
}

fn default_buffer_capacity() -> usize {
    16 * 1024
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            encoding: Encoding::default(),
            trim_left: default_trim(),
            trim_right: default_trim(),
            buffer_capacity: default_buffer_capacity(),
            debug: false,
        }
    }
}

impl ScannerConfig {
    /// Parse a configuration from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigurationError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ConfigurationError::InvalidConfig(e.to_string()))?;

        serde_json::from_str(text).map_err(|e| ConfigurationError::InvalidConfig(e.to_string()))
    }

    /// Binary-mode configuration with everything else at defaults.
    pub fn binary() -> Self {
        Self {
            encoding: Encoding::Binary,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScannerConfig::default();
        assert_eq!(config.encoding, Encoding::Utf8);
        assert!(config.trim_left);
        assert!(config.trim_right);
        assert!(config.buffer_capacity > 0);
        assert!(!config.debug);
    }

    #[test]
    fn test_parse_config() {
        let json = br#"{"encoding": "binary", "trim_left": false, "buffer_capacity": 512}"#;
        let config = ScannerConfig::from_bytes(json).unwrap();
        assert_eq!(config.encoding, Encoding::Binary);
        assert!(!config.trim_left);
        assert!(config.trim_right); // untouched field keeps its default
        assert_eq!(config.buffer_capacity, 512);
    }

    #[test]
    fn test_parse_rejects_bad_json() {
        assert!(ScannerConfig::from_bytes(b"{encoding: nope").is_err());
    }

    #[test]
    fn test_encoding_from_str() {
        assert_eq!("utf-8".parse::<Encoding>().unwrap(), Encoding::Utf8);
        assert_eq!("UTF8".parse::<Encoding>().unwrap(), Encoding::Utf8);
        assert_eq!("raw".parse::<Encoding>().unwrap(), Encoding::Binary);
        assert!("latin-1".parse::<Encoding>().is_err());
    }
}
