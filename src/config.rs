//! Node options that affect how proofs are located

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Maintain a full transaction index, like `-txindex`. Without it, a
    /// block can only be found for transactions with unspent outputs.
    pub txindex: bool,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn with_txindex(mut self, txindex: bool) -> Self {
        self.txindex = txindex;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_defaults() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
        assert!(!Config::default().txindex);
    }

    #[test]
    fn test_txindex() {
        let config = Config::from_toml_str("txindex = true").unwrap();
        assert!(config.txindex);
        assert_eq!(Config::default().with_txindex(true), config);
    }

    #[test]
    fn test_unknown_and_mistyped_fields() {
        let err = Config::from_toml_str("tx_index = true").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(Config::from_toml_str("txindex = 1").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load("/nonexistent/merkle_block.toml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
