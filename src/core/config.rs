//! Store configuration.
//!
//! Merges built-in defaults, `docstore.toml` and `DOCSTORE_*` environment
//! variables with Figment, later sources winning.

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use super::error::{Error, Result};
use crate::search::embedding::EMBEDDING_DIM;

pub const CONFIG_FILE: &str = "docstore.toml";
const ENV_PREFIX: &str = "DOCSTORE_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database file
    pub db_path: PathBuf,
    /// Embedding dimension the store is pinned to
    pub dimension: usize,
    /// Result count used when a caller asks for top-K without a limit
    pub default_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(".docstore/docstore.db"),
            dimension: EMBEDDING_DIM,
            default_limit: 5,
        }
    }
}

impl Config {
    /// Load from `docstore.toml` in the working directory plus environment
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(config_file: &Path) -> Result<Self> {
        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::Config("dimension must be greater than 0".into()));
        }
        if self.default_limit == 0 {
            return Err(Error::Config("default_limit must be greater than 0".into()));
        }
        Ok(())
    }
}
