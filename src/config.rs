use crate::{Error, Result};
use std::env;

/// Default number of parameter rows sent to the database per batch chunk.
pub const DEFAULT_BATCH_CHUNK_SIZE: usize = 1000;

/// Connection and batching settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: Option<String>,
    /// Chunk size used by batches that do not set their own.
    pub batch_chunk_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            batch_chunk_size: DEFAULT_BATCH_CHUNK_SIZE,
        }
    }
}

impl Config {
    /// Reads `DATABASE_URL` and `SQLX_PLUS_BATCH_SIZE`, loading a `.env` file
    /// first when one exists.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            ..Self::default()
        };
        if let Some(size) = lookup("SQLX_PLUS_BATCH_SIZE") {
            config.batch_chunk_size = match size.trim().parse::<usize>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(Error::Config(format!(
                        "SQLX_PLUS_BATCH_SIZE must be a positive integer, got '{size}'"
                    )))
                }
            };
        }
        Ok(config)
    }
}
