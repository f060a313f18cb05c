//! Environment-driven configuration for the admin binary.
use std::env;
use thiserror::Error;

use crate::stats::PossessionModel;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Settings needed to reach the stats database and score its rows.
#[derive(Clone, Debug, PartialEq)]
pub struct AdminConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub possession_model: PossessionModel,
}

impl AdminConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `DATABASE_URL` - Postgres connection string (required)
    /// - `COURTSTATS_MAX_CONNECTIONS` - Pool size (default: 5)
    /// - `COURTSTATS_FT_FACTOR` - Free-throw weight of the possession estimate (default: 0.44)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`AdminConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let max_connections =
            read::<u32>(&lookup, "COURTSTATS_MAX_CONNECTIONS")?.map_or(5, |size| size.max(1));

        let mut possession_model = PossessionModel::default();
        if let Some(factor) = read::<f64>(&lookup, "COURTSTATS_FT_FACTOR")? {
            if !(0.0..=1.0).contains(&factor) {
                return Err(ConfigError::Invalid {
                    key: "COURTSTATS_FT_FACTOR",
                    value: factor.to_string(),
                });
            }
            possession_model.free_throw_factor = factor;
        }

        Ok(Self {
            database_url,
            max_connections,
            possession_model,
        })
    }
}

fn read<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
