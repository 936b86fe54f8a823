//! Engine configuration
//!
//! The operator identity and the per-deposit fee are fixed when the engine
//! is built. They can be given in code or loaded from an optional file
//! layered under `REMIT_`-prefixed environment variables.

use crate::{
    error::EscrowError,
    models::{Amount, Identity},
    EscrowResult,
};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix (`REMIT_OPERATOR`, `REMIT_FEE`)
pub const ENV_PREFIX: &str = "REMIT";

/// Fee charged when none is configured
pub const DEFAULT_FEE: Amount = 1_000_000;

/// Configuration for the remittance engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Identity that accrues and withdraws fees
    pub operator: Identity,
    /// Fixed fee retained from every deposit
    #[serde(default = "default_fee")]
    pub fee: Amount,
}

fn default_fee() -> Amount {
    DEFAULT_FEE
}

impl EngineConfig {
    pub fn new(operator: Identity, fee: Amount) -> Self {
        Self { operator, fee }
    }

    /// Load from an optional config file, overridden by environment variables
    pub fn load(path: Option<&Path>) -> EscrowResult<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Like [`EngineConfig::load`] with a custom environment prefix
    pub fn load_with_prefix(path: Option<&Path>, prefix: &str) -> EscrowResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        // Values stay strings: hex identities must not be coerced into numbers.
        let source = builder
            .add_source(Environment::with_prefix(prefix))
            .build()?;
        Self::from_source(source)
    }

    /// Build from an already assembled configuration source
    pub fn from_source(source: Config) -> EscrowResult<Self> {
        let operator = match source.get_string("operator") {
            Ok(raw) => raw
                .parse::<Identity>()
                .map_err(|e| EscrowError::config(format!("operator {raw:?}: {e}")))?,
            Err(ConfigError::NotFound(_)) => {
                return Err(EscrowError::config("operator identity is not configured"))
            }
            Err(err) => return Err(err.into()),
        };

        let fee = match source.get_string("fee") {
            Ok(raw) => raw
                .trim()
                .parse::<Amount>()
                .map_err(|e| EscrowError::config(format!("fee {raw:?}: {e}")))?,
            Err(ConfigError::NotFound(_)) => DEFAULT_FEE,
            Err(err) => return Err(err.into()),
        };

        Ok(Self { operator, fee })
    }
}
