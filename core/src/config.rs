//! Client configuration.
//!
//! Read from the environment by hosts (`FACILITY_API_URL`,
//! `FACILITY_API_TOKEN`, `FACILITY_API_TIMEOUT_SECS`) or deserialized from
//! whatever config file the host already has.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FacilityError;

pub const URL_VAR: &str = "FACILITY_API_URL";
pub const TOKEN_VAR: &str = "FACILITY_API_TOKEN";
pub const TIMEOUT_VAR: &str = "FACILITY_API_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn from_env() -> Result<Self, FacilityError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FacilityError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_url = get(URL_VAR).ok_or_else(|| FacilityError::Config(format!("{URL_VAR} is not set")))?;
        let timeout_secs = match get(TIMEOUT_VAR) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(FacilityError::Config(format!(
                        "{TIMEOUT_VAR} must be a positive whole number, got {raw:?}"
                    )))
                }
            },
            None => default_timeout_secs(),
        };

        Ok(Self {
            base_url,
            token: get(TOKEN_VAR),
            timeout_secs,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
