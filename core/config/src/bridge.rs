// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Process-wide settings of the C bridge.
//!
//! The bridge has no init call at the ABI, so the configuration is resolved
//! once from an optional YAML file named by `UPSF_CONFIG` and a handful of
//! environment overrides.

use std::fs;
use std::io::ErrorKind;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::component::configuration::Configuration;
use crate::grpc::client::ClientConfig;
use crate::grpc::errors::ConfigError;
use upsf_tracing::TracingConfiguration;

/// Path of an optional YAML configuration file.
pub const CONFIG_ENV: &str = "UPSF_CONFIG";
/// Overrides the size of the handle pool.
pub const MAX_HANDLES_ENV: &str = "UPSF_MAX_HANDLES";
/// Overrides the tracing log level.
pub const LOG_LEVEL_ENV: &str = "UPSF_LOG_LEVEL";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct BridgeConfig {
    /// maximum number of handles open at the same time
    #[serde(default = "default_max_handles")]
    pub max_handles: usize,

    /// transport settings applied to every handle; the endpoint is
    /// replaced by the host and port given to open
    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub tracing: TracingConfiguration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            max_handles: default_max_handles(),
            client: ClientConfig::default(),
            tracing: TracingConfiguration::default(),
        }
    }
}

fn default_max_handles() -> usize {
    128
}

impl Configuration for BridgeConfig {
    type Error = ConfigError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.max_handles == 0 || self.max_handles > i32::MAX as usize {
            return Err(ConfigError::Invalid(format!(
                "max_handles must be in 1..={}, got {}",
                i32::MAX,
                self.max_handles
            )));
        }

        Ok(())
    }
}

impl BridgeConfig {
    pub fn with_max_handles(self, max_handles: usize) -> Self {
        BridgeConfig {
            max_handles,
            ..self
        }
    }

    pub fn with_client(self, client: ClientConfig) -> Self {
        BridgeConfig { client, ..self }
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = serde_yaml::from_str(yaml)?;
        config.validated()
    }

    /// Loads a YAML configuration file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::NotFound(path.to_string()),
            _ => ConfigError::Io(e),
        })?;

        Self::from_yaml(&content)
    }

    /// Resolves the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(|key| std::env::var(key).ok())
    }

    /// Resolves the configuration using `lookup` to read variables.
    pub fn resolve<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = match lookup(CONFIG_ENV) {
            Some(path) => {
                debug!(%path, "loading bridge configuration file");
                Self::from_file(&path)?
            }
            None => Self::default(),
        };

        config.with_overrides(lookup)
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(MAX_HANDLES_ENV) {
            self.max_handles = value.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{} is not a number: {}", MAX_HANDLES_ENV, value))
            })?;
        }

        if let Some(level) = lookup(LOG_LEVEL_ENV) {
            self.tracing = self.tracing.with_log_level(level);
        }

        self.validated()
    }
}
