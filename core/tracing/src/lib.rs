// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Log output of the UPSF bridge.
//!
//! The bridge runs as a library inside someone else's process, so the
//! subscriber installed here is strictly opt-in: it only goes live when no
//! global subscriber exists yet.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TracingConfiguration {
    /// trace, debug, info, warn or error; anything else reads as info
    log_level: String,

    thread_names: bool,

    thread_ids: bool,

    /// extra directives, e.g. "upsf=debug,h2=warn"
    directives: String,
}

impl Default for TracingConfiguration {
    fn default() -> Self {
        TracingConfiguration {
            log_level: "info".to_string(),
            thread_names: true,
            thread_ids: false,
            directives: String::new(),
        }
    }
}

impl TracingConfiguration {
    pub fn with_log_level(mut self, log_level: String) -> Self {
        self.log_level = log_level;
        self
    }

    pub fn with_thread_names(mut self, enabled: bool) -> Self {
        self.thread_names = enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.thread_ids = enabled;
        self
    }

    pub fn with_directives(mut self, directives: String) -> Self {
        self.directives = directives;
        self
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn directives(&self) -> &str {
        &self.directives
    }

    fn level(&self) -> Level {
        Level::from_str(self.log_level.trim()).unwrap_or(Level::INFO)
    }

    /// Level filter with the extra directives layered on top. Directives
    /// that fail to parse are dropped.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(self.level()).into())
            .parse_lossy(&self.directives)
    }

    /// Installs a stdout `fmt` subscriber. Returns false, leaving the host's
    /// subscriber alone, if one is already set.
    pub fn setup_tracing_subscriber(&self) -> bool {
        tracing_subscriber::fmt()
            .with_env_filter(self.env_filter())
            .with_thread_names(self.thread_names)
            .with_thread_ids(self.thread_ids)
            .try_init()
            .is_ok()
    }
}
