// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Failures while assembling the bridge settings or a channel from them.
#[derive(Error, Debug)]
pub enum ConfigError {
    // Endpoint
    #[error("no upsf endpoint configured")]
    MissingEndpoint,
    #[error("invalid upsf endpoint: {0}")]
    UriParse(#[from] http::uri::InvalidUri),

    // Configuration file
    #[error("configuration file {0} does not exist")]
    NotFound(String),
    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
