// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use duration_str::deserialize_duration;
use serde::{Deserialize, Serialize};
use tonic::transport::{Channel, Endpoint, Uri};
use tracing::debug;

use super::errors::ConfigError;
use crate::component::configuration::Configuration;

const PING_INTERVAL: Duration = Duration::from_secs(60);
const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP/2 ping settings for the UPSF connection.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct Http2Keepalive {
    #[serde(deserialize_with = "deserialize_duration")]
    pub interval: Duration,

    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,

    /// Keep pinging while no request or stream is in flight.
    pub while_idle: bool,
}

impl Default for Http2Keepalive {
    fn default() -> Self {
        Self {
            interval: PING_INTERVAL,
            timeout: PING_TIMEOUT,
            while_idle: false,
        }
    }
}

/// Transport settings for one UPSF connection.
///
/// `endpoint` is an absolute URI such as `http://upsf.local:50051`. Zero
/// durations disable the corresponding timeout.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: String,

    #[serde(deserialize_with = "deserialize_duration")]
    pub connect_timeout: Duration,

    #[serde(deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,

    pub keepalive: Option<Http2Keepalive>,

    /// Request buffer of the channel worker.
    pub buffer_size: Option<usize>,
}

impl fmt::Display for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.endpoint)?;
        if !self.connect_timeout.is_zero() {
            write!(f, " connect_timeout={:?}", self.connect_timeout)?;
        }
        if !self.request_timeout.is_zero() {
            write!(f, " request_timeout={:?}", self.request_timeout)?;
        }
        if let Some(keepalive) = &self.keepalive {
            write!(f, " keepalive={:?}/{:?}", keepalive.interval, keepalive.timeout)?;
        }
        Ok(())
    }
}

impl Configuration for ClientConfig {
    type Error = ConfigError;

    fn validate(&self) -> Result<(), Self::Error> {
        self.uri().map(|_| ())
    }
}

impl ClientConfig {
    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_owned(),
            ..Self::default()
        }
    }

    /// Points the configuration at `host:port` over plain http, keeping every
    /// other setting. IPv6 literals get brackets.
    pub fn with_host_port(mut self, host: &str, port: u16) -> Self {
        self.endpoint = match host.contains(':') && !host.starts_with('[') {
            true => format!("http://[{host}]:{port}"),
            false => format!("http://{host}:{port}"),
        };
        self
    }

    pub fn with_keepalive(mut self, keepalive: Http2Keepalive) -> Self {
        self.keepalive = Some(keepalive);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = Some(size);
        self
    }

    /// Builds a channel that dials on its first request.
    ///
    /// Must run inside a Tokio runtime: the channel worker is spawned there.
    pub fn to_channel_lazy(&self) -> Result<Channel, ConfigError> {
        let endpoint = self.endpoint_builder()?;
        debug!(config = %self, "opening lazy upsf channel");
        Ok(endpoint.connect_lazy())
    }

    fn uri(&self) -> Result<Uri, ConfigError> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        Ok(Uri::from_str(&self.endpoint)?)
    }

    fn endpoint_builder(&self) -> Result<Endpoint, ConfigError> {
        let mut endpoint = Channel::builder(self.uri()?);

        if let Some(size) = self.buffer_size {
            endpoint = endpoint.buffer_size(size);
        }
        if let Some(keepalive) = &self.keepalive {
            endpoint = endpoint
                .http2_keep_alive_interval(keepalive.interval)
                .keep_alive_timeout(keepalive.timeout)
                .keep_alive_while_idle(keepalive.while_idle);
        }
        if !self.connect_timeout.is_zero() {
            endpoint = endpoint.connect_timeout(self.connect_timeout);
        }
        if !self.request_timeout.is_zero() {
            endpoint = endpoint.timeout(self.request_timeout);
        }

        Ok(endpoint)
    }
}
