// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Synchronous facade over the async client.
//!
//! Every call resolves its handle, locks the slot, converts the record into
//! a request, blocks on the bridge runtime for the reply and converts it
//! back. Nothing here touches raw pointers; `ffi` does that and flattens the
//! errors.

use std::sync::OnceLock;

use tracing::{debug, info, warn};

use crate::abi::{UpsfHandle, UpsfSessionContext, UpsfSessionContextSpec};
use crate::errors::BridgeError;
use crate::handle_table::HandleTable;
use crate::marshal::{AbiRecord, session_context_spec_from_abi};
use crate::runtime::get_runtime;
use upsf_client::{ClientError, Entity, Subscriber, SubscriptionEnd, UpsfClient, subscription};
use upsf_config::bridge::BridgeConfig;

static BRIDGE: OnceLock<Bridge> = OnceLock::new();

/// The process wide bridge, configured from the environment on first use.
pub fn global() -> &'static Bridge {
    BRIDGE.get_or_init(|| {
        let resolved = BridgeConfig::from_env();
        let config = resolved.as_ref().cloned().unwrap_or_default();

        if config.tracing.setup_tracing_subscriber() {
            debug!("tracing subscriber installed");
        }
        if let Err(e) = &resolved {
            warn!(error = %e, "invalid bridge configuration, using defaults");
        }

        info!(max_handles = config.max_handles, "upsf bridge initialised");
        Bridge::new(config)
    })
}

pub struct Bridge {
    config: BridgeConfig,
    table: HandleTable,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        let table = HandleTable::new(config.max_handles);
        Bridge { config, table }
    }

    pub fn table(&self) -> &HandleTable {
        &self.table
    }

    /// Opens a connection to `host:port`. The connection is lazy, so an
    /// unreachable service only shows up on the first call.
    pub fn open(&self, host: &str, port: i32) -> Result<UpsfHandle, BridgeError> {
        if host.is_empty() {
            return Err(BridgeError::InvalidArgument("empty host".to_string()));
        }
        let port = u16::try_from(port)
            .map_err(|_| BridgeError::InvalidArgument(format!("port {port} out of range")))?;

        let config = self.config.client.clone().with_host_port(host, port);
        let client = {
            let _guard = get_runtime().enter();
            UpsfClient::new(&config)?
        };

        let handle = self.table.open(client)?;
        info!(handle, endpoint = %config.endpoint, "upsf connection opened");
        Ok(handle)
    }

    /// Returns false if `handle` was not open.
    pub fn close(&self, handle: UpsfHandle) -> bool {
        self.table.close(handle)
    }

    pub fn create<R: AbiRecord>(&self, handle: UpsfHandle, record: &R) -> Result<R, BridgeError> {
        let slot = self.table.get(handle)?;
        let mut client = slot.client();

        let message = record.to_message()?;
        let reply = get_runtime().block_on(client.create(message))?;
        Ok(R::from_message(&reply)?)
    }

    pub fn update<R: AbiRecord>(&self, handle: UpsfHandle, record: &R) -> Result<R, BridgeError> {
        let slot = self.table.get(handle)?;
        let mut client = slot.client();

        let message = record.to_message()?;
        let reply = get_runtime().block_on(client.update(message))?;
        Ok(R::from_message(&reply)?)
    }

    /// Fetches the record named like `record`.
    pub fn get<R: AbiRecord>(&self, handle: UpsfHandle, record: &R) -> Result<R, BridgeError> {
        let slot = self.table.get(handle)?;
        let mut client = slot.client();

        let name = record.name().to_string_lossy();
        let reply = get_runtime().block_on(client.get::<R::Message>(&name))?;
        Ok(R::from_message(&reply)?)
    }

    /// Deletes the record named like `record`.
    pub fn delete<R: AbiRecord>(&self, handle: UpsfHandle, record: &R) -> Result<(), BridgeError> {
        let slot = self.table.get(handle)?;
        let mut client = slot.client();

        let name = record.name().to_string_lossy();
        get_runtime().block_on(client.delete::<R::Message>(&name))?;
        Ok(())
    }

    /// Lists every record, keeping at most `capacity` of them.
    ///
    /// A single record that does not fit its C layout fails the whole call
    /// with [`BridgeError::Marshal`]; the caller gets nothing rather than a
    /// list with silent gaps.
    pub fn list<R: AbiRecord>(
        &self,
        handle: UpsfHandle,
        capacity: usize,
    ) -> Result<Vec<R>, BridgeError> {
        let slot = self.table.get(handle)?;
        let mut client = slot.client();

        let items = get_runtime().block_on(client.list::<R::Message>(&[]))?;
        if items.len() > capacity {
            let kind = <R::Message as Entity>::KIND;
            warn!(
                handle,
                %kind,
                capacity,
                count = items.len(),
                "list result truncated"
            );
        }

        items
            .iter()
            .take(capacity)
            .map(|item| R::from_message(item).map_err(BridgeError::from))
            .collect()
    }

    /// Finds the session context matching `spec`.
    pub fn lookup(
        &self,
        handle: UpsfHandle,
        spec: &UpsfSessionContextSpec,
    ) -> Result<UpsfSessionContext, BridgeError> {
        let slot = self.table.get(handle)?;
        let mut client = slot.client();

        let request = session_context_spec_from_abi(spec);
        let reply = get_runtime().block_on(client.lookup(request))?;
        Ok(UpsfSessionContext::from_message(&reply)?)
    }

    /// Streams every change on `handle` into `subscriber` on the calling
    /// thread.
    ///
    /// One subscription per handle. The slot lock is only held while the
    /// stream opens, so other calls on the handle, including from inside
    /// the subscriber, keep working. Closing the handle ends the stream
    /// with [`BridgeError::Cancelled`], also while it is still opening.
    pub fn subscribe<S>(
        &self,
        handle: UpsfHandle,
        subscriber: &mut S,
    ) -> Result<SubscriptionEnd, BridgeError>
    where
        S: Subscriber + ?Sized,
    {
        let slot = self.table.get(handle)?;
        let _active = slot.begin_subscription()?;

        let cancel = slot.cancellation();
        let mut stream = {
            let mut client = slot.client();
            get_runtime().block_on(async {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(BridgeError::Cancelled(handle)),
                    opened = client.subscribe(subscription::watch_all()) => {
                        opened.map_err(BridgeError::from)
                    }
                }
            })?
        };
        debug!(handle, "subscription started");

        loop {
            // the subscriber runs outside the runtime so it can call back
            // into the bridge
            let next = get_runtime()
                .block_on(stream.next_until(cancel))
                .map_err(|e| match e {
                    ClientError::Cancelled => BridgeError::Cancelled(handle),
                    e => BridgeError::Client(e),
                })?;

            let Some(update) = next else {
                debug!(handle, "subscription closed by the service");
                return Ok(SubscriptionEnd::Closed);
            };

            if !subscriber.on_update(&update) {
                debug!(handle, kind = %update.kind(), "subscription stopped by the caller");
                return Ok(SubscriptionEnd::Stopped);
            }
        }
    }
}
