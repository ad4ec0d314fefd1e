// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, MutexGuard, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::abi::UpsfHandle;
use crate::errors::BridgeError;
use upsf_client::UpsfClient;

/// One open connection.
///
/// The table owns the entry; operations in flight hold an `Arc` and finish
/// even if the handle is closed meanwhile.
pub struct Slot {
    handle: UpsfHandle,
    client: Mutex<UpsfClient>,
    subscribed: AtomicBool,
    cancel: CancellationToken,
}

impl Slot {
    fn new(handle: UpsfHandle, client: UpsfClient) -> Self {
        Slot {
            handle,
            client: Mutex::new(client),
            subscribed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    /// Serializes request/response calls on this handle.
    pub fn client(&self) -> MutexGuard<'_, UpsfClient> {
        self.client.lock()
    }

    /// Fires when the handle is closed.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Marks the slot as streaming until the returned guard drops.
    pub fn begin_subscription(&self) -> Result<ActiveSubscription<'_>, BridgeError> {
        self.subscribed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| BridgeError::SubscriptionActive(self.handle))?;
        Ok(ActiveSubscription { slot: self })
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::Acquire)
    }
}

pub struct ActiveSubscription<'a> {
    slot: &'a Slot,
}

impl Drop for ActiveSubscription<'_> {
    fn drop(&mut self) {
        self.slot.subscribed.store(false, Ordering::Release);
    }
}

/// Small integer handles mapped to connection slots.
///
/// Handles are allocated lowest-free-first in `0..capacity` and reused
/// only after close.
pub struct HandleTable {
    capacity: usize,
    slots: RwLock<BTreeMap<UpsfHandle, Arc<Slot>>>,
}

impl HandleTable {
    pub fn new(capacity: usize) -> Self {
        HandleTable {
            capacity,
            slots: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Registers `client` under the lowest unused handle.
    pub fn open(&self, client: UpsfClient) -> Result<UpsfHandle, BridgeError> {
        let mut slots = self.slots.write();

        let limit = UpsfHandle::try_from(self.capacity).unwrap_or(UpsfHandle::MAX);
        let handle = (0..limit)
            .find(|h| !slots.contains_key(h))
            .ok_or(BridgeError::PoolExhausted {
                capacity: self.capacity,
            })?;

        slots.insert(handle, Arc::new(Slot::new(handle, client)));
        debug!(handle, open = slots.len(), "handle opened");
        Ok(handle)
    }

    /// Removes `handle`, cancelling any subscription on it. Returns false
    /// if it was not open.
    pub fn close(&self, handle: UpsfHandle) -> bool {
        let removed = self.slots.write().remove(&handle);
        match removed {
            Some(slot) => {
                slot.cancel.cancel();
                debug!(handle, "handle closed");
                true
            }
            None => false,
        }
    }

    pub fn get(&self, handle: UpsfHandle) -> Result<Arc<Slot>, BridgeError> {
        self.slots
            .read()
            .get(&handle)
            .cloned()
            .ok_or(BridgeError::InvalidHandle(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::get_runtime;
    use upsf_config::grpc::client::ClientConfig;

    fn client() -> UpsfClient {
        let _guard = get_runtime().enter();
        let config = ClientConfig::default().with_host_port("127.0.0.1", 50051);
        UpsfClient::new(&config).unwrap()
    }

    #[test]
    fn test_pool_exhaustion() {
        let table = HandleTable::new(3);
        let handles: Vec<_> = (0..3).map(|_| table.open(client()).unwrap()).collect();
        assert_eq!(handles, vec![0, 1, 2]);

        let err = table.open(client()).unwrap_err();
        assert!(matches!(err, BridgeError::PoolExhausted { capacity: 3 }));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_lowest_free_handle_is_reused() {
        let table = HandleTable::new(4);
        for _ in 0..3 {
            table.open(client()).unwrap();
        }

        assert!(table.close(1));
        assert_eq!(table.open(client()).unwrap(), 1);
        assert_eq!(table.open(client()).unwrap(), 3);
    }

    #[test]
    fn test_double_close() {
        let table = HandleTable::new(2);
        let handle = table.open(client()).unwrap();
        assert!(table.close(handle));
        assert!(!table.close(handle));
        assert!(matches!(
            table.get(handle),
            Err(BridgeError::InvalidHandle(h)) if h == handle
        ));
    }

    #[test]
    fn test_close_cancels_and_outlives() {
        let table = HandleTable::new(1);
        let handle = table.open(client()).unwrap();
        let slot = table.get(handle).unwrap();

        assert!(table.close(handle));
        // the slot stays usable for whoever still holds it
        assert!(slot.cancellation().is_cancelled());
        assert_eq!(slot.client().endpoint(), "http://127.0.0.1:50051");
    }

    #[test]
    fn test_single_subscription_per_slot() {
        let table = HandleTable::new(1);
        let slot = table.get(table.open(client()).unwrap()).unwrap();

        let active = slot.begin_subscription().unwrap();
        assert!(slot.is_subscribed());
        assert!(matches!(
            slot.begin_subscription(),
            Err(BridgeError::SubscriptionActive(0))
        ));

        drop(active);
        assert!(!slot.is_subscribed());
        assert!(slot.begin_subscription().is_ok());
    }
}
