// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

use crate::abi::UpsfHandle;
use crate::marshal::MarshalError;
use upsf_client::ClientError;

#[derive(Error, Debug)]
pub enum BridgeError {
    // Handle table
    #[error("handle pool exhausted ({capacity} handles in use)")]
    PoolExhausted { capacity: usize },
    #[error("invalid handle {0}")]
    InvalidHandle(UpsfHandle),

    // Caller input
    #[error("null pointer passed for {0}")]
    NullPointer(&'static str),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // Subscription
    #[error("handle {0} already has an active subscription")]
    SubscriptionActive(UpsfHandle),
    #[error("subscription on handle {0} cancelled by close")]
    Cancelled(UpsfHandle),

    // Lower layers
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("marshalling error: {0}")]
    Marshal(#[from] MarshalError),

    #[error("panic caught at the C boundary")]
    Panic,
}

impl BridgeError {
    /// Outcomes callers provoke on purpose, logged below error level.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            BridgeError::Client(ClientError::NotFound { .. }) | BridgeError::Cancelled(_)
        )
    }
}
