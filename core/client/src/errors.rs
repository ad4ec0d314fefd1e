// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;
use tonic::Status;

use crate::entity::{ItemKind, Operation};
use upsf_config::grpc::errors::ConfigError;

#[derive(Error, Debug)]
pub enum ClientError {
    // Configuration / setup
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    // Remote calls
    #[error("grpc error: {0}")]
    Transport(#[from] Status),
    #[error("{operation} {kind} rejected by the service with result {result}")]
    Rejected {
        operation: Operation,
        kind: ItemKind,
        result: i32,
    },
    #[error("{kind} '{name}' not found")]
    NotFound { kind: ItemKind, name: String },
    #[error("{operation} {kind} succeeded but the reply carries no record")]
    EmptyReply { operation: Operation, kind: ItemKind },

    // Subscription
    #[error("subscription cancelled")]
    Cancelled,
}
