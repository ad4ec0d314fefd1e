// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Async client of the UPSF service.
//!
//! [`UpsfClient`] wraps the generated gRPC stub with one generic operation
//! set over every [`Entity`], turning embedded result codes and empty
//! replies into [`ClientError`]s. [`subscription`] turns the server push
//! stream into typed [`Update`]s handed to a [`Subscriber`].

pub mod client;
pub mod entity;
pub mod errors;
pub mod subscription;

pub use client::UpsfClient;
pub use entity::{Entity, ItemKind, Operation};
pub use errors::ClientError;
pub use subscription::{Dispatcher, Subscriber, Subscription, SubscriptionEnd, Update};

pub use upsf_proto::v1 as proto;
