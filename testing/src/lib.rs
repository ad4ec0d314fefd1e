// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! In-memory UPSF service for tests.
//!
//! [`MockUpsf`] keeps every entity in ordered maps, answers the whole
//! `UpsfService` and replays a scripted sequence of updates to each
//! subscriber before streaming live changes. [`MockServer`] binds it to an
//! ephemeral localhost port.

pub mod mock;
pub mod server;

pub use mock::{MockUpsf, StreamEnd};
pub use server::MockServer;
