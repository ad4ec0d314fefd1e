// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! C interface of the UPSF client.
//!
//! Callers open integer handles, move entities in and out through the fixed
//! layout records of [`abi`] and subscribe to changes with plain function
//! pointers. The exported functions live in [`ffi`]; [`bridge::Bridge`] is
//! the same surface with typed errors, for Rust callers and tests.

pub mod abi;
pub mod bridge;
pub mod dump;
pub mod errors;
pub mod ffi;
pub mod handle_table;
pub mod marshal;
pub mod runtime;
pub mod subscription;

pub use bridge::Bridge;
pub use errors::BridgeError;
pub use marshal::{AbiRecord, MarshalError};
