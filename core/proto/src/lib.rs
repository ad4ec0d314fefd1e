// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Generated protobuf messages and gRPC stubs for the UPSF service.

pub mod v1 {
    #![allow(clippy::large_enum_variant)]
    tonic::include_proto!("upsf.v1");

    impl DerivedState {
        /// Every derived state, in wire order.
        pub const ALL: [DerivedState; 6] = [
            DerivedState::Unknown,
            DerivedState::Inactive,
            DerivedState::Active,
            DerivedState::Updating,
            DerivedState::Deleting,
            DerivedState::Deleted,
        ];
    }
}

pub use v1::upsf_service_client::UpsfServiceClient;
pub use v1::upsf_service_server::{UpsfService, UpsfServiceServer};
