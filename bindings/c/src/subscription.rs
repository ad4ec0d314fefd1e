// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! C function pointers seen as a [`Dispatcher`].
//!
//! Only the callbacks the caller passed get a handler, so updates of the
//! other kinds fall through the dispatcher and the stream goes on. A payload
//! that cannot be laid out in its record is skipped with a warning.

use std::ffi::{c_int, c_void};

use tracing::warn;

use crate::abi::{
    UpsfNetworkConnection, UpsfServiceGateway, UpsfServiceGatewayUserPlane, UpsfSessionContext,
    UpsfShard, UpsfTrafficSteeringFunction,
};
use crate::marshal::AbiRecord;
use upsf_client::{Dispatcher, ItemKind, Update};

/// Called once per update of its kind. Non-zero continues, zero stops.
pub type UpsfCallback<R> = extern "C" fn(*mut R, *mut c_void) -> c_int;

pub type UpsfShardCb = UpsfCallback<UpsfShard>;
pub type UpsfSessionContextCb = UpsfCallback<UpsfSessionContext>;
pub type UpsfNetworkConnectionCb = UpsfCallback<UpsfNetworkConnection>;
pub type UpsfServiceGatewayUserPlaneCb = UpsfCallback<UpsfServiceGatewayUserPlane>;
pub type UpsfTrafficSteeringFunctionCb = UpsfCallback<UpsfTrafficSteeringFunction>;
pub type UpsfServiceGatewayCb = UpsfCallback<UpsfServiceGateway>;

/// The callbacks given to `upsf_subscribe`, plus the caller's context.
#[derive(Clone, Copy)]
pub struct Callbacks {
    pub userdata: *mut c_void,
    pub shard: Option<UpsfShardCb>,
    pub session_context: Option<UpsfSessionContextCb>,
    pub network_connection: Option<UpsfNetworkConnectionCb>,
    pub user_plane: Option<UpsfServiceGatewayUserPlaneCb>,
    pub traffic_steering_function: Option<UpsfTrafficSteeringFunctionCb>,
    pub service_gateway: Option<UpsfServiceGatewayCb>,
}

impl Default for Callbacks {
    fn default() -> Self {
        Callbacks {
            userdata: std::ptr::null_mut(),
            shard: None,
            session_context: None,
            network_connection: None,
            user_plane: None,
            traffic_steering_function: None,
            service_gateway: None,
        }
    }
}

impl Callbacks {
    pub fn is_empty(&self) -> bool {
        self.dispatcher().is_empty()
    }

    pub fn dispatcher(&self) -> Dispatcher<'static> {
        let mut dispatcher = Dispatcher::new();
        let userdata = self.userdata;

        if let Some(cb) = self.shard {
            dispatcher.register(ItemKind::Shard, handler(cb, userdata));
        }
        if let Some(cb) = self.session_context {
            dispatcher.register(ItemKind::SessionContext, handler(cb, userdata));
        }
        if let Some(cb) = self.network_connection {
            dispatcher.register(ItemKind::NetworkConnection, handler(cb, userdata));
        }
        if let Some(cb) = self.user_plane {
            dispatcher.register(ItemKind::ServiceGatewayUserPlane, handler(cb, userdata));
        }
        if let Some(cb) = self.traffic_steering_function {
            dispatcher.register(ItemKind::TrafficSteeringFunction, handler(cb, userdata));
        }
        if let Some(cb) = self.service_gateway {
            dispatcher.register(ItemKind::ServiceGateway, handler(cb, userdata));
        }

        dispatcher
    }
}

fn handler<R: AbiRecord>(
    cb: UpsfCallback<R>,
    userdata: *mut c_void,
) -> impl FnMut(&Update) -> bool + 'static {
    move |update| {
        let Some(message) = update.payload::<R::Message>() else {
            return true;
        };

        match R::from_message(message) {
            Ok(mut record) => cb(&mut record, userdata) != 0,
            Err(e) => {
                warn!(
                    kind = %update.kind(),
                    name = update.name(),
                    error = %e,
                    "skipping update that does not fit its record"
                );
                true
            }
        }
    }
}
