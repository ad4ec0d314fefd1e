// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Exported C functions.
//!
//! Each entry point catches panics, validates its pointers and forwards to
//! the process wide [`Bridge`](crate::bridge::Bridge). Every failure is
//! logged with its cause and flattened to NULL or -1; caller buffers are
//! only written on success.

use std::ffi::{CStr, c_char, c_int, c_void};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr;

use tracing::{debug, error};

use crate::abi::{
    UPSF_INVALID_HANDLE, UpsfHandle, UpsfNetworkConnection, UpsfServiceGateway,
    UpsfServiceGatewayUserPlane, UpsfSessionContext, UpsfShard, UpsfTrafficSteeringFunction,
};
use crate::bridge;
use crate::dump::{derived_state_name, maintenance_req_name, mbb_state_name, write_dump};
use crate::errors::BridgeError;
use crate::subscription::{
    Callbacks, UpsfNetworkConnectionCb, UpsfServiceGatewayCb, UpsfServiceGatewayUserPlaneCb,
    UpsfSessionContextCb, UpsfShardCb, UpsfTrafficSteeringFunctionCb,
};

const FAILURE: c_int = -1;

/// Runs `f`, turning a panic into [`BridgeError::Panic`] and logging any
/// error. Not-found and cancellation are logged at debug level.
fn guarded<T>(
    op: &'static str,
    handle: UpsfHandle,
    f: impl FnOnce() -> Result<T, BridgeError>,
) -> Option<T> {
    let result = catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| Err(BridgeError::Panic));

    match result {
        Ok(value) => Some(value),
        Err(e) if e.is_expected() => {
            debug!(op, handle, error = %e, "upsf call failed");
            None
        }
        Err(e) => {
            error!(op, handle, error = %e, "upsf call failed");
            None
        }
    }
}

fn status(done: Option<()>) -> c_int {
    match done {
        Some(()) => 0,
        None => FAILURE,
    }
}

/// Opens a connection to `host:port`.
///
/// Returns a handle, or -1 when the pool is exhausted or the arguments are
/// invalid. The connection is established lazily by the first call.
///
/// # Safety
/// `host` must be NULL or point to a NUL terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn upsf_open(host: *const c_char, port: c_int) -> UpsfHandle {
    guarded("open", UPSF_INVALID_HANDLE, || {
        if host.is_null() {
            return Err(BridgeError::NullPointer("host"));
        }
        // SAFETY: non-null and NUL terminated per the contract above.
        let host = unsafe { CStr::from_ptr(host) }
            .to_str()
            .map_err(|_| BridgeError::InvalidArgument("host is not UTF-8".to_string()))?;

        bridge::global().open(host, port)
    })
    .unwrap_or(UPSF_INVALID_HANDLE)
}

/// Closes `handle`. Returns 0 when it was open, 1 when it was already
/// closed. An active subscription on the handle ends with -1.
#[unsafe(no_mangle)]
pub extern "C" fn upsf_close(handle: UpsfHandle) -> c_int {
    guarded("close", handle, || Ok(bridge::global().close(handle)))
        .map(|closed| if closed { 0 } else { 1 })
        .unwrap_or(FAILURE)
}

macro_rules! entity_functions {
    (
        $record:ty, $label:literal,
        create: $create:ident,
        update: $update:ident,
        get: $get:ident,
        delete: $delete:ident,
        list: $list:ident,
        dump: $dump:ident $(,)?
    ) => {
        #[doc = concat!("Creates the ", $label, " described by `*record` and overwrites it with the stored one.")]
        ///
        /// Returns `record`, or NULL on failure.
        ///
        /// # Safety
        /// `record` must be NULL or point to a valid, writable record.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $create(handle: UpsfHandle, record: *mut $record) -> *mut $record {
            let done = guarded(concat!("create ", $label), handle, || {
                // SAFETY: see the function contract.
                let slot = unsafe { record.as_mut() }.ok_or(BridgeError::NullPointer("record"))?;
                *slot = bridge::global().create(handle, slot)?;
                Ok(())
            });
            done.map_or(ptr::null_mut(), |()| record)
        }

        #[doc = concat!("Updates the ", $label, " named in `*record` and overwrites it with the stored one.")]
        ///
        /// Returns `record`, or NULL on failure.
        ///
        /// # Safety
        /// `record` must be NULL or point to a valid, writable record.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $update(handle: UpsfHandle, record: *mut $record) -> *mut $record {
            let done = guarded(concat!("update ", $label), handle, || {
                // SAFETY: see the function contract.
                let slot = unsafe { record.as_mut() }.ok_or(BridgeError::NullPointer("record"))?;
                *slot = bridge::global().update(handle, slot)?;
                Ok(())
            });
            done.map_or(ptr::null_mut(), |()| record)
        }

        #[doc = concat!("Fetches the ", $label, " named in `*record` into `*record`.")]
        ///
        /// Returns 0, or -1 on failure, including when it does not exist.
        ///
        /// # Safety
        /// `record` must be NULL or point to a valid, writable record.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $get(handle: UpsfHandle, record: *mut $record) -> c_int {
            status(guarded(concat!("get ", $label), handle, || {
                // SAFETY: see the function contract.
                let slot = unsafe { record.as_mut() }.ok_or(BridgeError::NullPointer("record"))?;
                *slot = bridge::global().get(handle, slot)?;
                Ok(())
            }))
        }

        #[doc = concat!("Deletes the ", $label, " named in `*record`. Returns 0, or -1 on failure.")]
        ///
        /// # Safety
        /// `record` must be NULL or point to a valid record.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $delete(handle: UpsfHandle, record: *const $record) -> c_int {
            status(guarded(concat!("delete ", $label), handle, || {
                // SAFETY: see the function contract.
                let slot = unsafe { record.as_ref() }.ok_or(BridgeError::NullPointer("record"))?;
                bridge::global().delete(handle, slot)
            }))
        }

        #[doc = concat!("Copies up to `capacity` ", $label, " records into `records`.")]
        ///
        /// Returns the number copied, or -1 on failure.
        ///
        /// # Safety
        /// `records` must be NULL or point to `capacity` writable records.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $list(
            handle: UpsfHandle,
            records: *mut $record,
            capacity: usize,
        ) -> c_int {
            guarded(concat!("list ", $label), handle, || {
                if records.is_null() {
                    return Err(BridgeError::NullPointer("records"));
                }
                let capacity = capacity.min(c_int::MAX as usize);
                let items = bridge::global().list::<$record>(handle, capacity)?;

                // SAFETY: the caller provides `capacity` records and at most
                // that many were returned.
                let out = unsafe { std::slice::from_raw_parts_mut(records, items.len()) };
                out.copy_from_slice(&items);
                Ok(items.len() as c_int)
            })
            .unwrap_or(FAILURE)
        }

        #[doc = concat!("Renders `*record` into `buf` as one NUL terminated line.")]
        ///
        /// Returns `buf`, or NULL when a pointer is NULL or `size` is 0.
        ///
        /// # Safety
        /// `buf` must point to `size` writable bytes and `record` to a valid
        /// record.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $dump(
            buf: *mut c_char,
            size: usize,
            record: *const $record,
        ) -> *mut c_char {
            let done = guarded(concat!("dump ", $label), UPSF_INVALID_HANDLE, || {
                if buf.is_null() || size == 0 {
                    return Err(BridgeError::NullPointer("buf"));
                }
                // SAFETY: see the function contract.
                let record = unsafe { record.as_ref() }.ok_or(BridgeError::NullPointer("record"))?;
                // SAFETY: non-null and `size` bytes long per the contract.
                let out = unsafe { std::slice::from_raw_parts_mut(buf.cast::<u8>(), size) };
                write_dump(out, record);
                Ok(())
            });
            done.map_or(ptr::null_mut(), |()| buf)
        }
    };
}

entity_functions!(
    UpsfServiceGateway, "service gateway",
    create: upsf_create_service_gateway,
    update: upsf_update_service_gateway,
    get: upsf_get_service_gateway,
    delete: upsf_delete_service_gateway,
    list: upsf_list_service_gateways,
    dump: upsf_dump_service_gateway,
);

entity_functions!(
    UpsfServiceGatewayUserPlane, "service gateway user plane",
    create: upsf_create_service_gateway_user_plane,
    update: upsf_update_service_gateway_user_plane,
    get: upsf_get_service_gateway_user_plane,
    delete: upsf_delete_service_gateway_user_plane,
    list: upsf_list_service_gateway_user_planes,
    dump: upsf_dump_service_gateway_user_plane,
);

entity_functions!(
    UpsfTrafficSteeringFunction, "traffic steering function",
    create: upsf_create_traffic_steering_function,
    update: upsf_update_traffic_steering_function,
    get: upsf_get_traffic_steering_function,
    delete: upsf_delete_traffic_steering_function,
    list: upsf_list_traffic_steering_functions,
    dump: upsf_dump_traffic_steering_function,
);

entity_functions!(
    UpsfNetworkConnection, "network connection",
    create: upsf_create_network_connection,
    update: upsf_update_network_connection,
    get: upsf_get_network_connection,
    delete: upsf_delete_network_connection,
    list: upsf_list_network_connections,
    dump: upsf_dump_network_connection,
);

entity_functions!(
    UpsfShard, "shard",
    create: upsf_create_shard,
    update: upsf_update_shard,
    get: upsf_get_shard,
    delete: upsf_delete_shard,
    list: upsf_list_shards,
    dump: upsf_dump_shard,
);

entity_functions!(
    UpsfSessionContext, "session context",
    create: upsf_create_session_context,
    update: upsf_update_session_context,
    get: upsf_get_session_context,
    delete: upsf_delete_session_context,
    list: upsf_list_session_contexts,
    dump: upsf_dump_session_context,
);

/// Finds the session context whose policy matches `record->spec` and
/// overwrites `*record` with it.
///
/// Returns `record`, or NULL when nothing matches or on failure.
///
/// # Safety
/// `record` must be NULL or point to a valid, writable record.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn upsf_lookup(
    handle: UpsfHandle,
    record: *mut UpsfSessionContext,
) -> *mut UpsfSessionContext {
    let done = guarded("lookup", handle, || {
        // SAFETY: see the function contract.
        let slot = unsafe { record.as_mut() }.ok_or(BridgeError::NullPointer("record"))?;
        *slot = bridge::global().lookup(handle, &slot.spec)?;
        Ok(())
    });
    done.map_or(ptr::null_mut(), |()| record)
}

/// Streams every change on `handle` into the callbacks, on the calling
/// thread, until a callback returns 0 or the stream ends.
///
/// NULL callbacks skip their kind. Returns 0 after a stop or a clean end,
/// -1 on a stream error, when the handle is closed meanwhile, or when the
/// handle already has a subscription.
///
/// # Safety
/// The callbacks must be safe to call with a record pointer valid for the
/// duration of the call and `userdata`.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn upsf_subscribe(
    handle: UpsfHandle,
    userdata: *mut c_void,
    shard_cb: Option<UpsfShardCb>,
    session_context_cb: Option<UpsfSessionContextCb>,
    network_connection_cb: Option<UpsfNetworkConnectionCb>,
    service_gateway_user_plane_cb: Option<UpsfServiceGatewayUserPlaneCb>,
    traffic_steering_function_cb: Option<UpsfTrafficSteeringFunctionCb>,
    service_gateway_cb: Option<UpsfServiceGatewayCb>,
) -> c_int {
    let callbacks = Callbacks {
        userdata,
        shard: shard_cb,
        session_context: session_context_cb,
        network_connection: network_connection_cb,
        user_plane: service_gateway_user_plane_cb,
        traffic_steering_function: traffic_steering_function_cb,
        service_gateway: service_gateway_cb,
    };

    status(guarded("subscribe", handle, || {
        let mut dispatcher = callbacks.dispatcher();
        let end = bridge::global().subscribe(handle, &mut dispatcher)?;
        debug!(handle, ?end, "subscription ended");
        Ok(())
    }))
}

/// Name of a derived state, `"invalid"` when out of range.
#[unsafe(no_mangle)]
pub extern "C" fn upsf_derived_state_to_name(derived_state: c_int) -> *const c_char {
    derived_state_name(derived_state).as_ptr()
}

/// Name of a maintenance request, `"invalid"` when out of range.
#[unsafe(no_mangle)]
pub extern "C" fn upsf_maintenance_req_to_name(maintenance_req: c_int) -> *const c_char {
    maintenance_req_name(maintenance_req).as_ptr()
}

/// Name of a make-before-break state, `"invalid"` when out of range.
#[unsafe(no_mangle)]
pub extern "C" fn upsf_mbb_state_to_name(mbb_state: c_int) -> *const c_char {
    mbb_state_name(mbb_state).as_ptr()
}
