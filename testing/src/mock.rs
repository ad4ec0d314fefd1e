// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tonic::{Code, Request, Response, Status};
use tracing::debug;

use upsf_proto::UpsfService;
use upsf_proto::v1::{
    DeleteReq, DeleteResp, DerivedState, GetReq, Item, ItemType, ListReq, MetaData,
    NetworkConnection, NetworkConnectionListResp, NetworkConnectionResp, ServiceGateway,
    ServiceGatewayListResp, ServiceGatewayResp, ServiceGatewayUserPlane,
    ServiceGatewayUserPlaneListResp, ServiceGatewayUserPlaneResp, SessionContext,
    SessionContextListResp, SessionContextResp, Shard, ShardListResp, ShardResp, SubscribeReq,
    TrafficSteeringFunction, TrafficSteeringFunctionListResp, TrafficSteeringFunctionResp,
    UpdateNetworkConnectionReq, UpdateServiceGatewayReq, UpdateServiceGatewayUserPlaneReq,
    UpdateSessionContextReq, UpdateShardReq, UpdateTrafficSteeringFunctionReq, item,
    session_context,
};

/// Result code for a missing item or an item that already exists.
pub const RESULT_CONFLICT: i32 = 1;

/// What a subscription stream does once the scripted updates are sent.
#[derive(Debug, Clone, Default)]
pub enum StreamEnd {
    /// Keep the stream open and forward live changes (watch mode).
    #[default]
    KeepOpen,
    /// Close the stream with an ok status.
    Close,
    /// Terminate the stream with the given status.
    Fail(Code, String),
}

type Store<T> = Mutex<BTreeMap<String, T>>;
type UpdateSender = mpsc::UnboundedSender<Result<Item, Status>>;

#[derive(Default)]
struct State {
    service_gateways: Store<ServiceGateway>,
    user_planes: Store<ServiceGatewayUserPlane>,
    traffic_steering_functions: Store<TrafficSteeringFunction>,
    network_connections: Store<NetworkConnection>,
    shards: Store<Shard>,
    session_contexts: Store<SessionContext>,

    script: Mutex<Vec<Item>>,
    stream_end: Mutex<StreamEnd>,
    subscribers: Mutex<Vec<UpdateSender>>,
    last_subscribe: Mutex<Option<SubscribeReq>>,
    subscribe_calls: AtomicUsize,
    forced_result: AtomicI32,

    paused: AtomicBool,
    resumed: Notify,
    create_requests: Mutex<Vec<String>>,
    omit_reply_items: AtomicBool,
}

/// An entity kept by the mock.
pub trait Stored: Clone + Send + Sync + 'static {
    fn name(&self) -> &str;
    fn into_item(self) -> Item;
    fn mark_deleted(&mut self);
    #[doc(hidden)]
    fn store(mock: &MockUpsf) -> &Store<Self>;
}

macro_rules! impl_stored {
    ($ty:ident, $field:ident) => {
        impl Stored for $ty {
            fn name(&self) -> &str {
                &self.name
            }

            fn into_item(self) -> Item {
                Item {
                    item: Some(item::Item::$ty(self)),
                }
            }

            fn mark_deleted(&mut self) {
                self.metadata
                    .get_or_insert_with(MetaData::default)
                    .derived_state = DerivedState::Deleted as i32;
            }

            fn store(mock: &MockUpsf) -> &Store<Self> {
                &mock.state.$field
            }
        }
    };
}

impl_stored!(ServiceGateway, service_gateways);
impl_stored!(ServiceGatewayUserPlane, user_planes);
impl_stored!(TrafficSteeringFunction, traffic_steering_functions);
impl_stored!(NetworkConnection, network_connections);
impl_stored!(Shard, shards);
impl_stored!(SessionContext, session_contexts);

fn item_type(item: &Item) -> ItemType {
    match &item.item {
        Some(item::Item::ServiceGateway(_)) => ItemType::ServiceGateway,
        Some(item::Item::ServiceGatewayUserPlane(_)) => ItemType::ServiceGatewayUserPlane,
        Some(item::Item::TrafficSteeringFunction(_)) => ItemType::TrafficSteeringFunction,
        Some(item::Item::NetworkConnection(_)) => ItemType::NetworkConnection,
        Some(item::Item::Shard(_)) => ItemType::Shard,
        Some(item::Item::SessionContext(_)) => ItemType::SessionContext,
        None => ItemType::Unspecified,
    }
}

/// In-memory UPSF service. Clones share the same state.
#[derive(Clone, Default)]
pub struct MockUpsf {
    state: Arc<State>,
}

impl MockUpsf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items sent, in order, at the start of every subscription. Items
    /// without payload are sent as well.
    pub fn with_script(self, items: Vec<Item>) -> Self {
        *self.state.script.lock() = items;
        self
    }

    pub fn with_stream_end(self, end: StreamEnd) -> Self {
        *self.state.stream_end.lock() = end;
        self
    }

    /// Every following call answers with `result` and changes nothing.
    /// Zero restores normal behaviour.
    pub fn reject_with(&self, result: i32) {
        self.state.forced_result.store(result, Ordering::SeqCst);
    }

    /// Stores `item` without notifying subscribers.
    pub fn insert<T: Stored>(&self, item: T) {
        T::store(self).lock().insert(item.name().to_string(), item);
    }

    pub fn get<T: Stored>(&self, name: &str) -> Option<T> {
        T::store(self).lock().get(name).cloned()
    }

    pub fn len<T: Stored>(&self) -> usize {
        T::store(self).lock().len()
    }

    /// Sends `item` to every open subscription.
    pub fn push_update(&self, item: Item) {
        self.state
            .subscribers
            .lock()
            .retain(|tx| tx.send(Ok(item.clone())).is_ok());
    }

    /// Ends every open subscription with an ok status.
    pub fn close_streams(&self) {
        self.state.subscribers.lock().clear();
    }

    /// Number of subscriptions still attached.
    pub fn active_subscriptions(&self) -> usize {
        let mut subscribers = self.state.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    /// Parks every create and subscribe call inside the service until
    /// [`MockUpsf::resume`].
    pub fn pause(&self) {
        self.state.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.state.paused.store(false, Ordering::SeqCst);
        self.state.resumed.notify_waiters();
    }

    /// Names of the create requests received so far, in arrival order,
    /// including the ones still parked.
    pub fn create_requests(&self) -> Vec<String> {
        self.state.create_requests.lock().clone()
    }

    /// Successful create and update replies leave out the stored item.
    pub fn omit_reply_items(&self, omit: bool) {
        self.state.omit_reply_items.store(omit, Ordering::SeqCst);
    }

    pub fn subscribe_calls(&self) -> usize {
        self.state.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn last_subscribe(&self) -> Option<SubscribeReq> {
        self.state.last_subscribe.lock().clone()
    }

    async fn wait_while_paused(&self) {
        loop {
            let resumed = self.state.resumed.notified();
            tokio::pin!(resumed);
            resumed.as_mut().enable();

            if !self.state.paused.load(Ordering::SeqCst) {
                return;
            }
            resumed.await;
        }
    }

    fn reply_item<T>(&self, item: Option<T>) -> Option<T> {
        item.filter(|_| !self.state.omit_reply_items.load(Ordering::SeqCst))
    }

    fn forced_result(&self) -> Option<i32> {
        match self.state.forced_result.load(Ordering::SeqCst) {
            0 => None,
            result => Some(result),
        }
    }

    fn create_item<T: Stored>(&self, item: T) -> (i32, Option<T>) {
        if let Some(result) = self.forced_result() {
            return (result, None);
        }

        {
            let mut store = T::store(self).lock();
            if item.name().is_empty() || store.contains_key(item.name()) {
                return (RESULT_CONFLICT, None);
            }
            store.insert(item.name().to_string(), item.clone());
        }

        debug!(name = item.name(), "mock: created");
        self.push_update(item.clone().into_item());
        (0, Some(item))
    }

    fn update_item<T: Stored>(&self, item: T) -> (i32, Option<T>) {
        if let Some(result) = self.forced_result() {
            return (result, None);
        }

        {
            let mut store = T::store(self).lock();
            match store.get_mut(item.name()) {
                Some(stored) => *stored = item.clone(),
                None => return (RESULT_CONFLICT, None),
            }
        }

        self.push_update(item.clone().into_item());
        (0, Some(item))
    }

    fn get_item<T: Stored>(&self, name: &str) -> (i32, Option<T>) {
        if let Some(result) = self.forced_result() {
            return (result, None);
        }

        // a missing item is an ok reply without identity
        (0, self.get(name))
    }

    fn delete_item<T: Stored>(&self, name: &str) -> i32 {
        if let Some(result) = self.forced_result() {
            return result;
        }

        let removed = T::store(self).lock().remove(name);
        match removed {
            Some(mut item) => {
                item.mark_deleted();
                self.push_update(item.into_item());
                0
            }
            None => RESULT_CONFLICT,
        }
    }

    fn list_items<T: Stored>(&self, names: &[String]) -> (i32, Vec<T>) {
        if let Some(result) = self.forced_result() {
            return (result, Vec::new());
        }

        let store = T::store(self).lock();
        let items = store
            .values()
            .filter(|item| names.is_empty() || names.iter().any(|n| n == item.name()))
            .cloned()
            .collect();
        (0, items)
    }

    fn lookup_item(&self, spec: &session_context::Spec) -> Option<SessionContext> {
        let mac = spec
            .session_filter
            .as_ref()
            .map(|f| f.source_mac_address.as_str())
            .unwrap_or_default();

        if spec.circuit_id.is_empty() && spec.remote_id.is_empty() && mac.is_empty() {
            return None;
        }

        let store = self.state.session_contexts.lock();
        store
            .values()
            .find(|sc| {
                let Some(candidate) = sc.spec.as_ref() else {
                    return false;
                };
                let candidate_mac = candidate
                    .session_filter
                    .as_ref()
                    .map(|f| f.source_mac_address.as_str())
                    .unwrap_or_default();

                (spec.circuit_id.is_empty() || spec.circuit_id == candidate.circuit_id)
                    && (spec.remote_id.is_empty() || spec.remote_id == candidate.remote_id)
                    && (mac.is_empty() || mac == candidate_mac)
            })
            .cloned()
    }
}

macro_rules! mock_service {
    ($(
        $ty:ident, $update_req:ident, $resp:ident, $list_resp:ident,
        $create:ident, $update:ident, $get:ident, $delete:ident, $list:ident;
    )*) => {
        #[tonic::async_trait]
        impl UpsfService for MockUpsf {
            $(
                async fn $create(&self, request: Request<$ty>) -> Result<Response<$resp>, Status> {
                    let item = request.into_inner();
                    self.state.create_requests.lock().push(item.name.clone());
                    self.wait_while_paused().await;

                    let (result, item) = self.create_item(item);
                    let item = self.reply_item(item);
                    Ok(Response::new($resp { result, item }))
                }

                async fn $update(
                    &self,
                    request: Request<$update_req>,
                ) -> Result<Response<$resp>, Status> {
                    let item = request
                        .into_inner()
                        .item
                        .ok_or_else(|| Status::invalid_argument("missing item"))?;
                    let (result, item) = self.update_item(item);
                    let item = self.reply_item(item);
                    Ok(Response::new($resp { result, item }))
                }

                async fn $get(&self, request: Request<GetReq>) -> Result<Response<$resp>, Status> {
                    let (result, item) = self.get_item::<$ty>(&request.into_inner().name);
                    Ok(Response::new($resp { result, item }))
                }

                async fn $delete(
                    &self,
                    request: Request<DeleteReq>,
                ) -> Result<Response<DeleteResp>, Status> {
                    let name = request.into_inner().name;
                    let result = self.delete_item::<$ty>(&name);
                    Ok(Response::new(DeleteResp { result, name }))
                }

                async fn $list(
                    &self,
                    request: Request<ListReq>,
                ) -> Result<Response<$list_resp>, Status> {
                    let (result, items) = self.list_items::<$ty>(&request.into_inner().name);
                    Ok(Response::new($list_resp { result, items }))
                }
            )*

            async fn lookup(
                &self,
                request: Request<session_context::Spec>,
            ) -> Result<Response<SessionContextResp>, Status> {
                if let Some(result) = self.forced_result() {
                    return Ok(Response::new(SessionContextResp { result, item: None }));
                }

                let item = self.lookup_item(&request.into_inner());
                Ok(Response::new(SessionContextResp { result: 0, item }))
            }

            type SubscribeStream = UnboundedReceiverStream<Result<Item, Status>>;

            async fn subscribe(
                &self,
                request: Request<SubscribeReq>,
            ) -> Result<Response<Self::SubscribeStream>, Status> {
                let req = request.into_inner();
                self.state.subscribe_calls.fetch_add(1, Ordering::SeqCst);
                self.wait_while_paused().await;

                let (tx, rx) = mpsc::unbounded_channel();
                for item in self.state.script.lock().iter() {
                    let wanted = req.itemtype.is_empty()
                        || item.item.is_none()
                        || req.itemtype.contains(&(item_type(item) as i32));
                    if wanted {
                        let _ = tx.send(Ok(item.clone()));
                    }
                }

                match self.state.stream_end.lock().clone() {
                    StreamEnd::KeepOpen if req.watch => self.state.subscribers.lock().push(tx),
                    StreamEnd::KeepOpen | StreamEnd::Close => {}
                    StreamEnd::Fail(code, message) => {
                        let _ = tx.send(Err(Status::new(code, message)));
                    }
                }

                *self.state.last_subscribe.lock() = Some(req);
                Ok(Response::new(UnboundedReceiverStream::new(rx)))
            }
        }
    };
}

mock_service! {
    ServiceGateway, UpdateServiceGatewayReq, ServiceGatewayResp, ServiceGatewayListResp,
    create_service_gateway, update_service_gateway, get_service_gateway,
    delete_service_gateway, list_service_gateways;

    ServiceGatewayUserPlane, UpdateServiceGatewayUserPlaneReq, ServiceGatewayUserPlaneResp,
    ServiceGatewayUserPlaneListResp,
    create_service_gateway_user_plane, update_service_gateway_user_plane,
    get_service_gateway_user_plane, delete_service_gateway_user_plane,
    list_service_gateway_user_planes;

    TrafficSteeringFunction, UpdateTrafficSteeringFunctionReq, TrafficSteeringFunctionResp,
    TrafficSteeringFunctionListResp,
    create_traffic_steering_function, update_traffic_steering_function,
    get_traffic_steering_function, delete_traffic_steering_function,
    list_traffic_steering_functions;

    NetworkConnection, UpdateNetworkConnectionReq, NetworkConnectionResp,
    NetworkConnectionListResp,
    create_network_connection, update_network_connection, get_network_connection,
    delete_network_connection, list_network_connections;

    Shard, UpdateShardReq, ShardResp, ShardListResp,
    create_shard, update_shard, get_shard, delete_shard, list_shards;

    SessionContext, UpdateSessionContextReq, SessionContextResp, SessionContextListResp,
    create_session_context, update_session_context, get_session_context,
    delete_session_context, list_session_contexts;
}
