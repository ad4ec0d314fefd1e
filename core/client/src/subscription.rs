// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Server push stream of entity changes.
//!
//! Each inbound [`Item`] is turned into an [`Update`] and handed to a
//! [`Subscriber`]. The subscriber decides whether the stream goes on: a
//! `false` return ends the subscription cleanly. [`Dispatcher`] is the
//! table based subscriber, routing each update to the handler registered
//! for its kind and ignoring the kinds nobody asked for.

use std::any::Any;
use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tonic::Streaming;
use tracing::{debug, trace, warn};

use crate::entity::{Entity, ItemKind};
use crate::errors::ClientError;
use upsf_proto::v1::{
    DerivedState, Item, NetworkConnection, ServiceGateway, ServiceGatewayUserPlane,
    SessionContext, Shard, SubscribeReq, TrafficSteeringFunction, item,
};

/// One change notification, tagged by entity type.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    ServiceGateway(ServiceGateway),
    ServiceGatewayUserPlane(ServiceGatewayUserPlane),
    TrafficSteeringFunction(TrafficSteeringFunction),
    NetworkConnection(NetworkConnection),
    Shard(Shard),
    SessionContext(SessionContext),
}

impl Update {
    /// Returns `None` for an item with no payload.
    pub fn from_item(item: Item) -> Option<Self> {
        let update = match item.item? {
            item::Item::ServiceGateway(v) => Update::ServiceGateway(v),
            item::Item::ServiceGatewayUserPlane(v) => Update::ServiceGatewayUserPlane(v),
            item::Item::TrafficSteeringFunction(v) => Update::TrafficSteeringFunction(v),
            item::Item::NetworkConnection(v) => Update::NetworkConnection(v),
            item::Item::Shard(v) => Update::Shard(v),
            item::Item::SessionContext(v) => Update::SessionContext(v),
        };
        Some(update)
    }

    pub fn into_item(self) -> Item {
        let inner = match self {
            Update::ServiceGateway(v) => item::Item::ServiceGateway(v),
            Update::ServiceGatewayUserPlane(v) => item::Item::ServiceGatewayUserPlane(v),
            Update::TrafficSteeringFunction(v) => item::Item::TrafficSteeringFunction(v),
            Update::NetworkConnection(v) => item::Item::NetworkConnection(v),
            Update::Shard(v) => item::Item::Shard(v),
            Update::SessionContext(v) => item::Item::SessionContext(v),
        };
        Item { item: Some(inner) }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Update::ServiceGateway(_) => ItemKind::ServiceGateway,
            Update::ServiceGatewayUserPlane(_) => ItemKind::ServiceGatewayUserPlane,
            Update::TrafficSteeringFunction(_) => ItemKind::TrafficSteeringFunction,
            Update::NetworkConnection(_) => ItemKind::NetworkConnection,
            Update::Shard(_) => ItemKind::Shard,
            Update::SessionContext(_) => ItemKind::SessionContext,
        }
    }

    /// The payload if it is an `E`.
    pub fn payload<E: Entity>(&self) -> Option<&E> {
        let payload: &dyn Any = match self {
            Update::ServiceGateway(v) => v,
            Update::ServiceGatewayUserPlane(v) => v,
            Update::TrafficSteeringFunction(v) => v,
            Update::NetworkConnection(v) => v,
            Update::Shard(v) => v,
            Update::SessionContext(v) => v,
        };
        payload.downcast_ref()
    }

    pub fn name(&self) -> &str {
        match self {
            Update::ServiceGateway(v) => &v.name,
            Update::ServiceGatewayUserPlane(v) => &v.name,
            Update::TrafficSteeringFunction(v) => &v.name,
            Update::NetworkConnection(v) => &v.name,
            Update::Shard(v) => &v.name,
            Update::SessionContext(v) => &v.name,
        }
    }
}

/// Request for every item type in every derived state, unfiltered, with
/// watch enabled.
pub fn watch_all() -> SubscribeReq {
    SubscribeReq {
        itemtype: ItemKind::ALL.iter().map(|k| k.item_type() as i32).collect(),
        itemstate: DerivedState::ALL.iter().map(|s| *s as i32).collect(),
        parent: Vec::new(),
        name: Vec::new(),
        watch: true,
    }
}

/// Receives updates. Returning `false` stops the subscription.
pub trait Subscriber {
    fn on_update(&mut self, update: &Update) -> bool;
}

impl<F> Subscriber for F
where
    F: FnMut(&Update) -> bool,
{
    fn on_update(&mut self, update: &Update) -> bool {
        self(update)
    }
}

type Handler<'a> = Box<dyn FnMut(&Update) -> bool + 'a>;

/// Routes updates to the handler registered for their kind.
/// Kinds without a handler are skipped and the stream continues.
#[derive(Default)]
pub struct Dispatcher<'a> {
    handlers: HashMap<ItemKind, Handler<'a>>,
}

impl<'a> Dispatcher<'a> {
    pub fn new() -> Self {
        Dispatcher {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for `kind`, replacing any previous one.
    pub fn on<F>(mut self, kind: ItemKind, handler: F) -> Self
    where
        F: FnMut(&Update) -> bool + 'a,
    {
        self.register(kind, handler);
        self
    }

    pub fn register<F>(&mut self, kind: ItemKind, handler: F)
    where
        F: FnMut(&Update) -> bool + 'a,
    {
        self.handlers.insert(kind, Box::new(handler));
    }

    pub fn handles(&self, kind: ItemKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Subscriber for Dispatcher<'_> {
    fn on_update(&mut self, update: &Update) -> bool {
        match self.handlers.get_mut(&update.kind()) {
            Some(handler) => handler(update),
            None => {
                trace!(kind = %update.kind(), name = update.name(), "no handler, skipping update");
                true
            }
        }
    }
}

/// Why a subscription ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionEnd {
    /// The subscriber asked to stop.
    Stopped,
    /// The service closed the stream.
    Closed,
}

/// An open server push stream.
pub struct Subscription {
    stream: Streaming<Item>,
}

impl Subscription {
    pub(crate) fn new(stream: Streaming<Item>) -> Self {
        Subscription { stream }
    }

    /// Next update, or `None` once the service closes the stream. Items
    /// without payload are skipped.
    pub async fn next(&mut self) -> Result<Option<Update>, ClientError> {
        loop {
            match self.stream.message().await? {
                None => return Ok(None),
                Some(item) => match Update::from_item(item) {
                    Some(update) => return Ok(Some(update)),
                    None => warn!("received update without payload, skipping"),
                },
            }
        }
    }

    /// Like [`Subscription::next`], failing with [`ClientError::Cancelled`]
    /// once `cancel` fires.
    pub async fn next_until(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Update>, ClientError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("subscription cancelled");
                Err(ClientError::Cancelled)
            }
            next = self.next() => next,
        }
    }

    /// Feeds every update to `subscriber` until it stops, the stream ends
    /// or `cancel` fires.
    pub async fn run<S>(
        &mut self,
        subscriber: &mut S,
        cancel: &CancellationToken,
    ) -> Result<SubscriptionEnd, ClientError>
    where
        S: Subscriber + ?Sized,
    {
        loop {
            let Some(update) = self.next_until(cancel).await? else {
                debug!("subscription stream closed by the service");
                return Ok(SubscriptionEnd::Closed);
            };

            trace!(kind = %update.kind(), name = update.name(), "dispatching update");
            if !subscriber.on_update(&update) {
                debug!(kind = %update.kind(), "subscriber stopped the subscription");
                return Ok(SubscriptionEnd::Stopped);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shard(name: &str) -> Update {
        Update::Shard(Shard {
            name: name.to_string(),
            ..Default::default()
        })
    }

    fn session_context(name: &str) -> Update {
        Update::SessionContext(SessionContext {
            name: name.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_from_item() {
        assert_eq!(Update::from_item(Item { item: None }), None);

        let update = Update::from_item(shard("s-1").into_item()).unwrap();
        assert_eq!(update.kind(), ItemKind::Shard);
        assert_eq!(update.name(), "s-1");
    }

    #[test]
    fn test_payload() {
        let update = shard("s-1");
        assert_eq!(update.payload::<Shard>().map(|s| s.name.as_str()), Some("s-1"));
        assert!(update.payload::<SessionContext>().is_none());
    }

    #[test]
    fn test_watch_all() {
        let req = watch_all();
        assert!(req.watch);
        assert_eq!(req.itemtype.len(), 6);
        assert!(req.itemtype.contains(&(upsf_proto::v1::ItemType::SessionContext as i32)));
        assert!(!req.itemtype.contains(&(upsf_proto::v1::ItemType::Unspecified as i32)));
        assert_eq!(req.itemstate.len(), 6);
        assert!(req.parent.is_empty());
        assert!(req.name.is_empty());
    }

    #[test]
    fn test_dispatcher_routes_by_kind() {
        let mut seen = Vec::new();
        {
            let mut dispatcher = Dispatcher::new().on(ItemKind::SessionContext, |u: &Update| {
                seen.push(u.name().to_string());
                true
            });

            assert!(dispatcher.handles(ItemKind::SessionContext));
            assert!(!dispatcher.handles(ItemKind::Shard));

            assert!(dispatcher.on_update(&shard("s-1")));
            assert!(dispatcher.on_update(&session_context("sc-1")));
        }
        assert_eq!(seen, vec!["sc-1".to_string()]);
    }

    #[test]
    fn test_dispatcher_stop() {
        let mut dispatcher = Dispatcher::new().on(ItemKind::Shard, |_: &Update| false);
        assert!(!dispatcher.on_update(&shard("s-1")));
        // unhandled kinds always continue
        assert!(dispatcher.on_update(&session_context("sc-1")));
    }

    #[test]
    fn test_closure_subscriber() {
        let mut count = 0;
        let mut subscriber = |_: &Update| {
            count += 1;
            count < 2
        };
        assert!(subscriber.on_update(&shard("a")));
        assert!(!subscriber.on_update(&shard("b")));
    }
}
