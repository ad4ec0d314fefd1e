// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::future::Future;

use tonic::transport::Channel;

use crate::errors::ClientError;
use upsf_proto::UpsfServiceClient;
use upsf_proto::v1::{
    DeleteReq, GetReq, ItemType, ListReq, NetworkConnection, ServiceGateway,
    ServiceGatewayUserPlane, SessionContext, Shard, TrafficSteeringFunction,
    UpdateNetworkConnectionReq, UpdateOptions, UpdateServiceGatewayReq,
    UpdateServiceGatewayUserPlaneReq, UpdateSessionContextReq, UpdateShardReq,
    UpdateTrafficSteeringFunctionReq,
};

/// The generated stub every [`Entity`] call goes through.
pub type Grpc = UpsfServiceClient<Channel>;

/// The six entity types managed by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemKind {
    ServiceGateway,
    ServiceGatewayUserPlane,
    TrafficSteeringFunction,
    NetworkConnection,
    Shard,
    SessionContext,
}

impl ItemKind {
    pub const ALL: [ItemKind; 6] = [
        ItemKind::ServiceGateway,
        ItemKind::ServiceGatewayUserPlane,
        ItemKind::TrafficSteeringFunction,
        ItemKind::NetworkConnection,
        ItemKind::Shard,
        ItemKind::SessionContext,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::ServiceGateway => "service_gateway",
            ItemKind::ServiceGatewayUserPlane => "service_gateway_user_plane",
            ItemKind::TrafficSteeringFunction => "traffic_steering_function",
            ItemKind::NetworkConnection => "network_connection",
            ItemKind::Shard => "shard",
            ItemKind::SessionContext => "session_context",
        }
    }

    pub fn item_type(&self) -> ItemType {
        match self {
            ItemKind::ServiceGateway => ItemType::ServiceGateway,
            ItemKind::ServiceGatewayUserPlane => ItemType::ServiceGatewayUserPlane,
            ItemKind::TrafficSteeringFunction => ItemType::TrafficSteeringFunction,
            ItemKind::NetworkConnection => ItemType::NetworkConnection,
            ItemKind::Shard => ItemType::Shard,
            ItemKind::SessionContext => ItemType::SessionContext,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote operation, used to qualify rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Get,
    Delete,
    List,
    Lookup,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Get => "get",
            Operation::Delete => "delete",
            Operation::List => "list",
            Operation::Lookup => "lookup",
        };
        f.write_str(s)
    }
}

/// Maps a non-zero embedded result code to a rejection.
pub(crate) fn check_result(operation: Operation, kind: ItemKind, result: i32) -> Result<(), ClientError> {
    match result {
        0 => Ok(()),
        result => Err(ClientError::Rejected {
            operation,
            kind,
            result,
        }),
    }
}

/// A record stored by the service, with its per-type RPCs.
pub trait Entity: prost::Message + Default + Clone + Sized + 'static {
    const KIND: ItemKind;

    fn name(&self) -> &str;

    fn create(client: &mut Grpc, item: Self) -> impl Future<Output = Result<Self, ClientError>> + Send;

    fn update(
        client: &mut Grpc,
        item: Self,
        options: UpdateOptions,
    ) -> impl Future<Output = Result<Self, ClientError>> + Send;

    /// Returns the stored record, or the reply verbatim when it carries an
    /// empty name. Callers decide what an empty identity means.
    fn get(client: &mut Grpc, name: String) -> impl Future<Output = Result<Self, ClientError>> + Send;

    fn delete(client: &mut Grpc, name: String) -> impl Future<Output = Result<(), ClientError>> + Send;

    fn list(
        client: &mut Grpc,
        names: Vec<String>,
    ) -> impl Future<Output = Result<Vec<Self>, ClientError>> + Send;
}

macro_rules! impl_entity {
    (
        $ty:ty, $kind:expr, $update_req:ident,
        $create:ident, $update:ident, $get:ident, $delete:ident, $list:ident
    ) => {
        impl Entity for $ty {
            const KIND: ItemKind = $kind;

            fn name(&self) -> &str {
                &self.name
            }

            async fn create(client: &mut Grpc, item: Self) -> Result<Self, ClientError> {
                let resp = client.$create(item).await?.into_inner();
                check_result(Operation::Create, Self::KIND, resp.result)?;
                resp.item.ok_or(ClientError::EmptyReply {
                    operation: Operation::Create,
                    kind: Self::KIND,
                })
            }

            async fn update(
                client: &mut Grpc,
                item: Self,
                options: UpdateOptions,
            ) -> Result<Self, ClientError> {
                let req = $update_req {
                    item: Some(item),
                    options: Some(options),
                };
                let resp = client.$update(req).await?.into_inner();
                check_result(Operation::Update, Self::KIND, resp.result)?;
                resp.item.ok_or(ClientError::EmptyReply {
                    operation: Operation::Update,
                    kind: Self::KIND,
                })
            }

            async fn get(client: &mut Grpc, name: String) -> Result<Self, ClientError> {
                let resp = client.$get(GetReq { name }).await?.into_inner();
                check_result(Operation::Get, Self::KIND, resp.result)?;
                Ok(resp.item.unwrap_or_default())
            }

            async fn delete(client: &mut Grpc, name: String) -> Result<(), ClientError> {
                let resp = client.$delete(DeleteReq { name }).await?.into_inner();
                check_result(Operation::Delete, Self::KIND, resp.result)
            }

            async fn list(client: &mut Grpc, names: Vec<String>) -> Result<Vec<Self>, ClientError> {
                let resp = client.$list(ListReq { name: names }).await?.into_inner();
                check_result(Operation::List, Self::KIND, resp.result)?;
                Ok(resp.items)
            }
        }
    };
}

impl_entity!(
    ServiceGateway,
    ItemKind::ServiceGateway,
    UpdateServiceGatewayReq,
    create_service_gateway,
    update_service_gateway,
    get_service_gateway,
    delete_service_gateway,
    list_service_gateways
);

impl_entity!(
    ServiceGatewayUserPlane,
    ItemKind::ServiceGatewayUserPlane,
    UpdateServiceGatewayUserPlaneReq,
    create_service_gateway_user_plane,
    update_service_gateway_user_plane,
    get_service_gateway_user_plane,
    delete_service_gateway_user_plane,
    list_service_gateway_user_planes
);

impl_entity!(
    TrafficSteeringFunction,
    ItemKind::TrafficSteeringFunction,
    UpdateTrafficSteeringFunctionReq,
    create_traffic_steering_function,
    update_traffic_steering_function,
    get_traffic_steering_function,
    delete_traffic_steering_function,
    list_traffic_steering_functions
);

impl_entity!(
    NetworkConnection,
    ItemKind::NetworkConnection,
    UpdateNetworkConnectionReq,
    create_network_connection,
    update_network_connection,
    get_network_connection,
    delete_network_connection,
    list_network_connections
);

impl_entity!(
    Shard,
    ItemKind::Shard,
    UpdateShardReq,
    create_shard,
    update_shard,
    get_shard,
    delete_shard,
    list_shards
);

impl_entity!(
    SessionContext,
    ItemKind::SessionContext,
    UpdateSessionContextReq,
    create_session_context,
    update_session_context,
    get_session_context,
    delete_session_context,
    list_session_contexts
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result() {
        assert!(check_result(Operation::Create, ItemKind::Shard, 0).is_ok());

        let err = check_result(Operation::Delete, ItemKind::Shard, -3).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Rejected {
                operation: Operation::Delete,
                kind: ItemKind::Shard,
                result: -3
            }
        ));
        assert_eq!(
            err.to_string(),
            "delete shard rejected by the service with result -3"
        );
    }

    #[test]
    fn test_item_kind_mapping() {
        for kind in ItemKind::ALL {
            assert_ne!(kind.item_type(), ItemType::Unspecified);
        }
        assert_eq!(ItemKind::SessionContext.to_string(), "session_context");
        assert_eq!(<Shard as Entity>::KIND, ItemKind::Shard);
    }

    #[test]
    fn test_entity_name() {
        let sg = ServiceGateway {
            name: "sg-1".to_string(),
            ..Default::default()
        };
        assert_eq!(Entity::name(&sg), "sg-1");
    }
}
