// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use tonic::transport::Channel;
use tracing::debug;

use crate::entity::{Entity, Grpc, ItemKind, Operation, check_result};
use crate::errors::ClientError;
use crate::subscription::Subscription;
use upsf_config::grpc::client::ClientConfig;
use upsf_proto::UpsfServiceClient;
use upsf_proto::v1::{SessionContext, SubscribeReq, UpdateOptions, session_context, update_options};

/// Connection to one UPSF service endpoint.
///
/// Cloning is cheap and shares the underlying channel.
#[derive(Clone, Debug)]
pub struct UpsfClient {
    inner: Grpc,
    endpoint: String,
}

impl UpsfClient {
    /// Creates a client whose channel connects on first use. Must be called
    /// from within a Tokio runtime.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let channel = config.to_channel_lazy()?;
        Ok(Self::with_channel(channel, &config.endpoint))
    }

    pub fn with_channel(channel: Channel, endpoint: &str) -> Self {
        UpsfClient {
            inner: UpsfServiceClient::new(channel),
            endpoint: endpoint.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn create<E: Entity>(&mut self, item: E) -> Result<E, ClientError> {
        debug!(kind = %E::KIND, name = item.name(), "create");
        E::create(&mut self.inner, item).await
    }

    /// Updates a record, replacing its lists with the ones sent.
    pub async fn update<E: Entity>(&mut self, item: E) -> Result<E, ClientError> {
        let options = UpdateOptions {
            list_merge_strategy: update_options::ListMergeStrategy::Replace as i32,
        };
        self.update_with_options(item, options).await
    }

    pub async fn update_with_options<E: Entity>(
        &mut self,
        item: E,
        options: UpdateOptions,
    ) -> Result<E, ClientError> {
        debug!(kind = %E::KIND, name = item.name(), "update");
        E::update(&mut self.inner, item, options).await
    }

    /// Fetches a record by name. A reply without identity is not found.
    pub async fn get<E: Entity>(&mut self, name: &str) -> Result<E, ClientError> {
        debug!(kind = %E::KIND, %name, "get");
        let item = E::get(&mut self.inner, name.to_string()).await?;
        if item.name().is_empty() {
            return Err(ClientError::NotFound {
                kind: E::KIND,
                name: name.to_string(),
            });
        }
        Ok(item)
    }

    pub async fn delete<E: Entity>(&mut self, name: &str) -> Result<(), ClientError> {
        debug!(kind = %E::KIND, %name, "delete");
        E::delete(&mut self.inner, name.to_string()).await
    }

    /// Lists the records named in `names`, or every record if empty.
    pub async fn list<E: Entity>(&mut self, names: &[String]) -> Result<Vec<E>, ClientError> {
        let items = E::list(&mut self.inner, names.to_vec()).await?;
        debug!(kind = %E::KIND, count = items.len(), "list");
        Ok(items)
    }

    /// Asks the service for the session context matching `spec`.
    pub async fn lookup(&mut self, spec: session_context::Spec) -> Result<SessionContext, ClientError> {
        let resp = self.inner.lookup(spec).await?.into_inner();
        check_result(Operation::Lookup, ItemKind::SessionContext, resp.result)?;

        match resp.item {
            Some(item) if !item.name.is_empty() => Ok(item),
            _ => Err(ClientError::NotFound {
                kind: ItemKind::SessionContext,
                name: String::new(),
            }),
        }
    }

    /// Opens the server push stream.
    pub async fn subscribe(&mut self, request: SubscribeReq) -> Result<Subscription, ClientError> {
        debug!(watch = request.watch, types = request.itemtype.len(), "subscribe");
        let stream = self.inner.subscribe(request).await?.into_inner();
        Ok(Subscription::new(stream))
    }
}
