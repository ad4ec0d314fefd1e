// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tonic::Code;
use tracing_test::traced_test;

use upsf_client::proto::{
    Item, MetaData, ServiceGateway, SessionContext, Shard, item, session_context,
};
use upsf_client::{
    ClientError, Dispatcher, ItemKind, Operation, SubscriptionEnd, Update, UpsfClient,
    subscription,
};
use upsf_config::grpc::client::ClientConfig;
use upsf_testing::{MockServer, MockUpsf, StreamEnd};

fn client_for(server: &MockServer) -> UpsfClient {
    let config = ClientConfig::default()
        .with_host_port(&server.host(), server.port())
        .with_request_timeout(Duration::from_secs(5));
    UpsfClient::new(&config).expect("client config must be valid")
}

fn service_gateway(name: &str, description: &str) -> ServiceGateway {
    ServiceGateway {
        name: name.to_string(),
        metadata: Some(MetaData {
            description: description.to_string(),
            ..Default::default()
        }),
    }
}

fn item_of_shard(name: &str) -> Item {
    Item {
        item: Some(item::Item::Shard(Shard {
            name: name.to_string(),
            ..Default::default()
        })),
    }
}

fn item_of_session_context(name: &str) -> Item {
    Item {
        item: Some(item::Item::SessionContext(SessionContext {
            name: name.to_string(),
            ..Default::default()
        })),
    }
}

#[tokio::test]
#[traced_test]
async fn test_crud_cycle() {
    let server = MockServer::start(MockUpsf::new()).await.unwrap();
    let mut client = client_for(&server);

    let created = client.create(service_gateway("sg-test", "")).await.unwrap();
    assert_eq!(created.name, "sg-test");

    let fetched: ServiceGateway = client.get("sg-test").await.unwrap();
    assert_eq!(fetched.name, "sg-test");
    assert_eq!(fetched.metadata.unwrap_or_default().description, "");

    let updated = client
        .update(service_gateway("sg-test", "edge gateway"))
        .await
        .unwrap();
    assert_eq!(updated.metadata.unwrap().description, "edge gateway");

    client.delete::<ServiceGateway>("sg-test").await.unwrap();

    let err = client.get::<ServiceGateway>("sg-test").await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::NotFound {
            kind: ItemKind::ServiceGateway,
            ..
        }
    ));
    assert!(logs_contain("delete"));
}

#[tokio::test]
async fn test_rejected_result() {
    let server = MockServer::start(MockUpsf::new()).await.unwrap();
    let mut client = client_for(&server);

    server.mock().reject_with(-2);
    let err = client.create(service_gateway("sg-1", "")).await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected { result: -2, .. }));
    assert_eq!(server.mock().len::<ServiceGateway>(), 0);

    server.mock().reject_with(0);
    client.create(service_gateway("sg-1", "")).await.unwrap();

    // deleting twice reports the missing record
    client.delete::<ServiceGateway>("sg-1").await.unwrap();
    let err = client.delete::<ServiceGateway>("sg-1").await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected { result: 1, .. }));
}

#[tokio::test]
async fn test_reply_without_record() {
    let server = MockServer::start(MockUpsf::new()).await.unwrap();
    let mut client = client_for(&server);

    server.mock().omit_reply_items(true);
    let err = client.create(service_gateway("sg-1", "")).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::EmptyReply {
            operation: Operation::Create,
            kind: ItemKind::ServiceGateway,
        }
    ));

    // the service stored it; only the reply was empty
    assert_eq!(server.mock().len::<ServiceGateway>(), 1);
    let err = client
        .update(service_gateway("sg-1", "edge"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::EmptyReply {
            operation: Operation::Update,
            ..
        }
    ));
}

#[tokio::test]
async fn test_list_with_filter() {
    let mock = MockUpsf::new();
    for name in ["s-1", "s-2", "s-3"] {
        mock.insert(Shard {
            name: name.to_string(),
            ..Default::default()
        });
    }
    let server = MockServer::start(mock).await.unwrap();
    let mut client = client_for(&server);

    let all: Vec<Shard> = client.list(&[]).await.unwrap();
    assert_eq!(all.len(), 3);

    let some: Vec<Shard> = client
        .list(&["s-1".to_string(), "s-3".to_string()])
        .await
        .unwrap();
    let names: Vec<_> = some.into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["s-1".to_string(), "s-3".to_string()]);
}

#[tokio::test]
async fn test_lookup() {
    let mock = MockUpsf::new();
    mock.insert(SessionContext {
        name: "sc-1".to_string(),
        spec: Some(session_context::Spec {
            circuit_id: "circuit-1".to_string(),
            ..Default::default()
        }),
        ..Default::default()
    });
    let server = MockServer::start(mock).await.unwrap();
    let mut client = client_for(&server);

    let found = client
        .lookup(session_context::Spec {
            circuit_id: "circuit-1".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(found.name, "sc-1");

    let err = client
        .lookup(session_context::Spec {
            circuit_id: "unknown".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotFound { .. }));
}

#[tokio::test]
async fn test_unreachable_service() {
    // nothing listens on port 1
    let config = ClientConfig::default()
        .with_host_port("127.0.0.1", 1)
        .with_connect_timeout(Duration::from_secs(1));
    let mut client = UpsfClient::new(&config).unwrap();

    let err = client.get::<Shard>("s-1").await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
}

#[tokio::test]
async fn test_subscription_dispatch_by_kind() {
    let mock = MockUpsf::new()
        .with_script(vec![
            item_of_shard("s-1"),
            Item { item: None },
            item_of_session_context("sc-1"),
        ])
        .with_stream_end(StreamEnd::Close);
    let server = MockServer::start(mock).await.unwrap();
    let mut client = client_for(&server);

    let mut seen = Vec::new();
    let end = {
        let mut dispatcher = Dispatcher::new().on(ItemKind::SessionContext, |u: &Update| {
            seen.push(u.name().to_string());
            true
        });
        let mut sub = client.subscribe(subscription::watch_all()).await.unwrap();
        sub.run(&mut dispatcher, &CancellationToken::new())
            .await
            .unwrap()
    };

    assert_eq!(end, SubscriptionEnd::Closed);
    assert_eq!(seen, vec!["sc-1".to_string()]);

    let req = server.mock().last_subscribe().unwrap();
    assert!(req.watch);
    assert_eq!(req.itemtype.len(), 6);
}

#[tokio::test]
async fn test_subscription_stop() {
    let mock = MockUpsf::new().with_script(vec![item_of_shard("s-1"), item_of_shard("s-2")]);
    let server = MockServer::start(mock).await.unwrap();
    let mut client = client_for(&server);

    let mut calls = 0;
    let mut stop_first = |_: &Update| {
        calls += 1;
        false
    };
    let mut sub = client.subscribe(subscription::watch_all()).await.unwrap();
    let end = sub
        .run(&mut stop_first, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(end, SubscriptionEnd::Stopped);
    assert_eq!(calls, 1);
}

#[tokio::test]
async fn test_subscription_error_status() {
    let mock = MockUpsf::new()
        .with_script(vec![item_of_shard("s-1")])
        .with_stream_end(StreamEnd::Fail(Code::Unavailable, "going away".to_string()));
    let server = MockServer::start(mock).await.unwrap();
    let mut client = client_for(&server);

    let mut sub = client.subscribe(subscription::watch_all()).await.unwrap();
    let err = sub
        .run(&mut |_: &Update| true, &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        ClientError::Transport(status) => assert_eq!(status.code(), Code::Unavailable),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_subscription_live_updates_and_cancel() {
    let server = MockServer::start(MockUpsf::new()).await.unwrap();
    let mut client = client_for(&server);
    let mut writer = client.clone();

    let cancel = CancellationToken::new();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut sub = client.subscribe(subscription::watch_all()).await.unwrap();

    let reader = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut forward = |u: &Update| tx.send(u.clone()).is_ok();
            sub.run(&mut forward, &cancel).await
        })
    };

    writer.create(service_gateway("sg-live", "")).await.unwrap();
    let update = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(update.kind(), ItemKind::ServiceGateway);
    assert_eq!(update.name(), "sg-live");

    cancel.cancel();
    let result = reader.await.unwrap();
    assert!(matches!(result, Err(ClientError::Cancelled)));
}
