// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::thread;
use std::time::{Duration, Instant};

use tonic::Code;
use tracing_test::traced_test;

use upsf::abi::{
    EndpointSpec, FixedString, NcTopology, UpsfEndpoint, UpsfHandle, UpsfL2vpn, UpsfMsPtpSpec,
    UpsfNetworkConnection, UpsfServiceGateway, UpsfSessionContext, UpsfSessionContextSpec,
};
use upsf::{Bridge, BridgeError};
use upsf_client::proto::{
    Item, NetworkConnection, ServiceGateway, SessionContext, Shard, item, session_context,
};
use upsf_client::{ClientError, Dispatcher, ItemKind, SubscriptionEnd, Update};
use upsf_config::bridge::BridgeConfig;
use upsf_testing::mock::RESULT_CONFLICT;
use upsf_testing::{MockServer, MockUpsf, StreamEnd};

fn bridge(max_handles: usize) -> Bridge {
    Bridge::new(BridgeConfig::default().with_max_handles(max_handles))
}

fn open(bridge: &Bridge, server: &MockServer) -> UpsfHandle {
    bridge
        .open(&server.host(), i32::from(server.port()))
        .expect("open must succeed")
}

fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(10));
    }
}

fn service_gateway(name: &str) -> UpsfServiceGateway {
    UpsfServiceGateway {
        name: FixedString::new(name),
        ..Default::default()
    }
}

fn shard_item(name: &str) -> Item {
    Item {
        item: Some(item::Item::Shard(Shard {
            name: name.to_string(),
            ..Default::default()
        })),
    }
}

fn session_context_item(name: &str) -> Item {
    Item {
        item: Some(item::Item::SessionContext(SessionContext {
            name: name.to_string(),
            spec: Some(session_context::Spec {
                circuit_id: format!("circuit-{name}"),
                ..Default::default()
            }),
            ..Default::default()
        })),
    }
}

#[test]
#[traced_test]
fn test_service_gateway_lifecycle() {
    let server = MockServer::start_in_background(MockUpsf::new()).unwrap();
    let bridge = bridge(4);
    let handle = open(&bridge, &server);

    let created = bridge.create(handle, &service_gateway("sg-test")).unwrap();
    assert_eq!(created.name.to_string_lossy(), "sg-test");

    let fetched = bridge.get(handle, &service_gateway("sg-test")).unwrap();
    assert_eq!(fetched.name.to_string_lossy(), "sg-test");
    assert!(fetched.metadata.description.is_empty());

    bridge.delete(handle, &service_gateway("sg-test")).unwrap();

    let err = bridge.get(handle, &service_gateway("sg-test")).unwrap_err();
    assert!(err.is_expected(), "unexpected error: {err}");
    assert!(matches!(
        err,
        BridgeError::Client(ClientError::NotFound { kind: ItemKind::ServiceGateway, ref name })
            if name == "sg-test"
    ));

    assert!(logs_contain("upsf connection opened"));
    assert!(bridge.close(handle));
}

#[test]
fn test_pool_exhaustion_and_reuse() {
    let server = MockServer::start_in_background(MockUpsf::new()).unwrap();
    let bridge = bridge(3);

    let handles: Vec<_> = (0..3).map(|_| open(&bridge, &server)).collect();
    assert_eq!(handles, vec![0, 1, 2]);

    let err = bridge
        .open(&server.host(), i32::from(server.port()))
        .unwrap_err();
    assert!(matches!(err, BridgeError::PoolExhausted { capacity: 3 }));

    assert!(bridge.close(1));
    assert!(!bridge.close(1));
    assert_eq!(open(&bridge, &server), 1);
}

#[test]
fn test_open_rejects_bad_arguments() {
    let bridge = bridge(1);

    assert!(matches!(
        bridge.open("", 50051),
        Err(BridgeError::InvalidArgument(_))
    ));
    assert!(matches!(
        bridge.open("127.0.0.1", 70000),
        Err(BridgeError::InvalidArgument(_))
    ));
    assert!(matches!(
        bridge.open("127.0.0.1", -1),
        Err(BridgeError::InvalidArgument(_))
    ));
    assert!(bridge.table().is_empty());
}

#[test]
fn test_unknown_and_closed_handles() {
    let server = MockServer::start_in_background(MockUpsf::new()).unwrap();
    let bridge = bridge(2);

    assert!(matches!(
        bridge.get(7, &service_gateway("sg")),
        Err(BridgeError::InvalidHandle(7))
    ));

    let handle = open(&bridge, &server);
    assert!(bridge.close(handle));
    assert!(matches!(
        bridge.list::<UpsfServiceGateway>(handle, 4),
        Err(BridgeError::InvalidHandle(h)) if h == handle
    ));
    assert!(matches!(
        bridge.subscribe(handle, &mut |_: &Update| true),
        Err(BridgeError::InvalidHandle(_))
    ));
}

#[test]
fn test_rejections() {
    let server = MockServer::start_in_background(MockUpsf::new()).unwrap();
    let bridge = bridge(1);
    let handle = open(&bridge, &server);

    bridge.create(handle, &service_gateway("sg-1")).unwrap();
    let err = bridge.create(handle, &service_gateway("sg-1")).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Client(ClientError::Rejected { result: RESULT_CONFLICT, .. })
    ));

    server.mock().reject_with(42);
    let err = bridge.update(handle, &service_gateway("sg-1")).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Client(ClientError::Rejected { result: 42, .. })
    ));
    assert!(!err.is_expected());
}

#[test]
#[traced_test]
fn test_list_is_bounded_by_capacity() {
    let mock = MockUpsf::new();
    for i in 0..5 {
        mock.insert(ServiceGateway {
            name: format!("sg-{i}"),
            ..Default::default()
        });
    }
    let server = MockServer::start_in_background(mock).unwrap();
    let bridge = bridge(1);
    let handle = open(&bridge, &server);

    let all = bridge.list::<UpsfServiceGateway>(handle, 16).unwrap();
    assert_eq!(all.len(), 5);
    assert!(!logs_contain("list result truncated"));

    let some = bridge.list::<UpsfServiceGateway>(handle, 3).unwrap();
    let names: Vec<_> = some.iter().map(|sg| sg.name.to_string_lossy()).collect();
    assert_eq!(names, vec!["sg-0", "sg-1", "sg-2"]);
    assert!(logs_contain("list result truncated"));
}

#[test]
fn test_lookup_matches_policy() {
    let mock = MockUpsf::new();
    mock.insert(SessionContext {
        name: "sc-1".to_string(),
        spec: Some(session_context::Spec {
            circuit_id: "circuit-1".to_string(),
            ..Default::default()
        }),
        ..Default::default()
    });
    let server = MockServer::start_in_background(mock).unwrap();
    let bridge = bridge(1);
    let handle = open(&bridge, &server);

    let spec = UpsfSessionContextSpec {
        circuit_id: FixedString::new("circuit-1"),
        ..Default::default()
    };
    let found: UpsfSessionContext = bridge.lookup(handle, &spec).unwrap();
    assert_eq!(found.name.to_string_lossy(), "sc-1");
    assert_eq!(found.spec.circuit_id.to_string_lossy(), "circuit-1");

    let miss = UpsfSessionContextSpec {
        circuit_id: FixedString::new("circuit-2"),
        ..Default::default()
    };
    assert!(bridge.lookup(handle, &miss).unwrap_err().is_expected());
}

#[test]
fn test_network_connection_round_trip() {
    let server = MockServer::start_in_background(MockUpsf::new()).unwrap();
    let bridge = bridge(1);
    let handle = open(&bridge, &server);

    let mut endpoint = UpsfEndpoint {
        endpoint_name: FixedString::new("up-a"),
        ..Default::default()
    };
    endpoint.set_spec(Some(EndpointSpec::L2vpn(UpsfL2vpn { vpn_id: 12 })));

    let mut nc = UpsfNetworkConnection {
        name: FixedString::new("nc-1"),
        ..Default::default()
    };
    nc.spec.maximum_supported_quality = 3;
    nc.spec.set_topology(NcTopology::MsPtp(UpsfMsPtpSpec {
        sgup_endpoint: endpoint,
        tsf_endpoint: UpsfEndpoint::default(),
    }));

    bridge.create(handle, &nc).unwrap();
    let fetched = bridge.get(handle, &nc).unwrap();
    assert_eq!(fetched.spec, nc.spec);

    // a record without topology never reaches the service
    let bare = UpsfNetworkConnection {
        name: FixedString::new("nc-2"),
        ..Default::default()
    };
    assert!(matches!(
        bridge.create(handle, &bare),
        Err(BridgeError::Marshal(_))
    ));
    assert_eq!(server.mock().len::<NetworkConnection>(), 1);
}

#[test]
fn test_list_fails_on_record_without_topology() {
    let mock = MockUpsf::new();
    mock.insert(NetworkConnection {
        name: "nc-bare".to_string(),
        ..Default::default()
    });
    let server = MockServer::start_in_background(mock).unwrap();
    let bridge = bridge(1);
    let handle = open(&bridge, &server);

    let err = bridge
        .list::<UpsfNetworkConnection>(handle, 16)
        .unwrap_err();
    assert!(matches!(err, BridgeError::Marshal(_)));
}

#[test]
fn test_same_handle_calls_run_one_at_a_time() {
    let server = MockServer::start_in_background(MockUpsf::new()).unwrap();
    let mock = server.mock();
    let bridge = bridge(1);
    let handle = open(&bridge, &server);

    mock.pause();
    thread::scope(|s| {
        let first = s.spawn(|| bridge.create(handle, &service_gateway("sg-a")));
        wait_until(|| mock.create_requests().len() == 1);

        let second = s.spawn(|| bridge.create(handle, &service_gateway("sg-b")));
        // the second caller queues on the slot, not inside the service
        thread::sleep(Duration::from_millis(200));
        assert_eq!(mock.create_requests(), vec!["sg-a"]);

        // calls already holding the slot finish after close
        assert!(bridge.close(handle));
        mock.resume();

        let created = first.join().unwrap().unwrap();
        assert_eq!(created.name.to_string_lossy(), "sg-a");
        let created = second.join().unwrap().unwrap();
        assert_eq!(created.name.to_string_lossy(), "sg-b");
    });

    assert_eq!(mock.create_requests(), vec!["sg-a", "sg-b"]);
    assert_eq!(mock.len::<ServiceGateway>(), 2);
    assert!(matches!(
        bridge.create(handle, &service_gateway("sg-c")),
        Err(BridgeError::InvalidHandle(h)) if h == handle
    ));
}

#[test]
fn test_subscription_dispatches_by_kind() {
    let mock = MockUpsf::new()
        .with_script(vec![shard_item("shard-1"), session_context_item("sc-1")])
        .with_stream_end(StreamEnd::Close);
    let server = MockServer::start_in_background(mock).unwrap();
    let bridge = bridge(1);
    let handle = open(&bridge, &server);

    let mut seen = Vec::new();
    let mut dispatcher = Dispatcher::new().on(ItemKind::SessionContext, |update: &Update| {
        seen.push(update.name().to_string());
        true
    });

    let end = bridge.subscribe(handle, &mut dispatcher).unwrap();
    drop(dispatcher);
    assert_eq!(end, SubscriptionEnd::Closed);
    assert_eq!(seen, vec!["sc-1"]);
    assert!(!bridge.table().get(handle).unwrap().is_subscribed());
}

#[test]
fn test_subscription_stopped_by_subscriber() {
    let mock = MockUpsf::new().with_script(vec![
        session_context_item("sc-1"),
        session_context_item("sc-2"),
    ]);
    let server = MockServer::start_in_background(mock).unwrap();
    let bridge = bridge(1);
    let handle = open(&bridge, &server);

    let mut calls = 0;
    let end = bridge
        .subscribe(handle, &mut |_: &Update| {
            calls += 1;
            false
        })
        .unwrap();
    assert_eq!(end, SubscriptionEnd::Stopped);
    assert_eq!(calls, 1);

    // one shot: a new call opens a new stream
    let end = bridge.subscribe(handle, &mut |_: &Update| false).unwrap();
    assert_eq!(end, SubscriptionEnd::Stopped);
    assert_eq!(server.mock().subscribe_calls(), 2);
}

#[test]
fn test_subscription_stream_error() {
    let mock = MockUpsf::new()
        .with_script(vec![shard_item("shard-1")])
        .with_stream_end(StreamEnd::Fail(Code::Unavailable, "going away".to_string()));
    let server = MockServer::start_in_background(mock).unwrap();
    let bridge = bridge(1);
    let handle = open(&bridge, &server);

    let err = bridge.subscribe(handle, &mut |_: &Update| true).unwrap_err();
    match err {
        BridgeError::Client(ClientError::Transport(status)) => {
            assert_eq!(status.code(), Code::Unavailable)
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_second_subscription_is_rejected() {
    let server = MockServer::start_in_background(MockUpsf::new()).unwrap();
    let bridge = bridge(1);
    let handle = open(&bridge, &server);

    thread::scope(|s| {
        let first = s.spawn(|| bridge.subscribe(handle, &mut |_: &Update| true));
        wait_until(|| server.mock().active_subscriptions() == 1);

        let err = bridge.subscribe(handle, &mut |_: &Update| true).unwrap_err();
        assert!(matches!(err, BridgeError::SubscriptionActive(h) if h == handle));

        server.mock().close_streams();
        assert_eq!(first.join().unwrap().unwrap(), SubscriptionEnd::Closed);
    });
}

#[test]
fn test_close_ends_subscription() {
    let server = MockServer::start_in_background(MockUpsf::new()).unwrap();
    let bridge = bridge(1);
    let handle = open(&bridge, &server);

    thread::scope(|s| {
        let subscriber = s.spawn(|| bridge.subscribe(handle, &mut |_: &Update| true));
        wait_until(|| server.mock().active_subscriptions() == 1);

        assert!(bridge.close(handle));
        let err = subscriber.join().unwrap().unwrap_err();
        assert!(matches!(err, BridgeError::Cancelled(h) if h == handle));
        assert!(err.is_expected());
    });
}

#[test]
fn test_close_while_subscription_opens() {
    let server = MockServer::start_in_background(MockUpsf::new()).unwrap();
    let bridge = bridge(1);
    let handle = open(&bridge, &server);

    server.mock().pause();
    thread::scope(|s| {
        let subscriber = s.spawn(|| bridge.subscribe(handle, &mut |_: &Update| true));
        wait_until(|| server.mock().subscribe_calls() == 1);

        assert!(bridge.close(handle));
        let err = subscriber.join().unwrap().unwrap_err();
        assert!(matches!(err, BridgeError::Cancelled(h) if h == handle));
    });
    server.mock().resume();
}

#[test]
fn test_subscriber_can_call_back_into_bridge() {
    let mock = MockUpsf::new().with_script(vec![Item {
        item: Some(item::Item::ServiceGateway(ServiceGateway {
            name: "sg-1".to_string(),
            ..Default::default()
        })),
    }]);
    mock.insert(ServiceGateway {
        name: "sg-1".to_string(),
        ..Default::default()
    });
    let server = MockServer::start_in_background(mock).unwrap();
    let bridge = bridge(1);
    let handle = open(&bridge, &server);

    let mut fetched = None;
    let end = bridge
        .subscribe(handle, &mut |update: &Update| {
            let query = service_gateway(update.name());
            fetched = Some(bridge.get(handle, &query).map(|sg| sg.name.to_string_lossy()));
            false
        })
        .unwrap();

    assert_eq!(end, SubscriptionEnd::Stopped);
    assert_eq!(fetched.unwrap().unwrap(), "sg-1");
}
