//! Integration tests for the RESP-backed topology store.

use std::time::{Duration, UNIX_EPOCH};

use vigil_failover::store::{LAST_CHECKED_PREFIX, PRIMARY_KEY, REPLICAS_KEY};
use vigil_failover::{NodeAddress, NodeConnection, RespTopologyStore, Topology, TopologyStore};

use crate::helpers::{test_connection_config, FakeNode};

fn addr(s: &str) -> NodeAddress {
    s.parse().unwrap()
}

fn store_on(node: &FakeNode) -> RespTopologyStore {
    RespTopologyStore::new(NodeConnection::new(node.addr(), test_connection_config()))
}

#[test]
fn empty_store_loads_empty_topology() {
    let node = FakeNode::store();
    let mut store = store_on(&node);
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn save_then_load() {
    let node = FakeNode::store();
    let mut store = store_on(&node);
    let topology = Topology::from_parts(
        Some(addr("10.0.0.1:6379")),
        vec![addr("10.0.0.2:6379"), addr("10.0.0.3:6380")],
    );
    store.save(&topology).unwrap();

    assert_eq!(node.string(PRIMARY_KEY).as_deref(), Some("10.0.0.1:6379"));
    assert_eq!(
        node.list(REPLICAS_KEY),
        vec!["10.0.0.2:6379", "10.0.0.3:6380"]
    );
    assert_eq!(store.load().unwrap(), topology);
}

#[test]
fn save_replaces_previous_list() {
    let node = FakeNode::store();
    let mut store = store_on(&node);
    store
        .save(&Topology::from_parts(Some(addr("a:1")), vec![addr("b:1"), addr("c:1")]))
        .unwrap();
    store
        .save(&Topology::from_parts(Some(addr("b:1")), vec![addr("c:1")]))
        .unwrap();
    assert_eq!(node.list(REPLICAS_KEY), vec!["c:1"]);
}

#[test]
fn clearing_primary_deletes_key() {
    let node = FakeNode::store();
    let mut store = store_on(&node);
    store.set_primary(Some(&addr("a:1"))).unwrap();
    store.set_primary(None).unwrap();
    assert_eq!(node.string(PRIMARY_KEY), None);
    assert_eq!(store.load().unwrap().primary(), None);
}

#[test]
fn remove_replica_uses_lrem() {
    let node = FakeNode::store();
    let mut store = store_on(&node);
    store.push_replica(&addr("b:1")).unwrap();
    store.push_replica(&addr("c:1")).unwrap();
    store.remove_replica(&addr("b:1")).unwrap();

    assert_eq!(node.list(REPLICAS_KEY), vec!["c:1"]);
    let lrem = node
        .commands()
        .into_iter()
        .find(|c| c[0] == "LREM")
        .unwrap();
    assert_eq!(lrem, vec!["LREM", REPLICAS_KEY, "0", "b:1"]);
}

#[test]
fn last_checked_is_unix_millis() {
    let node = FakeNode::store();
    let mut store = store_on(&node);
    let at = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
    store.set_last_checked(&addr("a:1"), at).unwrap();

    let key = format!("{LAST_CHECKED_PREFIX}a:1");
    assert_eq!(node.string(&key).as_deref(), Some("1700000000123"));
}

#[test]
fn publish_goes_to_channel() {
    let node = FakeNode::store();
    let mut store = store_on(&node);
    store.publish("log", "promoting b:1").unwrap();
    assert_eq!(
        node.published(),
        vec![("log".to_string(), "promoting b:1".to_string())]
    );
}

#[test]
fn malformed_persisted_address_is_an_error() {
    let node = FakeNode::store();
    let mut conn = NodeConnection::new(node.addr(), test_connection_config());
    conn.execute(&vigil_protocol::Command::Set {
        key: PRIMARY_KEY.into(),
        value: "host:notaport".into(),
    })
    .unwrap();

    let mut store = store_on(&node);
    assert!(store.load().is_err());
}

#[test]
fn unreachable_store_fails_to_connect() {
    let node = FakeNode::store();
    let addr = node.addr();
    drop(node);
    crate::helpers::settle();

    let mut store = RespTopologyStore::new(NodeConnection::new(addr, test_connection_config()));
    assert!(store.connect().is_err());
}
