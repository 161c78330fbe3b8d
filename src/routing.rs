//! Lookup and insert routing: `find_successor`, `closest_preceding_node`,
//! and the read path `lookup` (spec.md §4.2).

use tonic::Request;

use crate::chord_proto;
use crate::error::ChordError;
use crate::identifier::{between, between_open, hash, Id};
use crate::kv::KvResult;
use crate::noderef::{dial, NodeRef};
use crate::state::NodeHandle;

/// The finger (or successor, if no finger qualifies) that most closely
/// precedes `id` without passing it — purely local, no RPC.
pub fn closest_preceding_node(handle: &NodeHandle, id: Id) -> NodeRef {
    let state = handle.state.lock().unwrap();
    if between(id, handle.self_ref.id, state.successor.id) {
        return state.successor.clone();
    }
    for finger in state.finger_table.iter_rev() {
        if let Some(node) = &finger.node {
            if node.valid && between_open(node.id, handle.self_ref.id, id) {
                return node.clone();
            }
        }
    }
    handle.self_ref.clone()
}

/// Find the node responsible for `id`, forwarding over RPC as needed.
pub async fn find_successor(handle: &NodeHandle, id: Id) -> Result<NodeRef, ChordError> {
    let (self_id, successor) = {
        let state = handle.state.lock().unwrap();
        (handle.self_ref.id, state.successor.clone())
    };
    if between(id, self_id, successor.id) {
        return Ok(successor);
    }

    let next = closest_preceding_node(handle, id);
    if next.id == handle.self_ref.id {
        // No finger strictly improves on self; safe fallback per spec.md §4.2.
        return Ok(handle.self_ref.clone());
    }

    let mut client = dial(&next, handle.config.rpc_timeout).await?;
    let response = client
        .find_successor(Request::new(chord_proto::FindSuccessorRequest { id }))
        .await?
        .into_inner();
    Ok(node_ref_from_msg(response))
}

/// Read path: return the value for `key`, forwarding to the owner if this
/// node doesn't hold it.
pub async fn lookup(handle: &NodeHandle, key: &str) -> Result<KvResult, ChordError> {
    let h = hash(key);
    let (predecessor, self_id) = {
        let state = handle.state.lock().unwrap();
        (state.predecessor.clone(), handle.self_ref.id)
    };

    if between(h, predecessor.id, self_id) {
        return Ok(local_lookup(handle, key));
    }

    let next = closest_preceding_node(handle, h);
    if next.id == handle.self_ref.id {
        return Ok(local_lookup(handle, key));
    }
    let mut client = dial(&next, handle.config.rpc_timeout).await?;
    let response = client
        .lookup(Request::new(chord_proto::LookupRequest {
            key: key.to_string(),
        }))
        .await?
        .into_inner();
    Ok(response.into())
}

/// Serve `key` from the local authoritative store without forwarding.
pub fn local_lookup(handle: &NodeHandle, key: &str) -> KvResult {
    let state = handle.state.lock().unwrap();
    match state.local_store.get(key) {
        Some(v) => KvResult::valid(key, v.value.clone(), handle.self_ref.id),
        None => KvResult::not_found(key, handle.self_ref.id),
    }
}

pub fn node_ref_from_msg(msg: chord_proto::NodeRefMsg) -> NodeRef {
    NodeRef {
        id: msg.id,
        address: msg.address,
        port: msg.port as u16,
        valid: msg.valid,
    }
}

pub fn node_ref_to_msg(node: &NodeRef) -> chord_proto::NodeRefMsg {
    chord_proto::NodeRefMsg {
        id: node.id,
        address: node.address.clone(),
        port: node.port as u32,
        valid: node.valid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::time::Duration;

    fn test_config() -> Config {
        Config {
            address: "127.0.0.1".into(),
            port: 0,
            peer: None,
            interval: crate::maintenance::default_interval(),
            rpc_timeout: Duration::from_millis(100),
            dev_mode: false,
            identifier_bits: crate::identifier::M,
        }
    }

    #[test]
    fn closest_preceding_node_falls_back_to_successor_with_no_fingers() {
        let self_ref = NodeRef::new("127.0.0.1", 50001);
        let handle = NodeHandle::new(self_ref.clone(), test_config());
        handle.init_as_seed();
        let result = closest_preceding_node(&handle, self_ref.id.wrapping_add(5));
        assert_eq!(result, self_ref);
    }

    #[test]
    fn local_lookup_reports_not_found_for_missing_key() {
        let self_ref = NodeRef::new("127.0.0.1", 50002);
        let handle = NodeHandle::new(self_ref, test_config());
        let result = local_lookup(&handle, "missing-key");
        assert_eq!(result.status, crate::kv::KvStatus::NotFound);
        assert!(result.value.is_none());
    }
}
