//! Join, notify, graceful leave, and ring repair after a successor failure
//! (spec.md §4.4).

use tonic::Request;

use crate::chord_proto;
use crate::error::ChordError;
use crate::identifier::between;
use crate::kv::store_to_map;
use crate::noderef::{dial, NodeRef};
use crate::routing::{node_ref_from_msg, node_ref_to_msg};
use crate::state::NodeHandle;

/// Join the ring through `bootstrap`: ask it for our successor. The
/// predecessor stays an invalid sentinel until stabilize populates it.
pub async fn join(handle: &NodeHandle, bootstrap: &NodeRef) -> Result<(), ChordError> {
    let mut client = dial(bootstrap, handle.config.rpc_timeout).await?;
    let response = client
        .find_successor(Request::new(chord_proto::FindSuccessorRequest {
            id: handle.self_ref.id,
        }))
        .await?
        .into_inner();
    let successor = node_ref_from_msg(response);
    let mut state = handle.state.lock().unwrap();
    state.successor = successor;
    Ok(())
}

/// Called (over RPC) by a node that believes it may be our predecessor.
pub fn notify(handle: &NodeHandle, candidate: NodeRef) {
    let mut state = handle.state.lock().unwrap();
    if !state.predecessor.valid || between(candidate.id, state.predecessor.id, handle.self_ref.id) {
        log::debug!("adopting new predecessor {candidate}");
        state.predecessor = candidate;
    }
}

/// Graceful departure: hand neighbor pointers to each other, push every
/// locally-owned key through the successor so ownership transfer completes
/// before this node exits (the explicit re-put strategy spec.md recommends
/// for determinism), then reset to a fresh one-node state.
pub async fn leave_network(handle: &NodeHandle) -> Result<(), ChordError> {
    let (predecessor, successor) = {
        let mut state = handle.state.lock().unwrap();
        state.maintenance_paused = true;
        (state.predecessor.clone(), state.successor.clone())
    };

    let mut successor_client = dial(&successor, handle.config.rpc_timeout).await?;
    let mut predecessor_client = dial(&predecessor, handle.config.rpc_timeout).await?;

    successor_client
        .pause_stability_tests(Request::new(chord_proto::Empty {}))
        .await?;
    predecessor_client
        .pause_stability_tests(Request::new(chord_proto::Empty {}))
        .await?;

    successor_client
        .update_predecessor(Request::new(node_ref_to_msg(&predecessor)))
        .await?;
    predecessor_client
        .update_successor(Request::new(node_ref_to_msg(&successor)))
        .await?;

    successor_client
        .resume_stability_tests(Request::new(chord_proto::Empty {}))
        .await?;
    predecessor_client
        .resume_stability_tests(Request::new(chord_proto::Empty {}))
        .await?;

    let local_entries = {
        let state = handle.state.lock().unwrap();
        store_to_map(&state.local_store)
    };
    for (key, value) in local_entries {
        if let Err(e) = successor_client
            .put(Request::new(chord_proto::PutRequest { key: key.clone(), value }))
            .await
        {
            log::warn!("leave_network: failed to hand off key {key:?}: {e}");
        }
    }

    let mut state = handle.state.lock().unwrap();
    state.predecessor = handle.self_ref.clone();
    state.successor = handle.self_ref.clone();
    state.local_store.clear();
    state.pred_replica_store.clear();
    state.succ_replica_store.clear();
    state.maintenance_paused = false;
    Ok(())
}

pub fn update_predecessor(handle: &NodeHandle, predecessor: NodeRef) {
    handle.state.lock().unwrap().predecessor = predecessor;
}

pub fn update_successor(handle: &NodeHandle, successor: NodeRef) {
    handle.state.lock().unwrap().successor = successor;
}

/// Refresh `pred_replica_store` with our predecessor's authoritative store.
pub async fn update_predecessor_kv_store(handle: &NodeHandle) -> Result<(), ChordError> {
    let predecessor = handle.state.lock().unwrap().predecessor.clone();
    if !predecessor.valid {
        return Ok(());
    }
    let mut client = dial(&predecessor, handle.config.rpc_timeout).await?;
    let map = client
        .get_all_data(Request::new(chord_proto::GetAllDataRequest {
            place: chord_proto::Place::Owner as i32,
        }))
        .await?
        .into_inner()
        .entries;
    let mut state = handle.state.lock().unwrap();
    state.pred_replica_store = map
        .into_iter()
        .map(|(k, v)| (k, crate::kv::StoredValue { value: v, seq: 0 }))
        .collect();
    Ok(())
}

/// Refresh `succ_replica_store` with our successor's authoritative store.
pub async fn update_successor_kv_store(handle: &NodeHandle) -> Result<(), ChordError> {
    let successor = handle.state.lock().unwrap().successor.clone();
    if !successor.valid {
        return Ok(());
    }
    let mut client = dial(&successor, handle.config.rpc_timeout).await?;
    let map = client
        .get_all_data(Request::new(chord_proto::GetAllDataRequest {
            place: chord_proto::Place::Owner as i32,
        }))
        .await?
        .into_inner()
        .entries;
    let mut state = handle.state.lock().unwrap();
    state.succ_replica_store = map
        .into_iter()
        .map(|(k, v)| (k, crate::kv::StoredValue { value: v, seq: 0 }))
        .collect();
    Ok(())
}

/// Repair the ring when stabilize cannot reach the successor: find a live
/// replacement by walking fingers, salvage the dead node's keys out of the
/// new successor's predecessor-replica store, and splice it in.
pub async fn fix_chord(handle: &NodeHandle) -> Result<(), ChordError> {
    handle.state.lock().unwrap().maintenance_paused = true;

    let new_successor = find_alive_successor(handle).await;

    if new_successor.id != handle.self_ref.id {
        if let Ok(mut client) = dial(&new_successor, handle.config.rpc_timeout).await {
            let _ = client
                .pause_stability_tests(Request::new(chord_proto::Empty {}))
                .await;

            // Salvage: the keys the dead node's successor was holding as a
            // pred_replica belonged to the node we just lost. Promote them
            // into the new successor's own authoritative store.
            if let Ok(resp) = client
                .get_all_data(Request::new(chord_proto::GetAllDataRequest {
                    place: chord_proto::Place::Predecessor as i32,
                }))
                .await
            {
                for (key, value) in resp.into_inner().entries {
                    let _ = client
                        .do_put(Request::new(chord_proto::DoPutRequest {
                            key,
                            value,
                            place: chord_proto::Place::Owner as i32,
                            seq: 0,
                        }))
                        .await;
                }
            }

            handle.state.lock().unwrap().successor = new_successor.clone();

            let _ = client
                .update_predecessor(Request::new(node_ref_to_msg(&handle.self_ref)))
                .await;

            let _ = client
                .resume_stability_tests(Request::new(chord_proto::Empty {}))
                .await;
        }
    }

    handle.state.lock().unwrap().maintenance_paused = false;
    Ok(())
}

/// Walk the finger table looking for a live peer, asking each in turn for
/// the farthest reachable node in its predecessor chain. Falls back to
/// `self` only once every finger has been tried and failed (spec.md §9
/// corrects the source's first-iteration-only bug here).
async fn find_alive_successor(handle: &NodeHandle) -> NodeRef {
    let fingers: Vec<NodeRef> = {
        let state = handle.state.lock().unwrap();
        state
            .finger_table
            .entries
            .iter()
            .filter_map(|f| f.node.clone())
            .filter(|n| n.valid && n.id != handle.self_ref.id)
            .collect()
    };

    for finger in fingers {
        if let Ok(mut client) = dial(&finger, handle.config.rpc_timeout).await {
            if let Ok(resp) = client.check_predecessor(Request::new(chord_proto::Empty {})).await {
                return node_ref_from_msg(resp.into_inner());
            }
        }
    }
    handle.self_ref.clone()
}

/// Recursively walk the predecessor chain to find the farthest reachable
/// node — the handler behind the wire `check_predecessor` RPC, used only by
/// `fix_chord`. Named `walk_predecessor_chain` internally per spec.md §9 to
/// disambiguate it from the periodic liveness probe in `maintenance.rs`.
pub async fn walk_predecessor_chain(handle: &NodeHandle) -> NodeRef {
    let predecessor = handle.state.lock().unwrap().predecessor.clone();
    if !predecessor.valid {
        return handle.self_ref.clone();
    }
    match dial(&predecessor, handle.config.rpc_timeout).await {
        Ok(mut client) => match client.check_predecessor(Request::new(chord_proto::Empty {})).await {
            Ok(resp) => node_ref_from_msg(resp.into_inner()),
            Err(_) => handle.self_ref.clone(),
        },
        Err(_) => handle.self_ref.clone(),
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
            rpc_timeout: Duration::from_millis(50),
            dev_mode: false,
            identifier_bits: crate::identifier::M,
        }
    }

    #[test]
    fn notify_adopts_candidate_when_predecessor_invalid() {
        let self_ref = NodeRef::new("127.0.0.1", 50010);
        let handle = NodeHandle::new(self_ref, test_config());
        let candidate = NodeRef::new("127.0.0.1", 50011);
        notify(&handle, candidate.clone());
        assert_eq!(handle.state.lock().unwrap().predecessor, candidate);
    }

    #[test]
    fn notify_ignores_candidate_outside_arc() {
        let self_ref = NodeRef::new("127.0.0.1", 50012);
        let handle = NodeHandle::new(self_ref.clone(), test_config());
        let close = NodeRef::new("127.0.0.1", 50013);
        handle.state.lock().unwrap().predecessor = close.clone();
        // A candidate equal to self can never be a valid predecessor for itself.
        notify(&handle, self_ref.clone());
        assert_eq!(handle.state.lock().unwrap().predecessor, close);
    }
}
