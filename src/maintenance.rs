//! The periodic maintenance protocol: stabilize, fix_fingers,
//! check_predecessor, update_data (spec.md §4.5). A scheduler fires every
//! `INTERVAL`; each tick runs under a try-guard so one failure never stops
//! the loop, and reschedules itself unconditionally.

use std::time::Duration;

use tonic::Request;

use crate::chord_proto;
use crate::error::ChordError;
use crate::identifier::{between, ring_size};
use crate::kv::{store_to_map, Place};
use crate::membership::{self};
use crate::noderef::{dial, NodeRef};
use crate::routing::node_ref_from_msg;
use crate::state::NodeHandle;

/// Run the maintenance loop forever, one tick every `handle.config.interval`.
pub async fn run_forever(handle: NodeHandle) {
    let mut ticker = tokio::time::interval(handle.config.interval);
    loop {
        ticker.tick().await;
        if let Err(e) = tick(&handle).await {
            log::warn!("maintenance tick failed: {e}");
        }
    }
}

async fn tick(handle: &NodeHandle) -> Result<(), ChordError> {
    stabilize(handle).await;
    fix_fingers(handle).await?;
    check_predecessor(handle).await;
    update_data(handle).await;
    Ok(())
}

/// Ask the successor for its predecessor; adopt it if it lies strictly
/// between us and our current successor, then notify the (possibly new)
/// successor of our existence. If the successor is unreachable, hand off to
/// `fix_chord` and skip the rest of this tick's stabilize.
async fn stabilize(handle: &NodeHandle) {
    if handle.state.lock().unwrap().maintenance_paused {
        return;
    }
    let successor = handle.state.lock().unwrap().successor.clone();

    let mut client = match dial(&successor, handle.config.rpc_timeout).await {
        Ok(c) => c,
        Err(_) => {
            log::warn!("successor {successor} unreachable, running fix_chord");
            if let Err(e) = membership::fix_chord(handle).await {
                log::warn!("fix_chord failed: {e}");
            }
            return;
        }
    };

    if let Ok(resp) = client.get_predecessor(Request::new(chord_proto::Empty {})).await {
        let x = node_ref_from_msg(resp.into_inner());
        if x.valid && between(x.id, handle.self_ref.id, successor.id) {
            log::debug!("stabilize: adopting successor {x} (was {successor})");
            handle.state.lock().unwrap().successor = x;
        }
    }

    let current_successor = handle.state.lock().unwrap().successor.clone();
    let mut client = match dial(&current_successor, handle.config.rpc_timeout).await {
        Ok(c) => c,
        Err(_) => return,
    };
    let _ = client
        .notify(Request::new(crate::routing::node_ref_to_msg(&handle.self_ref)))
        .await;
}

/// Refresh one finger table entry per tick, round-robin.
async fn fix_fingers(handle: &NodeHandle) -> Result<(), ChordError> {
    let i = handle.state.lock().unwrap().next_finger;
    let start = handle.self_ref.id.wrapping_add(1u64 << i) % ring_size();

    match crate::routing::find_successor(handle, start).await {
        Ok(node) => {
            let mut state = handle.state.lock().unwrap();
            state.finger_table.set(i, node);
            state.next_finger = (i + 1) % state.finger_table.len();
        }
        Err(e) => log::warn!("fix_fingers[{i}] failed: {e}"),
    }
    Ok(())
}

/// Periodic liveness probe of the predecessor (not the recursive
/// `walk_predecessor_chain` used by `fix_chord`, and distinct from the wire
/// RPC `check_predecessor`, see spec.md §9). Marks the predecessor invalid
/// if it no longer responds.
async fn check_predecessor(handle: &NodeHandle) {
    let predecessor = handle.state.lock().unwrap().predecessor.clone();
    if !predecessor.valid {
        return;
    }
    let reachable = match dial(&predecessor, handle.config.rpc_timeout).await {
        Ok(mut client) => client.get_id(Request::new(chord_proto::Empty {})).await.is_ok(),
        Err(_) => false,
    };
    if !reachable {
        log::warn!("predecessor {predecessor} unreachable, marking invalid");
        handle.state.lock().unwrap().predecessor = NodeRef::sentinel();
    }
}

/// Pull both neighbors' replica-of-us stores, merge into the authoritative
/// store, drop anything that's drifted out of our ownership arc, then push
/// both neighbors to refresh their replicas of us.
async fn update_data(handle: &NodeHandle) {
    let (predecessor, successor) = {
        let state = handle.state.lock().unwrap();
        (state.predecessor.clone(), state.successor.clone())
    };
    if !predecessor.valid || !successor.valid {
        return;
    }

    let pred_client = dial(&predecessor, handle.config.rpc_timeout).await;
    let succ_client = dial(&successor, handle.config.rpc_timeout).await;
    let (mut pred_client, mut succ_client) = match (pred_client, succ_client) {
        (Ok(p), Ok(s)) => (p, s),
        _ => return,
    };

    if let Ok(resp) = pred_client
        .get_all_data(Request::new(chord_proto::GetAllDataRequest {
            place: chord_proto::Place::Successor as i32,
        }))
        .await
    {
        merge_into_local(handle, resp.into_inner().entries);
    }
    if let Ok(resp) = succ_client
        .get_all_data(Request::new(chord_proto::GetAllDataRequest {
            place: chord_proto::Place::Predecessor as i32,
        }))
        .await
    {
        merge_into_local(handle, resp.into_inner().entries);
    }

    check_and_clean(handle);

    let _ = succ_client
        .update_predecessor_kv_store(Request::new(chord_proto::Empty {}))
        .await;
    let _ = pred_client
        .update_successor_kv_store(Request::new(chord_proto::Empty {}))
        .await;
}

fn merge_into_local(handle: &NodeHandle, entries: std::collections::HashMap<String, String>) {
    let mut state = handle.state.lock().unwrap();
    let seq = state.put_seq;
    for (key, value) in entries {
        crate::replication::insert_lww(&mut state.local_store, &key, &value, seq);
    }
}

/// Drop every locally-held key that no longer falls in `(predecessor, self]`.
fn check_and_clean(handle: &NodeHandle) {
    let keys: Vec<String> = handle.state.lock().unwrap().local_store.keys().cloned().collect();
    let stale: Vec<String> = keys.into_iter().filter(|k| !is_key_for_node(handle, k)).collect();
    let mut state = handle.state.lock().unwrap();
    for key in stale {
        state.local_store.remove(&key);
    }
}

/// Reports whether a key currently falls within this node's ownership arc.
pub fn is_key_for_node(handle: &NodeHandle, key: &str) -> bool {
    let state = handle.state.lock().unwrap();
    between(crate::identifier::hash(key), state.predecessor.id, handle.self_ref.id)
}

/// Snapshot of one of the three stores, used by `get_all_data`.
pub fn snapshot(handle: &NodeHandle, place: Place) -> std::collections::HashMap<String, String> {
    let state = handle.state.lock().unwrap();
    match place {
        Place::Local => store_to_map(&state.local_store),
        Place::Predecessor => store_to_map(&state.pred_replica_store),
        Place::Successor => store_to_map(&state.succ_replica_store),
    }
}

pub fn default_interval() -> Duration {
    Duration::from_secs(1)
}
