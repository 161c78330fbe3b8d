//! Write path with synchronous neighbor replication (spec.md §4.3): each
//! key is authoritative on its owner and replicated onto both immediate
//! neighbors, so a single node loss cannot lose it.

use tonic::Request;

use crate::chord_proto;
use crate::error::ChordError;
use crate::identifier::{between, hash};
use crate::kv::{KvResult, Place, StoredValue};
use crate::noderef::dial;
use crate::routing::closest_preceding_node;
use crate::state::NodeHandle;

/// Write `key -> value`, replicating to both neighbors on the owning node.
pub async fn put(handle: &NodeHandle, key: &str, value: &str) -> Result<KvResult, ChordError> {
    let h = hash(key);
    let (predecessor, successor, self_id) = {
        let state = handle.state.lock().unwrap();
        (
            state.predecessor.clone(),
            state.successor.clone(),
            handle.self_ref.id,
        )
    };

    if between(h, predecessor.id, self_id) {
        let result = do_put(handle, key, value, Place::Local).await?;

        if predecessor.valid {
            replicate(handle, &predecessor, key, value, Place::Successor).await;
        }
        if successor.valid {
            replicate(handle, &successor, key, value, Place::Predecessor).await;
        }

        return Ok(result);
    }

    let next = closest_preceding_node(handle, h);
    if next.id == handle.self_ref.id {
        // No progress possible; treat as owner to avoid looping forever.
        return do_put(handle, key, value, Place::Local).await;
    }
    let mut client = dial(&next, handle.config.rpc_timeout).await?;
    let response = client
        .put(Request::new(chord_proto::PutRequest {
            key: key.to_string(),
            value: value.to_string(),
        }))
        .await?
        .into_inner();
    Ok(response.into())
}

/// Best-effort replica push to one neighbor. Failures are logged and never
/// propagated, per spec.md §4.3 step 4.
async fn replicate(
    handle: &NodeHandle,
    neighbor: &crate::noderef::NodeRef,
    key: &str,
    value: &str,
    place_at_neighbor: Place,
) {
    let seq = {
        let state = handle.state.lock().unwrap();
        state.local_store.get(key).map(|v| v.seq).unwrap_or(0)
    };
    let dial_result = dial(neighbor, handle.config.rpc_timeout).await;
    let mut client = match dial_result {
        Ok(c) => c,
        Err(e) => {
            log::warn!("replica push for {key:?} to {neighbor} failed: {e}");
            return;
        }
    };
    let request = chord_proto::DoPutRequest {
        key: key.to_string(),
        value: value.to_string(),
        place: chord_proto::Place::from(place_at_neighbor) as i32,
        seq,
    };
    if let Err(e) = client.do_put(Request::new(request)).await {
        log::warn!("replica push for {key:?} to {neighbor} failed: {e}");
    }
}

/// Write into the local store named by `place`: `Local` writes the
/// authoritative store (bumping the sequence counter); `Predecessor` /
/// `Successor` write the corresponding replica store, applying
/// last-writer-wins by sequence number.
pub async fn do_put(
    handle: &NodeHandle,
    key: &str,
    value: &str,
    place: Place,
) -> Result<KvResult, ChordError> {
    let mut state = handle.state.lock().unwrap();
    match place {
        Place::Local => {
            let seq = state.next_seq();
            state.local_store.insert(
                key.to_string(),
                StoredValue {
                    value: value.to_string(),
                    seq,
                },
            );
        }
        Place::Predecessor => insert_lww(&mut state.pred_replica_store, key, value, state.put_seq),
        Place::Successor => insert_lww(&mut state.succ_replica_store, key, value, state.put_seq),
    }
    Ok(KvResult::valid(key, value, handle.self_ref.id))
}

/// As above but with an explicit sequence number supplied by the caller
/// (used when a replica push arrives over RPC, see `service::do_put`).
pub fn insert_lww(store: &mut crate::kv::Store, key: &str, value: &str, seq: u64) {
    let should_write = match store.get(key) {
        Some(existing) => seq >= existing.seq,
        None => true,
    };
    if should_write {
        store.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                seq,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::noderef::NodeRef;
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

    #[tokio::test]
    async fn do_put_local_is_idempotent_in_value() {
        let self_ref = NodeRef::new("127.0.0.1", 50003);
        let handle = NodeHandle::new(self_ref, test_config());
        do_put(&handle, "k", "v", Place::Local).await.unwrap();
        do_put(&handle, "k", "v", Place::Local).await.unwrap();
        let state = handle.state.lock().unwrap();
        assert_eq!(state.local_store.get("k").unwrap().value, "v");
    }

    #[test]
    fn insert_lww_keeps_higher_sequence_value() {
        let mut store = crate::kv::Store::new();
        insert_lww(&mut store, "k", "old", 1);
        insert_lww(&mut store, "k", "stale", 0);
        assert_eq!(store.get("k").unwrap().value, "old");
        insert_lww(&mut store, "k", "new", 2);
        assert_eq!(store.get("k").unwrap().value, "new");
    }
}
