//! Key/value result types and the three storage "places" a node keeps
//! data in: its own authoritative store and the two neighbor replicas.

use std::collections::HashMap;

use crate::chord_proto;

/// Outcome status of a `lookup`/`get` — mirrors spec.md's `KVStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvStatus {
    Valid,
    NotFound,
}

/// Result of `lookup`/`put`/`do_put`, as specified: `value` is only
/// meaningful when `status == Valid`.
#[derive(Debug, Clone)]
pub struct KvResult {
    pub key: String,
    pub value: Option<String>,
    pub node_id: u64,
    pub status: KvStatus,
}

impl KvResult {
    pub fn valid(key: impl Into<String>, value: impl Into<String>, node_id: u64) -> Self {
        KvResult {
            key: key.into(),
            value: Some(value.into()),
            node_id,
            status: KvStatus::Valid,
        }
    }

    pub fn not_found(key: impl Into<String>, node_id: u64) -> Self {
        KvResult {
            key: key.into(),
            value: None,
            node_id,
            status: KvStatus::NotFound,
        }
    }
}

impl From<KvResult> for chord_proto::KvResultMsg {
    fn from(r: KvResult) -> Self {
        chord_proto::KvResultMsg {
            key: r.key,
            value: r.value.unwrap_or_default(),
            node_id: r.node_id,
            status: match r.status {
                KvStatus::Valid => chord_proto::KvStatus::Valid as i32,
                KvStatus::NotFound => chord_proto::KvStatus::NotFound as i32,
            },
        }
    }
}

impl From<chord_proto::KvResultMsg> for KvResult {
    fn from(m: chord_proto::KvResultMsg) -> Self {
        let status = if m.status == chord_proto::KvStatus::Valid as i32 {
            KvStatus::Valid
        } else {
            KvStatus::NotFound
        };
        KvResult {
            key: m.key,
            value: match status {
                KvStatus::Valid => Some(m.value),
                KvStatus::NotFound => None,
            },
            node_id: m.node_id,
            status,
        }
    }
}

/// Which store a `do_put`/`get_all_data` call addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Place {
    /// This node's own authoritative store.
    Local,
    /// The replica of the predecessor's authoritative data.
    Predecessor,
    /// The replica of the successor's authoritative data.
    Successor,
}

impl From<Place> for chord_proto::Place {
    fn from(p: Place) -> Self {
        match p {
            Place::Local => chord_proto::Place::Owner,
            Place::Predecessor => chord_proto::Place::Predecessor,
            Place::Successor => chord_proto::Place::Successor,
        }
    }
}

impl From<i32> for Place {
    fn from(v: i32) -> Self {
        if v == chord_proto::Place::Predecessor as i32 {
            Place::Predecessor
        } else if v == chord_proto::Place::Successor as i32 {
            Place::Successor
        } else {
            Place::Local
        }
    }
}

/// A value as stored internally, tagged with a monotonic sequence number so
/// `update_data`'s merge can resolve replica/authoritative conflicts with
/// last-writer-wins (see SPEC_FULL.md §4.5 / §9).
#[derive(Debug, Clone)]
pub struct StoredValue {
    pub value: String,
    pub seq: u64,
}

pub type Store = HashMap<String, StoredValue>;

pub fn store_to_map(store: &Store) -> HashMap<String, String> {
    store.iter().map(|(k, v)| (k.clone(), v.value.clone())).collect()
}
