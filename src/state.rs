//! Per-node state and the handle through which every other module touches
//! it. All mutation is serialized behind `NodeHandle::state`'s single
//! mutex, per spec.md §5.

use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::finger_table::FingerTable;
use crate::kv::Store;
use crate::noderef::NodeRef;

pub struct NodeState {
    pub predecessor: NodeRef,
    pub successor: NodeRef,
    pub finger_table: FingerTable,
    pub next_finger: usize,
    pub local_store: Store,
    pub pred_replica_store: Store,
    pub succ_replica_store: Store,
    pub maintenance_paused: bool,
    /// Monotonic counter stamped onto every locally-originated write, used
    /// by `update_data`'s merge to resolve conflicts last-writer-wins.
    pub put_seq: u64,
}

impl NodeState {
    pub fn new(self_id: crate::identifier::Id) -> Self {
        NodeState {
            predecessor: NodeRef::sentinel(),
            successor: NodeRef::sentinel(),
            finger_table: FingerTable::new(self_id),
            next_finger: 0,
            local_store: Store::new(),
            pred_replica_store: Store::new(),
            succ_replica_store: Store::new(),
            maintenance_paused: false,
            put_seq: 0,
        }
    }

    pub fn next_seq(&mut self) -> u64 {
        self.put_seq += 1;
        self.put_seq
    }
}

/// Cheaply cloneable handle shared between the gRPC service, the
/// maintenance loop, and the CLI-facing routing entry points.
#[derive(Clone)]
pub struct NodeHandle {
    pub self_ref: NodeRef,
    pub state: Arc<Mutex<NodeState>>,
    pub config: Arc<Config>,
}

impl NodeHandle {
    pub fn new(self_ref: NodeRef, config: Config) -> Self {
        let state = NodeState::new(self_ref.id);
        NodeHandle {
            state: Arc::new(Mutex::new(state)),
            self_ref,
            config: Arc::new(config),
        }
    }

    /// Initialize as the sole member of a fresh one-node ring: successor is
    /// self, predecessor stays an invalid sentinel until stabilize runs.
    pub fn init_as_seed(&self) {
        let mut state = self.state.lock().unwrap();
        state.successor = self.self_ref.clone();
        state.finger_table.set_all(&self.self_ref);
    }
}
