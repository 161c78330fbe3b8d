//! The per-node routing index: M entries, entry `i` pointing at the
//! successor of `(self.id + 2^i) mod 2^M`.

use crate::identifier::{ring_size, Id, M};
use crate::noderef::NodeRef;

#[derive(Debug, Clone)]
pub struct FingerEntry {
    pub start: Id,
    pub node: Option<NodeRef>,
}

#[derive(Debug, Clone)]
pub struct FingerTable {
    pub entries: Vec<FingerEntry>,
}

impl FingerTable {
    /// Build an empty table (unset entries) for a node with identifier `self_id`.
    pub fn new(self_id: Id) -> Self {
        let entries = (0..M)
            .map(|i| FingerEntry {
                start: self_id.wrapping_add(1u64 << i) % ring_size(),
                node: None,
            })
            .collect();
        FingerTable { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set(&mut self, index: usize, node: NodeRef) {
        self.entries[index].node = Some(node);
    }

    pub fn set_all(&mut self, node: &NodeRef) {
        for entry in &mut self.entries {
            entry.node = Some(node.clone());
        }
    }

    /// Live entries, scanned from the farthest (`M - 1`) down to the nearest,
    /// as `closest_preceding_node` requires.
    pub fn iter_rev(&self) -> impl Iterator<Item = &FingerEntry> {
        self.entries.iter().rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_table_has_m_entries_with_correct_starts() {
        let table = FingerTable::new(100);
        assert_eq!(table.len(), M as usize);
        assert_eq!(table.entries[0].start, 101 % ring_size());
        assert_eq!(table.entries[1].start, 102 % ring_size());
        assert!(table.entries.iter().all(|e| e.node.is_none()));
    }

    #[test]
    fn set_all_points_every_finger_at_node() {
        let mut table = FingerTable::new(5);
        let node = NodeRef::new("127.0.0.1", 50001);
        table.set_all(&node);
        assert!(table.entries.iter().all(|e| e.node.as_ref() == Some(&node)));
    }
}
