//! A Chord-style distributed hash table: N cooperating nodes form a
//! logical ring over an M-bit identifier space and collectively answer
//! `put`/`get` requests for string keys, replicating each key onto its two
//! ring-adjacent neighbors so a single node loss never loses data.

pub mod chord_proto {
    tonic::include_proto!("chord");

    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("chord_descriptor");
}

pub mod config;
pub mod error;
pub mod finger_table;
pub mod identifier;
pub mod kv;
pub mod maintenance;
pub mod membership;
pub mod noderef;
pub mod replication;
pub mod routing;
pub mod service;
pub mod state;
