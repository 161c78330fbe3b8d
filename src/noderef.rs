//! Neighbor handles: a transport-agnostic value type describing a peer,
//! plus the dial helper that turns one into a live gRPC client.

use std::fmt;
use std::time::Duration;

use tonic::transport::{Channel, Endpoint};

use crate::chord_proto::chord_client::ChordClient;
use crate::error::ChordError;
use crate::identifier::{hash_address, Id};

/// A peer on the ring, addressed by value rather than by connection.
#[derive(Debug, Clone)]
pub struct NodeRef {
    pub id: Id,
    pub address: String,
    pub port: u16,
    /// False marks a sentinel, e.g. an unknown predecessor at startup.
    pub valid: bool,
}

impl NodeRef {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        let address = address.into();
        let id = hash_address(&address, port);
        NodeRef {
            id,
            address,
            port,
            valid: true,
        }
    }

    /// An invalid sentinel handle, used to seed `predecessor` before stabilize
    /// has a chance to populate it.
    pub fn sentinel() -> Self {
        NodeRef {
            id: 0,
            address: String::new(),
            port: 0,
            valid: false,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NodeRef {}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            write!(f, "{}@{}:{}", self.id, self.address, self.port)
        } else {
            write!(f, "<none>")
        }
    }
}

/// Dial a peer, bounding the attempt by `timeout`. A failure here is the
/// "transport failure" error kind from spec.md's error taxonomy.
pub async fn dial(node: &NodeRef, timeout: Duration) -> Result<ChordClient<Channel>, ChordError> {
    if !node.valid {
        return Err(ChordError::UnreachablePeer(node.to_string()));
    }
    let endpoint = Endpoint::from_shared(node.url())
        .map_err(|e| ChordError::Configuration(e.to_string()))?
        .connect_timeout(timeout)
        .timeout(timeout);
    endpoint
        .connect()
        .await
        .map(ChordClient::new)
        .map_err(|_| ChordError::UnreachablePeer(node.to_string()))
}
