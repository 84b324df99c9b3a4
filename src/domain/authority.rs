// Authority roles and the gate every replicated mutation passes through.

use serde::{Deserialize, Serialize};

/// Identifies one participant (server or client) in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// The server node. Every entity in this game is spawned by, and owned by, the server.
pub const SERVER_NODE: NodeId = NodeId(0);

pub type EntityId = u64;

/// Role of one local entity instance on one node.
///
/// The tag is fixed when the instance is created; the same entity is `Authority` on exactly
/// one node and `Observer` everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Authority,
    Observer,
}

impl Role {
    pub fn for_node(local: NodeId, authority: NodeId) -> Self {
        if local == authority {
            Role::Authority
        } else {
            Role::Observer
        }
    }
}

/// Decides whether the local node may mutate an entity instance.
#[derive(Debug, Clone, Copy)]
pub struct AuthorityGate {
    local: NodeId,
}

impl AuthorityGate {
    pub fn new(local: NodeId) -> Self {
        Self { local }
    }

    pub fn local_node(&self) -> NodeId {
        self.local
    }

    pub fn is_authority(&self, role: Role) -> bool {
        role == Role::Authority
    }

    /// True when this node is the entity's controlling (owning) node.
    pub fn is_locally_controlled(&self, controlling: NodeId) -> bool {
        controlling == self.local
    }

    pub fn role_for(&self, authority: NodeId) -> Role {
        Role::for_node(self.local, authority)
    }
}
