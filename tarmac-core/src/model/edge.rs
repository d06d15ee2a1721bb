use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::node::NodeId;
use super::point::KinematicClass;

/// Canonical unordered node pair, smaller id first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    a: NodeId,
    b: NodeId,
}

impl EdgeKey {
    /// Returns `None` for a self-pair.
    pub fn new(first: &str, second: &str) -> Option<Self> {
        match first.cmp(second) {
            std::cmp::Ordering::Less => Some(Self {
                a: first.to_string(),
                b: second.to_string(),
            }),
            std::cmp::Ordering::Greater => Some(Self {
                a: second.to_string(),
                b: first.to_string(),
            }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn node_a(&self) -> &str {
        &self.a
    }

    pub fn node_b(&self) -> &str {
        &self.b
    }

    pub fn into_parts(self) -> (NodeId, NodeId) {
        (self.a, self.b)
    }
}

/// Observed link between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub node_a: NodeId,
    pub node_b: NodeId,
    /// Great-circle distance between the node centroids, metres.
    pub distance_m: f64,
    pub usage_count: u64,
    /// Kinematic classes seen on arrival across this link.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub edge_types: BTreeSet<KinematicClass>,
}

impl Edge {
    pub fn key(&self) -> Option<EdgeKey> {
        EdgeKey::new(&self.node_a, &self.node_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_order_independent() {
        assert_eq!(EdgeKey::new("b", "a"), EdgeKey::new("a", "b"));
        let key = EdgeKey::new("z", "m").unwrap();
        assert_eq!(key.node_a(), "m");
        assert_eq!(key.node_b(), "z");
    }

    #[test]
    fn self_pair_has_no_key() {
        assert!(EdgeKey::new("a", "a").is_none());
    }
}
