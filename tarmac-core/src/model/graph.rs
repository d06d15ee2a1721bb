//! The inferred surface-movement graph and its read-only query surface

use std::collections::BTreeMap;

use hashbrown::{HashMap, HashSet};
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};

use super::edge::{Edge, EdgeKey};
use super::node::{Node, NodeId, NodeType};
use crate::Error;

/// Node map keyed by id plus a canonical edge list.
///
/// Every edge references two present nodes, no unordered pair appears twice
/// and there are no self-loops. The constructor enforces this, so a value of
/// this type always satisfies it. There are no mutators; the adjacency index
/// is built once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "GraphParts")]
pub struct TopologyGraph {
    nodes: BTreeMap<NodeId, Node>,
    edges: Vec<Edge>,
    #[serde(skip)]
    index: AdjacencyIndex,
}

/// Unvalidated serialized form.
#[derive(Debug, Deserialize)]
struct GraphParts {
    nodes: BTreeMap<NodeId, Node>,
    edges: Vec<Edge>,
}

impl TryFrom<GraphParts> for TopologyGraph {
    type Error = Error;

    fn try_from(parts: GraphParts) -> Result<Self, Self::Error> {
        for (key, node) in &parts.nodes {
            if key != &node.id {
                return Err(Error::InvalidGraph(format!(
                    "node stored under '{key}' has id '{}'",
                    node.id
                )));
            }
        }
        Self::from_map(parts.nodes, parts.edges)
    }
}

#[derive(Debug, Clone, Default)]
struct AdjacencyIndex {
    graph: UnGraph<usize, usize>,
    by_id: HashMap<NodeId, NodeIndex>,
    ids: Vec<NodeId>,
}

impl TopologyGraph {
    /// Builds a graph, validating ids and edge references.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGraph`] on duplicate node ids, dangling or
    /// non-canonical edge endpoints, self-loops or duplicate pairs.
    pub fn new(nodes: impl IntoIterator<Item = Node>, edges: Vec<Edge>) -> Result<Self, Error> {
        let mut map = BTreeMap::new();
        for node in nodes {
            if let Some(previous) = map.insert(node.id.clone(), node) {
                return Err(Error::InvalidGraph(format!(
                    "duplicate node id '{}'",
                    previous.id
                )));
            }
        }
        Self::from_map(map, edges)
    }

    pub fn empty() -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: Vec::new(),
            index: AdjacencyIndex::default(),
        }
    }

    fn from_map(nodes: BTreeMap<NodeId, Node>, mut edges: Vec<Edge>) -> Result<Self, Error> {
        let mut seen: HashSet<EdgeKey> = HashSet::with_capacity(edges.len());
        for edge in &edges {
            let key = edge.key().ok_or_else(|| {
                Error::InvalidGraph(format!("self-loop on node '{}'", edge.node_a))
            })?;
            if key.node_a() != edge.node_a {
                return Err(Error::InvalidGraph(format!(
                    "edge ({}, {}) is not in canonical order",
                    edge.node_a, edge.node_b
                )));
            }
            for endpoint in [&edge.node_a, &edge.node_b] {
                if !nodes.contains_key(endpoint) {
                    return Err(Error::InvalidGraph(format!(
                        "edge references unknown node '{endpoint}'"
                    )));
                }
            }
            if !seen.insert(key) {
                return Err(Error::InvalidGraph(format!(
                    "duplicate edge ({}, {})",
                    edge.node_a, edge.node_b
                )));
            }
        }
        edges.sort_by(|x, y| (&x.node_a, &x.node_b).cmp(&(&y.node_a, &y.node_b)));

        let index = AdjacencyIndex::build(&nodes, &edges);
        Ok(Self {
            nodes,
            edges,
            index,
        })
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Edges in canonical key order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, a: &str, b: &str) -> Option<&Edge> {
        let key = EdgeKey::new(a, b)?;
        let pos = self.index.edge_position(key.node_a(), key.node_b())?;
        self.edges.get(pos)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids adjacent to `id`, sorted. Empty for unknown ids.
    pub fn neighbors(&self, id: &str) -> Vec<&str> {
        let Some(&idx) = self.index.by_id.get(id) else {
            return Vec::new();
        };
        let mut ids: Vec<&str> = self
            .index
            .graph
            .neighbors(idx)
            .map(|n| self.index.ids[self.index.graph[n]].as_str())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Nodes without incident edges. Useful as a validation signal.
    pub fn isolated_nodes(&self) -> Vec<&Node> {
        self.nodes
            .values()
            .filter(|node| {
                self.index
                    .by_id
                    .get(&node.id)
                    .is_some_and(|&idx| self.index.graph.neighbors(idx).next().is_none())
            })
            .collect()
    }

    /// Sum of usage counts of edges incident to each node.
    pub fn node_usage(&self) -> BTreeMap<&str, u64> {
        let mut usage: BTreeMap<&str, u64> =
            self.nodes.keys().map(|id| (id.as_str(), 0)).collect();
        for edge in &self.edges {
            for endpoint in [&edge.node_a, &edge.node_b] {
                if let Some(total) = usage.get_mut(endpoint.as_str()) {
                    *total += edge.usage_count;
                }
            }
        }
        usage
    }

    /// Node with the highest incident usage; ties resolve to the smallest id.
    pub fn busiest_node(&self) -> Option<(&Node, u64)> {
        let mut best: Option<(&str, u64)> = None;
        for (id, usage) in self.node_usage() {
            if usage > 0 && best.is_none_or(|(_, top)| usage > top) {
                best = Some((id, usage));
            }
        }
        best.and_then(|(id, usage)| self.nodes.get(id).map(|node| (node, usage)))
    }

    /// Edge with the highest usage; ties resolve to the first in key order.
    pub fn busiest_edge(&self) -> Option<&Edge> {
        self.edges
            .iter()
            .fold(None, |best: Option<&Edge>, edge| match best {
                Some(top) if top.usage_count >= edge.usage_count => Some(top),
                _ => Some(edge),
            })
    }

    /// Count per node type, zero entries included.
    pub fn node_counts_by_type(&self) -> BTreeMap<NodeType, usize> {
        let mut counts: BTreeMap<NodeType, usize> =
            NodeType::ALL.iter().map(|&t| (t, 0)).collect();
        for node in self.nodes.values() {
            *counts.entry(node.node_type).or_default() += 1;
        }
        counts
    }

    pub fn total_usage(&self) -> u64 {
        self.edges.iter().map(|e| e.usage_count).sum()
    }

    pub fn connected_components(&self) -> usize {
        petgraph::algo::connected_components(&self.index.graph)
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            node_count: self.node_count(),
            edge_count: self.edge_count(),
            nodes_by_type: self.node_counts_by_type(),
            total_usage: self.total_usage(),
            isolated_nodes: self.isolated_nodes().len(),
            connected_components: self.connected_components(),
            busiest_node: self.busiest_node().map(|(node, usage)| NodeUsage {
                id: node.id.clone(),
                usage,
            }),
            busiest_edge: self.busiest_edge().map(|edge| EdgeUsageSummary {
                node_a: edge.node_a.clone(),
                node_b: edge.node_b.clone(),
                usage: edge.usage_count,
            }),
        }
    }
}

impl AdjacencyIndex {
    fn build(nodes: &BTreeMap<NodeId, Node>, edges: &[Edge]) -> Self {
        let mut graph = UnGraph::with_capacity(nodes.len(), edges.len());
        let mut by_id = HashMap::with_capacity(nodes.len());
        let mut ids = Vec::with_capacity(nodes.len());
        for id in nodes.keys() {
            let idx = graph.add_node(ids.len());
            ids.push(id.clone());
            by_id.insert(id.clone(), idx);
        }
        for (pos, edge) in edges.iter().enumerate() {
            if let (Some(&a), Some(&b)) = (by_id.get(&edge.node_a), by_id.get(&edge.node_b)) {
                graph.add_edge(a, b, pos);
            }
        }
        Self { graph, by_id, ids }
    }

    fn edge_position(&self, a: &str, b: &str) -> Option<usize> {
        let (&ia, &ib) = (self.by_id.get(a)?, self.by_id.get(b)?);
        self.graph.find_edge(ia, ib).map(|e| self.graph[e])
    }
}

/// Aggregate statistics of a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes_by_type: BTreeMap<NodeType, usize>,
    pub total_usage: u64,
    pub isolated_nodes: usize,
    pub connected_components: usize,
    pub busiest_node: Option<NodeUsage>,
    pub busiest_edge: Option<EdgeUsageSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeUsage {
    pub id: NodeId,
    pub usage: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeUsageSummary {
    pub node_a: NodeId,
    pub node_b: NodeId,
    pub usage: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::{DetectionStrategy, NodeStats};

    fn node(id: &str, node_type: NodeType) -> Node {
        Node {
            id: id.to_string(),
            node_type,
            lat: 0.0,
            lon: 0.0,
            support_count: 1,
            stats: NodeStats::Taxiway { point_count: 1 },
            strategy: DetectionStrategy::DwellBased,
        }
    }

    fn edge(a: &str, b: &str, usage: u64) -> Edge {
        Edge {
            node_a: a.to_string(),
            node_b: b.to_string(),
            distance_m: 10.0,
            usage_count: usage,
            edge_types: Default::default(),
        }
    }

    fn sample() -> TopologyGraph {
        TopologyGraph::new(
            vec![
                node("a", NodeType::Stand),
                node("b", NodeType::Taxiway),
                node("c", NodeType::Taxiway),
                node("d", NodeType::Runway),
                node("e", NodeType::Stand),
            ],
            vec![edge("b", "c", 4), edge("a", "b", 2), edge("c", "d", 3)],
        )
        .unwrap()
    }

    #[test]
    fn neighbors_and_isolated() {
        let graph = sample();
        assert_eq!(graph.neighbors("b"), vec!["a", "c"]);
        assert_eq!(graph.neighbors("missing"), Vec::<&str>::new());
        let isolated: Vec<&str> = graph.isolated_nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(isolated, vec!["e"]);
        assert_eq!(graph.connected_components(), 2);
    }

    #[test]
    fn busiest_by_usage() {
        let graph = sample();
        let (busiest, usage) = graph.busiest_node().unwrap();
        assert_eq!((busiest.id.as_str(), usage), ("c", 7));
        let edge = graph.busiest_edge().unwrap();
        assert_eq!((edge.node_a.as_str(), edge.node_b.as_str()), ("b", "c"));
    }

    #[test]
    fn counts_by_type_include_zeros() {
        let graph = TopologyGraph::new(vec![node("a", NodeType::Stand)], vec![]).unwrap();
        let counts = graph.node_counts_by_type();
        assert_eq!(counts[&NodeType::Stand], 1);
        assert_eq!(counts[&NodeType::Runway], 0);
        assert!(graph.busiest_node().is_none());
        assert!(graph.busiest_edge().is_none());
    }

    #[test]
    fn edge_lookup_is_order_independent() {
        let graph = sample();
        assert_eq!(graph.edge("d", "c").map(|e| e.usage_count), Some(3));
        assert!(graph.edge("a", "d").is_none());
        assert!(graph.edge("a", "a").is_none());
    }

    #[test]
    fn rejects_invariant_violations() {
        let nodes = || vec![node("a", NodeType::Stand), node("b", NodeType::Stand)];
        assert!(TopologyGraph::new(nodes(), vec![edge("a", "a", 1)]).is_err());
        assert!(TopologyGraph::new(nodes(), vec![edge("a", "z", 1)]).is_err());
        assert!(TopologyGraph::new(nodes(), vec![edge("b", "a", 1)]).is_err());
        assert!(TopologyGraph::new(nodes(), vec![edge("a", "b", 1), edge("a", "b", 2)]).is_err());
        assert!(
            TopologyGraph::new(vec![node("a", NodeType::Stand), node("a", NodeType::Runway)], vec![])
                .is_err()
        );
    }

    #[test]
    fn json_roundtrip_revalidates() {
        let graph = sample();
        let json = serde_json::to_string(&graph).unwrap();
        let back: TopologyGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back.edge_count(), 3);
        assert_eq!(back.neighbors("c"), vec!["b", "d"]);

        let broken = json.replace("\"node_b\":\"d\"", "\"node_b\":\"x\"");
        assert!(serde_json::from_str::<TopologyGraph>(&broken).is_err());
    }
}
