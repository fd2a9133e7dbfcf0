use crate::utils::graph::{GraphBase, NodeId, Predecessors, RootedGraph, Successors};

/// Edge-list graph rooted at node 0.
pub struct TestGraph {
    node_count: usize,
    edges: Vec<(NodeId, NodeId)>,
}

impl TestGraph {
    pub fn new(node_count: usize, edges: &[(usize, usize)]) -> Self {
        TestGraph {
            node_count,
            edges: edges
                .iter()
                .map(|(from, to)| (NodeId::new(*from), NodeId::new(*to)))
                .collect(),
        }
    }
}

impl GraphBase for TestGraph {
    fn node_count(&self) -> usize {
        self.node_count
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.node_count).map(NodeId::new)
    }
}

impl Successors for TestGraph {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.edges
            .iter()
            .filter(move |(from, _)| *from == node)
            .map(|(_, to)| *to)
    }
}

impl Predecessors for TestGraph {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.edges
            .iter()
            .filter(move |(_, to)| *to == node)
            .map(|(from, _)| *from)
    }
}

impl RootedGraph for TestGraph {
    fn entry(&self) -> NodeId {
        NodeId::new(0)
    }
}
