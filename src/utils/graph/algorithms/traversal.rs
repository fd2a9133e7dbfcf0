//! Graph traversal algorithms.
//!
//! - [`bfs`] - Breadth-first search
//! - [`postorder`] - Depth-first search with post-order visitation
//! - [`reverse_postorder`] - Reverse post-order (useful for forward data flow)
//!
//! [`bfs`] is a lazy iterator; [`postorder`] and [`reverse_postorder`] need the
//! whole traversal anyway and return vectors. All traversals are iterative, so
//! deep graphs cannot overflow the stack.

use std::collections::VecDeque;

use crate::utils::graph::{NodeId, Successors};

/// Breadth-first search iterator over graph nodes.
pub struct BfsIterator<'g, G: Successors> {
    graph: &'g G,
    queue: VecDeque<NodeId>,
    visited: Vec<bool>,
}

impl<'g, G: Successors> BfsIterator<'g, G> {
    fn new(graph: &'g G, start: NodeId) -> Self {
        let node_count = graph.node_count();
        let mut visited = vec![false; node_count];
        let mut queue = VecDeque::new();
        if start.index() < node_count {
            visited[start.index()] = true;
            queue.push_back(start);
        }
        BfsIterator {
            graph,
            queue,
            visited,
        }
    }
}

impl<G: Successors> Iterator for BfsIterator<'_, G> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.queue.pop_front()?;
        for succ in self.graph.successors(node) {
            if !self.visited[succ.index()] {
                self.visited[succ.index()] = true;
                self.queue.push_back(succ);
            }
        }
        Some(node)
    }
}

/// Returns a breadth-first search iterator starting from `start`.
///
/// Nodes are yielded in order of increasing distance from `start`.
pub fn bfs<G: Successors>(graph: &G, start: NodeId) -> BfsIterator<'_, G> {
    BfsIterator::new(graph, start)
}

/// Computes the postorder of the nodes reachable from `start`.
///
/// A node is emitted after all nodes first discovered through it.
#[allow(clippy::items_after_statements)]
pub fn postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let node_count = graph.node_count();
    if start.index() >= node_count {
        return Vec::new();
    }

    let mut visited = vec![false; node_count];
    let mut result = Vec::with_capacity(node_count);

    #[derive(Clone, Copy)]
    enum State {
        Enter,
        Exit,
    }

    let mut stack = vec![(start, State::Enter)];
    while let Some((node, state)) = stack.pop() {
        match state {
            State::Enter => {
                if visited[node.index()] {
                    continue;
                }
                visited[node.index()] = true;
                stack.push((node, State::Exit));

                let successors: Vec<NodeId> = graph.successors(node).collect();
                for &succ in successors.iter().rev() {
                    if !visited[succ.index()] {
                        stack.push((succ, State::Enter));
                    }
                }
            }
            State::Exit => result.push(node),
        }
    }

    result
}

/// Computes the reverse postorder of the nodes reachable from `start`.
///
/// In reverse postorder every node precedes its successors except along back
/// edges, which makes it the natural iteration order for forward problems such
/// as dominator computation.
pub fn reverse_postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let mut result = postorder(graph, start);
    result.reverse();
    result
}
