//! Index-addressed flow graph.
//!
//! Nodes and edges live in arenas; traversal goes through [`NodeIdx`] and an
//! adjacency index keyed by `(source, handle)`. Loop-back edges into FOR and
//! FOR_EACH nodes are legal; any other cycle is rejected at build time.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::ids::Id;
use crate::types::{Edge, Handle, Node, NoOpKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIdx(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeIdx(pub usize);

impl fmt::Display for NodeIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("edge {edge} references unknown node {node}")]
    UnknownNode { edge: Id, node: Id },
    #[error("flow has no START node")]
    NoStart,
    #[error("flow has more than one START node")]
    MultipleStart,
    #[error("cycle through non-loop node {0:?}")]
    Cycle(String),
}

#[derive(Debug, Clone)]
pub struct FlowGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    by_id: BTreeMap<Id, NodeIdx>,
    adjacency: BTreeMap<(NodeIdx, Handle), Vec<EdgeIdx>>,
    start: NodeIdx,
}

impl FlowGraph {
    /// Build and validate a graph. `noop_kinds` identifies the START node.
    pub fn build(
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        noop_kinds: &BTreeMap<Id, NoOpKind>,
    ) -> Result<Self, GraphError> {
        let by_id: BTreeMap<Id, NodeIdx> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id, NodeIdx(i)))
            .collect();

        let mut adjacency: BTreeMap<(NodeIdx, Handle), Vec<EdgeIdx>> = BTreeMap::new();
        for (i, edge) in edges.iter().enumerate() {
            let src = lookup(&by_id, edge, edge.source_node_id)?;
            lookup(&by_id, edge, edge.target_node_id)?;
            adjacency
                .entry((src, edge.source_handle))
                .or_default()
                .push(EdgeIdx(i));
        }

        let mut starts = nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| noop_kinds.get(&n.id) == Some(&NoOpKind::Start))
            .map(|(i, _)| NodeIdx(i));
        let start = starts.next().ok_or(GraphError::NoStart)?;
        if starts.next().is_some() {
            return Err(GraphError::MultipleStart);
        }

        let graph = Self {
            nodes,
            edges,
            by_id,
            adjacency,
            start,
        };
        graph.check_cycles()?;
        Ok(graph)
    }

    pub fn start(&self) -> NodeIdx {
        self.start
    }

    pub fn node(&self, idx: NodeIdx) -> &Node {
        &self.nodes[idx.0]
    }

    pub fn edge(&self, idx: EdgeIdx) -> &Edge {
        &self.edges[idx.0]
    }

    pub fn index_of(&self, id: Id) -> Option<NodeIdx> {
        self.by_id.get(&id).copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIdx, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeIdx(i), n))
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Targets reachable over `handle`, in edge order.
    pub fn targets(&self, from: NodeIdx, handle: Handle) -> Vec<NodeIdx> {
        self.adjacency
            .get(&(from, handle))
            .map(|edges| {
                edges
                    .iter()
                    .filter_map(|e| self.by_id.get(&self.edges[e.0].target_node_id).copied())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_handle(&self, from: NodeIdx, handle: Handle) -> bool {
        self.adjacency
            .get(&(from, handle))
            .is_some_and(|edges| !edges.is_empty())
    }

    /// Kahn's algorithm over every edge that does not enter a loop node.
    fn check_cycles(&self) -> Result<(), GraphError> {
        let n = self.nodes.len();
        let mut indeg = vec![0usize; n];
        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); n];

        for edge in &self.edges {
            let (Some(src), Some(dst)) = (
                self.index_of(edge.source_node_id),
                self.index_of(edge.target_node_id),
            ) else {
                continue;
            };
            if self.nodes[dst.0].kind.is_loop() {
                continue;
            }
            indeg[dst.0] += 1;
            outgoing[src.0].push(dst.0);
        }

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| indeg[i] == 0).collect();
        let mut seen = 0;
        while let Some(i) = queue.pop_front() {
            seen += 1;
            for &m in &outgoing[i] {
                indeg[m] -= 1;
                if indeg[m] == 0 {
                    queue.push_back(m);
                }
            }
        }

        if seen == n {
            return Ok(());
        }
        let name = indeg
            .iter()
            .position(|&d| d > 0)
            .map(|i| self.nodes[i].name.clone())
            .unwrap_or_default();
        Err(GraphError::Cycle(name))
    }
}

fn lookup(by_id: &BTreeMap<Id, NodeIdx>, edge: &Edge, node: Id) -> Result<NodeIdx, GraphError> {
    by_id
        .get(&node)
        .copied()
        .ok_or(GraphError::UnknownNode {
            edge: edge.id,
            node,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeKind;

    struct Fixture {
        flow: Id,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        noops: BTreeMap<Id, NoOpKind>,
    }

    impl Fixture {
        fn new() -> Self {
            let flow = Id::new();
            let start = Node::new(flow, "start", NodeKind::NoOp);
            let mut noops = BTreeMap::new();
            noops.insert(start.id, NoOpKind::Start);
            Self {
                flow,
                nodes: vec![start],
                edges: Vec::new(),
                noops,
            }
        }

        fn node(&mut self, name: &str, kind: NodeKind) -> Id {
            let n = Node::new(self.flow, name, kind);
            let id = n.id;
            self.nodes.push(n);
            id
        }

        fn edge(&mut self, from: Id, to: Id, handle: Handle) {
            self.edges.push(Edge::new(self.flow, from, to, handle));
        }

        fn start(&self) -> Id {
            self.nodes[0].id
        }

        fn build(self) -> Result<FlowGraph, GraphError> {
            FlowGraph::build(self.nodes, self.edges, &self.noops)
        }
    }

    #[test]
    fn targets_follow_edge_order() {
        let mut f = Fixture::new();
        let a = f.node("a", NodeKind::Request);
        let b = f.node("b", NodeKind::Request);
        let s = f.start();
        f.edge(s, b, Handle::Unspecified);
        f.edge(s, a, Handle::Unspecified);
        let g = f.build().unwrap();
        let names: Vec<_> = g
            .targets(g.start(), Handle::Unspecified)
            .into_iter()
            .map(|i| g.node(i).name.clone())
            .collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn loop_back_edge_is_allowed() {
        let mut f = Fixture::new();
        let lp = f.node("loop", NodeKind::For);
        let body = f.node("body", NodeKind::Request);
        let s = f.start();
        f.edge(s, lp, Handle::Unspecified);
        f.edge(lp, body, Handle::Loop);
        f.edge(body, lp, Handle::Unspecified);
        let g = f.build().unwrap();
        assert!(g.has_handle(g.index_of(lp).unwrap(), Handle::Loop));
        assert!(!g.has_handle(g.index_of(lp).unwrap(), Handle::LoopEnd));
    }

    #[test]
    fn plain_cycle_is_rejected() {
        let mut f = Fixture::new();
        let a = f.node("a", NodeKind::Request);
        let b = f.node("b", NodeKind::If);
        let s = f.start();
        f.edge(s, a, Handle::Unspecified);
        f.edge(a, b, Handle::Unspecified);
        f.edge(b, a, Handle::Then);
        assert!(matches!(f.build(), Err(GraphError::Cycle(_))));
    }

    #[test]
    fn unknown_endpoint() {
        let mut f = Fixture::new();
        let s = f.start();
        f.edge(s, Id::new(), Handle::Unspecified);
        assert!(matches!(f.build(), Err(GraphError::UnknownNode { .. })));
    }

    #[test]
    fn start_count() {
        let mut f = Fixture::new();
        f.noops.clear();
        assert_eq!(f.build().unwrap_err(), GraphError::NoStart);

        let mut f = Fixture::new();
        let extra = f.node("start2", NodeKind::NoOp);
        f.noops.insert(extra, NoOpKind::Start);
        assert_eq!(f.build().unwrap_err(), GraphError::MultipleStart);
    }
}
