//! Graphviz export of the discovered state graph.

use std::collections::HashMap;

use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::store::StateStore;
use crate::types::StateId;

/// Build a directed graph: nodes are state titles, edges are action descriptions.
pub fn to_graph(store: &StateStore) -> DiGraph<String, String> {
    let mut graph = DiGraph::with_capacity(store.len(), store.transition_count());
    let mut nodes: HashMap<StateId, NodeIndex> = HashMap::with_capacity(store.len());

    for ws in store.iter() {
        nodes.insert(ws.id, graph.add_node(ws.title.clone()));
    }

    for ws in store.iter() {
        let from = nodes[&ws.id];
        for t in &ws.transitions {
            if let Some(&to) = nodes.get(&t.target) {
                graph.add_edge(from, to, t.action.description.clone());
            }
        }
    }

    graph
}

/// Render the state graph in DOT format.
pub fn to_dot(store: &StateStore) -> String {
    format!("{}", Dot::new(&to_graph(store)))
}
