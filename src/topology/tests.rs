use crate::error::ModelError;
use crate::topology::{NodeRef, TopologyGraph, TurnId};

fn graph(nodes: &[&str], turns: &[(&str, &str)]) -> TopologyGraph {
    let mut g = TopologyGraph::new();
    for n in nodes {
        g.add_node(n);
    }
    for (from, to) in turns {
        g.add_turn(from, to).unwrap();
    }
    g
}

#[test]
fn nodes_are_idempotent() {
    let mut g = TopologyGraph::new();
    let a = g.add_node("a");
    let b = g.add_node("b");
    assert_eq!(g.add_node("a"), a);
    assert_eq!(a, NodeRef(0));
    assert_eq!(b, NodeRef(1));
    assert_eq!(g.node_count(), 2);
    assert_eq!(g.node_name(b), Some("b"));
    assert_eq!(g.node_name(NodeRef(7)), None);
}

#[test]
fn turns_between_known_nodes() {
    let mut g = graph(&["a", "b"], &[]);
    let t = g.add_turn("a", "b").unwrap();
    assert_eq!(t.id, TurnId(0));
    assert_eq!((t.from, t.to), (NodeRef(0), NodeRef(1)));
    // the reverse direction is a different turn
    assert!(g.add_turn("b", "a").is_ok());
    assert!(matches!(
        g.add_turn("a", "b"),
        Err(ModelError::DuplicateTurn { ref from, ref to }) if from == "a" && to == "b"
    ));
    assert!(matches!(
        g.add_turn("a", "zz"),
        Err(ModelError::UnknownNode { ref name }) if name == "zz"
    ));
}

#[test]
fn ensure_turn_reuses_existing() {
    let mut g = graph(&["a", "b"], &[("a", "b")]);
    let t = g.ensure_turn("a", "b").unwrap();
    assert_eq!(t.id, TurnId(0));
    assert_eq!(g.turns().len(), 1);
}

#[test]
fn resolution() {
    let g = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
    assert_eq!(g.resolve_turn("b", "c").unwrap().id, TurnId(1));
    assert!(matches!(
        g.resolve_turn("a", "c"),
        Err(ModelError::NoSuchTurn { .. })
    ));
    assert!(matches!(
        g.resolve_turn("q", "c"),
        Err(ModelError::UnknownNode { .. })
    ));
}

#[test]
fn corrupted_graph_is_ambiguous() {
    let mut g = graph(&["a", "b"], &[("a", "b")]);
    g.push_unchecked("a", "b").unwrap();
    assert!(matches!(
        g.resolve_turn("a", "b"),
        Err(ModelError::AmbiguousPath { count: 2, .. })
    ));
}

#[test]
fn cycles() {
    assert!(!graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("a", "c")]).has_cycle());
    assert!(graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "a")]).has_cycle());
    assert!(graph(&["a"], &[("a", "a")]).has_cycle());
    // diamond: c is reached twice without a cycle
    assert!(!graph(
        &["a", "b", "c", "d"],
        &[("a", "b"), ("a", "d"), ("b", "c"), ("d", "c")]
    )
    .has_cycle());
    // cycle in a component not reachable from node 0
    assert!(graph(&["x", "a", "b"], &[("a", "b"), ("b", "a")]).has_cycle());
    assert!(!TopologyGraph::new().has_cycle());
}

#[test]
fn adjacency_follows_insertion_order() {
    let g = graph(&["s0-o0", "s1-o0", "s1-o1"], &[("s0-o0", "s1-o0"), ("s0-o0", "s1-o1")]);
    assert_eq!(
        g.adjacency_matrix(),
        vec![vec![0, 1, 1], vec![0, 0, 0], vec![0, 0, 0]]
    );
}
