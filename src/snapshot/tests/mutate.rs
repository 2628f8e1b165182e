use std::collections::HashSet;

use maplit::{btreemap, btreeset};

use crate::{
    error::ReconcileError,
    graph::{ComponentId, GraphError, MemoryGraph, NodeGraph, NodeId},
    multimap::MultiMap,
    snapshot::{
        apply_classification, classify, Classification, ComponentRules, ComponentWrite,
        FlatIndex, NameAliasTable, NodeSnapshot,
    },
};

fn graph_from(snapshot: &NodeSnapshot) -> (MemoryGraph, NodeId) {
    let _ = env_logger::try_init();

    let mut graph = MemoryGraph::with_exclusive_family(vec!["Transform", "RectTransform"]);
    let root = graph.load_snapshot("Root", snapshot).unwrap();
    (graph, root)
}

fn apply<G: NodeGraph>(
    graph: &mut G,
    root: G::Node,
    classification: &Classification,
) -> Result<HashSet<G::Node>, ReconcileError> {
    apply_classification(
        graph,
        root,
        classification,
        &NameAliasTable::new(),
        &ComponentRules::default(),
    )
}

fn leaf() -> NodeSnapshot {
    NodeSnapshot::new()
}

/// Wraps a graph and fails the test the moment any edit would make a node its
/// own ancestor, instead of relying on the graph to refuse it.
struct AuditedGraph {
    inner: MemoryGraph,
    moves: usize,
}

impl NodeGraph for AuditedGraph {
    type Node = NodeId;
    type Component = ComponentId;

    fn contains(&self, node: NodeId) -> bool {
        self.inner.contains(node)
    }

    fn name(&self, node: NodeId) -> Result<&str, GraphError> {
        self.inner.name(node)
    }

    fn parent(&self, node: NodeId) -> Result<Option<NodeId>, GraphError> {
        self.inner.parent(node)
    }

    fn children(&self, node: NodeId) -> Result<Vec<NodeId>, GraphError> {
        self.inner.children(node)
    }

    fn components(&self, node: NodeId) -> Result<Vec<(String, ComponentId)>, GraphError> {
        self.inner.components(node)
    }

    fn serialize_component(&self, component: ComponentId) -> Result<String, GraphError> {
        self.inner.serialize_component(component)
    }

    fn instantiate(&mut self, node: NodeId) -> Result<NodeId, GraphError> {
        self.inner.instantiate(node)
    }

    fn create_node(&mut self, name: &str) -> Result<NodeId, GraphError> {
        self.inner.create_node(name)
    }

    fn destroy_node(&mut self, node: NodeId) -> Result<(), GraphError> {
        self.inner.destroy_node(node)
    }

    fn set_name(&mut self, node: NodeId, name: &str) -> Result<(), GraphError> {
        self.inner.set_name(node, name)
    }

    fn set_parent(&mut self, node: NodeId, parent: Option<NodeId>) -> Result<(), GraphError> {
        if let Some(parent) = parent {
            assert_ne!(node, parent, "node attached to itself");
            assert!(
                !self.inner.is_ancestor(node, parent),
                "{:?} attached under its own descendant {:?}",
                node,
                parent
            );
        }

        self.moves += 1;
        self.inner.set_parent(node, parent)
    }

    fn add_component(&mut self, node: NodeId, type_name: &str) -> Result<ComponentId, GraphError> {
        self.inner.add_component(node, type_name)
    }

    fn destroy_component(&mut self, component: ComponentId) -> Result<(), GraphError> {
        self.inner.destroy_component(component)
    }

    fn deserialize_into(&mut self, component: ComponentId, payload: &str) -> Result<(), GraphError> {
        self.inner.deserialize_into(component, payload)
    }

    fn commit_working_copy(&mut self, original: NodeId, working_copy: NodeId) -> Result<(), GraphError> {
        self.inner.commit_working_copy(original, working_copy)
    }
}

fn audited(snapshot: &NodeSnapshot) -> (AuditedGraph, NodeId) {
    let (inner, root) = graph_from(snapshot);
    (AuditedGraph { inner, moves: 0 }, root)
}

#[test]
fn swapping_parent_and_child_never_cycles() {
    let (mut graph, root) = audited(&leaf().with_child("A", leaf().with_child("B", leaf())));

    let classification = Classification {
        reparentings: btreemap! {
            "A".to_owned() => "B".to_owned(),
            "B".to_owned() => "".to_owned(),
        },
        ..Default::default()
    };

    apply(&mut graph, root, &classification).unwrap();

    let expected = leaf().with_child("B", leaf().with_child("A", leaf()));
    assert_eq!(graph.inner.to_snapshot(root).unwrap(), expected);
    assert_eq!(graph.moves, 4);
}

#[test]
fn rotating_a_chain_never_cycles() {
    let (mut graph, root) = audited(
        &leaf().with_child("A", leaf().with_child("B", leaf().with_child("C", leaf()))),
    );

    let classification = Classification {
        reparentings: btreemap! {
            "A".to_owned() => "C".to_owned(),
            "C".to_owned() => "".to_owned(),
        },
        ..Default::default()
    };

    apply(&mut graph, root, &classification).unwrap();

    let expected = leaf().with_child("C", leaf().with_child("A", leaf().with_child("B", leaf())));
    assert_eq!(graph.inner.to_snapshot(root).unwrap(), expected);
}

#[test]
fn classify_then_apply_matches_new_source() {
    let old = leaf()
        .with_child(
            "Parent1",
            leaf()
                .with_component("Transform", "p1")
                .with_child("Child1", leaf().with_component("Transform", "c1"))
                .with_child("Child2", leaf().with_component("Transform", "c2")),
        )
        .with_child(
            "Parent2",
            leaf()
                .with_component("Transform", "p2")
                .with_child("Child3", leaf().with_component("Transform", "c3")),
        );

    let new = leaf()
        .with_child(
            "Parent2",
            leaf()
                .with_component("Transform", "p2-moved")
                .with_child("Child3", leaf().with_component("Transform", "c3")),
        )
        .with_child(
            "Parent3",
            leaf()
                .with_component("Transform", "p3")
                .with_component("Collider", "box"),
        );

    let (mut graph, root) = graph_from(&old);

    let classification = classify(
        &FlatIndex::from_snapshot(&old),
        &FlatIndex::from_snapshot(&new),
        &FlatIndex::from_graph(&graph, root, &ComponentRules::default()).unwrap(),
        &NameAliasTable::new(),
        &ComponentRules::default(),
    );

    let touched = apply(&mut graph, root, &classification).unwrap();

    assert_eq!(graph.to_snapshot(root).unwrap(), new);

    let parent2 = graph.find(root, "Parent2").unwrap();
    let parent3 = graph.find(root, "Parent3").unwrap();
    let child3 = graph.find(root, "Child3").unwrap();

    assert!(touched.contains(&parent2));
    assert!(touched.contains(&parent3));
    assert!(!touched.contains(&child3));
    assert_eq!(touched.len(), 2);
}

#[test]
fn rename_keeps_node_identity() {
    let old = leaf().with_child("A", leaf().with_component("Script", "local"));
    let (mut graph, root) = graph_from(&old);
    let node = graph.find(root, "A").unwrap();

    let classification = Classification {
        nodes_to_rename: btreeset! { "B".to_owned() },
        ..Default::default()
    };
    let aliases: NameAliasTable = vec![("B", "A")].into_iter().collect();

    apply_classification(
        &mut graph,
        root,
        &classification,
        &aliases,
        &ComponentRules::default(),
    )
    .unwrap();

    assert_eq!(graph.find(root, "B"), Some(node));
    assert_eq!(
        graph.to_snapshot(node).unwrap(),
        leaf().with_component("Script", "local")
    );
}

#[test]
fn destroying_a_node_already_removed_with_its_parent() {
    let (mut graph, root) = graph_from(&leaf().with_child("A", leaf().with_child("B", leaf())));

    let classification = Classification {
        nodes_to_destroy: btreeset! { "A".to_owned(), "B".to_owned() },
        ..Default::default()
    };

    let touched = apply(&mut graph, root, &classification).unwrap();

    assert!(touched.is_empty());
    assert!(graph.children(root).unwrap().is_empty());
    assert_eq!(graph.len(), 1);
}

#[test]
fn rejected_transform_merges_into_existing_one() {
    let (mut graph, root) = graph_from(&leaf().with_child(
        "Panel",
        leaf().with_component(
            "RectTransform",
            r#"{"anchor":"top","localPosition":[0,0,0]}"#,
        ),
    ));

    let mut components_to_update = MultiMap::new();
    components_to_update.push(
        "Panel".to_owned(),
        "Transform".to_owned(),
        ComponentWrite {
            index: 0,
            payload: r#"{"localPosition":[1,2,3],"localScale":[2,2,2],"pivot":[0,0]}"#.to_owned(),
        },
    );

    let classification = Classification {
        components_to_update,
        ..Default::default()
    };

    apply(&mut graph, root, &classification).unwrap();

    let panel = graph.find(root, "Panel").unwrap();
    let expected = leaf().with_component(
        "RectTransform",
        r#"{"anchor":"top","localPosition":[1,2,3],"localScale":[2,2,2]}"#,
    );

    assert_eq!(graph.to_snapshot(panel).unwrap(), expected);
}

#[test]
fn malformed_transform_payload_is_an_error() {
    let (mut graph, root) = graph_from(&leaf().with_child(
        "Panel",
        leaf().with_component("RectTransform", "{}"),
    ));

    let mut components_to_update = MultiMap::new();
    components_to_update.push(
        "Panel".to_owned(),
        "Transform".to_owned(),
        ComponentWrite {
            index: 0,
            payload: "not json".to_owned(),
        },
    );

    let classification = Classification {
        components_to_update,
        ..Default::default()
    };

    let result = apply(&mut graph, root, &classification);

    match result {
        Err(ReconcileError::MalformedTransform { node, .. }) => assert_eq!(node, "Panel"),
        other => panic!("expected a malformed transform error, got {:?}", other),
    }
}

#[test]
fn component_edits_are_positional() {
    let (mut graph, root) = graph_from(&leaf().with_child(
        "A",
        leaf()
            .with_component("Collider", "a")
            .with_component("Collider", "b")
            .with_component("Collider", "c"),
    ));

    let mut components_to_destroy = MultiMap::new();
    components_to_destroy.push("A".to_owned(), "Collider".to_owned(), 1);
    components_to_destroy.push("A".to_owned(), "Collider".to_owned(), 2);

    let mut components_to_update = MultiMap::new();
    components_to_update.push(
        "A".to_owned(),
        "Collider".to_owned(),
        ComponentWrite {
            index: 0,
            payload: "A".to_owned(),
        },
    );
    components_to_update.push(
        "A".to_owned(),
        "Light".to_owned(),
        ComponentWrite {
            index: 0,
            payload: "warm".to_owned(),
        },
    );

    let classification = Classification {
        components_to_destroy,
        components_to_update,
        ..Default::default()
    };

    apply(&mut graph, root, &classification).unwrap();

    let node = graph.find(root, "A").unwrap();
    let expected = leaf()
        .with_component("Collider", "A")
        .with_component("Light", "warm");

    assert_eq!(graph.to_snapshot(node).unwrap(), expected);
}

#[test]
fn failed_pass_cleans_up_created_orphans() {
    let (mut graph, root) = graph_from(&leaf().with_child("A", leaf().with_child("B", leaf())));
    assert_eq!(graph.len(), 3);

    // A can't go under its own child, and the reparent of C never runs.
    let classification = Classification {
        nodes_to_create: btreeset! { "C".to_owned() },
        reparentings: btreemap! {
            "A".to_owned() => "B".to_owned(),
            "C".to_owned() => "".to_owned(),
        },
        ..Default::default()
    };

    let result = apply(&mut graph, root, &classification);

    assert!(matches!(
        result,
        Err(ReconcileError::Graph {
            source: GraphError::WouldCycle { .. }
        })
    ));
    assert!(graph.find(root, "C").is_none());
    assert_eq!(graph.len(), 3);

    // A was detached before the failure and is back in the tree.
    let a = graph.find(root, "A").unwrap();
    assert_eq!(graph.parent(a).unwrap(), Some(root));
    assert!(graph.find(a, "B").is_some());
}
