//! Integration tests: auto-layout output is a pure function of the graph.

use fc_core::*;
use pretty_assertions::assert_eq;

const FOUR_NODES: &str = include_str!("fixtures/four_nodes.json");

fn id(s: &str) -> ObjectId {
    ObjectId::intern(s)
}

fn load() -> ObjectModel {
    let mut om = ObjectModel::new(CanvasConfig::default());
    om.set_pipeline_flow(FOUR_NODES).unwrap();
    om
}

fn positions(om: &ObjectModel) -> Vec<(ObjectId, f64, f64)> {
    let mut out: Vec<_> = om
        .store()
        .get_nodes(id("p1"))
        .iter()
        .map(|n| (n.id, n.x_pos, n.y_pos))
        .collect();
    out.sort_by_key(|p| p.0);
    out
}

#[test]
fn horizontal_layout_twice_is_stable() {
    let mut om = load();
    om.api_pipeline(id("p1")).auto_layout(LayoutDirection::Horizontal);
    let first = positions(&om);
    om.api_pipeline(id("p1")).auto_layout(LayoutDirection::Horizontal);
    assert_eq!(positions(&om), first);

    let mut fresh = load();
    fresh.api_pipeline(id("p1")).auto_layout(LayoutDirection::Horizontal);
    assert_eq!(positions(&fresh), first);
}

#[test]
fn ranks_follow_the_data_flow() {
    let mut om = load();
    om.api_pipeline(id("p1")).auto_layout(LayoutDirection::Horizontal);
    let x = |name: &str| om.store().get_node(id("p1"), id(name)).unwrap().x_pos;
    assert!(x("node1") < x("node2"));
    assert!(x("node2") < x("node3"));
    assert_eq!(x("node3"), x("node4"));

    om.api_pipeline(id("p1")).auto_layout(LayoutDirection::Vertical);
    let y = |name: &str| om.store().get_node(id("p1"), id(name)).unwrap().y_pos;
    assert!(y("node1") < y("node2"));
    assert!(y("node2") < y("node4"));
}

#[test]
fn compute_does_not_mutate() {
    let mut om = load();
    let before = positions(&om);
    let result = om.api_pipeline(id("p1")).compute_auto_layout(LayoutDirection::Horizontal);
    assert_eq!(result.nodes.len(), 4);
    assert_eq!(positions(&om), before);
}
