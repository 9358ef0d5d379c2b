//! Integration tests: pipeline-flow documents in and out of the object
//! model.

use fc_core::*;
use pretty_assertions::assert_eq;

const FOUR_NODES: &str = include_str!("fixtures/four_nodes.json");

fn id(s: &str) -> ObjectId {
    ObjectId::intern(s)
}

fn load(json: &str) -> ObjectModel {
    let mut om = ObjectModel::new(CanvasConfig::default());
    om.set_pipeline_flow(json).unwrap();
    om
}

#[test]
fn fixture_loads_nodes_links_and_comments() {
    let om = load(FOUR_NODES);
    let p = om.pipeline(id("p1")).unwrap();
    assert_eq!(p.nodes.len(), 4);
    assert_eq!(p.comments.len(), 2);
    let data: Vec<&Link> = p.links.iter().filter(|l| l.is_data_link()).collect();
    assert_eq!(data.len(), 3);
    assert_eq!(p.links.len(), 5);

    let node2 = p.node(id("node2")).unwrap();
    assert_eq!(node2.label, "Filter");
    assert_eq!((node2.x_pos, node2.y_pos), (250.0, 0.0));
    assert_eq!(node2.parameters["expr"], "x > 1");
    // Sizes come from the layout config.
    assert_eq!((node2.width, node2.height), (160.0, 40.0));
}

#[test]
fn emit_then_load_is_lossless() {
    let om = load(FOUR_NODES);
    let json = om.get_pipeline_flow_json().unwrap();
    let again = load(&json);
    assert_eq!(om.get_canvas_info().pipelines, again.get_canvas_info().pipelines);
}

#[test]
fn supernode_pipelines_survive_a_round_trip() {
    let mut om = load(FOUR_NODES);
    let mut sn = Node::new("sn1", NodeType::SuperNode);
    sn.label = "Group".into();
    sn.subflow_ref = Some(SubflowRef {
        pipeline_id_ref: id("child1"),
        url: None,
    });
    let mut inner = Pipeline::new("child1");
    inner.nodes.push(Node::new("inner1", NodeType::ExecutionNode));
    om.api_pipeline(id("p1")).add_supernodes(vec![sn], vec![inner]);

    let json = om.get_pipeline_flow_json().unwrap();
    let again = load(&json);
    let child = again.pipeline(id("child1")).unwrap();
    assert_eq!(child.nodes[0].id, id("inner1"));
    let (parent, sn) = again.get_supernode_for_pipeline(id("child1")).unwrap();
    assert_eq!(parent, id("p1"));
    assert_eq!(sn.label, "Group");
}

#[test]
fn malformed_documents_are_errors() {
    let mut om = ObjectModel::new(CanvasConfig::default());
    assert!(matches!(om.set_pipeline_flow("{"), Err(FlowError::Json(_))));
    let bad_primary = r#"{ "id": "d", "primary_pipeline": "x", "pipelines": [{ "id": "p" }] }"#;
    assert!(matches!(
        om.set_pipeline_flow(bad_primary),
        Err(FlowError::UnknownPrimaryPipeline(_))
    ));
}
