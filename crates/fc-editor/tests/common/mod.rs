//! Shared helpers for the fc-editor integration tests.

#![allow(dead_code)]

use fc_core::*;

pub const FOUR_NODES: &str = include_str!("../fixtures/four_nodes.json");

pub fn id(s: &str) -> ObjectId {
    ObjectId::intern(s)
}

/// Object model loaded from a fixture, with readable sequential IDs.
pub fn load(json: &str) -> ObjectModel {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut om = ObjectModel::with_id_generator(
        CanvasConfig::default(),
        Box::new(SequentialIdGenerator::with_prefix("t.")),
    );
    om.set_pipeline_flow(json).unwrap();
    om
}

/// Snapshot compared across undo and redo: the emitted document and
/// every pipeline exactly as stored. Object order counts.
#[derive(Debug, PartialEq)]
pub struct State {
    pub flow: String,
    pub pipelines: Vec<Pipeline>,
}

pub fn state(om: &ObjectModel) -> State {
    State {
        flow: om.get_pipeline_flow_json().unwrap(),
        pipelines: om.store().pipelines().cloned().collect(),
    }
}

/// A template node with one input and one output port.
pub fn filter_template() -> Node {
    let mut n = Node::new("tmpl_filter", NodeType::ExecutionNode);
    n.op = Some("filter".into());
    n.label = "Filter".into();
    n.input_ports.push(Port::new("in", "", Cardinality::SINGLE));
    n.output_ports.push(Port::new("out", "", Cardinality::UNBOUNDED));
    n
}
