//! Pipeline-flow (v3) document codec.
//!
//! The exchanged document nests every canvas-only field under
//! `app_data.ui_data` and stores data links on the *target* input port.
//! The canvas model keeps those fields flat and stores links in one list
//! per pipeline. This module converts losslessly between the two:
//!
//! - node position, label, decorations, messages → `node.app_data.ui_data`
//! - data links → `inputs[].links[]` (`node_id_ref`, `port_id_ref`, and
//!   `ui_data.src_pos` for a link whose source end is loose)
//! - association links → `node.app_data.ui_data.associations`
//! - comments and comment links → `pipeline.app_data.ui_data.comments`
//! - links whose target end is loose → `pipeline.app_data.ui_data.detached_links`
//!
//! Any `app_data` key the canvas does not know is carried through untouched.

use crate::error::FlowError;
use crate::id::ObjectId;
use crate::model::*;
use crate::store::CanvasInfo;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::rc::Rc;

pub const FLOW_VERSION: &str = "3.0";
pub const FLOW_SCHEMA: &str =
    "https://api.dataplatform.ibm.com/schemas/common-pipeline/pipeline-flow/pipeline-flow-v3-schema.json";

// ─── Document shapes ─────────────────────────────────────────────────────

/// `app_data` object: typed `ui_data` plus every other key verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppData<U> {
    #[serde(default)]
    pub ui_data: U,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineFlow {
    #[serde(default = "default_doc_type")]
    pub doc_type: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<String>,
    #[serde(default)]
    pub id: String,
    pub primary_pipeline: String,
    #[serde(default)]
    pub pipelines: Vec<FlowPipeline>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schemas: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtimes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_data: Option<Value>,
}

fn default_doc_type() -> String {
    "pipeline".to_string()
}

fn default_version() -> String {
    FLOW_VERSION.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowPipeline {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub nodes: Vec<FlowNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_data: Option<AppData<PipelineUiData>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineUiData {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<FlowComment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detached_links: Vec<FlowDetachedLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    #[serde(rename = "type", default)]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<FlowPort>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<FlowPort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subflow_ref: Option<SubflowRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_data: Option<AppData<NodeUiData>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeUiData {
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub x_pos: f64,
    #[serde(default)]
    pub y_pos: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorations: Vec<Decoration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_expanded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_height: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_supernode_input_binding: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_supernode_output_binding: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub associations: Vec<FlowAssociation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowPort {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subflow_node_ref: Option<String>,
    /// Incoming links (input ports only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<FlowLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_data: Option<AppData<PortUiData>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortUiData {
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<FlowCardinality>,
}

/// Cardinality as written in documents: `max: -1` means unbounded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FlowCardinality {
    pub min: u32,
    pub max: i64,
}

impl From<Cardinality> for FlowCardinality {
    fn from(c: Cardinality) -> Self {
        Self {
            min: c.min,
            max: c.max.map_or(-1, i64::from),
        }
    }
}

impl From<FlowCardinality> for Cardinality {
    fn from(c: FlowCardinality) -> Self {
        Self {
            min: c.min,
            max: u32::try_from(c.max).ok(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowLink {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_id_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_data: Option<AppData<LinkUiData>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkUiData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_pos: Option<FlowPos>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FlowPos {
    pub x_pos: f64,
    pub y_pos: f64,
}

impl From<Point> for FlowPos {
    fn from(p: Point) -> Self {
        Self {
            x_pos: p.x,
            y_pos: p.y,
        }
    }
}

impl From<FlowPos> for Point {
    fn from(p: FlowPos) -> Self {
        Point::new(p.x_pos, p.y_pos)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowAssociation {
    pub id: String,
    pub node_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowComment {
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub x_pos: f64,
    #[serde(default)]
    pub y_pos: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub associated_id_refs: Vec<FlowCommentRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowCommentRef {
    pub id_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,
}

/// A link that cannot be written on an input port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDetachedLink {
    pub id: String,
    #[serde(rename = "type", default)]
    pub link_type: LinkType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_node_port_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_pos: Option<FlowPos>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trg_node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trg_node_port_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trg_pos: Option<FlowPos>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,
}

// ─── Public API ──────────────────────────────────────────────────────────

/// Parse a pipeline-flow JSON document into canvas form.
pub fn parse_pipeline_flow(json: &str) -> Result<CanvasInfo, FlowError> {
    let flow: PipelineFlow = serde_json::from_str(json)?;
    canvas_info_from_flow(flow)
}

/// Serialize canvas form as pretty pipeline-flow JSON.
pub fn emit_pipeline_flow(info: &CanvasInfo) -> Result<String, FlowError> {
    Ok(serde_json::to_string_pretty(&flow_from_canvas_info(info))?)
}

pub fn canvas_info_from_flow(flow: PipelineFlow) -> Result<CanvasInfo, FlowError> {
    if flow.version.split('.').next() != Some("3") {
        return Err(FlowError::UnsupportedVersion(flow.version));
    }
    let mut seen = HashSet::new();
    for p in &flow.pipelines {
        if !seen.insert(p.id.as_str()) {
            return Err(FlowError::DuplicatePipeline(ObjectId::intern(&p.id)));
        }
    }
    let primary = ObjectId::intern(&flow.primary_pipeline);
    if !seen.contains(flow.primary_pipeline.as_str()) {
        return Err(FlowError::UnknownPrimaryPipeline(primary));
    }

    let mut extras = Map::new();
    if let Some(schemas) = flow.schemas {
        extras.insert("schemas".into(), schemas);
    }
    if let Some(runtimes) = flow.runtimes {
        extras.insert("runtimes".into(), runtimes);
    }
    if let Some(app_data) = flow.app_data {
        extras.insert("app_data".into(), app_data);
    }
    if let Some(schema) = flow.json_schema {
        extras.insert("json_schema".into(), Value::String(schema));
    }

    Ok(CanvasInfo {
        doc_id: ObjectId::intern(&flow.id),
        primary_pipeline: primary,
        pipelines: flow
            .pipelines
            .into_iter()
            .map(|p| Rc::new(pipeline_from_flow(p)))
            .collect(),
        doc_extras: if extras.is_empty() {
            Value::Null
        } else {
            Value::Object(extras)
        },
    })
}

pub fn flow_from_canvas_info(info: &CanvasInfo) -> PipelineFlow {
    let extra = |key: &str| info.doc_extras.get(key).cloned();
    PipelineFlow {
        doc_type: default_doc_type(),
        version: default_version(),
        json_schema: extra("json_schema")
            .and_then(|v| v.as_str().map(str::to_string))
            .or_else(|| Some(FLOW_SCHEMA.to_string())),
        id: info.doc_id.to_string(),
        primary_pipeline: info.primary_pipeline.to_string(),
        pipelines: info.pipelines.iter().map(|p| pipeline_to_flow(p)).collect(),
        schemas: extra("schemas"),
        runtimes: extra("runtimes"),
        app_data: extra("app_data"),
    }
}

// ─── Flow → canvas ───────────────────────────────────────────────────────

fn pipeline_from_flow(flow: FlowPipeline) -> Pipeline {
    let id = ObjectId::intern(&flow.id);
    let (ui_data, other) = match flow.app_data {
        Some(app) => (app.ui_data, app.other),
        None => (PipelineUiData::default(), Map::new()),
    };

    let mut links = Vec::new();
    let mut nodes = Vec::with_capacity(flow.nodes.len());
    for flow_node in flow.nodes {
        links.extend(node_links_from_flow(&flow_node));
        nodes.push(node_from_flow(flow_node));
    }

    let mut comments = Vec::with_capacity(ui_data.comments.len());
    for c in ui_data.comments {
        let comment_id = ObjectId::intern(&c.id);
        for r in &c.associated_id_refs {
            let link_id = r
                .link_id
                .clone()
                .unwrap_or_else(|| format!("{}_{}", c.id, r.id_ref));
            let mut link = Link::new(
                link_id.as_str(),
                LinkType::CommentLink,
                LinkEnd::attached(comment_id, None),
                LinkEnd::attached(ObjectId::intern(&r.id_ref), None),
            );
            link.class_name = r.class_name.clone();
            link.style = r.style.clone();
            links.push(link);
        }
        comments.push(Comment {
            id: comment_id,
            content: c.content,
            x_pos: c.x_pos,
            y_pos: c.y_pos,
            width: c.width,
            height: c.height,
            class_name: c.class_name,
            style: c.style,
            style_temp: None,
        });
    }

    for d in ui_data.detached_links {
        let end = |obj: &Option<String>, port: &Option<String>, pos: Option<FlowPos>| match obj {
            Some(obj) => LinkEnd::attached(
                ObjectId::intern(obj),
                port.as_deref().map(ObjectId::intern),
            ),
            None => LinkEnd::Detached(pos.map(Point::from).unwrap_or_default()),
        };
        let mut link = Link::new(
            d.id.as_str(),
            d.link_type,
            end(&d.src_node_id, &d.src_node_port_id, d.src_pos),
            end(&d.trg_node_id, &d.trg_node_port_id, d.trg_pos),
        );
        link.link_name = d.link_name;
        link.class_name = d.class_name;
        link.style = d.style;
        links.push(link);
    }

    let mut pipeline = Pipeline {
        id,
        name: flow.name,
        nodes,
        comments,
        links,
        parent_url: flow.parent_url,
        runtime_ref: flow.runtime_ref,
        app_data: object_or_null(other),
    };
    drop_dangling_links(&mut pipeline);
    pipeline
}

/// Convert one document node to canvas form. Links are not included; see
/// [`node_links_from_flow`].
pub fn node_from_flow(flow: FlowNode) -> Node {
    let (ui, other) = match flow.app_data {
        Some(app) => (app.ui_data, app.other),
        None => (NodeUiData::default(), Map::new()),
    };
    let mut node = Node::new(flow.id.as_str(), flow.node_type);
    node.op = flow.op;
    node.label = ui.label;
    node.description = ui.description;
    node.image = ui.image;
    node.x_pos = ui.x_pos;
    node.y_pos = ui.y_pos;
    node.class_name = ui.class_name;
    node.style = ui.style;
    node.decorations = ui.decorations;
    node.messages = ui.messages;
    node.is_expanded = ui.is_expanded;
    node.expanded_width = ui.expanded_width;
    node.expanded_height = ui.expanded_height;
    node.is_supernode_input_binding = ui.is_supernode_input_binding;
    node.is_supernode_output_binding = ui.is_supernode_output_binding;
    node.parameters = flow.parameters.unwrap_or(Value::Null);
    node.subflow_ref = flow.subflow_ref;
    node.app_data = object_or_null(other);
    node.input_ports = ports_from_flow(flow.inputs, Cardinality::SINGLE);
    node.output_ports = ports_from_flow(flow.outputs, Cardinality::UNBOUNDED);
    node
}

fn ports_from_flow(ports: Vec<FlowPort>, default_cardinality: Cardinality) -> Ports {
    ports
        .into_iter()
        .map(|p| {
            let (ui, other) = match p.app_data {
                Some(app) => (app.ui_data, app.other),
                None => (PortUiData::default(), Map::new()),
            };
            Port {
                id: ObjectId::intern(&p.id),
                label: ui.label,
                cardinality: ui.cardinality.map_or(default_cardinality, Cardinality::from),
                app_data: object_or_null(other),
                subflow_node_ref: p.subflow_node_ref.as_deref().map(ObjectId::intern),
            }
        })
        .collect::<SmallVec<_>>()
}

/// Links stored on a document node: incoming data links on its input
/// ports plus its outgoing association links.
pub fn node_links_from_flow(flow: &FlowNode) -> Vec<Link> {
    let trg_id = ObjectId::intern(&flow.id);
    let mut links = Vec::new();
    for port in &flow.inputs {
        let trg_port = ObjectId::intern(&port.id);
        for fl in &port.links {
            let ui = fl.app_data.as_ref().map(|a| &a.ui_data);
            let src = match (&fl.node_id_ref, ui.and_then(|u| u.src_pos)) {
                (Some(src), _) => LinkEnd::attached(
                    ObjectId::intern(src),
                    fl.port_id_ref.as_deref().map(ObjectId::intern),
                ),
                (None, Some(pos)) => LinkEnd::Detached(pos.into()),
                (None, None) => {
                    log::warn!("link into '{}' has neither source node nor position", flow.id);
                    continue;
                }
            };
            let id = fl.id.clone().unwrap_or_else(|| {
                format!(
                    "{}_{}_{}_{}",
                    fl.node_id_ref.as_deref().unwrap_or("detached"),
                    fl.port_id_ref.as_deref().unwrap_or(""),
                    flow.id,
                    port.id
                )
            });
            let mut link = Link::new(
                id.as_str(),
                LinkType::NodeLink,
                src,
                LinkEnd::attached(trg_id, Some(trg_port)),
            );
            link.link_name = fl.link_name.clone();
            if let Some(ui) = ui {
                link.class_name = ui.class_name.clone();
                link.style = ui.style.clone();
            }
            links.push(link);
        }
    }
    if let Some(app) = &flow.app_data {
        for assoc in &app.ui_data.associations {
            let mut link = Link::new(
                assoc.id.as_str(),
                LinkType::AssociationLink,
                LinkEnd::attached(trg_id, None),
                LinkEnd::attached(ObjectId::intern(&assoc.node_ref), None),
            );
            link.class_name = assoc.class_name.clone();
            link.style = assoc.style.clone();
            links.push(link);
        }
    }
    links
}

/// Remove links whose attached ends name objects missing from the pipeline.
fn drop_dangling_links(pipeline: &mut Pipeline) {
    let objects: HashSet<ObjectId> = pipeline
        .nodes
        .iter()
        .map(|n| n.id)
        .chain(pipeline.comments.iter().map(|c| c.id))
        .collect();
    let pipeline_id = pipeline.id;
    pipeline.links.retain(|l| {
        let ok = [l.src_obj_id(), l.trg_obj_id()]
            .into_iter()
            .flatten()
            .all(|id| objects.contains(&id));
        if !ok {
            log::warn!("dropping link '{}' in '{pipeline_id}': endpoint missing", l.id);
        }
        ok
    });
}

// ─── Canvas → flow ───────────────────────────────────────────────────────

fn pipeline_to_flow(pipeline: &Pipeline) -> FlowPipeline {
    let nodes = pipeline
        .nodes
        .iter()
        .map(|n| node_to_flow(n, &pipeline.links))
        .collect();

    let comments = pipeline
        .comments
        .iter()
        .map(|c| FlowComment {
            id: c.id.to_string(),
            content: c.content.clone(),
            x_pos: c.x_pos,
            y_pos: c.y_pos,
            width: c.width,
            height: c.height,
            class_name: c.class_name.clone(),
            style: c.style.clone(),
            associated_id_refs: pipeline
                .links
                .iter()
                .filter(|l| l.link_type == LinkType::CommentLink && l.src_obj_id() == Some(c.id))
                .filter_map(|l| {
                    Some(FlowCommentRef {
                        id_ref: l.trg_obj_id()?.to_string(),
                        link_id: Some(l.id.to_string()),
                        class_name: l.class_name.clone(),
                        style: l.style.clone(),
                    })
                })
                .collect(),
        })
        .collect();

    let detached_links = pipeline
        .links
        .iter()
        .filter(|l| l.link_type != LinkType::CommentLink && input_port_for(pipeline, l).is_none())
        .filter(|l| l.link_type == LinkType::NodeLink || l.is_detached())
        .map(|l| FlowDetachedLink {
            id: l.id.to_string(),
            link_type: l.link_type,
            src_node_id: l.src_obj_id().map(|id| id.to_string()),
            src_node_port_id: l.src_port_id().map(|id| id.to_string()),
            src_pos: l.src.pos().map(FlowPos::from),
            trg_node_id: l.trg_obj_id().map(|id| id.to_string()),
            trg_node_port_id: l.trg_port_id().map(|id| id.to_string()),
            trg_pos: l.trg.pos().map(FlowPos::from),
            link_name: l.link_name.clone(),
            class_name: l.class_name.clone(),
            style: l.style.clone(),
        })
        .collect();

    let ui_data = PipelineUiData {
        comments,
        detached_links,
    };
    let other = match &pipeline.app_data {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    FlowPipeline {
        id: pipeline.id.to_string(),
        name: pipeline.name.clone(),
        nodes,
        runtime_ref: pipeline.runtime_ref.clone(),
        parent_url: pipeline.parent_url.clone(),
        app_data: Some(AppData { ui_data, other }),
    }
}

/// The input port a link is written under, if it can be.
fn input_port_for(pipeline: &Pipeline, link: &Link) -> Option<ObjectId> {
    if link.link_type != LinkType::NodeLink {
        return None;
    }
    let node = pipeline.node(link.trg_obj_id()?)?;
    match link.trg_port_id() {
        Some(port) => node.input_port(port).map(|p| p.id),
        None => node.default_input_port().map(|p| p.id),
    }
}

pub fn node_to_flow(node: &Node, links: &[Link]) -> FlowNode {
    let incoming = |port_id: ObjectId, is_default: bool| -> Vec<FlowLink> {
        links
            .iter()
            .filter(|l| l.link_type == LinkType::NodeLink && l.trg_obj_id() == Some(node.id))
            .filter(|l| match l.trg_port_id() {
                Some(p) => p == port_id,
                None => is_default,
            })
            .map(|l| FlowLink {
                id: Some(l.id.to_string()),
                node_id_ref: l.src_obj_id().map(|id| id.to_string()),
                port_id_ref: l.src_port_id().map(|id| id.to_string()),
                link_name: l.link_name.clone(),
                app_data: Some(AppData {
                    ui_data: LinkUiData {
                        class_name: l.class_name.clone(),
                        style: l.style.clone(),
                        src_pos: l.src.pos().map(FlowPos::from),
                    },
                    other: Map::new(),
                }),
            })
            .collect()
    };

    let inputs = node
        .input_ports
        .iter()
        .enumerate()
        .map(|(i, p)| port_to_flow(p, incoming(p.id, i == 0)))
        .collect();
    let outputs = node
        .output_ports
        .iter()
        .map(|p| port_to_flow(p, Vec::new()))
        .collect();

    let associations = links
        .iter()
        .filter(|l| l.link_type == LinkType::AssociationLink && l.src_obj_id() == Some(node.id))
        .filter_map(|l| {
            Some(FlowAssociation {
                id: l.id.to_string(),
                node_ref: l.trg_obj_id()?.to_string(),
                class_name: l.class_name.clone(),
                style: l.style.clone(),
            })
        })
        .collect();

    let ui_data = NodeUiData {
        label: node.label.clone(),
        description: node.description.clone(),
        image: node.image.clone(),
        x_pos: node.x_pos,
        y_pos: node.y_pos,
        class_name: node.class_name.clone(),
        style: node.style.clone(),
        decorations: node.decorations.clone(),
        messages: node.messages.clone(),
        is_expanded: node.is_expanded,
        expanded_width: node.expanded_width,
        expanded_height: node.expanded_height,
        is_supernode_input_binding: node.is_supernode_input_binding,
        is_supernode_output_binding: node.is_supernode_output_binding,
        associations,
    };
    let other = match &node.app_data {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    FlowNode {
        id: node.id.to_string(),
        node_type: node.node_type,
        op: node.op.clone(),
        inputs,
        outputs,
        parameters: (!node.parameters.is_null()).then(|| node.parameters.clone()),
        subflow_ref: node.subflow_ref.clone(),
        app_data: Some(AppData { ui_data, other }),
    }
}

fn port_to_flow(port: &Port, links: Vec<FlowLink>) -> FlowPort {
    let other = match &port.app_data {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    FlowPort {
        id: port.id.to_string(),
        subflow_node_ref: port.subflow_node_ref.map(|id| id.to_string()),
        links,
        app_data: Some(AppData {
            ui_data: PortUiData {
                label: port.label.clone(),
                cardinality: Some(port.cardinality.into()),
            },
            other,
        }),
    }
}

fn object_or_null(map: Map<String, Value>) -> Value {
    if map.is_empty() {
        Value::Null
    } else {
        Value::Object(map)
    }
}
