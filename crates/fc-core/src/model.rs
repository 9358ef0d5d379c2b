//! Core data model for flow canvases.
//!
//! A document is a set of pipelines. Each pipeline is a directed graph of
//! nodes (with ports), links and comments. Supernodes reference a child
//! pipeline by ID, which makes the pipelines a tree. Positions are stored
//! flat on each object (`x_pos`/`y_pos`); the nested pipeline-flow schema
//! is handled by [`crate::flow`].

use crate::id::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashSet;

// ─── Geometry ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Axis-aligned rectangle in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// AABB overlap. Touching edges do not count.
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Grow on every side by `margin`.
    pub fn inflate(&self, margin: f64) -> Bounds {
        Bounds::new(
            self.x - margin,
            self.y - margin,
            self.width + 2.0 * margin,
            self.height + 2.0 * margin,
        )
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Bounds::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }

    /// Bounding box of a set of rectangles, `None` when empty.
    pub fn enclosing(rects: impl IntoIterator<Item = Bounds>) -> Option<Bounds> {
        rects.into_iter().reduce(|acc, b| acc.union(&b))
    }
}

// ─── Ports ───────────────────────────────────────────────────────────────

/// Allowed number of links on a port. `max: None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cardinality {
    pub min: u32,
    pub max: Option<u32>,
}

impl Cardinality {
    pub const SINGLE: Cardinality = Cardinality {
        min: 0,
        max: Some(1),
    };
    pub const UNBOUNDED: Cardinality = Cardinality { min: 0, max: None };

    /// True when `count` existing links leave no room for another one.
    pub fn is_full(&self, count: usize) -> bool {
        self.max.is_some_and(|max| count >= max as usize)
    }
}

impl Default for Cardinality {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub id: ObjectId,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub app_data: Value,
    /// On supernode ports: the binding node inside the child pipeline that
    /// this port passes through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subflow_node_ref: Option<ObjectId>,
}

impl Port {
    pub fn new(id: impl Into<ObjectId>, label: &str, cardinality: Cardinality) -> Self {
        Self {
            id: id.into(),
            label: label.to_string(),
            cardinality,
            app_data: Value::Null,
            subflow_node_ref: None,
        }
    }
}

pub type Ports = SmallVec<[Port; 2]>;

// ─── Nodes ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    #[default]
    ExecutionNode,
    Binding,
    SuperNode,
    ModelNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubflowRef {
    pub pipeline_id_ref: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Info,
    Warning,
    Error,
}

/// A validation message attached to a node parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Decoration {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_pos: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_pos: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

/// A node in a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: ObjectId,
    #[serde(rename = "type", default)]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
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
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub input_ports: Ports,
    #[serde(default)]
    pub output_ports: Ports,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub parameters: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    /// Host data outside the canvas' concern, carried through untouched.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub app_data: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorations: Vec<Decoration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_temp: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subflow_ref: Option<SubflowRef>,
    #[serde(default)]
    pub is_expanded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_height: Option<f64>,
    /// Binding node created for a supernode input port.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_supernode_input_binding: bool,
    /// Binding node created for a supernode output port.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_supernode_output_binding: bool,
}

impl Node {
    pub fn new(id: impl Into<ObjectId>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            op: None,
            label: String::new(),
            description: None,
            image: None,
            x_pos: 0.0,
            y_pos: 0.0,
            width: 0.0,
            height: 0.0,
            input_ports: SmallVec::new(),
            output_ports: SmallVec::new(),
            parameters: Value::Null,
            messages: Vec::new(),
            app_data: Value::Null,
            decorations: Vec::new(),
            class_name: None,
            style: None,
            style_temp: None,
            subflow_ref: None,
            is_expanded: false,
            expanded_width: None,
            expanded_height: None,
            is_supernode_input_binding: false,
            is_supernode_output_binding: false,
        }
    }

    pub fn is_supernode(&self) -> bool {
        self.node_type == NodeType::SuperNode
    }

    /// Pipeline referenced by a supernode.
    pub fn subflow_pipeline_id(&self) -> Option<ObjectId> {
        self.subflow_ref.as_ref().map(|r| r.pipeline_id_ref)
    }

    pub fn position(&self) -> Point {
        Point::new(self.x_pos, self.y_pos)
    }

    /// Current on-canvas size, honouring in-place supernode expansion.
    pub fn bounds(&self) -> Bounds {
        if self.is_expanded {
            Bounds::new(
                self.x_pos,
                self.y_pos,
                self.expanded_width.unwrap_or(self.width),
                self.expanded_height.unwrap_or(self.height),
            )
        } else {
            Bounds::new(self.x_pos, self.y_pos, self.width, self.height)
        }
    }

    pub fn input_port(&self, id: ObjectId) -> Option<&Port> {
        self.input_ports.iter().find(|p| p.id == id)
    }

    pub fn output_port(&self, id: ObjectId) -> Option<&Port> {
        self.output_ports.iter().find(|p| p.id == id)
    }

    /// The default input port, used when a link names no port.
    pub fn default_input_port(&self) -> Option<&Port> {
        self.input_ports.first()
    }

    pub fn default_output_port(&self) -> Option<&Port> {
        self.output_ports.first()
    }
}

// ─── Links ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkType {
    #[default]
    NodeLink,
    AssociationLink,
    CommentLink,
}

/// One end of a link: either bound to an object (and optionally a port on
/// it) or left loose at a canvas coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkEnd {
    Attached {
        obj_id: ObjectId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        port_id: Option<ObjectId>,
    },
    Detached(Point),
}

impl LinkEnd {
    pub fn attached(obj_id: ObjectId, port_id: Option<ObjectId>) -> Self {
        LinkEnd::Attached { obj_id, port_id }
    }

    pub fn obj_id(&self) -> Option<ObjectId> {
        match self {
            LinkEnd::Attached { obj_id, .. } => Some(*obj_id),
            LinkEnd::Detached(_) => None,
        }
    }

    pub fn port_id(&self) -> Option<ObjectId> {
        match self {
            LinkEnd::Attached { port_id, .. } => *port_id,
            LinkEnd::Detached(_) => None,
        }
    }

    pub fn pos(&self) -> Option<Point> {
        match self {
            LinkEnd::Detached(p) => Some(*p),
            LinkEnd::Attached { .. } => None,
        }
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, LinkEnd::Detached(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: ObjectId,
    #[serde(rename = "type", default)]
    pub link_type: LinkType,
    pub src: LinkEnd,
    pub trg: LinkEnd,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_temp: Option<Value>,
}

impl Link {
    pub fn new(id: impl Into<ObjectId>, link_type: LinkType, src: LinkEnd, trg: LinkEnd) -> Self {
        Self {
            id: id.into(),
            link_type,
            src,
            trg,
            link_name: None,
            class_name: None,
            style: None,
            style_temp: None,
        }
    }

    pub fn src_obj_id(&self) -> Option<ObjectId> {
        self.src.obj_id()
    }

    pub fn trg_obj_id(&self) -> Option<ObjectId> {
        self.trg.obj_id()
    }

    pub fn src_port_id(&self) -> Option<ObjectId> {
        self.src.port_id()
    }

    pub fn trg_port_id(&self) -> Option<ObjectId> {
        self.trg.port_id()
    }

    /// True when either attached end references `id`.
    pub fn contains_id(&self, id: ObjectId) -> bool {
        self.src_obj_id() == Some(id) || self.trg_obj_id() == Some(id)
    }

    pub fn is_detached(&self) -> bool {
        self.src.is_detached() || self.trg.is_detached()
    }

    pub fn is_fully_detached(&self) -> bool {
        self.src.is_detached() && self.trg.is_detached()
    }

    pub fn is_data_link(&self) -> bool {
        self.link_type == LinkType::NodeLink
    }
}

// ─── Comments ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: ObjectId,
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_temp: Option<Value>,
}

impl Comment {
    pub fn new(id: impl Into<ObjectId>, content: &str, bounds: Bounds) -> Self {
        Self {
            id: id.into(),
            content: content.to_string(),
            x_pos: bounds.x,
            y_pos: bounds.y,
            width: bounds.width,
            height: bounds.height,
            class_name: None,
            style: None,
            style_temp: None,
        }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.x_pos, self.y_pos, self.width, self.height)
    }
}

// ─── Pipelines ───────────────────────────────────────────────────────────

/// One flow graph. Owned by the store; everything else holds copies.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_ref: Option<String>,
    /// Pipeline-level `app_data` other than canvas UI data.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub app_data: Value,
}

impl Pipeline {
    pub fn new(id: impl Into<ObjectId>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn node(&self, id: ObjectId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: ObjectId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn comment(&self, id: ObjectId) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    pub fn comment_mut(&mut self, id: ObjectId) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|c| c.id == id)
    }

    pub fn link(&self, id: ObjectId) -> Option<&Link> {
        self.links.iter().find(|l| l.id == id)
    }

    pub fn link_mut(&mut self, id: ObjectId) -> Option<&mut Link> {
        self.links.iter_mut().find(|l| l.id == id)
    }

    /// True if `id` names a node or comment in this pipeline.
    pub fn contains_object(&self, id: ObjectId) -> bool {
        self.node(id).is_some() || self.comment(id).is_some()
    }

    pub fn contains_id(&self, id: ObjectId) -> bool {
        self.contains_object(id) || self.link(id).is_some()
    }

    /// Bounds of a node or comment.
    pub fn object_bounds(&self, id: ObjectId) -> Option<Bounds> {
        self.node(id)
            .map(Node::bounds)
            .or_else(|| self.comment(id).map(Comment::bounds))
    }

    pub fn supernodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_supernode())
    }

    /// Copies of the nodes, comments and links named in `ids`, each with
    /// the index it holds now.
    pub fn removed_objects(&self, ids: &HashSet<ObjectId>) -> RemovedObjects {
        fn indexed<T: Clone>(items: &[T], keep: impl Fn(&T) -> bool) -> Vec<(usize, T)> {
            items
                .iter()
                .enumerate()
                .filter(|(_, item)| keep(item))
                .map(|(i, item)| (i, item.clone()))
                .collect()
        }
        RemovedObjects {
            nodes: indexed(&self.nodes, |n| ids.contains(&n.id)),
            comments: indexed(&self.comments, |c| ids.contains(&c.id)),
            links: indexed(&self.links, |l| ids.contains(&l.id)),
        }
    }
}

/// Objects taken out of a pipeline together with the indices they held.
/// Putting them back in ascending index order rebuilds the original order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemovedObjects {
    pub nodes: Vec<(usize, Node)>,
    pub comments: Vec<(usize, Comment)>,
    pub links: Vec<(usize, Link)>,
}

impl RemovedObjects {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.comments.is_empty() && self.links.is_empty()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.nodes.iter().map(|(_, n)| n.id)
    }

    pub fn comment_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.comments.iter().map(|(_, c)| c.id)
    }

    pub fn link_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.links.iter().map(|(_, l)| l.id)
    }

    pub fn restore_into(self, pipeline: &mut Pipeline) {
        reinsert(&mut pipeline.nodes, self.nodes);
        reinsert(&mut pipeline.comments, self.comments);
        reinsert(&mut pipeline.links, self.links);
    }
}

/// Insert each item at its recorded index, lowest first. An index past
/// the end appends.
pub(crate) fn reinsert<T>(list: &mut Vec<T>, mut items: Vec<(usize, T)>) {
    items.sort_by_key(|(i, _)| *i);
    for (i, item) in items {
        let at = i.min(list.len());
        list.insert(at, item);
    }
}

// ─── Navigation & notifications ──────────────────────────────────────────

/// One level of the pipeline navigation path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub pipeline_id: ObjectId,
    #[serde(default)]
    pub label: String,
    /// Supernode through which this pipeline was entered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supernode_id: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_pipeline_id: Option<ObjectId>,
}

impl Breadcrumb {
    pub fn root(pipeline_id: ObjectId) -> Self {
        Self {
            pipeline_id,
            label: String::new(),
            supernode_id: None,
            parent_pipeline_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}
