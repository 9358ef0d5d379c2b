//! The pipeline store.
//!
//! Holds the nested-pipeline document plus auxiliary canvas state (palette,
//! selection, breadcrumbs, notifications). [`Store::dispatch`] is the only
//! way to change any of it. Pipelines are kept behind `Rc` and reducers
//! mutate through `Rc::make_mut`, so a snapshot taken before a dispatch
//! keeps observing the old graph: the copy happens on first write.

use crate::id::ObjectId;
use crate::model::*;
use crate::palette::Palette;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

// ─── Document state ──────────────────────────────────────────────────────

/// The whole set of pipelines making up one flow document.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasInfo {
    /// Document ID (`pipeline-flow` top-level `id`).
    pub doc_id: ObjectId,
    pub primary_pipeline: ObjectId,
    pub pipelines: Vec<Rc<Pipeline>>,
    /// Top-level document fields the canvas does not interpret
    /// (`schemas`, `runtimes`, document `app_data`, ...).
    pub doc_extras: Value,
}

impl CanvasInfo {
    /// A document with one empty primary pipeline.
    pub fn with_primary(doc_id: ObjectId, primary: ObjectId) -> Self {
        Self {
            doc_id,
            primary_pipeline: primary,
            pipelines: vec![Rc::new(Pipeline::new(primary))],
            doc_extras: Value::Null,
        }
    }

    pub fn pipeline(&self, id: ObjectId) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.id == id).map(|p| &**p)
    }

    fn pipeline_mut(&mut self, id: ObjectId) -> Option<&mut Pipeline> {
        self.pipelines
            .iter_mut()
            .find(|p| p.id == id)
            .map(Rc::make_mut)
    }
}

/// Which objects are selected, and in which pipeline.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionInfo {
    pub pipeline_id: Option<ObjectId>,
    pub selected_object_ids: Vec<ObjectId>,
}

/// New coordinates for the loose ends of a detached link. `None` leaves
/// that end as it is.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinkEndPositions {
    pub src_pos: Option<Point>,
    pub trg_pos: Option<Point>,
}

/// Everything an in-place expansion pushed aside, before and after.
/// Collapsing reverses exactly these moves.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExpandDisplacement {
    pub old_objects: Vec<(ObjectId, Bounds)>,
    pub new_objects: Vec<(ObjectId, Bounds)>,
    pub old_links: Vec<(ObjectId, LinkEndPositions)>,
    pub new_links: Vec<(ObjectId, LinkEndPositions)>,
}

impl ExpandDisplacement {
    pub fn is_empty(&self) -> bool {
        self.new_objects.is_empty() && self.new_links.is_empty()
    }
}

/// Everything needed to flatten a supernode into its parent pipeline and
/// to rebuild it again afterwards. Indices are positions in the parent's
/// node and link lists and in the document's pipeline list.
#[derive(Debug, Clone, PartialEq)]
pub struct SupernodeRestructure {
    pub pipeline_id: ObjectId,
    pub supernode_index: usize,
    pub supernode: Node,
    /// Links in the parent pipeline attached to the supernode.
    pub supernode_links: Vec<(usize, Link)>,
    pub child_index: usize,
    pub child_pipeline: Pipeline,
    pub nodes_to_add: Vec<Node>,
    pub comments_to_add: Vec<Comment>,
    pub links_to_add: Vec<Link>,
    /// Surrounding objects pushed aside to make room, before and after.
    pub old_positions: Vec<(ObjectId, Bounds)>,
    pub new_positions: Vec<(ObjectId, Bounds)>,
}

// ─── Actions ─────────────────────────────────────────────────────────────

/// A tagged store mutation. Every pipeline-scoped action names its pipeline.
#[derive(Debug, Clone)]
pub enum Action {
    SetCanvasInfo(CanvasInfo),
    AddPipeline(Pipeline),
    DeletePipeline {
        pipeline_id: ObjectId,
    },
    /// Put pipelines back at the indices they held.
    RestorePipelines(Vec<(usize, Pipeline)>),

    AddNode {
        pipeline_id: ObjectId,
        node: Node,
    },
    AddNodes {
        pipeline_id: ObjectId,
        nodes: Vec<Node>,
    },
    ReplaceNode {
        pipeline_id: ObjectId,
        node: Node,
    },
    ReplaceNodes {
        pipeline_id: ObjectId,
        nodes: Vec<Node>,
    },
    SetNodeLabel {
        pipeline_id: ObjectId,
        node_id: ObjectId,
        label: String,
    },
    SetNodeParameters {
        pipeline_id: ObjectId,
        node_id: ObjectId,
        parameters: Value,
        messages: Vec<Message>,
    },
    /// Remove a node or comment together with every link attached to it.
    DeleteObject {
        pipeline_id: ObjectId,
        id: ObjectId,
    },
    DeleteObjects {
        pipeline_id: ObjectId,
        ids: Vec<ObjectId>,
    },
    /// Put removed nodes, comments and links back at their old indices.
    RestoreObjects {
        pipeline_id: ObjectId,
        objects: RemovedObjects,
    },

    AddComment {
        pipeline_id: ObjectId,
        comment: Comment,
    },
    AddComments {
        pipeline_id: ObjectId,
        comments: Vec<Comment>,
    },
    /// Replace the comment with the same ID.
    EditComment {
        pipeline_id: ObjectId,
        comment: Comment,
    },

    AddLink {
        pipeline_id: ObjectId,
        link: Link,
    },
    AddLinks {
        pipeline_id: ObjectId,
        links: Vec<Link>,
    },
    DeleteLink {
        pipeline_id: ObjectId,
        id: ObjectId,
    },
    DeleteLinks {
        pipeline_id: ObjectId,
        ids: Vec<ObjectId>,
    },
    /// Replace each link with the same ID.
    UpdateLinks {
        pipeline_id: ObjectId,
        links: Vec<Link>,
    },
    /// Replace the whole link list.
    SetLinks {
        pipeline_id: ObjectId,
        links: Vec<Link>,
    },

    /// Translate nodes, comments, and the loose ends of detached links.
    MoveObjects {
        pipeline_id: ObjectId,
        ids: Vec<ObjectId>,
        dx: f64,
        dy: f64,
    },
    SizeAndPositionObjects {
        pipeline_id: ObjectId,
        objects: Vec<(ObjectId, Bounds)>,
        links: Vec<(ObjectId, LinkEndPositions)>,
    },
    SetSupernodeExpandState {
        pipeline_id: ObjectId,
        node_id: ObjectId,
        expanded: bool,
        /// Recorded on expansion, dropped on collapse.
        pushed: Option<ExpandDisplacement>,
    },
    AddSupernodes {
        pipeline_id: ObjectId,
        supernodes: Vec<Node>,
        pipelines: Vec<Pipeline>,
    },
    DeleteSupernodes {
        pipeline_id: ObjectId,
        supernode_ids: Vec<ObjectId>,
        pipeline_ids: Vec<ObjectId>,
    },
    DeconstructSupernode(Box<SupernodeRestructure>),
    ReconstructSupernode(Box<SupernodeRestructure>),

    SetObjectsStyle {
        pipeline_id: ObjectId,
        styles: Vec<(ObjectId, Option<Value>)>,
        temporary: bool,
    },
    SetLinksStyle {
        pipeline_id: ObjectId,
        styles: Vec<(ObjectId, Option<Value>)>,
        temporary: bool,
    },

    SetSelections {
        pipeline_id: Option<ObjectId>,
        ids: Vec<ObjectId>,
    },
    SetBreadcrumbs(Vec<Breadcrumb>),
    SetNotificationMessages(Vec<Notification>),
    SetPalette(Palette),
    AddNodeTypeToPalette {
        node_type: Box<Node>,
        category_id: String,
        category_label: Option<String>,
    },
}

impl Action {
    /// Short tag for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Action::SetCanvasInfo(_) => "SET_CANVAS_INFO",
            Action::AddPipeline(_) => "ADD_PIPELINE",
            Action::DeletePipeline { .. } => "DELETE_PIPELINE",
            Action::RestorePipelines(_) => "RESTORE_PIPELINES",
            Action::AddNode { .. } => "ADD_NODE",
            Action::AddNodes { .. } => "ADD_NODES",
            Action::ReplaceNode { .. } => "REPLACE_NODE",
            Action::ReplaceNodes { .. } => "REPLACE_NODES",
            Action::SetNodeLabel { .. } => "SET_NODE_LABEL",
            Action::SetNodeParameters { .. } => "SET_NODE_PARAMETERS",
            Action::DeleteObject { .. } => "DELETE_OBJECT",
            Action::DeleteObjects { .. } => "DELETE_OBJECTS",
            Action::RestoreObjects { .. } => "RESTORE_OBJECTS",
            Action::AddComment { .. } => "ADD_COMMENT",
            Action::AddComments { .. } => "ADD_COMMENTS",
            Action::EditComment { .. } => "EDIT_COMMENT",
            Action::AddLink { .. } => "ADD_LINK",
            Action::AddLinks { .. } => "ADD_LINKS",
            Action::DeleteLink { .. } => "DELETE_LINK",
            Action::DeleteLinks { .. } => "DELETE_LINKS",
            Action::UpdateLinks { .. } => "UPDATE_LINKS",
            Action::SetLinks { .. } => "SET_LINKS",
            Action::MoveObjects { .. } => "MOVE_OBJECTS",
            Action::SizeAndPositionObjects { .. } => "SIZE_AND_POSITION_OBJECTS",
            Action::SetSupernodeExpandState { .. } => "SET_SUPERNODE_EXPAND_STATE",
            Action::AddSupernodes { .. } => "ADD_SUPERNODES",
            Action::DeleteSupernodes { .. } => "DELETE_SUPERNODES",
            Action::DeconstructSupernode(_) => "DECONSTRUCT_SUPERNODE",
            Action::ReconstructSupernode(_) => "RECONSTRUCT_SUPERNODE",
            Action::SetObjectsStyle { .. } => "SET_OBJECTS_STYLE",
            Action::SetLinksStyle { .. } => "SET_LINKS_STYLE",
            Action::SetSelections { .. } => "SET_SELECTIONS",
            Action::SetBreadcrumbs(_) => "SET_BREADCRUMBS",
            Action::SetNotificationMessages(_) => "SET_NOTIFICATION_MESSAGES",
            Action::SetPalette(_) => "SET_PALETTE",
            Action::AddNodeTypeToPalette { .. } => "ADD_NODE_TYPE_TO_PALETTE",
        }
    }
}

// ─── Store ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Store {
    canvas_info: CanvasInfo,
    /// What each in-place expanded supernode pushed, keyed by
    /// (pipeline, supernode).
    expansions: HashMap<(ObjectId, ObjectId), ExpandDisplacement>,
    palette: Palette,
    selection: SelectionInfo,
    breadcrumbs: Vec<Breadcrumb>,
    notifications: Vec<Notification>,
}

impl Store {
    pub fn new(canvas_info: CanvasInfo) -> Self {
        let breadcrumbs = vec![Breadcrumb::root(canvas_info.primary_pipeline)];
        Self {
            canvas_info,
            expansions: HashMap::new(),
            palette: Palette::default(),
            selection: SelectionInfo::default(),
            breadcrumbs,
            notifications: Vec::new(),
        }
    }

    // ─── Reads ───────────────────────────────────────────────────────────

    pub fn canvas_info(&self) -> &CanvasInfo {
        &self.canvas_info
    }

    /// A cheap copy of the current document. Later dispatches never alter it.
    pub fn snapshot(&self) -> CanvasInfo {
        self.canvas_info.clone()
    }

    pub fn primary_pipeline_id(&self) -> ObjectId {
        self.canvas_info.primary_pipeline
    }

    pub fn pipelines(&self) -> impl Iterator<Item = &Pipeline> {
        self.canvas_info.pipelines.iter().map(|p| &**p)
    }

    pub fn pipeline(&self, pipeline_id: ObjectId) -> Option<&Pipeline> {
        self.canvas_info.pipeline(pipeline_id)
    }

    pub fn get_node(&self, pipeline_id: ObjectId, id: ObjectId) -> Option<&Node> {
        self.pipeline(pipeline_id)?.node(id)
    }

    pub fn get_comment(&self, pipeline_id: ObjectId, id: ObjectId) -> Option<&Comment> {
        self.pipeline(pipeline_id)?.comment(id)
    }

    pub fn get_link(&self, pipeline_id: ObjectId, id: ObjectId) -> Option<&Link> {
        self.pipeline(pipeline_id)?.link(id)
    }

    pub fn get_nodes(&self, pipeline_id: ObjectId) -> &[Node] {
        self.pipeline(pipeline_id)
            .map(|p| p.nodes.as_slice())
            .unwrap_or_default()
    }

    pub fn get_comments(&self, pipeline_id: ObjectId) -> &[Comment] {
        self.pipeline(pipeline_id)
            .map(|p| p.comments.as_slice())
            .unwrap_or_default()
    }

    pub fn get_links(&self, pipeline_id: ObjectId) -> &[Link] {
        self.pipeline(pipeline_id)
            .map(|p| p.links.as_slice())
            .unwrap_or_default()
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// What expanding `node_id` in place pushed aside, if it is expanded.
    pub fn expand_displacement(&self, pipeline_id: ObjectId, node_id: ObjectId) -> Option<&ExpandDisplacement> {
        self.expansions.get(&(pipeline_id, node_id))
    }

    pub fn selection(&self) -> &SelectionInfo {
        &self.selection
    }

    pub fn breadcrumbs(&self) -> &[Breadcrumb] {
        &self.breadcrumbs
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// True if `id` is used by any pipeline or by any object in any pipeline.
    pub fn contains_id(&self, id: ObjectId) -> bool {
        self.pipelines().any(|p| p.id == id || p.contains_id(id))
    }

    // ─── Mutation ────────────────────────────────────────────────────────

    /// Apply one action. Reducers are total over their declared shape: an
    /// action naming an unknown pipeline is logged and leaves the store
    /// unchanged.
    pub fn dispatch(&mut self, action: Action) {
        log::trace!("dispatch {}", action.name());
        match action {
            Action::SetCanvasInfo(info) => {
                self.breadcrumbs = vec![Breadcrumb::root(info.primary_pipeline)];
                self.expansions.clear();
                self.canvas_info = info;
            }
            Action::AddPipeline(pipeline) => {
                if self.pipeline(pipeline.id).is_some() {
                    log::error!("ADD_PIPELINE: pipeline '{}' already exists", pipeline.id);
                } else {
                    self.canvas_info.pipelines.push(Rc::new(pipeline));
                }
            }
            Action::DeletePipeline { pipeline_id } => {
                self.canvas_info.pipelines.retain(|p| p.id != pipeline_id);
            }
            Action::RestorePipelines(pipelines) => self.restore_pipelines(pipelines),

            Action::AddNode { pipeline_id, node } => {
                self.with_pipeline(pipeline_id, |p| p.nodes.push(node));
            }
            Action::AddNodes { pipeline_id, nodes } => {
                self.with_pipeline(pipeline_id, |p| p.nodes.extend(nodes));
            }
            Action::ReplaceNode { pipeline_id, node } => {
                self.with_pipeline(pipeline_id, |p| replace_node(p, node));
            }
            Action::ReplaceNodes { pipeline_id, nodes } => {
                self.with_pipeline(pipeline_id, |p| {
                    for node in nodes {
                        replace_node(p, node);
                    }
                });
            }
            Action::SetNodeLabel {
                pipeline_id,
                node_id,
                label,
            } => {
                self.with_pipeline(pipeline_id, |p| {
                    if let Some(node) = p.node_mut(node_id) {
                        node.label = label;
                    }
                });
            }
            Action::SetNodeParameters {
                pipeline_id,
                node_id,
                parameters,
                messages,
            } => {
                self.with_pipeline(pipeline_id, |p| {
                    if let Some(node) = p.node_mut(node_id) {
                        node.parameters = parameters;
                        node.messages = messages;
                    }
                });
            }
            Action::DeleteObject { pipeline_id, id } => {
                self.with_pipeline(pipeline_id, |p| delete_objects(p, &[id]));
            }
            Action::DeleteObjects { pipeline_id, ids } => {
                self.with_pipeline(pipeline_id, |p| delete_objects(p, &ids));
            }
            Action::RestoreObjects { pipeline_id, objects } => {
                self.with_pipeline(pipeline_id, |p| objects.restore_into(p));
            }

            Action::AddComment {
                pipeline_id,
                comment,
            } => {
                self.with_pipeline(pipeline_id, |p| p.comments.push(comment));
            }
            Action::AddComments {
                pipeline_id,
                comments,
            } => {
                self.with_pipeline(pipeline_id, |p| p.comments.extend(comments));
            }
            Action::EditComment {
                pipeline_id,
                comment,
            } => {
                self.with_pipeline(pipeline_id, |p| {
                    if let Some(existing) = p.comment_mut(comment.id) {
                        *existing = comment;
                    }
                });
            }

            Action::AddLink { pipeline_id, link } => {
                self.with_pipeline(pipeline_id, |p| p.links.push(link));
            }
            Action::AddLinks { pipeline_id, links } => {
                self.with_pipeline(pipeline_id, |p| p.links.extend(links));
            }
            Action::DeleteLink { pipeline_id, id } => {
                self.with_pipeline(pipeline_id, |p| p.links.retain(|l| l.id != id));
            }
            Action::DeleteLinks { pipeline_id, ids } => {
                let ids: HashSet<ObjectId> = ids.into_iter().collect();
                self.with_pipeline(pipeline_id, |p| p.links.retain(|l| !ids.contains(&l.id)));
            }
            Action::UpdateLinks { pipeline_id, links } => {
                self.with_pipeline(pipeline_id, |p| {
                    for link in links {
                        if let Some(existing) = p.link_mut(link.id) {
                            *existing = link;
                        }
                    }
                });
            }
            Action::SetLinks { pipeline_id, links } => {
                self.with_pipeline(pipeline_id, |p| p.links = links);
            }

            Action::MoveObjects {
                pipeline_id,
                ids,
                dx,
                dy,
            } => {
                self.with_pipeline(pipeline_id, |p| move_objects(p, &ids, dx, dy));
            }
            Action::SizeAndPositionObjects {
                pipeline_id,
                objects,
                links,
            } => {
                self.with_pipeline(pipeline_id, |p| {
                    set_object_bounds(p, &objects);
                    set_link_positions(p, &links);
                });
            }
            Action::SetSupernodeExpandState {
                pipeline_id,
                node_id,
                expanded,
                pushed,
            } => {
                self.with_pipeline(pipeline_id, |p| {
                    if let Some(node) = p.node_mut(node_id) {
                        node.is_expanded = expanded;
                    }
                });
                match pushed {
                    Some(pushed) if expanded => {
                        self.expansions.insert((pipeline_id, node_id), pushed);
                    }
                    _ => {
                        self.expansions.remove(&(pipeline_id, node_id));
                    }
                }
            }
            Action::AddSupernodes {
                pipeline_id,
                supernodes,
                pipelines,
            } => {
                for pipeline in pipelines {
                    self.dispatch(Action::AddPipeline(pipeline));
                }
                self.with_pipeline(pipeline_id, |p| p.nodes.extend(supernodes));
            }
            Action::DeleteSupernodes {
                pipeline_id,
                supernode_ids,
                pipeline_ids,
            } => {
                self.with_pipeline(pipeline_id, |p| delete_objects(p, &supernode_ids));
                self.canvas_info
                    .pipelines
                    .retain(|p| !pipeline_ids.contains(&p.id));
            }
            Action::DeconstructSupernode(info) => self.deconstruct_supernode(*info),
            Action::ReconstructSupernode(info) => self.reconstruct_supernode(*info),

            Action::SetObjectsStyle {
                pipeline_id,
                styles,
                temporary,
            } => {
                self.with_pipeline(pipeline_id, |p| {
                    for (id, style) in styles {
                        if let Some(node) = p.node_mut(id) {
                            *style_slot(&mut node.style, &mut node.style_temp, temporary) = style;
                        } else if let Some(comment) = p.comment_mut(id) {
                            *style_slot(&mut comment.style, &mut comment.style_temp, temporary) =
                                style;
                        }
                    }
                });
            }
            Action::SetLinksStyle {
                pipeline_id,
                styles,
                temporary,
            } => {
                self.with_pipeline(pipeline_id, |p| {
                    for (id, style) in styles {
                        if let Some(link) = p.link_mut(id) {
                            *style_slot(&mut link.style, &mut link.style_temp, temporary) = style;
                        }
                    }
                });
            }

            Action::SetSelections { pipeline_id, ids } => {
                self.selection = SelectionInfo {
                    pipeline_id: if ids.is_empty() { None } else { pipeline_id },
                    selected_object_ids: ids,
                };
            }
            Action::SetBreadcrumbs(breadcrumbs) => {
                if breadcrumbs.first().map(|b| b.pipeline_id) == Some(self.primary_pipeline_id()) {
                    self.breadcrumbs = breadcrumbs;
                } else {
                    log::error!("SET_BREADCRUMBS: first breadcrumb must be the primary pipeline");
                }
            }
            Action::SetNotificationMessages(messages) => {
                self.notifications = messages;
            }
            Action::SetPalette(palette) => {
                self.palette = palette;
            }
            Action::AddNodeTypeToPalette {
                node_type,
                category_id,
                category_label,
            } => {
                self.palette
                    .add_node_type(*node_type, &category_id, category_label.as_deref());
            }
        }
        self.prune_selection();
    }

    fn restore_pipelines(&mut self, pipelines: Vec<(usize, Pipeline)>) {
        let (fresh, existing): (Vec<_>, Vec<_>) = pipelines
            .into_iter()
            .partition(|(_, p)| self.pipeline(p.id).is_none());
        for (_, p) in existing {
            log::error!("RESTORE_PIPELINES: pipeline '{}' already exists", p.id);
        }
        reinsert(
            &mut self.canvas_info.pipelines,
            fresh.into_iter().map(|(i, p)| (i, Rc::new(p))).collect(),
        );
    }

    fn with_pipeline(&mut self, pipeline_id: ObjectId, f: impl FnOnce(&mut Pipeline)) {
        match self.canvas_info.pipeline_mut(pipeline_id) {
            Some(pipeline) => f(pipeline),
            None => log::error!("dispatch against unknown pipeline '{pipeline_id}'"),
        }
    }

    /// Drop selected IDs that no longer name a node or comment in the
    /// selection pipeline.
    fn prune_selection(&mut self) {
        let Some(pipeline_id) = self.selection.pipeline_id else {
            return;
        };
        let retained: Vec<ObjectId> = match self.canvas_info.pipeline(pipeline_id) {
            Some(p) => self
                .selection
                .selected_object_ids
                .iter()
                .copied()
                .filter(|id| p.contains_object(*id))
                .collect(),
            None => Vec::new(),
        };
        if retained.len() != self.selection.selected_object_ids.len() {
            self.selection.selected_object_ids = retained;
            if self.selection.selected_object_ids.is_empty() {
                self.selection.pipeline_id = None;
            }
        }
    }

    fn deconstruct_supernode(&mut self, info: SupernodeRestructure) {
        let supernode_id = info.supernode.id;
        let child_id = info.child_pipeline.id;
        let link_ids: HashSet<ObjectId> = info.supernode_links.iter().map(|(_, l)| l.id).collect();
        self.with_pipeline(info.pipeline_id, move |p| {
            p.nodes.retain(|n| n.id != supernode_id);
            p.links.retain(|l| !link_ids.contains(&l.id) && !l.contains_id(supernode_id));
            set_object_bounds(p, &info.new_positions);
            p.nodes.extend(info.nodes_to_add);
            p.comments.extend(info.comments_to_add);
            p.links.extend(info.links_to_add);
        });
        self.canvas_info.pipelines.retain(|p| p.id != child_id);
    }

    fn reconstruct_supernode(&mut self, info: SupernodeRestructure) {
        let node_ids: HashSet<ObjectId> = info.nodes_to_add.iter().map(|n| n.id).collect();
        let comment_ids: HashSet<ObjectId> = info.comments_to_add.iter().map(|c| c.id).collect();
        let link_ids: HashSet<ObjectId> = info.links_to_add.iter().map(|l| l.id).collect();
        self.with_pipeline(info.pipeline_id, move |p| {
            p.nodes.retain(|n| !node_ids.contains(&n.id));
            p.comments.retain(|c| !comment_ids.contains(&c.id));
            p.links.retain(|l| !link_ids.contains(&l.id));
            set_object_bounds(p, &info.old_positions);
            reinsert(&mut p.nodes, vec![(info.supernode_index, info.supernode)]);
            reinsert(&mut p.links, info.supernode_links);
        });
        self.restore_pipelines(vec![(info.child_index, info.child_pipeline)]);
    }
}

// ─── Reducer helpers ─────────────────────────────────────────────────────

fn replace_node(pipeline: &mut Pipeline, node: Node) {
    if let Some(existing) = pipeline.node_mut(node.id) {
        *existing = node;
    }
}

fn delete_objects(pipeline: &mut Pipeline, ids: &[ObjectId]) {
    let ids: HashSet<ObjectId> = ids.iter().copied().collect();
    pipeline.nodes.retain(|n| !ids.contains(&n.id));
    pipeline.comments.retain(|c| !ids.contains(&c.id));
    pipeline
        .links
        .retain(|l| !ids.contains(&l.id) && !ids.iter().any(|id| l.contains_id(*id)));
}

fn move_objects(pipeline: &mut Pipeline, ids: &[ObjectId], dx: f64, dy: f64) {
    let ids: HashSet<ObjectId> = ids.iter().copied().collect();
    for node in pipeline.nodes.iter_mut().filter(|n| ids.contains(&n.id)) {
        node.x_pos += dx;
        node.y_pos += dy;
    }
    for comment in pipeline.comments.iter_mut().filter(|c| ids.contains(&c.id)) {
        comment.x_pos += dx;
        comment.y_pos += dy;
    }
    for link in pipeline.links.iter_mut().filter(|l| ids.contains(&l.id)) {
        if let LinkEnd::Detached(p) = &mut link.src {
            *p = p.offset(dx, dy);
        }
        if let LinkEnd::Detached(p) = &mut link.trg {
            *p = p.offset(dx, dy);
        }
    }
}

fn set_object_bounds(pipeline: &mut Pipeline, objects: &[(ObjectId, Bounds)]) {
    let by_id: HashMap<ObjectId, Bounds> = objects.iter().copied().collect();
    for node in pipeline.nodes.iter_mut() {
        if let Some(b) = by_id.get(&node.id) {
            node.x_pos = b.x;
            node.y_pos = b.y;
            if node.is_expanded {
                node.expanded_width = Some(b.width);
                node.expanded_height = Some(b.height);
            } else {
                node.width = b.width;
                node.height = b.height;
            }
        }
    }
    for comment in pipeline.comments.iter_mut() {
        if let Some(b) = by_id.get(&comment.id) {
            comment.x_pos = b.x;
            comment.y_pos = b.y;
            comment.width = b.width;
            comment.height = b.height;
        }
    }
}

fn set_link_positions(pipeline: &mut Pipeline, links: &[(ObjectId, LinkEndPositions)]) {
    for (id, positions) in links {
        let Some(link) = pipeline.link_mut(*id) else {
            continue;
        };
        if let (Some(pos), LinkEnd::Detached(p)) = (positions.src_pos, &mut link.src) {
            *p = pos;
        }
        if let (Some(pos), LinkEnd::Detached(p)) = (positions.trg_pos, &mut link.trg) {
            *p = pos;
        }
    }
}

fn style_slot<'a>(
    style: &'a mut Option<Value>,
    style_temp: &'a mut Option<Value>,
    temporary: bool,
) -> &'a mut Option<Value> {
    if temporary { style_temp } else { style }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ObjectId {
        ObjectId::intern(s)
    }

    fn store_with_two_nodes() -> Store {
        let mut info = CanvasInfo::with_primary(id("doc"), id("p1"));
        let p = Rc::make_mut(&mut info.pipelines[0]);
        p.nodes.push(Node::new("n1", NodeType::ExecutionNode));
        p.nodes.push(Node::new("n2", NodeType::ExecutionNode));
        p.links.push(Link::new(
            "l1",
            LinkType::NodeLink,
            LinkEnd::attached(id("n1"), None),
            LinkEnd::attached(id("n2"), None),
        ));
        Store::new(info)
    }

    #[test]
    fn snapshots_are_not_mutated_by_dispatch() {
        let mut store = store_with_two_nodes();
        let before = store.snapshot();
        store.dispatch(Action::MoveObjects {
            pipeline_id: id("p1"),
            ids: vec![id("n1")],
            dx: 10.0,
            dy: 5.0,
        });
        assert_eq!(before.pipeline(id("p1")).unwrap().nodes[0].x_pos, 0.0);
        assert_eq!(store.get_node(id("p1"), id("n1")).unwrap().x_pos, 10.0);
    }

    #[test]
    fn delete_object_removes_attached_links() {
        let mut store = store_with_two_nodes();
        store.dispatch(Action::DeleteObject {
            pipeline_id: id("p1"),
            id: id("n2"),
        });
        assert!(store.get_links(id("p1")).is_empty());
        assert_eq!(store.get_nodes(id("p1")).len(), 1);
    }

    #[test]
    fn unknown_pipeline_leaves_store_untouched() {
        let mut store = store_with_two_nodes();
        let before = store.snapshot();
        store.dispatch(Action::AddNode {
            pipeline_id: id("missing"),
            node: Node::new("n3", NodeType::ExecutionNode),
        });
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn deletion_prunes_selection() {
        let mut store = store_with_two_nodes();
        store.dispatch(Action::SetSelections {
            pipeline_id: Some(id("p1")),
            ids: vec![id("n1"), id("n2")],
        });
        store.dispatch(Action::DeleteObject {
            pipeline_id: id("p1"),
            id: id("n1"),
        });
        assert_eq!(store.selection().selected_object_ids, vec![id("n2")]);
    }

    #[test]
    fn breadcrumbs_must_start_at_primary() {
        let mut store = store_with_two_nodes();
        store.dispatch(Action::SetBreadcrumbs(vec![Breadcrumb::root(id("elsewhere"))]));
        assert_eq!(store.breadcrumbs()[0].pipeline_id, id("p1"));
    }

    #[test]
    fn restore_objects_keeps_original_order() {
        let mut store = store_with_two_nodes();
        let before = store.snapshot();
        let ids: HashSet<ObjectId> = [id("n1"), id("l1")].into_iter().collect();
        let removed = store.pipeline(id("p1")).unwrap().removed_objects(&ids);
        store.dispatch(Action::DeleteObject {
            pipeline_id: id("p1"),
            id: id("n1"),
        });
        store.dispatch(Action::RestoreObjects {
            pipeline_id: id("p1"),
            objects: removed,
        });
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn restored_pipeline_returns_to_its_slot() {
        let mut store = store_with_two_nodes();
        store.dispatch(Action::AddPipeline(Pipeline::new("p2")));
        store.dispatch(Action::AddPipeline(Pipeline::new("p3")));
        store.dispatch(Action::DeletePipeline { pipeline_id: id("p2") });
        store.dispatch(Action::RestorePipelines(vec![(1, Pipeline::new("p2"))]));
        let order: Vec<ObjectId> = store.pipelines().map(|p| p.id).collect();
        assert_eq!(order, vec![id("p1"), id("p2"), id("p3")]);
    }

    #[test]
    fn expansion_record_lives_until_collapse() {
        let mut store = store_with_two_nodes();
        let pushed = ExpandDisplacement {
            old_objects: vec![(id("n2"), Bounds::new(0.0, 0.0, 10.0, 10.0))],
            new_objects: vec![(id("n2"), Bounds::new(50.0, 0.0, 10.0, 10.0))],
            ..Default::default()
        };
        store.dispatch(Action::SetSupernodeExpandState {
            pipeline_id: id("p1"),
            node_id: id("n1"),
            expanded: true,
            pushed: Some(pushed.clone()),
        });
        assert_eq!(store.expand_displacement(id("p1"), id("n1")), Some(&pushed));
        store.dispatch(Action::SetSupernodeExpandState {
            pipeline_id: id("p1"),
            node_id: id("n1"),
            expanded: false,
            pushed: None,
        });
        assert!(store.expand_displacement(id("p1"), id("n1")).is_none());
    }
}
