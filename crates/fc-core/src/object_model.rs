//! Object model facade.
//!
//! Owns the [`Store`] together with the canvas config and the ID generator,
//! and coordinates everything that spans pipelines: selection (with change
//! notification), breadcrumbs, notification messages, supernode lifecycle
//! helpers, copy/paste cloning, and the document/palette JSON boundary.
//! Per-pipeline editing goes through [`ObjectModel::api_pipeline`].

use crate::config::CanvasConfig;
use crate::error::FlowError;
use crate::flow::{self, PipelineFlow};
use crate::id::{IdGenerator, IdKind, ObjectId, UuidIdGenerator};
use crate::model::*;
use crate::palette::Palette;
use crate::pipeline::ApiPipeline;
use crate::store::{Action, CanvasInfo, SelectionInfo, Store};
use petgraph::algo::connected_components;
use petgraph::graphmap::{DiGraphMap, UnGraphMap};
use petgraph::visit::{Bfs, Reversed};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

// ─── Selection change ────────────────────────────────────────────────────

/// Delivered once per edit whose effective selection differs from the
/// selection before it. `added_*` and `deselected_*` are set differences
/// between the old and new selection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionChange {
    pub selection: Vec<ObjectId>,
    pub selected_nodes: Vec<Node>,
    pub selected_comments: Vec<Comment>,
    pub added_nodes: Vec<Node>,
    pub added_comments: Vec<Comment>,
    pub deselected_nodes: Vec<Node>,
    pub deselected_comments: Vec<Comment>,
    pub selected_pipeline_id: Option<ObjectId>,
    pub previous_pipeline_id: Option<ObjectId>,
}

pub type SelectionHandler = Box<dyn FnMut(&SelectionChange)>;

// ─── Copy / paste payload ────────────────────────────────────────────────

/// Objects cut or copied from one pipeline, plus the pipelines owned by any
/// copied supernode. Every field may be missing in clipboard JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CopiedObjects {
    pub nodes: Vec<Node>,
    pub comments: Vec<Comment>,
    pub links: Vec<Link>,
    pub pipelines: Vec<Pipeline>,
}

impl CopiedObjects {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.comments.is_empty() && self.links.is_empty()
    }

    /// Bounding box of the copied nodes and comments.
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::enclosing(
            self.nodes
                .iter()
                .map(Node::bounds)
                .chain(self.comments.iter().map(Comment::bounds)),
        )
    }
}

// ─── Object model ────────────────────────────────────────────────────────

pub struct ObjectModel {
    store: Store,
    config: CanvasConfig,
    ids: Box<dyn IdGenerator>,
    selection_handler: Option<SelectionHandler>,
}

impl ObjectModel {
    /// An empty document with one primary pipeline and random UUID IDs.
    pub fn new(config: CanvasConfig) -> Self {
        Self::with_id_generator(config, Box::new(UuidIdGenerator))
    }

    pub fn with_id_generator(config: CanvasConfig, mut ids: Box<dyn IdGenerator>) -> Self {
        let doc_id = ObjectId::intern(&ids.generate(IdKind::Document));
        let primary = ObjectId::intern(&ids.generate(IdKind::Pipeline));
        Self {
            store: Store::new(CanvasInfo::with_primary(doc_id, primary)),
            config,
            ids,
            selection_handler: None,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    /// Apply a raw store action. Commands use this for actions that have
    /// no pipeline facade counterpart.
    pub fn dispatch(&mut self, action: Action) {
        self.store.dispatch(action);
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut CanvasConfig {
        &mut self.config
    }

    pub fn set_id_generator(&mut self, ids: Box<dyn IdGenerator>) {
        self.ids = ids;
    }

    /// A fresh ID not used anywhere in the document.
    pub fn next_id(&mut self, kind: IdKind) -> ObjectId {
        loop {
            let id = ObjectId::intern(&self.ids.generate(kind));
            if !self.store.contains_id(id) && id != self.store.canvas_info().doc_id {
                return id;
            }
            log::debug!("skipping generated id '{id}': already in use");
        }
    }

    pub fn api_pipeline(&mut self, pipeline_id: ObjectId) -> ApiPipeline<'_> {
        ApiPipeline::new(self, pipeline_id)
    }

    pub fn primary_pipeline_id(&self) -> ObjectId {
        self.store.primary_pipeline_id()
    }

    pub fn pipeline(&self, pipeline_id: ObjectId) -> Option<&Pipeline> {
        self.store.pipeline(pipeline_id)
    }

    pub fn get_canvas_info(&self) -> CanvasInfo {
        self.store.snapshot()
    }

    /// Replace the whole document. Selection is cleared.
    pub fn set_canvas_info(&mut self, info: CanvasInfo) {
        self.execute_with_selection_change(|om| {
            om.store.dispatch(Action::SetSelections {
                pipeline_id: None,
                ids: Vec::new(),
            });
            om.store.dispatch(Action::SetCanvasInfo(info));
        });
    }

    // ─── Document boundary ───────────────────────────────────────────────

    /// Load a pipeline-flow document. Node sizes are derived from the
    /// layout config since documents do not store them.
    pub fn set_pipeline_flow(&mut self, json: &str) -> Result<(), FlowError> {
        let mut info = flow::parse_pipeline_flow(json)?;
        for pipeline in info.pipelines.iter_mut() {
            let pipeline = Rc::make_mut(pipeline);
            for node in pipeline.nodes.iter_mut() {
                self.config.node_layout.size_node(node);
            }
        }
        log::debug!(
            "loaded pipeline flow '{}' with {} pipelines",
            info.doc_id,
            info.pipelines.len()
        );
        self.set_canvas_info(info);
        Ok(())
    }

    pub fn get_pipeline_flow(&self) -> PipelineFlow {
        flow::flow_from_canvas_info(self.store.canvas_info())
    }

    pub fn get_pipeline_flow_json(&self) -> Result<String, FlowError> {
        flow::emit_pipeline_flow(self.store.canvas_info())
    }

    pub fn set_palette_json(&mut self, json: &str) -> Result<(), FlowError> {
        let palette = Palette::from_json(json)?;
        self.store.dispatch(Action::SetPalette(palette));
        Ok(())
    }

    pub fn get_palette(&self) -> &Palette {
        self.store.palette()
    }

    pub fn add_node_type_to_palette(&mut self, node: Node, category_id: &str, category_label: Option<&str>) {
        self.store.dispatch(Action::AddNodeTypeToPalette {
            node_type: Box::new(node),
            category_id: category_id.to_string(),
            category_label: category_label.map(str::to_string),
        });
    }

    // ─── Selection ───────────────────────────────────────────────────────

    pub fn set_selection_change_handler(&mut self, handler: SelectionHandler) {
        self.selection_handler = Some(handler);
    }

    /// Run `f` and then fire at most one selection-change notification,
    /// however many actions `f` dispatched.
    pub fn execute_with_selection_change<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let before_info = self.store.snapshot();
        let before = self.store.selection().clone();
        let result = f(self);
        let after = self.store.selection().clone();
        if selection_differs(&before, &after) {
            let change = self.selection_change(&before_info, &before, &after);
            log::debug!("selection changed: {:?}", change.selection);
            if let Some(handler) = self.selection_handler.as_mut() {
                handler(&change);
            }
        }
        result
    }

    fn selection_change(
        &self,
        before_info: &CanvasInfo,
        before: &SelectionInfo,
        after: &SelectionInfo,
    ) -> SelectionChange {
        let same_pipeline = before.pipeline_id == after.pipeline_id;
        let old_ids: HashSet<ObjectId> = if same_pipeline {
            before.selected_object_ids.iter().copied().collect()
        } else {
            HashSet::new()
        };
        let new_ids: HashSet<ObjectId> = if same_pipeline {
            after.selected_object_ids.iter().copied().collect()
        } else {
            HashSet::new()
        };

        let current = after.pipeline_id.and_then(|id| self.store.pipeline(id));
        let previous = before.pipeline_id.and_then(|id| before_info.pipeline(id));

        let mut change = SelectionChange {
            selection: after.selected_object_ids.clone(),
            selected_pipeline_id: after.pipeline_id,
            previous_pipeline_id: before.pipeline_id,
            ..Default::default()
        };
        if let Some(p) = current {
            for id in &after.selected_object_ids {
                if let Some(node) = p.node(*id) {
                    change.selected_nodes.push(node.clone());
                    if !old_ids.contains(id) {
                        change.added_nodes.push(node.clone());
                    }
                } else if let Some(comment) = p.comment(*id) {
                    change.selected_comments.push(comment.clone());
                    if !old_ids.contains(id) {
                        change.added_comments.push(comment.clone());
                    }
                }
            }
        }
        if let Some(p) = previous {
            for id in before.selected_object_ids.iter().filter(|id| !new_ids.contains(id)) {
                if let Some(node) = p.node(*id) {
                    change.deselected_nodes.push(node.clone());
                } else if let Some(comment) = p.comment(*id) {
                    change.deselected_comments.push(comment.clone());
                }
            }
        }
        change
    }

    pub fn get_selection_pipeline_id(&self) -> Option<ObjectId> {
        self.store.selection().pipeline_id
    }

    pub fn get_selected_object_ids(&self) -> &[ObjectId] {
        &self.store.selection().selected_object_ids
    }

    pub fn is_selected(&self, id: ObjectId, pipeline_id: ObjectId) -> bool {
        self.get_selection_pipeline_id() == Some(pipeline_id) && self.get_selected_object_ids().contains(&id)
    }

    pub fn get_selected_nodes(&self) -> Vec<&Node> {
        let Some(p) = self.get_selection_pipeline_id().and_then(|id| self.store.pipeline(id)) else {
            return Vec::new();
        };
        self.get_selected_object_ids()
            .iter()
            .filter_map(|id| p.node(*id))
            .collect()
    }

    pub fn get_selected_comments(&self) -> Vec<&Comment> {
        let Some(p) = self.get_selection_pipeline_id().and_then(|id| self.store.pipeline(id)) else {
            return Vec::new();
        };
        self.get_selected_object_ids()
            .iter()
            .filter_map(|id| p.comment(*id))
            .collect()
    }

    pub fn set_selections(&mut self, ids: Vec<ObjectId>, pipeline_id: ObjectId) {
        self.execute_with_selection_change(|om| {
            om.store.dispatch(Action::SetSelections {
                pipeline_id: Some(pipeline_id),
                ids,
            });
        });
    }

    /// Click semantics: with `extend` the object is added or removed; without
    /// it an unselected object becomes the only selection and a selected
    /// one leaves the selection alone.
    pub fn toggle_selection(&mut self, id: ObjectId, extend: bool, pipeline_id: ObjectId) {
        let selected = self.is_selected(id, pipeline_id);
        let mut ids: Vec<ObjectId> = if self.get_selection_pipeline_id() == Some(pipeline_id) {
            self.get_selected_object_ids().to_vec()
        } else {
            Vec::new()
        };
        match (extend, selected) {
            (true, true) => ids.retain(|i| *i != id),
            (true, false) => ids.push(id),
            (false, true) => return,
            (false, false) => ids = vec![id],
        }
        self.set_selections(ids, pipeline_id);
    }

    pub fn select_all(&mut self, pipeline_id: ObjectId) {
        let Some(p) = self.store.pipeline(pipeline_id) else {
            return;
        };
        let ids = p
            .nodes
            .iter()
            .map(|n| n.id)
            .chain(p.comments.iter().map(|c| c.id))
            .collect();
        self.set_selections(ids, pipeline_id);
    }

    pub fn deselect_all(&mut self) {
        self.execute_with_selection_change(|om| {
            om.store.dispatch(Action::SetSelections {
                pipeline_id: None,
                ids: Vec::new(),
            });
        });
    }

    /// Extend the selection with `end_id` and every node lying on a
    /// data-link path between an already selected node and `end_id`, in
    /// either direction.
    pub fn select_sub_graph(&mut self, end_id: ObjectId, pipeline_id: ObjectId) {
        let Some(p) = self.store.pipeline(pipeline_id) else {
            return;
        };
        if p.node(end_id).is_none() {
            return;
        }
        let mut ids: Vec<ObjectId> = if self.get_selection_pipeline_id() == Some(pipeline_id) {
            self.get_selected_object_ids().to_vec()
        } else {
            Vec::new()
        };

        let mut graph: DiGraphMap<ObjectId, ()> = DiGraphMap::new();
        for node in &p.nodes {
            graph.add_node(node.id);
        }
        for link in p.links.iter().filter(|l| l.is_data_link()) {
            if let (Some(s), Some(t)) = (link.src_obj_id(), link.trg_obj_id()) {
                graph.add_edge(s, t, ());
            }
        }
        let forward = |start: ObjectId| -> HashSet<ObjectId> {
            let mut bfs = Bfs::new(&graph, start);
            let mut seen = HashSet::new();
            while let Some(n) = bfs.next(&graph) {
                seen.insert(n);
            }
            seen
        };
        let backward = |start: ObjectId| -> HashSet<ObjectId> {
            let reversed = Reversed(&graph);
            let mut bfs = Bfs::new(reversed, start);
            let mut seen = HashSet::new();
            while let Some(n) = bfs.next(reversed) {
                seen.insert(n);
            }
            seen
        };

        let fwd_end = forward(end_id);
        let bwd_end = backward(end_id);
        let mut on_path: HashSet<ObjectId> = HashSet::from([end_id]);
        for start in ids.iter().filter(|id| p.node(**id).is_some()) {
            on_path.extend(forward(*start).intersection(&bwd_end));
            on_path.extend(fwd_end.intersection(&backward(*start)));
        }

        for node in &p.nodes {
            if on_path.contains(&node.id) && !ids.contains(&node.id) {
                ids.push(node.id);
            }
        }
        self.set_selections(ids, pipeline_id);
    }

    /// True when the selected nodes form one connected group over the
    /// data links between them.
    pub fn are_selected_nodes_contiguous(&self) -> bool {
        let Some(pipeline_id) = self.get_selection_pipeline_id() else {
            return false;
        };
        let selected: HashSet<ObjectId> = self.get_selected_nodes().iter().map(|n| n.id).collect();
        if selected.is_empty() {
            return false;
        }
        let mut graph: UnGraphMap<ObjectId, ()> = UnGraphMap::new();
        for id in &selected {
            graph.add_node(*id);
        }
        for link in self.store.get_links(pipeline_id).iter().filter(|l| l.is_data_link()) {
            if let (Some(s), Some(t)) = (link.src_obj_id(), link.trg_obj_id()) {
                if selected.contains(&s) && selected.contains(&t) {
                    graph.add_edge(s, t, ());
                }
            }
        }
        connected_components(&graph) == 1
    }

    // ─── Breadcrumbs ─────────────────────────────────────────────────────

    pub fn get_breadcrumbs(&self) -> &[Breadcrumb] {
        self.store.breadcrumbs()
    }

    pub fn get_current_breadcrumb(&self) -> Option<&Breadcrumb> {
        self.store.breadcrumbs().last()
    }

    /// The pipeline currently on display.
    pub fn get_current_pipeline_id(&self) -> ObjectId {
        self.get_current_breadcrumb()
            .map_or(self.primary_pipeline_id(), |b| b.pipeline_id)
    }

    pub fn add_new_breadcrumb(&mut self, breadcrumb: Breadcrumb) {
        if self.store.pipeline(breadcrumb.pipeline_id).is_none() {
            log::error!("breadcrumb for unknown pipeline '{}'", breadcrumb.pipeline_id);
            return;
        }
        let mut crumbs = self.store.breadcrumbs().to_vec();
        crumbs.push(breadcrumb);
        self.store.dispatch(Action::SetBreadcrumbs(crumbs));
    }

    /// Pop one level. A no-op at the primary pipeline.
    pub fn set_previous_breadcrumb(&mut self) {
        let crumbs = self.store.breadcrumbs();
        if crumbs.len() > 1 {
            let crumbs = crumbs[..crumbs.len() - 1].to_vec();
            self.store.dispatch(Action::SetBreadcrumbs(crumbs));
        }
    }

    pub fn set_breadcrumbs(&mut self, breadcrumbs: Vec<Breadcrumb>) {
        self.store.dispatch(Action::SetBreadcrumbs(breadcrumbs));
    }

    // ─── Notification messages ───────────────────────────────────────────

    pub fn get_notification_messages(&self) -> &[Notification] {
        self.store.notifications()
    }

    pub fn add_notification_message(&mut self, message: Notification) {
        let mut messages = self.store.notifications().to_vec();
        messages.retain(|m| m.id != message.id);
        messages.push(message);
        self.store.dispatch(Action::SetNotificationMessages(messages));
    }

    pub fn delete_notification_message(&mut self, id: &str) {
        let messages = self
            .store
            .notifications()
            .iter()
            .filter(|m| m.id != id)
            .cloned()
            .collect();
        self.store.dispatch(Action::SetNotificationMessages(messages));
    }

    pub fn clear_notification_messages(&mut self) {
        self.store.dispatch(Action::SetNotificationMessages(Vec::new()));
    }

    // ─── Supernodes ──────────────────────────────────────────────────────

    /// Copies of the named pipelines with their indices in the document,
    /// for putting them back where they were.
    pub fn indexed_pipelines(&self, ids: &[ObjectId]) -> Vec<(usize, Pipeline)> {
        self.store
            .pipelines()
            .enumerate()
            .filter(|(_, p)| ids.contains(&p.id))
            .map(|(i, p)| (i, p.clone()))
            .collect()
    }

    /// Child pipelines that disappear along with `supernodes` (all in
    /// `pipeline_id`), descending recursively. A pipeline still referenced
    /// by a supernode outside the deleted set survives, and so does
    /// everything below it.
    pub fn get_desc_pipelines_to_delete(&self, supernodes: &[Node], pipeline_id: ObjectId) -> Vec<ObjectId> {
        let mut doomed: HashSet<(ObjectId, ObjectId)> =
            supernodes.iter().map(|n| (pipeline_id, n.id)).collect();
        let mut out = Vec::new();
        self.collect_desc_pipelines(supernodes, &mut doomed, &mut out);
        out
    }

    fn collect_desc_pipelines(
        &self,
        supernodes: &[Node],
        doomed: &mut HashSet<(ObjectId, ObjectId)>,
        out: &mut Vec<ObjectId>,
    ) {
        for supernode in supernodes {
            let Some(child_id) = supernode.subflow_pipeline_id() else {
                continue;
            };
            if out.contains(&child_id) {
                continue;
            }
            let shared = self
                .store
                .pipelines()
                .filter(|p| !out.contains(&p.id))
                .any(|p| {
                    p.supernodes().any(|n| {
                        n.subflow_pipeline_id() == Some(child_id) && !doomed.contains(&(p.id, n.id))
                    })
                });
            if shared {
                log::debug!("pipeline '{child_id}' is still referenced, keeping it");
                continue;
            }
            let Some(child) = self.store.pipeline(child_id) else {
                continue;
            };
            out.push(child_id);
            let inner: Vec<Node> = child.supernodes().cloned().collect();
            doomed.extend(inner.iter().map(|n| (child_id, n.id)));
            self.collect_desc_pipelines(&inner, doomed, out);
        }
    }

    /// Every pipeline below a supernode, parents before children.
    pub fn get_descendant_pipelines(&self, supernode: &Node) -> Vec<Pipeline> {
        let mut out: Vec<Pipeline> = Vec::new();
        let mut pending: Vec<ObjectId> = supernode.subflow_pipeline_id().into_iter().collect();
        while let Some(id) = pending.pop() {
            if out.iter().any(|p| p.id == id) {
                continue;
            }
            if let Some(p) = self.store.pipeline(id) {
                pending.extend(p.supernodes().filter_map(Node::subflow_pipeline_id));
                out.push(p.clone());
            }
        }
        out
    }

    /// The parent pipeline and supernode referencing `pipeline_id`.
    pub fn get_supernode_for_pipeline(&self, pipeline_id: ObjectId) -> Option<(ObjectId, &Node)> {
        self.store.pipelines().find_map(|p| {
            p.supernodes()
                .find(|n| n.subflow_pipeline_id() == Some(pipeline_id))
                .map(|n| (p.id, n))
        })
    }

    // ─── Copy / paste ────────────────────────────────────────────────────

    /// Copy the given nodes and comments with the links between them.
    /// Links with a loose end are copied when their attached end is.
    pub fn copy_objects(&self, pipeline_id: ObjectId, ids: &[ObjectId]) -> CopiedObjects {
        let Some(p) = self.store.pipeline(pipeline_id) else {
            return CopiedObjects::default();
        };
        let wanted: HashSet<ObjectId> = ids.iter().copied().collect();
        let nodes: Vec<Node> = p.nodes.iter().filter(|n| wanted.contains(&n.id)).cloned().collect();
        let comments: Vec<Comment> = p
            .comments
            .iter()
            .filter(|c| wanted.contains(&c.id))
            .cloned()
            .collect();
        let links = p
            .links
            .iter()
            .filter(|l| {
                let ends: Vec<ObjectId> = [l.src_obj_id(), l.trg_obj_id()].into_iter().flatten().collect();
                if ends.is_empty() {
                    wanted.contains(&l.id)
                } else {
                    ends.iter().all(|id| wanted.contains(id))
                }
            })
            .cloned()
            .collect();
        let pipelines = nodes
            .iter()
            .filter(|n| n.is_supernode())
            .flat_map(|n| self.get_descendant_pipelines(n))
            .collect();
        CopiedObjects {
            nodes,
            comments,
            links,
            pipelines,
        }
    }

    /// Deep-clone copied objects with fresh IDs. Links are remapped onto
    /// the new node and comment IDs; a link naming an object that was not
    /// copied is dropped. Supernodes get freshly cloned child pipelines
    /// (returned in `pipelines`), recursively.
    pub fn clone_objects_to_paste(&mut self, objects: &CopiedObjects) -> CopiedObjects {
        let mut pipelines = Vec::new();
        let (nodes, comments, links) = self.clone_content(
            &objects.nodes,
            &objects.comments,
            &objects.links,
            &objects.pipelines,
            &mut pipelines,
        );
        CopiedObjects {
            nodes,
            comments,
            links,
            pipelines,
        }
    }

    fn clone_content(
        &mut self,
        nodes: &[Node],
        comments: &[Comment],
        links: &[Link],
        source_pipelines: &[Pipeline],
        out_pipelines: &mut Vec<Pipeline>,
    ) -> (Vec<Node>, Vec<Comment>, Vec<Link>) {
        let mut id_map: HashMap<ObjectId, ObjectId> = HashMap::new();

        let mut new_nodes = Vec::with_capacity(nodes.len());
        for node in nodes {
            let mut clone = node.clone();
            clone.id = self.next_id(IdKind::Node);
            clone.style_temp = None;
            id_map.insert(node.id, clone.id);
            if let Some(child_id) = node.subflow_pipeline_id() {
                match self.clone_pipeline(child_id, source_pipelines, out_pipelines) {
                    Some((new_child, child_map)) => {
                        if let Some(subflow) = clone.subflow_ref.as_mut() {
                            subflow.pipeline_id_ref = new_child;
                        }
                        for port in clone.input_ports.iter_mut().chain(clone.output_ports.iter_mut()) {
                            if let Some(binding) = port.subflow_node_ref {
                                port.subflow_node_ref = child_map.get(&binding).copied();
                            }
                        }
                    }
                    None => log::warn!(
                        "supernode '{}' copied without its pipeline '{child_id}'",
                        node.id
                    ),
                }
            }
            new_nodes.push(clone);
        }

        let mut new_comments = Vec::with_capacity(comments.len());
        for comment in comments {
            let mut clone = comment.clone();
            clone.id = self.next_id(IdKind::Comment);
            clone.style_temp = None;
            id_map.insert(comment.id, clone.id);
            new_comments.push(clone);
        }

        let mut new_links = Vec::with_capacity(links.len());
        for link in links {
            let remap = |end: &LinkEnd| -> Option<LinkEnd> {
                match *end {
                    LinkEnd::Attached { obj_id, port_id } => {
                        id_map.get(&obj_id).map(|new| LinkEnd::attached(*new, port_id))
                    }
                    detached => Some(detached),
                }
            };
            let (Some(src), Some(trg)) = (remap(&link.src), remap(&link.trg)) else {
                continue;
            };
            let mut clone = link.clone();
            clone.id = self.next_id(IdKind::Link);
            clone.src = src;
            clone.trg = trg;
            clone.style_temp = None;
            new_links.push(clone);
        }

        (new_nodes, new_comments, new_links)
    }

    /// Clone one pipeline (and its sub-pipelines) with fresh IDs. Returns
    /// the new pipeline ID and the old→new node ID map.
    fn clone_pipeline(
        &mut self,
        pipeline_id: ObjectId,
        source_pipelines: &[Pipeline],
        out_pipelines: &mut Vec<Pipeline>,
    ) -> Option<(ObjectId, HashMap<ObjectId, ObjectId>)> {
        let source = source_pipelines.iter().find(|p| p.id == pipeline_id)?;
        let new_id = self.next_id(IdKind::Pipeline);
        let (nodes, comments, links) = self.clone_content(
            &source.nodes,
            &source.comments,
            &source.links,
            source_pipelines,
            out_pipelines,
        );
        let node_map = source
            .nodes
            .iter()
            .zip(&nodes)
            .map(|(old, new)| (old.id, new.id))
            .collect();
        out_pipelines.push(Pipeline {
            id: new_id,
            nodes,
            comments,
            links,
            ..source.clone()
        });
        Some((new_id, node_map))
    }
}

fn selection_differs(a: &SelectionInfo, b: &SelectionInfo) -> bool {
    if a.selected_object_ids.is_empty() && b.selected_object_ids.is_empty() {
        return false;
    }
    if a.pipeline_id != b.pipeline_id {
        return true;
    }
    let a: HashSet<&ObjectId> = a.selected_object_ids.iter().collect();
    let b: HashSet<&ObjectId> = b.selected_object_ids.iter().collect();
    a != b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::SequentialIdGenerator;
    use std::cell::RefCell;

    fn id(s: &str) -> ObjectId {
        ObjectId::intern(s)
    }

    fn data_link(name: &str, src: &str, trg: &str) -> Link {
        Link::new(
            name,
            LinkType::NodeLink,
            LinkEnd::attached(id(src), None),
            LinkEnd::attached(id(trg), None),
        )
    }

    /// node1 → node2 → node3, node2 → node4, plus two comments.
    fn model() -> ObjectModel {
        let mut om = ObjectModel::with_id_generator(
            CanvasConfig::default(),
            Box::new(SequentialIdGenerator::with_prefix("om.")),
        );
        let pid = om.primary_pipeline_id();
        let mut api = om.api_pipeline(pid);
        api.add_nodes(
            ["node1", "node2", "node3", "node4"]
                .iter()
                .map(|n| Node::new(*n, NodeType::ExecutionNode))
                .collect(),
        );
        api.add_comments(vec![
            Comment::new("comment1", "", Bounds::default()),
            Comment::new("comment2", "", Bounds::default()),
        ]);
        api.add_links(vec![
            data_link("l12", "node1", "node2"),
            data_link("l23", "node2", "node3"),
            data_link("l24", "node2", "node4"),
        ]);
        om
    }

    #[test]
    fn selection_change_reports_added_objects() {
        let mut om = model();
        let pid = om.primary_pipeline_id();
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&changes);
        om.set_selection_change_handler(Box::new(move |c: &SelectionChange| {
            sink.borrow_mut().push(c.clone())
        }));

        om.set_selections(vec![id("comment1"), id("node3")], pid);

        let changes = changes.borrow();
        assert_eq!(changes.len(), 1);
        let change = &changes[0];
        assert_eq!(change.added_nodes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![id("node3")]);
        assert_eq!(
            change.added_comments.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![id("comment1")]
        );
        assert!(change.deselected_nodes.is_empty());
        assert!(change.deselected_comments.is_empty());
    }

    #[test]
    fn unchanged_selection_does_not_notify() {
        let mut om = model();
        let pid = om.primary_pipeline_id();
        om.set_selections(vec![id("node1")], pid);
        let count = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&count);
        om.set_selection_change_handler(Box::new(move |_: &SelectionChange| {
            *sink.borrow_mut() += 1
        }));
        om.set_selections(vec![id("node1")], pid);
        om.toggle_selection(id("node1"), false, pid);
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn sub_graph_selection_follows_paths() {
        let mut om = model();
        let pid = om.primary_pipeline_id();
        om.set_selections(vec![id("node1")], pid);
        om.select_sub_graph(id("node4"), pid);
        let mut selected = om.get_selected_object_ids().to_vec();
        selected.sort();
        assert_eq!(selected, vec![id("node1"), id("node2"), id("node4")]);
    }

    #[test]
    fn contiguity() {
        let mut om = model();
        let pid = om.primary_pipeline_id();
        om.set_selections(vec![id("node1"), id("node2"), id("node4")], pid);
        assert!(om.are_selected_nodes_contiguous());
        om.set_selections(vec![id("node1"), id("node3")], pid);
        assert!(!om.are_selected_nodes_contiguous());
    }

    #[test]
    fn toggle_extends_and_removes() {
        let mut om = model();
        let pid = om.primary_pipeline_id();
        om.toggle_selection(id("node1"), false, pid);
        om.toggle_selection(id("node2"), true, pid);
        assert_eq!(om.get_selected_object_ids(), &[id("node1"), id("node2")]);
        om.toggle_selection(id("node1"), true, pid);
        assert_eq!(om.get_selected_object_ids(), &[id("node2")]);
    }

    #[test]
    fn breadcrumbs_never_pop_the_root() {
        let mut om = model();
        om.set_previous_breadcrumb();
        assert_eq!(om.get_breadcrumbs().len(), 1);
    }

    fn supernode(name: &str, child: &str) -> Node {
        let mut n = Node::new(name, NodeType::SuperNode);
        n.subflow_ref = Some(SubflowRef {
            pipeline_id_ref: id(child),
            url: None,
        });
        n
    }

    #[test]
    fn shared_child_pipelines_are_not_deleted() {
        let mut om = model();
        let pid = om.primary_pipeline_id();
        om.dispatch(Action::AddPipeline(Pipeline::new("child_a")));
        om.dispatch(Action::AddPipeline(Pipeline::new("child_b")));
        let mut api = om.api_pipeline(pid);
        api.add_nodes(vec![
            supernode("sn_a", "child_a"),
            supernode("sn_b", "child_b"),
            supernode("sn_b2", "child_b"),
        ]);
        let doomed: Vec<Node> = vec![
            om.store().get_node(pid, id("sn_a")).unwrap().clone(),
            om.store().get_node(pid, id("sn_b")).unwrap().clone(),
        ];
        assert_eq!(om.get_desc_pipelines_to_delete(&doomed, pid), vec![id("child_a")]);
    }

    #[test]
    fn paste_clone_remaps_links() {
        let mut om = model();
        let pid = om.primary_pipeline_id();
        let copied = om.copy_objects(pid, &[id("node1"), id("node2")]);
        assert_eq!(copied.links.len(), 1);
        let pasted = om.clone_objects_to_paste(&copied);
        assert_eq!(pasted.nodes.len(), 2);
        let link = &pasted.links[0];
        assert_eq!(link.src_obj_id(), Some(pasted.nodes[0].id));
        assert_eq!(link.trg_obj_id(), Some(pasted.nodes[1].id));
        assert_ne!(link.id, id("l12"));
    }

    #[test]
    fn paste_clone_copies_supernode_pipelines() {
        let mut om = model();
        let pid = om.primary_pipeline_id();
        let mut child = Pipeline::new("paste_child");
        child.nodes.push(Node::new("inner", NodeType::ExecutionNode));
        om.dispatch(Action::AddPipeline(child));
        om.api_pipeline(pid).add_node(supernode("sn_paste", "paste_child"));

        let copied = om.copy_objects(pid, &[id("sn_paste")]);
        assert_eq!(copied.pipelines.len(), 1);
        let pasted = om.clone_objects_to_paste(&copied);
        let new_child = pasted.nodes[0].subflow_pipeline_id().unwrap();
        assert_ne!(new_child, id("paste_child"));
        assert_eq!(pasted.pipelines[0].id, new_child);
        assert_ne!(pasted.pipelines[0].nodes[0].id, id("inner"));
    }
}
