//! Per-pipeline API facade.
//!
//! [`ApiPipeline`] scopes node, comment and link operations to one pipeline.
//! `create_*` methods only build objects (fresh IDs, derived size, snapped
//! position) and never touch the store; every other mutator turns into one
//! store action. Link legality is decided here and nowhere else.

use crate::config::LayoutDirection;
use crate::id::{IdKind, ObjectId};
use crate::layout::{LayoutResult, auto_layout};
use crate::model::*;
use crate::object_model::ObjectModel;
use crate::store::{Action, ExpandDisplacement, LinkEndPositions};
use serde_json::Value;
use std::collections::HashSet;

pub struct ApiPipeline<'a> {
    om: &'a mut ObjectModel,
    id: ObjectId,
}

impl<'a> ApiPipeline<'a> {
    pub(crate) fn new(om: &'a mut ObjectModel, id: ObjectId) -> Self {
        Self { om, id }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    fn dispatch(&mut self, action: Action) {
        self.om.store_mut().dispatch(action);
    }

    // ─── Reads ───────────────────────────────────────────────────────────

    pub fn pipeline(&self) -> Option<&Pipeline> {
        self.om.store().pipeline(self.id)
    }

    pub fn get_node(&self, id: ObjectId) -> Option<&Node> {
        self.om.store().get_node(self.id, id)
    }

    pub fn get_comment(&self, id: ObjectId) -> Option<&Comment> {
        self.om.store().get_comment(self.id, id)
    }

    pub fn get_link(&self, id: ObjectId) -> Option<&Link> {
        self.om.store().get_link(self.id, id)
    }

    pub fn get_nodes(&self) -> &[Node] {
        self.om.store().get_nodes(self.id)
    }

    pub fn get_comments(&self) -> &[Comment] {
        self.om.store().get_comments(self.id)
    }

    pub fn get_links(&self) -> &[Link] {
        self.om.store().get_links(self.id)
    }

    pub fn get_supernodes(&self) -> Vec<&Node> {
        self.get_nodes().iter().filter(|n| n.is_supernode()).collect()
    }

    /// Bounding box of every node and comment, `None` for an empty pipeline.
    pub fn get_bounds(&self) -> Option<Bounds> {
        Bounds::enclosing(
            self.get_nodes()
                .iter()
                .map(Node::bounds)
                .chain(self.get_comments().iter().map(Comment::bounds)),
        )
    }

    /// Copies of every link attached to `id`.
    pub fn get_links_containing_id(&self, id: ObjectId) -> Vec<Link> {
        self.get_links()
            .iter()
            .filter(|l| l.contains_id(id))
            .cloned()
            .collect()
    }

    /// Copies of every link attached to any of `ids`, each reported once.
    pub fn get_links_containing_ids(&self, ids: &[ObjectId]) -> Vec<Link> {
        let ids: HashSet<ObjectId> = ids.iter().copied().collect();
        self.get_links()
            .iter()
            .filter(|l| [l.src_obj_id(), l.trg_obj_id()].into_iter().flatten().any(|id| ids.contains(&id)))
            .cloned()
            .collect()
    }

    pub fn get_node_data_links_containing_ids(&self, ids: &[ObjectId]) -> Vec<Link> {
        self.get_links_containing_ids(ids)
            .into_iter()
            .filter(Link::is_data_link)
            .collect()
    }

    /// Data links attached to one port of a node. A link naming no port
    /// counts against the node's default port on that side.
    pub fn get_node_port_links(&self, node_id: ObjectId, port_id: ObjectId, input: bool) -> Vec<&Link> {
        let Some(node) = self.get_node(node_id) else {
            return Vec::new();
        };
        let default_port = if input {
            node.default_input_port()
        } else {
            node.default_output_port()
        }
        .map(|p| p.id);
        self.get_links()
            .iter()
            .filter(|l| l.is_data_link())
            .filter(|l| {
                let end = if input { &l.trg } else { &l.src };
                end.obj_id() == Some(node_id) && end.port_id().or(default_port) == Some(port_id)
            })
            .collect()
    }

    /// True when any candidate sits at exactly the position of an existing
    /// object of the same kind (node, comment, or loose link end).
    pub fn exactly_overlaps(&self, nodes: &[Node], comments: &[Comment], links: &[Link]) -> bool {
        let same = |a: Point, b: Point| a.x == b.x && a.y == b.y;
        let node_hit = nodes.iter().any(|n| {
            self.get_nodes()
                .iter()
                .any(|e| same(e.position(), n.position()))
        });
        let comment_hit = comments.iter().any(|c| {
            self.get_comments()
                .iter()
                .any(|e| e.x_pos == c.x_pos && e.y_pos == c.y_pos)
        });
        let link_hit = links.iter().any(|l| {
            self.get_links().iter().any(|e| {
                matches!((l.src.pos(), e.src.pos()), (Some(a), Some(b)) if same(a, b))
                    || matches!((l.trg.pos(), e.trg.pos()), (Some(a), Some(b)) if same(a, b))
            })
        });
        node_hit || comment_hit || link_hit
    }

    // ─── Object creation ─────────────────────────────────────────────────

    /// Build a node from a palette template at `(x, y)`. The node gets a
    /// fresh ID and its derived size; the store is not touched.
    pub fn create_node(&mut self, template: &Node, x: f64, y: f64) -> Node {
        let mut node = template.clone();
        node.id = self.om.next_id(IdKind::Node);
        let (x, y) = self.om.config().snap(x, y);
        node.x_pos = x;
        node.y_pos = y;
        node.style_temp = None;
        self.om.config().node_layout.size_node(&mut node);
        node
    }

    pub fn create_comment(&mut self, x: f64, y: f64, content: &str) -> Comment {
        let id = self.om.next_id(IdKind::Comment);
        let (x, y) = self.om.config().snap(x, y);
        let layout = &self.om.config().node_layout;
        Comment::new(
            id,
            content,
            Bounds::new(x, y, layout.comment_width, layout.comment_height),
        )
    }

    /// Build a data link, or `None` when the connection is not legal.
    /// An attached end naming no port is bound to the node's default port.
    pub fn create_node_link(&mut self, src: LinkEnd, trg: LinkEnd) -> Option<Link> {
        let (src, trg) = self.resolve_link_ends(src, trg)?;
        if !self.is_link_legal(&src, &trg, &[], None) {
            return None;
        }
        let id = self.om.next_id(IdKind::Link);
        Some(Link::new(id, LinkType::NodeLink, src, trg))
    }

    /// Links from every source to every target. Illegal pairs are left out;
    /// links earlier in the batch count toward port limits and duplicates.
    pub fn create_node_links(&mut self, srcs: &[LinkEnd], trgs: &[LinkEnd]) -> Vec<Link> {
        let mut created: Vec<Link> = Vec::new();
        for src in srcs {
            for trg in trgs {
                let Some((s, t)) = self.resolve_link_ends(*src, *trg) else {
                    continue;
                };
                if self.is_link_legal(&s, &t, &created, None) {
                    let id = self.om.next_id(IdKind::Link);
                    created.push(Link::new(id, LinkType::NodeLink, s, t));
                }
            }
        }
        created
    }

    /// Comment links from each comment to each node, skipping any that
    /// already exist or name a missing object.
    pub fn create_comment_links(&mut self, comment_ids: &[ObjectId], node_ids: &[ObjectId]) -> Vec<Link> {
        let mut created: Vec<Link> = Vec::new();
        for &comment_id in comment_ids {
            for &node_id in node_ids {
                let exists = self.get_comment(comment_id).is_some()
                    && self.get_node(node_id).is_some();
                let duplicate = self
                    .get_links()
                    .iter()
                    .chain(created.iter())
                    .any(|l| {
                        l.link_type == LinkType::CommentLink
                            && l.src_obj_id() == Some(comment_id)
                            && l.trg_obj_id() == Some(node_id)
                    });
                if exists && !duplicate {
                    let id = self.om.next_id(IdKind::Link);
                    created.push(Link::new(
                        id,
                        LinkType::CommentLink,
                        LinkEnd::attached(comment_id, None),
                        LinkEnd::attached(node_id, None),
                    ));
                }
            }
        }
        created
    }

    pub fn create_association_link(&mut self, src_id: ObjectId, trg_id: ObjectId) -> Option<Link> {
        if src_id == trg_id || self.get_node(src_id).is_none() || self.get_node(trg_id).is_none() {
            return None;
        }
        let duplicate = self.get_links().iter().any(|l| {
            l.link_type == LinkType::AssociationLink
                && ((l.src_obj_id() == Some(src_id) && l.trg_obj_id() == Some(trg_id))
                    || (l.src_obj_id() == Some(trg_id) && l.trg_obj_id() == Some(src_id)))
        });
        if duplicate {
            return None;
        }
        let id = self.om.next_id(IdKind::Link);
        Some(Link::new(
            id,
            LinkType::AssociationLink,
            LinkEnd::attached(src_id, None),
            LinkEnd::attached(trg_id, None),
        ))
    }

    /// Would a data link between these two attached ports be accepted?
    pub fn is_data_link_legal(
        &self,
        src_node: ObjectId,
        src_port: Option<ObjectId>,
        trg_node: ObjectId,
        trg_port: Option<ObjectId>,
    ) -> bool {
        self.resolve_link_ends(
            LinkEnd::attached(src_node, src_port),
            LinkEnd::attached(trg_node, trg_port),
        )
        .is_some_and(|(s, t)| self.is_link_legal(&s, &t, &[], None))
    }

    /// Ends for re-pointing link `link_id`, bound to ports, or `None` when
    /// the result would not be legal. The link itself does not count
    /// against port limits or as a duplicate.
    pub fn check_link_update(&self, link_id: ObjectId, src: LinkEnd, trg: LinkEnd) -> Option<(LinkEnd, LinkEnd)> {
        let (src, trg) = self.resolve_link_ends(src, trg)?;
        self.is_link_legal(&src, &trg, &[], Some(link_id))
            .then_some((src, trg))
    }

    /// Bind attached ends to concrete ports. `None` when a node or port
    /// does not exist.
    fn resolve_link_ends(&self, src: LinkEnd, trg: LinkEnd) -> Option<(LinkEnd, LinkEnd)> {
        let src = match src {
            LinkEnd::Attached { obj_id, port_id } => {
                let node = self.get_node(obj_id)?;
                let port = match port_id {
                    Some(p) => node.output_port(p)?,
                    None => node.default_output_port()?,
                };
                LinkEnd::attached(obj_id, Some(port.id))
            }
            detached => detached,
        };
        let trg = match trg {
            LinkEnd::Attached { obj_id, port_id } => {
                let node = self.get_node(obj_id)?;
                let port = match port_id {
                    Some(p) => node.input_port(p)?,
                    None => node.default_input_port()?,
                };
                LinkEnd::attached(obj_id, Some(port.id))
            }
            detached => detached,
        };
        Some((src, trg))
    }

    fn is_link_legal(&self, src: &LinkEnd, trg: &LinkEnd, pending: &[Link], exclude: Option<ObjectId>) -> bool {
        match (src, trg) {
            (LinkEnd::Detached(_), LinkEnd::Detached(_)) => true,
            (LinkEnd::Attached { obj_id, port_id }, LinkEnd::Detached(_)) => {
                !self.is_port_full(*obj_id, *port_id, false, pending, exclude)
            }
            (LinkEnd::Detached(_), LinkEnd::Attached { obj_id, port_id }) => {
                !self.is_port_full(*obj_id, *port_id, true, pending, exclude)
            }
            (
                LinkEnd::Attached {
                    obj_id: src_node,
                    port_id: src_port,
                },
                LinkEnd::Attached {
                    obj_id: trg_node,
                    port_id: trg_port,
                },
            ) => {
                if src_node == trg_node && !self.om.config().enable_self_ref_links {
                    return false;
                }
                let duplicate = self.get_links().iter().chain(pending).any(|l| {
                    Some(l.id) != exclude
                        && l.is_data_link()
                        && l.src_obj_id() == Some(*src_node)
                        && l.trg_obj_id() == Some(*trg_node)
                        && l.src_port_id() == *src_port
                        && l.trg_port_id() == *trg_port
                });
                !duplicate
                    && !self.is_port_full(*src_node, *src_port, false, pending, exclude)
                    && !self.is_port_full(*trg_node, *trg_port, true, pending, exclude)
            }
        }
    }

    fn is_port_full(
        &self,
        node_id: ObjectId,
        port_id: Option<ObjectId>,
        input: bool,
        pending: &[Link],
        exclude: Option<ObjectId>,
    ) -> bool {
        let Some(node) = self.get_node(node_id) else {
            return true;
        };
        let port = match (input, port_id) {
            (true, Some(p)) => node.input_port(p),
            (true, None) => node.default_input_port(),
            (false, Some(p)) => node.output_port(p),
            (false, None) => node.default_output_port(),
        };
        let Some(port) = port else {
            return true;
        };
        let pending_count = pending
            .iter()
            .filter(|l| {
                let end = if input { &l.trg } else { &l.src };
                end.obj_id() == Some(node_id) && end.port_id() == Some(port.id)
            })
            .count();
        let existing = self
            .get_node_port_links(node_id, port.id, input)
            .iter()
            .filter(|l| Some(l.id) != exclude)
            .count();
        let count = existing + pending_count;
        port.cardinality.is_full(count)
    }

    // ─── Mutation ────────────────────────────────────────────────────────

    pub fn add_node(&mut self, node: Node) {
        let pipeline_id = self.id;
        self.dispatch(Action::AddNode { pipeline_id, node });
    }

    pub fn add_nodes(&mut self, nodes: Vec<Node>) {
        let pipeline_id = self.id;
        self.dispatch(Action::AddNodes { pipeline_id, nodes });
    }

    pub fn replace_node(&mut self, node: Node) {
        let pipeline_id = self.id;
        self.dispatch(Action::ReplaceNode { pipeline_id, node });
    }

    pub fn replace_nodes(&mut self, nodes: Vec<Node>) {
        let pipeline_id = self.id;
        self.dispatch(Action::ReplaceNodes { pipeline_id, nodes });
    }

    pub fn delete_node(&mut self, id: ObjectId, remove_pipelines: bool) {
        self.delete_nodes(&[id], remove_pipelines);
    }

    /// Delete nodes with their links. Supernodes also take their
    /// descendant pipelines with them unless `remove_pipelines` is false
    /// or a pipeline is still referenced from elsewhere.
    pub fn delete_nodes(&mut self, ids: &[ObjectId], remove_pipelines: bool) {
        let supernodes: Vec<Node> = ids
            .iter()
            .filter_map(|id| self.get_node(*id))
            .filter(|n| n.is_supernode())
            .cloned()
            .collect();
        let pipeline_id = self.id;
        if remove_pipelines && !supernodes.is_empty() {
            let pipeline_ids = self.om.get_desc_pipelines_to_delete(&supernodes, pipeline_id);
            self.dispatch(Action::DeleteSupernodes {
                pipeline_id,
                supernode_ids: supernodes.iter().map(|n| n.id).collect(),
                pipeline_ids,
            });
        }
        self.dispatch(Action::DeleteObjects {
            pipeline_id,
            ids: ids.to_vec(),
        });
    }

    /// Delete nodes, comments and links by ID. Supernode pipelines are kept.
    pub fn delete_objects(&mut self, ids: Vec<ObjectId>) {
        let pipeline_id = self.id;
        self.dispatch(Action::DeleteObjects { pipeline_id, ids });
    }

    /// Copies of the named nodes, comments and links with their indices,
    /// for putting them back later with [`Self::restore_objects`].
    pub fn removed_objects(&self, ids: &HashSet<ObjectId>) -> RemovedObjects {
        self.pipeline()
            .map(|p| p.removed_objects(ids))
            .unwrap_or_default()
    }

    pub fn restore_objects(&mut self, objects: RemovedObjects) {
        if objects.is_empty() {
            return;
        }
        let pipeline_id = self.id;
        self.dispatch(Action::RestoreObjects { pipeline_id, objects });
    }

    /// Put back deleted pipelines at the indices they held in the document.
    pub fn restore_pipelines(&mut self, pipelines: Vec<(usize, Pipeline)>) {
        if !pipelines.is_empty() {
            self.dispatch(Action::RestorePipelines(pipelines));
        }
    }

    pub fn add_comment(&mut self, comment: Comment) {
        let pipeline_id = self.id;
        self.dispatch(Action::AddComment { pipeline_id, comment });
    }

    pub fn add_comments(&mut self, comments: Vec<Comment>) {
        let pipeline_id = self.id;
        self.dispatch(Action::AddComments { pipeline_id, comments });
    }

    pub fn edit_comment(&mut self, comment: Comment) {
        let pipeline_id = self.id;
        self.dispatch(Action::EditComment { pipeline_id, comment });
    }

    pub fn add_link(&mut self, link: Link) {
        let pipeline_id = self.id;
        self.dispatch(Action::AddLink { pipeline_id, link });
    }

    pub fn add_links(&mut self, links: Vec<Link>) {
        if links.is_empty() {
            return;
        }
        let pipeline_id = self.id;
        self.dispatch(Action::AddLinks { pipeline_id, links });
    }

    pub fn delete_link(&mut self, id: ObjectId) {
        let pipeline_id = self.id;
        self.dispatch(Action::DeleteLink { pipeline_id, id });
    }

    pub fn delete_links(&mut self, ids: Vec<ObjectId>) {
        if ids.is_empty() {
            return;
        }
        let pipeline_id = self.id;
        self.dispatch(Action::DeleteLinks { pipeline_id, ids });
    }

    pub fn update_links(&mut self, links: Vec<Link>) {
        let pipeline_id = self.id;
        self.dispatch(Action::UpdateLinks { pipeline_id, links });
    }

    pub fn set_links(&mut self, links: Vec<Link>) {
        let pipeline_id = self.id;
        self.dispatch(Action::SetLinks { pipeline_id, links });
    }

    pub fn move_objects(&mut self, ids: Vec<ObjectId>, dx: f64, dy: f64) {
        let pipeline_id = self.id;
        self.dispatch(Action::MoveObjects {
            pipeline_id,
            ids,
            dx,
            dy,
        });
    }

    pub fn size_and_position_objects(
        &mut self,
        objects: Vec<(ObjectId, Bounds)>,
        links: Vec<(ObjectId, LinkEndPositions)>,
    ) {
        let pipeline_id = self.id;
        self.dispatch(Action::SizeAndPositionObjects {
            pipeline_id,
            objects,
            links,
        });
    }

    pub fn set_node_label(&mut self, node_id: ObjectId, label: &str) {
        let pipeline_id = self.id;
        self.dispatch(Action::SetNodeLabel {
            pipeline_id,
            node_id,
            label: label.to_string(),
        });
    }

    pub fn set_node_parameters(&mut self, node_id: ObjectId, parameters: Value, messages: Vec<Message>) {
        let pipeline_id = self.id;
        self.dispatch(Action::SetNodeParameters {
            pipeline_id,
            node_id,
            parameters,
            messages,
        });
    }

    pub fn set_objects_style(&mut self, styles: Vec<(ObjectId, Option<Value>)>, temporary: bool) {
        let pipeline_id = self.id;
        self.dispatch(Action::SetObjectsStyle {
            pipeline_id,
            styles,
            temporary,
        });
    }

    pub fn set_links_style(&mut self, styles: Vec<(ObjectId, Option<Value>)>, temporary: bool) {
        let pipeline_id = self.id;
        self.dispatch(Action::SetLinksStyle {
            pipeline_id,
            styles,
            temporary,
        });
    }

    pub fn add_supernodes(&mut self, supernodes: Vec<Node>, pipelines: Vec<Pipeline>) {
        let pipeline_id = self.id;
        self.dispatch(Action::AddSupernodes {
            pipeline_id,
            supernodes,
            pipelines,
        });
    }

    pub fn delete_supernodes(&mut self, supernode_ids: Vec<ObjectId>, pipeline_ids: Vec<ObjectId>) {
        let pipeline_id = self.id;
        self.dispatch(Action::DeleteSupernodes {
            pipeline_id,
            supernode_ids,
            pipeline_ids,
        });
    }

    // ─── Layout ──────────────────────────────────────────────────────────

    /// Positions the layout engine would assign. Does not mutate.
    pub fn compute_auto_layout(&self, direction: LayoutDirection) -> LayoutResult {
        match self.pipeline() {
            Some(p) => auto_layout(p, &self.om.config().auto_layout, direction),
            None => LayoutResult::default(),
        }
    }

    pub fn auto_layout(&mut self, direction: LayoutDirection) {
        let result = self.compute_auto_layout(direction);
        self.size_and_position_objects(result.nodes, result.links);
    }

    /// Expand a supernode in place and move surrounding objects to the
    /// positions the caller computed. `pushed` is kept with the supernode
    /// so that collapsing can undo exactly those moves.
    pub fn expand_super_node_in_place(
        &mut self,
        node_id: ObjectId,
        object_positions: Vec<(ObjectId, Bounds)>,
        link_positions: Vec<(ObjectId, LinkEndPositions)>,
        pushed: ExpandDisplacement,
    ) {
        self.set_expand_state(node_id, Some(pushed), object_positions, link_positions);
    }

    pub fn collapse_super_node_in_place(
        &mut self,
        node_id: ObjectId,
        object_positions: Vec<(ObjectId, Bounds)>,
        link_positions: Vec<(ObjectId, LinkEndPositions)>,
    ) {
        self.set_expand_state(node_id, None, object_positions, link_positions);
    }

    /// What expanding `node_id` pushed aside, while it is expanded.
    pub fn get_expand_displacement(&self, node_id: ObjectId) -> Option<&ExpandDisplacement> {
        self.om.store().expand_displacement(self.id, node_id)
    }

    fn set_expand_state(
        &mut self,
        node_id: ObjectId,
        pushed: Option<ExpandDisplacement>,
        object_positions: Vec<(ObjectId, Bounds)>,
        link_positions: Vec<(ObjectId, LinkEndPositions)>,
    ) {
        let pipeline_id = self.id;
        self.dispatch(Action::SetSupernodeExpandState {
            pipeline_id,
            node_id,
            expanded: pushed.is_some(),
            pushed,
        });
        if !object_positions.is_empty() || !link_positions.is_empty() {
            self.size_and_position_objects(object_positions, link_positions);
        }
    }
}
