use crate::commands::Command;
use fc_core::{
    Bounds, IdKind, Link, LinkEnd, LinkEndPositions, LinkType, Message, Node, ObjectId, ObjectModel,
};
use serde_json::Value;

/// Upper bound on nudges when looking for a free spot for a new node.
const MAX_NUDGES: usize = 100;

// ─── Creation ────────────────────────────────────────────────────────────

/// Add one node built from a palette template.
#[derive(Debug, Clone)]
pub struct CreateNode {
    pipeline_id: ObjectId,
    node: Node,
}

impl CreateNode {
    pub fn new(om: &mut ObjectModel, pipeline_id: ObjectId, template: &Node, x: f64, y: f64) -> Self {
        let node = om.api_pipeline(pipeline_id).create_node(template, x, y);
        Self { pipeline_id, node }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }
}

impl Command for CreateNode {
    fn execute(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id).add_node(self.node.clone());
    }

    fn undo(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .delete_objects(vec![self.node.id]);
    }

    fn label(&self) -> &'static str {
        "Create node"
    }
}

/// Add a node next to the last selected node (or at the top left when
/// nothing is selected) and link the two when the ports allow it.
#[derive(Debug, Clone)]
pub struct CreateAutoNode {
    pipeline_id: ObjectId,
    node: Node,
    link: Option<Link>,
}

impl CreateAutoNode {
    pub fn new(om: &mut ObjectModel, pipeline_id: ObjectId, template: &Node) -> Self {
        let source = if om.get_selection_pipeline_id() == Some(pipeline_id) {
            om.get_selected_nodes().last().map(|n| (*n).clone())
        } else {
            None
        };
        let gap = om.config().auto_node_gap;
        let (nudge_x, nudge_y) = (om.config().paste_offset_x, om.config().paste_offset_y);
        let (x, y) = match &source {
            Some(src) => (src.bounds().right() + gap, src.y_pos),
            None => (gap, gap),
        };

        let mut api = om.api_pipeline(pipeline_id);
        let mut node = api.create_node(template, x, y);
        for _ in 0..MAX_NUDGES {
            if !api.exactly_overlaps(std::slice::from_ref(&node), &[], &[]) {
                break;
            }
            node.x_pos += nudge_x;
            node.y_pos += nudge_y;
        }

        let linkable = source.as_ref().and_then(|src| {
            let src_port = src.default_output_port()?;
            let trg_port = node.default_input_port()?;
            let used = api.get_node_port_links(src.id, src_port.id, false).len();
            (!src_port.cardinality.is_full(used)).then(|| {
                (
                    LinkEnd::attached(src.id, Some(src_port.id)),
                    LinkEnd::attached(node.id, Some(trg_port.id)),
                )
            })
        });
        let link = linkable.map(|(src, trg)| {
            let id = om.next_id(IdKind::Link);
            Link::new(id, LinkType::NodeLink, src, trg)
        });

        Self {
            pipeline_id,
            node,
            link,
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn link(&self) -> Option<&Link> {
        self.link.as_ref()
    }
}

impl Command for CreateAutoNode {
    fn execute(&self, om: &mut ObjectModel) {
        let mut api = om.api_pipeline(self.pipeline_id);
        api.add_node(self.node.clone());
        if let Some(link) = &self.link {
            api.add_link(link.clone());
        }
    }

    fn undo(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .delete_objects(vec![self.node.id]);
    }

    fn label(&self) -> &'static str {
        "Create node"
    }
}

// ─── Node properties ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SetNodeLabel {
    pipeline_id: ObjectId,
    node_id: ObjectId,
    old_label: String,
    new_label: String,
}

impl SetNodeLabel {
    pub fn new(om: &ObjectModel, pipeline_id: ObjectId, node_id: ObjectId, label: &str) -> Option<Self> {
        let node = om.store().get_node(pipeline_id, node_id)?;
        Some(Self {
            pipeline_id,
            node_id,
            old_label: node.label.clone(),
            new_label: label.to_string(),
        })
    }
}

impl Command for SetNodeLabel {
    fn execute(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .set_node_label(self.node_id, &self.new_label);
    }

    fn undo(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .set_node_label(self.node_id, &self.old_label);
    }

    fn label(&self) -> &'static str {
        "Rename node"
    }
}

#[derive(Debug, Clone)]
pub struct SetNodeParameters {
    pipeline_id: ObjectId,
    node_id: ObjectId,
    old: (Value, Vec<Message>),
    new: (Value, Vec<Message>),
}

impl SetNodeParameters {
    pub fn new(
        om: &ObjectModel,
        pipeline_id: ObjectId,
        node_id: ObjectId,
        parameters: Value,
        messages: Vec<Message>,
    ) -> Option<Self> {
        let node = om.store().get_node(pipeline_id, node_id)?;
        Some(Self {
            pipeline_id,
            node_id,
            old: (node.parameters.clone(), node.messages.clone()),
            new: (parameters, messages),
        })
    }
}

impl Command for SetNodeParameters {
    fn execute(&self, om: &mut ObjectModel) {
        let (parameters, messages) = self.new.clone();
        om.api_pipeline(self.pipeline_id)
            .set_node_parameters(self.node_id, parameters, messages);
    }

    fn undo(&self, om: &mut ObjectModel) {
        let (parameters, messages) = self.old.clone();
        om.api_pipeline(self.pipeline_id)
            .set_node_parameters(self.node_id, parameters, messages);
    }

    fn label(&self) -> &'static str {
        "Edit node properties"
    }
}

// ─── Styles ──────────────────────────────────────────────────────────────

/// Set the permanent or temporary style of nodes and comments.
#[derive(Debug, Clone)]
pub struct SetObjectsStyle {
    pipeline_id: ObjectId,
    old_styles: Vec<(ObjectId, Option<Value>)>,
    new_styles: Vec<(ObjectId, Option<Value>)>,
    temporary: bool,
}

impl SetObjectsStyle {
    pub fn new(
        om: &ObjectModel,
        pipeline_id: ObjectId,
        ids: &[ObjectId],
        style: Option<Value>,
        temporary: bool,
    ) -> Option<Self> {
        let p = om.pipeline(pipeline_id)?;
        let old_styles: Vec<(ObjectId, Option<Value>)> = ids
            .iter()
            .filter_map(|id| {
                if let Some(n) = p.node(*id) {
                    Some((n.id, pick(&n.style, &n.style_temp, temporary)))
                } else {
                    p.comment(*id)
                        .map(|c| (c.id, pick(&c.style, &c.style_temp, temporary)))
                }
            })
            .collect();
        if old_styles.is_empty() {
            return None;
        }
        let new_styles = old_styles
            .iter()
            .map(|(id, _)| (*id, style.clone()))
            .collect();
        Some(Self {
            pipeline_id,
            old_styles,
            new_styles,
            temporary,
        })
    }
}

impl Command for SetObjectsStyle {
    fn execute(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .set_objects_style(self.new_styles.clone(), self.temporary);
    }

    fn undo(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .set_objects_style(self.old_styles.clone(), self.temporary);
    }

    fn label(&self) -> &'static str {
        "Set style"
    }
}

#[derive(Debug, Clone)]
pub struct SetLinksStyle {
    pipeline_id: ObjectId,
    old_styles: Vec<(ObjectId, Option<Value>)>,
    new_styles: Vec<(ObjectId, Option<Value>)>,
    temporary: bool,
}

impl SetLinksStyle {
    pub fn new(
        om: &ObjectModel,
        pipeline_id: ObjectId,
        ids: &[ObjectId],
        style: Option<Value>,
        temporary: bool,
    ) -> Option<Self> {
        let p = om.pipeline(pipeline_id)?;
        let old_styles: Vec<(ObjectId, Option<Value>)> = ids
            .iter()
            .filter_map(|id| p.link(*id))
            .map(|l| (l.id, pick(&l.style, &l.style_temp, temporary)))
            .collect();
        if old_styles.is_empty() {
            return None;
        }
        let new_styles = old_styles
            .iter()
            .map(|(id, _)| (*id, style.clone()))
            .collect();
        Some(Self {
            pipeline_id,
            old_styles,
            new_styles,
            temporary,
        })
    }
}

impl Command for SetLinksStyle {
    fn execute(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .set_links_style(self.new_styles.clone(), self.temporary);
    }

    fn undo(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .set_links_style(self.old_styles.clone(), self.temporary);
    }

    fn label(&self) -> &'static str {
        "Set link style"
    }
}

fn pick(style: &Option<Value>, style_temp: &Option<Value>, temporary: bool) -> Option<Value> {
    if temporary {
        style_temp.clone()
    } else {
        style.clone()
    }
}

// ─── Geometry ────────────────────────────────────────────────────────────

/// Translate nodes, comments and the loose ends of the named links.
#[derive(Debug, Clone)]
pub struct MoveObjects {
    pipeline_id: ObjectId,
    ids: Vec<ObjectId>,
    dx: f64,
    dy: f64,
}

impl MoveObjects {
    /// With snap-to-grid on, the offset is adjusted so the first moved
    /// node or comment lands on the grid. `None` for a zero move.
    pub fn new(om: &ObjectModel, pipeline_id: ObjectId, ids: Vec<ObjectId>, dx: f64, dy: f64) -> Option<Self> {
        let p = om.pipeline(pipeline_id)?;
        let (mut dx, mut dy) = (dx, dy);
        if om.config().enable_snap_to_grid {
            if let Some(anchor) = ids.iter().find_map(|id| p.object_bounds(*id)) {
                let (x, y) = om.config().snap(anchor.x + dx, anchor.y + dy);
                dx = x - anchor.x;
                dy = y - anchor.y;
            }
        }
        if dx == 0.0 && dy == 0.0 {
            return None;
        }
        Some(Self {
            pipeline_id,
            ids,
            dx,
            dy,
        })
    }
}

impl Command for MoveObjects {
    fn execute(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .move_objects(self.ids.clone(), self.dx, self.dy);
    }

    fn undo(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .move_objects(self.ids.clone(), -self.dx, -self.dy);
    }

    fn label(&self) -> &'static str {
        "Move objects"
    }
}

/// Set absolute bounds on objects and positions on loose link ends.
#[derive(Debug, Clone)]
pub struct SizeAndPositionObjects {
    pipeline_id: ObjectId,
    old_objects: Vec<(ObjectId, Bounds)>,
    new_objects: Vec<(ObjectId, Bounds)>,
    old_links: Vec<(ObjectId, LinkEndPositions)>,
    new_links: Vec<(ObjectId, LinkEndPositions)>,
}

impl SizeAndPositionObjects {
    pub fn new(
        om: &ObjectModel,
        pipeline_id: ObjectId,
        objects: Vec<(ObjectId, Bounds)>,
        links: Vec<(ObjectId, LinkEndPositions)>,
    ) -> Option<Self> {
        let p = om.pipeline(pipeline_id)?;
        let (old_objects, new_objects): (Vec<_>, Vec<_>) = objects
            .into_iter()
            .filter_map(|(id, b)| p.object_bounds(id).map(|old| ((id, old), (id, b))))
            .unzip();
        let (old_links, new_links): (Vec<_>, Vec<_>) = links
            .into_iter()
            .filter_map(|(id, pos)| {
                p.link(id).map(|l| {
                    let old = LinkEndPositions {
                        src_pos: l.src.pos(),
                        trg_pos: l.trg.pos(),
                    };
                    ((id, old), (id, pos))
                })
            })
            .unzip();
        if new_objects.is_empty() && new_links.is_empty() {
            return None;
        }
        Some(Self {
            pipeline_id,
            old_objects,
            new_objects,
            old_links,
            new_links,
        })
    }
}

impl Command for SizeAndPositionObjects {
    fn execute(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .size_and_position_objects(self.new_objects.clone(), self.new_links.clone());
    }

    fn undo(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .size_and_position_objects(self.old_objects.clone(), self.old_links.clone());
    }

    fn label(&self) -> &'static str {
        "Resize objects"
    }
}
