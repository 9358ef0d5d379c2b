use crate::commands::Command;
use fc_core::{Bounds, IdKind, Link, LinkEnd, LinkType, Node, ObjectId, ObjectModel, Port, RemovedObjects};

// ─── Splicing ────────────────────────────────────────────────────────────

/// Insert a new node into the middle of a data link: the link is replaced
/// by source → node → target. The two new link IDs are chosen up front, so
/// redo puts back exactly the same links.
#[derive(Debug, Clone)]
pub struct CreateNodeOnLink {
    pipeline_id: ObjectId,
    /// The spliced link and its index in the pipeline's link list.
    original: (usize, Link),
    node: Node,
    new_links: [Link; 2],
}

impl CreateNodeOnLink {
    /// `None` unless the link is a data link and the template has both an
    /// input and an output port.
    pub fn new(
        om: &mut ObjectModel,
        pipeline_id: ObjectId,
        link_id: ObjectId,
        template: &Node,
        x: f64,
        y: f64,
    ) -> Option<Self> {
        let (index, original) = om
            .store()
            .get_links(pipeline_id)
            .iter()
            .enumerate()
            .find(|(_, l)| l.id == link_id && l.is_data_link())
            .map(|(i, l)| (i, l.clone()))?;
        if template.default_input_port().is_none() || template.default_output_port().is_none() {
            return None;
        }
        let node = om.api_pipeline(pipeline_id).create_node(template, x, y);
        let in_port = node.default_input_port().map(|p| p.id);
        let out_port = node.default_output_port().map(|p| p.id);
        let first = Link::new(
            om.next_id(IdKind::Link),
            LinkType::NodeLink,
            original.src,
            LinkEnd::attached(node.id, in_port),
        );
        let second = Link::new(
            om.next_id(IdKind::Link),
            LinkType::NodeLink,
            LinkEnd::attached(node.id, out_port),
            original.trg,
        );
        Some(Self {
            pipeline_id,
            original: (index, original),
            node,
            new_links: [first, second],
        })
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn new_links(&self) -> &[Link] {
        &self.new_links
    }
}

impl Command for CreateNodeOnLink {
    fn execute(&self, om: &mut ObjectModel) {
        let mut api = om.api_pipeline(self.pipeline_id);
        api.delete_link(self.original.1.id);
        api.add_node(self.node.clone());
        api.add_links(self.new_links.to_vec());
    }

    fn undo(&self, om: &mut ObjectModel) {
        let mut api = om.api_pipeline(self.pipeline_id);
        api.delete_objects(vec![self.node.id]);
        api.restore_objects(RemovedObjects {
            links: vec![self.original.clone()],
            ..Default::default()
        });
    }

    fn label(&self) -> &'static str {
        "Insert node on link"
    }
}

// ─── Attaching loose ends ────────────────────────────────────────────────

/// Loose data-link ends lying within `proximity` of `bounds` that can be
/// bound to a port of `node`. Returned as (before, after) pairs. Targets
/// take the first input port with room, sources the first output port.
fn attach_loose_ends(
    links: &[Link],
    node: &Node,
    bounds: Bounds,
    proximity: f64,
    allow_self_links: bool,
) -> Vec<(Link, Link)> {
    let zone = bounds.inflate(proximity);
    let mut out: Vec<(Link, Link)> = Vec::new();
    let mut pending: Vec<Link> = Vec::new();

    let used = |port: &Port, input: bool, pending: &[Link]| -> usize {
        let default = if input { node.default_input_port() } else { node.default_output_port() }.map(|p| p.id);
        links
            .iter()
            .filter(|l| !pending.iter().any(|p| p.id == l.id))
            .chain(pending.iter())
            .filter(|l| l.is_data_link())
            .filter(|l| {
                let end = if input { &l.trg } else { &l.src };
                end.obj_id() == Some(node.id) && end.port_id().or(default) == Some(port.id)
            })
            .count()
    };
    let duplicate = |src: &LinkEnd, trg: &LinkEnd, pending: &[Link]| {
        links.iter().chain(pending.iter()).any(|l| {
            l.is_data_link()
                && l.src_obj_id().is_some()
                && l.src_obj_id() == src.obj_id()
                && l.src_port_id() == src.port_id()
                && l.trg_obj_id() == trg.obj_id()
                && l.trg_port_id() == trg.port_id()
        })
    };

    for link in links.iter().filter(|l| l.is_data_link()) {
        let mut updated = link.clone();
        if let LinkEnd::Detached(pt) = updated.trg {
            let self_link = updated.src_obj_id() == Some(node.id);
            if zone.contains(pt) && (allow_self_links || !self_link) {
                let port = node
                    .input_ports
                    .iter()
                    .find(|p| !p.cardinality.is_full(used(p, true, &pending)));
                if let Some(port) = port {
                    let trg = LinkEnd::attached(node.id, Some(port.id));
                    if !duplicate(&updated.src, &trg, &pending) {
                        updated.trg = trg;
                    }
                }
            }
        }
        if let LinkEnd::Detached(pt) = updated.src {
            let self_link = updated.trg_obj_id() == Some(node.id);
            if zone.contains(pt) && (allow_self_links || !self_link) {
                let port = node
                    .output_ports
                    .iter()
                    .find(|p| !p.cardinality.is_full(used(p, false, &pending)));
                if let Some(port) = port {
                    let src = LinkEnd::attached(node.id, Some(port.id));
                    if !duplicate(&src, &updated.trg, &pending) {
                        updated.src = src;
                    }
                }
            }
        }
        if updated != *link {
            pending.push(updated.clone());
            out.push((link.clone(), updated));
        }
    }
    out
}

/// Move a node and bind any loose link ends it lands on.
#[derive(Debug, Clone)]
pub struct AttachNodeToLinks {
    pipeline_id: ObjectId,
    node_id: ObjectId,
    dx: f64,
    dy: f64,
    links: Vec<(Link, Link)>,
}

impl AttachNodeToLinks {
    pub fn new(om: &ObjectModel, pipeline_id: ObjectId, node_id: ObjectId, dx: f64, dy: f64) -> Option<Self> {
        let p = om.pipeline(pipeline_id)?;
        let node = p.node(node_id)?;
        let b = node.bounds();
        let moved = Bounds::new(b.x + dx, b.y + dy, b.width, b.height);
        let config = om.config();
        let links = attach_loose_ends(
            &p.links,
            node,
            moved,
            config.attach_proximity,
            config.enable_self_ref_links,
        );
        if links.is_empty() && dx == 0.0 && dy == 0.0 {
            return None;
        }
        Some(Self {
            pipeline_id,
            node_id,
            dx,
            dy,
            links,
        })
    }

    pub fn attached_links(&self) -> impl Iterator<Item = &Link> {
        self.links.iter().map(|(_, after)| after)
    }
}

impl Command for AttachNodeToLinks {
    fn execute(&self, om: &mut ObjectModel) {
        let mut api = om.api_pipeline(self.pipeline_id);
        api.move_objects(vec![self.node_id], self.dx, self.dy);
        api.update_links(self.links.iter().map(|(_, after)| after.clone()).collect());
    }

    fn undo(&self, om: &mut ObjectModel) {
        let mut api = om.api_pipeline(self.pipeline_id);
        api.update_links(self.links.iter().map(|(before, _)| before.clone()).collect());
        api.move_objects(vec![self.node_id], -self.dx, -self.dy);
    }

    fn label(&self) -> &'static str {
        "Attach node to links"
    }
}

/// Drop a new node from the palette and bind any loose link ends under it.
#[derive(Debug, Clone)]
pub struct CreateNodeAttachLinks {
    pipeline_id: ObjectId,
    node: Node,
    links: Vec<(Link, Link)>,
}

impl CreateNodeAttachLinks {
    pub fn new(om: &mut ObjectModel, pipeline_id: ObjectId, template: &Node, x: f64, y: f64) -> Self {
        let node = om.api_pipeline(pipeline_id).create_node(template, x, y);
        let config = om.config();
        let links = attach_loose_ends(
            om.store().get_links(pipeline_id),
            &node,
            node.bounds(),
            config.attach_proximity,
            config.enable_self_ref_links,
        );
        Self {
            pipeline_id,
            node,
            links,
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }
}

impl Command for CreateNodeAttachLinks {
    fn execute(&self, om: &mut ObjectModel) {
        let mut api = om.api_pipeline(self.pipeline_id);
        api.add_node(self.node.clone());
        api.update_links(self.links.iter().map(|(_, after)| after.clone()).collect());
    }

    fn undo(&self, om: &mut ObjectModel) {
        let mut api = om.api_pipeline(self.pipeline_id);
        api.update_links(self.links.iter().map(|(before, _)| before.clone()).collect());
        api.delete_objects(vec![self.node.id]);
    }

    fn label(&self) -> &'static str {
        "Create node"
    }
}
