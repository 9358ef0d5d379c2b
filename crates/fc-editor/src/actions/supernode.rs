use crate::commands::Command;
use fc_core::{
    Action, Bounds, Cardinality, Comment, IdKind, Link, LinkEnd, Node, NodeType, ObjectId, ObjectModel,
    Pipeline, Port, RemovedObjects, SubflowRef, SupernodeRestructure,
};
use std::collections::HashSet;

const SUPERNODE_LABEL: &str = "Supernode";

/// Boundary links that share one inner port, in first-seen order.
fn group_by_port(links: Vec<(ObjectId, ObjectId, Link)>) -> Vec<((ObjectId, ObjectId), Vec<Link>)> {
    let mut groups: Vec<((ObjectId, ObjectId), Vec<Link>)> = Vec::new();
    for (node, port, link) in links {
        match groups.iter_mut().find(|(key, _)| *key == (node, port)) {
            Some((_, group)) => group.push(link),
            None => groups.push(((node, port), vec![link])),
        }
    }
    groups
}

// ─── Create ──────────────────────────────────────────────────────────────

/// Move selected nodes and comments into a new child pipeline behind a
/// single supernode. Each inner port reached by links from outside the
/// selection becomes one supernode port named `<nodeId>_<portId>`, backed
/// by a binding node in the child pipeline.
#[derive(Debug, Clone)]
pub struct CreateSuperNode {
    pipeline_id: ObjectId,
    supernode: Node,
    child: Pipeline,
    /// Moved nodes and comments plus every parent link attached to them,
    /// as they were and where they were.
    removed: RemovedObjects,
    /// Boundary links re-pointed at the supernode's ports.
    new_links: Vec<Link>,
}

impl CreateSuperNode {
    pub fn new(om: &mut ObjectModel, pipeline_id: ObjectId, ids: &[ObjectId]) -> Option<Self> {
        let p = om.pipeline(pipeline_id)?.clone();
        let wanted: HashSet<ObjectId> = ids.iter().copied().collect();
        let moved_nodes: Vec<Node> = p.nodes.iter().filter(|n| wanted.contains(&n.id)).cloned().collect();
        if moved_nodes.is_empty() {
            return None;
        }
        let node_ids: HashSet<ObjectId> = moved_nodes.iter().map(|n| n.id).collect();

        // Unselected comments come along when every node they annotate does.
        let moved_comments: Vec<Comment> = p
            .comments
            .iter()
            .filter(|c| {
                if wanted.contains(&c.id) {
                    return true;
                }
                let targets: Vec<ObjectId> = p
                    .links
                    .iter()
                    .filter(|l| !l.is_data_link() && l.src_obj_id() == Some(c.id))
                    .filter_map(Link::trg_obj_id)
                    .collect();
                !targets.is_empty() && targets.iter().all(|t| node_ids.contains(t))
            })
            .cloned()
            .collect();

        let inside: HashSet<ObjectId> = node_ids
            .iter()
            .copied()
            .chain(moved_comments.iter().map(|c| c.id))
            .collect();
        let side = |end: &LinkEnd| end.obj_id().map(|id| inside.contains(&id));

        let old_links: Vec<Link> = p
            .links
            .iter()
            .filter(|l| side(&l.src) == Some(true) || side(&l.trg) == Some(true))
            .cloned()
            .collect();

        let mut child_links = Vec::new();
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for link in &old_links {
            match (link.is_data_link(), side(&link.src), side(&link.trg)) {
                (true, Some(true) | None, Some(true) | None) => child_links.push(link.clone()),
                (true, Some(false), Some(true)) => {
                    let trg = link.trg_obj_id().and_then(|id| p.node(id));
                    let port = link.trg_port_id().or(trg.and_then(|n| n.default_input_port()).map(|pt| pt.id));
                    if let (Some(node), Some(port)) = (trg, port) {
                        inputs.push((node.id, port, link.clone()));
                    }
                }
                (true, Some(true), Some(false)) => {
                    let src = link.src_obj_id().and_then(|id| p.node(id));
                    let port = link.src_port_id().or(src.and_then(|n| n.default_output_port()).map(|pt| pt.id));
                    if let (Some(node), Some(port)) = (src, port) {
                        outputs.push((node.id, port, link.clone()));
                    }
                }
                (false, Some(true), Some(true)) => child_links.push(link.clone()),
                _ => log::debug!("link '{}' crosses the supernode boundary and is dropped", link.id),
            }
        }

        let child_id = om.next_id(IdKind::Pipeline);
        let supernode_id = om.next_id(IdKind::Node);
        let layout = om.config().node_layout.clone();
        let gap = om.config().auto_node_gap;
        let content = Bounds::enclosing(
            moved_nodes
                .iter()
                .map(Node::bounds)
                .chain(moved_comments.iter().map(Comment::bounds)),
        )?;
        let binding_step = layout.binding_node_height * 1.5;

        let mut supernode = Node::new(supernode_id, NodeType::SuperNode);
        supernode.label = SUPERNODE_LABEL.to_string();
        supernode.x_pos = content.x;
        supernode.y_pos = content.y;
        supernode.subflow_ref = Some(SubflowRef {
            pipeline_id_ref: child_id,
            url: None,
        });

        let mut bindings = Vec::new();
        let mut new_links = Vec::new();

        for (i, ((inner_node, inner_port), group)) in group_by_port(inputs).into_iter().enumerate() {
            let port_id = ObjectId::intern(&format!("{inner_node}_{inner_port}"));
            let (label, cardinality) = port_info(&p, inner_node, inner_port, true);
            let binding_id = om.next_id(IdKind::Node);
            let mut binding = Node::new(binding_id, NodeType::Binding);
            binding.label = label.clone();
            binding.is_supernode_input_binding = true;
            binding
                .output_ports
                .push(Port::new(port_id, &label, Cardinality::UNBOUNDED));
            binding.x_pos = content.x - gap - layout.binding_node_width;
            binding.y_pos = content.y + i as f64 * binding_step;
            layout.size_node(&mut binding);
            bindings.push(binding);

            child_links.push(Link::new(
                om.next_id(IdKind::Link),
                fc_core::LinkType::NodeLink,
                LinkEnd::attached(binding_id, Some(port_id)),
                LinkEnd::attached(inner_node, Some(inner_port)),
            ));
            let mut port = Port::new(port_id, &label, cardinality);
            port.subflow_node_ref = Some(binding_id);
            supernode.input_ports.push(port);

            for link in group {
                new_links.push(Link {
                    id: om.next_id(IdKind::Link),
                    trg: LinkEnd::attached(supernode_id, Some(port_id)),
                    ..link
                });
            }
        }

        for (i, ((inner_node, inner_port), group)) in group_by_port(outputs).into_iter().enumerate() {
            let port_id = ObjectId::intern(&format!("{inner_node}_{inner_port}"));
            let (label, cardinality) = port_info(&p, inner_node, inner_port, false);
            let binding_id = om.next_id(IdKind::Node);
            let mut binding = Node::new(binding_id, NodeType::Binding);
            binding.label = label.clone();
            binding.is_supernode_output_binding = true;
            binding
                .input_ports
                .push(Port::new(port_id, &label, Cardinality::UNBOUNDED));
            binding.x_pos = content.right() + gap;
            binding.y_pos = content.y + i as f64 * binding_step;
            layout.size_node(&mut binding);
            bindings.push(binding);

            child_links.push(Link::new(
                om.next_id(IdKind::Link),
                fc_core::LinkType::NodeLink,
                LinkEnd::attached(inner_node, Some(inner_port)),
                LinkEnd::attached(binding_id, Some(port_id)),
            ));
            let mut port = Port::new(port_id, &label, cardinality);
            port.subflow_node_ref = Some(binding_id);
            supernode.output_ports.push(port);

            for link in group {
                new_links.push(Link {
                    id: om.next_id(IdKind::Link),
                    src: LinkEnd::attached(supernode_id, Some(port_id)),
                    ..link
                });
            }
        }
        layout.size_node(&mut supernode);

        let child = Pipeline {
            id: child_id,
            nodes: moved_nodes.iter().cloned().chain(bindings).collect(),
            comments: moved_comments.clone(),
            links: child_links,
            runtime_ref: p.runtime_ref.clone(),
            ..Default::default()
        };
        log::debug!(
            "supernode '{supernode_id}' wraps {} nodes with {} inputs and {} outputs",
            moved_nodes.len(),
            supernode.input_ports.len(),
            supernode.output_ports.len()
        );

        let removed_ids: HashSet<ObjectId> = inside
            .iter()
            .copied()
            .chain(old_links.iter().map(|l| l.id))
            .collect();
        Some(Self {
            pipeline_id,
            supernode,
            child,
            removed: p.removed_objects(&removed_ids),
            new_links,
        })
    }

    pub fn supernode(&self) -> &Node {
        &self.supernode
    }

    pub fn child_pipeline(&self) -> &Pipeline {
        &self.child
    }
}

/// Label and cardinality for a supernode port mirroring an inner port.
fn port_info(p: &Pipeline, node_id: ObjectId, port_id: ObjectId, input: bool) -> (String, Cardinality) {
    let node = p.node(node_id);
    let port = node.and_then(|n| if input { n.input_port(port_id) } else { n.output_port(port_id) });
    let label = port
        .map(|pt| pt.label.clone())
        .filter(|l| !l.is_empty())
        .or_else(|| node.map(|n| n.label.clone()))
        .unwrap_or_default();
    let cardinality = port.map_or(Cardinality::UNBOUNDED, |pt| pt.cardinality);
    (label, cardinality)
}

impl Command for CreateSuperNode {
    fn execute(&self, om: &mut ObjectModel) {
        let mut api = om.api_pipeline(self.pipeline_id);
        api.delete_objects(self.removed.node_ids().chain(self.removed.comment_ids()).collect());
        api.add_supernodes(vec![self.supernode.clone()], vec![self.child.clone()]);
        api.add_links(self.new_links.clone());
    }

    fn undo(&self, om: &mut ObjectModel) {
        let mut api = om.api_pipeline(self.pipeline_id);
        api.delete_supernodes(vec![self.supernode.id], vec![self.child.id]);
        api.restore_objects(self.removed.clone());
    }

    fn label(&self) -> &'static str {
        "Create supernode"
    }
}

// ─── Deconstruct ─────────────────────────────────────────────────────────

/// Flatten a supernode's child pipeline back into the parent. Links that
/// passed through a binding node are joined end to end again.
#[derive(Debug, Clone)]
pub struct DeconstructSuperNode {
    info: SupernodeRestructure,
}

impl DeconstructSuperNode {
    pub fn new(om: &mut ObjectModel, pipeline_id: ObjectId, supernode_id: ObjectId) -> Option<Self> {
        let p = om.pipeline(pipeline_id)?.clone();
        let supernode = p.node(supernode_id).filter(|n| n.is_supernode())?.clone();
        let child = om.pipeline(supernode.subflow_pipeline_id()?)?.clone();
        let supernode_index = p.nodes.iter().position(|n| n.id == supernode_id)?;
        let child_index = om.store().pipelines().position(|c| c.id == child.id)?;
        let indexed_links: Vec<(usize, Link)> = p
            .links
            .iter()
            .enumerate()
            .filter(|(_, l)| l.contains_id(supernode_id))
            .map(|(i, l)| (i, l.clone()))
            .collect();
        let supernode_links: Vec<Link> = indexed_links.iter().map(|(_, l)| l.clone()).collect();

        let binding_ids: HashSet<ObjectId> = child
            .nodes
            .iter()
            .filter(|n| n.is_supernode_input_binding || n.is_supernode_output_binding)
            .map(|n| n.id)
            .collect();
        let content = Bounds::enclosing(
            child
                .nodes
                .iter()
                .filter(|n| !binding_ids.contains(&n.id))
                .map(Node::bounds)
                .chain(child.comments.iter().map(Comment::bounds)),
        );
        let (dx, dy) = content.map_or((0.0, 0.0), |b| (supernode.x_pos - b.x, supernode.y_pos - b.y));
        let shift_end = |end: LinkEnd| match end {
            LinkEnd::Detached(pt) => LinkEnd::Detached(pt.offset(dx, dy)),
            attached => attached,
        };

        let nodes_to_add: Vec<Node> = child
            .nodes
            .iter()
            .filter(|n| !binding_ids.contains(&n.id))
            .map(|n| {
                let mut n = n.clone();
                n.x_pos += dx;
                n.y_pos += dy;
                n
            })
            .collect();
        let comments_to_add: Vec<Comment> = child
            .comments
            .iter()
            .map(|c| {
                let mut c = c.clone();
                c.x_pos += dx;
                c.y_pos += dy;
                c
            })
            .collect();

        let touches_binding =
            |l: &Link| [l.src_obj_id(), l.trg_obj_id()].into_iter().flatten().any(|id| binding_ids.contains(&id));
        let mut links_to_add: Vec<Link> = child
            .links
            .iter()
            .filter(|l| !touches_binding(l))
            .map(|l| Link {
                src: shift_end(l.src),
                trg: shift_end(l.trg),
                ..l.clone()
            })
            .collect();

        // Join each outer link on a port with each inner link on its binding.
        let mut joined: Vec<(LinkEnd, LinkEnd, Link)> = Vec::new();
        let default_in = supernode.default_input_port().map(|pt| pt.id);
        for port in &supernode.input_ports {
            let Some(binding) = port.subflow_node_ref else {
                continue;
            };
            let outer = supernode_links.iter().filter(|l| {
                l.is_data_link() && l.trg_obj_id() == Some(supernode_id) && l.trg_port_id().or(default_in) == Some(port.id)
            });
            for o in outer {
                for i in child.links.iter().filter(|l| l.is_data_link() && l.src_obj_id() == Some(binding)) {
                    joined.push((o.src, shift_end(i.trg), o.clone()));
                }
            }
        }
        let default_out = supernode.default_output_port().map(|pt| pt.id);
        for port in &supernode.output_ports {
            let Some(binding) = port.subflow_node_ref else {
                continue;
            };
            let outer = supernode_links.iter().filter(|l| {
                l.is_data_link()
                    && l.src_obj_id() == Some(supernode_id)
                    && l.src_port_id().or(default_out) == Some(port.id)
            });
            for o in outer {
                for i in child.links.iter().filter(|l| l.is_data_link() && l.trg_obj_id() == Some(binding)) {
                    joined.push((shift_end(i.src), o.trg, o.clone()));
                }
            }
        }
        for (src, trg, outer) in joined {
            let through_binding = [src.obj_id(), trg.obj_id()]
                .into_iter()
                .flatten()
                .any(|id| binding_ids.contains(&id));
            if through_binding {
                continue;
            }
            links_to_add.push(Link {
                id: om.next_id(IdKind::Link),
                src,
                trg,
                ..outer
            });
        }

        let (old_positions, new_positions) = if om.config().enable_move_nodes_on_supernode_resize {
            make_room(&p, &supernode, content)
        } else {
            (Vec::new(), Vec::new())
        };

        Some(Self {
            info: SupernodeRestructure {
                pipeline_id,
                supernode_index,
                supernode,
                supernode_links: indexed_links,
                child_index,
                child_pipeline: child,
                nodes_to_add,
                comments_to_add,
                links_to_add,
                old_positions,
                new_positions,
            },
        })
    }
}

/// Push objects right of / below the supernode out by however much the
/// unpacked content is wider / taller than the supernode itself.
fn make_room(p: &Pipeline, supernode: &Node, content: Option<Bounds>) -> (Vec<(ObjectId, Bounds)>, Vec<(ObjectId, Bounds)>) {
    let Some(content) = content else {
        return (Vec::new(), Vec::new());
    };
    let old = supernode.bounds();
    let dw = (content.width - old.width).max(0.0);
    let dh = (content.height - old.height).max(0.0);
    p.nodes
        .iter()
        .filter(|n| n.id != supernode.id)
        .map(|n| (n.id, n.bounds()))
        .chain(p.comments.iter().map(|c| (c.id, c.bounds())))
        .filter_map(|(id, b)| {
            let dx = if b.x >= old.right() { dw } else { 0.0 };
            let dy = if b.y >= old.bottom() { dh } else { 0.0 };
            (dx != 0.0 || dy != 0.0)
                .then(|| ((id, b), (id, Bounds::new(b.x + dx, b.y + dy, b.width, b.height))))
        })
        .unzip()
}

impl Command for DeconstructSuperNode {
    fn execute(&self, om: &mut ObjectModel) {
        om.dispatch(Action::DeconstructSupernode(Box::new(self.info.clone())));
    }

    fn undo(&self, om: &mut ObjectModel) {
        om.dispatch(Action::ReconstructSupernode(Box::new(self.info.clone())));
    }

    fn label(&self) -> &'static str {
        "Deconstruct supernode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fc_core::{CanvasConfig, LinkType, SequentialIdGenerator};

    fn id(s: &str) -> ObjectId {
        ObjectId::intern(s)
    }

    fn node(name: &str, x: f64) -> Node {
        let mut n = Node::new(name, NodeType::ExecutionNode);
        n.label = name.to_string();
        n.x_pos = x;
        n.width = 100.0;
        n.height = 40.0;
        n.input_ports.push(Port::new("in", "", Cardinality::SINGLE));
        n.output_ports.push(Port::new("out", "", Cardinality::UNBOUNDED));
        n
    }

    fn link(name: &str, src: &str, trg: &str) -> Link {
        Link::new(
            name,
            LinkType::NodeLink,
            LinkEnd::attached(id(src), Some(id("out"))),
            LinkEnd::attached(id(trg), Some(id("in"))),
        )
    }

    /// sn_a → sn_b → sn_c → sn_d, with a comment on sn_b only.
    fn model() -> (ObjectModel, ObjectId) {
        let mut om = ObjectModel::with_id_generator(
            CanvasConfig::default(),
            Box::new(SequentialIdGenerator::with_prefix("sn.")),
        );
        let pid = om.primary_pipeline_id();
        let mut api = om.api_pipeline(pid);
        api.add_nodes(vec![
            node("sn_a", 0.0),
            node("sn_b", 200.0),
            node("sn_c", 400.0),
            node("sn_d", 600.0),
        ]);
        api.add_comments(vec![Comment::new("sn_note", "", Bounds::new(200.0, -80.0, 100.0, 40.0))]);
        api.add_links(vec![
            link("sn_ab", "sn_a", "sn_b"),
            link("sn_bc", "sn_b", "sn_c"),
            link("sn_cd", "sn_c", "sn_d"),
            Link::new(
                "sn_note_b",
                LinkType::CommentLink,
                LinkEnd::attached(id("sn_note"), None),
                LinkEnd::attached(id("sn_b"), None),
            ),
        ]);
        (om, pid)
    }

    #[test]
    fn boundary_links_become_ports() {
        let (mut om, pid) = model();
        let cmd = CreateSuperNode::new(&mut om, pid, &[id("sn_b"), id("sn_c")]).unwrap();
        let sn = cmd.supernode();
        assert_eq!(sn.input_ports.len(), 1);
        assert_eq!(sn.output_ports.len(), 1);
        assert_eq!(sn.input_ports[0].id, id("sn_b_in"));
        assert_eq!(sn.output_ports[0].id, id("sn_c_out"));

        let child = cmd.child_pipeline();
        let inner: Vec<ObjectId> = child
            .nodes
            .iter()
            .filter(|n| n.node_type != NodeType::Binding)
            .map(|n| n.id)
            .collect();
        assert_eq!(inner, vec![id("sn_b"), id("sn_c")]);
        // The comment only annotates a moved node, so it moves too.
        assert_eq!(child.comments.len(), 1);

        cmd.execute(&mut om);
        let parent = om.pipeline(pid).unwrap();
        assert_eq!(parent.nodes.len(), 3);
        assert!(parent.comments.is_empty());
        assert_eq!(parent.links.len(), 2);
        assert!(parent.links.iter().all(|l| l.contains_id(sn.id)));
    }

    #[test]
    fn create_then_deconstruct_restores_structure() {
        let (mut om, pid) = model();
        let original = om.pipeline(pid).cloned();
        let create = CreateSuperNode::new(&mut om, pid, &[id("sn_b"), id("sn_c")]).unwrap();
        create.execute(&mut om);
        let sn_id = create.supernode().id;
        let with_supernode = om.store().canvas_info().clone();

        let deconstruct = DeconstructSuperNode::new(&mut om, pid, sn_id).unwrap();
        deconstruct.execute(&mut om);
        let parent = om.pipeline(pid).unwrap();
        let mut nodes: Vec<ObjectId> = parent.nodes.iter().map(|n| n.id).collect();
        nodes.sort();
        assert_eq!(nodes, vec![id("sn_a"), id("sn_b"), id("sn_c"), id("sn_d")]);
        let mut pairs: Vec<(ObjectId, ObjectId)> = parent
            .links
            .iter()
            .filter(|l| l.is_data_link())
            .filter_map(|l| Some((l.src_obj_id()?, l.trg_obj_id()?)))
            .collect();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![(id("sn_a"), id("sn_b")), (id("sn_b"), id("sn_c")), (id("sn_c"), id("sn_d"))]
        );
        assert!(om.pipeline(create.child_pipeline().id).is_none());

        deconstruct.undo(&mut om);
        assert_eq!(om.store().canvas_info(), &with_supernode);
        create.undo(&mut om);
        assert_eq!(om.pipeline(pid).cloned(), original);
    }
}
