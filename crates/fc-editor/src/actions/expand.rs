use crate::commands::Command;
use fc_core::{Bounds, ExpandDisplacement, LinkEndPositions, ObjectId, ObjectModel, Pipeline, Point};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Push {
    East,
    South,
    SouthEast,
}

/// Objects overlapped by a supernode growing from `old` to `new` decide
/// one push direction for the whole canvas: east if every one of them
/// lies right of the old bounds, south if every one lies below, and
/// south-east otherwise. Everything beyond the old edge in a pushed
/// direction then moves by the growth on that axis.
fn push_aside(p: &Pipeline, node_id: ObjectId, old: Bounds, new: Bounds) -> ExpandDisplacement {
    let others: Vec<(ObjectId, Bounds)> = p
        .nodes
        .iter()
        .filter(|n| n.id != node_id)
        .map(|n| (n.id, n.bounds()))
        .chain(p.comments.iter().map(|c| (c.id, c.bounds())))
        .collect();

    let mut push: Option<Push> = None;
    for (_, b) in others.iter().filter(|(_, b)| b.intersects(&new)) {
        let east = b.x >= old.right();
        let south = b.y >= old.bottom();
        let dir = match (east, south) {
            (true, false) => Push::East,
            (false, true) => Push::South,
            _ => Push::SouthEast,
        };
        push = match push {
            None => Some(dir),
            Some(prev) if prev == dir => Some(dir),
            Some(_) => Some(Push::SouthEast),
        };
    }
    let Some(push) = push else {
        return ExpandDisplacement::default();
    };
    let dw = if push == Push::South { 0.0 } else { (new.width - old.width).max(0.0) };
    let dh = if push == Push::East { 0.0 } else { (new.height - old.height).max(0.0) };
    log::debug!("supernode '{node_id}' grows {push:?}, pushing by ({dw}, {dh})");

    let delta = |pt: Point| -> (f64, f64) {
        (
            if pt.x >= old.right() { dw } else { 0.0 },
            if pt.y >= old.bottom() { dh } else { 0.0 },
        )
    };
    let mut out = ExpandDisplacement::default();
    for (id, b) in &others {
        let (dx, dy) = delta(Point::new(b.x, b.y));
        if dx != 0.0 || dy != 0.0 {
            out.old_objects.push((*id, *b));
            out.new_objects
                .push((*id, Bounds::new(b.x + dx, b.y + dy, b.width, b.height)));
        }
    }
    for link in &p.links {
        let moved = |pos: Option<Point>| {
            pos.and_then(|pt| {
                let (dx, dy) = delta(pt);
                (dx != 0.0 || dy != 0.0).then(|| pt.offset(dx, dy))
            })
        };
        let ends = LinkEndPositions {
            src_pos: moved(link.src.pos()),
            trg_pos: moved(link.trg.pos()),
        };
        if ends.src_pos.is_some() || ends.trg_pos.is_some() {
            out.old_links.push((
                link.id,
                LinkEndPositions {
                    src_pos: ends.src_pos.and(link.src.pos()),
                    trg_pos: ends.trg_pos.and(link.trg.pos()),
                },
            ));
            out.new_links.push((link.id, ends));
        }
    }
    out
}

/// Reverse what an expansion pushed. Every recorded object and loose link
/// end still present moves back by the distance it was pushed; nothing
/// else moves. Untouched since the expansion, that is exactly the place
/// it had before.
fn pull_back(p: &Pipeline, pushed: &ExpandDisplacement) -> ExpandDisplacement {
    let mut out = ExpandDisplacement::default();

    let pushed_to: HashMap<ObjectId, Bounds> = pushed.new_objects.iter().copied().collect();
    for (id, before) in &pushed.old_objects {
        let (Some(after), Some(current)) = (pushed_to.get(id), p.object_bounds(*id)) else {
            continue;
        };
        let target = Bounds::new(
            current.x + before.x - after.x,
            current.y + before.y - after.y,
            current.width,
            current.height,
        );
        if target != current {
            out.old_objects.push((*id, current));
            out.new_objects.push((*id, target));
        }
    }

    let ends_to: HashMap<ObjectId, LinkEndPositions> = pushed.new_links.iter().copied().collect();
    let back = |before: Option<Point>, after: Option<Point>, current: Option<Point>| match (before, after, current) {
        (Some(b), Some(a), Some(c)) => Some(c.offset(b.x - a.x, b.y - a.y)),
        _ => None,
    };
    for (id, before) in &pushed.old_links {
        let (Some(after), Some(link)) = (ends_to.get(id), p.link(*id)) else {
            continue;
        };
        let ends = LinkEndPositions {
            src_pos: back(before.src_pos, after.src_pos, link.src.pos()),
            trg_pos: back(before.trg_pos, after.trg_pos, link.trg.pos()),
        };
        if ends.src_pos.is_some() || ends.trg_pos.is_some() {
            out.old_links.push((
                *id,
                LinkEndPositions {
                    src_pos: ends.src_pos.and(link.src.pos()),
                    trg_pos: ends.trg_pos.and(link.trg.pos()),
                },
            ));
            out.new_links.push((*id, ends));
        }
    }
    out
}

/// Show a supernode's child pipeline inside its parent.
#[derive(Debug, Clone)]
pub struct ExpandSuperNodeInPlace {
    pipeline_id: ObjectId,
    node_id: ObjectId,
    moves: ExpandDisplacement,
}

impl ExpandSuperNodeInPlace {
    pub fn new(om: &ObjectModel, pipeline_id: ObjectId, node_id: ObjectId) -> Option<Self> {
        let node = om.store().get_node(pipeline_id, node_id)?;
        if !node.is_supernode() || node.is_expanded {
            return None;
        }
        let layout = &om.config().node_layout;
        let collapsed = Bounds::new(node.x_pos, node.y_pos, node.width, node.height);
        let expanded = Bounds::new(
            node.x_pos,
            node.y_pos,
            node.expanded_width.unwrap_or(layout.supernode_expanded_width),
            node.expanded_height.unwrap_or(layout.supernode_expanded_height),
        );
        let moves = if om.config().enable_move_nodes_on_supernode_resize {
            push_aside(om.pipeline(pipeline_id)?, node_id, collapsed, expanded)
        } else {
            ExpandDisplacement::default()
        };
        Some(Self {
            pipeline_id,
            node_id,
            moves,
        })
    }
}

impl Command for ExpandSuperNodeInPlace {
    fn execute(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id).expand_super_node_in_place(
            self.node_id,
            self.moves.new_objects.clone(),
            self.moves.new_links.clone(),
            self.moves.clone(),
        );
    }

    fn undo(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id).collapse_super_node_in_place(
            self.node_id,
            self.moves.old_objects.clone(),
            self.moves.old_links.clone(),
        );
    }

    fn label(&self) -> &'static str {
        "Expand supernode"
    }
}

/// Shrink an expanded supernode back and return whatever its expansion
/// pushed aside. A supernode that was already expanded when the document
/// was loaded has no record, and nothing around it moves.
#[derive(Debug, Clone)]
pub struct CollapseSuperNodeInPlace {
    pipeline_id: ObjectId,
    node_id: ObjectId,
    moves: ExpandDisplacement,
    /// The expansion record, put back on undo.
    pushed: ExpandDisplacement,
}

impl CollapseSuperNodeInPlace {
    pub fn new(om: &ObjectModel, pipeline_id: ObjectId, node_id: ObjectId) -> Option<Self> {
        let node = om.store().get_node(pipeline_id, node_id)?;
        if !node.is_supernode() || !node.is_expanded {
            return None;
        }
        let pushed = om
            .store()
            .expand_displacement(pipeline_id, node_id)
            .cloned()
            .unwrap_or_default();
        let moves = pull_back(om.pipeline(pipeline_id)?, &pushed);
        Some(Self {
            pipeline_id,
            node_id,
            moves,
            pushed,
        })
    }
}

impl Command for CollapseSuperNodeInPlace {
    fn execute(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id).collapse_super_node_in_place(
            self.node_id,
            self.moves.new_objects.clone(),
            self.moves.new_links.clone(),
        );
    }

    fn undo(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id).expand_super_node_in_place(
            self.node_id,
            self.moves.old_objects.clone(),
            self.moves.old_links.clone(),
            self.pushed.clone(),
        );
    }

    fn label(&self) -> &'static str {
        "Collapse supernode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fc_core::{CanvasConfig, Node, NodeType, SubflowRef};

    fn id(s: &str) -> ObjectId {
        ObjectId::intern(s)
    }

    fn placed(name: &str, x: f64, y: f64) -> Node {
        let mut n = Node::new(name, NodeType::ExecutionNode);
        n.x_pos = x;
        n.y_pos = y;
        n.width = 100.0;
        n.height = 40.0;
        n
    }

    /// Supernode at the origin (100x40, expands to 300x200).
    fn model(neighbours: Vec<Node>) -> (ObjectModel, ObjectId) {
        let config = CanvasConfig {
            enable_move_nodes_on_supernode_resize: true,
            ..Default::default()
        };
        let mut om = ObjectModel::new(config);
        let pid = om.primary_pipeline_id();
        let mut sn = placed("exp_sn", 0.0, 0.0);
        sn.node_type = NodeType::SuperNode;
        sn.subflow_ref = Some(SubflowRef {
            pipeline_id_ref: id("exp_child"),
            url: None,
        });
        om.api_pipeline(pid).add_node(sn);
        om.api_pipeline(pid).add_nodes(neighbours);
        (om, pid)
    }

    fn pos(om: &ObjectModel, pid: ObjectId, name: &str) -> (f64, f64) {
        let n = om.store().get_node(pid, id(name)).unwrap();
        (n.x_pos, n.y_pos)
    }

    #[test]
    fn east_overlap_pushes_east_only() {
        let (mut om, pid) = model(vec![placed("exp_e", 150.0, 0.0), placed("exp_far_s", 0.0, 400.0)]);
        let cmd = ExpandSuperNodeInPlace::new(&om, pid, id("exp_sn")).unwrap();
        cmd.execute(&mut om);
        assert_eq!(pos(&om, pid, "exp_e"), (350.0, 0.0));
        assert_eq!(pos(&om, pid, "exp_far_s"), (0.0, 400.0));
        assert!(om.store().get_node(pid, id("exp_sn")).unwrap().is_expanded);

        cmd.undo(&mut om);
        assert_eq!(pos(&om, pid, "exp_e"), (150.0, 0.0));
        assert!(!om.store().get_node(pid, id("exp_sn")).unwrap().is_expanded);
    }

    #[test]
    fn mixed_overlaps_push_south_east() {
        let (mut om, pid) = model(vec![placed("exp_e", 150.0, 0.0), placed("exp_s", 0.0, 100.0)]);
        let cmd = ExpandSuperNodeInPlace::new(&om, pid, id("exp_sn")).unwrap();
        cmd.execute(&mut om);
        assert_eq!(pos(&om, pid, "exp_e"), (350.0, 0.0));
        assert_eq!(pos(&om, pid, "exp_s"), (0.0, 260.0));
    }

    #[test]
    fn no_overlap_moves_nothing() {
        let (mut om, pid) = model(vec![placed("exp_far", 900.0, 900.0)]);
        let cmd = ExpandSuperNodeInPlace::new(&om, pid, id("exp_sn")).unwrap();
        cmd.execute(&mut om);
        assert_eq!(pos(&om, pid, "exp_far"), (900.0, 900.0));
        // Already expanded.
        assert!(ExpandSuperNodeInPlace::new(&om, pid, id("exp_sn")).is_none());

        let collapse = CollapseSuperNodeInPlace::new(&om, pid, id("exp_sn")).unwrap();
        collapse.execute(&mut om);
        assert_eq!(pos(&om, pid, "exp_far"), (900.0, 900.0));
        collapse.undo(&mut om);
        assert_eq!(pos(&om, pid, "exp_far"), (900.0, 900.0));
    }

    #[test]
    fn collapse_returns_only_what_expansion_pushed() {
        let (mut om, pid) = model(vec![
            placed("exp_e", 150.0, 0.0),
            placed("exp_far_s", 0.0, 400.0),
            placed("exp_far_se", 900.0, 900.0),
        ]);
        ExpandSuperNodeInPlace::new(&om, pid, id("exp_sn"))
            .unwrap()
            .execute(&mut om);
        assert_eq!(pos(&om, pid, "exp_far_se"), (1100.0, 900.0));

        let collapse = CollapseSuperNodeInPlace::new(&om, pid, id("exp_sn")).unwrap();
        collapse.execute(&mut om);
        assert_eq!(pos(&om, pid, "exp_e"), (150.0, 0.0));
        assert_eq!(pos(&om, pid, "exp_far_s"), (0.0, 400.0));
        assert_eq!(pos(&om, pid, "exp_far_se"), (900.0, 900.0));
        assert!(om.store().expand_displacement(pid, id("exp_sn")).is_none());

        // Undoing the collapse pushes again and keeps the record for next time.
        collapse.undo(&mut om);
        assert_eq!(pos(&om, pid, "exp_e"), (350.0, 0.0));
        assert!(om.store().expand_displacement(pid, id("exp_sn")).is_some());
    }

    #[test]
    fn collapse_keeps_moves_made_while_expanded() {
        let (mut om, pid) = model(vec![placed("exp_e", 150.0, 0.0)]);
        ExpandSuperNodeInPlace::new(&om, pid, id("exp_sn"))
            .unwrap()
            .execute(&mut om);
        om.api_pipeline(pid)
            .move_objects(vec![id("exp_e")], 0.0, 50.0);

        CollapseSuperNodeInPlace::new(&om, pid, id("exp_sn"))
            .unwrap()
            .execute(&mut om);
        assert_eq!(pos(&om, pid, "exp_e"), (150.0, 50.0));
    }

    #[test]
    fn collapse_without_record_moves_nothing() {
        let (mut om, pid) = model(vec![placed("exp_e", 350.0, 0.0)]);
        om.api_pipeline(pid)
            .expand_super_node_in_place(id("exp_sn"), vec![], vec![], ExpandDisplacement::default());
        // A fresh canvas carries no expansion records.
        let info = om.store().canvas_info().clone();
        om.set_canvas_info(info);
        assert!(om.store().expand_displacement(pid, id("exp_sn")).is_none());

        CollapseSuperNodeInPlace::new(&om, pid, id("exp_sn"))
            .unwrap()
            .execute(&mut om);
        assert_eq!(pos(&om, pid, "exp_e"), (350.0, 0.0));
        assert!(!om.store().get_node(pid, id("exp_sn")).unwrap().is_expanded);
    }
}
