use crate::commands::Command;
use fc_core::{Action, Bounds, CopiedObjects, LinkEnd, ObjectId, ObjectModel, Point};

/// Give up nudging after this many steps; the last position is used.
const MAX_NUDGES: usize = 100;

/// Paste clipboard content as fresh objects and select them.
#[derive(Debug, Clone)]
pub struct Paste {
    pipeline_id: ObjectId,
    objects: CopiedObjects,
    old_selection: (Option<ObjectId>, Vec<ObjectId>),
}

impl Paste {
    /// `position` pins the top-left of the pasted content. Without it the
    /// content keeps its original place if that is inside `viewport`, and
    /// is centered in the viewport otherwise. Content landing exactly on
    /// top of existing objects is nudged by the paste offset.
    ///
    /// `None` when there is nothing to paste.
    pub fn new(
        om: &mut ObjectModel,
        pipeline_id: ObjectId,
        clipboard: &CopiedObjects,
        position: Option<Point>,
        viewport: Option<Bounds>,
    ) -> Option<Self> {
        om.pipeline(pipeline_id)?;
        if clipboard.nodes.is_empty() && clipboard.comments.is_empty() {
            return None;
        }
        let mut objects = om.clone_objects_to_paste(clipboard);
        let bounds = objects.bounds()?;

        let target = match (position, viewport) {
            (Some(pos), _) => pos,
            (None, Some(view)) if !view.intersects(&bounds) => {
                let c = view.center();
                Point::new(c.x - bounds.width / 2.0, c.y - bounds.height / 2.0)
            }
            _ => Point::new(bounds.x, bounds.y),
        };
        offset(&mut objects, target.x - bounds.x, target.y - bounds.y);

        let (step_x, step_y) = (om.config().paste_offset_x, om.config().paste_offset_y);
        let api = om.api_pipeline(pipeline_id);
        let mut nudges = 0;
        while nudges < MAX_NUDGES && api.exactly_overlaps(&objects.nodes, &objects.comments, &objects.links) {
            offset(&mut objects, step_x, step_y);
            nudges += 1;
        }
        if nudges > 0 {
            log::debug!("paste nudged {nudges} times");
        }

        let old_selection = (
            om.get_selection_pipeline_id(),
            om.get_selected_object_ids().to_vec(),
        );
        Some(Self {
            pipeline_id,
            objects,
            old_selection,
        })
    }

    pub fn objects(&self) -> &CopiedObjects {
        &self.objects
    }

    fn pasted_ids(&self) -> Vec<ObjectId> {
        self.objects
            .nodes
            .iter()
            .map(|n| n.id)
            .chain(self.objects.comments.iter().map(|c| c.id))
            .collect()
    }
}

fn offset(objects: &mut CopiedObjects, dx: f64, dy: f64) {
    for node in &mut objects.nodes {
        node.x_pos += dx;
        node.y_pos += dy;
    }
    for comment in &mut objects.comments {
        comment.x_pos += dx;
        comment.y_pos += dy;
    }
    for link in &mut objects.links {
        for end in [&mut link.src, &mut link.trg] {
            if let LinkEnd::Detached(pt) = end {
                *pt = pt.offset(dx, dy);
            }
        }
    }
}

impl Command for Paste {
    fn execute(&self, om: &mut ObjectModel) {
        let (supernodes, plain): (Vec<_>, Vec<_>) =
            self.objects.nodes.iter().cloned().partition(|n| n.is_supernode());
        let mut api = om.api_pipeline(self.pipeline_id);
        if !supernodes.is_empty() {
            api.add_supernodes(supernodes, self.objects.pipelines.clone());
        }
        api.add_nodes(plain);
        api.add_comments(self.objects.comments.clone());
        api.add_links(self.objects.links.clone());
        om.dispatch(Action::SetSelections {
            pipeline_id: Some(self.pipeline_id),
            ids: self.pasted_ids(),
        });
    }

    fn undo(&self, om: &mut ObjectModel) {
        let supernodes: Vec<ObjectId> = self
            .objects
            .nodes
            .iter()
            .filter(|n| n.is_supernode())
            .map(|n| n.id)
            .collect();
        let mut api = om.api_pipeline(self.pipeline_id);
        if !supernodes.is_empty() {
            api.delete_supernodes(supernodes, self.objects.pipelines.iter().map(|p| p.id).collect());
        }
        api.delete_objects(self.pasted_ids());
        let (pipeline_id, ids) = self.old_selection.clone();
        om.dispatch(Action::SetSelections { pipeline_id, ids });
    }

    fn label(&self) -> &'static str {
        "Paste"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fc_core::{CanvasConfig, Comment, Node, NodeType, SequentialIdGenerator};

    fn id(s: &str) -> ObjectId {
        ObjectId::intern(s)
    }

    fn model() -> (ObjectModel, ObjectId) {
        let mut om = ObjectModel::with_id_generator(
            CanvasConfig::default(),
            Box::new(SequentialIdGenerator::with_prefix("paste.")),
        );
        let pid = om.primary_pipeline_id();
        let mut n = Node::new("pst_a", NodeType::ExecutionNode);
        n.x_pos = 100.0;
        n.y_pos = 100.0;
        n.width = 80.0;
        n.height = 40.0;
        om.api_pipeline(pid).add_node(n);
        om.api_pipeline(pid)
            .add_comment(Comment::new("pst_note", "hi", Bounds::new(300.0, 100.0, 100.0, 40.0)));
        (om, pid)
    }

    #[test]
    fn paste_in_place_is_nudged_and_selected() {
        let (mut om, pid) = model();
        let copied = om.copy_objects(pid, &[id("pst_a")]);
        let cmd = Paste::new(&mut om, pid, &copied, None, None).unwrap();
        cmd.execute(&mut om);

        let pasted = &cmd.objects().nodes[0];
        assert_ne!(pasted.id, id("pst_a"));
        assert_eq!((pasted.x_pos, pasted.y_pos), (110.0, 110.0));
        assert_eq!(om.get_selected_object_ids(), &[pasted.id]);

        cmd.undo(&mut om);
        assert_eq!(om.store().get_nodes(pid).len(), 1);
        assert!(om.get_selected_object_ids().is_empty());
    }

    #[test]
    fn offscreen_content_is_centered_in_viewport() {
        let (mut om, pid) = model();
        let copied = om.copy_objects(pid, &[id("pst_note")]);
        let view = Bounds::new(1000.0, 1000.0, 200.0, 200.0);
        let cmd = Paste::new(&mut om, pid, &copied, None, Some(view)).unwrap();
        let c = &cmd.objects().comments[0];
        assert_eq!((c.x_pos, c.y_pos), (1050.0, 1080.0));
    }

    #[test]
    fn empty_clipboard_is_rejected() {
        let (mut om, pid) = model();
        assert!(Paste::new(&mut om, pid, &CopiedObjects::default(), None, None).is_none());
    }
}
