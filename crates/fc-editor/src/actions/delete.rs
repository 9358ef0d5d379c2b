use crate::commands::Command;
use fc_core::{Link, LinkEnd, Node, ObjectId, ObjectModel, Pipeline, Point, RemovedObjects};
use std::collections::HashSet;

/// Delete nodes, comments and links. Supernodes take their descendant
/// pipelines with them. With detachable links enabled, a data link that
/// loses only one end stays on the canvas with that end left loose where
/// the port used to be.
#[derive(Debug, Clone)]
pub struct DeleteObjects {
    pipeline_id: ObjectId,
    /// Everything removed from the pipeline, with the indices it held.
    removed: RemovedObjects,
    /// Descendant pipelines of deleted supernodes, with their indices.
    pipelines: Vec<(usize, Pipeline)>,
    /// (before, after) for links turned loose instead of deleted.
    detached: Vec<(Link, Link)>,
}

impl DeleteObjects {
    pub fn new(om: &ObjectModel, pipeline_id: ObjectId, ids: &[ObjectId]) -> Option<Self> {
        let p = om.pipeline(pipeline_id)?;
        let wanted: HashSet<ObjectId> = ids.iter().copied().collect();
        let gone: HashSet<ObjectId> = p
            .nodes
            .iter()
            .map(|n| n.id)
            .chain(p.comments.iter().map(|c| c.id))
            .filter(|id| wanted.contains(id))
            .collect();

        let detachable = om.config().enable_detachable_links;
        let mut links = HashSet::new();
        let mut detached = Vec::new();
        for link in &p.links {
            let src_gone = link.src_obj_id().is_some_and(|id| gone.contains(&id));
            let trg_gone = link.trg_obj_id().is_some_and(|id| gone.contains(&id));
            if wanted.contains(&link.id) || (src_gone && trg_gone) {
                links.insert(link.id);
                continue;
            }
            if !src_gone && !trg_gone {
                continue;
            }
            // Only one end is going. Keep the link unless it would end up
            // loose at both ends.
            let other_loose = if src_gone { link.trg.is_detached() } else { link.src.is_detached() };
            if detachable && link.is_data_link() && !other_loose {
                let mut loose = link.clone();
                if src_gone {
                    loose.src = LinkEnd::Detached(port_point(p, &link.src, false));
                } else {
                    loose.trg = LinkEnd::Detached(port_point(p, &link.trg, true));
                }
                detached.push((link.clone(), loose));
            } else {
                links.insert(link.id);
            }
        }

        let doomed: HashSet<ObjectId> = gone.union(&links).copied().collect();
        let removed = p.removed_objects(&doomed);
        if removed.is_empty() {
            return None;
        }

        let supernodes: Vec<Node> = removed
            .nodes
            .iter()
            .map(|(_, n)| n)
            .filter(|n| n.is_supernode())
            .cloned()
            .collect();
        let pipelines = om.indexed_pipelines(&om.get_desc_pipelines_to_delete(&supernodes, pipeline_id));

        Some(Self {
            pipeline_id,
            removed,
            pipelines,
            detached,
        })
    }
}

/// Where a link end sat on its node: the middle of the left edge for an
/// input, of the right edge for an output.
fn port_point(p: &Pipeline, end: &LinkEnd, input: bool) -> Point {
    let Some(bounds) = end.obj_id().and_then(|id| p.object_bounds(id)) else {
        return Point::default();
    };
    let x = if input { bounds.x } else { bounds.right() };
    Point::new(x, bounds.center().y)
}

impl Command for DeleteObjects {
    fn execute(&self, om: &mut ObjectModel) {
        let mut api = om.api_pipeline(self.pipeline_id);
        if !self.detached.is_empty() {
            api.update_links(self.detached.iter().map(|(_, after)| after.clone()).collect());
        }
        api.delete_links(self.removed.link_ids().collect());
        let supernode_ids: Vec<ObjectId> = self
            .removed
            .nodes
            .iter()
            .filter(|(_, n)| n.is_supernode())
            .map(|(_, n)| n.id)
            .collect();
        if !supernode_ids.is_empty() {
            api.delete_supernodes(supernode_ids, self.pipelines.iter().map(|(_, p)| p.id).collect());
        }
        api.delete_objects(self.removed.node_ids().chain(self.removed.comment_ids()).collect());
    }

    fn undo(&self, om: &mut ObjectModel) {
        let mut api = om.api_pipeline(self.pipeline_id);
        api.restore_pipelines(self.pipelines.clone());
        api.restore_objects(self.removed.clone());
        if !self.detached.is_empty() {
            api.update_links(self.detached.iter().map(|(before, _)| before.clone()).collect());
        }
    }

    fn label(&self) -> &'static str {
        "Delete"
    }
}
