use crate::commands::Command;
use fc_core::{Link, LinkEnd, ObjectId, ObjectModel, RemovedObjects};
use std::collections::HashSet;

/// Links from every source end to every target end. Ends may be attached
/// to a node (port optional) or loose at a point.
#[derive(Debug, Clone)]
pub struct CreateNodeLinks {
    pipeline_id: ObjectId,
    links: Vec<Link>,
}

impl CreateNodeLinks {
    /// `None` when no requested link is legal.
    pub fn new(om: &mut ObjectModel, pipeline_id: ObjectId, srcs: &[LinkEnd], trgs: &[LinkEnd]) -> Option<Self> {
        let links = om.api_pipeline(pipeline_id).create_node_links(srcs, trgs);
        if links.is_empty() {
            log::debug!("no legal links between {} sources and {} targets", srcs.len(), trgs.len());
            return None;
        }
        Some(Self { pipeline_id, links })
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }
}

impl Command for CreateNodeLinks {
    fn execute(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .add_links(self.links.clone());
    }

    fn undo(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .delete_links(self.links.iter().map(|l| l.id).collect());
    }

    fn label(&self) -> &'static str {
        "Link nodes"
    }
}

#[derive(Debug, Clone)]
pub struct CreateCommentLinks {
    pipeline_id: ObjectId,
    links: Vec<Link>,
}

impl CreateCommentLinks {
    pub fn new(
        om: &mut ObjectModel,
        pipeline_id: ObjectId,
        comment_ids: &[ObjectId],
        node_ids: &[ObjectId],
    ) -> Option<Self> {
        let links = om
            .api_pipeline(pipeline_id)
            .create_comment_links(comment_ids, node_ids);
        (!links.is_empty()).then_some(Self { pipeline_id, links })
    }
}

impl Command for CreateCommentLinks {
    fn execute(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .add_links(self.links.clone());
    }

    fn undo(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .delete_links(self.links.iter().map(|l| l.id).collect());
    }

    fn label(&self) -> &'static str {
        "Link comment"
    }
}

/// Re-point one or both ends of a data link.
#[derive(Debug, Clone)]
pub struct UpdateLink {
    pipeline_id: ObjectId,
    old: Link,
    new: Link,
}

impl UpdateLink {
    /// `None` if the link is missing, is not a data link, or the new
    /// connection would not be legal.
    pub fn new(
        om: &mut ObjectModel,
        pipeline_id: ObjectId,
        link_id: ObjectId,
        src: Option<LinkEnd>,
        trg: Option<LinkEnd>,
    ) -> Option<Self> {
        let api = om.api_pipeline(pipeline_id);
        let old = api.get_link(link_id)?.clone();
        if !old.is_data_link() {
            return None;
        }
        let (src, trg) = api.check_link_update(link_id, src.unwrap_or(old.src), trg.unwrap_or(old.trg))?;
        let mut new = old.clone();
        new.src = src;
        new.trg = trg;
        Some(Self {
            pipeline_id,
            old,
            new,
        })
    }
}

impl Command for UpdateLink {
    fn execute(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .update_links(vec![self.new.clone()]);
    }

    fn undo(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .update_links(vec![self.old.clone()]);
    }

    fn label(&self) -> &'static str {
        "Update link"
    }
}

#[derive(Debug, Clone)]
pub struct DeleteLink {
    pipeline_id: ObjectId,
    index: usize,
    link: Link,
}

impl DeleteLink {
    pub fn new(om: &ObjectModel, pipeline_id: ObjectId, link_id: ObjectId) -> Option<Self> {
        let (index, link) = om
            .store()
            .get_links(pipeline_id)
            .iter()
            .enumerate()
            .find(|(_, l)| l.id == link_id)?;
        Some(Self {
            pipeline_id,
            index,
            link: link.clone(),
        })
    }
}

impl Command for DeleteLink {
    fn execute(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .delete_link(self.link.id);
    }

    fn undo(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id).restore_objects(RemovedObjects {
            links: vec![(self.index, self.link.clone())],
            ..Default::default()
        });
    }

    fn label(&self) -> &'static str {
        "Delete link"
    }
}

/// Remove every link (data, comment and association) attached to the
/// given nodes and comments.
#[derive(Debug, Clone)]
pub struct DisconnectNodes {
    pipeline_id: ObjectId,
    links: RemovedObjects,
}

impl DisconnectNodes {
    pub fn new(om: &mut ObjectModel, pipeline_id: ObjectId, ids: &[ObjectId]) -> Option<Self> {
        let api = om.api_pipeline(pipeline_id);
        let link_ids: HashSet<ObjectId> = api
            .get_links_containing_ids(ids)
            .iter()
            .map(|l| l.id)
            .collect();
        let links = api.removed_objects(&link_ids);
        (!links.is_empty()).then_some(Self { pipeline_id, links })
    }
}

impl Command for DisconnectNodes {
    fn execute(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .delete_links(self.links.link_ids().collect());
    }

    fn undo(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .restore_objects(self.links.clone());
    }

    fn label(&self) -> &'static str {
        "Disconnect"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fc_core::{CanvasConfig, Cardinality, Node, NodeType, Point, Port, SequentialIdGenerator};

    fn id(s: &str) -> ObjectId {
        ObjectId::intern(s)
    }

    fn node(name: &str) -> Node {
        let mut n = Node::new(name, NodeType::ExecutionNode);
        n.input_ports.push(Port::new("in", "", Cardinality::SINGLE));
        n.output_ports.push(Port::new("out", "", Cardinality::UNBOUNDED));
        n
    }

    fn model() -> (ObjectModel, ObjectId) {
        let mut om = ObjectModel::with_id_generator(
            CanvasConfig::default(),
            Box::new(SequentialIdGenerator::with_prefix("links.")),
        );
        let pid = om.primary_pipeline_id();
        om.api_pipeline(pid)
            .add_nodes(vec![node("lk_a"), node("lk_b"), node("lk_c")]);
        (om, pid)
    }

    #[test]
    fn create_links_undo_removes_them() {
        let (mut om, pid) = model();
        let cmd = CreateNodeLinks::new(
            &mut om,
            pid,
            &[LinkEnd::attached(id("lk_a"), None)],
            &[LinkEnd::attached(id("lk_b"), None), LinkEnd::attached(id("lk_c"), None)],
        )
        .unwrap();
        assert_eq!(cmd.links().len(), 2);
        cmd.execute(&mut om);
        assert_eq!(om.store().get_links(pid).len(), 2);
        cmd.undo(&mut om);
        assert!(om.store().get_links(pid).is_empty());
    }

    #[test]
    fn update_link_ignores_itself_for_cardinality() {
        let (mut om, pid) = model();
        let create = CreateNodeLinks::new(
            &mut om,
            pid,
            &[LinkEnd::attached(id("lk_a"), None)],
            &[LinkEnd::attached(id("lk_b"), None)],
        )
        .unwrap();
        create.execute(&mut om);
        let link_id = create.links()[0].id;

        // Re-attaching the same single-cardinality target is fine.
        let same = UpdateLink::new(&mut om, pid, link_id, None, Some(LinkEnd::attached(id("lk_b"), None)));
        assert!(same.is_some());

        let detach = UpdateLink::new(
            &mut om,
            pid,
            link_id,
            None,
            Some(LinkEnd::Detached(Point::new(400.0, 40.0))),
        )
        .unwrap();
        detach.execute(&mut om);
        assert!(om.store().get_link(pid, link_id).unwrap().trg.is_detached());
        detach.undo(&mut om);
        assert_eq!(om.store().get_link(pid, link_id).unwrap().trg_obj_id(), Some(id("lk_b")));
    }

    #[test]
    fn disconnect_restores_all_links() {
        let (mut om, pid) = model();
        let create = CreateNodeLinks::new(
            &mut om,
            pid,
            &[LinkEnd::attached(id("lk_a"), None), LinkEnd::attached(id("lk_b"), None)],
            &[LinkEnd::attached(id("lk_c"), None)],
        )
        .unwrap();
        create.execute(&mut om);
        // lk_c's input is single, so only one link was created.
        assert_eq!(create.links().len(), 1);

        let cmd = DisconnectNodes::new(&mut om, pid, &[id("lk_c")]).unwrap();
        cmd.execute(&mut om);
        assert!(om.store().get_links(pid).is_empty());
        cmd.undo(&mut om);
        assert_eq!(om.store().get_links(pid), create.links());
        assert!(DisconnectNodes::new(&mut om, pid, &[id("lk_b")]).is_none());
    }

    #[test]
    fn deleted_link_returns_to_its_slot() {
        let (mut om, pid) = model();
        let create = CreateNodeLinks::new(
            &mut om,
            pid,
            &[LinkEnd::attached(id("lk_a"), None)],
            &[LinkEnd::attached(id("lk_b"), None), LinkEnd::attached(id("lk_c"), None)],
        )
        .unwrap();
        create.execute(&mut om);
        let before = om.store().get_links(pid).to_vec();

        let cmd = DeleteLink::new(&om, pid, before[0].id).unwrap();
        cmd.execute(&mut om);
        assert_eq!(om.store().get_links(pid), &before[1..]);
        cmd.undo(&mut om);
        assert_eq!(om.store().get_links(pid), before.as_slice());
    }
}
