use crate::commands::Command;
use fc_core::{Comment, IdKind, Link, LinkEnd, LinkType, ObjectId, ObjectModel};

/// Add a comment, optionally linked to existing nodes.
#[derive(Debug, Clone)]
pub struct CreateComment {
    pipeline_id: ObjectId,
    comment: Comment,
    links: Vec<Link>,
}

impl CreateComment {
    pub fn new(
        om: &mut ObjectModel,
        pipeline_id: ObjectId,
        x: f64,
        y: f64,
        content: &str,
        node_ids: &[ObjectId],
    ) -> Self {
        let comment = om.api_pipeline(pipeline_id).create_comment(x, y, content);
        let targets: Vec<ObjectId> = node_ids
            .iter()
            .copied()
            .filter(|id| om.store().get_node(pipeline_id, *id).is_some())
            .collect();
        let links = targets
            .into_iter()
            .map(|node_id| {
                Link::new(
                    om.next_id(IdKind::Link),
                    LinkType::CommentLink,
                    LinkEnd::attached(comment.id, None),
                    LinkEnd::attached(node_id, None),
                )
            })
            .collect();
        Self {
            pipeline_id,
            comment,
            links,
        }
    }

    pub fn comment(&self) -> &Comment {
        &self.comment
    }
}

impl Command for CreateComment {
    fn execute(&self, om: &mut ObjectModel) {
        let mut api = om.api_pipeline(self.pipeline_id);
        api.add_comment(self.comment.clone());
        api.add_links(self.links.clone());
    }

    fn undo(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .delete_objects(vec![self.comment.id]);
    }

    fn label(&self) -> &'static str {
        "Create comment"
    }
}

/// Change a comment's text and, optionally, its size.
#[derive(Debug, Clone)]
pub struct EditComment {
    pipeline_id: ObjectId,
    old: Comment,
    new: Comment,
}

impl EditComment {
    pub fn new(
        om: &ObjectModel,
        pipeline_id: ObjectId,
        comment_id: ObjectId,
        content: &str,
        size: Option<(f64, f64)>,
    ) -> Option<Self> {
        let old = om.store().get_comment(pipeline_id, comment_id)?.clone();
        let mut new = old.clone();
        new.content = content.to_string();
        if let Some((width, height)) = size {
            new.width = width;
            new.height = height;
        }
        Some(Self {
            pipeline_id,
            old,
            new,
        })
    }
}

impl Command for EditComment {
    fn execute(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .edit_comment(self.new.clone());
    }

    fn undo(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .edit_comment(self.old.clone());
    }

    fn label(&self) -> &'static str {
        "Edit comment"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fc_core::{CanvasConfig, Node, NodeType, SequentialIdGenerator};

    #[test]
    fn comment_links_to_existing_nodes_only() {
        let mut om = ObjectModel::with_id_generator(
            CanvasConfig::default(),
            Box::new(SequentialIdGenerator::with_prefix("cc.")),
        );
        let pid = om.primary_pipeline_id();
        om.api_pipeline(pid)
            .add_node(Node::new("cc_target", NodeType::ExecutionNode));

        let cmd = CreateComment::new(
            &mut om,
            pid,
            0.0,
            0.0,
            "note",
            &[ObjectId::intern("cc_target"), ObjectId::intern("cc_missing")],
        );
        cmd.execute(&mut om);
        assert_eq!(om.store().get_links(pid).len(), 1);
        assert_eq!(om.store().get_comments(pid)[0].content, "note");

        cmd.undo(&mut om);
        assert!(om.store().get_comments(pid).is_empty());
        assert!(om.store().get_links(pid).is_empty());
    }

    #[test]
    fn edit_comment_restores_text_and_size() {
        let mut om = ObjectModel::new(CanvasConfig::default());
        let pid = om.primary_pipeline_id();
        let create = CreateComment::new(&mut om, pid, 0.0, 0.0, "before", &[]);
        create.execute(&mut om);
        let cid = create.comment().id;

        let edit = EditComment::new(&om, pid, cid, "after", Some((300.0, 100.0))).unwrap();
        edit.execute(&mut om);
        let c = om.store().get_comment(pid, cid).unwrap();
        assert_eq!((c.content.as_str(), c.width), ("after", 300.0));

        edit.undo(&mut om);
        let c = om.store().get_comment(pid, cid).unwrap();
        assert_eq!((c.content.as_str(), c.width), ("before", 175.0));
    }
}
