use crate::commands::Command;
use fc_core::{Bounds, LayoutDirection, LinkEndPositions, ObjectId, ObjectModel};

/// Auto-layout one pipeline. The computed positions are frozen so redo
/// does not depend on the layout engine seeing the same graph again.
#[derive(Debug, Clone)]
pub struct ArrangeLayout {
    pipeline_id: ObjectId,
    direction: LayoutDirection,
    old_nodes: Vec<(ObjectId, Bounds)>,
    old_links: Vec<(ObjectId, LinkEndPositions)>,
    new_nodes: Vec<(ObjectId, Bounds)>,
    new_links: Vec<(ObjectId, LinkEndPositions)>,
}

impl ArrangeLayout {
    pub fn new(om: &mut ObjectModel, pipeline_id: ObjectId, direction: LayoutDirection) -> Option<Self> {
        let p = om.pipeline(pipeline_id)?.clone();
        let result = om.api_pipeline(pipeline_id).compute_auto_layout(direction);
        if result.nodes.is_empty() {
            return None;
        }
        let old_nodes = result
            .nodes
            .iter()
            .filter_map(|(id, _)| p.node(*id).map(|n| (*id, n.bounds())))
            .collect();
        let old_links = result
            .links
            .iter()
            .filter_map(|(id, _)| {
                p.link(*id).map(|l| {
                    (
                        *id,
                        LinkEndPositions {
                            src_pos: l.src.pos(),
                            trg_pos: l.trg.pos(),
                        },
                    )
                })
            })
            .collect();
        Some(Self {
            pipeline_id,
            direction,
            old_nodes,
            old_links,
            new_nodes: result.nodes,
            new_links: result.links,
        })
    }
}

impl Command for ArrangeLayout {
    fn execute(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .size_and_position_objects(self.new_nodes.clone(), self.new_links.clone());
    }

    fn undo(&self, om: &mut ObjectModel) {
        om.api_pipeline(self.pipeline_id)
            .size_and_position_objects(self.old_nodes.clone(), self.old_links.clone());
    }

    fn label(&self) -> &'static str {
        match self.direction {
            LayoutDirection::Horizontal => "Arrange horizontally",
            LayoutDirection::Vertical => "Arrange vertically",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fc_core::{CanvasConfig, Link, LinkEnd, LinkType, Node, NodeType};

    fn id(s: &str) -> ObjectId {
        ObjectId::intern(s)
    }

    #[test]
    fn arrange_then_undo_restores_positions() {
        let mut om = ObjectModel::new(CanvasConfig::default());
        let pid = om.primary_pipeline_id();
        let mut a = Node::new("lay_a", NodeType::ExecutionNode);
        a.x_pos = 500.0;
        a.y_pos = 500.0;
        a.width = 100.0;
        a.height = 40.0;
        let mut b = a.clone();
        b.id = id("lay_b");
        b.x_pos = 10.0;
        let mut api = om.api_pipeline(pid);
        api.add_nodes(vec![a, b]);
        api.add_link(Link::new(
            "lay_ab",
            LinkType::NodeLink,
            LinkEnd::attached(id("lay_a"), None),
            LinkEnd::attached(id("lay_b"), None),
        ));

        let cmd = ArrangeLayout::new(&mut om, pid, LayoutDirection::Horizontal).unwrap();
        cmd.execute(&mut om);
        let a = om.store().get_node(pid, id("lay_a")).unwrap().x_pos;
        let b = om.store().get_node(pid, id("lay_b")).unwrap().x_pos;
        assert!(a < b);
        assert_eq!(cmd.label(), "Arrange horizontally");

        cmd.undo(&mut om);
        let n = om.store().get_node(pid, id("lay_a")).unwrap();
        assert_eq!((n.x_pos, n.y_pos), (500.0, 500.0));
    }
}
