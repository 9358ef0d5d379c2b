use crate::commands::Command;
use fc_core::{Breadcrumb, ObjectId, ObjectModel};

/// Enter a supernode's child pipeline.
#[derive(Debug, Clone)]
pub struct DisplaySubPipeline {
    old: Vec<Breadcrumb>,
    new: Vec<Breadcrumb>,
}

impl DisplaySubPipeline {
    /// `None` unless `supernode_id` is a supernode in `pipeline_id` whose
    /// child pipeline exists.
    pub fn new(om: &ObjectModel, pipeline_id: ObjectId, supernode_id: ObjectId) -> Option<Self> {
        let node = om.store().get_node(pipeline_id, supernode_id)?;
        let child = node.subflow_pipeline_id()?;
        om.pipeline(child)?;
        let old = om.get_breadcrumbs().to_vec();
        // Entering from somewhere other than the current pipeline rebuilds
        // the trail up to the parent.
        let mut new: Vec<Breadcrumb> = match old.iter().position(|b| b.pipeline_id == pipeline_id) {
            Some(i) => old[..=i].to_vec(),
            None => vec![Breadcrumb::root(om.primary_pipeline_id())],
        };
        new.push(Breadcrumb {
            pipeline_id: child,
            label: node.label.clone(),
            supernode_id: Some(supernode_id),
            parent_pipeline_id: Some(pipeline_id),
        });
        Some(Self { old, new })
    }
}

impl Command for DisplaySubPipeline {
    fn execute(&self, om: &mut ObjectModel) {
        om.set_breadcrumbs(self.new.clone());
    }

    fn undo(&self, om: &mut ObjectModel) {
        om.set_breadcrumbs(self.old.clone());
    }

    fn label(&self) -> &'static str {
        "Open supernode"
    }
}

/// Go back up one breadcrumb.
#[derive(Debug, Clone)]
pub struct DisplayPreviousPipeline {
    old: Vec<Breadcrumb>,
    new: Vec<Breadcrumb>,
}

impl DisplayPreviousPipeline {
    /// `None` at the primary pipeline.
    pub fn new(om: &ObjectModel) -> Option<Self> {
        let old = om.get_breadcrumbs().to_vec();
        if old.len() < 2 {
            return None;
        }
        let new = old[..old.len() - 1].to_vec();
        Some(Self { old, new })
    }
}

impl Command for DisplayPreviousPipeline {
    fn execute(&self, om: &mut ObjectModel) {
        om.set_breadcrumbs(self.new.clone());
    }

    fn undo(&self, om: &mut ObjectModel) {
        om.set_breadcrumbs(self.old.clone());
    }

    fn label(&self) -> &'static str {
        "Close supernode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fc_core::{Action, CanvasConfig, Node, NodeType, Pipeline, SubflowRef};

    fn id(s: &str) -> ObjectId {
        ObjectId::intern(s)
    }

    #[test]
    fn enter_and_leave_supernode() {
        let mut om = ObjectModel::new(CanvasConfig::default());
        let pid = om.primary_pipeline_id();
        om.dispatch(Action::AddPipeline(Pipeline::new("nav_child")));
        let mut sn = Node::new("nav_sn", NodeType::SuperNode);
        sn.label = "Inner".into();
        sn.subflow_ref = Some(SubflowRef {
            pipeline_id_ref: id("nav_child"),
            url: None,
        });
        om.api_pipeline(pid).add_node(sn);

        assert!(DisplayPreviousPipeline::new(&om).is_none());

        let enter = DisplaySubPipeline::new(&om, pid, id("nav_sn")).unwrap();
        enter.execute(&mut om);
        assert_eq!(om.get_current_pipeline_id(), id("nav_child"));
        assert_eq!(om.get_current_breadcrumb().unwrap().label, "Inner");

        let back = DisplayPreviousPipeline::new(&om).unwrap();
        back.execute(&mut om);
        assert_eq!(om.get_current_pipeline_id(), pid);
        back.undo(&mut om);
        assert_eq!(om.get_current_pipeline_id(), id("nav_child"));
        enter.undo(&mut om);
        assert_eq!(om.get_breadcrumbs().len(), 1);
    }
}
