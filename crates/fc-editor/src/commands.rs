//! Undo/Redo command stack.
//!
//! Every edit is a reversible [`EditCommand`]. A command is fully built by
//! its constructor: it reads whatever it needs from the object model, picks
//! all new IDs, and keeps copies of any state that undo has to put back.
//! `execute`, `undo` and `redo` then only replay store actions, so redo
//! reproduces exactly the objects (and IDs) of the first execution.

use crate::actions::*;
use fc_core::ObjectModel;
use std::collections::VecDeque;

/// The shared do/undo contract implemented by every command struct.
pub trait Command {
    fn execute(&self, om: &mut ObjectModel);

    fn undo(&self, om: &mut ObjectModel);

    fn redo(&self, om: &mut ObjectModel) {
        self.execute(om);
    }

    /// Short description used for undo/redo menus and logging.
    fn label(&self) -> &'static str;
}

/// Closed set of edits the canvas can perform.
#[derive(Debug, Clone)]
pub enum EditCommand {
    CreateNode(CreateNode),
    CreateAutoNode(CreateAutoNode),
    CreateComment(CreateComment),
    CreateNodeLinks(CreateNodeLinks),
    CreateCommentLinks(CreateCommentLinks),
    UpdateLink(UpdateLink),
    DeleteLink(DeleteLink),
    DeleteObjects(DeleteObjects),
    DisconnectNodes(DisconnectNodes),
    MoveObjects(MoveObjects),
    SizeAndPositionObjects(SizeAndPositionObjects),
    EditComment(EditComment),
    SetNodeLabel(SetNodeLabel),
    SetNodeParameters(SetNodeParameters),
    SetObjectsStyle(SetObjectsStyle),
    SetLinksStyle(SetLinksStyle),
    CreateSuperNode(CreateSuperNode),
    DeconstructSuperNode(DeconstructSuperNode),
    ExpandSuperNodeInPlace(ExpandSuperNodeInPlace),
    CollapseSuperNodeInPlace(CollapseSuperNodeInPlace),
    CreateNodeOnLink(CreateNodeOnLink),
    AttachNodeToLinks(AttachNodeToLinks),
    CreateNodeAttachLinks(CreateNodeAttachLinks),
    Paste(Paste),
    ArrangeLayout(ArrangeLayout),
    DisplaySubPipeline(DisplaySubPipeline),
    DisplayPreviousPipeline(DisplayPreviousPipeline),
}

impl EditCommand {
    fn command(&self) -> &dyn Command {
        match self {
            EditCommand::CreateNode(c) => c,
            EditCommand::CreateAutoNode(c) => c,
            EditCommand::CreateComment(c) => c,
            EditCommand::CreateNodeLinks(c) => c,
            EditCommand::CreateCommentLinks(c) => c,
            EditCommand::UpdateLink(c) => c,
            EditCommand::DeleteLink(c) => c,
            EditCommand::DeleteObjects(c) => c,
            EditCommand::DisconnectNodes(c) => c,
            EditCommand::MoveObjects(c) => c,
            EditCommand::SizeAndPositionObjects(c) => c,
            EditCommand::EditComment(c) => c,
            EditCommand::SetNodeLabel(c) => c,
            EditCommand::SetNodeParameters(c) => c,
            EditCommand::SetObjectsStyle(c) => c,
            EditCommand::SetLinksStyle(c) => c,
            EditCommand::CreateSuperNode(c) => c,
            EditCommand::DeconstructSuperNode(c) => c,
            EditCommand::ExpandSuperNodeInPlace(c) => c,
            EditCommand::CollapseSuperNodeInPlace(c) => c,
            EditCommand::CreateNodeOnLink(c) => c,
            EditCommand::AttachNodeToLinks(c) => c,
            EditCommand::CreateNodeAttachLinks(c) => c,
            EditCommand::Paste(c) => c,
            EditCommand::ArrangeLayout(c) => c,
            EditCommand::DisplaySubPipeline(c) => c,
            EditCommand::DisplayPreviousPipeline(c) => c,
        }
    }

    pub fn execute(&self, om: &mut ObjectModel) {
        self.command().execute(om);
    }

    pub fn undo(&self, om: &mut ObjectModel) {
        self.command().undo(om);
    }

    pub fn redo(&self, om: &mut ObjectModel) {
        self.command().redo(om);
    }

    pub fn label(&self) -> &'static str {
        self.command().label()
    }
}

/// Linear undo history. Executing a new command discards the redo tail.
pub struct CommandStack {
    /// Oldest first; the front is dropped past `max_depth`.
    undo_stack: VecDeque<EditCommand>,
    redo_stack: Vec<EditCommand>,
    /// Maximum undo depth.
    max_depth: usize,
}

impl CommandStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::with_capacity(max_depth.min(64)),
            redo_stack: Vec::new(),
            max_depth,
        }
    }

    /// Execute a command and push it to the undo stack. Observers get at
    /// most one selection-change notification for the whole command.
    pub fn execute(&mut self, om: &mut ObjectModel, cmd: EditCommand) {
        log::debug!("execute: {}", cmd.label());
        om.execute_with_selection_change(|om| cmd.execute(om));

        self.undo_stack.push_back(cmd);
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }

        // Clear redo stack on new action
        self.redo_stack.clear();
    }

    /// Undo the last command. Returns its label.
    pub fn undo(&mut self, om: &mut ObjectModel) -> Option<String> {
        let cmd = self.undo_stack.pop_back()?;
        log::debug!("undo: {}", cmd.label());
        om.execute_with_selection_change(|om| cmd.undo(om));
        let label = cmd.label().to_string();
        self.redo_stack.push(cmd);
        Some(label)
    }

    /// Redo the last undone command. Returns its label.
    pub fn redo(&mut self, om: &mut ObjectModel) -> Option<String> {
        let cmd = self.redo_stack.pop()?;
        log::debug!("redo: {}", cmd.label());
        om.execute_with_selection_change(|om| cmd.redo(om));
        let label = cmd.label().to_string();
        self.undo_stack.push_back(cmd);
        Some(label)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_label(&self) -> Option<&'static str> {
        self.undo_stack.back().map(EditCommand::label)
    }

    pub fn redo_label(&self) -> Option<&'static str> {
        self.redo_stack.last().map(EditCommand::label)
    }

    /// Forget all history, e.g. after a new document is loaded.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fc_core::*;

    fn model() -> (ObjectModel, ObjectId) {
        let mut om = ObjectModel::with_id_generator(
            CanvasConfig::default(),
            Box::new(SequentialIdGenerator::with_prefix("cmd.")),
        );
        let pid = om.primary_pipeline_id();
        om.api_pipeline(pid)
            .add_node(Node::new("cmd_a", NodeType::ExecutionNode));
        (om, pid)
    }

    fn node_x(om: &ObjectModel, pid: ObjectId) -> f64 {
        om.store()
            .get_node(pid, ObjectId::intern("cmd_a"))
            .map_or(f64::NAN, |n| n.x_pos)
    }

    fn move_a(om: &mut ObjectModel, pid: ObjectId, dx: f64) -> EditCommand {
        let cmd = MoveObjects::new(om, pid, vec![ObjectId::intern("cmd_a")], dx, 0.0);
        EditCommand::MoveObjects(cmd.unwrap())
    }

    #[test]
    fn undo_redo_move() {
        let (mut om, pid) = model();
        let mut stack = CommandStack::new(100);

        let cmd = move_a(&mut om, pid, 50.0);
        stack.execute(&mut om, cmd);
        assert_eq!(node_x(&om, pid), 50.0);

        let desc = stack.undo(&mut om);
        assert_eq!(desc.as_deref(), Some("Move objects"));
        assert_eq!(node_x(&om, pid), 0.0);

        let desc = stack.redo(&mut om);
        assert_eq!(desc.as_deref(), Some("Move objects"));
        assert_eq!(node_x(&om, pid), 50.0);
    }

    #[test]
    fn redo_clears_on_new_action() {
        let (mut om, pid) = model();
        let mut stack = CommandStack::new(100);

        let cmd = move_a(&mut om, pid, 5.0);
        stack.execute(&mut om, cmd);
        stack.undo(&mut om);
        assert!(stack.can_redo());

        // New action clears redo
        let cmd = move_a(&mut om, pid, 1.0);
        stack.execute(&mut om, cmd);
        assert!(!stack.can_redo());
    }

    #[test]
    fn max_depth_trims_oldest() {
        let (mut om, pid) = model();
        let mut stack = CommandStack::new(3);

        for i in 0..5 {
            let cmd = move_a(&mut om, pid, (i + 1) as f64);
            stack.execute(&mut om, cmd);
        }
        // Only 3 entries remain
        let mut undo_count = 0;
        while stack.undo(&mut om).is_some() {
            undo_count += 1;
        }
        assert_eq!(undo_count, 3);
        // 1 + 2 stay applied.
        assert_eq!(node_x(&om, pid), 3.0);

        // The kept entries replay newest last.
        while stack.redo(&mut om).is_some() {}
        assert_eq!(node_x(&om, pid), 15.0);
        assert_eq!(stack.undo_label(), Some("Move objects"));
    }

    #[test]
    fn empty_stack_is_a_no_op() {
        let (mut om, _) = model();
        let mut stack = CommandStack::new(10);
        assert!(!stack.can_undo());
        assert_eq!(stack.undo(&mut om), None);
        assert_eq!(stack.redo(&mut om), None);
        assert_eq!(stack.undo_label(), None);
    }
}
