//! Host-facing canvas controller.
//!
//! The embedding host describes an edit as an [`EditRequest`] (or its JSON
//! form, tagged by `editType`) and hands it to
//! [`CanvasController::edit_action_handler`]. The controller resolves the
//! target pipeline, builds the matching [`EditCommand`] and runs it through
//! the [`CommandStack`]. Host hooks see every request before it runs (and
//! may veto or rewrite it), every request after it ran, and every
//! selection change.

use crate::actions::*;
use crate::clipboard::{self, ClipboardStorage, MemoryClipboard};
use crate::commands::{CommandStack, EditCommand};
use fc_core::{
    Bounds, CanvasConfig, FlowError, LayoutDirection, LinkEnd, Message, Node, ObjectId, ObjectModel,
    Point, SelectionChange,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

// ─── Requests ────────────────────────────────────────────────────────────

/// New bounds for one node or comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectBounds {
    pub id: ObjectId,
    #[serde(flatten)]
    pub bounds: Bounds,
}

/// One edit, as sent by the host. `pipeline_id` defaults to the pipeline
/// currently on display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "editType", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EditRequest {
    CreateNode {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        node_template: Node,
        x: f64,
        y: f64,
    },
    CreateAutoNode {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        node_template: Node,
    },
    CreateNodeOnLink {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        node_template: Node,
        link_id: ObjectId,
        x: f64,
        y: f64,
    },
    CreateNodeAttachLinks {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        node_template: Node,
        x: f64,
        y: f64,
    },
    AttachNodeToLinks {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        node_id: ObjectId,
        #[serde(default)]
        dx: f64,
        #[serde(default)]
        dy: f64,
    },
    CreateComment {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        x: f64,
        y: f64,
        #[serde(default)]
        content: String,
        /// Nodes the new comment is linked to.
        #[serde(default)]
        node_ids: Vec<ObjectId>,
    },
    EditComment {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        id: ObjectId,
        content: String,
        #[serde(default)]
        width: Option<f64>,
        #[serde(default)]
        height: Option<f64>,
    },
    LinkNodes {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        srcs: Vec<LinkEnd>,
        trgs: Vec<LinkEnd>,
    },
    LinkComment {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        comment_ids: Vec<ObjectId>,
        node_ids: Vec<ObjectId>,
    },
    UpdateLink {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        link_id: ObjectId,
        #[serde(default)]
        src: Option<LinkEnd>,
        #[serde(default)]
        trg: Option<LinkEnd>,
    },
    DeleteLink {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        link_id: ObjectId,
    },
    DeleteObjects {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        ids: Vec<ObjectId>,
    },
    DeleteSelectedObjects,
    DisconnectNodes {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        ids: Vec<ObjectId>,
    },
    MoveObjects {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        ids: Vec<ObjectId>,
        dx: f64,
        dy: f64,
    },
    ResizeObjects {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        objects: Vec<ObjectBounds>,
    },
    SetNodeLabel {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        node_id: ObjectId,
        label: String,
    },
    SetNodeParameters {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        node_id: ObjectId,
        parameters: Value,
        #[serde(default)]
        messages: Vec<Message>,
    },
    SetObjectsStyle {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        ids: Vec<ObjectId>,
        #[serde(default)]
        style: Option<Value>,
        #[serde(default)]
        temporary: bool,
    },
    SetLinksStyle {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        ids: Vec<ObjectId>,
        #[serde(default)]
        style: Option<Value>,
        #[serde(default)]
        temporary: bool,
    },
    /// With no `ids`, the current selection becomes the supernode.
    CreateSuperNode {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        #[serde(default)]
        ids: Vec<ObjectId>,
    },
    DeconstructSuperNode {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        node_id: ObjectId,
    },
    ExpandSuperNodeInPlace {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        node_id: ObjectId,
    },
    CollapseSuperNodeInPlace {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        node_id: ObjectId,
    },
    ArrangeHorizontally {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
    },
    ArrangeVertically {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
    },
    Cut,
    Copy,
    Paste {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        #[serde(default)]
        position: Option<Point>,
    },
    Undo,
    Redo,
    SelectAll {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
    },
    DeselectAll,
    DisplaySubPipeline {
        #[serde(default)]
        pipeline_id: Option<ObjectId>,
        node_id: ObjectId,
    },
    DisplayPreviousPipeline,
}

impl EditRequest {
    pub fn from_json(json: &str) -> Result<Self, FlowError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Structural edits offered on the canvas context menu. They act on the
/// current selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ContextMenuAction {
    CreateSuperNode,
    DeconstructSuperNode { node_id: ObjectId },
    ExpandSuperNodeInPlace { node_id: ObjectId },
    CollapseSuperNodeInPlace { node_id: ObjectId },
    DeleteObjects,
    DisconnectNodes,
    SelectAll,
    Undo,
    Redo,
    Cut,
    Copy,
    Paste,
}

// ─── Hooks ───────────────────────────────────────────────────────────────

/// Host callbacks. All methods have no-op defaults.
pub trait CanvasHooks {
    /// Called before an edit runs. Return `None` to cancel it, or a
    /// different request to run instead.
    fn before_edit_action(&mut self, request: EditRequest) -> Option<EditRequest> {
        Some(request)
    }

    /// Called after an edit ran. `label` names the command that was
    /// executed, undone or redone, and is `None` when nothing changed.
    fn edit_action_handler(&mut self, _request: &EditRequest, _label: Option<&str>) {}

    fn selection_change_handler(&mut self, _change: &SelectionChange) {}
}

/// Hooks that accept everything and observe nothing.
#[derive(Debug, Default)]
pub struct NoHooks;

impl CanvasHooks for NoHooks {}

// ─── Controller ──────────────────────────────────────────────────────────

pub struct CanvasController {
    instance_id: u32,
    om: ObjectModel,
    stack: CommandStack,
    clipboard: Box<dyn ClipboardStorage>,
    hooks: Box<dyn CanvasHooks>,
    /// Visible canvas area, used to place pasted content.
    viewport: Option<Bounds>,
    selection_events: Rc<RefCell<Vec<SelectionChange>>>,
}

impl CanvasController {
    pub fn new(instance_id: u32, config: CanvasConfig) -> Self {
        Self::with_object_model(instance_id, ObjectModel::new(config))
    }

    pub fn with_object_model(instance_id: u32, mut om: ObjectModel) -> Self {
        let selection_events: Rc<RefCell<Vec<SelectionChange>>> = Rc::default();
        let queue = Rc::clone(&selection_events);
        om.set_selection_change_handler(Box::new(move |change: &SelectionChange| {
            queue.borrow_mut().push(change.clone());
        }));
        let stack = CommandStack::new(om.config().undo_depth);
        Self {
            instance_id,
            om,
            stack,
            clipboard: Box::new(MemoryClipboard::default()),
            hooks: Box::new(NoHooks),
            viewport: None,
            selection_events,
        }
    }

    pub fn instance_id(&self) -> u32 {
        self.instance_id
    }

    pub fn object_model(&self) -> &ObjectModel {
        &self.om
    }

    /// Direct access for reads and non-undoable changes. Selection changes
    /// made here reach the hooks on the next controller call.
    pub fn object_model_mut(&mut self) -> &mut ObjectModel {
        &mut self.om
    }

    pub fn set_hooks(&mut self, hooks: Box<dyn CanvasHooks>) {
        self.hooks = hooks;
    }

    pub fn set_clipboard(&mut self, clipboard: Box<dyn ClipboardStorage>) {
        self.clipboard = clipboard;
    }

    pub fn set_viewport(&mut self, viewport: Option<Bounds>) {
        self.viewport = viewport;
    }

    /// Load a pipeline-flow document. Undo history does not survive it.
    pub fn set_pipeline_flow(&mut self, json: &str) -> Result<(), FlowError> {
        self.om.set_pipeline_flow(json)?;
        self.stack.clear();
        self.flush_selection_events();
        Ok(())
    }

    pub fn get_pipeline_flow_json(&self) -> Result<String, FlowError> {
        self.om.get_pipeline_flow_json()
    }

    pub fn set_selections(&mut self, ids: Vec<ObjectId>, pipeline_id: ObjectId) {
        self.om.set_selections(ids, pipeline_id);
        self.flush_selection_events();
    }

    pub fn can_undo(&self) -> bool {
        self.stack.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.stack.can_redo()
    }

    pub fn undo_label(&self) -> Option<&'static str> {
        self.stack.undo_label()
    }

    pub fn redo_label(&self) -> Option<&'static str> {
        self.stack.redo_label()
    }

    pub fn undo(&mut self) {
        self.edit_action_handler(EditRequest::Undo);
    }

    pub fn redo(&mut self) {
        self.edit_action_handler(EditRequest::Redo);
    }

    pub fn edit_action_handler_json(&mut self, json: &str) -> Result<(), FlowError> {
        let request = EditRequest::from_json(json)?;
        self.edit_action_handler(request);
        Ok(())
    }

    pub fn edit_action_handler(&mut self, request: EditRequest) {
        let Some(request) = self.hooks.before_edit_action(request) else {
            log::debug!("[canvas {}] edit cancelled by host", self.instance_id);
            return;
        };
        let label = self.apply(&request);
        self.flush_selection_events();
        self.hooks.edit_action_handler(&request, label.as_deref());
    }

    pub fn context_menu_action_handler(&mut self, action: ContextMenuAction) {
        let request = match action {
            ContextMenuAction::CreateSuperNode => EditRequest::CreateSuperNode {
                pipeline_id: self.om.get_selection_pipeline_id(),
                ids: Vec::new(),
            },
            ContextMenuAction::DeconstructSuperNode { node_id } => EditRequest::DeconstructSuperNode {
                pipeline_id: None,
                node_id,
            },
            ContextMenuAction::ExpandSuperNodeInPlace { node_id } => EditRequest::ExpandSuperNodeInPlace {
                pipeline_id: None,
                node_id,
            },
            ContextMenuAction::CollapseSuperNodeInPlace { node_id } => EditRequest::CollapseSuperNodeInPlace {
                pipeline_id: None,
                node_id,
            },
            ContextMenuAction::DeleteObjects => EditRequest::DeleteSelectedObjects,
            ContextMenuAction::DisconnectNodes => EditRequest::DisconnectNodes {
                pipeline_id: self.om.get_selection_pipeline_id(),
                ids: self.om.get_selected_object_ids().to_vec(),
            },
            ContextMenuAction::SelectAll => EditRequest::SelectAll { pipeline_id: None },
            ContextMenuAction::Undo => EditRequest::Undo,
            ContextMenuAction::Redo => EditRequest::Redo,
            ContextMenuAction::Cut => EditRequest::Cut,
            ContextMenuAction::Copy => EditRequest::Copy,
            ContextMenuAction::Paste => EditRequest::Paste {
                pipeline_id: None,
                position: None,
            },
        };
        self.edit_action_handler(request);
    }

    fn flush_selection_events(&mut self) {
        let events = std::mem::take(&mut *self.selection_events.borrow_mut());
        for change in &events {
            self.hooks.selection_change_handler(change);
        }
    }

    /// Run one request. Returns the label of the command that changed the
    /// document, if any.
    fn apply(&mut self, request: &EditRequest) -> Option<String> {
        let cmd = match request {
            EditRequest::Undo => return self.stack.undo(&mut self.om),
            EditRequest::Redo => return self.stack.redo(&mut self.om),
            EditRequest::Copy => {
                self.copy_selection();
                return None;
            }
            EditRequest::Cut => {
                let (pid, ids) = self.copy_selection()?;
                EditCommand::DeleteObjects(DeleteObjects::new(&self.om, pid, &ids)?)
            }
            EditRequest::SelectAll { pipeline_id } => {
                let pid = self.resolve(*pipeline_id)?;
                self.om.select_all(pid);
                return None;
            }
            EditRequest::DeselectAll => {
                self.om.deselect_all();
                return None;
            }
            other => self.build_command(other)?,
        };
        let label = cmd.label().to_string();
        log::debug!("[canvas {}] {label}", self.instance_id);
        self.stack.execute(&mut self.om, cmd);
        Some(label)
    }

    /// The pipeline a request targets. An unknown pipeline is a caller
    /// error and the request is dropped.
    fn resolve(&self, pipeline_id: Option<ObjectId>) -> Option<ObjectId> {
        let pid = pipeline_id.unwrap_or_else(|| self.om.get_current_pipeline_id());
        if self.om.pipeline(pid).is_none() {
            log::error!("[canvas {}] edit for unknown pipeline '{pid}'", self.instance_id);
            return None;
        }
        Some(pid)
    }

    fn selection(&self) -> Option<(ObjectId, Vec<ObjectId>)> {
        let pid = self.om.get_selection_pipeline_id()?;
        Some((pid, self.om.get_selected_object_ids().to_vec()))
    }

    /// Write the selection to the clipboard and return what was copied.
    fn copy_selection(&mut self) -> Option<(ObjectId, Vec<ObjectId>)> {
        let (pid, ids) = self.selection()?;
        let copied = self.om.copy_objects(pid, &ids);
        if copied.is_empty() {
            return None;
        }
        if let Err(err) = clipboard::write_objects(self.clipboard.as_mut(), &copied) {
            log::error!("[canvas {}] clipboard write failed: {err}", self.instance_id);
            return None;
        }
        Some((pid, ids))
    }

    fn build_command(&mut self, request: &EditRequest) -> Option<EditCommand> {
        let cmd = match request {
            EditRequest::CreateNode {
                pipeline_id,
                node_template,
                x,
                y,
            } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::CreateNode(CreateNode::new(&mut self.om, pid, node_template, *x, *y))
            }
            EditRequest::CreateAutoNode {
                pipeline_id,
                node_template,
            } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::CreateAutoNode(CreateAutoNode::new(&mut self.om, pid, node_template))
            }
            EditRequest::CreateNodeOnLink {
                pipeline_id,
                node_template,
                link_id,
                x,
                y,
            } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::CreateNodeOnLink(CreateNodeOnLink::new(
                    &mut self.om,
                    pid,
                    *link_id,
                    node_template,
                    *x,
                    *y,
                )?)
            }
            EditRequest::CreateNodeAttachLinks {
                pipeline_id,
                node_template,
                x,
                y,
            } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::CreateNodeAttachLinks(CreateNodeAttachLinks::new(
                    &mut self.om,
                    pid,
                    node_template,
                    *x,
                    *y,
                ))
            }
            EditRequest::AttachNodeToLinks {
                pipeline_id,
                node_id,
                dx,
                dy,
            } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::AttachNodeToLinks(AttachNodeToLinks::new(&self.om, pid, *node_id, *dx, *dy)?)
            }
            EditRequest::CreateComment {
                pipeline_id,
                x,
                y,
                content,
                node_ids,
            } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::CreateComment(CreateComment::new(&mut self.om, pid, *x, *y, content, node_ids))
            }
            EditRequest::EditComment {
                pipeline_id,
                id,
                content,
                width,
                height,
            } => {
                let pid = self.resolve(*pipeline_id)?;
                let size = (*width).zip(*height);
                EditCommand::EditComment(EditComment::new(&self.om, pid, *id, content, size)?)
            }
            EditRequest::LinkNodes {
                pipeline_id,
                srcs,
                trgs,
            } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::CreateNodeLinks(CreateNodeLinks::new(&mut self.om, pid, srcs, trgs)?)
            }
            EditRequest::LinkComment {
                pipeline_id,
                comment_ids,
                node_ids,
            } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::CreateCommentLinks(CreateCommentLinks::new(&mut self.om, pid, comment_ids, node_ids)?)
            }
            EditRequest::UpdateLink {
                pipeline_id,
                link_id,
                src,
                trg,
            } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::UpdateLink(UpdateLink::new(&mut self.om, pid, *link_id, *src, *trg)?)
            }
            EditRequest::DeleteLink { pipeline_id, link_id } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::DeleteLink(DeleteLink::new(&self.om, pid, *link_id)?)
            }
            EditRequest::DeleteObjects { pipeline_id, ids } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::DeleteObjects(DeleteObjects::new(&self.om, pid, ids)?)
            }
            EditRequest::DeleteSelectedObjects => {
                let (pid, ids) = self.selection()?;
                EditCommand::DeleteObjects(DeleteObjects::new(&self.om, pid, &ids)?)
            }
            EditRequest::DisconnectNodes { pipeline_id, ids } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::DisconnectNodes(DisconnectNodes::new(&mut self.om, pid, ids)?)
            }
            EditRequest::MoveObjects {
                pipeline_id,
                ids,
                dx,
                dy,
            } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::MoveObjects(MoveObjects::new(&self.om, pid, ids.clone(), *dx, *dy)?)
            }
            EditRequest::ResizeObjects { pipeline_id, objects } => {
                let pid = self.resolve(*pipeline_id)?;
                let objects = objects.iter().map(|o| (o.id, o.bounds)).collect();
                EditCommand::SizeAndPositionObjects(SizeAndPositionObjects::new(
                    &self.om,
                    pid,
                    objects,
                    Vec::new(),
                )?)
            }
            EditRequest::SetNodeLabel {
                pipeline_id,
                node_id,
                label,
            } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::SetNodeLabel(SetNodeLabel::new(&self.om, pid, *node_id, label)?)
            }
            EditRequest::SetNodeParameters {
                pipeline_id,
                node_id,
                parameters,
                messages,
            } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::SetNodeParameters(SetNodeParameters::new(
                    &self.om,
                    pid,
                    *node_id,
                    parameters.clone(),
                    messages.clone(),
                )?)
            }
            EditRequest::SetObjectsStyle {
                pipeline_id,
                ids,
                style,
                temporary,
            } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::SetObjectsStyle(SetObjectsStyle::new(&self.om, pid, ids, style.clone(), *temporary)?)
            }
            EditRequest::SetLinksStyle {
                pipeline_id,
                ids,
                style,
                temporary,
            } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::SetLinksStyle(SetLinksStyle::new(&self.om, pid, ids, style.clone(), *temporary)?)
            }
            EditRequest::CreateSuperNode { pipeline_id, ids } => {
                let pid = self.resolve(*pipeline_id)?;
                let ids = if ids.is_empty() {
                    match self.selection() {
                        Some((sel_pid, sel)) if sel_pid == pid => sel,
                        _ => return None,
                    }
                } else {
                    ids.clone()
                };
                EditCommand::CreateSuperNode(CreateSuperNode::new(&mut self.om, pid, &ids)?)
            }
            EditRequest::DeconstructSuperNode { pipeline_id, node_id } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::DeconstructSuperNode(DeconstructSuperNode::new(&mut self.om, pid, *node_id)?)
            }
            EditRequest::ExpandSuperNodeInPlace { pipeline_id, node_id } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::ExpandSuperNodeInPlace(ExpandSuperNodeInPlace::new(&self.om, pid, *node_id)?)
            }
            EditRequest::CollapseSuperNodeInPlace { pipeline_id, node_id } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::CollapseSuperNodeInPlace(CollapseSuperNodeInPlace::new(&self.om, pid, *node_id)?)
            }
            EditRequest::ArrangeHorizontally { pipeline_id } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::ArrangeLayout(ArrangeLayout::new(&mut self.om, pid, LayoutDirection::Horizontal)?)
            }
            EditRequest::ArrangeVertically { pipeline_id } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::ArrangeLayout(ArrangeLayout::new(&mut self.om, pid, LayoutDirection::Vertical)?)
            }
            EditRequest::Paste { pipeline_id, position } => {
                let pid = self.resolve(*pipeline_id)?;
                let objects = match clipboard::read_objects(self.clipboard.as_ref()) {
                    Ok(objects) => objects,
                    Err(err) => {
                        log::warn!("[canvas {}] unreadable clipboard: {err}", self.instance_id);
                        return None;
                    }
                };
                EditCommand::Paste(Paste::new(&mut self.om, pid, &objects, *position, self.viewport)?)
            }
            EditRequest::DisplaySubPipeline { pipeline_id, node_id } => {
                let pid = self.resolve(*pipeline_id)?;
                EditCommand::DisplaySubPipeline(DisplaySubPipeline::new(&self.om, pid, *node_id)?)
            }
            EditRequest::DisplayPreviousPipeline => {
                EditCommand::DisplayPreviousPipeline(DisplayPreviousPipeline::new(&self.om)?)
            }
            EditRequest::Undo
            | EditRequest::Redo
            | EditRequest::Cut
            | EditRequest::Copy
            | EditRequest::SelectAll { .. }
            | EditRequest::DeselectAll => return None,
        };
        Some(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fc_core::{NodeType, SequentialIdGenerator};
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recorded {
        labels: Vec<Option<String>>,
        selections: Vec<SelectionChange>,
    }

    struct Recorder(Rc<RefCell<Recorded>>);

    impl CanvasHooks for Recorder {
        fn before_edit_action(&mut self, request: EditRequest) -> Option<EditRequest> {
            // Renames are not allowed in this canvas.
            (!matches!(request, EditRequest::SetNodeLabel { .. })).then_some(request)
        }

        fn edit_action_handler(&mut self, _request: &EditRequest, label: Option<&str>) {
            self.0.borrow_mut().labels.push(label.map(str::to_string));
        }

        fn selection_change_handler(&mut self, change: &SelectionChange) {
            self.0.borrow_mut().selections.push(change.clone());
        }
    }

    fn controller() -> (CanvasController, Rc<RefCell<Recorded>>) {
        let om = ObjectModel::with_id_generator(
            CanvasConfig::default(),
            Box::new(SequentialIdGenerator::with_prefix("ctl.")),
        );
        let mut ctl = CanvasController::with_object_model(7, om);
        let recorded = Rc::new(RefCell::new(Recorded::default()));
        ctl.set_hooks(Box::new(Recorder(Rc::clone(&recorded))));
        (ctl, recorded)
    }

    fn template() -> Node {
        Node::new("ctl_template", NodeType::ExecutionNode)
    }

    #[test]
    fn json_request_creates_node_and_undoes() {
        let (mut ctl, recorded) = controller();
        ctl.edit_action_handler_json(
            r#"{"editType":"createNode","nodeTemplate":{"id":"ctl_template","type":"execution_node"},"x":10,"y":20}"#,
        )
        .unwrap();
        let pid = ctl.object_model().primary_pipeline_id();
        assert_eq!(ctl.object_model().store().get_nodes(pid).len(), 1);
        assert!(ctl.can_undo());

        ctl.undo();
        assert!(ctl.object_model().store().get_nodes(pid).is_empty());
        assert_eq!(
            recorded.borrow().labels,
            vec![Some("Create node".to_string()), Some("Create node".to_string())]
        );
    }

    #[test]
    fn vetoed_request_never_runs() {
        let (mut ctl, recorded) = controller();
        ctl.edit_action_handler(EditRequest::CreateNode {
            pipeline_id: None,
            node_template: template(),
            x: 0.0,
            y: 0.0,
        });
        let pid = ctl.object_model().primary_pipeline_id();
        let node_id = ctl.object_model().store().get_nodes(pid)[0].id;
        ctl.edit_action_handler(EditRequest::SetNodeLabel {
            pipeline_id: None,
            node_id,
            label: "renamed".into(),
        });
        assert_eq!(recorded.borrow().labels.len(), 1);
        assert_eq!(ctl.undo_label(), Some("Create node"));
    }

    #[test]
    fn copy_paste_through_clipboard() {
        let (mut ctl, recorded) = controller();
        ctl.edit_action_handler(EditRequest::CreateNode {
            pipeline_id: None,
            node_template: template(),
            x: 0.0,
            y: 0.0,
        });
        let pid = ctl.object_model().primary_pipeline_id();
        let original = ctl.object_model().store().get_nodes(pid)[0].id;
        ctl.set_selections(vec![original], pid);
        ctl.context_menu_action_handler(ContextMenuAction::Copy);
        ctl.context_menu_action_handler(ContextMenuAction::Paste);

        let nodes = ctl.object_model().store().get_nodes(pid);
        assert_eq!(nodes.len(), 2);
        let pasted = nodes[1].id;
        assert_eq!(ctl.object_model().get_selected_object_ids(), &[pasted]);

        let recorded = recorded.borrow();
        let last = recorded.selections.last().unwrap();
        assert_eq!(last.added_nodes.len(), 1);
        assert_eq!(last.deselected_nodes.len(), 1);
    }

    #[test]
    fn cut_removes_selection() {
        let (mut ctl, _) = controller();
        ctl.edit_action_handler(EditRequest::CreateNode {
            pipeline_id: None,
            node_template: template(),
            x: 0.0,
            y: 0.0,
        });
        let pid = ctl.object_model().primary_pipeline_id();
        let node = ctl.object_model().store().get_nodes(pid)[0].id;
        ctl.set_selections(vec![node], pid);
        ctl.edit_action_handler(EditRequest::Cut);
        assert!(ctl.object_model().store().get_nodes(pid).is_empty());
        assert!(ctl.object_model().get_selected_object_ids().is_empty());

        ctl.edit_action_handler(EditRequest::Paste {
            pipeline_id: None,
            position: Some(Point::new(300.0, 300.0)),
        });
        let nodes = ctl.object_model().store().get_nodes(pid);
        assert_eq!((nodes[0].x_pos, nodes[0].y_pos), (300.0, 300.0));
    }

    #[test]
    fn unknown_pipeline_is_dropped() {
        let (mut ctl, recorded) = controller();
        ctl.edit_action_handler(EditRequest::CreateNode {
            pipeline_id: Some(ObjectId::intern("ctl_nowhere")),
            node_template: template(),
            x: 0.0,
            y: 0.0,
        });
        assert!(!ctl.can_undo());
        assert_eq!(recorded.borrow().labels, vec![None]);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let (mut ctl, _) = controller();
        assert!(ctl.edit_action_handler_json(r#"{"editType":"flyAway"}"#).is_err());
    }
}
