//! Reversible edits on top of `fc-core`: one command struct per edit, the
//! bounded undo/redo stack, the clipboard and the host-facing controller.

pub mod actions;
pub mod clipboard;
pub mod commands;
pub mod controller;

pub use clipboard::{CLIPBOARD_KEY, ClipboardStorage, MemoryClipboard};
pub use commands::{Command, CommandStack, EditCommand};
pub use controller::{CanvasController, CanvasHooks, ContextMenuAction, EditRequest, NoHooks, ObjectBounds};
