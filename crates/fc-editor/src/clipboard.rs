//! Clipboard for cut/copy/paste.
//!
//! Content is stored as a JSON text blob under a fixed key, so any
//! string-keyed storage (browser local storage, a file, a map) can back it.

use fc_core::{CopiedObjects, FlowError};
use std::collections::HashMap;

/// Key under which copied objects are stored.
pub const CLIPBOARD_KEY: &str = "canvasClipboard";

/// String-keyed storage the clipboard is written to.
pub trait ClipboardStorage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
}

/// Process-local storage. The default for a new controller.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    entries: HashMap<String, String>,
}

impl ClipboardStorage for MemoryClipboard {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }
}

pub fn write_objects(storage: &mut dyn ClipboardStorage, objects: &CopiedObjects) -> Result<(), FlowError> {
    let json = serde_json::to_string(objects)?;
    storage.set(CLIPBOARD_KEY, json);
    Ok(())
}

/// Read back copied objects. An empty clipboard reads as no objects;
/// missing `nodes`, `comments`, `links` or `pipelines` default to empty.
pub fn read_objects(storage: &dyn ClipboardStorage) -> Result<CopiedObjects, FlowError> {
    match storage.get(CLIPBOARD_KEY) {
        Some(text) if !text.trim().is_empty() => Ok(serde_json::from_str(&text)?),
        _ => Ok(CopiedObjects::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fc_core::{Bounds, Comment};
    use pretty_assertions::assert_eq;

    #[test]
    fn write_then_read() {
        let mut storage = MemoryClipboard::default();
        let objects = CopiedObjects {
            comments: vec![Comment::new("clip_c", "note", Bounds::new(1.0, 2.0, 3.0, 4.0))],
            ..Default::default()
        };
        write_objects(&mut storage, &objects).unwrap();
        assert_eq!(read_objects(&storage).unwrap(), objects);
    }

    #[test]
    fn partial_content_is_accepted() {
        let mut storage = MemoryClipboard::default();
        storage.set(
            CLIPBOARD_KEY,
            r#"{"comments":[{"id":"clip_only","content":"x","x_pos":0,"y_pos":0,"width":10,"height":10}]}"#.into(),
        );
        let objects = read_objects(&storage).unwrap();
        assert!(objects.nodes.is_empty());
        assert_eq!(objects.comments.len(), 1);
    }

    #[test]
    fn empty_and_garbage() {
        let mut storage = MemoryClipboard::default();
        assert!(read_objects(&storage).unwrap().is_empty());
        storage.set(CLIPBOARD_KEY, "not json".into());
        assert!(matches!(read_objects(&storage), Err(FlowError::Json(_))));
    }
}
