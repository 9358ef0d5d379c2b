use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Global string interner for object IDs.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// A lightweight, interned identifier for pipelines, nodes, ports, links
/// and comments. Internally a 4-byte `Spur` index, so Copy, Eq and Hash are O(1).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(Spur);

impl ObjectId {
    /// Intern a string as an ObjectId, or return the existing one.
    pub fn intern(s: &str) -> Self {
        ObjectId(INTERNER.get_or_intern(s))
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialOrd for ObjectId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Ordered by the resolved string, not by interning order, so sorted
/// output does not depend on which IDs happened to be interned first.
impl Ord for ObjectId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

/// The empty ID. Only used as a placeholder by `Default` impls.
impl Default for ObjectId {
    fn default() -> Self {
        ObjectId::intern("")
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        ObjectId::intern(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ObjectId::intern(&s))
    }
}

// ─── Generation ──────────────────────────────────────────────────────────

/// What a freshly generated ID will name. Generators may use it as a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Document,
    Node,
    Link,
    Comment,
    Pipeline,
    Port,
}

impl IdKind {
    pub fn prefix(self) -> &'static str {
        match self {
            IdKind::Document => "doc",
            IdKind::Node => "node",
            IdKind::Link => "link",
            IdKind::Comment => "comment",
            IdKind::Pipeline => "pipeline",
            IdKind::Port => "port",
        }
    }
}

/// Pluggable ID strategy. A host application can install its own
/// generator on the object model to control how new IDs look.
pub trait IdGenerator {
    fn generate(&mut self, kind: IdKind) -> String;
}

/// Random v4 UUIDs. The default strategy.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate(&mut self, _kind: IdKind) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic `<prefix><kind>_<n>` IDs (e.g. `node_1`, `c2.link_7`),
/// counted separately per kind.
///
/// Counters live on the instance, so two canvases (or two test cases)
/// never share a sequence.
#[derive(Debug, Clone, Default)]
pub struct SequentialIdGenerator {
    prefix: String,
    counters: HashMap<IdKind, u64>,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// IDs are prefixed with `prefix`, e.g. a per-controller instance tag.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counters: HashMap::new(),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&mut self, kind: IdKind) -> String {
        let n = self.counters.entry(kind).or_insert(0);
        *n += 1;
        format!("{}{}_{}", self.prefix, kind.prefix(), n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_roundtrip() {
        let a = ObjectId::intern("exec_node_1");
        let b = ObjectId::intern("exec_node_1");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "exec_node_1");
    }

    #[test]
    fn sequential_ids_are_unique_per_instance() {
        let mut ids = SequentialIdGenerator::new();
        let a = ids.generate(IdKind::Node);
        let b = ids.generate(IdKind::Node);
        assert_eq!(a, "node_1");
        assert_eq!(b, "node_2");
        assert_eq!(ids.generate(IdKind::Link), "link_1");

        let mut other = SequentialIdGenerator::with_prefix("c2.");
        assert_eq!(other.generate(IdKind::Link), "c2.link_1");
    }

    #[test]
    fn uuid_ids_differ() {
        let mut ids = UuidIdGenerator;
        assert_ne!(ids.generate(IdKind::Comment), ids.generate(IdKind::Comment));
    }

    #[test]
    fn ordering_follows_string_value() {
        let z = ObjectId::intern("zz_ordering");
        let a = ObjectId::intern("aa_ordering");
        assert!(a < z);
    }
}
