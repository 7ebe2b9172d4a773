//! Identities, target ids, patches and the rendered-node snapshot
use crate::fingerprint::Fingerprint;
use crate::props::Props;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Explicit user-supplied key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{}", i),
            Key::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Int(i as i64)
    }
}

/// Node identity across rebuild cycles.
///
/// `Instance` tokens are minted per widget snapshot and are only stable for
/// as long as the caller keeps reusing that snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    Keyed(Key),
    Instance(Uuid),
}

impl Identity {
    pub fn generate() -> Self {
        Identity::Instance(Uuid::new_v4())
    }

    pub fn key(key: impl Into<Key>) -> Self {
        Identity::Keyed(key.into())
    }

    pub fn is_keyed(&self) -> bool {
        matches!(self, Identity::Keyed(_))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Keyed(key) => write!(f, "key:{}", key),
            Identity::Instance(id) => write!(f, "instance:{}", id),
        }
    }
}

impl From<Key> for Identity {
    fn from(key: Key) -> Self {
        Identity::Keyed(key)
    }
}

/// Token addressing a node on the render surface (an element id for DOM consumers).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(s: &str) -> Self {
        TargetId(s.to_string())
    }
}

impl From<String> for TargetId {
    fn from(s: String) -> Self {
        TargetId(s)
    }
}

impl AsRef<str> for TargetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Monotonic target id source. Ids are never recycled.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    prefix: String,
    count: u64,
}

impl IdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        IdGenerator {
            prefix: prefix.into(),
            count: 0,
        }
    }

    pub fn next_id(&mut self) -> TargetId {
        self.count += 1;
        TargetId(format!("{}{}", self.prefix, self.count))
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.count
    }
}

/// Patch action enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PatchAction {
    Insert,
    Remove,
    Update,
    Move,
}

impl fmt::Display for PatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PatchAction::Insert => "INSERT",
            PatchAction::Remove => "REMOVE",
            PatchAction::Update => "UPDATE",
            PatchAction::Move => "MOVE",
        })
    }
}

/// One mutation for the patch consumer.
///
/// `data` by action:
/// - INSERT: `{"stub", "parent_id", "props", "before_id"}`
/// - UPDATE: `{"props", "changed"}`, the full new props and the sorted changed keys
/// - MOVE: `{"parent_id", "before_id"}`
/// - REMOVE: `{}`; the consumer detaches the whole subtree
///
/// `before_id` is the sibling to insert before, `null` to append.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Patch {
    pub action: PatchAction,
    pub target_id: TargetId,
    pub data: serde_json::Value,
}

impl Patch {
    pub fn insert(
        target_id: TargetId,
        stub: String,
        parent_id: &TargetId,
        props: &Props,
        before_id: Option<&TargetId>,
    ) -> Self {
        Patch {
            action: PatchAction::Insert,
            target_id,
            data: serde_json::json!({
                "stub": stub,
                "parent_id": parent_id,
                "props": props,
                "before_id": before_id,
            }),
        }
    }

    pub fn update(target_id: TargetId, props: &Props, changed: Vec<String>) -> Self {
        Patch {
            action: PatchAction::Update,
            target_id,
            data: serde_json::json!({ "props": props, "changed": changed }),
        }
    }

    pub fn moved(target_id: TargetId, parent_id: &TargetId, before_id: Option<&TargetId>) -> Self {
        Patch {
            action: PatchAction::Move,
            target_id,
            data: serde_json::json!({ "parent_id": parent_id, "before_id": before_id }),
        }
    }

    pub fn remove(target_id: TargetId) -> Self {
        Patch {
            action: PatchAction::Remove,
            target_id,
            data: serde_json::json!({}),
        }
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.data.get("parent_id").and_then(|v| v.as_str())
    }

    pub fn before_id(&self) -> Option<&str> {
        self.data.get("before_id").and_then(|v| v.as_str())
    }
}

/// Last-rendered snapshot of a node. Holds no reference to the widget itself.
#[derive(Debug, Clone)]
pub struct RenderedNode {
    pub identity: Identity,
    pub target_id: TargetId,
    pub widget_type: String,
    pub props: Props,
    pub fingerprint: Fingerprint,
    pub parent_target_id: TargetId,
    pub children: Vec<Identity>,
}

/// Callback name surfaced by a node's props, for the application's event router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallbackBinding {
    pub target_id: TargetId,
    pub event: String,
}

/// Output of one reconcile cycle.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ReconciliationResult {
    pub patches: Vec<Patch>,
    /// CSS class identifier -> widget type that first required it.
    pub active_css_classes: IndexMap<String, String>,
    /// Callback name -> node and event it is bound to.
    pub registered_callbacks: IndexMap<String, CallbackBinding>,
}

impl ReconciliationResult {
    pub fn count(&self, action: PatchAction) -> usize {
        self.patches.iter().filter(|p| p.action == action).count()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}
