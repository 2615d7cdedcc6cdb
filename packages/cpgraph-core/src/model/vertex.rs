//! Typed vertices and the handles shared between cache, deltas and drivers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use super::property::PropertyValue;

/// Driver-assigned vertex identity.
pub type VertexId = i64;

/// Property names used by the build core.
pub mod keys {
    pub const FULL_NAME: &str = "FULL_NAME";
    pub const NAME: &str = "NAME";
    pub const CODE: &str = "CODE";
    pub const ORDER: &str = "ORDER";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexLabel {
    Method,
    Call,
}

impl VertexLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VertexLabel::Method => "METHOD",
            VertexLabel::Call => "CALL",
        }
    }

    pub fn parse(s: &str) -> Option<VertexLabel> {
        match s {
            "METHOD" => Some(VertexLabel::Method),
            "CALL" => Some(VertexLabel::Call),
            _ => None,
        }
    }
}

impl fmt::Display for VertexLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeLabel {
    Call,
}

impl EdgeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeLabel::Call => "CALL",
        }
    }

    pub fn parse(s: &str) -> Option<EdgeLabel> {
        match s {
            "CALL" => Some(EdgeLabel::Call),
            _ => None,
        }
    }
}

impl fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const UNASSIGNED: i64 = -1;

/// A typed, property-bearing graph vertex.
///
/// Identity lives inside the vertex: the id is unassigned while the vertex
/// is only staged, and a driver stores the durable id into it at commit
/// time. Because vertices are shared as [`VertexHandle`]s, every holder --
/// the build cache, staged deltas, the driver -- observes persistence at
/// the same moment.
#[derive(Debug)]
pub struct Vertex {
    label: VertexLabel,
    properties: BTreeMap<String, PropertyValue>,
    id: AtomicI64,
}

impl Vertex {
    pub fn new(label: VertexLabel) -> Self {
        Self {
            label,
            properties: BTreeMap::new(),
            id: AtomicI64::new(UNASSIGNED),
        }
    }

    /// Reconstruct a vertex already persisted under `id`. Drivers use this
    /// when answering property queries from durable state.
    pub fn restored(
        id: VertexId,
        label: VertexLabel,
        properties: BTreeMap<String, PropertyValue>,
    ) -> Self {
        Self {
            label,
            properties,
            id: AtomicI64::new(id),
        }
    }

    pub fn with_property(
        mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn label(&self) -> VertexLabel {
        self.label
    }

    pub fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// The durable id, once a driver has committed this vertex.
    pub fn id(&self) -> Option<VertexId> {
        match self.id.load(Ordering::Acquire) {
            UNASSIGNED => None,
            id => Some(id),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id().is_some()
    }

    /// Called by drivers when the vertex is committed.
    pub fn assign_id(&self, id: VertexId) {
        self.id.store(id, Ordering::Release);
    }
}

/// Shared reference to a staged or persisted vertex.
pub type VertexHandle = Arc<Vertex>;

/// Pointer identity of a handle, membership key for staged-vertex sets.
pub(crate) fn handle_key(handle: &VertexHandle) -> usize {
    Arc::as_ptr(handle) as usize
}
