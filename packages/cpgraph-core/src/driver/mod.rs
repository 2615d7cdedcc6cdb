//! Storage driver port.
//!
//! Every backend exposes the same four operations: vertex existence, edge
//! existence, property lookup and atomic batch apply. The build engine is
//! generic over this trait and nothing else; answers always reflect
//! durable state, never the session cache.

mod memory;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::{DeltaGraph, EdgeLabel, PropertyValue, VertexHandle, VertexId, VertexLabel};

pub use memory::InMemoryDriver;

#[derive(Debug, Error)]
pub enum DriverError {
    /// Batch commit failed; the whole batch rolled back, nothing from it is
    /// visible and no staged vertex received an id.
    #[error("delta apply failed: {0}")]
    Apply(String),
    /// A read operation failed.
    #[error("driver query failed: {0}")]
    Query(String),
    /// Failure in the underlying backend.
    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

pub trait GraphDriver: Send + Sync {
    /// Whether `vertex` is present in durable state. Unpersisted handles
    /// are never present.
    fn exists_vertex(&self, vertex: &VertexHandle) -> DriverResult<bool>;

    /// Whether a `label` edge from `source` to `target` is present in
    /// durable state.
    fn exists_edge(
        &self,
        source: &VertexHandle,
        target: &VertexHandle,
        label: EdgeLabel,
    ) -> DriverResult<bool>;

    /// Vertices of `label` whose property `name` equals `value`.
    fn vertices_by_property(
        &self,
        name: &str,
        value: &PropertyValue,
        label: VertexLabel,
    ) -> DriverResult<Vec<VertexHandle>>;

    /// Commit a sealed delta atomically. On success every staged vertex has
    /// received its durable id and the newly persisted handles are
    /// returned; on failure nothing from the batch is visible.
    fn apply_delta(&self, delta: &DeltaGraph) -> DriverResult<Vec<VertexHandle>>;
}

/// Flat snapshot of a persisted graph. Not part of the driver contract;
/// concrete backends produce it to feed read-only exports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDump {
    pub vertices: Vec<DumpedVertex>,
    pub edges: Vec<DumpedEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DumpedVertex {
    pub id: VertexId,
    pub label: VertexLabel,
    pub properties: BTreeMap<String, PropertyValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DumpedEdge {
    pub source: VertexId,
    pub target: VertexId,
    pub label: EdgeLabel,
}
