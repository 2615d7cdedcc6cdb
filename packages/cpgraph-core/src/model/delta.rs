//! Mergeable batches of staged graph changes.
//!
//! A pass accumulates vertex and edge additions in a [`DeltaGraphBuilder`]
//! and seals them into an immutable [`DeltaGraph`], which the pipeline
//! merges with the deltas of other passes over the same unit and commits
//! as one batch. Staging order is preserved end to end so a driver can
//! resolve every edge endpoint by replaying the batch front to back.

use rustc_hash::FxHashSet;
use thiserror::Error;

use super::vertex::{handle_key, EdgeLabel, Vertex, VertexHandle};

/// Edge addition referencing an endpoint that is neither persisted nor
/// staged ahead of it. Fatal to the delta under construction; the edge is
/// not staged.
#[derive(Debug, Error)]
#[error("{endpoint} of {label} edge resolves to neither a persisted nor a staged vertex")]
pub struct ReferentialError {
    pub label: EdgeLabel,
    /// Which endpoint failed to resolve ("source" or "target").
    pub endpoint: &'static str,
}

/// A directed, labelled edge between two vertex handles.
#[derive(Debug, Clone)]
pub struct Edge {
    pub source: VertexHandle,
    pub target: VertexHandle,
    pub label: EdgeLabel,
}

/// One staged change.
#[derive(Debug, Clone)]
pub enum Change {
    VertexAdd(VertexHandle),
    EdgeAdd(Edge),
}

/// Sealed, immutable batch of staged changes from one pass execution.
#[derive(Debug, Clone, Default)]
pub struct DeltaGraph {
    changes: Vec<Change>,
}

impl DeltaGraph {
    pub fn builder() -> DeltaGraphBuilder {
        DeltaGraphBuilder::new()
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn vertex_adds(&self) -> impl Iterator<Item = &VertexHandle> {
        self.changes.iter().filter_map(|c| match c {
            Change::VertexAdd(v) => Some(v),
            Change::EdgeAdd(_) => None,
        })
    }

    pub fn edge_adds(&self) -> impl Iterator<Item = &Edge> {
        self.changes.iter().filter_map(|c| match c {
            Change::EdgeAdd(e) => Some(e),
            Change::VertexAdd(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Order-preserving concatenation: all of `self`, then all of `other`.
    /// No deduplication is performed; callers avoid re-adding elements.
    pub fn merge(mut self, other: DeltaGraph) -> DeltaGraph {
        self.changes.extend(other.changes);
        self
    }
}

/// Accumulates changes and validates edge endpoints as they are added.
#[derive(Debug, Default)]
pub struct DeltaGraphBuilder {
    changes: Vec<Change>,
    staged: FxHashSet<usize>,
}

impl DeltaGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the vertices staged by an earlier delta resolvable from this
    /// builder. Only legal when that delta is merged ahead of the one built
    /// here, so the combined batch still stages every endpoint before any
    /// edge that uses it.
    pub fn import_staged(&mut self, earlier: &DeltaGraph) {
        for vertex in earlier.vertex_adds() {
            self.staged.insert(handle_key(vertex));
        }
    }

    /// Stage a vertex addition and return its shared handle.
    pub fn add_vertex(&mut self, vertex: Vertex) -> VertexHandle {
        let handle: VertexHandle = std::sync::Arc::new(vertex);
        self.staged.insert(handle_key(&handle));
        self.changes.push(Change::VertexAdd(handle.clone()));
        handle
    }

    /// Whether `vertex` would be a valid edge endpoint for this builder.
    pub fn resolves(&self, vertex: &VertexHandle) -> bool {
        vertex.is_persisted() || self.staged.contains(&handle_key(vertex))
    }

    /// Stage an edge addition. Fails without side effect when an endpoint
    /// is neither persisted nor staged.
    pub fn add_edge(
        &mut self,
        source: &VertexHandle,
        target: &VertexHandle,
        label: EdgeLabel,
    ) -> Result<(), ReferentialError> {
        if !self.resolves(source) {
            return Err(ReferentialError {
                label,
                endpoint: "source",
            });
        }
        if !self.resolves(target) {
            return Err(ReferentialError {
                label,
                endpoint: "target",
            });
        }
        self.changes.push(Change::EdgeAdd(Edge {
            source: source.clone(),
            target: target.clone(),
            label,
        }));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Seal the accumulated changes.
    pub fn build(self) -> DeltaGraph {
        DeltaGraph {
            changes: self.changes,
        }
    }
}
