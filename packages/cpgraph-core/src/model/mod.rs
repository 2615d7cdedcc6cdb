//! Graph domain model: property values, vertices, edges and delta batches.

mod delta;
mod property;
mod vertex;

pub use delta::{Change, DeltaGraph, DeltaGraphBuilder, Edge, ReferentialError};
pub use property::{PropertyValue, ValueKind};
pub use vertex::{keys, EdgeLabel, Vertex, VertexHandle, VertexId, VertexLabel};
