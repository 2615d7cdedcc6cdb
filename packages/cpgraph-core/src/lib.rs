//! Incremental construction of a code property graph from per-method IR.
//!
//! The crate receives one [`ir::UnitGraph`] per analyzed method from an
//! external frontend, stages graph changes in mergeable [`model::DeltaGraph`]
//! batches, stitches interprocedural CALL edges with the help of a
//! session-wide [`cache::BuildCache`] and an external [`oracle::CallGraphOracle`],
//! and commits every batch atomically through the [`driver::GraphDriver`]
//! storage port.
//!
//! Processing order does not matter: calls into methods that have not been
//! built yet are parked in the cache and reconnected once the callee
//! appears, so re-analysis and out-of-order builds converge to the same
//! graph. A failing method yields its partial delta and a report entry, and
//! the build moves on.

pub mod cache;
pub mod driver;
pub mod ir;
pub mod model;
pub mod oracle;
pub mod passes;
pub mod pipeline;

pub use cache::BuildCache;
pub use driver::{
    DriverError, DriverResult, DumpedEdge, DumpedVertex, GraphDriver, GraphDump, InMemoryDriver,
};
pub use ir::{AssignValue, CallSite, MethodSignature, Statement, UnitGraph};
pub use model::{
    keys, Change, DeltaGraph, DeltaGraphBuilder, Edge, EdgeLabel, PropertyValue, ReferentialError,
    ValueKind, Vertex, VertexHandle, VertexId, VertexLabel,
};
pub use oracle::{CallGraphOracle, StaticCallOracle};
pub use passes::{CallGraphPass, CallSitePass, PassOutcome, ProcessingError, UnitGraphPass};
pub use pipeline::{BuildPipeline, PipelineConfig, PipelineReport, UnitReport};
