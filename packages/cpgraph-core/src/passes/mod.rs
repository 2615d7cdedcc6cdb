//! Unit-graph passes.
//!
//! A pass consumes one unit graph and produces a delta of staged graph
//! changes. Failures are caught at this boundary: a failing pass still
//! yields whatever it accumulated, so one malformed method never aborts
//! the surrounding build.

mod call_graph;
mod call_sites;

use thiserror::Error;

use crate::driver::DriverError;
use crate::ir::{MethodSignature, UnitGraph};
use crate::model::{DeltaGraph, ReferentialError};

pub use call_graph::CallGraphPass;
pub use call_sites::CallSitePass;

/// Per-method analysis failure.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("malformed unit for {method}: {detail}")]
    MalformedUnit {
        method: MethodSignature,
        detail: String,
    },
    #[error(transparent)]
    Referential(#[from] ReferentialError),
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Outcome of one pass over one unit graph: always a delta, possibly
/// accompanied by the failure that cut the pass short.
#[derive(Debug)]
pub struct PassOutcome {
    pub delta: DeltaGraph,
    pub error: Option<ProcessingError>,
}

impl PassOutcome {
    pub fn complete(delta: DeltaGraph) -> Self {
        Self { delta, error: None }
    }

    pub fn failed(delta: DeltaGraph, error: ProcessingError) -> Self {
        Self {
            delta,
            error: Some(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

pub trait UnitGraphPass {
    fn name(&self) -> &'static str;

    /// Run over `unit`. `staged` holds the merged deltas of earlier passes
    /// on the same unit; they are committed ahead of this pass's delta, so
    /// their staged vertices are legal edge endpoints here.
    fn run_pass(&self, unit: &UnitGraph, staged: &DeltaGraph) -> PassOutcome;
}
