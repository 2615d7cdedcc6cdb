//! Call-site projection.
//!
//! Stages a CALL vertex for every call expression that has no cache entry
//! yet and registers it under the instruction's identity, so the stitching
//! pass can find it.

use tracing::{trace, warn};

use super::{PassOutcome, ProcessingError, UnitGraphPass};
use crate::cache::BuildCache;
use crate::ir::{Statement, UnitGraph};
use crate::model::{keys, DeltaGraph, DeltaGraphBuilder, Vertex, VertexLabel};

pub struct CallSitePass<'a> {
    cache: &'a BuildCache,
}

impl<'a> CallSitePass<'a> {
    pub fn new(cache: &'a BuildCache) -> Self {
        Self { cache }
    }

    fn project(
        &self,
        unit: &UnitGraph,
        builder: &mut DeltaGraphBuilder,
    ) -> Result<(), ProcessingError> {
        for (order, statement) in unit.statements.iter().enumerate() {
            if let Statement::Invalid { reason } = statement {
                return Err(ProcessingError::MalformedUnit {
                    method: unit.method.clone(),
                    detail: reason.clone(),
                });
            }
            let Some(call) = statement.as_call() else {
                continue;
            };
            if call.id.is_empty() {
                return Err(ProcessingError::MalformedUnit {
                    method: unit.method.clone(),
                    detail: "call site without identity".to_string(),
                });
            }
            if self.cache.resolve_call(&call.id).is_some() {
                // Already projected by an earlier run over this method.
                continue;
            }
            let vertex = Vertex::new(VertexLabel::Call)
                .with_property(keys::NAME, call.name.as_str())
                .with_property(keys::CODE, call.code.as_str())
                .with_property(keys::ORDER, order as i64);
            let handle = builder.add_vertex(vertex);
            self.cache.register_call(&call.id, handle);
            trace!(call_site = %call.id, method = %unit.method, "projected call vertex");
        }
        Ok(())
    }
}

impl UnitGraphPass for CallSitePass<'_> {
    fn name(&self) -> &'static str {
        "call-site-projection"
    }

    fn run_pass(&self, unit: &UnitGraph, staged: &DeltaGraph) -> PassOutcome {
        let mut builder = DeltaGraph::builder();
        builder.import_staged(staged);
        match self.project(unit, &mut builder) {
            Ok(()) => PassOutcome::complete(builder.build()),
            Err(error) => {
                warn!(
                    method = %unit.method,
                    error = %error,
                    "unable to complete call-site projection; partial changes will be saved"
                );
                PassOutcome::failed(builder.build(), error)
            }
        }
    }
}
