//! Interprocedural call-graph stitching.
//!
//! Connects projected CALL vertices to the METHOD vertices of their
//! statically resolved targets. Targets that have not been built yet are
//! parked in the cache's incoming-call table and reconnected when their
//! method is processed, so the final graph does not depend on the order in
//! which methods arrive.

use tracing::{debug, trace, warn};

use super::{PassOutcome, ProcessingError, UnitGraphPass};
use crate::cache::BuildCache;
use crate::driver::GraphDriver;
use crate::ir::{short_name, Statement, UnitGraph};
use crate::model::{
    keys, DeltaGraph, DeltaGraphBuilder, EdgeLabel, Vertex, VertexHandle, VertexLabel,
};
use crate::oracle::CallGraphOracle;

pub struct CallGraphPass<'a, D: GraphDriver + ?Sized> {
    driver: &'a D,
    cache: &'a BuildCache,
    oracle: &'a dyn CallGraphOracle,
}

impl<'a, D: GraphDriver + ?Sized> CallGraphPass<'a, D> {
    pub fn new(driver: &'a D, cache: &'a BuildCache, oracle: &'a dyn CallGraphOracle) -> Self {
        Self {
            driver,
            cache,
            oracle,
        }
    }

    fn stitch(
        &self,
        unit: &UnitGraph,
        builder: &mut DeltaGraphBuilder,
    ) -> Result<(), ProcessingError> {
        // If this method was seen before, reconnect call edges that were
        // deferred while it did not exist.
        let head = self.method_head(&unit.method, builder)?;
        self.reconnect_incoming(&unit.method, &head, builder)?;

        for statement in &unit.statements {
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
            // Never projected as a vertex: skip silently.
            let Some(call_vertex) = self.cache.resolve_call(&call.id) else {
                continue;
            };
            if call_vertex.is_persisted() && !self.driver.exists_vertex(&call_vertex)? {
                // Stale handle from an earlier session.
                continue;
            }
            for target in self.oracle.targets_of(call) {
                self.link_target(&call_vertex, &target, builder)?;
            }
        }
        Ok(())
    }

    /// Resolve the unit's own METHOD vertex, creating and registering it
    /// when neither the cache nor the store knows the signature.
    fn method_head(
        &self,
        signature: &str,
        builder: &mut DeltaGraphBuilder,
    ) -> Result<VertexHandle, ProcessingError> {
        if let Some(head) = self.cache.resolve_method(self.driver, signature)? {
            if !head.is_persisted() || self.driver.exists_vertex(&head)? {
                return Ok(head);
            }
            // Persisted once, gone now: rebuild below.
            self.cache.invalidate_method(signature);
        }
        let vertex = Vertex::new(VertexLabel::Method)
            .with_property(keys::FULL_NAME, signature)
            .with_property(keys::NAME, short_name(signature));
        let head = builder.add_vertex(vertex);
        self.cache.register_method(signature, head.clone());
        debug!(method = %signature, "created method vertex");
        Ok(head)
    }

    fn reconnect_incoming(
        &self,
        signature: &str,
        head: &VertexHandle,
        builder: &mut DeltaGraphBuilder,
    ) -> Result<(), ProcessingError> {
        let pending = self.cache.drain_incoming_calls(signature);
        if pending.is_empty() {
            trace!(method = %signature, "no deferred incoming call edges");
            return Ok(());
        }
        debug!(
            method = %signature,
            count = pending.len(),
            "reconnecting deferred incoming call edges"
        );
        for caller in pending {
            if caller.is_persisted() {
                if !self.driver.exists_vertex(&caller)? {
                    // The caller's vertex was rebuilt away; nothing to connect.
                    continue;
                }
                if head.is_persisted()
                    && self.driver.exists_edge(&caller, head, EdgeLabel::Call)?
                {
                    continue;
                }
                builder.add_edge(&caller, head, EdgeLabel::Call)?;
            } else if builder.resolves(&caller) {
                builder.add_edge(&caller, head, EdgeLabel::Call)?;
            } else {
                // Staged by a worker whose delta has not committed yet;
                // park it again for reconciliation.
                self.cache.record_incoming_call(signature, caller);
            }
        }
        Ok(())
    }

    fn link_target(
        &self,
        call_vertex: &VertexHandle,
        target: &str,
        builder: &mut DeltaGraphBuilder,
    ) -> Result<(), ProcessingError> {
        let resolved = self.cache.resolve_method(self.driver, target)?;
        let Some(target_handle) = resolved else {
            trace!(target = %target, "target not built yet, deferring call edge");
            self.cache.record_incoming_call(target, call_vertex.clone());
            return Ok(());
        };

        if target_handle.is_persisted() {
            if !self.driver.exists_vertex(&target_handle)? {
                // Cached handle went stale across sessions: fall back to a
                // fresh resolution next time and defer this edge.
                self.cache.invalidate_method(target);
                self.cache.record_incoming_call(target, call_vertex.clone());
                return Ok(());
            }
            if call_vertex.is_persisted()
                && self
                    .driver
                    .exists_edge(call_vertex, &target_handle, EdgeLabel::Call)?
            {
                // Already stitched by an earlier run.
                return Ok(());
            }
            builder.add_edge(call_vertex, &target_handle, EdgeLabel::Call)?;
        } else if builder.resolves(&target_handle) {
            builder.add_edge(call_vertex, &target_handle, EdgeLabel::Call)?;
        } else {
            self.cache.record_incoming_call(target, call_vertex.clone());
        }
        Ok(())
    }
}

impl<D: GraphDriver + ?Sized> UnitGraphPass for CallGraphPass<'_, D> {
    fn name(&self) -> &'static str {
        "call-graph-stitching"
    }

    fn run_pass(&self, unit: &UnitGraph, staged: &DeltaGraph) -> PassOutcome {
        trace!(
            method = %unit.method,
            declaring_type = %unit.declaring_type,
            "building call graph edges"
        );
        let mut builder = DeltaGraph::builder();
        builder.import_staged(staged);
        match self.stitch(unit, &mut builder) {
            Ok(()) => PassOutcome::complete(builder.build()),
            Err(error) => {
                warn!(
                    method = %unit.method,
                    error = %error,
                    "unable to complete call-graph stitching; partial changes will be saved"
                );
                PassOutcome::failed(builder.build(), error)
            }
        }
    }
}
