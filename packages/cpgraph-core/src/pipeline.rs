//! Pass pipeline orchestration.
//!
//! Owns the session cache, fans unit graphs out to worker threads, runs
//! the pass chain per unit, merges the resulting deltas in pass order and
//! commits them through the driver. Outcomes are aggregated without early
//! termination; a failing unit contributes its partial delta and a report
//! entry.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::BuildCache;
use crate::driver::GraphDriver;
use crate::ir::{MethodSignature, UnitGraph};
use crate::model::{DeltaGraph, EdgeLabel};
use crate::oracle::CallGraphOracle;
use crate::passes::{CallGraphPass, CallSitePass, ProcessingError, UnitGraphPass};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Worker threads for the unit sweep.
    pub workers: usize,
    /// Re-resolve parked incoming-call entries after the sweep.
    pub reconcile_pending: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: (num_cpus::get() * 3 / 4).max(1),
            reconcile_pending: true,
        }
    }
}

/// Outcome of one unit's pass chain and commit.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub method: MethodSignature,
    pub staged_vertices: usize,
    pub staged_edges: usize,
    pub committed: bool,
    /// Per-method analysis failure, if the pass chain was cut short.
    pub error: Option<String>,
    /// Commit failure, if the merged delta could not be applied.
    pub commit_error: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct PipelineReport {
    pub units: Vec<UnitReport>,
    pub committed_vertices: usize,
    pub committed_edges: usize,
    /// Edges recovered by post-sweep reconciliation.
    pub reconnected_edges: usize,
    /// Callees that still have parked callers after the build.
    pub unresolved_calls: Vec<MethodSignature>,
}

impl PipelineReport {
    pub fn failures(&self) -> impl Iterator<Item = &UnitReport> {
        self.units
            .iter()
            .filter(|u| u.error.is_some() || u.commit_error.is_some())
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

pub struct BuildPipeline<D: GraphDriver> {
    driver: Arc<D>,
    oracle: Arc<dyn CallGraphOracle>,
    cache: BuildCache,
    config: PipelineConfig,
}

impl<D: GraphDriver> BuildPipeline<D> {
    pub fn new(driver: Arc<D>, oracle: Arc<dyn CallGraphOracle>) -> Self {
        Self {
            driver,
            oracle,
            cache: BuildCache::new(),
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn cache(&self) -> &BuildCache {
        &self.cache
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Process `units`, one delta commit per unit, then reconcile parked
    /// call edges. Repeated runs against the same pipeline share the
    /// session cache, which is what makes re-analysis incremental.
    pub fn run(&self, units: &[UnitGraph]) -> PipelineReport {
        info!(
            units = units.len(),
            workers = self.config.workers,
            "starting graph build"
        );

        let unit_reports: Vec<UnitReport> =
            match rayon::ThreadPoolBuilder::new().num_threads(self.config.workers).build() {
                Ok(pool) => {
                    pool.install(|| units.par_iter().map(|u| self.process_unit(u)).collect())
                }
                Err(error) => {
                    warn!(%error, "falling back to the global worker pool");
                    units.par_iter().map(|u| self.process_unit(u)).collect()
                }
            };

        let mut report = PipelineReport::default();
        for unit in unit_reports {
            if unit.committed {
                report.committed_vertices += unit.staged_vertices;
                report.committed_edges += unit.staged_edges;
            }
            report.units.push(unit);
        }

        if self.config.reconcile_pending {
            self.reconcile(&mut report);
        }
        report.unresolved_calls = self.cache.pending_callees();

        info!(
            committed_vertices = report.committed_vertices,
            committed_edges = report.committed_edges,
            failures = report.failures().count(),
            unresolved = report.unresolved_calls.len(),
            "graph build finished"
        );
        report
    }

    fn process_unit(&self, unit: &UnitGraph) -> UnitReport {
        let mut merged = DeltaGraph::empty();
        let mut error: Option<ProcessingError> = None;

        let projection = CallSitePass::new(&self.cache);
        let outcome = projection.run_pass(unit, &merged);
        merged = merged.merge(outcome.delta);
        error = error.or(outcome.error);

        // A failing pass yields its partial delta; the rest of the chain
        // is skipped and the partial state is still committed.
        if error.is_none() {
            let stitching = CallGraphPass::new(&*self.driver, &self.cache, &*self.oracle);
            let outcome = stitching.run_pass(unit, &merged);
            merged = merged.merge(outcome.delta);
            error = error.or(outcome.error);
        }

        let staged_vertices = merged.vertex_adds().count();
        let staged_edges = merged.edge_adds().count();
        let commit_error = if merged.is_empty() {
            None
        } else {
            match self.driver.apply_delta(&merged) {
                Ok(_) => None,
                Err(apply_error) => {
                    warn!(method = %unit.method, error = %apply_error, "delta commit failed");
                    Some(apply_error.to_string())
                }
            }
        };

        UnitReport {
            method: unit.method.clone(),
            staged_vertices,
            staged_edges,
            committed: commit_error.is_none(),
            error: error.map(|e| e.to_string()),
            commit_error,
        }
    }

    /// Drain parked callers whose callee exists by now. Covers callers that
    /// recorded an entry after the callee's own drain had already run, and
    /// callees committed late in the sweep.
    fn reconcile(&self, report: &mut PipelineReport) {
        for callee in self.cache.pending_callees() {
            let head = match self.cache.resolve_method(&*self.driver, &callee) {
                Ok(Some(head)) => head,
                Ok(None) => continue,
                Err(error) => {
                    warn!(callee = %callee, %error, "reconciliation lookup failed");
                    continue;
                }
            };
            if !head.is_persisted() {
                continue;
            }
            match self.driver.exists_vertex(&head) {
                Ok(true) => {}
                Ok(false) | Err(_) => continue,
            }

            let pending = self.cache.drain_incoming_calls(&callee);
            if pending.is_empty() {
                continue;
            }
            let mut builder = DeltaGraph::builder();
            for caller in pending {
                if !caller.is_persisted() {
                    // Its delta never committed; park it again.
                    self.cache.record_incoming_call(&callee, caller);
                    continue;
                }
                match self.driver.exists_vertex(&caller) {
                    Ok(true) => {}
                    _ => continue,
                }
                match self.driver.exists_edge(&caller, &head, EdgeLabel::Call) {
                    Ok(false) => {}
                    _ => continue,
                }
                if let Err(error) = builder.add_edge(&caller, &head, EdgeLabel::Call) {
                    warn!(callee = %callee, %error, "skipping unresolvable reconnection");
                }
            }
            if builder.is_empty() {
                continue;
            }
            let delta = builder.build();
            let edges = delta.edge_adds().count();
            match self.driver.apply_delta(&delta) {
                Ok(_) => {
                    report.reconnected_edges += edges;
                    report.committed_edges += edges;
                }
                Err(error) => {
                    warn!(callee = %callee, %error, "reconciliation commit failed");
                }
            }
        }
    }
}
