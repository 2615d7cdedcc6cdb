//! Call-graph oracle port.
//!
//! Target resolution is computed elsewhere (points-to analysis, class
//! hierarchy, profile data); the build core only consumes its answers.

use rustc_hash::FxHashMap;

use crate::ir::{CallSite, MethodSignature};

/// Statically resolved call targets for call instructions.
pub trait CallGraphOracle: Send + Sync {
    /// Candidate callee signatures for `call_site`; empty when unresolved.
    fn targets_of(&self, call_site: &CallSite) -> Vec<MethodSignature>;
}

/// Map-backed oracle. Serves tests and replay of precomputed resolutions.
#[derive(Debug, Default)]
pub struct StaticCallOracle {
    targets: FxHashMap<String, Vec<MethodSignature>>,
}

impl StaticCallOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `target` as a resolution of the call site with id `call_site_id`.
    pub fn record(&mut self, call_site_id: impl Into<String>, target: impl Into<MethodSignature>) {
        self.targets
            .entry(call_site_id.into())
            .or_default()
            .push(target.into());
    }
}

impl CallGraphOracle for StaticCallOracle {
    fn targets_of(&self, call_site: &CallSite) -> Vec<MethodSignature> {
        self.targets
            .get(&call_site.id)
            .cloned()
            .unwrap_or_default()
    }
}
