//! Session build cache.
//!
//! One cache lives for one build session, owned by the orchestrator and
//! passed by reference into every pass. It memoizes resolved method and
//! call-site handles and parks call edges whose callee has not been built
//! yet. It is an optimization and reconciliation aid, never a source of
//! truth: every lookup can miss and the build still converges through
//! fresh driver queries.
//!
//! Concurrency: the maps shard-lock per key, so operations on the same
//! key are mutually exclusive (a `record_incoming_call` racing a
//! `drain_incoming_calls` for the same callee cannot lose the recorded
//! entry) while different keys proceed in parallel.

use dashmap::DashMap;

use crate::driver::{DriverResult, GraphDriver};
use crate::ir::MethodSignature;
use crate::model::{keys, PropertyValue, VertexHandle, VertexLabel};

#[derive(Debug, Default)]
pub struct BuildCache {
    /// Full method signature -> most recently resolved METHOD handle.
    methods: DashMap<MethodSignature, VertexHandle>,
    /// Call-site identity -> CALL handle, populated by projection.
    calls: DashMap<String, VertexHandle>,
    /// Callee signature -> caller CALL handles awaiting reconnection.
    incoming: DashMap<MethodSignature, Vec<VertexHandle>>,
}

impl BuildCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a method signature to its vertex handle, falling back to a
    /// driver property query on a cache miss. `None` means the method has
    /// not been built and must be created by the caller; it is not an
    /// error.
    pub fn resolve_method<D>(
        &self,
        driver: &D,
        signature: &str,
    ) -> DriverResult<Option<VertexHandle>>
    where
        D: GraphDriver + ?Sized,
    {
        if let Some(handle) = self.methods.get(signature) {
            return Ok(Some(handle.clone()));
        }
        let found = driver
            .vertices_by_property(
                keys::FULL_NAME,
                &PropertyValue::from(signature),
                VertexLabel::Method,
            )?
            .into_iter()
            .next();
        match found {
            Some(handle) => {
                // A concurrent register for the same signature wins.
                let handle = self
                    .methods
                    .entry(signature.to_string())
                    .or_insert(handle)
                    .clone();
                Ok(Some(handle))
            }
            None => Ok(None),
        }
    }

    /// Force-set the handle for a signature, overwriting any previous one.
    pub fn register_method(&self, signature: impl Into<MethodSignature>, handle: VertexHandle) {
        self.methods.insert(signature.into(), handle);
    }

    /// Drop a stale entry so the next resolution hits the driver again.
    pub fn invalidate_method(&self, signature: &str) {
        self.methods.remove(signature);
    }

    /// CALL handle projected for a call-site id, if any. Absence means the
    /// instruction was never projected as a vertex.
    pub fn resolve_call(&self, call_site_id: &str) -> Option<VertexHandle> {
        self.calls.get(call_site_id).map(|h| h.clone())
    }

    pub fn register_call(&self, call_site_id: impl Into<String>, handle: VertexHandle) {
        self.calls.insert(call_site_id.into(), handle);
    }

    /// Park a caller CALL handle until `callee` is built.
    pub fn record_incoming_call(&self, callee: impl Into<MethodSignature>, caller: VertexHandle) {
        self.incoming.entry(callee.into()).or_default().push(caller);
    }

    /// Return and clear the parked callers for `callee`. One-shot: a second
    /// consecutive call with no intervening record returns empty.
    pub fn drain_incoming_calls(&self, callee: &str) -> Vec<VertexHandle> {
        self.incoming
            .remove(callee)
            .map(|(_, callers)| callers)
            .unwrap_or_default()
    }

    /// Callee signatures that still have parked callers.
    pub fn pending_callees(&self) -> Vec<MethodSignature> {
        let mut callees: Vec<MethodSignature> =
            self.incoming.iter().map(|e| e.key().clone()).collect();
        callees.sort_unstable();
        callees
    }
}
