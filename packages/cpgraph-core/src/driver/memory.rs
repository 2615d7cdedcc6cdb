//! In-memory reference driver.
//!
//! Mapping-backed implementation of the driver contract, used by unit
//! tests everywhere a durable backend is irrelevant.

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{DriverError, DriverResult, DumpedEdge, DumpedVertex, GraphDriver, GraphDump};
use crate::model::{
    Change, DeltaGraph, EdgeLabel, PropertyValue, Vertex, VertexHandle, VertexId, VertexLabel,
};

#[derive(Debug, Clone)]
struct StoredVertex {
    label: VertexLabel,
    properties: BTreeMap<String, PropertyValue>,
}

#[derive(Debug, Default)]
struct Store {
    vertices: FxHashMap<VertexId, StoredVertex>,
    edges: FxHashSet<(VertexId, VertexId, EdgeLabel)>,
    next_id: VertexId,
}

#[derive(Debug, Default)]
pub struct InMemoryDriver {
    store: RwLock<Store>,
    fail_next_apply: AtomicBool,
}

impl InMemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: the next `apply_delta` fails after staging its changes,
    /// exercising the rollback guarantee.
    pub fn inject_apply_failure(&self) {
        self.fail_next_apply.store(true, Ordering::SeqCst);
    }

    /// Test hook: drop a vertex and its edges, simulating durable state
    /// from a previous session that has since been rebuilt.
    pub fn remove_vertex(&self, id: VertexId) -> bool {
        let mut store = self.store.write();
        let removed = store.vertices.remove(&id).is_some();
        if removed {
            store.edges.retain(|(s, t, _)| *s != id && *t != id);
        }
        removed
    }

    pub fn vertex_count(&self) -> usize {
        self.store.read().vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.store.read().edges.len()
    }

    /// Snapshot of the persisted graph, vertices by id, edges ordered.
    pub fn dump(&self) -> GraphDump {
        let store = self.store.read();
        let mut vertices: Vec<DumpedVertex> = store
            .vertices
            .iter()
            .map(|(id, v)| DumpedVertex {
                id: *id,
                label: v.label,
                properties: v.properties.clone(),
            })
            .collect();
        vertices.sort_by_key(|v| v.id);

        let mut edges: Vec<DumpedEdge> = store
            .edges
            .iter()
            .map(|(s, t, label)| DumpedEdge {
                source: *s,
                target: *t,
                label: *label,
            })
            .collect();
        edges.sort_by_key(|e| (e.source, e.target));

        GraphDump { vertices, edges }
    }
}

impl GraphDriver for InMemoryDriver {
    fn exists_vertex(&self, vertex: &VertexHandle) -> DriverResult<bool> {
        Ok(match vertex.id() {
            Some(id) => self.store.read().vertices.contains_key(&id),
            None => false,
        })
    }

    fn exists_edge(
        &self,
        source: &VertexHandle,
        target: &VertexHandle,
        label: EdgeLabel,
    ) -> DriverResult<bool> {
        Ok(match (source.id(), target.id()) {
            (Some(s), Some(t)) => self.store.read().edges.contains(&(s, t, label)),
            _ => false,
        })
    }

    fn vertices_by_property(
        &self,
        name: &str,
        value: &PropertyValue,
        label: VertexLabel,
    ) -> DriverResult<Vec<VertexHandle>> {
        let store = self.store.read();
        let mut ids: Vec<VertexId> = store
            .vertices
            .iter()
            .filter(|(_, v)| v.label == label && v.properties.get(name) == Some(value))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();

        Ok(ids
            .into_iter()
            .map(|id| {
                let stored = &store.vertices[&id];
                Arc::new(Vertex::restored(id, stored.label, stored.properties.clone()))
            })
            .collect())
    }

    fn apply_delta(&self, delta: &DeltaGraph) -> DriverResult<Vec<VertexHandle>> {
        let mut store = self.store.write();

        // Stage everything against the current state first; the store is
        // only touched once the whole batch has resolved.
        let mut next_id = store.next_id;
        let mut assigned: Vec<(VertexHandle, VertexId)> = Vec::new();
        let mut staged_ids: FxHashMap<usize, VertexId> = FxHashMap::default();
        let mut new_vertices: Vec<(VertexId, StoredVertex)> = Vec::new();
        let mut new_edges: Vec<(VertexId, VertexId, EdgeLabel)> = Vec::new();

        let resolve = |store: &Store,
                       staged_ids: &FxHashMap<usize, VertexId>,
                       handle: &VertexHandle|
         -> Option<VertexId> {
            if let Some(id) = handle.id() {
                return store.vertices.contains_key(&id).then_some(id);
            }
            staged_ids
                .get(&(Arc::as_ptr(handle) as usize))
                .copied()
        };

        for change in delta.changes() {
            match change {
                Change::VertexAdd(handle) => {
                    if let Some(id) = handle.id() {
                        if !store.vertices.contains_key(&id) {
                            return Err(DriverError::Apply(format!(
                                "staged vertex carries unknown id {id}"
                            )));
                        }
                        // Already persisted; nothing to re-add.
                        continue;
                    }
                    next_id += 1;
                    staged_ids.insert(Arc::as_ptr(handle) as usize, next_id);
                    new_vertices.push((
                        next_id,
                        StoredVertex {
                            label: handle.label(),
                            properties: handle.properties().clone(),
                        },
                    ));
                    assigned.push((handle.clone(), next_id));
                }
                Change::EdgeAdd(edge) => {
                    let source = resolve(&store, &staged_ids, &edge.source).ok_or_else(|| {
                        DriverError::Apply("edge source does not resolve in batch or store".into())
                    })?;
                    let target = resolve(&store, &staged_ids, &edge.target).ok_or_else(|| {
                        DriverError::Apply("edge target does not resolve in batch or store".into())
                    })?;
                    new_edges.push((source, target, edge.label));
                }
            }
        }

        if self.fail_next_apply.swap(false, Ordering::SeqCst) {
            return Err(DriverError::Apply("injected mid-apply failure".into()));
        }

        // Publish.
        for (id, stored) in new_vertices {
            store.vertices.insert(id, stored);
        }
        for edge in new_edges {
            store.edges.insert(edge);
        }
        store.next_id = next_id;
        drop(store);

        let mut handles = Vec::with_capacity(assigned.len());
        for (handle, id) in assigned {
            handle.assign_id(id);
            handles.push(handle);
        }
        Ok(handles)
    }
}
