//! SQLite-backed graph driver.
//!
//! Vertices, their properties and edges live in three tables; property
//! values are JSON-encoded so scalar and list values share one column and
//! property lookups reduce to string equality. `apply_delta` runs inside a
//! single transaction, which is what makes the batch atomic.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use cpgraph_core::{
    Change, DeltaGraph, DriverError, DriverResult, DumpedEdge, DumpedVertex, EdgeLabel,
    GraphDriver, GraphDump, PropertyValue, Vertex, VertexHandle, VertexId, VertexLabel,
};

use crate::error::{Result, StorageError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS vertices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    label TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS properties (
    vertex_id INTEGER NOT NULL REFERENCES vertices(id),
    name TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (vertex_id, name)
);
CREATE INDEX IF NOT EXISTS idx_properties_lookup ON properties (name, value);
CREATE TABLE IF NOT EXISTS edges (
    source INTEGER NOT NULL,
    target INTEGER NOT NULL,
    label TEXT NOT NULL,
    PRIMARY KEY (source, target, label)
) WITHOUT ROWID;
";

pub struct SqliteDriver {
    conn: Mutex<Connection>,
}

impl SqliteDriver {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Snapshot of the persisted graph, vertices and edges in id order.
    pub fn dump(&self) -> Result<GraphDump> {
        let conn = self.conn.lock();

        let ids: Vec<VertexId> = {
            let mut stmt = conn.prepare("SELECT id FROM vertices ORDER BY id")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<_>>()?
        };
        let mut vertices = Vec::with_capacity(ids.len());
        for id in ids {
            let handle = load_vertex(&conn, id)?;
            vertices.push(DumpedVertex {
                id,
                label: handle.label(),
                properties: handle.properties().clone(),
            });
        }

        let mut stmt =
            conn.prepare("SELECT source, target, label FROM edges ORDER BY source, target, label")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, VertexId>(0)?,
                row.get::<_, VertexId>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut edges = Vec::new();
        for row in rows {
            let (source, target, label) = row?;
            let label = EdgeLabel::parse(&label)
                .ok_or_else(|| StorageError::corrupt(format!("unknown edge label {label}")))?;
            edges.push(DumpedEdge {
                source,
                target,
                label,
            });
        }

        Ok(GraphDump { vertices, edges })
    }
}

fn load_vertex(conn: &Connection, id: VertexId) -> Result<VertexHandle> {
    let label: String = conn.query_row(
        "SELECT label FROM vertices WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    let label = VertexLabel::parse(&label)
        .ok_or_else(|| StorageError::corrupt(format!("unknown vertex label {label}")))?;

    let mut stmt = conn.prepare("SELECT name, value FROM properties WHERE vertex_id = ?1")?;
    let rows = stmt.query_map(params![id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut properties = BTreeMap::new();
    for row in rows {
        let (name, value) = row?;
        let value: PropertyValue = serde_json::from_str(&value)?;
        properties.insert(name, value);
    }
    Ok(Arc::new(Vertex::restored(id, label, properties)))
}

fn vertex_row_exists(conn: &Connection, id: VertexId) -> rusqlite::Result<bool> {
    conn.query_row("SELECT 1 FROM vertices WHERE id = ?1", params![id], |_| {
        Ok(())
    })
    .optional()
    .map(|row| row.is_some())
}

fn query_err(err: rusqlite::Error) -> DriverError {
    StorageError::from(err).into()
}

fn apply_err(err: rusqlite::Error) -> DriverError {
    DriverError::Apply(format!("SQLite error: {err}"))
}

impl GraphDriver for SqliteDriver {
    fn exists_vertex(&self, vertex: &VertexHandle) -> DriverResult<bool> {
        let Some(id) = vertex.id() else {
            return Ok(false);
        };
        let conn = self.conn.lock();
        vertex_row_exists(&conn, id).map_err(query_err)
    }

    fn exists_edge(
        &self,
        source: &VertexHandle,
        target: &VertexHandle,
        label: EdgeLabel,
    ) -> DriverResult<bool> {
        let (Some(source), Some(target)) = (source.id(), target.id()) else {
            return Ok(false);
        };
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT 1 FROM edges WHERE source = ?1 AND target = ?2 AND label = ?3",
            params![source, target, label.as_str()],
            |_| Ok(()),
        )
        .optional()
        .map(|row| row.is_some())
        .map_err(query_err)
    }

    fn vertices_by_property(
        &self,
        name: &str,
        value: &PropertyValue,
        label: VertexLabel,
    ) -> DriverResult<Vec<VertexHandle>> {
        let encoded = serde_json::to_string(value)
            .map_err(|e| DriverError::Query(format!("unencodable property value: {e}")))?;
        let conn = self.conn.lock();

        let ids: Vec<VertexId> = {
            let mut stmt = conn
                .prepare(
                    "SELECT p.vertex_id FROM properties p \
                     JOIN vertices v ON v.id = p.vertex_id \
                     WHERE p.name = ?1 AND p.value = ?2 AND v.label = ?3 \
                     ORDER BY p.vertex_id",
                )
                .map_err(query_err)?;
            let rows = stmt
                .query_map(params![name, encoded, label.as_str()], |row| row.get(0))
                .map_err(query_err)?;
            rows.collect::<rusqlite::Result<_>>().map_err(query_err)?
        };

        ids.into_iter()
            .map(|id| load_vertex(&conn, id).map_err(DriverError::from))
            .collect()
    }

    fn apply_delta(&self, delta: &DeltaGraph) -> DriverResult<Vec<VertexHandle>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(apply_err)?;

        let mut assigned: Vec<(VertexHandle, VertexId)> = Vec::new();
        let mut staged_ids: FxHashMap<usize, VertexId> = FxHashMap::default();

        for change in delta.changes() {
            match change {
                Change::VertexAdd(handle) => {
                    if let Some(id) = handle.id() {
                        if !vertex_row_exists(&tx, id).map_err(apply_err)? {
                            return Err(DriverError::Apply(format!(
                                "staged vertex carries unknown id {id}"
                            )));
                        }
                        continue;
                    }
                    tx.execute(
                        "INSERT INTO vertices (label) VALUES (?1)",
                        params![handle.label().as_str()],
                    )
                    .map_err(apply_err)?;
                    let id = tx.last_insert_rowid();
                    for (name, value) in handle.properties() {
                        let encoded = serde_json::to_string(value).map_err(|e| {
                            DriverError::Apply(format!("unencodable property {name}: {e}"))
                        })?;
                        tx.execute(
                            "INSERT INTO properties (vertex_id, name, value) VALUES (?1, ?2, ?3)",
                            params![id, name, encoded],
                        )
                        .map_err(apply_err)?;
                    }
                    staged_ids.insert(Arc::as_ptr(handle) as usize, id);
                    assigned.push((handle.clone(), id));
                }
                Change::EdgeAdd(edge) => {
                    let source = resolve_endpoint(&tx, &staged_ids, &edge.source)?;
                    let target = resolve_endpoint(&tx, &staged_ids, &edge.target)?;
                    tx.execute(
                        "INSERT OR IGNORE INTO edges (source, target, label) VALUES (?1, ?2, ?3)",
                        params![source, target, edge.label.as_str()],
                    )
                    .map_err(apply_err)?;
                }
            }
        }

        tx.commit().map_err(apply_err)?;
        drop(conn);

        let mut handles = Vec::with_capacity(assigned.len());
        for (handle, id) in assigned {
            handle.assign_id(id);
            handles.push(handle);
        }
        debug!(vertices = handles.len(), "committed delta");
        Ok(handles)
    }
}

fn resolve_endpoint(
    conn: &Connection,
    staged_ids: &FxHashMap<usize, VertexId>,
    handle: &VertexHandle,
) -> DriverResult<VertexId> {
    if let Some(id) = handle.id() {
        if vertex_row_exists(conn, id).map_err(apply_err)? {
            return Ok(id);
        }
        return Err(DriverError::Apply(format!(
            "edge endpoint {id} does not resolve in store"
        )));
    }
    staged_ids
        .get(&(Arc::as_ptr(handle) as usize))
        .copied()
        .ok_or_else(|| DriverError::Apply("edge endpoint does not resolve in batch".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpgraph_core::keys;

    #[test]
    fn test_open_in_memory_round_trip() {
        let driver = SqliteDriver::open_in_memory().unwrap();

        let mut builder = DeltaGraph::builder();
        let method = builder.add_vertex(
            Vertex::new(VertexLabel::Method)
                .with_property(keys::FULL_NAME, "A.f")
                .with_property(keys::NAME, "f"),
        );
        let call = builder.add_vertex(Vertex::new(VertexLabel::Call));
        builder.add_edge(&call, &method, EdgeLabel::Call).unwrap();
        let committed = driver.apply_delta(&builder.build()).unwrap();
        assert_eq!(committed.len(), 2);

        assert!(driver.exists_vertex(&method).unwrap());
        assert!(driver.exists_edge(&call, &method, EdgeLabel::Call).unwrap());

        let found = driver
            .vertices_by_property(
                keys::FULL_NAME,
                &PropertyValue::from("A.f"),
                VertexLabel::Method,
            )
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), method.id());
        assert_eq!(found[0].property(keys::NAME), Some(&PropertyValue::from("f")));
    }
}
