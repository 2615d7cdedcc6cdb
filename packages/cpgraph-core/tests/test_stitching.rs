//! End-to-end stitching behavior across processing orders and sessions.

use std::sync::Arc;

use cpgraph_core::{
    keys, BuildPipeline, CallSite, GraphDriver, InMemoryDriver, PropertyValue, Statement,
    StaticCallOracle, UnitGraph, VertexLabel,
};

/// A unit graph whose call statements are `(call_site_id, callee_name)`.
fn unit(method: &str, calls: &[(&str, &str)]) -> UnitGraph {
    let declaring = method.split('.').next().unwrap_or(method).to_string();
    UnitGraph::new(method, declaring).with_statements(
        calls
            .iter()
            .map(|(id, name)| Statement::Call(CallSite::new(*id, *name, format!("{name}()"))))
            .collect(),
    )
}

/// Multiset of `(source label, target FULL_NAME)` over all persisted edges.
fn edge_summary(driver: &InMemoryDriver) -> Vec<(String, String)> {
    let dump = driver.dump();
    let vertex = |id| dump.vertices.iter().find(|v| v.id == id).unwrap();
    let mut summary: Vec<(String, String)> = dump
        .edges
        .iter()
        .map(|e| {
            let full_name = match vertex(e.target).properties.get(keys::FULL_NAME) {
                Some(PropertyValue::String(s)) => s.clone(),
                _ => String::new(),
            };
            (vertex(e.source).label.to_string(), full_name)
        })
        .collect();
    summary.sort();
    summary
}

#[test]
fn test_forward_reference_scenario() {
    let driver = Arc::new(InMemoryDriver::new());
    let mut oracle = StaticCallOracle::new();
    oracle.record("A.f:0", "B.g");
    let pipeline = BuildPipeline::new(driver.clone(), Arc::new(oracle));

    // A.f arrives first; its call target does not exist yet.
    let report = pipeline.run(&[unit("A.f", &[("A.f:0", "g")])]);
    assert!(report.is_clean());
    assert_eq!(driver.edge_count(), 0);
    assert_eq!(report.unresolved_calls, vec!["B.g".to_string()]);

    // B.g arrives later: a METHOD vertex is created, the parked caller is
    // drained and exactly one CALL edge appears.
    let report = pipeline.run(&[unit("B.g", &[])]);
    assert!(report.is_clean());
    assert!(report.unresolved_calls.is_empty());
    assert_eq!(driver.edge_count(), 1);
    assert_eq!(
        edge_summary(&driver),
        vec![("CALL".to_string(), "B.g".to_string())]
    );

    let call_handle = pipeline.cache().resolve_call("A.f:0").unwrap();
    assert!(call_handle.is_persisted());
}

#[test]
fn test_order_independence_over_all_permutations() {
    // A.f calls B.g and C.h; B.g calls C.h.
    let units = vec![
        unit("A.f", &[("A.f:0", "g"), ("A.f:1", "h")]),
        unit("B.g", &[("B.g:0", "h")]),
        unit("C.h", &[]),
    ];
    let expected = vec![
        ("CALL".to_string(), "B.g".to_string()),
        ("CALL".to_string(), "C.h".to_string()),
        ("CALL".to_string(), "C.h".to_string()),
    ];

    let permutations: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];
    for order in permutations {
        let driver = Arc::new(InMemoryDriver::new());
        let mut oracle = StaticCallOracle::new();
        oracle.record("A.f:0", "B.g");
        oracle.record("A.f:1", "C.h");
        oracle.record("B.g:0", "C.h");
        let pipeline = BuildPipeline::new(driver.clone(), Arc::new(oracle));

        for index in order {
            let report = pipeline.run(std::slice::from_ref(&units[index]));
            assert!(report.is_clean(), "order {order:?} failed");
        }

        assert_eq!(edge_summary(&driver), expected, "order {order:?}");
        assert!(pipeline.cache().pending_callees().is_empty());
    }
}

#[test]
fn test_restitching_is_idempotent() {
    let driver = Arc::new(InMemoryDriver::new());
    let mut oracle = StaticCallOracle::new();
    oracle.record("A.f:0", "B.g");
    let pipeline = BuildPipeline::new(driver.clone(), Arc::new(oracle));

    let units = vec![unit("B.g", &[]), unit("A.f", &[("A.f:0", "g")])];
    pipeline.run(&units);
    let vertices_before = driver.vertex_count();
    assert_eq!(driver.edge_count(), 1);

    // Unchanged source, no store mutation in between: nothing new staged.
    let rerun = pipeline.run(&units);
    assert!(rerun.is_clean());
    assert_eq!(rerun.committed_vertices, 0);
    assert_eq!(rerun.committed_edges, 0);
    assert_eq!(driver.vertex_count(), vertices_before);
    assert_eq!(driver.edge_count(), 1);
}

#[test]
fn test_stale_method_handle_degrades_to_fresh_query() {
    let driver = Arc::new(InMemoryDriver::new());
    let mut oracle = StaticCallOracle::new();
    oracle.record("A.f:0", "B.g");
    let pipeline = BuildPipeline::new(driver.clone(), Arc::new(oracle));

    pipeline.run(&[unit("B.g", &[])]);
    let stale = pipeline
        .cache()
        .resolve_method(&*driver, "B.g")
        .unwrap()
        .unwrap();
    assert!(driver.remove_vertex(stale.id().unwrap()));

    // The cached handle no longer exists in the store: the edge is parked
    // instead of pointing at a dangling reference.
    let report = pipeline.run(&[unit("A.f", &[("A.f:0", "g")])]);
    assert!(report.is_clean());
    assert_eq!(driver.edge_count(), 0);
    assert_eq!(report.unresolved_calls, vec!["B.g".to_string()]);

    // Rebuilding B.g creates a fresh METHOD vertex and reconnects.
    pipeline.run(&[unit("B.g", &[])]);
    assert_eq!(driver.edge_count(), 1);
    assert_eq!(
        edge_summary(&driver),
        vec![("CALL".to_string(), "B.g".to_string())]
    );
}

#[test]
fn test_method_without_statements_still_gets_a_head() {
    let driver = Arc::new(InMemoryDriver::new());
    let pipeline = BuildPipeline::new(driver.clone(), Arc::new(StaticCallOracle::new()));

    let report = pipeline.run(&[unit("D.empty", &[])]);
    assert!(report.is_clean());

    let found = driver
        .vertices_by_property(
            keys::FULL_NAME,
            &PropertyValue::from("D.empty"),
            VertexLabel::Method,
        )
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(
        found[0].property(keys::NAME),
        Some(&PropertyValue::from("empty"))
    );
}
