//! GraphML export against graphs built through the drivers.

use pretty_assertions::assert_eq;

use cpgraph_core::{
    keys, DeltaGraph, EdgeLabel, GraphDriver, InMemoryDriver, PropertyValue, Vertex, VertexLabel,
};
use cpgraph_storage::write_graphml;

fn export(driver: &InMemoryDriver) -> String {
    let mut out = Vec::new();
    write_graphml(&driver.dump(), &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_method_call_scenario() {
    let driver = InMemoryDriver::new();
    let mut builder = DeltaGraph::builder();
    let method = builder.add_vertex(
        Vertex::new(VertexLabel::Method).with_property(keys::NAME, "main"),
    );
    let call = builder.add_vertex(Vertex::new(VertexLabel::Call));
    builder.add_edge(&call, &method, EdgeLabel::Call).unwrap();
    driver.apply_delta(&builder.build()).unwrap();
    assert_eq!(method.id(), Some(1));
    assert_eq!(call.id(), Some(2));

    let document = export(&driver);

    assert!(document.starts_with("<?xml version=\"1.0\" ?><graphml "));
    assert!(document.contains(
        "<key id=\"labels\" for=\"node\" attr.name=\"labels\" attr.type=\"string\"></key>"
    ));
    assert!(document.contains(
        "<key id=\"NAME\" for=\"node\" attr.name=\"NAME\" attr.type=\"string\"></key>"
    ));
    assert!(document.contains(
        "<node id=\"1\"><data key=\"labels\">METHOD</data><data key=\"NAME\">main</data></node>"
    ));
    assert!(document.contains("<node id=\"2\"><data key=\"labels\">CALL</data></node>"));
    assert!(document.contains(
        "<edge id=\"0\" source=\"2\" target=\"1\"><data key=\"label\">CALL</data></edge>"
    ));
    assert!(document.ends_with("</graph></graphml>"));
}

#[test]
fn test_schema_kinds_are_inferred() {
    let driver = InMemoryDriver::new();
    let mut builder = DeltaGraph::builder();
    builder.add_vertex(
        Vertex::new(VertexLabel::Method)
            .with_property(keys::NAME, "f")
            .with_property(keys::ORDER, 4i64)
            .with_property("IS_EXTERNAL", false)
            .with_property(
                "MODIFIERS",
                PropertyValue::List(vec![PropertyValue::from("public")]),
            ),
    );
    driver.apply_delta(&builder.build()).unwrap();

    let document = export(&driver);
    assert!(document.contains(
        "<key id=\"ORDER\" for=\"node\" attr.name=\"ORDER\" attr.type=\"int\"></key>"
    ));
    assert!(document.contains(
        "<key id=\"IS_EXTERNAL\" for=\"node\" attr.name=\"IS_EXTERNAL\" attr.type=\"boolean\"></key>"
    ));
    // Lists are flattened, so they are declared as strings.
    assert!(document.contains(
        "<key id=\"MODIFIERS\" for=\"node\" attr.name=\"MODIFIERS\" attr.type=\"string\"></key>"
    ));
    assert!(document.contains("<data key=\"MODIFIERS\">public</data>"));
    assert!(document.contains("<data key=\"IS_EXTERNAL\">false</data>"));
    assert!(document.contains("<data key=\"ORDER\">4</data>"));
}

#[test]
fn test_string_values_are_escaped() {
    let driver = InMemoryDriver::new();
    let mut builder = DeltaGraph::builder();
    builder.add_vertex(
        Vertex::new(VertexLabel::Call).with_property(keys::CODE, "a < b && c > d"),
    );
    driver.apply_delta(&builder.build()).unwrap();

    let document = export(&driver);
    assert!(document.contains("<data key=\"CODE\">a &lt; b &amp;&amp; c &gt; d</data>"));
}

#[test]
fn test_edge_ids_count_up_from_zero() {
    let driver = InMemoryDriver::new();
    let mut builder = DeltaGraph::builder();
    let m = builder.add_vertex(Vertex::new(VertexLabel::Method).with_property(keys::NAME, "m"));
    let c1 = builder.add_vertex(Vertex::new(VertexLabel::Call));
    let c2 = builder.add_vertex(Vertex::new(VertexLabel::Call));
    builder.add_edge(&c1, &m, EdgeLabel::Call).unwrap();
    builder.add_edge(&c2, &m, EdgeLabel::Call).unwrap();
    driver.apply_delta(&builder.build()).unwrap();

    let document = export(&driver);
    assert!(document.contains("<edge id=\"0\" "));
    assert!(document.contains("<edge id=\"1\" "));
    assert!(!document.contains("<edge id=\"2\" "));
}
