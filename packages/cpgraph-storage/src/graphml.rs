//! GraphML serialization of a persisted graph.
//!
//! The format is consumed by TinkerPop and Cytoscape and mirrors the
//! Neo4j convention: vertex labels under a `labels` key, edge relations
//! under `label`. Writing is single-pass and read-only; it never touches
//! the incremental build path.

use std::collections::BTreeMap;
use std::io::{self, Write};

use cpgraph_core::{GraphDump, PropertyValue, ValueKind};

const DECLARATION: &str = "<?xml version=\"1.0\" ?>";

/// Serialize `graph` as GraphML.
pub fn write_graphml<W: Write>(graph: &GraphDump, writer: &mut W) -> io::Result<()> {
    write!(writer, "{DECLARATION}")?;
    write!(writer, "<graphml ")?;
    write!(writer, "xmlns=\"http://graphml.graphdrawing.org/xmlns\" ")?;
    write!(writer, "xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" ")?;
    write!(
        writer,
        "xsi:schemaLocation=\"http://graphml.graphdrawing.org/xmlns \
         http://graphml.graphdrawing.org/xmlns/1.1/graphml.xsd\">"
    )?;
    write_keys(graph, writer)?;
    write!(writer, "<graph id=\"G\" edgedefault=\"directed\">")?;
    write_vertices(graph, writer)?;
    write_edges(graph, writer)?;
    write!(writer, "</graph>")?;
    write!(writer, "</graphml>")?;
    Ok(())
}

/// One key element per distinct property name, with its inferred kind.
fn write_keys<W: Write>(graph: &GraphDump, writer: &mut W) -> io::Result<()> {
    let mut kinds: BTreeMap<&str, ValueKind> = BTreeMap::new();
    for vertex in &graph.vertices {
        for (name, value) in &vertex.properties {
            kinds.insert(name.as_str(), value.kind());
        }
    }

    write!(
        writer,
        "<key id=\"labels\" for=\"node\" attr.name=\"labels\" attr.type=\"string\"></key>"
    )?;
    write!(
        writer,
        "<key id=\"label\" for=\"edge\" attr.name=\"label\" attr.type=\"string\"></key>"
    )?;
    for (name, kind) in kinds {
        write!(
            writer,
            "<key id=\"{name}\" for=\"node\" attr.name=\"{name}\" attr.type=\"{}\"></key>",
            kind.as_str()
        )?;
    }
    Ok(())
}

fn write_vertices<W: Write>(graph: &GraphDump, writer: &mut W) -> io::Result<()> {
    for vertex in &graph.vertices {
        write!(writer, "<node id=\"{}\">", vertex.id)?;
        write!(writer, "<data key=\"labels\">{}</data>", vertex.label)?;
        for (name, value) in &vertex.properties {
            write!(writer, "<data key=\"{name}\">{}</data>", text(value))?;
        }
        write!(writer, "</node>")?;
    }
    Ok(())
}

fn write_edges<W: Write>(graph: &GraphDump, writer: &mut W) -> io::Result<()> {
    let mut edge_id: u64 = 0;
    for edge in &graph.edges {
        write!(writer, "<edge id=\"{edge_id}\" ")?;
        write!(writer, "source=\"{}\" ", edge.source)?;
        write!(writer, "target=\"{}\">", edge.target)?;
        write!(writer, "<data key=\"label\">{}</data>", edge.label)?;
        write!(writer, "</edge>")?;
        edge_id += 1;
    }
    Ok(())
}

/// Rendered text of a value: strings escaped, lists flattened to their
/// first element or empty.
fn text(value: &PropertyValue) -> String {
    match value {
        PropertyValue::String(s) => escape(s),
        PropertyValue::Int(i) => i.to_string(),
        PropertyValue::Bool(b) => b.to_string(),
        PropertyValue::List(values) => values.first().map(text).unwrap_or_default(),
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_text_flattens_lists() {
        let list = PropertyValue::List(vec![
            PropertyValue::from("<first>"),
            PropertyValue::from("second"),
        ]);
        assert_eq!(text(&list), "&lt;first&gt;");
        assert_eq!(text(&PropertyValue::List(vec![])), "");
        assert_eq!(text(&PropertyValue::Int(3)), "3");
        assert_eq!(text(&PropertyValue::Bool(true)), "true");
    }
}
