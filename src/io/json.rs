//! Adjacency JSON graph files (networkx `adjacency_data` layout).
//!
//! ```json
//! { "directed": false, "multigraph": false, "graph": {},
//!   "nodes": [ { "id": 0, "population": 12, ... }, ... ],
//!   "adjacency": [ [ { "id": 1 }, ... ], ... ] }
//! ```
//!
//! Node ids may be integers or strings; they become string ids. Numeric node
//! fields become attributes; other fields are ignored.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use serde_json::{Map, Value, json};

use crate::graph::{Graph, GraphSource, NodeRecord};

fn id_string(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => bail!("[io::json] Unsupported node id {other}"),
    }
}

/// Emit numeric-looking ids as JSON integers so they survive a networkx round trip.
fn id_value(id: &str) -> Value {
    match id.parse::<i64>() {
        Ok(n) if n.to_string() == id => Value::from(n),
        _ => Value::from(id),
    }
}

/// Parse an adjacency JSON document into a graph source with the given attribute schema.
pub fn read_adjacency_json<R: Read>(reader: R, schema: &[&str]) -> Result<GraphSource> {
    let document: Value = serde_json::from_reader(reader)
        .context("[io::json] Failed to parse graph document")?;

    let nodes = document.get("nodes").and_then(Value::as_array)
        .context("[io::json] Missing 'nodes' array")?;
    let adjacency = document.get("adjacency").and_then(Value::as_array)
        .context("[io::json] Missing 'adjacency' array")?;
    ensure!(nodes.len() == adjacency.len(),
        "[io::json] 'nodes' has {} entries but 'adjacency' has {}", nodes.len(), adjacency.len());

    let mut source = GraphSource::new(schema.iter().copied());
    for (i, (node, neighbors)) in nodes.iter().zip(adjacency).enumerate() {
        let fields = node.as_object()
            .with_context(|| format!("[io::json] Node {i} is not an object"))?;
        let id = fields.get("id")
            .with_context(|| format!("[io::json] Node {i} has no 'id'"))
            .and_then(id_string)?;

        let mut record = NodeRecord::new(id);
        for (key, value) in fields {
            if key == "id" { continue }
            if let Some(x) = value.as_f64() {
                record = record.attribute(key.as_str(), x);
            }
        }

        let neighbors = neighbors.as_array()
            .with_context(|| format!("[io::json] Adjacency entry {i} is not an array"))?;
        for neighbor in neighbors {
            let id = neighbor.get("id")
                .with_context(|| format!("[io::json] Adjacency entry {i} has a neighbor without 'id'"))
                .and_then(id_string)?;
            record = record.neighbor(id);
        }

        source.push(record);
    }
    Ok(source)
}

/// Read an adjacency JSON file.
pub fn read_graph_json(path: &Path, schema: &[&str]) -> Result<GraphSource> {
    let file = File::open(path)
        .with_context(|| format!("[io::json] Failed to open {}", path.display()))?;
    read_adjacency_json(BufReader::new(file), schema)
        .with_context(|| format!("[io::json] Failed to read {}", path.display()))
}

/// Write `graph` as adjacency JSON, adding each `(name, labels)` pair as an integer node field.
pub fn write_adjacency_json<W: Write>(mut writer: W, graph: &Graph, labels: &[(&str, &[u32])]) -> Result<()> {
    for (name, column) in labels {
        ensure!(column.len() == graph.node_count(),
            "[io::json] Label column '{name}' has {} entries for {} nodes", column.len(), graph.node_count());
    }

    let names = graph.attribute_names();
    let nodes = (0..graph.node_count()).map(|u| {
        let mut fields = Map::new();
        fields.insert("id".into(), id_value(graph.node_id(u)));
        for (k, name) in names.iter().enumerate() {
            fields.insert(name.clone(), json!(graph.row(u)[k]));
        }
        for (name, column) in labels {
            fields.insert((*name).to_string(), json!(column[u]));
        }
        Value::Object(fields)
    }).collect::<Vec<_>>();

    let adjacency = (0..graph.node_count()).map(|u| {
        Value::Array(graph.edges(u).map(|v| json!({ "id": id_value(graph.node_id(v)) })).collect())
    }).collect::<Vec<_>>();

    let document = json!({
        "directed": false,
        "multigraph": false,
        "graph": {},
        "nodes": nodes,
        "adjacency": adjacency,
    });

    serde_json::to_writer(&mut writer, &document).context("[io::json] Failed to write graph document")?;
    writer.flush().context("[io::json] Failed to flush graph document")?;
    Ok(())
}

/// Write an adjacency JSON file.
pub fn write_graph_json(path: &Path, graph: &Graph, labels: &[(&str, &[u32])]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("[io::json] Failed to create {}", path.display()))?;
    write_adjacency_json(BufWriter::new(file), graph, labels)
}
