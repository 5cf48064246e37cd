//! Graph projection of the star schema and an NDJSON graph writer.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use super::{io_error, GraphSink};
use crate::error::Result;
use crate::model::TimeOfReview;
use crate::pipeline::StarSchema;

#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub id: Uuid,
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub source: Uuid,
    pub target: Uuid,
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeKey {
    pub source_label: &'static str,
    pub target_label: &'static str,
    pub relationship: &'static str,
}

impl EdgeKey {
    const fn new(
        source_label: &'static str,
        target_label: &'static str,
        relationship: &'static str,
    ) -> Self {
        Self {
            source_label,
            target_label,
            relationship,
        }
    }
}

pub const HAS_GENRE: EdgeKey = EdgeKey::new("Media", "Genre", "HAS_GENRE");
pub const MADE_BY: EdgeKey = EdgeKey::new("Media", "Company", "MADE_BY");
pub const FEATURES: EdgeKey = EdgeKey::new("Media", "Role", "FEATURES");
pub const REVIEWED: EdgeKey = EdgeKey::new("Reviewer", "Media", "REVIEWED");

/// Node batches per label and edge batches per relationship, in emission order.
#[derive(Debug, Default)]
pub struct GraphProjection {
    pub nodes: IndexMap<&'static str, Vec<GraphNode>>,
    pub edges: IndexMap<EdgeKey, Vec<GraphEdge>>,
}

fn properties<T: Serialize>(row: &T) -> serde_json::Result<Map<String, Value>> {
    match serde_json::to_value(row)? {
        Value::Object(mut map) => {
            map.remove("id");
            Ok(map)
        }
        _ => Ok(Map::new()),
    }
}

fn nodes<'a, T, I>(rows: I) -> serde_json::Result<Vec<GraphNode>>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = (Uuid, &'a T)>,
{
    rows.into_iter()
        .map(|(id, row)| -> serde_json::Result<GraphNode> {
            Ok(GraphNode {
                id,
                properties: properties(row)?,
            })
        })
        .collect()
}

fn review_date(time: &TimeOfReview) -> Option<String> {
    match (time.year, time.month, time.day) {
        (Some(y), Some(m), Some(d)) => Some(format!("{y:04}-{m:02}-{d:02}")),
        (Some(y), Some(m), None) => Some(format!("{y:04}-{m:02}")),
        (Some(y), None, _) => Some(format!("{y:04}")),
        _ => None,
    }
}

pub fn project_graph(schema: &StarSchema) -> serde_json::Result<GraphProjection> {
    let mut projection = GraphProjection::default();

    projection
        .nodes
        .insert("Media", nodes(schema.media.iter().map(|m| (m.id, m)))?);
    projection
        .nodes
        .insert("Genre", nodes(schema.genres.iter().map(|r| (r.id, &r.attrs)))?);
    projection
        .nodes
        .insert("Company", nodes(schema.companies.iter().map(|r| (r.id, &r.attrs)))?);
    projection
        .nodes
        .insert("Role", nodes(schema.roles.iter().map(|r| (r.id, &r.attrs)))?);
    projection
        .nodes
        .insert("Reviewer", nodes(schema.reviewers.iter().map(|r| (r.id, &r.attrs)))?);
    projection
        .nodes
        .insert("Section", nodes(schema.sections.iter().map(|r| (r.id, &r.attrs)))?);

    for (bridge_name, key) in [
        ("BRIDGE_MEDIA_GENRE", HAS_GENRE),
        ("BRIDGE_MEDIA_COMPANY", MADE_BY),
        ("BRIDGE_MEDIA_ROLE", FEATURES),
    ] {
        let Some(bridge) = schema.bridge(bridge_name) else {
            continue;
        };
        let edges = bridge
            .rows
            .iter()
            .map(|row| {
                let mut properties = Map::new();
                if key == FEATURES {
                    properties.insert("weight".to_string(), json!(row.weight));
                }
                GraphEdge {
                    source: row.owner_id,
                    target: row.dimension_id,
                    properties,
                }
            })
            .collect();
        projection.edges.insert(key, edges);
    }

    let times: HashMap<Uuid, &TimeOfReview> =
        schema.times.iter().map(|t| (t.id, &t.attrs)).collect();
    let sections: HashMap<Uuid, &str> = schema
        .sections
        .iter()
        .map(|s| (s.id, s.attrs.section_name.as_str()))
        .collect();
    let reviewed = schema
        .facts
        .iter()
        .filter_map(|fact| {
            let reviewer = fact.reviewer_id?;
            let mut properties = Map::new();
            properties.insert("rating".to_string(), json!(fact.rating));
            properties.insert(
                "date".to_string(),
                json!(fact
                    .time_id
                    .and_then(|id| times.get(&id))
                    .and_then(|t| review_date(t))),
            );
            properties.insert(
                "section".to_string(),
                json!(fact.section_id.and_then(|id| sections.get(&id).copied())),
            );
            Some(GraphEdge {
                source: reviewer,
                target: fact.media_id,
                properties,
            })
        })
        .collect();
    projection.edges.insert(REVIEWED, reviewed);

    Ok(projection)
}

/// Writes `nodes.ndjson` and `edges.ndjson` into a directory, normally inside a
/// [`super::StagedOutput`].
///
/// Batches are merged in memory by stable id, later upserts replacing earlier ones, and only
/// reach disk on `commit`.
pub struct NdjsonGraphSink {
    dir: PathBuf,
    nodes: IndexMap<(String, Uuid), Value>,
    edges: IndexMap<(EdgeKey, Uuid, Uuid), Value>,
}

impl NdjsonGraphSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
        }
    }

    pub fn nodes_path(&self) -> PathBuf {
        self.dir.join("nodes.ndjson")
    }

    pub fn edges_path(&self) -> PathBuf {
        self.dir.join("edges.ndjson")
    }

    fn write_lines<'a>(path: &Path, lines: impl Iterator<Item = &'a Value>) -> Result<()> {
        let err = io_error(path);
        let mut out = BufWriter::new(File::create(path).map_err(&err)?);
        for line in lines {
            serde_json::to_writer(&mut out, line).map_err(|e| err(e.into()))?;
            out.write_all(b"\n").map_err(&err)?;
        }
        out.flush().map_err(&err)?;
        Ok(())
    }
}

impl GraphSink for NdjsonGraphSink {
    fn upsert_nodes(&mut self, label: &str, nodes: &[GraphNode]) -> Result<()> {
        for node in nodes {
            self.nodes.insert(
                (label.to_string(), node.id),
                json!({ "label": label, "id": node.id, "properties": node.properties }),
            );
        }
        Ok(())
    }

    fn upsert_edges(&mut self, key: &EdgeKey, edges: &[GraphEdge]) -> Result<()> {
        for edge in edges {
            self.edges.insert(
                (*key, edge.source, edge.target),
                json!({
                    "source_label": key.source_label,
                    "target_label": key.target_label,
                    "type": key.relationship,
                    "source": edge.source,
                    "target": edge.target,
                    "properties": edge.properties,
                }),
            );
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;
        Self::write_lines(&self.nodes_path(), self.nodes.values())?;
        Self::write_lines(&self.edges_path(), self.edges.values())?;
        info!(
            dir = %self.dir.display(),
            nodes = self.nodes.len(),
            edges = self.edges.len(),
            "graph written"
        );
        Ok(())
    }
}
