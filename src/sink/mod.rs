//! Output boundary: relational tables and graph batches, plus file-backed writers for both.

pub mod delimited;
pub mod graph;
pub mod staged;

use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{EngineError, Result};

pub use delimited::CsvTableSink;
pub use graph::{project_graph, EdgeKey, GraphEdge, GraphNode, GraphProjection, NdjsonGraphSink};
pub use staged::StagedOutput;

pub(crate) fn io_error(target: &Path) -> impl Fn(std::io::Error) -> EngineError + '_ {
    move |source| EngineError::Sink {
        target: target.display().to_string(),
        source,
    }
}

/// A named table of flat rows. Columns follow the first row's field order.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl Table {
    pub fn new(name: impl Into<String>, rows: Vec<Map<String, Value>>) -> Self {
        let columns = rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    /// Serialize `rows`, renaming their `id` field to `key_column`.
    pub fn from_records<'a, T, I>(
        name: impl Into<String>,
        key_column: &str,
        rows: I,
    ) -> serde_json::Result<Self>
    where
        T: Serialize + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let mut maps = Vec::new();
        for row in rows {
            let Value::Object(map) = serde_json::to_value(row)? else {
                continue;
            };
            maps.push(
                map.into_iter()
                    .map(|(k, v)| if k == "id" { (key_column.to_string(), v) } else { (k, v) })
                    .collect(),
            );
        }
        Ok(Self::new(name, maps))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Receives finished tables. `commit` closes the batch; the file-backed sinks write into a
/// [`StagedOutput`] that is published only after every sink has committed.
pub trait RelationalSink {
    fn write_table(&mut self, table: &Table) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
}

/// Receives node batches per label and edge batches per (source, target, relationship),
/// upserted by stable id.
pub trait GraphSink {
    fn upsert_nodes(&mut self, label: &str, nodes: &[GraphNode]) -> Result<()>;
    fn upsert_edges(&mut self, key: &EdgeKey, edges: &[GraphEdge]) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Genre;
    use crate::canonical::CanonicalRow;
    use uuid::Uuid;

    #[test]
    fn record_ids_become_key_columns() {
        let rows = vec![CanonicalRow {
            id: Uuid::nil(),
            attrs: Genre {
                genre_title: "Drama".into(),
            },
        }];
        let table = Table::from_records("GENRES", "genre_id", &rows).unwrap();
        assert_eq!(table.columns, vec!["genre_id", "genre_title"]);
        assert_eq!(table.rows[0]["genre_title"], Value::from("Drama"));
    }

    #[test]
    fn empty_tables_have_no_columns() {
        let table = Table::new("BRIDGE_MEDIA_COMPANY", Vec::new());
        assert!(table.is_empty());
        assert!(table.columns.is_empty());
    }
}
