//! Pipe-delimited table files, one `<TABLE>.csv` per table.

use std::fs;
use std::path::PathBuf;

use csv::WriterBuilder;
use serde_json::Value;
use tracing::{debug, info};

use super::{io_error, RelationalSink, Table};
use crate::error::Result;

pub const DELIMITER: u8 = b'|';

/// Writes one `<TABLE>.csv` per table into `dir`, normally a [`super::StagedOutput`] path.
pub struct CsvTableSink {
    dir: PathBuf,
    written: Vec<String>,
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

impl CsvTableSink {
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;
        Ok(Self {
            dir,
            written: Vec::new(),
        })
    }

    pub fn table_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.csv"))
    }
}

impl RelationalSink for CsvTableSink {
    fn write_table(&mut self, table: &Table) -> Result<()> {
        let path = self.table_path(&table.name);
        let err = io_error(&path);
        let mut writer = WriterBuilder::new()
            .delimiter(DELIMITER)
            .from_path(&path)
            .map_err(|e| err(e.into()))?;

        if !table.columns.is_empty() {
            writer.write_record(&table.columns).map_err(|e| err(e.into()))?;
        }
        for row in &table.rows {
            let record = table.columns.iter().map(|c| cell(row.get(c)));
            writer.write_record(record).map_err(|e| err(e.into()))?;
        }
        writer.flush().map_err(&err)?;

        debug!(table = %table.name, rows = table.len(), "table written");
        self.written.push(table.name.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        info!(dir = %self.dir.display(), tables = self.written.len(), "tables complete");
        Ok(())
    }
}
