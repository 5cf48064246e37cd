//! Chunked readers over the tab-separated reference dumps.
//!
//! The dumps are large enough that they are never held in memory: a [`ChunkedCorpus`] reads
//! at most `chunk_size` raw rows at a time and hands them out as typed records.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use atoi::atoi;
use csv::{ByteRecord, ReaderBuilder};
use flate2::read::MultiGzDecoder;

use crate::error::{EngineError, Result};
use crate::normalization::NULL_SENTINEL;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A typed row of a reference dump.
pub trait CorpusRecord: Sized + Send {
    /// Header names, in the order `from_fields` receives them.
    const COLUMNS: &'static [&'static str];

    /// Build a record from the projected fields. `None` skips the row.
    fn from_fields(fields: &[&[u8]]) -> Option<Self>;
}

/// Field as text, `None` for the null sentinel, blanks and invalid UTF-8.
pub fn field_str(raw: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(raw).ok()?.trim();
    if text.is_empty() || text == NULL_SENTINEL {
        None
    } else {
        Some(text)
    }
}

pub fn field_u32(raw: &[u8]) -> Option<u32> {
    if raw == NULL_SENTINEL.as_bytes() {
        return None;
    }
    atoi::<u32>(raw)
}

pub fn field_i32(raw: &[u8]) -> Option<i32> {
    if raw == NULL_SENTINEL.as_bytes() {
        return None;
    }
    atoi::<i32>(raw)
}

/// Open a dump for reading, transparently decompressing gzip input.
fn open_source(path: &Path) -> Result<Box<dyn Read>> {
    let io_err = |source| EngineError::CorpusIo {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;
    let mut reader = BufReader::with_capacity(8 << 20, file);
    let gzipped = reader.fill_buf().map_err(io_err)?.starts_with(&GZIP_MAGIC);
    if gzipped {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

pub struct ChunkedCorpus<R> {
    path: PathBuf,
    reader: csv::Reader<Box<dyn Read>>,
    columns: Vec<usize>,
    chunk_size: usize,
    record: ByteRecord,
    rows_read: u64,
    exhausted: bool,
    _record: PhantomData<R>,
}

impl<R: CorpusRecord> ChunkedCorpus<R> {
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self> {
        let source = open_source(path)?;
        // The dumps never quote; titles routinely contain bare `"`.
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .quoting(false)
            .flexible(true)
            .trim(csv::Trim::None)
            .from_reader(source);

        let headers = reader
            .byte_headers()
            .map_err(|source| EngineError::CorpusRecord {
                path: path.to_path_buf(),
                record: 0,
                source,
            })?
            .clone();
        let columns = R::COLUMNS
            .iter()
            .map(|&column| {
                headers
                    .iter()
                    .position(|h| h == column.as_bytes())
                    .ok_or_else(|| EngineError::MissingColumn {
                        path: path.to_path_buf(),
                        column,
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            columns,
            chunk_size: chunk_size.max(1),
            record: ByteRecord::new(),
            rows_read: 0,
            exhausted: false,
            _record: PhantomData,
        })
    }

    #[cfg(test)]
    fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Read up to `chunk_size` raw rows. `Ok(None)` once the dump is exhausted.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<R>>> {
        if self.exhausted {
            return Ok(None);
        }
        let mut chunk = Vec::with_capacity(self.chunk_size.min(1 << 16));
        let mut raw = 0usize;

        while raw < self.chunk_size {
            let more = self
                .reader
                .read_byte_record(&mut self.record)
                .map_err(|source| EngineError::CorpusRecord {
                    path: self.path.clone(),
                    record: self.rows_read + 1,
                    source,
                })?;
            if !more {
                self.exhausted = true;
                break;
            }
            raw += 1;
            self.rows_read += 1;

            let fields: Vec<&[u8]> = self
                .columns
                .iter()
                .map(|idx| self.record.get(*idx).unwrap_or(NULL_SENTINEL.as_bytes()))
                .collect();
            if let Some(row) = R::from_fields(&fields) {
                chunk.push(row);
            }
        }

        if raw == 0 {
            Ok(None)
        } else {
            Ok(Some(chunk))
        }
    }
}

impl<R: CorpusRecord> Iterator for ChunkedCorpus<R> {
    type Item = Result<Vec<R>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => None,
            Err(e) => {
                self.exhausted = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;
    use std::path::{Path, PathBuf};

    use flate2::write::GzEncoder;
    use flate2::Compression;

    /// Write `header` and `rows` as a gzip TSV dump under `dir`.
    pub fn write_gz_tsv(dir: &Path, name: &str, header: &str, rows: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let file = std::fs::File::create(&path).unwrap();
        let mut gz = GzEncoder::new(file, Compression::fast());
        writeln!(gz, "{header}").unwrap();
        for row in rows {
            writeln!(gz, "{row}").unwrap();
        }
        gz.finish().unwrap();
        path
    }
}
