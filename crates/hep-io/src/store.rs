//! Directory-per-file columnar table store.
//!
//! A store is a directory holding one Parquet file per table key
//! (`Electron.parquet`, `EventChars.parquet`, `NumValues.parquet`, ...).
//! Tables support whole reads and contiguous row-range selects with column
//! projection; row counts come straight from the Parquet footer.

use std::fs::File;
use std::path::{Path, PathBuf};

use parquet::arrow::arrow_reader::{ParquetRecordBatchReaderBuilder, RowSelection, RowSelector};
use parquet::arrow::{ArrowWriter, ProjectionMask};
use parquet::file::properties::WriterProperties;

use hep_core::{Error, Result};

use crate::frame::Frame;

/// Key of the per-event count table; its row count is the store's event count.
pub const NUM_VALUES_KEY: &str = "NumValues";

const TABLE_EXT: &str = "parquet";

/// Handle to one store directory.
#[derive(Debug, Clone)]
pub struct TableStore {
    root: PathBuf,
}

impl TableStore {
    /// Create the store directory if needed.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| Error::write(&root, e))?;
        Ok(Self { root })
    }

    /// Open an existing store directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::Validation(format!("no such store: {}", root.display())));
        }
        Ok(Self { root })
    }

    /// Store directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// File backing `key`.
    pub fn table_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.{TABLE_EXT}"))
    }

    /// Whether `key` has been written.
    pub fn contains(&self, key: &str) -> bool {
        self.table_path(key).is_file()
    }

    /// Keys present in the store, sorted.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(TABLE_EXT)
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Write (or replace) a table.
    ///
    /// The table is written to a sibling temp file and renamed into place, so
    /// a failed write never leaves a truncated table behind.
    pub fn put(&self, key: &str, frame: &Frame) -> Result<()> {
        let dest = self.table_path(key);
        let tmp = self.root.join(format!(".{key}.{TABLE_EXT}.tmp"));
        let batch = frame.to_record_batch()?;
        let props =
            WriterProperties::builder().set_compression(crate::default_compression()).build();

        let file = File::create(&tmp).map_err(|e| Error::write(&dest, e))?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
            .map_err(|e| Error::write(&dest, e))?;
        writer.write(&batch).map_err(|e| Error::write(&dest, e))?;
        writer.close().map_err(|e| Error::write(&dest, e))?;
        std::fs::rename(&tmp, &dest).map_err(|e| Error::write(&dest, e))?;
        tracing::debug!(table = key, rows = frame.n_rows(), path = %dest.display(), "table written");
        Ok(())
    }

    /// Read a whole table.
    pub fn get(&self, key: &str) -> Result<Frame> {
        let path = self.table_path(key);
        let builder = self.reader_builder(&path)?;
        let reader = builder.build().map_err(|e| read_err(&path, e))?;
        let batches: std::result::Result<Vec<_>, _> = reader.collect();
        Frame::from_record_batches(&batches.map_err(|e| read_err(&path, e))?)
    }

    /// Read rows `start..stop` of a table, optionally projecting and reordering columns.
    ///
    /// `stop` is clipped to the table length. The range is not aligned to
    /// event boundaries; callers use the `NumValues` counts for that.
    pub fn select(
        &self,
        key: &str,
        start: usize,
        stop: usize,
        columns: Option<&[&str]>,
    ) -> Result<Frame> {
        let path = self.table_path(key);
        let mut builder = self.reader_builder(&path)?;
        let total = builder.metadata().file_metadata().num_rows() as usize;
        let stop = stop.min(total);
        let start = start.min(stop);

        if let Some(cols) = columns {
            let schema = builder.schema().clone();
            let mut indices = Vec::with_capacity(cols.len());
            for name in cols {
                let idx = schema.index_of(name).map_err(|_| {
                    Error::Configuration(format!(
                        "unknown column '{name}' in table '{key}' ({})",
                        path.display()
                    ))
                })?;
                indices.push(idx);
            }
            let mask = ProjectionMask::roots(builder.parquet_schema(), indices);
            builder = builder.with_projection(mask);
        }

        let selection = RowSelection::from(vec![
            RowSelector::skip(start),
            RowSelector::select(stop - start),
        ]);
        let reader =
            builder.with_row_selection(selection).build().map_err(|e| read_err(&path, e))?;
        let batches: std::result::Result<Vec<_>, _> = reader.collect();
        let frame = Frame::from_record_batches(&batches.map_err(|e| read_err(&path, e))?)?;

        // Projection yields schema order; restore the requested order.
        match columns {
            Some(cols) if frame.n_columns() > 0 => frame.select_columns(cols),
            Some(cols) => {
                Frame::new(cols.iter().map(|s| s.to_string()).collect(), vec![Vec::new(); cols.len()])
            }
            None => Ok(frame),
        }
    }

    /// Row count of a table, from footer metadata only.
    pub fn num_rows(&self, key: &str) -> Result<usize> {
        let path = self.table_path(key);
        let builder = self.reader_builder(&path)?;
        Ok(builder.metadata().file_metadata().num_rows() as usize)
    }

    /// Number of events in the store (rows of `NumValues`).
    pub fn n_events(&self) -> Result<usize> {
        self.num_rows(NUM_VALUES_KEY)
    }

    fn reader_builder(&self, path: &Path) -> Result<ParquetRecordBatchReaderBuilder<File>> {
        let file = File::open(path)
            .map_err(|e| Error::Validation(format!("cannot open table {}: {e}", path.display())))?;
        ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| read_err(path, e))
    }
}

fn read_err(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::Validation(format!("failed to read table {}: {e}", path.display()))
}

/// Store directories directly under `dir` (those holding a `NumValues` table), sorted.
pub fn list_stores(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() && path.join(format!("{NUM_VALUES_KEY}.{TABLE_EXT}")).is_file() {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_dir(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("hepten_store_{}_{}", std::process::id(), name));
        p
    }

    fn frame(n: usize) -> Frame {
        let a: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        Frame::new(vec!["a".into(), "b".into()], vec![a, b]).unwrap()
    }

    #[test]
    fn put_get_and_range_select() {
        let dir = tmp_dir("range");
        let store = TableStore::create(&dir).unwrap();
        store.put("T", &frame(10)).unwrap();
        store.put(NUM_VALUES_KEY, &frame(4)).unwrap();

        assert_eq!(store.keys().unwrap(), vec![NUM_VALUES_KEY.to_string(), "T".to_string()]);
        assert_eq!(store.get("T").unwrap().n_rows(), 10);
        assert_eq!(store.n_events().unwrap(), 4);

        let sel = store.select("T", 3, 6, Some(&["b", "a"])).unwrap();
        assert_eq!(sel.names(), &["b".to_string(), "a".to_string()]);
        assert_eq!(sel.column("a").unwrap(), &[3.0, 4.0, 5.0]);
        assert_eq!(sel.column("b").unwrap(), &[103.0, 104.0, 105.0]);

        let clipped = store.select("T", 8, 50, None).unwrap();
        assert_eq!(clipped.n_rows(), 2);

        let empty = store.select("T", 5, 5, Some(&["a"])).unwrap();
        assert_eq!(empty.n_rows(), 0);
        assert_eq!(empty.n_columns(), 1);

        assert!(store.select("T", 0, 1, Some(&["nope"])).is_err());
        assert_eq!(list_stores(dir.parent().unwrap()).unwrap().iter().filter(|p| **p == dir).count(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }
}
