//! Named `f64` column frames: the unit stored in and read from a [`crate::TableStore`].

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;

use hep_core::{Error, Result};

/// Column-oriented table of `f64` values (Structure-of-Arrays).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl Frame {
    /// Build a frame; all columns must have the same length.
    pub fn new(names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(Error::Validation(format!(
                "frame has {} names but {} columns",
                names.len(),
                columns.len()
            )));
        }
        if let Some(first) = columns.first()
            && let Some((i, c)) = columns.iter().enumerate().find(|(_, c)| c.len() != first.len())
        {
            return Err(Error::Validation(format!(
                "column length mismatch for '{}': expected {}, got {}",
                names[i],
                first.len(),
                c.len()
            )));
        }
        Ok(Self { names, columns })
    }

    /// Column names in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// All columns in order.
    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Number of columns.
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Position of a named column.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Data of a named column.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.position(name).map(|i| self.columns[i].as_slice())
    }

    /// A frame with just `names`, in that order.
    pub fn select_columns(&self, names: &[&str]) -> Result<Frame> {
        let mut cols = Vec::with_capacity(names.len());
        for name in names {
            let col = self.column(name).ok_or_else(|| {
                Error::Configuration(format!("unknown column '{name}' (have {:?})", self.names))
            })?;
            cols.push(col.to_vec());
        }
        Frame::new(names.iter().map(|s| s.to_string()).collect(), cols)
    }

    /// Row-major copy of all values.
    pub fn to_row_major(&self) -> Vec<f64> {
        let n_rows = self.n_rows();
        let n_cols = self.n_columns();
        let mut out = Vec::with_capacity(n_rows * n_cols);
        for r in 0..n_rows {
            for c in &self.columns {
                out.push(c[r]);
            }
        }
        out
    }

    /// Convert to an Arrow batch (all columns non-null `Float64`).
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let fields: Vec<Field> =
            self.names.iter().map(|n| Field::new(n, DataType::Float64, false)).collect();
        let arrays: Vec<ArrayRef> = self
            .columns
            .iter()
            .map(|c| Arc::new(Float64Array::from(c.clone())) as ArrayRef)
            .collect();
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
            .map_err(|e| Error::Validation(format!("failed to build RecordBatch: {e}")))
    }

    /// Concatenate Arrow batches sharing a schema into one frame.
    ///
    /// Integer columns are widened to `f64`.
    pub fn from_record_batches(batches: &[RecordBatch]) -> Result<Frame> {
        let Some(first) = batches.first() else {
            return Ok(Frame::default());
        };
        let schema = first.schema();
        let names: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
        let n_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(n_rows); names.len()];

        for batch in batches {
            for (i, col) in columns.iter_mut().enumerate() {
                let array = batch.column(i);
                match array.data_type() {
                    DataType::Float64 => {
                        col.extend_from_slice(array.as_primitive::<Float64Type>().values())
                    }
                    DataType::Int64 => col.extend(
                        array.as_primitive::<Int64Type>().values().iter().map(|&v| v as f64),
                    ),
                    other => {
                        return Err(Error::Validation(format!(
                            "column '{}': expected Float64, got {other:?}",
                            names[i]
                        )));
                    }
                }
            }
        }
        Frame::new(names, columns)
    }
}
