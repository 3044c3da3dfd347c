//! Dataset shard files.
//!
//! # Schema: `hepten_shard_v1`
//!
//! | Column        | Arrow Type                      | Description                         |
//! |---------------|---------------------------------|-------------------------------------|
//! | `<input>`     | `FixedSizeList<Float64>[r × c]` | One per tensor input, row-major     |
//! | `Labels`      | `FixedSizeList<Float64>[k]`     | One-hot class vector                |
//! | `HLF`         | `FixedSizeList<Float64>[a]`     | Auxiliary event-level features      |
//!
//! Shapes and column names are kept in the Parquet key-value metadata under
//! [`META_KEY_SHARD`] so that [`read_shard`] can restore the `ndarray`s.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, FixedSizeListArray, Float64Array};
use arrow::datatypes::{DataType, Field, Float64Type, Schema};
use arrow::record_batch::RecordBatch;
use ndarray::{Array2, Array3};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};

use hep_core::{Error, Result};

/// Schema version string embedded in shard metadata.
pub const SHARD_SCHEMA_V1: &str = "hepten_shard_v1";

/// Parquet metadata key holding [`ShardMeta`] as JSON.
pub const META_KEY_SHARD: &str = "hepten.shard";

/// Column holding one-hot labels.
pub const LABELS_COLUMN: &str = "Labels";

/// Column holding auxiliary features.
pub const AUX_COLUMN: &str = "HLF";

/// Per-event object tensor of one input table.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorBlock {
    /// Input name (table key).
    pub name: String,
    /// Feature names along the last axis.
    pub columns: Vec<String>,
    /// `(n_samples, rows_per_event, n_columns)`.
    pub data: Array3<f64>,
}

/// Event-level auxiliary features.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxBlock {
    /// Feature names.
    pub columns: Vec<String>,
    /// `(n_samples, n_columns)`.
    pub data: Array2<f64>,
}

/// Contents of one shard file.
#[derive(Debug, Clone, PartialEq)]
pub struct Shard {
    /// Tensor inputs, in configuration order.
    pub inputs: Vec<TensorBlock>,
    /// `(n_samples, n_classes)` one-hot labels.
    pub labels: Array2<f64>,
    /// Auxiliary vector per sample.
    pub aux: Option<AuxBlock>,
}

impl Shard {
    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.labels.nrows()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InputMeta {
    name: String,
    rows_per_event: usize,
    columns: Vec<String>,
}

/// JSON descriptor stored in shard metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ShardMeta {
    schema_version: String,
    n_samples: usize,
    n_classes: usize,
    inputs: Vec<InputMeta>,
    aux_columns: Option<Vec<String>>,
}

fn fixed_list(values: Vec<f64>, size: usize) -> std::result::Result<ArrayRef, String> {
    let item = Arc::new(Field::new("item", DataType::Float64, false));
    let values: ArrayRef = Arc::new(Float64Array::from(values));
    let arr = FixedSizeListArray::try_new(item, size as i32, values, None)
        .map_err(|e| e.to_string())?;
    Ok(Arc::new(arr))
}

fn shard_to_record_batch(shard: &Shard) -> std::result::Result<RecordBatch, String> {
    let n = shard.n_samples();
    let mut fields = Vec::new();
    let mut arrays = Vec::new();
    let mut inputs = Vec::with_capacity(shard.inputs.len());

    for block in &shard.inputs {
        let (ns, rpe, nc) = block.data.dim();
        if ns != n {
            return Err(format!("input '{}' has {ns} samples, labels have {n}", block.name));
        }
        let array = fixed_list(block.data.iter().copied().collect(), (rpe * nc).max(1))?;
        fields.push(Field::new(&block.name, array.data_type().clone(), false));
        arrays.push(array);
        inputs.push(InputMeta {
            name: block.name.clone(),
            rows_per_event: rpe,
            columns: block.columns.clone(),
        });
    }

    let n_classes = shard.labels.ncols();
    let labels = fixed_list(shard.labels.iter().copied().collect(), n_classes.max(1))?;
    fields.push(Field::new(LABELS_COLUMN, labels.data_type().clone(), false));
    arrays.push(labels);

    if let Some(aux) = &shard.aux {
        if aux.data.nrows() != n {
            return Err(format!("aux has {} samples, labels have {n}", aux.data.nrows()));
        }
        let array = fixed_list(aux.data.iter().copied().collect(), aux.data.ncols().max(1))?;
        fields.push(Field::new(AUX_COLUMN, array.data_type().clone(), false));
        arrays.push(array);
    }

    let meta = ShardMeta {
        schema_version: SHARD_SCHEMA_V1.to_string(),
        n_samples: n,
        n_classes,
        inputs,
        aux_columns: shard.aux.as_ref().map(|a| a.columns.clone()),
    };
    let meta_json = serde_json::to_string(&meta).map_err(|e| e.to_string())?;
    let schema =
        Schema::new(fields).with_metadata(HashMap::from([(META_KEY_SHARD.to_string(), meta_json)]));
    RecordBatch::try_new(Arc::new(schema), arrays).map_err(|e| e.to_string())
}

/// Write a shard file. Failures are [`Error::StorageWrite`].
pub fn write_shard(path: &Path, shard: &Shard) -> Result<()> {
    let batch = shard_to_record_batch(shard).map_err(|e| Error::write(path, e))?;
    let props = WriterProperties::builder().set_compression(crate::default_compression()).build();
    let file = File::create(path).map_err(|e| Error::write(path, e))?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), Some(props)).map_err(|e| Error::write(path, e))?;
    writer.write(&batch).map_err(|e| Error::write(path, e))?;
    writer.close().map_err(|e| Error::write(path, e))?;
    Ok(())
}

fn column_values(batch: &RecordBatch, name: &str) -> Result<Vec<f64>> {
    let col = batch
        .column_by_name(name)
        .ok_or_else(|| Error::Validation(format!("shard is missing column '{name}'")))?;
    let list = col
        .as_fixed_size_list_opt()
        .ok_or_else(|| Error::Validation(format!("shard column '{name}' is not a fixed-size list")))?;
    let mut out = Vec::with_capacity(list.len() * list.value_length() as usize);
    for row in 0..list.len() {
        let values = list.value(row);
        let values = values.as_primitive::<Float64Type>();
        out.extend_from_slice(values.values());
    }
    Ok(out)
}

/// Read a shard file back into arrays.
pub fn read_shard(path: &Path) -> Result<Shard> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::Validation(format!("failed to read shard {}: {e}", path.display())))?;
    let meta_json = builder
        .schema()
        .metadata()
        .get(META_KEY_SHARD)
        .cloned()
        .ok_or_else(|| Error::Validation(format!("{} has no shard metadata", path.display())))?;
    let meta: ShardMeta = serde_json::from_str(&meta_json)?;
    if meta.schema_version != SHARD_SCHEMA_V1 {
        return Err(Error::Validation(format!(
            "unsupported shard schema '{}' in {}",
            meta.schema_version,
            path.display()
        )));
    }

    let schema = builder.schema().clone();
    let reader = builder
        .build()
        .map_err(|e| Error::Validation(format!("failed to read shard {}: {e}", path.display())))?;
    let batches: std::result::Result<Vec<_>, _> = reader.collect();
    let batches = batches
        .map_err(|e| Error::Validation(format!("failed to read shard {}: {e}", path.display())))?;
    let batch = arrow::compute::concat_batches(&schema, &batches)
        .map_err(|e| Error::Validation(format!("failed to read shard {}: {e}", path.display())))?;

    let n = meta.n_samples;
    let shape_err = |e: ndarray::ShapeError| Error::Validation(format!("bad shard shape: {e}"));

    let mut inputs = Vec::with_capacity(meta.inputs.len());
    for input in meta.inputs {
        let values = column_values(&batch, &input.name)?;
        let data = Array3::from_shape_vec((n, input.rows_per_event, input.columns.len()), values)
            .map_err(shape_err)?;
        inputs.push(TensorBlock { name: input.name, columns: input.columns, data });
    }

    let labels =
        Array2::from_shape_vec((n, meta.n_classes), column_values(&batch, LABELS_COLUMN)?)
            .map_err(shape_err)?;

    let aux = match meta.aux_columns {
        Some(columns) => {
            let data = Array2::from_shape_vec((n, columns.len()), column_values(&batch, AUX_COLUMN)?)
                .map_err(shape_err)?;
            Some(AuxBlock { columns, data })
        }
        None => None,
    };

    Ok(Shard { inputs, labels, aux })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn shard_file_restores_arrays() {
        let data = Array3::from_shape_fn((3, 2, 2), |(i, j, k)| (i * 100 + j * 10 + k) as f64);
        let shard = Shard {
            inputs: vec![TensorBlock {
                name: "EFlowTrack".into(),
                columns: vec!["PT_or_ET".into(), "Eta".into()],
                data,
            }],
            labels: array![[1.0, 0.0], [0.0, 1.0], [1.0, 0.0]],
            aux: Some(AuxBlock {
                columns: vec!["HT".into()],
                data: array![[120.0], [95.0], [300.0]],
            }),
        };
        let mut path = std::env::temp_dir();
        path.push(format!("hepten_shard_{}.parquet", std::process::id()));
        write_shard(&path, &shard).unwrap();
        let back = read_shard(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(back, shard);
    }

    #[test]
    fn mismatched_sample_counts_fail_as_write_error() {
        let shard = Shard {
            inputs: vec![TensorBlock {
                name: "Jet".into(),
                columns: vec!["PT".into()],
                data: Array3::zeros((2, 1, 1)),
            }],
            labels: Array2::zeros((3, 2)),
            aux: None,
        };
        let err = write_shard(Path::new("/tmp/never_written.parquet"), &shard).unwrap_err();
        assert!(matches!(err, Error::StorageWrite { .. }));
    }
}
