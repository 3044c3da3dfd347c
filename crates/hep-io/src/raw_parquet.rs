//! Raw detector records stored as jagged Parquet columns.
//!
//! # Layout
//!
//! One Parquet row per raw entry. Every column is named `<Object>.<Field>`
//! (e.g. `Electron.PT`, `MissingET.MET`, `Jet.BTag`) and has type
//! `List<Float64>` holding one value per object instance. Plain `Float64`
//! columns are accepted as single-valued fields.
//!
//! Any failure to decode a file is reported as [`Error::CorruptSource`] so
//! bulk ingestion can skip the file and move on.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Builder, ListBuilder};
use arrow::datatypes::{DataType, Field, Float64Type, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::properties::WriterProperties;

use hep_core::{Error, EventSource, Result};

use crate::jagged::{JaggedEvents, RaggedField};

/// Read a raw-event Parquet file into memory.
pub fn read_raw_events(path: &Path) -> Result<JaggedEvents> {
    let file = File::open(path).map_err(|e| Error::corrupt(path, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| Error::corrupt(path, e))?;
    let reader = builder.build().map_err(|e| Error::corrupt(path, e))?;
    let batches: std::result::Result<Vec<RecordBatch>, _> = reader.collect();
    let batches = batches.map_err(|e| Error::corrupt(path, e))?;
    events_from_batches(&batches).map_err(|reason| Error::corrupt(path, reason))
}

fn events_from_batches(batches: &[RecordBatch]) -> std::result::Result<JaggedEvents, String> {
    let Some(first) = batches.first() else {
        return Ok(JaggedEvents::new(0));
    };
    let schema = first.schema();
    let n_entries: usize = batches.iter().map(|b| b.num_rows()).sum();

    let mut events = JaggedEvents::new(n_entries);
    for (idx, field) in schema.fields().iter().enumerate() {
        let mut values = RaggedField::default();
        for batch in batches {
            append_column(&mut values, batch.column(idx), field.name())?;
        }
        events.insert(field.name().clone(), values).map_err(|e| e.to_string())?;
    }
    Ok(events)
}

fn append_column(col: &mut RaggedField, array: &ArrayRef, name: &str) -> std::result::Result<(), String> {
    match array.data_type() {
        DataType::List(_) => {
            let list = array.as_list::<i32>();
            for row in 0..list.len() {
                if list.is_null(row) {
                    col.push(&[]);
                    continue;
                }
                let values = list.value(row);
                let values = values
                    .as_primitive_opt::<Float64Type>()
                    .ok_or_else(|| format!("column '{name}': expected List<Float64>, got {:?}", array.data_type()))?;
                col.push(values.values());
            }
            Ok(())
        }
        DataType::Float64 => {
            let values = array.as_primitive::<Float64Type>();
            for row in 0..values.len() {
                if values.is_null(row) {
                    col.push(&[]);
                } else {
                    col.push(&[values.value(row)]);
                }
            }
            Ok(())
        }
        other => Err(format!("column '{name}': unsupported type {other:?}")),
    }
}

/// Write raw events as jagged Parquet (fields in sorted order).
pub fn write_raw_events(path: &Path, events: &JaggedEvents) -> Result<()> {
    let batch = raw_events_to_record_batch(events).map_err(|e| Error::write(path, e))?;
    let props = WriterProperties::builder().set_compression(crate::default_compression()).build();
    let file = File::create(path).map_err(|e| Error::write(path, e))?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), Some(props)).map_err(|e| Error::write(path, e))?;
    writer.write(&batch).map_err(|e| Error::write(path, e))?;
    writer.close().map_err(|e| Error::write(path, e))?;
    Ok(())
}

fn raw_events_to_record_batch(events: &JaggedEvents) -> std::result::Result<RecordBatch, String> {
    let names = events.field_names();
    let mut fields = Vec::with_capacity(names.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(names.len());

    for name in names {
        let mut builder = ListBuilder::new(Float64Builder::new());
        for entry in 0..events.n_entries() {
            let values = events.field(entry, name).map_err(|e| e.to_string())?;
            builder.values().append_slice(values);
            builder.append(true);
        }
        let array = builder.finish();
        fields.push(Field::new(name, array.data_type().clone(), true));
        arrays.push(Arc::new(array));
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).map_err(|e| e.to_string())
}
