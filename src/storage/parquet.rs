//! Parquet result sink.
//!
//! Column types are inferred from the cells: all-integer columns become
//! Int64, numeric columns with any float become Float64, anything else is
//! Utf8. Every field is nullable, so undefined ratios survive as nulls.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::{debug, info};

use super::{write_atomic, ResultSink, StorageConfig, StorageError};
use crate::models::{Table, Value};

fn parquet_err(e: impl std::fmt::Display) -> StorageError {
    StorageError::Parquet(e.to_string())
}

/// Arrow type for one column of cells.
fn infer_type<'a>(cells: impl Iterator<Item = &'a Value>) -> DataType {
    let mut seen_int = false;
    let mut seen_float = false;

    for cell in cells {
        match cell {
            Value::Null => {}
            Value::Int(_) => seen_int = true,
            Value::Float(_) => seen_float = true,
            Value::Text(_) => return DataType::Utf8,
        }
    }

    match (seen_int, seen_float) {
        (_, true) => DataType::Float64,
        (true, false) => DataType::Int64,
        (false, false) => DataType::Utf8,
    }
}

/// Arrow schema for a table.
pub fn table_schema(table: &Table) -> Schema {
    let fields: Vec<Field> = table
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let data_type = infer_type(table.rows().iter().map(|r| &r[idx]));
            Field::new(name, data_type, true)
        })
        .collect();
    Schema::new(fields)
}

/// Convert a table into a single record batch.
pub fn table_to_batch(table: &Table) -> Result<RecordBatch, StorageError> {
    let schema = Arc::new(table_schema(table));

    let arrays: Vec<ArrayRef> = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(idx, field)| -> ArrayRef {
            let cells = table.rows().iter().map(|r| &r[idx]);
            match field.data_type() {
                DataType::Int64 => Arc::new(Int64Array::from(
                    cells.map(Value::as_i64).collect::<Vec<_>>(),
                )),
                DataType::Float64 => Arc::new(Float64Array::from(
                    cells.map(Value::as_f64).collect::<Vec<_>>(),
                )),
                _ => Arc::new(StringArray::from(
                    cells
                        .map(|v| if v.is_null() { None } else { Some(v.to_string()) })
                        .collect::<Vec<_>>(),
                )),
            }
        })
        .collect();

    RecordBatch::try_new(schema, arrays).map_err(parquet_err)
}

/// Writes each table to `<out_dir>/<name>.parquet`, Snappy-compressed.
#[derive(Debug, Clone)]
pub struct ParquetSink {
    config: StorageConfig,
}

impl ParquetSink {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }
}

impl ResultSink for ParquetSink {
    fn write(&self, name: &str, table: &Table) -> Result<(), StorageError> {
        let path = self.config.table_path(name, "parquet");
        let batch = table_to_batch(table)?;

        write_atomic(&path, |out| {
            let props = WriterProperties::builder()
                .set_compression(Compression::SNAPPY)
                .build();

            let mut writer =
                ArrowWriter::try_new(out, batch.schema(), Some(props)).map_err(parquet_err)?;
            writer.write(&batch).map_err(parquet_err)?;
            writer.close().map_err(parquet_err)?;
            Ok(())
        })?;

        info!("Wrote {} rows to {:?}", table.len(), path);
        Ok(())
    }
}

/// Read all record batches from a Parquet file.
pub fn read_batches(path: &Path) -> Result<Vec<RecordBatch>, StorageError> {
    if !path.exists() {
        return Err(StorageError::PathNotFound(path.to_path_buf()));
    }

    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(parquet_err)?
        .build()
        .map_err(parquet_err)?;

    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .map_err(parquet_err)?;

    debug!("Read {} batches from {:?}", batches.len(), path);
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use tempfile::TempDir;

    fn leaderboard() -> Table {
        Table::from_rows(
            ["rank", "player", "kills_total", "kd"],
            vec![
                vec![Value::Int(1), Value::text("A"), Value::Int(30), Value::Float(6.0)],
                vec![Value::Int(2), Value::text("C"), Value::Int(4), Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_inferred_schema() {
        let schema = table_schema(&leaderboard());

        assert_eq!(schema.fields().len(), 4);
        assert_eq!(schema.field_with_name("rank").unwrap().data_type(), &DataType::Int64);
        assert_eq!(schema.field_with_name("player").unwrap().data_type(), &DataType::Utf8);
        assert_eq!(schema.field_with_name("kd").unwrap().data_type(), &DataType::Float64);
        assert!(schema.fields().iter().all(|f| f.is_nullable()));
    }

    #[test]
    fn test_mixed_int_float_is_float() {
        let table = Table::from_rows(
            ["x"],
            vec![vec![Value::Int(1)], vec![Value::Float(0.5)], vec![Value::Null]],
        )
        .unwrap();
        assert_eq!(table_schema(&table).field(0).data_type(), &DataType::Float64);
    }

    #[test]
    fn test_write_and_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let sink = ParquetSink::new(StorageConfig::new(temp_dir.path().to_path_buf()));

        sink.write("global_kd", &leaderboard()).unwrap();

        let batches = read_batches(&temp_dir.path().join("global_kd.parquet")).unwrap();
        assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 2);

        let kd = batches[0]
            .column(3)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(kd.value(0), 6.0);
        assert!(kd.is_null(1));
    }

    #[test]
    fn test_empty_table_writes_schema_only() {
        let temp_dir = TempDir::new().unwrap();
        let sink = ParquetSink::new(StorageConfig::new(temp_dir.path().to_path_buf()));

        sink.write("nemesis", &Table::new(["player", "enemy"])).unwrap();

        let batches = read_batches(&temp_dir.path().join("nemesis.parquet")).unwrap();
        assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 0);
    }

    #[test]
    fn test_read_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            read_batches(&temp_dir.path().join("missing.parquet")),
            Err(StorageError::PathNotFound(_))
        ));
    }
}
