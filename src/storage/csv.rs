//! CSV result sink.

use tracing::info;

use super::{write_atomic, ResultSink, StorageConfig, StorageError};
use crate::models::Table;

/// Writes each table to `<out_dir>/<name>.csv` with a header row.
///
/// Null cells are written as empty fields. An empty table still produces
/// the header line.
#[derive(Debug, Clone)]
pub struct CsvSink {
    config: StorageConfig,
}

impl CsvSink {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }
}

impl ResultSink for CsvSink {
    fn write(&self, name: &str, table: &Table) -> Result<(), StorageError> {
        let path = self.config.table_path(name, "csv");

        write_atomic(&path, |out| {
            let mut writer = ::csv::Writer::from_writer(out);
            writer.write_record(table.columns())?;
            for row in table.rows() {
                writer.write_record(row.iter().map(|v| v.to_string()))?;
            }
            writer.flush()?;
            Ok(())
        })?;

        info!("Wrote {} rows to {:?}", table.len(), path);
        Ok(())
    }
}
