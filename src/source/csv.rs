//! CSV directory source.

use std::path::{Path, PathBuf};

use ::csv::{ReaderBuilder, Trim};
use tracing::debug;

use super::{RowSource, SourceError, SourceFiles, SourceRelation};
use crate::models::{Table, Value};

/// Reads each relation from a CSV file with a header row.
///
/// Empty cells become `Null`; everything else is kept as text for the view
/// builder to parse.
#[derive(Debug, Clone)]
pub struct CsvSource {
    dir: PathBuf,
    files: SourceFiles,
}

impl CsvSource {
    pub fn new(dir: PathBuf, files: SourceFiles) -> Self {
        Self { dir, files }
    }

    /// Source with the default `<relation>.csv` file names.
    pub fn in_dir(dir: PathBuf) -> Self {
        Self::new(dir, SourceFiles::with_extension("csv"))
    }

    pub fn path(&self, relation: SourceRelation) -> PathBuf {
        self.dir.join(self.files.file(relation))
    }
}

fn read_csv(path: &Path) -> Result<Table, SourceError> {
    if !path.exists() {
        return Err(SourceError::NotFound(path.to_path_buf()));
    }
    let csv_err = |source| SourceError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let headers = reader.headers().map_err(csv_err)?.clone();
    let mut table = Table::new(headers.iter());

    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let row = record
            .iter()
            .map(|field| {
                if field.is_empty() {
                    Value::Null
                } else {
                    Value::text(field)
                }
            })
            .collect();
        table.push_row(row)?;
    }

    debug!("Read {} rows from {:?}", table.len(), path);
    Ok(table)
}

impl RowSource for CsvSource {
    fn execute(&self, relation: SourceRelation) -> Result<Table, SourceError> {
        read_csv(&self.path(relation))
    }
}
