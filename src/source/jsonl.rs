//! JSON-lines directory source.

use std::path::PathBuf;

use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use super::{RowSource, SourceError, SourceFiles, SourceRelation};
use crate::models::{Table, Value};
use crate::storage::jsonl::JsonlReader;

/// Reads each relation from a JSONL file holding one object per row.
///
/// Columns are the union of keys in first-seen order; a key missing from a
/// row reads as `Null`.
#[derive(Debug, Clone)]
pub struct JsonlSource {
    dir: PathBuf,
    files: SourceFiles,
}

impl JsonlSource {
    pub fn new(dir: PathBuf, files: SourceFiles) -> Self {
        Self { dir, files }
    }

    pub fn in_dir(dir: PathBuf) -> Self {
        Self::new(dir, SourceFiles::with_extension("jsonl"))
    }

    pub fn path(&self, relation: SourceRelation) -> PathBuf {
        self.dir.join(self.files.file(relation))
    }
}

fn objects_to_table(objects: Vec<Map<String, JsonValue>>) -> Result<Table, SourceError> {
    let mut columns: Vec<String> = Vec::new();
    for object in &objects {
        for key in object.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = objects
        .iter()
        .map(|object| {
            columns
                .iter()
                .map(|c| object.get(c).map(Value::from_json).unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    Ok(Table::from_rows(columns, rows)?)
}

impl RowSource for JsonlSource {
    fn execute(&self, relation: SourceRelation) -> Result<Table, SourceError> {
        let path = self.path(relation);
        let reader: JsonlReader<Map<String, JsonValue>> = JsonlReader::new(path.clone());
        if !reader.exists() {
            return Err(SourceError::NotFound(path));
        }

        let table = objects_to_table(reader.read_all()?)?;
        debug!("Read {} rows from {:?}", table.len(), path);
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_jsonl_union_of_keys() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("kills.jsonl"),
            concat!(
                "{\"Player\":\"Derke\",\"Player Kills\":4}\n",
                "{\"Player\":\"Boaster\",\"Kill Type\":\"All Kills\"}\n",
            ),
        )
        .unwrap();

        let source = JsonlSource::in_dir(dir.path().to_path_buf());
        let table = source.execute(SourceRelation::Kills).unwrap();

        assert_eq!(table.columns(), &["Player", "Player Kills", "Kill Type"]);
        assert_eq!(table.get(0, "Player Kills"), Some(&Value::Int(4)));
        assert!(table.get(1, "Player Kills").unwrap().is_null());
        assert!(table.get(0, "Kill Type").unwrap().is_null());
    }

    #[test]
    fn test_bad_line_is_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("maps_scores.jsonl"), "{\"Map\":\"Bind\"}\n{oops\n").unwrap();

        let source = JsonlSource::in_dir(dir.path().to_path_buf());
        assert!(matches!(
            source.execute(SourceRelation::MapScores),
            Err(SourceError::Storage(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let source = JsonlSource::in_dir(dir.path().to_path_buf());
        assert!(matches!(
            source.execute(SourceRelation::GameIds),
            Err(SourceError::NotFound(_))
        ));
    }
}
