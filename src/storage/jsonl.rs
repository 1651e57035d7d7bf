//! JSONL (JSON Lines) storage.
//!
//! Each line is one JSON object. Result tables are written one object per
//! row, keyed by column name in column order.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::marker::PhantomData;
use std::path::PathBuf;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use super::{write_atomic, ResultSink, StorageConfig, StorageError};
use crate::models::Table;

/// JSONL file writer.
pub struct JsonlWriter<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Write entities, replacing the entire file.
    pub fn write_all(&self, entities: &[T]) -> Result<usize, StorageError> {
        write_atomic(&self.path, |writer| {
            for entity in entities {
                let json = serde_json::to_string(entity)?;
                writeln!(writer, "{}", json)?;
            }
            Ok(())
        })?;

        debug!("Wrote {} lines to {:?}", entities.len(), self.path);
        Ok(entities.len())
    }
}

/// JSONL file reader.
pub struct JsonlReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read all entities from the file.
    ///
    /// Blank lines are skipped; a line that does not parse is an error
    /// carrying its 1-based line number.
    pub fn read_all(&self) -> Result<Vec<T>, StorageError> {
        if !self.path.exists() {
            return Err(StorageError::PathNotFound(self.path.clone()));
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut entities = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let entity = serde_json::from_str(&line).map_err(|source| StorageError::JsonLine {
                path: self.path.clone(),
                line: idx + 1,
                source,
            })?;
            entities.push(entity);
        }

        debug!("Read {} entities from {:?}", entities.len(), self.path);
        Ok(entities)
    }
}

/// Writes each table to `<out_dir>/<name>.jsonl`.
#[derive(Debug, Clone)]
pub struct JsonlSink {
    config: StorageConfig,
}

impl JsonlSink {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }
}

impl ResultSink for JsonlSink {
    fn write(&self, name: &str, table: &Table) -> Result<(), StorageError> {
        let path = self.config.table_path(name, "jsonl");
        let count = JsonlWriter::new(path.clone()).write_all(&table.to_json_rows())?;
        info!("Wrote {} rows to {:?}", count, path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestEntity {
        player: String,
        kills: u32,
    }

    fn entity(player: &str, kills: u32) -> TestEntity {
        TestEntity {
            player: player.to_string(),
            kills,
        }
    }

    #[test]
    fn test_jsonl_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.jsonl");

        let entities = vec![entity("aspas", 30), entity("Derke", 25)];

        let writer: JsonlWriter<TestEntity> = JsonlWriter::new(path.clone());
        assert_eq!(writer.write_all(&entities).unwrap(), 2);

        let reader: JsonlReader<TestEntity> = JsonlReader::new(path);
        assert_eq!(reader.read_all().unwrap(), entities);
    }

    #[test]
    fn test_write_all_overwrites_existing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("overwrite.jsonl");

        let writer: JsonlWriter<TestEntity> = JsonlWriter::new(path.clone());
        let reader: JsonlReader<TestEntity> = JsonlReader::new(path);

        writer.write_all(&[entity("Old", 1)]).unwrap();
        writer
            .write_all(&[entity("New1", 2), entity("New2", 3)])
            .unwrap();

        let read = reader.read_all().unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].player, "New1");
    }

    #[test]
    fn test_read_all_rejects_bad_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad_lines.jsonl");

        std::fs::write(
            &path,
            "{\"player\":\"A\",\"kills\":1}\n\nnot-valid-json\n",
        )
        .unwrap();

        let reader: JsonlReader<TestEntity> = JsonlReader::new(path);
        match reader.read_all() {
            Err(StorageError::JsonLine { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected JsonLine error, got {:?}", other),
        }
    }

    #[test]
    fn test_read_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let reader: JsonlReader<TestEntity> =
            JsonlReader::new(temp_dir.path().join("nonexistent.jsonl"));

        assert!(!reader.exists());
        assert!(matches!(
            reader.read_all(),
            Err(StorageError::PathNotFound(_))
        ));
    }

    #[test]
    fn test_sink_keeps_column_order_and_nulls() {
        let temp_dir = TempDir::new().unwrap();
        let sink = JsonlSink::new(StorageConfig::new(temp_dir.path().to_path_buf()));

        let table = Table::from_rows(
            ["rank", "player", "kd"],
            vec![
                vec![Value::Int(1), Value::text("A"), Value::Float(6.0)],
                vec![Value::Int(2), Value::text("C"), Value::Null],
            ],
        )
        .unwrap();

        sink.write("global_kd", &table).unwrap();

        let content = std::fs::read_to_string(temp_dir.path().join("global_kd.jsonl")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], r#"{"rank":1,"player":"A","kd":6.0}"#);
        assert_eq!(lines[1], r#"{"rank":2,"player":"C","kd":null}"#);
    }

    #[test]
    fn test_sink_empty_table_writes_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let sink = JsonlSink::new(StorageConfig::new(temp_dir.path().to_path_buf()));

        sink.write("nemesis", &Table::new(["player"])).unwrap();

        let content = std::fs::read_to_string(temp_dir.path().join("nemesis.jsonl")).unwrap();
        assert!(content.is_empty());
    }
}
