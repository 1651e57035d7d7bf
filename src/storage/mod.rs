//! Result sinks.
//!
//! Leaderboard and relation tables leave the engine through a
//! [`ResultSink`]:
//! - Terminal preview
//! - CSV / JSONL files
//! - Formatted XLSX workbook
//! - Bar charts, one workbook per table
//! - Parquet files
//!
//! File sinks write to a temporary sibling and rename it into place, so a
//! failed write never leaves a partial table behind.

pub mod chart;
pub mod csv;
pub mod jsonl;
pub mod parquet;
pub mod terminal;
pub mod xlsx;

use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Table;

pub use self::chart::ChartSink;
pub use self::csv::CsvSink;
pub use self::jsonl::JsonlSink;
pub use self::parquet::ParquetSink;
pub use self::terminal::TerminalSink;
pub use self::xlsx::XlsxSink;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid JSON on line {line} of {path}: {source}")]
    JsonLine {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("Parquet error: {0}")]
    Parquet(String),

    #[error("Workbook error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Unknown export format: {0}")]
    UnknownFormat(String),
}

/// A destination for named result tables.
pub trait ResultSink: Send + Sync {
    /// Persist or display one table.
    fn write(&self, name: &str, table: &Table) -> Result<(), StorageError>;

    /// Flush anything buffered across writes.
    fn finish(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Terminal,
    Csv,
    Jsonl,
    Xlsx,
    Parquet,
    Chart,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Terminal => "terminal",
            ExportFormat::Csv => "csv",
            ExportFormat::Jsonl => "jsonl",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Parquet => "parquet",
            ExportFormat::Chart => "chart",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "terminal" | "stdout" => Ok(ExportFormat::Terminal),
            "csv" => Ok(ExportFormat::Csv),
            "jsonl" => Ok(ExportFormat::Jsonl),
            "xlsx" | "excel" => Ok(ExportFormat::Xlsx),
            "parquet" => Ok(ExportFormat::Parquet),
            "chart" | "charts" => Ok(ExportFormat::Chart),
            other => Err(StorageError::UnknownFormat(other.to_string())),
        }
    }
}

/// Configuration for output paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub out_dir: PathBuf,
    pub preview_rows: usize,
    pub workbook_name: String,
    /// Column charted when a table has it
    pub chart_metric: String,
}

impl StorageConfig {
    pub fn new(out_dir: PathBuf) -> Self {
        Self {
            out_dir,
            ..Self::default()
        }
    }

    /// `<out_dir>/<name>.<ext>`
    pub fn table_path(&self, name: &str, ext: &str) -> PathBuf {
        self.out_dir.join(format!("{name}.{ext}"))
    }

    pub fn workbook_path(&self) -> PathBuf {
        self.out_dir.join(&self.workbook_name)
    }

    /// `<out_dir>/charts/<name>.xlsx`
    pub fn chart_path(&self, name: &str) -> PathBuf {
        self.out_dir.join("charts").join(format!("{name}.xlsx"))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("./output"),
            preview_rows: 10,
            workbook_name: "leaderboards.xlsx".to_string(),
            chart_metric: "kd".to_string(),
        }
    }
}

/// Build one sink per requested format.
pub fn build_sinks(formats: &[ExportFormat], config: &StorageConfig) -> Vec<Box<dyn ResultSink>> {
    formats
        .iter()
        .map(|format| -> Box<dyn ResultSink> {
            match format {
                ExportFormat::Terminal => Box::new(TerminalSink::new(config.preview_rows)),
                ExportFormat::Csv => Box::new(CsvSink::new(config.clone())),
                ExportFormat::Jsonl => Box::new(JsonlSink::new(config.clone())),
                ExportFormat::Xlsx => Box::new(XlsxSink::new(config.workbook_path())),
                ExportFormat::Parquet => Box::new(ParquetSink::new(config.clone())),
                ExportFormat::Chart => Box::new(ChartSink::new(config.clone())),
            }
        })
        .collect()
}

/// Ensure the parent directory of `path` exists.
pub(crate) fn ensure_parent(path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

/// Write through `body` into a temporary sibling, then rename over `path`.
///
/// On error the temporary file is removed and `path` is left untouched.
pub(crate) fn write_atomic<F>(path: &Path, body: F) -> Result<(), StorageError>
where
    F: FnOnce(&mut BufWriter<fs::File>) -> Result<(), StorageError>,
{
    ensure_parent(path)?;
    let tmp = temp_path(path);

    let result = (|| -> Result<(), StorageError> {
        let mut writer = BufWriter::new(fs::File::create(&tmp)?);
        body(&mut writer)?;
        writer.flush()?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            fs::rename(&tmp, path)?;
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}
