//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::leaderboards::{LeaderboardKind, ThresholdError, Thresholds};
use crate::source::{CsvSource, JsonlSource, RowSource, SourceFiles};
use crate::storage::{ExportFormat, StorageConfig};
use crate::views::ViewBuilder;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Invalid thresholds: {0}")]
    Threshold(#[from] ThresholdError),
}

/// Input file format of the source relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Jsonl,
}

impl SourceFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SourceFormat::Csv => "csv",
            SourceFormat::Jsonl => "jsonl",
        }
    }
}

/// Where and how the raw relations are read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_format")]
    pub format: SourceFormat,

    /// File names inside `data_dir`; default `<relation>.<format>`
    #[serde(default)]
    pub maps_file: Option<String>,

    #[serde(default)]
    pub kills_file: Option<String>,

    #[serde(default)]
    pub game_ids_file: Option<String>,

    /// Map label of rollup rows to drop, e.g. "All Maps"; unset keeps every row
    #[serde(default)]
    pub rollup_map: Option<String>,
}

fn default_source_format() -> SourceFormat {
    SourceFormat::Csv
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            format: default_source_format(),
            maps_file: None,
            kills_file: None,
            game_ids_file: None,
            rollup_map: None,
        }
    }
}

impl SourceConfig {
    pub fn files(&self) -> SourceFiles {
        let defaults = SourceFiles::with_extension(self.format.extension());
        SourceFiles {
            maps: self.maps_file.clone().unwrap_or(defaults.maps),
            kills: self.kills_file.clone().unwrap_or(defaults.kills),
            game_ids: self.game_ids_file.clone().unwrap_or(defaults.game_ids),
        }
    }

    /// Row source reading from `data_dir`.
    pub fn row_source(&self, data_dir: &Path) -> Box<dyn RowSource> {
        let dir = data_dir.to_path_buf();
        match self.format {
            SourceFormat::Csv => Box::new(CsvSource::new(dir, self.files())),
            SourceFormat::Jsonl => Box::new(JsonlSource::new(dir, self.files())),
        }
    }

    pub fn view_builder(&self) -> ViewBuilder {
        let rollup = self
            .rollup_map
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);
        ViewBuilder::new(rollup)
    }
}

/// Leaderboard selection and thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    /// Minimum distinct matches for thresholded boards
    #[serde(default = "default_min_matches")]
    pub min_matches: i64,

    /// Ranks kept per partition
    #[serde(default = "default_top_n")]
    pub top_n: i64,

    /// Boards to compute; empty means all
    #[serde(default)]
    pub boards: Vec<String>,

    #[serde(default)]
    pub parallel: bool,
}

fn default_min_matches() -> i64 {
    Thresholds::DEFAULT_MIN_MATCHES as i64
}

fn default_top_n() -> i64 {
    Thresholds::DEFAULT_TOP_N as i64
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            min_matches: default_min_matches(),
            top_n: default_top_n(),
            boards: Vec::new(),
            parallel: false,
        }
    }
}

impl LeaderboardConfig {
    pub fn thresholds(&self) -> Result<Thresholds, ThresholdError> {
        Thresholds::new(self.min_matches, self.top_n)
    }

    /// Selected boards in catalog order.
    pub fn board_kinds(&self) -> Result<Vec<LeaderboardKind>, ConfigError> {
        if self.boards.is_empty() {
            return Ok(LeaderboardKind::ALL.to_vec());
        }

        let mut kinds = self
            .boards
            .iter()
            .map(|b| {
                b.parse::<LeaderboardKind>()
                    .map_err(|e| ConfigError::ValidationError(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        kinds.sort();
        kinds.dedup();
        Ok(kinds)
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_formats")]
    pub formats: Vec<ExportFormat>,

    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Rows shown per table by the terminal sink
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,

    #[serde(default = "default_workbook_name")]
    pub workbook_name: String,

    /// Column plotted by the chart sink when a table has it
    #[serde(default = "default_chart_metric")]
    pub chart_metric: String,
}

fn default_formats() -> Vec<ExportFormat> {
    vec![ExportFormat::Terminal, ExportFormat::Csv]
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_preview_rows() -> usize {
    10
}

fn default_workbook_name() -> String {
    "leaderboards.xlsx".to_string()
}

fn default_chart_metric() -> String {
    "kd".to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            formats: default_formats(),
            out_dir: default_out_dir(),
            preview_rows: default_preview_rows(),
            workbook_name: default_workbook_name(),
            chart_metric: default_chart_metric(),
        }
    }
}

impl ExportConfig {
    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            out_dir: self.out_dir.clone(),
            preview_rows: self.preview_rows,
            workbook_name: self.workbook_name.clone(),
            chart_metric: self.chart_metric.clone(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub leaderboards: LeaderboardConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            source: SourceConfig::default(),
            leaderboards: LeaderboardConfig::default(),
            export: ExportConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            debug!("Config file {:?} not found, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.leaderboards.thresholds()?;
        self.leaderboards.board_kinds()?;

        if self.export.formats.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one export format is required".to_string(),
            ));
        }

        if self.export.workbook_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Workbook name must not be empty".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
