//! Row sources feeding the raw relations.
//!
//! The engine asks a [`RowSource`] for each wide source relation and gets
//! back a [`Table`]. Whether that table came from a CSV export, a JSON-lines
//! dump or memory is invisible to the rest of the crate.

mod csv;
mod jsonl;

pub use self::csv::CsvSource;
pub use self::jsonl::JsonlSource;

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::models::{Table, TableError};
use crate::storage::StorageError;
use crate::views::RawSources;

/// Errors raised by row sources.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source file not found: {0}")]
    NotFound(PathBuf),

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: ::csv::Error,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Malformed source table: {0}")]
    Shape(#[from] TableError),

    #[error("Relation not available: {0}")]
    MissingRelation(&'static str),
}

/// The wide source relations a run reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRelation {
    MapScores,
    Kills,
    GameIds,
}

impl SourceRelation {
    pub const ALL: [SourceRelation; 3] = [
        SourceRelation::MapScores,
        SourceRelation::Kills,
        SourceRelation::GameIds,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SourceRelation::MapScores => "maps_scores",
            SourceRelation::Kills => "kills",
            SourceRelation::GameIds => "games_ids",
        }
    }
}

/// Executes one logical read and returns the resulting rows.
pub trait RowSource: Send + Sync {
    fn execute(&self, relation: SourceRelation) -> Result<Table, SourceError>;
}

/// File names of the source relations inside a data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFiles {
    pub maps: String,
    pub kills: String,
    pub game_ids: String,
}

impl SourceFiles {
    /// `<relation name>.<extension>` for every relation.
    pub fn with_extension(ext: &str) -> Self {
        Self {
            maps: format!("{}.{}", SourceRelation::MapScores.name(), ext),
            kills: format!("{}.{}", SourceRelation::Kills.name(), ext),
            game_ids: format!("{}.{}", SourceRelation::GameIds.name(), ext),
        }
    }

    pub fn file(&self, relation: SourceRelation) -> &str {
        match relation {
            SourceRelation::MapScores => &self.maps,
            SourceRelation::Kills => &self.kills,
            SourceRelation::GameIds => &self.game_ids,
        }
    }
}

/// Read all three source relations. The first failure aborts the load.
pub fn load_raw(source: &dyn RowSource) -> Result<RawSources, SourceError> {
    let maps = source.execute(SourceRelation::MapScores)?;
    let kills = source.execute(SourceRelation::Kills)?;
    let game_ids = source.execute(SourceRelation::GameIds)?;

    info!(
        "Loaded sources: {} map rows, {} kill rows, {} id rows",
        maps.len(),
        kills.len(),
        game_ids.len()
    );

    Ok(RawSources {
        maps,
        kills,
        game_ids,
    })
}

/// In-memory source, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: HashMap<SourceRelation, Table>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, relation: SourceRelation, table: Table) -> Self {
        self.tables.insert(relation, table);
        self
    }
}

impl RowSource for MemorySource {
    fn execute(&self, relation: SourceRelation) -> Result<Table, SourceError> {
        self.tables
            .get(&relation)
            .cloned()
            .ok_or(SourceError::MissingRelation(relation.name()))
    }
}
