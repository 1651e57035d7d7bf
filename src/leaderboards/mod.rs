//! Leaderboard computation.
//!
//! A run is: read the source relations, build the canonical views, compute
//! each selected leaderboard from `kill_events`, then hand every result to
//! the configured sinks.

pub mod catalog;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::calculate::{aggregate, rank, CalcError};
use crate::models::Table;
use crate::source::{load_raw, RowSource, SourceError};
use crate::storage::{ResultSink, StorageError};
use crate::views::{CanonicalRelations, FormatError, Relation, ViewBuilder, ViewStore};

pub use catalog::{catalog, definition, LeaderboardDef, Limit};

/// Invalid threshold configuration, rejected before any computation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThresholdError {
    #[error("min_matches must be >= 0, got {0}")]
    NegativeMinMatches(i64),

    #[error("top_n must be >= 1, got {0}")]
    TopNTooSmall(i64),
}

/// Errors that abort a leaderboard run.
#[derive(Debug, Error)]
pub enum LeaderboardError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Malformed source data: {0}")]
    Format(#[from] FormatError),

    #[error("Failed to compute {board}: {source}")]
    Calc {
        board: &'static str,
        #[source]
        source: CalcError,
    },

    #[error("Sink error: {0}")]
    Storage(#[from] StorageError),

    #[error("Unknown leaderboard: {0}")]
    UnknownBoard(String),
}

/// The leaderboards the catalog knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardKind {
    GlobalKd,
    TeamKd,
    Nemesis,
    PerMapKd,
    MatchMvp,
    TournamentStars,
}

impl LeaderboardKind {
    /// Catalog order.
    pub const ALL: [LeaderboardKind; 6] = [
        LeaderboardKind::GlobalKd,
        LeaderboardKind::TeamKd,
        LeaderboardKind::Nemesis,
        LeaderboardKind::PerMapKd,
        LeaderboardKind::MatchMvp,
        LeaderboardKind::TournamentStars,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LeaderboardKind::GlobalKd => "global_kd",
            LeaderboardKind::TeamKd => "team_kd",
            LeaderboardKind::Nemesis => "nemesis",
            LeaderboardKind::PerMapKd => "per_map_kd",
            LeaderboardKind::MatchMvp => "match_mvp",
            LeaderboardKind::TournamentStars => "tournament_stars",
        }
    }
}

impl fmt::Display for LeaderboardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LeaderboardKind {
    type Err = LeaderboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        LeaderboardKind::ALL
            .iter()
            .copied()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| LeaderboardError::UnknownBoard(s.to_string()))
    }
}

/// Validated minimum-sample and truncation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Thresholds {
    min_matches: u64,
    top_n: usize,
}

impl Thresholds {
    pub const DEFAULT_MIN_MATCHES: u64 = 2;
    pub const DEFAULT_TOP_N: usize = 20;

    /// Accepts the raw configured values; negative `min_matches` or a
    /// `top_n` below 1 is rejected.
    pub fn new(min_matches: i64, top_n: i64) -> Result<Self, ThresholdError> {
        let min_matches =
            u64::try_from(min_matches).map_err(|_| ThresholdError::NegativeMinMatches(min_matches))?;
        let top_n = match usize::try_from(top_n) {
            Ok(n) if n >= 1 => n,
            _ => return Err(ThresholdError::TopNTooSmall(top_n)),
        };
        Ok(Self { min_matches, top_n })
    }

    pub fn min_matches(&self) -> u64 {
        self.min_matches
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_matches: Self::DEFAULT_MIN_MATCHES,
            top_n: Self::DEFAULT_TOP_N,
        }
    }
}

/// One computed leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardOutput {
    pub kind: LeaderboardKind,
    pub table: Table,
}

impl LeaderboardOutput {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// An empty leaderboard is a valid result, not an error.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Compute one leaderboard from the canonical relations.
pub fn compute(
    def: &LeaderboardDef,
    relations: &CanonicalRelations,
    thresholds: &Thresholds,
) -> Result<LeaderboardOutput, LeaderboardError> {
    let calc_err = |source| LeaderboardError::Calc {
        board: def.name(),
        source,
    };

    let events = relations.get(Relation::KillEvents);
    let aggregated = aggregate(events, &def.group_by, &def.metrics).map_err(calc_err)?;
    let table = rank(&aggregated, &def.rank_spec(thresholds)).map_err(calc_err)?;

    if table.is_empty() {
        warn!("Leaderboard {} is empty", def.name());
    } else {
        debug!(
            "Leaderboard {}: {} groups, {} ranked rows",
            def.name(),
            aggregated.len(),
            table.len()
        );
    }

    Ok(LeaderboardOutput {
        kind: def.kind,
        table,
    })
}

/// Compute the selected leaderboards, returned in catalog order.
///
/// With `parallel` the boards are computed on the rayon pool; the result is
/// identical to the sequential path.
pub fn compute_all(
    relations: &CanonicalRelations,
    boards: &[LeaderboardKind],
    thresholds: &Thresholds,
    parallel: bool,
) -> Result<Vec<LeaderboardOutput>, LeaderboardError> {
    let defs: Vec<LeaderboardDef> = catalog()
        .into_iter()
        .filter(|d| boards.contains(&d.kind))
        .collect();

    if parallel {
        defs.par_iter()
            .map(|def| compute(def, relations, thresholds))
            .collect()
    } else {
        defs.iter()
            .map(|def| compute(def, relations, thresholds))
            .collect()
    }
}

/// Read the sources and publish fresh canonical relations into `store`.
///
/// Any source or format failure leaves the store untouched.
pub fn load_relations(
    source: &dyn RowSource,
    builder: &ViewBuilder,
    store: &mut ViewStore,
) -> Result<Arc<CanonicalRelations>, LeaderboardError> {
    let raw = load_raw(source)?;
    Ok(store.refresh(builder, &raw)?)
}

/// Hand every output to every sink, then finish each sink.
pub fn publish(
    outputs: &[LeaderboardOutput],
    sinks: &[Box<dyn ResultSink>],
) -> Result<(), LeaderboardError> {
    for sink in sinks {
        for output in outputs {
            sink.write(output.name(), &output.table)?;
        }
        sink.finish()?;
    }
    Ok(())
}

/// What a run should compute.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub boards: Vec<LeaderboardKind>,
    pub thresholds: Thresholds,
    pub parallel: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            boards: LeaderboardKind::ALL.to_vec(),
            thresholds: Thresholds::default(),
            parallel: false,
        }
    }
}

/// Row count of one published leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardSummary {
    pub name: &'static str,
    pub rows: usize,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub thresholds: Thresholds,
    pub kill_events: usize,
    pub boards: Vec<BoardSummary>,
}

impl RunReport {
    pub fn empty_boards(&self) -> impl Iterator<Item = &BoardSummary> {
        self.boards.iter().filter(|b| b.rows == 0)
    }
}

/// Full pipeline: source, views, leaderboards, sinks.
///
/// A source or format failure aborts before any leaderboard is computed.
pub fn run(
    source: &dyn RowSource,
    builder: &ViewBuilder,
    options: &RunOptions,
    sinks: &[Box<dyn ResultSink>],
) -> Result<(Vec<LeaderboardOutput>, RunReport), LeaderboardError> {
    let started_at = Utc::now();

    let mut store = ViewStore::new();
    let relations = load_relations(source, builder, &mut store)?;

    let outputs = compute_all(
        &relations,
        &options.boards,
        &options.thresholds,
        options.parallel,
    )?;
    publish(&outputs, sinks)?;

    let report = RunReport {
        started_at,
        finished_at: Utc::now(),
        thresholds: options.thresholds,
        kill_events: relations.kill_events.len(),
        boards: outputs
            .iter()
            .map(|o| BoardSummary {
                name: o.name(),
                rows: o.table.len(),
            })
            .collect(),
    };

    info!(
        "Computed {} leaderboards from {} kill events",
        report.boards.len(),
        report.kill_events
    );
    Ok((outputs, report))
}
