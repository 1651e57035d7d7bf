//! Derived view builder.
//!
//! Normalizes the three wide source relations (map scores, kills, game ids)
//! into the canonical relations every leaderboard reads:
//! - `map_results`: one row per played map, with duration in seconds,
//!   winner and score difference derived
//! - `kill_events`: renamed/selected kill rows
//! - `game_ids`: map instance → external match/game ids
//!
//! Building is pure: identical input gives byte-identical relations, and a
//! [`ViewStore`] publishes all three or none.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::calculate::{rank, CalcError, RankSpec, SortKey};
use crate::models::{GameIdentifier, KillEvent, MapContext, MapResult, Table, TableError, Value};
use crate::parse_clock_duration;

/// Map label of series-level rollup rows in VCT exports.
pub const ROLLUP_MAP: &str = "All Maps";

/// Raw source column headers.
pub mod raw {
    pub const TOURNAMENT: &str = "Tournament";
    pub const STAGE: &str = "Stage";
    pub const MATCH_TYPE: &str = "Match Type";
    pub const MATCH_NAME: &str = "Match Name";
    pub const MAP: &str = "Map";

    pub const TEAM_A: &str = "Team A";
    pub const TEAM_A_SCORE: &str = "Team A Score";
    pub const TEAM_B: &str = "Team B";
    pub const TEAM_B_SCORE: &str = "Team B Score";
    pub const DURATION: &str = "Duration";

    pub const PLAYER_TEAM: &str = "Player Team";
    pub const PLAYER: &str = "Player";
    pub const ENEMY_TEAM: &str = "Enemy Team";
    pub const ENEMY: &str = "Enemy";
    pub const PLAYER_KILLS: &str = "Player Kills";
    pub const ENEMY_KILLS: &str = "Enemy Kills";
    pub const KILL_TYPE: &str = "Kill Type";

    pub const MATCH_ID: &str = "Match ID";
    pub const GAME_ID: &str = "Game ID";
}

/// A source row that cannot be normalized.
#[derive(Debug, Error, PartialEq)]
pub enum FormatError {
    #[error("{relation}: missing required column '{column}'")]
    MissingColumn {
        relation: &'static str,
        column: &'static str,
    },

    #[error("{relation} row {row}: invalid {column} '{value}': {reason}")]
    InvalidValue {
        relation: &'static str,
        /// 1-based data row number
        row: usize,
        column: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error(transparent)]
    Shape(#[from] TableError),
}

/// The wide source relations as read from the row source.
#[derive(Debug, Clone)]
pub struct RawSources {
    pub maps: Table,
    pub kills: Table,
    pub game_ids: Table,
}

/// Canonical relation names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    MapResults,
    KillEvents,
    GameIds,
}

impl Relation {
    pub const ALL: [Relation; 3] = [Relation::MapResults, Relation::KillEvents, Relation::GameIds];

    pub fn name(&self) -> &'static str {
        match self {
            Relation::MapResults => "map_results",
            Relation::KillEvents => "kill_events",
            Relation::GameIds => "game_ids",
        }
    }
}

/// The normalized relations, read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRelations {
    pub map_results: Table,
    pub kill_events: Table,
    pub game_ids: Table,
}

impl CanonicalRelations {
    pub fn get(&self, relation: Relation) -> &Table {
        match relation {
            Relation::MapResults => &self.map_results,
            Relation::KillEvents => &self.kill_events,
            Relation::GameIds => &self.game_ids,
        }
    }

    /// Content fingerprint of each relation, in [`Relation::ALL`] order.
    pub fn fingerprints(&self) -> Vec<(Relation, String)> {
        Relation::ALL
            .iter()
            .map(|r| (*r, self.get(*r).fingerprint()))
            .collect()
    }
}

/// The `limit` longest played maps, rollup rows excluded, longest first.
pub fn longest_maps(map_results: &Table, limit: usize) -> Result<Table, CalcError> {
    let played = map_results.filter_rows("map", |map| *map != Value::text(ROLLUP_MAP))?;
    rank(
        &played,
        &RankSpec::new(vec![SortKey::desc("duration_sec")])
            .tie_break(&["match_name", "map"])
            .top_k(limit),
    )
}

/// Column positions of the shared map context in a raw table.
struct ContextColumns {
    tournament: usize,
    stage: usize,
    match_type: usize,
    match_name: usize,
    map: usize,
}

impl ContextColumns {
    fn resolve(table: &Table, relation: &'static str) -> Result<Self, FormatError> {
        Ok(Self {
            tournament: required(table, relation, raw::TOURNAMENT)?,
            stage: required(table, relation, raw::STAGE)?,
            match_type: required(table, relation, raw::MATCH_TYPE)?,
            match_name: required(table, relation, raw::MATCH_NAME)?,
            map: required(table, relation, raw::MAP)?,
        })
    }

    fn read(&self, row: &[Value]) -> MapContext {
        MapContext {
            tournament: text(&row[self.tournament]),
            stage: text(&row[self.stage]),
            match_type: text(&row[self.match_type]),
            match_name: text(&row[self.match_name]),
            map: text(&row[self.map]),
        }
    }
}

fn required(table: &Table, relation: &'static str, column: &'static str) -> Result<usize, FormatError> {
    table
        .column_index(column)
        .ok_or(FormatError::MissingColumn { relation, column })
}

/// Cell rendered as text; null becomes the empty string.
fn text(value: &Value) -> String {
    match value {
        Value::Text(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Cell parsed as a non-negative integer. `Ok(None)` for an empty cell.
fn count(value: &Value) -> Result<Option<u32>, &'static str> {
    match value {
        Value::Null => Ok(None),
        Value::Int(i) => u32::try_from(*i).map(Some).map_err(|_| "not a non-negative integer"),
        Value::Float(f) if f.fract() == 0.0 && *f >= 0.0 && *f <= u32::MAX as f64 => {
            Ok(Some(*f as u32))
        }
        Value::Float(_) => Err("not a non-negative integer"),
        Value::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                Ok(None)
            } else {
                s.parse::<u32>()
                    .map(Some)
                    .map_err(|_| "not a non-negative integer")
            }
        }
    }
}

/// Turns raw source tables into canonical relations.
///
/// Kill rows pass through unfiltered unless a rollup label is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewBuilder {
    rollup_map: Option<String>,
}

impl ViewBuilder {
    /// `rollup_map` rows are dropped from maps and kills; `None` keeps all.
    pub fn new(rollup_map: Option<String>) -> Self {
        Self { rollup_map }
    }

    fn is_rollup(&self, map: &str) -> bool {
        self.rollup_map.as_deref() == Some(map)
    }

    /// Build all three relations. Fails on the first malformed row.
    pub fn build(&self, raw: &RawSources) -> Result<CanonicalRelations, FormatError> {
        let map_results = self.map_results(&raw.maps)?;
        let kill_events = self.kill_events(&raw.kills)?;
        let game_ids = self.game_ids(&raw.game_ids)?;

        let relations = CanonicalRelations {
            map_results: to_table(&MapResult::COLUMNS, map_results.iter().map(MapResult::to_row))?,
            kill_events: to_table(&KillEvent::COLUMNS, kill_events.iter().map(KillEvent::to_row))?,
            game_ids: to_table(
                &GameIdentifier::COLUMNS,
                game_ids.iter().map(GameIdentifier::to_row),
            )?,
        };

        info!(
            "Built views: {} map results, {} kill events, {} game ids",
            relations.map_results.len(),
            relations.kill_events.len(),
            relations.game_ids.len()
        );
        Ok(relations)
    }

    /// Parse the map score relation.
    pub fn map_results(&self, table: &Table) -> Result<Vec<MapResult>, FormatError> {
        const REL: &str = "map scores";
        let ctx = ContextColumns::resolve(table, REL)?;
        let team_a = required(table, REL, raw::TEAM_A)?;
        let team_a_score = required(table, REL, raw::TEAM_A_SCORE)?;
        let team_b = required(table, REL, raw::TEAM_B)?;
        let team_b_score = required(table, REL, raw::TEAM_B_SCORE)?;
        let duration = required(table, REL, raw::DURATION)?;

        let mut out = Vec::with_capacity(table.len());
        for (i, row) in table.rows().iter().enumerate() {
            let context = ctx.read(row);
            if self.is_rollup(&context.map) {
                debug!("Skipping rollup map row {}", i + 1);
                continue;
            }

            let invalid = |column: &'static str, value: &Value, reason: &'static str| {
                FormatError::InvalidValue {
                    relation: REL,
                    row: i + 1,
                    column,
                    value: value.to_string(),
                    reason,
                }
            };

            let score = |idx: usize, column: &'static str| -> Result<u32, FormatError> {
                match count(&row[idx]) {
                    Ok(Some(s)) => Ok(s),
                    Ok(None) => Err(invalid(column, &row[idx], "score is required")),
                    Err(reason) => Err(invalid(column, &row[idx], reason)),
                }
            };
            let a_score = score(team_a_score, raw::TEAM_A_SCORE)?;
            let b_score = score(team_b_score, raw::TEAM_B_SCORE)?;

            let duration_sec = parse_clock_duration(&text(&row[duration])).ok_or_else(|| {
                invalid(raw::DURATION, &row[duration], "expected H:MM:SS or MM:SS")
            })?;

            out.push(MapResult::new(
                context,
                text(&row[team_a]),
                a_score,
                text(&row[team_b]),
                b_score,
                duration_sec,
            ));
        }

        Ok(out)
    }

    /// Rename/select the kill relation.
    pub fn kill_events(&self, table: &Table) -> Result<Vec<KillEvent>, FormatError> {
        const REL: &str = "kills";
        let ctx = ContextColumns::resolve(table, REL)?;
        let player_team = required(table, REL, raw::PLAYER_TEAM)?;
        let player = required(table, REL, raw::PLAYER)?;
        let enemy_team = required(table, REL, raw::ENEMY_TEAM)?;
        let enemy = required(table, REL, raw::ENEMY)?;
        let player_kills = required(table, REL, raw::PLAYER_KILLS)?;
        let enemy_kills = required(table, REL, raw::ENEMY_KILLS)?;
        let kill_type = table.column_index(raw::KILL_TYPE);

        let mut out = Vec::with_capacity(table.len());
        for (i, row) in table.rows().iter().enumerate() {
            let context = ctx.read(row);
            if self.is_rollup(&context.map) {
                continue;
            }

            let kills = |idx: usize, column: &'static str| {
                count(&row[idx]).map_err(|reason| FormatError::InvalidValue {
                    relation: REL,
                    row: i + 1,
                    column,
                    value: row[idx].to_string(),
                    reason,
                })
            };

            out.push(KillEvent {
                tournament: context.tournament,
                stage: context.stage,
                match_type: context.match_type,
                match_name: context.match_name,
                map: context.map,
                player_team: text(&row[player_team]),
                player: text(&row[player]),
                enemy_team: text(&row[enemy_team]),
                enemy: text(&row[enemy]),
                player_kills: kills(player_kills, raw::PLAYER_KILLS)?,
                enemy_kills: kills(enemy_kills, raw::ENEMY_KILLS)?,
                kill_type: kill_type
                    .map(|k| text(&row[k]))
                    .filter(|s| !s.is_empty()),
            });
        }

        Ok(out)
    }

    /// Select the game identifier relation.
    pub fn game_ids(&self, table: &Table) -> Result<Vec<GameIdentifier>, FormatError> {
        const REL: &str = "game ids";
        let ctx = ContextColumns::resolve(table, REL)?;
        let match_id = required(table, REL, raw::MATCH_ID)?;
        let game_id = required(table, REL, raw::GAME_ID)?;

        Ok(table
            .rows()
            .iter()
            .map(|row| {
                let context = ctx.read(row);
                GameIdentifier {
                    tournament: context.tournament,
                    stage: context.stage,
                    match_type: context.match_type,
                    match_name: context.match_name,
                    map: context.map,
                    match_id: text(&row[match_id]),
                    game_id: text(&row[game_id]),
                }
            })
            .collect())
    }
}

fn to_table(
    columns: &[&str],
    rows: impl Iterator<Item = Vec<Value>>,
) -> Result<Table, FormatError> {
    Ok(Table::from_rows(columns.iter().copied(), rows.collect())?)
}

/// Holds the currently published canonical relations.
///
/// `refresh` builds into temporaries and swaps only on success, so a failed
/// rebuild leaves the previous set in place.
#[derive(Debug, Default)]
pub struct ViewStore {
    current: Option<Arc<CanonicalRelations>>,
}

impl ViewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<CanonicalRelations>> {
        self.current.clone()
    }

    pub fn refresh(
        &mut self,
        builder: &ViewBuilder,
        raw: &RawSources,
    ) -> Result<Arc<CanonicalRelations>, FormatError> {
        let built = Arc::new(builder.build(raw)?);
        self.current = Some(built.clone());
        Ok(built)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MAP_COLS: [&str; 10] = [
        "Tournament",
        "Stage",
        "Match Type",
        "Match Name",
        "Map",
        "Team A",
        "Team A Score",
        "Team B",
        "Team B Score",
        "Duration",
    ];

    const KILL_COLS: [&str; 12] = [
        "Tournament",
        "Stage",
        "Match Type",
        "Match Name",
        "Map",
        "Player Team",
        "Player",
        "Enemy Team",
        "Enemy",
        "Player Kills",
        "Enemy Kills",
        "Kill Type",
    ];

    const ID_COLS: [&str; 7] = [
        "Tournament",
        "Stage",
        "Match Type",
        "Match Name",
        "Map",
        "Match ID",
        "Game ID",
    ];

    fn t(values: &[&str]) -> Vec<Value> {
        values
            .iter()
            .map(|v| if v.is_empty() { Value::Null } else { Value::text(*v) })
            .collect()
    }

    fn raw_sources() -> RawSources {
        RawSources {
            maps: Table::from_rows(
                MAP_COLS,
                vec![
                    t(&["VCT", "Playoffs", "Final", "FNC vs EG", "Lotus", "FNC", "13", "EG", "9", "1:02:03"]),
                    t(&["VCT", "Playoffs", "Final", "FNC vs EG", "Pearl", "FNC", "12", "EG", "12", "48:30"]),
                    t(&["VCT", "Playoffs", "Final", "FNC vs EG", "All Maps", "FNC", "1", "EG", "0", "1:50:33"]),
                ],
            )
            .unwrap(),
            kills: Table::from_rows(
                KILL_COLS,
                vec![
                    t(&["VCT", "Playoffs", "Final", "FNC vs EG", "Lotus", "FNC", "Derke", "EG", "Demon1", "4", "3", "All Kills"]),
                    t(&["VCT", "Playoffs", "Final", "FNC vs EG", "Lotus", "FNC", "Derke", "EG", "Demon1", "", "1", ""]),
                    t(&["VCT", "Playoffs", "Final", "FNC vs EG", "All Maps", "FNC", "Derke", "EG", "Demon1", "9", "9", "All Kills"]),
                ],
            )
            .unwrap(),
            game_ids: Table::from_rows(
                ID_COLS,
                vec![t(&["VCT", "Playoffs", "Final", "FNC vs EG", "Lotus", "1001", "5001"])],
            )
            .unwrap(),
        }
    }

    #[test]
    fn test_build_map_results() {
        let views = ViewBuilder::default().build(&raw_sources()).unwrap();
        let maps = &views.map_results;

        assert_eq!(maps.columns(), &MapResult::COLUMNS);
        assert_eq!(maps.len(), 3);
        assert_eq!(maps.get(0, "duration_sec"), Some(&Value::Int(3723)));
        assert_eq!(maps.get(0, "winner_team"), Some(&Value::text("FNC")));
        assert_eq!(maps.get(0, "score_diff"), Some(&Value::Int(4)));
        assert_eq!(maps.get(1, "duration_sec"), Some(&Value::Int(2910)));
        assert_eq!(maps.get(1, "winner_team"), Some(&Value::text("TIE")));
        assert_eq!(maps.get(2, "map"), Some(&Value::text("All Maps")));
    }

    #[test]
    fn test_build_kill_events() {
        let views = ViewBuilder::default().build(&raw_sources()).unwrap();
        let kills = &views.kill_events;

        assert_eq!(kills.columns(), &KillEvent::COLUMNS);
        assert_eq!(kills.len(), 3);
        assert_eq!(kills.get(0, "player_kills"), Some(&Value::Int(4)));
        assert!(kills.get(1, "player_kills").unwrap().is_null());
        assert!(kills.get(1, "kill_type").unwrap().is_null());
        assert_eq!(kills.get(2, "map"), Some(&Value::text("All Maps")));
        assert_eq!(kills.get(2, "player_kills"), Some(&Value::Int(9)));
    }

    #[test]
    fn test_rollup_dropped_when_configured() {
        let views = ViewBuilder::new(Some(ROLLUP_MAP.to_string()))
            .build(&raw_sources())
            .unwrap();
        assert_eq!(views.map_results.len(), 2);
        assert_eq!(views.kill_events.len(), 2);
        assert_eq!(views.game_ids.len(), 1);
    }

    #[test]
    fn test_longest_maps_skip_rollup() {
        let views = ViewBuilder::default().build(&raw_sources()).unwrap();
        let longest = longest_maps(&views.map_results, 10).unwrap();

        assert_eq!(longest.len(), 2);
        assert_eq!(longest.get(0, "rank"), Some(&Value::Int(1)));
        assert_eq!(longest.get(0, "map"), Some(&Value::text("Lotus")));
        assert_eq!(longest.get(1, "map"), Some(&Value::text("Pearl")));

        let top = longest_maps(&views.map_results, 1).unwrap();
        assert_eq!(top.len(), 1);
    }

    #[test]
    fn test_build_game_ids() {
        let views = ViewBuilder::default().build(&raw_sources()).unwrap();
        assert_eq!(views.game_ids.get(0, "match_id"), Some(&Value::text("1001")));
        assert_eq!(views.game_ids.get(0, "game_id"), Some(&Value::text("5001")));
    }

    #[test]
    fn test_build_idempotent() {
        let builder = ViewBuilder::default();
        let first = builder.build(&raw_sources()).unwrap();
        let second = builder.build(&raw_sources()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.fingerprints(), second.fingerprints());
    }

    #[test]
    fn test_bad_duration_is_format_error() {
        let mut raw = raw_sources();
        raw.maps = Table::from_rows(
            MAP_COLS,
            vec![t(&["VCT", "Playoffs", "Final", "FNC vs EG", "Lotus", "FNC", "13", "EG", "9", "3723"])],
        )
        .unwrap();

        let err = ViewBuilder::default().build(&raw).unwrap_err();
        assert_eq!(
            err,
            FormatError::InvalidValue {
                relation: "map scores",
                row: 1,
                column: "Duration",
                value: "3723".to_string(),
                reason: "expected H:MM:SS or MM:SS",
            }
        );
    }

    #[test]
    fn test_overflowing_duration_is_format_error() {
        let mut raw = raw_sources();
        raw.maps = Table::from_rows(
            MAP_COLS,
            vec![
                t(&["VCT", "Playoffs", "Final", "FNC vs EG", "Lotus", "FNC", "13", "EG", "9", "1:02:03"]),
                t(&["VCT", "Playoffs", "Final", "FNC vs EG", "Pearl", "FNC", "13", "EG", "9", "9999999999999999:00:00"]),
            ],
        )
        .unwrap();

        let err = ViewBuilder::default().build(&raw).unwrap_err();
        assert!(matches!(
            err,
            FormatError::InvalidValue {
                relation: "map scores",
                row: 2,
                column: "Duration",
                ..
            }
        ));
    }

    #[test]
    fn test_negative_kills_is_format_error() {
        let mut raw = raw_sources();
        raw.kills = Table::from_rows(
            KILL_COLS,
            vec![t(&["VCT", "Playoffs", "Final", "FNC vs EG", "Lotus", "FNC", "Derke", "EG", "Demon1", "-2", "3", ""])],
        )
        .unwrap();

        let err = ViewBuilder::default().build(&raw).unwrap_err();
        assert!(matches!(
            err,
            FormatError::InvalidValue {
                column: "Player Kills",
                row: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_column() {
        let mut raw = raw_sources();
        raw.game_ids = Table::new(["Tournament", "Stage", "Match Type", "Match Name", "Map"]);

        let err = ViewBuilder::default().build(&raw).unwrap_err();
        assert_eq!(
            err,
            FormatError::MissingColumn {
                relation: "game ids",
                column: "Match ID"
            }
        );
    }

    #[test]
    fn test_store_all_or_nothing() {
        let builder = ViewBuilder::default();
        let mut store = ViewStore::new();
        assert!(store.current().is_none());

        let good = store.refresh(&builder, &raw_sources()).unwrap();

        let mut bad = raw_sources();
        bad.game_ids = Table::new(["Tournament"]);
        assert!(store.refresh(&builder, &bad).is_err());

        let current = store.current().unwrap();
        assert!(Arc::ptr_eq(&good, &current));
        assert_eq!(current.game_ids.len(), 1);
    }
}
