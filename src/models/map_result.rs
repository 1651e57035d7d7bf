//! Map result model: one played map instance with derived outcome fields.

use serde::{Deserialize, Serialize};

use super::Value;

/// Winner sentinel for maps that ended level.
pub const TIE: &str = "TIE";

/// A played map with scores, duration and derived winner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapResult {
    pub tournament: String,
    pub stage: String,
    pub match_type: String,
    pub match_name: String,
    pub map: String,
    pub team_a: String,
    pub team_a_score: u32,
    pub team_b: String,
    pub team_b_score: u32,

    /// Map length in seconds
    pub duration_sec: u64,

    /// Team with the strictly higher score, or [`TIE`]
    pub winner_team: String,

    /// Absolute score difference
    pub score_diff: u32,
}

/// Identifying context shared by every row that describes one map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapContext {
    pub tournament: String,
    pub stage: String,
    pub match_type: String,
    pub match_name: String,
    pub map: String,
}

impl MapResult {
    /// Canonical column names, in row order.
    pub const COLUMNS: [&'static str; 12] = [
        "tournament",
        "stage",
        "match_type",
        "match_name",
        "map",
        "team_a",
        "team_a_score",
        "team_b",
        "team_b_score",
        "duration_sec",
        "winner_team",
        "score_diff",
    ];

    /// Build a map result, deriving winner and score difference.
    pub fn new(
        context: MapContext,
        team_a: String,
        team_a_score: u32,
        team_b: String,
        team_b_score: u32,
        duration_sec: u64,
    ) -> Self {
        let winner_team = winner(&team_a, team_a_score, &team_b, team_b_score);
        let score_diff = team_a_score.abs_diff(team_b_score);

        Self {
            tournament: context.tournament,
            stage: context.stage,
            match_type: context.match_type,
            match_name: context.match_name,
            map: context.map,
            team_a,
            team_a_score,
            team_b,
            team_b_score,
            duration_sec,
            winner_team,
            score_diff,
        }
    }

    pub fn is_tie(&self) -> bool {
        self.winner_team == TIE
    }

    pub fn to_row(&self) -> Vec<Value> {
        vec![
            Value::text(&self.tournament),
            Value::text(&self.stage),
            Value::text(&self.match_type),
            Value::text(&self.match_name),
            Value::text(&self.map),
            Value::text(&self.team_a),
            Value::Int(self.team_a_score.into()),
            Value::text(&self.team_b),
            Value::Int(self.team_b_score.into()),
            Value::Int(self.duration_sec as i64),
            Value::text(&self.winner_team),
            Value::Int(self.score_diff.into()),
        ]
    }
}

/// Strictly higher score wins; level scores give [`TIE`].
pub fn winner(team_a: &str, score_a: u32, team_b: &str, score_b: u32) -> String {
    match score_a.cmp(&score_b) {
        std::cmp::Ordering::Greater => team_a.to_string(),
        std::cmp::Ordering::Less => team_b.to_string(),
        std::cmp::Ordering::Equal => TIE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> MapContext {
        MapContext {
            tournament: "Champions Tour 2023: Champions Los Angeles".to_string(),
            stage: "Playoffs".to_string(),
            match_type: "Grand Final".to_string(),
            match_name: "Evil Geniuses vs Paper Rex".to_string(),
            map: "Pearl".to_string(),
        }
    }

    #[test]
    fn test_winner_team_a() {
        let m = MapResult::new(
            context(),
            "Evil Geniuses".to_string(),
            13,
            "Paper Rex".to_string(),
            9,
            2940,
        );
        assert_eq!(m.winner_team, "Evil Geniuses");
        assert_eq!(m.score_diff, 4);
        assert!(!m.is_tie());
    }

    #[test]
    fn test_winner_team_b() {
        let m = MapResult::new(
            context(),
            "Evil Geniuses".to_string(),
            11,
            "Paper Rex".to_string(),
            13,
            2100,
        );
        assert_eq!(m.winner_team, "Paper Rex");
        assert_eq!(m.score_diff, 2);
    }

    #[test]
    fn test_equal_scores_tie() {
        let m = MapResult::new(
            context(),
            "Evil Geniuses".to_string(),
            12,
            "Paper Rex".to_string(),
            12,
            3000,
        );
        assert_eq!(m.winner_team, TIE);
        assert_eq!(m.score_diff, 0);
        assert!(m.is_tie());
    }

    #[test]
    fn test_row_matches_columns() {
        let m = MapResult::new(
            context(),
            "A".to_string(),
            1,
            "B".to_string(),
            0,
            60,
        );
        assert_eq!(m.to_row().len(), MapResult::COLUMNS.len());
    }
}
