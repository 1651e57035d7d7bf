//! Kill event model: one player-vs-enemy kill interaction.

use serde::{Deserialize, Serialize};

use super::Value;

/// A recorded kill interaction between `player` and `enemy` on one map.
///
/// Several rows may share the same (match, map, player, enemy) key, one per
/// kill type; every aggregate sums across them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillEvent {
    pub tournament: String,
    pub stage: String,
    pub match_type: String,
    pub match_name: String,
    pub map: String,
    pub player_team: String,
    pub player: String,
    pub enemy_team: String,
    pub enemy: String,

    /// Kills by `player` on `enemy`; `None` when the source cell was empty
    pub player_kills: Option<u32>,

    /// Kills by `enemy` on `player`
    pub enemy_kills: Option<u32>,

    /// Kill type label, e.g. "All Kills", "First Kills"
    pub kill_type: Option<String>,
}

impl KillEvent {
    /// Canonical column names, in row order.
    pub const COLUMNS: [&'static str; 12] = [
        "tournament",
        "stage",
        "match_type",
        "match_name",
        "map",
        "player_team",
        "player",
        "enemy_team",
        "enemy",
        "player_kills",
        "enemy_kills",
        "kill_type",
    ];

    pub fn to_row(&self) -> Vec<Value> {
        vec![
            Value::text(&self.tournament),
            Value::text(&self.stage),
            Value::text(&self.match_type),
            Value::text(&self.match_name),
            Value::text(&self.map),
            Value::text(&self.player_team),
            Value::text(&self.player),
            Value::text(&self.enemy_team),
            Value::text(&self.enemy),
            self.player_kills.map(i64::from).into(),
            self.enemy_kills.map(i64::from).into(),
            Value::opt_text(self.kill_type.as_deref()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_matches_columns() {
        let event = KillEvent {
            tournament: "Champions Tour 2023: Masters Tokyo".to_string(),
            stage: "Playoffs".to_string(),
            match_type: "Upper Final".to_string(),
            match_name: "Fnatic vs Evil Geniuses".to_string(),
            map: "Lotus".to_string(),
            player_team: "Fnatic".to_string(),
            player: "Derke".to_string(),
            enemy_team: "Evil Geniuses".to_string(),
            enemy: "Demon1".to_string(),
            player_kills: Some(4),
            enemy_kills: None,
            kill_type: None,
        };

        let row = event.to_row();
        assert_eq!(row.len(), KillEvent::COLUMNS.len());
        assert_eq!(row[9], Value::Int(4));
        assert!(row[10].is_null());
        assert!(row[11].is_null());
    }
}
