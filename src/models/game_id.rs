//! Game identifier model: links a map instance to external match/game IDs.

use serde::{Deserialize, Serialize};

use super::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameIdentifier {
    pub tournament: String,
    pub stage: String,
    pub match_type: String,
    pub match_name: String,
    pub map: String,
    pub match_id: String,
    pub game_id: String,
}

impl GameIdentifier {
    pub const COLUMNS: [&'static str; 7] = [
        "tournament",
        "stage",
        "match_type",
        "match_name",
        "map",
        "match_id",
        "game_id",
    ];

    pub fn to_row(&self) -> Vec<Value> {
        vec![
            Value::text(&self.tournament),
            Value::text(&self.stage),
            Value::text(&self.match_type),
            Value::text(&self.match_name),
            Value::text(&self.map),
            Value::text(&self.match_id),
            Value::text(&self.game_id),
        ]
    }
}
