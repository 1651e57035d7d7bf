use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::leaderboards::{LeaderboardOutput, Thresholds};
use crate::views::CanonicalRelations;

/// Snapshot served by the API. Computed once, shared read-only.
#[derive(Clone)]
pub struct AppState {
    pub outputs: Arc<Vec<LeaderboardOutput>>,
    pub relations: Arc<CanonicalRelations>,
    pub thresholds: Thresholds,
    pub computed_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        outputs: Vec<LeaderboardOutput>,
        relations: Arc<CanonicalRelations>,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            outputs: Arc::new(outputs),
            relations,
            thresholds,
            computed_at: Utc::now(),
        }
    }

    pub fn leaderboard(&self, name: &str) -> Option<&LeaderboardOutput> {
        self.outputs.iter().find(|o| o.name() == name)
    }
}
