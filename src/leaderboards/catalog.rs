//! Declarative leaderboard definitions.
//!
//! Every leaderboard is the same two-step pipeline, aggregate then rank,
//! parameterised by data alone. Adding a leaderboard means adding one entry
//! to [`catalog`].

use crate::calculate::{Metric, RankSpec, SortKey};

use super::{LeaderboardKind, Thresholds};

// kill_events columns
const TOURNAMENT: &str = "tournament";
const STAGE: &str = "stage";
const MATCH_TYPE: &str = "match_type";
const MATCH_NAME: &str = "match_name";
const MAP: &str = "map";
const PLAYER_TEAM: &str = "player_team";
const PLAYER: &str = "player";
const ENEMY: &str = "enemy";
const PLAYER_KILLS: &str = "player_kills";
const ENEMY_KILLS: &str = "enemy_kills";

// output metrics
pub const KILLS_TOTAL: &str = "kills_total";
pub const DEATHS_TOTAL: &str = "deaths_total";
pub const MATCHES_PLAYED: &str = "matches_played";
pub const KD: &str = "kd";
pub const DEATHS_FROM_ENEMY: &str = "deaths_from_enemy";
pub const KILLS_ON_ENEMY: &str = "kills_on_enemy";

/// How many ranks a leaderboard keeps per partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// The configured `top_n`
    TopN,
    /// A fixed number, independent of configuration
    Exactly(usize),
}

/// One leaderboard: what to group, what to compute and how to rank it.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardDef {
    pub kind: LeaderboardKind,
    pub description: &'static str,
    pub group_by: Vec<&'static str>,
    pub metrics: Vec<Metric>,
    pub partition_by: Vec<&'static str>,
    pub order_by: Vec<SortKey>,
    pub tie_break: Vec<&'static str>,
    /// Column compared against `min_matches`, if the board is thresholded
    pub sample_column: Option<&'static str>,
    pub limit: Limit,
}

impl LeaderboardDef {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Ranking parameters under the given thresholds.
    pub fn rank_spec(&self, thresholds: &Thresholds) -> RankSpec {
        let k = match self.limit {
            Limit::TopN => thresholds.top_n(),
            Limit::Exactly(k) => k,
        };

        let spec = RankSpec::new(self.order_by.clone())
            .partition_by(&self.partition_by)
            .tie_break(&self.tie_break)
            .top_k(k);

        match self.sample_column {
            Some(column) => spec.min_count(column, thresholds.min_matches()),
            None => spec,
        }
    }
}

fn kd_metrics(with_matches: bool) -> Vec<Metric> {
    let mut metrics = vec![
        Metric::sum(KILLS_TOTAL, PLAYER_KILLS),
        Metric::sum(DEATHS_TOTAL, ENEMY_KILLS),
    ];
    if with_matches {
        metrics.push(Metric::count_distinct(
            MATCHES_PLAYED,
            &[TOURNAMENT, STAGE, MATCH_TYPE, MATCH_NAME],
        ));
    }
    metrics.push(Metric::ratio(KD, KILLS_TOTAL, DEATHS_TOTAL));
    metrics
}

fn kd_order() -> Vec<SortKey> {
    vec![SortKey::desc(KD), SortKey::desc(KILLS_TOTAL)]
}

/// Definition of a single leaderboard.
pub fn definition(kind: LeaderboardKind) -> LeaderboardDef {
    match kind {
        LeaderboardKind::GlobalKd => LeaderboardDef {
            kind,
            description: "Players by kill/death ratio across all events",
            group_by: vec![PLAYER],
            metrics: kd_metrics(true),
            partition_by: vec![],
            order_by: kd_order(),
            tie_break: vec![PLAYER],
            sample_column: Some(MATCHES_PLAYED),
            limit: Limit::TopN,
        },
        LeaderboardKind::TeamKd => LeaderboardDef {
            kind,
            description: "Teams by kill/death ratio",
            group_by: vec![PLAYER_TEAM],
            metrics: kd_metrics(false),
            partition_by: vec![],
            order_by: kd_order(),
            tie_break: vec![PLAYER_TEAM],
            sample_column: None,
            limit: Limit::TopN,
        },
        LeaderboardKind::Nemesis => LeaderboardDef {
            kind,
            description: "Player/enemy pairs by deaths the enemy inflicted",
            group_by: vec![PLAYER, ENEMY],
            metrics: vec![
                Metric::sum(DEATHS_FROM_ENEMY, ENEMY_KILLS),
                Metric::sum(KILLS_ON_ENEMY, PLAYER_KILLS),
            ],
            partition_by: vec![],
            order_by: vec![SortKey::desc(DEATHS_FROM_ENEMY)],
            tie_break: vec![PLAYER, ENEMY],
            sample_column: None,
            limit: Limit::TopN,
        },
        LeaderboardKind::PerMapKd => LeaderboardDef {
            kind,
            description: "Top players by kill/death ratio on each map",
            group_by: vec![MAP, PLAYER],
            metrics: kd_metrics(true),
            partition_by: vec![MAP],
            order_by: kd_order(),
            tie_break: vec![PLAYER],
            sample_column: Some(MATCHES_PLAYED),
            limit: Limit::TopN,
        },
        LeaderboardKind::MatchMvp => LeaderboardDef {
            kind,
            description: "Most kills in each match",
            group_by: vec![MATCH_NAME, PLAYER],
            metrics: vec![
                Metric::sum(KILLS_TOTAL, PLAYER_KILLS),
                Metric::sum(DEATHS_TOTAL, ENEMY_KILLS),
            ],
            partition_by: vec![MATCH_NAME],
            order_by: vec![SortKey::desc(KILLS_TOTAL), SortKey::asc(DEATHS_TOTAL)],
            tie_break: vec![PLAYER],
            sample_column: None,
            limit: Limit::Exactly(1),
        },
        LeaderboardKind::TournamentStars => LeaderboardDef {
            kind,
            description: "Top players by kill/death ratio in each tournament",
            group_by: vec![TOURNAMENT, PLAYER],
            metrics: kd_metrics(true),
            partition_by: vec![TOURNAMENT],
            order_by: kd_order(),
            tie_break: vec![PLAYER],
            sample_column: Some(MATCHES_PLAYED),
            limit: Limit::TopN,
        },
    }
}

/// All leaderboards, in catalog order.
pub fn catalog() -> Vec<LeaderboardDef> {
    LeaderboardKind::ALL.iter().copied().map(definition).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate::Reducer;

    #[test]
    fn test_catalog_order_and_names() {
        let names: Vec<&str> = catalog().iter().map(|d| d.name()).collect();
        assert_eq!(
            names,
            vec![
                "global_kd",
                "team_kd",
                "nemesis",
                "per_map_kd",
                "match_mvp",
                "tournament_stars"
            ]
        );
    }

    #[test]
    fn test_ratio_declared_after_operands() {
        for def in catalog() {
            let mut seen: Vec<&str> = Vec::new();
            for metric in &def.metrics {
                if let Reducer::Ratio {
                    numerator,
                    denominator,
                } = &metric.reducer
                {
                    assert!(seen.contains(&numerator.as_str()), "{}", def.name());
                    assert!(seen.contains(&denominator.as_str()), "{}", def.name());
                }
                seen.push(&metric.name);
            }
        }
    }

    #[test]
    fn test_rank_spec_applies_thresholds() {
        let thresholds = Thresholds::new(3, 5).unwrap();

        let global = definition(LeaderboardKind::GlobalKd).rank_spec(&thresholds);
        assert_eq!(global.top_k, Some(5));
        assert_eq!(global.min_count.as_ref().map(|m| m.min), Some(3));
        assert!(global.partition_by.is_empty());

        let team = definition(LeaderboardKind::TeamKd).rank_spec(&thresholds);
        assert!(team.min_count.is_none());

        let mvp = definition(LeaderboardKind::MatchMvp).rank_spec(&thresholds);
        assert_eq!(mvp.top_k, Some(1));
        assert_eq!(mvp.partition_by, vec!["match_name".to_string()]);
    }
}
