use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::{ApiError, Pagination, PaginationMeta};
use crate::leaderboards::{definition, Thresholds};

#[derive(Debug, Serialize)]
pub struct LeaderboardSummary {
    pub name: &'static str,
    pub description: &'static str,
    pub rows: usize,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardListResponse {
    pub leaderboards: Vec<LeaderboardSummary>,
    pub thresholds: Thresholds,
    pub computed_at: DateTime<Utc>,
}

pub async fn list_leaderboards(State(state): State<AppState>) -> Json<LeaderboardListResponse> {
    let leaderboards = state
        .outputs
        .iter()
        .map(|o| LeaderboardSummary {
            name: o.name(),
            description: definition(o.kind).description,
            rows: o.table.len(),
        })
        .collect();

    Json(LeaderboardListResponse {
        leaderboards,
        thresholds: state.thresholds,
        computed_at: state.computed_at,
    })
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub name: &'static str,
    pub description: &'static str,
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
    pub pagination: PaginationMeta,
}

pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let output = state
        .leaderboard(&name)
        .ok_or_else(|| ApiError::NotFound(format!("Leaderboard not found: {}", name)))?;

    let pagination = Pagination::new(params.page, params.page_size)?;
    let total = output.table.len();
    let skip = usize::try_from(pagination.offset()).unwrap_or(usize::MAX);
    let rows = output
        .table
        .to_json_rows()
        .into_iter()
        .skip(skip)
        .take(pagination.page_size as usize)
        .collect();

    Ok(Json(LeaderboardResponse {
        name: output.name(),
        description: definition(output.kind).description,
        columns: output.table.columns().to_vec(),
        rows,
        pagination: PaginationMeta::new(&pagination, total as u32),
    }))
}
