use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::state::AppState;

#[derive(Debug, Serialize)]
pub struct RelationInfo {
    pub name: &'static str,
    pub rows: usize,
    pub fingerprint: String,
}

#[derive(Debug, Serialize)]
pub struct RelationsResponse {
    pub relations: Vec<RelationInfo>,
}

pub async fn list_relations(State(state): State<AppState>) -> Json<RelationsResponse> {
    let relations = state
        .relations
        .fingerprints()
        .into_iter()
        .map(|(relation, fingerprint)| RelationInfo {
            name: relation.name(),
            rows: state.relations.get(relation).len(),
            fingerprint,
        })
        .collect();

    Json(RelationsResponse { relations })
}
