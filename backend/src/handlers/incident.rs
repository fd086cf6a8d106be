//! Incident handlers

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDate;

use crate::error::AppResult;
use crate::services::IncidentService;
use crate::AppState;
use shared::{DailyCount, Incident};

fn incidents(state: &AppState) -> IncidentService {
    IncidentService::new(state.store.clone(), state.cache.clone(), state.clock)
}

pub async fn list_incidents(State(state): State<AppState>) -> AppResult<Json<Vec<Incident>>> {
    Ok(Json(incidents(&state).list_incidents().await?))
}

pub async fn get_incident(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Incident>> {
    Ok(Json(incidents(&state).get(id).await?))
}

pub async fn incidents_for_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> AppResult<Json<Vec<Incident>>> {
    Ok(Json(incidents(&state).by_order(order_id).await?))
}

pub async fn incidents_for_movement(
    State(state): State<AppState>,
    Path(movement_id): Path<i64>,
) -> AppResult<Json<Vec<Incident>>> {
    Ok(Json(incidents(&state).by_movement(movement_id).await?))
}

pub async fn incidents_on_date(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> AppResult<Json<Vec<Incident>>> {
    Ok(Json(incidents(&state).on_date(date).await?))
}

pub async fn incidents_summary(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<DailyCount>>> {
    Ok(Json(incidents(&state).summary_30_days().await?))
}
