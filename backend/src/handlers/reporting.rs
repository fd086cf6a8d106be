//! Reporting handlers for dashboards and movement exports

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::Serialize;

use crate::error::AppResult;
use crate::services::reporting::{AdjustmentLine, ReportFilter, ReportingService};
use crate::AppState;
use shared::{DailyCount, DailyTotal};

fn reporting(state: &AppState) -> ReportingService {
    ReportingService::new(state.store.clone(), state.cache.clone(), state.clock)
}

#[derive(Serialize)]
pub struct DashboardSummary {
    pub shortages: Vec<DailyCount>,
    pub overages: Vec<DailyCount>,
    pub sales: Vec<DailyTotal>,
}

/// Movement report for `?from=YYYY-MM-DD&to=YYYY-MM-DD&kind=Venta|Compra|Merma|Sobrante|Todos`
pub async fn export_movements(
    State(state): State<AppState>,
    Query(query): Query<ReportFilter>,
) -> AppResult<Response> {
    let (range, kind) = query.resolve()?;
    let rows = reporting(&state).movement_report(range, kind).await?;

    if query.wants_csv() {
        let csv = ReportingService::export_to_csv(&rows)?;
        let disposition = format!(
            "attachment; filename=\"movements_{}_{}.csv\"",
            range.start, range.end
        );
        Ok((
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            csv,
        )
            .into_response())
    } else {
        Ok(Json(rows).into_response())
    }
}

/// 30-day dashboard series
pub async fn get_dashboard(State(state): State<AppState>) -> AppResult<Json<DashboardSummary>> {
    let service = reporting(&state);
    Ok(Json(DashboardSummary {
        shortages: service.shortages_30_days().await?,
        overages: service.overages_30_days().await?,
        sales: service.sales_totals_30_days().await?,
    }))
}

pub async fn adjustments_on_date(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> AppResult<Json<Vec<AdjustmentLine>>> {
    Ok(Json(reporting(&state).adjustments_on_date(date).await?))
}
