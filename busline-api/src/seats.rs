use axum::{
    extract::{Path, Query, State},
    Json,
};
use busline_catalog::SeatLayoutView;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct SeatLayoutQuery {
    pub travel_date: NaiveDate,
}

/// GET /v1/schedules/{schedule_id}/seats?travel_date=YYYY-MM-DD
pub async fn seat_layout(
    State(state): State<AppState>,
    Path(schedule_id): Path<Uuid>,
    Query(query): Query<SeatLayoutQuery>,
) -> Result<Json<SeatLayoutView>, AppError> {
    let layout = state.layouts.seat_layout(schedule_id, query.travel_date).await?;
    Ok(Json(layout))
}
