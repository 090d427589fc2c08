use axum::{extract::State, Json};
use busline_core::search::{ScheduleSearchRequest, ScheduleSummary};

use crate::{error::AppError, state::AppState};

/// POST /v1/schedules/search
pub async fn search_schedules(
    State(state): State<AppState>,
    Json(request): Json<ScheduleSearchRequest>,
) -> Result<Json<Vec<ScheduleSummary>>, AppError> {
    let results = state.search.search(&request).await?;
    Ok(Json(results))
}
