use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::models::Train;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/trains", get(list_trains))
}

// GET /api/trains - read-only reference data
async fn list_trains(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let trains = sqlx::query_as::<_, Train>(
        "SELECT id, train_number, train_name, source_station, destination_station,
                departure_time, arrival_time
         FROM trains
         ORDER BY train_number",
    )
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("list_trains sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Could not load trains".to_string())
    })?;

    Ok(Json(trains))
}
