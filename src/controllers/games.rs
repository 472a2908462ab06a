use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::services::guess::{GameStatus, GuessError, GuessGame, MAX_ATTEMPTS, MAX_NUMBER, MIN_NUMBER};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/games", post(start_game))
        .route("/games/{game_id}/guesses", post(make_guess))
}

#[derive(Debug, Serialize)]
struct StartGameResponse {
    game_id: Uuid,
    min_number: i32,
    max_number: i32,
    max_attempts: u32,
}

// POST /api/games - rounds live only in memory
async fn start_game(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let game_id = Uuid::new_v4();
    state.games.write().await.insert(game_id, GuessGame::new());

    (
        StatusCode::CREATED,
        Json(StartGameResponse {
            game_id,
            min_number: MIN_NUMBER,
            max_number: MAX_NUMBER,
            max_attempts: MAX_ATTEMPTS,
        }),
    )
}

#[derive(Debug, Deserialize)]
struct GuessRequest {
    guess: i32,
}

#[derive(Debug, Serialize)]
struct GuessResponse {
    #[serde(flatten)]
    outcome: crate::services::guess::GuessOutcome,
    attempts: u32,
    attempts_remaining: u32,
}

// POST /api/games/{game_id}/guesses
async fn make_guess(
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<Uuid>,
    Json(req): Json<GuessRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut games = state.games.write().await;
    let game = games
        .get_mut(&game_id)
        .ok_or((StatusCode::NOT_FOUND, "Game not found".to_string()))?;

    let outcome = game.guess(req.guess).map_err(|e| match e {
        GuessError::OutOfRange => (StatusCode::BAD_REQUEST, e.to_string()),
        GuessError::Finished => (StatusCode::CONFLICT, e.to_string()),
    })?;

    let attempts = game.attempts;
    let attempts_remaining = game.attempts_remaining();
    let finished = game.status != GameStatus::Playing;

    // Won or lost, the round's id is spent; drop it from the map.
    if finished {
        games.remove(&game_id);
    }

    Ok(Json(GuessResponse {
        outcome,
        attempts,
        attempts_remaining,
    }))
}
