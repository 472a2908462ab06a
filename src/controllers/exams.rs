use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::models::exam::{Exam, Question};
use crate::services::exam_flow::{self, ExamError};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/exams", get(list_exams))
        .route("/exams/{exam_id}/sessions", post(start_session))
        .route("/exam-sessions/{session_id}", get(session_status))
        .route("/exam-sessions/{session_id}/answers", put(save_answer))
        .route("/exam-sessions/{session_id}/submit", post(submit_session))
}

fn exam_error(e: ExamError) -> (StatusCode, String) {
    match e {
        ExamError::ExamNotFound | ExamError::SessionNotFound => (StatusCode::NOT_FOUND, e.to_string()),
        ExamError::QuestionMismatch => (StatusCode::BAD_REQUEST, e.to_string()),
        ExamError::AlreadySubmitted | ExamError::TimeExpired => (StatusCode::CONFLICT, e.to_string()),
        ExamError::Database(err) => {
            tracing::error!("exam store error: {:?}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "Exam operation failed".to_string())
        }
    }
}

/* ---------- LIST ---------- */

async fn list_exams(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let exams = sqlx::query_as::<_, Exam>(
        "SELECT id, title, description, duration_minutes, total_questions FROM exams ORDER BY title",
    )
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("list_exams sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Could not load exams".to_string())
    })?;

    Ok(Json(exams))
}

/* ---------- SESSION START ---------- */

// What the client sees during an open session: no correct_answer.
#[derive(Debug, Serialize)]
struct QuestionView {
    id: Uuid,
    question_number: i32,
    question_text: String,
    options: serde_json::Value,
}

impl From<Question> for QuestionView {
    fn from(q: Question) -> Self {
        QuestionView {
            id: q.id,
            question_number: q.question_number,
            question_text: q.question_text,
            options: q.options,
        }
    }
}

#[derive(Debug, Serialize)]
struct StartSessionResponse {
    session_id: Uuid,
    exam_title: String,
    duration_seconds: i64,
    remaining_seconds: i64,
    questions: Vec<QuestionView>,
}

// POST /api/exams/{exam_id}/sessions
async fn start_session(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(exam_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let start = exam_flow::start_session(&state.db.pool, exam_id, user.user_id)
        .await
        .map_err(exam_error)?;

    let remaining = exam_flow::remaining_seconds(
        start.session.started_at,
        start.exam.duration_minutes,
        Utc::now().naive_utc(),
    );

    Ok((
        StatusCode::CREATED,
        Json(StartSessionResponse {
            session_id: start.session.id,
            exam_title: start.exam.title,
            duration_seconds: i64::from(start.exam.duration_minutes) * 60,
            remaining_seconds: remaining,
            questions: start.questions.into_iter().map(QuestionView::from).collect(),
        }),
    ))
}

/* ---------- ANSWERS ---------- */

#[derive(Debug, Deserialize)]
struct SaveAnswerRequest {
    question_id: Uuid,
    selected_answer: String,
}

// PUT /api/exam-sessions/{session_id}/answers - last write per question wins
async fn save_answer(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(session_id): Path<Uuid>,
    Json(req): Json<SaveAnswerRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.selected_answer.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Please select an answer".to_string()));
    }

    exam_flow::save_answer(
        &state.db.pool,
        session_id,
        user.user_id,
        req.question_id,
        req.selected_answer.trim(),
    )
    .await
    .map_err(exam_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/* ---------- SUBMIT / STATUS ---------- */

#[derive(Debug, Serialize)]
struct SubmitResponse {
    score: i32,
    total_questions: i32,
}

// POST /api/exam-sessions/{session_id}/submit
//
// Safe to race the timeout sweeper: whichever closes the session first
// wins, and the other caller reads back the stored score.
async fn submit_session(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let result = exam_flow::submit_session(&state.db.pool, session_id, user.user_id)
        .await
        .map_err(exam_error)?;

    Ok(Json(SubmitResponse {
        score: result.score,
        total_questions: result.total_questions,
    }))
}

#[derive(Debug, Serialize)]
struct SessionStatusResponse {
    session_id: Uuid,
    exam_id: Uuid,
    started_at: chrono::NaiveDateTime,
    ended_at: Option<chrono::NaiveDateTime>,
    submitted: bool,
    score: Option<i32>,
    remaining_seconds: i64,
}

// GET /api/exam-sessions/{session_id}
async fn session_status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = exam_flow::find_session(&state.db.pool, session_id, user.user_id)
        .await
        .map_err(exam_error)?;

    let duration_minutes: i32 =
        sqlx::query_scalar("SELECT duration_minutes FROM exams WHERE id = $1")
            .bind(session.exam_id)
            .fetch_one(&state.db.pool)
            .await
            .map_err(|e| {
                tracing::error!("session_status exam lookup error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Could not load session".to_string())
            })?;

    let remaining = if session.submitted {
        0
    } else {
        exam_flow::remaining_seconds(session.started_at, duration_minutes, Utc::now().naive_utc())
    };

    Ok(Json(SessionStatusResponse {
        session_id: session.id,
        exam_id: session.exam_id,
        started_at: session.started_at,
        ended_at: session.ended_at,
        submitted: session.submitted,
        score: session.score,
        remaining_seconds: remaining,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_session_errors_map_to_conflict() {
        let (code, _) = exam_error(ExamError::AlreadySubmitted);
        assert_eq!(code, StatusCode::CONFLICT);
        let (code, _) = exam_error(ExamError::TimeExpired);
        assert_eq!(code, StatusCode::CONFLICT);
    }

    #[test]
    fn missing_session_maps_to_not_found() {
        let (code, _) = exam_error(ExamError::SessionNotFound);
        assert_eq!(code, StatusCode::NOT_FOUND);
    }
}
