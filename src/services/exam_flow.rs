//! Exam session flow: session creation, answer upserts, scoring, and
//! submission.
//!
//! A session moves through `loading -> in_progress -> submitted`. Scoring
//! happens here, server-side, from the answers actually saved; the client
//! never sees the answer key while a session is open. Submission closes
//! the row with `WHERE submitted = false`, so a manual submit racing the
//! timeout sweeper still ends the session exactly once.

use chrono::{Duration, NaiveDateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::exam::{Exam, ExamSession, Question};

#[derive(Debug, thiserror::Error)]
pub enum ExamError {
    #[error("exam not found")]
    ExamNotFound,
    #[error("session not found")]
    SessionNotFound,
    #[error("question does not belong to this exam")]
    QuestionMismatch,
    #[error("session already submitted")]
    AlreadySubmitted,
    #[error("time is up for this session")]
    TimeExpired,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Everything the client needs to render an open session.
#[derive(Debug)]
pub struct SessionStart {
    pub session: ExamSession,
    pub exam: Exam,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitResult {
    pub score: i32,
    pub total_questions: i32,
    /// False when this call found the session already closed and only
    /// read back the stored result.
    pub closed_now: bool,
}

/* ---------- pure countdown / scoring helpers ---------- */

pub fn deadline(started_at: NaiveDateTime, duration_minutes: i32) -> NaiveDateTime {
    started_at + Duration::minutes(i64::from(duration_minutes))
}

pub fn remaining_seconds(started_at: NaiveDateTime, duration_minutes: i32, now: NaiveDateTime) -> i64 {
    (deadline(started_at, duration_minutes) - now).num_seconds().max(0)
}

pub fn is_expired(started_at: NaiveDateTime, duration_minutes: i32, now: NaiveDateTime) -> bool {
    now >= deadline(started_at, duration_minutes)
}

/// Count answers matching the recorded correct option. `keyed` pairs each
/// question's id with its correct answer; `answers` pairs question ids
/// with the selected option. Unanswered questions never match.
pub fn score_answers(keyed: &[(Uuid, String)], answers: &[(Uuid, String)]) -> i32 {
    let mut score = 0;
    for (question_id, correct) in keyed {
        if answers
            .iter()
            .any(|(answered_id, selected)| answered_id == question_id && selected == correct)
        {
            score += 1;
        }
    }
    score
}

/* ---------- store operations ---------- */

/// `loading -> in_progress`: create the session row and load the exam
/// plus its ordered question list.
pub async fn start_session(pool: &PgPool, exam_id: Uuid, user_id: Uuid) -> Result<SessionStart, ExamError> {
    let exam = sqlx::query_as::<_, Exam>(
        "SELECT id, title, description, duration_minutes, total_questions FROM exams WHERE id = $1",
    )
    .bind(exam_id)
    .fetch_optional(pool)
    .await?
    .ok_or(ExamError::ExamNotFound)?;

    let questions = sqlx::query_as::<_, Question>(
        "SELECT id, exam_id, question_number, question_text, options, correct_answer
         FROM questions WHERE exam_id = $1 ORDER BY question_number",
    )
    .bind(exam_id)
    .fetch_all(pool)
    .await?;

    let session = sqlx::query_as::<_, ExamSession>(
        "INSERT INTO exam_sessions (id, exam_id, user_id)
         VALUES ($1, $2, $3)
         RETURNING id, exam_id, user_id, started_at, ended_at, submitted, score",
    )
    .bind(Uuid::new_v4())
    .bind(exam_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(SessionStart { session, exam, questions })
}

pub async fn find_session(pool: &PgPool, session_id: Uuid, user_id: Uuid) -> Result<ExamSession, ExamError> {
    sqlx::query_as::<_, ExamSession>(
        "SELECT id, exam_id, user_id, started_at, ended_at, submitted, score
         FROM exam_sessions WHERE id = $1 AND user_id = $2",
    )
    .bind(session_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(ExamError::SessionNotFound)
}

/// `in_progress -> in_progress`: upsert one answer keyed by
/// (session, question); the last write for a question wins. Writes against
/// a submitted session are rejected, not just hidden, and a session past
/// its deadline rejects writes even before the sweeper has closed it.
pub async fn save_answer(
    pool: &PgPool,
    session_id: Uuid,
    user_id: Uuid,
    question_id: Uuid,
    selected_answer: &str,
) -> Result<(), ExamError> {
    let session = find_session(pool, session_id, user_id).await?;
    if session.submitted {
        return Err(ExamError::AlreadySubmitted);
    }

    let duration_minutes: i32 =
        sqlx::query_scalar("SELECT duration_minutes FROM exams WHERE id = $1")
            .bind(session.exam_id)
            .fetch_one(pool)
            .await?;
    if is_expired(session.started_at, duration_minutes, Utc::now().naive_utc()) {
        return Err(ExamError::TimeExpired);
    }

    let belongs: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM questions WHERE id = $1 AND exam_id = $2)",
    )
    .bind(question_id)
    .bind(session.exam_id)
    .fetch_one(pool)
    .await?;
    if !belongs {
        return Err(ExamError::QuestionMismatch);
    }

    sqlx::query(
        "INSERT INTO answers (session_id, question_id, selected_answer)
         VALUES ($1, $2, $3)
         ON CONFLICT (session_id, question_id)
         DO UPDATE SET selected_answer = EXCLUDED.selected_answer, answered_at = NOW()",
    )
    .bind(session_id)
    .bind(question_id)
    .bind(selected_answer)
    .execute(pool)
    .await?;

    Ok(())
}

/// `in_progress -> submitted`: score the saved answers and close the
/// session. Idempotent; a second call reads back the stored result.
pub async fn submit_session(pool: &PgPool, session_id: Uuid, user_id: Uuid) -> Result<SubmitResult, ExamError> {
    let session = find_session(pool, session_id, user_id).await?;
    close_session(pool, &session).await
}

/// Shared close path for manual submits and the timeout sweeper.
pub async fn close_session(pool: &PgPool, session: &ExamSession) -> Result<SubmitResult, ExamError> {
    let keyed = sqlx::query_as::<_, (Uuid, String)>(
        "SELECT id, correct_answer FROM questions WHERE exam_id = $1",
    )
    .bind(session.exam_id)
    .fetch_all(pool)
    .await?;

    let answers = sqlx::query_as::<_, (Uuid, String)>(
        "SELECT question_id, selected_answer FROM answers WHERE session_id = $1",
    )
    .bind(session.id)
    .fetch_all(pool)
    .await?;

    let score = score_answers(&keyed, &answers);
    let total_questions = keyed.len() as i32;

    let closed = sqlx::query(
        "UPDATE exam_sessions
         SET ended_at = NOW(), submitted = TRUE, score = $2
         WHERE id = $1 AND submitted = FALSE",
    )
    .bind(session.id)
    .bind(score)
    .execute(pool)
    .await?
    .rows_affected();

    if closed > 0 {
        return Ok(SubmitResult { score, total_questions, closed_now: true });
    }

    // Someone else closed it first; report the stored score.
    let stored: Option<i32> = sqlx::query_scalar("SELECT score FROM exam_sessions WHERE id = $1")
        .bind(session.id)
        .fetch_one(pool)
        .await?;

    Ok(SubmitResult {
        score: stored.unwrap_or(score),
        total_questions,
        closed_now: false,
    })
}

/// Sessions whose countdown has crossed zero but are still open.
pub async fn expired_open_sessions(pool: &PgPool) -> Result<Vec<ExamSession>, ExamError> {
    let rows = sqlx::query_as::<_, ExamSession>(
        "SELECT s.id, s.exam_id, s.user_id, s.started_at, s.ended_at, s.submitted, s.score
         FROM exam_sessions s
         JOIN exams e ON e.id = s.exam_id
         WHERE s.submitted = FALSE
           AND s.started_at + make_interval(mins => e.duration_minutes) <= NOW()",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn t(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn q(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    // ---- countdown ----

    #[test]
    fn deadline_adds_duration() {
        assert_eq!(deadline(t(10, 0, 0), 30), t(10, 30, 0));
    }

    #[test]
    fn remaining_seconds_counts_down() {
        assert_eq!(remaining_seconds(t(10, 0, 0), 30, t(10, 29, 0)), 60);
    }

    #[test]
    fn remaining_seconds_never_negative() {
        assert_eq!(remaining_seconds(t(10, 0, 0), 30, t(11, 0, 0)), 0);
    }

    #[test]
    fn expired_exactly_at_zero() {
        // Crossing zero is the sole timeout trigger.
        assert!(is_expired(t(10, 0, 0), 30, t(10, 30, 0)));
        assert!(!is_expired(t(10, 0, 0), 30, t(10, 29, 59)));
    }

    // ---- scoring ----

    #[test]
    fn score_counts_matching_answers() {
        let keyed = vec![(q(1), "A".to_string()), (q(2), "B".to_string()), (q(3), "C".to_string())];
        let answers = vec![(q(1), "A".to_string()), (q(2), "D".to_string()), (q(3), "C".to_string())];
        assert_eq!(score_answers(&keyed, &answers), 2);
    }

    #[test]
    fn unanswered_questions_never_match() {
        let keyed = vec![(q(1), "A".to_string()), (q(2), "B".to_string())];
        let answers = vec![(q(1), "A".to_string())];
        assert_eq!(score_answers(&keyed, &answers), 1);
    }

    #[test]
    fn empty_answer_set_scores_zero() {
        let keyed = vec![(q(1), "A".to_string())];
        assert_eq!(score_answers(&keyed, &[]), 0);
    }

    #[test]
    fn answers_to_unknown_questions_do_not_count() {
        let keyed = vec![(q(1), "A".to_string())];
        let answers = vec![(q(9), "A".to_string())];
        assert_eq!(score_answers(&keyed, &answers), 0);
    }

    proptest! {
        // Score is bounded by both the question count and the answer count.
        #[test]
        fn score_is_bounded(selected in proptest::collection::vec(0u8..4, 0..20)) {
            let options = ["A", "B", "C", "D"];
            let keyed: Vec<(Uuid, String)> = (0..20u128).map(|i| (q(i), "A".to_string())).collect();
            let answers: Vec<(Uuid, String)> = selected
                .iter()
                .enumerate()
                .map(|(i, o)| (q(i as u128), options[*o as usize].to_string()))
                .collect();
            let score = score_answers(&keyed, &answers);
            prop_assert!(score >= 0);
            prop_assert!(score <= answers.len() as i32);
            prop_assert!(score <= keyed.len() as i32);
        }
    }
}
