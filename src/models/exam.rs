use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Exam {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub total_questions: i32,
}

// Full question row, including the answer key. Never serialized to a
// client during an open session; see controllers::exams::QuestionView.
#[derive(Debug, Clone, FromRow)]
pub struct Question {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub question_number: i32,
    pub question_text: String,
    pub options: serde_json::Value,
    pub correct_answer: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ExamSession {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub user_id: Uuid,
    pub started_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
    pub submitted: bool,
    pub score: Option<i32>,
}
