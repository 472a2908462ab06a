use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

pub const LOAN_ISSUED: &str = "issued";
pub const LOAN_RETURNED: &str = "returned";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Book {
    pub id: Uuid,
    pub category_id: Option<Uuid>,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub total_copies: i32,
    pub available_copies: i32,
}
