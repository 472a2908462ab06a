use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::middleware::{require_admin, AuthUser};
use crate::models::book::{LOAN_ISSUED, LOAN_RETURNED};
use crate::models::{Book, Category};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/library/categories", get(list_categories))
        .route("/library/books", get(list_books))
        .route("/library/books", post(add_book))
        .route("/library/loans", get(list_loans))
        .route("/library/loans", post(issue_book))
        .route("/library/loans/return", patch(return_book))
}

const LOAN_PERIOD_DAYS: i32 = 14;

/* ---------- CATALOG ---------- */

async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let categories = sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name")
        .fetch_all(&state.db.pool)
        .await
        .map_err(|e| {
            tracing::error!("list_categories sql error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Could not load categories".to_string())
        })?;

    Ok(Json(categories))
}

#[derive(Debug, Deserialize)]
struct BooksQuery {
    category_id: Option<Uuid>,
}

// GET /api/library/books?category_id=...
async fn list_books(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BooksQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let books = match params.category_id {
        Some(category_id) => {
            sqlx::query_as::<_, Book>(
                "SELECT id, category_id, title, author, isbn, total_copies, available_copies
                 FROM books WHERE category_id = $1 ORDER BY title",
            )
            .bind(category_id)
            .fetch_all(&state.db.pool)
            .await
        }
        None => {
            sqlx::query_as::<_, Book>(
                "SELECT id, category_id, title, author, isbn, total_copies, available_copies
                 FROM books ORDER BY title",
            )
            .fetch_all(&state.db.pool)
            .await
        }
    }
    .map_err(|e| {
        tracing::error!("list_books sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Could not load books".to_string())
    })?;

    Ok(Json(books))
}

#[derive(Debug, Deserialize, Validate)]
struct AddBookRequest {
    category_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    title: String,
    #[validate(length(min = 1, max = 200, message = "Author is required"))]
    author: String,
    isbn: Option<String>,
    #[validate(range(min = 1, max = 1000, message = "Total copies must be between 1 and 1000"))]
    total_copies: i32,
}

// POST /api/library/books - admin only
async fn add_book(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<AddBookRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&state.db.pool, user.user_id)
        .await
        .map_err(|code| (code, "Admin access required".to_string()))?;

    if let Err(e) = req.validate() {
        return Err((StatusCode::BAD_REQUEST, e.to_string()));
    }

    let id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO books (id, category_id, title, author, isbn, total_copies, available_copies)
         VALUES ($1, $2, $3, $4, $5, $6, $6)
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(req.category_id)
    .bind(&req.title)
    .bind(&req.author)
    .bind(&req.isbn)
    .bind(req.total_copies)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("add_book sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Could not add book".to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/* ---------- LOANS ---------- */

#[derive(Debug, Serialize, sqlx::FromRow)]
struct LoanWithBook {
    id: Uuid,
    book_id: Uuid,
    issue_date: chrono::NaiveDateTime,
    due_date: chrono::NaiveDateTime,
    return_date: Option<chrono::NaiveDateTime>,
    status: String,
    title: String,
    author: String,
    isbn: Option<String>,
}

// GET /api/library/loans - own history, newest issue first
async fn list_loans(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let loans = sqlx::query_as::<_, LoanWithBook>(
        "SELECT l.id, l.book_id, l.issue_date, l.due_date, l.return_date, l.status,
                b.title, b.author, b.isbn
         FROM loans l
         JOIN books b ON b.id = l.book_id
         WHERE l.user_id = $1
         ORDER BY l.issue_date DESC",
    )
    .bind(user.user_id)
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("list_loans sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Could not load loans".to_string())
    })?;

    Ok(Json(loans))
}

#[derive(Debug, Deserialize)]
struct IssueBookRequest {
    book_id: Uuid,
}

// POST /api/library/loans
//
// The copy-count decrement and the loan insert run in one transaction,
// and the decrement only applies while available_copies > 0. Two clients
// racing for the last copy cannot both succeed.
async fn issue_book(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<IssueBookRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
        .bind(req.book_id)
        .fetch_one(&state.db.pool)
        .await
        .map_err(|e| {
            tracing::error!("issue_book lookup error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Could not issue book".to_string())
        })?;
    if !exists {
        return Err((StatusCode::NOT_FOUND, "Book not found".to_string()));
    }

    let mut tx = state.db.pool.begin().await.map_err(|e| {
        tracing::error!("issue_book tx begin error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Could not issue book".to_string())
    })?;

    let decremented = sqlx::query(
        "UPDATE books
         SET available_copies = available_copies - 1
         WHERE id = $1 AND available_copies > 0",
    )
    .bind(req.book_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("issue_book decrement error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Could not issue book".to_string())
    })?
    .rows_affected();

    if decremented == 0 {
        let _ = tx.rollback().await;
        return Err((StatusCode::CONFLICT, "This book is currently not available.".to_string()));
    }

    let loan_id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO loans (id, book_id, user_id, due_date, status)
         VALUES ($1, $2, $3, NOW() + make_interval(days => $4), $5)
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(req.book_id)
    .bind(user.user_id)
    .bind(LOAN_PERIOD_DAYS)
    .bind(LOAN_ISSUED)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("issue_book insert error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Could not issue book".to_string())
    })?;

    tx.commit().await.map_err(|e| {
        tracing::error!("issue_book tx commit error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Could not issue book".to_string())
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": loan_id,
            "message": "Book issued successfully. Check your dashboard."
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct ReturnBookRequest {
    loan_id: Uuid,
}

// PATCH /api/library/loans/return - paired with the copy-count increment
// in a single transaction
async fn return_book(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<ReturnBookRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut tx = state.db.pool.begin().await.map_err(|e| {
        tracing::error!("return_book tx begin error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Could not return book".to_string())
    })?;

    // Only an open loan owned by the caller can be returned.
    let book_id: Option<Uuid> = sqlx::query_scalar(
        "UPDATE loans
         SET status = $3, return_date = NOW()
         WHERE id = $1 AND user_id = $2 AND status = $4
         RETURNING book_id",
    )
    .bind(req.loan_id)
    .bind(user.user_id)
    .bind(LOAN_RETURNED)
    .bind(LOAN_ISSUED)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("return_book update error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Could not return book".to_string())
    })?;

    let Some(book_id) = book_id else {
        let _ = tx.rollback().await;
        return Err((
            StatusCode::CONFLICT,
            "Loan not found or already returned.".to_string(),
        ));
    };

    sqlx::query("UPDATE books SET available_copies = available_copies + 1 WHERE id = $1")
        .bind(book_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("return_book increment error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Could not return book".to_string())
        })?;

    tx.commit().await.map_err(|e| {
        tracing::error!("return_book tx commit error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Could not return book".to_string())
    })?;

    Ok(Json(serde_json::json!({ "message": "Book returned successfully." })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_book_request_requires_title_and_author() {
        let req = AddBookRequest {
            category_id: None,
            title: "".to_string(),
            author: "Someone".to_string(),
            isbn: None,
            total_copies: 3,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn add_book_request_rejects_zero_copies() {
        let req = AddBookRequest {
            category_id: None,
            title: "The Rust Programming Language".to_string(),
            author: "Klabnik & Nichols".to_string(),
            isbn: Some("978-1593278281".to_string()),
            total_copies: 0,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn add_book_request_accepts_valid_input() {
        let req = AddBookRequest {
            category_id: None,
            title: "The Rust Programming Language".to_string(),
            author: "Klabnik & Nichols".to_string(),
            isbn: Some("978-1593278281".to_string()),
            total_copies: 3,
        };
        assert!(req.validate().is_ok());
    }
}
