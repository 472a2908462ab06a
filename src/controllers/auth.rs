use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::middleware::AuthUser;
use crate::models::User;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/signin", post(signin))
        .route("/auth/signout", post(signout))
        .route("/auth/me", get(me))
}

/// Opaque 64-hex-char session token.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    let mut token = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(token, "{b:02x}");
    }
    token
}

/* ---------- REGISTER ---------- */

#[derive(Debug, Deserialize, Validate)]
struct RegisterRequest {
    #[validate(email(message = "A valid email address is required"))]
    email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    password: String,
    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    full_name: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if let Err(e) = req.validate() {
        return Err((StatusCode::BAD_REQUEST, e.to_string()));
    }

    let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Could not hash password".to_string()))?;

    let res = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO users (id, email, password_hash, full_name)
         VALUES ($1, $2, $3, $4)
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(req.email.to_lowercase())
    .bind(&password_hash)
    .bind(&req.full_name)
    .fetch_one(&state.db.pool)
    .await;

    match res {
        Ok(id) => Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id })))),
        Err(e) if e.as_database_error().is_some_and(|d| d.is_unique_violation()) => {
            Err((StatusCode::CONFLICT, "An account with this email already exists".to_string()))
        }
        Err(e) => {
            tracing::error!("register sql error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Could not create account".to_string()))
        }
    }
}

/* ---------- SIGN IN / SIGN OUT ---------- */

#[derive(Debug, Deserialize)]
struct SigninRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct SigninResponse {
    token: String,
    user_id: Uuid,
    email: String,
    full_name: String,
}

async fn signin(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SigninRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = User::find_by_email(&req.email.to_lowercase(), &state.db)
        .await
        .map_err(|e| {
            tracing::error!("signin lookup error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Sign-in failed".to_string())
        })?
        .ok_or((StatusCode::UNAUTHORIZED, "Invalid email or password".to_string()))?;

    if !user.verify_password(&req.password) {
        return Err((StatusCode::UNAUTHORIZED, "Invalid email or password".to_string()));
    }

    let token = generate_token();
    sqlx::query(
        "INSERT INTO sessions (token, user_id, expires_at)
         VALUES ($1, $2, NOW() + make_interval(hours => $3))",
    )
    .bind(&token)
    .bind(user.id)
    .bind(state.config.session.ttl_hours as i32)
    .execute(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("signin session insert error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Sign-in failed".to_string())
    })?;

    Ok(Json(SigninResponse {
        token,
        user_id: user.id,
        email: user.email,
        full_name: user.full_name,
    }))
}

async fn signout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    sqlx::query("DELETE FROM sessions WHERE token = $1")
        .bind(&user.token)
        .execute(&state.db.pool)
        .await
        .map_err(|e| {
            tracing::error!("signout error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Sign-out failed".to_string())
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/* ---------- CURRENT SESSION ---------- */

// "Is anyone signed in?" - the query every page runs on mount.
async fn me(user: AuthUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "user_id": user.user_id,
        "email": user.email,
        "full_name": user.full_name,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tokens_differ() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn register_request_rejects_bad_email() {
        let req = RegisterRequest {
            email: "not-an-email".to_string(),
            password: "secret1".to_string(),
            full_name: "Test User".to_string(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn register_request_rejects_short_password() {
        let req = RegisterRequest {
            email: "a@b.com".to_string(),
            password: "short".to_string(),
            full_name: "Test User".to_string(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn register_request_accepts_valid_input() {
        let req = RegisterRequest {
            email: "a@b.com".to_string(),
            password: "secret1".to_string(),
            full_name: "Test User".to_string(),
        };
        assert!(req.validate().is_ok());
    }
}
