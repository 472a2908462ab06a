use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;
use uuid::Uuid;

// Identity resolved from a bearer session token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub token: String,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    user_id: Uuid,
    email: String,
    full_name: String,
}

// Bearer-token extractor: resolves the session to a user or rejects with 401
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT u.id AS user_id, u.email, u.full_name
             FROM sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.token = $1 AND s.expires_at > NOW()",
        )
        .bind(token)
        .fetch_optional(&state.db.pool)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let session = row.ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(AuthUser {
            user_id: session.user_id,
            email: session.email,
            full_name: session.full_name,
            token: token.to_string(),
        })
    }
}

// ATM identity: Basic auth with account_number:pin on every request.
// The ATM app has its own seeded users and no session concept.
#[derive(Debug, Clone)]
pub struct AtmUser {
    pub id: Uuid,
    pub account_number: String,
    pub holder_name: String,
    pub opening_balance: f64,
}

#[derive(sqlx::FromRow)]
struct AtmUserRow {
    id: Uuid,
    account_number: String,
    pin: String,
    holder_name: String,
    opening_balance: f64,
}

/// Split a Basic Authorization header value into its credential pair.
pub(crate) fn parse_basic_credentials(auth_header: &str) -> Option<(String, String)> {
    let encoded = auth_header.strip_prefix("Basic ")?;
    let decoded = general_purpose::STANDARD.decode(encoded).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let mut parts = credentials.splitn(2, ':');
    let account = parts.next()?;
    let pin = parts.next()?;
    Some((account.to_string(), pin.to_string()))
}

impl FromRequestParts<Arc<crate::AppState>> for AtmUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let (account_number, pin) =
            parse_basic_credentials(auth_header).ok_or(StatusCode::UNAUTHORIZED)?;

        let row: Option<AtmUserRow> = sqlx::query_as(
            "SELECT id, account_number, pin, holder_name, opening_balance
             FROM atm_users
             WHERE account_number = $1",
        )
        .bind(&account_number)
        .fetch_optional(&state.db.pool)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let user = row.ok_or(StatusCode::UNAUTHORIZED)?;

        // Simulation accounts keep plain PINs; constant-time comparison
        // is not a goal here.
        if user.pin != pin {
            return Err(StatusCode::UNAUTHORIZED);
        }

        Ok(AtmUser {
            id: user.id,
            account_number: user.account_number,
            holder_name: user.holder_name,
            opening_balance: user.opening_balance,
        })
    }
}

/// Gate for admin-only views: checks the `user_roles` table.
pub async fn require_admin(pool: &sqlx::PgPool, user_id: Uuid) -> Result<(), StatusCode> {
    let is_admin: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM user_roles WHERE user_id = $1 AND role = 'admin')",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if is_admin {
        Ok(())
    } else {
        Err(StatusCode::FORBIDDEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic_valid_pair() {
        // "1001:1234"
        let header = format!("Basic {}", general_purpose::STANDARD.encode("1001:1234"));
        assert_eq!(
            parse_basic_credentials(&header),
            Some(("1001".to_string(), "1234".to_string()))
        );
    }

    #[test]
    fn parse_basic_pin_may_contain_colon() {
        let header = format!("Basic {}", general_purpose::STANDARD.encode("acct:12:34"));
        assert_eq!(
            parse_basic_credentials(&header),
            Some(("acct".to_string(), "12:34".to_string()))
        );
    }

    #[test]
    fn parse_basic_rejects_bearer() {
        assert_eq!(parse_basic_credentials("Bearer abc"), None);
    }

    #[test]
    fn parse_basic_rejects_bad_base64() {
        assert_eq!(parse_basic_credentials("Basic !!!"), None);
    }

    #[test]
    fn parse_basic_rejects_missing_separator() {
        let header = format!("Basic {}", general_purpose::STANDARD.encode("no-colon"));
        assert_eq!(parse_basic_credentials(&header), None);
    }
}
