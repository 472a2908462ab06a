use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::middleware::AuthUser;
use crate::models::booking::{STATUS_CANCELLED, STATUS_CONFIRMED};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", get(list_bookings))
        .route("/bookings", post(create_booking))
        .route("/bookings/search", get(search_booking))
        .route("/bookings/cancel", patch(cancel_booking))
}

const CLASS_TYPES: [&str; 5] = ["AC_1", "AC_2", "AC_3", "SLEEPER", "GENERAL"];
const GENDERS: [&str; 3] = ["Male", "Female", "Other"];

fn validate_class_type(value: &str) -> Result<(), validator::ValidationError> {
    if CLASS_TYPES.contains(&value) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("class_type")
            .with_message("Class must be one of AC_1, AC_2, AC_3, SLEEPER, GENERAL".into()))
    }
}

fn validate_gender(value: &str) -> Result<(), validator::ValidationError> {
    if GENDERS.contains(&value) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("passenger_gender")
            .with_message("Gender must be Male, Female or Other".into()))
    }
}

/* ---------- CREATE ---------- */

#[derive(Debug, Deserialize, Validate)]
struct CreateBookingRequest {
    train_id: Uuid,
    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    passenger_name: String,
    #[validate(range(min = 1, max = 120, message = "Age must be between 1 and 120"))]
    passenger_age: i32,
    #[validate(custom(function = "validate_gender"))]
    passenger_gender: String,
    #[validate(length(min = 2, max = 100, message = "Please enter a from station"))]
    from_station: String,
    #[validate(length(min = 2, max = 100, message = "Please enter a destination"))]
    to_station: String,
    journey_date: NaiveDate,
    #[validate(custom(function = "validate_class_type"))]
    class_type: String,
}

#[derive(Debug, Serialize)]
struct CreateBookingResponse {
    id: Uuid,
    pnr_number: String,
    seat_number: String,
    booking_status: String,
}

// POST /api/bookings
async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if let Err(e) = req.validate() {
        return Err((StatusCode::BAD_REQUEST, e.to_string()));
    }

    let train_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM trains WHERE id = $1)")
            .bind(req.train_id)
            .fetch_one(&state.db.pool)
            .await
            .map_err(|e| {
                tracing::error!("create_booking train lookup error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Could not create booking".to_string())
            })?;
    if !train_exists {
        return Err((StatusCode::BAD_REQUEST, "Please select a valid train".to_string()));
    }

    // The PNR comes from the database-side generator, which retries
    // internally until the code is unused.
    let pnr: String = sqlx::query_scalar("SELECT generate_pnr()")
        .fetch_one(&state.db.pool)
        .await
        .map_err(|e| {
            tracing::error!("generate_pnr error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Could not allocate a PNR".to_string())
        })?;

    let seat_number = format!("{}-{}", req.class_type, rand::rng().random_range(1..=100));

    let id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO bookings
             (id, user_id, train_id, pnr_number, passenger_name, passenger_age,
              passenger_gender, from_station, to_station, journey_date, class_type,
              seat_number, booking_status)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(req.train_id)
    .bind(&pnr)
    .bind(&req.passenger_name)
    .bind(req.passenger_age)
    .bind(&req.passenger_gender)
    .bind(&req.from_station)
    .bind(&req.to_station)
    .bind(req.journey_date)
    .bind(&req.class_type)
    .bind(&seat_number)
    .bind(STATUS_CONFIRMED)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("create_booking sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Could not create booking".to_string())
    })?;

    Ok((
        StatusCode::CREATED,
        Json(CreateBookingResponse {
            id,
            pnr_number: pnr,
            seat_number,
            booking_status: STATUS_CONFIRMED.to_string(),
        }),
    ))
}

/* ---------- LIST / SEARCH ---------- */

#[derive(Debug, Serialize, sqlx::FromRow)]
struct BookingWithTrain {
    id: Uuid,
    pnr_number: String,
    passenger_name: String,
    passenger_age: i32,
    passenger_gender: String,
    from_station: String,
    to_station: String,
    journey_date: NaiveDate,
    class_type: String,
    seat_number: String,
    booking_status: String,
    booked_at: chrono::NaiveDateTime,
    cancelled_at: Option<chrono::NaiveDateTime>,
    train_number: String,
    train_name: String,
}

const BOOKING_WITH_TRAIN: &str =
    "SELECT b.id, b.pnr_number, b.passenger_name, b.passenger_age, b.passenger_gender,
            b.from_station, b.to_station, b.journey_date, b.class_type, b.seat_number,
            b.booking_status, b.booked_at, b.cancelled_at,
            t.train_number, t.train_name
     FROM bookings b
     JOIN trains t ON t.id = b.train_id";

// GET /api/bookings
async fn list_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let query = format!("{BOOKING_WITH_TRAIN} WHERE b.user_id = $1 ORDER BY b.booked_at DESC");
    let bookings = sqlx::query_as::<_, BookingWithTrain>(&query)
        .bind(user.user_id)
        .fetch_all(&state.db.pool)
        .await
        .map_err(|e| {
            tracing::error!("list_bookings sql error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Could not load bookings".to_string())
        })?;

    Ok(Json(bookings))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    pnr: String,
}

// GET /api/bookings/search?pnr=ABC123 - scoped to the signed-in user
async fn search_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(params): Query<SearchQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let pnr = params.pnr.trim();
    if pnr.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Please enter a PNR number".to_string()));
    }

    let query = format!("{BOOKING_WITH_TRAIN} WHERE b.pnr_number = $1 AND b.user_id = $2");
    let booking = sqlx::query_as::<_, BookingWithTrain>(&query)
        .bind(pnr)
        .bind(user.user_id)
        .fetch_optional(&state.db.pool)
        .await
        .map_err(|e| {
            tracing::error!("search_booking sql error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Could not search bookings".to_string())
        })?
        .ok_or((
            StatusCode::NOT_FOUND,
            "Booking not found. Please check the PNR number and try again.".to_string(),
        ))?;

    Ok(Json(booking))
}

/* ---------- CANCEL ---------- */

#[derive(Debug, Deserialize)]
struct CancelBookingRequest {
    pnr_number: String,
}

// PATCH /api/bookings/cancel - flips status; rows are never deleted
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CancelBookingRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let pnr = req.pnr_number.trim();
    if pnr.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Please enter a PNR number".to_string()));
    }

    let status: Option<String> = sqlx::query_scalar(
        "SELECT booking_status FROM bookings WHERE pnr_number = $1 AND user_id = $2",
    )
    .bind(pnr)
    .bind(user.user_id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("cancel_booking lookup error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Could not cancel booking".to_string())
    })?;

    let status = status.ok_or((
        StatusCode::NOT_FOUND,
        "Booking not found. Please check the PNR number and try again.".to_string(),
    ))?;

    if status == STATUS_CANCELLED {
        return Err((StatusCode::CONFLICT, "This booking has already been cancelled.".to_string()));
    }

    // Guarded flip so a concurrent cancel cannot apply twice.
    let updated = sqlx::query(
        "UPDATE bookings
         SET booking_status = $3, cancelled_at = NOW()
         WHERE pnr_number = $1 AND user_id = $2 AND booking_status <> $3",
    )
    .bind(pnr)
    .bind(user.user_id)
    .bind(STATUS_CANCELLED)
    .execute(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("cancel_booking update error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Could not cancel booking".to_string())
    })?
    .rows_affected();

    if updated == 0 {
        return Err((StatusCode::CONFLICT, "This booking has already been cancelled.".to_string()));
    }

    Ok(Json(serde_json::json!({
        "message": format!("PNR {} has been successfully cancelled.", pnr)
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreateBookingRequest {
        CreateBookingRequest {
            train_id: Uuid::nil(),
            passenger_name: "Asha Rao".to_string(),
            passenger_age: 34,
            passenger_gender: "Female".to_string(),
            from_station: "Mumbai Central".to_string(),
            to_station: "New Delhi".to_string(),
            journey_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            class_type: "AC_2".to_string(),
        }
    }

    #[test]
    fn valid_booking_request_passes() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn short_name_rejected() {
        let mut req = valid_request();
        req.passenger_name = "A".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn age_bounds_enforced() {
        let mut req = valid_request();
        req.passenger_age = 0;
        assert!(req.validate().is_err());
        req.passenger_age = 121;
        assert!(req.validate().is_err());
        req.passenger_age = 120;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn unknown_class_type_rejected() {
        let mut req = valid_request();
        req.class_type = "FIRST".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn unknown_gender_rejected() {
        let mut req = valid_request();
        req.passenger_gender = "N/A".to_string();
        assert!(req.validate().is_err());
    }
}
