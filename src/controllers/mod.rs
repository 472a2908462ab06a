pub mod atm;
pub mod auth;
pub mod bookings;
pub mod exams;
pub mod games;
pub mod library;
pub mod trains;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(auth::routes())
        .merge(trains::routes())
        .merge(bookings::routes())
        .merge(library::routes())
        .merge(exams::routes())
        .merge(atm::routes())
        .merge(games::routes())
}
