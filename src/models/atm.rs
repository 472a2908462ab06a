use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

// Seeded simulation account. The PIN is stored in the clear on purpose;
// these rows are demo fixtures, not real credentials.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AtmUser {
    pub id: Uuid,
    pub account_number: String,
    #[serde(skip_serializing)]
    pub pin: String,
    pub holder_name: String,
    pub opening_balance: f64,
}
