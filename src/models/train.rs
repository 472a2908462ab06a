use chrono::NaiveTime;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

// Static reference data; never mutated through the API
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Train {
    pub id: Uuid,
    pub train_number: String,
    pub train_name: String,
    pub source_station: String,
    pub destination_station: String,
    pub departure_time: NaiveTime,
    pub arrival_time: NaiveTime,
}
