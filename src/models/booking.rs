pub const STATUS_CONFIRMED: &str = "CONFIRMED";
pub const STATUS_CANCELLED: &str = "CANCELLED";
