use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A purchased seat on a flight, scoped under the owning customer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Booking {
    pub id: String,
    pub customer_id: String,
    pub flight_id: String,
    pub booked_at: DateTime<Utc>,
}
