use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipStatus {
    None,
    Silver,
    Gold,
    Platinum,
    ExecPlatinum,
    Graphite,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhoneType {
    Unknown,
    Home,
    Business,
    Mobile,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerAddress {
    pub street_address1: String,
    pub street_address2: Option<String>,
    pub city: String,
    pub state_province: String,
    pub country: String,
    pub postal_code: String,
}

/// Identified by username. Created at registration, mutated by profile
/// updates, never deleted in normal operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Customer {
    pub username: String,
    /// Cleared before the record leaves the service boundary on read paths.
    pub password: Option<String>,
    pub status: MembershipStatus,
    pub total_miles: i64,
    pub miles_ytd: i64,
    pub address: CustomerAddress,
    pub phone_number: String,
    pub phone_type: PhoneType,
}

/// One login session. Expiry is fixed at creation; access never extends it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerSession {
    pub id: String,
    pub customer_id: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl CustomerSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires < now
    }
}
