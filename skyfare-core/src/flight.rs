use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named origin/destination pair with a fixed distance, independent of
/// specific scheduled dates. Stored keyed by `name`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlightSegment {
    pub name: String,
    pub origin: String,
    pub destination: String,
    pub miles: i32,
}

impl FlightSegment {
    pub fn new(name: &str, origin: &str, destination: &str, miles: i32) -> Self {
        Self {
            name: name.to_string(),
            origin: origin.to_string(),
            destination: destination.to_string(),
            miles,
        }
    }

    /// The cached marker for "no such route". Never persisted.
    pub fn sentinel() -> Self {
        Self {
            name: String::new(),
            origin: String::new(),
            destination: String::new(),
            miles: 0,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.name.is_empty()
    }
}

/// A scheduled instance of a segment on a specific day. Created once by the
/// bulk loader, never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flight {
    pub id: String,
    pub segment_id: String,
    pub scheduled_departure: DateTime<Utc>,
    pub scheduled_arrival: DateTime<Utc>,
    pub first_class_price_nuc: i32,
    pub economy_price_nuc: i32,
    pub first_class_seats: i32,
    pub economy_seats: i32,
    pub aircraft: String,
    /// Owning segment, attached on reads that resolve through the segment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<FlightSegment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AirportCodeMapping {
    pub code: String,
    pub name: String,
}

impl AirportCodeMapping {
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
        }
    }
}
