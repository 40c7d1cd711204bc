use async_trait::async_trait;
use chrono::NaiveDate;

use crate::booking::Booking;
use crate::customer::{Customer, CustomerSession};
use crate::flight::{AirportCodeMapping, Flight, FlightSegment};

/// Raised by [`BookingStore::store_booking`] when a booking with the same id
/// already exists for the customer. Travels boxed through the error channel;
/// callers downcast to tell it apart from backend I/O failures.
#[derive(Debug, thiserror::Error)]
#[error("duplicate booking '{booking_id}' for customer '{customer_id}'")]
pub struct DuplicateBooking {
    pub customer_id: String,
    pub booking_id: String,
}

/// Repository trait for flight data access
#[async_trait]
pub trait FlightStore: Send + Sync {
    /// Absent flights are `Ok(None)`, never an error.
    async fn get_flight(
        &self,
        flight_id: &str,
        segment_id: &str,
    ) -> Result<Option<Flight>, Box<dyn std::error::Error + Send + Sync>>;

    async fn get_segment(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<Option<FlightSegment>, Box<dyn std::error::Error + Send + Sync>>;

    /// All flights on a segment; with a date, only those departing that day.
    async fn get_flights_by_segment(
        &self,
        segment: &FlightSegment,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Flight>, Box<dyn std::error::Error + Send + Sync>>;

    async fn create_flight(
        &self,
        flight: &Flight,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn store_segment(
        &self,
        segment: &FlightSegment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn store_airport_mapping(
        &self,
        mapping: &AirportCodeMapping,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn count_flights(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>>;

    async fn count_segments(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>>;

    async fn count_airports(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>>;
}

/// Repository trait for customer and session data access
#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn create_customer(
        &self,
        customer: &Customer,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn update_customer(
        &self,
        customer: &Customer,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Returns the stored record, password included. Callers on read paths
    /// clear the password before handing the record out.
    async fn get_customer(
        &self,
        username: &str,
    ) -> Result<Option<Customer>, Box<dyn std::error::Error + Send + Sync>>;

    async fn create_session(
        &self,
        session: &CustomerSession,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn get_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CustomerSession>, Box<dyn std::error::Error + Send + Sync>>;

    async fn remove_session(
        &self,
        session_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn count_customers(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>>;

    async fn count_sessions(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>>;
}

/// Repository trait for booking data access
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Fails with a boxed [`DuplicateBooking`] if the id is already present
    /// in the customer's booking collection.
    async fn store_booking(
        &self,
        booking: &Booking,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn get_booking(
        &self,
        customer_id: &str,
        booking_id: &str,
    ) -> Result<Option<Booking>, Box<dyn std::error::Error + Send + Sync>>;

    async fn get_bookings_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>>;

    async fn cancel_booking(
        &self,
        customer_id: &str,
        booking_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn count_bookings(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>>;
}
