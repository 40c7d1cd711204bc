use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use skyfare_core::booking::Booking;
use skyfare_core::customer::{Customer, CustomerSession};
use skyfare_core::flight::{AirportCodeMapping, Flight, FlightSegment};
use skyfare_core::repository::{BookingStore, CustomerStore, DuplicateBooking, FlightStore};

/// Unpartitioned in-process backend: one entry per record, queries are
/// straight scans. The ambient default when no backend is configured.
pub struct InMemoryStore {
    flights: DashMap<String, Flight>,
    segments: DashMap<String, FlightSegment>,
    airports: DashMap<String, AirportCodeMapping>,
    customers: DashMap<String, Customer>,
    sessions: DashMap<String, CustomerSession>,
    bookings: DashMap<(String, String), Booking>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            flights: DashMap::new(),
            segments: DashMap::new(),
            airports: DashMap::new(),
            customers: DashMap::new(),
            sessions: DashMap::new(),
            bookings: DashMap::new(),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FlightStore for InMemoryStore {
    async fn get_flight(
        &self,
        flight_id: &str,
        _segment_id: &str,
    ) -> Result<Option<Flight>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.flights.get(flight_id).map(|f| f.value().clone()))
    }

    async fn get_segment(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<Option<FlightSegment>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self
            .segments
            .iter()
            .find(|s| s.origin == origin && s.destination == destination)
            .map(|s| s.value().clone()))
    }

    async fn get_flights_by_segment(
        &self,
        segment: &FlightSegment,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Flight>, Box<dyn std::error::Error + Send + Sync>> {
        let mut matching = Vec::new();
        for entry in self.flights.iter() {
            if entry.segment_id != segment.name {
                continue;
            }
            if let Some(date) = date {
                if entry.scheduled_departure.date_naive() != date {
                    continue;
                }
            }
            let mut flight = entry.value().clone();
            flight.segment = Some(segment.clone());
            matching.push(flight);
        }
        Ok(matching)
    }

    async fn create_flight(
        &self,
        flight: &Flight,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.flights.insert(flight.id.clone(), flight.clone());
        Ok(())
    }

    async fn store_segment(
        &self,
        segment: &FlightSegment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.segments.insert(segment.name.clone(), segment.clone());
        Ok(())
    }

    async fn store_airport_mapping(
        &self,
        mapping: &AirportCodeMapping,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.airports.insert(mapping.code.clone(), mapping.clone());
        Ok(())
    }

    async fn count_flights(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.flights.len() as u64)
    }

    async fn count_segments(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.segments.len() as u64)
    }

    async fn count_airports(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.airports.len() as u64)
    }
}

#[async_trait]
impl CustomerStore for InMemoryStore {
    async fn create_customer(
        &self,
        customer: &Customer,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.customers.insert(customer.username.clone(), customer.clone());
        Ok(())
    }

    async fn update_customer(
        &self,
        customer: &Customer,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.customers.insert(customer.username.clone(), customer.clone());
        Ok(())
    }

    async fn get_customer(
        &self,
        username: &str,
    ) -> Result<Option<Customer>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.customers.get(username).map(|c| c.value().clone()))
    }

    async fn create_session(
        &self,
        session: &CustomerSession,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CustomerSession>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.sessions.get(session_id).map(|s| s.value().clone()))
    }

    async fn remove_session(
        &self,
        session_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.sessions.remove(session_id);
        Ok(())
    }

    async fn count_customers(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.customers.len() as u64)
    }

    async fn count_sessions(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.sessions.len() as u64)
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn store_booking(
        &self,
        booking: &Booking,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let key = (booking.customer_id.clone(), booking.id.clone());
        match self.bookings.entry(key) {
            Entry::Occupied(_) => Err(Box::new(DuplicateBooking {
                customer_id: booking.customer_id.clone(),
                booking_id: booking.id.clone(),
            }) as Box<dyn std::error::Error + Send + Sync>),
            Entry::Vacant(slot) => {
                slot.insert(booking.clone());
                Ok(())
            }
        }
    }

    async fn get_booking(
        &self,
        customer_id: &str,
        booking_id: &str,
    ) -> Result<Option<Booking>, Box<dyn std::error::Error + Send + Sync>> {
        let key = (customer_id.to_string(), booking_id.to_string());
        Ok(self.bookings.get(&key).map(|b| b.value().clone()))
    }

    async fn get_bookings_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self
            .bookings
            .iter()
            .filter(|entry| entry.key().0 == customer_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn cancel_booking(
        &self,
        customer_id: &str,
        booking_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let key = (customer_id.to_string(), booking_id.to_string());
        self.bookings.remove(&key);
        Ok(())
    }

    async fn count_bookings(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.bookings.len() as u64)
    }
}
