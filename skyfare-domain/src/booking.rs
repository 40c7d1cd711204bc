use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use skyfare_core::booking::Booking;
use skyfare_core::keygen::KeyGenerator;
use skyfare_core::repository::BookingStore;

use crate::customer::CustomerService;
use crate::flight::FlightService;
use crate::ServiceError;

/// Booking purchases and cancellations over the selected backend.
pub struct BookingService {
    store: Arc<dyn BookingStore>,
    flights: Arc<FlightService>,
    customers: Arc<CustomerService>,
    keygen: KeyGenerator,
}

impl BookingService {
    pub fn new(
        store: Arc<dyn BookingStore>,
        flights: Arc<FlightService>,
        customers: Arc<CustomerService>,
    ) -> Self {
        Self {
            store,
            flights,
            customers,
            keygen: KeyGenerator,
        }
    }

    /// Books a seat, returning the generated booking id. The flight resolves
    /// through the flight service (and its caches) and the customer through
    /// the customer service rather than reaching into the maps directly.
    pub async fn book_flight(
        &self,
        customer_id: &str,
        flight_id: &str,
        segment_id: &str,
    ) -> Result<String, ServiceError> {
        debug!(
            "Booking flight {} on segment {} for {}",
            flight_id, segment_id, customer_id
        );

        let flight = self
            .flights
            .get_flight_by_id(flight_id, segment_id)
            .await?
            .ok_or_else(|| ServiceError::UnknownFlight(flight_id.to_string()))?;
        let customer = self
            .customers
            .get_customer_by_username(customer_id)
            .await?
            .ok_or_else(|| ServiceError::UnknownCustomer(customer_id.to_string()))?;

        let booking = Booking {
            id: self.keygen.generate(),
            customer_id: customer.username,
            flight_id: flight.id,
            booked_at: Utc::now(),
        };
        self.store
            .store_booking(&booking)
            .await
            .map_err(ServiceError::from_store)?;
        Ok(booking.id)
    }

    pub async fn get_booking(
        &self,
        customer_id: &str,
        booking_id: &str,
    ) -> Result<Option<Booking>, ServiceError> {
        self.store
            .get_booking(customer_id, booking_id)
            .await
            .map_err(ServiceError::Backend)
    }

    pub async fn get_bookings_by_user(
        &self,
        customer_id: &str,
    ) -> Result<Vec<Booking>, ServiceError> {
        self.store
            .get_bookings_by_customer(customer_id)
            .await
            .map_err(ServiceError::Backend)
    }

    pub async fn cancel_booking(
        &self,
        customer_id: &str,
        booking_id: &str,
    ) -> Result<(), ServiceError> {
        self.store
            .cancel_booking(customer_id, booking_id)
            .await
            .map_err(ServiceError::Backend)
    }

    pub async fn count_bookings(&self) -> Result<u64, ServiceError> {
        self.store.count_bookings().await.map_err(ServiceError::Backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use skyfare_core::customer::{CustomerAddress, MembershipStatus, PhoneType};
    use skyfare_core::flight::FlightSegment;
    use skyfare_core::repository::DuplicateBooking;
    use skyfare_store::InMemoryStore;

    async fn booking_fixture() -> (Arc<InMemoryStore>, BookingService, String) {
        let store = Arc::new(InMemoryStore::new());
        let flights = Arc::new(FlightService::new(store.clone()));
        let customers = Arc::new(CustomerService::new(store.clone()));
        let bookings = BookingService::new(store.clone(), flights.clone(), customers.clone());

        flights
            .store_segment(&FlightSegment::new("AA0", "JFK", "LAX", 2475))
            .await
            .unwrap();
        let departure = Utc::now();
        let flight = flights
            .create_flight("AA0", departure, departure + Duration::hours(4), 500, 200, 10, 200, "B747")
            .await
            .unwrap();

        customers
            .create_customer(
                "uid0@email.com",
                "password",
                MembershipStatus::Gold,
                1_000_000,
                1000,
                "919-123-4567",
                PhoneType::Business,
                CustomerAddress {
                    street_address1: "123 Main St.".to_string(),
                    street_address2: None,
                    city: "Anytown".to_string(),
                    state_province: "NC".to_string(),
                    country: "USA".to_string(),
                    postal_code: "27617".to_string(),
                },
            )
            .await
            .unwrap();

        (store, bookings, flight.id)
    }

    #[tokio::test]
    async fn test_book_then_fetch_then_cancel() {
        let (_, bookings, flight_id) = booking_fixture().await;

        let booking_id = bookings
            .book_flight("uid0@email.com", &flight_id, "AA0")
            .await
            .unwrap();

        let booking = bookings
            .get_booking("uid0@email.com", &booking_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(booking.flight_id, flight_id);
        assert_eq!(booking.customer_id, "uid0@email.com");

        assert_eq!(bookings.count_bookings().await.unwrap(), 1);

        bookings.cancel_booking("uid0@email.com", &booking_id).await.unwrap();
        assert!(bookings
            .get_booking("uid0@email.com", &booking_id)
            .await
            .unwrap()
            .is_none());
        assert_eq!(bookings.count_bookings().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_booking_unknown_flight_fails() {
        let (_, bookings, _) = booking_fixture().await;

        let err = bookings
            .book_flight("uid0@email.com", "no-such-flight", "AA0")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UnknownFlight(_)));
    }

    #[tokio::test]
    async fn test_booking_unknown_customer_fails() {
        let (_, bookings, flight_id) = booking_fixture().await;

        let err = bookings
            .book_flight("nobody@email.com", &flight_id, "AA0")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UnknownCustomer(_)));
    }

    #[tokio::test]
    async fn test_duplicate_booking_is_a_distinct_failure() {
        let (store, bookings, flight_id) = booking_fixture().await;

        let booking_id = bookings
            .book_flight("uid0@email.com", &flight_id, "AA0")
            .await
            .unwrap();

        // Force a second write with the same generated id straight at the
        // store, as two racing purchases with one key would.
        let duplicate = Booking {
            id: booking_id.clone(),
            customer_id: "uid0@email.com".to_string(),
            flight_id: flight_id.clone(),
            booked_at: Utc::now(),
        };
        let err = store.store_booking(&duplicate).await.unwrap_err();
        assert!(err.downcast_ref::<DuplicateBooking>().is_some());
        assert!(matches!(
            ServiceError::from_store(err),
            ServiceError::DuplicateBooking { .. }
        ));

        let all = bookings.get_bookings_by_user("uid0@email.com").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, booking_id);
    }
}
