pub mod booking;
pub mod customer;
pub mod flight;
pub mod loader;

use std::sync::Arc;

use skyfare_core::repository::DuplicateBooking;
use skyfare_store::Registry;

pub use booking::BookingService;
pub use customer::CustomerService;
pub use flight::FlightService;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Any backend I/O failure, wrapped once at the service boundary and
    /// propagated uncaught. No retry happens anywhere in this layer.
    #[error("backend operation failed: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("duplicate booking '{booking_id}' for customer '{customer_id}'")]
    DuplicateBooking {
        customer_id: String,
        booking_id: String,
    },

    #[error("unknown flight '{0}'")]
    UnknownFlight(String),

    #[error("unknown customer '{0}'")]
    UnknownCustomer(String),

    #[error("validation failed: {0}")]
    Validation(String),
}

impl ServiceError {
    /// Classifies a boxed adapter failure, pulling the duplicate-booking
    /// condition out of the backend error channel.
    pub(crate) fn from_store(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        match err.downcast::<DuplicateBooking>() {
            Ok(dup) => {
                let dup = *dup;
                ServiceError::DuplicateBooking {
                    customer_id: dup.customer_id,
                    booking_id: dup.booking_id,
                }
            }
            Err(err) => ServiceError::Backend(err),
        }
    }
}

/// The domain services wired to whichever backend the registry selected.
pub struct Services {
    pub flights: Arc<FlightService>,
    pub customers: Arc<CustomerService>,
    pub bookings: Arc<BookingService>,
}

impl Services {
    pub fn from_registry(registry: &Registry) -> Self {
        let flights = Arc::new(FlightService::new(registry.flight_store()));
        let customers = Arc::new(CustomerService::new(registry.customer_store()));
        let bookings = Arc::new(BookingService::new(
            registry.booking_store(),
            flights.clone(),
            customers.clone(),
        ));
        Self {
            flights,
            customers,
            bookings,
        }
    }
}
