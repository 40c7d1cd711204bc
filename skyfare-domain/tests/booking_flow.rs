use std::sync::Arc;

use chrono::{Duration, Utc};
use skyfare_core::customer::{CustomerAddress, MembershipStatus, PhoneType};
use skyfare_domain::loader::{CustomerLoader, FlightLoader};
use skyfare_domain::{BookingService, CustomerService, FlightService, ServiceError};
use skyfare_store::InMemoryStore;

fn sample_address() -> CustomerAddress {
    CustomerAddress {
        street_address1: "123 Main St.".to_string(),
        street_address2: None,
        city: "Anytown".to_string(),
        state_province: "NC".to_string(),
        country: "USA".to_string(),
        postal_code: "27617".to_string(),
    }
}

struct TestApp {
    flights: Arc<FlightService>,
    customers: Arc<CustomerService>,
    bookings: BookingService,
}

fn test_app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let flights = Arc::new(FlightService::new(store.clone()));
    let customers = Arc::new(CustomerService::new(store.clone()));
    let bookings = BookingService::new(store, flights.clone(), customers.clone());
    TestApp {
        flights,
        customers,
        bookings,
    }
}

const JFK_LAX: &str = "\
John F Kennedy Intl,Los Angeles Intl
JFK,LAX
John F Kennedy Intl,JFK,NA,2475
Los Angeles Intl,LAX,2475,NA
";

#[tokio::test]
async fn test_load_then_search_one_day() {
    let app = test_app();
    FlightLoader::new(app.flights.clone())
        .load_flights(JFK_LAX)
        .await
        .unwrap();

    // Thirty consecutive daily flights exist on the segment; a
    // date-conditioned search returns exactly the one for that day.
    let day5 = (Utc::now() + Duration::days(5)).date_naive();
    let found = app
        .flights
        .get_flights_by_airports_and_departure_date("JFK", "LAX", day5)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].scheduled_departure.date_naive(), day5);

    // The uncached browse sees the whole schedule.
    let all = app.flights.get_flights_by_airports("JFK", "LAX").await.unwrap();
    assert_eq!(all.len(), 30);
}

#[tokio::test]
async fn test_unknown_route_is_empty_not_an_error() {
    let app = test_app();

    let today = Utc::now().date_naive();
    let none = app
        .flights
        .get_flights_by_airports_and_departure_date("AAA", "BBB", today)
        .await
        .unwrap();
    assert!(none.is_empty());

    // And again, now answered from the cached negative result.
    let none = app
        .flights
        .get_flights_by_airports_and_departure_date("AAA", "BBB", today)
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_register_login_book_cancel() {
    let app = test_app();
    FlightLoader::new(app.flights.clone())
        .load_flights(JFK_LAX)
        .await
        .unwrap();

    app.customers
        .create_customer(
            "uid0@email.com",
            "password",
            MembershipStatus::Gold,
            1_000_000,
            1000,
            "919-123-4567",
            PhoneType::Business,
            sample_address(),
        )
        .await
        .unwrap();

    // Login: password check, then a session valid for a day.
    assert!(app
        .customers
        .validate_customer("uid0@email.com", "password")
        .await
        .unwrap());
    let session = app.customers.create_session("uid0@email.com").await.unwrap();
    assert!(app
        .customers
        .validate_session(&session.id)
        .await
        .unwrap()
        .is_some());

    // Pick a flight and book it.
    let day = Utc::now().date_naive();
    let flight = app
        .flights
        .get_flights_by_airports_and_departure_date("JFK", "LAX", day)
        .await
        .unwrap()
        .remove(0);
    let booking_id = app
        .bookings
        .book_flight("uid0@email.com", &flight.id, &flight.segment_id)
        .await
        .unwrap();

    let listed = app
        .bookings
        .get_bookings_by_user("uid0@email.com")
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, booking_id);
    assert_eq!(app.bookings.count_bookings().await.unwrap(), 1);

    // Logout, then cancel.
    app.customers.invalidate_session(&session.id).await.unwrap();
    assert!(app
        .customers
        .validate_session(&session.id)
        .await
        .unwrap()
        .is_none());

    app.bookings
        .cancel_booking("uid0@email.com", &booking_id)
        .await
        .unwrap();
    assert_eq!(app.bookings.count_bookings().await.unwrap(), 0);
}

#[tokio::test]
async fn test_customer_round_trip_clears_password() {
    let app = test_app();

    let created = app
        .customers
        .create_customer(
            "uid0@email.com",
            "password",
            MembershipStatus::Platinum,
            250_000,
            12_000,
            "919-123-4567",
            PhoneType::Mobile,
            sample_address(),
        )
        .await
        .unwrap();

    let fetched = app
        .customers
        .get_customer_by_username("uid0@email.com")
        .await
        .unwrap()
        .unwrap();

    // Equal in all fields except the password, which is cleared.
    let mut expected = created;
    expected.password = None;
    assert_eq!(fetched, expected);
}

#[tokio::test]
async fn test_booking_against_missing_customer_is_rejected() {
    let app = test_app();
    FlightLoader::new(app.flights.clone())
        .load_flights(JFK_LAX)
        .await
        .unwrap();

    let day = Utc::now().date_naive();
    let flight = app
        .flights
        .get_flights_by_airports_and_departure_date("JFK", "LAX", day)
        .await
        .unwrap()
        .remove(0);

    let err = app
        .bookings
        .book_flight("ghost@email.com", &flight.id, &flight.segment_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::UnknownCustomer(_)));
}

#[tokio::test]
async fn test_services_wired_from_registry() {
    let config = skyfare_store::Config {
        backend: Some("inmemory".to_string()),
        database: skyfare_store::app_config::DatabaseConfig {
            url: "postgres://localhost/skyfare".to_string(),
        },
        redis: skyfare_store::app_config::RedisConfig {
            url: "redis://localhost:6379".to_string(),
        },
        loader: skyfare_store::app_config::LoaderConfig::default(),
    };

    let registry = skyfare_store::Registry::instance(&config).await.unwrap();
    assert_eq!(registry.backend_kind(), skyfare_store::BackendKind::InMemory);

    let services = skyfare_domain::Services::from_registry(registry);
    services
        .customers
        .create_customer(
            "uid0@email.com",
            "password",
            MembershipStatus::Silver,
            0,
            0,
            "919-123-4567",
            PhoneType::Home,
            sample_address(),
        )
        .await
        .unwrap();
    assert_eq!(services.customers.count_customers().await.unwrap(), 1);
}

#[tokio::test]
async fn test_loaded_population_counts() {
    let app = test_app();
    FlightLoader::new(app.flights.clone())
        .load_flights(JFK_LAX)
        .await
        .unwrap();
    CustomerLoader::new(app.customers.clone())
        .load_customers(10)
        .await
        .unwrap();

    assert_eq!(app.flights.count_segments().await.unwrap(), 2);
    assert_eq!(app.flights.count_flights().await.unwrap(), 60);
    assert_eq!(app.flights.count_airports().await.unwrap(), 2);
    assert_eq!(app.customers.count_customers().await.unwrap(), 10);
    assert_eq!(app.customers.count_sessions().await.unwrap(), 0);
}
