use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tracing::info;

use skyfare_core::customer::{CustomerAddress, MembershipStatus, PhoneType};
use skyfare_core::flight::{AirportCodeMapping, FlightSegment};

use crate::customer::CustomerService;
use crate::flight::FlightService;
use crate::ServiceError;

const MAX_FLIGHTS_PER_SEGMENT: i64 = 30;
const AVERAGE_SPEED_MPH: f64 = 600.0;

/// Loads the airport mileage matrix: airport-code mappings, one route
/// segment per airport pair with a known distance, and one flight per day
/// on each segment for a fixed horizon.
///
/// Matrix format: the first line holds airport names, the second the
/// matching airport codes, and each following line is
/// `name, code, distance-to-each-column...` with `NA` for no route.
pub struct FlightLoader {
    flights: Arc<FlightService>,
}

impl FlightLoader {
    pub fn new(flights: Arc<FlightService>) -> Self {
        Self { flights }
    }

    pub async fn load_default_flights(&self) -> Result<(), ServiceError> {
        self.load_flights(include_str!("../data/mileage.csv")).await
    }

    pub async fn load_flights(&self, mileage_csv: &str) -> Result<(), ServiceError> {
        let mut lines = mileage_csv.lines();

        let names_line = lines
            .next()
            .ok_or_else(|| ServiceError::Validation("mileage data is empty".to_string()))?;
        let codes_line = lines
            .next()
            .ok_or_else(|| ServiceError::Validation("mileage data has no code line".to_string()))?;

        let mut airports: Vec<AirportCodeMapping> = names_line
            .split(',')
            .map(|name| AirportCodeMapping::new("", name.trim()))
            .collect();
        for (index, code) in codes_line.split(',').enumerate() {
            if let Some(airport) = airports.get_mut(index) {
                airport.code = code.trim().to_string();
            }
        }

        let start = midnight_today();
        let mut flight_number = 0u32;
        for line in lines {
            if line.trim().is_empty() {
                break;
            }
            let mut fields = line.split(',');
            let airport_name = fields
                .next()
                .map(str::trim)
                .ok_or_else(|| ServiceError::Validation("mileage row missing name".to_string()))?;
            let airport_code = fields
                .next()
                .map(str::trim)
                .ok_or_else(|| ServiceError::Validation("mileage row missing code".to_string()))?;
            if !airports.iter().any(|a| a.code == airport_code) {
                airports.push(AirportCodeMapping::new(airport_code, airport_name));
            }

            for (column, miles_field) in fields.enumerate() {
                let miles_field = miles_field.trim();
                if miles_field == "NA" {
                    continue;
                }
                let miles: i32 = miles_field.parse().map_err(|_| {
                    ServiceError::Validation(format!("bad mileage value '{miles_field}'"))
                })?;
                let to_airport = airports
                    .get(column)
                    .map(|a| a.code.clone())
                    .ok_or_else(|| {
                        ServiceError::Validation("mileage row wider than code line".to_string())
                    })?;

                let segment_name = format!("AA{flight_number}");
                self.flights
                    .store_segment(&FlightSegment::new(
                        &segment_name,
                        airport_code,
                        &to_airport,
                        miles,
                    ))
                    .await?;

                for days_from_now in 0..MAX_FLIGHTS_PER_SEGMENT {
                    let departure = start + Duration::days(days_from_now);
                    let arrival = arrival_time(departure, miles);
                    self.flights
                        .create_flight(&segment_name, departure, arrival, 500, 200, 10, 200, "B747")
                        .await?;
                }
                flight_number += 1;
            }
        }

        for airport in &airports {
            self.flights.store_airport_mapping(airport).await?;
        }

        info!(
            "Loaded {} segments and {} airports",
            flight_number,
            airports.len()
        );
        Ok(())
    }
}

fn midnight_today() -> DateTime<Utc> {
    Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc()
}

fn arrival_time(departure: DateTime<Utc>, miles: i32) -> DateTime<Utc> {
    let hours = miles as f64 / AVERAGE_SPEED_MPH;
    departure + Duration::minutes((hours * 60.0) as i64)
}

/// Registers a fixed population of customers, `uid{n}@email.com`, all at the
/// same address.
pub struct CustomerLoader {
    customers: Arc<CustomerService>,
}

impl CustomerLoader {
    pub fn new(customers: Arc<CustomerService>) -> Self {
        Self { customers }
    }

    pub async fn load_customers(&self, num_customers: u64) -> Result<(), ServiceError> {
        let address = CustomerAddress {
            street_address1: "123 Main St.".to_string(),
            street_address2: None,
            city: "Anytown".to_string(),
            state_province: "NC".to_string(),
            country: "USA".to_string(),
            postal_code: "27617".to_string(),
        };
        for n in 0..num_customers {
            self.customers
                .create_customer(
                    &format!("uid{n}@email.com"),
                    "password",
                    MembershipStatus::Gold,
                    1_000_000,
                    1000,
                    "919-123-4567",
                    PhoneType::Business,
                    address.clone(),
                )
                .await?;
        }
        info!("Loaded {} customers", num_customers);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyfare_store::InMemoryStore;

    const TWO_AIRPORTS: &str = "\
John F Kennedy Intl,Los Angeles Intl
JFK,LAX
John F Kennedy Intl,JFK,NA,2475
Los Angeles Intl,LAX,2475,NA
";

    #[tokio::test]
    async fn test_loader_creates_daily_flights_per_segment() {
        let store = Arc::new(InMemoryStore::new());
        let flights = Arc::new(FlightService::new(store));
        let loader = FlightLoader::new(flights.clone());

        loader.load_flights(TWO_AIRPORTS).await.unwrap();

        // Two directed segments, thirty daily flights each, two airports.
        assert_eq!(flights.count_segments().await.unwrap(), 2);
        assert_eq!(flights.count_flights().await.unwrap(), 60);
        assert_eq!(flights.count_airports().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_day_conditioned_query_returns_single_flight() {
        let store = Arc::new(InMemoryStore::new());
        let flights = Arc::new(FlightService::new(store));
        let loader = FlightLoader::new(flights.clone());

        loader.load_flights(TWO_AIRPORTS).await.unwrap();

        let day5 = (midnight_today() + Duration::days(5)).date_naive();
        let found = flights
            .get_flights_by_airports_and_departure_date("JFK", "LAX", day5)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].scheduled_departure.date_naive(), day5);
    }

    #[tokio::test]
    async fn test_bundled_mileage_matrix_loads() {
        let store = Arc::new(InMemoryStore::new());
        let flights = Arc::new(FlightService::new(store));
        let loader = FlightLoader::new(flights.clone());

        loader.load_default_flights().await.unwrap();

        // Five airports, each with four outbound routes.
        assert_eq!(flights.count_airports().await.unwrap(), 5);
        assert_eq!(flights.count_segments().await.unwrap(), 20);
        assert_eq!(flights.count_flights().await.unwrap(), 600);
    }

    #[tokio::test]
    async fn test_arrival_time_uses_cruise_speed() {
        let departure = midnight_today();
        // 2475 miles at 600 mph is 4 hours 7 minutes.
        let arrival = arrival_time(departure, 2475);
        assert_eq!(arrival - departure, Duration::minutes(247));
    }

    #[tokio::test]
    async fn test_customer_loader_population() {
        let store = Arc::new(InMemoryStore::new());
        let customers = Arc::new(CustomerService::new(store));
        let loader = CustomerLoader::new(customers.clone());

        loader.load_customers(5).await.unwrap();

        assert_eq!(customers.count_customers().await.unwrap(), 5);
        let first = customers
            .get_customer_by_username("uid0@email.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.status, MembershipStatus::Gold);
    }
}
