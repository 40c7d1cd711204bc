use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use tracing::debug;

use skyfare_core::flight::{AirportCodeMapping, Flight, FlightSegment};
use skyfare_core::keygen::KeyGenerator;
use skyfare_core::repository::FlightStore;

use crate::ServiceError;

/// Flight lookups with a three-tier read cache over the selected backend.
///
/// Each cache is guarded individually and populated with insert-if-absent
/// semantics only: racing writers converge on whichever value landed first,
/// and nothing ever removes or overwrites an entry. That is sound because
/// flights and segments are immutable once the bulk load has run.
pub struct FlightService {
    store: Arc<dyn FlightStore>,
    keygen: KeyGenerator,
    /// origin+destination -> segment (sentinel for routes known not to exist)
    segment_cache: DashMap<String, FlightSegment>,
    /// segment name + departure date -> flights that day
    flight_list_cache: DashMap<String, Vec<Flight>>,
    /// flight id -> flight
    flight_cache: DashMap<String, Flight>,
}

impl FlightService {
    pub fn new(store: Arc<dyn FlightStore>) -> Self {
        Self {
            store,
            keygen: KeyGenerator,
            segment_cache: DashMap::new(),
            flight_list_cache: DashMap::new(),
            flight_cache: DashMap::new(),
        }
    }

    pub async fn get_flights_by_airports_and_departure_date(
        &self,
        from_airport: &str,
        to_airport: &str,
        departure_date: NaiveDate,
    ) -> Result<Vec<Flight>, ServiceError> {
        debug!(
            "Search for flights from {} to {} on {}",
            from_airport, to_airport, departure_date
        );

        let route_key = format!("{from_airport}{to_airport}");
        let cached = self.segment_cache.get(&route_key).map(|s| s.value().clone());
        let segment = match cached {
            Some(segment) => segment,
            None => {
                let fetched = self
                    .store
                    .get_segment(from_airport, to_airport)
                    .await
                    .map_err(ServiceError::Backend)?
                    .unwrap_or_else(FlightSegment::sentinel);
                self.segment_cache
                    .entry(route_key)
                    .or_insert(fetched)
                    .value()
                    .clone()
            }
        };

        // A cached sentinel means the route is known not to exist; answer
        // without another backend call.
        if segment.is_sentinel() {
            return Ok(Vec::new());
        }

        let list_key = format!("{}{}", segment.name, departure_date);
        if let Some(flights) = self.flight_list_cache.get(&list_key) {
            return Ok(flights.value().clone());
        }

        let flights = self
            .store
            .get_flights_by_segment(&segment, Some(departure_date))
            .await
            .map_err(ServiceError::Backend)?;
        Ok(self
            .flight_list_cache
            .entry(list_key)
            .or_insert(flights)
            .value()
            .clone())
    }

    /// NOTE: this is not cached. The unconditioned result set is large and
    /// changes with fresh loads.
    pub async fn get_flights_by_airports(
        &self,
        from_airport: &str,
        to_airport: &str,
    ) -> Result<Vec<Flight>, ServiceError> {
        let segment = self
            .store
            .get_segment(from_airport, to_airport)
            .await
            .map_err(ServiceError::Backend)?;
        match segment {
            Some(segment) => self
                .store
                .get_flights_by_segment(&segment, None)
                .await
                .map_err(ServiceError::Backend),
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_flight_by_id(
        &self,
        flight_id: &str,
        segment_id: &str,
    ) -> Result<Option<Flight>, ServiceError> {
        if let Some(flight) = self.flight_cache.get(flight_id) {
            return Ok(Some(flight.value().clone()));
        }
        match self
            .store
            .get_flight(flight_id, segment_id)
            .await
            .map_err(ServiceError::Backend)?
        {
            Some(flight) => Ok(Some(
                self.flight_cache
                    .entry(flight_id.to_string())
                    .or_insert(flight)
                    .value()
                    .clone(),
            )),
            None => Ok(None),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_flight(
        &self,
        segment_id: &str,
        scheduled_departure: DateTime<Utc>,
        scheduled_arrival: DateTime<Utc>,
        first_class_price_nuc: i32,
        economy_price_nuc: i32,
        first_class_seats: i32,
        economy_seats: i32,
        aircraft: &str,
    ) -> Result<Flight, ServiceError> {
        let flight = Flight {
            id: self.keygen.generate(),
            segment_id: segment_id.to_string(),
            scheduled_departure,
            scheduled_arrival,
            first_class_price_nuc,
            economy_price_nuc,
            first_class_seats,
            economy_seats,
            aircraft: aircraft.to_string(),
            segment: None,
        };
        self.store
            .create_flight(&flight)
            .await
            .map_err(ServiceError::Backend)?;
        Ok(flight)
    }

    pub async fn store_segment(&self, segment: &FlightSegment) -> Result<(), ServiceError> {
        // The unnamed empty segment is the cached not-found marker and must
        // never reach a backend.
        if segment.is_sentinel() {
            return Err(ServiceError::Validation(
                "refusing to store a route segment without a name".to_string(),
            ));
        }
        self.store
            .store_segment(segment)
            .await
            .map_err(ServiceError::Backend)
    }

    pub async fn store_airport_mapping(
        &self,
        mapping: &AirportCodeMapping,
    ) -> Result<(), ServiceError> {
        self.store
            .store_airport_mapping(mapping)
            .await
            .map_err(ServiceError::Backend)
    }

    pub async fn count_flights(&self) -> Result<u64, ServiceError> {
        self.store.count_flights().await.map_err(ServiceError::Backend)
    }

    pub async fn count_segments(&self) -> Result<u64, ServiceError> {
        self.store.count_segments().await.map_err(ServiceError::Backend)
    }

    pub async fn count_airports(&self) -> Result<u64, ServiceError> {
        self.store.count_airports().await.map_err(ServiceError::Backend)
    }
}
