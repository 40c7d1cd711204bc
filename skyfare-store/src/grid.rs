use async_trait::async_trait;
use chrono::NaiveDate;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use skyfare_core::booking::Booking;
use skyfare_core::customer::{Customer, CustomerSession};
use skyfare_core::flight::{AirportCodeMapping, Flight, FlightSegment};
use skyfare_core::repository::{BookingStore, CustomerStore, DuplicateBooking, FlightStore};

/// Conditional swap: only write when the stored value still matches what the
/// caller read (absent reads as the empty string).
const CAS_SCRIPT: &str = r#"
    local cur = redis.call('GET', KEYS[1])
    if cur == false then cur = '' end
    if cur == ARGV[1] then
        redis.call('SET', KEYS[1], ARGV[2])
        return 1
    end
    return 0
"#;

const CAS_ATTEMPTS: usize = 5;
const SCAN_BATCH: usize = 100;

// Partition keys are deliberate and asymmetric per map: a customer's
// bookings live under one slot, a segment's flights under one slot, an
// airport's outbound segments under one slot. The braces are cluster hash
// tags carrying exactly that routing choice.
fn booking_key(customer_id: &str) -> String {
    format!("booking:{{{customer_id}}}")
}

fn flight_key(segment_id: &str) -> String {
    format!("flight:{{{segment_id}}}")
}

fn segment_key(origin: &str) -> String {
    format!("segment:{{{origin}}}")
}

fn customer_key(username: &str) -> String {
    format!("customer:{username}")
}

fn session_key(session_id: &str) -> String {
    format!("session:{session_id}")
}

fn airport_key(code: &str) -> String {
    format!("airport:{code}")
}

#[derive(Clone)]
pub struct GridClient {
    client: redis::Client,
}

impl GridClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    async fn conn(&self) -> Result<MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    async fn get_record<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, Box<dyn std::error::Error + Send + Sync>> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put_record<T: Serialize>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut conn = self.conn().await?;
        conn.set::<_, _, ()>(key, serde_json::to_string(value)?).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn get_collection<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Vec<T>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.get_record(key).await?.unwrap_or_default())
    }

    /// Read-modify-write on a collection value. `mutate` receives the current
    /// collection and returns the replacement, or `None` to leave the stored
    /// value untouched. The write is a compare-and-swap against the snapshot
    /// the mutation saw; on interference the whole sequence is retried.
    async fn update_collection<T, F>(
        &self,
        key: &str,
        mutate: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(Vec<T>) -> Result<Option<Vec<T>>, Box<dyn std::error::Error + Send + Sync>>,
    {
        let script = redis::Script::new(CAS_SCRIPT);
        for attempt in 0..CAS_ATTEMPTS {
            let mut conn = self.conn().await?;
            let raw: Option<String> = conn.get(key).await?;
            let current: Vec<T> = match &raw {
                Some(json) => serde_json::from_str(json)?,
                None => Vec::new(),
            };

            let next = match mutate(current)? {
                Some(next) => next,
                None => return Ok(()),
            };

            let expected = raw.unwrap_or_default();
            let swapped: i32 = script
                .key(key)
                .arg(&expected)
                .arg(serde_json::to_string(&next)?)
                .invoke_async(&mut conn)
                .await?;
            if swapped == 1 {
                return Ok(());
            }
            debug!("Conditional write on {} lost attempt {}, retrying", key, attempt + 1);
        }
        warn!("Conditional write on {} did not settle after {} attempts", key, CAS_ATTEMPTS);
        Err(format!("conditional write on '{key}' did not settle after {CAS_ATTEMPTS} attempts").into())
    }

    async fn keys_matching(
        &self,
        pattern: &str,
    ) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> {
        let mut conn = self.conn().await?;
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(keys)
    }

    /// Counts by walking the key index, one key at a time. O(n), the
    /// documented cost of not maintaining a separate counter.
    async fn count_keys(
        &self,
        pattern: &str,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.keys_matching(pattern).await?.len() as u64)
    }

    /// Counts entries inside collection values, one collection at a time.
    async fn count_collection_entries<T: DeserializeOwned>(
        &self,
        pattern: &str,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        let mut total = 0u64;
        for key in self.keys_matching(pattern).await? {
            total += self.get_collection::<T>(&key).await?.len() as u64;
        }
        Ok(total)
    }
}

/// Flight persistence against the partitioned grid: flights grouped under
/// their segment, segments grouped under their origin airport.
pub struct GridFlightStore {
    grid: GridClient,
}

impl GridFlightStore {
    pub fn new(grid: GridClient) -> Self {
        Self { grid }
    }
}

#[async_trait]
impl FlightStore for GridFlightStore {
    async fn get_flight(
        &self,
        flight_id: &str,
        segment_id: &str,
    ) -> Result<Option<Flight>, Box<dyn std::error::Error + Send + Sync>> {
        let flights: Vec<Flight> = self.grid.get_collection(&flight_key(segment_id)).await?;
        Ok(flights.into_iter().find(|f| f.id == flight_id))
    }

    async fn get_segment(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<Option<FlightSegment>, Box<dyn std::error::Error + Send + Sync>> {
        let segments: Vec<FlightSegment> = self.grid.get_collection(&segment_key(origin)).await?;
        Ok(segments.into_iter().find(|s| s.destination == destination))
    }

    async fn get_flights_by_segment(
        &self,
        segment: &FlightSegment,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Flight>, Box<dyn std::error::Error + Send + Sync>> {
        let flights: Vec<Flight> = self.grid.get_collection(&flight_key(&segment.name)).await?;
        let mut matching = Vec::new();
        for mut flight in flights {
            if let Some(date) = date {
                if flight.scheduled_departure.date_naive() != date {
                    continue;
                }
            }
            flight.segment = Some(segment.clone());
            matching.push(flight);
        }
        Ok(matching)
    }

    async fn create_flight(
        &self,
        flight: &Flight,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.grid
            .update_collection::<Flight, _>(&flight_key(&flight.segment_id), |mut flights| {
                if flights.iter().any(|f| f.id == flight.id) {
                    return Ok(None);
                }
                flights.push(flight.clone());
                Ok(Some(flights))
            })
            .await
    }

    async fn store_segment(
        &self,
        segment: &FlightSegment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.grid
            .update_collection::<FlightSegment, _>(&segment_key(&segment.origin), |mut segments| {
                if segments.iter().any(|s| s.name == segment.name) {
                    return Ok(None);
                }
                segments.push(segment.clone());
                Ok(Some(segments))
            })
            .await
    }

    async fn store_airport_mapping(
        &self,
        mapping: &AirportCodeMapping,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.grid.put_record(&airport_key(&mapping.code), mapping).await
    }

    async fn count_flights(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        self.grid.count_collection_entries::<Flight>("flight:*").await
    }

    async fn count_segments(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        self.grid.count_collection_entries::<FlightSegment>("segment:*").await
    }

    async fn count_airports(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        self.grid.count_keys("airport:*").await
    }
}

/// Customer and session persistence: single records, keyed directly.
pub struct GridCustomerStore {
    grid: GridClient,
}

impl GridCustomerStore {
    pub fn new(grid: GridClient) -> Self {
        Self { grid }
    }
}

#[async_trait]
impl CustomerStore for GridCustomerStore {
    async fn create_customer(
        &self,
        customer: &Customer,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.grid.put_record(&customer_key(&customer.username), customer).await
    }

    async fn update_customer(
        &self,
        customer: &Customer,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.grid.put_record(&customer_key(&customer.username), customer).await
    }

    async fn get_customer(
        &self,
        username: &str,
    ) -> Result<Option<Customer>, Box<dyn std::error::Error + Send + Sync>> {
        self.grid.get_record(&customer_key(username)).await
    }

    async fn create_session(
        &self,
        session: &CustomerSession,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.grid.put_record(&session_key(&session.id), session).await
    }

    async fn get_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CustomerSession>, Box<dyn std::error::Error + Send + Sync>> {
        self.grid.get_record(&session_key(session_id)).await
    }

    async fn remove_session(
        &self,
        session_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.grid.delete(&session_key(session_id)).await
    }

    async fn count_customers(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        self.grid.count_keys("customer:*").await
    }

    async fn count_sessions(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        self.grid.count_keys("session:*").await
    }
}

/// Booking persistence: the whole of a customer's bookings is one collection
/// value under the customer's key, so listing them is a single-partition read.
pub struct GridBookingStore {
    grid: GridClient,
}

impl GridBookingStore {
    pub fn new(grid: GridClient) -> Self {
        Self { grid }
    }
}

#[async_trait]
impl BookingStore for GridBookingStore {
    async fn store_booking(
        &self,
        booking: &Booking,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.grid
            .update_collection::<Booking, _>(&booking_key(&booking.customer_id), |mut bookings| {
                if bookings.iter().any(|b| b.id == booking.id) {
                    return Err(Box::new(DuplicateBooking {
                        customer_id: booking.customer_id.clone(),
                        booking_id: booking.id.clone(),
                    }) as Box<dyn std::error::Error + Send + Sync>);
                }
                bookings.push(booking.clone());
                Ok(Some(bookings))
            })
            .await
    }

    async fn get_booking(
        &self,
        customer_id: &str,
        booking_id: &str,
    ) -> Result<Option<Booking>, Box<dyn std::error::Error + Send + Sync>> {
        let bookings: Vec<Booking> = self.grid.get_collection(&booking_key(customer_id)).await?;
        Ok(bookings.into_iter().find(|b| b.id == booking_id))
    }

    async fn get_bookings_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>> {
        self.grid.get_collection(&booking_key(customer_id)).await
    }

    async fn cancel_booking(
        &self,
        customer_id: &str,
        booking_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.grid
            .update_collection::<Booking, _>(&booking_key(customer_id), |bookings| {
                if !bookings.iter().any(|b| b.id == booking_id) {
                    return Ok(None);
                }
                Ok(Some(bookings.into_iter().filter(|b| b.id != booking_id).collect()))
            })
            .await
    }

    async fn count_bookings(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        self.grid.count_collection_entries::<Booking>("booking:*").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_keys_carry_hash_tags() {
        assert_eq!(booking_key("uid0@email.com"), "booking:{uid0@email.com}");
        assert_eq!(flight_key("AA12"), "flight:{AA12}");
        assert_eq!(segment_key("JFK"), "segment:{JFK}");
    }

    #[test]
    fn test_single_record_keys_are_flat() {
        assert_eq!(customer_key("uid0@email.com"), "customer:uid0@email.com");
        assert_eq!(session_key("abc"), "session:abc");
        assert_eq!(airport_key("LAX"), "airport:LAX");
    }

    #[test]
    fn test_cas_script_treats_absent_as_empty() {
        // The script compares an absent key against the empty string, so a
        // first write expects "" rather than a Redis nil.
        assert!(CAS_SCRIPT.contains("if cur == false then cur = '' end"));
    }
}
