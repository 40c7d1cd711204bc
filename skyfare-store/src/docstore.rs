use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use sqlx::{PgPool, Row};

use skyfare_core::booking::Booking;
use skyfare_core::customer::{Customer, CustomerSession};
use skyfare_core::flight::{AirportCodeMapping, Flight, FlightSegment};
use skyfare_core::repository::{BookingStore, CustomerStore, DuplicateBooking, FlightStore};

// One row per record: a JSONB document plus the queried fields promoted to
// real columns, so every lookup is a plain field-equality WHERE clause.

fn doc_from_row(row: &sqlx::postgres::PgRow) -> Result<serde_json::Value, sqlx::Error> {
    row.try_get("doc")
}

/// Flight persistence against the document store.
pub struct DocFlightStore {
    pool: PgPool,
}

impl DocFlightStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FlightStore for DocFlightStore {
    async fn get_flight(
        &self,
        flight_id: &str,
        _segment_id: &str,
    ) -> Result<Option<Flight>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query("SELECT doc FROM flights WHERE id = $1")
            .bind(flight_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(serde_json::from_value(doc_from_row(&row)?)?)),
            None => Ok(None),
        }
    }

    async fn get_segment(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<Option<FlightSegment>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query("SELECT doc FROM flight_segments WHERE origin = $1 AND destination = $2")
            .bind(origin)
            .bind(destination)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(serde_json::from_value(doc_from_row(&row)?)?)),
            None => Ok(None),
        }
    }

    async fn get_flights_by_segment(
        &self,
        segment: &FlightSegment,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Flight>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = if let Some(date) = date {
            let day_start = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
            let day_end = day_start + chrono::Duration::days(1);
            sqlx::query(
                "SELECT doc FROM flights WHERE segment_id = $1 \
                 AND scheduled_departure >= $2 AND scheduled_departure < $3",
            )
            .bind(&segment.name)
            .bind(day_start)
            .bind(day_end)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query("SELECT doc FROM flights WHERE segment_id = $1")
                .bind(&segment.name)
                .fetch_all(&self.pool)
                .await?
        };

        let mut flights = Vec::with_capacity(rows.len());
        for row in rows {
            let mut flight: Flight = serde_json::from_value(doc_from_row(&row)?)?;
            flight.segment = Some(segment.clone());
            flights.push(flight);
        }
        Ok(flights)
    }

    async fn create_flight(
        &self,
        flight: &Flight,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            "INSERT INTO flights (id, segment_id, scheduled_departure, doc) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (id) DO NOTHING",
        )
        .bind(&flight.id)
        .bind(&flight.segment_id)
        .bind(flight.scheduled_departure)
        .bind(serde_json::to_value(flight)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn store_segment(
        &self,
        segment: &FlightSegment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            "INSERT INTO flight_segments (name, origin, destination, doc) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (name) DO UPDATE SET doc = EXCLUDED.doc",
        )
        .bind(&segment.name)
        .bind(&segment.origin)
        .bind(&segment.destination)
        .bind(serde_json::to_value(segment)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn store_airport_mapping(
        &self,
        mapping: &AirportCodeMapping,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            "INSERT INTO airport_codes (code, doc) VALUES ($1, $2) \
             ON CONFLICT (code) DO UPDATE SET doc = EXCLUDED.doc",
        )
        .bind(&mapping.code)
        .bind(serde_json::to_value(mapping)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_flights(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM flights")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn count_segments(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM flight_segments")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn count_airports(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM airport_codes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

/// Customer and session persistence against the document store.
pub struct DocCustomerStore {
    pool: PgPool,
}

impl DocCustomerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerStore for DocCustomerStore {
    async fn create_customer(
        &self,
        customer: &Customer,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            "INSERT INTO customers (username, doc) VALUES ($1, $2) \
             ON CONFLICT (username) DO UPDATE SET doc = EXCLUDED.doc",
        )
        .bind(&customer.username)
        .bind(serde_json::to_value(customer)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_customer(
        &self,
        customer: &Customer,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.create_customer(customer).await
    }

    async fn get_customer(
        &self,
        username: &str,
    ) -> Result<Option<Customer>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query("SELECT doc FROM customers WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(serde_json::from_value(doc_from_row(&row)?)?)),
            None => Ok(None),
        }
    }

    async fn create_session(
        &self,
        session: &CustomerSession,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            "INSERT INTO customer_sessions (id, customer_id, doc) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc",
        )
        .bind(&session.id)
        .bind(&session.customer_id)
        .bind(serde_json::to_value(session)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CustomerSession>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query("SELECT doc FROM customer_sessions WHERE id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(serde_json::from_value(doc_from_row(&row)?)?)),
            None => Ok(None),
        }
    }

    async fn remove_session(
        &self,
        session_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query("DELETE FROM customer_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count_customers(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn count_sessions(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customer_sessions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

/// Booking persistence against the document store: one row per booking, so
/// no client-side merge-on-write and no lost-update race.
pub struct DocBookingStore {
    pool: PgPool,
}

impl DocBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for DocBookingStore {
    async fn store_booking(
        &self,
        booking: &Booking,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let result = sqlx::query(
            "INSERT INTO bookings (customer_id, id, doc) VALUES ($1, $2, $3) \
             ON CONFLICT (customer_id, id) DO NOTHING",
        )
        .bind(&booking.customer_id)
        .bind(&booking.id)
        .bind(serde_json::to_value(booking)?)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Box::new(DuplicateBooking {
                customer_id: booking.customer_id.clone(),
                booking_id: booking.id.clone(),
            }));
        }
        Ok(())
    }

    async fn get_booking(
        &self,
        customer_id: &str,
        booking_id: &str,
    ) -> Result<Option<Booking>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query("SELECT doc FROM bookings WHERE customer_id = $1 AND id = $2")
            .bind(customer_id)
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(serde_json::from_value(doc_from_row(&row)?)?)),
            None => Ok(None),
        }
    }

    async fn get_bookings_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = sqlx::query("SELECT doc FROM bookings WHERE customer_id = $1")
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;

        let mut bookings = Vec::with_capacity(rows.len());
        for row in rows {
            bookings.push(serde_json::from_value(doc_from_row(&row)?)?);
        }
        Ok(bookings)
    }

    async fn cancel_booking(
        &self,
        customer_id: &str,
        booking_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query("DELETE FROM bookings WHERE customer_id = $1 AND id = $2")
            .bind(customer_id)
            .bind(booking_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count_bookings(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
