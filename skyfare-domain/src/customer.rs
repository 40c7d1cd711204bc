use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::debug;

use skyfare_core::customer::{
    Customer, CustomerAddress, CustomerSession, MembershipStatus, PhoneType,
};
use skyfare_core::keygen::KeyGenerator;
use skyfare_core::repository::CustomerStore;

use crate::ServiceError;

const DAYS_TO_ALLOW_SESSION: i64 = 1;

/// Customer registration, profile reads, and login-session lifecycle.
///
/// Session state machine: created at login, valid until the fixed expiry,
/// deleted lazily on the first lookup past expiry or explicitly at logout.
/// Access never extends a session.
pub struct CustomerService {
    store: Arc<dyn CustomerStore>,
    keygen: KeyGenerator,
}

impl CustomerService {
    pub fn new(store: Arc<dyn CustomerStore>) -> Self {
        Self {
            store,
            keygen: KeyGenerator,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_customer(
        &self,
        username: &str,
        password: &str,
        status: MembershipStatus,
        total_miles: i64,
        miles_ytd: i64,
        phone_number: &str,
        phone_type: PhoneType,
        address: CustomerAddress,
    ) -> Result<Customer, ServiceError> {
        let customer = Customer {
            username: username.to_string(),
            password: Some(password.to_string()),
            status,
            total_miles,
            miles_ytd,
            address,
            phone_number: phone_number.to_string(),
            phone_type,
        };
        self.store
            .create_customer(&customer)
            .await
            .map_err(ServiceError::Backend)?;
        Ok(customer)
    }

    pub async fn update_customer(&self, customer: &Customer) -> Result<(), ServiceError> {
        self.store
            .update_customer(customer)
            .await
            .map_err(ServiceError::Backend)
    }

    /// Internal lookup with the stored password intact.
    async fn get_customer(&self, username: &str) -> Result<Option<Customer>, ServiceError> {
        self.store
            .get_customer(username)
            .await
            .map_err(ServiceError::Backend)
    }

    /// The record handed out on read paths has its password cleared.
    pub async fn get_customer_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Customer>, ServiceError> {
        Ok(self.get_customer(username).await?.map(|mut customer| {
            customer.password = None;
            customer
        }))
    }

    /// Server-side equality check against the stored password.
    pub async fn validate_customer(
        &self,
        username: &str,
        password: &str,
    ) -> Result<bool, ServiceError> {
        Ok(self
            .get_customer(username)
            .await?
            .map(|customer| customer.password.as_deref() == Some(password))
            .unwrap_or(false))
    }

    pub async fn create_session(&self, customer_id: &str) -> Result<CustomerSession, ServiceError> {
        let now = Utc::now();
        let session = CustomerSession {
            id: self.keygen.generate(),
            customer_id: customer_id.to_string(),
            created: now,
            expires: now + Duration::days(DAYS_TO_ALLOW_SESSION),
        };
        self.store
            .create_session(&session)
            .await
            .map_err(ServiceError::Backend)?;
        Ok(session)
    }

    /// Resolves a session id. An expired session is removed on this first
    /// access and reported absent; the removal is permanent.
    pub async fn validate_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CustomerSession>, ServiceError> {
        let session = self
            .store
            .get_session(session_id)
            .await
            .map_err(ServiceError::Backend)?;
        let Some(session) = session else {
            return Ok(None);
        };

        if session.is_expired(Utc::now()) {
            debug!("Removing expired session {}", session_id);
            self.store
                .remove_session(session_id)
                .await
                .map_err(ServiceError::Backend)?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    pub async fn invalidate_session(&self, session_id: &str) -> Result<(), ServiceError> {
        self.store
            .remove_session(session_id)
            .await
            .map_err(ServiceError::Backend)
    }

    pub async fn count_customers(&self) -> Result<u64, ServiceError> {
        self.store.count_customers().await.map_err(ServiceError::Backend)
    }

    pub async fn count_sessions(&self) -> Result<u64, ServiceError> {
        self.store.count_sessions().await.map_err(ServiceError::Backend)
    }
}
