use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use skyfare_core::repository::{BookingStore, CustomerStore, FlightStore};

use crate::app_config::Config;
use crate::database::DbClient;
use crate::docstore::{DocBookingStore, DocCustomerStore, DocFlightStore};
use crate::grid::{GridBookingStore, GridCustomerStore, GridFlightStore};
use crate::inmemory::InMemoryStore;
use crate::GridClient;

/// Environment variable carrying the backend-type identifier.
pub const BACKEND_LOOKUP_KEY: &str = "SKYFARE_BACKEND";

/// Service-binding document (a map from service names to credentials),
/// scanned when neither the config property nor the variable is set.
pub const SERVICE_BINDING_KEY: &str = "VCAP_SERVICES";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Grid,
    DocStore,
    InMemory,
}

/// Every registered backend: declared identifier, kind, description.
const REGISTERED: &[(&str, BackendKind, &str)] = &[
    ("grid", BackendKind::Grid, "Partitioned in-memory data grid"),
    ("document", BackendKind::DocStore, "Document store"),
    ("inmemory", BackendKind::InMemory, "Unpartitioned in-process store"),
];

/// Service-name prefixes recognized in the binding document, mapped to the
/// backend identifier they imply.
const BINDING_PREFIXES: &[(&str, &str)] = &[
    ("elasticaching", "grid"),
    ("datacache", "grid"),
    ("redis", "grid"),
    ("mongo", "document"),
    ("postgres", "document"),
    ("elephantsql", "document"),
];

impl BackendKind {
    /// Case-insensitive match against the declared identifiers of all
    /// registered backends. `None` means nothing is registered under the
    /// identifier; callers treat that as fatal, not retryable.
    pub fn for_identifier(identifier: &str) -> Option<Self> {
        REGISTERED
            .iter()
            .find(|(name, _, _)| name.eq_ignore_ascii_case(identifier))
            .map(|(_, kind, _)| *kind)
    }

    pub fn identifier(&self) -> &'static str {
        match self {
            BackendKind::Grid => "grid",
            BackendKind::DocStore => "document",
            BackendKind::InMemory => "inmemory",
        }
    }
}

/// The backends available for selection, with a description of each one.
pub fn available_backends() -> Vec<(&'static str, &'static str)> {
    REGISTERED.iter().map(|(name, _, desc)| (*name, *desc)).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no registered backend matches identifier '{0}'")]
    UnknownBackend(String),
    #[error("backend initialization failed: {0}")]
    Init(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Scans the binding document for the first service entry whose name starts
/// with a known signature prefix.
fn identifier_from_binding_document(raw: &str) -> Option<String> {
    let doc: serde_json::Value = match serde_json::from_str(raw) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Ignoring unparseable service-binding document: {}", e);
            return None;
        }
    };
    let entries = doc.as_object()?;
    for name in entries.keys() {
        let lowered = name.to_lowercase();
        for (prefix, identifier) in BINDING_PREFIXES {
            if lowered.starts_with(prefix) {
                info!("Service binding '{}' selects backend '{}'", name, identifier);
                return Some((*identifier).to_string());
            }
        }
    }
    None
}

/// Resolution order: explicit configuration property, then the environment
/// variable, then the service-binding document. `None` means no signal at
/// all, which falls back to the ambient default.
fn resolve_identifier(explicit: Option<&str>) -> Option<String> {
    if let Some(identifier) = explicit {
        info!("Found backend in configuration: {}", identifier);
        return Some(identifier.to_string());
    }
    if let Ok(identifier) = std::env::var(BACKEND_LOOKUP_KEY) {
        info!("Found backend in environment: {}", identifier);
        return Some(identifier);
    }
    if let Ok(raw) = std::env::var(SERVICE_BINDING_KEY) {
        info!("Reading {}", SERVICE_BINDING_KEY);
        if let Some(identifier) = identifier_from_binding_document(&raw) {
            return Some(identifier);
        }
    }
    None
}

pub fn resolve_backend_kind(explicit: Option<&str>) -> Result<BackendKind, RegistryError> {
    match resolve_identifier(explicit) {
        Some(identifier) => BackendKind::for_identifier(&identifier)
            .ok_or(RegistryError::UnknownBackend(identifier)),
        None => {
            warn!("Can not determine backend type. Using the default implementation.");
            Ok(BackendKind::InMemory)
        }
    }
}

/// Process-wide selection of one concrete implementation per abstract
/// service, resolved once at startup.
pub struct Registry {
    kind: BackendKind,
    flights: Arc<dyn FlightStore>,
    customers: Arc<dyn CustomerStore>,
    bookings: Arc<dyn BookingStore>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("kind", &self.kind).finish_non_exhaustive()
    }
}

static REGISTRY: OnceCell<Registry> = OnceCell::const_new();

impl Registry {
    /// The singleton instance. The first caller constructs it; concurrent
    /// callers block until construction completes, then share it.
    pub async fn instance(config: &Config) -> Result<&'static Registry, RegistryError> {
        REGISTRY.get_or_try_init(|| Self::build(config)).await
    }

    async fn build(config: &Config) -> Result<Registry, RegistryError> {
        let kind = resolve_backend_kind(config.backend.as_deref())?;
        info!("Backend type is now: {}", kind.identifier());

        match kind {
            BackendKind::Grid => {
                let grid = GridClient::new(&config.redis.url)
                    .await
                    .map_err(|e| RegistryError::Init(Box::new(e)))?;
                Ok(Registry {
                    kind,
                    flights: Arc::new(GridFlightStore::new(grid.clone())),
                    customers: Arc::new(GridCustomerStore::new(grid.clone())),
                    bookings: Arc::new(GridBookingStore::new(grid)),
                })
            }
            BackendKind::DocStore => {
                let db = DbClient::new(&config.database.url)
                    .await
                    .map_err(|e| RegistryError::Init(Box::new(e)))?;
                db.migrate().await.map_err(|e| RegistryError::Init(Box::new(e)))?;
                Ok(Registry {
                    kind,
                    flights: Arc::new(DocFlightStore::new(db.pool.clone())),
                    customers: Arc::new(DocCustomerStore::new(db.pool.clone())),
                    bookings: Arc::new(DocBookingStore::new(db.pool)),
                })
            }
            BackendKind::InMemory => {
                let shared = Arc::new(InMemoryStore::new());
                Ok(Registry {
                    kind,
                    flights: shared.clone(),
                    customers: shared.clone(),
                    bookings: shared,
                })
            }
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.kind
    }

    pub fn flight_store(&self) -> Arc<dyn FlightStore> {
        self.flights.clone()
    }

    pub fn customer_store(&self) -> Arc<dyn CustomerStore> {
        self.customers.clone()
    }

    pub fn booking_store(&self) -> Arc<dyn BookingStore> {
        self.bookings.clone()
    }
}
