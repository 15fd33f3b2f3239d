//! Backend registry: name to constructor.
//!
//! Process-wide state with initialize-once semantics: the map is built
//! lazily on first touch with the built-in `disk` backend pre-registered,
//! and is consulted only at startup to select an implementation by
//! configuration string. New backend types register themselves without the
//! engine ever learning their concrete type; this is the system's one
//! extensibility point.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::backend::DynBackend;
use crate::config::QueueConfig;
use crate::disk::DiskBackend;
use crate::error::{QueueError, Result};

/// Constructor for a registered backend.
pub type BackendFactory = fn(&QueueConfig) -> Result<DynBackend>;

/// Name the built-in filesystem backend registers under.
pub const DISK_BACKEND: &str = "disk";

static REGISTRY: Lazy<RwLock<HashMap<String, BackendFactory>>> = Lazy::new(|| {
    let mut factories: HashMap<String, BackendFactory> = HashMap::new();
    factories.insert(DISK_BACKEND.to_string(), |config| {
        Ok(Box::new(DiskBackend::new(config)?))
    });
    RwLock::new(factories)
});

/// Register a backend factory under `name`, replacing any previous
/// registration. Typically called once during process startup, before any
/// `build`.
pub fn register(name: impl Into<String>, factory: BackendFactory) {
    REGISTRY
        .write()
        .expect("backend registry lock poisoned")
        .insert(name.into(), factory);
}

/// Build the backend registered under `name`.
pub fn build(name: &str, config: &QueueConfig) -> Result<DynBackend> {
    let registry = REGISTRY.read().expect("backend registry lock poisoned");
    match registry.get(name) {
        Some(factory) => factory(config),
        None => Err(QueueError::UnknownBackend(name.to_string())),
    }
}
