//! Explicit parsing context.
//!
//! The context carries the process-wide collaborators the model consults
//! while parsing: the extension-point registry and the clock. It is
//! threaded through `from_xml` and `decrypt` calls explicitly instead of
//! living in a global, which keeps concurrent parsing and tests free of
//! shared state. Registering extension handlers is a setup-time
//! operation; a context is read-only once parsing starts.

use chrono::{DateTime, Utc};
use rand::RngCore;

use crate::registry::ExtensionRegistry;

/// Time source consulted where an issue instant defaults to "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one instant.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub struct SamlContext {
    registry: ExtensionRegistry,
    clock: Box<dyn Clock>,
}

impl SamlContext {
    pub fn new() -> Self {
        Self {
            registry: ExtensionRegistry::default(),
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            registry: ExtensionRegistry::default(),
            clock: Box::new(clock),
        }
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    /// Mutable registry access for setup-time handler registration.
    pub fn registry_mut(&mut self) -> &mut ExtensionRegistry {
        &mut self.registry
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

impl Default for SamlContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Generates a message or assertion identifier: `_` followed by 32 hex
/// digits, matching the form SAML deployments conventionally use.
pub fn generate_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    format!("_{}", hex::encode(bytes))
}
