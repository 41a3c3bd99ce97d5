//! Port Registry: serial port discovery and validation
//!
//! The registry asks a [`PortEnumerator`] for the ports currently attached
//! and classifies them. Enumeration fails soft: if the OS call errors the
//! registry logs it and reports no ports, so the rest of the pipeline keeps
//! running.
//!
//! A descriptor is *invalid* when it has no manufacturer string or when its
//! path is on the configured exclusion list. Validation is never cached;
//! ports come and go between calls, so callers re-check at selection and
//! deploy time.

pub mod system;

pub use system::SystemPortEnumerator;

use crate::config::PortSettings;
use crate::error::Result;
use crate::types::PortDescriptor;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Source of serial port listings
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PortEnumerator: Send + Sync {
    /// List the serial ports currently attached
    async fn enumerate(&self) -> Result<Vec<PortDescriptor>>;
}

/// Enumerates and classifies serial ports
#[derive(Clone)]
pub struct PortRegistry {
    enumerator: Arc<dyn PortEnumerator>,
    exclusions: Vec<String>,
}

impl PortRegistry {
    pub fn new(enumerator: Arc<dyn PortEnumerator>, settings: &PortSettings) -> Self {
        Self {
            enumerator,
            exclusions: settings.exclusions.clone(),
        }
    }

    /// Registry backed by the OS serial port listing
    pub fn system(settings: &PortSettings) -> Self {
        Self::new(Arc::new(SystemPortEnumerator), settings)
    }

    /// List attached ports. Never fails; enumeration errors yield an empty list.
    ///
    /// Paths are unique in the result; if the OS reports a path twice only
    /// the first record is kept.
    pub async fn list(&self) -> Vec<PortDescriptor> {
        let ports = match self.enumerator.enumerate().await {
            Ok(ports) => ports,
            Err(e) => {
                tracing::warn!("Port enumeration failed, treating as no ports: {}", e);
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let ports: Vec<_> = ports
            .into_iter()
            .filter(|p| seen.insert(p.path.clone()))
            .collect();

        tracing::debug!("Enumerated {} port(s)", ports.len());
        ports
    }

    /// Whether a descriptor names a real device interface
    pub fn validate(&self, port: &PortDescriptor) -> bool {
        let has_manufacturer = port
            .manufacturer
            .as_deref()
            .is_some_and(|m| !m.trim().is_empty());

        has_manufacturer && !self.is_excluded(&port.path)
    }

    /// Whether a path is on the exclusion list
    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclusions.iter().any(|e| e == path)
    }

    /// Find a path in a listing
    pub fn find<'a>(ports: &'a [PortDescriptor], path: &str) -> Option<&'a PortDescriptor> {
        ports.iter().find(|p| p.path == path)
    }

    /// Pick a port without user input: the first valid port that looks like
    /// an Arduino, else the first valid port.
    pub fn auto_select<'a>(&self, ports: &'a [PortDescriptor]) -> Option<&'a PortDescriptor> {
        let mut valid = ports.iter().filter(|p| self.validate(p));
        let first_valid = valid.clone().next();
        valid.find(|p| p.looks_like_arduino()).or(first_valid)
    }
}

impl std::fmt::Debug for PortRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortRegistry")
            .field("exclusions", &self.exclusions)
            .finish_non_exhaustive()
    }
}
