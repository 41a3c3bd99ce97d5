//! Transfer Engine: one-shot payload delivery over serial
//!
//! A deploy runs the following protocol, each step gated on the previous one:
//!
//! 1. **Open** the port at the configured baud rate ([`DeployError::PortOpenFailed`])
//! 2. **Write** the whole payload ([`DeployError::WriteFailed`], no partial retry)
//! 3. **Drain** until the transport confirms every byte left the wire
//! 4. **Close** the port
//!
//! Once open succeeds, close is attempted exactly once whatever the outcome
//! of steps 2-3. A port can carry one transfer at a time; a second deploy
//! against a busy port is rejected with [`DeployError::PortBusy`] rather
//! than queued.

pub mod link;
pub mod serial;

pub use link::{SerialLink, SerialTransport};
pub use serial::{SystemSerialLink, SystemSerialTransport};

use crate::error::{DeployError, Result};
use crate::types::{ArtifactKind, Payload, TransferReport};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Read a payload from disk
pub async fn read_payload(path: &Path, kind: ArtifactKind) -> Result<Payload> {
    let bytes = tokio::fs::read(path).await.map_err(|source| DeployError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Payload::new(bytes, kind, path))
}

/// Sends payloads to devices
#[derive(Clone)]
pub struct TransferEngine {
    transport: Arc<dyn SerialTransport>,
    baud_rate: u32,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl TransferEngine {
    pub fn new(transport: Arc<dyn SerialTransport>, baud_rate: u32) -> Self {
        Self {
            transport,
            baud_rate,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Engine using real serial ports
    pub fn system(baud_rate: u32) -> Self {
        Self::new(Arc::new(SystemSerialTransport), baud_rate)
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Whether a transfer currently holds `path`
    pub fn is_busy(&self, path: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path)
    }

    /// Send `payload` to the device at `port`
    pub async fn deploy(&self, port: Option<&str>, payload: &Payload) -> Result<TransferReport> {
        let path = port.ok_or(DeployError::PortRequired)?;
        if payload.is_empty() {
            return Err(DeployError::PayloadRequired);
        }

        let lease = self
            .lease(path)
            .ok_or_else(|| DeployError::PortBusy(path.to_string()))?;

        let started = Instant::now();
        tracing::info!(
            "Sending {} bytes of {} to {} at {} baud",
            payload.len(),
            payload.kind,
            path,
            self.baud_rate
        );

        let link = self
            .transport
            .open(path, self.baud_rate)
            .await
            .map_err(|e| DeployError::PortOpenFailed {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        let mut session = TransferSession {
            path,
            link: Some(link),
            _lease: lease,
        };
        let outcome = session.send(&payload.bytes).await;
        session.close().await;
        outcome?;

        let report = TransferReport {
            port: path.to_string(),
            bytes_written: payload.len(),
            kind: payload.kind,
            elapsed: started.elapsed(),
        };
        tracing::info!("Transfer to {} complete in {:?}", path, report.elapsed);
        Ok(report)
    }

    /// Claim a port for one transfer
    fn lease(&self, path: &str) -> Option<PortLease> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.insert(path.to_string()).then(|| PortLease {
            path: path.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }
}

impl std::fmt::Debug for TransferEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferEngine")
            .field("baud_rate", &self.baud_rate)
            .finish_non_exhaustive()
    }
}

/// Marks a port busy until dropped
struct PortLease {
    path: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for PortLease {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.path);
    }
}

/// One open link bound to one payload.
///
/// If the session is dropped without [`close`](Self::close) (the deploy
/// future was cancelled) the link is dropped, which releases the handle.
struct TransferSession<'a> {
    path: &'a str,
    link: Option<Box<dyn SerialLink>>,
    _lease: PortLease,
}

impl TransferSession<'_> {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let path = self.path;
        let link = self
            .link
            .as_mut()
            .ok_or_else(|| write_failed(path, "link already closed"))?;

        link.write_all(bytes)
            .await
            .map_err(|e| write_failed(path, e))?;
        link.drain()
            .await
            .map_err(|e| write_failed(path, format!("drain failed: {}", e)))?;

        Ok(())
    }

    async fn close(mut self) {
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.close().await {
                tracing::warn!("Failed to close {}: {}", self.path, e);
            }
        }
    }
}

fn write_failed(path: &str, message: impl ToString) -> DeployError {
    DeployError::WriteFailed {
        path: path.to_string(),
        message: message.to_string(),
    }
}

impl Drop for TransferSession<'_> {
    fn drop(&mut self) {
        if self.link.is_some() {
            tracing::warn!("Transfer to {} abandoned before close", self.path);
        }
    }
}
