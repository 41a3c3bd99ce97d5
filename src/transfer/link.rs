//! Serial transport traits
//!
//! This module provides the interface the Transfer Engine drives, so the
//! same protocol runs against real hardware ([`SystemSerialTransport`]) and
//! against test doubles.
//!
//! [`SystemSerialTransport`]: super::serial::SystemSerialTransport

use async_trait::async_trait;
use std::io;

/// Opens serial links
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SerialTransport: Send + Sync {
    /// Open the interface at `path` with the given baud rate
    async fn open(&self, path: &str, baud_rate: u32) -> io::Result<Box<dyn SerialLink>>;
}

/// An open serial link, exclusively owned by one transfer
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SerialLink: Send {
    /// Write the whole buffer; a short write is an error
    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Wait until every written byte has left the transmitter
    async fn drain(&mut self) -> io::Result<()>;

    /// Release the OS handle. Called exactly once per opened link.
    async fn close(&mut self) -> io::Result<()>;
}
