//! Serial links backed by the `serialport` crate
//!
//! `serialport` is blocking, so every operation runs on tokio's blocking
//! pool. The port handle is moved into the blocking task and handed back
//! with the result.
//!
//! `flush()` on a `serialport` handle waits for the output queue to empty
//! (`tcdrain` on POSIX, `FlushFileBuffers` on Windows), which is what the
//! drain step needs.

use super::link::{SerialLink, SerialTransport};
use async_trait::async_trait;
use serialport::{FlowControl, SerialPort};
use std::io::{self, Write};
use std::time::Duration;

/// Per-call timeout for blocking serial writes
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens real serial ports
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSerialTransport;

#[async_trait]
impl SerialTransport for SystemSerialTransport {
    async fn open(&self, path: &str, baud_rate: u32) -> io::Result<Box<dyn SerialLink>> {
        let port_name = platform_port_name(path);

        let port = tokio::task::spawn_blocking(move || {
            serialport::new(port_name, baud_rate)
                .timeout(WRITE_TIMEOUT)
                .flow_control(FlowControl::None)
                .open()
        })
        .await
        .map_err(io::Error::other)?
        .map_err(io::Error::from)?;

        tracing::debug!("Opened {} at {} baud", path, baud_rate);
        Ok(Box::new(SystemSerialLink { port: Some(port) }))
    }
}

/// On Windows, COM ports >= 10 need the \\.\COMxx form
fn platform_port_name(path: &str) -> String {
    if cfg!(windows) && path.starts_with("COM") && !path.starts_with(r"\\") {
        format!(r"\\.\{}", path)
    } else {
        path.to_string()
    }
}

/// An open `serialport` handle
pub struct SystemSerialLink {
    port: Option<Box<dyn SerialPort>>,
}

impl SystemSerialLink {
    /// Run a blocking operation against the port, then put the port back
    async fn with_port<F>(&mut self, op: F) -> io::Result<()>
    where
        F: FnOnce(&mut Box<dyn SerialPort>) -> io::Result<()> + Send + 'static,
    {
        let mut port = self
            .port
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "port already closed"))?;

        let (port, result) = tokio::task::spawn_blocking(move || {
            let result = op(&mut port);
            (port, result)
        })
        .await
        .map_err(io::Error::other)?;

        self.port = Some(port);
        result
    }
}

#[async_trait]
impl SerialLink for SystemSerialLink {
    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let bytes = bytes.to_vec();
        self.with_port(move |port| port.write_all(&bytes)).await
    }

    async fn drain(&mut self) -> io::Result<()> {
        self.with_port(|port| port.flush()).await
    }

    async fn close(&mut self) -> io::Result<()> {
        if let Some(port) = self.port.take() {
            tokio::task::spawn_blocking(move || drop(port))
                .await
                .map_err(io::Error::other)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_name_passthrough() {
        assert_eq!(platform_port_name("/dev/ttyACM0"), "/dev/ttyACM0");
        if cfg!(windows) {
            assert_eq!(platform_port_name("COM12"), r"\\.\COM12");
        } else {
            assert_eq!(platform_port_name("COM12"), "COM12");
        }
    }

    #[tokio::test]
    async fn test_open_missing_port_fails() {
        let result = SystemSerialTransport
            .open("/dev/inodeploy-no-such-port", 9600)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_closed_link_rejects_writes() {
        let mut link = SystemSerialLink { port: None };
        let err = link.write_all(b"x").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert!(link.close().await.is_ok());
    }
}
