//! Core data types for inodeploy
//!
//! This module contains the data model shared by every pipeline stage.
//!
//! # Main Types
//!
//! - [`PortDescriptor`] - One enumerated serial interface (recreated on every listing)
//! - [`Artifact`] - The sketch (or compiled image) awaiting deployment
//! - [`BoardProfile`] - Fully-qualified board name used to parametrize compilation
//! - [`BuildResult`] - Image produced by a successful build
//! - [`Payload`] - Bytes handed to the Transfer Engine, with their origin
//! - [`TransferReport`] - Outcome of a completed transfer

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Placeholder shown for descriptor fields the OS did not report
pub const UNKNOWN: &str = "unknown";

// ==================== Ports ====================

/// One serial interface as reported by the OS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescriptor {
    /// Device path (`/dev/ttyACM0`, `COM3`)
    pub path: String,
    /// USB manufacturer string, if any
    pub manufacturer: Option<String>,
    /// USB product string, if any
    pub product: Option<String>,
    /// USB vendor ID
    pub vendor_id: Option<u16>,
    /// USB product ID
    pub product_id: Option<u16>,
    /// USB serial number
    pub serial_number: Option<String>,
}

impl PortDescriptor {
    /// Create a descriptor with only a path
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            manufacturer: None,
            product: None,
            vendor_id: None,
            product_id: None,
            serial_number: None,
        }
    }

    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    pub fn with_usb_ids(mut self, vendor_id: u16, product_id: u16) -> Self {
        self.vendor_id = Some(vendor_id);
        self.product_id = Some(product_id);
        self
    }

    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    /// Manufacturer, or [`UNKNOWN`]
    pub fn manufacturer_or_unknown(&self) -> &str {
        self.manufacturer.as_deref().unwrap_or(UNKNOWN)
    }

    /// Serial number, or [`UNKNOWN`]
    pub fn serial_number_or_unknown(&self) -> &str {
        self.serial_number.as_deref().unwrap_or(UNKNOWN)
    }

    /// Vendor ID as hex, or [`UNKNOWN`]
    pub fn vendor_id_or_unknown(&self) -> String {
        self.vendor_id
            .map(|v| format!("{:04x}", v))
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// Product ID as hex, or [`UNKNOWN`]
    pub fn product_id_or_unknown(&self) -> String {
        self.product_id
            .map(|p| format!("{:04x}", p))
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// Whether manufacturer or product mention an Arduino
    pub fn looks_like_arduino(&self) -> bool {
        [&self.manufacturer, &self.product]
            .into_iter()
            .flatten()
            .any(|s| s.to_ascii_lowercase().contains("arduino"))
    }

    /// Get a display-friendly name for this port
    pub fn display_name(&self) -> String {
        match (self.vendor_id, self.product_id) {
            (Some(vid), Some(pid)) => format!(
                "{} - {} ({:04x}:{:04x})",
                self.path,
                self.manufacturer_or_unknown(),
                vid,
                pid
            ),
            _ => format!("{} - {}", self.path, self.manufacturer_or_unknown()),
        }
    }
}

impl std::fmt::Display for PortDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ==================== Artifacts ====================

/// What an artifact contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// Sketch source text
    Source,
    /// Compiled binary image
    Image,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Source => write!(f, "source"),
            ArtifactKind::Image => write!(f, "image"),
        }
    }
}

/// A file awaiting deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Absolute path in the working directory
    pub path: PathBuf,
    /// Logical (file) name
    pub name: String,
    pub kind: ArtifactKind,
    /// When intake relocated it, if it arrived through intake
    pub received_at: Option<DateTime<Local>>,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, kind: ArtifactKind) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            kind,
            received_at: None,
        }
    }

    /// Mark the artifact as just received
    pub fn received_now(mut self) -> Self {
        self.received_at = Some(Local::now());
        self
    }
}

// ==================== Build ====================

/// Fully-qualified board name (`arduino:avr:uno`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoardProfile {
    pub fqbn: String,
    /// False when the profile is the configured fallback
    pub detected: bool,
}

impl BoardProfile {
    pub fn detected(fqbn: impl Into<String>) -> Self {
        Self {
            fqbn: fqbn.into(),
            detected: true,
        }
    }

    pub fn fallback(fqbn: impl Into<String>) -> Self {
        Self {
            fqbn: fqbn.into(),
            detected: false,
        }
    }
}

impl std::fmt::Display for BoardProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.detected {
            write!(f, "{}", self.fqbn)
        } else {
            write!(f, "{} (default)", self.fqbn)
        }
    }
}

/// Output of a successful build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    /// The produced image
    pub image: Artifact,
    /// Board the image was compiled for
    pub board: BoardProfile,
    pub built_at: DateTime<Local>,
}

// ==================== Transfer ====================

/// Bytes to send, with the artifact they came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub kind: ArtifactKind,
    pub source: PathBuf,
}

impl Payload {
    pub fn new(bytes: impl Into<Vec<u8>>, kind: ArtifactKind, source: impl Into<PathBuf>) -> Self {
        Self {
            bytes: bytes.into(),
            kind,
            source: source.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Summary of a completed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub port: String,
    pub bytes_written: usize,
    pub kind: ArtifactKind,
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_sentinels() {
        let port = PortDescriptor::new("/dev/ttyUSB0");
        assert_eq!(port.manufacturer_or_unknown(), UNKNOWN);
        assert_eq!(port.serial_number_or_unknown(), UNKNOWN);
        assert_eq!(port.vendor_id_or_unknown(), UNKNOWN);
        assert_eq!(port.product_id_or_unknown(), UNKNOWN);
    }

    #[test]
    fn test_display_name_with_usb_ids() {
        let port = PortDescriptor::new("/dev/ttyACM0")
            .with_manufacturer("Arduino LLC")
            .with_usb_ids(0x2341, 0x0043);
        assert_eq!(port.display_name(), "/dev/ttyACM0 - Arduino LLC (2341:0043)");
    }

    #[test]
    fn test_looks_like_arduino() {
        assert!(PortDescriptor::new("COM3")
            .with_manufacturer("Arduino (www.arduino.cc)")
            .looks_like_arduino());
        assert!(PortDescriptor::new("COM4")
            .with_manufacturer("FTDI")
            .with_product("Arduino Nano")
            .looks_like_arduino());
        assert!(!PortDescriptor::new("COM5")
            .with_manufacturer("FTDI")
            .looks_like_arduino());
    }

    #[test]
    fn test_artifact_name_from_path() {
        let artifact = Artifact::new("/work/sketch/sketch.ino", ArtifactKind::Source);
        assert_eq!(artifact.name, "sketch.ino");
        assert!(artifact.received_at.is_none());
        assert!(artifact.received_now().received_at.is_some());
    }

    #[test]
    fn test_board_profile_display() {
        assert_eq!(BoardProfile::detected("arduino:avr:mega").to_string(), "arduino:avr:mega");
        assert_eq!(
            BoardProfile::fallback("arduino:avr:uno").to_string(),
            "arduino:avr:uno (default)"
        );
    }
}
