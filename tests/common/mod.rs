//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod fakes;

use std::time::Duration;

/// Upper bound for waiting on background tasks
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Port descriptor for a genuine Uno on Linux
pub fn arduino_port(path: &str) -> inodeploy::PortDescriptor {
    inodeploy::PortDescriptor::new(path)
        .with_manufacturer("Arduino LLC")
        .with_usb_ids(0x2341, 0x0043)
}
