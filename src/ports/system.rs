//! OS-backed port enumeration via the `serialport` crate

use super::PortEnumerator;
use crate::error::{DeployError, Result};
use crate::types::PortDescriptor;
use async_trait::async_trait;
use serialport::{SerialPortInfo, SerialPortType};

/// Lists ports through the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPortEnumerator;

#[async_trait]
impl PortEnumerator for SystemPortEnumerator {
    async fn enumerate(&self) -> Result<Vec<PortDescriptor>> {
        // USB enumeration can block for a while on some hosts
        let ports = tokio::task::spawn_blocking(serialport::available_ports)
            .await
            .map_err(|e| DeployError::Io(std::io::Error::other(e)))?
            .map_err(|e| DeployError::Io(e.into()))?;

        Ok(ports.into_iter().map(descriptor_from_info).collect())
    }
}

fn descriptor_from_info(info: SerialPortInfo) -> PortDescriptor {
    let mut port = PortDescriptor::new(info.port_name);
    if let SerialPortType::UsbPort(usb) = info.port_type {
        port.vendor_id = Some(usb.vid);
        port.product_id = Some(usb.pid);
        port.serial_number = usb.serial_number;
        port.manufacturer = usb.manufacturer;
        port.product = usb.product;
    }
    port
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    #[test]
    fn test_usb_port_fields_are_copied() {
        let info = SerialPortInfo {
            port_name: "/dev/ttyACM0".to_string(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid: 0x2341,
                pid: 0x0043,
                serial_number: Some("7573530303035171E0A1".to_string()),
                manufacturer: Some("Arduino (www.arduino.cc)".to_string()),
                product: Some("Arduino Uno".to_string()),
            }),
        };

        let port = descriptor_from_info(info);
        assert_eq!(port.path, "/dev/ttyACM0");
        assert_eq!(port.vendor_id, Some(0x2341));
        assert_eq!(port.product_id, Some(0x0043));
        assert_eq!(port.manufacturer.as_deref(), Some("Arduino (www.arduino.cc)"));
        assert!(port.looks_like_arduino());
    }

    #[test]
    fn test_non_usb_port_has_no_manufacturer() {
        let info = SerialPortInfo {
            port_name: "/dev/ttyS0".to_string(),
            port_type: SerialPortType::Unknown,
        };

        let port = descriptor_from_info(info);
        assert_eq!(port.path, "/dev/ttyS0");
        assert!(port.manufacturer.is_none());
        assert!(port.vendor_id.is_none());
    }
}
