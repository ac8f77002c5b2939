//! Enumeration of serial devices visible on this machine.

use serde::{Deserialize, Serialize};
use serialport::SerialPortType;

use crate::Result;

/// One locally visible serial device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortInfo {
    /// The port path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub address: String,
    pub description: String,
    pub hardware_id: String,
}

/// Lists locally visible serial devices, ordered by address.
///
/// Find the pulse generator in the returned rows and hand its `address` to
/// [`Pulser::new`](crate::Pulser::new). This helper never touches session
/// state.
pub fn discover_devices() -> Result<Vec<PortInfo>> {
    let mut ports = serialport::available_ports()?;
    ports.sort_by(|a, b| a.port_name.cmp(&b.port_name));
    let devices = ports
        .into_iter()
        .map(|port| {
            let (description, hardware_id) = match port.port_type {
                SerialPortType::UsbPort(usb) => (
                    usb.product
                        .or(usb.manufacturer)
                        .unwrap_or_else(|| "USB serial device".to_owned()),
                    usb_hardware_id(usb.vid, usb.pid, usb.serial_number.as_deref()),
                ),
                SerialPortType::PciPort => ("PCI serial device".to_owned(), "PCI".to_owned()),
                SerialPortType::BluetoothPort => {
                    ("Bluetooth serial device".to_owned(), "BLUETOOTH".to_owned())
                }
                SerialPortType::Unknown => ("n/a".to_owned(), "n/a".to_owned()),
            };
            PortInfo {
                address: port.port_name,
                description,
                hardware_id,
            }
        })
        .collect();
    Ok(devices)
}

fn usb_hardware_id(vid: u16, pid: u16, serial_number: Option<&str>) -> String {
    match serial_number {
        Some(serial) => format!("USB VID:PID={:04X}:{:04X} SER={}", vid, pid, serial),
        None => format!("USB VID:PID={:04X}:{:04X}", vid, pid),
    }
}
