use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{SerialPort, SerialPortInfo, SerialPortType};

use crate::error::Result;

/// Read and write timeout on the serial line.
pub const RW_TIMEOUT: Duration = Duration::from_secs(2);

pub const BAUD_RATE: u32 = 115_200;

// ---------------------------------------------------------------------------
// Transport contract
// ---------------------------------------------------------------------------

/// Byte pipe to the device.  Both directions are bounded by a timeout set
/// when the transport is opened.
pub trait Transport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Read up to `max_bytes`.  Returns fewer bytes when the timeout expires.
    fn read(&mut self, max_bytes: usize) -> io::Result<Vec<u8>>;
}

impl Transport for Box<dyn SerialPort> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let port: &mut dyn SerialPort = self.as_mut();
        port.write_all(bytes)?;
        port.flush()
    }

    fn read(&mut self, max_bytes: usize) -> io::Result<Vec<u8>> {
        let port: &mut dyn SerialPort = self.as_mut();
        let mut buf = vec![0u8; max_bytes];
        let mut filled = 0;
        while filled < max_bytes {
            match port.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }
}

// ---------------------------------------------------------------------------
// Serial ports
// ---------------------------------------------------------------------------

/// Open `port_name` at the device's baud rate with the read/write timeout.
pub fn open_serial(port_name: &str) -> Result<Box<dyn SerialPort>> {
    let port = serialport::new(port_name, BAUD_RATE)
        .timeout(RW_TIMEOUT)
        .open()?;
    log::debug!("opened {port_name} at {BAUD_RATE} baud");
    Ok(port)
}

pub fn available_ports() -> Result<Vec<SerialPortInfo>> {
    Ok(serialport::available_ports()?)
}

/// Multi-line description of a port for `--list-ports`.
pub fn describe_port(port: &SerialPortInfo) -> String {
    let mut out = format!("   Serial device: {}\n", port.port_name);
    match &port.port_type {
        SerialPortType::UsbPort(usb) => {
            out.push_str("      USB specific:\n");
            out.push_str(&format!("      VID           : 0x{:04X}\n", usb.vid));
            out.push_str(&format!("      PID           : 0x{:04X}\n", usb.pid));
            let fields = [
                ("Serial Number", &usb.serial_number),
                ("Manufacturer", &usb.manufacturer),
                ("Product", &usb.product),
            ];
            for (label, value) in fields {
                out.push_str(&format!(
                    "      {label:<14}: {}\n",
                    value.as_deref().unwrap_or("<unknown>")
                ));
            }
        }
        SerialPortType::PciPort => out.push_str("      Type          : PCI\n"),
        SerialPortType::BluetoothPort => out.push_str("      Type          : Bluetooth\n"),
        SerialPortType::Unknown => out.push_str("      Type          : unknown\n"),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    #[test]
    fn usb_ports_show_ids() {
        let info = SerialPortInfo {
            port_name: "/dev/ttyACM0".into(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid: 0x0483,
                pid: 0x5740,
                serial_number: Some("AWG1".into()),
                manufacturer: None,
                product: Some("AD9106".into()),
            }),
        };
        let text = describe_port(&info);
        assert!(text.contains("/dev/ttyACM0"));
        assert!(text.contains("VID           : 0x0483"));
        assert!(text.contains("PID           : 0x5740"));
        assert!(text.contains("Serial Number : AWG1"));
        assert!(text.contains("Manufacturer  : <unknown>"));
    }
}
