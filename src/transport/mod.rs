//! The byte-level transport under the session.
//!
//! [`Transport`] is the seam between protocol handling and serial I/O:
//! the session only ever writes whole commands and reads whole lines.
//! [`SerialTransport`] is the production implementation on top of a local
//! serial port; tests and advanced callers may substitute their own via
//! [`Pulser::open_with`](crate::Pulser::open_with).

pub mod params;

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::SerialPort;

pub use params::SerialParams;

use crate::{Error, Result};

/// Line-oriented byte transport to the instrument.
pub trait Transport: Send {
    /// Writes all of `data` to the device.
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Blocks until one line arrives (up to the configured timeout) and
    /// returns it with the terminator stripped.
    fn read_line(&mut self) -> Result<Vec<u8>>;

    /// Returns every line the device has already delivered, without
    /// blocking. A trailing chunk with no terminator yet counts as a line.
    fn read_all_buffered(&mut self) -> Result<Vec<Vec<u8>>>;
}

/// [`Transport`] over a local serial port.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn open(path: &str, params: &SerialParams, timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, params.baud)
            .data_bits(params.data_bits.into())
            .parity(params.parity.into())
            .stop_bits(params.stop_bits.into())
            .timeout(timeout)
            .open()?;
        Ok(SerialTransport { port })
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::with_capacity(32);
        loop {
            let mut byte = [0u8; 1];
            match self.port.read_exact(&mut byte) {
                Ok(()) => {
                    if byte[0] == b'\n' {
                        return Ok(line);
                    }
                    line.push(byte[0]);
                }
                Err(err) if err.kind() == io::ErrorKind::TimedOut => {
                    log::debug!("instrument read timeout");
                    return Err(Error::Timeout);
                }
                Err(err) => return Err(Error::Io(err)),
            }
        }
    }

    fn read_all_buffered(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut pending = Vec::new();
        loop {
            let available = self.port.bytes_to_read()? as usize;
            if available == 0 {
                break;
            }
            let mut chunk = vec![0u8; available];
            self.port.read_exact(&mut chunk)?;
            pending.extend_from_slice(&chunk);
        }
        let lines = pending
            .split(|byte| *byte == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| line.to_vec())
            .collect();
        Ok(lines)
    }
}
