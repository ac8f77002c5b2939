use core::fmt;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize, Hash)]
pub enum StopBits {
    One,
    Two,
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize, Hash)]
pub enum Parity {
    None,
    Odd,
    Even,
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize, Hash)]
pub enum DataBits {
    Seven,
    Eight,
}

pub fn parse_serial_settings(settings: &str) -> Result<(DataBits, Parity, StopBits)> {
    let settings = settings.to_lowercase();
    let chars = settings.as_bytes();
    if chars.len() != 3 {
        return Err(Error::InvalidAddress);
    }
    let data_bits = match chars[0] as char {
        '8' => DataBits::Eight,
        '7' => DataBits::Seven,
        _ => return Err(Error::InvalidAddress),
    };
    let parity = match chars[1] as char {
        'n' => Parity::None,
        'o' => Parity::Odd,
        'e' => Parity::Even,
        _ => return Err(Error::InvalidAddress),
    };
    let stop_bits = match chars[2] as char {
        '1' => StopBits::One,
        '2' => StopBits::Two,
        _ => return Err(Error::InvalidAddress),
    };
    Ok((data_bits, parity, stop_bits))
}

/// Serial line settings for the instrument.
///
/// The factory configuration of the Sapphire 9200 family matches the
/// default here: 9600 baud, 8 data bits, no parity, one stop bit.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Hash)]
pub struct SerialParams {
    pub baud: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
}

impl Default for SerialParams {
    fn default() -> Self {
        SerialParams {
            baud: 9600,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
        }
    }
}

impl SerialParams {
    /// Splits an address string of the form `<path>`, `<path>::<baud>` or
    /// `<path>::<baud>::<settings>`, e.g. `/dev/ttyUSB0::19200::8N1`.
    pub fn from_address(addr: &str) -> Result<(String, SerialParams)> {
        let splits: Vec<&str> = addr.split("::").collect();
        match splits.len() {
            1 => Ok((splits[0].to_owned(), SerialParams::default())),
            2 => {
                let baud = splits[1].parse().map_err(|_| Error::InvalidAddress)?;
                Ok((
                    splits[0].to_owned(),
                    SerialParams {
                        baud,
                        ..SerialParams::default()
                    },
                ))
            }
            3 => {
                let baud = splits[1].parse().map_err(|_| Error::InvalidAddress)?;
                let (data_bits, parity, stop_bits) = parse_serial_settings(splits[2])?;
                Ok((
                    splits[0].to_owned(),
                    SerialParams {
                        baud,
                        data_bits,
                        stop_bits,
                        parity,
                    },
                ))
            }
            _ => Err(Error::InvalidAddress),
        }
    }
}

impl Display for SerialParams {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let x = format!(
            "{}::{}{}{}",
            self.baud, self.data_bits, self.parity, self.stop_bits
        );
        f.write_str(&x)
    }
}

impl From<DataBits> for serialport::DataBits {
    fn from(x: DataBits) -> Self {
        match x {
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

impl From<Parity> for serialport::Parity {
    fn from(x: Parity) -> Self {
        match x {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(x: StopBits) -> Self {
        match x {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

impl Display for DataBits {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let x = match self {
            DataBits::Seven => "7",
            DataBits::Eight => "8",
        };
        f.write_str(x)
    }
}

impl Display for Parity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let x = match self {
            Parity::None => "N",
            Parity::Odd => "O",
            Parity::Even => "E",
        };
        f.write_str(x)
    }
}

impl Display for StopBits {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let x = match self {
            StopBits::One => "1",
            StopBits::Two => "2",
        };
        f.write_str(x)
    }
}
