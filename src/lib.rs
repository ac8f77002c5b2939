//! Remote control of Quantum Composers Sapphire 9200 series TTL pulse
//! generators over a serial line.
//!
//! The device speaks a line-oriented SCPI dialect: commands are colon
//! delimited paths such as `:PULSE1:WIDTH 2.5e-5`, queries carry a trailing
//! `?`, and every command is answered with a single response line which may
//! be an error reply (`?1` .. `?8`). This crate owns the framing, the error
//! decoding and the session lifecycle; the command namespace itself is open
//! ended and addressed through [`CommandPath`] chains instead of a static
//! command table.
//!
//! ```no_run
//! use sapphire_pulser::Pulser;
//!
//! fn main() -> sapphire_pulser::Result<()> {
//!     let mut pulser = Pulser::new("/dev/ttyUSB0");
//!     pulser.open()?;
//!
//!     // ":PULSE1:WIDTH 2.5e-5"
//!     let width = pulser.node("pulse1").extend("width");
//!     width.set(&mut pulser, &[2.5e-5])?;
//!
//!     // ":PULSE1:WIDTH?"
//!     let reply = width.query(&mut pulser)?;
//!     println!("width = {:?}", reply);
//!     Ok(())
//! }
//! ```

use std::io;
use std::string::FromUtf8Error;

use thiserror::Error;

pub mod history;
pub mod inventory;
pub mod scpi;
pub mod session;
pub mod transport;

pub use crate::history::CommandHistory;
pub use crate::inventory::{discover_devices, PortInfo};
pub use crate::scpi::CommandPath;
pub use crate::session::{Pulser, Response};
pub use crate::transport::params::{DataBits, Parity, SerialParams, StopBits};
pub use crate::transport::{SerialTransport, Transport};

/// Error reply kinds reported by the device itself.
///
/// Any response line starting with `?` is an error; the second character
/// selects the kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("incorrect prefix, i.e. no colon or * to start command")]
    IncorrectPrefix,
    #[error("missing command keyword")]
    MissingKeyword,
    #[error("invalid command keyword")]
    InvalidKeyword,
    #[error("missing parameter")]
    MissingParameter,
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("query only, command needs a question mark")]
    QueryOnly,
    #[error("invalid query, command does not have a query form")]
    NoQueryForm,
    #[error("command unavailable in current system state")]
    Unavailable,
    #[error("unknown error indicator {0:?}")]
    UnknownIndicator(String),
}

impl ProtocolError {
    /// Decodes an error reply, or `None` if the line is not an error.
    pub fn from_reply(line: &str) -> Option<ProtocolError> {
        let mut chars = line.chars();
        if chars.next() != Some('?') {
            return None;
        }
        let kind = match chars.next() {
            Some('1') => ProtocolError::IncorrectPrefix,
            Some('2') => ProtocolError::MissingKeyword,
            Some('3') => ProtocolError::InvalidKeyword,
            Some('4') => ProtocolError::MissingParameter,
            Some('5') => ProtocolError::InvalidParameter,
            Some('6') => ProtocolError::QueryOnly,
            Some('7') => ProtocolError::NoQueryForm,
            Some('8') => ProtocolError::Unavailable,
            _ => ProtocolError::UnknownIndicator(line.to_owned()),
        };
        Some(kind)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("device has already been opened")]
    AlreadyOpen,
    #[error("device has not been opened")]
    NotOpen,
    #[error("IO error occurred: {0}")]
    Io(#[from] io::Error),
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("timeout while waiting for a reply")]
    Timeout,
    #[error("reply is not valid UTF-8: {0}")]
    Decode(#[from] FromUtf8Error),
    #[error("invalid address")]
    InvalidAddress,
    #[error("device reported an error: {kind}; last write command == {last_sent:?}")]
    Protocol {
        kind: ProtocolError,
        last_sent: Option<String>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
