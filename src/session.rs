//! The device session: transport ownership, wire framing and error decoding.

use std::time::Duration;

use crate::history::CommandHistory;
use crate::scpi::CommandPath;
use crate::transport::{SerialParams, SerialTransport, Transport};
use crate::{Error, ProtocolError, Result};

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        const LINE_TERMINATOR: &str = "\r\n";
    } else {
        const LINE_TERMINATOR: &str = "\n";
    }
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Queries answered with every line the device has buffered instead of a
/// single one.
const LIST_COMMAND_QUERIES: [&str; 4] = [
    ":INST:COMM?",
    ":INSTRUMENT:COMM?",
    ":INST:COMMANDS?",
    ":INSTRUMENT:COMMANDS?",
];

fn is_list_commands_query(command: &str) -> bool {
    let command = command.trim();
    LIST_COMMAND_QUERIES
        .iter()
        .any(|alias| command.eq_ignore_ascii_case(alias))
}

/// A decoded, error-checked reply from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Line(String),
    Lines(Vec<String>),
}

impl Response {
    /// The reply as a single line, if it was one.
    pub fn as_line(&self) -> Option<&str> {
        match self {
            Response::Line(line) => Some(line),
            Response::Lines(_) => None,
        }
    }

    /// The reply as an ordered sequence of lines.
    pub fn into_lines(self) -> Vec<String> {
        match self {
            Response::Line(line) => vec![line],
            Response::Lines(lines) => lines,
        }
    }
}

/// One open connection to one pulse generator.
///
/// The session is the sole owner of the transport handle and the only place
/// where framing and error semantics live. The protocol is strictly
/// request/response over a single line-oriented channel, so a session must
/// not be shared between overlapping callers; `&mut self` on every I/O
/// operation enforces exactly that. All calls block, bounded by the
/// configured read timeout.
pub struct Pulser {
    address: String,
    params: SerialParams,
    timeout: Duration,
    arg_separator: String,
    transport: Option<Box<dyn Transport>>,
    last_sent: Option<String>,
    history: CommandHistory,
}

impl Pulser {
    /// A closed session bound to `address` (e.g. `/dev/ttyUSB0` or `COM3`)
    /// with default line settings. Call [`open`](Pulser::open) to connect.
    pub fn new<S: Into<String>>(address: S) -> Self {
        Self {
            address: address.into(),
            params: SerialParams::default(),
            timeout: DEFAULT_TIMEOUT,
            arg_separator: ":".to_owned(),
            transport: None,
            last_sent: None,
            history: CommandHistory::new(),
        }
    }

    /// A closed session from an address string of the form
    /// `<path>::<baud>::<settings>`, e.g. `COM3::19200::8N1`.
    pub fn from_address(address: &str) -> Result<Self> {
        let (path, params) = SerialParams::from_address(address)?;
        Ok(Self::new(path).with_params(params))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_params(mut self, params: SerialParams) -> Self {
        self.params = params;
        self
    }

    /// Changes the argument separator used by command paths minted from this
    /// session and between set-command values. Defaults to `:`.
    pub fn with_arg_separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.arg_separator = separator.into();
        self
    }

    /// Acquires the serial handle. Fails with [`Error::AlreadyOpen`] if the
    /// session is already open; the existing handle is left untouched.
    pub fn open(&mut self) -> Result<()> {
        if self.transport.is_some() {
            return Err(Error::AlreadyOpen);
        }
        log::debug!("opening {}", self.address);
        let transport = SerialTransport::open(&self.address, &self.params, self.timeout)?;
        self.transport = Some(Box::new(transport));
        Ok(())
    }

    /// Like [`open`](Pulser::open), but with a caller-supplied transport.
    pub fn open_with(&mut self, transport: Box<dyn Transport>) -> Result<()> {
        if self.transport.is_some() {
            return Err(Error::AlreadyOpen);
        }
        self.transport = Some(transport);
        Ok(())
    }

    /// Releases the serial handle. A closed session stays usable: it can be
    /// re-opened later. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.transport.take().is_some() {
            log::debug!("closing {}", self.address);
        }
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// The last command that was successfully written to the device.
    pub fn last_sent(&self) -> Option<&str> {
        self.last_sent.as_deref()
    }

    /// Read-only access to the open transport handle, for advanced callers.
    pub fn transport(&self) -> Option<&dyn Transport> {
        self.transport.as_deref()
    }

    /// A root [`CommandPath`] holding `name` as its first segment, bound to
    /// this session's argument separator.
    pub fn node<S: AsRef<str>>(&self, name: S) -> CommandPath {
        CommandPath::root(self.arg_separator.as_str()).extend(name)
    }

    /// The most recently sent commands, most recent first.
    pub fn command_history(&self) -> impl Iterator<Item = &str> {
        self.history.iter_recent()
    }

    /// Writes `command` to the device, appending the platform line
    /// terminator if it is missing.
    ///
    /// `last_sent` and the command history are only updated once the
    /// transport write has succeeded, so a failed write never gets blamed by
    /// a later protocol error.
    pub fn write(&mut self, command: &str) -> Result<()> {
        let transport = self.transport.as_mut().ok_or(Error::NotOpen)?;
        let mut data = command.to_owned();
        if !data.ends_with(LINE_TERMINATOR) {
            data.push_str(LINE_TERMINATOR);
        }
        log::debug!("write: {:?}", data);
        transport.write_all(data.as_bytes())?;
        let sent = data.trim().to_owned();
        self.last_sent = Some(sent.clone());
        self.history.push(sent);
        Ok(())
    }

    /// Reads one line from the device, decoded and error-checked.
    pub fn read_line(&mut self) -> Result<String> {
        let transport = self.transport.as_mut().ok_or(Error::NotOpen)?;
        let raw = transport.read_line()?;
        self.decode(raw)
    }

    /// Reads every line the device has already delivered, decoding and
    /// error-checking each, in device order.
    pub fn read_lines(&mut self) -> Result<Vec<String>> {
        let transport = self.transport.as_mut().ok_or(Error::NotOpen)?;
        let raw_lines = transport.read_all_buffered()?;
        let mut lines = Vec::with_capacity(raw_lines.len());
        for raw in raw_lines {
            lines.push(self.decode(raw)?);
        }
        Ok(lines)
    }

    /// Writes `command` and reads the reply.
    ///
    /// The "list available commands" query family (`:INST:COMM?` and its
    /// aliases, matched case-insensitively) answers with multiple lines and
    /// is read via [`read_lines`](Pulser::read_lines); every other query is
    /// answered with exactly one line.
    pub fn query(&mut self, command: &str) -> Result<Response> {
        self.write(command)?;
        if is_list_commands_query(command) {
            Ok(Response::Lines(self.read_lines()?))
        } else {
            Ok(Response::Line(self.read_line()?))
        }
    }

    /// Writes a set command and reads its single response line. Set commands
    /// on this protocol still answer with a line that may be an error reply.
    pub fn command(&mut self, command: &str) -> Result<String> {
        self.write(command)?;
        self.read_line()
    }

    /// Decodes a raw line and checks it for an error reply. On any failure
    /// the remaining buffered lines are drained first so the next command
    /// starts from a clean read buffer; the original failure is what the
    /// caller receives.
    fn decode(&mut self, raw: Vec<u8>) -> Result<String> {
        match String::from_utf8(raw) {
            Ok(line) => self.check_error(line.trim().to_owned()),
            Err(err) => {
                self.drain();
                Err(err.into())
            }
        }
    }

    fn check_error(&mut self, line: String) -> Result<String> {
        if let Some(kind) = ProtocolError::from_reply(&line) {
            let err = Error::Protocol {
                kind,
                last_sent: self.last_sent.clone(),
            };
            self.drain();
            return Err(err);
        }
        Ok(line)
    }

    /// Reads and discards whatever the device still has buffered. Residual
    /// lines go through the same error decoding, but only as log output: a
    /// failure here must not mask the error that triggered the drain.
    fn drain(&mut self) {
        let transport = match self.transport.as_mut() {
            Some(transport) => transport,
            None => return,
        };
        let residual = match transport.read_all_buffered() {
            Ok(residual) => residual,
            Err(err) => {
                log::debug!("drain failed: {}", err);
                return;
            }
        };
        for raw in residual {
            match String::from_utf8(raw) {
                Ok(line) => match ProtocolError::from_reply(line.trim()) {
                    Some(kind) => log::debug!("drained error reply: {}", kind),
                    None => log::debug!("drained residual line: {:?}", line.trim()),
                },
                Err(_) => log::debug!("drained undecodable residual line"),
            }
        }
    }
}

impl Drop for Pulser {
    fn drop(&mut self) {
        self.close();
    }
}
