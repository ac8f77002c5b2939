//! Session behavior against a scripted transport.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use sapphire_pulser::{Error, ProtocolError, Pulser, Response, Transport};

#[derive(Default)]
struct MockState {
    written: Vec<String>,
    pending: VecDeque<String>,
    fail_writes: bool,
}

/// A transport fed from a scripted list of reply lines. Clones share state
/// so tests keep a handle after the session takes ownership of the box.
#[derive(Clone, Default)]
struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    fn new() -> Self {
        Self::default()
    }

    fn push_line(&self, line: &str) {
        self.state
            .lock()
            .unwrap()
            .pending
            .push_back(line.to_owned());
    }

    fn written(&self) -> Vec<String> {
        self.state.lock().unwrap().written.clone()
    }

    fn pending_len(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    fn fail_writes(&self) {
        self.state.lock().unwrap().fail_writes = true;
    }
}

impl Transport for MockTransport {
    fn write_all(&mut self, data: &[u8]) -> sapphire_pulser::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "scripted write failure",
            )));
        }
        state.written.push(String::from_utf8(data.to_vec()).unwrap());
        Ok(())
    }

    fn read_line(&mut self) -> sapphire_pulser::Result<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        match state.pending.pop_front() {
            Some(line) => Ok(line.into_bytes()),
            None => Err(Error::Timeout),
        }
    }

    fn read_all_buffered(&mut self) -> sapphire_pulser::Result<Vec<Vec<u8>>> {
        let mut state = self.state.lock().unwrap();
        Ok(state.pending.drain(..).map(String::into_bytes).collect())
    }
}

fn line_terminator() -> &'static str {
    if cfg!(windows) {
        "\r\n"
    } else {
        "\n"
    }
}

fn open_session() -> (Pulser, MockTransport) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mock = MockTransport::new();
    let mut pulser = Pulser::new("mock0");
    pulser.open_with(Box::new(mock.clone())).unwrap();
    (pulser, mock)
}

#[test]
fn query_round_trip() {
    let (mut pulser, mock) = open_session();
    mock.push_line("  0.000025\r");
    let reply = pulser.query(":PULSE1:WIDTH?").unwrap();
    assert_eq!(reply, Response::Line("0.000025".to_owned()));
    assert_eq!(reply.clone().into_lines(), vec!["0.000025".to_owned()]);
    assert_eq!(
        mock.written(),
        vec![format!(":PULSE1:WIDTH?{}", line_terminator())]
    );
    assert_eq!(pulser.last_sent(), Some(":PULSE1:WIDTH?"));
    let history: Vec<&str> = pulser.command_history().collect();
    assert_eq!(history, vec![":PULSE1:WIDTH?"]);
}

#[test]
fn write_appends_the_terminator_exactly_once() {
    let (mut pulser, mock) = open_session();
    pulser.write(":PULSE1:STATE 1").unwrap();
    pulser
        .write(&format!(":PULSE2:STATE 0{}", line_terminator()))
        .unwrap();
    assert_eq!(
        mock.written(),
        vec![
            format!(":PULSE1:STATE 1{}", line_terminator()),
            format!(":PULSE2:STATE 0{}", line_terminator()),
        ]
    );
}

#[test]
fn paths_resolve_to_uppercased_queries() {
    let (mut pulser, mock) = open_session();
    mock.push_line("normal");
    let mode = pulser.node("pulse3").extend("width").extend("cmode");
    let reply = mode.query(&mut pulser).unwrap();
    assert_eq!(reply.as_line(), Some("normal"));
    assert_eq!(
        mock.written(),
        vec![format!(":PULSE3:WIDTH:CMODE?{}", line_terminator())]
    );
}

#[test]
fn path_set_joins_values_with_the_configured_separator() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mock = MockTransport::new();
    let mut pulser = Pulser::new("mock0").with_arg_separator(",");
    pulser.open_with(Box::new(mock.clone())).unwrap();

    mock.push_line("ok");
    let mux = pulser.node("pulse0").extend("mux");
    let reply = mux.set(&mut pulser, &[1, 2]).unwrap();
    assert_eq!(reply, "ok");
    assert_eq!(
        mock.written(),
        vec![format!(",PULSE0:MUX 1,2{}", line_terminator())]
    );
}

#[test]
fn set_responses_are_error_checked() {
    let (mut pulser, mock) = open_session();
    mock.push_line("?6");
    let path = pulser.node("pulse1").extend("width");
    let err = path.set(&mut pulser, &["2.5e-5"]).unwrap_err();
    match err {
        Error::Protocol { kind, last_sent } => {
            assert_eq!(kind, ProtocolError::QueryOnly);
            assert_eq!(last_sent.as_deref(), Some(":PULSE1:WIDTH 2.5e-5"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn double_open_fails_and_leaves_the_handle_untouched() {
    let (mut pulser, mock) = open_session();
    let err = pulser.open_with(Box::new(MockTransport::new())).unwrap_err();
    assert!(matches!(err, Error::AlreadyOpen));
    assert!(pulser.is_open());
    assert!(pulser.transport().is_some());
    // the original transport still serves requests
    mock.push_line("still here");
    assert_eq!(pulser.read_line().unwrap(), "still here");
}

#[test]
fn close_is_idempotent_and_reopen_is_permitted() {
    let (mut pulser, _mock) = open_session();
    pulser.close();
    pulser.close();
    assert!(!pulser.is_open());
    assert!(matches!(pulser.write(":PULSE1:STATE 1"), Err(Error::NotOpen)));

    pulser.open_with(Box::new(MockTransport::new())).unwrap();
    assert!(pulser.is_open());
}

#[test]
fn sessions_parse_combined_address_strings() {
    let pulser = Pulser::from_address("COM3::19200::8N1").unwrap();
    assert_eq!(pulser.address(), "COM3");
    assert!(!pulser.is_open());
    assert!(Pulser::from_address("COM3::fast").is_err());
}

#[test]
fn io_operations_require_an_open_session() {
    let mut pulser = Pulser::new("mock0");
    assert!(matches!(pulser.write(":PULSE1:STATE 1"), Err(Error::NotOpen)));
    assert!(matches!(pulser.read_line(), Err(Error::NotOpen)));
    assert!(matches!(pulser.read_lines(), Err(Error::NotOpen)));
    assert!(matches!(pulser.query(":PULSE1:WIDTH?"), Err(Error::NotOpen)));
}

#[test]
fn history_is_bounded_to_one_thousand_commands() {
    let (mut pulser, _mock) = open_session();
    for i in 0..=1000 {
        pulser.write(&format!(":SYSTEM:MARK {}", i)).unwrap();
    }
    let history: Vec<&str> = pulser.command_history().collect();
    assert_eq!(history.len(), 1000);
    assert_eq!(history[0], ":SYSTEM:MARK 1000");
    assert_eq!(history[999], ":SYSTEM:MARK 1");
    assert!(!history.contains(&":SYSTEM:MARK 0"));
}

#[test]
fn error_replies_embed_the_last_command_and_drain_the_buffer() {
    let (mut pulser, mock) = open_session();
    mock.push_line("?5");
    mock.push_line("residual");
    mock.push_line("?3");
    let err = pulser.command(":PULSE0:WIDTH BAD").unwrap_err();
    match err {
        Error::Protocol { kind, last_sent } => {
            assert_eq!(kind, ProtocolError::InvalidParameter);
            assert_eq!(last_sent.as_deref(), Some(":PULSE0:WIDTH BAD"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    // the residual lines (including the unrelated error reply) are gone
    assert_eq!(mock.pending_len(), 0);
    // and the next query starts from a clean buffer
    mock.push_line("0.001");
    assert_eq!(
        pulser.query(":PULSE0:WIDTH?").unwrap().as_line(),
        Some("0.001")
    );
}

#[test]
fn list_commands_queries_return_every_buffered_line() {
    let aliases = [
        ":INST:COMM?",
        ":instrument:comm?",
        ":INST:Commands?",
        ":INSTRUMENT:COMMANDS?",
    ];
    for alias in &aliases {
        let (mut pulser, mock) = open_session();
        mock.push_line("*IDN");
        mock.push_line(":PULSE1:WIDTH");
        mock.push_line(":PULSE1:DELAY");
        let reply = pulser.query(alias).unwrap();
        assert_eq!(
            reply,
            Response::Lines(vec![
                "*IDN".to_owned(),
                ":PULSE1:WIDTH".to_owned(),
                ":PULSE1:DELAY".to_owned(),
            ])
        );
    }
}

#[test]
fn ordinary_queries_read_exactly_one_line() {
    let (mut pulser, mock) = open_session();
    mock.push_line("first");
    mock.push_line("second");
    let reply = pulser.query(":PULSE1:WIDTH?").unwrap();
    assert_eq!(reply.as_line(), Some("first"));
    assert_eq!(mock.pending_len(), 1);
}

#[test]
fn missing_replies_surface_as_timeouts() {
    let (mut pulser, _mock) = open_session();
    assert!(matches!(
        pulser.query(":PULSE1:WIDTH?"),
        Err(Error::Timeout)
    ));
}

#[test]
fn failed_writes_never_reach_the_history() {
    let (mut pulser, mock) = open_session();
    mock.fail_writes();
    let err = pulser.write(":PULSE1:STATE 1").unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert_eq!(pulser.last_sent(), None);
    assert_eq!(pulser.command_history().count(), 0);
}
