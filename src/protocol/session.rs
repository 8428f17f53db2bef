use std::thread::sleep;
use std::time::Duration;

use log::{debug, error, info};

use crate::error::{Error, Result};

use super::command::{Command, CommandKind, ACK_TOKEN, QUERY_RESPONSE_SIZE};
use super::observer::CommandObserver;
use super::transport::Transport;

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Data-load commands were sent and the closing `OVER` round-trip has
    /// not completed yet.
    AwaitingAck,
}

/// Delays the device needs to digest commands.  Only applied when a
/// transport is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub after_command: Duration,
    pub after_channel: Duration,
    pub after_ack: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing {
            after_command: Duration::from_millis(100),
            after_channel: Duration::from_secs(2),
            after_ack: Duration::from_secs(2),
        }
    }
}

impl Pacing {
    pub fn none() -> Self {
        Pacing {
            after_command: Duration::ZERO,
            after_channel: Duration::ZERO,
            after_ack: Duration::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Session – owns the transport and the acknowledgment debt
// ---------------------------------------------------------------------------

/// Sends commands to the device one at a time, half-duplex.
///
/// Without a transport every operation still runs (observers see every
/// command) but nothing is written and acknowledgments succeed at once.
pub struct Session<T: Transport> {
    transport: Option<T>,
    state: SessionState,
    pacing: Pacing,
    observers: Vec<Box<dyn CommandObserver>>,
    /// The last `OVER` round-trip failed; teardown must not repeat it.
    ack_failed: bool,
    closed: bool,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: Option<T>) -> Self {
        Session {
            transport,
            state: SessionState::Idle,
            pacing: Pacing::default(),
            observers: Vec::new(),
            ack_failed: false,
            closed: false,
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_observer(mut self, observer: impl CommandObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    /// Send one command.
    ///
    /// An `OVER` request goes through [`acknowledge`](Self::acknowledge);
    /// a data-load command puts the session in `AwaitingAck`; a query reads
    /// back and logs the device's answer.
    pub fn send(&mut self, command: &Command) -> Result<()> {
        match command.kind() {
            CommandKind::AckRequest => return self.acknowledge(),
            CommandKind::DataLoad => self.state = SessionState::AwaitingAck,
            _ => {}
        }

        self.write_framed(command.as_bytes())?;

        if command.kind() == CommandKind::Query {
            let response = self.read(QUERY_RESPONSE_SIZE)?;
            if !response.is_empty() {
                info!("{}", String::from_utf8_lossy(&response));
            }
        }

        self.pause(match command.kind() {
            CommandKind::Channel => self.pacing.after_channel,
            _ => self.pacing.after_command,
        });
        Ok(())
    }

    /// Send commands strictly in order, stopping at the first failure.
    pub fn send_all<'a>(&mut self, commands: impl IntoIterator<Item = &'a Command>) -> Result<()> {
        commands.into_iter().try_for_each(|c| self.send(c))
    }

    /// Start a new burst: settle any owed acknowledgment, then send.
    pub fn send_burst(&mut self, commands: &[Command]) -> Result<()> {
        self.settle()?;
        self.send_all(commands)
    }

    /// `OVER` round-trip: write the request and wait for the `OVER` token.
    ///
    /// On success the session returns to `Idle`.  A missing or wrong token
    /// fails with [`Error::ProtocolTimeout`] and leaves the state untouched.
    pub fn acknowledge(&mut self) -> Result<()> {
        let result = self.round_trip();
        self.ack_failed = result.is_err();
        result
    }

    fn round_trip(&mut self) -> Result<()> {
        self.write_framed(Command::ack_request().as_bytes())?;

        if self.transport.is_some() {
            let received = self.read(ACK_TOKEN.len())?;
            if received != ACK_TOKEN {
                return Err(Error::ProtocolTimeout {
                    expected: ACK_TOKEN.to_vec(),
                    received,
                });
            }
        }

        self.state = SessionState::Idle;
        self.pause(self.pacing.after_ack);
        Ok(())
    }

    /// Resolve an owed acknowledgment, if any.
    pub fn settle(&mut self) -> Result<()> {
        match self.state {
            SessionState::AwaitingAck => self.acknowledge(),
            SessionState::Idle => Ok(()),
        }
    }

    /// Settle and hand the transport back.
    pub fn close(mut self) -> Result<Option<T>> {
        self.settle()?;
        self.closed = true;
        Ok(self.transport.take())
    }

    fn write_framed(&mut self, framed: &[u8]) -> Result<()> {
        debug!("-> {}", String::from_utf8_lossy(framed).trim_end());
        for observer in &mut self.observers {
            observer.on_command(framed);
        }
        if let Some(transport) = self.transport.as_mut() {
            transport.write(framed)?;
        }
        Ok(())
    }

    fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        let Some(transport) = self.transport.as_mut() else {
            return Ok(Vec::new());
        };
        let bytes = transport.read(max_bytes)?;
        debug!("<- {:?}", String::from_utf8_lossy(&bytes));
        Ok(bytes)
    }

    fn pause(&self, delay: Duration) {
        if self.transport.is_some() && !delay.is_zero() {
            sleep(delay);
        }
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if self.closed || self.state == SessionState::Idle {
            return;
        }
        if self.ack_failed {
            error!("device left waiting for OVER at teardown: acknowledgment already failed");
            return;
        }
        if let Err(e) = self.settle() {
            error!("device left waiting for OVER at teardown: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io;
    use std::rc::Rc;

    use super::*;
    use crate::protocol::command::encode_data_load;

    /// Replays canned responses; an exhausted queue behaves like a timeout.
    #[derive(Debug, Default)]
    struct ScriptedTransport {
        written: Vec<u8>,
        responses: VecDeque<Vec<u8>>,
    }

    impl ScriptedTransport {
        fn answering(responses: &[&str]) -> Self {
            ScriptedTransport {
                written: Vec::new(),
                responses: responses.iter().map(|r| r.as_bytes().to_vec()).collect(),
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.written.extend_from_slice(bytes);
            Ok(())
        }

        fn read(&mut self, max_bytes: usize) -> io::Result<Vec<u8>> {
            let mut r = self.responses.pop_front().unwrap_or_default();
            r.truncate(max_bytes);
            Ok(r)
        }
    }

    struct Recorder(Rc<RefCell<Vec<Vec<u8>>>>);

    impl CommandObserver for Recorder {
        fn on_command(&mut self, framed: &[u8]) {
            self.0.borrow_mut().push(framed.to_vec());
        }
    }

    fn session(transport: ScriptedTransport) -> Session<ScriptedTransport> {
        Session::new(Some(transport)).with_pacing(Pacing::none())
    }

    fn burst() -> Vec<Command> {
        encode_data_load(&[1, 2, 3]).commands
    }

    fn ack_requests(seen: &Rc<RefCell<Vec<Vec<u8>>>>) -> usize {
        seen.borrow().iter().filter(|c| c.as_slice() == b"OVER\r\n").count()
    }

    #[test]
    fn data_load_leaves_ack_owed() {
        let mut s = session(ScriptedTransport::default());
        s.send(&Command::new(b"SP 1")).unwrap();
        assert_eq!(s.state(), SessionState::Idle);
        s.send_all(&burst()).unwrap();
        assert_eq!(s.state(), SessionState::AwaitingAck);
        s.close().unwrap_err();
    }

    #[test]
    fn ack_round_trip_returns_to_idle() {
        let mut s = session(ScriptedTransport::answering(&["OVER"]));
        s.send_all(&burst()).unwrap();
        s.acknowledge().unwrap();
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(s.transport().unwrap().written, b"Z00001002003\r\nOVER\r\n");
    }

    #[test]
    fn wrong_token_is_a_timeout_and_keeps_debt() {
        let mut s = session(ScriptedTransport::answering(&["ERR!"]));
        s.send_all(&burst()).unwrap();
        match s.acknowledge() {
            Err(Error::ProtocolTimeout { received, .. }) => assert_eq!(received, b"ERR!"),
            other => panic!("expected ProtocolTimeout, got {other:?}"),
        }
        assert_eq!(s.state(), SessionState::AwaitingAck);
    }

    #[test]
    fn silence_is_a_timeout() {
        let mut s = session(ScriptedTransport::default());
        s.send_all(&burst()).unwrap();
        match s.settle() {
            Err(Error::ProtocolTimeout { received, .. }) => assert!(received.is_empty()),
            other => panic!("expected ProtocolTimeout, got {other:?}"),
        }
        assert_eq!(s.state(), SessionState::AwaitingAck);
    }

    #[test]
    fn over_in_a_script_performs_the_round_trip() {
        let mut s = session(ScriptedTransport::answering(&["OVER"]));
        s.send_burst(&Command::parse_script(b"Z00123\nOVER\nSP 5\n"))
            .unwrap();
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(
            s.transport().unwrap().written,
            b"Z00123\r\nOVER\r\nSP 5\r\n"
        );
    }

    #[test]
    fn new_burst_settles_previous_debt_first() {
        let mut s = session(ScriptedTransport::answering(&["OVER"]));
        s.send_all(&burst()).unwrap();
        s.send_burst(&[Command::new(b"START")]).unwrap();
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(
            s.transport().unwrap().written,
            b"Z00001002003\r\nOVER\r\nSTART\r\n"
        );
    }

    #[test]
    fn close_settles_and_returns_transport() {
        let mut s = session(ScriptedTransport::answering(&["OVER"]));
        s.send_all(&burst()).unwrap();
        let transport = s.close().unwrap().unwrap();
        assert!(transport.written.ends_with(b"OVER\r\n"));
    }

    #[test]
    fn dry_run_still_notifies_observers() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut s: Session<ScriptedTransport> = Session::new(None)
            .with_pacing(Pacing::none())
            .with_observer(Recorder(seen.clone()));
        s.send_all(&burst()).unwrap();
        s.send(&Command::new(b"XXX")).unwrap();
        assert_eq!(s.state(), SessionState::AwaitingAck);
        s.close().unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![
                b"Z00001002003\r\n".to_vec(),
                b"XXX\r\n".to_vec(),
                b"OVER\r\n".to_vec()
            ]
        );
    }

    #[test]
    fn query_reads_the_response() {
        let mut s = session(ScriptedTransport::answering(&["status: ok"]));
        s.send(&Command::new(b"XXX")).unwrap();
        assert!(s.transport().unwrap().responses.is_empty());
        assert_eq!(s.state(), SessionState::Idle);
    }

    #[test]
    fn drop_settles_outstanding_debt() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let mut s: Session<ScriptedTransport> =
                Session::new(None).with_observer(Recorder(seen.clone()));
            s.send_all(&burst()).unwrap();
        }
        assert_eq!(seen.borrow().last().unwrap(), &b"OVER\r\n".to_vec());
    }

    #[test]
    fn failed_settle_is_not_repeated_on_drop() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let mut s = session(ScriptedTransport::default()).with_observer(Recorder(seen.clone()));
            s.send_all(&burst()).unwrap();
            s.settle().unwrap_err();
            assert_eq!(s.state(), SessionState::AwaitingAck);
        }
        assert_eq!(ack_requests(&seen), 1);
    }

    #[test]
    fn failed_close_is_not_repeated_on_drop() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut s = session(ScriptedTransport::default()).with_observer(Recorder(seen.clone()));
        s.send_all(&burst()).unwrap();
        assert!(matches!(s.close(), Err(Error::ProtocolTimeout { .. })));
        assert_eq!(ack_requests(&seen), 1);
    }

    #[test]
    fn explicit_retry_after_failure_is_allowed() {
        let mut s = session(ScriptedTransport::answering(&["", "OVER"]));
        s.send_all(&burst()).unwrap();
        s.settle().unwrap_err();
        s.settle().unwrap();
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(
            s.transport().unwrap().written,
            b"Z00001002003\r\nOVER\r\nOVER\r\n"
        );
    }
}
