//! Connection session: the live, stateful unit composing transport, frame
//! extraction, and the protocol handshake.
//!
//! One session owns one TLS connection to one TAK server. A reader task
//! appends every delivered chunk to the receive buffer, drains complete
//! documents, and routes each through the handshake: keepalive requests are
//! answered on the spot, version announcements are recorded, and everything
//! else is forwarded to the consumer as a [`SessionEvent::Document`]. A
//! writer task serializes outbound documents behind a queue shared with the
//! keepalive replies, so writes from any task interleave at document
//! granularity.
//!
//! ## State machine
//!
//! ```text
//!                 connect() resolves
//!   [Connecting] ─────────────────────> [Connected]
//!        │                                  │     │
//!        │ connect() fails                  │     │ transport error
//!        v                                  │     v
//!    (error returned,                       │  [Error]   (terminal)
//!     no session constructed)               │
//!                                           │ close() / peer EOF
//!                                           v
//!                                       [Closed]   (terminal)
//! ```
//!
//! Terminal states are permanent: the transport handle is released, buffered
//! bytes are discarded, and a new session must be constructed to reconnect —
//! this crate never retries on its own.
//!
//! ## Consumer contract
//!
//! Events arrive on an unbounded channel obtained from [`Session::events`].
//! Delivery is fire-and-forget: a slow consumer grows the queue but never
//! stalls the reader into the TCP window. That keeps transport latency
//! independent of consumer speed, at the cost of unbounded queueing — the
//! channel handoff is the place to add back-pressure if that trade-off ever
//! flips.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cot::CotEvent;
use crate::error::{Result, TakError};
use crate::protocol::{classify, FrameBuffer, Reaction};
use crate::transport::{self, Endpoint, TlsClientConfig};

/// Outbound documents queued ahead of the writer task.
const OUTBOUND_QUEUE: usize = 64;

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Connection establishment in flight.
    Connecting = 0,
    /// Steady state: documents flow in both directions.
    Connected = 1,
    /// Orderly shutdown completed (terminal).
    Closed = 2,
    /// Transport fault terminated the session (terminal).
    Error = 3,
}

impl SessionState {
    /// True for states the session can never leave.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Error)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Connected,
            2 => Self::Closed,
            _ => Self::Error,
        }
    }
}

/// Consumer-facing session events.
#[derive(Debug)]
pub enum SessionEvent {
    /// The secured connection is established; documents may now flow.
    Connected,
    /// An application document arrived.
    Document(CotEvent),
    /// A fatal transport fault terminated the session.
    Error(TakError),
    /// The session ended with an orderly shutdown.
    Closed,
}

enum Outbound {
    Document(String),
    Shutdown,
}

struct Shared {
    endpoint: Endpoint,
    state: AtomicU8,
    server_version: OnceLock<String>,
}

impl Shared {
    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Transition `from -> to`; returns false when another task got to a
    /// transition first. Terminal states can never be overwritten.
    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// One live connection to a TAK server.
///
/// Constructed by [`Session::connect`]; single-use. Dropping the handle does
/// not tear the connection down by itself — call [`Session::close`] for an
/// orderly shutdown.
pub struct Session {
    shared: Arc<Shared>,
    outbound: mpsc::Sender<Outbound>,
    events: Option<mpsc::UnboundedReceiver<SessionEvent>>,
}

impl Session {
    /// Connect to a TAK endpoint.
    ///
    /// Suspends until the TLS handshake completes. On failure the error is
    /// returned and no session exists — reconnecting means calling this
    /// again; there is no automatic retry.
    pub async fn connect(endpoint: Endpoint, config: TlsClientConfig) -> Result<Self> {
        let stream = transport::connect(&endpoint, &config).await?;
        Ok(Self::from_stream(stream, endpoint))
    }

    /// Assemble a session around an established stream.
    fn from_stream<S>(stream: S, endpoint: Endpoint) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let shared = Arc::new(Shared {
            endpoint,
            state: AtomicU8::new(SessionState::Connected as u8),
            server_version: OnceLock::new(),
        });

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let (read_half, write_half) = tokio::io::split(stream);

        let _ = events_tx.send(SessionEvent::Connected);

        tokio::spawn(read_loop(
            read_half,
            Arc::clone(&shared),
            events_tx.clone(),
            outbound_tx.clone(),
        ));
        tokio::spawn(write_loop(
            write_half,
            Arc::clone(&shared),
            events_tx,
            outbound_rx,
        ));

        Self {
            shared,
            outbound: outbound_tx,
            events: Some(events_rx),
        }
    }

    /// Take the consumer event stream. Subsequent calls return a channel
    /// that yields nothing.
    pub fn events(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        self.events.take().unwrap_or_else(|| {
            let (_, rx) = mpsc::unbounded_channel();
            rx
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Server version announced during the handshake, once seen.
    pub fn server_version(&self) -> Option<String> {
        self.shared.server_version.get().cloned()
    }

    /// Write a document to the connection.
    ///
    /// Valid only while [`SessionState::Connected`]; in any other state this
    /// is a usage error reported synchronously. Suspends until the writer
    /// task accepts the serialized bytes.
    pub async fn write(&self, event: &CotEvent) -> Result<()> {
        let state = self.state();
        if state != SessionState::Connected {
            return Err(TakError::NotConnected(state));
        }

        debug!(event_type = event.event_type(), "writing document");
        self.outbound
            .send(Outbound::Document(event.to_wire()))
            .await
            .map_err(|_| TakError::SessionTerminated("writer task stopped".to_string()))
    }

    /// Request an orderly shutdown.
    ///
    /// Cooperative: queued writes ahead of the request are flushed
    /// best-effort, then the transport's write side is shut down and the
    /// session transitions to [`SessionState::Closed`] (observable as a
    /// [`SessionEvent::Closed`]). Idempotent once terminal.
    pub async fn close(&self) {
        if self.state().is_terminal() {
            return;
        }
        // An error here means the writer already stopped, i.e. the session
        // is terminal or about to be
        let _ = self.outbound.send(Outbound::Shutdown).await;
    }
}

async fn read_loop<S>(
    mut reader: ReadHalf<S>,
    shared: Arc<Shared>,
    events: mpsc::UnboundedSender<SessionEvent>,
    outbound: mpsc::Sender<Outbound>,
) where
    S: AsyncRead + AsyncWrite + Send,
{
    let mut frames = FrameBuffer::new();
    let mut chunk = [0u8; 8 * 1024];

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => {
                if shared.transition(SessionState::Connected, SessionState::Closed) {
                    info!(endpoint = %shared.endpoint, "connection closed by peer");
                    let _ = events.send(SessionEvent::Closed);
                }
                break;
            }
            Ok(n) => n,
            Err(e) => {
                if shared.transition(SessionState::Connected, SessionState::Error) {
                    warn!(endpoint = %shared.endpoint, error = %e, "transport error");
                    let _ = events.send(SessionEvent::Error(e.into()));
                }
                break;
            }
        };

        if shared.state() != SessionState::Connected {
            // A close raced this read; the session is terminal and whatever
            // arrived is not processed
            break;
        }

        frames.extend(&chunk[..n]);
        while let Some(document) = frames.next_document() {
            match classify(&document) {
                Reaction::Reply(reply) => {
                    debug!("keepalive request, queueing reply");
                    if outbound
                        .send(Outbound::Document(reply.to_wire()))
                        .await
                        .is_err()
                    {
                        // Writer stopped; its exit path owns the transition
                        return;
                    }
                }
                Reaction::ServerVersion(version) => {
                    info!(version = %version, "server version announced");
                    let _ = shared.server_version.set(version);
                }
                Reaction::Forward(event) => {
                    let _ = events.send(SessionEvent::Document(event));
                }
                Reaction::Discard => {}
            }
        }
    }

    if !frames.is_empty() {
        debug!(
            bytes = frames.len(),
            "discarding partial fragment on session end"
        );
        frames.clear();
    }
}

async fn write_loop<S>(
    mut writer: WriteHalf<S>,
    shared: Arc<Shared>,
    events: mpsc::UnboundedSender<SessionEvent>,
    mut outbound: mpsc::Receiver<Outbound>,
) where
    S: AsyncRead + AsyncWrite + Send,
{
    while let Some(message) = outbound.recv().await {
        match message {
            Outbound::Document(xml) => {
                if shared.state() != SessionState::Connected {
                    break;
                }
                if let Err(e) = write_document(&mut writer, &xml).await {
                    if shared.transition(SessionState::Connected, SessionState::Error) {
                        warn!(endpoint = %shared.endpoint, error = %e, "write failed");
                        let _ = events.send(SessionEvent::Error(e.into()));
                    }
                    break;
                }
            }
            Outbound::Shutdown => {
                let _ = writer.shutdown().await;
                if shared.transition(SessionState::Connected, SessionState::Closed) {
                    info!(endpoint = %shared.endpoint, "session closed");
                    let _ = events.send(SessionEvent::Closed);
                }
                break;
            }
        }
    }
}

async fn write_document<S>(writer: &mut WriteHalf<S>, xml: &str) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite,
{
    writer.write_all(xml.as_bytes()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::DuplexStream;
    use tokio::time::timeout;

    const TICK: Duration = Duration::from_secs(5);

    fn test_session() -> (Session, DuplexStream) {
        let (client_side, server_side) = tokio::io::duplex(64 * 1024);
        let session = Session::from_stream(client_side, Endpoint::new("test", 8089));
        (session, server_side)
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
        timeout(TICK, rx.recv()).await.unwrap().unwrap()
    }

    #[test]
    fn test_state_terminality() {
        assert!(!SessionState::Connecting.is_terminal());
        assert!(!SessionState::Connected.is_terminal());
        assert!(SessionState::Closed.is_terminal());
        assert!(SessionState::Error.is_terminal());
    }

    #[test]
    fn test_terminal_state_is_never_overwritten() {
        let shared = Shared {
            endpoint: Endpoint::new("test", 8089),
            state: AtomicU8::new(SessionState::Connected as u8),
            server_version: OnceLock::new(),
        };

        assert!(shared.transition(SessionState::Connected, SessionState::Error));
        assert!(!shared.transition(SessionState::Connected, SessionState::Closed));
        assert_eq!(shared.state(), SessionState::Error);
    }

    #[tokio::test]
    async fn test_connected_event_fires_first() {
        let (mut session, _server) = test_session();
        let mut events = session.events();

        assert!(matches!(next_event(&mut events).await, SessionEvent::Connected));
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn test_application_document_is_forwarded() {
        let (mut session, mut server) = test_session();
        let mut events = session.events();
        assert!(matches!(next_event(&mut events).await, SessionEvent::Connected));

        server
            .write_all(b"<event type=\"a-f-G\" uid=\"ANDROID-1\"><point lat=\"1\" lon=\"2\"/></event>")
            .await
            .unwrap();

        match next_event(&mut events).await {
            SessionEvent::Document(event) => {
                assert_eq!(event.event_type(), "a-f-G");
                assert_eq!(event.uid(), Some("ANDROID-1"));
            }
            other => panic!("expected Document, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_keepalive_roundtrip() {
        let (mut session, mut server) = test_session();
        let mut events = session.events();
        assert!(matches!(next_event(&mut events).await, SessionEvent::Connected));

        server
            .write_all(b"<event type=\"t-x-c-t-r\" uid=\"ping\"/>")
            .await
            .unwrap();

        // The reply comes back on the wire, and the request never reaches
        // the consumer
        let mut reply = vec![0u8; 4096];
        let n = timeout(TICK, server.read(&mut reply)).await.unwrap().unwrap();
        let reply = String::from_utf8_lossy(&reply[..n]).into_owned();

        assert!(reply.starts_with(crate::cot::XML_DECLARATION));
        assert!(reply.contains("takPong"));
        assert!(reply.contains("type=\"t-x-c-t\""));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_version_capture() {
        let (mut session, mut server) = test_session();
        let mut events = session.events();
        assert!(matches!(next_event(&mut events).await, SessionEvent::Connected));
        assert_eq!(session.server_version(), None);

        // Version announce, then an application document as an ordering
        // fence: once the second arrives, the first has been processed
        server
            .write_all(b"<event uid=\"takserver\" type=\"t-x-takp-v\"><detail><TakControl><TakServerVersionInfo serverVersion=\"5.4\"/></TakControl></detail></event>")
            .await
            .unwrap();
        server
            .write_all(b"<event type=\"a-f-G\" uid=\"fence\"/>")
            .await
            .unwrap();

        assert!(matches!(
            next_event(&mut events).await,
            SessionEvent::Document(_)
        ));
        assert_eq!(session.server_version(), Some("5.4".to_string()));
    }

    #[tokio::test]
    async fn test_split_document_reconstruction() {
        let (mut session, mut server) = test_session();
        let mut events = session.events();
        assert!(matches!(next_event(&mut events).await, SessionEvent::Connected));

        server.write_all(b"<event type=\"a-f-G\"><po").await.unwrap();
        server
            .write_all(b"int lat=\"1\" lon=\"2\"/></event><event type=\"t-x-c-t-r\"/>")
            .await
            .unwrap();

        match next_event(&mut events).await {
            SessionEvent::Document(event) => assert_eq!(event.event_type(), "a-f-G"),
            other => panic!("expected Document, got {other:?}"),
        }

        // The keepalive in the second chunk produced a wire reply, not an event
        let mut reply = vec![0u8; 4096];
        let n = timeout(TICK, server.read(&mut reply)).await.unwrap().unwrap();
        assert!(String::from_utf8_lossy(&reply[..n]).contains("takPong"));
    }

    #[tokio::test]
    async fn test_malformed_document_does_not_stop_the_stream() {
        let (mut session, mut server) = test_session();
        let mut events = session.events();
        assert!(matches!(next_event(&mut events).await, SessionEvent::Connected));

        server
            .write_all(b"<event type=\"a\" uid=\"A\"/><event uid=\"B\"></event><event type=\"c\" uid=\"C\"/>")
            .await
            .unwrap();

        let uids: Vec<String> = [next_event(&mut events).await, next_event(&mut events).await]
            .into_iter()
            .map(|event| match event {
                SessionEvent::Document(event) => event.uid().unwrap().to_string(),
                other => panic!("expected Document, got {other:?}"),
            })
            .collect();

        assert_eq!(uids, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_write_reaches_the_wire() {
        let (session, mut server) = test_session();

        let event =
            CotEvent::from_xml(r#"<event type="a-f-G" uid="self"><point lat="1" lon="2"/></event>"#)
                .unwrap();
        session.write(&event).await.unwrap();

        let mut wire = vec![0u8; 4096];
        let n = timeout(TICK, server.read(&mut wire)).await.unwrap().unwrap();
        let wire = String::from_utf8_lossy(&wire[..n]).into_owned();

        assert!(wire.starts_with(crate::cot::XML_DECLARATION));
        assert!(wire.ends_with(event.as_xml()));
    }

    #[tokio::test]
    async fn test_close_is_orderly_and_terminal() {
        let (mut session, mut server) = test_session();
        let mut events = session.events();
        assert!(matches!(next_event(&mut events).await, SessionEvent::Connected));

        session.close().await;
        assert!(matches!(next_event(&mut events).await, SessionEvent::Closed));
        assert_eq!(session.state(), SessionState::Closed);

        // Write after close is a usage error
        let event = CotEvent::from_xml(r#"<event type="a" uid="late"/>"#).unwrap();
        assert!(matches!(
            session.write(&event).await,
            Err(TakError::NotConnected(SessionState::Closed))
        ));

        // Data delivered after close never reaches the consumer
        let _ = server.write_all(b"<event type=\"a\" uid=\"post\"/>").await;
        session.close().await; // idempotent
        assert!(timeout(Duration::from_millis(200), events.recv())
            .await
            .map(|e| e.is_none())
            .unwrap_or(true));
    }

    #[tokio::test]
    async fn test_peer_eof_closes_session() {
        let (mut session, mut server) = test_session();
        let mut events = session.events();
        assert!(matches!(next_event(&mut events).await, SessionEvent::Connected));

        // A partial fragment is buffered when the peer goes away; it is
        // discarded, never delivered
        server.write_all(b"<event type=\"a\"><po").await.unwrap();
        drop(server);

        assert!(matches!(next_event(&mut events).await, SessionEvent::Closed));
        assert_eq!(session.state(), SessionState::Closed);
    }
}
