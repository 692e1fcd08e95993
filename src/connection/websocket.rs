//! The connection controller: owns the stream, enforces the state machine,
//! and runs the close handshake.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::Config;
use crate::connection::protocol::ConnectionProtocol;
use crate::connection::role::Role;
use crate::connection::state::{ConnectionState, StateCell};
use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseInfo, Continuation, ReceivedMessage};
use crate::protocol::frame::{Frame, FrameReader, FrameWriter};
use crate::protocol::handshake;
use crate::protocol::opcode::OpCode;

type BoxRead = Box<dyn AsyncRead + Send + Unpin>;
type BoxWrite = Box<dyn AsyncWrite + Send + Unpin>;

/// Receive-side state: the frame reader plus the opcode of the fragmented
/// message currently in flight, both guarded by one lock.
struct Receiver {
    frames: FrameReader<BoxRead>,
    fragment_opcode: Option<OpCode>,
}

/// A WebSocket connection controller.
///
/// Exclusively owns the two halves of the underlying stream. The write half
/// sits behind the send lock, the read half behind the receive lock, so one
/// task can send while another receives but two senders (or two receivers)
/// serialize. All methods take `&self`; share the controller with
/// `Arc<WebSocket>` to use it from several tasks.
pub struct WebSocket {
    receiver: Mutex<Receiver>,
    writer: Mutex<FrameWriter<BoxWrite>>,
    state: StateCell,
    role: Role,
    config: Config,
    protocol: Box<dyn ConnectionProtocol>,
    close_sent: AtomicBool,
    close_confirmed: AtomicBool,
    closed_hook_ran: AtomicBool,
}

impl WebSocket {
    /// Take ownership of a stream and wrap it in a controller.
    ///
    /// The protocol's hooks are driven by [`run`](Self::run); for client
    /// and server connections it is normally one of the handshake adapters
    /// wrapping the application protocol.
    pub fn new<S>(stream: S, role: Role, config: Config, protocol: Box<dyn ConnectionProtocol>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            receiver: Mutex::new(Receiver {
                frames: FrameReader::new(Box::new(read_half)),
                fragment_opcode: None,
            }),
            writer: Mutex::new(FrameWriter::new(Box::new(write_half), role)),
            state: StateCell::new(),
            role,
            config,
            protocol,
            close_sent: AtomicBool::new(false),
            close_confirmed: AtomicBool::new(false),
            closed_hook_ran: AtomicBool::new(false),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Whether the connection is open for application traffic.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.get() == ConnectionState::Open
    }

    /// This side's role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Drive the connection through its whole lifetime.
    ///
    /// Runs the handshake via `on_connection_started` (a failure there
    /// aborts before any application logic), opens the connection, runs
    /// `process` until it returns, then winds the connection down with a
    /// Normal close unless one was already sent. `on_connection_closed`
    /// fires exactly once no matter how the connection ends.
    pub async fn run(&self) -> Result<()> {
        self.state.set(ConnectionState::HandshakeInFlight);
        if let Err(err) = self.protocol.on_connection_started(self).await {
            warn!(role = %self.role, error = %err, "connection setup failed");
            self.force_close().await;
            return Err(err);
        }
        self.state.set(ConnectionState::Open);
        debug!(role = %self.role, "connection open");

        let result = self.protocol.process(self).await;
        self.close_connection(CloseCode::Normal).await;
        result
    }

    /// Send one frame of application data.
    ///
    /// `is_last` clears for all but the final frame of a fragmented
    /// message.
    ///
    /// # Errors
    ///
    /// [`Error::NotOpen`] unless the connection is open.
    pub async fn send(&self, opcode: OpCode, payload: &[u8], is_last: bool) -> Result<()> {
        if !self.state.get().can_send() {
            return Err(Error::NotOpen);
        }
        self.write_frame(opcode, payload, is_last).await
    }

    /// Send a single-frame text message.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        self.send(OpCode::Text, text.as_bytes(), true).await
    }

    /// Send a single-frame binary message.
    pub async fn send_binary(&self, data: &[u8]) -> Result<()> {
        self.send(OpCode::Binary, data, true).await
    }

    /// Receive the next deliverable chunk, or `None`.
    ///
    /// `None` covers everything that consumed a frame without producing
    /// application data: pings (answered with a pong automatically), pongs,
    /// the peer's Close frame, and end of stream. Check
    /// [`is_open`](Self::is_open) after a `None` to tell "nothing this
    /// time" from "connection is winding down".
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] when called on a closed connection;
    /// [`Error::Io`] on genuine stream failures. Malformed frames are not
    /// errors here: they end the stream as if the peer disappeared.
    pub async fn receive_or_null(&self) -> Result<Option<ReceivedMessage>> {
        if !self.state.get().can_receive() {
            return Err(Error::Closed);
        }
        let mut receiver = self.receiver.lock().await;

        let frame = match receiver.frames.read_frame_or_null().await? {
            Some(frame) => frame,
            None => {
                debug!(role = %self.role, "stream ended");
                self.state.set(ConnectionState::Closed);
                return Ok(None);
            }
        };

        match frame.opcode {
            OpCode::Ping => {
                debug!(payload_len = frame.payload.len(), "ping, answering with pong");
                self.write_frame(OpCode::Pong, &frame.payload, true).await?;
                Ok(None)
            }
            OpCode::Pong => Ok(None),
            OpCode::Close => {
                let close = CloseInfo::from_payload(&frame.payload);
                debug!(code = close.code.as_u16(), reason = ?close.reason, "peer sent close");
                self.close_confirmed.store(true, Ordering::SeqCst);
                if self.state.get() == ConnectionState::Open {
                    self.state.set(ConnectionState::CloseSent);
                }
                Ok(None)
            }
            OpCode::Text | OpCode::Binary | OpCode::Continuation => {
                self.deliver_data(&mut receiver, frame).map(Some)
            }
        }
    }

    /// Turn a data frame into a deliverable chunk, tracking fragmentation.
    fn deliver_data(&self, receiver: &mut Receiver, frame: Frame) -> Result<ReceivedMessage> {
        let opcode = match frame.opcode {
            OpCode::Continuation => receiver.fragment_opcode.ok_or_else(|| {
                Error::ProtocolViolation("continuation frame without a preceding data frame".into())
            })?,
            first => {
                if !frame.fin {
                    receiver.fragment_opcode = Some(first);
                }
                first
            }
        };

        let continuation = match (frame.opcode, frame.fin) {
            (OpCode::Continuation, false) => Some(Continuation::NonLast),
            (OpCode::Continuation, true) => {
                receiver.fragment_opcode = None;
                Some(Continuation::Last)
            }
            (_, false) => Some(Continuation::NonLast),
            (_, true) => None,
        };

        match opcode {
            OpCode::Text => Ok(ReceivedMessage::Text {
                text: String::from_utf8(frame.payload)?,
                continuation,
            }),
            _ => Ok(ReceivedMessage::Binary {
                data: frame.payload,
                continuation,
            }),
        }
    }

    /// Run this side of the close handshake. Idempotent: only the first
    /// call sends a Close frame, later calls return immediately.
    ///
    /// Sends Close(code), then waits up to the configured `close_wait` for
    /// the peer's answering Close unless one already arrived. Servers tear
    /// the stream down afterwards in every case; clients only when the
    /// peer never answered.
    pub async fn close_connection(&self, code: CloseCode) {
        if !self.closed_hook_ran.swap(true, Ordering::SeqCst) {
            self.protocol
                .on_connection_closed(self, &CloseInfo::new(code))
                .await;
        }
        if self.close_sent.swap(true, Ordering::SeqCst) {
            debug!(role = %self.role, "close already sent");
            return;
        }

        if self.state.get() != ConnectionState::Closed {
            let close = CloseInfo::new(code);
            match self.write_frame(OpCode::Close, &close.to_payload(), true).await {
                Ok(()) => debug!(role = %self.role, code = code.as_u16(), "sent close frame"),
                Err(err) => warn!(error = %err, "failed to send close frame"),
            }
            self.state.set(ConnectionState::CloseSent);
        }

        if !self.close_confirmed.load(Ordering::SeqCst) {
            match timeout(self.config.close_wait, self.receive_or_null()).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => debug!(error = %err, "receive failed during close wait"),
                Err(_) => warn!(
                    role = %self.role,
                    wait = ?self.config.close_wait,
                    "peer did not answer the close in time"
                ),
            }
        }

        if self.role == Role::Server || !self.close_confirmed.load(Ordering::SeqCst) {
            self.force_close().await;
        } else {
            self.state.set(ConnectionState::Closed);
        }
    }

    /// Tear the stream down without ceremony.
    ///
    /// Flushes and shuts the write direction; failures are logged, never
    /// escalated. The connection is `Closed` afterwards regardless.
    pub async fn force_close(&self) {
        let mut writer = self.writer.lock().await;
        if let Err(err) = writer.flush().await {
            debug!(error = %err, "flush during teardown failed");
        }
        if let Err(err) = writer.shutdown().await {
            debug!(error = %err, "shutdown during teardown failed");
        }
        drop(writer);
        self.state.set(ConnectionState::Closed);
    }

    /// Read the pre-upgrade HTTP header block from the stream.
    ///
    /// For the handshake adapters, so protocols never touch the socket.
    pub async fn read_header(&self) -> Result<String> {
        let mut receiver = self.receiver.lock().await;
        handshake::read_http_header(receiver.frames.get_mut(), self.config.max_header_size).await
    }

    /// Write an HTTP header block, normalizing the trailing blank line.
    pub async fn write_header(&self, header: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer
            .write_raw(format!("{}\r\n\r\n", header.trim_end()).as_bytes())
            .await
    }

    /// Serialize one frame under the send lock, no state check.
    async fn write_frame(&self, opcode: OpCode, payload: &[u8], fin: bool) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_frame(opcode, payload, fin).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::duplex;

    struct Idle;

    #[async_trait::async_trait]
    impl ConnectionProtocol for Idle {
        async fn process(&self, _ws: &WebSocket) -> Result<()> {
            Ok(())
        }
    }

    fn open_pair() -> (Arc<WebSocket>, tokio::io::DuplexStream) {
        let (near, far) = duplex(64 * 1024);
        let config = Config::new().with_close_wait(Duration::from_millis(100));
        let ws = WebSocket::new(near, Role::Server, config, Box::new(Idle));
        ws.state.set(ConnectionState::Open);
        (Arc::new(ws), far)
    }

    async fn peer_frames(far: tokio::io::DuplexStream) -> Vec<Frame> {
        let mut reader = FrameReader::new(far);
        let mut frames = Vec::new();
        while let Ok(Some(frame)) = reader.read_frame().await {
            frames.push(frame);
        }
        frames
    }

    #[tokio::test]
    async fn test_send_requires_open_connection() {
        let (near, _far) = duplex(1024);
        let ws = WebSocket::new(near, Role::Server, Config::default(), Box::new(Idle));
        assert_eq!(ws.send_text("hi").await.unwrap_err(), Error::NotOpen);
    }

    #[tokio::test]
    async fn test_receive_refused_when_closed() {
        let (ws, _far) = open_pair();
        ws.state.set(ConnectionState::Closed);
        assert_eq!(ws.receive_or_null().await.unwrap_err(), Error::Closed);
    }

    #[tokio::test]
    async fn test_ping_answered_with_matching_pong() {
        let (ws, far) = open_pair();
        let (mut far_read, far_write) = tokio::io::split(far);
        let mut peer = FrameWriter::new(far_write, Role::Client);
        peer.write_frame(OpCode::Ping, b"probe", true).await.unwrap();

        assert!(ws.receive_or_null().await.unwrap().is_none());
        assert!(ws.is_open());

        let pong = FrameReader::new(&mut far_read)
            .read_frame()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pong.opcode, OpCode::Pong);
        assert_eq!(pong.payload, b"probe");
    }

    #[tokio::test]
    async fn test_peer_close_confirms_and_stops_sends() {
        let (ws, far) = open_pair();
        let (_far_read, far_write) = tokio::io::split(far);
        let mut peer = FrameWriter::new(far_write, Role::Client);
        peer.write_frame(OpCode::Close, &CloseInfo::new(CloseCode::GoingAway).to_payload(), true)
            .await
            .unwrap();

        assert!(ws.receive_or_null().await.unwrap().is_none());
        assert_eq!(ws.state(), ConnectionState::CloseSent);
        assert_eq!(ws.send_text("late").await.unwrap_err(), Error::NotOpen);
    }

    #[tokio::test]
    async fn test_fragmented_text_delivered_as_marked_chunks() {
        let (ws, far) = open_pair();
        let (_far_read, far_write) = tokio::io::split(far);
        let mut peer = FrameWriter::new(far_write, Role::Client);
        peer.write_frame(OpCode::Text, b"one ", false).await.unwrap();
        peer.write_frame(OpCode::Continuation, b"two ", false).await.unwrap();
        peer.write_frame(OpCode::Continuation, b"three", true).await.unwrap();

        let mut text = String::new();
        let mut markers = Vec::new();
        for _ in 0..3 {
            let message = ws.receive_or_null().await.unwrap().unwrap();
            markers.push(message.continuation());
            text.push_str(message.as_text().unwrap());
        }
        assert_eq!(text, "one two three");
        assert_eq!(
            markers,
            vec![
                Some(Continuation::NonLast),
                Some(Continuation::NonLast),
                Some(Continuation::Last),
            ]
        );
    }

    #[tokio::test]
    async fn test_single_frame_message_has_no_marker() {
        let (ws, far) = open_pair();
        let (_far_read, far_write) = tokio::io::split(far);
        let mut peer = FrameWriter::new(far_write, Role::Client);
        peer.write_frame(OpCode::Text, b"whole", true).await.unwrap();

        let message = ws.receive_or_null().await.unwrap().unwrap();
        assert_eq!(message.as_text(), Some("whole"));
        assert_eq!(message.continuation(), None);
    }

    #[tokio::test]
    async fn test_stray_continuation_is_a_protocol_violation() {
        let (ws, far) = open_pair();
        let (_far_read, far_write) = tokio::io::split(far);
        let mut peer = FrameWriter::new(far_write, Role::Client);
        peer.write_frame(OpCode::Continuation, b"orphan", true).await.unwrap();

        assert!(matches!(
            ws.receive_or_null().await.unwrap_err(),
            Error::ProtocolViolation(_)
        ));
    }

    #[tokio::test]
    async fn test_double_close_sends_one_close_frame() {
        let (ws, far) = open_pair();
        ws.close_connection(CloseCode::Normal).await;
        ws.close_connection(CloseCode::Normal).await;
        assert_eq!(ws.state(), ConnectionState::Closed);

        let close_frames: Vec<Frame> = peer_frames(far)
            .await
            .into_iter()
            .filter(|frame| frame.opcode == OpCode::Close)
            .collect();
        assert_eq!(close_frames.len(), 1);
        assert_eq!(
            CloseInfo::from_payload(&close_frames[0].payload).code,
            CloseCode::Normal
        );
    }

    #[tokio::test]
    async fn test_close_waits_for_peer_confirmation() {
        let (ws, far) = open_pair();
        let peer = tokio::spawn(async move {
            let (far_read, far_write) = tokio::io::split(far);
            let mut frames = FrameReader::new(far_read);
            let mut writer = FrameWriter::new(far_write, Role::Client);
            let close = frames.read_frame().await.unwrap().unwrap();
            assert_eq!(close.opcode, OpCode::Close);
            writer
                .write_frame(OpCode::Close, &close.payload, true)
                .await
                .unwrap();
            // Drain until the controller shuts its write half down.
            let mut rest = frames;
            while rest.read_frame().await.unwrap_or(None).is_some() {}
        });

        ws.close_connection(CloseCode::Normal).await;
        assert!(ws.close_confirmed.load(Ordering::SeqCst));
        assert_eq!(ws.state(), ConnectionState::Closed);
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_eof_marks_connection_closed() {
        let (ws, far) = open_pair();
        drop(far);
        assert!(ws.receive_or_null().await.unwrap().is_none());
        assert_eq!(ws.state(), ConnectionState::Closed);
    }
}
