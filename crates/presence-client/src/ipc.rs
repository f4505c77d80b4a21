//! Transport over the companion's local socket.
//!
//! A Unix domain socket on Unix, a named pipe on Windows. After the handshake
//! the stream is split between a reader task and a writer task. The engine
//! side only touches three channels:
//!
//! - outbound, capacity 1: `send` uses `try_send`, so a frame still waiting
//!   to be written surfaces as [`SendError::Backpressure`];
//! - inbound, bounded: `poll` drains it with `try_recv`;
//! - a watch flag that tells both tasks to stop.

use crate::{SyncConfig, Transport};
use presence_core::{
    CloseReason, Command, ConnectError, ConnectionState, Dispatch, Frame, FrameError, HEADER_LEN,
    Handshake, InboundEvent, Opcode, RPC_VERSION, SendError, TransportError,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Endpoint names are this prefix followed by an index.
pub const IPC_PREFIX: &str = "discord-ipc-";

const ENDPOINT_COUNT: usize = 10;

/// Pong replies and subscriptions queued for the writer.
const CONTROL_CAPACITY: usize = 8;

const SUBSCRIPTIONS: [&str; 3] = [
    Dispatch::ACTIVITY_JOIN,
    Dispatch::ACTIVITY_SPECTATE,
    Dispatch::ACTIVITY_JOIN_REQUEST,
];

trait IpcStream: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> IpcStream for T {}

type BoxedStream = Box<dyn IpcStream>;

#[derive(Debug, thiserror::Error)]
enum ReadError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Where the companion may be listening, in probe order.
#[cfg(unix)]
pub fn candidate_paths() -> Vec<PathBuf> {
    let dir = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"]
        .iter()
        .find_map(std::env::var_os)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"));
    (0..ENDPOINT_COUNT)
        .map(|i| dir.join(format!("{IPC_PREFIX}{i}")))
        .collect()
}

/// Where the companion may be listening, in probe order.
#[cfg(windows)]
pub fn candidate_paths() -> Vec<PathBuf> {
    (0..ENDPOINT_COUNT)
        .map(|i| PathBuf::from(format!(r"\\.\pipe\{IPC_PREFIX}{i}")))
        .collect()
}

#[cfg(unix)]
async fn open(path: &Path) -> std::io::Result<BoxedStream> {
    let stream = tokio::net::UnixStream::connect(path).await?;
    Ok(Box::new(stream))
}

#[cfg(windows)]
async fn open(path: &Path) -> std::io::Result<BoxedStream> {
    let pipe = tokio::net::windows::named_pipe::ClientOptions::new().open(path)?;
    Ok(Box::new(pipe))
}

async fn open_any(paths: &[PathBuf]) -> Result<BoxedStream, ConnectError> {
    let mut last_error = None;
    for path in paths {
        match open(path).await {
            Ok(stream) => {
                debug!(path = %path.display(), "opened ipc endpoint");
                return Ok(stream);
            }
            Err(err) => last_error = Some(format!("{}: {err}", path.display())),
        }
    }
    Err(ConnectError::Unavailable(
        last_error.unwrap_or_else(|| "no endpoints to try".to_string()),
    ))
}

async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame, ReadError> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await?;
    let (opcode, len) = Frame::parse_header(header)?;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Frame::new(opcode, payload))
}

async fn handshake(stream: &mut BoxedStream, hello: &Handshake) -> Result<(), ConnectError> {
    let frame = hello
        .to_frame()
        .map_err(|e| ConnectError::ProtocolMismatch(e.to_string()))?;
    stream
        .write_all(&frame.encode())
        .await
        .map_err(|e| ConnectError::Unavailable(e.to_string()))?;

    let reply = read_frame(stream).await.map_err(|e| match e {
        ReadError::Io(e) => ConnectError::Unavailable(e.to_string()),
        ReadError::Frame(e) => ConnectError::ProtocolMismatch(e.to_string()),
    })?;

    match reply.opcode {
        Opcode::Frame => {
            let dispatch: Dispatch = reply
                .parse()
                .map_err(|e| ConnectError::ProtocolMismatch(e.to_string()))?;
            match dispatch.as_ready() {
                Some(ready) if ready.v == RPC_VERSION => Ok(()),
                Some(ready) => Err(ConnectError::ProtocolMismatch(format!(
                    "companion speaks v{}, client speaks v{RPC_VERSION}",
                    ready.v
                ))),
                None => Err(ConnectError::ProtocolMismatch(format!(
                    "expected READY, got {:?}",
                    dispatch.evt
                ))),
            }
        }
        Opcode::Close => {
            let reason = reply
                .parse::<CloseReason>()
                .unwrap_or_else(|_| CloseReason::new(0, "closed"));
            Err(ConnectError::ProtocolMismatch(format!(
                "handshake refused ({}): {}",
                reason.code, reason.message
            )))
        }
        other => Err(ConnectError::ProtocolMismatch(format!(
            "unexpected {other:?} frame during handshake"
        ))),
    }
}

/// A live connection: the two I/O tasks and the engine's ends of the
/// channels.
struct Connection {
    outbound: mpsc::Sender<Frame>,
    control: mpsc::Sender<Frame>,
    inbound: mpsc::Receiver<InboundEvent>,
    shutdown: watch::Sender<bool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    /// `poll` has handed out the disconnect event.
    dropped: bool,
}

impl Connection {
    fn spawn(stream: BoxedStream, inbound_capacity: usize) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        let (outbound_tx, outbound_rx) = mpsc::channel(1);
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(inbound_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (failed_tx, failed_rx) = oneshot::channel();

        let writer = tokio::spawn(write_loop(
            write_half,
            outbound_rx,
            control_rx,
            shutdown_rx.clone(),
            failed_tx,
        ));
        let reader = tokio::spawn(read_loop(
            read_half,
            inbound_tx,
            control_tx.clone(),
            shutdown_rx,
            failed_rx,
        ));

        Self {
            outbound: outbound_tx,
            control: control_tx,
            inbound: inbound_rx,
            shutdown: shutdown_tx,
            reader,
            writer,
            dropped: false,
        }
    }
}

async fn write_loop(
    mut writer: WriteHalf<BoxedStream>,
    mut outbound: mpsc::Receiver<Frame>,
    mut control: mpsc::Receiver<Frame>,
    mut shutdown: watch::Receiver<bool>,
    failed: oneshot::Sender<String>,
) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            Some(frame) = control.recv() => frame,
            Some(frame) = outbound.recv() => frame,
            else => break,
        };
        if let Err(err) = writer.write_all(&frame.encode()).await {
            let _ = failed.send(err.to_string());
            return;
        }
    }

    if let Ok(frame) = CloseReason::new(0, "client closing").to_frame() {
        let _ = writer.write_all(&frame.encode()).await;
    }
    let _ = writer.shutdown().await;
}

async fn read_loop(
    mut reader: ReadHalf<BoxedStream>,
    inbound: mpsc::Sender<InboundEvent>,
    control: mpsc::Sender<Frame>,
    mut shutdown: watch::Receiver<bool>,
    mut writer_failed: oneshot::Receiver<String>,
) {
    let reason = loop {
        let frame = tokio::select! {
            biased;
            _ = shutdown.changed() => return,
            failed = &mut writer_failed => match failed {
                Ok(reason) => break reason,
                // Writer stopped cleanly, which only happens on shutdown.
                Err(_) => return,
            },
            frame = read_frame(&mut reader) => frame,
        };
        match frame {
            Ok(frame) => {
                if let Err(reason) = handle_frame(frame, &inbound, &control).await {
                    break reason;
                }
            }
            Err(err) => break err.to_string(),
        }
    };

    let err = TransportError::UnexpectedDisconnect(reason);
    warn!(%err, "ipc connection lost");
    let _ = inbound
        .send(InboundEvent::ConnectionChanged {
            state: ConnectionState::Disconnected,
        })
        .await;
}

async fn handle_frame(
    frame: Frame,
    inbound: &mpsc::Sender<InboundEvent>,
    control: &mpsc::Sender<Frame>,
) -> Result<(), String> {
    match frame.opcode {
        Opcode::Frame => {
            let dispatch: Dispatch = match frame.parse() {
                Ok(dispatch) => dispatch,
                Err(err) => {
                    warn!(%err, "ignoring malformed frame");
                    return Ok(());
                }
            };
            match dispatch.to_event() {
                Some(event) => {
                    if let InboundEvent::Error { code, message } = &event {
                        warn!(code, %message, "companion reported an error");
                    }
                    inbound
                        .send(event)
                        .await
                        .map_err(|_| "event receiver dropped".to_string())
                }
                None => {
                    debug!(cmd = %dispatch.cmd, evt = ?dispatch.evt, "ignoring dispatch");
                    Ok(())
                }
            }
        }
        Opcode::Ping => control
            .send(Frame::new(Opcode::Pong, frame.payload))
            .await
            .map_err(|_| "writer stopped".to_string()),
        Opcode::Pong => Ok(()),
        Opcode::Close => {
            let reason = frame
                .parse::<CloseReason>()
                .map(|r| r.message)
                .unwrap_or_else(|_| "no reason given".to_string());
            Err(format!("companion closed the connection: {reason}"))
        }
        Opcode::Handshake => {
            warn!("unexpected handshake frame from companion");
            Ok(())
        }
    }
}

/// [`Transport`] over the companion's local socket.
pub struct IpcTransport {
    client_id: String,
    socket_path: Option<PathBuf>,
    connect_timeout: Duration,
    close_timeout: Duration,
    inbound_capacity: usize,
    connection: Option<Connection>,
    next_nonce: u64,
}

impl IpcTransport {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            socket_path: config.socket_path.clone(),
            connect_timeout: config.connect_timeout,
            close_timeout: config.close_timeout,
            inbound_capacity: config.inbound_capacity,
            connection: None,
            next_nonce: 0,
        }
    }

    /// Whether a handshake completed and no disconnect has been polled since.
    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| !c.dropped)
    }

    fn nonce(&mut self) -> String {
        self.next_nonce += 1;
        format!("sub-{}", self.next_nonce)
    }
}

impl Transport for IpcTransport {
    async fn connect(&mut self) -> Result<(), ConnectError> {
        self.close().await;

        let paths = match &self.socket_path {
            Some(path) => vec![path.clone()],
            None => candidate_paths(),
        };
        let hello = Handshake::new(self.client_id.clone());

        let stream = tokio::time::timeout(self.connect_timeout, async {
            let mut stream = open_any(&paths).await?;
            handshake(&mut stream, &hello).await?;
            Ok::<_, ConnectError>(stream)
        })
        .await
        .map_err(|_| ConnectError::Unavailable("handshake timed out".to_string()))??;

        let connection = Connection::spawn(stream, self.inbound_capacity);
        for evt in SUBSCRIPTIONS {
            let nonce = self.nonce();
            if let Ok(frame) = Command::subscribe(evt, nonce).to_frame() {
                let _ = connection.control.try_send(frame);
            }
        }
        self.connection = Some(connection);

        info!(client_id = %self.client_id, "ipc handshake complete");
        Ok(())
    }

    fn send(&mut self, frame: Frame) -> Result<(), SendError> {
        let Some(connection) = self.connection.as_ref().filter(|c| !c.dropped) else {
            return Err(SendError::NotConnected);
        };
        connection.outbound.try_send(frame).map_err(|err| match err {
            TrySendError::Full(_) => SendError::Backpressure,
            TrySendError::Closed(_) => SendError::NotConnected,
        })
    }

    fn poll(&mut self) -> impl Iterator<Item = InboundEvent> + '_ {
        let mut connection = self.connection.as_mut();
        std::iter::from_fn(move || {
            let connection = connection.as_mut()?;
            if connection.dropped {
                return None;
            }
            let event = connection.inbound.try_recv().ok()?;
            if matches!(
                event,
                InboundEvent::ConnectionChanged {
                    state: ConnectionState::Disconnected
                }
            ) {
                connection.dropped = true;
            }
            Some(event)
        })
    }

    async fn close(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        let Connection {
            outbound,
            control,
            inbound,
            shutdown,
            mut reader,
            mut writer,
            ..
        } = connection;

        let _ = shutdown.send(true);
        drop((outbound, control, inbound));

        let stopped = tokio::time::timeout(self.close_timeout, async {
            let _ = (&mut writer).await;
            let _ = (&mut reader).await;
        })
        .await;
        if stopped.is_err() {
            warn!("ipc tasks did not stop within {:?}; aborting", self.close_timeout);
            reader.abort();
            writer.abort();
        }
        debug!("ipc transport closed");
    }
}

impl Drop for IpcTransport {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.shutdown.send(true);
        }
    }
}
