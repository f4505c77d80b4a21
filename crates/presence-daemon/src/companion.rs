//! A local stand-in for the chat companion.
//!
//! Speaks the companion side of the IPC protocol: answers the handshake,
//! acknowledges commands, answers pings, and reports every presence it is
//! handed. Useful for running the daemon without the real thing.

use anyhow::bail;
use presence_core::{
    Command, Dispatch, Frame, HEADER_LEN, Handshake, Opcode, PresenceSnapshot, Ready, User,
};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

/// Error code sent back for commands the companion cannot handle.
const BAD_COMMAND: i64 = 4000;

/// What a client most recently asked the companion to show. `None` is a
/// clear.
pub type Shown = Option<PresenceSnapshot>;

/// Accept clients forever, answering each with READY at `version`.
///
/// Every presence received is also pushed to `shown`, when given.
pub async fn serve(
    listener: UnixListener,
    version: u32,
    shown: Option<mpsc::UnboundedSender<Shown>>,
) -> std::io::Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let shown = shown.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, version, shown).await {
                tracing::warn!("Client error: {}", e);
            }
        });
    }
}

async fn handle_client(
    mut stream: UnixStream,
    version: u32,
    shown: Option<mpsc::UnboundedSender<Shown>>,
) -> anyhow::Result<()> {
    let hello = read_frame(&mut stream).await?;
    if hello.opcode != Opcode::Handshake {
        bail!("expected handshake, got {:?}", hello.opcode);
    }
    let hello: Handshake = hello.parse()?;
    tracing::info!("Client {} connected (v{})", hello.client_id, hello.v);

    let ready = Dispatch::ready(&Ready {
        v: version,
        user: Some(User {
            id: "0".to_string(),
            username: "companion".to_string(),
            discriminator: None,
            avatar: None,
        }),
    });
    write_frame(&mut stream, &ready.to_frame()?).await?;

    loop {
        let frame = match read_frame(&mut stream).await {
            Ok(frame) => frame,
            Err(_) => {
                tracing::info!("Client {} hung up", hello.client_id);
                return Ok(());
            }
        };

        match frame.opcode {
            Opcode::Frame => {
                let command: Command = frame.parse()?;
                let reply = handle_command(&command, shown.as_ref());
                write_frame(&mut stream, &reply.to_frame()?).await?;
            }
            Opcode::Ping => {
                write_frame(&mut stream, &Frame::new(Opcode::Pong, frame.payload)).await?;
            }
            Opcode::Close => {
                tracing::info!("Client {} said goodbye", hello.client_id);
                return Ok(());
            }
            other => tracing::debug!("Ignoring {:?}", other),
        }
    }
}

fn handle_command(command: &Command, shown: Option<&mpsc::UnboundedSender<Shown>>) -> Dispatch {
    match command.cmd.as_str() {
        Command::SET_ACTIVITY => {
            let snapshot = command
                .activity()
                .map_err(|e| e.to_string())
                .and_then(|activity| {
                    activity
                        .map(PresenceSnapshot::from_activity)
                        .transpose()
                        .map_err(|e| e.to_string())
                });
            match snapshot {
                Ok(snapshot) => {
                    match &snapshot {
                        Some(s) => tracing::info!("Showing {:?} / {:?}", s.details, s.state),
                        None => tracing::info!("Presence cleared"),
                    }
                    if let Some(tx) = shown {
                        let _ = tx.send(snapshot);
                    }
                    Dispatch::reply(command, command.args["activity"].clone())
                }
                Err(message) => error_reply(command, message),
            }
        }
        Command::SUBSCRIBE => Dispatch::reply(command, json!({ "evt": command.evt })),
        other => error_reply(command, format!("unknown command {other}")),
    }
}

fn error_reply(command: &Command, message: String) -> Dispatch {
    tracing::warn!("Rejecting {}: {}", command.cmd, message);
    Dispatch {
        evt: Some(Dispatch::ERROR.to_string()),
        ..Dispatch::reply(command, json!({ "code": BAD_COMMAND, "message": message }))
    }
}

async fn read_frame(stream: &mut UnixStream) -> anyhow::Result<Frame> {
    let mut header = [0u8; HEADER_LEN];
    stream.read_exact(&mut header).await?;
    let (opcode, len) = Frame::parse_header(header)?;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await?;
    Ok(Frame::new(opcode, payload))
}

async fn write_frame(stream: &mut UnixStream, frame: &Frame) -> std::io::Result<()> {
    stream.write_all(&frame.encode()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(cmd: &str, args: serde_json::Value) -> Command {
        Command {
            cmd: cmd.to_string(),
            evt: None,
            args,
            nonce: "1".to_string(),
        }
    }

    #[test]
    fn set_activity_is_reported() {
        let snapshot = PresenceSnapshot::builder().state("Lobby").build().unwrap();
        let cmd = Command::set_activity(7, Some(&snapshot.to_activity()), "1");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let reply = handle_command(&cmd, Some(&tx));
        assert_eq!(reply.cmd, Command::SET_ACTIVITY);
        assert_eq!(reply.nonce.as_deref(), Some("1"));
        assert!(reply.to_event().is_none());
        assert_eq!(rx.try_recv().unwrap(), Some(snapshot));
    }

    #[test]
    fn clear_is_reported() {
        let cmd = Command::set_activity(7, None, "1");
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle_command(&cmd, Some(&tx));
        assert_eq!(rx.try_recv().unwrap(), None);
    }

    #[test]
    fn invalid_activity_is_an_error_event() {
        let cmd = command(
            Command::SET_ACTIVITY,
            json!({ "pid": 1, "activity": { "party": { "id": "p", "size": [3, 2] } } }),
        );
        let reply = handle_command(&cmd, None);
        assert!(matches!(
            reply.to_event(),
            Some(presence_core::InboundEvent::Error { code: BAD_COMMAND, .. })
        ));
    }

    #[test]
    fn unknown_command_is_an_error_event() {
        let reply = handle_command(&command("AUTHORIZE", json!({})), None);
        match reply.to_event() {
            Some(presence_core::InboundEvent::Error { message, .. }) => {
                assert!(message.contains("AUTHORIZE"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
