//! IPC transport against an in-process stub companion.

#![cfg(unix)]

use presence_client::{IpcTransport, SyncConfig, SyncEngine, Transport};
use presence_core::{
    AssetRef, CloseReason, Command, ConnectError, ConnectionState, Dispatch, Frame, HEADER_LEN,
    Handshake, InboundEvent, Opcode, PresenceSnapshot, Ready, SendError,
};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

const WAIT: Duration = Duration::from_secs(5);

async fn read_frame(stream: &mut UnixStream) -> std::io::Result<Frame> {
    let mut header = [0u8; HEADER_LEN];
    stream.read_exact(&mut header).await?;
    let (opcode, len) = Frame::parse_header(header)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await?;
    Ok(Frame::new(opcode, payload))
}

async fn write_frame(stream: &mut UnixStream, frame: &Frame) {
    stream.write_all(&frame.encode()).await.unwrap();
}

/// Accept one client and answer its handshake with READY at `version`.
async fn accept(listener: &UnixListener, version: u32) -> UnixStream {
    let (mut stream, _) = listener.accept().await.unwrap();
    let hello = read_frame(&mut stream).await.unwrap();
    assert_eq!(hello.opcode, Opcode::Handshake);
    let hello: Handshake = hello.parse().unwrap();
    assert_eq!(hello.client_id, "app");

    let ready = Dispatch::ready(&Ready {
        v: version,
        user: None,
    });
    write_frame(&mut stream, &ready.to_frame().unwrap()).await;
    stream
}

fn setup() -> (tempfile::TempDir, PathBuf, UnixListener, SyncConfig) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("presence-ipc-0");
    let listener = UnixListener::bind(&path).unwrap();
    let config = SyncConfig::new("app")
        .with_socket_path(&path)
        .with_connect_timeout(Duration::from_secs(2))
        .with_close_timeout(Duration::from_millis(500));
    (dir, path, listener, config)
}

async fn poll_until<T: Transport>(transport: &mut T) -> Vec<InboundEvent> {
    tokio::time::timeout(WAIT, async {
        loop {
            let events: Vec<_> = transport.poll().collect();
            if !events.is_empty() {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("no events arrived")
}

#[tokio::test]
async fn snapshot_reaches_companion_intact() {
    let (_dir, _path, listener, config) = setup();

    let companion = tokio::spawn(async move {
        let mut stream = accept(&listener, 1).await;
        loop {
            let frame = read_frame(&mut stream).await.unwrap();
            let command: Command = frame.parse().unwrap();
            if let Some(activity) = command.activity().unwrap() {
                return PresenceSnapshot::from_activity(activity).unwrap();
            }
        }
    });

    let snapshot = PresenceSnapshot::builder()
        .details("Capture the Flag")
        .state("Blue team")
        .start_time(1_700_000_000)
        .large_image("map_canyon", "Canyon")
        .party("party-42", 3, 8)
        .join_secret("join-42")
        .build()
        .unwrap();

    let mut engine = SyncEngine::new(IpcTransport::new(&config), &config);
    engine.set_presence(snapshot.clone()).unwrap();
    engine.tick().await;
    assert_eq!(engine.state(), ConnectionState::Connected);

    let received = tokio::time::timeout(WAIT, companion).await.unwrap().unwrap();
    assert_eq!(received, snapshot);
    engine.close().await;
}

#[tokio::test]
async fn hand_built_snapshot_arrives_normalized() {
    let (_dir, _path, listener, config) = setup();

    let companion = tokio::spawn(async move {
        let mut stream = accept(&listener, 1).await;
        loop {
            let frame = read_frame(&mut stream).await.unwrap();
            let command: Command = frame.parse().unwrap();
            if command.cmd == Command::SET_ACTIVITY {
                return command.args["activity"].clone();
            }
        }
    });

    let raw = PresenceSnapshot {
        details: "d".into(),
        start_time: Some(0),
        assets: Some(AssetRef::default()),
        ..Default::default()
    };
    let mut engine = SyncEngine::new(IpcTransport::new(&config), &config);
    engine.set_presence(raw).unwrap();
    engine.tick().await;

    let activity = tokio::time::timeout(WAIT, companion).await.unwrap().unwrap();
    assert_eq!(activity, json!({ "details": "d", "instance": false }));
    let received =
        PresenceSnapshot::from_activity(serde_json::from_value(activity).unwrap()).unwrap();
    assert_eq!(Some(&received), engine.last_sent());
    engine.close().await;
}

#[tokio::test]
async fn subscribes_after_handshake() {
    let (_dir, _path, listener, config) = setup();

    let companion = tokio::spawn(async move {
        let mut stream = accept(&listener, 1).await;
        let mut events = Vec::new();
        for _ in 0..3 {
            let command: Command = read_frame(&mut stream).await.unwrap().parse().unwrap();
            assert_eq!(command.cmd, Command::SUBSCRIBE);
            events.extend(command.evt);
        }
        events
    });

    let mut transport = IpcTransport::new(&config);
    transport.connect().await.unwrap();

    let events = tokio::time::timeout(WAIT, companion).await.unwrap().unwrap();
    assert_eq!(
        events,
        vec![
            Dispatch::ACTIVITY_JOIN,
            Dispatch::ACTIVITY_SPECTATE,
            Dispatch::ACTIVITY_JOIN_REQUEST
        ]
    );
    transport.close().await;
}

#[tokio::test]
async fn version_mismatch_is_reported() {
    let (_dir, _path, listener, config) = setup();
    let companion = tokio::spawn(async move { accept(&listener, 2).await });

    let mut transport = IpcTransport::new(&config);
    let err = transport.connect().await.unwrap_err();
    assert!(matches!(err, ConnectError::ProtocolMismatch(_)), "{err}");
    assert!(!transport.is_connected());
    companion.await.unwrap();
}

#[tokio::test]
async fn refused_handshake_is_mismatch() {
    let (_dir, _path, listener, config) = setup();
    let companion = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_frame(&mut stream).await.unwrap();
        let close = CloseReason::new(4000, "Invalid Client ID").to_frame().unwrap();
        write_frame(&mut stream, &close).await;
        stream
    });

    let mut transport = IpcTransport::new(&config);
    let err = transport.connect().await.unwrap_err();
    match err {
        ConnectError::ProtocolMismatch(message) => assert!(message.contains("Invalid Client ID")),
        other => panic!("unexpected {other:?}"),
    }
    companion.await.unwrap();
}

#[tokio::test]
async fn silent_companion_times_out_as_unavailable() {
    let (_dir, _path, listener, config) = setup();
    let config = config.with_connect_timeout(Duration::from_millis(200));
    let companion = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(stream);
    });

    let mut transport = IpcTransport::new(&config);
    assert!(matches!(
        transport.connect().await,
        Err(ConnectError::Unavailable(_))
    ));
    companion.abort();
}

#[tokio::test]
async fn companion_hangup_yields_one_disconnect() {
    let (_dir, _path, listener, config) = setup();
    let companion = tokio::spawn(async move {
        let stream = accept(&listener, 1).await;
        drop(stream);
    });

    let mut transport = IpcTransport::new(&config);
    transport.connect().await.unwrap();
    companion.await.unwrap();

    let events = poll_until(&mut transport).await;
    assert_eq!(
        events,
        vec![InboundEvent::ConnectionChanged {
            state: ConnectionState::Disconnected
        }]
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.poll().count(), 0);
    let frame = Frame::new(Opcode::Ping, Vec::new());
    assert_eq!(transport.send(frame), Err(SendError::NotConnected));
    transport.close().await;
}

#[tokio::test]
async fn join_request_is_forwarded() {
    let (_dir, _path, listener, config) = setup();
    let companion = tokio::spawn(async move {
        let mut stream = accept(&listener, 1).await;
        let request = Dispatch::event(
            Dispatch::ACTIVITY_JOIN_REQUEST,
            json!({ "user": { "id": "42", "username": "friend" } }),
        );
        write_frame(&mut stream, &request.to_frame().unwrap()).await;
        stream
    });

    let mut transport = IpcTransport::new(&config);
    transport.connect().await.unwrap();

    let events = poll_until(&mut transport).await;
    match &events[..] {
        [InboundEvent::JoinRequest { user }] => assert_eq!(user.username, "friend"),
        other => panic!("unexpected {other:?}"),
    }
    transport.close().await;
    drop(companion);
}

#[tokio::test]
async fn ping_is_answered() {
    let (_dir, _path, listener, config) = setup();
    let companion = tokio::spawn(async move {
        let mut stream = accept(&listener, 1).await;
        write_frame(&mut stream, &Frame::new(Opcode::Ping, b"\"beat\"".to_vec())).await;
        loop {
            let frame = read_frame(&mut stream).await.unwrap();
            if frame.opcode == Opcode::Pong {
                return frame.payload;
            }
        }
    });

    let mut transport = IpcTransport::new(&config);
    transport.connect().await.unwrap();

    let payload = tokio::time::timeout(WAIT, companion).await.unwrap().unwrap();
    assert_eq!(payload, b"\"beat\"");
    transport.close().await;
}

#[tokio::test]
async fn close_says_goodbye() {
    let (_dir, _path, listener, config) = setup();
    let companion = tokio::spawn(async move {
        let mut stream = accept(&listener, 1).await;
        loop {
            match read_frame(&mut stream).await {
                Ok(frame) if frame.opcode == Opcode::Close => return true,
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
    });

    let mut transport = IpcTransport::new(&config);
    transport.connect().await.unwrap();
    transport.close().await;
    transport.close().await;

    assert!(tokio::time::timeout(WAIT, companion).await.unwrap().unwrap());
    assert_eq!(transport.poll().count(), 0);
}
