// End-to-end test of a bridge between a fake player and a real relay.
//
// The fake player is a Unix socket listener in a temp dir that answers the
// way the real player would. A second relay peer is a plain TCP socket that
// stands in for another participant.

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::TcpStream;
use std::os::unix::net::{UnixListener, UnixStream};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use mpv_sync::client;
use mpv_sync::config::{BridgeConfig, RelayConfig};
use mpv_sync::server::Relay;

struct FakePlayer {
    reader: BufReader<UnixStream>,
    writer: UnixStream,
}

impl FakePlayer {
    fn accept(listener: &UnixListener) -> FakePlayer {
        let (stream, _) = listener.accept().unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        FakePlayer {
            reader: BufReader::new(stream.try_clone().unwrap()),
            writer: stream,
        }
    }

    fn recv(&mut self) -> Value {
        let mut line = String::new();
        self.reader.read_line(&mut line).unwrap();
        serde_json::from_str(&line).unwrap()
    }

    fn send(&mut self, message: Value) {
        let mut line = message.to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).unwrap();
    }
}

fn recv_line(reader: &mut BufReader<TcpStream>) -> Option<String> {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => None,
        Err(e) => panic!("unexpected read error: {e}"),
    }
}

#[test]
fn remote_commands_are_applied_and_their_echoes_suppressed() {
    let relay = Relay::bind(&RelayConfig {
        bind: "127.0.0.1".into(),
        port: 0,
        ..RelayConfig::default()
    })
    .unwrap();
    let relay_addr = relay.local_addr().unwrap();
    let peers = relay.peers();
    relay.spawn();

    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("player.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();

    let config = BridgeConfig {
        relay_addr: relay_addr.to_string(),
        socket_path: Some(socket_path),
        launch_player: false,
        ..BridgeConfig::default()
    };
    thread::spawn(move || client::run(config));

    let mut player = FakePlayer::accept(&listener);
    assert_eq!(
        player.recv(),
        json!({"command": ["observe_property", 1, "pause"]})
    );

    let remote = TcpStream::connect(relay_addr).unwrap();
    remote
        .set_read_timeout(Some(Duration::from_secs(1)))
        .unwrap();
    let mut remote_reader = BufReader::new(remote.try_clone().unwrap());
    let mut remote_writer = remote;

    let deadline = Instant::now() + Duration::from_secs(5);
    while peers.len() < 2 {
        assert!(Instant::now() < deadline, "bridge never joined the relay");
        thread::sleep(Duration::from_millis(10));
    }

    // Remote pause: applied locally, echo swallowed.
    remote_writer.write_all(b"true\n").unwrap();
    assert_eq!(
        player.recv(),
        json!({"command": ["set_property", "pause", true]})
    );
    player.send(json!({"request_id": 0, "error": "success"}));
    player.send(json!({"event": "property-change", "id": 1, "name": "pause", "data": true}));

    // Remote seek: applied locally, the position query round trip is
    // consumed inside the bridge.
    remote_writer.write_all(b"12.500000\n").unwrap();
    assert_eq!(player.recv(), json!({"command": ["seek", 12.5, "absolute"]}));
    player.send(json!({"request_id": 0, "error": "success"}));
    player.send(json!({"event": "seek"}));
    assert_eq!(
        player.recv(),
        json!({"command": ["get_property", "time-pos"], "request_id": 1})
    );
    player.send(json!({"data": 12.5, "request_id": 1, "error": "success"}));

    // A genuine local unpause goes out exactly once.
    player.send(json!({"event": "property-change", "id": 1, "name": "pause", "data": false}));
    assert_eq!(recv_line(&mut remote_reader).as_deref(), Some("false\n"));
    assert_eq!(recv_line(&mut remote_reader), None);
}
