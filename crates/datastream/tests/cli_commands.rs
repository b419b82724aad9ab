#![cfg(feature = "cli")]

use std::io;
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use datastream::frame::REASON_TOO_LARGE;
use datastream::peer::{
    ClientInit, ClientRegistered, Connection, HandshakeMessage, Handler, HeartBeat, Peer, RpcCall,
    SessionState, SteadyMessage,
};
use datastream::transport::{ByteStream, MemoryStream, SocketStream};
use datastream::value::Timestamp;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "datastream-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn datastream() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_datastream"));
    cmd.args(["--log-level", "off", "--format", "json"]);
    cmd
}

fn json_lines(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("stdout line should be JSON"))
        .collect()
}

/// Capture of what a client would receive: handshake, then one RPC.
fn session_capture() -> Vec<u8> {
    let mut writer = Peer::new(MemoryStream::new());
    writer
        .dispatch(ClientRegistered {
            core_features: 7,
            core_configured: true,
            backend_info: Vec::new(),
        })
        .expect("handshake message should encode");
    writer
        .dispatch(SessionState::default())
        .expect("handshake message should encode");
    writer.complete_handshake().expect("switch should succeed");
    writer
        .dispatch(RpcCall::new("ping", Vec::new()))
        .expect("steady message should encode");
    writer.stream_mut().take_written().to_vec()
}

#[test]
fn inspect_prints_every_message_and_summary() {
    let dir = unique_temp_dir("inspect");
    let capture = dir.join("session.bin");
    std::fs::write(&capture, session_capture()).expect("capture should be writable");

    let output = datastream()
        .arg("inspect")
        .arg(&capture)
        .arg("--switch-on-session-init")
        .output()
        .expect("inspect should run");

    assert_eq!(output.status.code(), Some(0));
    let lines = json_lines(&output);
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["name"], "ClientInitAck");
    assert_eq!(lines[0]["message"]["core_features"], 7);
    assert_eq!(lines[1]["name"], "SessionInit");
    assert_eq!(lines[2]["name"], "RpcCall");
    assert_eq!(lines[2]["phase"], "established");
    assert_eq!(lines[2]["message"]["slot_name"], "ping");
    assert_eq!(lines[3]["delivered"], 3);
    assert_eq!(lines[3]["open"], true);
    assert_eq!(lines[3]["state"], "established");
    assert_eq!(lines[3]["pending_bytes"], 0);
}

#[test]
fn inspect_without_switch_reports_protocol_error() {
    let dir = unique_temp_dir("inspect-noswitch");
    let capture = dir.join("session.bin");
    std::fs::write(&capture, session_capture()).expect("capture should be writable");

    let output = datastream()
        .arg("inspect")
        .arg(&capture)
        .output()
        .expect("inspect should run");

    assert_eq!(output.status.code(), Some(60));
    let lines = json_lines(&output);
    let summary = lines.last().expect("summary should be printed");
    assert_eq!(summary["delivered"], 2);
    assert_eq!(summary["open"], false);
    assert_eq!(summary["state"], "closed");
    assert_eq!(summary["phase"], "handshaking");
    assert_eq!(summary["protocol_errors"].as_array().map(Vec::len), Some(1));
}

#[test]
fn inspect_oversized_frame_closes() {
    let dir = unique_temp_dir("inspect-oversized");
    let capture = dir.join("oversized.bin");
    std::fs::write(&capture, 0x0050_0000u32.to_be_bytes()).expect("capture should be writable");

    let output = datastream()
        .arg("inspect")
        .arg(&capture)
        .output()
        .expect("inspect should run");

    assert_eq!(output.status.code(), Some(60));
    let lines = json_lines(&output);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["close_reason"], REASON_TOO_LARGE);
}

#[test]
fn inspect_missing_file_is_usage_error() {
    let output = datastream()
        .arg("inspect")
        .arg("/definitely/not/here.bin")
        .output()
        .expect("inspect should run");
    assert_eq!(output.status.code(), Some(64));
}

/// Answers the first ClientInit with ClientRegistered.
struct FakeCore;

impl<S: ByteStream> Handler<S> for FakeCore {
    fn handle_handshake(&mut self, conn: &mut Connection<S>, message: HandshakeMessage) {
        if let HandshakeMessage::ClientInit(_) = message {
            conn.dispatch(ClientRegistered {
                core_features: 7,
                core_configured: true,
                backend_info: Vec::new(),
            })
            .expect("reply should send");
        }
    }

    fn handle_message(&mut self, _conn: &mut Connection<S>, _message: SteadyMessage) {}
}

#[test]
fn probe_prints_core_answer() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let addr = listener.local_addr().expect("listener should have an address");

    let core = thread::spawn(move || {
        let (socket, _) = listener.accept().expect("probe should connect");
        let mut peer = Peer::new(SocketStream::from_tcp(socket).expect("socket should wrap"));
        while peer.is_open() {
            peer.stream_mut().fill().expect("read should succeed");
            peer.on_readable(&mut FakeCore);
        }
    });

    let output = datastream()
        .arg("probe")
        .arg(addr.to_string())
        .args(["--client-version", "test-1", "--timeout", "3s"])
        .output()
        .expect("probe should run");

    assert_eq!(output.status.code(), Some(0));
    let lines = json_lines(&output);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["name"], "ClientInitAck");
    assert_eq!(lines[0]["message"]["core_configured"], true);

    core.join().expect("core thread should finish");
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .expect("free port should be available")
}

fn wait_for_connect(addr: &str, timeout: Duration) -> io::Result<TcpStream> {
    let start = Instant::now();
    loop {
        match TcpStream::connect(addr) {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                if start.elapsed() >= timeout {
                    return Err(io::Error::other(format!("connect timeout: {err}")));
                }
                thread::sleep(Duration::from_millis(25));
            }
        }
    }
}

#[derive(Default)]
struct Collect(Vec<SteadyMessage>);

impl<S: ByteStream> Handler<S> for Collect {
    fn handle_handshake(&mut self, _conn: &mut Connection<S>, _message: HandshakeMessage) {}

    fn handle_message(&mut self, _conn: &mut Connection<S>, message: SteadyMessage) {
        self.0.push(message);
    }
}

#[test]
fn listen_establishes_and_answers_heartbeat() {
    let addr = format!("127.0.0.1:{}", free_port());
    let child = datastream()
        .arg("listen")
        .arg(&addr)
        .args(["--count", "3"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("listen should start");

    let socket = wait_for_connect(&addr, Duration::from_secs(3)).expect("client should connect");
    let mut client = Peer::new(SocketStream::from_tcp(socket).expect("socket should wrap"));
    client
        .dispatch(ClientInit::new("test"))
        .expect("ClientInit should send");
    client
        .dispatch(SessionState::default())
        .expect("SessionInit should send");
    client.complete_handshake().expect("switch should succeed");
    let beat = HeartBeat::new(Timestamp::from_millis(1_700_000_000_000));
    client.dispatch(beat).expect("heartbeat should send");

    let mut replies = Collect::default();
    while replies.0.is_empty() && client.is_open() {
        client.stream_mut().fill().expect("read should succeed");
        client.on_readable(&mut replies);
    }
    assert_eq!(replies.0, vec![SteadyMessage::from(beat.reply())]);

    let output = child.wait_with_output().expect("listen should exit");
    assert_eq!(output.status.code(), Some(0));
    let lines = json_lines(&output);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["name"], "ClientInit");
    assert_eq!(lines[1]["name"], "SessionInit");
    assert_eq!(lines[2]["name"], "HeartBeat");
    assert_eq!(lines[2]["phase"], "established");
}
