use std::net::{TcpListener, TcpStream};
use std::thread;

use datastream_peer::{
    ClientInit, ClientRegistered, Connection, ConnectionPhase, HandshakeMessage, Handler, HeartBeat,
    InitData, InitRequest, Login, LoginSuccess, Peer, RpcCall, SessionState, SteadyMessage,
};
use datastream_transport::{ByteStream, MemoryStream, SocketStream};
use datastream_value::{Timestamp, Value, ValueMap};

/// Plays the core side: accepts any client and any login.
#[derive(Default)]
struct Core {
    seen: Vec<String>,
    requests: Vec<SteadyMessage>,
}

impl<S: ByteStream> Handler<S> for Core {
    fn handle_handshake(&mut self, conn: &mut Connection<S>, message: HandshakeMessage) {
        self.seen.push(message.msg_type().to_string());
        match message {
            HandshakeMessage::ClientInit(_) => conn
                .dispatch(ClientRegistered {
                    core_features: 7,
                    core_configured: true,
                    backend_info: Vec::new(),
                })
                .unwrap(),
            HandshakeMessage::Login(_) => {
                conn.dispatch(LoginSuccess).unwrap();
                conn.dispatch(SessionState {
                    network_ids: vec![Value::I32(1)],
                    ..SessionState::default()
                })
                .unwrap();
                conn.complete_handshake().unwrap();
            }
            _ => {}
        }
    }

    fn handle_message(&mut self, conn: &mut Connection<S>, message: SteadyMessage) {
        match &message {
            SteadyMessage::InitRequest(req) => {
                let mut state = ValueMap::new();
                state.insert("networkName".into(), Value::from("Libera"));
                conn.dispatch(InitData::new(req.class_name.clone(), req.object_name.clone(), state))
                    .unwrap();
            }
            SteadyMessage::HeartBeat(beat) => conn.dispatch(beat.reply()).unwrap(),
            _ => {}
        }
        self.requests.push(message);
    }
}

/// Plays the client side: records everything, switches on SessionInit.
#[derive(Default)]
struct Client {
    handshakes: Vec<HandshakeMessage>,
    messages: Vec<SteadyMessage>,
}

impl<S: ByteStream> Handler<S> for Client {
    fn handle_handshake(&mut self, conn: &mut Connection<S>, message: HandshakeMessage) {
        if matches!(message, HandshakeMessage::SessionState(_)) {
            conn.complete_handshake().unwrap();
        }
        self.handshakes.push(message);
    }

    fn handle_message(&mut self, _conn: &mut Connection<S>, message: SteadyMessage) {
        self.messages.push(message);
    }
}

fn pump(from: &mut Peer<MemoryStream>, to: &mut Peer<MemoryStream>) {
    let bytes = from.stream_mut().take_written();
    to.stream_mut().feed(bytes);
}

#[test]
fn full_session_over_memory_streams() {
    let mut client = Peer::new(MemoryStream::new());
    let mut core = Peer::new(MemoryStream::new());
    let mut client_handler = Client::default();
    let mut core_handler = Core::default();

    client.dispatch(ClientInit::new("v0.13")).unwrap();
    pump(&mut client, &mut core);
    assert_eq!(core.on_readable(&mut core_handler), 1);

    pump(&mut core, &mut client);
    assert_eq!(client.on_readable(&mut client_handler), 1);
    assert!(matches!(
        client_handler.handshakes[0],
        HandshakeMessage::ClientRegistered(ClientRegistered {
            core_features: 7,
            core_configured: true,
            ..
        })
    ));

    client
        .dispatch(Login {
            user: "alice".into(),
            password: "secret".into(),
        })
        .unwrap();
    pump(&mut client, &mut core);
    assert_eq!(core.on_readable(&mut core_handler), 1);
    assert_eq!(core.phase(), ConnectionPhase::Established);
    assert_eq!(core_handler.seen, vec!["ClientInit", "ClientLogin"]);

    pump(&mut core, &mut client);
    assert_eq!(client.on_readable(&mut client_handler), 2);
    assert_eq!(client.phase(), ConnectionPhase::Established);

    client.dispatch(InitRequest::new("Network", "1")).unwrap();
    client.dispatch(RpcCall::new("ping", Vec::new())).unwrap();
    pump(&mut client, &mut core);
    assert_eq!(core.on_readable(&mut core_handler), 2);
    assert_eq!(
        core_handler.requests[1],
        SteadyMessage::from(RpcCall::new("ping", Vec::new()))
    );

    pump(&mut core, &mut client);
    assert_eq!(client.on_readable(&mut client_handler), 1);
    match &client_handler.messages[0] {
        SteadyMessage::InitData(data) => {
            assert_eq!(data.class_name.as_ref(), b"Network");
            assert_eq!(data.object_name, "1");
            assert_eq!(data.init_data["networkName"], Value::from("Libera"));
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[test]
fn rpc_call_wire_bytes() {
    let mut peer = Peer::new(MemoryStream::new());
    peer.complete_handshake().unwrap();
    peer.dispatch(RpcCall::new("ping", Vec::new())).unwrap();

    let written = peer.stream_mut().take_written();
    // frame length, element count 2, i16 tag 1, bytes "ping"
    let expected: &[u8] = &[
        0, 0, 0, 16, //
        0, 0, 0, 2, //
        0x02, 0, 1, //
        0x09, 0, 0, 0, 4, b'p', b'i', b'n', b'g',
    ];
    assert_eq!(written.as_ref(), expected);
}

#[test]
fn heartbeat_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (socket, _) = listener.accept().unwrap();
        let mut peer = Peer::new(SocketStream::from_tcp(socket).unwrap());
        peer.complete_handshake().unwrap();
        let mut core = Core::default();
        while core.requests.is_empty() && peer.is_open() {
            peer.stream_mut().fill().unwrap();
            peer.on_readable(&mut core);
        }
        core.requests
    });

    let mut client = Peer::new(SocketStream::from_tcp(TcpStream::connect(addr).unwrap()).unwrap());
    client.complete_handshake().unwrap();
    let beat = HeartBeat::new(Timestamp::from_millis(1_700_000_000_000));
    client.dispatch(beat).unwrap();

    let mut handler = Client::default();
    while handler.messages.is_empty() && client.is_open() {
        client.stream_mut().fill().unwrap();
        client.on_readable(&mut handler);
    }

    assert_eq!(handler.messages, vec![SteadyMessage::from(beat.reply())]);
    assert_eq!(server.join().unwrap(), vec![SteadyMessage::from(beat)]);
}
