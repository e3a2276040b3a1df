//! Smoke tests for the TCP event loops: a real listener, a real
//! client transport, the full login exchange over the wire.

use std::time::Duration;

use cowrite_session::{
    net, Buffer, Outbound, PacketTransport, ServerConfig, TcpPacketTransport, CLIENT_CONN,
    PROTOCOL_VERSION,
};
use cowrite_types::Colour;
use tokio::net::TcpListener;

async fn spawn_server(keepalive: Option<Duration>) -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let buffer = Buffer::server(ServerConfig::default());
    let handle = tokio::spawn(async move {
        let _ = net::serve(buffer, listener, keepalive).await;
    });
    (addr, handle)
}

async fn send_all<T: PacketTransport>(transport: &mut T, outs: Vec<Outbound>) {
    for out in outs {
        if let Outbound::Send(_, packet) = out {
            transport.send(&packet).await.unwrap();
        }
    }
}

#[tokio::test]
async fn server_greets_with_welcome() {
    let (addr, server) = spawn_server(None).await;
    let mut transport = TcpPacketTransport::connect(&addr).await.unwrap();

    let welcome = transport.next_packet().await.unwrap().unwrap();
    assert_eq!(welcome.command(), "welcome");
    assert_eq!(welcome.param_u32(0).unwrap(), PROTOCOL_VERSION);
    assert!(!welcome.param(1).unwrap().is_empty());

    server.abort();
}

#[tokio::test]
async fn login_over_real_sockets() {
    let (addr, server) = spawn_server(None).await;
    let mut transport = TcpPacketTransport::connect(&addr).await.unwrap();
    let mut buffer = Buffer::client();

    let outs = buffer
        .login("alice", Colour::new(255, 0, 0), None, None)
        .unwrap();
    send_all(&mut transport, outs).await;

    // welcome triggers the stored login; pump packets until the join
    // broadcast lands.
    while !buffer.is_logged_in() {
        let packet = transport
            .next_packet()
            .await
            .unwrap()
            .expect("server stays up");
        let outs = buffer.handle_packet(CLIENT_CONN, &packet).unwrap();
        send_all(&mut transport, outs).await;
    }

    assert!(buffer.self_user().is_some());
    assert_eq!(buffer.users().connected().count(), 1);

    server.abort();
}

#[tokio::test]
async fn keepalive_pings_idle_connections() {
    let (addr, server) = spawn_server(Some(Duration::from_millis(20))).await;
    let mut transport = TcpPacketTransport::connect(&addr).await.unwrap();

    let welcome = transport.next_packet().await.unwrap().unwrap();
    assert_eq!(welcome.command(), "welcome");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let packet = tokio::time::timeout_at(deadline, transport.next_packet())
            .await
            .expect("keepalive within deadline")
            .unwrap()
            .expect("connection stays open");
        if packet.command() == "ping" {
            break;
        }
    }

    server.abort();
}

#[tokio::test]
async fn run_client_drives_a_login() {
    let (addr, server) = spawn_server(None).await;
    let mut transport = TcpPacketTransport::connect(&addr).await.unwrap();
    let mut buffer = Buffer::client();
    let (commands_tx, mut commands_rx) = tokio::sync::mpsc::unbounded_channel::<net::ClientCommand>();

    commands_tx
        .send(Box::new(|buffer: &mut Buffer| {
            buffer.login("bob", Colour::new(0, 0, 255), None, None)
        }))
        .unwrap();

    // The loop runs until the timeout fires; a localhost login takes
    // a few round trips at most.
    let client = net::run_client(&mut buffer, &mut transport, &mut commands_rx);
    tokio::select! {
        result = client => result.unwrap(),
        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
    }

    assert!(buffer.is_logged_in());
    drop(commands_tx);
    server.abort();
}
