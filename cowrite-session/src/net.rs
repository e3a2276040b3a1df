//! Endpoint event loops.
//!
//! One cooperative loop per endpoint multiplexes socket readiness and
//! timers; all session state lives on that loop's task and every
//! mutation happens there. Reader and writer halves of each connection
//! run as helper tasks that only shuttle packets through channels.

use std::collections::BTreeMap;
use std::io;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::buffer::{Buffer, ConnId, Outbound, CLIENT_CONN};
use crate::codec::{read_packet, write_packet};
use crate::error::SessionResult;
use crate::packet::Packet;
use crate::transport::PacketTransport;

/// A deferred action the embedder injects into a client loop; it runs
/// on the loop task with exclusive access to the buffer.
pub type ClientCommand = Box<dyn FnOnce(&mut Buffer) -> SessionResult<Vec<Outbound>> + Send>;

enum ServerInbound {
    Packet(ConnId, Packet),
    Closed(ConnId),
}

/// Runs a server (or host) buffer over a TCP listener.
///
/// When `keepalive` is set, idle frames are sent on that interval so
/// dead peers are detected by their missing reads.
pub async fn serve(
    mut buffer: Buffer,
    listener: TcpListener,
    keepalive: Option<Duration>,
) -> io::Result<()> {
    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<ServerInbound>();
    let mut writers: BTreeMap<ConnId, mpsc::UnboundedSender<Packet>> = BTreeMap::new();
    let mut next_conn: u64 = 1;

    let mut keepalive_timer =
        tokio::time::interval(keepalive.unwrap_or(Duration::from_secs(3600)));
    keepalive_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let keepalive_enabled = keepalive.is_some();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, addr) = accepted?;
                let conn = ConnId(next_conn);
                next_conn += 1;
                info!(%conn, %addr, "peer connected");

                let (mut read_half, mut write_half) = stream.into_split();

                let tx = inbound_tx.clone();
                tokio::spawn(async move {
                    loop {
                        match read_packet(&mut read_half).await {
                            Ok(Some(packet)) => {
                                if tx.send(ServerInbound::Packet(conn, packet)).is_err() {
                                    break;
                                }
                            }
                            Ok(None) => {
                                let _ = tx.send(ServerInbound::Closed(conn));
                                break;
                            }
                            Err(e) => {
                                warn!(%conn, error = %e, "read failed");
                                let _ = tx.send(ServerInbound::Closed(conn));
                                break;
                            }
                        }
                    }
                });

                let (write_tx, mut write_rx) = mpsc::unbounded_channel::<Packet>();
                tokio::spawn(async move {
                    while let Some(packet) = write_rx.recv().await {
                        if let Err(e) = write_packet(&mut write_half, &packet).await {
                            warn!(%conn, error = %e, "write failed");
                            break;
                        }
                    }
                });
                writers.insert(conn, write_tx);

                match buffer.accept_connection(conn) {
                    Ok(outs) => dispatch(&mut writers, outs),
                    Err(e) => warn!(%conn, error = %e, "accept rejected"),
                }
            }

            Some(inbound) = inbound_rx.recv() => match inbound {
                ServerInbound::Packet(conn, packet) => {
                    match buffer.handle_packet(conn, &packet) {
                        Ok(outs) => dispatch(&mut writers, outs),
                        Err(e) => {
                            // Per-connection error: log, tear down the
                            // offender, keep serving everyone else.
                            warn!(%conn, error = %e, "dropping connection");
                            let outs = buffer.connection_lost(conn);
                            writers.remove(&conn);
                            dispatch(&mut writers, outs);
                        }
                    }
                }
                ServerInbound::Closed(conn) => {
                    let outs = buffer.connection_lost(conn);
                    writers.remove(&conn);
                    dispatch(&mut writers, outs);
                }
            },

            _ = keepalive_timer.tick(), if keepalive_enabled => {
                let ping = Packet::new("ping");
                for sender in writers.values() {
                    let _ = sender.send(ping.clone());
                }
            }
        }
    }
}

fn dispatch(writers: &mut BTreeMap<ConnId, mpsc::UnboundedSender<Packet>>, outs: Vec<Outbound>) {
    for out in outs {
        match out {
            Outbound::Send(conn, packet) => {
                if let Some(sender) = writers.get(&conn) {
                    let _ = sender.send(packet);
                }
            }
            Outbound::Close(conn) => {
                // Dropping the sender ends the writer task and closes
                // the socket.
                writers.remove(&conn);
            }
        }
    }
}

/// Runs a client buffer over a connected transport until the server
/// goes away or a command returns an error.
///
/// Commands arrive through `commands` and run between packets, on the
/// loop task; their outbound packets go straight to the server.
pub async fn run_client<T: PacketTransport>(
    buffer: &mut Buffer,
    transport: &mut T,
    commands: &mut mpsc::UnboundedReceiver<ClientCommand>,
) -> SessionResult<()> {
    loop {
        tokio::select! {
            received = transport.next_packet() => {
                match received? {
                    Some(packet) => {
                        let outs = buffer.handle_packet(CLIENT_CONN, &packet)?;
                        send_all(transport, outs).await?;
                    }
                    None => {
                        info!("server closed the connection");
                        buffer.connection_lost(CLIENT_CONN);
                        return Ok(());
                    }
                }
            }
            command = commands.recv() => {
                match command {
                    Some(command) => {
                        let outs = command(buffer)?;
                        send_all(transport, outs).await?;
                    }
                    None => return Ok(()),
                }
            }
        }
    }
}

async fn send_all<T: PacketTransport>(transport: &mut T, outs: Vec<Outbound>) -> io::Result<()> {
    for out in outs {
        match out {
            Outbound::Send(_, packet) => transport.send(&packet).await?,
            Outbound::Close(_) => {}
        }
    }
    Ok(())
}
