use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use crate::err::{Error, Result};
use crate::net::packet::Flags;
use crate::net::{Packet, Protocol, SawSocket, SequenceNumber};
use crate::server::pool::ClientPool;
use crate::server::worker;
use crate::server::ServerConfig;

/// Owns the welcoming socket. Never touches an active session's socket;
/// each accepted peer gets its own ephemeral endpoint handed to a freshly
/// spawned worker thread.
pub fn run(cfg: &ServerConfig, should_stop: Arc<AtomicBool>) -> Result<()> {
    let welcoming_addr = (cfg.host.as_str(), cfg.port)
        .to_socket_addrs()?
        .next()
        .ok_or(Error::CannotBindSocket)?;
    let mut welcoming = SawSocket::new(UdpSocket::bind(welcoming_addr)?);
    let bind_ip = welcoming.local_addr()?.ip();

    let mut pool = ClientPool::new();
    let (done_tx, done_rx) = mpsc::channel::<SocketAddr>();

    log::info!("listening on {welcoming_addr} for {} sessions", cfg.protocol);

    loop {
        while let Ok(addr) = done_rx.try_recv() {
            pool.remove(addr);
        }

        if should_stop.load(Ordering::Relaxed) {
            return Ok(());
        }

        let (bytes, peer) = match welcoming.recv_from(false, &should_stop) {
            Ok(Some(datagram)) => datagram,
            Ok(None) => continue,
            Err(Error::SocketShutdown) => return Ok(()),
            Err(e) => {
                log::warn!("accepter recv error: {e}");
                continue;
            }
        };

        let pkt = match Packet::decode(&bytes) {
            Ok(pkt) => pkt,
            Err(_) => continue,
        };

        if !pkt.is_syn() || !pkt.data().is_empty() {
            log::debug!("discarding non-SYN datagram from {peer}: {}", Error::NotSyn);
            continue;
        }
        if pool.contains(peer) {
            log::debug!("discarding duplicate SYN from {peer}: {}", Error::ClientAlreadyConnected);
            continue;
        }

        let peer_protocol = match pkt {
            Packet::Gbn(_) => Protocol::Gbn,
            Packet::Saw(_) => Protocol::Saw,
        };
        if peer_protocol != cfg.protocol {
            let refusal = Packet::Saw(crate::net::packet::SawPacket {
                flags: Flags { is_ack: false, is_syn: false, is_fin: true },
                seq_bit: 0,
                port: welcoming_addr.port(),
                data: Vec::new(),
            });
            let _ = welcoming.send_to(&refusal.encode(), peer);
            continue;
        }

        if let Err(e) = accept_session(&mut welcoming, bind_ip, peer, cfg, &mut pool, &should_stop, &done_tx) {
            log::warn!("handshake with {peer} failed: {e}");
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn accept_session(
    welcoming: &mut SawSocket,
    bind_ip: std::net::IpAddr,
    peer: SocketAddr,
    cfg: &ServerConfig,
    pool: &mut ClientPool,
    should_stop: &Arc<AtomicBool>,
    done_tx: &mpsc::Sender<SocketAddr>,
) -> Result<()> {
    let mut session_socket = SawSocket::new(UdpSocket::bind((bind_ip, 0))?);
    let session_port = session_socket.local_addr()?.port();
    let seq = match cfg.protocol {
        Protocol::Saw => SequenceNumber::new_saw(),
        Protocol::Gbn => SequenceNumber::new_gbn(),
    };

    let syn_ack = crate::session::build_packet(
        cfg.protocol,
        &seq,
        session_port,
        Flags { is_ack: true, is_syn: true, is_fin: false },
        Vec::new(),
    );
    session_socket.send_to(&syn_ack.encode(), peer)?;

    // Sent through the session socket, not the welcoming one: this is the
    // same socket the worker below calls recv_from on, so a lost SYN+ACK
    // is covered by the ordinary last_sent/retransmit_last retry path the
    // worker's first recv_request timeout already drives. The welcoming
    // socket never sees this peer again until the session ends.
    pool.insert(peer);

    let protocol = cfg.protocol;
    let storage_dir = cfg.storage_dir.clone();
    let worker_stop = should_stop.clone();
    let tx = done_tx.clone();

    thread::spawn(move || {
        let result = worker::run(session_socket, peer, session_port, protocol, seq, storage_dir, &worker_stop);
        if let Err(e) = result {
            log::warn!("session with {peer} ended: {e}");
        }
        let _ = tx.send(peer);
    });

    Ok(())
}
