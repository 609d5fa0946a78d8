use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;

use crate::consts::T_WINDOW_RETX;
use crate::err::{Error, Result};
use crate::net::packet::{Flags, GbnPacket};
use crate::net::{GbnSocket, Packet, SawSocket, SequenceNumber};

/// Closing handshake performed by whichever side *sent* the bulk data
/// (the uploader on a client, the downloader's server).
///
/// For SAW, the transfer engine's last send was the FIN chunk, which the
/// socket wrapper remembers as "last sent" — simply waiting again lets it
/// retransmit that same FIN chunk on timeout, so this reduces to "wait for
/// the peer's FIN-or-ACK, then send one last courtesy ACK". Loss of the
/// peer's reply is tolerated: by this point every byte has already been
/// delivered and accepted, so there is nothing left to retry for.
pub fn close_as_sender_saw(socket: &mut SawSocket, peer: SocketAddr, seq: &mut SequenceNumber, should_stop: &AtomicBool) -> Result<()> {
    match socket.recv_from(true, should_stop) {
        Ok(Some((bytes, _addr))) => {
            let pkt = Packet::decode(&bytes)?;
            if !pkt.is_fin() && !pkt.is_ack() {
                return Err(Error::NotFinNorAck);
            }
        }
        Ok(None) | Err(Error::ConnectionLost) => {}
        Err(e) => return Err(e),
    }

    seq.step();
    let port = socket.local_addr()?.port();
    let pkt = crate::session::build_packet(
        crate::net::Protocol::Saw,
        seq,
        port,
        Flags { is_ack: true, is_syn: false, is_fin: false },
        Vec::new(),
    );
    // Best-effort: the peer has already received everything it needs.
    let _ = socket.send_to(&pkt.encode(), peer);
    Ok(())
}

/// Closing handshake performed by whichever side *received* the bulk data
/// (the downloader on a client, the uploader's server). The receive
/// engine already answered the FIN chunk with a FIN-ACK; this just waits
/// briefly, tolerantly, for the sender's closing courtesy ACK.
pub fn close_as_receiver_saw(socket: &mut SawSocket, should_stop: &AtomicBool) -> Result<()> {
    match socket.recv_from(true, should_stop) {
        Ok(_) | Err(Error::ConnectionLost) => Ok(()),
        Err(e) => Err(e),
    }
}

pub fn close_as_sender_gbn(socket: &GbnSocket, peer: SocketAddr, port: u16) -> Result<()> {
    let pkt = Packet::Gbn(GbnPacket {
        flags: Flags { is_ack: true, is_syn: false, is_fin: false },
        port,
        sequence_number: 0,
        ack_number: 0,
        data: Vec::new(),
    });
    let _ = socket.send_to(&pkt.encode(), peer);
    Ok(())
}

pub fn close_as_receiver_gbn(socket: &GbnSocket, should_stop: &AtomicBool) -> Result<()> {
    match socket.recv_from(Some(T_WINDOW_RETX), should_stop) {
        Ok(_) | Err(Error::RetransmissionNeeded) => Ok(()),
        Err(e) => Err(e),
    }
}
