use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;

use sha2::{Digest, Sha256};

use crate::consts::SAW_CHUNK_SIZE;
use crate::err::{Error, Result};
use crate::fs::{FileHandle, FileStore};
use crate::net::packet::{Flags, SawPacket};
use crate::net::retry::{self, is_frame_level};
use crate::net::{Packet, SawSocket, SequenceNumber};

fn chunk_digest(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    format!("{digest:x}")[..10].to_string()
}

fn send_control(socket: &mut SawSocket, peer: SocketAddr, port: u16, seq: &SequenceNumber, flags: Flags) -> Result<()> {
    let pkt = Packet::Saw(SawPacket {
        flags,
        seq_bit: seq.value() as u8,
        port,
        data: Vec::new(),
    });
    socket.send_to(&pkt.encode(), peer)
}

/// Stop-and-wait bulk send: one chunk in flight at a time, waiting for the
/// matching ACK before moving on. Returns as soon as the FIN chunk has
/// been sent; the caller is responsible for the closing handshake.
pub fn send_file(
    socket: &mut SawSocket,
    peer: SocketAddr,
    port: u16,
    seq: &mut SequenceNumber,
    store: &FileStore,
    handle: &mut FileHandle,
    total_chunks: u64,
    should_stop: &AtomicBool,
) -> Result<()> {
    for chunk_index in 1..=total_chunks.max(1) {
        let chunk = store.read(handle, SAW_CHUNK_SIZE)?;
        let is_fin = chunk_index == total_chunks.max(1);

        seq.step();
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("sending chunk {chunk_index}/{total_chunks}, hash {}", chunk_digest(&chunk));
        }

        let pkt = Packet::Saw(SawPacket {
            flags: Flags {
                is_ack: false,
                is_syn: false,
                is_fin,
            },
            seq_bit: seq.value() as u8,
            port,
            data: chunk,
        });
        socket.send_to(&pkt.encode(), peer)?;

        if is_fin {
            return Ok(());
        }

        wait_for_ack(socket, seq, should_stop)?;
    }
    Ok(())
}

/// A stray malformed or out-of-place frame here does not mean the session
/// is dead, just that this one datagram was noise; `re_listen` keeps
/// listening on those instead of failing the whole transfer.
fn wait_for_ack(socket: &mut SawSocket, seq: &SequenceNumber, should_stop: &AtomicBool) -> Result<()> {
    retry::re_listen(&[is_frame_level], || loop {
        let (bytes, _addr) = socket
            .recv_from(true, should_stop)?
            .ok_or(Error::ConnectionLost)?;
        let pkt = Packet::decode(&bytes)?;

        if pkt.is_fin() {
            return Err(Error::UnexpectedFin);
        }
        if !pkt.is_ack() {
            return Err(Error::NotAck);
        }
        if pkt.sequence_value() != seq.value() {
            // Stale duplicate ack for a prior chunk; keep listening.
            continue;
        }
        return Ok(());
    })
}

/// Stop-and-wait bulk receive: appends each in-order chunk, ACKs it, and
/// replies with a FIN-ACK once the terminating chunk arrives. A duplicate
/// of the previously accepted chunk is re-acked without appending.
pub fn receive_file(
    socket: &mut SawSocket,
    peer: SocketAddr,
    port: u16,
    seq: &mut SequenceNumber,
    store: &FileStore,
    handle: &mut FileHandle,
    first_chunk: Option<Packet>,
    should_stop: &AtomicBool,
) -> Result<u64> {
    let mut total_bytes = 0u64;
    let mut chunk_number = 0u64;

    // A non-empty ACK answering the download metadata request may already
    // carry the first chunk (§4.5), saving a round trip. Consume it before
    // entering the normal receive loop.
    if let Some(pkt) = first_chunk {
        if !pkt.data().is_empty() || pkt.is_fin() {
            seq.step();
            chunk_number += 1;
            total_bytes += pkt.data().len() as u64;
            store.append(handle, pkt.data())?;
            if pkt.is_fin() {
                send_control(socket, peer, port, seq, Flags { is_ack: true, is_syn: false, is_fin: true })?;
                return Ok(total_bytes);
            }
            send_control(socket, peer, port, seq, Flags { is_ack: true, is_syn: false, is_fin: false })?;
        }
    }

    loop {
        seq.step();
        chunk_number += 1;

        let (bytes, _addr) = socket
            .recv_from(true, should_stop)?
            .ok_or(Error::ConnectionLost)?;
        let pkt = Packet::decode(&bytes)?;

        if pkt.sequence_value() != seq.value() {
            // Either a duplicate of the last accepted chunk, or a stray
            // retransmit; re-send the last ACK without appending and
            // without advancing our own sequence counter's meaning.
            seq.step();
            chunk_number -= 1;
            send_control(socket, peer, port, seq, Flags { is_ack: true, is_syn: false, is_fin: false })?;
            continue;
        }

        if log::log_enabled!(log::Level::Debug) {
            log::debug!("received chunk {chunk_number}, hash {}", chunk_digest(pkt.data()));
        }

        total_bytes += pkt.data().len() as u64;
        store.append(handle, pkt.data())?;

        if pkt.is_fin() {
            send_control(socket, peer, port, seq, Flags { is_ack: true, is_syn: false, is_fin: true })?;
            return Ok(total_bytes);
        }
        send_control(socket, peer, port, seq, Flags { is_ack: true, is_syn: false, is_fin: false })?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn round_trip_small_file() {
        let stop = AtomicBool::new(false);
        let dir = tempfile::tempdir().unwrap();

        let sender_udp = UdpSocket::bind("127.0.0.1:0").unwrap();
        let receiver_udp = UdpSocket::bind("127.0.0.1:0").unwrap();
        let sender_addr = sender_udp.local_addr().unwrap();
        let receiver_addr = receiver_udp.local_addr().unwrap();

        let mut sender_sock = SawSocket::new(sender_udp);
        let mut receiver_sock = SawSocket::new(receiver_udp);

        let src_path = dir.path().join("src.bin");
        std::fs::write(&src_path, b"the quick brown fox jumps over the lazy dog").unwrap();
        let dst_path = dir.path().join("dst.bin");

        let store = FileStore::new(None);
        let mut src_handle = store.open_read(&src_path).unwrap();
        let mut dst_handle = store.open_write_new(&dst_path).unwrap();

        let filesize = store.size(&src_path).unwrap();
        let total_chunks = filesize.div_ceil(SAW_CHUNK_SIZE as u64).max(1);

        let mut send_seq = SequenceNumber::new_saw();
        let mut recv_seq = SequenceNumber::new_saw();

        let receiver = std::thread::spawn(move || {
            let stop = AtomicBool::new(false);
            receive_file(
                &mut receiver_sock,
                sender_addr,
                receiver_addr.port(),
                &mut recv_seq,
                &store,
                &mut dst_handle,
                None,
                &stop,
            )
        });

        send_file(
            &mut sender_sock,
            receiver_addr,
            sender_addr.port(),
            &mut send_seq,
            &FileStore::new(None),
            &mut src_handle,
            total_chunks,
            &stop,
        )
        .unwrap();

        let received = receiver.join().unwrap().unwrap();
        assert_eq!(received, filesize);
        assert_eq!(std::fs::read(&dst_path).unwrap(), std::fs::read(&src_path).unwrap());
    }
}
