use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::consts::{GBN_CHUNK_SIZE, GBN_WINDOW_SIZE, T_WINDOW_RETX};
use crate::err::{Error, Result};
use crate::fs::{FileHandle, FileStore};
use crate::net::packet::{Flags, GbnPacket};
use crate::net::{GbnSocket, Packet, SequenceNumber};

fn chunk_digest(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    format!("{digest:x}")[..10].to_string()
}

/// Go-back-N sliding window sender. Fills the window, waits for cumulative
/// ACKs, and rewinds the whole window back to `base` on a window-level
/// timeout or a run of stale ACKs.
pub fn send_file(
    socket: &GbnSocket,
    peer: SocketAddr,
    port: u16,
    initial_seq: u32,
    store: &FileStore,
    handle: &mut FileHandle,
    total_chunks: u64,
    should_stop: &AtomicBool,
) -> Result<()> {
    let chunks = materialize_chunks(store, handle, total_chunks)?;
    let total = chunks.len() as u32;

    let mut base: u32 = 0;
    let mut next_seq: u32 = 0;
    let mut ack_number: u32 = 0;
    let mut idle_since = Instant::now();

    loop {
        while next_seq < base + GBN_WINDOW_SIZE && next_seq < total {
            let idx = next_seq as usize;
            let is_fin = next_seq + 1 == total;
            let seq_value = initial_seq + next_seq + 1;

            if log::log_enabled!(log::Level::Debug) {
                log::debug!(
                    "sending chunk {}/{total}, hash {}",
                    next_seq + 1,
                    chunk_digest(&chunks[idx])
                );
            }

            let pkt = Packet::Gbn(GbnPacket {
                flags: Flags {
                    is_ack: false,
                    is_syn: false,
                    is_fin,
                },
                port,
                sequence_number: seq_value,
                ack_number: 0,
                data: chunks[idx].clone(),
            });
            socket.send_to(&pkt.encode(), peer)?;
            next_seq += 1;
        }

        if base >= total {
            return Ok(());
        }

        match socket.recv_from(Some(T_WINDOW_RETX), should_stop) {
            Ok((bytes, _addr)) => {
                let pkt = Packet::decode(&bytes)?;
                if !pkt.is_ack() {
                    return Err(Error::NotAck);
                }
                let got = pkt.ack_value().ok_or(Error::InvalidAckNumber)?;
                let relative = got.saturating_sub(initial_seq);

                if relative >= ack_number {
                    ack_number = relative;
                    base = relative;
                    idle_since = Instant::now();
                } else if idle_since.elapsed() >= T_WINDOW_RETX {
                    next_seq = base;
                    idle_since = Instant::now();
                }
            }
            Err(Error::RetransmissionNeeded) => {
                next_seq = base;
                idle_since = Instant::now();
            }
            Err(e) => return Err(e),
        }
    }
}

fn materialize_chunks(store: &FileStore, handle: &mut FileHandle, total_chunks: u64) -> Result<Vec<Vec<u8>>> {
    let mut chunks = Vec::with_capacity(total_chunks.max(1) as usize);
    for _ in 0..total_chunks.max(1) {
        chunks.push(store.read(handle, GBN_CHUNK_SIZE)?);
    }
    Ok(chunks)
}

/// Go-back-N in-order receiver: accepts a chunk only if its sequence
/// number matches `expected_seq`, appending and advancing; anything else
/// is discarded and the last cumulative ACK is re-sent, letting the
/// sender's repeated-ack detection trigger a window rewind.
pub fn receive_file(
    socket: &GbnSocket,
    peer: SocketAddr,
    port: u16,
    initial_seq: u32,
    store: &FileStore,
    handle: &mut FileHandle,
    first_chunk: Option<Packet>,
    should_stop: &AtomicBool,
) -> Result<u64> {
    let mut expected_seq = initial_seq;
    let mut total_bytes = 0u64;
    let mut chunk_number = 0u64;

    if let Some(pkt) = first_chunk {
        if !pkt.data().is_empty() || pkt.is_fin() {
            expected_seq += 1;
            chunk_number += 1;
            total_bytes += pkt.data().len() as u64;
            store.append(handle, pkt.data())?;
            send_ack(socket, peer, port, expected_seq)?;
            if pkt.is_fin() {
                return Ok(total_bytes);
            }
        }
    }

    loop {
        let (bytes, _addr) = socket.recv_from(None, should_stop)?;
        let pkt = Packet::decode(&bytes)?;

        if pkt.sequence_value() != expected_seq + 1 {
            send_ack(socket, peer, port, expected_seq)?;
            continue;
        }

        expected_seq += 1;
        chunk_number += 1;

        if log::log_enabled!(log::Level::Debug) {
            log::debug!("received chunk {chunk_number}, hash {}", chunk_digest(pkt.data()));
        }

        total_bytes += pkt.data().len() as u64;
        store.append(handle, pkt.data())?;
        send_ack(socket, peer, port, expected_seq)?;

        if pkt.is_fin() {
            return Ok(total_bytes);
        }
    }
}

fn send_ack(socket: &GbnSocket, peer: SocketAddr, port: u16, ack_number: u32) -> Result<()> {
    let pkt = Packet::Gbn(GbnPacket {
        flags: Flags {
            is_ack: true,
            is_syn: false,
            is_fin: false,
        },
        port,
        sequence_number: 0,
        ack_number,
        data: Vec::new(),
    });
    socket.send_to(&pkt.encode(), peer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn round_trip_multi_chunk_file() {
        let stop = AtomicBool::new(false);
        let dir = tempfile::tempdir().unwrap();

        let sender_udp = UdpSocket::bind("127.0.0.1:0").unwrap();
        let receiver_udp = UdpSocket::bind("127.0.0.1:0").unwrap();
        let sender_addr = sender_udp.local_addr().unwrap();
        let receiver_addr = receiver_udp.local_addr().unwrap();

        let sender_sock = GbnSocket::new(sender_udp);
        let receiver_sock = GbnSocket::new(receiver_udp);

        let src_path = dir.path().join("src.bin");
        let payload: Vec<u8> = (0..GBN_CHUNK_SIZE as u32 * 3 + 123).map(|i| (i % 251) as u8).collect();
        std::fs::write(&src_path, &payload).unwrap();
        let dst_path = dir.path().join("dst.bin");

        let store = FileStore::new(None);
        let mut src_handle = store.open_read(&src_path).unwrap();
        let mut dst_handle = store.open_write_new(&dst_path).unwrap();

        let filesize = store.size(&src_path).unwrap();
        let total_chunks = filesize.div_ceil(GBN_CHUNK_SIZE as u64).max(1);

        let receiver = std::thread::spawn(move || {
            let stop = AtomicBool::new(false);
            receive_file(&receiver_sock, sender_addr, receiver_addr.port(), 0, &store, &mut dst_handle, None, &stop)
        });

        send_file(
            &sender_sock,
            receiver_addr,
            sender_addr.port(),
            0,
            &FileStore::new(None),
            &mut src_handle,
            total_chunks,
            &stop,
        )
        .unwrap();

        let received = receiver.join().unwrap().unwrap();
        assert_eq!(received, filesize);
        assert_eq!(std::fs::read(&dst_path).unwrap(), payload);
    }
}
