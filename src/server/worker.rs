use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use crate::consts::{GBN_CHUNK_SIZE, SAW_CHUNK_SIZE};
use crate::err::{Error, Result};
use crate::fs::FileStore;
use crate::net::packet::Flags;
use crate::net::{GbnSocket, Packet, Protocol, SawSocket, SequenceNumber};
use crate::session::{self, Operation};
use crate::transfer::{close, gbn, saw};

fn recv_request(socket: &mut SawSocket, should_stop: &AtomicBool) -> Result<Packet> {
    let (bytes, _addr) = socket.recv_from(true, should_stop)?.ok_or(Error::ConnectionLost)?;
    Packet::decode(&bytes)
}

fn send_reply(socket: &mut SawSocket, peer: SocketAddr, port: u16, protocol: Protocol, seq: &mut SequenceNumber, flags: Flags) -> Result<()> {
    seq.step();
    let pkt = session::build_packet(protocol, seq, port, flags, Vec::new());
    socket.send_to(&pkt.encode(), peer)
}

/// Owns one accepted session end to end: consumes the handshake-completing
/// packet's operation intent, negotiates metadata, invokes the matching
/// transfer engine, and performs the closing handshake. Mirrors the client
/// engine with client and server roles reversed.
pub fn run(
    mut socket: SawSocket,
    peer: SocketAddr,
    port: u16,
    protocol: Protocol,
    mut seq: SequenceNumber,
    storage_dir: PathBuf,
    should_stop: &AtomicBool,
) -> Result<()> {
    let first_packet = recv_request(&mut socket, should_stop)?;
    // The client stepped its counter before sending this handshake-completing
    // packet, so the expected value is one step ahead of the SYN+ACK's —
    // the same value `send_reply` below is about to produce.
    let mut expected = seq;
    expected.step();
    session::validate_is_ack(&first_packet, expected.value())?;
    let operation = Operation::from_payload(first_packet.data())?;
    send_reply(&mut socket, peer, port, protocol, &mut seq, Flags { is_ack: true, is_syn: false, is_fin: false })?;

    let store = FileStore::new(Some(storage_dir));

    match operation {
        Operation::Upload => handle_upload(&mut socket, peer, port, protocol, &mut seq, &store, should_stop),
        Operation::Download => handle_download(&mut socket, peer, port, protocol, &mut seq, &store, should_stop),
    }
}

fn handle_upload(
    socket: &mut SawSocket,
    peer: SocketAddr,
    port: u16,
    protocol: Protocol,
    seq: &mut SequenceNumber,
    store: &FileStore,
    should_stop: &AtomicBool,
) -> Result<()> {
    let name_pkt = recv_request(socket, should_stop)?;
    let name = String::from_utf8_lossy(name_pkt.data()).to_string();
    let path = store.resolve(&name)?;

    if store.exists(&path) {
        send_reply(socket, peer, port, protocol, seq, Flags { is_ack: true, is_syn: false, is_fin: true })?;
        log::warn!("upload rejected: {name} already existing in the server");
        return Err(Error::FileAlreadyExists);
    }
    send_reply(socket, peer, port, protocol, seq, Flags { is_ack: true, is_syn: false, is_fin: false })?;

    let size_pkt = recv_request(socket, should_stop)?;
    let size_bytes: [u8; 4] = size_pkt.data().try_into().map_err(|_| Error::MalformedFrame)?;
    let filesize = u32::from_be_bytes(size_bytes) as u64;

    if !store.can_fit(filesize)? {
        send_reply(socket, peer, port, protocol, seq, Flags { is_ack: true, is_syn: false, is_fin: true })?;
        return Err(Error::FileTooBig);
    }
    send_reply(socket, peer, port, protocol, seq, Flags { is_ack: true, is_syn: false, is_fin: false })?;

    let mut handle = store.open_write_new(&path)?;

    let result = match protocol {
        Protocol::Saw => {
            saw::receive_file(socket, peer, port, seq, store, &mut handle, None, should_stop).and_then(|bytes| {
                close::close_as_receiver_saw(socket, should_stop)?;
                Ok(bytes)
            })
        }
        Protocol::Gbn => {
            let gbn_socket = GbnSocket::new(socket.try_clone()?);
            let initial_seq = seq.value();
            gbn::receive_file(&gbn_socket, peer, port, initial_seq, store, &mut handle, None, should_stop).and_then(|bytes| {
                close::close_as_receiver_gbn(&gbn_socket, should_stop)?;
                Ok(bytes)
            })
        }
    };

    store.close(&mut handle);

    match result {
        Ok(_) => {
            crate::milestone!("Upload completed from client {peer}");
            Ok(())
        }
        Err(e) => {
            store.cleanup_after_error(&path, Some(filesize));
            Err(e)
        }
    }
}

fn handle_download(
    socket: &mut SawSocket,
    peer: SocketAddr,
    port: u16,
    protocol: Protocol,
    seq: &mut SequenceNumber,
    store: &FileStore,
    should_stop: &AtomicBool,
) -> Result<()> {
    let name_pkt = recv_request(socket, should_stop)?;
    let name = String::from_utf8_lossy(name_pkt.data()).to_string();
    let path = store.resolve(&name)?;

    if !store.exists(&path) {
        send_reply(socket, peer, port, protocol, seq, Flags { is_ack: true, is_syn: false, is_fin: true })?;
        log::warn!("download rejected: {name} not existing in server for download");
        return Err(Error::FileDoesNotExist);
    }

    let mut handle = store.open_read(&path)?;
    let filesize = store.size(&path)?;
    // The carried-through first-chunk optimization (the handshake's ACK
    // doubling as the first data chunk) is never exercised by this server:
    // it always answers the metadata request with a plain, empty ACK.
    send_reply(socket, peer, port, protocol, seq, Flags { is_ack: true, is_syn: false, is_fin: false })?;

    match protocol {
        Protocol::Saw => {
            let total_chunks = filesize.div_ceil(SAW_CHUNK_SIZE as u64).max(1);
            saw::send_file(socket, peer, port, seq, store, &mut handle, total_chunks, should_stop)?;
            close::close_as_sender_saw(socket, peer, seq, should_stop)?;
        }
        Protocol::Gbn => {
            let total_chunks = filesize.div_ceil(GBN_CHUNK_SIZE as u64).max(1);
            let gbn_socket = GbnSocket::new(socket.try_clone()?);
            let initial_seq = seq.value();
            gbn::send_file(&gbn_socket, peer, port, initial_seq, store, &mut handle, total_chunks, should_stop)?;
            close::close_as_sender_gbn(&gbn_socket, peer, port)?;
        }
    }

    store.close(&mut handle);
    crate::milestone!("Download completed to client {peer}");
    Ok(())
}
