use std::io::BufRead;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::consts::{GBN_CHUNK_SIZE, SAW_CHUNK_SIZE};
use crate::err::{Error, Result};
use crate::fs::FileStore;
use crate::net::packet::Flags;
use crate::net::{Protocol, SawSocket, SequenceNumber};
use crate::session::{self, Operation};
use crate::transfer::{close, gbn, saw};

pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
}

pub struct UploadJob {
    pub source: PathBuf,
    pub name: String,
}

pub struct DownloadJob {
    pub name: String,
    pub destination: PathBuf,
}

pub enum Job {
    Upload(UploadJob),
    Download(DownloadJob),
}

/// Runs one client session to completion on the calling thread, which
/// doubles as the "main I/O loop" thread described for the concurrency
/// model. A second, detached thread watches stdin for a 'q' quit signal.
pub fn run(cfg: ClientConfig, job: Job) -> Result<()> {
    let should_stop = Arc::new(AtomicBool::new(false));

    {
        let should_stop = should_stop.clone();
        thread::spawn(move || watch_stdin_for_quit(should_stop));
    }

    let result = perform(&cfg, job, &should_stop);
    should_stop.store(true, Ordering::Relaxed);
    result
}

fn watch_stdin_for_quit(should_stop: Arc<AtomicBool>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        match line {
            Ok(l) if l.trim() == "q" => {
                should_stop.store(true, Ordering::Relaxed);
                return;
            }
            Ok(_) => continue,
            Err(_) => return,
        }
    }
}

fn perform(cfg: &ClientConfig, job: Job, should_stop: &AtomicBool) -> Result<()> {
    match job {
        Job::Upload(upload) => perform_upload(cfg, upload, should_stop),
        Job::Download(download) => perform_download(cfg, download, should_stop),
    }
}

fn welcoming_addr(cfg: &ClientConfig) -> Result<SocketAddr> {
    (cfg.host.as_str(), cfg.port)
        .to_socket_addrs()?
        .next()
        .ok_or(Error::CannotBindSocket)
}

/// Binds the ephemeral endpoint and runs the handshake, returning the
/// socket, the session's sequence counter and the server's new per-session
/// address.
fn handshake(cfg: &ClientConfig, should_stop: &AtomicBool) -> Result<(SawSocket, SequenceNumber, SocketAddr)> {
    let welcoming = welcoming_addr(cfg)?;
    let udp = UdpSocket::bind((welcoming.ip(), 0))?;
    let mut socket = SawSocket::new(udp);
    let my_port = socket.local_addr()?.port();

    let mut seq = match cfg.protocol {
        Protocol::Saw => SequenceNumber::new_saw(),
        Protocol::Gbn => SequenceNumber::new_gbn(),
    };

    let syn = session::build_packet(
        cfg.protocol,
        &seq,
        my_port,
        Flags { is_ack: false, is_syn: true, is_fin: false },
        Vec::new(),
    );

    let (resp, _addr) = session::reliable_send_recv(&mut socket, welcoming, &syn.encode(), should_stop)
        .map_err(|e| if matches!(e, Error::ConnectionLost) { Error::ConnectionRefused } else { e })?;

    if resp.is_fin() {
        return Err(Error::ProtocolMismatch);
    }
    session::validate_syn_ack(&resp, seq.value()).map_err(|_| Error::ConnectionRefused)?;

    let peer = SocketAddr::new(welcoming.ip(), resp.port());
    Ok((socket, seq, peer))
}

fn send_operation_intent(
    socket: &mut SawSocket,
    peer: SocketAddr,
    port: u16,
    protocol: Protocol,
    seq: &mut SequenceNumber,
    operation: Operation,
    should_stop: &AtomicBool,
) -> Result<()> {
    seq.step();
    let pkt = session::build_packet(
        protocol,
        seq,
        port,
        Flags { is_ack: true, is_syn: false, is_fin: false },
        operation.to_code().to_vec(),
    );
    let (resp, _) = session::reliable_send_recv(socket, peer, &pkt.encode(), should_stop)?;
    session::validate_is_ack(&resp, seq.value())
}

fn perform_upload(cfg: &ClientConfig, job: UploadJob, should_stop: &AtomicBool) -> Result<()> {
    let store = FileStore::new(None);
    // Opened before any datagram leaves the client: a missing source file
    // must fail without ever touching the network.
    let mut handle = store.open_read(&job.source)?;
    let filesize = store.size(&job.source)?;

    let (mut socket, mut seq, peer) = handshake(cfg, should_stop)?;
    let port = socket.local_addr()?.port();

    send_operation_intent(&mut socket, peer, port, cfg.protocol, &mut seq, Operation::Upload, should_stop)?;

    seq.step();
    let name_pkt = session::build_packet(
        cfg.protocol,
        &seq,
        port,
        Flags { is_ack: true, is_syn: false, is_fin: false },
        job.name.as_bytes().to_vec(),
    );
    let (resp, _) = session::reliable_send_recv(&mut socket, peer, &name_pkt.encode(), should_stop)?;
    if resp.is_fin() || !resp.is_ack() {
        return Err(Error::FileAlreadyExists);
    }

    seq.step();
    let size_pkt = session::build_packet(
        cfg.protocol,
        &seq,
        port,
        Flags { is_ack: true, is_syn: false, is_fin: false },
        (filesize as u32).to_be_bytes().to_vec(),
    );
    let (resp, _) = session::reliable_send_recv(&mut socket, peer, &size_pkt.encode(), should_stop)?;
    if resp.is_fin() || !resp.is_ack() {
        return Err(Error::FileTooBig);
    }

    match cfg.protocol {
        Protocol::Saw => {
            let total_chunks = filesize.div_ceil(SAW_CHUNK_SIZE as u64).max(1);
            saw::send_file(&mut socket, peer, port, &mut seq, &store, &mut handle, total_chunks, should_stop)?;
            close::close_as_sender_saw(&mut socket, peer, &mut seq, should_stop)?;
        }
        Protocol::Gbn => {
            let total_chunks = filesize.div_ceil(GBN_CHUNK_SIZE as u64).max(1);
            let gbn_socket = crate::net::GbnSocket::new(socket.try_clone()?);
            let initial_seq = seq.value();
            gbn::send_file(&gbn_socket, peer, port, initial_seq, &store, &mut handle, total_chunks, should_stop)?;
            close::close_as_sender_gbn(&gbn_socket, peer, port)?;
        }
    }

    store.close(&mut handle);
    crate::milestone!("Upload completed");
    Ok(())
}

fn perform_download(cfg: &ClientConfig, job: DownloadJob, should_stop: &AtomicBool) -> Result<()> {
    let store = FileStore::new(None);
    let (mut socket, mut seq, peer) = handshake(cfg, should_stop)?;
    let port = socket.local_addr()?.port();

    send_operation_intent(&mut socket, peer, port, cfg.protocol, &mut seq, Operation::Download, should_stop)?;

    seq.step();
    let name_pkt = session::build_packet(
        cfg.protocol,
        &seq,
        port,
        Flags { is_ack: true, is_syn: false, is_fin: false },
        job.name.as_bytes().to_vec(),
    );
    let (resp, _) = session::reliable_send_recv(&mut socket, peer, &name_pkt.encode(), should_stop)?;
    if resp.is_fin() || !resp.is_ack() {
        return Err(Error::FileDoesNotExist);
    }
    let first_chunk = if resp.data().is_empty() { None } else { Some(resp) };

    let mut handle = store.open_write_new(&job.destination)?;

    let result = match cfg.protocol {
        Protocol::Saw => saw::receive_file(&mut socket, peer, port, &mut seq, &store, &mut handle, first_chunk, should_stop)
            .and_then(|bytes| {
                close::close_as_receiver_saw(&mut socket, should_stop)?;
                Ok(bytes)
            }),
        Protocol::Gbn => {
            let gbn_socket = crate::net::GbnSocket::new(socket.try_clone()?);
            let initial_seq = seq.value();
            gbn::receive_file(&gbn_socket, peer, port, initial_seq, &store, &mut handle, first_chunk, should_stop).and_then(|bytes| {
                close::close_as_receiver_gbn(&gbn_socket, should_stop)?;
                Ok(bytes)
            })
        }
    };

    store.close(&mut handle);

    match result {
        Ok(_) => {
            crate::milestone!("Download completed");
            Ok(())
        }
        Err(e) => {
            store.cleanup_after_error(&job.destination, None);
            Err(e)
        }
    }
}
