use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;

use crate::consts::opcode;
use crate::err::{Error, Result};
use crate::net::packet::{Flags, GbnPacket, SawPacket};
use crate::net::{Packet, Protocol, SawSocket, SequenceNumber};

/// The two things a session can ask the server to do, carried as a 2-byte
/// code in the first post-handshake packet's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upload,
    Download,
}

impl Operation {
    pub fn to_code(self) -> [u8; 2] {
        match self {
            Operation::Upload => opcode::UPLOAD.to_be_bytes(),
            Operation::Download => opcode::DOWNLOAD.to_be_bytes(),
        }
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        if payload.len() != 2 {
            return Err(Error::InvalidOperationCode);
        }
        match u16::from_be_bytes([payload[0], payload[1]]) {
            opcode::UPLOAD => Ok(Operation::Upload),
            opcode::DOWNLOAD => Ok(Operation::Download),
            _ => Err(Error::InvalidOperationCode),
        }
    }
}

/// Builds a control-plane packet framed per the session's chosen protocol.
/// Both protocols use this same framing for the handshake, operation
/// intent and metadata exchange — only the bulk transfer phase switches to
/// the GBN-specific window socket; see [`crate::net::GbnSocket`].
pub fn build_packet(protocol: Protocol, seq: &SequenceNumber, port: u16, flags: Flags, data: Vec<u8>) -> Packet {
    match protocol {
        Protocol::Saw => Packet::Saw(SawPacket {
            flags,
            seq_bit: seq.value() as u8,
            port,
            data,
        }),
        Protocol::Gbn => Packet::Gbn(GbnPacket {
            flags,
            port,
            sequence_number: seq.value(),
            ack_number: seq.value(),
            data,
        }),
    }
}

/// Sends `bytes` and blocks for a reply, retransmitting on timeout via the
/// control-plane socket's own budget (`T_RETX`/`N_MAX`/`T_CONN_LOST`).
pub fn reliable_send_recv(
    socket: &mut SawSocket,
    peer: SocketAddr,
    bytes: &[u8],
    should_stop: &AtomicBool,
) -> Result<(Packet, SocketAddr)> {
    socket.send_to(bytes, peer)?;
    let (resp, addr) = socket.recv_from(true, should_stop)?.ok_or(Error::ConnectionLost)?;
    Ok((Packet::decode(&resp)?, addr))
}

/// `expected_seq` is whichever side's own local counter value was current
/// when the packet being acknowledged was sent — both ends step their
/// counter in lockstep before each exchange, so the reply is expected to
/// carry that same value back, not a further-incremented one.
pub fn validate_is_ack(pkt: &Packet, expected_seq: u32) -> Result<()> {
    if pkt.is_fin() {
        return Err(Error::UnexpectedFin);
    }
    if !pkt.is_ack() {
        return Err(Error::NotAck);
    }
    if pkt.sequence_value() != expected_seq {
        return Err(Error::MismatchedSequenceNumber);
    }
    Ok(())
}

pub fn validate_syn_ack(pkt: &Packet, expected_seq: u32) -> Result<()> {
    if pkt.is_fin() {
        return Err(Error::UnexpectedFin);
    }
    if !pkt.is_ack() || !pkt.is_syn() {
        return Err(Error::NotAck);
    }
    if pkt.sequence_value() != expected_seq {
        return Err(Error::MismatchedSequenceNumber);
    }
    Ok(())
}
