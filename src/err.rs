use std::io;

/// Every failure mode the transport, the session state machines and the
/// binaries can surface. Variants are grouped by the layer that raises them;
/// the grouping is informal (a single flat enum, matching how small this
/// crate's error surface actually is) but kept in the same order as the
/// layers in the design.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // -- frame-level -------------------------------------------------
    #[error("malformed frame")]
    MalformedFrame,
    #[error("a packet with invalid sequence number was received")]
    MismatchedSequenceNumber,
    #[error("a packet with FIN was received when it was not expected")]
    UnexpectedFin,
    #[error("the message is not an ACK")]
    NotAck,
    #[error("the message is not a SYN")]
    NotSyn,
    #[error("invalid operation code")]
    InvalidOperationCode,
    #[error("a packet with invalid ACK number was received")]
    InvalidAckNumber,
    #[error("the message is neither FIN nor ACK")]
    NotFinNorAck,

    // -- session-level -------------------------------------------------
    #[error("connection refused by server")]
    ConnectionRefused,
    #[error("connection was lost")]
    ConnectionLost,
    #[error("protocol mismatch")]
    ProtocolMismatch,
    #[error("retransmission needed")]
    RetransmissionNeeded,
    #[error("client is already connected")]
    ClientAlreadyConnected,

    // -- resource-level -------------------------------------------------
    #[error("file in server already exists")]
    FileAlreadyExists,
    #[error("file is too big and cannot fit in the server")]
    FileTooBig,
    #[error("file in server does not exist")]
    FileDoesNotExist,
    #[error("invalid filename")]
    InvalidFilename,
    #[error("invalid storage directory")]
    InvalidDirectory,
    #[error("cannot bind socket")]
    CannotBindSocket,

    // -- lifecycle -------------------------------------------------
    #[error("socket was shut down")]
    SocketShutdown,
    #[error("max retransmission attempts reached")]
    MaxRetransmissionAttempts,
    #[error("missing peer address")]
    MissingPeerAddress,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Frame-level errors are the only ones [`crate::net::retry::re_listen`]
    /// is allowed to swallow and retry.
    pub fn is_frame_level(&self) -> bool {
        matches!(
            self,
            Error::MalformedFrame
                | Error::MismatchedSequenceNumber
                | Error::UnexpectedFin
                | Error::NotAck
                | Error::NotSyn
                | Error::InvalidOperationCode
                | Error::InvalidAckNumber
                | Error::NotFinNorAck
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
