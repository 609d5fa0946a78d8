use std::time::Duration;

/// Per-packet retransmission timeout for the stop-and-wait socket.
pub const T_RETX: Duration = Duration::from_secs(1);
/// Window-level retransmission timeout for the go-back-N socket.
pub const T_WINDOW_RETX: Duration = Duration::from_millis(800);
/// Total per-session liveness budget before a stuck connection is abandoned.
pub const T_CONN_LOST: Duration = Duration::from_secs(30);
/// Maximum number of retransmission attempts before giving up on a single packet.
pub const N_MAX: u32 = 10;

/// Payload size used by the stop-and-wait engine, comfortably under a
/// conservative Ethernet MTU once the 6-byte SAW header is added.
pub const SAW_CHUNK_SIZE: usize = 1024;
/// Payload size used by the go-back-N engine (larger, since GBN amortizes
/// the per-datagram overhead across a whole window).
pub const GBN_CHUNK_SIZE: usize = 1400;
/// Go-back-N sliding window size, in chunks.
pub const GBN_WINDOW_SIZE: u32 = 8;

/// How often a blocking recv with no application-level timeout re-checks
/// the shared shutdown flag. Purely a cancellation-latency knob.
pub const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default welcoming port for `start-server` / default target port for the clients.
pub const DEFAULT_PORT: u16 = 7001;
/// Process exit code used for startup failures.
pub const ERROR_EXIT_CODE: i32 = 1;
/// Safety margin `can_fit` reserves so a transfer never fills a disk to zero bytes free.
pub const MINIMUM_FREE_GAP: u64 = 100_000_000;

pub mod opcode {
    pub const UPLOAD: u16 = 1;
    pub const DOWNLOAD: u16 = 2;
}
