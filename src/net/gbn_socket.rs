use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::consts::CANCEL_POLL_INTERVAL;
use crate::err::{Error, Result};

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Go-back-N socket wrapper: a short recv timeout signals the caller to
/// rewind and resend its window rather than retransmitting automatically.
pub struct GbnSocket {
    socket: UdpSocket,
}

impl GbnSocket {
    pub fn new(socket: UdpSocket) -> Self {
        GbnSocket { socket }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn send_to(&self, data: &[u8], addr: SocketAddr) -> Result<()> {
        self.socket.send_to(data, addr).map_err(|e| {
            if is_timeout(&e) {
                Error::RetransmissionNeeded
            } else {
                Error::Io(e)
            }
        })?;
        Ok(())
    }

    /// `timeout = Some(d)`: raises `RetransmissionNeeded` after `d` with no
    /// datagram. `timeout = None`: blocks indefinitely in bounded slices so
    /// `should_stop` stays observable, used by the receiver during bulk
    /// transfer where the sender paces retransmission, not us.
    pub fn recv_from(
        &self,
        timeout: Option<Duration>,
        should_stop: &AtomicBool,
    ) -> Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; 65535];

        match timeout {
            Some(d) => {
                self.socket.set_read_timeout(Some(d))?;
                if should_stop.load(Ordering::Relaxed) {
                    return Err(Error::SocketShutdown);
                }
                match self.socket.recv_from(&mut buf) {
                    Ok((n, addr)) => Ok((buf[..n].to_vec(), addr)),
                    Err(e) if is_timeout(&e) => Err(Error::RetransmissionNeeded),
                    Err(e) => Err(e.into()),
                }
            }
            None => loop {
                if should_stop.load(Ordering::Relaxed) {
                    return Err(Error::SocketShutdown);
                }
                self.socket.set_read_timeout(Some(CANCEL_POLL_INTERVAL))?;
                match self.socket.recv_from(&mut buf) {
                    Ok((n, addr)) => return Ok((buf[..n].to_vec(), addr)),
                    Err(e) if is_timeout(&e) => continue,
                    Err(e) => return Err(e.into()),
                }
            },
        }
    }
}
