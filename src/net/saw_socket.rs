use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::consts::{CANCEL_POLL_INTERVAL, N_MAX, T_CONN_LOST, T_RETX};
use crate::err::{Error, Result};

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Stop-and-wait socket wrapper: remembers the last datagram it sent and
/// retransmits it on receive timeout, up to a per-session liveness budget.
pub struct SawSocket {
    socket: UdpSocket,
    last_sent: Option<(Vec<u8>, SocketAddr)>,
}

impl SawSocket {
    pub fn new(socket: UdpSocket) -> Self {
        SawSocket {
            socket,
            last_sent: None,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Hands a duplicate of the underlying OS socket off to a
    /// [`crate::net::GbnSocket`] for the bulk-transfer phase of a GBN
    /// session; the control-plane wrapper keeps using its own handle.
    pub fn try_clone(&self) -> io::Result<UdpSocket> {
        self.socket.try_clone()
    }

    pub fn send_to(&mut self, data: &[u8], addr: SocketAddr) -> Result<()> {
        self.socket.send_to(data, addr)?;
        self.last_sent = Some((data.to_vec(), addr));
        Ok(())
    }

    fn retransmit_last(&self) -> Result<()> {
        if let Some((data, addr)) = &self.last_sent {
            self.socket.send_to(data, *addr)?;
        }
        Ok(())
    }

    /// `should_retransmit = true`: retransmit the last sent datagram on
    /// every timeout until `N_MAX` attempts or `T_CONN_LOST` elapses, then
    /// fail with `ConnectionLost`.
    ///
    /// `should_retransmit = false`: block (in bounded slices, to stay
    /// responsive to `should_stop`) without ever retransmitting; returns
    /// `Ok(None)` on a timeout slice so the caller can poll `should_stop`
    /// and call again. Used only by the accepter while waiting for a new
    /// peer's first datagram.
    pub fn recv_from(
        &mut self,
        should_retransmit: bool,
        should_stop: &AtomicBool,
    ) -> Result<Option<(Vec<u8>, SocketAddr)>> {
        if should_stop.load(Ordering::Relaxed) {
            return Err(Error::SocketShutdown);
        }

        let mut buf = vec![0u8; 65535];

        if !should_retransmit {
            self.socket.set_read_timeout(Some(CANCEL_POLL_INTERVAL))?;
            return match self.socket.recv_from(&mut buf) {
                Ok((n, addr)) => Ok(Some((buf[..n].to_vec(), addr))),
                Err(e) if is_timeout(&e) => Ok(None),
                Err(e) => Err(e.into()),
            };
        }

        self.socket.set_read_timeout(Some(T_RETX))?;
        let deadline = Instant::now() + T_CONN_LOST;
        let mut attempts = 0u32;

        loop {
            if should_stop.load(Ordering::Relaxed) {
                return Err(Error::SocketShutdown);
            }

            match self.socket.recv_from(&mut buf) {
                Ok((n, addr)) => return Ok(Some((buf[..n].to_vec(), addr))),
                Err(e) if is_timeout(&e) => {
                    attempts += 1;
                    if attempts > N_MAX || Instant::now() >= deadline {
                        return Err(Error::ConnectionLost);
                    }
                    self.retransmit_last()?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
