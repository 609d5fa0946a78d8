use std::collections::HashSet;
use std::net::SocketAddr;

/// Tracks which peer addresses currently have an active session. Mutated
/// exclusively by the accepter thread: insertion happens right after the
/// SYN+ACK is sent (before any completing packet is received from the
/// client), removal happens when a worker's completion signal is drained
/// from the accepter's channel (see [`crate::server::accepter`]).
#[derive(Debug, Default)]
pub struct ClientPool {
    active: HashSet<SocketAddr>,
}

impl ClientPool {
    pub fn new() -> Self {
        ClientPool::default()
    }

    pub fn contains(&self, addr: SocketAddr) -> bool {
        self.active.contains(&addr)
    }

    pub fn insert(&mut self, addr: SocketAddr) {
        self.active.insert(addr);
    }

    pub fn remove(&mut self, addr: SocketAddr) {
        self.active.remove(&addr);
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_insert_observably() {
        let mut pool = ClientPool::new();
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        assert!(!pool.contains(addr));
        pool.insert(addr);
        assert!(pool.contains(addr));
        pool.insert(addr);
        assert_eq!(pool.len(), 1);
        pool.remove(addr);
        assert!(pool.is_empty());
    }
}
