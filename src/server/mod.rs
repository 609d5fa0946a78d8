pub mod accepter;
pub mod pool;
pub mod worker;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::err::Result;
use crate::net::Protocol;

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: PathBuf,
    pub protocol: Protocol,
}

/// Runs the welcoming loop on the calling thread until `should_stop` is
/// set, either by the stdin quit-watcher or by the accepter giving up on
/// an unrecoverable socket error.
pub fn run(cfg: ServerConfig) -> Result<()> {
    let should_stop = Arc::new(AtomicBool::new(false));

    {
        let should_stop = should_stop.clone();
        thread::spawn(move || watch_stdin_for_quit(should_stop));
    }

    let result = accepter::run(&cfg, should_stop.clone());
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
