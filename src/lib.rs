pub mod cli;
pub mod client;
pub mod consts;
pub mod err;
pub mod fs;
pub mod logger;
pub mod net;
pub mod server;
pub mod session;
pub mod transfer;

pub use err::{Error, Result};
