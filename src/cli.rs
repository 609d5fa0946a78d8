use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser};

use crate::consts::DEFAULT_PORT;

/// Host/port pair shared by all three binaries: bind address for the
/// server, target address for the clients.
#[derive(Args, Debug)]
pub struct Endpoint {
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

/// `-v`/`-q` are mutually exclusive; the default (neither set) is
/// `LevelFilter::Info`.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("verbosity").args(["verbose", "quiet"])))]
pub struct Verbosity {
    #[arg(short = 'v', long)]
    pub verbose: bool,
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

#[derive(Parser, Debug)]
#[command(name = "start-server")]
pub struct ServerArgs {
    #[command(flatten)]
    pub endpoint: Endpoint,
    /// Storage directory holding uploaded and downloadable files.
    #[arg(short = 's', long)]
    pub storage: PathBuf,
    #[arg(short = 'r', long, default_value = "gbn")]
    pub protocol: String,
    #[command(flatten)]
    pub verbosity: Verbosity,
}

#[derive(Parser, Debug)]
#[command(name = "upload")]
pub struct UploadArgs {
    #[command(flatten)]
    pub endpoint: Endpoint,
    /// Local file to send.
    #[arg(short = 's', long)]
    pub source: PathBuf,
    /// Name to store the file under on the server.
    #[arg(short = 'n', long)]
    pub name: String,
    #[arg(short = 'r', long, default_value = "gbn")]
    pub protocol: String,
    #[command(flatten)]
    pub verbosity: Verbosity,
}

#[derive(Parser, Debug)]
#[command(name = "download")]
pub struct DownloadArgs {
    #[command(flatten)]
    pub endpoint: Endpoint,
    /// Name of the file to fetch from the server.
    #[arg(short = 'n', long)]
    pub name: String,
    /// Local path to write the downloaded file to.
    #[arg(short = 'd', long)]
    pub destination: PathBuf,
    #[arg(short = 'r', long, default_value = "gbn")]
    pub protocol: String,
    #[command(flatten)]
    pub verbosity: Verbosity,
}
