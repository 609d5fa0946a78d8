use std::process::ExitCode;

use clap::Parser;

use rft::cli::ServerArgs;
use rft::consts::ERROR_EXIT_CODE;
use rft::logger;
use rft::net::Protocol;
use rft::server::{self, ServerConfig};

fn main() -> ExitCode {
    let args = ServerArgs::parse();
    logger::init(args.verbosity.verbose, args.verbosity.quiet);

    if !args.storage.is_dir() {
        log::error!("invalid storage directory: {}", args.storage.display());
        return ExitCode::from(ERROR_EXIT_CODE as u8);
    }

    let protocol: Protocol = match args.protocol.parse() {
        Ok(p) => p,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::from(ERROR_EXIT_CODE as u8);
        }
    };

    let cfg = ServerConfig {
        host: args.endpoint.host,
        port: args.endpoint.port,
        storage_dir: args.storage,
        protocol,
    };

    match server::run(cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::from(ERROR_EXIT_CODE as u8)
        }
    }
}
