use std::process::ExitCode;

use clap::Parser;

use rft::cli::DownloadArgs;
use rft::client::{self, ClientConfig, DownloadJob, Job};
use rft::consts::ERROR_EXIT_CODE;
use rft::logger;
use rft::net::Protocol;

fn main() -> ExitCode {
    let args = DownloadArgs::parse();
    logger::init(args.verbosity.verbose, args.verbosity.quiet);

    if args.destination.exists() {
        log::error!("destination already exists: {}", args.destination.display());
        return ExitCode::from(ERROR_EXIT_CODE as u8);
    }

    let protocol: Protocol = match args.protocol.parse() {
        Ok(p) => p,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::from(ERROR_EXIT_CODE as u8);
        }
    };

    let cfg = ClientConfig {
        host: args.endpoint.host,
        port: args.endpoint.port,
        protocol,
    };
    let job = Job::Download(DownloadJob { name: args.name, destination: args.destination });

    match client::run(cfg, job) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::from(ERROR_EXIT_CODE as u8)
        }
    }
}
