use std::process::ExitCode;

use clap::Parser;

use rft::cli::UploadArgs;
use rft::client::{self, ClientConfig, Job, UploadJob};
use rft::consts::ERROR_EXIT_CODE;
use rft::logger;
use rft::net::Protocol;

fn main() -> ExitCode {
    let args = UploadArgs::parse();
    logger::init(args.verbosity.verbose, args.verbosity.quiet);

    if !args.source.is_file() {
        log::error!("source file does not exist: {}", args.source.display());
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
    let job = Job::Upload(UploadJob { source: args.source, name: args.name });

    match client::run(cfg, job) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::from(ERROR_EXIT_CODE as u8)
        }
    }
}
