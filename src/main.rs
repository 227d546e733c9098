//! Overseer demo server entry point.

use std::process::ExitCode;

use session_overseer::api::{serve, shutdown_signal};
use session_overseer::cli::{parse_args, print_help, print_version};
use session_overseer::config::Config;
use session_overseer::logging;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Try 'overseer --help' for more information.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::try_init_with_level(config.log_filter()) {
        eprintln!("warning: logging already initialized: {}", e);
    }

    info!("session-overseer v{}", env!("CARGO_PKG_VERSION"));

    let addr = match config.socket_addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let state = match config.session.build_state().await {
        Ok(state) => state,
        Err(e) => {
            error!("failed to set up sessions: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = if config.server.graceful_shutdown {
        serve(addr, state, shutdown_signal()).await
    } else {
        serve(addr, state, std::future::pending()).await
    };

    match result {
        Ok(()) => {
            info!("server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
