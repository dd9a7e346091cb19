mod cli;
mod connection;
mod logging;
mod server;

use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use rustcached_cache::{Store, WorkerPool};
use tracing::{error, info};

/// Constructs the worker pool, then the store, then the server, then blocks
/// on the reactor loop. Signal handling flips an `AtomicBool` the reactor
/// polls each cycle, which lets it drain in-flight replies and close the
/// listener before returning.
fn main() -> ExitCode {
    let options = cli::Options::parse();
    logging::init_tracing();

    let store = Arc::new(Store::new(options.capacity));
    let pool = Arc::new(WorkerPool::new(options.workers));
    let shutdown = Arc::new(AtomicBool::new(false));

    {
        let shutdown = Arc::clone(&shutdown);
        if let Err(err) = ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        }) {
            error!(error = %err, "failed to install shutdown handler, Ctrl-C will not exit cleanly");
        }
    }

    let addr = SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), options.port);
    let mut server = match server::Server::bind(addr, Arc::clone(&store), Arc::clone(&pool), shutdown) {
        Ok(server) => server,
        Err(err) => {
            error!(error = %err, %addr, "failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    let bound_addr = server.local_addr().unwrap_or(addr);
    info!(
        %bound_addr,
        workers = options.workers,
        capacity = options.capacity,
        "rustcached listening"
    );
    // Emitted for integration tests driving the binary with `--port 0`;
    // harmless banner otherwise. Flushed explicitly since stdout is
    // block-buffered once it's not a tty.
    println!("listening on {bound_addr}");
    let _ = std::io::Write::flush(&mut std::io::stdout());

    match server.run() {
        Ok(()) => {
            info!("clean shutdown");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "reactor loop exited with an error");
            ExitCode::FAILURE
        }
    }
}
