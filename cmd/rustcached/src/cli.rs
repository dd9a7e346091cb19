use clap::Parser;

/// Command-line surface for the server binary: `--port`, `--workers`,
/// `--capacity`, and `--help`; each also falls back to an environment
/// variable so the process can be configured the same way in a container
/// as on a shell.
#[derive(Parser, Debug)]
#[command(
    name = "rustcached",
    about = "A single-node, in-memory, memcached-ASCII-compatible object cache."
)]
pub struct Options {
    #[arg(
        long,
        env = "RUSTCACHED_PORT",
        default_value_t = 11211,
        help = "TCP port to listen on"
    )]
    pub port: u16,

    #[arg(
        long,
        env = "RUSTCACHED_WORKERS",
        default_value_t = 12,
        help = "Number of worker threads processing requests"
    )]
    pub workers: usize,

    #[arg(
        long,
        env = "RUSTCACHED_CAPACITY",
        default_value_t = 5000,
        help = "Maximum number of resident entries before LRU eviction kicks in"
    )]
    pub capacity: usize,
}
