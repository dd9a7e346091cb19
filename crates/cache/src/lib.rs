//! # rustcached cache core
//!
//! Transport-independent core of a memcached-ASCII-compatible object cache:
//! the bounded LRU store ([`store`]), the wire protocol codec
//! ([`protocol`]), and the fixed worker pool that runs requests against the
//! store ([`pool`]).
//!
//! The connection multiplexer that reads frames off sockets and drives this
//! crate lives in the `rustcached` binary crate, not here.

pub mod entry;
pub mod pool;
pub mod protocol;
pub mod store;

pub use entry::Entry;
pub use pool::WorkerPool;
pub use protocol::{handle_frame, Command, ProtocolError};
pub use store::{Store, StoreError};
