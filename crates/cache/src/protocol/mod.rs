pub mod error;
pub mod request;
pub mod response;

pub use error::ProtocolError;
pub use request::Command;

use crate::store::Store;

/// Parses one frame, executes it against `store`, and formats the reply.
///
/// Returns `None` when the caller should send nothing back — either the
/// frame was a well-formed `set ... noreply` or the sender's `get` keys were
/// all misses with no reply bytes to emit.
///
/// This is the single entry point a worker calls: parse → mutate/query →
/// format, all without the worker needing to touch [`request`] or
/// [`response`] directly.
pub fn handle_frame(frame: &[u8], store: &Store) -> Option<Vec<u8>> {
    let command = match request::parse(frame) {
        Ok(command) => command,
        Err(err) => return Some(err.to_reply()),
    };

    match command {
        Command::Set {
            key,
            flags,
            exptime,
            noreply,
            value,
        } => match store.insert_or_update(key, flags, exptime, value) {
            Ok(()) => (!noreply).then(response::stored),
            Err(_) => Some(response::client_error("memory error")),
        },
        Command::Get { keys } => {
            let hits: Vec<(Vec<u8>, u16, Vec<u8>)> = keys
                .into_iter()
                .filter_map(|key| {
                    let entry = store.get(&key)?;
                    Some((key, entry.flags, entry.value))
                })
                .collect();
            Some(response::get_reply(&hits))
        }
    }
}
