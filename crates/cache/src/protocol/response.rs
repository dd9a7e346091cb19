//! Reply formatting for `set` and `get`.

/// `set` success reply.
pub fn stored() -> Vec<u8> {
    b"STORED\r\n".to_vec()
}

/// Unknown-command reply.
pub fn error() -> Vec<u8> {
    b"ERROR\r\n".to_vec()
}

/// Short-frame reply (fewer than 3 header bytes).
pub fn wrong_command_format() -> Vec<u8> {
    b"ERROR wrong command format\r\n".to_vec()
}

pub fn client_error(reason: &str) -> Vec<u8> {
    format!("CLIENT_ERROR {reason}\r\n").into_bytes()
}

/// One `VALUE` block for a single `get` hit. No `END` terminator is
/// appended here; whether to append one after the full set of hits is a
/// decision made by the caller (see [`get_reply`]).
pub fn value_block(key: &[u8], flags: u16, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.len() + value.len() + 32);
    out.extend_from_slice(b"VALUE ");
    out.extend_from_slice(key);
    out.extend_from_slice(format!(" {flags} {}\r\n", value.len()).as_bytes());
    out.extend_from_slice(value);
    out.extend_from_slice(b"\r\n");
    out
}

/// Concatenates the `VALUE` blocks for every hit, in request order. Misses
/// contribute nothing. No `END\r\n` terminator is emitted.
pub fn get_reply(hits: &[(Vec<u8>, u16, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (key, flags, value) in hits {
        out.extend_from_slice(&value_block(key, *flags, value));
    }
    out
}
