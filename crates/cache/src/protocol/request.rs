//! Request parsing for the two supported commands.

use crate::entry::{MAX_KEY_LEN, MAX_VALUE_LEN};
use crate::protocol::error::ProtocolError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set {
        key: Vec<u8>,
        flags: u16,
        exptime: u32,
        noreply: bool,
        value: Vec<u8>,
    },
    Get {
        keys: Vec<Vec<u8>>,
    },
}

/// Parses one complete frame (header line plus, for `set`, the declared
/// value bytes and trailing CRLF) into a [`Command`].
///
/// `frame` is expected to be exactly one request with no leftover bytes;
/// the connection multiplexer is responsible for framing.
pub fn parse(frame: &[u8]) -> Result<Command, ProtocolError> {
    if frame.len() < 3 {
        return Err(ProtocolError::ShortFrame);
    }
    match &frame[..3] {
        b"set" => parse_set(&frame[3..]),
        b"get" => parse_get(&frame[3..]),
        _ => Err(ProtocolError::UnknownCommand),
    }
}

fn expect_space(rest: &[u8], pos: &mut usize) -> Result<(), ProtocolError> {
    if rest.get(*pos) == Some(&b' ') {
        *pos += 1;
        Ok(())
    } else {
        Err(ProtocolError::Malformed("missing field separator".into()))
    }
}

fn read_field<'a>(rest: &'a [u8], pos: &mut usize, name: &str) -> Result<&'a [u8], ProtocolError> {
    let start = *pos;
    while let Some(&b) = rest.get(*pos) {
        if b == b' ' || b == b'\r' {
            break;
        }
        *pos += 1;
    }
    if *pos == start {
        return Err(ProtocolError::Malformed(format!("missing {name}")));
    }
    Ok(&rest[start..*pos])
}

fn parse_ascii_uint<T: std::str::FromStr>(token: &[u8]) -> Option<T> {
    if token.is_empty() || !token.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(token).ok()?.parse().ok()
}

fn validate_key(key: &[u8]) -> Result<(), ProtocolError> {
    if key.is_empty() {
        return Err(ProtocolError::Malformed("missing key".into()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(ProtocolError::OversizeKey);
    }
    if key.iter().any(|&b| b < 0x20 || b == 0x7F) {
        return Err(ProtocolError::Malformed(
            "key contains a control character".into(),
        ));
    }
    Ok(())
}

fn at_crlf(rest: &[u8], pos: usize) -> bool {
    rest.get(pos..pos + 2) == Some(b"\r\n")
}

fn parse_set(rest: &[u8]) -> Result<Command, ProtocolError> {
    let mut pos = 0usize;
    expect_space(rest, &mut pos)?;

    let key = read_field(rest, &mut pos, "key")?.to_vec();
    validate_key(&key)?;
    expect_space(rest, &mut pos)?;

    let flags_token = read_field(rest, &mut pos, "flags")?;
    let flags: u16 = parse_ascii_uint(flags_token)
        .ok_or_else(|| ProtocolError::Malformed("bad flags value".into()))?;
    expect_space(rest, &mut pos)?;

    let exptime_token = read_field(rest, &mut pos, "exptime")?;
    let exptime: u32 = parse_ascii_uint(exptime_token)
        .ok_or_else(|| ProtocolError::Malformed("bad exptime value".into()))?;
    expect_space(rest, &mut pos)?;

    let bytes_token = read_field(rest, &mut pos, "bytes")?;
    let bytes: usize = parse_ascii_uint(bytes_token)
        .ok_or_else(|| ProtocolError::Malformed("bad bytes value".into()))?;
    if bytes == 0 || bytes > MAX_VALUE_LEN {
        return Err(ProtocolError::OversizeValue);
    }

    while rest.get(pos) == Some(&b' ') {
        pos += 1;
    }

    let noreply = if rest[pos..].starts_with(b"noreply") {
        pos += b"noreply".len();
        true
    } else {
        false
    };

    while rest.get(pos) == Some(&b' ') {
        pos += 1;
    }

    if !at_crlf(rest, pos) {
        return Err(ProtocolError::Malformed(
            "expected end of header line".into(),
        ));
    }
    pos += 2;

    if rest.len() < pos + bytes + 2 {
        return Err(ProtocolError::Malformed(
            "declared byte count exceeds frame".into(),
        ));
    }
    let value = rest[pos..pos + bytes].to_vec();
    pos += bytes;

    if !at_crlf(rest, pos) {
        return Err(ProtocolError::Malformed(
            "value not terminated by CRLF".into(),
        ));
    }
    pos += 2;

    if pos != rest.len() {
        return Err(ProtocolError::Malformed("trailing data after value".into()));
    }

    Ok(Command::Set {
        key,
        flags,
        exptime,
        noreply,
        value,
    })
}

fn parse_get(rest: &[u8]) -> Result<Command, ProtocolError> {
    let mut pos = 0usize;
    expect_space(rest, &mut pos)?;

    let mut keys = Vec::new();
    loop {
        let key = read_field(rest, &mut pos, "key")?;
        validate_key(key)?;
        keys.push(key.to_vec());

        if rest.get(pos) == Some(&b' ') {
            pos += 1;
            continue;
        }
        break;
    }

    if !at_crlf(rest, pos) {
        return Err(ProtocolError::Malformed(
            "expected CRLF after key list".into(),
        ));
    }
    pos += 2;

    if pos != rest.len() {
        return Err(ProtocolError::Malformed(
            "trailing data after get request".into(),
        ));
    }

    Ok(Command::Get { keys })
}
