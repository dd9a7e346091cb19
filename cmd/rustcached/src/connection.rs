//! Per-connection state: the read-side frame accumulator and the write-side
//! reply queue.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use mio::net::TcpStream;

/// `128 KiB` of declared value plus header/overhead room.
pub const MAX_PAYLOAD_LENGTH: usize = 128 * 1024 + 512;

pub enum ReadOutcome {
    Frame(Vec<u8>),
    WouldBlock,
    Closed,
}

pub struct Connection {
    pub stream: TcpStream,
    buf: Vec<u8>,
    pending_writes: VecDeque<Vec<u8>>,
    pub writable_registered: bool,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Connection {
            stream,
            buf: Vec::with_capacity(4096),
            pending_writes: VecDeque::new(),
            writable_registered: false,
        }
    }

    /// Reads until the buffer ends with `\r\n`, is full, or the peer
    /// closes. This does not verify that the CRLF found is actually the
    /// end of a `set` value; a value payload containing `\r\n` ahead of
    /// its true end is mis-framed as a result. That limitation is
    /// inherited deliberately (see DESIGN.md) rather than switched to
    /// header-then-exact-bytes framing, which cannot reproduce the
    /// declared-bytes-mismatch diagnostic this system is required to
    /// produce.
    pub fn read_frame(&mut self) -> io::Result<ReadOutcome> {
        let mut chunk = [0u8; 4096];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Ok(ReadOutcome::Closed),
                Ok(n) => {
                    let remaining = MAX_PAYLOAD_LENGTH.saturating_sub(self.buf.len());
                    let take = n.min(remaining);
                    self.buf.extend_from_slice(&chunk[..take]);

                    let full = self.buf.len() >= MAX_PAYLOAD_LENGTH;
                    let ends_with_crlf = self.buf.ends_with(b"\r\n");
                    if full || ends_with_crlf {
                        let frame = std::mem::take(&mut self.buf);
                        return Ok(ReadOutcome::Frame(frame));
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(ReadOutcome::WouldBlock);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    pub fn queue_write(&mut self, bytes: Vec<u8>) {
        self.pending_writes.push_back(bytes);
    }

    /// Writes as much of the queued replies as the socket accepts right
    /// now. Returns `Ok(true)` once the queue is fully drained, `Ok(false)`
    /// if writable interest should stay registered for later progress.
    pub fn flush(&mut self) -> io::Result<bool> {
        while let Some(front) = self.pending_writes.front_mut() {
            if front.is_empty() {
                self.pending_writes.pop_front();
                continue;
            }
            match self.stream.write(front) {
                Ok(0) => {
                    return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0"));
                }
                Ok(n) if n == front.len() => {
                    self.pending_writes.pop_front();
                }
                Ok(n) => {
                    front.drain(..n);
                    return Ok(false);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }
}
