//! Black-box protocol tests driving the real binary over a loopback TCP
//! socket, in the spirit of the original's throwaway client programs, but
//! committed as ordinary `#[test]`s instead of separate client binaries.
#![allow(clippy::unwrap_used)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

struct ServerProcess {
    child: Child,
    addr: String,
}

impl ServerProcess {
    fn spawn() -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_rustcached"))
            .arg("--port")
            .arg("0")
            .arg("--capacity")
            .arg("2")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to spawn rustcached");

        let stdout = child.stdout.take().expect("piped stdout");
        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        reader.read_line(&mut line).expect("read startup banner");
        let addr = line
            .trim()
            .strip_prefix("listening on ")
            .expect("unexpected startup banner format")
            .to_string();

        ServerProcess { child, addr }
    }

    fn connect(&self) -> TcpStream {
        TcpStream::connect(&self.addr).expect("connect to server")
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn read_reply(stream: &mut TcpStream) -> Vec<u8> {
    stream
        .set_read_timeout(Some(Duration::from_millis(500)))
        .expect("set read timeout");
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(ref e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                break;
            }
            Err(e) => panic!("read failed: {e}"),
        }
    }
    buf
}

#[test]
fn seed_1_basic_store_and_fetch() {
    let server = ServerProcess::spawn();
    let mut conn = server.connect();

    conn.write_all(b"set tutorialspoint 0 900 9\r\nmemcached\r\n")
        .unwrap();
    assert_eq!(read_reply(&mut conn), b"STORED\r\n");

    conn.write_all(b"get tutorialspoint\r\n").unwrap();
    assert_eq!(
        read_reply(&mut conn),
        b"VALUE tutorialspoint 0 9\r\nmemcached\r\n"
    );
}

#[test]
fn seed_2_noreply_accepted() {
    let server = ServerProcess::spawn();
    let mut conn = server.connect();

    conn.write_all(b"set tutorialspoint 0 900 9 noreply\r\nmemcached\r\n")
        .unwrap();

    conn.write_all(b"get tutorialspoint\r\n").unwrap();
    assert_eq!(
        read_reply(&mut conn),
        b"VALUE tutorialspoint 0 9\r\nmemcached\r\n"
    );
}

#[test]
fn seed_3_control_char_in_key_rejected() {
    let server = ServerProcess::spawn();
    let mut conn = server.connect();

    conn.write_all(b"set tutorials\x07point 0 900 9 noreply\r\nmemcached\r\n")
        .unwrap();
    let reply = read_reply(&mut conn);
    assert!(reply.starts_with(b"CLIENT_ERROR"));
}

#[test]
fn seed_4_declared_bytes_mismatch_rejected() {
    let server = ServerProcess::spawn();
    let mut conn = server.connect();

    conn.write_all(b"set tutorialspoint 0 900 15 noreply\r\nmemcached\r\n")
        .unwrap();
    let reply = read_reply(&mut conn);
    assert!(reply.starts_with(b"CLIENT_ERROR"));
}

#[test]
fn seed_5_multi_key_get_partial_hit() {
    let server = ServerProcess::spawn();
    let mut conn = server.connect();

    conn.write_all(b"set tutorialspoint 0 900 9\r\nmemcached\r\n")
        .unwrap();
    assert_eq!(read_reply(&mut conn), b"STORED\r\n");

    conn.write_all(b"get xyz tutorialspoint\r\n").unwrap();
    assert_eq!(
        read_reply(&mut conn),
        b"VALUE tutorialspoint 0 9\r\nmemcached\r\n"
    );
}

/// Documents the known mis-framing for a value payload that contains an
/// embedded `\r\n`: the frame reader cuts the frame at the first line
/// ending it sees, not at the declared byte count, so a value sent across
/// two writes with a `\r\n` inside it gets split into two bogus requests
/// instead of the one `set` the client meant to send.
#[test]
fn value_containing_embedded_crlf_is_mis_framed() {
    let server = ServerProcess::spawn();
    let mut conn = server.connect();

    // The client intends a single `set` with an 8-byte value "abc\r\ndef",
    // but sends it in two writes that happen to split right after the
    // embedded CRLF.
    conn.write_all(b"set k 0 900 8\r\nabc\r\n").unwrap();
    std::thread::sleep(Duration::from_millis(100));
    conn.write_all(b"def\r\n").unwrap();

    // First "frame" is read as everything up through that embedded CRLF,
    // which is short of the declared 8 bytes.
    let first_reply = read_reply(&mut conn);
    assert!(first_reply.starts_with(b"CLIENT_ERROR"));

    // The leftover "def\r\n" is then read as its own frame and rejected as
    // an unrecognized command, rather than being appended to the value.
    let second_reply = read_reply(&mut conn);
    assert_eq!(second_reply, b"ERROR\r\n");
}

#[test]
fn seed_6_lru_eviction_under_capacity_two() {
    let server = ServerProcess::spawn();
    let mut conn = server.connect();

    for (key, value) in [("1", "aaaaaaaaa"), ("2", "bbbbbbbbb"), ("3", "ccccccccc")] {
        conn.write_all(format!("set {key} 0 900 9\r\n{value}\r\n").as_bytes())
            .unwrap();
        assert_eq!(read_reply(&mut conn), b"STORED\r\n");
    }

    conn.write_all(b"get 1\r\n").unwrap();
    assert_eq!(read_reply(&mut conn), b"");

    conn.write_all(b"get 2\r\n").unwrap();
    assert_eq!(read_reply(&mut conn), b"VALUE 2 0 9\r\nbbbbbbbbb\r\n");

    conn.write_all(b"get 3\r\n").unwrap();
    assert_eq!(read_reply(&mut conn), b"VALUE 3 0 9\r\nccccccccc\r\n");
}
