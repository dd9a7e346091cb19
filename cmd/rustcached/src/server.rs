//! The connection multiplexer (C4): a single reactor thread that owns the
//! listening socket and the live-connection table, reads frames, and
//! dispatches them onto the worker pool.
//!
//! **Reply delivery policy.** Workers format their reply and hand it back
//! to the reactor over a channel (woken via [`mio::Waker`]) rather than
//! writing the socket directly from the worker thread; the reactor is then
//! the only thread that ever touches a connection's `TcpStream`. This is a
//! deliberate departure from writing the reply synchronously from the
//! worker (see DESIGN.md): it keeps the live-connection table and every
//! socket mutation confined to one thread, so a connection can never be
//! removed out from under a worker that is mid-write on it. The tradeoff:
//! when two requests from the same connection are in flight on two
//! different workers, whichever completes first reaches the reactor
//! first, so per-connection reply ordering is not guaranteed.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token, Waker};
use rustcached_cache::{handle_frame, Store, WorkerPool};
use socket2::{Domain, Socket, Type};
use tracing::{debug, info, warn};

use crate::connection::{Connection, ReadOutcome};

const LISTENER_TOKEN: Token = Token(0);
const WAKER_TOKEN: Token = Token(1);
const FIRST_CONNECTION_TOKEN: usize = 2;
const POLL_TIMEOUT: Duration = Duration::from_millis(200);

type Completion = (Token, Vec<u8>);

pub struct Server {
    poll: Poll,
    listener: TcpListener,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    store: Arc<Store>,
    pool: Arc<WorkerPool>,
    shutdown: Arc<AtomicBool>,
    completions: Receiver<Completion>,
    completion_sender: Sender<Completion>,
    waker: Arc<Waker>,
}

impl Server {
    /// Builds the listening socket with `SO_REUSEADDR` and a backlog of 10,
    /// then wraps it for readiness polling.
    pub fn bind(
        addr: SocketAddr,
        store: Arc<Store>,
        pool: Arc<WorkerPool>,
        shutdown: Arc<AtomicBool>,
    ) -> io::Result<Self> {
        let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
        let socket = Socket::new(domain, Type::STREAM, None)?;
        socket.set_reuse_address(true)?;
        if addr.is_ipv6() {
            // Best-effort: dual-stack when the OS allows it.
            let _ = socket.set_only_v6(false);
        }
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.listen(10)?;

        let std_listener: std::net::TcpListener = socket.into();
        let mut listener = TcpListener::from_std(std_listener);

        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN)?);

        let (completion_sender, completions) = unbounded();

        Ok(Server {
            poll,
            listener,
            connections: HashMap::new(),
            next_token: FIRST_CONNECTION_TOKEN,
            store,
            pool,
            shutdown,
            completions,
            completion_sender,
            waker,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the reactor loop until the shutdown flag flips. The poll
    /// timeout bounds how long a shutdown request waits to be noticed.
    pub fn run(&mut self) -> io::Result<()> {
        let mut events = Events::with_capacity(1024);
        while !self.shutdown.load(Ordering::Relaxed) {
            match self.poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                Ok(()) => {}
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER_TOKEN => self.accept_all()?,
                    WAKER_TOKEN => self.drain_completions(),
                    token => {
                        if event.is_writable() {
                            self.flush_and_reregister(token);
                        }
                        if event.is_readable() {
                            self.try_read(token);
                        }
                    }
                }
            }
        }
        info!(live_connections = self.connections.len(), "shutdown requested");
        Ok(())
    }

    fn accept_all(&mut self) -> io::Result<()> {
        loop {
            match self.listener.accept() {
                Ok((mut stream, peer)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    self.poll
                        .registry()
                        .register(&mut stream, token, Interest::READABLE)?;
                    self.connections.insert(token, Connection::new(stream));
                    debug!(%peer, ?token, "accepted connection");
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    return Ok(());
                }
            }
        }
    }

    fn try_read(&mut self, token: Token) {
        loop {
            let outcome = match self.connections.get_mut(&token) {
                Some(connection) => connection.read_frame(),
                None => return,
            };
            match outcome {
                Ok(ReadOutcome::Frame(frame)) => {
                    self.dispatch(token, frame);
                    continue;
                }
                Ok(ReadOutcome::WouldBlock) => return,
                Ok(ReadOutcome::Closed) => {
                    self.remove(token);
                    return;
                }
                Err(err) => {
                    warn!(?token, error = %err, "read failed, closing connection");
                    self.remove(token);
                    return;
                }
            }
        }
    }

    fn dispatch(&self, token: Token, frame: Vec<u8>) {
        let store = Arc::clone(&self.store);
        let sender = self.completion_sender.clone();
        let waker = Arc::clone(&self.waker);
        self.pool.submit(Box::new(move || {
            if let Some(reply) = handle_frame(&frame, &store) {
                let _ = sender.send((token, reply));
                let _ = waker.wake();
            }
        }));
    }

    fn drain_completions(&mut self) {
        let mut touched = Vec::new();
        while let Ok((token, reply)) = self.completions.try_recv() {
            if let Some(connection) = self.connections.get_mut(&token) {
                connection.queue_write(reply);
                touched.push(token);
            }
        }
        for token in touched {
            self.flush_and_reregister(token);
        }
    }

    fn flush_and_reregister(&mut self, token: Token) {
        let Some(connection) = self.connections.get_mut(&token) else {
            return;
        };
        match connection.flush() {
            Ok(true) => {
                if connection.writable_registered {
                    connection.writable_registered = false;
                    let _ = self.poll.registry().reregister(
                        &mut connection.stream,
                        token,
                        Interest::READABLE,
                    );
                }
            }
            Ok(false) => {
                if !connection.writable_registered {
                    connection.writable_registered = true;
                    let _ = self.poll.registry().reregister(
                        &mut connection.stream,
                        token,
                        Interest::READABLE.add(Interest::WRITABLE),
                    );
                }
            }
            Err(err) => {
                warn!(?token, error = %err, "write failed, closing connection");
                self.remove(token);
            }
        }
    }

    fn remove(&mut self, token: Token) {
        if let Some(mut connection) = self.connections.remove(&token) {
            let _ = self.poll.registry().deregister(&mut connection.stream);
        }
    }
}
