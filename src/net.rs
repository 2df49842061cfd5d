/*!
 * Network Layer and Server Loop
 *
 * Owns the listening socket, the connection table, and the main loop that
 * glues the reactor to the engine: accept, read, parse, dispatch, flush,
 * and the periodic housekeeping tick (active expiry, incremental rehash,
 * AOF fsync, rewrite-child reaping).
 *
 * Everything here runs on one thread. The only other runtime entity is the
 * AOF rewrite child process, which shares nothing but its exit status and
 * a temp file.
 */

use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use log::{error, info, warn};
use mio::net::TcpListener;
use mio::{Interest, Token};
use slab::Slab;
use socket2::{Domain, Protocol, Socket, Type};

use crate::aof::{load_aof, AofWriter};
use crate::command::{CommandTable, ExecCtx};
use crate::config::Config;
use crate::conn::Conn;
use crate::db::Db;
use crate::protocol::parse;
use crate::reactor::{Reactor, Ready};

const LISTENER: Token = Token(0);

/// Set from the signal handler, checked at the top of every loop iteration.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_shutdown_signal(_sig: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

/// Ask the server loop to exit as if a shutdown signal had arrived.
pub fn request_shutdown() {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

/// SIGINT/SIGTERM request a clean shutdown; SIGPIPE is ignored so a write
/// to a peer-closed socket fails with EPIPE instead of killing the process.
pub fn install_signal_handlers() {
    let handler = handle_shutdown_signal as extern "C" fn(libc::c_int);
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
    }
}

/// Try for 65536 fds; settle for the hard limit if the OS says no.
fn raise_fd_limit() {
    unsafe {
        let mut rl = libc::rlimit {
            rlim_cur: 65536,
            rlim_max: 65536,
        };
        if libc::setrlimit(libc::RLIMIT_NOFILE, &rl) != 0 {
            if libc::getrlimit(libc::RLIMIT_NOFILE, &mut rl) == 0 {
                rl.rlim_cur = rl.rlim_max;
                if libc::setrlimit(libc::RLIMIT_NOFILE, &rl) != 0 {
                    warn!("could not raise fd limit: {}", io::Error::last_os_error());
                }
            }
        }
    }
}

/// Bind a non-blocking listener through socket2 so the options are set
/// before the first bind (address reuse for quick restarts).
pub fn bind_listener(addr: SocketAddr) -> Result<TcpListener> {
    let domain = match addr {
        SocketAddr::V4(_) => Domain::IPV4,
        SocketAddr::V6(_) => Domain::IPV6,
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    Ok(TcpListener::from_std(socket.into()))
}

pub struct Server {
    config: Config,
    listener: TcpListener,
    reactor: Reactor,
    conns: Slab<Conn>,
    db: Db,
    table: CommandTable,
    aof: AofWriter,
}

impl Server {
    /// Build the full engine: raise limits, replay the log, open the
    /// writer, bind, and register the listener. Failures here are fatal.
    pub fn new(config: Config) -> Result<Server> {
        raise_fd_limit();

        let table = CommandTable::new();
        let mut db = Db::new();
        load_aof(Path::new(&config.aof_path), &mut db, &table);
        let aof = AofWriter::new(config.aof_path.as_str(), config.fsync);

        let addr: SocketAddr = format!("{}:{}", config.host, config.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;
        let mut listener =
            bind_listener(addr).with_context(|| format!("failed to bind {}", addr))?;

        let reactor = Reactor::new(config.tick_interval, config.max_events)?;
        reactor.register(&mut listener, LISTENER, Interest::READABLE)?;
        info!("listening on {}, {} keys loaded", addr, db.len());

        Ok(Server {
            config,
            listener,
            reactor,
            conns: Slab::new(),
            db,
            table,
            aof,
        })
    }

    /// The main loop. Returns after a shutdown signal; a reactor failure
    /// surfaces as the error that tears the process down.
    pub fn run(&mut self) -> Result<()> {
        let mut ready = Vec::with_capacity(self.config.max_events);

        while !shutdown_requested() {
            self.reactor.wait(&mut ready)?;

            for r in &ready {
                if r.token == LISTENER {
                    self.accept_ready();
                } else {
                    self.conn_ready(*r);
                }
            }

            if self.reactor.tick_due() {
                self.db.active_expire(self.config.active_expire_batch);
                self.db.rehash_step();
                self.aof.tick();
                self.aof.poll_rewrite_child();
            }

            self.reap_closed();
        }

        self.shutdown();
        Ok(())
    }

    /// Drain the accept queue completely; the listener event does not
    /// repeat for connections already pending.
    fn accept_ready(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut socket, _peer)) => {
                    socket.set_nodelay(true).ok();
                    let entry = self.conns.vacant_entry();
                    let token = Token(entry.key() + 1);
                    if let Err(e) = self.reactor.register(&mut socket, token, Interest::READABLE)
                    {
                        error!("failed to register client socket: {}", e);
                        continue;
                    }
                    entry.insert(Conn::new(socket));
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("accept failed: {}", e);
                    break;
                }
            }
        }
    }

    /// Service one client's readiness: read, dispatch pipelined frames,
    /// flush, and update the registration to match what is left to do.
    fn conn_ready(&mut self, r: Ready) {
        let key = r.token.0 - 1;
        let Some(conn) = self.conns.get_mut(key) else {
            return; // stale event for a connection closed this iteration
        };

        if r.error {
            conn.want_close = true;
            return;
        }

        if r.readable && conn.want_read {
            if !conn.handle_read() {
                // EOF or hard read error. Stop reading but keep the
                // connection until its buffered replies are flushed.
                conn.want_read = false;
            }

            // Dispatch every complete frame already in the buffer, in
            // arrival order, before flushing anything (pipelining).
            loop {
                let Some(args) = parse(&mut conn.incoming) else {
                    break;
                };
                if args.is_empty() {
                    continue;
                }
                let mut ctx = ExecCtx {
                    db: &mut self.db,
                    aof: Some(&mut self.aof),
                };
                self.table.dispatch(&mut ctx, &mut conn.outgoing, &args);
            }
        }

        if r.writable && !conn.want_close && !conn.handle_write() {
            conn.want_close = true;
        }

        // Eager flush: the registration is edge-triggered, so output
        // produced this iteration is pushed now and WRITABLE interest only
        // backstops whatever the kernel would not take.
        if !conn.want_close && conn.outgoing.readable_len() > 0 && !conn.handle_write() {
            conn.want_close = true;
        }
        conn.want_write = conn.outgoing.readable_len() > 0;

        // Read side finished and nothing left to send: we are done here.
        if !conn.want_read && conn.outgoing.is_empty() {
            conn.want_close = true;
        }
        if conn.want_close {
            return;
        }

        let interest = match (conn.want_read, conn.want_write) {
            (true, true) => Interest::READABLE | Interest::WRITABLE,
            (true, false) => Interest::READABLE,
            (false, true) => Interest::WRITABLE,
            (false, false) => {
                conn.want_close = true;
                return;
            }
        };
        if self.reactor.reregister(&mut conn.socket, r.token, interest).is_err() {
            conn.want_close = true;
        }
    }

    /// Tear down every connection marked for close this iteration.
    fn reap_closed(&mut self) {
        let doomed: Vec<usize> = self
            .conns
            .iter()
            .filter(|(_, c)| c.want_close)
            .map(|(k, _)| k)
            .collect();
        for key in doomed {
            let mut conn = self.conns.remove(key);
            let _ = self.reactor.deregister(&mut conn.socket);
            // Dropping the stream closes the fd.
        }
    }

    fn shutdown(&mut self) {
        info!("shutting down, closing {} connections", self.conns.len());
        let keys: Vec<usize> = self.conns.iter().map(|(k, _)| k).collect();
        for key in keys {
            let mut conn = self.conns.remove(key);
            let _ = self.reactor.deregister(&mut conn.socket);
        }
        // The AOF writer fsyncs on drop; nothing else holds state.
    }

    /// Connections currently alive (test and introspection hook).
    pub fn connection_count(&self) -> usize {
        self.conns.len()
    }

    /// The address the listener actually bound (port 0 resolves here).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}
