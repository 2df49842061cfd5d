/*!
 * Client Connection
 *
 * Wraps one non-blocking TCP stream together with its incoming and
 * outgoing buffers and the three lifecycle flags the event loop steers by.
 * The read and write drivers drain until the kernel reports WouldBlock
 * (registration is edge-triggered, so a partial drain would lose the edge).
 */

use std::io::{Read, Write};
use std::time::Instant;

use mio::net::TcpStream;

use crate::buffer::Buffer;

/// Bytes of writable space guaranteed before each read syscall.
const READ_CHUNK: usize = 4096;

pub struct Conn {
    pub socket: TcpStream,
    pub incoming: Buffer,
    pub outgoing: Buffer,
    /// Cleared when the peer shuts its write side down.
    pub want_read: bool,
    /// Set while the outgoing buffer holds bytes the kernel would not take.
    pub want_write: bool,
    /// Marks the connection for teardown at the end of the iteration.
    pub want_close: bool,
    pub last_activity: Instant,
}

impl Conn {
    pub fn new(socket: TcpStream) -> Self {
        Conn {
            socket,
            // Both buffers start unallocated; an idle connection costs
            // nothing until it actually sends bytes.
            incoming: Buffer::new(),
            outgoing: Buffer::new(),
            want_read: true,
            want_write: false,
            want_close: false,
            last_activity: Instant::now(),
        }
    }

    /// Pull everything currently available into the incoming buffer.
    ///
    /// Returns false when the read side is finished: the peer closed (EOF)
    /// or a non-retryable error occurred. WouldBlock ends the drain and
    /// keeps the connection alive; Interrupted retries immediately.
    pub fn handle_read(&mut self) -> bool {
        loop {
            self.incoming.ensure_writable(READ_CHUNK);
            match self.socket.read(self.incoming.writable_mut()) {
                Ok(0) => return false,
                Ok(n) => {
                    self.incoming.commit_write(n);
                    self.last_activity = Instant::now();
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return true,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => return false,
            }
        }
    }

    /// Push buffered output to the kernel until it is gone or would block.
    ///
    /// Returns false only on a hard error (EPIPE, ECONNRESET, ...); SIGPIPE
    /// is suppressed process-wide, so a dead peer surfaces here as an
    /// ordinary error result rather than a signal.
    pub fn handle_write(&mut self) -> bool {
        while self.outgoing.readable_len() > 0 {
            match self.socket.write(self.outgoing.readable()) {
                Ok(0) => return true,
                Ok(n) => {
                    self.outgoing.consume(n);
                    self.last_activity = Instant::now();
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return true,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => return false,
            }
        }
        true
    }
}
