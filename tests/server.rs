//! End-to-end over a real socket: the reactor, connection drivers, codec,
//! and dispatcher wired together the way the binary runs them.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use tempfile::tempdir;

use fogo::{request_shutdown, Config, Server};

fn read_exactly(sock: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut out = vec![0u8; n];
    let mut got = 0;
    let deadline = Instant::now() + Duration::from_secs(5);
    while got < n {
        assert!(Instant::now() < deadline, "timed out waiting for {} bytes", n);
        match sock.read(&mut out[got..]) {
            Ok(0) => panic!("server closed the connection early"),
            Ok(k) => got += k,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(e) => panic!("read error: {}", e),
        }
    }
    out
}

#[test]
fn serves_pipelined_commands_over_tcp() {
    let dir = tempdir().unwrap();
    let config = Config {
        port: 0, // kernel-assigned, read back below
        aof_path: dir
            .path()
            .join("appendonly.aof")
            .to_string_lossy()
            .into_owned(),
        ..Config::default()
    };

    let server = Server::new(config).unwrap();
    let addr = server.local_addr().unwrap();
    assert_eq!(server.connection_count(), 0);
    let handle = std::thread::spawn(move || {
        let mut server = server;
        server.run().unwrap();
    });

    let mut sock = TcpStream::connect(addr).unwrap();
    sock.set_read_timeout(Some(Duration::from_millis(200))).unwrap();

    // One buffer, three frames: they answer in order.
    sock.write_all(
        b"*1\r\n$4\r\nPING\r\n*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n*2\r\n$3\r\nGET\r\n$1\r\nk\r\n",
    )
    .unwrap();
    let expected = b"+PONG\r\n+OK\r\n$1\r\nv\r\n";
    assert_eq!(read_exactly(&mut sock, expected.len()), expected.to_vec());

    // An unknown command errors without dropping the session.
    sock.write_all(b"*1\r\n$4\r\nNOPE\r\n*1\r\n$4\r\nPING\r\n").unwrap();
    let expected = b"-ERR unknown command 'NOPE'\r\n+PONG\r\n";
    assert_eq!(read_exactly(&mut sock, expected.len()), expected.to_vec());

    // Inline framing works on the same connection.
    sock.write_all(b"GET k\r\n").unwrap();
    let expected = b"$1\r\nv\r\n";
    assert_eq!(read_exactly(&mut sock, expected.len()), expected.to_vec());

    // A second client sees the first client's writes; a torn frame from
    // the first client stays buffered without blocking anyone.
    sock.write_all(b"*2\r\n$3\r\nGET\r\n$1").unwrap();
    let mut sock2 = TcpStream::connect(addr).unwrap();
    sock2.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
    sock2.write_all(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n").unwrap();
    let expected = b"$1\r\nv\r\n";
    assert_eq!(read_exactly(&mut sock2, expected.len()), expected.to_vec());

    // Completing the torn frame finishes that pipeline too.
    sock.write_all(b"\r\nk\r\n").unwrap();
    let expected = b"$1\r\nv\r\n";
    assert_eq!(read_exactly(&mut sock, expected.len()), expected.to_vec());

    drop(sock);
    drop(sock2);
    request_shutdown();
    handle.join().unwrap();
}
