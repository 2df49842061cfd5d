use std::fs;
use std::path::PathBuf;

use tempfile::tempdir;

use fogo::{load_aof, AofWriter, Buffer, CommandTable, Db, ExecCtx, FsyncPolicy};

/// Dispatch with the writer attached, the way the server wires it.
fn exec_logged(
    db: &mut Db,
    aof: &mut AofWriter,
    table: &CommandTable,
    args: &[&[u8]],
) -> Vec<u8> {
    let argv: Vec<Vec<u8>> = args.iter().map(|a| a.to_vec()).collect();
    let mut out = Buffer::new();
    let mut ctx = ExecCtx {
        db,
        aof: Some(aof),
    };
    table.dispatch(&mut ctx, &mut out, &argv);
    out.readable().to_vec()
}

fn exec_plain(db: &mut Db, table: &CommandTable, args: &[&[u8]]) -> String {
    let argv: Vec<Vec<u8>> = args.iter().map(|a| a.to_vec()).collect();
    let mut out = Buffer::new();
    let mut ctx = ExecCtx { db, aof: None };
    table.dispatch(&mut ctx, &mut out, &argv);
    String::from_utf8_lossy(out.readable()).into_owned()
}

#[test]
fn replay_reproduces_the_keyspace() {
    let dir = tempdir().unwrap();
    let path: PathBuf = dir.path().join("appendonly.aof");
    let table = CommandTable::new();

    {
        let mut db = Db::new();
        let mut aof = AofWriter::new(&path, FsyncPolicy::Always);
        assert!(aof.is_enabled());

        exec_logged(&mut db, &mut aof, &table, &[b"SET", b"a", b"1"]);
        exec_logged(&mut db, &mut aof, &table, &[b"SET", b"a", b"2"]);
        exec_logged(&mut db, &mut aof, &table, &[b"RPUSH", b"l", b"x", b"y"]);
        exec_logged(&mut db, &mut aof, &table, &[b"LPUSH", b"l", b"w"]);
        exec_logged(&mut db, &mut aof, &table, &[b"HSET", b"h", b"f", b"v"]);
        exec_logged(&mut db, &mut aof, &table, &[b"SADD", b"s", b"m1", b"m2"]);
        exec_logged(&mut db, &mut aof, &table, &[b"ZADD", b"z", b"1", b"a", b"2", b"b"]);
        exec_logged(&mut db, &mut aof, &table, &[b"DEL", b"a"]);
        exec_logged(&mut db, &mut aof, &table, &[b"MSET", b"m1", b"x", b"m2", b"y"]);
        exec_logged(&mut db, &mut aof, &table, &[b"INCR", b"count"]);
        exec_logged(&mut db, &mut aof, &table, &[b"INCR", b"count"]);
        exec_logged(&mut db, &mut aof, &table, &[b"RENAME", b"m1", b"m1b"]);
        // The writer fsyncs each append under Always; drop closes the fd.
    }

    let mut db = Db::new();
    let replayed = load_aof(&path, &mut db, &table);
    assert_eq!(replayed, 12);

    assert_eq!(exec_plain(&mut db, &table, &[b"GET", b"a"]), "$-1\r\n");
    assert_eq!(
        exec_plain(&mut db, &table, &[b"LRANGE", b"l", b"0", b"-1"]),
        "*3\r\n$1\r\nw\r\n$1\r\nx\r\n$1\r\ny\r\n"
    );
    assert_eq!(exec_plain(&mut db, &table, &[b"HGET", b"h", b"f"]), "$1\r\nv\r\n");
    assert_eq!(exec_plain(&mut db, &table, &[b"SCARD", b"s"]), ":2\r\n");
    assert_eq!(
        exec_plain(&mut db, &table, &[b"ZRANGE", b"z", b"0", b"-1"]),
        "*2\r\n$1\r\na\r\n$1\r\nb\r\n"
    );
    assert_eq!(exec_plain(&mut db, &table, &[b"GET", b"count"]), "$1\r\n2\r\n");
    assert_eq!(exec_plain(&mut db, &table, &[b"GET", b"m1b"]), "$1\r\nx\r\n");
    assert_eq!(exec_plain(&mut db, &table, &[b"GET", b"m1"]), "$-1\r\n");
    // l, h, s, z, m1b, m2, count
    assert_eq!(exec_plain(&mut db, &table, &[b"DBSIZE"]), ":7\r\n");
}

#[test]
fn noop_writes_are_not_logged() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("appendonly.aof");
    let table = CommandTable::new();

    let mut db = Db::new();
    let mut aof = AofWriter::new(&path, FsyncPolicy::Always);

    // None of these mutate anything.
    exec_logged(&mut db, &mut aof, &table, &[b"DEL", b"missing"]);
    exec_logged(&mut db, &mut aof, &table, &[b"GET", b"missing"]);
    exec_logged(&mut db, &mut aof, &table, &[b"EXPIRE", b"missing", b"10"]);
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);

    // An effective write lands; repeating it as a no-op does not.
    exec_logged(&mut db, &mut aof, &table, &[b"SADD", b"s", b"m"]);
    let after_write = fs::metadata(&path).unwrap().len();
    assert!(after_write > 0);
    exec_logged(&mut db, &mut aof, &table, &[b"SADD", b"s", b"m"]);
    assert_eq!(fs::metadata(&path).unwrap().len(), after_write);
}

#[test]
fn truncated_tail_keeps_the_valid_prefix() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("appendonly.aof");
    let table = CommandTable::new();

    {
        let mut db = Db::new();
        let mut aof = AofWriter::new(&path, FsyncPolicy::Always);
        exec_logged(&mut db, &mut aof, &table, &[b"SET", b"a", b"1"]);
        exec_logged(&mut db, &mut aof, &table, &[b"SET", b"b", b"2"]);
    }

    // Simulate a crash mid-append: garbage after the valid frames.
    let mut bytes = fs::read(&path).unwrap();
    bytes.extend_from_slice(b"*3\r\n$3\r\nSET\r\n$19");
    bytes.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
    fs::write(&path, &bytes).unwrap();

    let mut db = Db::new();
    let replayed = load_aof(&path, &mut db, &table);
    assert_eq!(replayed, 2);
    assert_eq!(exec_plain(&mut db, &table, &[b"GET", b"a"]), "$1\r\n1\r\n");
    assert_eq!(exec_plain(&mut db, &table, &[b"GET", b"b"]), "$1\r\n2\r\n");
    assert_eq!(db.len(), 2);
}

#[test]
fn pure_garbage_tail_after_valid_log() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("appendonly.aof");
    let table = CommandTable::new();

    {
        let mut db = Db::new();
        let mut aof = AofWriter::new(&path, FsyncPolicy::Always);
        exec_logged(&mut db, &mut aof, &table, &[b"SET", b"a", b"1"]);
    }

    let mut bytes = fs::read(&path).unwrap();
    bytes.extend_from_slice(&[0x2a; 42]); // 42 bytes of '*'
    fs::write(&path, &bytes).unwrap();

    let mut db = Db::new();
    load_aof(&path, &mut db, &table);
    assert_eq!(exec_plain(&mut db, &table, &[b"GET", b"a"]), "$1\r\n1\r\n");
}

#[test]
fn missing_file_is_a_fresh_start() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("never-written.aof");
    let table = CommandTable::new();

    let mut db = Db::new();
    assert_eq!(load_aof(&path, &mut db, &table), 0);
    assert!(db.is_empty());
}

#[test]
fn unopenable_path_disables_the_writer() {
    let table = CommandTable::new();
    let mut db = Db::new();

    let mut aof = AofWriter::new("/nonexistent-dir/sub/appendonly.aof", FsyncPolicy::Always);
    assert!(!aof.is_enabled());

    // Appends are silent no-ops; the engine keeps serving.
    exec_logged(&mut db, &mut aof, &table, &[b"SET", b"a", b"1"]);
    assert_eq!(exec_plain(&mut db, &table, &[b"GET", b"a"]), "$1\r\n1\r\n");

    // A rewrite request on a disabled writer is ignored.
    let reply = exec_logged(&mut db, &mut aof, &table, &[b"BGREWRITEAOF"]);
    assert_eq!(
        String::from_utf8_lossy(&reply),
        "+Background append only file rewriting started\r\n"
    );
    assert!(!aof.is_rewriting());
}

#[test]
fn expirations_replay_with_remaining_time() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("appendonly.aof");
    let table = CommandTable::new();

    {
        let mut db = Db::new();
        let mut aof = AofWriter::new(&path, FsyncPolicy::Always);
        exec_logged(&mut db, &mut aof, &table, &[b"SET", b"keep", b"v"]);
        exec_logged(&mut db, &mut aof, &table, &[b"SET", b"gone", b"v"]);
        exec_logged(&mut db, &mut aof, &table, &[b"PEXPIRE", b"gone", b"30"]);
        exec_logged(&mut db, &mut aof, &table, &[b"EXPIRE", b"keep", b"1000"]);
    }

    let mut db = Db::new();
    load_aof(&path, &mut db, &table);

    // Deadlines re-arm relative to replay time: the logged PEXPIRE grants
    // the key another 30ms of life, then it expires for good.
    let pttl = exec_plain(&mut db, &table, &[b"PTTL", b"gone"]);
    let ms: i64 = pttl[1..pttl.len() - 2].parse().unwrap();
    assert!(ms > 0 && ms <= 30);
    std::thread::sleep(std::time::Duration::from_millis(60));
    assert_eq!(exec_plain(&mut db, &table, &[b"GET", b"gone"]), "$-1\r\n");

    assert_eq!(exec_plain(&mut db, &table, &[b"GET", b"keep"]), "$1\r\nv\r\n");
    let ttl = exec_plain(&mut db, &table, &[b"TTL", b"keep"]);
    let secs: i64 = ttl[1..ttl.len() - 2].parse().unwrap();
    assert!(secs > 0);
}
