/*!
 * Append-Only File Persistence
 *
 * Every effective write command is appended to the log in its RESP wire
 * form, so the startup loader is nothing more than the normal parser and
 * dispatcher pointed at a file. Durability is tunable (fsync always, once
 * per second, or never), and the log is compacted online: a forked child
 * writes a minimal snapshot while the parent keeps serving, buffering the
 * frames written after the fork for a merge when the child finishes.
 *
 * Persistence failures never take the server down. A writer that cannot
 * open or append its file logs the problem once and goes quiet for the
 * rest of the process; in-memory service continues.
 */

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::buffer::Buffer;
use crate::command::{CommandTable, ExecCtx};
use crate::db::{now_ms, Db};
use crate::protocol::{encode_command, format_score, parse};
use crate::value::Value;

/// Durability vs throughput knob.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FsyncPolicy {
    /// fsync after every append. Safest, slowest.
    Always,
    /// fsync from the reactor tick once a second. The default.
    EverySec,
    /// Leave flushing entirely to the OS.
    No,
}

/// Live state of an in-flight background rewrite.
struct RewriteState {
    child_pid: libc::pid_t,
    temp_path: PathBuf,
    /// Frames appended to the live log since the fork, replayed onto the
    /// temp file before the swap.
    buffer: VecDeque<Vec<u8>>,
}

pub struct AofWriter {
    path: PathBuf,
    /// None means persistence is disabled (open or write failure).
    file: Option<File>,
    policy: FsyncPolicy,
    last_fsync: Instant,
    rewrite: Option<RewriteState>,
}

impl AofWriter {
    /// Open (or create) the log for appending. On failure the writer comes
    /// up disabled and the server runs memory-only.
    pub fn new(path: impl Into<PathBuf>, policy: FsyncPolicy) -> Self {
        let path = path.into();
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => Some(f),
            Err(e) => {
                error!(
                    "failed to open aof '{}', persistence disabled: {}",
                    path.display(),
                    e
                );
                None
            }
        };
        AofWriter {
            path,
            file,
            policy,
            last_fsync: Instant::now(),
            rewrite: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    pub fn is_rewriting(&self) -> bool {
        self.rewrite.is_some()
    }

    /// Append one command, already executed, to the log.
    pub fn log(&mut self, args: &[Vec<u8>]) {
        if self.file.is_none() {
            return;
        }
        let frame = encode_command(args);
        if let Err(e) = self.append_frame(&frame) {
            error!("aof append failed, persistence disabled: {}", e);
            self.file = None;
            return;
        }
        if let Some(rw) = self.rewrite.as_mut() {
            rw.buffer.push_back(frame);
        }
    }

    fn append_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        file.write_all(frame)?;
        if self.policy == FsyncPolicy::Always {
            file.sync_data()?;
            self.last_fsync = Instant::now();
        }
        Ok(())
    }

    /// Reactor-tick hook: under EverySec, fsync once the second is up.
    pub fn tick(&mut self) {
        if self.policy != FsyncPolicy::EverySec {
            return;
        }
        if self.last_fsync.elapsed() < Duration::from_millis(1000) {
            return;
        }
        let Some(file) = self.file.as_mut() else {
            return;
        };
        if let Err(e) = file.sync_data() {
            error!("aof fsync failed, persistence disabled: {}", e);
            self.file = None;
            return;
        }
        self.last_fsync = Instant::now();
    }

    /// Start a background rewrite. No-op while one is already running or
    /// when persistence is disabled.
    pub fn trigger_rewrite(&mut self, db: &mut Db) {
        if self.file.is_none() || self.rewrite.is_some() {
            return;
        }

        let temp_path = self.temp_rewrite_path();
        let pid = unsafe { libc::fork() };
        if pid < 0 {
            warn!("aof rewrite fork failed: {}", io::Error::last_os_error());
            return;
        }

        if pid == 0 {
            // Child: it owns a copy-on-write snapshot of the keyspace as of
            // this instant. Write it out and leave through _exit so no
            // parent-owned destructor (or the inherited log fd) is touched.
            let code = match write_snapshot(db, &temp_path) {
                Ok(()) => 0,
                Err(_) => 1,
            };
            unsafe { libc::_exit(code) };
        }

        info!(
            "aof rewrite started, child pid {} writing {}",
            pid,
            temp_path.display()
        );
        self.rewrite = Some(RewriteState {
            child_pid: pid,
            temp_path,
            buffer: VecDeque::new(),
        });
    }

    /// Reactor-tick hook: reap the rewrite child without blocking and, on
    /// success, merge the post-fork frames and swap the files atomically.
    pub fn poll_rewrite_child(&mut self) {
        let pid = match &self.rewrite {
            Some(rw) => rw.child_pid,
            None => return,
        };

        let mut status: libc::c_int = 0;
        let reaped = unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) };
        if reaped == 0 {
            return; // still running
        }

        let Some(rw) = self.rewrite.take() else {
            return;
        };

        let child_ok =
            reaped == pid && libc::WIFEXITED(status) && libc::WEXITSTATUS(status) == 0;
        if !child_ok {
            warn!("aof rewrite child failed (status {}), keeping old log", status);
            let _ = fs::remove_file(&rw.temp_path);
            return;
        }

        match self.install_rewrite(&rw) {
            Ok(file) => {
                // The replaced fd closes here; the log now points at the
                // compacted file.
                self.file = Some(file);
                self.last_fsync = Instant::now();
                info!("aof rewrite complete, {} merged frames", rw.buffer.len());
            }
            Err(e) => {
                warn!("aof rewrite install failed, keeping old log: {}", e);
                let _ = fs::remove_file(&rw.temp_path);
            }
        }
    }

    /// Append the buffered frames to the temp file, persist it, and rename
    /// it over the live path. The live fd is only replaced after the merged
    /// file is fully durable and in place.
    fn install_rewrite(&self, rw: &RewriteState) -> io::Result<File> {
        let mut temp = OpenOptions::new().append(true).open(&rw.temp_path)?;
        for frame in &rw.buffer {
            temp.write_all(frame)?;
        }
        temp.sync_data()?;
        drop(temp);

        fs::rename(&rw.temp_path, &self.path)?;
        OpenOptions::new().create(true).append(true).open(&self.path)
    }

    fn temp_rewrite_path(&self) -> PathBuf {
        let name = format!("temp-rewrite-{}.aof", std::process::id());
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(name),
            _ => PathBuf::from(name),
        }
    }
}

impl Drop for AofWriter {
    fn drop(&mut self) {
        if let Some(file) = self.file.as_mut() {
            let _ = file.sync_data();
        }
    }
}

/// Write a fresh log that rebuilds the current keyspace: one reconstruction
/// command per key (plus PEXPIRE for keys carrying a deadline), in the wire
/// form the loader already understands.
fn write_snapshot(db: &mut Db, path: &Path) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;

    let now = now_ms();
    for key in db.keys() {
        // A key can lazily expire between the snapshot of the key list and
        // this lookup; it then simply has no place in the new log.
        let Some(entry) = db.find_entry(&key) else {
            continue;
        };
        let expire_at = entry.expire_at;

        let argv: Vec<Vec<u8>> = match &entry.value {
            Value::Str(s) => {
                vec![b"SET".to_vec(), key.clone(), s.to_vec()]
            }
            Value::List(list) => {
                if list.is_empty() {
                    continue;
                }
                let mut argv = Vec::with_capacity(2 + list.len());
                argv.push(b"RPUSH".to_vec());
                argv.push(key.clone());
                // Head-to-tail order, so replaying the single RPUSH
                // reproduces the list exactly.
                argv.extend(list.iter().cloned());
                argv
            }
            Value::Hash(hash) => {
                if hash.is_empty() {
                    continue;
                }
                let mut argv = Vec::with_capacity(2 + hash.len() * 2);
                argv.push(b"HSET".to_vec());
                argv.push(key.clone());
                for (field, val) in hash {
                    argv.push(field.clone());
                    argv.push(val.clone());
                }
                argv
            }
            Value::Set(set) => {
                if set.is_empty() {
                    continue;
                }
                let mut argv = Vec::with_capacity(2 + set.len());
                argv.push(b"SADD".to_vec());
                argv.push(key.clone());
                argv.extend(set.iter().cloned());
                argv
            }
            Value::ZSet(zset) => {
                if zset.is_empty() {
                    continue;
                }
                let mut argv = Vec::with_capacity(2 + zset.len() * 2);
                argv.push(b"ZADD".to_vec());
                argv.push(key.clone());
                // Ascending rank order: replay re-inserts members in the
                // same total order the live index holds them.
                for (member, score) in zset.index.range_by_rank(0, zset.len() as i64 - 1) {
                    argv.push(format_score(score).into_bytes());
                    argv.push(member);
                }
                argv
            }
        };

        file.write_all(&encode_command(&argv))?;

        if expire_at >= 0 {
            let remaining = expire_at - now;
            if remaining > 0 {
                let pexpire = vec![
                    b"PEXPIRE".to_vec(),
                    key.clone(),
                    remaining.to_string().into_bytes(),
                ];
                file.write_all(&encode_command(&pexpire))?;
            }
        }
    }

    file.sync_data()
}

/// Replay the log at startup. The dispatcher runs with the AOF detached so
/// replayed commands are not re-logged, and replies go nowhere.
///
/// A torn tail (crash mid-append) is expected: the valid prefix is kept and
/// the leftover bytes are reported. A missing file is a fresh start.
pub fn load_aof(path: &Path, db: &mut Db, table: &CommandTable) -> usize {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("no aof at '{}', starting fresh", path.display());
            return 0;
        }
        Err(e) => {
            warn!("failed to read aof '{}': {}", path.display(), e);
            return 0;
        }
    };

    let mut buf = Buffer::new();
    buf.append(&data);
    let mut sink = Buffer::new();
    let mut count = 0usize;

    while buf.readable_len() > 0 {
        let Some(args) = parse(&mut buf) else {
            break;
        };
        if args.is_empty() {
            continue;
        }
        let mut ctx = ExecCtx {
            db: &mut *db,
            aof: None,
        };
        table.dispatch(&mut ctx, &mut sink, &args);
        let produced = sink.readable_len();
        sink.consume(produced);
        count += 1;
    }

    let leftover = buf.readable_len();
    if leftover > 0 {
        warn!(
            "aof '{}' has a truncated or corrupt tail; replayed {} commands, discarded {} trailing bytes",
            path.display(),
            count,
            leftover
        );
    } else {
        info!("aof: replayed {} commands from '{}'", count, path.display());
    }
    count
}
