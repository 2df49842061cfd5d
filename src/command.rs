/*!
 * Command Dispatch and Handlers
 *
 * A registry maps uppercase command names to handler functions, validated
 * by arity (positive = exact argument count, negative = minimum). Every
 * handler writes exactly one RESP reply into the connection's outgoing
 * buffer and reports whether it mutated the keyspace; the dispatcher
 * appends the original argv to the append-only file only for write
 * commands that actually changed something.
 */

use hashbrown::HashMap;

use crate::aof::AofWriter;
use crate::buffer::Buffer;
use crate::db::{now_ms, Db};
use crate::protocol::{
    format_score, write_array_header, write_bulk, write_error, write_integer, write_null,
    write_simple,
};
use crate::value::{Str, Value};

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";
const ERR_NOT_INT: &str = "ERR value is not an integer or out of range";
const ERR_NOT_FLOAT: &str = "ERR value is not a valid float";

/// Everything a handler may touch. The AOF is optional so the loader can
/// replay commands with logging detached.
pub struct ExecCtx<'a> {
    pub db: &'a mut Db,
    pub aof: Option<&'a mut AofWriter>,
}

/// Returns true when the command mutated the keyspace (the signal the
/// dispatcher uses to decide whether the argv belongs in the AOF).
type Handler = fn(&mut ExecCtx, &mut Buffer, &[Vec<u8>]) -> bool;

struct CommandSpec {
    name: &'static str,
    arity: i32,
    is_write: bool,
    handler: Handler,
}

pub struct CommandTable {
    table: HashMap<&'static [u8], CommandSpec>,
}

impl CommandTable {
    pub fn new() -> Self {
        let mut t = CommandTable {
            table: HashMap::new(),
        };

        // strings
        t.register("PING", -1, false, cmd_ping);
        t.register("SET", 3, true, cmd_set);
        t.register("GET", 2, false, cmd_get);
        t.register("INCR", 2, true, cmd_incr);
        t.register("MGET", -2, false, cmd_mget);
        t.register("MSET", -3, true, cmd_mset);

        // keyspace
        t.register("DEL", -2, true, cmd_del);
        t.register("RENAME", 3, true, cmd_rename);
        t.register("EXISTS", -2, false, cmd_exists);
        t.register("KEYS", 2, false, cmd_keys);
        t.register("EXPIRE", 3, true, cmd_expire);
        t.register("PEXPIRE", 3, true, cmd_pexpire);
        t.register("TTL", 2, false, cmd_ttl);
        t.register("PTTL", 2, false, cmd_pttl);
        t.register("DBSIZE", 1, false, cmd_dbsize);

        // lists
        t.register("LPUSH", -3, true, cmd_lpush);
        t.register("RPUSH", -3, true, cmd_rpush);
        t.register("LPOP", 2, true, cmd_lpop);
        t.register("RPOP", 2, true, cmd_rpop);
        t.register("LLEN", 2, false, cmd_llen);
        t.register("LRANGE", 4, false, cmd_lrange);

        // hashes
        t.register("HSET", -4, true, cmd_hset);
        t.register("HGET", 3, false, cmd_hget);
        t.register("HDEL", -3, true, cmd_hdel);
        t.register("HGETALL", 2, false, cmd_hgetall);
        t.register("HLEN", 2, false, cmd_hlen);

        // sets
        t.register("SADD", -3, true, cmd_sadd);
        t.register("SREM", -3, true, cmd_srem);
        t.register("SISMEMBER", 3, false, cmd_sismember);
        t.register("SMEMBERS", 2, false, cmd_smembers);
        t.register("SCARD", 2, false, cmd_scard);

        // sorted sets
        t.register("ZADD", -4, true, cmd_zadd);
        t.register("ZSCORE", 3, false, cmd_zscore);
        t.register("ZRANK", 3, false, cmd_zrank);
        t.register("ZRANGE", -4, false, cmd_zrange);
        t.register("ZCARD", 2, false, cmd_zcard);
        t.register("ZREM", -3, true, cmd_zrem);

        // admin
        t.register("BGREWRITEAOF", 1, false, cmd_bgrewriteaof);

        t
    }

    fn register(&mut self, name: &'static str, arity: i32, is_write: bool, handler: Handler) {
        self.table.insert(
            name.as_bytes(),
            CommandSpec {
                name,
                arity,
                is_write,
                handler,
            },
        );
    }

    /// Look up, arity-check, execute, and (for effective writes) log.
    ///
    /// Error replies leave the connection usable; later frames in the same
    /// pipeline keep dispatching.
    pub fn dispatch(&self, ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) {
        if args.is_empty() {
            return;
        }

        let name = args[0].to_ascii_uppercase();
        let Some(spec) = self.table.get(name.as_slice()) else {
            write_error(
                out,
                &format!(
                    "ERR unknown command '{}'",
                    String::from_utf8_lossy(&args[0])
                ),
            );
            return;
        };

        let argc = args.len() as i32;
        let arity_ok = if spec.arity > 0 {
            argc == spec.arity
        } else {
            argc >= -spec.arity
        };
        if !arity_ok {
            write_error(
                out,
                &format!("ERR wrong number of arguments for '{}' command", spec.name),
            );
            return;
        }

        let mutated = (spec.handler)(ctx, out, args);

        // A write command that changed the keyspace is journaled after the
        // fact; commands that turned out to be no-ops (DEL of a missing
        // key, SADD of present members) leave no trace in the log.
        if mutated && spec.is_write {
            if let Some(aof) = ctx.aof.as_deref_mut() {
                aof.log(args);
            }
        }
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        CommandTable::new()
    }
}

//
// Argument helpers
//

fn parse_int(arg: &[u8]) -> Option<i64> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}

fn parse_score(arg: &[u8]) -> Option<f64> {
    let v: f64 = std::str::from_utf8(arg).ok()?.parse().ok()?;
    // NaN would poison the ordered index.
    if v.is_nan() {
        None
    } else {
        Some(v)
    }
}

//
// Strings
//

fn cmd_ping(_ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    if args.len() == 1 {
        write_simple(out, "PONG");
    } else {
        write_bulk(out, &args[1]);
    }
    false
}

fn cmd_set(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    ctx.db.set_string(&args[1], &args[2]);
    write_simple(out, "OK");
    true
}

fn cmd_get(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    match ctx.db.find_entry(&args[1]) {
        None => write_null(out),
        Some(entry) => match &entry.value {
            Value::Str(s) => write_bulk(out, &s.to_vec()),
            _ => write_error(out, WRONGTYPE),
        },
    }
    false
}

fn cmd_incr(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    match ctx.db.find_entry(&args[1]) {
        None => {
            // A missing key counts up from zero.
            ctx.db.set_string(&args[1], b"1");
            write_integer(out, 1);
            true
        }
        Some(entry) => match &mut entry.value {
            Value::Str(Str::Int(v)) => {
                let Some(next) = v.checked_add(1) else {
                    write_error(out, "ERR increment or decrement would overflow");
                    return false;
                };
                *v = next;
                write_integer(out, next);
                true
            }
            Value::Str(Str::Raw(_)) => {
                write_error(out, ERR_NOT_INT);
                false
            }
            _ => {
                write_error(out, WRONGTYPE);
                false
            }
        },
    }
}

fn cmd_mget(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    write_array_header(out, (args.len() - 1) as i64);
    for key in &args[1..] {
        match ctx.db.find_entry(key) {
            Some(entry) => match &entry.value {
                Value::Str(s) => write_bulk(out, &s.to_vec()),
                // Non-string keys read as null here, not as an error.
                _ => write_null(out),
            },
            None => write_null(out),
        }
    }
    false
}

fn cmd_mset(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    if (args.len() - 1) % 2 != 0 {
        write_error(out, "ERR wrong number of arguments for 'mset' command");
        return false;
    }
    for pair in args[1..].chunks(2) {
        ctx.db.set_string(&pair[0], &pair[1]);
    }
    write_simple(out, "OK");
    true
}

//
// Keyspace
//

fn cmd_del(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    let mut removed = 0i64;
    for key in &args[1..] {
        if ctx.db.del(key) {
            removed += 1;
        }
    }
    write_integer(out, removed);
    removed > 0
}

fn cmd_rename(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    if ctx.db.rename(&args[1], &args[2]) {
        write_simple(out, "OK");
        true
    } else {
        write_error(out, "ERR no such key");
        false
    }
}

fn cmd_exists(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    let mut present = 0i64;
    for key in &args[1..] {
        if ctx.db.exists(key) {
            present += 1;
        }
    }
    write_integer(out, present);
    false
}

fn cmd_keys(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    // Only the "*" pattern is supported; anything else matches nothing.
    if args[1] != b"*" {
        write_array_header(out, 0);
        return false;
    }
    let keys = ctx.db.keys();
    write_array_header(out, keys.len() as i64);
    for key in &keys {
        write_bulk(out, key);
    }
    false
}

fn cmd_expire(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    let Some(seconds) = parse_int(&args[2]) else {
        write_error(out, ERR_NOT_INT);
        return false;
    };
    let deadline = now_ms().saturating_add(seconds.saturating_mul(1000));
    let armed = ctx.db.set_expire(&args[1], deadline);
    write_integer(out, armed as i64);
    armed
}

fn cmd_pexpire(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    let Some(millis) = parse_int(&args[2]) else {
        write_error(out, ERR_NOT_INT);
        return false;
    };
    let deadline = now_ms().saturating_add(millis);
    let armed = ctx.db.set_expire(&args[1], deadline);
    write_integer(out, armed as i64);
    armed
}

fn cmd_ttl(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    let remaining = ctx.db.ttl_ms(&args[1]);
    if remaining < 0 {
        write_integer(out, remaining);
    } else {
        write_integer(out, remaining / 1000);
    }
    false
}

fn cmd_pttl(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    write_integer(out, ctx.db.ttl_ms(&args[1]));
    false
}

fn cmd_dbsize(ctx: &mut ExecCtx, out: &mut Buffer, _args: &[Vec<u8>]) -> bool {
    write_integer(out, ctx.db.len() as i64);
    false
}

//
// Lists
//

/// Fetch the list at `key`, creating an empty one when the key is absent.
/// Writes WRONGTYPE and answers None when the key holds something else.
fn list_payload<'a>(
    db: &'a mut Db,
    out: &mut Buffer,
    key: &[u8],
) -> Option<&'a mut std::collections::VecDeque<Vec<u8>>> {
    if let Some(entry) = db.find_entry(key) {
        if !matches!(entry.value, Value::List(_)) {
            write_error(out, WRONGTYPE);
            return None;
        }
    }
    match db.find_or_create(key, Value::list).map(|e| &mut e.value) {
        Some(Value::List(list)) => Some(list),
        _ => {
            write_error(out, "ERR internal error");
            None
        }
    }
}

fn cmd_lpush(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    let Some(list) = list_payload(ctx.db, out, &args[1]) else {
        return false;
    };
    for val in &args[2..] {
        list.push_front(val.clone());
    }
    write_integer(out, list.len() as i64);
    true
}

fn cmd_rpush(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    let Some(list) = list_payload(ctx.db, out, &args[1]) else {
        return false;
    };
    for val in &args[2..] {
        list.push_back(val.clone());
    }
    write_integer(out, list.len() as i64);
    true
}

fn list_pop(ctx: &mut ExecCtx, out: &mut Buffer, key: &[u8], front: bool) -> bool {
    let Some(entry) = ctx.db.find_entry(key) else {
        write_null(out);
        return false;
    };
    let Value::List(list) = &mut entry.value else {
        write_error(out, WRONGTYPE);
        return false;
    };
    let popped = if front {
        list.pop_front()
    } else {
        list.pop_back()
    };
    let Some(val) = popped else {
        write_null(out);
        return false;
    };
    // A list never lingers empty; the key disappears with its last element.
    let emptied = list.is_empty();
    if emptied {
        ctx.db.del(key);
    }
    write_bulk(out, &val);
    true
}

fn cmd_lpop(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    list_pop(ctx, out, &args[1], true)
}

fn cmd_rpop(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    list_pop(ctx, out, &args[1], false)
}

fn cmd_llen(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    match ctx.db.find_entry(&args[1]) {
        None => write_integer(out, 0),
        Some(entry) => match &entry.value {
            Value::List(list) => write_integer(out, list.len() as i64),
            _ => write_error(out, WRONGTYPE),
        },
    }
    false
}

fn cmd_lrange(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    let (Some(start), Some(stop)) = (parse_int(&args[2]), parse_int(&args[3])) else {
        write_error(out, ERR_NOT_INT);
        return false;
    };

    let Some(entry) = ctx.db.find_entry(&args[1]) else {
        write_array_header(out, 0);
        return false;
    };
    let Value::List(list) = &entry.value else {
        write_error(out, WRONGTYPE);
        return false;
    };

    let n = list.len() as i64;
    let mut start = if start < 0 { start + n } else { start };
    let mut stop = if stop < 0 { stop + n } else { stop };
    if start < 0 {
        start = 0;
    }
    if stop >= n {
        stop = n - 1;
    }
    if start > stop || start >= n {
        write_array_header(out, 0);
        return false;
    }

    write_array_header(out, stop - start + 1);
    for i in start..=stop {
        write_bulk(out, &list[i as usize]);
    }
    false
}

//
// Hashes
//

fn cmd_hset(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    if (args.len() - 2) % 2 != 0 {
        write_error(out, "ERR wrong number of arguments for 'hset' command");
        return false;
    }

    if let Some(entry) = ctx.db.find_entry(&args[1]) {
        if !matches!(entry.value, Value::Hash(_)) {
            write_error(out, WRONGTYPE);
            return false;
        }
    }
    let Some(Value::Hash(hash)) = ctx
        .db
        .find_or_create(&args[1], Value::hash)
        .map(|e| &mut e.value)
    else {
        write_error(out, "ERR internal error");
        return false;
    };

    let mut added = 0i64;
    for pair in args[2..].chunks(2) {
        if hash.insert(pair[0].clone(), pair[1].clone()).is_none() {
            added += 1;
        }
    }
    write_integer(out, added);
    true
}

fn cmd_hget(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    match ctx.db.find_entry(&args[1]) {
        None => write_null(out),
        Some(entry) => match &entry.value {
            Value::Hash(hash) => match hash.get(args[2].as_slice()) {
                Some(val) => write_bulk(out, val),
                None => write_null(out),
            },
            _ => write_error(out, WRONGTYPE),
        },
    }
    false
}

fn cmd_hdel(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    let Some(entry) = ctx.db.find_entry(&args[1]) else {
        write_integer(out, 0);
        return false;
    };
    let Value::Hash(hash) = &mut entry.value else {
        write_error(out, WRONGTYPE);
        return false;
    };

    let mut removed = 0i64;
    for field in &args[2..] {
        if hash.remove(field.as_slice()).is_some() {
            removed += 1;
        }
    }
    let emptied = hash.is_empty();
    if emptied {
        ctx.db.del(&args[1]);
    }
    write_integer(out, removed);
    removed > 0
}

fn cmd_hgetall(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    match ctx.db.find_entry(&args[1]) {
        None => write_array_header(out, 0),
        Some(entry) => match &entry.value {
            Value::Hash(hash) => {
                write_array_header(out, (hash.len() * 2) as i64);
                for (field, val) in hash {
                    write_bulk(out, field);
                    write_bulk(out, val);
                }
            }
            _ => write_error(out, WRONGTYPE),
        },
    }
    false
}

fn cmd_hlen(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    match ctx.db.find_entry(&args[1]) {
        None => write_integer(out, 0),
        Some(entry) => match &entry.value {
            Value::Hash(hash) => write_integer(out, hash.len() as i64),
            _ => write_error(out, WRONGTYPE),
        },
    }
    false
}

//
// Sets
//

fn cmd_sadd(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    if let Some(entry) = ctx.db.find_entry(&args[1]) {
        if !matches!(entry.value, Value::Set(_)) {
            write_error(out, WRONGTYPE);
            return false;
        }
    }
    let Some(Value::Set(set)) = ctx
        .db
        .find_or_create(&args[1], Value::set)
        .map(|e| &mut e.value)
    else {
        write_error(out, "ERR internal error");
        return false;
    };

    let mut added = 0i64;
    for member in &args[2..] {
        if set.insert(member.clone()) {
            added += 1;
        }
    }
    write_integer(out, added);
    added > 0
}

fn cmd_srem(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    let Some(entry) = ctx.db.find_entry(&args[1]) else {
        write_integer(out, 0);
        return false;
    };
    let Value::Set(set) = &mut entry.value else {
        write_error(out, WRONGTYPE);
        return false;
    };

    let mut removed = 0i64;
    for member in &args[2..] {
        if set.remove(member.as_slice()) {
            removed += 1;
        }
    }
    let emptied = set.is_empty();
    if emptied {
        ctx.db.del(&args[1]);
    }
    write_integer(out, removed);
    removed > 0
}

fn cmd_sismember(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    match ctx.db.find_entry(&args[1]) {
        None => write_integer(out, 0),
        Some(entry) => match &entry.value {
            Value::Set(set) => {
                write_integer(out, set.contains(args[2].as_slice()) as i64)
            }
            _ => write_error(out, WRONGTYPE),
        },
    }
    false
}

fn cmd_smembers(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    match ctx.db.find_entry(&args[1]) {
        None => write_array_header(out, 0),
        Some(entry) => match &entry.value {
            Value::Set(set) => {
                write_array_header(out, set.len() as i64);
                for member in set {
                    write_bulk(out, member);
                }
            }
            _ => write_error(out, WRONGTYPE),
        },
    }
    false
}

fn cmd_scard(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    match ctx.db.find_entry(&args[1]) {
        None => write_integer(out, 0),
        Some(entry) => match &entry.value {
            Value::Set(set) => write_integer(out, set.len() as i64),
            _ => write_error(out, WRONGTYPE),
        },
    }
    false
}

//
// Sorted sets
//

fn cmd_zadd(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    if (args.len() - 2) % 2 != 0 {
        write_error(out, "ERR wrong number of arguments for 'zadd' command");
        return false;
    }

    // Validate every score before mutating anything, so a bad pair late in
    // the argument list cannot leave a half-applied command.
    let mut pairs = Vec::with_capacity((args.len() - 2) / 2);
    for pair in args[2..].chunks(2) {
        let Some(score) = parse_score(&pair[0]) else {
            write_error(out, ERR_NOT_FLOAT);
            return false;
        };
        pairs.push((score, &pair[1]));
    }

    if let Some(entry) = ctx.db.find_entry(&args[1]) {
        if !matches!(entry.value, Value::ZSet(_)) {
            write_error(out, WRONGTYPE);
            return false;
        }
    }
    let Some(Value::ZSet(zset)) = ctx
        .db
        .find_or_create(&args[1], Value::zset)
        .map(|e| &mut e.value)
    else {
        write_error(out, "ERR internal error");
        return false;
    };

    let mut added = 0i64;
    let mut touched = false;
    for (score, member) in pairs {
        match zset.score(member) {
            Some(old) if old == score => {}
            Some(_) => {
                // Existing member, new score: repositioned, not counted.
                zset.add(member, score);
                touched = true;
            }
            None => {
                zset.add(member, score);
                added += 1;
                touched = true;
            }
        }
    }
    write_integer(out, added);
    touched
}

fn cmd_zscore(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    match ctx.db.find_entry(&args[1]) {
        None => write_null(out),
        Some(entry) => match &entry.value {
            Value::ZSet(zset) => match zset.score(&args[2]) {
                Some(score) => write_bulk(out, format_score(score).as_bytes()),
                None => write_null(out),
            },
            _ => write_error(out, WRONGTYPE),
        },
    }
    false
}

fn cmd_zrank(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    match ctx.db.find_entry(&args[1]) {
        None => write_null(out),
        Some(entry) => match &entry.value {
            Value::ZSet(zset) => match zset.rank(&args[2]) {
                Some(rank) => write_integer(out, rank as i64),
                None => write_null(out),
            },
            _ => write_error(out, WRONGTYPE),
        },
    }
    false
}

fn cmd_zrange(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    let with_scores = match args.len() {
        4 => false,
        5 if args[4].eq_ignore_ascii_case(b"WITHSCORES") => true,
        _ => {
            write_error(out, "ERR syntax error");
            return false;
        }
    };
    let (Some(start), Some(stop)) = (parse_int(&args[2]), parse_int(&args[3])) else {
        write_error(out, ERR_NOT_INT);
        return false;
    };

    let Some(entry) = ctx.db.find_entry(&args[1]) else {
        write_array_header(out, 0);
        return false;
    };
    let Value::ZSet(zset) = &entry.value else {
        write_error(out, WRONGTYPE);
        return false;
    };

    let range = zset.index.range_by_rank(start, stop);
    if with_scores {
        write_array_header(out, (range.len() * 2) as i64);
        for (member, score) in &range {
            write_bulk(out, member);
            write_bulk(out, format_score(*score).as_bytes());
        }
    } else {
        write_array_header(out, range.len() as i64);
        for (member, _) in &range {
            write_bulk(out, member);
        }
    }
    false
}

fn cmd_zcard(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    match ctx.db.find_entry(&args[1]) {
        None => write_integer(out, 0),
        Some(entry) => match &entry.value {
            Value::ZSet(zset) => write_integer(out, zset.len() as i64),
            _ => write_error(out, WRONGTYPE),
        },
    }
    false
}

fn cmd_zrem(ctx: &mut ExecCtx, out: &mut Buffer, args: &[Vec<u8>]) -> bool {
    let Some(entry) = ctx.db.find_entry(&args[1]) else {
        write_integer(out, 0);
        return false;
    };
    let Value::ZSet(zset) = &mut entry.value else {
        write_error(out, WRONGTYPE);
        return false;
    };

    let mut removed = 0i64;
    for member in &args[2..] {
        if zset.remove(member) {
            removed += 1;
        }
    }
    let emptied = zset.is_empty();
    if emptied {
        ctx.db.del(&args[1]);
    }
    write_integer(out, removed);
    removed > 0
}

//
// Admin
//

fn cmd_bgrewriteaof(ctx: &mut ExecCtx, out: &mut Buffer, _args: &[Vec<u8>]) -> bool {
    if let Some(aof) = ctx.aof.as_deref_mut() {
        aof.trigger_rewrite(ctx.db);
    }
    write_simple(out, "Background append only file rewriting started");
    false
}
