/*!
 * RESP2 Protocol Codec
 *
 * Incremental parser for client command frames plus the response writers.
 * A command frame is either a RESP array of bulk strings
 * (`*N\r\n$len\r\n<bytes>\r\n...`) or an inline command (a single line split
 * on spaces). The parser is binary safe: bulk payloads are consumed by
 * length, never scanned for CRLF.
 *
 * Parsing contract:
 *   - incomplete frame  -> None, buffer untouched
 *   - complete frame    -> Some(args), exactly the frame's bytes consumed
 *   - malformed input is reported as None as well; the caller may apply its
 *     own policy (the server keeps waiting, the AOF loader stops at the
 *     torn tail)
 */

use crate::buffer::Buffer;

/// Parse one command frame from the buffer.
///
/// Returns the argument vector (owned copies, independent of the buffer),
/// or `None` when no complete frame is available. A null array (`*-1\r\n`)
/// and an empty inline line both yield an empty argument vector with their
/// bytes consumed; the dispatcher treats empty argv as a no-op.
pub fn parse(buf: &mut Buffer) -> Option<Vec<Vec<u8>>> {
    let data = buf.readable();
    if data.is_empty() {
        return None;
    }

    let (args, consumed) = if data[0] == b'*' {
        parse_array(data)?
    } else {
        parse_inline(data)?
    };

    buf.consume(consumed);
    Some(args)
}

/// Parse a RESP array of bulk strings. Returns `(args, bytes_consumed)`
/// without touching the buffer.
fn parse_array(data: &[u8]) -> Option<(Vec<Vec<u8>>, usize)> {
    // Element count: *N\r\n
    let crlf = find_crlf(data, 1)?;
    let count = parse_i64(&data[1..crlf])?;
    let mut pos = crlf + 2;

    if count < 0 {
        // *-1\r\n is a null array. Consume it, emit an empty command.
        return Some((Vec::new(), pos));
    }

    // Reserve conservatively: a hostile count header should not allocate
    // ahead of the bytes actually present.
    let mut args = Vec::with_capacity((count as usize).min(64));
    for _ in 0..count {
        if pos >= data.len() {
            return None;
        }
        if data[pos] != b'$' {
            // Non-bulk element after a declared array count.
            return None;
        }

        let len_crlf = find_crlf(data, pos + 1)?;
        let bulk_len = parse_i64(&data[pos + 1..len_crlf])?;

        if bulk_len < 0 {
            // $-1\r\n: null bulk string stands in as an empty argument.
            args.push(Vec::new());
            pos = len_crlf + 2;
            continue;
        }

        // Payload is exactly bulk_len bytes followed by CRLF. Consumed by
        // length, so the payload may itself contain CR or LF bytes.
        let start = len_crlf + 2;
        let end = start.checked_add(bulk_len as usize)?;
        if end.checked_add(2)? > data.len() {
            return None;
        }
        if data[end] != b'\r' || data[end + 1] != b'\n' {
            return None;
        }

        args.push(data[start..end].to_vec());
        pos = end + 2;
    }

    Some((args, pos))
}

/// Parse an inline command: one CRLF-terminated line, tokens separated by
/// runs of ASCII spaces.
fn parse_inline(data: &[u8]) -> Option<(Vec<Vec<u8>>, usize)> {
    let crlf = find_crlf(data, 0)?;
    let line = &data[..crlf];

    let args = line
        .split(|&b| b == b' ')
        .filter(|tok| !tok.is_empty())
        .map(|tok| tok.to_vec())
        .collect();

    Some((args, crlf + 2))
}

/// Offset of the first `\r\n` at or after `from`, or `None`.
fn find_crlf(data: &[u8], from: usize) -> Option<usize> {
    if data.len() < from + 2 {
        return None;
    }
    data[from..]
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|i| from + i)
}

/// Strict decimal parse for RESP header fields. An empty slice, a lone
/// sign, or any non-digit byte is malformed.
fn parse_i64(s: &[u8]) -> Option<i64> {
    let (neg, digits) = match s.first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    if digits.is_empty() {
        return None;
    }
    let mut v: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return None;
        }
        v = v.checked_mul(10)?.checked_add((b - b'0') as i64)?;
    }
    Some(if neg { -v } else { v })
}

//
// Response writers
//
// Each helper appends one RESP token to the connection's outgoing buffer.
// Array replies are an array header followed by caller-written elements.
//

pub fn write_simple(buf: &mut Buffer, s: &str) {
    buf.append(b"+");
    buf.append(s.as_bytes());
    buf.append(b"\r\n");
}

pub fn write_error(buf: &mut Buffer, msg: &str) {
    buf.append(b"-");
    buf.append(msg.as_bytes());
    buf.append(b"\r\n");
}

pub fn write_integer(buf: &mut Buffer, v: i64) {
    buf.append(format!(":{}\r\n", v).as_bytes());
}

pub fn write_bulk(buf: &mut Buffer, data: &[u8]) {
    buf.append(format!("${}\r\n", data.len()).as_bytes());
    buf.append(data);
    buf.append(b"\r\n");
}

pub fn write_null(buf: &mut Buffer) {
    buf.append(b"$-1\r\n");
}

pub fn write_array_header(buf: &mut Buffer, count: i64) {
    buf.append(format!("*{}\r\n", count).as_bytes());
}

/// Encode an argument vector as a RESP array of bulk strings.
///
/// This is the exact byte form the parser accepts, and the form every write
/// command takes in the append-only file.
pub fn encode_command(args: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + args.iter().map(|a| a.len() + 16).sum::<usize>());
    out.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Spell a sorted-set score.
///
/// Integer-valued scores print without a decimal point; everything else uses
/// the shortest decimal form that parses back to the same f64, so scores
/// survive an AOF round trip bit-exact.
pub fn format_score(score: f64) -> String {
    if score == score.trunc() && score.abs() < 1e17 {
        format!("{}", score as i64)
    } else {
        format!("{}", score)
    }
}
