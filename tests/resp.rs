use fogo::{
    encode_command, format_score, parse, write_array_header, write_bulk, write_error,
    write_integer, write_null, write_simple, Buffer,
};

fn buf_with(bytes: &[u8]) -> Buffer {
    let mut buf = Buffer::new();
    buf.append(bytes);
    buf
}

#[test]
fn parse_ping_set_get_pipeline() {
    let mut buf = buf_with(b"*1\r\n$4\r\nPING\r\n*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n*2\r\n$3\r\nGET\r\n$1\r\na\r\n");

    let cmd = parse(&mut buf).unwrap();
    assert_eq!(cmd, vec![b"PING".to_vec()]);

    let cmd = parse(&mut buf).unwrap();
    assert_eq!(cmd, vec![b"SET".to_vec(), b"a".to_vec(), b"1".to_vec()]);

    let cmd = parse(&mut buf).unwrap();
    assert_eq!(cmd, vec![b"GET".to_vec(), b"a".to_vec()]);

    assert!(buf.is_empty());
    assert!(parse(&mut buf).is_none());
}

#[test]
fn bulk_payloads_are_binary_safe() {
    // The payload contains CRLF and NUL bytes; only the length matters.
    let payload = b"a\r\nb\0c\r";
    let mut frame = format!("*2\r\n$3\r\nSET\r\n${}\r\n", payload.len()).into_bytes();
    frame.extend_from_slice(payload);
    frame.extend_from_slice(b"\r\n");

    let mut buf = buf_with(&frame);
    let cmd = parse(&mut buf).unwrap();
    assert_eq!(cmd[1], payload.to_vec());
    assert!(buf.is_empty());
}

#[test]
fn incomplete_frames_never_consume() {
    let frame = b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n";
    // Every strict prefix must parse to nothing and leave the bytes alone.
    for cut in 0..frame.len() {
        let mut buf = buf_with(&frame[..cut]);
        assert!(parse(&mut buf).is_none(), "prefix of {} bytes", cut);
        assert_eq!(buf.readable(), &frame[..cut]);
    }

    let mut buf = buf_with(frame);
    assert!(parse(&mut buf).is_some());
}

#[test]
fn trailing_bytes_stay_for_the_next_call() {
    let mut buf = buf_with(b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPI");
    assert!(parse(&mut buf).is_some());
    // The torn second frame is untouched.
    assert_eq!(buf.readable(), b"*1\r\n$4\r\nPI");
    assert!(parse(&mut buf).is_none());
    assert_eq!(buf.readable(), b"*1\r\n$4\r\nPI");
}

#[test]
fn null_array_is_an_empty_command() {
    let mut buf = buf_with(b"*-1\r\n*1\r\n$4\r\nPING\r\n");
    let cmd = parse(&mut buf).unwrap();
    assert!(cmd.is_empty());
    // The following frame is intact.
    let cmd = parse(&mut buf).unwrap();
    assert_eq!(cmd, vec![b"PING".to_vec()]);
}

#[test]
fn null_bulk_argument_becomes_empty() {
    let mut buf = buf_with(b"*2\r\n$3\r\nGET\r\n$-1\r\n");
    let cmd = parse(&mut buf).unwrap();
    assert_eq!(cmd, vec![b"GET".to_vec(), Vec::new()]);
}

#[test]
fn zero_length_bulk_roundtrips() {
    let mut buf = buf_with(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$0\r\n\r\n");
    let cmd = parse(&mut buf).unwrap();
    assert_eq!(cmd, vec![b"SET".to_vec(), b"k".to_vec(), Vec::new()]);
    assert!(buf.is_empty());
}

#[test]
fn inline_commands_split_on_space_runs() {
    let mut buf = buf_with(b"PING\r\n");
    assert_eq!(parse(&mut buf).unwrap(), vec![b"PING".to_vec()]);

    let mut buf = buf_with(b"SET  key   value\r\n");
    assert_eq!(
        parse(&mut buf).unwrap(),
        vec![b"SET".to_vec(), b"key".to_vec(), b"value".to_vec()]
    );

    // A bare newline-terminated blank line is an empty command.
    let mut buf = buf_with(b"\r\n");
    assert!(parse(&mut buf).unwrap().is_empty());
    assert!(buf.is_empty());
}

#[test]
fn malformed_header_does_not_consume() {
    // Garbage where the bulk length should be.
    let mut buf = buf_with(b"*1\r\n$xy\r\nPING\r\n");
    assert!(parse(&mut buf).is_none());
    assert_eq!(buf.readable_len(), 15);

    // Array element that is not a bulk string.
    let mut buf = buf_with(b"*1\r\n:5\r\n");
    assert!(parse(&mut buf).is_none());
    assert_eq!(buf.readable_len(), 8);
}

#[test]
fn writer_token_forms() {
    let mut buf = Buffer::new();
    write_simple(&mut buf, "OK");
    write_error(&mut buf, "ERR boom");
    write_integer(&mut buf, -42);
    write_bulk(&mut buf, b"hey");
    write_null(&mut buf);
    write_array_header(&mut buf, 3);
    assert_eq!(
        buf.readable(),
        b"+OK\r\n-ERR boom\r\n:-42\r\n$3\r\nhey\r\n$-1\r\n*3\r\n".as_slice()
    );
}

#[test]
fn encode_then_parse_roundtrip() {
    let argv = vec![
        b"ZADD".to_vec(),
        b"key with \r\n inside".to_vec(),
        b"1.5".to_vec(),
        Vec::new(),
        vec![0u8, 255, 13, 10, 7],
    ];
    let mut buf = buf_with(&encode_command(&argv));
    assert_eq!(parse(&mut buf).unwrap(), argv);
    assert!(buf.is_empty());
}

#[test]
fn score_spelling() {
    assert_eq!(format_score(2.0), "2");
    assert_eq!(format_score(10.0), "10");
    assert_eq!(format_score(-3.0), "-3");
    assert_eq!(format_score(2.5), "2.5");
    assert_eq!(format_score(0.1), "0.1");
    // Exact round trip through the spelling.
    for score in [1.0, -7.25, 3.0000001, 1e16, 123456.789] {
        let spelled = format_score(score);
        assert_eq!(spelled.parse::<f64>().unwrap(), score);
    }
}
