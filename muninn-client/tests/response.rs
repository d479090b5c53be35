use bytes::{Buf, Bytes};
use muninn_client::proto::{Completion, Header, Response};
use muninn_client::{Error, FieldType, TextErrors, Value};

fn from_hex(s: &str) -> Vec<u8> {
    let digits: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| u8::from_str_radix(std::str::from_utf8(pair).unwrap(), 16).unwrap())
        .collect()
}

fn header(hex: &str) -> Header {
    let raw = from_hex(hex);
    let mut buf = &raw[..];
    let header = Header::decode(&mut buf);
    assert!(!buf.has_remaining());
    header
}

fn parse(header_hex: &str, body_hex: &str) -> Result<Response, Error> {
    Response::parse(
        header(header_hex),
        Bytes::from(from_hex(body_hex)),
        &[],
        TextErrors::Strict,
    )
}

#[test]
fn single_record() {
    let resp = parse(
        "0d000000 1b000000 00000000",
        "00000000 01000000 0b000000 02000000 04 01000000 05 4a4b4c4d4e",
    )
    .unwrap();

    assert_eq!(resp.completion, Completion::Ok);
    assert_eq!(resp.rowcount, 1);
    assert_eq!(
        resp.rows,
        vec![vec![
            Value::Bytes(Bytes::from_static(&[0x01, 0x00, 0x00, 0x00])),
            Value::Bytes(Bytes::from_static(b"JKLMN")),
        ]]
    );
}

#[test]
fn multiple_records() {
    let resp = parse(
        "11000000 51000000 00000000",
        "00000000 03000000 \
         10000000 02000000 04 01000000 0a 31313131313131313131 \
         10000000 02000000 04 02000000 0a 32323232323232323232 \
         11000000 04000000 04 03000000 03 4c4c4c 03 4d4d4d 03 4e4e4e",
    )
    .unwrap();

    assert_eq!(resp.rowcount, 3);
    assert_eq!(resp.rows.len(), 3);
    assert_eq!(
        resp.rows[0],
        vec![
            Value::Bytes(Bytes::from_static(&[0x01, 0x00, 0x00, 0x00])),
            Value::Bytes(Bytes::from_static(b"1111111111")),
        ]
    );
    assert_eq!(
        resp.rows[2],
        vec![
            Value::Bytes(Bytes::from_static(&[0x03, 0x00, 0x00, 0x00])),
            Value::Bytes(Bytes::from_static(b"LLL")),
            Value::Bytes(Bytes::from_static(b"MMM")),
            Value::Bytes(Bytes::from_static(b"NNN")),
        ]
    );
}

#[test]
fn header_attributes() {
    let resp = parse(
        "0d000000 14000000 11223344",
        "00000000 01000000 04000000 02000000 01 4b 01 5a",
    )
    .unwrap();

    assert_eq!(resp.return_code, 0);
    assert_eq!(resp.return_message, None);
    assert_eq!(resp.completion, Completion::Ok);
    assert_eq!(resp.rowcount, 1);
    assert_eq!(resp.request_id, 0x4433_2211);
}

#[test]
fn ping_reply_is_empty() {
    let resp = parse("00ff0000 00000000 00000000", "").unwrap();
    assert_eq!(resp.rowcount, 0);
    assert!(resp.rows.is_empty());
    assert_eq!(resp.to_string(), "ping ok");
}

#[test]
fn affected_count_only_reply() {
    // body_length 8: return_code + count, no tuples even with RETURN unset
    let resp = parse("0d000000 08000000 01000000", "00000000 01000000").unwrap();
    assert_eq!(resp.rowcount, 1);
    assert!(resp.rows.is_empty());
    assert_eq!(resp.to_string(), "1 record inserted");
}

#[test]
fn display_by_op() {
    let deleted = parse("15000000 08000000 01000000", "00000000 02000000").unwrap();
    assert_eq!(deleted.to_string(), "2 records deleted");

    let updated = parse("13000000 08000000 01000000", "00000000 01000000").unwrap();
    assert_eq!(updated.to_string(), "1 record updated");
}

#[test]
fn server_error_carries_code_and_message() {
    // completion status 2, application code 0x31, message "Duplicate key\0"
    let mut body = from_hex("02310000");
    body.extend_from_slice(b"Duplicate key\0");
    let err = Response::parse(
        header("0d000000 12000000 01000000"),
        Bytes::from(body),
        &[],
        TextErrors::Strict,
    )
    .unwrap_err();

    match err {
        Error::Server { code, message } => {
            assert_eq!(code, 0x31);
            assert_eq!(message, "Duplicate key");
        }
        other => panic!("expected server error, got {other:?}"),
    }
}

#[test]
fn try_again_completion_is_surfaced() {
    let resp = parse("11000000 08000000 01000000", "01000000 00000000").unwrap();
    assert_eq!(resp.completion, Completion::TryAgain);
    assert_eq!(resp.return_code, 0);
}

#[test]
fn field_types_cast_by_position() {
    let resp = Response::parse(
        header("11000000 23000000 00000000"),
        Bytes::from(from_hex(
            "00000000 01000000 13000000 03000000 04 01000000 05 4a4b4c4d4e 05 4f50515253",
        )),
        &[FieldType::U32, FieldType::Str],
        TextErrors::Strict,
    )
    .unwrap();

    // the last schema entry extends over the third field
    assert_eq!(
        resp.rows,
        vec![vec![
            Value::U32(1),
            Value::Str("JKLMN".to_owned()),
            Value::Str("OPQRS".to_owned()),
        ]]
    );
}

#[test]
fn single_field_type_applies_uniformly() {
    let resp = Response::parse(
        header("11000000 1a000000 00000000"),
        Bytes::from(from_hex("00000000 01000000 0a000000 02000000 04 01000000 04 02000000")),
        &[FieldType::U32],
        TextErrors::Strict,
    )
    .unwrap();
    assert_eq!(resp.rows, vec![vec![Value::U32(1), Value::U32(2)]]);
}

#[test]
fn cast_length_mismatch_fails() {
    let err = Response::parse(
        header("11000000 16000000 00000000"),
        Bytes::from(from_hex("00000000 01000000 06000000 01000000 05 4a4b4c4d4e")),
        &[FieldType::U32],
        TextErrors::Strict,
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidData(_)));
}

#[test]
fn truncated_tuple_fails() {
    // tuple_size says 11 payload bytes but the body ends early
    let err = parse(
        "11000000 11000000 00000000",
        "00000000 01000000 0b000000 02000000 04",
    )
    .unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
}

#[test]
fn truncated_body_fails() {
    let err = parse("11000000 06000000 00000000", "00000000 0100").unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
}
