use muninn_client::proto::{Request, UpdateOp, UpdateOpKind, FLAG_ADD, PING_REQUEST_ID};
use muninn_client::{Error, Value};

fn from_hex(s: &str) -> Vec<u8> {
    let digits: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| u8::from_str_radix(std::str::from_utf8(pair).unwrap(), 16).unwrap())
        .collect()
}

#[test]
fn ping_frame() {
    let bytes = Request::Ping.encode(PING_REQUEST_ID).unwrap();
    assert_eq!(bytes.to_vec(), from_hex("00ff0000 00000000 00000000"));
}

#[test]
fn insert_with_integer_fields() {
    let tuple = [Value::U32(1), Value::U32(2000), Value::U32(30000)];
    let bytes = Request::Insert { space: 1, flags: 0, tuple: &tuple }.encode(0).unwrap();
    assert_eq!(
        bytes.to_vec(),
        from_hex(
            "0d000000 1b000000 00000000 01000000 00000000 03000000 \
             04 01000000 04 d0070000 04 30750000"
        )
    );
}

#[test]
fn insert_with_byte_fields() {
    let tuple = [
        Value::from(&b"AAA"[..]),
        Value::from(&b"BBBB"[..]),
        Value::from(&b"CCCCCC"[..]),
    ];
    let bytes = Request::Insert { space: 1, flags: 0, tuple: &tuple }.encode(0).unwrap();
    assert_eq!(
        bytes.to_vec(),
        from_hex(
            "0d000000 1c000000 00000000 01000000 00000000 03000000 \
             03 414141 04 42424242 06 434343434343"
        )
    );
}

#[test]
fn insert_with_add_flag() {
    // (1, "JKLMN") into space 0 with ADD
    let tuple = [Value::U32(1), Value::from("JKLMN")];
    let bytes = Request::Insert { space: 0, flags: FLAG_ADD, tuple: &tuple }.encode(0).unwrap();
    assert_eq!(
        bytes.to_vec(),
        from_hex(
            "0d000000 17000000 00000000 00000000 02000000 \
             02000000 04 01000000 05 4a4b4c4d4e"
        )
    );
}

#[test]
fn delete_by_integer_and_string_key() {
    let key = [Value::U32(1)];
    let bytes = Request::Delete { space: 1, flags: 0, key: &key }.encode(0).unwrap();
    assert_eq!(
        bytes.to_vec(),
        from_hex("15000000 11000000 00000000 01000000 00000000 01000000 04 01000000")
    );

    let key = [Value::from(&b"AAA"[..])];
    let bytes = Request::Delete { space: 1, flags: 0, key: &key }.encode(0).unwrap();
    assert_eq!(
        bytes.to_vec(),
        from_hex("15000000 10000000 00000000 01000000 00000000 01000000 03 414141")
    );
}

#[test]
fn select_by_integer_key() {
    let key = [Value::U32(1)];
    let bytes = Request::Select { space: 1, index: 0, offset: 0, limit: 0xffff, key: &key }
        .encode(0)
        .unwrap();
    assert_eq!(
        bytes.to_vec(),
        from_hex(
            "11000000 1d000000 00000000 01000000 00000000 00000000 ffff0000 \
             01000000 01000000 04 01000000"
        )
    );
}

#[test]
fn select_by_string_key() {
    let key = [Value::from(&b"AAA"[..])];
    let bytes = Request::Select { space: 1, index: 0, offset: 0, limit: 0xffff, key: &key }
        .encode(0)
        .unwrap();
    assert_eq!(
        bytes.to_vec(),
        from_hex(
            "11000000 1c000000 00000000 01000000 00000000 00000000 ffff0000 \
             01000000 01000000 03 414141"
        )
    );
}

#[test]
fn select_by_composite_key() {
    let key = [Value::U32(1), Value::U32(2)];
    let bytes = Request::Select { space: 1, index: 0, offset: 0, limit: 0xffff, key: &key }
        .encode(0)
        .unwrap();
    assert_eq!(
        bytes.to_vec(),
        from_hex(
            "11000000 22000000 00000000 01000000 00000000 00000000 ffff0000 \
             01000000 02000000 04 01000000 04 02000000"
        )
    );
}

#[test]
fn update_assign_integer_by_integer_key() {
    let key = [Value::U32(0x22)];
    let ops = [UpdateOp::new(0x33, UpdateOpKind::Assign, Value::U32(0x1122_3344))];
    let bytes = Request::Update { space: 0x11, flags: 0, key: &key, ops: &ops }.encode(0).unwrap();
    assert_eq!(
        bytes.to_vec(),
        from_hex(
            "13000000 1f000000 00000000 11000000 00000000 \
             01000000 04 22000000 01000000 33000000 00 04 44332211"
        )
    );
}

#[test]
fn update_assign_string_by_string_key() {
    let key = [Value::from(&b"ZZZZZZ"[..])];
    let ops = [UpdateOp::new(0x33, UpdateOpKind::Assign, Value::from(&b"NNN"[..]))];
    let bytes = Request::Update { space: 0x11, flags: 0, key: &key, ops: &ops }.encode(0).unwrap();
    assert_eq!(
        bytes.to_vec(),
        from_hex(
            "13000000 20000000 00000000 11000000 00000000 \
             01000000 06 5a5a5a5a5a5a 01000000 33000000 00 03 4e4e4e"
        )
    );
}

#[test]
fn update_assign_multiple_fields() {
    let key = [Value::U32(0x22)];
    let ops = [
        UpdateOp::new(0x33, UpdateOpKind::Assign, Value::U32(0x3333)),
        UpdateOp::new(0x44, UpdateOpKind::Assign, Value::U32(0x4444)),
        UpdateOp::new(0x55, UpdateOpKind::Assign, Value::U32(0x5555)),
    ];
    let bytes = Request::Update { space: 0x11, flags: 0, key: &key, ops: &ops }.encode(0).unwrap();
    assert_eq!(
        bytes.to_vec(),
        from_hex(
            "13000000 33000000 00000000 11000000 00000000 01000000 04 22000000 \
             03000000 33000000 00 04 33330000 44000000 00 04 44440000 \
             55000000 00 04 55550000"
        )
    );
}

#[test]
fn update_arithmetic_and_bitwise_op_codes() {
    for (symbol, code) in [("+", 0x01u8), ("&", 0x02), ("^", 0x03), ("|", 0x04)] {
        let key = [Value::U32(0x22)];
        let ops = [UpdateOp::from_symbol(0x33, symbol, Value::U32(0x55)).unwrap()];
        let bytes =
            Request::Update { space: 0x11, flags: 0, key: &key, ops: &ops }.encode(0).unwrap();
        let mut expected = from_hex(
            "13000000 1f000000 00000000 11000000 00000000 \
             01000000 04 22000000 01000000 33000000",
        );
        expected.push(code);
        expected.extend_from_slice(&from_hex("04 55000000"));
        assert_eq!(bytes.to_vec(), expected, "symbol {symbol}");
    }
}

#[test]
fn update_symbol_table_is_complete() {
    for (symbol, kind) in [
        ("=", UpdateOpKind::Assign),
        ("+", UpdateOpKind::Add),
        ("&", UpdateOpKind::And),
        ("^", UpdateOpKind::Xor),
        ("|", UpdateOpKind::Or),
        ("splice", UpdateOpKind::Splice),
        ("#", UpdateOpKind::Delete),
        ("!", UpdateOpKind::InsertBefore),
    ] {
        assert_eq!(UpdateOpKind::from_symbol(symbol).unwrap(), kind);
    }
    assert!(matches!(UpdateOpKind::from_symbol("%"), Err(Error::Usage(_))));
}

#[test]
fn call_frame_layout() {
    let args = [Value::from("a"), Value::U32(2)];
    let bytes = Request::Call { flags: 0, proc: "proc", args: &args }.encode(9).unwrap();
    assert_eq!(
        bytes.to_vec(),
        from_hex(
            "16000000 14000000 09000000 00000000 04 70726f63 \
             02000000 01 61 04 02000000"
        )
    );
}

#[test]
fn request_id_is_threaded_through_header() {
    let key = [Value::U32(1)];
    let bytes = Request::Select { space: 1, index: 0, offset: 0, limit: 1, key: &key }
        .encode(0x4433_2211)
        .unwrap();
    assert_eq!(&bytes[8..12], &[0x11, 0x22, 0x33, 0x44]);
}
