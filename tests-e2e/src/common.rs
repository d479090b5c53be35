//! In-process tuple store speaking the client's wire protocol, so command
//! flows run end-to-end without a live database. Primary-key lookups only
//! (index 0); enough of the update/flag semantics to exercise every
//! client operation.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use muninn_client::proto::codec;
use muninn_client::proto::{Header, OpCode, FLAG_ADD, FLAG_REPLACE, FLAG_RETURN, HEADER_SIZE};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

type Tuple = Vec<Vec<u8>>;
type Space = HashMap<Vec<u8>, Tuple>;

const ERR_TUPLE_EXISTS: u32 = 0x37;
const ERR_TUPLE_NOT_FOUND: u32 = 0x31;
const ERR_UNSUPPORTED: u32 = 0x0a;
const ERR_FIELD_RANGE: u32 = 0x1e;
const ERR_TYPE_MISMATCH: u32 = 0x16;
const ERR_NO_SUCH_PROC: u32 = 0x32;
const ERR_MALFORMED: u32 = 0x62;

struct Fault {
    code: u32,
    message: String,
}

fn fault(code: u32, message: &str) -> Fault {
    Fault { code, message: message.to_owned() }
}

impl From<muninn_client::Error> for Fault {
    fn from(e: muninn_client::Error) -> Fault {
        Fault { code: ERR_MALFORMED, message: format!("Malformed request: {e}") }
    }
}

struct Reply {
    rowcount: u32,
    rows: Vec<Tuple>,
    include_rows: bool,
}

impl Reply {
    fn count(rowcount: u32) -> Reply {
        Reply { rowcount, rows: Vec::new(), include_rows: false }
    }

    fn rows(rows: Vec<Tuple>) -> Reply {
        Reply { rowcount: rows.len() as u32, rows, include_rows: true }
    }

    fn affected(tuple: Tuple, flags: u32) -> Reply {
        Reply { rowcount: 1, rows: vec![tuple], include_rows: flags & FLAG_RETURN != 0 }
    }
}

#[derive(Default)]
struct Store {
    spaces: Mutex<HashMap<u32, Space>>,
}

/// Bind a fresh store server on a loopback port and serve until dropped.
pub async fn spawn_store_server() -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let store = Arc::new(Store::default());
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                continue;
            };
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let _ = serve(stream, store).await;
            });
        }
    });
    Ok(addr)
}

async fn serve(mut stream: TcpStream, store: Arc<Store>) -> std::io::Result<()> {
    loop {
        let mut raw_header = [0u8; HEADER_SIZE];
        if stream.read_exact(&mut raw_header).await.is_err() {
            return Ok(());
        }
        let mut slice = &raw_header[..];
        let header = Header::decode(&mut slice);
        let mut body = vec![0u8; header.body_length as usize];
        stream.read_exact(&mut body).await?;
        let reply = handle(&store, header, Bytes::from(body));
        stream.write_all(&reply).await?;
    }
}

fn handle(store: &Store, header: Header, body: Bytes) -> Vec<u8> {
    let result = match OpCode::from_raw(header.op) {
        Some(OpCode::Ping) => return frame(header, &[]),
        Some(OpCode::Insert) => insert(store, body),
        Some(OpCode::Select) => select(store, body),
        Some(OpCode::Update) => update(store, body),
        Some(OpCode::Delete) => delete(store, body),
        Some(OpCode::Call) => call(body),
        None => Err(fault(ERR_UNSUPPORTED, "Unknown request type")),
    };
    respond(header, result)
}

fn need(buf: &Bytes, n: usize) -> Result<(), Fault> {
    if buf.remaining() < n {
        Err(fault(ERR_MALFORMED, "Malformed request: truncated body"))
    } else {
        Ok(())
    }
}

fn stored(raw: Vec<Bytes>) -> Tuple {
    raw.into_iter().map(|b| b.to_vec()).collect()
}

fn insert(store: &Store, mut body: Bytes) -> Result<Reply, Fault> {
    need(&body, 8)?;
    let space_no = body.get_u32_le();
    let flags = body.get_u32_le();
    let tuple = stored(codec::get_tuple(&mut body)?);
    let key = tuple.first().ok_or_else(|| fault(ERR_MALFORMED, "Empty tuple"))?.clone();

    let mut spaces = store.spaces.lock().expect("store lock");
    let space = spaces.entry(space_no).or_default();
    let exists = space.contains_key(&key);
    if flags & FLAG_ADD != 0 && exists {
        return Err(fault(ERR_TUPLE_EXISTS, "Tuple already exists"));
    }
    if flags & FLAG_REPLACE != 0 && !exists {
        return Err(fault(ERR_TUPLE_NOT_FOUND, "Tuple doesn't exist"));
    }
    space.insert(key, tuple.clone());
    Ok(Reply::affected(tuple, flags))
}

fn select(store: &Store, mut body: Bytes) -> Result<Reply, Fault> {
    need(&body, 20)?;
    let space_no = body.get_u32_le();
    let _index_no = body.get_u32_le();
    let offset = body.get_u32_le();
    let limit = body.get_u32_le();
    let _key_count = body.get_u32_le();
    let key = codec::get_tuple(&mut body)?;
    let key = key.first().ok_or_else(|| fault(ERR_MALFORMED, "Empty key"))?;

    let spaces = store.spaces.lock().expect("store lock");
    let hit = spaces.get(&space_no).and_then(|space| space.get(key.as_ref()));
    let rows = match hit {
        Some(tuple) if offset == 0 && limit > 0 => vec![tuple.clone()],
        _ => Vec::new(),
    };
    Ok(Reply::rows(rows))
}

fn update(store: &Store, mut body: Bytes) -> Result<Reply, Fault> {
    need(&body, 8)?;
    let space_no = body.get_u32_le();
    let flags = body.get_u32_le();
    let key = codec::get_tuple(&mut body)?;
    let key = key.first().ok_or_else(|| fault(ERR_MALFORMED, "Empty key"))?;
    need(&body, 4)?;
    let op_count = body.get_u32_le();
    let mut ops = Vec::with_capacity(op_count as usize);
    for _ in 0..op_count {
        need(&body, 5)?;
        let field_no = body.get_u32_le();
        let op_code = body.get_u8();
        let arg = codec::get_field(&mut body)?;
        ops.push((field_no, op_code, arg.to_vec()));
    }

    let mut spaces = store.spaces.lock().expect("store lock");
    let Some(tuple) = spaces.get_mut(&space_no).and_then(|space| space.get_mut(key.as_ref()))
    else {
        return Ok(Reply::count(0));
    };
    for (field_no, op_code, arg) in &ops {
        apply_op(tuple, *field_no as usize, *op_code, arg)?;
    }
    Ok(Reply::affected(tuple.clone(), flags))
}

fn apply_op(tuple: &mut Tuple, field_no: usize, op_code: u8, arg: &[u8]) -> Result<(), Fault> {
    match op_code {
        // assign; extends the tuple by one when addressing one past the end
        0 => {
            if field_no < tuple.len() {
                tuple[field_no] = arg.to_vec();
            } else if field_no == tuple.len() {
                tuple.push(arg.to_vec());
            } else {
                return Err(fault(ERR_FIELD_RANGE, "Field number out of range"));
            }
        }
        1..=4 => {
            let field = tuple
                .get_mut(field_no)
                .ok_or_else(|| fault(ERR_FIELD_RANGE, "Field number out of range"))?;
            *field = arith(field, op_code, arg)?;
        }
        6 => {
            if field_no >= tuple.len() {
                return Err(fault(ERR_FIELD_RANGE, "Field number out of range"));
            }
            tuple.remove(field_no);
        }
        7 => {
            if field_no > tuple.len() {
                return Err(fault(ERR_FIELD_RANGE, "Field number out of range"));
            }
            tuple.insert(field_no, arg.to_vec());
        }
        _ => return Err(fault(ERR_UNSUPPORTED, "Unsupported update operation")),
    }
    Ok(())
}

fn arith(field: &[u8], op_code: u8, arg: &[u8]) -> Result<Vec<u8>, Fault> {
    match (field.len(), arg.len()) {
        (4, 4) => {
            let a = u32::from_le_bytes(field.try_into().expect("length checked"));
            let b = u32::from_le_bytes(arg.try_into().expect("length checked"));
            let out = match op_code {
                1 => a.wrapping_add(b),
                2 => a & b,
                3 => a ^ b,
                _ => a | b,
            };
            Ok(out.to_le_bytes().to_vec())
        }
        (8, 8) => {
            let a = u64::from_le_bytes(field.try_into().expect("length checked"));
            let b = u64::from_le_bytes(arg.try_into().expect("length checked"));
            let out = match op_code {
                1 => a.wrapping_add(b),
                2 => a & b,
                3 => a ^ b,
                _ => a | b,
            };
            Ok(out.to_le_bytes().to_vec())
        }
        _ => Err(fault(ERR_TYPE_MISMATCH, "Field type mismatch")),
    }
}

fn delete(store: &Store, mut body: Bytes) -> Result<Reply, Fault> {
    need(&body, 8)?;
    let space_no = body.get_u32_le();
    let flags = body.get_u32_le();
    let key = codec::get_tuple(&mut body)?;
    let key = key.first().ok_or_else(|| fault(ERR_MALFORMED, "Empty key"))?;

    let mut spaces = store.spaces.lock().expect("store lock");
    match spaces.get_mut(&space_no).and_then(|space| space.remove(key.as_ref())) {
        Some(tuple) => Ok(Reply::affected(tuple, flags)),
        None => Ok(Reply::count(0)),
    }
}

fn call(mut body: Bytes) -> Result<Reply, Fault> {
    need(&body, 4)?;
    let _flags = body.get_u32_le();
    let proc = codec::get_field(&mut body)?;
    let args = stored(codec::get_tuple(&mut body)?);
    match proc.as_ref() {
        b"echo" => Ok(Reply::rows(vec![args])),
        _ => Err(fault(ERR_NO_SUCH_PROC, "Procedure is not defined")),
    }
}

fn respond(header: Header, result: Result<Reply, Fault>) -> Vec<u8> {
    let mut body = BytesMut::new();
    match result {
        Ok(reply) => {
            body.put_u32_le(0);
            body.put_u32_le(reply.rowcount);
            if reply.include_rows {
                for tuple in &reply.rows {
                    put_stored_tuple(&mut body, tuple);
                }
            }
        }
        Err(fault) => {
            body.put_u32_le((fault.code << 8) | 2);
            body.put_slice(fault.message.as_bytes());
            body.put_u8(0);
        }
    }
    frame(header, &body)
}

fn put_stored_tuple(body: &mut BytesMut, tuple: &Tuple) {
    let mut packed = BytesMut::new();
    for field in tuple {
        codec::put_varint(&mut packed, field.len() as u64).expect("field fits varint");
        packed.put_slice(field);
    }
    body.put_u32_le(packed.len() as u32);
    body.put_u32_le(tuple.len() as u32);
    body.put_slice(&packed);
}

fn frame(header: Header, body: &[u8]) -> Vec<u8> {
    let mut out = BytesMut::with_capacity(HEADER_SIZE + body.len());
    Header {
        op: header.op,
        body_length: body.len() as u32,
        request_id: header.request_id,
    }
    .encode(&mut out);
    out.put_slice(body);
    out.to_vec()
}
