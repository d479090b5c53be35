pub mod codec;
pub mod request;
pub mod response;
pub mod value;

pub use request::{
    Header, OpCode, Request, UpdateOp, UpdateOpKind, FLAG_ADD, FLAG_REPLACE, FLAG_RETURN,
    HEADER_SIZE, PING_REQUEST_ID,
};
pub use response::{Completion, Response};
pub use value::{FieldType, TextErrors, Value};
