#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod net;
pub mod proto;

pub use client::Client;
pub use config::{load_from_path, ClientConfig, ServerAddr};
pub use error::{Error, Result};
pub use proto::{
    Completion, FieldType, OpCode, Response, TextErrors, UpdateOp, UpdateOpKind, Value,
};
