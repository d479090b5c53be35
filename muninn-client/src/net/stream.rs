use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::config::ServerAddr;
use crate::error::{Error, Result};

pub trait IoStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> IoStream for T {}

/// One connected transport stream. TCP and local stream sockets share the
/// same framing, so everything above this point is transport-agnostic.
pub type BoxedIo = Box<dyn IoStream>;

/// Open a stream to `addr`, bounded by `connect_timeout`.
pub async fn connect(addr: &ServerAddr, connect_timeout: Duration) -> Result<BoxedIo> {
    match addr {
        ServerAddr::Tcp { host, port } => {
            let stream = timeout(connect_timeout, TcpStream::connect((host.as_str(), *port)))
                .await
                .map_err(|_| Error::Connection(format!("connect timeout to {host}:{port}")))??;
            Ok(Box::new(stream))
        }
        #[cfg(unix)]
        ServerAddr::Unix { path } => {
            let stream = timeout(connect_timeout, UnixStream::connect(path))
                .await
                .map_err(|_| Error::Connection(format!("connect timeout to {path}")))??;
            Ok(Box::new(stream))
        }
        #[cfg(not(unix))]
        ServerAddr::Unix { path } => Err(Error::Usage(format!(
            "local stream socket {path} is not supported on this platform"
        ))),
    }
}
