use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::time::{error::Elapsed, timeout};
use tokio_util::codec::Decoder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::proto::{Request, PING_REQUEST_ID};

use super::frame::{Frame, FrameCodec};
use super::inflight::InflightTable;
use super::stream::BoxedIo;

/// One live socket with its pending-request table. Requests from any task
/// are serialized onto the write half under a lock so headers are never
/// interleaved; the pool's supervisor drives the read half until the
/// connection dies.
pub struct Session {
    id: usize,
    peer: String,
    writer: tokio::sync::Mutex<WriteHalf<BoxedIo>>,
    inflight: Mutex<InflightTable>,
    connected: AtomicBool,
    closer: CancellationToken,
}

impl Session {
    pub(crate) fn new(
        id: usize,
        peer: String,
        writer: WriteHalf<BoxedIo>,
        backlog: Option<usize>,
        closer: CancellationToken,
    ) -> Session {
        Session {
            id,
            peer,
            writer: tokio::sync::Mutex::new(writer),
            inflight: Mutex::new(InflightTable::new(backlog)),
            connected: AtomicBool::new(true),
            closer,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Ask the read loop to wind the connection down.
    pub fn close(&self) {
        self.closer.cancel();
    }

    /// Encode and write `request`, returning the reply frame. The pending
    /// entry is registered before the write: a reply may arrive before the
    /// writer returns.
    pub async fn send(&self, request: Request<'_>) -> Result<Frame> {
        if !self.is_connected() {
            return Err(Error::lost_connection());
        }
        let (id, rx) = self.lock_inflight().register()?;
        let bytes = match request.encode(id) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.lock_inflight().unregister(id);
                return Err(e);
            }
        };
        if let Err(e) = self.write(&bytes).await {
            self.lock_inflight().unregister(id);
            self.close();
            return Err(e);
        }
        // teardown may have drained the table between the registration and
        // the write; an entry registered after the drain would never
        // complete
        if !self.is_connected() {
            self.lock_inflight().unregister(id);
            return Err(Error::lost_connection());
        }
        rx.await.unwrap_or_else(|_| Err(Error::lost_connection()))
    }

    /// PING uses the reserved id-0 FIFO lane.
    pub async fn ping(&self) -> Result<Frame> {
        if !self.is_connected() {
            return Err(Error::lost_connection());
        }
        let rx = self.lock_inflight().register_ping();
        let bytes = Request::Ping.encode(PING_REQUEST_ID)?;
        if let Err(e) = self.write(&bytes).await {
            self.close();
            return Err(e);
        }
        if !self.is_connected() {
            return Err(Error::lost_connection());
        }
        rx.await.unwrap_or_else(|_| Err(Error::lost_connection()))
    }

    async fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Drive the read half until the connection ends, then fail every
    /// outstanding waiter.
    pub(crate) async fn run(
        &self,
        mut reader: ReadHalf<BoxedIo>,
        max_body: usize,
        idle_timeout: Option<Duration>,
    ) {
        let mut codec = FrameCodec::new(max_body);
        let mut buf = BytesMut::with_capacity(4096);
        let reason = loop {
            // drain complete frames before reading more
            match codec.decode(&mut buf) {
                Ok(Some(frame)) => {
                    trace!(session = self.id, id = frame.header.request_id, "frame received");
                    if let Err(e) = self.lock_inflight().dispatch(frame) {
                        break e.to_string();
                    }
                    continue;
                }
                Ok(None) => {}
                Err(e) => break e.to_string(),
            }
            tokio::select! {
                _ = self.closer.cancelled() => break "connection closed".to_string(),
                res = maybe_timeout(idle_timeout, reader.read_buf(&mut buf)) => match res {
                    Ok(Ok(0)) => break "connection closed by server".to_string(),
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => break e.to_string(),
                    Err(_) => break "idle timeout".to_string(),
                },
            }
        };
        self.connected.store(false, Ordering::Release);
        debug!(session = self.id, peer = %self.peer, reason = %reason, "session closed");
        self.lock_inflight().broadcast_connection_lost();
    }

    /// Shut the write half down so the peer sees the close promptly.
    pub(crate) async fn shutdown_writer(&self) {
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }

    fn lock_inflight(&self) -> MutexGuard<'_, InflightTable> {
        self.inflight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn maybe_timeout<F: Future>(
    dur: Option<Duration>,
    fut: F,
) -> std::result::Result<F::Output, Elapsed> {
    match dur {
        Some(d) => timeout(d, fut).await,
        None => Ok(fut.await),
    }
}
