use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};

use super::session::Session;
use super::stream;

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Connected-session count plus the number of slots still able to produce
/// one. Callers watch this to learn when the pool is ready, or will never
/// be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PoolState {
    connected: usize,
    live_slots: usize,
}

/// A fixed set of parallel sessions behind a FIFO ready queue. Each slot
/// runs a supervisor task that connects, drives the session until it
/// dies, and reconnects with capped exponential backoff when configured.
#[derive(Debug)]
pub struct Pool {
    cfg: ClientConfig,
    ready_tx: mpsc::UnboundedSender<Arc<Session>>,
    ready_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Arc<Session>>>,
    state_tx: watch::Sender<PoolState>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    next_session_id: AtomicUsize,
}

impl Pool {
    /// Start `poolsize` connection slots. Does not wait for readiness;
    /// eager entry points follow up with [`Pool::wait_ready`].
    pub fn start(cfg: ClientConfig) -> Arc<Pool> {
        let poolsize = cfg.poolsize;
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(PoolState { connected: 0, live_slots: poolsize });
        let pool = Arc::new(Pool {
            cfg,
            ready_tx,
            ready_rx: tokio::sync::Mutex::new(ready_rx),
            state_tx,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            next_session_id: AtomicUsize::new(1),
        });
        let tracker = pool.tracker.clone();
        for slot in 0..poolsize {
            let pool = Arc::clone(&pool);
            tracker.spawn(async move { pool.run_slot(slot).await });
        }
        // every slot task is spawned up front; reconnects happen inside
        tracker.close();
        pool
    }

    async fn run_slot(&self, slot: usize) {
        let mut delay = INITIAL_RECONNECT_DELAY;
        let max_delay = Duration::from_secs(self.cfg.max_reconnect_delay_secs);
        let connect_timeout = Duration::from_millis(self.cfg.connect_timeout_ms);
        let addr = self.cfg.addr();
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            match stream::connect(&addr, connect_timeout).await {
                Ok(io) => {
                    delay = INITIAL_RECONNECT_DELAY;
                    let (reader, writer) = tokio::io::split(io);
                    let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
                    let session = Arc::new(Session::new(
                        id,
                        addr.to_string(),
                        writer,
                        self.cfg.backlog,
                        self.shutdown.child_token(),
                    ));
                    info!(session = id, peer = %addr, "connected");
                    self.state_tx.send_modify(|s| s.connected += 1);
                    let _ = self.ready_tx.send(Arc::clone(&session));
                    session.run(reader, self.cfg.max_body, self.cfg.idle_timeout()).await;
                    session.shutdown_writer().await;
                    self.state_tx.send_modify(|s| s.connected -= 1);
                    if !self.cfg.reconnect || self.shutdown.is_cancelled() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(slot, peer = %addr, error = %e, "connect failed");
                    if !self.cfg.reconnect {
                        break;
                    }
                }
            }
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = sleep(delay) => {}
            }
            delay = (delay * 2).min(max_delay);
        }
        self.state_tx.send_modify(|s| s.live_slots -= 1);
        debug!(slot, "connection slot closed");
    }

    /// Wait for an idle connected session. Callers queue FIFO on the
    /// ready-channel lock; dead sessions pulled from the queue are
    /// discarded and the wait continues.
    pub async fn acquire(&self) -> Result<Arc<Session>> {
        if self.shutdown.is_cancelled() {
            return Err(Error::not_connected());
        }
        let mut ready_rx = self.ready_rx.lock().await;
        let mut state_rx = self.state_tx.subscribe();
        loop {
            {
                let state = *state_rx.borrow_and_update();
                if state.connected == 0 && state.live_slots == 0 {
                    return Err(Error::not_connected());
                }
            }
            tokio::select! {
                session = ready_rx.recv() => {
                    let Some(session) = session else {
                        return Err(Error::not_connected());
                    };
                    if session.is_connected() {
                        return Ok(session);
                    }
                    debug!(session = session.id(), "discarding dead connection");
                }
                _ = state_rx.changed() => {}
                _ = self.shutdown.cancelled() => return Err(Error::not_connected()),
            }
        }
    }

    /// Return a session after a call. Dead sessions are dropped here and
    /// replaced by their slot's reconnect loop.
    pub fn release(&self, session: Arc<Session>) {
        if session.is_connected() {
            let _ = self.ready_tx.send(session);
        }
    }

    /// Wait until every slot has settled: connected, or permanently out
    /// of the game (reconnect disabled). Errors when nothing connected.
    pub async fn wait_ready(&self) -> Result<()> {
        let mut state_rx = self.state_tx.subscribe();
        loop {
            let state = *state_rx.borrow_and_update();
            if state.live_slots == 0 {
                return Err(Error::Connection("unable to establish any connection".into()));
            }
            if state.connected == state.live_slots {
                return Ok(());
            }
            if state_rx.changed().await.is_err() {
                return Err(Error::not_connected());
            }
        }
    }

    /// Stop reconnects, close every socket, and resolve once the pool is
    /// fully drained (every session unregistered).
    pub async fn disconnect(&self) {
        self.shutdown.cancel();
        self.tracker.wait().await;
    }
}
