use std::collections::{HashMap, VecDeque};

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::proto::PING_REQUEST_ID;

use super::frame::Frame;

type Waiter = oneshot::Sender<Result<Frame>>;

/// Pending-request table: one completion handle per outstanding request
/// id, plus a FIFO lane for PING (whose replies always arrive with id 0).
#[derive(Debug)]
pub struct InflightTable {
    waiting: HashMap<u32, Waiter>,
    ping_lane: VecDeque<Waiter>,
    next_id: u32,
    backlog: Option<usize>,
}

impl InflightTable {
    pub fn new(backlog: Option<usize>) -> InflightTable {
        InflightTable {
            waiting: HashMap::new(),
            ping_lane: VecDeque::new(),
            next_id: 1,
            backlog,
        }
    }

    /// Register a pending request under a freshly allocated id. The id is
    /// unique among all outstanding requests; registration happens before
    /// the request bytes are written so a fast reply always finds its
    /// waiter.
    pub fn register(&mut self) -> Result<(u32, oneshot::Receiver<Result<Frame>>)> {
        if let Some(cap) = self.backlog {
            if self.waiting.len() >= cap {
                return Err(Error::Capacity);
            }
        }
        let (tx, rx) = oneshot::channel();
        let id = self.next_id;
        self.waiting.insert(id, tx);
        // advance past the issued id, wrapping to 1 (0 is the ping lane)
        // and skipping ids still in use
        loop {
            self.next_id = match self.next_id.checked_add(1) {
                Some(n) => n,
                None => 1,
            };
            if !self.waiting.contains_key(&self.next_id) {
                break;
            }
        }
        Ok((id, rx))
    }

    /// Queue a PING waiter; id-0 replies complete in FIFO order.
    pub fn register_ping(&mut self) -> oneshot::Receiver<Result<Frame>> {
        let (tx, rx) = oneshot::channel();
        self.ping_lane.push_back(tx);
        rx
    }

    /// Route one inbound frame to its waiter. An id with no pending entry
    /// (or an id-0 reply with an empty ping lane) means the stream is
    /// desynchronized and the connection must be dropped. A reply for a
    /// waiter that is gone is silently discarded.
    pub fn dispatch(&mut self, frame: Frame) -> Result<()> {
        let id = frame.header.request_id;
        let waiter = if id == PING_REQUEST_ID {
            self.ping_lane
                .pop_front()
                .ok_or_else(|| Error::Protocol("reply for id 0 with no pending ping".into()))?
        } else {
            self.waiting
                .remove(&id)
                .ok_or_else(|| Error::Protocol(format!("reply for unknown request id {id}")))?
        };
        let _ = waiter.send(Ok(frame));
        Ok(())
    }

    /// Drop a keyed entry without completing it (failed write).
    pub fn unregister(&mut self, id: u32) {
        self.waiting.remove(&id);
    }

    /// Fail every pending waiter, keyed and ping lane alike.
    pub fn broadcast_connection_lost(&mut self) {
        for (_, waiter) in self.waiting.drain() {
            let _ = waiter.send(Err(Error::lost_connection()));
        }
        for waiter in self.ping_lane.drain(..) {
            let _ = waiter.send(Err(Error::lost_connection()));
        }
    }

    pub fn pending(&self) -> usize {
        self.waiting.len() + self.ping_lane.len()
    }
}
