//! Scripted transport for unit tests.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use super::Transport;
use crate::error::{Error, ErrorStatus, Result};
use crate::oid::Oid;
use crate::pdu::{Message, Pdu};
use crate::value::Value;
use crate::varbind::VarBind;

enum MockReply {
    Response(Bytes),
    Timeout,
}

/// Transport that replays queued responses in order.
///
/// Each `recv` pops the next queued reply; an empty queue behaves like a
/// timeout. Sent frames are recorded for assertions.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

struct MockInner {
    peer: SocketAddr,
    queue: Mutex<VecDeque<MockReply>>,
    sent: Mutex<Vec<Bytes>>,
}

impl MockTransport {
    /// Create a mock transport pretending to talk to `peer`.
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            inner: Arc::new(MockInner {
                peer,
                queue: Mutex::new(VecDeque::new()),
                sent: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Queue a canned response frame.
    pub fn queue_response(&self, data: Bytes) {
        self.inner
            .queue
            .lock()
            .unwrap()
            .push_back(MockReply::Response(data));
    }

    /// Queue a forced timeout.
    pub fn queue_timeout(&self) {
        self.inner
            .queue
            .lock()
            .unwrap()
            .push_back(MockReply::Timeout);
    }

    /// Frames passed to `send`, in order.
    pub fn sent(&self) -> Vec<Bytes> {
        self.inner.sent.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    async fn send(&self, data: &[u8]) -> Result<()> {
        self.inner
            .sent
            .lock()
            .unwrap()
            .push(Bytes::copy_from_slice(data));
        Ok(())
    }

    async fn recv(&self, request_id: i32, timeout: Duration) -> Result<(Bytes, SocketAddr)> {
        let reply = self.inner.queue.lock().unwrap().pop_front();
        match reply {
            Some(MockReply::Response(data)) => Ok((data, self.inner.peer)),
            Some(MockReply::Timeout) | None => Err(Error::Timeout {
                target: Some(self.inner.peer),
                elapsed: timeout,
                request_id,
                retries: 0,
            }),
        }
    }

    fn peer_addr(&self) -> SocketAddr {
        self.inner.peer
    }

    fn local_addr(&self) -> SocketAddr {
        "127.0.0.1:0".parse().expect("literal address parses")
    }
}

/// Builds canned response frames for [`MockTransport`].
pub struct ResponseBuilder {
    request_id: i32,
    error_status: ErrorStatus,
    error_index: i32,
    varbinds: Vec<VarBind>,
}

impl ResponseBuilder {
    /// Start a response for the given request ID.
    pub fn new(request_id: i32) -> Self {
        Self {
            request_id,
            error_status: ErrorStatus::NoError,
            error_index: 0,
            varbinds: Vec::new(),
        }
    }

    /// Append a binding.
    pub fn varbind(mut self, oid: Oid, value: Value) -> Self {
        self.varbinds.push(VarBind::new(oid, value));
        self
    }

    /// Set an error status and index.
    pub fn error(mut self, status: ErrorStatus, index: i32) -> Self {
        self.error_status = status;
        self.error_index = index;
        self
    }

    /// Encode the frame under the given community.
    pub fn build(self, community: &[u8]) -> Bytes {
        Message::new(
            Bytes::copy_from_slice(community),
            Pdu::error_response(
                self.request_id,
                self.error_status,
                self.error_index,
                self.varbinds,
            ),
        )
        .encode()
    }
}
