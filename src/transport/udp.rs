//! UDP transport with request-ID correlation.
//!
//! A background task owns the receive path: it is the only writer to the
//! pending-call table and fans responses out to parked callers by request ID.
//! Blocking callers therefore never block each other or the receive loop, so
//! any number of synchronous and asynchronous calls can be outstanding at
//! once.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::Transport;
use crate::error::{Error, Result};
use crate::pdu::extract_request_id;
use crate::util::bind_udp_socket;

const MAX_DATAGRAM: usize = 65535;

/// UDP transport bound to one peer.
///
/// Cheap to clone; all clones share the socket, the pending-call table, and
/// the request-ID counter. [`close`](UdpTransport::close) stops the receive
/// task and completes every outstanding call with
/// [`Error::Closed`] so no caller hangs.
#[derive(Clone)]
pub struct UdpTransport {
    inner: Arc<Inner>,
}

struct Inner {
    socket: UdpSocket,
    peer: SocketAddr,
    local_addr: SocketAddr,
    pending: Mutex<HashMap<i32, PendingCall>>,
    /// Monotonic, wrapping on overflow. Shared across clones so concurrent
    /// callers never collide.
    next_request_id: AtomicI32,
    shutdown: CancellationToken,
}

/// One outstanding call: where to deliver the response, and until when the
/// caller cares.
struct PendingCall {
    sender: oneshot::Sender<Result<(Bytes, SocketAddr)>>,
    deadline: Instant,
}

impl UdpTransport {
    /// Bind an ephemeral local port and associate with `peer`.
    pub async fn connect(peer: SocketAddr) -> Result<Self> {
        let bind_addr: SocketAddr = if peer.is_ipv6() {
            "[::]:0".parse().expect("literal address parses")
        } else {
            "0.0.0.0:0".parse().expect("literal address parses")
        };

        let socket = bind_udp_socket(bind_addr).map_err(|e| Error::Io {
            target: Some(peer),
            source: e,
        })?;
        let local_addr = socket.local_addr().map_err(|e| Error::Io {
            target: Some(peer),
            source: e,
        })?;

        // Randomize the initial request ID so a quick restart (enabled by
        // SO_REUSEADDR) does not collide with the previous incarnation's
        // in-flight IDs. Time-based entropy is enough for that.
        let initial_request_id = {
            use std::time::{SystemTime, UNIX_EPOCH};
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as i32)
                .unwrap_or(1)
                .wrapping_abs()
                .max(1)
        };

        tracing::debug!(
            snmp.peer = %peer,
            snmp.local_addr = %local_addr,
            snmp.initial_request_id = initial_request_id,
            "UDP transport bound"
        );

        let inner = Arc::new(Inner {
            socket,
            peer,
            local_addr,
            pending: Mutex::new(HashMap::new()),
            next_request_id: AtomicI32::new(initial_request_id),
            shutdown: CancellationToken::new(),
        });

        Self::start_recv_loop(inner.clone());

        Ok(Self { inner })
    }

    /// Stop the receive task and fail every pending call with
    /// [`Error::Closed`].
    ///
    /// Calls issued after close also fail with `Closed`.
    pub fn close(&self) {
        self.inner.shutdown.cancel();
    }

    /// Whether [`close`](UdpTransport::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    fn start_recv_loop(inner: Arc<Inner>) {
        tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_DATAGRAM];

            loop {
                tokio::select! {
                    _ = inner.shutdown.cancelled() => {
                        let drained: Vec<PendingCall> = {
                            let mut pending = inner.pending.lock().unwrap();
                            pending.drain().map(|(_, p)| p).collect()
                        };
                        tracing::debug!(
                            snmp.peer = %inner.peer,
                            snmp.pending = drained.len(),
                            "transport closed, failing pending calls"
                        );
                        for call in drained {
                            let _ = call.sender.send(Err(Error::Closed));
                        }
                        return;
                    }
                    received = inner.socket.recv_from(&mut buf) => {
                        match received {
                            Ok((len, source)) => {
                                let data = Bytes::copy_from_slice(&buf[..len]);
                                Self::route(&inner, data, source);
                            }
                            Err(e) => {
                                // Socket faults are logged but do not stop the loop.
                                tracing::error!(error = %e, "transport recv error");
                            }
                        }
                    }
                }

                // Sweep expired pending calls inline; their waiters time out
                // on their own, this just bounds the table.
                let now = Instant::now();
                inner
                    .pending
                    .lock()
                    .unwrap()
                    .retain(|_, p| p.deadline > now);
            }
        });
    }

    fn route(inner: &Inner, data: Bytes, source: SocketAddr) {
        tracing::trace!(
            snmp.source = %source,
            snmp.bytes = data.len(),
            "transport received packet"
        );

        let Some(request_id) = extract_request_id(&data) else {
            tracing::debug!(
                snmp.source = %source,
                "received packet without extractable request_id"
            );
            return;
        };

        if source != inner.peer {
            tracing::warn!(
                snmp.request_id = request_id,
                snmp.peer = %inner.peer,
                snmp.source = %source,
                "response source address mismatch"
            );
        }

        let call = inner.pending.lock().unwrap().remove(&request_id);
        match call {
            // Receiver may have timed out already; a dropped receiver is fine.
            Some(call) => {
                let _ = call.sender.send(Ok((data, source)));
            }
            None => {
                tracing::debug!(
                    snmp.request_id = request_id,
                    snmp.source = %source,
                    "response for unknown request_id"
                );
            }
        }
    }
}

impl Transport for UdpTransport {
    async fn send(&self, data: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        tracing::trace!(
            snmp.peer = %self.inner.peer,
            snmp.bytes = data.len(),
            "UDP send"
        );
        self.inner
            .socket
            .send_to(data, self.inner.peer)
            .await
            .map_err(|e| Error::Io {
                target: Some(self.inner.peer),
                source: e,
            })?;
        Ok(())
    }

    async fn recv(&self, request_id: i32, timeout: Duration) -> Result<(Bytes, SocketAddr)> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().unwrap().insert(
            request_id,
            PendingCall {
                sender: tx,
                deadline: Instant::now() + timeout,
            },
        );

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                // Sender dropped: either close raced us or the sweep removed
                // an expired entry.
                self.inner.pending.lock().unwrap().remove(&request_id);
                if self.is_closed() {
                    Err(Error::Closed)
                } else {
                    Err(Error::Timeout {
                        target: Some(self.inner.peer),
                        elapsed: timeout,
                        request_id,
                        retries: 0,
                    })
                }
            }
            Err(_) => {
                self.inner.pending.lock().unwrap().remove(&request_id);
                Err(Error::Timeout {
                    target: Some(self.inner.peer),
                    elapsed: timeout,
                    request_id,
                    retries: 0,
                })
            }
        }
    }

    fn peer_addr(&self) -> SocketAddr {
        self.inner.peer
    }

    fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    fn alloc_request_id(&self) -> Option<i32> {
        Some(self.inner.next_request_id.fetch_add(1, Ordering::Relaxed))
    }
}
