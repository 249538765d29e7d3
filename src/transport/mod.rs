//! Transport layer abstraction.
//!
//! The core is transport-agnostic: it needs a datagram send primitive and a
//! receive primitive that can hand back the response correlated to a request
//! ID. [`UdpTransport`] is the stock implementation; tests substitute
//! [`MockTransport`].

mod udp;

#[cfg(any(test, feature = "testing"))]
mod mock;

pub use udp::*;

#[cfg(any(test, feature = "testing"))]
pub use mock::*;

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// Client-side transport abstraction.
///
/// # Clone Requirement
///
/// The `Clone` bound is required because walk streams own a clone of the
/// client (and thus the transport), enabling concurrent walks without borrow
/// conflicts. Implementations use `Arc` internally, making clone cheap.
pub trait Transport: Send + Sync + Clone {
    /// Send request data to the peer.
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Receive the response correlated to `request_id`, waiting at most
    /// `timeout`.
    ///
    /// Returns the response data and the actual source address. Fails with
    /// [`Error::Timeout`](crate::Error::Timeout) when the deadline passes and
    /// with [`Error::Closed`](crate::Error::Closed) when the transport is
    /// closed while the call is outstanding.
    fn recv(
        &self,
        request_id: i32,
        timeout: Duration,
    ) -> impl Future<Output = Result<(Bytes, SocketAddr)>> + Send;

    /// The peer address this transport sends to.
    fn peer_addr(&self) -> SocketAddr;

    /// Local bind address.
    fn local_addr(&self) -> SocketAddr;

    /// Allocate a request ID from the transport's counter.
    ///
    /// Returns `None` when the transport does not manage IDs; the client then
    /// uses its own counter.
    fn alloc_request_id(&self) -> Option<i32> {
        None
    }
}
