//! SNMP client: the request/response engine.
//!
//! [`Client`] builds PDUs, assigns request IDs, transmits over a
//! [`Transport`], and correlates responses back to the calling task. A
//! blocking call parks only its own task; the transport's receive path keeps
//! running, so any number of calls can be outstanding concurrently.

mod table;
mod walk;

pub use walk::{BulkWalk, Walk};

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use bytes::Bytes;

use crate::error::{Error, MalformedResponseKind, Result};
use crate::oid::Oid;
use crate::pdu::{Message, Pdu, PduType};
use crate::transport::{Transport, UdpTransport};
use crate::varbind::VarBind;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Community string sent with every request.
    pub community: Bytes,
    /// Per-attempt response deadline.
    pub timeout: Duration,
    /// Retransmissions after the first attempt times out. The retry carries
    /// the same request ID.
    pub retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            community: Bytes::from_static(b"public"),
            timeout: Duration::from_millis(1500),
            retries: 2,
        }
    }
}

/// SNMP client over a transport.
///
/// Cheap to clone; clones share the transport and request-ID counter.
pub struct Client<T: Transport> {
    transport: T,
    config: Arc<ClientConfig>,
    /// Fallback counter for transports that do not allocate request IDs.
    next_request_id: Arc<AtomicI32>,
}

impl<T: Transport> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            config: self.config.clone(),
            next_request_id: self.next_request_id.clone(),
        }
    }
}

impl Client<UdpTransport> {
    /// Start building a UDP client for `target` (`host:port`).
    pub fn builder(target: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(target)
    }
}

impl<T: Transport> Client<T> {
    /// Create a client over an existing transport.
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            config: Arc::new(config),
            next_request_id: Arc::new(AtomicI32::new(1)),
        }
    }

    /// The transport's peer address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.transport.peer_addr()
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn fresh_request_id(&self) -> i32 {
        self.transport
            .alloc_request_id()
            .unwrap_or_else(|| self.next_request_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Transmit a request and await the correlated response PDU.
    ///
    /// Encodes once and retransmits the identical frame on timeout, so every
    /// attempt carries the same request ID.
    async fn send_request(&self, pdu: Pdu) -> Result<Pdu> {
        let request_id = pdu.request_id;
        let expected = match pdu.pdu_type {
            PduType::Get | PduType::GetNext => Some(pdu.varbinds.clone()),
            _ => None,
        };
        let check_oids = pdu.pdu_type == PduType::Get;
        let frame = Message::new(self.config.community.clone(), pdu).encode();

        let attempts = self.config.retries + 1;
        for attempt in 0..attempts {
            if attempt > 0 {
                tracing::debug!(
                    snmp.request_id = request_id,
                    snmp.attempt = attempt + 1,
                    "retransmitting request"
                );
            }
            self.transport.send(&frame).await?;

            match self.transport.recv(request_id, self.config.timeout).await {
                Ok((data, _source)) => {
                    let response = Message::decode(data)?;
                    return self.vet_response(request_id, expected.as_deref(), check_oids, response);
                }
                Err(Error::Timeout { .. }) if attempt + 1 < attempts => continue,
                Err(Error::Timeout {
                    target, elapsed, ..
                }) => {
                    return Err(Error::Timeout {
                        target,
                        elapsed,
                        request_id,
                        retries: self.config.retries,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        unreachable!("loop returns on the final attempt")
    }

    fn vet_response(
        &self,
        request_id: i32,
        expected: Option<&[VarBind]>,
        check_oids: bool,
        response: Message,
    ) -> Result<Pdu> {
        let pdu = response.pdu;
        if pdu.pdu_type != PduType::Response {
            return Err(Error::malformed(
                request_id,
                MalformedResponseKind::NotAResponse,
            ));
        }
        if pdu.request_id != request_id {
            return Err(Error::RequestIdMismatch {
                expected: request_id,
                actual: pdu.request_id,
            });
        }
        if pdu.error_status != 0 {
            return Err(Error::Snmp {
                target: Some(self.transport.peer_addr()),
                status: pdu.status(),
                index: pdu.error_index,
            });
        }
        if let Some(requested) = expected {
            if pdu.varbinds.len() != requested.len() {
                return Err(Error::malformed(
                    request_id,
                    MalformedResponseKind::BindingCountMismatch {
                        expected: requested.len(),
                        actual: pdu.varbinds.len(),
                    },
                ));
            }
            if check_oids {
                for (i, (got, asked)) in pdu.varbinds.iter().zip(requested).enumerate() {
                    if got.oid != asked.oid {
                        return Err(Error::malformed(
                            request_id,
                            MalformedResponseKind::BindingOidMismatch { index: i },
                        ));
                    }
                }
            }
        }
        Ok(pdu)
    }

    /// GET several OIDs in one round trip.
    pub async fn get_many(&self, oids: &[Oid]) -> Result<Vec<VarBind>> {
        let pdu = Pdu::request(PduType::Get, self.fresh_request_id(), oids);
        Ok(self.send_request(pdu).await?.varbinds)
    }

    /// GET a single OID.
    pub async fn get(&self, oid: &Oid) -> Result<VarBind> {
        let mut varbinds = self.get_many(std::slice::from_ref(oid)).await?;
        Ok(varbinds.remove(0))
    }

    /// GET a single OID and render its value canonically.
    ///
    /// This is the degenerate walk of size one: no iteration, just the bound
    /// value's text form.
    pub async fn get_as_string(&self, oid: &Oid) -> Result<String> {
        Ok(self.get(oid).await?.value.to_string())
    }

    /// GETNEXT several OIDs in one round trip.
    pub async fn get_next_many(&self, oids: &[Oid]) -> Result<Vec<VarBind>> {
        let pdu = Pdu::request(PduType::GetNext, self.fresh_request_id(), oids);
        Ok(self.send_request(pdu).await?.varbinds)
    }

    /// GETNEXT a single OID.
    pub async fn get_next(&self, oid: &Oid) -> Result<VarBind> {
        let mut varbinds = self.get_next_many(std::slice::from_ref(oid)).await?;
        Ok(varbinds.remove(0))
    }

    /// GETBULK: up to `max_repetitions` successive values per repeating OID
    /// in one round trip.
    pub async fn get_bulk(
        &self,
        oids: &[Oid],
        non_repeaters: u32,
        max_repetitions: u32,
    ) -> Result<Vec<VarBind>> {
        let pdu = Pdu::bulk_request(
            self.fresh_request_id(),
            oids,
            non_repeaters,
            max_repetitions,
        );
        Ok(self.send_request(pdu).await?.varbinds)
    }
}

impl<T: Transport + 'static> Client<T> {
    /// GET a single OID without blocking the caller.
    ///
    /// `on_response` runs on the response path when the answer (or the final
    /// timeout) arrives. Completions of distinct outstanding calls happen in
    /// arrival order, not submission order.
    pub fn get_async<F>(&self, oid: Oid, on_response: F)
    where
        F: FnOnce(Result<VarBind>) + Send + 'static,
    {
        let client = self.clone();
        tokio::spawn(async move {
            on_response(client.get(&oid).await);
        });
    }

    /// Walk the subtree under `base` with repeated GETNEXT.
    pub fn walk(&self, base: Oid) -> Walk<T> {
        Walk::new(self.clone(), base)
    }

    /// Walk the subtree under `base` with GETBULK batches of
    /// `max_repetitions`.
    pub fn bulk_walk(&self, base: Oid, max_repetitions: u32) -> BulkWalk<T> {
        BulkWalk::new(self.clone(), base, max_repetitions)
    }
}

/// Builder for UDP clients.
///
/// ```rust,no_run
/// # async fn example() -> minsnmp::Result<()> {
/// use std::time::Duration;
///
/// let client = minsnmp::Client::builder("192.0.2.10:161")
///     .community(b"public")
///     .timeout(Duration::from_secs(1))
///     .retries(2)
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    target: String,
    config: ClientConfig,
}

impl ClientBuilder {
    fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            config: ClientConfig::default(),
        }
    }

    /// Set the community string (default `public`).
    pub fn community(mut self, community: &[u8]) -> Self {
        self.config.community = Bytes::copy_from_slice(community);
        self
    }

    /// Set the per-attempt timeout (default 1500 ms).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the retransmission count (default 2).
    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    /// Resolve the target and connect a UDP transport.
    pub async fn connect(self) -> Result<Client<UdpTransport>> {
        let addr = self
            .target
            .to_socket_addrs()
            .map_err(|e| Error::Io {
                target: None,
                source: e,
            })?
            .next()
            .ok_or_else(|| Error::Io {
                target: None,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "could not resolve address",
                ),
            })?;
        let transport = UdpTransport::connect(addr).await?;
        Ok(Client::new(transport, self.config))
    }
}
