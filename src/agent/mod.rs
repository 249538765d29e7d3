//! SNMPv2c agent: serves a managed-object tree over UDP.
//!
//! The agent owns one socket and one receive task. For each inbound PDU it
//! resolves the community to an access group, resolves every requested OID
//! through the registry restricted to the group's view, and answers with a
//! response PDU carrying the same request ID. Registration calls from the
//! owning process are serialized against the receive task's reads by a single
//! mutex around the registry; nothing on the receive path ever blocks on
//! response-side processing.

pub mod access;

pub use access::{AccessControl, View};

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, ErrorStatus, Result};
use crate::oid::Oid;
use crate::pdu::{Message, Pdu, PduType};
use crate::registry::{MoEntry, MoRegistry};
use crate::util::bind_udp_socket;
use crate::value::Value;
use crate::varbind::VarBind;

const MAX_DATAGRAM: usize = 65535;

struct ServeState {
    registry: Mutex<MoRegistry>,
    access: AccessControl,
}

/// A running SNMP agent.
///
/// Built with [`Agent::builder()`]. The managed-object tree may be populated
/// before or after the agent starts serving.
///
/// ```rust,no_run
/// use minsnmp::agent::{Agent, View};
/// use minsnmp::registry::MoEntry;
/// use minsnmp::oid;
///
/// # async fn example() -> minsnmp::Result<()> {
/// let agent = Agent::builder()
///     .bind("0.0.0.0:161")
///     .community("public", "readers")
///     .view("readers", View::new().include(oid!(1, 3)))
///     .build()
///     .await?;
///
/// agent.register_managed_object(MoEntry::read_only(
///     oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
///     "my system",
/// ))?;
/// # Ok(())
/// # }
/// ```
pub struct Agent {
    state: Arc<ServeState>,
    local_addr: SocketAddr,
    shutdown: CancellationToken,
}

impl Agent {
    /// Start building an agent.
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// The bound socket address (useful with an ephemeral port).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Register one managed object.
    ///
    /// Fails with [`Error::DuplicateRegistration`] if the OID is taken.
    pub fn register_managed_object(&self, entry: MoEntry) -> Result<()> {
        self.state.registry.lock().unwrap().register(entry)
    }

    /// Register a whole table (or any entry batch) atomically.
    ///
    /// On any duplicate, nothing is inserted.
    pub fn register_table(&self, entries: Vec<MoEntry>) -> Result<()> {
        self.state.registry.lock().unwrap().register_all(entries)
    }

    /// Unregister the entry at `oid`. Idempotent; returns whether an entry
    /// was removed.
    pub fn unregister_managed_object(&self, oid: &Oid) -> bool {
        self.state.registry.lock().unwrap().unregister(oid)
    }

    /// Stop the receive task. In-flight datagrams are abandoned; the socket
    /// closes when the task exits.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Builder for [`Agent`].
pub struct AgentBuilder {
    bind_addr: String,
    access: AccessControl,
}

impl AgentBuilder {
    fn new() -> Self {
        Self {
            bind_addr: "0.0.0.0:161".into(),
            access: AccessControl::new(),
        }
    }

    /// Set the bind address (default `0.0.0.0:161`; use port 0 for an
    /// ephemeral port).
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    /// Map a community string to an access group.
    pub fn community(mut self, community: impl Into<Bytes>, group: impl Into<Bytes>) -> Self {
        self.access.add_community(community, group);
        self
    }

    /// Grant a group its read view.
    pub fn view(mut self, group: impl Into<Bytes>, view: View) -> Self {
        self.access.add_view(group, view);
        self
    }

    /// Bind the socket and start serving.
    pub async fn build(self) -> Result<Agent> {
        let bind_addr: SocketAddr = self.bind_addr.parse().map_err(|_| Error::Io {
            target: None,
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid bind address: {}", self.bind_addr),
            ),
        })?;

        let socket = bind_udp_socket(bind_addr).map_err(|e| Error::Io {
            target: Some(bind_addr),
            source: e,
        })?;
        let local_addr = socket.local_addr().map_err(|e| Error::Io {
            target: Some(bind_addr),
            source: e,
        })?;

        tracing::debug!(snmp.local_addr = %local_addr, "agent bound");

        let state = Arc::new(ServeState {
            registry: Mutex::new(MoRegistry::new()),
            access: self.access,
        });
        let shutdown = CancellationToken::new();

        tokio::spawn(serve(socket, state.clone(), shutdown.clone()));

        Ok(Agent {
            state,
            local_addr,
            shutdown,
        })
    }
}

async fn serve(socket: UdpSocket, state: Arc<ServeState>, shutdown: CancellationToken) {
    let mut buf = vec![0u8; MAX_DATAGRAM];

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::debug!("agent receive task stopping");
                return;
            }
            received = socket.recv_from(&mut buf) => {
                let (len, source) = match received {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::error!(error = %e, "agent recv error");
                        continue;
                    }
                };

                let data = Bytes::copy_from_slice(&buf[..len]);
                let message = match Message::decode(data) {
                    Ok(message) => message,
                    Err(e) => {
                        // Undecodable frames carry nothing to answer to.
                        tracing::debug!(
                            snmp.source = %source,
                            error = %e,
                            "dropping undecodable datagram"
                        );
                        continue;
                    }
                };

                tracing::trace!(
                    snmp.source = %source,
                    snmp.request_id = message.pdu.request_id,
                    snmp.pdu_type = ?message.pdu.pdu_type,
                    "agent handling request"
                );

                if let Some(response) = handle_message(&state, message) {
                    let frame = response.encode();
                    if let Err(e) = socket.send_to(&frame, source).await {
                        tracing::warn!(
                            snmp.source = %source,
                            error = %e,
                            "failed to send response"
                        );
                    }
                }
            }
        }
    }
}

/// Resolve one inbound message to its response, if it warrants one.
fn handle_message(state: &ServeState, message: Message) -> Option<Message> {
    let Message { community, pdu } = message;

    if pdu.pdu_type == PduType::Response {
        tracing::debug!(
            snmp.request_id = pdu.request_id,
            "ignoring unsolicited response PDU"
        );
        return None;
    }

    // An unmapped community is rejected on the wire, never silently dropped
    // and never served.
    if state.access.group_for(&community).is_none() {
        tracing::debug!(
            snmp.request_id = pdu.request_id,
            "rejecting request with unknown community"
        );
        return Some(Message::new(
            community,
            Pdu::error_response(
                pdu.request_id,
                ErrorStatus::AuthorizationError,
                0,
                pdu.varbinds,
            ),
        ));
    }

    // Known community: serve, restricted to the group's view. A group with
    // no configured view sees nothing.
    let empty = View::new();
    let view = state.access.view_for(&community).unwrap_or(&empty);
    let registry = state.registry.lock().unwrap();

    let response = match pdu.pdu_type {
        PduType::Get => {
            let varbinds = pdu
                .varbinds
                .iter()
                .map(|vb| {
                    let value = if view.contains(&vb.oid) {
                        registry.get(&vb.oid)
                    } else {
                        Value::NoSuchObject
                    };
                    VarBind::new(vb.oid.clone(), value)
                })
                .collect();
            Pdu::response(pdu.request_id, varbinds)
        }
        PduType::GetNext => {
            let varbinds = pdu
                .varbinds
                .iter()
                .map(|vb| match next_in_view(&registry, view, &vb.oid) {
                    Some((oid, value)) => VarBind::new(oid, value),
                    None => VarBind::new(vb.oid.clone(), Value::EndOfMibView),
                })
                .collect();
            Pdu::response(pdu.request_id, varbinds)
        }
        PduType::GetBulk => {
            let non_repeaters = pdu.non_repeaters() as usize;
            let max_repetitions = pdu.max_repetitions();
            let mut varbinds = Vec::new();

            for vb in pdu.varbinds.iter().take(non_repeaters) {
                match next_in_view(&registry, view, &vb.oid) {
                    Some((oid, value)) => varbinds.push(VarBind::new(oid, value)),
                    None => varbinds.push(VarBind::new(vb.oid.clone(), Value::EndOfMibView)),
                }
            }
            for vb in pdu.varbinds.iter().skip(non_repeaters) {
                let mut cursor = vb.oid.clone();
                for _ in 0..max_repetitions {
                    match next_in_view(&registry, view, &cursor) {
                        Some((oid, value)) => {
                            varbinds.push(VarBind::new(oid.clone(), value));
                            cursor = oid;
                        }
                        None => {
                            // This column is done; answer the sentinel once
                            // and stop repeating it.
                            varbinds.push(VarBind::new(cursor.clone(), Value::EndOfMibView));
                            break;
                        }
                    }
                }
            }
            Pdu::response(pdu.request_id, varbinds)
        }
        PduType::Set => {
            // This core serves read-only objects; reject rather than drop.
            Pdu::error_response(pdu.request_id, ErrorStatus::NotWritable, 1, pdu.varbinds)
        }
        PduType::Response => unreachable!("handled above"),
    };

    Some(Message::new(community, response))
}

/// The next registered entry after `oid` that the view permits.
fn next_in_view(registry: &MoRegistry, view: &View, oid: &Oid) -> Option<(Oid, Value)> {
    let mut cursor = oid.clone();
    loop {
        let entry = registry.next(&cursor)?;
        if view.contains(entry.oid()) {
            return Some((entry.oid().clone(), entry.fetch()));
        }
        cursor = entry.oid().clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::registry::Access;
    use crate::table::TableBuilder;
    use crate::value::ValueKind;

    fn test_state() -> ServeState {
        let mut access = AccessControl::new();
        access.add_community("public", "readers");
        access.add_view("readers", View::new().include(oid!(1, 3)));

        let mut registry = MoRegistry::new();
        registry
            .register(MoEntry::read_only(
                oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
                "MySystemDescr",
            ))
            .unwrap();

        ServeState {
            registry: Mutex::new(registry),
            access,
        }
    }

    fn get_request(community: &'static [u8], oid: Oid) -> Message {
        Message::new(
            Bytes::from_static(community),
            Pdu::request(PduType::Get, 7, &[oid]),
        )
    }

    #[test]
    fn test_get_returns_registered_value() {
        let state = test_state();
        let response =
            handle_message(&state, get_request(b"public", oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)))
                .unwrap();

        assert_eq!(response.pdu.request_id, 7);
        assert_eq!(response.pdu.status(), ErrorStatus::NoError);
        assert_eq!(response.pdu.varbinds[0].value, Value::from("MySystemDescr"));
    }

    #[test]
    fn test_get_unknown_oid_returns_sentinel() {
        let state = test_state();
        let response =
            handle_message(&state, get_request(b"public", oid!(1, 3, 6, 1, 4, 1, 9)))
                .unwrap();
        assert_eq!(response.pdu.varbinds[0].value, Value::NoSuchObject);
    }

    #[test]
    fn test_unknown_community_gets_authorization_error() {
        let state = test_state();
        let response =
            handle_message(&state, get_request(b"letmein", oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)))
                .unwrap();

        assert_eq!(response.pdu.status(), ErrorStatus::AuthorizationError);
        // The value never leaks.
        assert_eq!(response.pdu.varbinds[0].value, Value::Null);
    }

    #[test]
    fn test_out_of_view_oid_is_invisible() {
        let mut state = test_state();
        state.access.add_community("narrow", "narrow_group");
        state
            .access
            .add_view("narrow_group", View::new().include(oid!(1, 3, 6, 1, 4)));

        let response =
            handle_message(&state, get_request(b"narrow", oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)))
                .unwrap();
        assert_eq!(response.pdu.status(), ErrorStatus::NoError);
        assert_eq!(response.pdu.varbinds[0].value, Value::NoSuchObject);
    }

    #[test]
    fn test_getnext_walks_in_order() {
        let state = test_state();
        let request = Message::new(
            Bytes::from_static(b"public"),
            Pdu::request(PduType::GetNext, 8, &[oid!(1, 3)]),
        );
        let response = handle_message(&state, request).unwrap();
        assert_eq!(
            response.pdu.varbinds[0].oid,
            oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)
        );
        assert_eq!(response.pdu.varbinds[0].value, Value::from("MySystemDescr"));
    }

    #[test]
    fn test_getnext_past_end_returns_end_of_mib_view() {
        let state = test_state();
        let request = Message::new(
            Bytes::from_static(b"public"),
            Pdu::request(PduType::GetNext, 9, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]),
        );
        let response = handle_message(&state, request).unwrap();
        assert_eq!(response.pdu.varbinds[0].value, Value::EndOfMibView);
    }

    #[test]
    fn test_getnext_skips_out_of_view_entries() {
        let mut state = test_state();
        state
            .registry
            .lock()
            .unwrap()
            .register(MoEntry::read_only(oid!(1, 3, 6, 1, 2, 1, 1, 7, 0), "secret"))
            .unwrap();
        state.access.add_community("partial", "partial_group");
        state.access.add_view(
            "partial_group",
            View::new()
                .include(oid!(1, 3))
                .exclude(oid!(1, 3, 6, 1, 2, 1, 1, 7)),
        );

        let request = Message::new(
            Bytes::from_static(b"partial"),
            Pdu::request(PduType::GetNext, 10, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]),
        );
        let response = handle_message(&state, request).unwrap();
        // The excluded entry is stepped over, landing at end of view.
        assert_eq!(response.pdu.varbinds[0].value, Value::EndOfMibView);
    }

    #[test]
    fn test_getbulk_expands_repetitions() {
        let state = test_state();
        let table = TableBuilder::new(oid!(1, 3, 6, 1, 9, 1))
            .column(ValueKind::Integer, Access::ReadOnly)
            .row_value(Value::Integer(10))
            .row_value(Value::Integer(20))
            .row_value(Value::Integer(30))
            .build()
            .unwrap();
        state.registry.lock().unwrap().register_all(table).unwrap();

        let request = Message::new(
            Bytes::from_static(b"public"),
            Pdu::bulk_request(11, &[oid!(1, 3, 6, 1, 9, 1, 1)], 0, 2),
        );
        let response = handle_message(&state, request).unwrap();
        assert_eq!(response.pdu.varbinds.len(), 2);
        assert_eq!(response.pdu.varbinds[0].value, Value::Integer(10));
        assert_eq!(response.pdu.varbinds[1].value, Value::Integer(20));
    }

    #[test]
    fn test_getbulk_stops_early_at_end_of_view() {
        let state = test_state();
        let request = Message::new(
            Bytes::from_static(b"public"),
            Pdu::bulk_request(12, &[oid!(1, 3, 6, 1, 2, 1, 1, 1)], 0, 10),
        );
        let response = handle_message(&state, request).unwrap();
        // One real value, one EndOfMibView, no further repetitions.
        assert_eq!(response.pdu.varbinds.len(), 2);
        assert_eq!(response.pdu.varbinds[0].value, Value::from("MySystemDescr"));
        assert_eq!(response.pdu.varbinds[1].value, Value::EndOfMibView);
    }

    #[test]
    fn test_getbulk_non_repeaters() {
        let state = test_state();
        let request = Message::new(
            Bytes::from_static(b"public"),
            Pdu::bulk_request(
                13,
                &[oid!(1, 3), oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)],
                1,
                5,
            ),
        );
        let response = handle_message(&state, request).unwrap();
        // Non-repeater answered once, repeater hits end of view immediately.
        assert_eq!(response.pdu.varbinds.len(), 2);
        assert_eq!(response.pdu.varbinds[0].value, Value::from("MySystemDescr"));
        assert_eq!(response.pdu.varbinds[1].value, Value::EndOfMibView);
    }

    #[test]
    fn test_set_is_rejected_not_dropped() {
        let state = test_state();
        let request = Message::new(
            Bytes::from_static(b"public"),
            Pdu {
                pdu_type: PduType::Set,
                request_id: 14,
                error_status: 0,
                error_index: 0,
                varbinds: vec![VarBind::new(
                    oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
                    Value::from("overwrite"),
                )],
            },
        );
        let response = handle_message(&state, request).unwrap();
        assert_eq!(response.pdu.status(), ErrorStatus::NotWritable);
    }

    #[test]
    fn test_unsolicited_response_is_ignored() {
        let state = test_state();
        let request = Message::new(
            Bytes::from_static(b"public"),
            Pdu::response(15, Vec::new()),
        );
        assert!(handle_message(&state, request).is_none());
    }
}
