//! Shared fixtures for integration tests.

// Not every test file uses every helper.
#![allow(dead_code)]

use futures::Stream;
use minsnmp::agent::{Agent, View};
use minsnmp::registry::{Access, MoEntry};
use minsnmp::table::TableBuilder;
use minsnmp::transport::UdpTransport;
use minsnmp::value::{Value, ValueKind};
use minsnmp::{Client, Oid, oid};

/// sysDescr.0 (RFC 1213).
pub fn sys_descr() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)
}

/// ifEntry (RFC 1213).
pub fn if_entry() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 2, 2, 1)
}

/// Two physical interfaces across the eight classic ifEntry columns.
pub fn interfaces_table() -> Vec<MoEntry> {
    TableBuilder::new(if_entry())
        .column(ValueKind::Integer, Access::ReadOnly)
        .column(ValueKind::OctetString, Access::ReadOnly)
        .column(ValueKind::Integer, Access::ReadOnly)
        .column(ValueKind::Integer, Access::ReadOnly)
        .column(ValueKind::Gauge32, Access::ReadOnly)
        .column(ValueKind::OctetString, Access::ReadOnly)
        .column(ValueKind::Integer, Access::ReadOnly)
        .column(ValueKind::Integer, Access::ReadOnly)
        .row_value(Value::Integer(1))
        .row_value(Value::from("loopback"))
        .row_value(Value::Integer(24))
        .row_value(Value::Integer(1500))
        .row_value(Value::Gauge32(10000000))
        .row_value(Value::from("00:00:00:00:01"))
        .row_value(Value::Integer(1500))
        .row_value(Value::Integer(1500))
        .row_value(Value::Integer(2))
        .row_value(Value::from("eth0"))
        .row_value(Value::Integer(24))
        .row_value(Value::Integer(1500))
        .row_value(Value::Gauge32(10000000))
        .row_value(Value::from("00:00:00:00:02"))
        .row_value(Value::Integer(1500))
        .row_value(Value::Integer(1500))
        .build()
        .expect("fixture table is well formed")
}

/// Spawn an agent on an ephemeral loopback port with the standard fixture
/// tree: the sysDescr scalar plus the two-row interfaces table.
pub async fn spawn_agent() -> Agent {
    let agent = Agent::builder()
        .bind("127.0.0.1:0")
        .community("public", "readers")
        .view("readers", View::new().include(oid!(1, 3)))
        .build()
        .await
        .expect("agent binds on loopback");

    agent
        .register_managed_object(MoEntry::read_only(sys_descr(), "MySystemDescr"))
        .expect("fresh registry accepts the scalar");
    agent
        .register_table(interfaces_table())
        .expect("fresh registry accepts the table");

    agent
}

/// Connect a client to the fixture agent with the given community.
pub async fn connect(agent: &Agent, community: &[u8]) -> Client<UdpTransport> {
    Client::builder(agent.local_addr().to_string())
        .community(community)
        .retries(2)
        .connect()
        .await
        .expect("client connects to loopback agent")
}

/// Drain a walk stream into a vector.
pub async fn collect_stream<S, I>(stream: S) -> Vec<I>
where
    S: Stream<Item = I>,
{
    use futures::StreamExt;

    let mut stream = Box::pin(stream);
    let mut items = Vec::new();
    while let Some(item) = stream.next().await {
        items.push(item);
    }
    items
}
