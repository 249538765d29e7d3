//! Minimal async SNMPv2c agent and client core.
//!
//! This crate provides the pieces needed to serve and poll a managed-object
//! tree over an unreliable datagram transport:
//!
//! - [`Oid`], [`Value`], [`VarBind`] - the data model
//! - [`registry::MoRegistry`] - a sorted managed-object tree with GET and
//!   GETNEXT resolution
//! - [`table::TableBuilder`] - declarative construction of column-major
//!   table entries
//! - [`Client`] - the request/response engine (GET, GETNEXT, GETBULK, walks,
//!   table reconstruction)
//! - [`agent::Agent`] - a community-authenticated agent serving the tree
//!
//! Process concerns (logging setup, CLI parsing, shutdown hooks) are left to
//! the embedding application; the crate emits [`tracing`] events and never
//! installs a subscriber.
//!
//! # Example
//!
//! Serve a scalar and read it back:
//!
//! ```rust,no_run
//! use minsnmp::agent::{Agent, View};
//! use minsnmp::registry::MoEntry;
//! use minsnmp::{Client, oid};
//!
//! # async fn example() -> minsnmp::Result<()> {
//! let agent = Agent::builder()
//!     .bind("127.0.0.1:0")
//!     .community("public", "readers")
//!     .view("readers", View::new().include(oid!(1, 3)))
//!     .build()
//!     .await?;
//! agent.register_managed_object(MoEntry::read_only(
//!     oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
//!     "MySystemDescr",
//! ))?;
//!
//! let client = Client::builder(agent.local_addr().to_string())
//!     .community(b"public")
//!     .connect()
//!     .await?;
//! let descr = client.get_as_string(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await?;
//! assert_eq!(descr, "MySystemDescr");
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod client;
pub mod error;
pub mod oid;
pub mod pdu;
pub mod registry;
pub mod table;
pub mod transport;
pub mod value;
pub mod varbind;
pub mod wire;

mod util;

pub use client::{BulkWalk, Client, ClientBuilder, ClientConfig, Walk};
pub use error::{Error, ErrorStatus, Result};
pub use oid::Oid;
pub use value::{Value, ValueKind};
pub use varbind::VarBind;
