//! SNMP value types.
//!
//! [`Value`] is the tagged union carried in variable bindings. Three variants
//! (`NoSuchObject`, `NoSuchInstance`, `EndOfMibView`) are exception sentinels
//! used to terminate lookups and walks; they are not data.

use std::fmt;

use bytes::Bytes;

use crate::oid::Oid;

/// An SNMP value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Signed 32-bit integer (INTEGER).
    Integer(i32),
    /// Monotonically increasing 32-bit counter (Counter32).
    Counter32(u32),
    /// Non-negative 32-bit value that may go up or down (Gauge32/Unsigned32).
    Gauge32(u32),
    /// Hundredths of seconds since an epoch (TimeTicks).
    TimeTicks(u32),
    /// Arbitrary byte string (OCTET STRING).
    OctetString(Bytes),
    /// An object identifier value.
    ObjectIdentifier(Oid),
    /// IPv4 address.
    IpAddress([u8; 4]),
    /// 64-bit counter (Counter64).
    Counter64(u64),
    /// NULL placeholder, used in request bindings.
    Null,
    /// Exception: the object type is not implemented.
    NoSuchObject,
    /// Exception: the object type exists but this instance doesn't.
    NoSuchInstance,
    /// Exception: no more entries past this OID.
    EndOfMibView,
}

impl Value {
    /// True for the exception sentinels (`NoSuchObject`, `NoSuchInstance`,
    /// `EndOfMibView`).
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    /// The kind of this value, for column declarations and diagnostics.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Integer(_) => ValueKind::Integer,
            Value::Counter32(_) => ValueKind::Counter32,
            Value::Gauge32(_) => ValueKind::Gauge32,
            Value::TimeTicks(_) => ValueKind::TimeTicks,
            Value::OctetString(_) => ValueKind::OctetString,
            Value::ObjectIdentifier(_) => ValueKind::ObjectIdentifier,
            Value::IpAddress(_) => ValueKind::IpAddress,
            Value::Counter64(_) => ValueKind::Counter64,
            Value::Null => ValueKind::Null,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => {
                ValueKind::Exception
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::OctetString(Bytes::from(s.into_bytes()))
    }
}

/// Canonical text rendering.
///
/// Octet strings render literally when every byte is printable ASCII and as
/// colon-separated hex otherwise. Tests compare against this rendering.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Counter32(v) => write!(f, "{}", v),
            Value::Gauge32(v) => write!(f, "{}", v),
            Value::TimeTicks(v) => write!(f, "{}", v),
            Value::OctetString(bytes) => {
                if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
                    // Printable ASCII only, so this cannot fail.
                    write!(f, "{}", std::str::from_utf8(bytes).unwrap_or_default())
                } else {
                    for (i, b) in bytes.iter().enumerate() {
                        if i > 0 {
                            write!(f, ":")?;
                        }
                        write!(f, "{:02X}", b)?;
                    }
                    Ok(())
                }
            }
            Value::ObjectIdentifier(oid) => write!(f, "{}", oid),
            Value::IpAddress([a, b, c, d]) => write!(f, "{}.{}.{}.{}", a, b, c, d),
            Value::Counter64(v) => write!(f, "{}", v),
            Value::Null => write!(f, "null"),
            Value::NoSuchObject => write!(f, "noSuchObject"),
            Value::NoSuchInstance => write!(f, "noSuchInstance"),
            Value::EndOfMibView => write!(f, "endOfMibView"),
        }
    }
}

/// Value kind, used to declare table column syntaxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Counter32,
    Gauge32,
    TimeTicks,
    OctetString,
    ObjectIdentifier,
    IpAddress,
    Counter64,
    Null,
    /// Exception sentinels; never a valid column syntax.
    Exception,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Integer => "Integer",
            ValueKind::Counter32 => "Counter32",
            ValueKind::Gauge32 => "Gauge32",
            ValueKind::TimeTicks => "TimeTicks",
            ValueKind::OctetString => "OctetString",
            ValueKind::ObjectIdentifier => "ObjectIdentifier",
            ValueKind::IpAddress => "IpAddress",
            ValueKind::Counter64 => "Counter64",
            ValueKind::Null => "Null",
            ValueKind::Exception => "Exception",
        };
        write!(f, "{}", name)
    }
}
