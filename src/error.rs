//! Error types for minsnmp.
//!
//! All errors are `#[non_exhaustive]` to allow adding new variants without breaking changes.

use std::net::SocketAddr;
use std::time::Duration;

use crate::value::ValueKind;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// OID validation error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OidErrorKind {
    /// Empty OID string.
    Empty,
    /// Invalid arc value.
    InvalidArc,
    /// OID has too many arcs (exceeds MAX_OID_LEN).
    TooManyArcs { count: usize, max: usize },
}

impl std::fmt::Display for OidErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty OID"),
            Self::InvalidArc => write!(f, "invalid arc value"),
            Self::TooManyArcs { count, max } => {
                write!(f, "OID has {} arcs, exceeds maximum {}", count, max)
            }
        }
    }
}

/// Wire decode error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// Expected different tag.
    UnexpectedTag { expected: u8, actual: u8 },
    /// Data truncated unexpectedly.
    TruncatedData,
    /// TLV extends past end of data.
    TlvOverflow,
    /// Value content has the wrong length for its tag.
    InvalidValueLength { tag: u8, length: usize },
    /// Unknown protocol version.
    UnknownVersion(i32),
    /// Unknown PDU type tag.
    UnknownPduType(u8),
    /// Unknown value tag.
    UnknownValueTag(u8),
    /// Empty message.
    EmptyMessage,
}

impl std::fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedTag { expected, actual } => {
                write!(f, "expected tag 0x{:02X}, got 0x{:02X}", expected, actual)
            }
            Self::TruncatedData => write!(f, "unexpected end of data"),
            Self::TlvOverflow => write!(f, "TLV extends past end of data"),
            Self::InvalidValueLength { tag, length } => {
                write!(f, "invalid length {} for value tag 0x{:02X}", length, tag)
            }
            Self::UnknownVersion(v) => write!(f, "unknown protocol version: {}", v),
            Self::UnknownPduType(t) => write!(f, "unknown PDU type: 0x{:02X}", t),
            Self::UnknownValueTag(t) => write!(f, "unknown value tag: 0x{:02X}", t),
            Self::EmptyMessage => write!(f, "empty message"),
        }
    }
}

/// Reasons a correlated response failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedResponseKind {
    /// Response binding count does not match the request.
    BindingCountMismatch { expected: usize, actual: usize },
    /// A GET response binding names a different OID than the request.
    BindingOidMismatch { index: usize },
    /// Response is not a Response PDU.
    NotAResponse,
}

impl std::fmt::Display for MalformedResponseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BindingCountMismatch { expected, actual } => {
                write!(f, "expected {} bindings, got {}", expected, actual)
            }
            Self::BindingOidMismatch { index } => {
                write!(f, "binding {} names an OID the request did not", index)
            }
            Self::NotAResponse => write!(f, "PDU is not a response"),
        }
    }
}

/// SNMP error status codes (RFC 3416).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
    /// Unknown/future error status code.
    Unknown(i32),
}

impl ErrorStatus {
    /// Create from raw status code.
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::TooBig,
            2 => Self::NoSuchName,
            3 => Self::BadValue,
            4 => Self::ReadOnly,
            5 => Self::GenErr,
            6 => Self::NoAccess,
            7 => Self::WrongType,
            8 => Self::WrongLength,
            9 => Self::WrongEncoding,
            10 => Self::WrongValue,
            11 => Self::NoCreation,
            12 => Self::InconsistentValue,
            13 => Self::ResourceUnavailable,
            14 => Self::CommitFailed,
            15 => Self::UndoFailed,
            16 => Self::AuthorizationError,
            17 => Self::NotWritable,
            18 => Self::InconsistentName,
            other => Self::Unknown(other),
        }
    }

    /// Convert to raw status code.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::NoError => 0,
            Self::TooBig => 1,
            Self::NoSuchName => 2,
            Self::BadValue => 3,
            Self::ReadOnly => 4,
            Self::GenErr => 5,
            Self::NoAccess => 6,
            Self::WrongType => 7,
            Self::WrongLength => 8,
            Self::WrongEncoding => 9,
            Self::WrongValue => 10,
            Self::NoCreation => 11,
            Self::InconsistentValue => 12,
            Self::ResourceUnavailable => 13,
            Self::CommitFailed => 14,
            Self::UndoFailed => 15,
            Self::AuthorizationError => 16,
            Self::NotWritable => 17,
            Self::InconsistentName => 18,
            Self::Unknown(code) => *code,
        }
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoError => write!(f, "noError"),
            Self::TooBig => write!(f, "tooBig"),
            Self::NoSuchName => write!(f, "noSuchName"),
            Self::BadValue => write!(f, "badValue"),
            Self::ReadOnly => write!(f, "readOnly"),
            Self::GenErr => write!(f, "genErr"),
            Self::NoAccess => write!(f, "noAccess"),
            Self::WrongType => write!(f, "wrongType"),
            Self::WrongLength => write!(f, "wrongLength"),
            Self::WrongEncoding => write!(f, "wrongEncoding"),
            Self::WrongValue => write!(f, "wrongValue"),
            Self::NoCreation => write!(f, "noCreation"),
            Self::InconsistentValue => write!(f, "inconsistentValue"),
            Self::ResourceUnavailable => write!(f, "resourceUnavailable"),
            Self::CommitFailed => write!(f, "commitFailed"),
            Self::UndoFailed => write!(f, "undoFailed"),
            Self::AuthorizationError => write!(f, "authorizationError"),
            Self::NotWritable => write!(f, "notWritable"),
            Self::InconsistentName => write!(f, "inconsistentName"),
            Self::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// Library error type.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// I/O error during communication.
    #[error("I/O error{}: {source}", target.map(|t| format!(" communicating with {}", t)).unwrap_or_default())]
    Io {
        target: Option<SocketAddr>,
        #[source]
        source: std::io::Error,
    },

    /// Request timed out (after retries if configured).
    #[error("timeout after {elapsed:?}{} (request_id={request_id}, retries={retries})", target.map(|t| format!(" waiting for {}", t)).unwrap_or_default())]
    Timeout {
        target: Option<SocketAddr>,
        elapsed: Duration,
        request_id: i32,
        retries: u32,
    },

    /// Transport was closed while the call was outstanding.
    #[error("transport closed")]
    Closed,

    /// SNMP protocol error returned by the agent.
    ///
    /// Access-denied arrives here as `authorizationError`.
    #[error("SNMP error{}: {status} at index {index}", target.map(|t| format!(" from {}", t)).unwrap_or_default())]
    Snmp {
        target: Option<SocketAddr>,
        status: ErrorStatus,
        index: i32,
    },

    /// Response correlated by request ID but structurally invalid.
    #[error("malformed response (request_id={request_id}): {reason}")]
    MalformedResponse {
        request_id: i32,
        reason: MalformedResponseKind,
    },

    /// Response request ID doesn't match.
    #[error("request ID mismatch: expected {expected}, got {actual}")]
    RequestIdMismatch { expected: i32, actual: i32 },

    /// Invalid OID format.
    #[error("invalid OID: {kind}")]
    InvalidOid {
        kind: OidErrorKind,
        input: Option<Box<str>>,
    },

    /// Wire decoding error.
    #[error("decode error at offset {offset}: {kind}")]
    Decode {
        offset: usize,
        kind: DecodeErrorKind,
    },

    /// An entry with the same OID is already registered.
    #[error("duplicate registration for {oid}")]
    DuplicateRegistration { oid: crate::oid::Oid },

    /// A table cell's value kind disagrees with its column declaration.
    #[error("type mismatch at row {row}, column {column}: declared {expected}, got {actual}")]
    TypeMismatch {
        row: usize,
        column: usize,
        expected: ValueKind,
        actual: ValueKind,
    },

    /// Appended table values are not a whole number of rows.
    #[error("{values} row values is not a multiple of {columns} columns")]
    ColumnCountMismatch { values: usize, columns: usize },

    /// Table columns desynchronized during a walk.
    #[error("inconsistent table walk: column {column} returned row {actual} while aligning to row {expected}")]
    InconsistentTableWalk {
        column: crate::oid::Oid,
        expected: Box<str>,
        actual: Box<str>,
    },

    /// Non-increasing OID detected during a walk (agent misbehavior).
    ///
    /// Returned when a walk receives an OID that is not lexicographically
    /// greater than the previous one, which would cause an infinite loop.
    #[error("walk detected non-increasing OID: {previous} >= {current}")]
    NonIncreasingOid {
        previous: crate::oid::Oid,
        current: crate::oid::Oid,
    },
}

impl Error {
    /// Create a decode error.
    pub fn decode(offset: usize, kind: DecodeErrorKind) -> Self {
        Self::Decode { offset, kind }
    }

    /// Create an invalid OID error from a kind (no input string).
    pub fn invalid_oid(kind: OidErrorKind) -> Self {
        Self::InvalidOid { kind, input: None }
    }

    /// Create an invalid OID error with the input string that failed.
    pub fn invalid_oid_with_input(kind: OidErrorKind, input: impl Into<Box<str>>) -> Self {
        Self::InvalidOid {
            kind,
            input: Some(input.into()),
        }
    }

    /// Create a malformed-response error.
    pub fn malformed(request_id: i32, reason: MalformedResponseKind) -> Self {
        Self::MalformedResponse { request_id, reason }
    }

    /// Get the target address if this error has one.
    pub fn target(&self) -> Option<SocketAddr> {
        match self {
            Self::Io { target, .. } => *target,
            Self::Timeout { target, .. } => *target,
            Self::Snmp { target, .. } => *target,
            _ => None,
        }
    }
}
