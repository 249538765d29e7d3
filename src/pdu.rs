//! Protocol data units and the community-tagged message frame.

use bytes::Bytes;

use crate::error::{DecodeErrorKind, Error, ErrorStatus, Result};
use crate::oid::Oid;
use crate::value::Value;
use crate::varbind::VarBind;
use crate::wire::{Decoder, EncodeBuf, tag};

/// Wire version arc for SNMPv2c.
pub const VERSION_2C: i32 = 1;

/// PDU operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PduType {
    /// GET request.
    Get,
    /// GETNEXT request.
    GetNext,
    /// GETBULK request.
    GetBulk,
    /// SET request. The agent rejects these; this core is read-only.
    Set,
    /// Response.
    Response,
}

impl PduType {
    /// The wire tag for this PDU type.
    pub const fn as_tag(self) -> u8 {
        match self {
            PduType::Get => tag::GET_REQUEST,
            PduType::GetNext => tag::GET_NEXT_REQUEST,
            PduType::GetBulk => tag::GET_BULK_REQUEST,
            PduType::Set => tag::SET_REQUEST,
            PduType::Response => tag::RESPONSE,
        }
    }

    /// Create from a wire tag.
    pub const fn from_tag(t: u8) -> Option<Self> {
        match t {
            tag::GET_REQUEST => Some(PduType::Get),
            tag::GET_NEXT_REQUEST => Some(PduType::GetNext),
            tag::GET_BULK_REQUEST => Some(PduType::GetBulk),
            tag::SET_REQUEST => Some(PduType::Set),
            tag::RESPONSE => Some(PduType::Response),
            _ => None,
        }
    }
}

/// A protocol data unit.
///
/// `error_status` and `error_index` are stored raw: for GETBULK requests
/// these slots carry non-repeaters and max-repetitions (RFC 3416).
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    pub pdu_type: PduType,
    pub request_id: i32,
    pub error_status: i32,
    pub error_index: i32,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    /// Build a GET or GETNEXT request with NULL-valued bindings.
    pub fn request(pdu_type: PduType, request_id: i32, oids: &[Oid]) -> Self {
        Self {
            pdu_type,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: oids.iter().cloned().map(VarBind::null).collect(),
        }
    }

    /// Build a GETBULK request.
    pub fn bulk_request(
        request_id: i32,
        oids: &[Oid],
        non_repeaters: u32,
        max_repetitions: u32,
    ) -> Self {
        Self {
            pdu_type: PduType::GetBulk,
            request_id,
            error_status: non_repeaters as i32,
            error_index: max_repetitions as i32,
            varbinds: oids.iter().cloned().map(VarBind::null).collect(),
        }
    }

    /// Build a successful response.
    pub fn response(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type: PduType::Response,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    /// Build an error response.
    pub fn error_response(
        request_id: i32,
        status: ErrorStatus,
        index: i32,
        varbinds: Vec<VarBind>,
    ) -> Self {
        Self {
            pdu_type: PduType::Response,
            request_id,
            error_status: status.as_i32(),
            error_index: index,
            varbinds,
        }
    }

    /// The error status of a response PDU.
    pub fn status(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }

    /// Non-repeaters count of a GETBULK request.
    pub fn non_repeaters(&self) -> u32 {
        self.error_status.max(0) as u32
    }

    /// Max-repetitions count of a GETBULK request.
    pub fn max_repetitions(&self) -> u32 {
        self.error_index.max(0) as u32
    }
}

/// A community-tagged message frame: the unit sent over the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub community: Bytes,
    pub pdu: Pdu,
}

impl Message {
    /// Create a message.
    pub fn new(community: Bytes, pdu: Pdu) -> Self {
        Self { community, pdu }
    }

    /// Encode to wire bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_i32(tag::INTEGER, VERSION_2C);
            buf.push_octet_string(&self.community);
            buf.push_constructed(self.pdu.pdu_type.as_tag(), |buf| {
                buf.push_i32(tag::INTEGER, self.pdu.request_id);
                buf.push_i32(tag::INTEGER, self.pdu.error_status);
                buf.push_i32(tag::INTEGER, self.pdu.error_index);
                buf.push_sequence(|buf| {
                    for vb in &self.pdu.varbinds {
                        buf.push_sequence(|buf| {
                            buf.push_oid(&vb.oid);
                            push_value(buf, &vb.value);
                        });
                    }
                });
            });
        });
        buf.finish()
    }

    /// Decode from wire bytes.
    pub fn decode(data: Bytes) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::decode(0, DecodeErrorKind::EmptyMessage));
        }
        let mut dec = Decoder::new(data);
        let mut msg = dec.read_sequence()?;

        let version = msg.read_i32(tag::INTEGER)?;
        if version != VERSION_2C {
            return Err(Error::decode(0, DecodeErrorKind::UnknownVersion(version)));
        }
        let community = msg.read_octet_string()?;

        let pdu_at = msg.offset();
        let pdu_tag = msg.peek_tag()?;
        let pdu_type = PduType::from_tag(pdu_tag)
            .ok_or_else(|| Error::decode(pdu_at, DecodeErrorKind::UnknownPduType(pdu_tag)))?;
        let mut pdu = msg.read_constructed(pdu_tag)?;

        let request_id = pdu.read_i32(tag::INTEGER)?;
        let error_status = pdu.read_i32(tag::INTEGER)?;
        let error_index = pdu.read_i32(tag::INTEGER)?;

        let mut list = pdu.read_sequence()?;
        let mut varbinds = Vec::new();
        while !list.is_empty() {
            let mut vb = list.read_sequence()?;
            let oid = vb.read_oid()?;
            let value = read_value(&mut vb)?;
            varbinds.push(VarBind { oid, value });
        }

        Ok(Message {
            community,
            pdu: Pdu {
                pdu_type,
                request_id,
                error_status,
                error_index,
                varbinds,
            },
        })
    }
}

fn push_value(buf: &mut EncodeBuf, value: &Value) {
    match value {
        Value::Integer(v) => buf.push_i32(tag::INTEGER, *v),
        Value::Counter32(v) => buf.push_u32(tag::COUNTER32, *v),
        Value::Gauge32(v) => buf.push_u32(tag::GAUGE32, *v),
        Value::TimeTicks(v) => buf.push_u32(tag::TIMETICKS, *v),
        Value::OctetString(bytes) => buf.push_octet_string(bytes),
        Value::ObjectIdentifier(oid) => buf.push_oid(oid),
        Value::IpAddress(addr) => {
            buf.push_u32(tag::IP_ADDRESS, u32::from_be_bytes(*addr));
        }
        Value::Counter64(v) => buf.push_u64(tag::COUNTER64, *v),
        Value::Null => buf.push_empty(tag::NULL),
        Value::NoSuchObject => buf.push_empty(tag::NO_SUCH_OBJECT),
        Value::NoSuchInstance => buf.push_empty(tag::NO_SUCH_INSTANCE),
        Value::EndOfMibView => buf.push_empty(tag::END_OF_MIB_VIEW),
    }
}

fn read_value(dec: &mut Decoder) -> Result<Value> {
    let at = dec.offset();
    let value_tag = dec.peek_tag()?;
    match value_tag {
        tag::INTEGER => Ok(Value::Integer(dec.read_i32(tag::INTEGER)?)),
        tag::COUNTER32 => Ok(Value::Counter32(dec.read_u32(tag::COUNTER32)?)),
        tag::GAUGE32 => Ok(Value::Gauge32(dec.read_u32(tag::GAUGE32)?)),
        tag::TIMETICKS => Ok(Value::TimeTicks(dec.read_u32(tag::TIMETICKS)?)),
        tag::OCTET_STRING => Ok(Value::OctetString(dec.read_octet_string()?)),
        tag::OBJECT_IDENTIFIER => Ok(Value::ObjectIdentifier(dec.read_oid()?)),
        tag::IP_ADDRESS => Ok(Value::IpAddress(
            dec.read_u32(tag::IP_ADDRESS)?.to_be_bytes(),
        )),
        tag::COUNTER64 => Ok(Value::Counter64(dec.read_u64(tag::COUNTER64)?)),
        tag::NULL => {
            dec.expect(tag::NULL)?;
            Ok(Value::Null)
        }
        tag::NO_SUCH_OBJECT => {
            dec.expect(tag::NO_SUCH_OBJECT)?;
            Ok(Value::NoSuchObject)
        }
        tag::NO_SUCH_INSTANCE => {
            dec.expect(tag::NO_SUCH_INSTANCE)?;
            Ok(Value::NoSuchInstance)
        }
        tag::END_OF_MIB_VIEW => {
            dec.expect(tag::END_OF_MIB_VIEW)?;
            Ok(Value::EndOfMibView)
        }
        other => Err(Error::decode(at, DecodeErrorKind::UnknownValueTag(other))),
    }
}

/// Shallow-parse a message to extract its request ID.
///
/// Used by the transport receive loop to correlate responses without paying
/// for a full decode on the hot path. Returns `None` for anything that does
/// not look like a message frame.
pub fn extract_request_id(data: &Bytes) -> Option<i32> {
    let mut dec = Decoder::new(data.clone());
    let mut msg = dec.read_sequence().ok()?;
    msg.read_i32(tag::INTEGER).ok()?;
    msg.read_octet_string().ok()?;
    let pdu_tag = msg.peek_tag().ok()?;
    PduType::from_tag(pdu_tag)?;
    let mut pdu = msg.read_constructed(pdu_tag).ok()?;
    pdu.read_i32(tag::INTEGER).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    fn sample_message() -> Message {
        Message::new(
            Bytes::from_static(b"public"),
            Pdu::response(
                42,
                vec![
                    VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("MySystemDescr")),
                    VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(123456)),
                    VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 9, 0), Value::EndOfMibView),
                ],
            ),
        )
    }

    #[test]
    fn test_message_roundtrip() {
        let msg = sample_message();
        let decoded = Message::decode(msg.encode()).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_request_roundtrip() {
        let msg = Message::new(
            Bytes::from_static(b"private"),
            Pdu::request(
                PduType::GetNext,
                7,
                &[oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2), oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 6)],
            ),
        );
        let decoded = Message::decode(msg.encode()).unwrap();
        assert_eq!(decoded.pdu.pdu_type, PduType::GetNext);
        assert_eq!(decoded.pdu.varbinds.len(), 2);
        assert!(decoded.pdu.varbinds.iter().all(|vb| vb.value == Value::Null));
    }

    #[test]
    fn test_bulk_request_carries_counts() {
        let msg = Message::new(
            Bytes::from_static(b"public"),
            Pdu::bulk_request(9, &[oid!(1, 3, 6)], 1, 20),
        );
        let decoded = Message::decode(msg.encode()).unwrap();
        assert_eq!(decoded.pdu.pdu_type, PduType::GetBulk);
        assert_eq!(decoded.pdu.non_repeaters(), 1);
        assert_eq!(decoded.pdu.max_repetitions(), 20);
    }

    #[test]
    fn test_all_value_kinds_roundtrip() {
        let msg = Message::new(
            Bytes::from_static(b"public"),
            Pdu::response(
                1,
                vec![
                    VarBind::new(oid!(1, 3, 6, 1, 1), Value::Integer(-5)),
                    VarBind::new(oid!(1, 3, 6, 1, 2), Value::Counter32(10)),
                    VarBind::new(oid!(1, 3, 6, 1, 3), Value::Gauge32(20)),
                    VarBind::new(oid!(1, 3, 6, 1, 4), Value::TimeTicks(30)),
                    VarBind::new(oid!(1, 3, 6, 1, 5), Value::IpAddress([10, 0, 0, 1])),
                    VarBind::new(oid!(1, 3, 6, 1, 6), Value::Counter64(u64::MAX)),
                    VarBind::new(oid!(1, 3, 6, 1, 7), Value::ObjectIdentifier(oid!(1, 3, 6))),
                    VarBind::new(oid!(1, 3, 6, 1, 8), Value::Null),
                    VarBind::new(oid!(1, 3, 6, 1, 9), Value::NoSuchObject),
                    VarBind::new(oid!(1, 3, 6, 1, 10), Value::NoSuchInstance),
                ],
            ),
        );
        let decoded = Message::decode(msg.encode()).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_error_response_status() {
        let pdu = Pdu::error_response(3, ErrorStatus::AuthorizationError, 0, Vec::new());
        assert_eq!(pdu.status(), ErrorStatus::AuthorizationError);
    }

    #[test]
    fn test_extract_request_id() {
        let msg = sample_message();
        let bytes = msg.encode();
        assert_eq!(extract_request_id(&bytes), Some(42));
    }

    #[test]
    fn test_extract_request_id_garbage() {
        assert_eq!(extract_request_id(&Bytes::from_static(b"not a frame")), None);
        assert_eq!(extract_request_id(&Bytes::new()), None);
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_i32(tag::INTEGER, 3);
            buf.push_octet_string(b"public");
        });
        let err = Message::decode(buf.finish()).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                kind: DecodeErrorKind::UnknownVersion(3),
                ..
            }
        ));
    }

    #[test]
    fn test_decode_rejects_empty() {
        assert!(matches!(
            Message::decode(Bytes::new()).unwrap_err(),
            Error::Decode {
                kind: DecodeErrorKind::EmptyMessage,
                ..
            }
        ));
    }
}
