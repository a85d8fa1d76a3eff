//! The domain event contract shared by every producer and consumer.
//!
//! Each event kind has a stable single-byte identifier drawn from
//! [`EventKind`]; on the wire an event payload is that byte followed by the
//! serialized body. Bodies are encoded field by field in declaration order
//! (big-endian integers, `u16`-length-prefixed UTF-8 strings, 128-bit ids
//! as two big-endian `u64`s), so producers and consumers agree byte for
//! byte as long as they share this module.

use crate::error::ClientError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

/// Event type identifiers. Ordinal values are wire-stable; new kinds must
/// be appended, never reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    RoomBooked = 0,
    BookingCancelled = 1,
    CustomerCreated = 2,
    CustomerUpdated = 3,
    BookingPaid = 4,
    RoomCreated = 5,
    RoomUpdated = 6,
}

impl EventKind {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(EventKind::RoomBooked),
            1 => Some(EventKind::BookingCancelled),
            2 => Some(EventKind::CustomerCreated),
            3 => Some(EventKind::CustomerUpdated),
            4 => Some(EventKind::BookingPaid),
            5 => Some(EventKind::RoomCreated),
            6 => Some(EventKind::RoomUpdated),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A domain event with a byte-exact wire encoding.
pub trait DomainEvent: Clone + Send + Sized + 'static {
    const KIND: EventKind;

    fn encode_body(&self, buf: &mut BytesMut);

    fn decode_body(buf: &mut Bytes) -> Result<Self, ClientError>;

    /// The full publish payload: the kind byte followed by the body.
    fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u8(Self::KIND.as_byte());
        self.encode_body(&mut buf);
        buf.freeze()
    }
}

fn put_string(buf: &mut BytesMut, value: &str) {
    buf.put_u16(value.len() as u16);
    buf.put_slice(value.as_bytes());
}

fn put_uuid(buf: &mut BytesMut, id: Uuid) {
    let (most_significant, least_significant) = id.as_u64_pair();
    buf.put_u64(most_significant);
    buf.put_u64(least_significant);
}

fn get_i64(buf: &mut Bytes, field: &str) -> Result<i64, ClientError> {
    if buf.remaining() < 8 {
        return Err(truncated(field));
    }
    Ok(buf.get_i64())
}

fn get_i32(buf: &mut Bytes, field: &str) -> Result<i32, ClientError> {
    if buf.remaining() < 4 {
        return Err(truncated(field));
    }
    Ok(buf.get_i32())
}

fn get_f64(buf: &mut Bytes, field: &str) -> Result<f64, ClientError> {
    if buf.remaining() < 8 {
        return Err(truncated(field));
    }
    Ok(buf.get_f64())
}

fn get_uuid(buf: &mut Bytes, field: &str) -> Result<Uuid, ClientError> {
    if buf.remaining() < 16 {
        return Err(truncated(field));
    }
    let most_significant = buf.get_u64();
    let least_significant = buf.get_u64();
    Ok(Uuid::from_u64_pair(most_significant, least_significant))
}

fn get_string(buf: &mut Bytes, field: &str) -> Result<String, ClientError> {
    if buf.remaining() < 2 {
        return Err(truncated(field));
    }
    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(truncated(field));
    }
    let bytes = buf.split_to(len);
    String::from_utf8(bytes.to_vec())
        .map_err(|_| ClientError::deserialization(format!("field {field} is not valid UTF-8")))
}

fn truncated(field: &str) -> ClientError {
    ClientError::deserialization(format!("truncated event body at field {field}"))
}

/// A room was booked by a customer.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomBooked {
    pub booked_at_ms: i64,
    pub event_id: Uuid,
    pub room_id: Uuid,
    pub customer_id: Uuid,
}

impl DomainEvent for RoomBooked {
    const KIND: EventKind = EventKind::RoomBooked;

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_i64(self.booked_at_ms);
        put_uuid(buf, self.event_id);
        put_uuid(buf, self.room_id);
        put_uuid(buf, self.customer_id);
    }

    fn decode_body(buf: &mut Bytes) -> Result<Self, ClientError> {
        Ok(Self {
            booked_at_ms: get_i64(buf, "booked_at_ms")?,
            event_id: get_uuid(buf, "event_id")?,
            room_id: get_uuid(buf, "room_id")?,
            customer_id: get_uuid(buf, "customer_id")?,
        })
    }
}

/// A booking was cancelled.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingCancelled {
    pub cancelled_at_ms: i64,
    pub booking_id: Uuid,
    pub room_number: i64,
}

impl DomainEvent for BookingCancelled {
    const KIND: EventKind = EventKind::BookingCancelled;

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_i64(self.cancelled_at_ms);
        put_uuid(buf, self.booking_id);
        buf.put_i64(self.room_number);
    }

    fn decode_body(buf: &mut Bytes) -> Result<Self, ClientError> {
        Ok(Self {
            cancelled_at_ms: get_i64(buf, "cancelled_at_ms")?,
            booking_id: get_uuid(buf, "booking_id")?,
            room_number: get_i64(buf, "room_number")?,
        })
    }
}

/// A customer record was created.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerCreated {
    pub created_at_ms: i64,
    pub customer_id: Uuid,
    pub customer_number: i64,
    pub first_name: String,
    pub last_name: String,
    /// Days since the Unix epoch.
    pub birthday_epoch_days: i32,
}

impl DomainEvent for CustomerCreated {
    const KIND: EventKind = EventKind::CustomerCreated;

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_i64(self.created_at_ms);
        put_uuid(buf, self.customer_id);
        buf.put_i64(self.customer_number);
        put_string(buf, &self.first_name);
        put_string(buf, &self.last_name);
        buf.put_i32(self.birthday_epoch_days);
    }

    fn decode_body(buf: &mut Bytes) -> Result<Self, ClientError> {
        Ok(Self {
            created_at_ms: get_i64(buf, "created_at_ms")?,
            customer_id: get_uuid(buf, "customer_id")?,
            customer_number: get_i64(buf, "customer_number")?,
            first_name: get_string(buf, "first_name")?,
            last_name: get_string(buf, "last_name")?,
            birthday_epoch_days: get_i32(buf, "birthday_epoch_days")?,
        })
    }
}

/// A customer record was updated.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerUpdated {
    pub updated_at_ms: i64,
    pub customer_id: Uuid,
    pub customer_number: i64,
    pub first_name: String,
    pub last_name: String,
    /// Days since the Unix epoch.
    pub birthday_epoch_days: i32,
    pub address: String,
}

impl DomainEvent for CustomerUpdated {
    const KIND: EventKind = EventKind::CustomerUpdated;

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_i64(self.updated_at_ms);
        put_uuid(buf, self.customer_id);
        buf.put_i64(self.customer_number);
        put_string(buf, &self.first_name);
        put_string(buf, &self.last_name);
        buf.put_i32(self.birthday_epoch_days);
        put_string(buf, &self.address);
    }

    fn decode_body(buf: &mut Bytes) -> Result<Self, ClientError> {
        Ok(Self {
            updated_at_ms: get_i64(buf, "updated_at_ms")?,
            customer_id: get_uuid(buf, "customer_id")?,
            customer_number: get_i64(buf, "customer_number")?,
            first_name: get_string(buf, "first_name")?,
            last_name: get_string(buf, "last_name")?,
            birthday_epoch_days: get_i32(buf, "birthday_epoch_days")?,
            address: get_string(buf, "address")?,
        })
    }
}

/// A booking was paid.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingPaid {
    pub paid_at_ms: i64,
    pub booking_id: Uuid,
    pub room_number: i64,
    pub payment_option: String,
}

impl DomainEvent for BookingPaid {
    const KIND: EventKind = EventKind::BookingPaid;

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_i64(self.paid_at_ms);
        put_uuid(buf, self.booking_id);
        buf.put_i64(self.room_number);
        put_string(buf, &self.payment_option);
    }

    fn decode_body(buf: &mut Bytes) -> Result<Self, ClientError> {
        Ok(Self {
            paid_at_ms: get_i64(buf, "paid_at_ms")?,
            booking_id: get_uuid(buf, "booking_id")?,
            room_number: get_i64(buf, "room_number")?,
            payment_option: get_string(buf, "payment_option")?,
        })
    }
}

/// A room was added to the inventory.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomCreated {
    pub created_at_ms: i64,
    pub room_number: i64,
    pub room_name: String,
    pub description: String,
    pub price: f64,
}

impl DomainEvent for RoomCreated {
    const KIND: EventKind = EventKind::RoomCreated;

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_i64(self.created_at_ms);
        buf.put_i64(self.room_number);
        put_string(buf, &self.room_name);
        put_string(buf, &self.description);
        buf.put_f64(self.price);
    }

    fn decode_body(buf: &mut Bytes) -> Result<Self, ClientError> {
        Ok(Self {
            created_at_ms: get_i64(buf, "created_at_ms")?,
            room_number: get_i64(buf, "room_number")?,
            room_name: get_string(buf, "room_name")?,
            description: get_string(buf, "description")?,
            price: get_f64(buf, "price")?,
        })
    }
}

/// A room's details changed.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomUpdated {
    pub updated_at_ms: i64,
    pub room_number: i64,
    pub room_name: String,
    pub description: String,
    pub price: f64,
}

impl DomainEvent for RoomUpdated {
    const KIND: EventKind = EventKind::RoomUpdated;

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_i64(self.updated_at_ms);
        buf.put_i64(self.room_number);
        put_string(buf, &self.room_name);
        put_string(buf, &self.description);
        buf.put_f64(self.price);
    }

    fn decode_body(buf: &mut Bytes) -> Result<Self, ClientError> {
        Ok(Self {
            updated_at_ms: get_i64(buf, "updated_at_ms")?,
            room_number: get_i64(buf, "room_number")?,
            room_name: get_string(buf, "room_name")?,
            description: get_string(buf, "description")?,
            price: get_f64(buf, "price")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_bytes_are_wire_stable() {
        assert_eq!(EventKind::RoomBooked.as_byte(), 0);
        assert_eq!(EventKind::BookingCancelled.as_byte(), 1);
        assert_eq!(EventKind::CustomerCreated.as_byte(), 2);
        assert_eq!(EventKind::CustomerUpdated.as_byte(), 3);
        assert_eq!(EventKind::BookingPaid.as_byte(), 4);
        assert_eq!(EventKind::RoomCreated.as_byte(), 5);
        assert_eq!(EventKind::RoomUpdated.as_byte(), 6);
        assert_eq!(EventKind::from_byte(6), Some(EventKind::RoomUpdated));
        assert_eq!(EventKind::from_byte(7), None);
    }

    #[test]
    fn payload_starts_with_kind_byte() {
        let event = BookingCancelled {
            cancelled_at_ms: 1_700_000_000_000,
            booking_id: Uuid::nil(),
            room_number: 12,
        };
        let payload = event.encode();
        assert_eq!(payload[0], EventKind::BookingCancelled.as_byte());
    }

    #[test]
    fn uuid_encodes_as_two_big_endian_u64s() {
        let id = Uuid::from_u64_pair(0x0102030405060708, 0x1112131415161718);
        let event = RoomBooked {
            booked_at_ms: 0,
            event_id: id,
            room_id: Uuid::nil(),
            customer_id: Uuid::nil(),
        };

        let mut body = BytesMut::new();
        event.encode_body(&mut body);
        // timestamp (8 bytes), then event_id: most significant u64 first
        assert_eq!(
            &body[8..24],
            &[
                0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x11, 0x12, 0x13, 0x14, 0x15,
                0x16, 0x17, 0x18,
            ]
        );
    }

    #[test]
    fn customer_created_roundtrip() {
        let event = CustomerCreated {
            created_at_ms: 1_700_000_000_000,
            customer_id: Uuid::new_v4(),
            customer_number: 42,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            birthday_epoch_days: -48213,
        };

        let mut body = Bytes::copy_from_slice(&event.encode()[1..]);
        let decoded = CustomerCreated::decode_body(&mut body).unwrap();
        assert_eq!(decoded, event);
        assert!(body.is_empty());
    }

    #[test]
    fn room_created_roundtrip_keeps_price_bits() {
        let event = RoomCreated {
            created_at_ms: 1,
            room_number: 101,
            room_name: "Seaside".to_string(),
            description: "Double room with a view".to_string(),
            price: 129.99,
        };

        let mut body = Bytes::copy_from_slice(&event.encode()[1..]);
        let decoded = RoomCreated::decode_body(&mut body).unwrap();
        assert_eq!(decoded.price.to_bits(), event.price.to_bits());
        assert_eq!(decoded, event);
    }

    #[test]
    fn truncated_body_is_rejected() {
        let event = BookingPaid {
            paid_at_ms: 5,
            booking_id: Uuid::new_v4(),
            room_number: 3,
            payment_option: "card".to_string(),
        };

        let encoded = event.encode();
        let mut body = Bytes::copy_from_slice(&encoded[1..encoded.len() - 2]);
        let err = BookingPaid::decode_body(&mut body).unwrap_err();
        assert!(matches!(err, ClientError::Deserialization { .. }));
    }
}
