//! A Rust library for composing and serializing stacked protocol data units.
//!
//! This library models a packet as a chain of typed protocol data units (PDUs),
//! each owning the unit it encapsulates. A chain is built bottom-up or top-down,
//! then serialized in a single pass into one contiguous wire-format buffer. It
//! features:
//!
//! - Exclusively-owned, deep-clonable PDU chains
//! - Automatic derivation of next-protocol, family and length fields at
//!   serialization time
//! - A runtime parser registry for classifying inner payloads, extensible
//!   without touching existing units
//! - Raw socket support for sending serialized chains
//! - Async support via Tokio
//! - Serialization support via Serde for the value types

pub mod error;
pub mod iface;
pub mod ip;
pub mod loopback;
pub mod raw;
pub mod registry;
pub mod sender;

pub use error::PacketError;

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a protocol data unit.
///
/// Outer units use the kind of their inner unit to fill in their own
/// "next protocol" field during serialization. The set is open: protocols
/// without a dedicated type carry their wire number in `Unknown`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PduKind {
    /// Untyped payload bytes.
    Raw,
    /// Null/loopback link encapsulation.
    Loopback,
    /// IPv4 network header.
    Ipv4,
    /// IPv4 encapsulated in IPv4 (tunneling, not termination).
    Ipv4EncapIpv4,
    /// A protocol number this crate has no dedicated unit for.
    Unknown(u16),
}

impl PduKind {
    /// Protocol number an IPv4 header records when it has no inner unit,
    /// or when the inner unit has no protocol number of its own.
    pub const RAW_PROTOCOL: u8 = 255;

    /// The protocol number an enclosing IPv4 header records for a unit of
    /// this kind.
    pub fn ip_protocol_number(self) -> u8 {
        match self {
            PduKind::Ipv4 => 0,          // IPPROTO_IP
            PduKind::Ipv4EncapIpv4 => 4, // IPPROTO_IPIP
            PduKind::Unknown(value) if value <= u8::MAX as u16 => value as u8,
            _ => Self::RAW_PROTOCOL,
        }
    }

    /// Reverse of [`ip_protocol_number`](Self::ip_protocol_number), used when
    /// classifying the payload of a parsed IPv4 header.
    pub fn from_ip_protocol(value: u8) -> Self {
        match value {
            0 => PduKind::Ipv4,
            4 => PduKind::Ipv4EncapIpv4,
            Self::RAW_PROTOCOL => PduKind::Raw,
            other => PduKind::Unknown(other as u16),
        }
    }

    /// The 4-byte address-family identifier a loopback header records for a
    /// unit of this kind, if the kind has one.
    pub fn family_id(self) -> Option<u32> {
        match self {
            PduKind::Ipv4 | PduKind::Ipv4EncapIpv4 => Some(2), // AF_INET
            _ => None,
        }
    }

    /// Reverse of [`family_id`](Self::family_id). Unmapped families classify
    /// as raw payload.
    pub fn from_family(family: u32) -> Self {
        match family {
            2 => PduKind::Ipv4,
            _ => PduKind::Raw,
        }
    }
}

/// Core trait for all protocol data units.
///
/// A unit owns at most one inner unit; ownership is exclusive and transfers
/// on [`replace_inner`](Self::replace_inner). A chain is therefore a
/// singly-linked, non-cyclic sequence from an outermost head to an innermost
/// tail. Serializing the head renders the whole chain; the provided driver
/// methods handle sizing, allocation and recursion, while implementors only
/// write their own header (and optional trailer) bytes.
///
/// Serialization is not read-only: derived fields (next protocol, family,
/// total length) are stored back onto the unit as they are computed.
pub trait Pdu: fmt::Debug + Send {
    /// The identity an enclosing unit records for this one.
    fn kind(&self) -> PduKind;

    /// Size in bytes of this unit's own fixed header, excluding inner units
    /// and trailer.
    fn header_size(&self) -> usize;

    /// Bytes this unit appends after all inner content.
    fn trailer_size(&self) -> usize {
        0
    }

    /// The unit this one encapsulates, if any.
    fn inner(&self) -> Option<&dyn Pdu>;

    fn inner_mut(&mut self) -> Option<&mut dyn Pdu>;

    /// Replaces the inner unit, returning the displaced one.
    ///
    /// Units that cannot encapsulate further content (e.g. raw payloads)
    /// hand the given unit straight back.
    fn replace_inner(&mut self, inner: Option<Box<dyn Pdu>>) -> Option<Box<dyn Pdu>>;

    /// Deep copy of this unit and its entire inner chain. The copy owns an
    /// independent clone of every descendant.
    fn clone_pdu(&self) -> Box<dyn Pdu>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Writes this unit's own header bytes into `buffer` and stores any
    /// derived fields.
    ///
    /// `buffer` spans exactly this unit's header, everything inner, and this
    /// unit's trailer; implementors must only touch the header region and may
    /// read `buffer.len()` to derive length fields. `parent` is the identity
    /// of the immediately enclosing unit, or `None` at the head of the chain.
    fn write_header(&mut self, buffer: &mut [u8], parent: Option<PduKind>);

    /// Writes this unit's trailer bytes. Runs after the inner chain has been
    /// rendered. `buffer` is exactly [`trailer_size`](Self::trailer_size)
    /// bytes.
    fn write_trailer(&mut self, _buffer: &mut [u8]) {}

    /// Total size of the chain from this unit inward: the sum of header and
    /// trailer sizes over every unit.
    fn total_size(&self) -> usize {
        let mut size = self.header_size() + self.trailer_size();
        let mut cursor = self.inner();
        while let Some(pdu) = cursor {
            size += pdu.header_size() + pdu.trailer_size();
            cursor = pdu.inner();
        }
        size
    }

    /// Serializes the chain from this unit inward into a freshly allocated
    /// buffer of exactly [`total_size`](Self::total_size) bytes.
    fn serialize(&mut self) -> Vec<u8> {
        let mut buffer = vec![0u8; self.total_size()];
        self.serialize_into(&mut buffer, None);
        buffer
    }

    /// Recursive serialization step: writes this unit's header, delegates the
    /// remaining slice to the inner unit, then writes the trailer.
    ///
    /// # Panics
    ///
    /// Panics if `buffer` is smaller than this unit's header plus trailer.
    /// The driver sizes every slice it hands out, so reaching the panic means
    /// the size computation and the write path disagree — an internal
    /// consistency failure, not an input error.
    fn serialize_into(&mut self, buffer: &mut [u8], parent: Option<PduKind>) {
        let own = self.header_size() + self.trailer_size();
        assert!(
            buffer.len() >= own,
            "buffer of {} bytes cannot hold a {:?} unit of {} bytes",
            buffer.len(),
            self.kind(),
            own,
        );
        self.write_header(buffer, parent);
        let header = self.header_size();
        let trailer = self.trailer_size();
        let end = buffer.len() - trailer;
        let kind = self.kind();
        if let Some(inner) = self.inner_mut() {
            inner.serialize_into(&mut buffer[header..end], Some(kind));
        }
        if trailer > 0 {
            self.write_trailer(&mut buffer[end..]);
        }
    }

    /// Walks the chain inward and returns the first unit of the given kind.
    fn inner_of_kind(&self, kind: PduKind) -> Option<&dyn Pdu> {
        let mut cursor = self.inner();
        while let Some(pdu) = cursor {
            if pdu.kind() == kind {
                return Some(pdu);
            }
            cursor = pdu.inner();
        }
        None
    }
}

impl Clone for Box<dyn Pdu> {
    fn clone(&self) -> Self {
        self.clone_pdu()
    }
}

/// Iterator over a chain, outermost unit first.
pub struct ChainIter<'a> {
    cursor: Option<&'a dyn Pdu>,
}

impl<'a> ChainIter<'a> {
    pub fn new(head: &'a dyn Pdu) -> Self {
        Self { cursor: Some(head) }
    }
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = &'a dyn Pdu;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.cursor?;
        self.cursor = current.inner();
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ip::Ipv4Pdu;
    use crate::loopback::LoopbackPdu;
    use crate::raw::RawPdu;

    #[test]
    fn test_ip_only_chain() {
        let mut ip = Ipv4Pdu::new("192.168.1.1", "").unwrap();
        let bytes = ip.serialize();

        assert_eq!(bytes.len(), 20);
        assert_eq!(bytes[0] >> 4, 4); // version
        assert_eq!(bytes[0] & 0x0F, 5); // ihl
        assert_eq!(bytes[8], 128); // ttl
        assert_eq!(bytes[9], PduKind::RAW_PROTOCOL); // no inner unit
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 20); // tot_len
        assert_eq!(&bytes[12..16], &[0, 0, 0, 0]); // empty source
        assert_eq!(&bytes[16..20], &[192, 168, 1, 1]);
    }

    #[test]
    fn test_loopback_ip_chain() {
        let ip = Ipv4Pdu::new("192.168.1.1", "").unwrap();
        let mut head = LoopbackPdu::new().with_inner(Box::new(ip));
        let bytes = head.serialize();

        assert_eq!(bytes.len(), 4 + 20);
        assert_eq!(bytes[..4], 2u32.to_ne_bytes()); // AF_INET
        assert_eq!(bytes[4] >> 4, 4);
        assert_eq!(bytes[12], 128);
        assert_eq!(&bytes[20..24], &[192, 168, 1, 1]);

        let mut ip_alone = Ipv4Pdu::new("192.168.1.1", "").unwrap();
        assert_eq!(&bytes[4..], &ip_alone.serialize()[..]);
    }

    #[test]
    fn test_serialized_length_matches_chain_size() {
        let raw = RawPdu::new(b"hello".to_vec());
        let ip = Ipv4Pdu::new("10.0.0.1", "10.0.0.2")
            .unwrap()
            .with_inner(Box::new(raw));
        let mut head = LoopbackPdu::new().with_inner(Box::new(ip));

        assert_eq!(head.total_size(), 4 + 20 + 5);
        assert_eq!(head.serialize().len(), head.total_size());
        assert_eq!(ChainIter::new(&head).count(), 3);
    }

    #[test]
    fn test_derived_protocol_overwrites_setter() {
        let mut ip = Ipv4Pdu::new("10.0.0.1", "").unwrap();
        ip.set_protocol(6);
        ip.replace_inner(Some(Box::new(RawPdu::new(vec![1, 2, 3]))));

        let bytes = ip.serialize();
        assert_eq!(bytes[9], PduKind::RAW_PROTOCOL);
        assert_eq!(ip.protocol(), PduKind::RAW_PROTOCOL);
    }

    #[test]
    fn test_ip_in_ip_records_encapsulated_identity() {
        let inner = Ipv4Pdu::new("10.0.0.2", "10.0.0.1").unwrap();
        let mut outer = Ipv4Pdu::new("192.168.0.2", "192.168.0.1")
            .unwrap()
            .with_inner(Box::new(inner));

        let bytes = outer.serialize();
        assert_eq!(bytes[9], 4); // IPPROTO_IPIP, not IPPROTO_IP
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 40);
        // The inner header records the raw sentinel: nothing follows it.
        assert_eq!(bytes[20 + 9], PduKind::RAW_PROTOCOL);
    }

    #[test]
    fn test_clone_is_deep_and_independent() {
        let ip = Ipv4Pdu::new("10.0.0.1", "10.0.0.2").unwrap();
        let original = LoopbackPdu::new().with_inner(Box::new(ip));
        let mut copy = original.clone();

        let copied_ip = copy
            .inner_mut()
            .and_then(|pdu| pdu.as_any_mut().downcast_mut::<Ipv4Pdu>())
            .unwrap();
        copied_ip.set_ttl(1);

        let original_ip = original
            .inner()
            .and_then(|pdu| pdu.as_any().downcast_ref::<Ipv4Pdu>())
            .unwrap();
        assert_eq!(original_ip.ttl(), 128);
    }

    #[test]
    fn test_ownership_transfers_on_replace() {
        let mut ip = Ipv4Pdu::new("10.0.0.1", "").unwrap();
        ip.replace_inner(Some(Box::new(RawPdu::new(b"abc".to_vec()))));

        let displaced = ip.replace_inner(None).unwrap();
        assert_eq!(displaced.kind(), PduKind::Raw);
        assert!(ip.inner().is_none());
    }

    #[test]
    fn test_parse_serialize_round_trip() {
        let raw = RawPdu::new(b"payload".to_vec());
        let ip = Ipv4Pdu::new("192.168.1.1", "192.168.1.2")
            .unwrap()
            .with_inner(Box::new(raw));
        let mut head = LoopbackPdu::new().with_inner(Box::new(ip));
        let bytes = head.serialize();

        let mut reparsed = LoopbackPdu::parse(&bytes).unwrap();
        let kinds: Vec<PduKind> = ChainIter::new(&reparsed).map(|pdu| pdu.kind()).collect();
        assert_eq!(kinds, vec![PduKind::Loopback, PduKind::Ipv4, PduKind::Raw]);
        assert_eq!(reparsed.serialize(), bytes);
    }

    #[test]
    fn test_inner_of_kind_walks_chain() {
        let raw = RawPdu::new(b"x".to_vec());
        let ip = Ipv4Pdu::new("10.0.0.1", "")
            .unwrap()
            .with_inner(Box::new(raw));
        let head = LoopbackPdu::new().with_inner(Box::new(ip));

        assert!(head.inner_of_kind(PduKind::Ipv4).is_some());
        assert!(head.inner_of_kind(PduKind::Raw).is_some());
        assert!(head.inner_of_kind(PduKind::Loopback).is_none());
    }

    /// A unit that pads its content with a fixed trailer, to pin down
    /// trailer accounting and write ordering.
    #[derive(Debug, Clone)]
    struct PaddedPdu {
        inner: Option<Box<dyn Pdu>>,
    }

    impl Pdu for PaddedPdu {
        fn kind(&self) -> PduKind {
            PduKind::Unknown(0x0FAD)
        }

        fn header_size(&self) -> usize {
            2
        }

        fn trailer_size(&self) -> usize {
            3
        }

        fn inner(&self) -> Option<&dyn Pdu> {
            self.inner.as_deref()
        }

        fn inner_mut(&mut self) -> Option<&mut dyn Pdu> {
            match &mut self.inner {
                Some(b) => Some(b.as_mut()),
                None => None,
            }
        }

        fn replace_inner(&mut self, inner: Option<Box<dyn Pdu>>) -> Option<Box<dyn Pdu>> {
            std::mem::replace(&mut self.inner, inner)
        }

        fn clone_pdu(&self) -> Box<dyn Pdu> {
            Box::new(self.clone())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }

        fn write_header(&mut self, buffer: &mut [u8], _parent: Option<PduKind>) {
            buffer[..2].copy_from_slice(&[0xBE, 0xEF]);
        }

        fn write_trailer(&mut self, buffer: &mut [u8]) {
            buffer.fill(0xAA);
        }
    }

    #[test]
    fn test_trailer_written_after_inner_content() {
        let mut padded = PaddedPdu {
            inner: Some(Box::new(RawPdu::new(vec![1, 2, 3, 4]))),
        };

        let bytes = padded.serialize();
        assert_eq!(bytes.len(), 2 + 4 + 3);
        assert_eq!(&bytes[..2], &[0xBE, 0xEF]);
        assert_eq!(&bytes[2..6], &[1, 2, 3, 4]);
        assert_eq!(&bytes[6..], &[0xAA, 0xAA, 0xAA]);
    }

    #[test]
    #[should_panic(expected = "cannot hold")]
    fn test_undersized_slice_is_a_contract_violation() {
        let mut ip = Ipv4Pdu::new("10.0.0.1", "").unwrap();
        let mut buffer = [0u8; 10];
        ip.serialize_into(&mut buffer, None);
    }
}
