//! Runtime parser registry.
//!
//! When a unit is constructed from captured bytes, the bytes that follow its
//! own header are classified through this table: the outer unit's declared
//! next-protocol field names a [`PduKind`], and the registered constructor
//! for that kind builds the inner unit. Kinds without a registered
//! constructor, and constructors that reject the bytes, degrade to a
//! [`RawPdu`] — an unrecognized inner protocol is not an error.
//!
//! The table is pre-seeded with this crate's own units and can be extended at
//! runtime, so new protocol units plug in without touching existing ones.

use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

use crate::ip::Ipv4Pdu;
use crate::loopback::LoopbackPdu;
use crate::raw::RawPdu;
use crate::{PacketError, Pdu, PduKind};

/// A parse constructor: builds a unit (and its inner chain) from a buffer.
pub type ParseFn = fn(&[u8]) -> Result<Box<dyn Pdu>, PacketError>;

static PARSERS: LazyLock<RwLock<HashMap<PduKind, ParseFn>>> = LazyLock::new(|| {
    let mut table: HashMap<PduKind, ParseFn> = HashMap::new();
    table.insert(PduKind::Ipv4, parse_ipv4);
    table.insert(PduKind::Ipv4EncapIpv4, parse_ipv4);
    table.insert(PduKind::Loopback, parse_loopback);
    RwLock::new(table)
});

fn parse_ipv4(bytes: &[u8]) -> Result<Box<dyn Pdu>, PacketError> {
    Ok(Box::new(Ipv4Pdu::parse(bytes)?))
}

fn parse_loopback(bytes: &[u8]) -> Result<Box<dyn Pdu>, PacketError> {
    Ok(Box::new(LoopbackPdu::parse(bytes)?))
}

/// Registers (or replaces) the parse constructor for a kind.
pub fn register(kind: PduKind, parser: ParseFn) {
    PARSERS
        .write()
        .expect("parser registry lock poisoned")
        .insert(kind, parser);
}

/// Builds the inner unit for a buffer classified as `kind`, falling back to
/// an untyped [`RawPdu`] when the kind is unregistered or its constructor
/// rejects the bytes.
pub fn parse_inner(kind: PduKind, bytes: &[u8]) -> Box<dyn Pdu> {
    let parser = PARSERS
        .read()
        .expect("parser registry lock poisoned")
        .get(&kind)
        .copied();
    match parser {
        Some(parse) => parse(bytes).unwrap_or_else(|_| Box::new(RawPdu::new(bytes))),
        None => Box::new(RawPdu::new(bytes)),
    }
}
