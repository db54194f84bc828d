//! IPv4 network-layer unit.
//!
//! This module provides the IPv4 address value type and the IPv4 header unit:
//! construction from addresses or from captured bytes, the full set of field
//! accessors, and serialization with derived protocol and length fields.

use std::any::Any;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::registry;
use crate::sender::PacketSender;
use crate::{PacketError, Pdu, PduKind};

/// IPv4 address representation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash, Default)]
pub struct Ipv4Address([u8; 4]);

impl Ipv4Address {
    /// The all-zeroes address, used where a field was left unset.
    pub const UNSPECIFIED: Ipv4Address = Ipv4Address([0; 4]);

    pub fn new(addr: [u8; 4]) -> Self {
        Self(addr)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn octets(&self) -> [u8; 4] {
        self.0
    }

    /// The address as a 32-bit integer with the network-order byte layout.
    pub fn to_u32(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    pub fn from_u32(value: u32) -> Self {
        Self(value.to_be_bytes())
    }
}

impl FromStr for Ipv4Address {
    type Err = PacketError;

    /// Converts a dotted-decimal string into an address.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let addr: std::net::Ipv4Addr = s
            .parse()
            .map_err(|_| PacketError::InvalidAddress(s.to_string()))?;
        Ok(Self(addr.octets()))
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

impl From<std::net::Ipv4Addr> for Ipv4Address {
    fn from(addr: std::net::Ipv4Addr) -> Self {
        Self(addr.octets())
    }
}

impl From<Ipv4Address> for std::net::Ipv4Addr {
    fn from(addr: Ipv4Address) -> Self {
        std::net::Ipv4Addr::from(addr.0)
    }
}

/// IPv4 header flags
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Default)]
pub struct IpFlags {
    pub reserved: bool,
    pub dont_fragment: bool,
    pub more_fragments: bool,
}

impl IpFlags {
    pub fn new(dont_fragment: bool, more_fragments: bool) -> Self {
        Self {
            reserved: false,
            dont_fragment,
            more_fragments,
        }
    }

    /// Convert to the 3-bit wire value
    pub fn as_u8(&self) -> u8 {
        let mut flags = 0u8;
        if self.reserved {
            flags |= 0b100;
        }
        if self.dont_fragment {
            flags |= 0b010;
        }
        if self.more_fragments {
            flags |= 0b001;
        }
        flags
    }

    pub fn from_u8(value: u8) -> Self {
        Self {
            reserved: (value & 0b100) != 0,
            dont_fragment: (value & 0b010) != 0,
            more_fragments: (value & 0b001) != 0,
        }
    }
}

/// IPv4 header unit.
///
/// Fresh units start from the shared defaults: version 4, header length of
/// five 32-bit words, ttl 128, everything else zero. `total_length` and
/// `protocol` are derived from the chain at serialization time; the setters
/// for them exist for symmetry with the other fields but their values are
/// overwritten whenever the unit is serialized.
#[derive(Debug, Clone, Default)]
pub struct Ipv4Pdu {
    version: u8,
    ihl: u8,
    tos: u8,
    total_length: u16,
    identification: u16,
    flags: IpFlags,
    fragment_offset: u16,
    ttl: u8,
    protocol: u8,
    checksum: u16,
    source: Ipv4Address,
    destination: Ipv4Address,
    inner: Option<Box<dyn Pdu>>,
}

impl Ipv4Pdu {
    /// Fixed header size in bytes; options are not supported.
    pub const HEADER_SIZE: usize = 20;

    /// Creates a unit from dotted-decimal destination and source addresses.
    /// An empty string leaves the corresponding field at the zero address.
    pub fn new(destination: &str, source: &str) -> Result<Self, PacketError> {
        let destination = if destination.is_empty() {
            Ipv4Address::UNSPECIFIED
        } else {
            destination.parse()?
        };
        let source = if source.is_empty() {
            Ipv4Address::UNSPECIFIED
        } else {
            source.parse()?
        };
        Ok(Self::from_addrs(destination, source))
    }

    /// Creates a unit from already-encoded addresses.
    pub fn from_addrs(destination: Ipv4Address, source: Ipv4Address) -> Self {
        Self {
            version: 4,
            ihl: (Self::HEADER_SIZE / 4) as u8,
            ttl: 128,
            source,
            destination,
            ..Self::default()
        }
    }

    /// Constructs a unit from a buffer, classifying whatever follows the
    /// fixed header as a typed inner unit where possible and as raw bytes
    /// otherwise.
    pub fn parse(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() < Self::HEADER_SIZE {
            return Err(PacketError::MalformedPacket {
                required: Self::HEADER_SIZE,
                available: bytes.len(),
            });
        }

        let flags_and_offset = u16::from_be_bytes([bytes[6], bytes[7]]);
        let protocol = bytes[9];

        let rest = &bytes[Self::HEADER_SIZE..];
        let inner = if rest.is_empty() {
            None
        } else {
            Some(registry::parse_inner(
                PduKind::from_ip_protocol(protocol),
                rest,
            ))
        };

        Ok(Self {
            version: bytes[0] >> 4,
            ihl: bytes[0] & 0x0F,
            tos: bytes[1],
            total_length: u16::from_be_bytes([bytes[2], bytes[3]]),
            identification: u16::from_be_bytes([bytes[4], bytes[5]]),
            flags: IpFlags::from_u8((flags_and_offset >> 13) as u8),
            fragment_offset: flags_and_offset & 0x1FFF,
            ttl: bytes[8],
            protocol,
            checksum: u16::from_be_bytes([bytes[10], bytes[11]]),
            source: Ipv4Address::new([bytes[12], bytes[13], bytes[14], bytes[15]]),
            destination: Ipv4Address::new([bytes[16], bytes[17], bytes[18], bytes[19]]),
            inner,
        })
    }

    /// Attaches an inner unit, replacing any existing one.
    pub fn with_inner(mut self, inner: Box<dyn Pdu>) -> Self {
        self.inner = Some(inner);
        self
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn ihl(&self) -> u8 {
        self.ihl
    }

    pub fn tos(&self) -> u8 {
        self.tos
    }

    pub fn set_tos(&mut self, tos: u8) {
        self.tos = tos;
    }

    /// Header plus encapsulated content length. Derived from the chain at
    /// serialization time; a set value only survives until then.
    pub fn total_length(&self) -> u16 {
        self.total_length
    }

    pub fn set_total_length(&mut self, total_length: u16) {
        self.total_length = total_length;
    }

    pub fn identification(&self) -> u16 {
        self.identification
    }

    pub fn set_identification(&mut self, identification: u16) {
        self.identification = identification;
    }

    pub fn flags(&self) -> IpFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: IpFlags) {
        self.flags = flags;
    }

    pub fn fragment_offset(&self) -> u16 {
        self.fragment_offset
    }

    pub fn set_fragment_offset(&mut self, fragment_offset: u16) {
        self.fragment_offset = fragment_offset;
    }

    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    pub fn set_ttl(&mut self, ttl: u8) {
        self.ttl = ttl;
    }

    /// Next-protocol number. Derived from the inner unit's identity at
    /// serialization time; a set value only matters while there is no inner
    /// unit, and even then serialization records the raw sentinel.
    pub fn protocol(&self) -> u8 {
        self.protocol
    }

    pub fn set_protocol(&mut self, protocol: u8) {
        self.protocol = protocol;
    }

    /// Header checksum, written to the wire exactly as stored.
    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    pub fn set_checksum(&mut self, checksum: u16) {
        self.checksum = checksum;
    }

    pub fn source(&self) -> Ipv4Address {
        self.source
    }

    pub fn set_source(&mut self, source: Ipv4Address) {
        self.source = source;
    }

    pub fn set_source_str(&mut self, source: &str) -> Result<(), PacketError> {
        self.source = source.parse()?;
        Ok(())
    }

    pub fn destination(&self) -> Ipv4Address {
        self.destination
    }

    pub fn set_destination(&mut self, destination: Ipv4Address) {
        self.destination = destination;
    }

    pub fn set_destination_str(&mut self, destination: &str) -> Result<(), PacketError> {
        self.destination = destination.parse()?;
        Ok(())
    }

    /// Serializes the chain and hands it to the sender's layer-3 path,
    /// addressed to this unit's destination.
    pub fn send(&mut self, sender: &mut dyn PacketSender) -> Result<usize, PacketError> {
        let destination = self.destination;
        sender.send_l3(self, destination)
    }
}

impl Pdu for Ipv4Pdu {
    fn kind(&self) -> PduKind {
        PduKind::Ipv4
    }

    fn header_size(&self) -> usize {
        Self::HEADER_SIZE
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
        let derived = match self.inner.as_deref().map(|pdu| pdu.kind()) {
            // IPv4 directly inside IPv4 must read as tunneling, not as the
            // native identity.
            Some(PduKind::Ipv4) => PduKind::Ipv4EncapIpv4,
            Some(kind) => kind,
            None => PduKind::Raw,
        };
        self.protocol = derived.ip_protocol_number();
        self.total_length = buffer.len() as u16;

        buffer[0] = (self.version << 4) | (self.ihl & 0x0F);
        buffer[1] = self.tos;
        buffer[2..4].copy_from_slice(&self.total_length.to_be_bytes());
        buffer[4..6].copy_from_slice(&self.identification.to_be_bytes());
        let flags_and_offset =
            ((self.flags.as_u8() as u16) << 13) | (self.fragment_offset & 0x1FFF);
        buffer[6..8].copy_from_slice(&flags_and_offset.to_be_bytes());
        buffer[8] = self.ttl;
        buffer[9] = self.protocol;
        buffer[10..12].copy_from_slice(&self.checksum.to_be_bytes());
        buffer[12..16].copy_from_slice(self.source.as_bytes());
        buffer[16..20].copy_from_slice(self.destination.as_bytes());
    }
}
