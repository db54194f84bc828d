//! Null/loopback link-layer unit.
//!
//! The loopback header is a single 4-byte address-family word, in host byte
//! order on the wire, announcing what the frame carries. The interface member
//! only matters when actually transmitting; it plays no part in the byte
//! representation.

use std::any::Any;

use crate::iface::NetworkInterface;
use crate::registry;
use crate::sender::{LinkSend, PacketSender};
use crate::{PacketError, Pdu, PduKind};

/// Null/loopback encapsulation unit.
#[derive(Debug, Clone, Default)]
pub struct LoopbackPdu {
    family: u32,
    iface: Option<NetworkInterface>,
    inner: Option<Box<dyn Pdu>>,
}

impl LoopbackPdu {
    /// Width of the address-family field, which is the whole header.
    pub const HEADER_SIZE: usize = 4;

    /// Default-constructs a loopback unit with family 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs a loopback unit bound to the interface it will transmit on.
    pub fn with_iface(iface: NetworkInterface) -> Self {
        Self {
            family: 0,
            iface: Some(iface),
            inner: None,
        }
    }

    /// Attaches an inner unit, replacing any existing one.
    pub fn with_inner(mut self, inner: Box<dyn Pdu>) -> Self {
        self.inner = Some(inner);
        self
    }

    /// Constructs a loopback unit from a buffer, classifying whatever follows
    /// the family word as a typed inner unit where possible and as raw bytes
    /// otherwise.
    pub fn parse(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() < Self::HEADER_SIZE {
            return Err(PacketError::MalformedPacket {
                required: Self::HEADER_SIZE,
                available: bytes.len(),
            });
        }

        let family = u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let rest = &bytes[Self::HEADER_SIZE..];
        let inner = if rest.is_empty() {
            None
        } else {
            Some(registry::parse_inner(PduKind::from_family(family), rest))
        };

        Ok(Self {
            family,
            iface: None,
            inner,
        })
    }

    pub fn family(&self) -> u32 {
        self.family
    }

    pub fn set_family(&mut self, family: u32) {
        self.family = family;
    }

    pub fn iface(&self) -> Option<&NetworkInterface> {
        self.iface.as_ref()
    }

    pub fn set_iface(&mut self, iface: NetworkInterface) {
        self.iface = Some(iface);
    }
}

impl Pdu for LoopbackPdu {
    fn kind(&self) -> PduKind {
        PduKind::Loopback
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
        self.family = match self.inner.as_deref().map(|pdu| pdu.kind()) {
            // Inner kinds without a family mapping keep the stored value, so
            // a parsed frame survives re-serialization.
            Some(kind) => kind.family_id().unwrap_or(self.family),
            None => 0,
        };
        buffer[..Self::HEADER_SIZE].copy_from_slice(&self.family.to_ne_bytes());
    }
}

impl LinkSend for LoopbackPdu {
    fn send(&mut self, sender: &mut dyn PacketSender) -> Result<usize, PacketError> {
        let iface = self.iface.clone().ok_or(PacketError::UnsupportedOperation(
            "loopback transmission requires an egress interface",
        ))?;
        sender.send_l2(self, &iface)
    }
}
