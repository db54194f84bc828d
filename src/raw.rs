//! Untyped payload unit.
//!
//! [`RawPdu`] carries bytes no parser claimed: application data, padding, or
//! the payload of a protocol without a registered unit type. It is always the
//! tail of a chain.

use std::any::Any;

use serde::{Deserialize, Serialize};

use crate::{PacketError, Pdu, PduKind};

/// A run of opaque payload bytes.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct RawPdu {
    #[serde(with = "serde_bytes")]
    payload: Vec<u8>,
}

impl RawPdu {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Constructs a raw unit from a buffer. Any buffer is acceptable,
    /// including an empty one; the signature matches the other units' parse
    /// constructors so the unit can sit in the parser registry.
    pub fn parse(bytes: &[u8]) -> Result<Self, PacketError> {
        Ok(Self::new(bytes))
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Vec<u8> {
        &mut self.payload
    }
}

impl Pdu for RawPdu {
    fn kind(&self) -> PduKind {
        PduKind::Raw
    }

    /// The whole payload counts as this unit's header.
    fn header_size(&self) -> usize {
        self.payload.len()
    }

    fn inner(&self) -> Option<&dyn Pdu> {
        None
    }

    fn inner_mut(&mut self) -> Option<&mut dyn Pdu> {
        None
    }

    /// A raw unit encapsulates nothing; the given unit is handed back to the
    /// caller unchanged.
    fn replace_inner(&mut self, inner: Option<Box<dyn Pdu>>) -> Option<Box<dyn Pdu>> {
        inner
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
        buffer[..self.payload.len()].copy_from_slice(&self.payload);
    }
}
