use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PacketError {
    /// A parse buffer was too short for the unit's minimum header.
    #[error("malformed packet: {required} bytes required, {available} available")]
    MalformedPacket { required: usize, available: usize },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
