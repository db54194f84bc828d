//! Network interface identifier.
//!
//! A [`NetworkInterface`] names the local egress interface a link-layer unit
//! transmits on. It is a plain identifier: enumeration of the host's
//! interfaces and any OS interaction happen behind the sender boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A local network interface, identified by name and OS index.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub struct NetworkInterface {
    name: String,
    index: u32,
}

impl NetworkInterface {
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for NetworkInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{})", self.name, self.index)
    }
}
