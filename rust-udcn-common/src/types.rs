//! Common types shared across the forwarding engine, link layer, and CLI.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Interface identifier type used for identifying network interfaces.
pub type InterfaceId = u32;

/// Maximum length of a face name string.
pub const MAX_FACE_NAME_LEN: usize = 64;

/// Default maximum number of entries in the FIB table.
pub const MAX_FIB_ENTRIES: usize = 1024;

/// Default maximum number of entries in the PIT table.
pub const MAX_PIT_ENTRIES: usize = 2048;

/// Default maximum number of entries in the content store.
pub const MAX_CS_ENTRIES: usize = 4096;

/// Default maximum number of faces the link layer tracks before evicting the
/// oldest one.
pub const MAX_FACE_TABLE_ENTRIES: usize = 10_000;

/// Unique identifier for a face.
///
/// Assigned by the link layer; the forwarding engine treats this as an
/// opaque integer and never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FaceId(pub u32);

impl FaceId {
    /// Reserved id that names the upward (application) queue.
    ///
    /// No face with this id is ever registered by the link layer; packets
    /// addressed to it are routed to the application channel instead of a
    /// socket.
    pub const LOCAL_APP: FaceId = FaceId(u32::MAX);

    /// Whether this id refers to the local application face.
    pub fn is_local_app(&self) -> bool {
        *self == Self::LOCAL_APP
    }
}

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_local_app() {
            write!(f, "face(local-app)")
        } else {
            write!(f, "face({})", self.0)
        }
    }
}

impl From<u32> for FaceId {
    fn from(value: u32) -> Self {
        FaceId(value)
    }
}

/// Face type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaceType {
    /// Physical or simulated network transport (e.g. QUIC).
    Transport,
    /// Internal application/repository face (the upward queue).
    App,
}
