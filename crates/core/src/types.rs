//! Identifier types
//!
//! Event ids, correlation ids, epoch ids and unified record ids are all
//! 128-bit identifiers. On disk they use the mixed-endian GUID layout
//! (first three groups little-endian), which is what `Uuid::to_bytes_le`
//! produces.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Size of an identifier on disk
pub const RECORD_ID_SIZE: usize = 16;

/// 128-bit record identifier
///
/// Generated with [`RecordId::new`] when a record is constructed; decoders
/// only ever rebuild identifiers from bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// The empty identifier
    pub const NIL: RecordId = RecordId(Uuid::nil());

    /// Create a new unique identifier
    pub fn new() -> Self {
        RecordId(Uuid::new_v4())
    }

    /// Create the nil identifier
    pub const fn nil() -> Self {
        Self::NIL
    }

    /// Check if this is the nil identifier
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Bytes in on-disk layout
    pub fn to_wire_bytes(&self) -> [u8; RECORD_ID_SIZE] {
        self.0.to_bytes_le()
    }

    /// Rebuild from on-disk layout
    pub fn from_wire_bytes(bytes: [u8; RECORD_ID_SIZE]) -> Self {
        RecordId(Uuid::from_bytes_le(bytes))
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Fail with `IdentifierInvalid` if this is the nil identifier.
    pub fn ensure_not_nil(&self, field: &'static str) -> crate::Result<()> {
        if self.is_nil() {
            return Err(crate::Error::IdentifierInvalid { field });
        }
        Ok(())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RecordId {
    fn from(uuid: Uuid) -> Self {
        RecordId(uuid)
    }
}

impl From<RecordId> for Uuid {
    fn from(id: RecordId) -> Self {
        id.0
    }
}
