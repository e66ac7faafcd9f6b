//! # Hierarchy Snapshots
//!
//! Format: Header (5 bytes) + postcard-serialized [`HierarchySnapshot`].
//! - 4 bytes: Magic ("DSTC")
//! - 1 byte: Version
//!
//! Frames are stored in pre-order with their canonical addresses, so a
//! snapshot can be replayed into an empty hierarchy by upserting the records
//! in order. Node handles are not part of the format.
//!
//! The size cap applies to both directions: a snapshot that would not load
//! back is refused when it is written.

use crate::address::Address;
use crate::hierarchy::{FrameUpdate, Hierarchy};
use crate::{DistinctError, primitives};
use serde::{Deserialize, Serialize};

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum accepted snapshot size.
///
/// HTML snapshots make frames large; 64 MB leaves room for pages with many
/// iframes while bounding allocation on corrupt input.
pub const MAX_SNAPSHOT_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

const HEADER_SIZE: usize = 5;

// =============================================================================
// HEADER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    /// Header for the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), DistinctError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(DistinctError::Serialization(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(DistinctError::Serialization(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DistinctError> {
        let Some(header) = bytes.get(..HEADER_SIZE) else {
            return Err(DistinctError::Serialization(
                "Header too short".to_string(),
            ));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[0..4]);
        Ok(Self {
            magic,
            version: header[4],
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SNAPSHOT TYPES
// =============================================================================

/// One frame as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub address: Address,
    pub href: Option<String>,
    pub html: Option<String>,
    pub closed: bool,
    pub opened: bool,
}

/// Handle-free image of a hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchySnapshot {
    /// Frames in pre-order: root first, iframes before popups.
    pub frames: Vec<FrameRecord>,
}

impl Hierarchy {
    /// Capture the tree as a list of addressed records.
    #[must_use]
    pub fn snapshot(&self) -> HierarchySnapshot {
        let frames = self
            .frames_in_order()
            .into_iter()
            .filter_map(|(address, id)| {
                self.frame(id).map(|frame| FrameRecord {
                    address,
                    href: frame.href.clone(),
                    html: frame.html.clone(),
                    closed: frame.closed,
                    opened: frame.opened,
                })
            })
            .collect();
        HierarchySnapshot { frames }
    }

    /// Rebuild a hierarchy by upserting every record in order.
    #[must_use]
    pub fn from_snapshot(snapshot: &HierarchySnapshot) -> Self {
        let mut hierarchy = Hierarchy::new();
        for record in &snapshot.frames {
            hierarchy.upsert(
                &record.address,
                FrameUpdate {
                    href: record.href.clone(),
                    html: record.html.clone(),
                },
            );
            if record.opened {
                hierarchy.mark_opened(&record.address);
            }
            if record.closed {
                hierarchy.mark_closed(&record.address);
            }
        }
        hierarchy
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a hierarchy to bytes (header + payload).
pub fn hierarchy_to_bytes(hierarchy: &Hierarchy) -> Result<Vec<u8>, DistinctError> {
    let header = SnapshotHeader::new();
    let payload = postcard::to_stdvec(&hierarchy.snapshot())
        .map_err(|e| DistinctError::Serialization(e.to_string()))?;

    let total = HEADER_SIZE.saturating_add(payload.len());
    check_size(total)?;

    let mut result = Vec::with_capacity(total);
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

fn check_size(len: usize) -> Result<(), DistinctError> {
    if len > MAX_SNAPSHOT_PAYLOAD_SIZE {
        return Err(DistinctError::Serialization(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            len, MAX_SNAPSHOT_PAYLOAD_SIZE
        )));
    }
    Ok(())
}

/// Decode a snapshot without rebuilding the tree.
pub fn snapshot_from_bytes(bytes: &[u8]) -> Result<HierarchySnapshot, DistinctError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DistinctError::Serialization(format!(
            "Data too short: minimum {HEADER_SIZE} bytes required"
        )));
    }
    check_size(bytes.len())?;

    let header = SnapshotHeader::from_bytes(bytes)?;
    header.validate()?;

    postcard::from_bytes(&bytes[HEADER_SIZE..]).map_err(|e| {
        DistinctError::Serialization(format!("Failed to deserialize snapshot: {e}"))
    })
}

/// Deserialize a hierarchy from bytes.
pub fn hierarchy_from_bytes(bytes: &[u8]) -> Result<Hierarchy, DistinctError> {
    snapshot_from_bytes(bytes).map(|snapshot| Hierarchy::from_snapshot(&snapshot))
}

/// BLAKE3 digest of a hierarchy's serialized snapshot, hex encoded.
#[cfg(feature = "crypto-hash")]
pub fn snapshot_crypto_hash(hierarchy: &Hierarchy) -> Result<String, DistinctError> {
    let bytes = hierarchy_to_bytes(hierarchy)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// =============================================================================
// TESTS
// =============================================================================
