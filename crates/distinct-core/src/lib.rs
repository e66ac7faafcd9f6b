//! # distinct-core
//!
//! The Execution Context Engine for Distinct.
//!
//! An in-page agent reports what a browser session does (documents loading,
//! windows opening, messages crossing frames, storage writes). This crate
//! turns that ordered report stream into:
//! - a [`Hierarchy`] of browsing contexts (top window, iframes, popups)
//!   addressed by structural paths such as `top.frames[0].popups[1]`
//! - an append-only behavior log rendered as a PlantUML sequence diagram
//! - a mapping of free-form session statements
//!
//! ## Architectural Constraints
//!
//! - One [`ExecutionContext`] per session; reports are applied one at a time
//! - The [`ProcessorRegistry`] is immutable once built and shared read-only
//! - Has NO async, NO network dependencies (pure Rust)
//! - Malformed or unknown reports never abort a session

// =============================================================================
// MODULES
// =============================================================================

pub mod address;
pub mod context;
pub mod diagram;
pub mod formats;
pub mod hierarchy;
pub mod primitives;
pub mod processors;
pub mod registry;
pub mod statements;
pub mod storage;
pub mod system;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{DistinctError, FrameId, Report, ReportId};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use address::{Address, SlotKind, Step};
pub use context::{Disposition, ExecutionContext};
pub use diagram::{Arrow, BehaviorLog, LogEntry, Note, SequenceDiagram};
pub use hierarchy::{Frame, FrameUpdate, Hierarchy, Relation};
pub use processors::{ContextState, Processor};
pub use registry::ProcessorRegistry;
pub use statements::{SessionInfo, Statements};
pub use storage::{RedbSessionLog, RedbStore};

// =============================================================================
// RE-EXPORTS: Formats & System
// =============================================================================

pub use formats::{
    FrameRecord, HierarchySnapshot, MAX_SNAPSHOT_PAYLOAD_SIZE, SnapshotHeader,
    hierarchy_from_bytes, hierarchy_to_bytes, snapshot_from_bytes,
};
#[cfg(feature = "crypto-hash")]
pub use formats::snapshot_crypto_hash;
pub use system::{HierarchyMetrics, SessionMetrics};
