//! # Engine Primitives
//!
//! Hardcoded constants for the Distinct engine.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! The address grammar keywords are a boundary contract: diagram participants
//! and path-based lookups downstream depend on their literal reproduction.

/// Segment naming the session's root browsing context.
pub const TOP_SEGMENT: &str = "top";

/// Prefix of a segment indexing into a node's contained iframes.
pub const FRAMES_SEGMENT: &str = "frames";

/// Prefix of a segment indexing into a node's spawned popups.
pub const POPUPS_SEGMENT: &str = "popups";

/// Separator between address segments.
pub const ADDRESS_SEPARATOR: char = '.';

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum number of segments in a structural address (including `top`).
///
/// Browsers cap frame nesting well below this; deeper addresses are treated
/// as malformed telemetry.
pub const MAX_ADDRESS_DEPTH: usize = 64;

/// Maximum length of a structural address in bytes.
pub const MAX_ADDRESS_LENGTH: usize = 4096;

// =============================================================================
// BEHAVIOR LOG RENDERING
// =============================================================================

/// Default number of characters per line inside a diagram note.
pub const DEFAULT_WRAP_WIDTH: usize = 100;

/// Line width used for HTML snapshots, which are long but rarely read.
pub const HTML_WRAP_WIDTH: usize = 300;

/// First line of every sequence diagram.
pub const DIAGRAM_START: &str = "@startuml";

/// Closing delimiter appended when a diagram is rendered.
pub const DIAGRAM_END: &str = "@enduml";

// =============================================================================
// SNAPSHOT FORMAT
// =============================================================================

/// Magic bytes for the hierarchy snapshot header.
pub const MAGIC_BYTES: &[u8; 4] = b"DSTC";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the snapshot format.
pub const FORMAT_VERSION: u8 = 2;
