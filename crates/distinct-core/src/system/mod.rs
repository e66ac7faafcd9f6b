//! # System Module
//!
//! Session and hierarchy metrics. Purely informational: nothing in the
//! engine reads them back to make decisions.

mod metrics;

pub use metrics::*;
