//! # Metrics
//!
//! Counters kept by an execution context while it processes reports, and a
//! structural summary computed from a hierarchy on demand.

use crate::Hierarchy;
use crate::address::SlotKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// SESSION METRICS
// =============================================================================

/// Per-session processing counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Reports handed to `process`, whatever their outcome.
    pub reports_received: u64,
    /// Reports a processor accepted.
    pub reports_applied: u64,
    /// Recognized reports rejected for data-quality reasons.
    pub reports_skipped: u64,
    /// Reports without a registered processor.
    pub reports_unknown: u64,
    /// Unknown reports by discriminator.
    pub unknown_by_kind: BTreeMap<String, u64>,
    /// Entries appended to the behavior log.
    pub log_entries: u64,
}

impl SessionMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_received(&mut self) {
        self.reports_received = self.reports_received.saturating_add(1);
    }

    pub(crate) fn record_applied(&mut self, entries: usize) {
        self.reports_applied = self.reports_applied.saturating_add(1);
        self.log_entries = self.log_entries.saturating_add(entries as u64);
    }

    pub(crate) fn record_skipped(&mut self) {
        self.reports_skipped = self.reports_skipped.saturating_add(1);
    }

    pub(crate) fn record_unknown(&mut self, discriminator: &str) {
        self.reports_unknown = self.reports_unknown.saturating_add(1);
        let count = self
            .unknown_by_kind
            .entry(discriminator.to_string())
            .or_insert(0);
        *count = count.saturating_add(1);
    }
}

// =============================================================================
// HIERARCHY METRICS
// =============================================================================

/// Structural summary of a hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyMetrics {
    /// Total number of nodes, root included.
    pub frame_count: usize,
    /// Nodes reached through a `frames[N]` step.
    pub iframe_count: usize,
    /// Nodes reached through a `popups[N]` step.
    pub popup_count: usize,
    /// Popups flagged as closed.
    pub closed_popups: usize,
    /// Longest address, in steps below `top`.
    pub max_depth: usize,
}

impl HierarchyMetrics {
    /// Metrics of an empty hierarchy.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compute metrics from a hierarchy.
    #[must_use]
    pub fn from_hierarchy(hierarchy: &Hierarchy) -> Self {
        let mut metrics = Self::empty();
        for (address, id) in hierarchy.frames_in_order() {
            metrics.frame_count += 1;
            metrics.max_depth = metrics.max_depth.max(address.depth());
            match address.last().map(|step| step.kind) {
                Some(SlotKind::Frame) => metrics.iframe_count += 1,
                Some(SlotKind::Popup) => {
                    metrics.popup_count += 1;
                    if hierarchy.frame(id).is_some_and(|frame| frame.closed) {
                        metrics.closed_popups += 1;
                    }
                }
                None => {}
            }
        }
        metrics
    }
}

// =============================================================================
// TESTS
// =============================================================================
