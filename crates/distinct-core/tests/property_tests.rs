//! # Property-Based Tests
//!
//! Structural invariants of addresses and hierarchies checked with proptest.

use distinct_core::{
    Address, ExecutionContext, FrameUpdate, Hierarchy, ProcessorRegistry, Report, SessionInfo,
    Step, hierarchy_from_bytes, hierarchy_to_bytes,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::sync::Arc;

// =============================================================================
// STRATEGIES
// =============================================================================

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0u32..8).prop_map(Step::frame),
        (0u32..8).prop_map(Step::popup),
    ]
}

fn any_address(max_depth: usize) -> impl Strategy<Value = Address> {
    vec(step(), 0..=max_depth).prop_map(Address::from_steps)
}

fn document_init(id: u64, address: &Address) -> Report {
    let mut fields = serde_json::Map::new();
    fields.insert("hierarchy".to_string(), address.to_string().into());
    fields.insert("href".to_string(), format!("https://{address}/").into());
    Report::new("documentinit", id, id, fields)
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Display then parse yields the same address.
    #[test]
    fn address_string_round_trip(address in any_address(12)) {
        let parsed = Address::parse(&address.to_string()).expect("parse");
        prop_assert_eq!(parsed, address);
    }

    /// Leading zeros in slot indices parse to the canonical form.
    #[test]
    fn leading_zeros_normalize(slot in 0u32..1000, zeros in 1usize..4) {
        let raw = format!("top.frames[{}{}]", "0".repeat(zeros), slot);
        let parsed = Address::parse(&raw).expect("parse");
        prop_assert_eq!(parsed.to_string(), format!("top.frames[{slot}]"));
    }

    /// A deep upsert on an empty tree creates one node per segment.
    #[test]
    fn lazy_creation_creates_whole_chain(address in any_address(16)) {
        let mut hierarchy = Hierarchy::new();
        let id = hierarchy.upsert(&address, FrameUpdate::with_href("https://leaf/"));

        prop_assert_eq!(hierarchy.len(), address.depth() + 1);
        prop_assert_eq!(hierarchy.resolve(&address), Some(id));
        prop_assert_eq!(hierarchy.canonical_address(id), Some(address.clone()));

        let mut ancestor = address.parent();
        while let Some(current) = ancestor {
            let frame = hierarchy.get(&current).expect("ancestor exists");
            prop_assert!(frame.href.is_none());
            ancestor = current.parent();
        }
    }

    /// Every node's canonical address resolves back to it.
    #[test]
    fn canonical_addresses_resolve_to_self(addresses in vec(any_address(6), 1..20)) {
        let mut hierarchy = Hierarchy::new();
        for address in &addresses {
            hierarchy.upsert(address, FrameUpdate::default());
        }

        for (address, id) in hierarchy.frames_in_order() {
            prop_assert_eq!(hierarchy.resolve(&address), Some(id));
            prop_assert_eq!(hierarchy.canonical_address(id), Some(address));
        }
    }

    /// Removing an address makes every address below it unresolvable.
    #[test]
    fn removal_cascades(addresses in vec(any_address(6), 1..20), victim in any_address(3)) {
        let mut hierarchy = Hierarchy::new();
        for address in &addresses {
            hierarchy.upsert(address, FrameUpdate::default());
        }

        let existed = hierarchy.resolve(&victim).is_some();
        prop_assert_eq!(hierarchy.remove(&victim), existed);
        prop_assert!(hierarchy.resolve(&victim).is_none());

        for (address, _) in hierarchy.frames_in_order() {
            prop_assert!(!address.steps().starts_with(victim.steps()) || victim.steps().is_empty());
        }
    }

    /// Document reports for distinct contexts converge regardless of order.
    #[test]
    fn document_reports_converge(
        ordered in vec(any_address(4), 1..12).prop_flat_map(|addresses| {
            let n = addresses.len();
            (Just(addresses), Just((0..n).collect::<Vec<_>>()).prop_shuffle())
        })
    ) {
        let (addresses, permutation) = ordered;
        let registry = Arc::new(ProcessorRegistry::with_defaults());

        let mut forward = ExecutionContext::new(SessionInfo::new("a", 0), Arc::clone(&registry));
        for (id, address) in addresses.iter().enumerate() {
            forward.process(document_init(id as u64, address)).expect("process");
        }

        let mut shuffled = ExecutionContext::new(SessionInfo::new("b", 0), registry);
        for &index in &permutation {
            shuffled.process(document_init(index as u64, &addresses[index])).expect("process");
        }

        prop_assert_eq!(forward.hierarchy().snapshot(), shuffled.hierarchy().snapshot());
    }

    /// Snapshot bytes rebuild an identical tree.
    #[test]
    fn snapshot_bytes_rebuild_tree(addresses in vec(any_address(6), 0..20)) {
        let mut hierarchy = Hierarchy::new();
        for address in &addresses {
            hierarchy.upsert(address, FrameUpdate::with_href(address.to_string()));
        }

        let bytes = hierarchy_to_bytes(&hierarchy).expect("serialize");
        let restored = hierarchy_from_bytes(&bytes).expect("deserialize");
        prop_assert_eq!(restored.snapshot(), hierarchy.snapshot());
        prop_assert_eq!(restored.render(), hierarchy.render());
    }
}
