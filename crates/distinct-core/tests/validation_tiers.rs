//! # Validation Tier Tests (T0-T3)
//!
//! ## Tiers
//! - T0: Address integrity
//! - T1: Hierarchy structure
//! - T2: Report processing
//! - T3: Full session scenarios

use distinct_core::{
    Address, Disposition, DistinctError, ExecutionContext, FrameUpdate, Hierarchy,
    ProcessorRegistry, RedbStore, Relation, Report, SessionInfo,
};
use serde_json::{Value, json};
use std::sync::Arc;

fn addr(s: &str) -> Address {
    Address::parse(s).expect("address")
}

fn report(id: u64, discriminator: &str, fields: Value) -> Report {
    let fields = match fields {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    Report::new(discriminator, id, 1_700_000_000_000u64 + id, fields)
}

fn context(session: &str) -> ExecutionContext {
    ExecutionContext::new(
        SessionInfo::new(session, 1_700_000_000_000),
        Arc::new(ProcessorRegistry::with_defaults()),
    )
}

// =============================================================================
// TIER T0: ADDRESS INTEGRITY
// =============================================================================

mod t0_address_integrity {
    use super::*;

    /// T0.1: Canonical addresses display as they were written.
    #[test]
    fn canonical_form_is_preserved() {
        for raw in ["top", "top.frames[0]", "top.popups[3].frames[12].popups[0]"] {
            assert_eq!(addr(raw).to_string(), raw);
        }
    }

    /// T0.2: Anything outside the grammar is rejected.
    #[test]
    fn malformed_addresses_rejected() {
        for raw in ["", "frames[0]", "top.", "top.frames[]", "top.frames[x]", "top.opener[0]"] {
            assert!(
                matches!(Address::parse(raw), Err(DistinctError::InvalidAddress { .. })),
                "{raw:?} should be rejected"
            );
        }
    }

    /// T0.3: Every address resolves to nothing on an empty tree.
    #[test]
    fn empty_tree_resolves_nothing() {
        let hierarchy = Hierarchy::new();
        assert!(hierarchy.resolve(&addr("top")).is_none());
        assert!(hierarchy.resolve(&addr("top.popups[0].frames[1]")).is_none());
    }
}

// =============================================================================
// TIER T1: HIERARCHY STRUCTURE
// =============================================================================

mod t1_hierarchy_structure {
    use super::*;

    /// T1.1: Re-upserting a node keeps its children reachable.
    #[test]
    fn merge_preserves_children() {
        let mut hierarchy = Hierarchy::new();
        hierarchy.upsert(&addr("top"), FrameUpdate::with_href("https://a/"));
        let child = hierarchy.upsert(&addr("top.frames[0]"), FrameUpdate::with_href("https://b/"));
        let root = hierarchy.upsert(&addr("top"), FrameUpdate::with_href("https://a2/"));

        assert_eq!(hierarchy.top(), Some(root));
        assert_eq!(hierarchy.resolve(&addr("top.frames[0]")), Some(child));
        assert_eq!(
            hierarchy.get(&addr("top")).and_then(|f| f.href.as_deref()),
            Some("https://a2/")
        );
    }

    /// T1.2: A deep upsert on an empty tree creates exactly the missing chain.
    #[test]
    fn lazy_ancestor_creation() {
        let mut hierarchy = Hierarchy::new();
        let leaf = hierarchy.upsert(
            &addr("top.frames[0].frames[1]"),
            FrameUpdate::with_href("https://leaf/"),
        );

        assert_eq!(hierarchy.len(), 3);
        let top = hierarchy.top().expect("root");
        let middle = hierarchy.resolve(&addr("top.frames[0]")).expect("middle");

        let middle_frame = hierarchy.frame(middle).expect("middle frame");
        assert_eq!(middle_frame.href, None);
        assert_eq!(
            middle_frame.relation(),
            Relation::Container { parent: top, slot: 0 }
        );
        assert_eq!(
            hierarchy.frame(leaf).map(|f| f.relation()),
            Some(Relation::Container { parent: middle, slot: 1 })
        );
    }

    /// T1.3: Canonical addresses resolve back to the same node.
    #[test]
    fn address_round_trip() {
        let mut hierarchy = Hierarchy::new();
        for raw in [
            "top.frames[0].frames[2]",
            "top.popups[1].popups[0]",
            "top.frames[3].popups[0].frames[1]",
        ] {
            hierarchy.upsert(&addr(raw), FrameUpdate::default());
        }

        for (address, id) in hierarchy.frames_in_order() {
            assert_eq!(hierarchy.canonical_address(id), Some(address.clone()));
            assert_eq!(hierarchy.resolve(&address), Some(id));
        }
    }

    /// T1.4: Removal cascades through iframes and popups.
    #[test]
    fn cascading_removal() {
        let mut hierarchy = Hierarchy::new();
        hierarchy.upsert(&addr("top.frames[0].popups[0]"), FrameUpdate::default());

        assert!(hierarchy.remove(&addr("top.frames[0]")));
        assert!(hierarchy.resolve(&addr("top.frames[0].popups[0]")).is_none());
        assert_eq!(hierarchy.len(), 1);

        assert!(hierarchy.remove(&addr("top")));
        assert!(hierarchy.resolve(&addr("top")).is_none());
        assert!(hierarchy.is_empty());
    }

    /// T1.5: Removing something that is not there is a reported no-op.
    #[test]
    fn unresolved_removal_is_recoverable() {
        let mut hierarchy = Hierarchy::new();
        assert!(!hierarchy.remove(&addr("top")));
        hierarchy.upsert(&addr("top"), FrameUpdate::default());
        assert!(!hierarchy.remove(&addr("top.frames[0].frames[0]")));
        assert!(!hierarchy.remove(&addr("top.frames[0]")));
        assert_eq!(hierarchy.len(), 1);
    }

    /// T1.6: Closed popups stay addressable but leave the rendering.
    #[test]
    fn closed_popup_filtering() {
        let mut hierarchy = Hierarchy::new();
        hierarchy.upsert(&addr("top.frames[0]"), FrameUpdate::default());
        hierarchy.upsert(&addr("top.popups[0]"), FrameUpdate::default());
        assert_eq!(hierarchy.render(), "top\n\t-> frames[0]\n\t-> popups[0]");

        assert!(hierarchy.mark_closed(&addr("top.popups[0]")));
        assert!(hierarchy.resolve(&addr("top.popups[0]")).is_some());
        assert_eq!(hierarchy.render(), "top\n\t-> frames[0]");
    }
}

// =============================================================================
// TIER T2: REPORT PROCESSING
// =============================================================================

mod t2_report_processing {
    use super::*;

    /// T2.1: Unknown kinds are recorded and change nothing else.
    #[test]
    fn unknown_kind_safety() {
        let mut ctx = context("t2");
        let disposition = ctx
            .process(report(1, "webrtcpeerconnection", json!({"hierarchy": "top"})))
            .expect("process");

        assert_eq!(disposition, Disposition::Unknown);
        assert_eq!(ctx.history().len(), 1);
        assert!(ctx.hierarchy().is_empty());
        assert_eq!(ctx.log().entry_count(), 0);
    }

    /// T2.2: Out-of-order document reports converge on the same tree.
    #[test]
    fn ordering_converges() {
        let init = |id, h: &str| {
            report(id, "documentinit", json!({"hierarchy": h, "href": format!("https://{h}/")}))
        };
        let interactive = |id| {
            report(
                id,
                "documentinteractive",
                json!({"hierarchy": "top.frames[0]", "href": "https://top.frames[0]/", "html": "<body/>"}),
            )
        };

        let mut in_order = context("a");
        for r in [init(1, "top"), init(2, "top.frames[0]"), interactive(3)] {
            in_order.process(r).expect("process");
        }

        let mut reversed = context("b");
        for r in [init(1, "top.frames[0]"), init(2, "top"), interactive(3)] {
            reversed.process(r).expect("process");
        }

        assert_eq!(in_order.hierarchy().snapshot(), reversed.hierarchy().snapshot());
    }

    /// T2.3: A malformed report is skipped without touching the tree.
    #[test]
    fn missing_field_skips_report() {
        let mut ctx = context("t2");
        ctx.process(report(1, "documentinit", json!({"hierarchy": "top", "href": "x"})))
            .expect("process");
        let before = ctx.hierarchy().snapshot();

        let disposition = ctx
            .process(report(2, "documentinteractive", json!({"hierarchy": "top.frames[0]", "href": "y"})))
            .expect("process");

        assert_eq!(disposition, Disposition::Skipped);
        assert_eq!(ctx.hierarchy().snapshot(), before);
        assert_eq!(ctx.history().len(), 2);
    }

    /// T2.4: Messaging is drawn as an edge between the two contexts.
    #[test]
    fn messaging_draws_edges() {
        let mut ctx = context("t2");
        ctx.process(report(
            1,
            "postmessagereceived",
            json!({"hierarchy": "top", "data": "token", "sourcehierarchy": "top.popups[0]"}),
        ))
        .expect("process");

        let diagram = ctx.log().to_plantuml();
        assert!(diagram.contains("\"top.popups[0]\" -> \"top\": Report: PostMessage Received"));
        assert!(diagram.contains("note right of \"top\" #LightGreen"));
    }
}

// =============================================================================
// TIER T3: FULL SESSION SCENARIOS
// =============================================================================

mod t3_session_scenarios {
    use super::*;

    /// Reports of a popup-based login: the relying party opens the identity
    /// provider in a popup which posts the result back and closes itself.
    fn popup_login() -> Vec<Report> {
        vec![
            report(1, "documentinit", json!({"hierarchy": "top", "href": "https://rp.example/"})),
            report(2, "documentinit", json!({"hierarchy": "top.frames[0]", "href": "https://ads.example/"})),
            report(3, "statement", json!({"key": "sdks", "val": ["google"]})),
            report(4, "windowopen", json!({"hierarchy": "top", "url": "https://idp.example/auth", "popupindex": 0})),
            report(5, "documentinit", json!({"hierarchy": "top.popups[0]", "href": "https://idp.example/auth"})),
            report(6, "httpredirect", json!({"hierarchy": "top.popups[0]", "href": "https://idp.example/auth", "location": "https://idp.example/login", "status": 302})),
            report(7, "documentcomplete", json!({"hierarchy": "top.popups[0]", "href": "https://idp.example/login", "html": "<form/>"})),
            report(8, "postmessagereceived", json!({"hierarchy": "top", "data": {"code": "abc"}, "origin": "https://idp.example", "sourcehierarchy": "top.popups[0]"})),
            report(9, "windowclose", json!({"hierarchy": "top.popups[0]"})),
            report(10, "serviceworkerregistered", json!({"hierarchy": "top"})),
        ]
    }

    #[test]
    fn popup_login_builds_expected_state() {
        let mut ctx = context("login");
        for r in popup_login() {
            ctx.process(r).expect("process");
        }

        assert_eq!(ctx.history().len(), 10);
        assert_eq!(ctx.hierarchy().render(), "top\n\t-> frames[0]");

        let popup = ctx.hierarchy().get(&addr("top.popups[0]")).expect("popup");
        assert!(popup.closed);
        assert_eq!(popup.href.as_deref(), Some("https://idp.example/login"));
        assert_eq!(popup.html.as_deref(), Some("<form/>"));

        assert_eq!(ctx.statements().get("sdks"), Some(&json!(["google"])));
        assert_eq!(ctx.statements().get("sessionId"), Some(&json!("login")));

        let metrics = ctx.metrics();
        assert_eq!(metrics.reports_received, 10);
        assert_eq!(metrics.reports_applied, 9);
        assert_eq!(metrics.reports_unknown, 1);

        let structure = ctx.hierarchy_metrics();
        assert_eq!(structure.frame_count, 3);
        assert_eq!(structure.closed_popups, 1);
    }

    /// T3.2: Frame and popup documents with a late interactive stage.
    #[test]
    fn frame_and_popup_documents_build_expected_state() {
        let mut ctx = context("documents");
        let reports = vec![
            report(1, "documentinit", json!({"hierarchy": "top", "href": "https://a.example/"})),
            report(2, "documentinit", json!({"hierarchy": "top.frames[0]", "href": "https://b.example/"})),
            report(3, "documentinit", json!({"hierarchy": "top.popups[0]", "href": "https://c.example/"})),
            report(4, "documentinteractive", json!({"hierarchy": "top.frames[0]", "href": "https://b.example/", "html": "<h1/>"})),
        ];
        for r in reports {
            assert_eq!(ctx.process(r).expect("process"), Disposition::Applied);
        }

        assert_eq!(ctx.history().len(), 4);
        assert_eq!(ctx.log().entry_count(), 4);

        let hierarchy = ctx.hierarchy();
        assert_eq!(
            hierarchy.get(&addr("top")).and_then(|f| f.href.as_deref()),
            Some("https://a.example/")
        );
        let frame = hierarchy.get(&addr("top.frames[0]")).expect("frame");
        assert_eq!(frame.href.as_deref(), Some("https://b.example/"));
        assert_eq!(frame.html.as_deref(), Some("<h1/>"));
        let popup = hierarchy.get(&addr("top.popups[0]")).expect("popup");
        assert_eq!(popup.href.as_deref(), Some("https://c.example/"));
        assert!(!popup.closed);
        assert_eq!(hierarchy.len(), 3);
    }

    /// T3.3: A popup whose document reported before the opener's
    /// `windowopen` is claimed by it instead of getting a second slot.
    #[test]
    fn late_window_open_claims_existing_popup() {
        let mut ctx = context("late-open");
        let reports = vec![
            report(1, "documentinit", json!({"hierarchy": "top", "href": "https://rp.example/"})),
            report(2, "documentinit", json!({"hierarchy": "top.popups[0]", "href": "https://idp.example/"})),
            report(3, "windowopen", json!({"hierarchy": "top", "url": "https://idp.example/"})),
        ];
        for r in reports {
            ctx.process(r).expect("process");
        }

        assert_eq!(ctx.hierarchy().len(), 2);
        assert!(ctx.hierarchy().resolve(&addr("top.popups[1]")).is_none());
        assert!(ctx
            .hierarchy()
            .get(&addr("top.popups[0]"))
            .is_some_and(|f| f.opened));
    }

    #[test]
    fn persisted_session_matches_in_memory_run() {
        let temp = tempfile::tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("sessions.redb")).expect("open db");
        let info = SessionInfo::new("login", 1_700_000_000_000);
        store.register_session(&info).expect("register");

        let registry = Arc::new(ProcessorRegistry::with_defaults());
        let mut persisted =
            ExecutionContext::with_log(info.clone(), Arc::clone(&registry), store.session_log("login"));
        let mut memory = ExecutionContext::new(info, registry);

        for r in popup_login() {
            memory.process(r.clone()).expect("process");
            persisted.process(r.clone()).expect("process");
            store
                .record("login", &r, persisted.statements(), persisted.hierarchy())
                .expect("record");
        }

        assert_eq!(
            store.render_diagram("login").expect("render"),
            memory.log().to_plantuml()
        );
        assert_eq!(store.reports("login").expect("reports").len(), 10);
        assert_eq!(
            store
                .load_hierarchy("login")
                .expect("load")
                .expect("saved")
                .snapshot(),
            memory.hierarchy().snapshot()
        );
        assert_eq!(&store.statements("login").expect("statements"), memory.statements());
    }
}
