//! Window lifecycle reports: `window.open` and `window.close`.
//!
//! `windowopen` is reported by the opener; the popup's own document reports
//! may already have created the popup node, in which case only the opener
//! relation is recorded.

use super::{ContextState, Fields, Processor, WINDOW_COLOR, note_for};
use crate::address::{Address, Step};
use crate::diagram::{Arrow, LogEntry};
use crate::hierarchy::FrameUpdate;
use crate::{DistinctError, Report};

/// Handles `windowopen`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowOpenProcessor;

impl Processor for WindowOpenProcessor {
    fn discriminators(&self) -> &'static [&'static str] {
        &["windowopen"]
    }

    fn apply(
        &self,
        state: &mut ContextState,
        report: &Report,
    ) -> Result<Vec<LogEntry>, DistinctError> {
        let fields = Fields::new(report);
        let opener = fields.hierarchy()?;
        let url = fields.optional_text("url");
        let target = fields.optional_text("target");
        let features = fields.optional_text("features");
        let index = fields.optional_index("popupindex")?;

        let slot = match index {
            Some(slot) => slot,
            None => unclaimed_popup_slot(state, &opener),
        };
        let popup = opener.child(Step::popup(slot));

        if state.hierarchy.resolve(&popup).is_some() {
            state.hierarchy.ensure(&popup);
        } else {
            state.hierarchy.upsert(
                &popup,
                FrameUpdate {
                    href: url.clone(),
                    html: None,
                },
            );
        }
        state.hierarchy.mark_opened(&popup);

        let mut note = note_for(&opener, report, "Window Open").color(Some(WINDOW_COLOR));
        if let Some(url) = url {
            note = note.field("URL", url);
        }
        if let Some(target) = target {
            note = note.field("Target", target);
        }
        if let Some(features) = features {
            note = note.field("Features", features);
        }
        note = note.field("Popup", popup.to_string());

        Ok(vec![
            note.into(),
            Arrow::new(opener.to_string(), popup.to_string(), "Window Open").into(),
        ])
    }
}

/// Slot for a `windowopen` that carries no index: the first popup of the
/// opener that reported before its own `windowopen`, else the slot after the
/// highest one.
fn unclaimed_popup_slot(state: &ContextState, opener: &Address) -> u32 {
    let Some(frame) = state.hierarchy.get(opener) else {
        return 0;
    };
    let unclaimed = frame.popups().iter().find_map(|(&slot, &id)| {
        state
            .hierarchy
            .frame(id)
            .is_some_and(|popup| !popup.opened)
            .then_some(slot)
    });
    unclaimed.unwrap_or_else(|| {
        frame
            .popups()
            .keys()
            .next_back()
            .map_or(0, |last| last.saturating_add(1))
    })
}

/// Handles `windowclose`, reported by the window being closed.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowCloseProcessor;

impl Processor for WindowCloseProcessor {
    fn discriminators(&self) -> &'static [&'static str] {
        &["windowclose"]
    }

    fn apply(
        &self,
        state: &mut ContextState,
        report: &Report,
    ) -> Result<Vec<LogEntry>, DistinctError> {
        let fields = Fields::new(report);
        let address = fields.hierarchy()?;

        state.hierarchy.mark_closed(&address);

        let note = note_for(&address, report, "Window Close").color(Some(WINDOW_COLOR));
        Ok(vec![note.into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::test_support::report;
    use serde_json::json;

    fn addr(s: &str) -> Address {
        Address::parse(s).expect("address")
    }

    #[test]
    fn open_creates_popup_and_links_opener() {
        let mut state = ContextState::default();
        let entries = WindowOpenProcessor
            .apply(
                &mut state,
                &report(
                    "windowopen",
                    json!({"hierarchy": "top", "url": "https://idp/", "popupindex": 0}),
                ),
            )
            .expect("apply");

        let popup = state.hierarchy.get(&addr("top.popups[0]")).expect("popup");
        assert_eq!(popup.href.as_deref(), Some("https://idp/"));
        assert!(!popup.closed);
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[1],
            LogEntry::Arrow(Arrow::new("top", "top.popups[0]", "Window Open"))
        );
    }

    #[test]
    fn open_without_index_uses_next_slot() {
        let mut state = ContextState::default();
        for _ in 0..2 {
            WindowOpenProcessor
                .apply(&mut state, &report("windowopen", json!({"hierarchy": "top"})))
                .expect("apply");
        }
        assert!(state.hierarchy.resolve(&addr("top.popups[0]")).is_some());
        assert!(state.hierarchy.resolve(&addr("top.popups[1]")).is_some());
    }

    #[test]
    fn open_without_index_claims_popup_that_reported_first() {
        let mut state = ContextState::default();
        state
            .hierarchy
            .upsert(&addr("top"), FrameUpdate::with_href("https://rp/"));
        state
            .hierarchy
            .upsert(&addr("top.popups[0]"), FrameUpdate::with_href("https://idp/"));

        let entries = WindowOpenProcessor
            .apply(&mut state, &report("windowopen", json!({"hierarchy": "top"})))
            .expect("apply");

        assert_eq!(state.hierarchy.len(), 2);
        assert!(state
            .hierarchy
            .get(&addr("top.popups[0]"))
            .is_some_and(|f| f.opened));
        assert_eq!(
            entries[1],
            LogEntry::Arrow(Arrow::new("top", "top.popups[0]", "Window Open"))
        );

        // The slot is claimed now, so the next open allocates a new one.
        WindowOpenProcessor
            .apply(&mut state, &report("windowopen", json!({"hierarchy": "top"})))
            .expect("apply");
        assert_eq!(state.hierarchy.len(), 3);
        assert!(state.hierarchy.resolve(&addr("top.popups[1]")).is_some());
    }

    #[test]
    fn open_keeps_href_reported_by_popup_itself() {
        let mut state = ContextState::default();
        state
            .hierarchy
            .upsert(&addr("top.popups[0]"), FrameUpdate::with_href("https://idp/login"));

        WindowOpenProcessor
            .apply(
                &mut state,
                &report(
                    "windowopen",
                    json!({"hierarchy": "top", "url": "https://idp/", "popupindex": 0}),
                ),
            )
            .expect("apply");

        assert_eq!(
            state
                .hierarchy
                .get(&addr("top.popups[0]"))
                .and_then(|f| f.href.as_deref()),
            Some("https://idp/login")
        );
    }

    #[test]
    fn close_marks_popup_closed() {
        let mut state = ContextState::default();
        state
            .hierarchy
            .upsert(&addr("top.popups[0]"), FrameUpdate::default());

        WindowCloseProcessor
            .apply(
                &mut state,
                &report("windowclose", json!({"hierarchy": "top.popups[0]"})),
            )
            .expect("apply");

        assert!(state
            .hierarchy
            .get(&addr("top.popups[0]"))
            .is_some_and(|f| f.closed));
        assert_eq!(state.hierarchy.render(), "top");
    }

    #[test]
    fn close_of_unknown_window_still_annotates() {
        let mut state = ContextState::default();
        let entries = WindowCloseProcessor
            .apply(
                &mut state,
                &report("windowclose", json!({"hierarchy": "top.popups[4]"})),
            )
            .expect("apply");
        assert_eq!(entries.len(), 1);
        assert!(state.hierarchy.is_empty());
    }
}
