//! Document lifecycle reports.
//!
//! The agent runs before any page script, so `documentinit` catches a
//! context before any JS redirect happens. Later stages re-observe the same
//! address with progressively richer data (the HTML snapshot becomes
//! available once the DOM is interactive).

use super::{ContextState, Fields, Processor, note_for};
use crate::diagram::LogEntry;
use crate::hierarchy::FrameUpdate;
use crate::primitives::{DEFAULT_WRAP_WIDTH, HTML_WRAP_WIDTH};
use crate::{DistinctError, Report};

/// Stage of a document's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStage {
    Init,
    Loading,
    Interactive,
    Complete,
    BeforeUnload,
}

/// How a stage treats the HTML snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Html {
    Absent,
    Optional,
    Required,
}

impl DocumentStage {
    pub const ALL: [DocumentStage; 5] = [
        DocumentStage::Init,
        DocumentStage::Loading,
        DocumentStage::Interactive,
        DocumentStage::Complete,
        DocumentStage::BeforeUnload,
    ];

    #[must_use]
    pub const fn discriminators(self) -> &'static [&'static str] {
        match self {
            DocumentStage::Init => &["documentinit", "init"],
            DocumentStage::Loading => &["documentloading", "loading"],
            DocumentStage::Interactive => &["documentinteractive", "interactive"],
            DocumentStage::Complete => &["documentcomplete", "complete"],
            DocumentStage::BeforeUnload => &["documentbeforeunload", "beforeunload"],
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            DocumentStage::Init => "Document Init",
            DocumentStage::Loading => "Document Loading",
            DocumentStage::Interactive => "Document Interactive",
            DocumentStage::Complete => "Document Complete",
            DocumentStage::BeforeUnload => "Document Before Unload",
        }
    }

    const fn html(self) -> Html {
        match self {
            DocumentStage::Init | DocumentStage::Loading => Html::Absent,
            DocumentStage::Interactive | DocumentStage::Complete => Html::Required,
            DocumentStage::BeforeUnload => Html::Optional,
        }
    }
}

/// Upserts the reporting context and records its URL (and HTML).
#[derive(Debug, Clone, Copy)]
pub struct DocumentProcessor {
    stage: DocumentStage,
}

impl DocumentProcessor {
    #[must_use]
    pub const fn new(stage: DocumentStage) -> Self {
        Self { stage }
    }
}

impl Processor for DocumentProcessor {
    fn discriminators(&self) -> &'static [&'static str] {
        self.stage.discriminators()
    }

    fn apply(
        &self,
        state: &mut ContextState,
        report: &Report,
    ) -> Result<Vec<LogEntry>, DistinctError> {
        let fields = Fields::new(report);
        let address = fields.hierarchy()?;
        let href = fields.required_str("href")?.to_string();
        let html = match self.stage.html() {
            Html::Absent => None,
            Html::Optional => fields.optional_text("html"),
            Html::Required => Some(fields.required_text("html")?),
        };

        let mut note = note_for(&address, report, self.stage.label()).field("URL", href.clone());
        if let Some(html) = &html {
            note = note.field("HTML", html.clone()).wrap(HTML_WRAP_WIDTH);
        } else {
            note = note.wrap(DEFAULT_WRAP_WIDTH);
        }

        state
            .hierarchy
            .upsert(&address, FrameUpdate { href: Some(href), html });

        Ok(vec![note.into()])
    }
}
