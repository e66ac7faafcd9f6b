//! Navigation reports: redirects, form submissions, meta refreshes and
//! scripted location changes.
//!
//! Navigations never change the hierarchy themselves; the navigated
//! context reports its new document through the document lifecycle.

use super::{ContextState, FieldSpec, Fields, NAVIGATION_COLOR, Processor, note_for};
use crate::diagram::LogEntry;
use crate::{DistinctError, Report};

/// Kind of navigation observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    HttpRedirect,
    FormSubmit,
    MetaRedirect,
    MetaReload,
    RefreshRedirect,
    RefreshReload,
    LocationSet,
}

const HTTP_REDIRECT: &[FieldSpec] = &[
    FieldSpec::req("href", "URL"),
    FieldSpec::req("location", "Location"),
    FieldSpec::opt("status", "Status"),
];

const FORM_SUBMIT: &[FieldSpec] = &[
    FieldSpec::req("href", "URL"),
    FieldSpec::req("action", "Action"),
    FieldSpec::opt("method", "Method"),
    FieldSpec::opt("formdata", "Form Data"),
];

const REDIRECT: &[FieldSpec] = &[
    FieldSpec::req("href", "URL"),
    FieldSpec::req("url", "Target"),
    FieldSpec::opt("content", "Content"),
];

const RELOAD: &[FieldSpec] = &[
    FieldSpec::req("href", "URL"),
    FieldSpec::opt("content", "Content"),
];

const LOCATION_SET: &[FieldSpec] = &[
    FieldSpec::req("href", "URL"),
    FieldSpec::req("url", "Target"),
    FieldSpec::opt("prop", "Property"),
];

impl Navigation {
    pub const ALL: [Navigation; 7] = [
        Navigation::HttpRedirect,
        Navigation::FormSubmit,
        Navigation::MetaRedirect,
        Navigation::MetaReload,
        Navigation::RefreshRedirect,
        Navigation::RefreshReload,
        Navigation::LocationSet,
    ];

    #[must_use]
    pub const fn discriminators(self) -> &'static [&'static str] {
        match self {
            Navigation::HttpRedirect => &["httpredirect"],
            Navigation::FormSubmit => &["formsubmit"],
            Navigation::MetaRedirect => &["metaredirect"],
            Navigation::MetaReload => &["metareload"],
            Navigation::RefreshRedirect => &["refreshredirect"],
            Navigation::RefreshReload => &["refreshreload"],
            Navigation::LocationSet => &["locationset"],
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Navigation::HttpRedirect => "HTTP Redirect",
            Navigation::FormSubmit => "Form Submit",
            Navigation::MetaRedirect => "Meta Redirect",
            Navigation::MetaReload => "Meta Reload",
            Navigation::RefreshRedirect => "Refresh Redirect",
            Navigation::RefreshReload => "Refresh Reload",
            Navigation::LocationSet => "Location Set",
        }
    }

    const fn fields(self) -> &'static [FieldSpec] {
        match self {
            Navigation::HttpRedirect => HTTP_REDIRECT,
            Navigation::FormSubmit => FORM_SUBMIT,
            Navigation::MetaRedirect | Navigation::RefreshRedirect => REDIRECT,
            Navigation::MetaReload | Navigation::RefreshReload => RELOAD,
            Navigation::LocationSet => LOCATION_SET,
        }
    }
}

/// Annotates the navigating context.
#[derive(Debug, Clone, Copy)]
pub struct NavigationProcessor {
    kind: Navigation,
}

impl NavigationProcessor {
    #[must_use]
    pub const fn new(kind: Navigation) -> Self {
        Self { kind }
    }
}

impl Processor for NavigationProcessor {
    fn discriminators(&self) -> &'static [&'static str] {
        self.kind.discriminators()
    }

    fn apply(
        &self,
        _state: &mut ContextState,
        report: &Report,
    ) -> Result<Vec<LogEntry>, DistinctError> {
        let fields = Fields::new(report);
        let address = fields.hierarchy()?;
        let values = fields.collect(self.kind.fields())?;

        let note = note_for(&address, report, self.kind.label())
            .color(Some(NAVIGATION_COLOR))
            .fields(values);
        Ok(vec![note.into()])
    }
}
