//! # Behavior Log
//!
//! The append-only, human-renderable record of what a session did.
//!
//! Processors never write to the log themselves; they return [`LogEntry`]
//! intents and the execution context appends them in order through a
//! [`BehaviorLog`]. Two implementations exist: the in-memory
//! [`SequenceDiagram`] below and the redb-backed session log in
//! [`crate::storage`]. Both render entries as PlantUML sequence-diagram
//! statements.

use crate::primitives::{DEFAULT_WRAP_WIDTH, DIAGRAM_END, DIAGRAM_START};
use crate::{DistinctError, ReportId};
use serde_json::Number;

// =============================================================================
// LOG ENTRIES
// =============================================================================

/// A note attached to one participant (a structural address).
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub participant: String,
    pub report_id: ReportId,
    pub timestamp: Number,
    pub label: &'static str,
    /// Ordered key/value record of the relevant report fields.
    pub fields: Vec<(String, String)>,
    pub wrap_width: usize,
    pub color: Option<&'static str>,
}

impl Note {
    /// Create a note with the default wrap width and no color.
    #[must_use]
    pub fn new(
        participant: impl Into<String>,
        report_id: ReportId,
        timestamp: Number,
        label: &'static str,
    ) -> Self {
        Self {
            participant: participant.into(),
            report_id,
            timestamp,
            label,
            fields: Vec::new(),
            wrap_width: DEFAULT_WRAP_WIDTH,
            color: None,
        }
    }

    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn fields(mut self, fields: impl IntoIterator<Item = (String, String)>) -> Self {
        self.fields.extend(fields);
        self
    }

    #[must_use]
    pub fn wrap(mut self, width: usize) -> Self {
        self.wrap_width = width;
        self
    }

    #[must_use]
    pub fn color(mut self, color: Option<&'static str>) -> Self {
        self.color = color;
        self
    }

    /// PlantUML statement for this note.
    #[must_use]
    pub fn render(&self) -> String {
        let color = self
            .color
            .map(|c| format!(" #{}", c))
            .unwrap_or_default();
        let mut out = format!(
            "participant \"{p}\"\nnote right of \"{p}\"{color}\n<code>\nID: {id}\nTimestamp: {ts}\nReport: {label}\n",
            p = self.participant,
            color = color,
            id = self.report_id,
            ts = self.timestamp,
            label = self.label,
        );
        for (key, value) in &self.fields {
            out.push_str(&format!("{}: {}\n", key, linebreaks(value, self.wrap_width)));
        }
        out.push_str("</code>\nend note");
        out
    }
}

/// A directed edge between two participants, e.g. a message sender and its
/// receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arrow {
    pub source: String,
    pub target: String,
    pub label: &'static str,
}

impl Arrow {
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>, label: &'static str) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label,
        }
    }

    /// PlantUML statement for this arrow.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "participant \"{s}\"\nparticipant \"{t}\"\n\"{s}\" -> \"{t}\": Report: {label}",
            s = self.source,
            t = self.target,
            label = self.label,
        )
    }
}

/// An append intent returned by a processor.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    Note(Note),
    Arrow(Arrow),
}

impl LogEntry {
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            LogEntry::Note(note) => note.render(),
            LogEntry::Arrow(arrow) => arrow.render(),
        }
    }
}

impl From<Note> for LogEntry {
    fn from(note: Note) -> Self {
        LogEntry::Note(note)
    }
}

impl From<Arrow> for LogEntry {
    fn from(arrow: Arrow) -> Self {
        LogEntry::Arrow(arrow)
    }
}

// =============================================================================
// BEHAVIOR LOG TRAIT
// =============================================================================

/// Append-only sink for behavior annotations, scoped to one session.
///
/// Each call is one atomic append. An `Err` means the session can no longer
/// be recorded durably.
pub trait BehaviorLog {
    /// Append a note.
    fn annotate(&mut self, note: &Note) -> Result<(), DistinctError>;

    /// Append a directed edge.
    fn link(&mut self, arrow: &Arrow) -> Result<(), DistinctError>;

    /// Append any entry.
    fn append(&mut self, entry: &LogEntry) -> Result<(), DistinctError> {
        match entry {
            LogEntry::Note(note) => self.annotate(note),
            LogEntry::Arrow(arrow) => self.link(arrow),
        }
    }
}

// =============================================================================
// IN-MEMORY SEQUENCE DIAGRAM
// =============================================================================

/// PlantUML sequence diagram kept in memory.
#[derive(Debug, Clone)]
pub struct SequenceDiagram {
    lines: Vec<String>,
}

impl Default for SequenceDiagram {
    fn default() -> Self {
        Self {
            lines: vec![DIAGRAM_START.to_string()],
        }
    }
}

impl SequenceDiagram {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Statements appended so far, starting with `@startuml`.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of entries appended (the opening delimiter excluded).
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.lines.len().saturating_sub(1)
    }

    /// Full diagram source including the closing delimiter.
    #[must_use]
    pub fn to_plantuml(&self) -> String {
        render_diagram(&self.lines)
    }
}

impl BehaviorLog for SequenceDiagram {
    fn annotate(&mut self, note: &Note) -> Result<(), DistinctError> {
        self.lines.push(note.render());
        Ok(())
    }

    fn link(&mut self, arrow: &Arrow) -> Result<(), DistinctError> {
        self.lines.push(arrow.render());
        Ok(())
    }
}

/// Join diagram statements and close the diagram.
#[must_use]
pub fn render_diagram(lines: &[String]) -> String {
    let mut out = lines.join("\n");
    out.push_str("\n\n");
    out.push_str(DIAGRAM_END);
    out
}

/// Cut every line of `input` after `every` characters.
///
/// PlantUML treats lines beginning with `'` or `/'` as comments, so such
/// chunks get a leading space.
#[must_use]
pub fn linebreaks(input: &str, every: usize) -> String {
    let every = every.max(1);
    let mut out: Vec<String> = Vec::new();

    for line in input.lines() {
        let chars: Vec<char> = line.chars().collect();
        for chunk in chars.chunks(every) {
            let chunk: String = chunk.iter().collect();
            if chunk.starts_with('\'') || chunk.starts_with("/'") {
                out.push(format!(" {}", chunk));
            } else {
                out.push(chunk);
            }
        }
    }

    out.join("\n")
}

// =============================================================================
// TESTS
// =============================================================================
