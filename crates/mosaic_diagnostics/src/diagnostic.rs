//! Structured diagnostic messages with severity, codes, and subjects.

use crate::code::DiagnosticCode;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};

/// A structured diagnostic message.
///
/// Each diagnostic has a severity, a code, and a message. The optional
/// `subject` names the design object involved (a block, a cluster, a
/// quadrant); notes and help lines add context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The code identifying the kind of diagnostic.
    pub code: DiagnosticCode,
    /// The main diagnostic message.
    pub message: String,
    /// The design object this diagnostic is about, if any.
    pub subject: Option<String>,
    /// Explanatory footnotes.
    pub notes: Vec<String>,
    /// Actionable suggestions.
    pub help: Vec<String>,
}

impl Diagnostic {
    fn with_severity(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            subject: None,
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    /// Creates a new error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, code, message)
    }

    /// Creates a new warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, code, message)
    }

    /// Creates a new informational note.
    pub fn note(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Note, code, message)
    }

    /// Sets the design object this diagnostic is about.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Adds a note to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Adds a help message to this diagnostic.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Category;

    #[test]
    fn create_error() {
        let diag = Diagnostic::error(DiagnosticCode::new(Category::Error, 408), "empty net");
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.message, "empty net");
        assert_eq!(diag.code.to_string(), "E408");
        assert!(diag.subject.is_none());
    }

    #[test]
    fn create_note() {
        let diag = Diagnostic::note(DiagnosticCode::new(Category::Note, 401), "done");
        assert_eq!(diag.severity, Severity::Note);
    }

    #[test]
    fn builder_methods() {
        let diag = Diagnostic::warning(DiagnosticCode::new(Category::Warning, 402), "outline missed")
            .with_subject("cluster 3")
            .with_note("width exceeds the outline by 4.0")
            .with_help("increase max_whitespace");
        assert_eq!(diag.subject.as_deref(), Some("cluster 3"));
        assert_eq!(diag.notes.len(), 1);
        assert_eq!(diag.help.len(), 1);
    }
}
