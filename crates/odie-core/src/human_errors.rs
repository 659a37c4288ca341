// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Messages that are safe to show to the people at the counter.
//
// Internal errors carry paths, command lines and stage labels. Anything that
// crosses into the archive's web frontend goes through a `HumanError` instead,
// which only ever contains fixed wording plus an optional short hint.

use crate::error::OdieError;

/// Severity of an error from the operator's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Trying again will probably work.
    Transient,
    /// Someone has to do something first (refill paper, fix the config).
    ActionRequired,
    /// Retrying will not help.
    Permanent,
}

/// A plain-language error with a suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HumanError {
    /// Short summary, shown as a heading.
    pub message: String,
    /// What to try next.
    pub suggestion: String,
    pub retriable: bool,
    pub severity: Severity,
}

impl HumanError {
    pub fn new(
        message: impl Into<String>,
        suggestion: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            retriable: severity == Severity::Transient,
            severity,
        }
    }
}

impl std::fmt::Display for HumanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.message, self.suggestion)
    }
}

/// Convert an `OdieError` into a message that leaks no internals.
pub fn humanize_error(err: &OdieError) -> HumanError {
    match err {
        OdieError::Config(_) | OdieError::Namespace(_) => HumanError::new(
            "The print service is misconfigured.",
            "Please tell an administrator.",
            Severity::ActionRequired,
        ),
        OdieError::PdfError(_) => HumanError::new(
            "One of the documents could not be read.",
            "The file may be damaged. Please upload it again.",
            Severity::Permanent,
        ),
        OdieError::Io(io) => match io.kind() {
            std::io::ErrorKind::NotFound => HumanError::new(
                "A document file is missing.",
                "Please tell an administrator.",
                Severity::ActionRequired,
            ),
            _ => HumanError::new(
                "Something went wrong while reading the documents.",
                "Please try again in a moment.",
                Severity::Transient,
            ),
        },
        OdieError::Serialization(_) => HumanError::new(
            "The print service is misconfigured.",
            "Please tell an administrator.",
            Severity::ActionRequired,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_do_not_contain_internal_detail() {
        let err = OdieError::PdfError("/srv/documents/17.pdf: bad xref".into());
        let human = humanize_error(&err);
        assert!(!human.message.contains("/srv"));
        assert!(!human.suggestion.contains("xref"));
        assert_eq!(human.severity, Severity::Permanent);
        assert!(!human.retriable);
    }

    #[test]
    fn transient_io_is_retriable() {
        let err = OdieError::Io(std::io::Error::new(
            std::io::ErrorKind::Interrupted,
            "interrupted",
        ));
        assert!(humanize_error(&err).retriable);
    }
}
