// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print job errors.

use std::path::PathBuf;

use thiserror::Error;

use odie_core::human_errors::{HumanError, Severity};
use odie_document::PipelineError;

/// A print job failed. Nothing partial is left in the spool: the stream is
/// aborted before any of these is returned.
#[derive(Debug, Error)]
pub enum PrintError {
    #[error("could not open spool {target}: {source}")]
    SpoolOpen {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("spooler exited unsuccessfully ({status})")]
    SpoolExit { status: String },

    #[error("spool stream failed: {0}")]
    SpoolIo(#[source] std::io::Error),

    #[error("document {index} ({description}) could not be converted: {source}")]
    Document {
        index: usize,
        description: String,
        #[source]
        source: PipelineError,
    },

    #[error("{} is not a PDF", .0.display())]
    UnsupportedDocument(PathBuf),
}

impl PrintError {
    /// Labels of the conversion stages that failed, if any.
    pub fn failed_stages(&self) -> Vec<String> {
        match self {
            Self::Document { source, .. } => source.failed_stages(),
            _ => Vec::new(),
        }
    }

    /// Operator-facing description. Never includes paths or command lines.
    pub fn humanize(&self) -> HumanError {
        match self {
            Self::SpoolOpen { .. } => HumanError::new(
                "The printer queue is not reachable.",
                "Check that the print server is running and try again.",
                Severity::Transient,
            ),
            Self::SpoolExit { .. } | Self::SpoolIo(_) => HumanError::new(
                "The printer queue rejected the job.",
                "Try again. If it keeps failing, check the printer queue.",
                Severity::Transient,
            ),
            Self::Document { index, .. } => HumanError::new(
                format!("Document {} could not be prepared for printing.", index + 1),
                "The file may be damaged. Please tell an administrator.",
                Severity::ActionRequired,
            ),
            Self::UnsupportedDocument(_) => HumanError::new(
                "Only PDF documents can be printed.",
                "Remove the other documents from the order.",
                Severity::Permanent,
            ),
        }
    }
}
