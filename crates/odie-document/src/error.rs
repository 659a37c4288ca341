// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Error types for external tool pipelines.

use thiserror::Error;

use odie_barcode::EncodingError;
use odie_core::types::DocumentId;

/// One or more stages of a pipeline exited unsuccessfully.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("pipeline stage(s) failed: {}", .labels.join(", "))]
pub struct StageFailure {
    /// Labels of the failed stages, in registration order.
    pub labels: Vec<String>,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not start {label}: {source}")]
    Spawn {
        label: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Stages(#[from] StageFailure),

    #[error("pipeline I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The destination stopped accepting data. Stages that died because
    /// their output went away are not reported alongside it.
    #[error("writing pipeline output failed: {0}")]
    Output(#[source] std::io::Error),
}

impl PipelineError {
    /// Labels of the stages that failed or could not be started.
    pub fn failed_stages(&self) -> Vec<String> {
        match self {
            Self::Spawn { label, .. } => vec![label.clone()],
            Self::Stages(failure) => failure.labels.clone(),
            Self::Io(_) | Self::Output(_) => Vec::new(),
        }
    }
}

/// Stamping a barcode onto a stored document failed. The stored file is
/// unchanged whenever this is returned.
#[derive(Debug, Error)]
pub enum BakeError {
    #[error("cannot encode a barcode for document {document_id}: {source}")]
    Encoding {
        document_id: DocumentId,
        #[source]
        source: EncodingError,
    },

    #[error("stamping a barcode onto document {document_id} failed: {source}")]
    Pipeline {
        document_id: DocumentId,
        #[source]
        source: PipelineError,
    },
}

impl BakeError {
    pub fn failed_stages(&self) -> Vec<String> {
        match self {
            Self::Encoding { .. } => Vec::new(),
            Self::Pipeline { source, .. } => source.failed_stages(),
        }
    }
}
