// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared error type for configuration, storage and PDF inspection.
//
// Pipeline-specific failures (stage exits, bake and print failures, scanner
// protocol violations) have their own typed errors in the crates that produce
// them; they wrap `OdieError` where they touch the shared concerns.

use thiserror::Error;

/// Error type for the concerns shared by every Odie crate.
#[derive(Debug, Error)]
pub enum OdieError {
    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid barcode namespace table: {0}")]
    Namespace(String),

    // -- Documents --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, OdieError>;
