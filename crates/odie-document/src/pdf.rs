// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF inspection with `lopdf`.

use std::path::Path;

use lopdf::Document;
use tracing::{debug, instrument};

use odie_core::error::{OdieError, Result};

/// Number of pages in the PDF at `path`.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn page_count(path: &Path) -> Result<u32> {
    let document = Document::load(path).map_err(|err| {
        OdieError::PdfError(format!("failed to open {}: {}", path.display(), err))
    })?;
    let pages = document.get_pages().len() as u32;
    debug!(pages, "PDF loaded");
    Ok(pages)
}

/// Number of pages in PDF bytes already in memory.
pub fn page_count_of(bytes: &[u8]) -> Result<u32> {
    let document = Document::load_mem(bytes)
        .map_err(|err| OdieError::PdfError(format!("failed to load PDF from memory: {err}")))?;
    Ok(document.get_pages().len() as u32)
}
