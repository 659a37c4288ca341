// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Odie document pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a document in the external archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub u64);

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DocumentId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// The view of an archived document this pipeline needs.
///
/// Owned by the external document store. The pipeline reads it and, when
/// stamping barcodes, replaces the bytes of the stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: DocumentId,
    pub has_stored_file: bool,
    pub page_count: u32,
    /// Documents imported from the previous archive carry a pre-printed barcode.
    pub has_legacy_barcode: bool,
}

impl DocumentRef {
    pub fn new(id: impl Into<DocumentId>, page_count: u32) -> Self {
        Self {
            id: id.into(),
            has_stored_file: true,
            page_count,
            has_legacy_barcode: false,
        }
    }
}

/// Unique identifier for one spool submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the PDF bytes of a print document come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfSource {
    /// A stored file. Only file sources can have a precomputed PCL5 cache.
    Path(PathBuf),
    /// PDF bytes already in memory (e.g. a freshly rendered cover page).
    Bytes(Vec<u8>),
}

impl PdfSource {
    pub fn describe(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Bytes(bytes) => format!("<{} bytes in memory>", bytes.len()),
        }
    }
}

/// Paper sizes the printer accepts through `@PJL SET PAPER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
}

impl PaperSize {
    /// PJL `PAPER` keyword.
    pub fn pjl_keyword(&self) -> &'static str {
        match self {
            Self::A4 => "A4",
        }
    }
}

/// Input trays of the archive printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tray {
    Tray1,
    Tray2,
}

impl Tray {
    /// PJL `TRAY` keyword.
    pub fn pjl_keyword(&self) -> &'static str {
        match self {
            Self::Tray1 => "TRAY1",
            Self::Tray2 => "TRAY2",
        }
    }
}

/// Media loaded in a tray.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    Plain,
    /// Coloured paper used for cover pages.
    UserColor1,
}

impl MediaType {
    /// PJL `MEDIATYPE` keyword.
    pub fn pjl_keyword(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::UserColor1 => "USERCOLOR1",
        }
    }
}

/// Device settings asserted in the PJL envelope around one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintSettings {
    /// Accounting code the printer charges the pages to.
    pub usercode: String,
    pub tray: Tray,
    pub media_type: MediaType,
    pub staple: bool,
    /// Duplex with long-edge binding when set, simplex otherwise.
    pub duplex: bool,
    pub paper: PaperSize,
}

impl PrintSettings {
    /// Settings for regular exam documents: plain paper, stapled, duplex.
    pub fn regular(usercode: impl Into<String>) -> Self {
        Self {
            usercode: usercode.into(),
            tray: Tray::Tray1,
            media_type: MediaType::Plain,
            staple: true,
            duplex: true,
            paper: PaperSize::A4,
        }
    }

    /// Settings for cover pages: coloured paper from the second tray, no staple.
    pub fn cover(usercode: impl Into<String>) -> Self {
        Self {
            usercode: usercode.into(),
            tray: Tray::Tray2,
            media_type: MediaType::UserColor1,
            staple: false,
            duplex: true,
            paper: PaperSize::A4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_and_cover_settings_differ_in_tray_and_media() {
        let regular = PrintSettings::regular("2222");
        let cover = PrintSettings::cover("2223");
        assert_eq!(regular.tray.pjl_keyword(), "TRAY1");
        assert_eq!(cover.tray.pjl_keyword(), "TRAY2");
        assert_eq!(regular.media_type.pjl_keyword(), "PLAIN");
        assert_eq!(cover.media_type.pjl_keyword(), "USERCOLOR1");
        assert!(regular.staple);
        assert!(!cover.staple);
    }

    #[test]
    fn new_document_ref_has_file_and_no_legacy_barcode() {
        let doc = DocumentRef::new(42, 3);
        assert_eq!(doc.id, DocumentId(42));
        assert!(doc.has_stored_file);
        assert!(!doc.has_legacy_barcode);
    }
}
