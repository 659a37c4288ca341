// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Barcode namespace registry.
//
// A namespace is the fixed-width numeric prefix of a 13-digit barcode. The
// current scheme encodes archive document ids directly; the legacy schemes
// were printed by the previous archive and carry that archive's ids, which
// are only meaningful together with a document type (and sometimes subject).

use serde::{Deserialize, Serialize};

use crate::error::{OdieError, Result};

/// Total barcode length including the checksum digit.
pub const BARCODE_LEN: usize = 13;

/// How the id digits of a namespace map to archive documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NamespaceScheme {
    /// The id is the archive's own document id.
    Current,
    /// The id is a `legacy_id`, scoped by document type and optional subject.
    Legacy {
        document_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subject: Option<String>,
    },
}

/// One registered barcode family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub prefix: String,
    pub scheme: NamespaceScheme,
}

impl Namespace {
    pub fn current(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            scheme: NamespaceScheme::Current,
        }
    }

    pub fn legacy(
        prefix: impl Into<String>,
        document_type: impl Into<String>,
        subject: Option<&str>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            scheme: NamespaceScheme::Legacy {
                document_type: document_type.into(),
                subject: subject.map(str::to_owned),
            },
        }
    }

    pub fn width(&self) -> usize {
        self.prefix.len()
    }

    /// Number of digits left for the document id.
    pub fn id_digits(&self) -> usize {
        BARCODE_LEN - 1 - self.width()
    }
}

/// The set of namespaces a codec or scanner session recognises.
///
/// Invariants (checked on construction and deserialization): at least one
/// namespace, all prefixes numeric, unique and of equal width, and at least
/// one id digit left.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Namespace>", into = "Vec<Namespace>")]
pub struct NamespaceTable {
    entries: Vec<Namespace>,
}

impl NamespaceTable {
    pub fn new(entries: Vec<Namespace>) -> Result<Self> {
        let Some(first) = entries.first() else {
            return Err(OdieError::Namespace("no namespaces registered".into()));
        };
        let width = first.width();
        if width == 0 || width >= BARCODE_LEN - 1 {
            return Err(OdieError::Namespace(format!(
                "prefix width {width} leaves no room for a document id"
            )));
        }
        for (i, ns) in entries.iter().enumerate() {
            if !ns.prefix.bytes().all(|b| b.is_ascii_digit()) {
                return Err(OdieError::Namespace(format!(
                    "prefix {:?} is not numeric",
                    ns.prefix
                )));
            }
            if ns.width() != width {
                return Err(OdieError::Namespace(format!(
                    "prefix {:?} has width {}, expected {width}",
                    ns.prefix,
                    ns.width()
                )));
            }
            if entries[..i].iter().any(|other| other.prefix == ns.prefix) {
                return Err(OdieError::Namespace(format!(
                    "prefix {:?} registered twice",
                    ns.prefix
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Common prefix width of every registered namespace.
    pub fn width(&self) -> usize {
        self.entries[0].width()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Namespace> {
        self.entries.iter()
    }

    pub fn get(&self, prefix: &str) -> Option<&Namespace> {
        self.entries.iter().find(|ns| ns.prefix == prefix)
    }

    /// The namespace new barcodes are printed in.
    pub fn current(&self) -> Option<&Namespace> {
        self.entries
            .iter()
            .find(|ns| ns.scheme == NamespaceScheme::Current)
    }
}

impl Default for NamespaceTable {
    /// The archive's namespaces: the current scheme plus the three families
    /// printed by the previous archive.
    fn default() -> Self {
        Self {
            entries: vec![
                Namespace::current("22141"),
                Namespace::legacy("22140", "oral", None),
                Namespace::legacy("22150", "written", Some("computer science")),
                Namespace::legacy("22160", "written", Some("mathematics")),
            ],
        }
    }
}

impl TryFrom<Vec<Namespace>> for NamespaceTable {
    type Error = OdieError;

    fn try_from(entries: Vec<Namespace>) -> Result<Self> {
        Self::new(entries)
    }
}

impl From<NamespaceTable> for Vec<Namespace> {
    fn from(table: NamespaceTable) -> Self {
        table.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_valid() {
        let table = NamespaceTable::default();
        let rebuilt = NamespaceTable::new(table.iter().cloned().collect()).expect("valid");
        assert_eq!(rebuilt.width(), 5);
        assert_eq!(rebuilt.current().map(|ns| ns.prefix.as_str()), Some("22141"));
    }

    #[test]
    fn rejects_unequal_widths() {
        let result = NamespaceTable::new(vec![
            Namespace::current("22141"),
            Namespace::legacy("2215", "written", None),
        ]);
        assert!(matches!(result, Err(OdieError::Namespace(_))));
    }

    #[test]
    fn rejects_duplicates_and_non_digits() {
        assert!(NamespaceTable::new(vec![Namespace::current("22141"), Namespace::current("22141")]).is_err());
        assert!(NamespaceTable::new(vec![Namespace::current("22a41")]).is_err());
        assert!(NamespaceTable::new(Vec::new()).is_err());
    }

    #[test]
    fn legacy_subjects_are_distinct() {
        let table = NamespaceTable::default();
        let cs = table.get("22150").expect("registered");
        let math = table.get("22160").expect("registered");
        assert_ne!(cs.scheme, math.scheme);
    }

    #[test]
    fn deserialization_enforces_invariants() {
        let json = r#"[{"prefix":"22141","scheme":{"kind":"current"}},{"prefix":"221","scheme":{"kind":"current"}}]"#;
        let parsed: std::result::Result<NamespaceTable, _> = serde_json::from_str(json);
        assert!(parsed.is_err());

        let json = r#"[{"prefix":"22141","scheme":{"kind":"current"}},{"prefix":"22140","scheme":{"kind":"legacy","document_type":"oral"}}]"#;
        let parsed: NamespaceTable = serde_json::from_str(json).expect("valid table");
        assert_eq!(parsed.iter().count(), 2);
    }
}
