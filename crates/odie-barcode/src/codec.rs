// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// EAN-13 style barcode codec.
//
// Layout: namespace prefix + zero-padded document id + one checksum digit.
// The checksum weights the digits 1, 3, 1, 3, ... from the left so that the
// weighted sum over all 13 digits is a multiple of ten.

use std::sync::Arc;

use odie_core::namespace::{BARCODE_LEN, Namespace, NamespaceTable};

use crate::error::EncodingError;

/// A validated 13-digit barcode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Barcode(String);

impl Barcode {
    /// Accept a scanned value if its checksum is correct.
    pub fn parse(value: &str) -> Option<Self> {
        is_valid(value).then(|| Self(value.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Barcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Barcode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn weighted_sum(digits: &[u8]) -> u32 {
    digits
        .iter()
        .enumerate()
        .map(|(i, d)| u32::from(d - b'0') * if i % 2 == 1 { 3 } else { 1 })
        .sum()
}

/// Checksum digit for the first 12 digits of a barcode.
pub fn checksum_digit(prefix12: &[u8]) -> u8 {
    let sum = weighted_sum(prefix12);
    ((10 - sum % 10) % 10) as u8
}

/// Encode `document_id` into the namespace with the given prefix.
///
/// Ids that need more digits than the namespace leaves are rejected rather
/// than truncated.
pub fn encode(prefix: &str, document_id: u64) -> Result<Barcode, EncodingError> {
    if prefix.is_empty()
        || prefix.len() >= BARCODE_LEN - 1
        || !prefix.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(EncodingError::InvalidNamespace(prefix.to_owned()));
    }
    let digits = BARCODE_LEN - 1 - prefix.len();
    let mut body = format!("{prefix}{document_id:0digits$}");
    if body.len() != BARCODE_LEN - 1 {
        return Err(EncodingError::IdTooLarge {
            id: document_id,
            digits,
        });
    }
    let check = checksum_digit(body.as_bytes());
    body.push(char::from(b'0' + check));
    Ok(Barcode(body))
}

/// Whether `barcode` is 13 ASCII digits with a correct checksum.
pub fn is_valid(barcode: &str) -> bool {
    let bytes = barcode.as_bytes();
    bytes.len() == BARCODE_LEN
        && bytes.iter().all(u8::is_ascii_digit)
        && weighted_sum(bytes) % 10 == 0
}

/// Split a scanned barcode into its registered namespace and raw id.
///
/// Returns `None` for bad checksums and unregistered prefixes; both are
/// ordinary misses, not errors.
pub fn decode<'a>(barcode: &str, namespaces: &'a NamespaceTable) -> Option<(&'a Namespace, u64)> {
    if !is_valid(barcode) {
        return None;
    }
    let width = namespaces.width();
    let namespace = namespaces.get(&barcode[..width])?;
    let id = barcode[width..BARCODE_LEN - 1].parse().ok()?;
    Some((namespace, id))
}

/// Codec bound to a namespace table. Cheap to clone and safe to share
/// between scanner sessions.
#[derive(Debug, Clone)]
pub struct BarcodeCodec {
    namespaces: Arc<NamespaceTable>,
}

impl BarcodeCodec {
    pub fn new(namespaces: Arc<NamespaceTable>) -> Self {
        Self { namespaces }
    }

    pub fn namespaces(&self) -> &NamespaceTable {
        &self.namespaces
    }

    /// Barcode printed on new documents.
    pub fn encode_current(&self, document_id: u64) -> Result<Barcode, EncodingError> {
        let current = self
            .namespaces
            .current()
            .ok_or(EncodingError::NoCurrentNamespace)?;
        encode(&current.prefix, document_id)
    }

    pub fn decode(&self, barcode: &str) -> Option<(&Namespace, u64)> {
        decode(barcode, &self.namespaces)
    }
}

impl Default for BarcodeCodec {
    fn default() -> Self {
        Self::new(Arc::new(NamespaceTable::default()))
    }
}
