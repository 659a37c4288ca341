// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// odie-barcode — Barcodes on exam copies.
//
// Encodes archive document ids as checksummed 13-digit barcodes, decodes
// scanned barcodes back into (namespace, id) pairs, and talks to the
// barcode scanner daemons in the offices so returned copies can be checked
// in by scanning them.

pub mod codec;
pub mod error;
pub mod scanner;

pub use codec::{Barcode, BarcodeCodec};
pub use error::{EncodingError, ProtocolError};
pub use scanner::{CancelHandle, DocumentLookup, ScannerClient, ScannerSession, SessionState};
