// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Error types for barcode encoding and the scanner protocol.

use thiserror::Error;

/// A document id could not be turned into a barcode.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("document id {id} does not fit into {digits} digits")]
    IdTooLarge { id: u64, digits: usize },

    #[error("invalid namespace prefix {0:?}")]
    InvalidNamespace(String),

    #[error("no namespace uses the current scheme")]
    NoCurrentNamespace,
}

/// The scanner daemon did something we did not expect, or went away.
///
/// Fatal while connecting. Once a session is established these end the scan
/// sequence instead of reaching the consumer.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("not a barcode scanner, greeting was {0:?}")]
    NotAScanner(String),

    #[error("expected {expected:?}, got {got:?}")]
    Unexpected { expected: &'static str, got: String },

    #[error("timed out waiting for the scanner")]
    Timeout,

    #[error("scanner closed the connection")]
    Disconnected,

    #[error("session was cancelled")]
    Cancelled,

    #[error("session has already terminated")]
    Terminated,

    #[error("scanner I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
