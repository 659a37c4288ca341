// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Newline framing for the scanner protocol.

use tokio::io::{AsyncRead, AsyncReadExt};

/// Size of a single socket read.
const READ_CHUNK: usize = 1024;

/// Splits a byte stream into `\n`-terminated lines.
///
/// Bytes read past the end of a line stay buffered, so several lines that
/// arrive in one read are served without touching the socket again.
pub struct LineReader<R> {
    inner: R,
    pending: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: Vec::new(),
        }
    }

    /// Next line without its terminator, or `None` once the peer closed the
    /// stream. An unterminated tail at end of stream is discarded.
    ///
    /// Cancel safe: bytes already read are kept in the buffer.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = self.inner.read(&mut chunk).await?;
            if n == 0 {
                return Ok(None);
            }
            self.pending.extend_from_slice(&chunk[..n]);
        }
    }
}
