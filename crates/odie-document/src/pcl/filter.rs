// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Block-wise byte filter for PCL5 streams.
//
// Ghostscript's ljet4 device emits PCL commands that would override the job
// settings sent in the PJL header (tray, paper size, duplex, copies) and
// margins that are wrong for our printers. Those commands are cut out of the
// stream without ever holding more than two blocks in memory.

use std::sync::LazyLock;

use regex::bytes::Regex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::PipelineError;

/// A byte pattern that is removed from the stream.
#[derive(Debug)]
pub struct FilterRule {
    pub name: &'static str,
    pattern: Regex,
}

impl FilterRule {
    /// # Panics
    ///
    /// Panics if `pattern` is not a valid regular expression.
    pub fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("BUG: invalid filter pattern"),
        }
    }

    fn apply(&self, buf: Vec<u8>) -> Vec<u8> {
        if self.pattern.is_match(&buf) {
            self.pattern.replace_all(&buf, &b""[..]).into_owned()
        } else {
            buf
        }
    }
}

static PCL5_RULES: LazyLock<Vec<FilterRule>> = LazyLock::new(|| {
    vec![
        FilterRule::new("tray", r"(?-u)\x1b&l\dH"),
        FilterRule::new("page size", r"(?-u)\x1b&l\d+A"),
        FilterRule::new("duplex", r"(?-u)\x1b&l\dS"),
        FilterRule::new(
            "margins",
            r"(?-u)\x1b&l[+-]?\d*(?:\.\d*)?u[+-]?\d*(?:\.\d*)?Z",
        ),
        FilterRule::new("copies", r"(?-u)\x1b&l\d+X"),
    ]
});

/// Rules stripping the commands that conflict with the PJL job settings.
pub fn pcl5_rules() -> &'static [FilterRule] {
    &PCL5_RULES
}

/// Copy `input` to `output`, removing every match of `rules`.
///
/// Data is processed in blocks of `block_size` bytes. Each pass looks at the
/// unwritten remainder plus enough fresh input to fill two blocks, rewrites
/// it, and emits at most one block; so a match of up to `block_size` bytes is
/// found even when it straddles a read boundary.
///
/// Returns the number of bytes written. Failed reads are `Io`, failed
/// writes `Output`.
pub async fn filter_stream<R, W>(
    input: &mut R,
    output: &mut W,
    rules: &[FilterRule],
    block_size: usize,
) -> Result<u64, PipelineError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let block_size = block_size.max(1);
    let window = 2 * block_size;
    let mut pending: Vec<u8> = Vec::with_capacity(window);
    let mut eof = false;
    let mut written = 0u64;
    let mut blocks = 0u64;

    loop {
        while !eof && pending.len() < window {
            let want = window - pending.len();
            let read = (&mut *input)
                .take(want as u64)
                .read_to_end(&mut pending)
                .await?;
            if read < want {
                eof = true;
            }
        }
        if pending.is_empty() {
            break;
        }

        for rule in rules {
            pending = rule.apply(pending);
        }

        let emit = if eof {
            pending.len()
        } else {
            block_size.min(pending.len())
        };
        output
            .write_all(&pending[..emit])
            .await
            .map_err(PipelineError::Output)?;
        pending.drain(..emit);
        written += emit as u64;
        blocks += 1;
    }

    output.flush().await.map_err(PipelineError::Output)?;
    debug!(blocks, written, "stream filtered");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(input: &[u8], block_size: usize) -> Vec<u8> {
        let mut output = Vec::new();
        let mut reader = input;
        let written = filter_stream(&mut reader, &mut output, pcl5_rules(), block_size)
            .await
            .unwrap();
        assert_eq!(written, output.len() as u64);
        output
    }

    #[tokio::test]
    async fn strips_every_conflicting_command() {
        let input = b"\x1bE\x1b&l1H\x1b&l26A\x1b&l0S\x1b&l-2.5u+0.2Z\x1b&l1Xpage\x1b&l0o";
        assert_eq!(run(input, 1024).await, b"\x1bEpage\x1b&l0o");
    }

    #[tokio::test]
    async fn keeps_unrelated_commands() {
        // Tray selection takes a single digit, top margin and cursor
        // positioning are left alone.
        let input = b"\x1b&l12H\x1b&l0E\x1b*p0x0Y";
        assert_eq!(run(input, 1024).await, input);
    }

    #[tokio::test]
    async fn finds_commands_across_block_boundaries() {
        let mut input = Vec::new();
        for page in 0..50 {
            input.extend_from_slice(format!("page {page} ").as_bytes());
            input.extend_from_slice(b"\x1b&l2u-3.25Z\x1b&l26A\x1b&l1X");
        }
        for block_size in [16, 17, 23, 64] {
            let output = run(&input, block_size).await;
            assert!(!output.contains(&0x1b), "block size {block_size}");
            assert!(output.starts_with(b"page 0 page 1 "));
            assert!(output.ends_with(b"page 49 "));
        }
    }

    #[tokio::test]
    async fn heavy_removal_does_not_truncate_the_stream() {
        // Whole blocks vanish; the rest of the input must still come through.
        let mut input = b"\x1b&l1X".repeat(200);
        input.extend_from_slice(b"tail");
        assert_eq!(run(&input, 8).await, b"tail");
    }

    #[tokio::test]
    async fn empty_input_writes_nothing() {
        assert!(run(b"", 16).await.is_empty());
    }

    #[tokio::test]
    async fn closed_output_is_an_output_error() {
        let (mut writer, reader) = tokio::io::duplex(64);
        drop(reader);
        let mut input = &b"\x1bEbody"[..];
        let err = filter_stream(&mut input, &mut writer, pcl5_rules(), 16)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Output(_)));
        assert!(err.failed_stages().is_empty());
    }
}
