// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bookkeeping for chains of external processes.
//
// A pipeline is a handful of child processes connected by OS pipes. The
// coordinator only remembers which processes belong to the chain and what to
// call them in error reports; it knows nothing about documents. Exit codes
// are the only failure signal the tools give us.

use std::process::Stdio;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use crate::error::PipelineError;

/// One running process of a pipeline.
struct PipelineStage {
    label: String,
    child: Child,
}

/// The set of processes making up one pipeline run.
///
/// `await_all` consumes the coordinator, so every registered process is
/// waited on exactly once.
#[derive(Default)]
pub struct PipelineCoordinator {
    stages: Vec<PipelineStage>,
}

impl PipelineCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, label: impl Into<String>, child: Child) {
        self.stages.push(PipelineStage {
            label: label.into(),
            child,
        });
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Wait for every stage and return the labels of those that exited
    /// unsuccessfully (or could not be waited on), in registration order.
    ///
    /// Never stops early: a failed stage does not leave the others running.
    pub async fn await_all(self) -> Vec<String> {
        let mut failed = Vec::new();
        for PipelineStage { label, mut child } in self.stages {
            match child.wait().await {
                Ok(status) if status.success() => {
                    debug!(stage = %label, "stage finished");
                }
                Ok(status) => {
                    warn!(stage = %label, %status, "stage failed");
                    failed.push(label);
                }
                Err(err) => {
                    warn!(stage = %label, error = %err, "could not wait for stage");
                    failed.push(label);
                }
            }
        }
        failed
    }
}

/// Start one stage.
pub(crate) fn spawn_stage(label: &str, command: &mut Command) -> Result<Child, PipelineError> {
    debug!(stage = label, ?command, "starting stage");
    command.spawn().map_err(|source| PipelineError::Spawn {
        label: label.to_owned(),
        source,
    })
}

/// Build a command for one of the configured tools. Standard error is
/// discarded; the tools are chatty and exit codes are what count.
pub(crate) fn tool(program: &str) -> Command {
    let mut command = Command::new(program);
    command.stderr(Stdio::null()).kill_on_drop(false);
    command
}

/// Write `input` to a stage while reading its output, so neither side can
/// fill its pipe and stall the other.
///
/// A stage that exits without consuming all of its input surfaces through
/// its exit code, so a broken pipe on the input side is not an error here.
pub(crate) async fn feed_and_drain(
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    input: &[u8],
) -> std::io::Result<Vec<u8>> {
    let feed = async move {
        if let Some(mut stdin) = stdin {
            match stdin.write_all(input).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!("stage closed its input early");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    };
    let drain = async move {
        let mut output = Vec::new();
        if let Some(mut stdout) = stdout {
            stdout.read_to_end(&mut output).await?;
        }
        Ok::<_, std::io::Error>(output)
    };

    let (fed, drained) = tokio::join!(feed, drain);
    fed?;
    drained
}
