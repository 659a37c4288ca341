// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Spool streams: where the bytes of a print job go.
//
// The usual target is CUPS via `lp -o raw`, which queues the job under a
// title the printer's accounting reads. A JetDirect socket (port 9100) is
// accepted as well; it has no notion of a title, so that only shows up in
// our logs.

use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, info, warn};

use odie_core::config::PipelineConfig;

use crate::error::PrintError;

/// Default raw TCP port (HP JetDirect).
pub const RAW_PORT: u16 = 9100;

/// Timeout for connecting to a raw TCP printer.
const RAW_CONNECT_TIMEOUT_SECS: u64 = 60;

/// Where a print job is spooled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpoolTarget {
    /// `<program> -o raw -t <title> -d <printer>`.
    Lp { program: String, printer: String },
    /// Raw socket straight to the printer.
    RawTcp { host: String, port: u16 },
}

impl SpoolTarget {
    /// The configured CUPS printer.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::Lp {
            program: config.tools.lp.clone(),
            printer: config.printing.printer.clone(),
        }
    }

    /// `host` or `host:port`, port defaulting to 9100.
    pub fn raw(addr: &str) -> Option<Self> {
        let (host, port) = match addr.rsplit_once(':') {
            Some((host, port)) => (host, port.parse().ok()?),
            None => (addr, RAW_PORT),
        };
        if host.is_empty() {
            return None;
        }
        Some(Self::RawTcp {
            host: host.to_owned(),
            port,
        })
    }

    fn describe(&self) -> String {
        match self {
            Self::Lp { printer, .. } => format!("lp/{printer}"),
            Self::RawTcp { host, port } => format!("{host}:{port}"),
        }
    }
}

enum Sink {
    Lp { stdin: ChildStdin, child: Child },
    Raw(TcpStream),
}

/// An open spool stream. Documents are written back to back; `finish`
/// hands the job over, `abort` discards it.
pub struct SpoolStream {
    sink: Sink,
    target: String,
}

impl SpoolStream {
    pub async fn open(target: &SpoolTarget, title: &str) -> Result<Self, PrintError> {
        let described = target.describe();
        let sink = match target {
            SpoolTarget::Lp { program, printer } => {
                let mut command = Command::new(program);
                command
                    .args(["-o", "raw", "-t", title, "-d", printer.as_str()])
                    .stdin(Stdio::piped())
                    .stdout(Stdio::null());
                debug!(?command, "starting spooler");
                let mut child = command.spawn().map_err(|source| PrintError::SpoolOpen {
                    target: described.clone(),
                    source,
                })?;
                let stdin = child.stdin.take().ok_or_else(|| PrintError::SpoolOpen {
                    target: described.clone(),
                    source: std::io::Error::other("spooler input not captured"),
                })?;
                Sink::Lp { stdin, child }
            }
            SpoolTarget::RawTcp { host, port } => {
                let stream = tokio::time::timeout(
                    Duration::from_secs(RAW_CONNECT_TIMEOUT_SECS),
                    TcpStream::connect((host.as_str(), *port)),
                )
                .await
                .map_err(|_| PrintError::SpoolOpen {
                    target: described.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("connect timed out after {RAW_CONNECT_TIMEOUT_SECS}s"),
                    ),
                })?
                .map_err(|source| PrintError::SpoolOpen {
                    target: described.clone(),
                    source,
                })?;
                Sink::Raw(stream)
            }
        };
        info!(spool = %described, title, "spool opened");
        Ok(Self {
            sink,
            target: described,
        })
    }

    /// Exit status of a spooler that has already gone away. Always `None`
    /// for raw sockets.
    pub fn exited(&mut self) -> Option<ExitStatus> {
        match &mut self.sink {
            Sink::Lp { child, .. } => child.try_wait().ok().flatten(),
            Sink::Raw(_) => None,
        }
    }

    /// Close the stream and wait for the spooler to accept the job.
    pub async fn finish(self) -> Result<(), PrintError> {
        match self.sink {
            Sink::Lp { mut stdin, mut child } => {
                stdin.flush().await.map_err(PrintError::SpoolIo)?;
                drop(stdin);
                let status = child.wait().await.map_err(PrintError::SpoolIo)?;
                if !status.success() {
                    return Err(PrintError::SpoolExit {
                        status: status.to_string(),
                    });
                }
            }
            Sink::Raw(mut stream) => {
                stream.flush().await.map_err(PrintError::SpoolIo)?;
                stream.shutdown().await.map_err(PrintError::SpoolIo)?;
            }
        }
        info!(spool = %self.target, "print job handed to spool");
        Ok(())
    }

    /// Throw the job away. `lp` is killed before it can queue anything.
    pub async fn abort(self) {
        match self.sink {
            Sink::Lp { stdin, mut child } => {
                let running = matches!(child.try_wait(), Ok(None));
                if running {
                    if let Err(err) = child.start_kill() {
                        warn!(error = %err, "could not kill spooler");
                    }
                }
                drop(stdin);
                let _ = child.wait().await;
            }
            // A raw printer has already started on whatever it received.
            Sink::Raw(stream) => drop(stream),
        }
        warn!(spool = %self.target, "print job aborted");
    }
}

impl AsyncWrite for SpoolStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match &mut self.get_mut().sink {
            Sink::Lp { stdin, .. } => Pin::new(stdin).poll_write(cx, buf),
            Sink::Raw(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match &mut self.get_mut().sink {
            Sink::Lp { stdin, .. } => Pin::new(stdin).poll_flush(cx),
            Sink::Raw(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match &mut self.get_mut().sink {
            Sink::Lp { stdin, .. } => Pin::new(stdin).poll_shutdown(cx),
            Sink::Raw(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}
