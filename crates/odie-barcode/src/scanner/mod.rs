// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Client for the barcode scanner daemon.
//
// The daemon speaks a newline-delimited text protocol over TCP:
//
//   server: CONNECT 1 <scanner name>
//   client: CONNECT 1 <client identity>
//   server: OK
//   client: GRAB                      (take exclusive use of the scanner)
//   server: OK
//   server: BARCODE <13 digits>       (one per scan, any time while grabbed)
//   client: RELEASE / QUIT
//
// The protocol has no error line. Anything unexpected while grabbed (another
// client grabbing the scanner, the daemon restarting, a long silence) is
// treated as revocation: the session releases the scanner and the scan
// sequence ends. Consumers never see those errors.

pub mod line_reader;
pub mod probe;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use odie_core::namespace::{Namespace, NamespaceTable};

use crate::codec::BarcodeCodec;
use crate::error::ProtocolError;

pub use line_reader::LineReader;
pub use probe::{office_scanner_names, scanner_name};

/// Prefix of the greeting line and of our registration line.
const CONNECT_PREFIX: &str = "CONNECT 1 ";

/// Prefix of a scan event.
const BARCODE_PREFIX: &str = "BARCODE ";

/// Namespace for client identities shown on the scanner's display.
const IDENTITY_PREFIX: &str = "Odie>";

/// Default timeout for connecting and reading the greeting.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default read timeout once connected. Scans are sporadic.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Resolves a decoded barcode into an archive document.
///
/// Shared by all sessions, so implementations must tolerate concurrent calls.
pub trait DocumentLookup: Send + Sync {
    type Document;

    fn lookup(&self, namespace: &Namespace, id: u64) -> Option<Self::Document>;
}

impl<F, D> DocumentLookup for F
where
    F: Fn(&Namespace, u64) -> Option<D> + Send + Sync,
{
    type Document = D;

    fn lookup(&self, namespace: &Namespace, id: u64) -> Option<D> {
        self(namespace, id)
    }
}

/// Observable states of a session. Handshaking happens inside
/// [`ScannerClient::connect`], so a session starts out `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Grabbed,
    Terminated,
}

/// Cancels a session from another task. The blocked read returns promptly
/// and the scan sequence ends as if the scanner had been revoked.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<watch::Sender<bool>>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Factory for scanner sessions. Holds what every session shares: the
/// namespace table, the document lookup and the timeouts.
pub struct ScannerClient<L> {
    codec: BarcodeCodec,
    lookup: Arc<L>,
    connect_timeout: Duration,
    idle_timeout: Duration,
}

impl<L> Clone for ScannerClient<L> {
    fn clone(&self) -> Self {
        Self {
            codec: self.codec.clone(),
            lookup: Arc::clone(&self.lookup),
            connect_timeout: self.connect_timeout,
            idle_timeout: self.idle_timeout,
        }
    }
}

impl<L: DocumentLookup> ScannerClient<L> {
    pub fn new(namespaces: Arc<NamespaceTable>, lookup: L) -> Self {
        Self {
            codec: BarcodeCodec::new(namespaces),
            lookup: Arc::new(lookup),
            connect_timeout: CONNECT_TIMEOUT,
            idle_timeout: IDLE_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, connect: Duration, idle: Duration) -> Self {
        self.connect_timeout = connect;
        self.idle_timeout = idle;
        self
    }

    /// Connect to a scanner daemon and register as `identity`.
    pub async fn connect(
        &self,
        host: &str,
        port: u16,
        identity: &str,
    ) -> Result<ScannerSession<L>, ProtocolError> {
        let Handshake {
            reader,
            writer,
            name,
        } = handshake(host, port, identity, self.connect_timeout, self.idle_timeout).await?;

        info!(scanner = %name, host, port, "connected to barcode scanner");
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Ok(ScannerSession {
            reader,
            writer,
            name,
            state: SessionState::Idle,
            codec: self.codec.clone(),
            lookup: Arc::clone(&self.lookup),
            idle_timeout: self.idle_timeout,
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
            closed: false,
        })
    }
}

/// A connected, registered scanner.
pub struct ScannerSession<L: DocumentLookup> {
    reader: LineReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    name: String,
    state: SessionState,
    codec: BarcodeCodec,
    lookup: Arc<L>,
    idle_timeout: Duration,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
    closed: bool,
}

impl<L: DocumentLookup> ScannerSession<L> {
    /// Display name the scanner announced in its greeting.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancel_tx))
    }

    /// Take exclusive use of the scanner. No-op if already grabbed.
    pub async fn grab(&mut self) -> Result<(), ProtocolError> {
        match self.state {
            SessionState::Grabbed => return Ok(()),
            SessionState::Terminated => return Err(ProtocolError::Terminated),
            SessionState::Idle => {}
        }
        self.send(b"GRAB\n").await?;
        self.expect("OK").await?;
        self.state = SessionState::Grabbed;
        debug!(scanner = %self.name, "scanner grabbed");
        Ok(())
    }

    /// Give the scanner back. The session stays usable and may grab again.
    pub async fn release(&mut self) -> Result<(), ProtocolError> {
        if self.state == SessionState::Terminated {
            return Err(ProtocolError::Terminated);
        }
        self.send(b"RELEASE\n").await?;
        self.state = SessionState::Idle;
        debug!(scanner = %self.name, "scanner released");
        Ok(())
    }

    /// Wait for the next scan that resolves to a document.
    ///
    /// Grabs the scanner first if needed. Scans with a bad checksum, an
    /// unregistered namespace or no matching document are skipped. Returns
    /// `None` once the scanner is revoked, silent for too long, disconnected
    /// or cancelled; the session is terminated afterwards.
    pub async fn next_document(&mut self) -> Option<L::Document> {
        if self.state == SessionState::Terminated {
            return None;
        }
        if let Err(err) = self.grab().await {
            warn!(scanner = %self.name, error = %err, "could not grab scanner");
            self.revoke().await;
            return None;
        }

        loop {
            let value = match self.expect(BARCODE_PREFIX).await {
                Ok(value) => value,
                Err(err) => {
                    info!(scanner = %self.name, reason = %err, "scanner revoked, ending scan sequence");
                    self.revoke().await;
                    return None;
                }
            };

            let Some((namespace, id)) = self.codec.decode(&value) else {
                debug!(barcode = %value, "ignoring unmapped barcode");
                continue;
            };
            match self.lookup.lookup(namespace, id) {
                Some(document) => {
                    debug!(barcode = %value, namespace = %namespace.prefix, id, "barcode scanned");
                    return Some(document);
                }
                None => {
                    debug!(barcode = %value, "no document for barcode");
                }
            }
        }
    }

    /// Move the session onto its own task and forward scanned documents into
    /// a channel. The channel closes when the scan sequence ends.
    pub fn spawn(mut self, capacity: usize) -> (mpsc::Receiver<L::Document>, CancelHandle, JoinHandle<()>)
    where
        L: 'static,
        L::Document: Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity);
        let cancel = self.cancel_handle();
        let handle = tokio::spawn(async move {
            while let Some(document) = self.next_document().await {
                if tx.send(document).await.is_err() {
                    debug!(scanner = %self.name, "scan consumer went away");
                    break;
                }
            }
            self.close().await;
        });
        (rx, cancel, handle)
    }

    /// Release the scanner, say goodbye and close the connection. Errors are
    /// ignored; the daemon cleans up after dropped clients anyway.
    pub async fn close(mut self) {
        self.closed = true;
        self.state = SessionState::Terminated;
        let _ = self.writer.write_all(b"\nRELEASE\nQUIT\n").await;
        let _ = self.writer.shutdown().await;
        debug!(scanner = %self.name, "scanner session closed");
    }

    /// Terminal transition after a protocol violation: release best-effort.
    async fn revoke(&mut self) {
        if self.state == SessionState::Grabbed {
            let _ = self.send(b"RELEASE\n").await;
        }
        self.state = SessionState::Terminated;
    }

    async fn send(&mut self, line: &[u8]) -> Result<(), ProtocolError> {
        self.writer.write_all(line).await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String, ProtocolError> {
        let idle_timeout = self.idle_timeout;
        let cancel_rx = &mut self.cancel_rx;
        let reader = &mut self.reader;
        tokio::select! {
            biased;
            _ = wait_cancelled(cancel_rx) => Err(ProtocolError::Cancelled),
            read = tokio::time::timeout(idle_timeout, reader.next_line()) => match read {
                Err(_) => Err(ProtocolError::Timeout),
                Ok(Ok(Some(line))) => Ok(line),
                Ok(Ok(None)) => Err(ProtocolError::Disconnected),
                Ok(Err(err)) => Err(ProtocolError::Io(err)),
            },
        }
    }

    async fn expect(&mut self, prefix: &'static str) -> Result<String, ProtocolError> {
        let line = self.read_line().await?;
        match line.strip_prefix(prefix) {
            Some(rest) => Ok(rest.to_owned()),
            None => Err(ProtocolError::Unexpected {
                expected: prefix,
                got: line,
            }),
        }
    }
}

impl<L: DocumentLookup> Drop for ScannerSession<L> {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.writer.try_write(b"\nRELEASE\nQUIT\n");
        }
    }
}

async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    let sender_gone = rx.wait_for(|cancelled| *cancelled).await.is_err();
    if sender_gone {
        std::future::pending::<()>().await;
    }
}

struct Handshake {
    reader: LineReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    name: String,
}

/// Connect, check the greeting and register. Shared by sessions and the
/// name probe.
async fn handshake(
    host: &str,
    port: u16,
    identity: &str,
    connect_timeout: Duration,
    idle_timeout: Duration,
) -> Result<Handshake, ProtocolError> {
    let addr = format!("{host}:{port}");
    let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| ProtocolError::Timeout)?
        .map_err(|source| ProtocolError::Connect {
            addr: addr.clone(),
            source,
        })?;
    let (read_half, mut writer) = stream.into_split();
    let mut reader = LineReader::new(read_half);

    let greeting = tokio::time::timeout(connect_timeout, reader.next_line())
        .await
        .map_err(|_| ProtocolError::Timeout)??
        .ok_or(ProtocolError::Disconnected)?;
    let Some(name) = greeting.strip_prefix(CONNECT_PREFIX) else {
        return Err(ProtocolError::NotAScanner(greeting));
    };
    let name = name.to_owned();

    let registration = format!(
        "{CONNECT_PREFIX}{IDENTITY_PREFIX}{}\n",
        identity.replace(' ', "_")
    );
    writer.write_all(registration.as_bytes()).await?;

    let ack = tokio::time::timeout(idle_timeout, reader.next_line())
        .await
        .map_err(|_| ProtocolError::Timeout)??
        .ok_or(ProtocolError::Disconnected)?;
    if ack != "OK" {
        return Err(ProtocolError::Unexpected {
            expected: "OK",
            got: ack,
        });
    }

    Ok(Handshake {
        reader,
        writer,
        name,
    })
}
