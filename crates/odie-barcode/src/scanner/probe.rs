// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanner name probing for the office overview.

use std::collections::BTreeMap;

use tokio::io::AsyncWriteExt;
use tracing::debug;

use odie_core::config::ScannerConfig;

use super::{CONNECT_TIMEOUT, handshake};

/// Identity used for short-lived probe connections.
const PROBE_IDENTITY: &str = "Odie(tmp)";

/// Display name of the scanner at `host:port`, or a placeholder naming the
/// address if it cannot be reached or does not speak the protocol.
pub async fn scanner_name(host: &str, port: u16) -> String {
    match handshake(host, port, PROBE_IDENTITY, CONNECT_TIMEOUT, CONNECT_TIMEOUT).await {
        Ok(mut session) => {
            let _ = session.writer.write_all(b"\nRELEASE\nQUIT\n").await;
            session.name
        }
        Err(err) => {
            debug!(host, port, error = %err, "scanner probe failed");
            placeholder(host, port)
        }
    }
}

fn placeholder(host: &str, port: u16) -> String {
    format!("Scanner @ {host}:{port}")
}

/// Names of all configured scanners, per office.
///
/// Entries that are not `host:port` are reported verbatim as unreachable.
pub async fn office_scanner_names(config: &ScannerConfig) -> BTreeMap<String, Vec<String>> {
    let mut names = BTreeMap::new();
    for (office, addrs) in &config.offices {
        let mut office_names = Vec::with_capacity(addrs.len());
        for addr in addrs {
            let name = match parse_addr(addr) {
                Some((host, port)) => scanner_name(host, port).await,
                None => format!("Scanner @ {addr}"),
            };
            office_names.push(name);
        }
        names.insert(office.clone(), office_names);
    }
    names
}

fn parse_addr(addr: &str) -> Option<(&str, u16)> {
    let (host, port) = addr.rsplit_once(':')?;
    Some((host, port.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn probe_reports_announced_name() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let daemon = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();
            write_half.write_all(b"CONNECT 1 Scanner Foyer\n").await.unwrap();
            let registration = lines.next_line().await.unwrap().unwrap();
            write_half.write_all(b"OK\n").await.unwrap();
            registration
        });

        assert_eq!(scanner_name("127.0.0.1", port).await, "Scanner Foyer");
        assert_eq!(daemon.await.unwrap(), "CONNECT 1 Odie>Odie(tmp)");
    }

    #[tokio::test]
    async fn unreachable_scanner_gets_placeholder() {
        // Bind and drop to get a port nobody listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        assert_eq!(
            scanner_name("127.0.0.1", port).await,
            format!("Scanner @ 127.0.0.1:{port}")
        );
    }

    #[tokio::test]
    async fn malformed_addresses_are_reported_verbatim() {
        let mut config = ScannerConfig::default();
        config
            .offices
            .insert("FSI".into(), vec!["no-port-here".into()]);
        let names = office_scanner_names(&config).await;
        assert_eq!(names["FSI"], vec!["Scanner @ no-port-here".to_string()]);
    }

    #[test]
    fn parses_host_and_port() {
        assert_eq!(parse_addr("scanner.local:3974"), Some(("scanner.local", 3974)));
        assert_eq!(parse_addr("scanner.local"), None);
        assert_eq!(parse_addr("scanner.local:x"), None);
    }
}
