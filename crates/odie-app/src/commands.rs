// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use odie_barcode::ScannerClient;
use odie_barcode::scanner::office_scanner_names;
use odie_core::OdieError;
use odie_core::config::PipelineConfig;
use odie_core::human_errors::humanize_error;
use odie_core::types::{DocumentId, DocumentRef, JobId};
use odie_core::{Namespace, NamespaceScheme};
use odie_document::{BakeOutcome, BarcodeBaker, PclJobBuilder, page_count};
use odie_print::{PrintJob, PrintOrder, SpoolTarget};

use crate::cli::{Command, PrintArgs};

pub async fn run(command: Command, config: &PipelineConfig) -> Result<()> {
    match command {
        Command::External {
            who,
            what,
            files,
            print,
        } => print_order(PrintOrder::External { who, what, files }, &print, config).await,
        Command::Internal {
            account,
            who,
            what,
            files,
            print,
        } => {
            let order = PrintOrder::Internal {
                account,
                who,
                what,
                files,
            };
            print_order(order, &print, config).await
        }
        Command::CacheOnly { files } => cache_only(&files, config).await,
        Command::Bake { id, pages, legacy } => bake(id, pages, legacy, config).await,
        Command::Scan {
            host,
            port,
            identity,
        } => scan(&host, port, &identity, config).await,
        Command::Scanners => scanners(config).await,
    }
}

/// Tell the operator what went wrong in plain words, keep the detail for
/// the log.
pub fn report(err: OdieError) -> anyhow::Error {
    eprintln!("{}", humanize_error(&err));
    err.into()
}

async fn print_order(order: PrintOrder, args: &PrintArgs, config: &PipelineConfig) -> Result<()> {
    if args.debug {
        tokio::fs::create_dir_all(&config.temp_dir).await?;
        let path = config.temp_dir.join(format!("cover-{}.pdf", JobId::new()));
        tokio::fs::write(&path, order.cover_page().render())
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        println!("{}", path.display());
        return Ok(());
    }

    let target = match &args.raw {
        Some(addr) => SpoolTarget::raw(addr).with_context(|| format!("bad printer address {addr:?}"))?,
        None => SpoolTarget::from_config(config),
    };
    let job = PrintJob::new(PclJobBuilder::new(config));
    match order.submit(&job, &target, &config.printing).await {
        Ok(report) => {
            info!(job_id = %report.job_id, bytes = report.bytes, "done");
            Ok(())
        }
        Err(err) => {
            let human = err.humanize();
            eprintln!("{human}");
            Err(err.into())
        }
    }
}

async fn cache_only(files: &[PathBuf], config: &PipelineConfig) -> Result<()> {
    // All or nothing: check every file before converting any.
    for file in files {
        if !file.is_file() {
            bail!("file not found: {}", file.display());
        }
    }
    let builder = PclJobBuilder::new(config);
    for file in files {
        let cache = builder
            .cache_pdf(file)
            .await
            .with_context(|| format!("caching {}", file.display()))?;
        println!("cached {} to {}", file.display(), cache.display());
    }
    Ok(())
}

async fn bake(id: u64, pages: Option<u32>, legacy: bool, config: &PipelineConfig) -> Result<()> {
    let id = DocumentId(id);
    let path = config.document_path(id);
    let has_stored_file = path.is_file();
    let page_count = match pages {
        Some(pages) => pages,
        None if has_stored_file && !legacy => page_count(&path)
            .map_err(report)
            .with_context(|| format!("counting pages of {}", path.display()))?,
        None => 0,
    };
    let doc = DocumentRef {
        id,
        has_stored_file,
        page_count,
        has_legacy_barcode: legacy,
    };

    match BarcodeBaker::new(config).bake(&doc).await? {
        BakeOutcome::Stamped { barcode } => println!("{id}: stamped {barcode}"),
        BakeOutcome::SkippedLegacy => println!("{id}: legacy document, left alone"),
        BakeOutcome::SkippedNoFile => println!("{id}: no stored file"),
    }
    Ok(())
}

/// What the `scan` command reports for a scanned barcode.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScannedDocument {
    namespace: String,
    id: u64,
    stored: Option<PathBuf>,
}

fn scan_lookup(documents_dir: &Path) -> impl Fn(&Namespace, u64) -> Option<ScannedDocument> + use<> {
    let documents_dir = documents_dir.to_path_buf();
    move |namespace: &Namespace, id: u64| {
        let stored = match namespace.scheme {
            NamespaceScheme::Current => {
                let path = documents_dir.join(format!("{id}.pdf"));
                path.is_file().then_some(path)
            }
            NamespaceScheme::Legacy { .. } => None,
        };
        Some(ScannedDocument {
            namespace: namespace.prefix.clone(),
            id,
            stored,
        })
    }
}

async fn scan(host: &str, port: u16, identity: &str, config: &PipelineConfig) -> Result<()> {
    let client = ScannerClient::new(
        Arc::new(config.namespaces.clone()),
        scan_lookup(&config.documents_dir),
    )
    .with_timeouts(
        Duration::from_secs(config.scanners.connect_timeout_secs),
        Duration::from_secs(config.scanners.idle_timeout_secs),
    );
    let session = client.connect(host, port, identity).await?;
    println!("connected to {}", session.name());

    let (mut documents, cancel, task) = session.spawn(16);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    while let Some(doc) = documents.recv().await {
        match &doc.stored {
            Some(path) => println!("{} {}: {}", doc.namespace, doc.id, path.display()),
            None => println!("{} {}: no stored file", doc.namespace, doc.id),
        }
    }

    interrupt.abort();
    if let Err(err) = task.await {
        warn!(error = %err, "scanner task ended abnormally");
    }
    Ok(())
}

async fn scanners(config: &PipelineConfig) -> Result<()> {
    let names = office_scanner_names(&config.scanners).await;
    if names.is_empty() {
        println!("no scanners configured");
    }
    for (office, scanners) in names {
        println!("{office}:");
        for name in scanners {
            println!("  {name}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cache_only_rejects_missing_files_before_converting() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.pdf");
        std::fs::write(&present, b"%PDF").unwrap();
        let missing = dir.path().join("missing.pdf");

        let mut config = PipelineConfig::default();
        config.tools.ghostscript = "odie-no-such-tool".into();
        let err = cache_only(&[present, missing], &config).await.unwrap_err();
        assert!(err.to_string().contains("file not found"));
        assert!(!dir.path().join("present.pcl5.gz").exists());
    }

    #[tokio::test]
    async fn bake_of_unreadable_pdf_fails_before_stamping() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("9.pdf"), b"not a pdf").unwrap();
        let mut config = PipelineConfig {
            documents_dir: dir.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        config.tools.ps2pdf = "odie-no-such-tool".into();

        let err = bake(9, None, false, &config).await.unwrap_err();
        assert!(err.to_string().contains("counting pages"));
        assert!(matches!(
            err.downcast_ref::<OdieError>(),
            Some(OdieError::PdfError(_))
        ));
        assert_eq!(std::fs::read(dir.path().join("9.pdf")).unwrap(), b"not a pdf");
    }

    #[test]
    fn scan_lookup_points_at_stored_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("5.pdf"), b"%PDF").unwrap();
        let lookup = scan_lookup(dir.path());

        let current = Namespace::current("22141");
        assert_eq!(
            lookup(&current, 5),
            Some(ScannedDocument {
                namespace: "22141".into(),
                id: 5,
                stored: Some(dir.path().join("5.pdf")),
            })
        );
        assert_eq!(lookup(&current, 6).unwrap().stored, None);

        let legacy = Namespace::legacy("22140", "oral", None);
        assert_eq!(lookup(&legacy, 5).unwrap().stored, None);
    }
}
