// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print jobs: several documents through one spool stream.

use std::path::PathBuf;

use tracing::{info, instrument};

use odie_core::types::{JobId, PdfSource, PrintSettings};
use odie_document::{PclJobBuilder, PipelineError};

use crate::error::PrintError;
use crate::spool::{SpoolStream, SpoolTarget};

/// One document of a job and how to print it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintDocument {
    pub source: PdfSource,
    pub settings: PrintSettings,
    /// Rescale to A4 before rasterizing. Also enables the PCL5 cache for
    /// file sources.
    pub normalize_to_a4: bool,
}

impl PrintDocument {
    /// A stored exam: normalized to A4, stapled, duplex.
    pub fn regular(path: impl Into<PathBuf>, usercode: impl Into<String>) -> Self {
        Self {
            source: PdfSource::Path(path.into()),
            settings: PrintSettings::regular(usercode),
            normalize_to_a4: true,
        }
    }

    /// A cover page on coloured paper. Covers are generated at A4 already.
    pub fn cover(source: PdfSource, usercode: impl Into<String>) -> Self {
        Self {
            source,
            settings: PrintSettings::cover(usercode),
            normalize_to_a4: false,
        }
    }
}

/// What a successful submission sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReport {
    pub job_id: JobId,
    pub documents: usize,
    pub bytes: u64,
}

/// Submits documents to the printer.
#[derive(Debug, Clone)]
pub struct PrintJob {
    builder: PclJobBuilder,
}

impl PrintJob {
    pub fn new(builder: PclJobBuilder) -> Self {
        Self { builder }
    }

    /// Print `documents`, then `cover`, as a single spool job titled `title`.
    ///
    /// Fails as a whole: if any document cannot be converted the spool is
    /// aborted and nothing is printed. A spooler that dies mid-document is
    /// reported as a spool failure, not against the document.
    #[instrument(skip(self, target, documents, cover), fields(documents = documents.len(), cover = cover.is_some()))]
    pub async fn submit(
        &self,
        target: &SpoolTarget,
        title: &str,
        documents: &[PrintDocument],
        cover: Option<&PrintDocument>,
    ) -> Result<SubmitReport, PrintError> {
        let all: Vec<&PrintDocument> = documents.iter().chain(cover).collect();
        for document in &all {
            if let PdfSource::Path(path) = &document.source {
                if path.extension().is_none_or(|ext| ext != "pdf") {
                    return Err(PrintError::UnsupportedDocument(path.clone()));
                }
            }
        }

        let job_id = JobId::new();
        let mut spool = SpoolStream::open(target, title).await?;
        let mut bytes = 0u64;

        for (index, document) in all.iter().enumerate() {
            let written = self
                .builder
                .write_document(
                    &document.source,
                    &document.settings,
                    document.normalize_to_a4,
                    &mut spool,
                )
                .await;
            match written {
                Ok(written) => bytes += written,
                Err(source) => {
                    let err = match (spool.exited(), source) {
                        (Some(status), _) => PrintError::SpoolExit {
                            status: status.to_string(),
                        },
                        (None, PipelineError::Output(err)) => PrintError::SpoolIo(err),
                        (None, source) => PrintError::Document {
                            index,
                            description: document.source.describe(),
                            source,
                        },
                    };
                    spool.abort().await;
                    return Err(err);
                }
            }
        }

        spool.finish().await?;
        info!(%job_id, title, bytes, "print job submitted");
        Ok(SubmitReport {
            job_id,
            documents: all.len(),
            bytes,
        })
    }
}
