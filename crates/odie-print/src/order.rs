// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print orders from the archive counter.
//
// External orders are paid for by students and charged to the shop's
// usercodes; the cover goes on coloured paper. Internal orders are charged to
// a council account and the cover is printed like any other page.

use std::path::PathBuf;

use tracing::info;

use odie_core::config::PrintingConfig;
use odie_core::types::PdfSource;
use odie_document::CoverPage;

use crate::error::PrintError;
use crate::job::{PrintDocument, PrintJob, SubmitReport};
use crate::spool::SpoolTarget;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintOrder {
    External {
        who: String,
        what: String,
        files: Vec<PathBuf>,
    },
    Internal {
        account: String,
        who: String,
        what: String,
        files: Vec<PathBuf>,
    },
}

impl PrintOrder {
    pub fn cover_page(&self) -> CoverPage {
        let (who, what) = self.names();
        CoverPage::new(who, what)
    }

    fn names(&self) -> (&str, &str) {
        match self {
            Self::External { who, what, .. } | Self::Internal { who, what, .. } => {
                (who.as_str(), what.as_str())
            }
        }
    }

    /// Spool title, e.g. `Odie-Druck für Erika (Analysis I)`.
    pub fn title(&self, printing: &PrintingConfig) -> String {
        let (who, what) = self.names();
        let prefix = match self {
            Self::External { .. } => &printing.external_title,
            Self::Internal { .. } => &printing.internal_title,
        };
        format!("{prefix} für {who} ({what})")
    }

    /// The job's documents and separate cover, given the rendered cover.
    pub fn documents(
        &self,
        printing: &PrintingConfig,
        cover: PdfSource,
    ) -> (Vec<PrintDocument>, Option<PrintDocument>) {
        match self {
            Self::External { files, .. } => {
                let documents = files
                    .iter()
                    .map(|file| PrintDocument::regular(file, &printing.external_usercode))
                    .collect();
                let cover = PrintDocument::cover(cover, &printing.external_cover_usercode);
                (documents, Some(cover))
            }
            Self::Internal { account, files, .. } => {
                let mut documents: Vec<PrintDocument> = files
                    .iter()
                    .map(|file| PrintDocument::regular(file, account))
                    .collect();
                documents.push(PrintDocument {
                    source: cover,
                    ..PrintDocument::regular(PathBuf::new(), account)
                });
                (documents, None)
            }
        }
    }

    /// Render the cover and submit the whole order.
    pub async fn submit(
        &self,
        job: &PrintJob,
        target: &SpoolTarget,
        printing: &PrintingConfig,
    ) -> Result<SubmitReport, PrintError> {
        let cover = PdfSource::Bytes(self.cover_page().render());
        let title = self.title(printing);
        let (documents, cover) = self.documents(printing, cover);
        let report = job.submit(target, &title, &documents, cover.as_ref()).await?;
        info!(job_id = %report.job_id, documents = report.documents, "order printed");
        Ok(report)
    }
}
