// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// odie-document — Document processing for the Odie archive.
//
// Everything here drives external tools (Ghostscript, pdftk, pdfjam) through
// chains of piped child processes: stamping barcodes onto stored exams,
// converting PDFs into filtered PCL5 wrapped in PJL envelopes, and caching
// the conversion result. Cover pages are rendered in-process.

pub mod bake;
pub mod cover;
pub mod error;
pub mod pcl;
pub mod pdf;
pub mod pipeline;

pub use bake::{BakeOutcome, BarcodeBaker, DocumentLocks};
pub use cover::{CoverPage, NewsItem};
pub use error::{BakeError, PipelineError, StageFailure};
pub use pcl::PclJobBuilder;
pub use pdf::{page_count, page_count_of};
pub use pipeline::PipelineCoordinator;
