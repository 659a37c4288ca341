// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Odie Print — submits print jobs to the archive printer.
//
// A job is one spool stream (an `lp` process or a raw TCP socket) carrying
// several PJL-framed PCL5 documents back to back, optionally followed by a
// cover page on coloured paper.

pub mod error;
pub mod job;
pub mod order;
pub mod spool;

pub use error::PrintError;
pub use job::{PrintDocument, PrintJob, SubmitReport};
pub use order::PrintOrder;
pub use spool::{SpoolStream, SpoolTarget};
