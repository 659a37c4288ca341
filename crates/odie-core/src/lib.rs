// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Odie — Core types, configuration and error definitions shared across all
// pipeline crates.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod namespace;
pub mod types;

pub use config::PipelineConfig;
pub use error::OdieError;
pub use namespace::{Namespace, NamespaceScheme, NamespaceTable};
pub use types::*;
