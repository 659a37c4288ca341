// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration, persisted as pretty-printed JSON.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{OdieError, Result};
use crate::namespace::NamespaceTable;
use crate::types::DocumentId;

/// Suffix of the gzip-compressed PCL5 cache stored beside a source PDF.
pub const PCL5_CACHE_EXTENSION: &str = "pcl5.gz";

/// Program names of the external tools. Argument shapes are fixed by the
/// pipeline code; only the executables are configurable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub ps2pdf: String,
    pub pdftk: String,
    pub pdfjam: String,
    pub ghostscript: String,
    pub lp: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            ps2pdf: "ps2pdf".into(),
            pdftk: "pdftk".into(),
            pdfjam: "pdfjam".into(),
            ghostscript: "gs".into(),
            lp: "lp".into(),
        }
    }
}

/// Barcode placement on the first page, in PostScript points with the origin
/// in the bottom-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarcodeConfig {
    pub x: u32,
    pub y: u32,
    /// Replaces the bundled EAN-13 PostScript prelude.
    pub postscript_prelude: Option<PathBuf>,
}

impl Default for BarcodeConfig {
    fn default() -> Self {
        Self {
            x: 350,
            y: 680,
            postscript_prelude: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintingConfig {
    /// Spooler queue name handed to `lp -d`.
    pub printer: String,
    /// Block size of the PCL5 filter. Must be at least the longest pattern.
    pub filter_block_size: usize,
    /// Usercode for exam documents printed for external customers.
    pub external_usercode: String,
    /// Usercode for the cover page of external prints.
    pub external_cover_usercode: String,
    /// Title prefix for external print jobs.
    pub external_title: String,
    /// Title prefix for internal print jobs.
    pub internal_title: String,
}

impl Default for PrintingConfig {
    fn default() -> Self {
        Self {
            printer: "InfoDrucker".into(),
            filter_block_size: 1024 * 1024,
            external_usercode: "2222".into(),
            external_cover_usercode: "2223".into(),
            external_title: "Odie-Druck".into(),
            internal_title: "FS-Deluxe-Druck".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Scanner daemons per office, as `host:port`.
    pub offices: BTreeMap<String, Vec<String>>,
    pub connect_timeout_secs: u64,
    /// Read timeout once connected; scan events are sporadic.
    pub idle_timeout_secs: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            offices: BTreeMap::new(),
            connect_timeout_secs: 5,
            idle_timeout_secs: 600,
        }
    }
}

/// Top-level settings for the document pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding one `<id>.pdf` per archived document.
    pub documents_dir: PathBuf,
    /// Scratch space for intermediate pipeline files.
    pub temp_dir: PathBuf,
    pub tools: ToolConfig,
    pub barcode: BarcodeConfig,
    pub namespaces: NamespaceTable,
    pub printing: PrintingConfig,
    pub scanners: ScannerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("documents"),
            temp_dir: std::env::temp_dir().join("odie"),
            tools: ToolConfig::default(),
            barcode: BarcodeConfig::default(),
            namespaces: NamespaceTable::default(),
            printing: PrintingConfig::default(),
            scanners: ScannerConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Path of the stored file for a document.
    pub fn document_path(&self, id: DocumentId) -> PathBuf {
        document_path(&self.documents_dir, id)
    }

    pub fn validate(&self) -> Result<()> {
        if self.printing.filter_block_size < 64 {
            return Err(OdieError::Config(format!(
                "filter_block_size {} is smaller than the longest PCL pattern",
                self.printing.filter_block_size
            )));
        }
        if self.namespaces.current().is_none() {
            return Err(OdieError::Config(
                "no namespace uses the current scheme".into(),
            ));
        }
        Ok(())
    }
}

/// Stored file of document `id` in `documents_dir` (`<id>.pdf`).
pub fn document_path(documents_dir: &Path, id: DocumentId) -> PathBuf {
    documents_dir.join(format!("{id}.pdf"))
}

/// Path of the PCL5 cache belonging to a source PDF (`exam.pdf` → `exam.pcl5.gz`).
pub fn pcl5_cache_path(source: &Path) -> PathBuf {
    source.with_extension(PCL5_CACHE_EXTENSION)
}

/// Load the configuration from `path`, falling back to defaults if the file
/// does not exist.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(PipelineConfig::default());
    }
    let json = std::fs::read_to_string(path)?;
    let config: PipelineConfig = serde_json::from_str(&json)?;
    config.validate()?;
    info!(path = %path.display(), "configuration loaded");
    Ok(config)
}

pub fn save_config(path: &Path, config: &PipelineConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}
