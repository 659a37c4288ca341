// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Barcode stamping for stored exam documents.
//
// The stamp is produced by a chain of external tools:
//
//   1. barcode    ps2pdf renders the EAN-13 PostScript into a one-page PDF
//   2. background pdftk puts that page behind page 1 of the document,
//                 dropping every other page
//   3. page split pdfjam copies pages 2..N into a scratch file
//   4. page merge pdfjam joins the stamped first page and the rest
//
// Steps 2 and 3 only read the stored file and run concurrently; 3 and 4 are
// skipped for single-page documents. The result is written beside the stored
// file and renamed over it only after every stage succeeded.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, instrument, warn};

use odie_barcode::{Barcode, BarcodeCodec};
use odie_core::config::{BarcodeConfig, PipelineConfig, ToolConfig, document_path, pcl5_cache_path};
use odie_core::types::{DocumentId, DocumentRef};

use crate::error::{BakeError, PipelineError, StageFailure};
use crate::pipeline::{PipelineCoordinator, feed_and_drain, spawn_stage, tool};

/// Bundled EAN-13 PostScript renderer.
const EAN13_PRELUDE: &str = include_str!("../assets/ean13.ps");

/// What `bake` did to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BakeOutcome {
    Stamped { barcode: Barcode },
    /// Imported from the old archive, the paper copy already has a barcode.
    SkippedLegacy,
    /// Nothing to stamp.
    SkippedNoFile,
}

/// Per-document mutual exclusion, so two bakes of the same document never
/// replace its file at the same time.
#[derive(Debug, Clone, Default)]
pub struct DocumentLocks {
    locks: Arc<Mutex<HashMap<DocumentId, Arc<tokio::sync::Mutex<()>>>>>,
}

impl DocumentLocks {
    pub async fn lock(&self, id: DocumentId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Forget locks nobody holds or waits for.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(id).or_default())
        };
        lock.lock_owned().await
    }
}

/// Stamps barcodes onto stored documents.
#[derive(Debug, Clone)]
pub struct BarcodeBaker {
    codec: BarcodeCodec,
    tools: ToolConfig,
    placement: BarcodeConfig,
    documents_dir: PathBuf,
    temp_dir: PathBuf,
    locks: DocumentLocks,
}

impl BarcodeBaker {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            codec: BarcodeCodec::new(Arc::new(config.namespaces.clone())),
            tools: config.tools.clone(),
            placement: config.barcode.clone(),
            documents_dir: config.documents_dir.clone(),
            temp_dir: config.temp_dir.clone(),
            locks: DocumentLocks::default(),
        }
    }

    /// Share locks with other bakers working on the same document store.
    pub fn with_locks(mut self, locks: DocumentLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Put the document's barcode onto the first page of its stored file.
    ///
    /// On error the stored file is left exactly as it was.
    #[instrument(skip(self, doc), fields(document_id = %doc.id, pages = doc.page_count))]
    pub async fn bake(&self, doc: &DocumentRef) -> Result<BakeOutcome, BakeError> {
        if doc.has_legacy_barcode {
            debug!("legacy document already carries a barcode");
            return Ok(BakeOutcome::SkippedLegacy);
        }
        if !doc.has_stored_file {
            debug!("document has no file");
            return Ok(BakeOutcome::SkippedNoFile);
        }

        let barcode = self
            .codec
            .encode_current(doc.id.0)
            .map_err(|source| BakeError::Encoding {
                document_id: doc.id,
                source,
            })?;

        let _guard = self.locks.lock(doc.id).await;
        let doc_path = document_path(&self.documents_dir, doc.id);
        let rest_path = self.temp_dir.join(format!("{}-rest.pdf", doc.id));
        let staged_path = doc_path.with_extension("pdf.baking");

        let result = self
            .stamp(&barcode, &doc_path, &rest_path, &staged_path, doc.page_count)
            .await;

        for scratch in [&rest_path, &staged_path] {
            remove_if_present(scratch).await;
        }

        result.map_err(|source| BakeError::Pipeline {
            document_id: doc.id,
            source,
        })?;
        // A cached PCL5 body still shows the page without the barcode.
        remove_if_present(&pcl5_cache_path(&doc_path)).await;
        info!(%barcode, "barcode stamped");
        Ok(BakeOutcome::Stamped { barcode })
    }

    async fn stamp(
        &self,
        barcode: &Barcode,
        doc_path: &Path,
        rest_path: &Path,
        staged_path: &Path,
        page_count: u32,
    ) -> Result<(), PipelineError> {
        let postscript = self.postscript(barcode).await?;
        let barcode_pdf = self.render_barcode(&postscript).await?;

        if page_count > 1 {
            tokio::fs::create_dir_all(&self.temp_dir).await?;
        }
        let first_page = self
            .stamp_first_page(&barcode_pdf, doc_path, rest_path, page_count)
            .await?;

        if page_count > 1 {
            self.merge_pages(&first_page, rest_path, staged_path).await?;
        } else {
            tokio::fs::write(staged_path, &first_page).await?;
        }

        tokio::fs::rename(staged_path, doc_path).await?;
        Ok(())
    }

    /// The PostScript program drawing this barcode.
    async fn postscript(&self, barcode: &Barcode) -> Result<Vec<u8>, PipelineError> {
        let mut program = match &self.placement.postscript_prelude {
            Some(path) => tokio::fs::read(path).await?,
            None => EAN13_PRELUDE.as_bytes().to_vec(),
        };
        program.extend_from_slice(
            format!(
                "\n{x} {y} moveto ({barcode}) ean13\nshowpage\n",
                x = self.placement.x,
                y = self.placement.y,
            )
            .as_bytes(),
        );
        Ok(program)
    }

    /// Stage 1: PostScript to a single-page PDF.
    async fn render_barcode(&self, postscript: &[u8]) -> Result<Vec<u8>, PipelineError> {
        let mut command = tool(&self.tools.ps2pdf);
        command
            .args(["-", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped());
        let mut child = spawn_stage("barcode", &mut command)?;
        let (stdin, stdout) = (child.stdin.take(), child.stdout.take());

        let mut coordinator = PipelineCoordinator::new();
        coordinator.register("barcode", child);
        let output = feed_and_drain(stdin, stdout, postscript).await;
        check(coordinator).await?;
        Ok(output?)
    }

    /// Stages 2 and 3: stamp page 1 and, for longer documents, split off the
    /// remaining pages at the same time.
    async fn stamp_first_page(
        &self,
        barcode_pdf: &[u8],
        doc_path: &Path,
        rest_path: &Path,
        page_count: u32,
    ) -> Result<Vec<u8>, PipelineError> {
        let mut coordinator = PipelineCoordinator::new();

        if page_count > 1 {
            let mut command = tool(&self.tools.pdfjam);
            command
                .args(["--nup", "1x1"])
                .arg(doc_path)
                .arg("2-")
                .arg("--outfile")
                .arg(rest_path)
                .stdin(Stdio::null())
                .stdout(Stdio::null());
            coordinator.register("page split", spawn_stage("page split", &mut command)?);
        }

        let mut command = tool(&self.tools.pdftk);
        command
            .arg("-")
            .arg("background")
            .arg(doc_path)
            .args(["output", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped());
        let mut child = match spawn_stage("background", &mut command) {
            Ok(child) => child,
            Err(err) => {
                coordinator.await_all().await;
                return Err(err);
            }
        };
        let (stdin, stdout) = (child.stdin.take(), child.stdout.take());
        coordinator.register("background", child);

        let output = feed_and_drain(stdin, stdout, barcode_pdf).await;
        check(coordinator).await?;
        Ok(output?)
    }

    /// Stage 4: stamped first page followed by the split-off rest.
    async fn merge_pages(
        &self,
        first_page: &[u8],
        rest_path: &Path,
        staged_path: &Path,
    ) -> Result<(), PipelineError> {
        let mut command = tool(&self.tools.pdfjam);
        command
            .args(["--fitpaper", "true", "/dev/stdin"])
            .arg(rest_path)
            .arg("--outfile")
            .arg(staged_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null());
        let mut child = spawn_stage("page merge", &mut command)?;
        let stdin = child.stdin.take();

        let mut coordinator = PipelineCoordinator::new();
        coordinator.register("page merge", child);
        let fed = feed_and_drain(stdin, None, first_page).await;
        check(coordinator).await?;
        fed?;
        Ok(())
    }
}

/// Wait for every stage and turn failures into an error.
async fn check(coordinator: PipelineCoordinator) -> Result<(), StageFailure> {
    let labels = coordinator.await_all().await;
    if labels.is_empty() {
        Ok(())
    } else {
        Err(StageFailure { labels })
    }
}

/// Best-effort removal; a file that is already gone is fine.
async fn remove_if_present(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "could not remove file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    /// Write an executable shell script standing in for an external tool.
    fn fake_tool(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        config: PipelineConfig,
    }

    /// A document store with `1.pdf` and tools that never succeed unless
    /// replaced.
    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let documents = dir.path().join("documents");
        std::fs::create_dir_all(&documents).unwrap();
        std::fs::write(documents.join("1.pdf"), b"%PDF original").unwrap();

        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let failing = fake_tool(&bin, "fail", "exit 1");

        let mut config = PipelineConfig {
            documents_dir: documents,
            temp_dir: dir.path().join("tmp"),
            ..PipelineConfig::default()
        };
        config.tools.ps2pdf = failing.clone();
        config.tools.pdftk = failing.clone();
        config.tools.pdfjam = failing;
        Fixture { _dir: dir, config }
    }

    fn bin(fixture: &Fixture) -> PathBuf {
        fixture.config.documents_dir.parent().unwrap().join("bin")
    }

    fn stored(fixture: &Fixture) -> Vec<u8> {
        std::fs::read(fixture.config.documents_dir.join("1.pdf")).unwrap()
    }

    #[tokio::test]
    async fn legacy_documents_are_not_touched() {
        let mut fixture = fixture();
        fixture.config.tools.ps2pdf = "odie-no-such-tool".into();
        let baker = BarcodeBaker::new(&fixture.config);

        let doc = DocumentRef {
            has_legacy_barcode: true,
            ..DocumentRef::new(1, 3)
        };
        assert_eq!(baker.bake(&doc).await.unwrap(), BakeOutcome::SkippedLegacy);
        assert_eq!(stored(&fixture), b"%PDF original");
    }

    #[tokio::test]
    async fn documents_without_file_are_skipped() {
        let fixture = fixture();
        let baker = BarcodeBaker::new(&fixture.config);
        let doc = DocumentRef {
            has_stored_file: false,
            ..DocumentRef::new(1, 1)
        };
        assert_eq!(baker.bake(&doc).await.unwrap(), BakeOutcome::SkippedNoFile);
    }

    #[tokio::test]
    async fn failing_barcode_stage_leaves_file_untouched() {
        let fixture = fixture();
        let baker = BarcodeBaker::new(&fixture.config);

        let err = baker.bake(&DocumentRef::new(1, 1)).await.unwrap_err();
        assert_eq!(err.failed_stages(), vec!["barcode".to_string()]);
        assert_eq!(stored(&fixture), b"%PDF original");
    }

    #[tokio::test]
    async fn single_page_document_is_replaced_by_stamped_page() {
        let mut fixture = fixture();
        let bin = bin(&fixture);
        fixture.config.tools.ps2pdf = fake_tool(&bin, "ps2pdf", "cat > /dev/null; printf '%%PDF barcode'");
        fixture.config.tools.pdftk = fake_tool(&bin, "pdftk", "cat > /dev/null; printf '%%PDF stamped'");
        let baker = BarcodeBaker::new(&fixture.config);

        let outcome = baker.bake(&DocumentRef::new(1, 1)).await.unwrap();
        assert_eq!(
            outcome,
            BakeOutcome::Stamped {
                barcode: Barcode::parse("2214100000015").unwrap()
            }
        );
        assert_eq!(stored(&fixture), b"%PDF stamped");
    }

    #[tokio::test]
    async fn stamping_drops_the_stale_print_cache() {
        let mut fixture = fixture();
        let cache = fixture.config.documents_dir.join("1.pcl5.gz");
        std::fs::write(&cache, b"unstamped body").unwrap();

        // A failed bake leaves the document, so the cache is still valid.
        let err = BarcodeBaker::new(&fixture.config)
            .bake(&DocumentRef::new(1, 1))
            .await
            .unwrap_err();
        assert_eq!(err.failed_stages(), vec!["barcode".to_string()]);
        assert!(cache.exists());

        let bin = bin(&fixture);
        fixture.config.tools.ps2pdf = fake_tool(&bin, "ps2pdf", "cat > /dev/null; printf '%%PDF barcode'");
        fixture.config.tools.pdftk = fake_tool(&bin, "pdftk", "cat > /dev/null; printf '%%PDF stamped'");
        BarcodeBaker::new(&fixture.config)
            .bake(&DocumentRef::new(1, 1))
            .await
            .unwrap();
        assert_eq!(stored(&fixture), b"%PDF stamped");
        assert!(!cache.exists());
    }

    #[tokio::test]
    async fn failed_page_split_keeps_original_and_cleans_up() {
        let mut fixture = fixture();
        let bin = bin(&fixture);
        fixture.config.tools.ps2pdf = fake_tool(&bin, "ps2pdf", "cat > /dev/null; printf '%%PDF barcode'");
        fixture.config.tools.pdftk = fake_tool(&bin, "pdftk", "cat > /dev/null; printf '%%PDF stamped'");
        let baker = BarcodeBaker::new(&fixture.config);

        let err = baker.bake(&DocumentRef::new(1, 4)).await.unwrap_err();
        assert_eq!(err.failed_stages(), vec!["page split".to_string()]);
        assert_eq!(stored(&fixture), b"%PDF original");
        assert!(!fixture.config.temp_dir.join("1-rest.pdf").exists());
    }

    #[tokio::test]
    async fn multi_page_document_is_reassembled() {
        let mut fixture = fixture();
        let bin = bin(&fixture);
        fixture.config.tools.ps2pdf = fake_tool(&bin, "ps2pdf", "cat > /dev/null; printf '%%PDF barcode'");
        fixture.config.tools.pdftk = fake_tool(&bin, "pdftk", "cat > /dev/null; printf '%%PDF stamped'");
        // Split: `--nup 1x1 <doc> 2- --outfile <rest>`.
        // Merge: `--fitpaper true /dev/stdin <rest> --outfile <out>`.
        fixture.config.tools.pdfjam = fake_tool(
            &bin,
            "pdfjam",
            r#"if [ "$1" = "--nup" ]; then printf ' rest' > "$6"; else { cat; cat "$4"; } > "$6"; fi"#,
        );
        let baker = BarcodeBaker::new(&fixture.config);

        baker.bake(&DocumentRef::new(1, 4)).await.unwrap();
        assert_eq!(stored(&fixture), b"%PDF stamped rest");
        assert!(!fixture.config.temp_dir.join("1-rest.pdf").exists());
    }

    #[tokio::test]
    async fn postscript_carries_barcode_and_position() {
        let fixture = fixture();
        let baker = BarcodeBaker::new(&fixture.config);
        let barcode = Barcode::parse("2214100000015").unwrap();
        let program = String::from_utf8(baker.postscript(&barcode).await.unwrap()).unwrap();
        assert!(program.contains("/ean13 {"));
        assert!(program.ends_with("350 680 moveto (2214100000015) ean13\nshowpage\n"));
    }

    #[tokio::test]
    async fn same_document_bakes_are_serialized() {
        let locks = DocumentLocks::default();
        let held = locks.lock(DocumentId(7)).await;

        let blocked = tokio::time::timeout(Duration::from_millis(50), locks.lock(DocumentId(7))).await;
        assert!(blocked.is_err());
        let other = tokio::time::timeout(Duration::from_millis(50), locks.lock(DocumentId(8))).await;
        assert!(other.is_ok());

        drop(held);
        let reacquired = tokio::time::timeout(Duration::from_millis(50), locks.lock(DocumentId(7))).await;
        assert!(reacquired.is_ok());
    }
}
