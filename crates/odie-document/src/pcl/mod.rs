// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF → PCL5 conversion for the archive printer.
//
//   source PDF ──► pdfjam (A4) ──► gs (ljet4) ──► filter ──► output
//                  optional
//
// The filtered PCL5 body can be precomputed into a gzip file next to the
// source; later builds then skip the tools entirely.

mod envelope;
mod filter;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll, ready};

use flate2::Compression;
use flate2::write::{GzDecoder, GzEncoder};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::ChildStdout;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use odie_core::config::{PipelineConfig, ToolConfig, pcl5_cache_path};
use odie_core::types::{PdfSource, PrintSettings};

use crate::error::{PipelineError, StageFailure};
use crate::pipeline::{PipelineCoordinator, spawn_stage, tool};

pub use envelope::{UEL, pjl_footer, pjl_header};
pub use filter::{FilterRule, filter_stream, pcl5_rules};

/// Ghostscript arguments for PCL5e output with the margins our printers need.
const GS_ARGS: &[&str] = &[
    "-q",
    "-dNOPAUSE",
    "-dBATCH",
    "-dPARANOIDSAFER",
    "-dQUIET",
    "-sDEVICE=ljet4",
    "-dIjsUseOutputFD",
    "-sOutputFile=-",
    "-c",
    "<</.HWMargins[0.27 0 1 6.84 ] /Margins[-2.2 -57]>>setpagedevice",
    "-",
];

const A4_ARGS: &[&str] = &["--a4paper", "--quiet", "--outfile", "/dev/stdout", "/dev/stdin"];

/// Compressed bytes moved per step between the cache file and the codec.
const CACHE_CHUNK: usize = 16 * 1024;

/// Feeds in-memory PDF bytes into the first stage.
type Feeder = JoinHandle<std::io::Result<()>>;

/// Produces printer-ready PCL5 for PDF documents.
#[derive(Debug, Clone)]
pub struct PclJobBuilder {
    tools: ToolConfig,
    block_size: usize,
}

impl PclJobBuilder {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            tools: config.tools.clone(),
            block_size: config.printing.filter_block_size,
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Write one complete document: PJL header, filtered PCL5 body, PJL
    /// footer. The output is not closed, so several documents can share it.
    pub async fn write_document<W>(
        &self,
        source: &PdfSource,
        settings: &PrintSettings,
        normalize_to_a4: bool,
        output: &mut W,
    ) -> Result<u64, PipelineError>
    where
        W: AsyncWrite + Unpin,
    {
        let header = pjl_header(settings);
        output.write_all(&header).await.map_err(PipelineError::Output)?;
        let body = self.build(source, normalize_to_a4, output).await?;
        let footer = pjl_footer();
        output.write_all(&footer).await.map_err(PipelineError::Output)?;
        Ok((header.len() + footer.len()) as u64 + body)
    }

    /// Stream the filtered PCL5 body of `source` into `output`.
    ///
    /// A cached body is used for normalized file sources when one exists.
    #[instrument(skip_all, fields(source = %source.describe()))]
    pub async fn build<W>(
        &self,
        source: &PdfSource,
        normalize_to_a4: bool,
        output: &mut W,
    ) -> Result<u64, PipelineError>
    where
        W: AsyncWrite + Unpin,
    {
        if let (PdfSource::Path(path), true) = (source, normalize_to_a4) {
            let cache = pcl5_cache_path(path);
            if tokio::fs::try_exists(&cache).await.unwrap_or(false) {
                debug!(cache = %cache.display(), "using cached PCL5");
                return replay_cache(&cache, output).await;
            }
        }
        self.convert(source, normalize_to_a4, output).await
    }

    /// Run the tool chain and filter its output.
    async fn convert<W>(
        &self,
        source: &PdfSource,
        normalize_to_a4: bool,
        output: &mut W,
    ) -> Result<u64, PipelineError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut coordinator = PipelineCoordinator::new();
        let (mut pcl, feeder) = match self.spawn_chain(source, normalize_to_a4, &mut coordinator) {
            Ok(chain) => chain,
            Err(err) => {
                coordinator.await_all().await;
                return Err(err);
            }
        };

        let filtered = filter_stream(&mut pcl, output, pcl5_rules(), self.block_size).await;
        drop(pcl);
        let fed = match feeder {
            Some(feeder) => feeder.await.unwrap_or_else(|err| Err(std::io::Error::other(err))),
            None => Ok(()),
        };

        let labels = coordinator.await_all().await;
        // Stages die of a broken pipe once the output is gone.
        let filtered = match filtered {
            Err(err @ PipelineError::Output(_)) => return Err(err),
            other => other,
        };
        if !labels.is_empty() {
            return Err(StageFailure { labels }.into());
        }
        fed?;
        filtered
    }

    /// Start the tool chain for `source` and hand back the PCL5 output of
    /// its last stage.
    fn spawn_chain(
        &self,
        source: &PdfSource,
        normalize_to_a4: bool,
        coordinator: &mut PipelineCoordinator,
    ) -> Result<(ChildStdout, Option<Feeder>), PipelineError> {
        let mut pending_input = None;
        let mut input = match source {
            PdfSource::Path(path) => Stdio::from(std::fs::File::open(path)?),
            PdfSource::Bytes(bytes) => {
                pending_input = Some(bytes.clone());
                Stdio::piped()
            }
        };
        let mut feeder = None;

        if normalize_to_a4 {
            let mut command = tool(&self.tools.pdfjam);
            command.args(A4_ARGS).stdin(input).stdout(Stdio::piped());
            let mut child = spawn_stage("a4 conversion", &mut command)?;
            feeder = pending_input.take().and_then(|bytes| feed(&mut child, bytes));
            let a4 = child.stdout.take();
            coordinator.register("a4 conversion", child);
            input = match a4 {
                Some(stdout) => stdout.try_into()?,
                None => Stdio::null(),
            };
        }

        let mut command = tool(&self.tools.ghostscript);
        command.args(GS_ARGS).stdin(input).stdout(Stdio::piped());
        let mut child = spawn_stage("ghostscript", &mut command)?;
        if let Some(bytes) = pending_input.take() {
            feeder = feed(&mut child, bytes);
        }
        let pcl = child.stdout.take();
        coordinator.register("ghostscript", child);

        let pcl = pcl.ok_or_else(|| std::io::Error::other("ghostscript output not captured"))?;
        Ok((pcl, feeder))
    }

    /// Convert `pdf` once and store the filtered body as `<stem>.pcl5.gz`
    /// beside it. Returns the cache path.
    #[instrument(skip_all, fields(pdf = %pdf.display()))]
    pub async fn cache_pdf(&self, pdf: &Path) -> Result<PathBuf, PipelineError> {
        let cache = pcl5_cache_path(pdf);
        let mut staged = cache.clone().into_os_string();
        staged.push(".tmp");
        let staged = PathBuf::from(staged);

        let mut sink = GzipFile::new(File::create(&staged).await?);
        let converted = self
            .convert(&PdfSource::Path(pdf.to_path_buf()), true, &mut sink)
            .await;
        let sizes = match converted {
            Ok(body) => sink
                .finish()
                .await
                .map(|compressed| (body, compressed))
                .map_err(PipelineError::Io),
            Err(err) => {
                drop(sink);
                Err(err)
            }
        };
        let renamed = match sizes {
            Ok(sizes) => tokio::fs::rename(&staged, &cache)
                .await
                .map(|()| sizes)
                .map_err(PipelineError::Io),
            Err(err) => Err(err),
        };
        let (body, compressed) = match renamed {
            Ok(sizes) => sizes,
            Err(err) => {
                let _ = tokio::fs::remove_file(&staged).await;
                return Err(err);
            }
        };
        info!(cache = %cache.display(), body, compressed, "PCL5 cached");
        Ok(cache)
    }
}

/// Write `bytes` into the child's input on a separate task.
fn feed(child: &mut tokio::process::Child, bytes: Vec<u8>) -> Option<Feeder> {
    let mut stdin = child.stdin.take()?;
    Some(tokio::spawn(async move {
        match stdin.write_all(&bytes).await {
            Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
            other => other,
        }
    }))
}

/// Stream the decompressed cache into `output`, one chunk at a time.
async fn replay_cache<W>(cache: &Path, output: &mut W) -> Result<u64, PipelineError>
where
    W: AsyncWrite + Unpin,
{
    let mut file = File::open(cache).await?;
    let mut decoder = GzDecoder::new(Vec::new());
    let mut chunk = vec![0u8; CACHE_CHUNK];
    let mut written = 0u64;
    loop {
        let read = file.read(&mut chunk).await?;
        if read == 0 {
            decoder.try_finish()?;
        } else {
            decoder.write_all(&chunk[..read])?;
        }
        let decoded = decoder.get_mut();
        if !decoded.is_empty() {
            output.write_all(decoded).await.map_err(PipelineError::Output)?;
            written += decoded.len() as u64;
            decoded.clear();
        }
        if read == 0 {
            break;
        }
    }
    output.flush().await.map_err(PipelineError::Output)?;
    Ok(written)
}

/// Gzip compressor in front of a file. Compressed bytes go to the file
/// whenever a chunk's worth has built up, so the body is never held whole.
struct GzipFile {
    encoder: GzEncoder<Vec<u8>>,
    file: File,
    compressed: u64,
}

impl GzipFile {
    fn new(file: File) -> Self {
        Self {
            encoder: GzEncoder::new(Vec::new(), Compression::default()),
            file,
            compressed: 0,
        }
    }

    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        while !self.encoder.get_ref().is_empty() {
            let written = ready!(Pin::new(&mut self.file).poll_write(cx, self.encoder.get_ref()))?;
            if written == 0 {
                return Poll::Ready(Err(std::io::ErrorKind::WriteZero.into()));
            }
            self.encoder.get_mut().drain(..written);
            self.compressed += written as u64;
        }
        Poll::Ready(Ok(()))
    }

    /// Write the gzip trailer and sync the file. Returns the compressed size.
    async fn finish(mut self) -> std::io::Result<u64> {
        self.encoder.try_finish()?;
        std::future::poll_fn(|cx| self.poll_drain(cx)).await?;
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(self.compressed)
    }
}

impl AsyncWrite for GzipFile {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.get_mut();
        if this.encoder.get_ref().len() >= CACHE_CHUNK {
            ready!(this.poll_drain(cx))?;
        }
        Poll::Ready(this.encoder.write(buf))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.file).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.poll_flush(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn fake_tool(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    /// Builder whose gs and pdfjam pass their input through, recording their
    /// arguments in `<tool>.args`.
    fn passthrough(dir: &Path) -> PclJobBuilder {
        let mut config = PipelineConfig::default();
        config.tools.ghostscript = fake_tool(
            dir,
            "gs",
            &format!("printf '%s\\n' \"$@\" > {}/gs.args; exec cat", dir.display()),
        );
        config.tools.pdfjam = fake_tool(
            dir,
            "pdfjam",
            &format!("printf '%s\\n' \"$@\" > {}/pdfjam.args; exec cat", dir.display()),
        );
        PclJobBuilder::new(&config).with_block_size(64)
    }

    const PCL: &[u8] = b"\x1bE\x1b&l1H\x1b&l26Abody\x1b&l1X";

    #[tokio::test]
    async fn filters_ghostscript_output() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("exam.pdf");
        std::fs::write(&pdf, PCL).unwrap();
        let builder = passthrough(dir.path());

        let mut output = Vec::new();
        let written = builder
            .build(&PdfSource::Path(pdf), true, &mut output)
            .await
            .unwrap();
        assert_eq!(output, b"\x1bEbody");
        assert_eq!(written, output.len() as u64);

        let gs_args = std::fs::read_to_string(dir.path().join("gs.args")).unwrap();
        assert_eq!(gs_args.lines().collect::<Vec<_>>(), GS_ARGS);
        let pdfjam_args = std::fs::read_to_string(dir.path().join("pdfjam.args")).unwrap();
        assert_eq!(pdfjam_args.lines().collect::<Vec<_>>(), A4_ARGS);
    }

    #[tokio::test]
    async fn in_memory_source_without_normalization() {
        let dir = tempfile::tempdir().unwrap();
        let builder = passthrough(dir.path());

        let mut output = Vec::new();
        builder
            .build(&PdfSource::Bytes(PCL.to_vec()), false, &mut output)
            .await
            .unwrap();
        assert_eq!(output, b"\x1bEbody");
        assert!(!dir.path().join("pdfjam.args").exists());
    }

    #[tokio::test]
    async fn document_is_wrapped_in_pjl() {
        let dir = tempfile::tempdir().unwrap();
        let builder = passthrough(dir.path());

        let mut output = Vec::new();
        builder
            .write_document(
                &PdfSource::Bytes(PCL.to_vec()),
                &PrintSettings::regular("2222"),
                true,
                &mut output,
            )
            .await
            .unwrap();
        let mut expected = pjl_header(&PrintSettings::regular("2222"));
        expected.extend_from_slice(b"\x1bEbody");
        expected.extend_from_slice(&pjl_footer());
        assert_eq!(output, expected);
    }

    #[tokio::test]
    async fn failing_stage_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.tools.ghostscript = fake_tool(dir.path(), "gs", "cat > /dev/null; exit 1");
        config.tools.pdfjam = fake_tool(dir.path(), "pdfjam", "exec cat");
        let builder = PclJobBuilder::new(&config);

        let mut output = Vec::new();
        let err = builder
            .build(&PdfSource::Bytes(PCL.to_vec()), true, &mut output)
            .await
            .unwrap_err();
        assert_eq!(err.failed_stages(), vec!["ghostscript".to_string()]);
    }

    #[tokio::test]
    async fn missing_source_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let builder = passthrough(dir.path());
        let mut output = Vec::new();
        let err = builder
            .build(&PdfSource::Path(dir.path().join("gone.pdf")), true, &mut output)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[tokio::test]
    async fn cached_body_replaces_the_tools() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("exam.pdf");
        std::fs::write(&pdf, PCL).unwrap();

        let cache = passthrough(dir.path()).cache_pdf(&pdf).await.unwrap();
        assert_eq!(cache, dir.path().join("exam.pcl5.gz"));
        assert!(!dir.path().join("exam.pcl5.gz.tmp").exists());

        let mut config = PipelineConfig::default();
        config.tools.ghostscript = "odie-no-such-tool".into();
        config.tools.pdfjam = "odie-no-such-tool".into();
        let offline = PclJobBuilder::new(&config);

        let mut output = Vec::new();
        offline
            .build(&PdfSource::Path(pdf.clone()), true, &mut output)
            .await
            .unwrap();
        assert_eq!(output, b"\x1bEbody");

        // Without normalization the cache does not apply.
        let err = offline
            .build(&PdfSource::Path(pdf), false, &mut Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.failed_stages(), vec!["ghostscript".to_string()]);
    }

    /// Printable bytes that compress poorly and match no filter rule.
    fn noise(len: usize) -> Vec<u8> {
        let mut state = 0x2545_f491_u32;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                b'A' + (state >> 16) as u8 % 26
            })
            .collect()
    }

    #[tokio::test]
    async fn large_cache_streams_through_in_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("thesis.pdf");
        let body = noise(8 * CACHE_CHUNK + 123);
        std::fs::write(&pdf, &body).unwrap();

        let builder = passthrough(dir.path()).with_block_size(4096);
        let cache = builder.cache_pdf(&pdf).await.unwrap();
        assert!(std::fs::metadata(&cache).unwrap().len() > CACHE_CHUNK as u64);

        std::fs::remove_file(dir.path().join("gs")).unwrap();
        let mut output = Vec::new();
        let written = builder
            .build(&PdfSource::Path(pdf), true, &mut output)
            .await
            .unwrap();
        assert_eq!(written, body.len() as u64);
        assert_eq!(output, body);
    }

    #[tokio::test]
    async fn closed_output_is_not_blamed_on_the_stages() {
        let dir = tempfile::tempdir().unwrap();
        let builder = passthrough(dir.path());
        let (mut writer, mut reader) = tokio::io::duplex(1024);
        // Takes the header and part of the body, then hangs up.
        let printer = tokio::spawn(async move {
            let mut taken = vec![0u8; 64 * 1024];
            reader.read_exact(&mut taken).await.unwrap();
        });

        // Far more than a pipe buffer, so the tools are still writing when
        // the output goes away.
        let err = builder
            .write_document(
                &PdfSource::Bytes(noise(4 * 1024 * 1024)),
                &PrintSettings::regular("2222"),
                true,
                &mut writer,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Output(_)), "{err:?}");
        assert!(err.failed_stages().is_empty());
        printer.await.unwrap();
    }
}
