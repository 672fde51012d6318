//! In-process conversion: the filled HTML goes through the crate's own
//! layout engine and printpdf.

use std::path::Path;

use async_trait::async_trait;

use super::{verify_output, AttemptOutcome, BackendId, Capability, ConversionBackend, ConversionJob};
use crate::pipeline::{generate_pdf, PipelineConfig};

pub struct NativeConverter {
    enabled: bool,
    page: PipelineConfig,
}

impl NativeConverter {
    pub fn new(page: PipelineConfig) -> Self {
        Self {
            enabled: true,
            page,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            page: PipelineConfig::a4_landscape(),
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Default for NativeConverter {
    fn default() -> Self {
        Self::new(PipelineConfig::a4_landscape())
    }
}

fn convert_file(input: &Path, output: &Path, page: &PipelineConfig) -> Result<(), String> {
    let bytes = std::fs::read(input).map_err(|e| format!("reading {}: {e}", input.display()))?;
    let html = String::from_utf8(bytes)
        .map_err(|_| format!("{} is not valid UTF-8", input.display()))?;
    let (pdf, layout) = generate_pdf(&html, page)?;
    log::debug!(
        "native: {} page(s), {} bytes",
        layout.pages.len(),
        pdf.len()
    );
    std::fs::write(output, pdf).map_err(|e| format!("writing {}: {e}", output.display()))
}

#[async_trait]
impl ConversionBackend for NativeConverter {
    fn id(&self) -> BackendId {
        BackendId::Native
    }

    async fn probe(&self) -> Capability {
        if self.enabled {
            Capability::Ready
        } else {
            Capability::Unavailable("disabled in configuration".into())
        }
    }

    async fn attempt(&self, job: &ConversionJob) -> AttemptOutcome {
        if let Capability::Unavailable(reason) = self.probe().await {
            return AttemptOutcome::Unavailable(reason);
        }
        let input = job.input.clone();
        let output = job.output.clone();
        let page = self.page.clone();
        match tokio::task::spawn_blocking(move || convert_file(&input, &output, &page)).await {
            Ok(Ok(())) => verify_output(job).await,
            Ok(Err(reason)) => AttemptOutcome::Failed(reason),
            Err(e) => AttemptOutcome::Failed(format!("layout task aborted: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CertificateRequest, Gender, RenderContext};

    fn job(dir: &Path, html: &[u8]) -> ConversionJob {
        let input = dir.join("in.html");
        std::fs::write(&input, html).unwrap();
        let req = CertificateRequest::new("A", "B", "C", "D", Gender::Other);
        ConversionJob {
            input,
            output: dir.join("out.pdf"),
            context: RenderContext::new(&req),
        }
    }

    #[tokio::test]
    async fn converts_html_to_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), b"<p>Hello <b>world</b></p>");
        assert_eq!(NativeConverter::default().attempt(&job).await, AttemptOutcome::Success);
        let bytes = std::fs::read(&job.output).unwrap();
        assert_eq!(&bytes[..5], b"%PDF-");
    }

    #[tokio::test]
    async fn empty_document_fails() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), b"<html><body><!-- nothing --></body></html>");
        let outcome = NativeConverter::default().attempt(&job).await;
        assert!(matches!(outcome, AttemptOutcome::Failed(ref r) if r.contains("no renderable content")));
        assert!(!job.output.exists());
    }

    #[tokio::test]
    async fn non_utf8_fails() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), &[0xff, 0xfe, 0x00]);
        assert!(matches!(
            NativeConverter::default().attempt(&job).await,
            AttemptOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn disabled_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), b"<p>x</p>");
        assert!(matches!(
            NativeConverter::disabled().attempt(&job).await,
            AttemptOutcome::Unavailable(_)
        ));
    }
}
