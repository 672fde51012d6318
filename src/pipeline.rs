//! Pipeline – the in-process HTML → PDF path used by the native backend, and
//! [`CertificateService`], which runs a whole certificate request: template
//! loading, substitution, the backend fallback chain and cleanup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;
use crate::convert::{
    AttemptSummary, BackendId, Capability, ConversionBackend, ConversionJob, ConversionOrchestrator,
    ExternalProcessConverter, NativeConverter, SyntheticGenerator,
};
use crate::document::TemplateDocument;
use crate::error::RenderError;
use crate::layout::compute_layout;
use crate::layout_config::LayoutConfig;
use crate::lifecycle::{release, IntermediateFile, WorkingFileSet};
use crate::pagination::{paginate, PAGE_MARGIN_PT};
use crate::record::{CertificateRequest, RenderContext};
use crate::render::render_pdf;
use crate::substitute::{substitute, SubstitutionReport};
use crate::templates::load_template;

pub const CONTENT_TYPE_PDF: &str = "application/pdf";
pub const SERVICE_NAME: &str = "certificate-generator";

/// Page orientation for the generated PDF.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageOrientation {
    /// Portrait mode: height > width.
    #[default]
    Portrait,
    /// Landscape mode: width > height.
    Landscape,
}

/// Page geometry for the native layout engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fallback PDF title when the template has no `<title>`.
    pub title: String,
    /// Page width in points (default: A4 = 595.28).
    pub page_width: f32,
    /// Page height in points (default: A4 = 841.89).
    pub page_height: f32,
    /// Page margin in points (default: 40).
    pub page_margin: f32,
    /// Swaps effective width/height when `Landscape`.
    pub orientation: PageOrientation,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            title: "Certificate".to_string(),
            page_width: 595.28,
            page_height: 841.89,
            page_margin: PAGE_MARGIN_PT,
            orientation: PageOrientation::Portrait,
        }
    }
}

impl PipelineConfig {
    pub fn effective_width(&self) -> f32 {
        match self.orientation {
            PageOrientation::Portrait => self.page_width,
            PageOrientation::Landscape => self.page_height,
        }
    }

    pub fn effective_height(&self) -> f32 {
        match self.orientation {
            PageOrientation::Portrait => self.page_height,
            PageOrientation::Landscape => self.page_width,
        }
    }

    /// A4 landscape, the certificate's native format.
    pub fn a4_landscape() -> Self {
        Self {
            orientation: PageOrientation::Landscape,
            ..Self::default()
        }
    }
}

/// HTML string → PDF bytes plus the layout they were drawn from.
///
/// Fails when the document lays out to nothing visible.
pub fn generate_pdf(
    html: &str,
    config: &PipelineConfig,
) -> Result<(Vec<u8>, LayoutConfig), String> {
    let doc = TemplateDocument::parse(html);
    let eff_w = config.effective_width();
    let eff_h = config.effective_height();

    let boxes = compute_layout(&doc, eff_w, config.page_margin)?;
    if !boxes.iter().any(|b| b.has_content()) {
        return Err("document has no renderable content".to_string());
    }

    let title = doc.title.as_deref().unwrap_or(&config.title);
    let layout_config = paginate(&boxes, title, eff_w, eff_h, config.page_margin);
    let pdf_bytes = render_pdf(&layout_config)?;
    Ok((pdf_bytes, layout_config))
}

// ---------------------------------------------------------------------------
// Certificate service
// ---------------------------------------------------------------------------

/// A finished certificate on disk, ready to hand to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedArtifact {
    pub path: PathBuf,
    pub backend: BackendId,
    pub content_type: &'static str,
    pub download_name: String,
    pub attempts: Vec<AttemptSummary>,
    pub substitution: SubstitutionReport,
}

impl RenderedArtifact {
    /// Delete the artifact once it has been delivered.
    pub fn discard(self) {
        release(&self.path);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BackendHealth {
    pub id: BackendId,
    pub available: bool,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub service: &'static str,
    pub template_present: bool,
    pub backends: Vec<BackendHealth>,
    pub external_executable: Option<String>,
}

/// Renders certificates. Cheap to share behind an `Arc`; each call to
/// [`render`](Self::render) works on its own files.
pub struct CertificateService {
    template_path: PathBuf,
    work_dir: PathBuf,
    orchestrator: ConversionOrchestrator,
}

impl CertificateService {
    /// Default backend chain for the given template and work dir.
    pub fn new(template_path: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        let backends: Vec<Box<dyn ConversionBackend>> = vec![
            Box::new(NativeConverter::default()),
            Box::new(ExternalProcessConverter::default()),
            Box::new(SyntheticGenerator::new()),
        ];
        Self::with_backends(template_path, work_dir, backends)
    }

    pub fn with_backends(
        template_path: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
        backends: Vec<Box<dyn ConversionBackend>>,
    ) -> Self {
        Self {
            template_path: template_path.into(),
            work_dir: work_dir.into(),
            orchestrator: ConversionOrchestrator::new(backends),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, RenderError> {
        config.validate()?;
        let backends = config
            .backend_order
            .iter()
            .map(|id| -> Box<dyn ConversionBackend> {
                match id {
                    BackendId::Native => Box::new(
                        NativeConverter::new(config.native.page.clone())
                            .with_enabled(config.native.enabled),
                    ),
                    BackendId::External => {
                        Box::new(ExternalProcessConverter::from_config(&config.external))
                    }
                    BackendId::Synthetic if config.synthetic.enabled => {
                        Box::new(SyntheticGenerator::new())
                    }
                    BackendId::Synthetic => Box::new(SyntheticGenerator::disabled()),
                }
            })
            .collect();
        Ok(Self::with_backends(
            config.template_path.clone(),
            config.work_dir.clone(),
            backends,
        ))
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Render one certificate, issued today.
    pub async fn render(&self, request: &CertificateRequest) -> Result<RenderedArtifact, RenderError> {
        self.render_with_context(request, RenderContext::new(request))
            .await
    }

    /// Render with a caller-supplied context (fixed issue date).
    pub async fn render_with_context(
        &self,
        request: &CertificateRequest,
        context: RenderContext,
    ) -> Result<RenderedArtifact, RenderError> {
        let mut doc = load_template(&self.template_path).await?;
        let substitution = substitute(&mut doc, &context);

        let files = WorkingFileSet::allocate(&self.work_dir)?;
        let intermediate = IntermediateFile::create(files.intermediate.clone(), &doc.to_html()).await?;
        log::debug!("request {}: filled template at {}", files.id, intermediate.path().display());

        let job = ConversionJob {
            input: intermediate.path().to_path_buf(),
            output: files.output.clone(),
            context,
        };
        let report = self.orchestrator.run(&job).await;
        drop(intermediate);

        match report.into_result() {
            Ok((backend, attempts)) => {
                log::info!("request {}: certificate produced by {backend}", files.id);
                Ok(RenderedArtifact {
                    path: files.output,
                    backend,
                    content_type: CONTENT_TYPE_PDF,
                    download_name: request.download_name(),
                    attempts: attempts.iter().map(AttemptSummary::from).collect(),
                    substitution,
                })
            }
            Err(e) => {
                // A failing backend may have left a partial file behind.
                release(&files.output);
                log::error!("request {}: {e}", files.id);
                Err(e)
            }
        }
    }

    pub async fn health(&self) -> HealthReport {
        let template_present = tokio::fs::metadata(&self.template_path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);

        let mut backends = Vec::new();
        let mut external_executable = None;
        for backend in self.orchestrator.backends() {
            let capability = backend.probe().await;
            let detail = match &capability {
                Capability::Ready => backend.describe().await,
                Capability::Unavailable(reason) => Some(reason.clone()),
            };
            if backend.id() == BackendId::External && capability.is_ready() {
                external_executable = detail.clone();
            }
            backends.push(BackendHealth {
                id: backend.id(),
                available: capability.is_ready(),
                detail,
            });
        }

        let healthy = template_present && backends.iter().any(|b| b.available);
        HealthReport {
            status: if healthy { "healthy" } else { "degraded" },
            service: SERVICE_NAME,
            template_present,
            backends,
            external_executable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_basic() {
        let html = "<h1>Hello</h1><p>World</p>";
        let (bytes, config) = generate_pdf(html, &PipelineConfig::default()).unwrap();
        assert!(!config.pages.is_empty());
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn landscape_swaps_dimensions() {
        let cfg = PipelineConfig::a4_landscape();
        assert!(cfg.effective_width() > cfg.effective_height());
        let (_, layout) = generate_pdf("<p>x</p>", &cfg).unwrap();
        assert_eq!(layout.page_width_pt, cfg.page_height);
    }

    #[test]
    fn template_title_wins() {
        let html = "<html><head><title>Award</title></head><body><p>x</p></body></html>";
        let (_, layout) = generate_pdf(html, &PipelineConfig::default()).unwrap();
        assert_eq!(layout.title, "Award");
    }

    #[test]
    fn empty_body_is_an_error() {
        let err = generate_pdf("<html><body></body></html>", &PipelineConfig::default()).unwrap_err();
        assert!(err.contains("no renderable content"));
    }

    #[tokio::test]
    async fn health_reports_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let service = CertificateService::with_backends(
            dir.path().join("missing.html"),
            dir.path(),
            vec![Box::new(SyntheticGenerator::new())],
        );
        let report = service.health().await;
        assert_eq!(report.service, "certificate-generator");
        assert_eq!(report.status, "degraded");
        assert!(!report.template_present);
        assert!(report.backends[0].available);
    }
}
