//! Conversion backends and the fallback chain that drives them.
//!
//! Every backend turns a filled HTML template on disk into a PDF at a
//! requested path. Backends never return errors: they report an
//! [`AttemptOutcome`] and the [`orchestrator`] decides what happens next.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::record::RenderContext;

pub mod external;
pub mod native;
pub mod orchestrator;
pub mod synthetic;

pub use external::ExternalProcessConverter;
pub use native::NativeConverter;
pub use orchestrator::{ChainReport, ChainState, ConversionOrchestrator};
pub use synthetic::SyntheticGenerator;

/// Identity of a backend, used in configuration, logs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendId {
    /// In-process HTML layout and PDF emission.
    Native,
    /// Headless LibreOffice.
    External,
    /// Minimal certificate drawn straight from the record.
    Synthetic,
}

impl BackendId {
    pub const DEFAULT_ORDER: [BackendId; 3] =
        [BackendId::Native, BackendId::External, BackendId::Synthetic];

    pub fn as_str(self) -> &'static str {
        match self {
            BackendId::Native => "native",
            BackendId::External => "external",
            BackendId::Synthetic => "synthetic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Some(BackendId::Native),
            "external" | "libreoffice" | "soffice" => Some(BackendId::External),
            "synthetic" => Some(BackendId::Synthetic),
            _ => None,
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a backend can be used at all on this host / configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Ready,
    Unavailable(String),
}

impl Capability {
    pub fn is_ready(&self) -> bool {
        matches!(self, Capability::Ready)
    }
}

/// Result of one backend attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    /// The backend could not be used (disabled, tool missing).
    Unavailable(String),
    /// The backend ran and did not produce the artifact.
    Failed(String),
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success)
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Success => f.write_str("success"),
            AttemptOutcome::Unavailable(reason) => write!(f, "unavailable: {reason}"),
            AttemptOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

impl From<Capability> for AttemptOutcome {
    fn from(c: Capability) -> Self {
        match c {
            Capability::Ready => AttemptOutcome::Success,
            Capability::Unavailable(reason) => AttemptOutcome::Unavailable(reason),
        }
    }
}

/// Record of one backend attempt within a render.
#[derive(Debug, Clone)]
pub struct ConversionAttempt {
    pub backend: BackendId,
    pub input: PathBuf,
    pub output: PathBuf,
    pub outcome: AttemptOutcome,
    pub elapsed: Duration,
}

/// Serializable view of a [`ConversionAttempt`].
#[derive(Debug, Clone, Serialize)]
pub struct AttemptSummary {
    pub backend: BackendId,
    pub outcome: String,
    pub elapsed_ms: u128,
}

impl From<&ConversionAttempt> for AttemptSummary {
    fn from(a: &ConversionAttempt) -> Self {
        Self {
            backend: a.backend,
            outcome: a.outcome.to_string(),
            elapsed_ms: a.elapsed.as_millis(),
        }
    }
}

/// What a backend is asked to do.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    /// Filled template (HTML).
    pub input: PathBuf,
    /// Where the PDF must end up.
    pub output: PathBuf,
    pub context: RenderContext,
}

#[async_trait]
pub trait ConversionBackend: Send + Sync {
    fn id(&self) -> BackendId;

    /// Cheap, cacheable availability check.
    async fn probe(&self) -> Capability;

    /// Convert `job.input` into `job.output`. Success means the output file
    /// exists.
    async fn attempt(&self, job: &ConversionJob) -> AttemptOutcome;

    /// Extra detail for health reports, such as the tool in use.
    async fn describe(&self) -> Option<String> {
        None
    }
}

/// `Success` only when the backend left a non-empty file at `job.output`.
pub(crate) async fn verify_output(job: &ConversionJob) -> AttemptOutcome {
    match tokio::fs::metadata(&job.output).await {
        Ok(m) if m.len() > 0 => AttemptOutcome::Success,
        Ok(_) => AttemptOutcome::Failed(format!("{} is empty", job.output.display())),
        Err(_) => AttemptOutcome::Failed(format!("no artifact at {}", job.output.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_ids_parse_and_display() {
        for id in BackendId::DEFAULT_ORDER {
            assert_eq!(BackendId::parse(id.as_str()), Some(id));
        }
        assert_eq!(BackendId::parse("LibreOffice"), Some(BackendId::External));
        assert_eq!(BackendId::parse("docx2pdf"), None);
        assert_eq!(BackendId::Synthetic.to_string(), "synthetic");
    }

    #[test]
    fn outcome_display_includes_reason() {
        assert_eq!(
            AttemptOutcome::Unavailable("no soffice".into()).to_string(),
            "unavailable: no soffice"
        );
        assert_eq!(AttemptOutcome::Success.to_string(), "success");
    }
}
