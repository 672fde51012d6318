//! # cert-forge – certificate rendering with a fallback chain of PDF backends
//!
//! A request flows through these stages:
//!
//! 1. **Map** – resolve pronouns and the issue date ([`record`])
//! 2. **Load** – parse the HTML template into a block tree ([`templates`],
//!    [`document`], [`dom`])
//! 3. **Substitute** – replace `{{...}}` placeholders in place ([`substitute`])
//! 4. **Convert** – try each backend until one writes the PDF ([`convert`]):
//!    the in-process layout engine ([`style`], [`layout`], [`pagination`],
//!    [`render`]), headless LibreOffice, then a synthetic certificate
//! 5. **Clean up** – per-request working files ([`lifecycle`])
//!
//! [`pipeline::CertificateService`] drives the whole thing. A CLI
//! (`certforge`) and a C ABI ([`ffi`]) sit on top.

pub mod config;
pub mod convert;
pub mod document;
pub mod dom;
pub mod error;
pub mod ffi;
pub mod fonts;
pub mod layout;
pub mod layout_config;
pub mod lifecycle;
pub mod pagination;
pub mod pipeline;
pub mod record;
pub mod render;
pub mod style;
pub mod substitute;
pub mod templates;

// Re-exports for convenience
pub use config::ServiceConfig;
pub use convert::{AttemptOutcome, BackendId, ConversionBackend};
pub use error::{ErrorKind, RenderError};
pub use pipeline::{CertificateService, HealthReport, PipelineConfig, RenderedArtifact};
pub use record::{CertificateRequest, Gender, PronounPair, RenderContext};
