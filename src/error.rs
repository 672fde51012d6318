//! Error types surfaced by the certificate pipeline.
//!
//! Per-backend problems are not errors: they are recorded as
//! [`AttemptOutcome`](crate::convert::AttemptOutcome) values and only become
//! fatal once the whole fallback chain is exhausted.

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::convert::ConversionAttempt;

/// Machine-checkable classification of a [`RenderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TemplateNotFound,
    TemplateUnreadable,
    InvalidRequest,
    MissingField,
    AllBackendsFailed,
    Io,
    Config,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("certificate template not found: {}", path.display())]
    TemplateNotFound { path: PathBuf },

    #[error("certificate template {} could not be read: {source}", path.display())]
    TemplateUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("all conversion backends failed: {}", summarize(attempts))]
    AllBackendsFailed { attempts: Vec<ConversionAttempt> },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    ConfigLayer(#[from] config::ConfigError),
}

impl RenderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::TemplateNotFound { .. } => ErrorKind::TemplateNotFound,
            RenderError::TemplateUnreadable { .. } => ErrorKind::TemplateUnreadable,
            RenderError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            RenderError::MissingField(_) => ErrorKind::MissingField,
            RenderError::AllBackendsFailed { .. } => ErrorKind::AllBackendsFailed,
            RenderError::Io { .. } => ErrorKind::Io,
            RenderError::Config(_) | RenderError::ConfigLayer(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        RenderError::Io {
            context: context.into(),
            source,
        }
    }

    /// Structured form for boundary adapters (CLI, FFI, HTTP responders).
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Serializable failure: a human-readable message plus its [`ErrorKind`].
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

fn summarize(attempts: &[ConversionAttempt]) -> String {
    if attempts.is_empty() {
        return "no backends configured".to_string();
    }
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.backend, a.outcome))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{AttemptOutcome, BackendId};
    use std::time::Duration;

    #[test]
    fn all_backends_failed_lists_every_reason() {
        let attempts = vec![
            ConversionAttempt {
                backend: BackendId::Native,
                input: PathBuf::from("in.html"),
                output: PathBuf::from("out.pdf"),
                outcome: AttemptOutcome::Unavailable("disabled in configuration".into()),
                elapsed: Duration::ZERO,
            },
            ConversionAttempt {
                backend: BackendId::External,
                input: PathBuf::from("in.html"),
                output: PathBuf::from("out.pdf"),
                outcome: AttemptOutcome::Failed("timed out after 30s".into()),
                elapsed: Duration::from_secs(30),
            },
        ];
        let err = RenderError::AllBackendsFailed { attempts };
        let msg = err.to_string();
        assert!(msg.contains("native: unavailable: disabled in configuration"), "{msg}");
        assert!(msg.contains("external: failed: timed out after 30s"), "{msg}");
        assert_eq!(err.kind(), ErrorKind::AllBackendsFailed);
    }

    #[test]
    fn report_serializes_kind_in_snake_case() {
        let err = RenderError::TemplateNotFound {
            path: PathBuf::from("cert.html"),
        };
        let json = serde_json::to_string(&err.report()).unwrap();
        assert!(json.contains("\"kind\":\"template_not_found\""), "{json}");
        assert!(json.contains("cert.html"), "{json}");
    }

    #[test]
    fn config_source_errors_classify_as_config() {
        let err: RenderError = config::ConfigError::Message("bad layer".into()).into();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("bad layer"));

        let err = RenderError::InvalidRequest("request is not valid JSON".into());
        let json = serde_json::to_string(&err.report()).unwrap();
        assert!(json.contains("\"kind\":\"invalid_request\""), "{json}");
    }
}
