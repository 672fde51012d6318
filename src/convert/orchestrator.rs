//! Fallback chain: try each backend in order until one produces the PDF.

use std::time::Instant;

use serde::Serialize;

use super::{AttemptOutcome, BackendId, ConversionAttempt, ConversionBackend, ConversionJob};
use crate::error::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "backend", rename_all = "snake_case")]
pub enum ChainState {
    NotStarted,
    /// Index into the backend list.
    TryingBackend(usize),
    Succeeded(BackendId),
    AllFailed,
}

/// Everything one pass over the chain did.
#[derive(Debug, Clone)]
pub struct ChainReport {
    pub attempts: Vec<ConversionAttempt>,
    pub history: Vec<ChainState>,
}

impl ChainReport {
    pub fn state(&self) -> ChainState {
        self.history.last().copied().unwrap_or(ChainState::NotStarted)
    }

    /// The backend that produced the artifact.
    pub fn winner(&self) -> Option<BackendId> {
        match self.state() {
            ChainState::Succeeded(id) => Some(id),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<(BackendId, Vec<ConversionAttempt>), RenderError> {
        match self.winner() {
            Some(id) => Ok((id, self.attempts)),
            None => Err(RenderError::AllBackendsFailed {
                attempts: self.attempts,
            }),
        }
    }
}

pub struct ConversionOrchestrator {
    backends: Vec<Box<dyn ConversionBackend>>,
}

impl ConversionOrchestrator {
    pub fn new(backends: Vec<Box<dyn ConversionBackend>>) -> Self {
        Self { backends }
    }

    pub fn backends(&self) -> &[Box<dyn ConversionBackend>] {
        &self.backends
    }

    pub async fn run(&self, job: &ConversionJob) -> ChainReport {
        let mut report = ChainReport {
            attempts: Vec::with_capacity(self.backends.len()),
            history: vec![ChainState::NotStarted],
        };

        for (i, backend) in self.backends.iter().enumerate() {
            report.history.push(ChainState::TryingBackend(i));
            let started = Instant::now();
            let outcome = backend.attempt(job).await;
            let elapsed = started.elapsed();

            match &outcome {
                AttemptOutcome::Success => log::info!(
                    "backend={} outcome=success elapsed_ms={}",
                    backend.id(),
                    elapsed.as_millis()
                ),
                AttemptOutcome::Unavailable(_) => log::info!(
                    "backend={} outcome={outcome} elapsed_ms={}",
                    backend.id(),
                    elapsed.as_millis()
                ),
                AttemptOutcome::Failed(_) => log::warn!(
                    "backend={} outcome={outcome} elapsed_ms={}",
                    backend.id(),
                    elapsed.as_millis()
                ),
            }

            let success = outcome.is_success();
            report.attempts.push(ConversionAttempt {
                backend: backend.id(),
                input: job.input.clone(),
                output: job.output.clone(),
                outcome,
                elapsed,
            });
            if success {
                report.history.push(ChainState::Succeeded(backend.id()));
                return report;
            }
        }

        report.history.push(ChainState::AllFailed);
        report
    }
}
