use std::collections::VecDeque;
use std::task::Poll;
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::capture::{CameraProvider, ProviderConfig};
use crate::error::FinderError;

const NO_PROVIDER_REASON: &str =
    "Advanced mode unavailable: no camera provider produced a frame.";

/// What happened to one candidate during a probing pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    Bound,
    InitFailed(String),
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRecord {
    pub provider: String,
    pub outcome: CandidateOutcome,
}

pub enum ProbeOutcome {
    Bound(Box<dyn CameraProvider>),
    /// Every candidate failed; carries the last recorded reason.
    Exhausted(FinderError),
    Cancelled,
}

struct ActiveCandidate {
    provider: Box<dyn CameraProvider>,
    deadline: Instant,
}

/// Tries ranked candidates in order until one yields a non-empty frame
/// before its wall-clock deadline.
pub struct ProbeSequence {
    queue: VecDeque<Box<dyn CameraProvider>>,
    active: Option<ActiveCandidate>,
    config: ProviderConfig,
    timeout: Duration,
    cancel: CancelToken,
    last_failure: Option<FinderError>,
    records: Vec<ProbeRecord>,
}

impl ProbeSequence {
    pub fn new(
        candidates: Vec<Box<dyn CameraProvider>>,
        config: ProviderConfig,
        timeout: Duration,
        cancel: CancelToken,
    ) -> Self {
        Self {
            queue: candidates.into(),
            active: None,
            config,
            timeout,
            cancel,
            last_failure: None,
            records: Vec::new(),
        }
    }

    pub fn records(&self) -> &[ProbeRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ProbeRecord> {
        self.records
    }

    fn record(&mut self, provider: &str, outcome: CandidateOutcome) {
        self.records.push(ProbeRecord {
            provider: provider.to_string(),
            outcome,
        });
    }

    /// Dispose the candidate under test and drop the rest untouched.
    pub fn abort(&mut self) {
        if let Some(mut active) = self.active.take() {
            tracing::info!("Probe of {} cancelled", active.provider.name());
            active.provider.dispose();
            let name = active.provider.name().to_string();
            self.record(&name, CandidateOutcome::Cancelled);
        }
        self.queue.clear();
    }

    /// Advance by one tick.
    pub fn step(&mut self, now: Instant) -> Poll<ProbeOutcome> {
        if self.cancel.is_cancelled() {
            self.abort();
            return Poll::Ready(ProbeOutcome::Cancelled);
        }

        loop {
            if let Some(mut active) = self.active.take() {
                if now >= active.deadline {
                    let name = active.provider.name().to_string();
                    tracing::warn!("{} produced no frame within {:?}", name, self.timeout);
                    active.provider.dispose();
                    self.record(&name, CandidateOutcome::TimedOut);
                    self.last_failure = Some(FinderError::ProviderTimedOut { provider: name });
                    continue;
                }

                active.provider.tick();
                if active.provider.ready_frame().is_some() {
                    let name = active.provider.name().to_string();
                    tracing::info!("Bound camera provider {}", name);
                    self.record(&name, CandidateOutcome::Bound);
                    // untried candidates were never initialized
                    self.queue.clear();
                    return Poll::Ready(ProbeOutcome::Bound(active.provider));
                }

                self.active = Some(active);
                return Poll::Pending;
            }

            let Some(mut candidate) = self.queue.pop_front() else {
                let reason = self
                    .last_failure
                    .take()
                    .unwrap_or_else(|| FinderError::ProviderInitFailed(NO_PROVIDER_REASON.into()));
                return Poll::Ready(ProbeOutcome::Exhausted(reason));
            };

            let name = candidate.name().to_string();
            tracing::info!("Probing camera provider {}", name);
            match candidate.initialize(&self.config) {
                Ok(()) => {
                    self.active = Some(ActiveCandidate {
                        provider: candidate,
                        deadline: now + self.timeout,
                    });
                }
                Err(reason) => {
                    tracing::warn!("{} failed to initialize: {}", name, reason);
                    candidate.dispose();
                    self.record(&name, CandidateOutcome::InitFailed(reason.clone()));
                    self.last_failure = Some(FinderError::ProviderInitFailed(reason));
                }
            }
        }
    }
}
