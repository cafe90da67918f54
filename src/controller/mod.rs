//! Runtime mode state machine.
//!
//! The [`ModeController`] is the only writer of [`RuntimeMode`] and the only
//! owner of the bound camera provider. It is advanced once per tick; every
//! multi-tick routine it runs (permission requests, provider probing,
//! calibration) is a small state machine polled from [`ModeController::tick`].

mod basic;
mod permission;
mod probe;
#[cfg(test)]
mod tests;

pub use basic::BasicStylingParams;
pub use permission::{
    PermissionBroker, PermissionOutcome, PermissionRequest, StaticPermissions,
    HEADSET_CAMERA_PERMISSIONS,
};
pub use probe::{CandidateOutcome, ProbeOutcome, ProbeRecord, ProbeSequence};

use std::fmt;
use std::task::Poll;
use std::time::{Duration, Instant};

use crate::calibration::{CalibrationJob, CalibrationSettings, CalibrationStep};
use crate::cancel::CancelToken;
use crate::capture::{CameraFrame, CameraProvider, ProviderConfig, ProviderFactory};
use crate::color::Hsv;
use crate::error::FinderError;
use permission::PermissionFlow;

/// Where the camera permission request stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Unresolved,
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeMode {
    Uninitialized,
    ProbingProviders,
    BasicStyling,
    AdvancedCameraMask,
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuntimeMode::Uninitialized => "Uninitialized",
            RuntimeMode::ProbingProviders => "Probing providers",
            RuntimeMode::BasicStyling => "Basic styling",
            RuntimeMode::AdvancedCameraMask => "Advanced camera mask",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Wall-clock budget for one candidate to produce a frame.
    pub probe_timeout: Duration,
    /// Wall-clock budget for one unanswered permission request.
    pub permission_timeout: Duration,
    pub permission_ids: Vec<String>,
    pub provider: ProviderConfig,
    pub calibration: CalibrationSettings,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(4),
            permission_timeout: Duration::from_secs(8),
            permission_ids: HEADSET_CAMERA_PERMISSIONS
                .iter()
                .map(|id| id.to_string())
                .collect(),
            provider: ProviderConfig::default(),
            calibration: CalibrationSettings::default(),
        }
    }
}

/// Notifications for the session, drained after every call into the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    ModeChanged { mode: RuntimeMode, status: String },
    Status(String),
    Failed(FinderError),
    Calibrated(Hsv),
}

pub struct ModeController {
    config: ControllerConfig,
    factory: ProviderFactory,
    permissions: Box<dyn PermissionBroker>,
    mode: RuntimeMode,
    started: bool,
    permission_flow: Option<PermissionFlow>,
    permission: PermissionState,
    /// Probe as soon as permission is granted. Cleared by choosing Basic.
    probe_on_grant: bool,
    pinned_basic: bool,
    probe: Option<ProbeSequence>,
    probe_cancel: CancelToken,
    probe_log: Vec<ProbeRecord>,
    bound: Option<Box<dyn CameraProvider>>,
    calibration: Option<CalibrationJob>,
    calibration_cancel: CancelToken,
    last_failure: Option<FinderError>,
    events: Vec<ControllerEvent>,
}

impl ModeController {
    pub fn new(
        config: ControllerConfig,
        factory: ProviderFactory,
        permissions: Box<dyn PermissionBroker>,
    ) -> Self {
        Self {
            config,
            factory,
            permissions,
            mode: RuntimeMode::Uninitialized,
            started: false,
            permission_flow: None,
            permission: PermissionState::Unresolved,
            probe_on_grant: true,
            pinned_basic: false,
            probe: None,
            probe_cancel: CancelToken::new(),
            probe_log: Vec::new(),
            bound: None,
            calibration: None,
            calibration_cancel: CancelToken::new(),
            last_failure: None,
            events: Vec::new(),
        }
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    pub fn permission_granted(&self) -> bool {
        self.permission == PermissionState::Granted
    }

    pub fn permission_state(&self) -> PermissionState {
        self.permission
    }

    pub fn permission_pending(&self) -> bool {
        self.permission_flow.is_some()
    }

    /// True once the presenter turned out to lack mask compositing.
    pub fn is_pinned_to_basic(&self) -> bool {
        self.pinned_basic
    }

    pub fn last_failure(&self) -> Option<&FinderError> {
        self.last_failure.as_ref()
    }

    /// Candidate outcomes of the most recent probing pass.
    pub fn probe_log(&self) -> &[ProbeRecord] {
        &self.probe_log
    }

    pub fn bound_provider(&self) -> Option<&str> {
        self.bound.as_ref().map(|provider| provider.name())
    }

    pub fn calibration_in_progress(&self) -> bool {
        self.calibration.is_some()
    }

    /// This tick's frame. Only available in Advanced mode.
    pub fn current_frame(&self) -> Option<&CameraFrame> {
        if self.mode != RuntimeMode::AdvancedCameraMask {
            return None;
        }
        self.bound.as_ref().and_then(|provider| provider.ready_frame())
    }

    pub fn drain_events(&mut self) -> Vec<ControllerEvent> {
        std::mem::take(&mut self.events)
    }

    fn status(&mut self, status: impl Into<String>) {
        self.events.push(ControllerEvent::Status(status.into()));
    }

    fn fail(&mut self, error: FinderError) {
        tracing::warn!("{}", error);
        self.last_failure = Some(error.clone());
        self.events.push(ControllerEvent::Failed(error));
    }

    fn transition(&mut self, mode: RuntimeMode, status: impl Into<String>) {
        let status = status.into();
        if self.mode != mode {
            tracing::info!("Mode {} -> {}", self.mode, mode);
            self.mode = mode;
        }
        self.events.push(ControllerEvent::ModeChanged { mode, status });
    }

    /// Begin mode selection. Without mask compositing the session is pinned
    /// to Basic styling for good and no permission is requested.
    pub fn start(&mut self, now: Instant, compositing_available: bool) {
        if self.started {
            return;
        }
        self.started = true;

        if !compositing_available {
            self.pinned_basic = true;
            self.transition(
                RuntimeMode::BasicStyling,
                "Passthrough styling fallback active.",
            );
            self.fail(FinderError::CompositorUnavailable);
            return;
        }

        self.request_permission(now);
    }

    fn request_permission(&mut self, now: Instant) {
        self.status("Requesting camera permission for Advanced Mode...");
        self.permission_flow = Some(PermissionFlow::new(
            &self.config.permission_ids,
            self.config.permission_timeout,
        ));
        self.advance_permission(now);
    }

    pub fn tick(&mut self, now: Instant) {
        if let Some(provider) = self.bound.as_mut() {
            provider.tick();
        }

        match self.mode {
            // a request left open by choosing Basic keeps running
            RuntimeMode::Uninitialized | RuntimeMode::BasicStyling => self.advance_permission(now),
            RuntimeMode::ProbingProviders => self.advance_probe(now),
            RuntimeMode::AdvancedCameraMask => self.advance_calibration(),
        }
    }

    fn advance_permission(&mut self, now: Instant) {
        let Some(flow) = self.permission_flow.as_mut() else {
            return;
        };
        let Poll::Ready(granted) = flow.step(self.permissions.as_mut(), now) else {
            return;
        };

        self.permission_flow = None;
        if granted {
            self.permission = PermissionState::Granted;
            if self.probe_on_grant {
                self.begin_probing(now);
            } else {
                self.status("Camera permission granted. Advanced mode is available.");
            }
            return;
        }

        self.permission = PermissionState::Denied;
        self.fail(FinderError::PermissionDenied);
        if self.mode != RuntimeMode::BasicStyling {
            self.transition(
                RuntimeMode::BasicStyling,
                FinderError::PermissionDenied.to_string(),
            );
        }
        self.status("Grant headset camera permission for true color masking.");
    }

    fn begin_probing(&mut self, now: Instant) {
        self.unbind();
        self.probe_cancel = CancelToken::new();
        let candidates = (self.factory)();
        tracing::info!("Probing {} camera provider(s)", candidates.len());

        self.probe = Some(ProbeSequence::new(
            candidates,
            self.config.provider,
            self.config.probe_timeout,
            self.probe_cancel.clone(),
        ));
        self.transition(RuntimeMode::ProbingProviders, "Looking for a camera source...");
        self.advance_probe(now);
    }

    fn advance_probe(&mut self, now: Instant) {
        let step = match self.probe.as_mut() {
            Some(probe) => probe.step(now),
            None => return,
        };
        let Poll::Ready(outcome) = step else {
            return;
        };

        if let Some(probe) = self.probe.take() {
            self.probe_log = probe.into_records();
        }

        match outcome {
            ProbeOutcome::Bound(provider) => {
                self.bound = Some(provider);
                self.last_failure = None;
                self.transition(RuntimeMode::AdvancedCameraMask, "Advanced camera mask enabled.");
            }
            ProbeOutcome::Exhausted(error) => {
                self.transition(
                    RuntimeMode::BasicStyling,
                    "Camera access unavailable. Using Basic styling.",
                );
                self.fail(error);
            }
            ProbeOutcome::Cancelled => {}
        }
    }

    fn cancel_probe(&mut self) {
        self.probe_cancel.cancel();
        if let Some(mut probe) = self.probe.take() {
            probe.abort();
            self.probe_log = probe.into_records();
        }
    }

    fn advance_calibration(&mut self) {
        let Some(job) = self.calibration.as_mut() else {
            return;
        };
        let step = job.poll();
        self.calibration = None;

        match step {
            CalibrationStep::Finished(Ok(hsv)) => {
                tracing::info!("Calibration sample {:?}", hsv);
                self.events.push(ControllerEvent::Calibrated(hsv));
            }
            CalibrationStep::Finished(Err(error)) => self.fail(error),
            CalibrationStep::Cancelled => {}
        }
    }

    fn cancel_calibration(&mut self) {
        self.calibration_cancel.cancel();
        if let Some(mut job) = self.calibration.take() {
            // poll observes the cancellation and releases the scratch buffer
            let _ = job.poll();
            self.status("Calibration cancelled.");
        }
    }

    fn unbind(&mut self) {
        if let Some(mut provider) = self.bound.take() {
            tracing::info!("Unbinding camera provider {}", provider.name());
            provider.dispose();
        }
    }

    /// Switch to Basic styling, cancelling any probe or calibration in flight
    /// and disposing the bound provider.
    pub fn request_basic(&mut self) {
        self.probe_on_grant = false;
        if self.mode == RuntimeMode::BasicStyling {
            return;
        }
        self.cancel_probe();
        self.cancel_calibration();
        self.unbind();
        self.transition(RuntimeMode::BasicStyling, "Basic styling selected.");
    }

    /// Re-run provider probing from Basic styling.
    pub fn request_advanced(&mut self, now: Instant) -> Result<(), FinderError> {
        match self.mode {
            // permission flow still decides, probing follows on its own
            RuntimeMode::Uninitialized => Ok(()),
            RuntimeMode::AdvancedCameraMask | RuntimeMode::ProbingProviders => Ok(()),
            RuntimeMode::BasicStyling => {
                if self.pinned_basic {
                    self.fail(FinderError::CompositorUnavailable);
                    return Err(FinderError::CompositorUnavailable);
                }
                match self.permission {
                    PermissionState::Granted => self.begin_probing(now),
                    PermissionState::Denied => {
                        self.fail(FinderError::PermissionDenied);
                        return Err(FinderError::PermissionDenied);
                    }
                    // probing starts once the pending request is answered
                    PermissionState::Unresolved => {
                        self.probe_on_grant = true;
                        if self.permission_flow.is_none() {
                            self.request_permission(now);
                        } else {
                            self.status("Waiting for camera permission...");
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// Start a center-patch calibration on the bound provider's frame.
    /// The sample arrives as [`ControllerEvent::Calibrated`] on the next tick.
    pub fn request_calibration(&mut self) -> Result<(), FinderError> {
        if self.mode != RuntimeMode::AdvancedCameraMask || self.bound.is_none() {
            self.fail(FinderError::CalibrationNotActive);
            return Err(FinderError::CalibrationNotActive);
        }
        if self.calibration.is_some() {
            self.status("Calibration already in progress.");
            return Ok(());
        }

        let cancel = CancelToken::new();
        let frame = self.bound.as_ref().and_then(|provider| provider.ready_frame());
        match CalibrationJob::begin(frame, self.config.calibration, cancel.clone()) {
            Ok(job) => {
                self.calibration = Some(job);
                self.calibration_cancel = cancel;
                self.status("Calibrating from center sample...");
                Ok(())
            }
            Err(error) => {
                self.fail(error.clone());
                Err(error)
            }
        }
    }

    /// Release the bound provider and anything in flight.
    pub fn shutdown(&mut self) {
        self.permission_flow = None;
        self.cancel_probe();
        self.cancel_calibration();
        self.unbind();
    }
}

impl Drop for ModeController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
