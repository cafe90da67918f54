//! The process-wide runtime context.
//!
//! A [`Session`] owns the mode controller, the active profile and style, and
//! the status line. Control requests and controller events are folded in
//! between ticks, so every tick segments against one consistent profile.

use std::time::Instant;

use crate::capture::ProviderFactory;
use crate::control::ControlRequest;
use crate::controller::{
    BasicStylingParams, ControllerConfig, ControllerEvent, ModeController, PermissionBroker,
    RuntimeMode,
};
use crate::output::{MaskComposite, TickOutput};
use crate::profile::{ColorPreset, ColorProfile, HighlightStyle};
use crate::segmentation::{HsvMatcher, SegmentationMask, SegmentationModel};

const PANEL_HINT: &str = "Advanced thresholds apply only in Advanced Camera Mask mode.";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub controller: ControllerConfig,
    /// Reduced-resolution factor for mask scoring.
    pub mask_downsample: u32,
    pub preset: ColorPreset,
    pub style: HighlightStyle,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            mask_downsample: 2,
            preset: ColorPreset::default(),
            style: HighlightStyle::default(),
        }
    }
}

pub struct Session {
    controller: ModeController,
    matcher: HsvMatcher,
    profile: ColorProfile,
    /// Sanitized copy handed to the matcher.
    engine_profile: ColorProfile,
    style: HighlightStyle,
    basic: BasicStylingParams,
    mask: SegmentationMask,
    status: String,
    /// Status of the last mode transition, restored when the panel closes.
    mode_status: String,
    panel_shown: bool,
    compositing_available: bool,
    started_at: Option<Instant>,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        factory: ProviderFactory,
        permissions: Box<dyn PermissionBroker>,
        compositing_available: bool,
    ) -> Self {
        let profile = ColorProfile::preset(config.preset);
        let status =
            "Choose a color, then enable Advanced mode by granting camera permission.".to_string();
        Self {
            controller: ModeController::new(config.controller, factory, permissions),
            matcher: HsvMatcher::new(config.mask_downsample),
            engine_profile: profile.sanitized(),
            basic: BasicStylingParams::for_selection(config.style, &profile),
            profile,
            style: config.style,
            mask: SegmentationMask::empty(),
            mode_status: status.clone(),
            status,
            panel_shown: false,
            compositing_available,
            started_at: None,
        }
    }

    pub fn mode(&self) -> RuntimeMode {
        self.controller.mode()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn profile(&self) -> &ColorProfile {
        &self.profile
    }

    pub fn style(&self) -> HighlightStyle {
        self.style
    }

    pub fn basic_params(&self) -> &BasicStylingParams {
        &self.basic
    }

    /// Mask computed on the most recent Advanced tick.
    pub fn mask(&self) -> &SegmentationMask {
        &self.mask
    }

    pub fn panel_shown(&self) -> bool {
        self.panel_shown
    }

    pub fn controller(&self) -> &ModeController {
        &self.controller
    }

    pub fn start(&mut self, now: Instant) {
        self.started_at.get_or_insert(now);
        tracing::info!("Session starting with {} / {:?}", self.profile.display_name, self.style);
        self.controller.start(now, self.compositing_available);
        self.absorb_events();
    }

    /// The single place profile and style edits take effect.
    fn apply_selection(&mut self, profile: ColorProfile, style: HighlightStyle) {
        self.engine_profile = profile.sanitized();
        self.basic = BasicStylingParams::for_selection(style, &profile);
        self.profile = profile;
        self.style = style;
        tracing::debug!(
            "Applied {} target={:?} tolerance={:?} style={:?}",
            self.profile.display_name,
            self.profile.target,
            self.profile.tolerance,
            self.style
        );
    }

    fn apply_profile(&mut self, profile: ColorProfile) {
        self.apply_selection(profile, self.style);
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        tracing::info!("Status: {}", self.status);
    }

    fn select_preset(&mut self, preset: ColorPreset) {
        self.apply_profile(ColorProfile::preset(preset));
        self.set_status(format!("Target color: {}", self.profile.display_name));
    }

    fn select_style(&mut self, style: HighlightStyle) {
        self.apply_selection(self.profile.clone(), style);
        self.set_status(match style {
            HighlightStyle::BwExceptTarget => "Style 1 active: B/W except target.",
            HighlightStyle::GlowOverlay => "Style 2 active: Glow overlay.",
        });
    }

    pub fn handle(&mut self, request: ControlRequest, now: Instant) {
        tracing::debug!("Control request {:?}", request);
        match request {
            ControlRequest::PresetSelected(preset) => self.select_preset(preset),
            ControlRequest::NextPreset => self.select_preset(self.profile.preset.next()),
            ControlRequest::StyleChanged(style) => self.select_style(style),
            ControlRequest::ToggleStyle => self.select_style(self.style.toggled()),
            ControlRequest::ToleranceChanged { hue, sat, val } => {
                self.apply_profile(self.profile.with_tolerances(hue, sat, val));
            }
            ControlRequest::CalibrateRequested => {
                // rejection is reported through the event queue
                let _ = self.controller.request_calibration();
            }
            ControlRequest::AdvancedPanelToggled(shown) => {
                self.panel_shown = shown;
                if !shown {
                    let status = self.mode_status.clone();
                    self.set_status(status);
                } else if self.mode() != RuntimeMode::AdvancedCameraMask {
                    self.set_status(PANEL_HINT);
                }
            }
            ControlRequest::BasicModeRequested => self.controller.request_basic(),
            ControlRequest::AdvancedModeRequested => {
                let _ = self.controller.request_advanced(now);
            }
        }
        self.absorb_events();
    }

    fn absorb_events(&mut self) {
        for event in self.controller.drain_events() {
            match event {
                ControllerEvent::ModeChanged { mode, status } => {
                    tracing::debug!("Mode now {}", mode);
                    if mode != RuntimeMode::AdvancedCameraMask {
                        self.mask = SegmentationMask::empty();
                    }
                    self.mode_status = status.clone();
                    self.set_status(status);
                }
                ControllerEvent::Status(status) => self.set_status(status),
                ControllerEvent::Failed(error) => self.set_status(error.to_string()),
                ControllerEvent::Calibrated(sample) => {
                    self.apply_profile(self.profile.calibrated(sample));
                    self.set_status(format!(
                        "Calibrated hue={:.2}, sat={:.2}, val={:.2}",
                        sample.h, sample.s, sample.v
                    ));
                }
            }
        }
    }

    /// Advance one frame and describe what should be presented.
    pub fn tick(&mut self, now: Instant) -> TickOutput<'_> {
        self.controller.tick(now);
        self.absorb_events();

        let t = now
            .saturating_duration_since(*self.started_at.get_or_insert(now))
            .as_secs_f32();

        match self.controller.mode() {
            RuntimeMode::AdvancedCameraMask => {
                let Some(frame) = self.controller.current_frame() else {
                    self.mask = SegmentationMask::empty();
                    return TickOutput::Waiting;
                };
                self.mask = self.matcher.segment(frame, &self.engine_profile);
                TickOutput::Advanced(MaskComposite {
                    frame,
                    mask: &self.mask,
                    style: self.style,
                    accent: self.engine_profile.accent,
                    highlight_boost: self.engine_profile.highlight_boost,
                    pulse: 0.5 + 0.5 * (t * 3.0).sin(),
                })
            }
            RuntimeMode::BasicStyling => TickOutput::Basic {
                params: self.basic,
                edge_pulse: 0.8 + 0.2 * (t * 3.2).sin(),
            },
            RuntimeMode::Uninitialized | RuntimeMode::ProbingProviders => TickOutput::Waiting,
        }
    }

    pub fn shutdown(&mut self) {
        self.controller.shutdown();
        self.mask = SegmentationMask::empty();
    }
}
