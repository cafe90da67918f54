mod composite;
mod loopback;

pub use composite::{composite_basic, composite_mask};
pub use loopback::V4L2Output;

use anyhow::Result;

use crate::capture::CameraFrame;
use crate::color::Rgb;
use crate::controller::BasicStylingParams;
use crate::profile::HighlightStyle;
use crate::segmentation::SegmentationMask;

/// Per-style constants of the mask compositor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeParams {
    /// 1 desaturates everything outside the mask, 0 keeps the scene.
    pub outside_desaturate: f32,
    pub glow_width_px: u32,
    pub glow_intensity: f32,
}

impl CompositeParams {
    pub fn for_style(style: HighlightStyle) -> Self {
        match style {
            HighlightStyle::BwExceptTarget => Self {
                outside_desaturate: 1.0,
                glow_width_px: 1,
                glow_intensity: 1.3,
            },
            HighlightStyle::GlowOverlay => Self {
                outside_desaturate: 0.0,
                glow_width_px: 2,
                glow_intensity: 2.2,
            },
        }
    }
}

/// Everything the compositor needs for one Advanced-mode frame.
///
/// Frame and mask are borrowed for this tick only.
#[derive(Debug, Clone, Copy)]
pub struct MaskComposite<'a> {
    pub frame: &'a CameraFrame,
    pub mask: &'a SegmentationMask,
    pub style: HighlightStyle,
    pub accent: Rgb,
    pub highlight_boost: f32,
    /// Glow pulse phase in `[0, 1]`.
    pub pulse: f32,
}

impl MaskComposite<'_> {
    pub fn params(&self) -> CompositeParams {
        CompositeParams::for_style(self.style)
    }
}

/// What the session hands to the presenter each tick.
#[derive(Debug, Clone, Copy)]
pub enum TickOutput<'a> {
    Advanced(MaskComposite<'a>),
    Basic {
        params: BasicStylingParams,
        edge_pulse: f32,
    },
    /// Permission or probing still pending.
    Waiting,
}

/// Compositor collaborator.
pub trait Presenter {
    /// Whether the presenter can blend a camera mask over the scene.
    /// Without it the session stays in Basic styling.
    fn supports_mask_compositing(&self) -> bool {
        true
    }

    fn present(&mut self, output: &TickOutput<'_>) -> Result<()>;

    /// Output resolution
    fn resolution(&self) -> (u32, u32);
}
