use crate::color::Rgb;
use crate::profile::{ColorProfile, HighlightStyle};

/// Passthrough styling used when no camera mask is available.
///
/// Basic mode cannot segment by color; it only pushes contrast, posterize
/// and a tint so the selected color reads a little stronger. The values are
/// a pure function of `(style, profile)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasicStylingParams {
    pub style: HighlightStyle,
    pub brightness: f32,
    pub contrast: f32,
    pub posterize: f32,
    pub edge_rendering: bool,
    /// Edge color at the low and high point of the pulse.
    pub edge_color_dim: Rgb,
    pub edge_color_bright: Rgb,
    pub color_scale: Rgb,
    pub color_offset: f32,
}

impl BasicStylingParams {
    pub fn for_selection(style: HighlightStyle, profile: &ColorProfile) -> Self {
        let accent = profile.accent;
        match style {
            HighlightStyle::BwExceptTarget => Self {
                style,
                brightness: -0.02,
                contrast: 0.35,
                posterize: 0.18,
                edge_rendering: false,
                edge_color_dim: accent.scale(0.2),
                edge_color_bright: accent.scale(0.2),
                color_scale: Rgb::WHITE.lerp(accent, 0.1),
                color_offset: -0.03,
            },
            HighlightStyle::GlowOverlay => Self {
                style,
                brightness: 0.03,
                contrast: 0.25,
                posterize: 0.08,
                edge_rendering: true,
                edge_color_dim: accent.scale(0.5),
                edge_color_bright: accent,
                color_scale: Rgb::WHITE,
                color_offset: 0.0,
            },
        }
    }

    /// Edge color for a pulse phase in `[0, 1]`.
    pub fn edge_color_at(&self, pulse: f32) -> Rgb {
        self.edge_color_dim.lerp(self.edge_color_bright, pulse)
    }
}
