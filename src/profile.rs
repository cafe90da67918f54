//! Color profile catalog.
//!
//! A [`ColorProfile`] is an immutable description of one target color. New
//! profiles come from [`ColorProfile::preset`] or from the `with_*`
//! transforms, which always return a fresh value.

use std::fmt;
use std::str::FromStr;

use crate::color::{wrap_unit, Hsv, Rgb};

pub const HUE_TOLERANCE_MIN: f32 = 0.001;
pub const HUE_TOLERANCE_MAX: f32 = 0.5;
pub const SOFTNESS_MIN: f32 = 0.001;
pub const SOFTNESS_MAX: f32 = 0.25;
pub const HIGHLIGHT_BOOST_MIN: f32 = 0.5;

/// Tolerance band applied after a calibration sample, per channel `(min, max)`.
pub const CALIBRATION_HUE_BAND: (f32, f32) = (0.03, 0.12);
pub const CALIBRATION_SV_BAND: (f32, f32) = (0.18, 0.45);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorPreset {
    Red,
    Blue,
    Yellow,
    Green,
    Black,
    White,
}

impl ColorPreset {
    /// Catalog order. The first entry is the session default.
    pub const ALL: [ColorPreset; 6] = [
        ColorPreset::Red,
        ColorPreset::Blue,
        ColorPreset::Yellow,
        ColorPreset::Green,
        ColorPreset::Black,
        ColorPreset::White,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ColorPreset::Red => "Red",
            ColorPreset::Blue => "Blue",
            ColorPreset::Yellow => "Yellow",
            ColorPreset::Green => "Green",
            ColorPreset::Black => "Black",
            ColorPreset::White => "White",
        }
    }

    /// The following catalog entry, wrapping at the end.
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|p| *p == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl Default for ColorPreset {
    fn default() -> Self {
        Self::ALL[0]
    }
}

impl fmt::Display for ColorPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColorPreset::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown preset '{}'", s))
    }
}

/// How the compositor presents matches. Independent of the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HighlightStyle {
    /// Desaturate everything except the target color.
    #[default]
    BwExceptTarget,
    /// Keep the scene and add a pulsing glow on matches.
    GlowOverlay,
}

impl HighlightStyle {
    pub fn toggled(self) -> Self {
        match self {
            HighlightStyle::BwExceptTarget => HighlightStyle::GlowOverlay,
            HighlightStyle::GlowOverlay => HighlightStyle::BwExceptTarget,
        }
    }
}

impl FromStr for HighlightStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bw" | "bw-except-target" | "desaturate" => Ok(HighlightStyle::BwExceptTarget),
            "glow" | "glow-overlay" => Ok(HighlightStyle::GlowOverlay),
            other => Err(format!("unknown style '{}'", other)),
        }
    }
}

/// Closed `[min, max]` interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, x: f32) -> bool {
        x >= self.min && x <= self.max
    }

    fn clamped_unit(self) -> Self {
        Self::new(self.min.clamp(0.0, 1.0), self.max.clamp(0.0, 1.0))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorProfile {
    pub preset: ColorPreset,
    pub display_name: &'static str,
    pub accent: Rgb,
    pub target: Hsv,
    pub tolerance: Hsv,
    pub saturation_range: Range,
    pub value_range: Range,
    /// 1 = fully chromatic matching, 0 = luminance dominated.
    pub chroma_weight: f32,
    pub mask_softness: f32,
    pub highlight_boost: f32,
}

impl Default for ColorProfile {
    fn default() -> Self {
        Self::preset(ColorPreset::default())
    }
}

impl ColorProfile {
    /// Catalog lookup.
    pub fn preset(preset: ColorPreset) -> Self {
        match preset {
            ColorPreset::Red => Self::chromatic(
                preset,
                Rgb::new(1.0, 0.15, 0.15),
                Hsv::new(0.00, 0.90, 0.80),
                Hsv::new(0.06, 0.40, 0.45),
                Range::new(0.20, 1.00),
                Range::new(0.15, 1.00),
            ),
            ColorPreset::Blue => Self::chromatic(
                preset,
                Rgb::new(0.20, 0.55, 1.0),
                Hsv::new(0.60, 0.85, 0.75),
                Hsv::new(0.06, 0.35, 0.45),
                Range::new(0.15, 1.00),
                Range::new(0.15, 1.00),
            ),
            ColorPreset::Yellow => Self::chromatic(
                preset,
                Rgb::new(1.0, 0.92, 0.20),
                Hsv::new(0.16, 0.85, 0.90),
                Hsv::new(0.05, 0.35, 0.40),
                Range::new(0.15, 1.00),
                Range::new(0.25, 1.00),
            ),
            ColorPreset::Green => Self::chromatic(
                preset,
                Rgb::new(0.25, 0.95, 0.35),
                Hsv::new(0.33, 0.80, 0.65),
                Hsv::new(0.06, 0.35, 0.45),
                Range::new(0.15, 1.00),
                Range::new(0.15, 0.95),
            ),
            ColorPreset::Black => Self {
                preset,
                display_name: preset.name(),
                accent: Rgb::new(0.9, 0.9, 0.9),
                target: Hsv::new(0.0, 0.20, 0.12),
                tolerance: Hsv::new(0.50, 0.80, 0.22),
                saturation_range: Range::new(0.00, 1.00),
                value_range: Range::new(0.00, 0.28),
                chroma_weight: 0.15,
                mask_softness: 0.06,
                highlight_boost: 1.6,
            },
            ColorPreset::White => Self {
                preset,
                display_name: preset.name(),
                accent: Rgb::WHITE,
                target: Hsv::new(0.0, 0.05, 0.92),
                tolerance: Hsv::new(0.50, 0.25, 0.20),
                saturation_range: Range::new(0.00, 0.30),
                value_range: Range::new(0.68, 1.00),
                chroma_weight: 0.05,
                mask_softness: 0.05,
                highlight_boost: 1.15,
            },
        }
    }

    fn chromatic(
        preset: ColorPreset,
        accent: Rgb,
        target: Hsv,
        tolerance: Hsv,
        saturation_range: Range,
        value_range: Range,
    ) -> Self {
        Self {
            preset,
            display_name: preset.name(),
            accent,
            target,
            tolerance,
            saturation_range,
            value_range,
            chroma_weight: 1.0,
            mask_softness: 0.05,
            highlight_boost: 1.45,
        }
    }

    pub fn with_target_hue(&self, hue: f32) -> Self {
        let mut next = self.clone();
        next.target.h = wrap_unit(hue);
        next
    }

    pub fn with_target_hsv(&self, hsv: Hsv) -> Self {
        let mut next = self.clone();
        next.target = hsv.normalized();
        next
    }

    /// Hue tolerance is clamped to `[0.001, 0.5]`, saturation and value to `[0, 1]`.
    pub fn with_tolerances(&self, hue: f32, sat: f32, val: f32) -> Self {
        let mut next = self.clone();
        next.tolerance = Hsv::new(
            clamp_total(hue, HUE_TOLERANCE_MIN, HUE_TOLERANCE_MAX),
            clamp_total(sat, 0.0, 1.0),
            clamp_total(val, 0.0, 1.0),
        );
        next
    }

    /// Retarget to a calibration sample and squeeze tolerances into the
    /// calibration band so one noisy sample cannot yield an all-or-nothing mask.
    pub fn calibrated(&self, sample: Hsv) -> Self {
        let mut next = self.with_target_hsv(sample);
        next.tolerance = Hsv::new(
            clamp_total(next.tolerance.h, CALIBRATION_HUE_BAND.0, CALIBRATION_HUE_BAND.1),
            clamp_total(next.tolerance.s, CALIBRATION_SV_BAND.0, CALIBRATION_SV_BAND.1),
            clamp_total(next.tolerance.v, CALIBRATION_SV_BAND.0, CALIBRATION_SV_BAND.1),
        );
        next
    }

    /// Copy with every field forced into the range the matcher accepts.
    pub fn sanitized(&self) -> Self {
        let mut next = self.with_tolerances(self.tolerance.h, self.tolerance.s, self.tolerance.v);
        next.target = self.target.normalized();
        next.saturation_range = self.saturation_range.clamped_unit();
        next.value_range = self.value_range.clamped_unit();
        next.chroma_weight = clamp_total(self.chroma_weight, 0.0, 1.0);
        next.mask_softness = clamp_total(self.mask_softness, SOFTNESS_MIN, SOFTNESS_MAX);
        next.highlight_boost = self.highlight_boost.max(HIGHLIGHT_BOOST_MIN);
        next
    }
}

/// Clamp that also maps NaN to `min`.
fn clamp_total(x: f32, min: f32, max: f32) -> f32 {
    if x.is_nan() {
        min
    } else {
        x.clamp(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn default_is_first_catalog_preset() {
        assert_eq!(ColorProfile::default().preset, ColorPreset::Red);
        assert_eq!(ColorPreset::default(), ColorPreset::ALL[0]);
    }

    #[test]
    fn target_hue_wraps() {
        let base = ColorProfile::default();
        assert!(close(base.with_target_hue(1.0).target.h, 0.0));
        assert!(close(base.with_target_hue(-0.1).target.h, 0.9));
        assert!(close(base.with_target_hue(0.25).target.h, 0.25));
    }

    #[test]
    fn transforms_leave_source_untouched() {
        let base = ColorProfile::preset(ColorPreset::Blue);
        let snapshot = base.clone();
        let _ = base.with_target_hue(0.1);
        let _ = base.with_tolerances(0.2, 0.2, 0.2);
        let _ = base.calibrated(Hsv::new(0.3, 0.3, 0.3));
        assert_eq!(base, snapshot);
    }

    #[test]
    fn tolerance_clamping_is_total() {
        let base = ColorProfile::default();
        for &input in &[10.0f32, -5.0, 0.0, 0.3, f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let tol = base.with_tolerances(input, input, input).tolerance;
            assert!((HUE_TOLERANCE_MIN..=HUE_TOLERANCE_MAX).contains(&tol.h), "hue {}", tol.h);
            assert!((0.0..=1.0).contains(&tol.s), "sat {}", tol.s);
            assert!((0.0..=1.0).contains(&tol.v), "val {}", tol.v);
        }

        let tol = base.with_tolerances(10.0, -5.0, 10.0).tolerance;
        assert!(close(tol.h, 0.5));
        assert!(close(tol.s, 0.0));
        assert!(close(tol.v, 1.0));
    }

    #[test]
    fn target_hsv_is_normalized() {
        let p = ColorProfile::default().with_target_hsv(Hsv::new(1.25, 1.5, -0.2));
        assert!(close(p.target.h, 0.25));
        assert!(close(p.target.s, 1.0));
        assert!(close(p.target.v, 0.0));
    }

    #[test]
    fn calibration_narrows_tolerance_into_band() {
        // White starts with hue tol 0.5 and val tol 0.2
        let p = ColorProfile::preset(ColorPreset::White).calibrated(Hsv::new(0.4, 0.6, 0.7));
        assert!(close(p.target.h, 0.4));
        assert!(close(p.tolerance.h, 0.12));
        assert!(close(p.tolerance.s, 0.25));
        assert!(close(p.tolerance.v, 0.2));

        let tight = ColorProfile::default()
            .with_tolerances(0.001, 0.0, 1.0)
            .calibrated(Hsv::new(0.0, 0.5, 0.5));
        assert!(close(tight.tolerance.h, 0.03));
        assert!(close(tight.tolerance.s, 0.18));
        assert!(close(tight.tolerance.v, 0.45));
    }

    #[test]
    fn red_preset_matches_catalog() {
        let red = ColorProfile::preset(ColorPreset::Red);
        assert_eq!(red.target, Hsv::new(0.0, 0.9, 0.8));
        assert_eq!(red.tolerance, Hsv::new(0.06, 0.40, 0.45));
        assert!(close(red.chroma_weight, 1.0));
        assert_eq!(red.display_name, "Red");
    }

    #[test]
    fn presets_cycle_and_parse() {
        let mut p = ColorPreset::Red;
        for _ in 0..ColorPreset::ALL.len() {
            p = p.next();
        }
        assert_eq!(p, ColorPreset::Red);
        assert_eq!(ColorPreset::White.next(), ColorPreset::Red);
        assert_eq!("yellow".parse::<ColorPreset>(), Ok(ColorPreset::Yellow));
        assert!("purple".parse::<ColorPreset>().is_err());
        assert_eq!("glow".parse::<HighlightStyle>(), Ok(HighlightStyle::GlowOverlay));
    }

    #[test]
    fn sanitized_enforces_engine_bounds() {
        let mut p = ColorProfile::default();
        p.mask_softness = 0.9;
        p.chroma_weight = 3.0;
        p.highlight_boost = 0.1;
        p.saturation_range = Range::new(-1.0, 2.0);
        let s = p.sanitized();
        assert!(close(s.mask_softness, SOFTNESS_MAX));
        assert!(close(s.chroma_weight, 1.0));
        assert!(close(s.highlight_boost, HIGHLIGHT_BOOST_MIN));
        assert_eq!(s.saturation_range, Range::new(0.0, 1.0));
    }
}
