use super::preprocess::Preprocessor;
use super::types::{SegmentationMask, SegmentationModel};
use crate::capture::CameraFrame;
use crate::color::{hue_distance, Hsv, Rgb};
use crate::profile::{ColorProfile, HUE_TOLERANCE_MAX, HUE_TOLERANCE_MIN, SOFTNESS_MAX, SOFTNESS_MIN};

/// Smallest saturation/value tolerance used as a divisor.
const MIN_SV_TOLERANCE: f32 = 1e-4;

/// Hermite interpolation between `edge0` and `edge1`, clamped to `[0, 1]`.
/// Works with `edge0 > edge1`, which yields a falling edge.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Normalized distance of `pixel` from the profile target.
/// 0 at the target, 1 on the tolerance boundary.
pub fn match_distance(pixel: Hsv, profile: &ColorProfile) -> f32 {
    let tol_h = profile.tolerance.h.clamp(HUE_TOLERANCE_MIN, HUE_TOLERANCE_MAX);
    let tol_s = profile.tolerance.s.clamp(MIN_SV_TOLERANCE, 1.0);
    let tol_v = profile.tolerance.v.clamp(MIN_SV_TOLERANCE, 1.0);
    let chroma = profile.chroma_weight.clamp(0.0, 1.0);

    let dh = hue_distance(pixel.h, profile.target.h) / tol_h;
    let ds = (pixel.s - profile.target.s).abs() / tol_s;
    let dv = (pixel.v - profile.target.v).abs() / tol_v;

    (chroma * (dh * dh + ds * ds) + (1.0 - chroma) * dv * dv).sqrt()
}

/// Match confidence of one HSV pixel in `[0, 1]`.
pub fn score_hsv(pixel: Hsv, profile: &ColorProfile) -> f32 {
    // Hard bounds reject regardless of hue
    if !profile.saturation_range.contains(pixel.s) || !profile.value_range.contains(pixel.v) {
        return 0.0;
    }

    let softness = profile.mask_softness.clamp(SOFTNESS_MIN, SOFTNESS_MAX);
    smoothstep(1.0, 1.0 - softness, match_distance(pixel, profile))
}

pub fn score_rgb(pixel: Rgb, profile: &ColorProfile) -> f32 {
    score_hsv(pixel.to_hsv(), profile)
}

/// Per-pixel HSV matcher.
///
/// Scores a reduced copy of the frame and upsamples the result so the
/// returned mask always has the frame's dimensions.
#[derive(Debug, Clone, Copy)]
pub struct HsvMatcher {
    preprocessor: Preprocessor,
}

impl HsvMatcher {
    pub fn new(downsample: u32) -> Self {
        Self {
            preprocessor: Preprocessor::new(downsample),
        }
    }
}

impl Default for HsvMatcher {
    fn default() -> Self {
        Self::new(2)
    }
}

impl SegmentationModel for HsvMatcher {
    fn segment(&self, frame: &CameraFrame, profile: &ColorProfile) -> SegmentationMask {
        let _span = tracing::debug_span!("hsv_segment").entered();

        if frame.is_empty() {
            return SegmentationMask::empty();
        }

        let profile = profile.sanitized();
        let reduced = self.preprocessor.reduce(frame.image());
        let (width, height) = reduced.dimensions();

        let mask = SegmentationMask::from_fn(width, height, |x, y| {
            score_rgb(Rgb::from_pixel(reduced.get_pixel(x, y)), &profile)
        });

        Preprocessor::upsample_mask(mask, frame.width(), frame.height())
    }

    fn downsample(&self) -> u32 {
        self.preprocessor.downsample()
    }
}
