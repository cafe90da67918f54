//! CPU reference compositor.

use image::RgbImage;

use super::MaskComposite;
use crate::color::Rgb;
use crate::controller::BasicStylingParams;
use crate::segmentation::SegmentationMask;

/// Width in pixels of the edge band drawn around Basic-mode previews.
const BASIC_EDGE_PX: u32 = 6;

fn extrapolate(from: Rgb, to: Rgb, k: f32) -> Rgb {
    Rgb::new(
        from.r + (to.r - from.r) * k,
        from.g + (to.g - from.g) * k,
        from.b + (to.b - from.b) * k,
    )
}

fn add(a: Rgb, b: Rgb) -> Rgb {
    Rgb::new(a.r + b.r, a.g + b.g, a.b + b.b)
}

/// Mask value at frame pixel `(x, y)`, nearest-sampled when sizes differ.
fn mask_at(mask: &SegmentationMask, x: i64, y: i64, frame: (u32, u32)) -> f32 {
    let (fw, fh) = frame;
    if mask.is_empty() || x < 0 || y < 0 || x >= fw as i64 || y >= fh as i64 {
        return 0.0;
    }
    let mx = (x as u64 * mask.width() as u64 / fw as u64) as u32;
    let my = (y as u64 * mask.height() as u64 / fh as u64) as u32;
    mask.get(mx, my).unwrap_or(0.0)
}

/// Largest mask step across `width` pixels in any axis direction.
fn mask_edge(mask: &SegmentationMask, x: u32, y: u32, width: u32, frame: (u32, u32)) -> f32 {
    let (x, y, w) = (x as i64, y as i64, width as i64);
    let m = mask_at(mask, x, y, frame);
    [(w, 0), (-w, 0), (0, w), (0, -w)]
        .iter()
        .map(|(dx, dy)| (m - mask_at(mask, x + dx, y + dy, frame)).abs())
        .fold(0.0, f32::max)
}

/// Blend one Advanced-mode frame.
///
/// Matched pixels keep their color, pushed by the highlight boost; the rest
/// is desaturated according to the style. Mask edges get an accent glow
/// modulated by the pulse.
pub fn composite_mask(composite: &MaskComposite<'_>) -> RgbImage {
    let _span = tracing::debug_span!("composite").entered();
    let params = composite.params();
    let source = composite.frame.image();
    let size = source.dimensions();
    let pulse = composite.pulse.clamp(0.0, 1.0);
    let glow = composite
        .accent
        .scale(params.glow_intensity * (0.6 + 0.4 * pulse));
    let saturation_boost = composite.highlight_boost - 1.0;

    let mut out = RgbImage::new(size.0, size.1);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let src = Rgb::from_pixel(source.get_pixel(x, y));
        let luma = src.luma();
        let gray = Rgb::new(luma, luma, luma);
        let m = mask_at(composite.mask, x as i64, y as i64, size);

        let base = src.lerp(gray, params.outside_desaturate * (1.0 - m));
        let boosted = extrapolate(gray, base, 1.0 + saturation_boost * m);
        let edge = mask_edge(composite.mask, x, y, params.glow_width_px, size);

        let mut color = add(boosted, glow.scale(edge));
        if params.outside_desaturate == 0.0 {
            color = add(color, glow.scale(0.35 * m));
        }
        *pixel = color.to_pixel();
    }
    out
}

/// Apply the Basic styling color map to one value.
pub fn style_basic(color: Rgb, params: &BasicStylingParams) -> Rgb {
    let contrast = 1.0 + params.contrast;
    let mut c = color.offset(params.brightness);
    c = Rgb::new(
        (c.r - 0.5) * contrast + 0.5,
        (c.g - 0.5) * contrast + 0.5,
        (c.b - 0.5) * contrast + 0.5,
    );
    if params.posterize > 0.0 {
        let levels = (1.0 / params.posterize).round().max(2.0);
        let quantize = |v: f32| (v.clamp(0.0, 1.0) * levels).round() / levels;
        c = Rgb::new(quantize(c.r), quantize(c.g), quantize(c.b));
    }
    Rgb::new(
        c.r * params.color_scale.r,
        c.g * params.color_scale.g,
        c.b * params.color_scale.b,
    )
    .offset(params.color_offset)
}

/// Basic-mode preview: the passthrough itself is not available off-headset,
/// so a horizontal luma ramp is run through the styling, framed by the
/// pulsing edge color when edge rendering is on.
pub fn composite_basic(
    width: u32,
    height: u32,
    params: &BasicStylingParams,
    edge_pulse: f32,
) -> RgbImage {
    let edge = params.edge_color_at(edge_pulse);
    let span = width.saturating_sub(1).max(1) as f32;
    RgbImage::from_fn(width, height, |x, y| {
        let on_edge = x < BASIC_EDGE_PX
            || y < BASIC_EDGE_PX
            || x + BASIC_EDGE_PX >= width
            || y + BASIC_EDGE_PX >= height;
        if params.edge_rendering && on_edge {
            return edge.to_pixel();
        }
        let v = x as f32 / span;
        style_basic(Rgb::new(v, v, v), params).to_pixel()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CameraFrame;
    use crate::profile::{ColorPreset, ColorProfile, HighlightStyle};

    fn composite<'a>(
        frame: &'a CameraFrame,
        mask: &'a SegmentationMask,
        style: HighlightStyle,
    ) -> MaskComposite<'a> {
        MaskComposite {
            frame,
            mask,
            style,
            accent: Rgb::new(1.0, 0.15, 0.15),
            highlight_boost: 1.0,
            pulse: 0.5,
        }
    }

    #[test]
    fn bw_keeps_matches_and_desaturates_the_rest() {
        let frame = CameraFrame::filled(16, 8, Rgb::new(0.8, 0.1, 0.1));
        // left half matched
        let mask = SegmentationMask::from_fn(16, 8, |x, _| if x < 8 { 1.0 } else { 0.0 });
        let out = composite_mask(&composite(&frame, &mask, HighlightStyle::BwExceptTarget));

        let kept = out.get_pixel(2, 4);
        assert!(kept[0] > 150 && kept[1] < 60, "{:?}", kept);

        let gray = out.get_pixel(13, 4);
        assert_eq!(gray[0], gray[1]);
        assert_eq!(gray[1], gray[2]);
    }

    #[test]
    fn glow_keeps_scene_color_and_lights_edges() {
        let frame = CameraFrame::filled(16, 8, Rgb::new(0.2, 0.6, 0.2));
        let mask = SegmentationMask::from_fn(16, 8, |x, _| if x < 8 { 1.0 } else { 0.0 });
        let out = composite_mask(&composite(&frame, &mask, HighlightStyle::GlowOverlay));

        let outside = out.get_pixel(14, 4);
        assert_eq!(*outside, Rgb::new(0.2, 0.6, 0.2).to_pixel());
        let edge = out.get_pixel(8, 4);
        assert!(edge[0] > outside[0]);
    }

    #[test]
    fn mismatched_mask_is_resampled() {
        let frame = CameraFrame::filled(32, 16, Rgb::new(0.8, 0.1, 0.1));
        let mask = SegmentationMask::from_fn(8, 4, |_, _| 1.0);
        let out = composite_mask(&composite(&frame, &mask, HighlightStyle::BwExceptTarget));
        let p = out.get_pixel(16, 8);
        assert!(p[0] > 150 && p[1] < 60);
    }

    #[test]
    fn basic_preview_draws_edge_only_for_glow() {
        let profile = ColorProfile::preset(ColorPreset::Blue);
        let glow = BasicStylingParams::for_selection(HighlightStyle::GlowOverlay, &profile);
        let img = composite_basic(64, 32, &glow, 1.0);
        assert_eq!(*img.get_pixel(0, 0), glow.edge_color_at(1.0).to_pixel());

        let bw = BasicStylingParams::for_selection(HighlightStyle::BwExceptTarget, &profile);
        let img = composite_basic(64, 32, &bw, 1.0);
        assert_ne!(*img.get_pixel(0, 0), bw.edge_color_at(1.0).to_pixel());
        // ramp stays monotonic through the color map
        assert!(img.get_pixel(63, 16)[1] >= img.get_pixel(0, 16)[1]);
    }

    #[test]
    fn posterize_quantizes() {
        let profile = ColorProfile::preset(ColorPreset::Red);
        let bw = BasicStylingParams::for_selection(HighlightStyle::BwExceptTarget, &profile);
        let a = style_basic(Rgb::new(0.50, 0.50, 0.50), &bw);
        let b = style_basic(Rgb::new(0.51, 0.51, 0.51), &bw);
        assert_eq!(a, b);
    }
}
