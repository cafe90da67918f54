//! Color value types and conversions used by matching and compositing.
//!
//! All channels are normalized floats. Hue is circular in `[0, 1)`.

use image::Rgb as RgbPixel;

/// Linear RGB triple with channels in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);
    pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn from_pixel(pixel: &RgbPixel<u8>) -> Self {
        Self::new(
            pixel[0] as f32 / 255.0,
            pixel[1] as f32 / 255.0,
            pixel[2] as f32 / 255.0,
        )
    }

    pub fn to_pixel(self) -> RgbPixel<u8> {
        let quantize = |c: f32| (c * 255.0).round().clamp(0.0, 255.0) as u8;
        RgbPixel([quantize(self.r), quantize(self.g), quantize(self.b)])
    }

    pub fn scale(self, k: f32) -> Self {
        Self::new(self.r * k, self.g * k, self.b * k)
    }

    pub fn offset(self, k: f32) -> Self {
        Self::new(self.r + k, self.g + k, self.b + k)
    }

    /// Component-wise linear interpolation, `t` clamped to `[0, 1]`.
    pub fn lerp(self, other: Rgb, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
        )
    }

    /// Rec. 601 luma.
    pub fn luma(self) -> f32 {
        0.299 * self.r + 0.587 * self.g + 0.114 * self.b
    }

    pub fn to_hsv(self) -> Hsv {
        rgb_to_hsv(self)
    }
}

/// Hue/saturation/value triple, each in `[0, 1]` (hue in `[0, 1)`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub h: f32,
    pub s: f32,
    pub v: f32,
}

impl Hsv {
    pub const fn new(h: f32, s: f32, v: f32) -> Self {
        Self { h, s, v }
    }

    /// Wrap hue into `[0, 1)` and clamp saturation/value to `[0, 1]`.
    pub fn normalized(self) -> Self {
        Self::new(wrap_unit(self.h), self.s.clamp(0.0, 1.0), self.v.clamp(0.0, 1.0))
    }
}

/// `x mod 1` folded into `[0, 1)`, also for negative input.
pub fn wrap_unit(x: f32) -> f32 {
    let wrapped = x - x.floor();
    // x.floor() can round so that x - floor == 1.0 for tiny negative x
    if wrapped >= 1.0 {
        0.0
    } else {
        wrapped
    }
}

/// Shortest distance between two hues on the unit circle, in `[0, 0.5]`.
pub fn hue_distance(a: f32, b: f32) -> f32 {
    let d = (a - b).abs().rem_euclid(1.0);
    d.min(1.0 - d)
}

pub fn rgb_to_hsv(rgb: Rgb) -> Hsv {
    let max = rgb.r.max(rgb.g).max(rgb.b);
    let min = rgb.r.min(rgb.g).min(rgb.b);
    let delta = max - min;

    let h = if delta <= 0.0 {
        0.0
    } else if max == rgb.r {
        ((rgb.g - rgb.b) / delta) / 6.0
    } else if max == rgb.g {
        ((rgb.b - rgb.r) / delta + 2.0) / 6.0
    } else {
        ((rgb.r - rgb.g) / delta + 4.0) / 6.0
    };

    let s = if max <= 0.0 { 0.0 } else { delta / max };

    Hsv::new(wrap_unit(h), s, max)
}
