use ndarray::Array2;

use crate::capture::CameraFrame;
use crate::profile::ColorProfile;

/// Per-pixel match confidence, 0.0 = no match, 1.0 = certain match.
/// Stored row-major as `[height, width]`; rebuilt from scratch every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationMask {
    values: Array2<f32>,
}

impl SegmentationMask {
    pub fn empty() -> Self {
        Self {
            values: Array2::zeros((0, 0)),
        }
    }

    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> f32,
    {
        let values = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
            f(x as u32, y as u32)
        });
        Self { values }
    }

    pub fn width(&self) -> u32 {
        self.values.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.values.nrows() as u32
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Confidence at `(x, y)`, or `None` outside the mask.
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        self.values.get((y as usize, x as usize)).copied()
    }

    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    /// Mean confidence over the whole mask; 0.0 for an empty mask.
    pub fn coverage(&self) -> f32 {
        self.values.mean().unwrap_or(0.0)
    }
}

/// Trait for segmentation backends.
/// The frame is only borrowed for the current tick; implementations must not
/// keep any reference to it.
pub trait SegmentationModel {
    /// Score every pixel of `frame` against `profile`.
    ///
    /// A zero-area frame yields an empty mask.
    fn segment(&self, frame: &CameraFrame, profile: &ColorProfile) -> SegmentationMask;

    /// Resolution reduction factor applied before scoring (1 = full resolution).
    fn downsample(&self) -> u32 {
        1
    }
}
