use std::borrow::Cow;

use image::{imageops, ImageBuffer, Luma, RgbImage};

use super::types::SegmentationMask;

/// Smallest reduced edge length, unless the frame itself is smaller.
const MIN_REDUCED_EDGE: u32 = 64;

/// Moves frames to and from the reduced resolution the matcher scores at.
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    downsample: u32,
}

impl Preprocessor {
    pub fn new(downsample: u32) -> Self {
        Self {
            downsample: downsample.max(1),
        }
    }

    pub fn downsample(&self) -> u32 {
        self.downsample
    }

    /// Size the matcher scores at for a `width`x`height` frame.
    pub fn reduced_size(&self, width: u32, height: u32) -> (u32, u32) {
        let reduce = |edge: u32| (edge / self.downsample).max(MIN_REDUCED_EDGE.min(edge));
        (reduce(width), reduce(height))
    }

    /// Resize the frame to the scoring resolution, borrowing when no resize is needed.
    pub fn reduce<'a>(&self, image: &'a RgbImage) -> Cow<'a, RgbImage> {
        let _span = tracing::debug_span!("reduce").entered();

        let (width, height) = image.dimensions();
        let target = self.reduced_size(width, height);
        if target == (width, height) {
            Cow::Borrowed(image)
        } else {
            Cow::Owned(imageops::resize(
                image,
                target.0,
                target.1,
                imageops::FilterType::Triangle,
            ))
        }
    }

    /// Bilinearly upsample a reduced mask back to frame dimensions.
    pub fn upsample_mask(
        mask: SegmentationMask,
        target_width: u32,
        target_height: u32,
    ) -> SegmentationMask {
        let _span = tracing::debug_span!("upsample").entered();

        if mask.dimensions() == (target_width, target_height) {
            return mask;
        }
        if mask.is_empty() || target_width == 0 || target_height == 0 {
            return SegmentationMask::from_fn(target_width, target_height, |_, _| 0.0);
        }

        let (width, height) = mask.dimensions();
        let gray: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::from_fn(width, height, |x, y| {
            Luma([mask.get(x, y).unwrap_or(0.0)])
        });

        let resized = imageops::resize(
            &gray,
            target_width,
            target_height,
            imageops::FilterType::Triangle,
        );

        SegmentationMask::from_fn(target_width, target_height, |x, y| {
            resized.get_pixel(x, y)[0].clamp(0.0, 1.0)
        })
    }
}
