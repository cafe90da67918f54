//! Center-patch color calibration.
//!
//! A [`CalibrationJob`] runs over two ticks: the tick that starts it
//! scale-copies the live frame into a small scratch buffer, the next tick
//! reads back a centered patch and averages it into an HSV sample.

use image::{imageops, RgbImage};

use crate::cancel::CancelToken;
use crate::capture::CameraFrame;
use crate::color::{Hsv, Rgb};
use crate::error::{FinderError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationSettings {
    /// Edge length of the square scratch buffer.
    pub buffer_size: u32,
    /// Half edge length of the sampled center patch.
    pub patch_radius: u32,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            buffer_size: 64,
            patch_radius: 8,
        }
    }
}

/// Result of advancing a job past its frame boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationStep {
    Finished(Result<Hsv>),
    /// Stopped by its owner; nothing was produced.
    Cancelled,
}

enum Stage {
    AwaitingReadback(RgbImage),
    Done,
}

pub struct CalibrationJob {
    settings: CalibrationSettings,
    stage: Stage,
    cancel: CancelToken,
}

impl CalibrationJob {
    /// Scale-copy `frame` into the scratch buffer. The sample is read back
    /// on the following call to [`CalibrationJob::poll`].
    pub fn begin(
        frame: Option<&CameraFrame>,
        settings: CalibrationSettings,
        cancel: CancelToken,
    ) -> Result<Self> {
        let frame = match frame {
            Some(frame) if !frame.is_empty() => frame,
            _ => return Err(FinderError::FrameUnavailable),
        };

        let _span = tracing::debug_span!("calibration_copy").entered();
        let size = settings.buffer_size;
        let scratch = imageops::resize(frame.image(), size, size, imageops::FilterType::Triangle);
        tracing::debug!(
            "Calibration copy {}x{} -> {}x{}",
            frame.width(),
            frame.height(),
            size,
            size
        );

        Ok(Self {
            settings,
            stage: Stage::AwaitingReadback(scratch),
            cancel,
        })
    }

    pub fn is_done(&self) -> bool {
        matches!(self.stage, Stage::Done)
    }

    /// Advance past one frame boundary.
    pub fn poll(&mut self) -> CalibrationStep {
        // scratch buffer is dropped on every path out of here
        let stage = std::mem::replace(&mut self.stage, Stage::Done);
        let scratch = match stage {
            Stage::AwaitingReadback(scratch) => scratch,
            Stage::Done => return CalibrationStep::Cancelled,
        };

        if self.cancel.is_cancelled() {
            tracing::debug!("Calibration cancelled before readback");
            return CalibrationStep::Cancelled;
        }

        let _span = tracing::debug_span!("calibration_readback").entered();
        CalibrationStep::Finished(sample_center(&scratch, &self.settings))
    }
}

/// Average the centered patch of `buffer` and convert it to HSV.
pub fn sample_center(buffer: &RgbImage, settings: &CalibrationSettings) -> Result<Hsv> {
    let expected = settings.buffer_size;
    if buffer.dimensions() != (expected, expected) {
        return Err(FinderError::CalibrationReadbackFailed(format!(
            "scratch buffer is {}x{}, expected {}x{}",
            buffer.width(),
            buffer.height(),
            expected,
            expected
        )));
    }

    let center = expected / 2;
    let radius = settings.patch_radius;
    let (mut r, mut g, mut b) = (0.0f64, 0.0f64, 0.0f64);
    let mut count = 0u32;

    for y in center.saturating_sub(radius)..center + radius {
        for x in center.saturating_sub(radius)..center + radius {
            if let Some(pixel) = buffer.get_pixel_checked(x, y) {
                let rgb = Rgb::from_pixel(pixel);
                r += rgb.r as f64;
                g += rgb.g as f64;
                b += rgb.b as f64;
                count += 1;
            }
        }
    }

    if count == 0 {
        return Err(FinderError::CalibrationEmptySample);
    }

    let n = count as f64;
    let average = Rgb::new((r / n) as f32, (g / n) as f32, (b / n) as f32);
    let hsv = average.to_hsv().normalized();
    tracing::debug!("Calibration sampled {} pixels: {:?}", count, hsv);
    Ok(hsv)
}
