use super::{composite_basic, composite_mask, Presenter, TickOutput};
use anyhow::{Context, Result};
use image::RgbImage;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use v4l::video::Output;
use v4l::{Device, FourCC};

/// Presenter writing composited frames to a v4l2loopback device as YUYV.
pub struct V4L2Output {
    file: File,
    width: u32,
    height: u32,
    /// Reused conversion buffer.
    yuyv: Vec<u8>,
}

impl V4L2Output {
    pub fn new<P: AsRef<Path>>(device_path: P, width: u32, height: u32) -> Result<Self> {
        let path = device_path.as_ref();
        tracing::info!(
            "Opening v4l2loopback device at {} ({}x{})",
            path.display(),
            width,
            height
        );

        if let Err(e) = Self::configure(path, width, height) {
            tracing::warn!("Could not set loopback format, writing anyway: {:#}", e);
        }

        // v4l2loopback accepts raw frame data written to the device file
        let file = File::options()
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open v4l2loopback device at {}", path.display()))?;

        tracing::info!("v4l2loopback device opened successfully");

        Ok(Self {
            file,
            width,
            height,
            yuyv: Vec::with_capacity((width * height * 2) as usize),
        })
    }

    fn configure(path: &Path, width: u32, height: u32) -> Result<()> {
        let device = Device::with_path(path)
            .with_context(|| format!("Failed to open {} for format negotiation", path.display()))?;
        let mut format = Output::format(&device).context("Failed to query output format")?;
        format.width = width;
        format.height = height;
        format.fourcc = FourCC::new(b"YUYV");
        let applied = Output::set_format(&device, &format).context("Failed to set output format")?;
        tracing::debug!(
            "Loopback format {}x{} {}",
            applied.width,
            applied.height,
            applied.fourcc
        );
        Ok(())
    }

    fn write_image(&mut self, frame: &RgbImage) -> Result<()> {
        let resized;
        let frame = if frame.dimensions() != (self.width, self.height) {
            resized = image::imageops::resize(
                frame,
                self.width,
                self.height,
                image::imageops::FilterType::Triangle,
            );
            &resized
        } else {
            frame
        };

        rgb_to_yuyv(frame, &mut self.yuyv);
        self.file
            .write_all(&self.yuyv)
            .context("Failed to write frame to v4l2loopback device")?;
        Ok(())
    }
}

/// Pack an RGB frame as YUV 4:2:2 (Y0 U Y1 V), chroma averaged per pixel pair.
fn rgb_to_yuyv(rgb_image: &RgbImage, out: &mut Vec<u8>) {
    let (width, height) = rgb_image.dimensions();
    out.clear();
    out.reserve((width * height * 2) as usize);

    for y in 0..height {
        for x in (0..width).step_by(2) {
            let p1 = rgb_image.get_pixel(x, y);
            let p2 = if x + 1 < width {
                rgb_image.get_pixel(x + 1, y)
            } else {
                p1
            };

            let (y1, u1, v1) = rgb_to_yuv(p1[0], p1[1], p1[2]);
            let (y2, u2, v2) = rgb_to_yuv(p2[0], p2[1], p2[2]);
            let u = ((u1 as u16 + u2 as u16) / 2) as u8;
            let v = ((v1 as u16 + v2 as u16) / 2) as u8;

            out.extend_from_slice(&[y1, u, y2, v]);
        }
    }
}

fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let r = r as f32;
    let g = g as f32;
    let b = b as f32;

    let y = (0.299 * r + 0.587 * g + 0.114 * b).clamp(0.0, 255.0) as u8;
    let u = ((-0.147 * r - 0.289 * g + 0.436 * b) + 128.0).clamp(0.0, 255.0) as u8;
    let v = ((0.615 * r - 0.515 * g - 0.100 * b) + 128.0).clamp(0.0, 255.0) as u8;

    (y, u, v)
}

impl Presenter for V4L2Output {
    fn present(&mut self, output: &TickOutput<'_>) -> Result<()> {
        let image = match output {
            TickOutput::Advanced(composite) => composite_mask(composite),
            TickOutput::Basic { params, edge_pulse } => {
                composite_basic(self.width, self.height, params, *edge_pulse)
            }
            // keep the consumer fed while the camera is being negotiated
            TickOutput::Waiting => RgbImage::new(self.width, self.height),
        };
        self.write_image(&image)
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
