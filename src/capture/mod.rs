mod passthrough;
mod webcam;
mod worker;

pub use passthrough::{source_affinity, BackendRegistry, PassthroughBackend, PassthroughProvider};
pub use webcam::WebcamProvider;

use image::RgbImage;

use crate::color::Rgb;

/// The current video image of a provider.
///
/// Owned by the provider that produced it. Consumers borrow it for one tick;
/// the provider may resize or replace it before the next one.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    image: RgbImage,
}

impl CameraFrame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// Frame of a single flat color.
    pub fn filled(width: u32, height: u32, color: Rgb) -> Self {
        Self::new(RgbImage::from_pixel(width, height, color.to_pixel()))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}

/// What a provider is asked for when it attaches to a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Explicit local device; `None` takes the first one found.
    pub device_index: Option<u32>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
            device_index: None,
        }
    }
}

/// Capability contract shared by every camera source.
pub trait CameraProvider {
    /// Human-readable name used in status and failure text.
    fn name(&self) -> &str;

    /// Attach to the camera capability.
    ///
    /// A missing capability is reported as `Err(reason)`, never a panic.
    fn initialize(&mut self, config: &ProviderConfig) -> Result<(), String>;

    /// Advance whatever polling keeps `current_frame` fresh.
    /// Must be a no-op before `initialize`.
    fn tick(&mut self);

    fn current_frame(&self) -> Option<&CameraFrame>;

    /// Release everything. Safe to call repeatedly and mid-initialization.
    fn dispose(&mut self);

    /// The current frame, if it has non-zero area.
    fn ready_frame(&self) -> Option<&CameraFrame> {
        self.current_frame().filter(|frame| !frame.is_empty())
    }
}

/// Builds a fresh, ranked candidate list for one probing pass.
pub type ProviderFactory = Box<dyn Fn() -> Vec<Box<dyn CameraProvider>>>;
