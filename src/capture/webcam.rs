use std::time::Duration;

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;

use super::worker::{BlockingSource, CaptureWorker};
use super::{CameraFrame, CameraProvider, ProviderConfig};

/// Development fallback: the first local webcam, opened through nokhwa.
///
/// `Camera::frame` blocks until the device delivers, so the camera lives on a
/// capture thread and `tick` only picks up what it has produced.
pub struct WebcamProvider {
    worker: Option<CaptureWorker>,
    frame: Option<CameraFrame>,
    /// Bound on how long `initialize` waits for the device to open.
    open_timeout: Duration,
}

struct NokhwaSource {
    camera: Camera,
}

impl NokhwaSource {
    fn open(config: ProviderConfig) -> Result<Self, String> {
        let index = resolve_index(&config)?;
        tracing::info!(
            "Initializing webcam {} at {}x{}@{}",
            index,
            config.width,
            config.height,
            config.fps
        );

        let format = CameraFormat::new(
            Resolution::new(config.width, config.height),
            FrameFormat::MJPEG,
            config.fps,
        );
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

        let mut camera = Camera::new(index, requested)
            .map_err(|e| format!("Webcam fallback failed to start: {}", e))?;

        if let Err(e) = camera.open_stream() {
            return Err(format!("Webcam fallback failed to open stream: {}", e));
        }

        tracing::info!("Webcam initialized successfully");
        Ok(Self { camera })
    }
}

impl BlockingSource for NokhwaSource {
    fn read_frame(&mut self) -> Result<CameraFrame, String> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| format!("Webcam frame not ready: {}", e))?;
        let image = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| format!("Failed to decode webcam frame: {}", e))?;
        Ok(CameraFrame::new(image))
    }

    fn stop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            tracing::warn!("Failed to stop webcam stream: {}", e);
        }
        tracing::debug!("Webcam released");
    }
}

fn resolve_index(config: &ProviderConfig) -> Result<CameraIndex, String> {
    if let Some(index) = config.device_index {
        return Ok(CameraIndex::Index(index));
    }

    let devices = nokhwa::query(ApiBackend::Auto)
        .map_err(|e| format!("Failed to query local webcams: {}", e))?;

    devices
        .first()
        .map(|info| info.index().clone())
        .ok_or_else(|| "No local webcam found for Advanced-mode simulation.".to_string())
}

impl WebcamProvider {
    pub const NAME: &'static str = "Local webcam (development fallback)";

    pub fn new() -> Self {
        Self {
            worker: None,
            frame: None,
            open_timeout: Duration::from_secs(3),
        }
    }
}

impl Default for WebcamProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraProvider for WebcamProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&mut self, config: &ProviderConfig) -> Result<(), String> {
        self.dispose();

        let config = *config;
        let worker = CaptureWorker::spawn(
            "webcam-capture",
            move || NokhwaSource::open(config),
            self.open_timeout,
        )?;
        self.worker = Some(worker);
        Ok(())
    }

    fn tick(&mut self) {
        let Some(worker) = self.worker.as_ref() else {
            return;
        };

        match worker.latest() {
            Ok(Some(frame)) => self.frame = Some(frame),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("{}", e);
                self.dispose();
            }
        }
    }

    fn current_frame(&self) -> Option<&CameraFrame> {
        self.frame.as_ref()
    }

    fn dispose(&mut self) {
        self.frame = None;
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }
    }
}

impl Drop for WebcamProvider {
    fn drop(&mut self) {
        self.dispose();
    }
}
