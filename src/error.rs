use thiserror::Error;

/// Every failure the runtime can report.
///
/// None of these are fatal: providers and calibration downgrade the mode or
/// reject the single request that caused them, and the session turns the
/// display text into its status line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FinderError {
    #[error("Camera permission denied. Using Basic styling.")]
    PermissionDenied,

    #[error("{0}")]
    ProviderInitFailed(String),

    #[error("{provider} started but no camera texture became available.")]
    ProviderTimedOut { provider: String },

    #[error("Camera texture is not ready for calibration.")]
    FrameUnavailable,

    #[error("Advanced mode is not active.")]
    CalibrationNotActive,

    #[error("Calibration sample was empty.")]
    CalibrationEmptySample,

    #[error("Calibration failed: {0}")]
    CalibrationReadbackFailed(String),

    #[error("Mask compositing is unavailable on this presenter. Basic styling only.")]
    CompositorUnavailable,
}

pub type Result<T> = std::result::Result<T, FinderError>;
