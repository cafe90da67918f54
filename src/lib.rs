//! Find one target color in a live camera image.
//!
//! A [`session::Session`] ties together the HSV color catalog, the
//! segmentation engine, the camera providers and the mode controller. The
//! binary drives it once per frame and hands each [`output::TickOutput`] to
//! a presenter.

pub mod calibration;
pub mod cancel;
pub mod capture;
pub mod color;
pub mod control;
pub mod controller;
pub mod error;
pub mod output;
pub mod profile;
pub mod segmentation;
pub mod session;

pub use error::{FinderError, Result};
