//! Camera model abstractions shared by every sensor in this crate.
//!
//! The [`CameraModel`] trait is the contract consumed by triangulation and
//! alignment code: a pixel maps to a camera center and a unit sight ray, and a
//! world point maps back to a pixel. Concrete sensors live in submodules.

use nalgebra::{UnitQuaternion, Vector2, Vector3};
use serde::{Deserialize, Serialize};

pub mod model_file;
pub mod optical_bar;

pub use optical_bar::{OpticalBarModel, OpticalBarParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(thiserror::Error, Debug)]
pub enum CameraModelError {
    #[error("Format error: {0}")]
    FormatError(String),
    #[error("Invalid argument: {0}")]
    ArgumentError(String),
    #[error("Pixel to ray failed: {0}")]
    PixelToRay(String),
    #[error("Numerical error in computation: {0}")]
    NumericalError(String),
    #[error("Invalid camera parameters: {0}")]
    InvalidParams(String),
    #[error("Failed to load YAML: {0}")]
    YamlError(String),
    #[error("Zero projection points")]
    ZeroProjectionPoints,
}

impl From<std::io::Error> for CameraModelError {
    fn from(err: std::io::Error) -> Self {
        CameraModelError::FormatError(err.to_string())
    }
}

impl From<serde_yaml::Error> for CameraModelError {
    fn from(err: serde_yaml::Error) -> Self {
        CameraModelError::YamlError(err.to_string())
    }
}

/// Trait defining the core functionality for camera models
pub trait CameraModel {
    /// Unit sight ray in world coordinates for a pixel
    fn pixel_to_vector(&self, pixel: &Vector2<f64>) -> Result<Vector3<f64>, CameraModelError>;

    /// Camera center in world coordinates at the instant the pixel was exposed
    fn camera_center(&self, pixel: &Vector2<f64>) -> Vector3<f64>;

    /// Camera-to-world rotation at the instant the pixel was exposed
    fn camera_pose(&self, pixel: &Vector2<f64>) -> UnitQuaternion<f64>;

    /// Pixel that observes a world point
    fn point_to_pixel(&self, point: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError>;

    /// Validate camera parameters
    fn validate_params(&self) -> Result<(), CameraModelError>;

    fn get_resolution(&self) -> Resolution;

    /// Short identifier written into model files
    fn type_name(&self) -> &'static str;
}

/// Common validation functions for camera parameters
pub mod validation {
    use super::*;

    pub fn validate_resolution(resolution: &Resolution) -> Result<(), CameraModelError> {
        if resolution.width == 0 || resolution.height == 0 {
            return Err(CameraModelError::InvalidParams(format!(
                "Image size must be positive, got {}x{}",
                resolution.width, resolution.height
            )));
        }
        Ok(())
    }

    pub fn validate_positive(name: &str, value: f64) -> Result<(), CameraModelError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(CameraModelError::InvalidParams(format!(
                "{name} must be positive and finite, got {value}"
            )));
        }
        Ok(())
    }

    pub fn validate_finite(name: &str, values: &[f64]) -> Result<(), CameraModelError> {
        if values.iter().any(|v| !v.is_finite()) {
            return Err(CameraModelError::InvalidParams(format!(
                "{name} must be finite, got {values:?}"
            )));
        }
        Ok(())
    }
}
