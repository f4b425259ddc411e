//! Optical Bar Tools Library
//!
//! A Rust library for optical-bar (panoramic scan) camera models as flown on
//! reconnaissance satellites. This library provides:
//! - The [`OpticalBarModel`] with pixel-to-ray and ground-to-pixel mappings
//! - Atmospheric refraction and velocity aberration corrections
//! - A Newton-Raphson solver for inverting the projection
//! - Text (`VERSION_4`) and YAML model files
//! - Round-trip diagnostics over a grid of pixels

pub mod camera;
pub mod corrections;
pub mod geometry;
pub mod optimization;

// Re-export commonly used types
pub use camera::{CameraModel, CameraModelError, OpticalBarModel, OpticalBarParams, Resolution};

pub use geometry::{compute_round_trip_error, find_perp_vecs, sample_pixels, ProjectionError};

pub use optimization::{GroundResidual, NewtonRaphson, ResidualFunction};
