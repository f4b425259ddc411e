//! The `optimization` module provides the root finding used to invert camera
//! models.
//!
//! A sight ray can be computed directly for any pixel, but the pixel that sees
//! a given world point has no closed form for a scanning sensor. It is found
//! by driving a two-variable residual to zero:
//!
//! 1. [`GroundResidual`] measures how far a pixel's ray misses the point, at
//!    ground scale.
//! 2. [`NewtonRaphson`] solves for the pixel where that residual vanishes,
//!    using a numerically differentiated Jacobian.

use nalgebra::Vector2;

use crate::camera::CameraModelError;

pub mod ground_residual;
pub mod newton_raphson;

pub use ground_residual::GroundResidual;
pub use newton_raphson::NewtonRaphson;

/// A two-variable function whose root is sought.
///
/// Implementations may fail; the error is handed back unchanged by the solver.
pub trait ResidualFunction {
    fn residual(&self, x: &Vector2<f64>) -> Result<Vector2<f64>, CameraModelError>;
}
