//! Newton–Raphson root finding for two-variable residual functions.
//!
//! The Jacobian is estimated by forward differences with a caller-supplied
//! step, so the residual only needs to be evaluable, not differentiable in
//! closed form.

use log::debug;
use nalgebra::{Matrix2, Vector2};

use crate::camera::CameraModelError;
use crate::optimization::ResidualFunction;

/// Default cap on Newton iterations.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Updates smaller than this fraction of the differentiation step end the
/// iteration.
pub const UPDATE_TOLERANCE_RATIO: f64 = 1e-6;

/// Solves `func(x) = target` starting from an initial guess.
pub struct NewtonRaphson<'a, F: ResidualFunction + ?Sized> {
    func: &'a F,
    max_iterations: usize,
}

impl<'a, F: ResidualFunction + ?Sized> NewtonRaphson<'a, F> {
    pub fn new(func: &'a F) -> Self {
        NewtonRaphson {
            func,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Finds `x` with `|func(x) - target| < tol`.
    ///
    /// The iteration also ends when the Newton update drops below
    /// `step * UPDATE_TOLERANCE_RATIO`: at that point the residual is at the
    /// noise floor of its own evaluation.
    ///
    /// # Arguments
    ///
    /// * `guess` - Starting point.
    /// * `target` - Value the residual must reach.
    /// * `step` - Forward-difference step for the Jacobian.
    /// * `tol` - Convergence threshold on the residual norm.
    ///
    /// # Errors
    ///
    /// * Any error raised by the residual function.
    /// * [`CameraModelError::NumericalError`] on a singular Jacobian, a
    ///   non-finite iterate, or when the iteration cap is reached.
    pub fn solve(
        &self,
        guess: &Vector2<f64>,
        target: &Vector2<f64>,
        step: f64,
        tol: f64,
    ) -> Result<Vector2<f64>, CameraModelError> {
        let mut x = *guess;

        for iteration in 0..self.max_iterations {
            let value = self.func.residual(&x)?;
            let error = value - target;
            let error_norm = error.norm();
            debug!("Newton iteration {iteration}: x = {x:?}, |error| = {error_norm:e}");

            if error_norm < tol {
                return Ok(x);
            }

            let jacobian = self.numerical_jacobian(&x, &value, step)?;
            let inverse = jacobian.try_inverse().ok_or_else(|| {
                CameraModelError::NumericalError(format!(
                    "Singular Jacobian at {x:?} in Newton-Raphson solver"
                ))
            })?;

            let delta = inverse * error;
            x -= delta;

            if !x.iter().all(|v| v.is_finite()) {
                return Err(CameraModelError::NumericalError(
                    "Newton-Raphson iterate is not finite".to_string(),
                ));
            }

            let min_update =
                (step.abs() * UPDATE_TOLERANCE_RATIO).max(16.0 * f64::EPSILON * (1.0 + x.norm()));
            if delta.norm() <= min_update {
                debug!(
                    "Newton-Raphson update below {min_update:e} after {} iterations, |error| = {error_norm:e}",
                    iteration + 1
                );
                return Ok(x);
            }
        }

        Err(CameraModelError::NumericalError(format!(
            "Newton-Raphson did not converge in {} iterations",
            self.max_iterations
        )))
    }

    fn numerical_jacobian(
        &self,
        x: &Vector2<f64>,
        value: &Vector2<f64>,
        step: f64,
    ) -> Result<Matrix2<f64>, CameraModelError> {
        let mut jacobian = Matrix2::zeros();
        for col in 0..2 {
            let mut shifted = *x;
            shifted[col] += step;
            let derivative = (self.func.residual(&shifted)? - value) / step;
            jacobian.set_column(col, &derivative);
        }
        Ok(jacobian)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Affine map with a known root.
    struct Affine {
        matrix: Matrix2<f64>,
        offset: Vector2<f64>,
    }

    impl ResidualFunction for Affine {
        fn residual(&self, x: &Vector2<f64>) -> Result<Vector2<f64>, CameraModelError> {
            Ok(self.matrix * x + self.offset)
        }
    }

    /// `(x² + y² - 25, x - y - 1)` with roots (4, 3) and (-3, -4).
    struct Circle;

    impl ResidualFunction for Circle {
        fn residual(&self, x: &Vector2<f64>) -> Result<Vector2<f64>, CameraModelError> {
            Ok(Vector2::new(x.x * x.x + x.y * x.y - 25.0, x.x - x.y - 1.0))
        }
    }

    struct Failing;

    impl ResidualFunction for Failing {
        fn residual(&self, _x: &Vector2<f64>) -> Result<Vector2<f64>, CameraModelError> {
            Err(CameraModelError::PixelToRay("outside the image".to_string()))
        }
    }

    #[test]
    fn test_solves_affine_system() {
        let func = Affine {
            matrix: Matrix2::new(2.0, 1.0, -1.0, 3.0),
            offset: Vector2::new(-4.0, 5.0),
        };
        let solution = NewtonRaphson::new(&func)
            .solve(&Vector2::new(100.0, -50.0), &Vector2::zeros(), 1e-2, 1e-12)
            .unwrap();
        let value = func.residual(&solution).unwrap();
        assert!(value.norm() < 1e-12);
    }

    #[test]
    fn test_solves_nonlinear_system_with_target() {
        let solution = NewtonRaphson::new(&Circle)
            .solve(&Vector2::new(5.0, 2.0), &Vector2::zeros(), 1e-6, 1e-10)
            .unwrap();
        assert_relative_eq!(solution, Vector2::new(4.0, 3.0), epsilon = 1e-8);

        // Shifted target: x² + y² = 50, x - y = 0
        let solution = NewtonRaphson::new(&Circle)
            .solve(&Vector2::new(4.0, 4.0), &Vector2::new(25.0, -1.0), 1e-6, 1e-10)
            .unwrap();
        assert_relative_eq!(solution, Vector2::new(5.0, 5.0), epsilon = 1e-8);
    }

    #[test]
    fn test_returns_guess_when_already_converged() {
        let guess = Vector2::new(4.0, 3.0);
        let solution = NewtonRaphson::new(&Circle)
            .solve(&guess, &Vector2::zeros(), 1e-6, 1e-10)
            .unwrap();
        assert_eq!(solution, guess);
    }

    #[test]
    fn test_singular_jacobian() {
        let func = Affine {
            matrix: Matrix2::new(1.0, 0.0, 1.0, 0.0),
            offset: Vector2::new(1.0, 0.0),
        };
        let result =
            NewtonRaphson::new(&func).solve(&Vector2::zeros(), &Vector2::zeros(), 1e-2, 1e-10);
        assert!(matches!(result, Err(CameraModelError::NumericalError(_))));
    }

    #[test]
    fn test_iteration_cap() {
        let result = NewtonRaphson::new(&Circle)
            .with_max_iterations(1)
            .solve(&Vector2::new(50.0, 20.0), &Vector2::zeros(), 1e-6, 1e-10);
        assert!(matches!(result, Err(CameraModelError::NumericalError(_))));
    }

    #[test]
    fn test_propagates_residual_errors() {
        let result =
            NewtonRaphson::new(&Failing).solve(&Vector2::zeros(), &Vector2::zeros(), 1e-2, 1e-10);
        assert!(matches!(result, Err(CameraModelError::PixelToRay(_))));
    }
}
