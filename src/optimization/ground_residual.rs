//! Ground-level residual used to map world points back to pixels.

use nalgebra::{Vector2, Vector3};

use crate::camera::{CameraModel, CameraModelError};
use crate::geometry::find_perp_vecs;
use crate::optimization::ResidualFunction;

/// Discrepancy between a pixel's sight ray and the direction to a ground point.
///
/// The difference of the two unit directions is projected onto a plane roughly
/// perpendicular to the camera-to-ground direction and scaled by the distance
/// to the point, so it is measured in ground units. It is zero at the pixel
/// that sees the point.
///
/// The plane is fixed from the initial guess and is not refreshed while
/// iterating; the solver starts close to the right direction and the plane
/// turns slowly compared to convergence.
pub struct GroundResidual<'a, M: CameraModel + ?Sized> {
    model: &'a M,
    point: Vector3<f64>,
    perp1: Vector3<f64>,
    perp2: Vector3<f64>,
}

impl<'a, M: CameraModel + ?Sized> GroundResidual<'a, M> {
    /// # Errors
    ///
    /// [`CameraModelError::ArgumentError`] if `point` coincides with the camera
    /// center at `guess`.
    pub fn new(
        model: &'a M,
        point: &Vector3<f64>,
        guess: &Vector2<f64>,
    ) -> Result<Self, CameraModelError> {
        let cam_ctr = model.camera_center(guess);
        let offset = point - cam_ctr;
        let distance = offset.norm();
        if !distance.is_finite() || distance <= 0.0 {
            return Err(CameraModelError::ArgumentError(format!(
                "Ground point {point:?} has no direction from the camera center {cam_ctr:?}"
            )));
        }

        let (perp1, perp2) = find_perp_vecs(&(offset / distance))?;

        Ok(GroundResidual {
            model,
            point: *point,
            perp1,
            perp2,
        })
    }
}

impl<M: CameraModel + ?Sized> ResidualFunction for GroundResidual<'_, M> {
    fn residual(&self, pixel: &Vector2<f64>) -> Result<Vector2<f64>, CameraModelError> {
        let cam_ctr = self.model.camera_center(pixel);

        let dist_to_ground = (self.point - cam_ctr).norm();
        let ground_dir = (self.point - cam_ctr) / dist_to_ground;

        let pix_dir = self.model.pixel_to_vector(pixel)?;

        let diff = pix_dir - ground_dir;

        Ok(Vector2::new(
            diff.dot(&self.perp1) * dist_to_ground,
            diff.dot(&self.perp2) * dist_to_ground,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Resolution;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    /// Fixed camera at the origin whose ray is `(x, y, 1)` normalized.
    struct Frustum;

    impl CameraModel for Frustum {
        fn pixel_to_vector(&self, pixel: &Vector2<f64>) -> Result<Vector3<f64>, CameraModelError> {
            Ok(Vector3::new(pixel.x, pixel.y, 1.0).normalize())
        }

        fn camera_center(&self, _pixel: &Vector2<f64>) -> Vector3<f64> {
            Vector3::zeros()
        }

        fn camera_pose(&self, _pixel: &Vector2<f64>) -> UnitQuaternion<f64> {
            UnitQuaternion::identity()
        }

        fn point_to_pixel(&self, point: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
            Ok(Vector2::new(point.x / point.z, point.y / point.z))
        }

        fn validate_params(&self) -> Result<(), CameraModelError> {
            Ok(())
        }

        fn get_resolution(&self) -> Resolution {
            Resolution {
                width: 1,
                height: 1,
            }
        }

        fn type_name(&self) -> &'static str {
            "FRUSTUM"
        }
    }

    #[test]
    fn test_residual_vanishes_at_true_pixel() {
        let point = Vector3::new(2.0, -1.0, 10.0);
        let residual = GroundResidual::new(&Frustum, &point, &Vector2::zeros()).unwrap();

        let at_truth = residual.residual(&Vector2::new(0.2, -0.1)).unwrap();
        assert_relative_eq!(at_truth, Vector2::zeros(), epsilon = 1e-12);

        let off = residual.residual(&Vector2::new(0.25, -0.1)).unwrap();
        assert!(off.norm() > 1e-3);
    }

    #[test]
    fn test_residual_is_measured_at_ground_scale() {
        let near = Vector3::new(0.0, 0.0, 10.0);
        let far = Vector3::new(0.0, 0.0, 1000.0);
        let pixel = Vector2::new(1e-3, 0.0);

        let near_err = GroundResidual::new(&Frustum, &near, &Vector2::zeros())
            .unwrap()
            .residual(&pixel)
            .unwrap();
        let far_err = GroundResidual::new(&Frustum, &far, &Vector2::zeros())
            .unwrap()
            .residual(&pixel)
            .unwrap();

        assert_relative_eq!(far_err.norm() / near_err.norm(), 100.0, max_relative = 1e-9);
    }

    #[test]
    fn test_rejects_point_at_camera_center() {
        let result = GroundResidual::new(&Frustum, &Vector3::zeros(), &Vector2::zeros());
        assert!(matches!(result, Err(CameraModelError::ArgumentError(_))));
    }
}
