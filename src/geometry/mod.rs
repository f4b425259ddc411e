//! Geometric helpers shared by the camera models and their diagnostics.

use log::warn;
use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::camera::{CameraModel, CameraModelError, Resolution};

/// Finds two unit vectors perpendicular to each other and to `vec`.
///
/// The first vector zeroes the smallest-magnitude component of `vec` and swaps
/// the other two (negating one). The second is `vec × perp1`. Equal smallest
/// components resolve to the lowest index.
///
/// # Errors
///
/// [`CameraModelError::ArgumentError`] if `vec` is not a unit vector within 1e-5.
pub fn find_perp_vecs(
    vec: &Vector3<f64>,
) -> Result<(Vector3<f64>, Vector3<f64>), CameraModelError> {
    let norm_error = (vec.norm() - 1.0).abs();
    if norm_error.is_nan() || norm_error > 1e-5 {
        return Err(CameraModelError::ArgumentError(format!(
            "find_perp_vecs: input vector must be a unit vector, got norm {}",
            vec.norm()
        )));
    }

    let mut min_i = 0;
    for i in 1..3 {
        if vec[i].abs() < vec[min_i].abs() {
            min_i = i;
        }
    }
    let (j, k) = match min_i {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    };

    let mut perp1 = Vector3::zeros();
    perp1[j] = -vec[k];
    perp1[k] = vec[j];
    let perp1 = perp1.normalize();
    let perp2 = vec.cross(&perp1).normalize();

    Ok((perp1, perp2))
}

/// Quaternion of a rotation matrix read from outside the crate.
///
/// The matrix is taken as-is; the result is renormalized so a matrix that is
/// orthonormal only to printed precision still yields a unit quaternion.
pub fn rotation_matrix_to_quaternion(matrix: &Matrix3<f64>) -> UnitQuaternion<f64> {
    let rotation = Rotation3::from_matrix_unchecked(*matrix);
    UnitQuaternion::new_normalize(*UnitQuaternion::from_rotation_matrix(&rotation).quaternion())
}

/// Nearest forward intersection of a ray with a sphere centered at the origin.
///
/// Returns `None` when the ray misses the sphere or the sphere lies behind the
/// ray origin.
pub fn intersect_ray_with_sphere(
    origin: &Vector3<f64>,
    direction: &Vector3<f64>,
    radius: f64,
) -> Option<Vector3<f64>> {
    let dir = direction.normalize();
    let b = origin.dot(&dir);
    let c = origin.norm_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }

    let sqrt_disc = discriminant.sqrt();
    let near = -b - sqrt_disc;
    let far = -b + sqrt_disc;
    let t = if near > 0.0 {
        near
    } else if far > 0.0 {
        far
    } else {
        return None;
    };

    Some(origin + dir * t)
}

/// Generate a grid of sample pixels that are evenly distributed across the image
///
/// # Arguments
///
/// * `resolution` - Image size in pixels
/// * `n` - The approximate number of pixels to generate
///
/// # Returns
///
/// A vector of pixel coordinates at the centers of the grid cells
pub fn sample_pixels(resolution: &Resolution, n: usize) -> Vec<Vector2<f64>> {
    let width = resolution.width as f64;
    let height = resolution.height as f64;

    // Calculate the number of cells in each dimension
    let num_cells_x = ((n as f64 * (width / height)).sqrt().round() as usize).max(1);
    let num_cells_y = ((n as f64 * (height / width)).sqrt().round() as usize).max(1);

    let cell_width = width / num_cells_x as f64;
    let cell_height = height / num_cells_y as f64;

    let mut pixels = Vec::with_capacity(num_cells_x * num_cells_y);
    for i in 0..num_cells_y {
        for j in 0..num_cells_x {
            let x = (j as f64 + 0.5) * cell_width;
            let y = (i as f64 + 0.5) * cell_height;
            pixels.push(Vector2::new(x, y));
        }
    }
    pixels
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProjectionError {
    pub rmse: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
    pub median: f64,
}

impl fmt::Debug for ProjectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Projection Error [ rmse: {}, min: {}, max: {}, mean: {}, stddev: {}, median: {} ]",
            self.rmse, self.min, self.max, self.mean, self.stddev, self.median
        )
    }
}

impl ProjectionError {
    fn from_errors(errors: &[f64]) -> Result<Self, CameraModelError> {
        if errors.is_empty() {
            return Err(CameraModelError::ZeroProjectionPoints);
        }

        let n = errors.len() as f64;
        let mean = errors.iter().sum::<f64>() / n;

        let variance: f64 = errors.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let stddev = variance.sqrt();

        let sum_squared: f64 = errors.iter().map(|x| x.powi(2)).sum::<f64>();
        let rmse = (sum_squared / n).sqrt();

        let min = errors.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = errors.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

        let mut sorted_errors = errors.to_vec();
        sorted_errors.sort_by(|a, b| a.total_cmp(b));
        let median = if sorted_errors.len() % 2 == 0 {
            let mid = sorted_errors.len() / 2;
            (sorted_errors[mid - 1] + sorted_errors[mid]) / 2.0
        } else {
            sorted_errors[sorted_errors.len() / 2]
        };

        Ok(ProjectionError {
            rmse,
            min,
            max,
            mean,
            stddev,
            median,
        })
    }
}

/// Pixel → ground → pixel consistency of a camera model.
///
/// Every pixel's sight ray is intersected with a sphere of `ground_radius`,
/// the intersection is mapped back with [`CameraModel::point_to_pixel`], and
/// the distances to the original pixels are summarized.
///
/// # Errors
///
/// [`CameraModelError::ZeroProjectionPoints`] if no pixel survives the round trip.
pub fn compute_round_trip_error<T>(
    camera_model: &T,
    pixels: &[Vector2<f64>],
    ground_radius: f64,
) -> Result<ProjectionError, CameraModelError>
where
    T: ?Sized + CameraModel,
{
    let mut errors = Vec::with_capacity(pixels.len());

    for pixel in pixels {
        let ray = match camera_model.pixel_to_vector(pixel) {
            Ok(ray) => ray,
            Err(e) => {
                warn!("Skipping pixel {:?}: {}", pixel, e);
                continue;
            }
        };
        let cam_ctr = camera_model.camera_center(pixel);
        let Some(ground) = intersect_ray_with_sphere(&cam_ctr, &ray, ground_radius) else {
            warn!("Ray through pixel {:?} misses the ground sphere", pixel);
            continue;
        };

        match camera_model.point_to_pixel(&ground) {
            Ok(recovered) => errors.push((recovered - pixel).norm()),
            Err(e) => warn!("Could not invert pixel {:?}: {}", pixel, e),
        }
    }

    ProjectionError::from_errors(&errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn check_perp(vec: Vector3<f64>) {
        let (p1, p2) = find_perp_vecs(&vec).unwrap();
        assert_relative_eq!(p1.norm(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(p2.norm(), 1.0, epsilon = 1e-9);
        assert!(p1.dot(&vec).abs() < 1e-9);
        assert!(p2.dot(&vec).abs() < 1e-9);
        assert!(p1.dot(&p2).abs() < 1e-9);
    }

    #[test]
    fn test_find_perp_vecs() {
        check_perp(Vector3::new(1.0, 0.0, 0.0));
        check_perp(Vector3::new(0.0, 1.0, 0.0));
        check_perp(Vector3::new(0.0, 0.0, -1.0));
        check_perp(Vector3::new(0.3, -0.5, 0.8).normalize());
        check_perp(Vector3::new(-2.0, 7.0, 1e-3).normalize());
        check_perp(Vector3::new(1.0, 1.0, 1.0).normalize());
    }

    #[test]
    fn test_find_perp_vecs_is_deterministic() {
        let vec = Vector3::new(0.6, 0.0, 0.8);
        let (p1, p2) = find_perp_vecs(&vec).unwrap();
        // Smallest component is y, so perp1 = (-z, 0, x)
        assert_relative_eq!(p1, Vector3::new(-0.8, 0.0, 0.6), epsilon = 1e-12);
        assert_relative_eq!(p2, vec.cross(&p1), epsilon = 1e-12);
        let (q1, q2) = find_perp_vecs(&vec).unwrap();
        assert_eq!(p1, q1);
        assert_eq!(p2, q2);
    }

    #[test]
    fn test_find_perp_vecs_rejects_non_unit() {
        let vec = Vector3::new(1.1, 0.0, 0.0);
        assert!(matches!(
            find_perp_vecs(&vec),
            Err(CameraModelError::ArgumentError(_))
        ));
        assert!(find_perp_vecs(&Vector3::zeros()).is_err());
        assert!(find_perp_vecs(&Vector3::new(f64::NAN, 0.0, 0.0)).is_err());
    }

    #[test]
    fn test_rotation_matrix_to_quaternion() {
        let expected = UnitQuaternion::from_scaled_axis(Vector3::new(0.2, -0.4, 1.1));
        let matrix = *expected.to_rotation_matrix().matrix();
        let q = rotation_matrix_to_quaternion(&matrix);
        assert!(q.angle_to(&expected) < 1e-12);

        // Half turn about x
        let half_turn = Matrix3::new(1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, -1.0);
        let q = rotation_matrix_to_quaternion(&half_turn);
        assert_relative_eq!(q.angle(), std::f64::consts::PI, epsilon = 1e-12);
        assert_relative_eq!(q * Vector3::z(), -Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn test_intersect_ray_with_sphere() {
        let origin = Vector3::new(0.0, 0.0, 10.0);
        let hit = intersect_ray_with_sphere(&origin, &Vector3::new(0.0, 0.0, -2.0), 4.0).unwrap();
        assert_relative_eq!(hit, Vector3::new(0.0, 0.0, 4.0), epsilon = 1e-12);

        assert!(intersect_ray_with_sphere(&origin, &Vector3::new(1.0, 0.0, 0.0), 4.0).is_none());
        assert!(intersect_ray_with_sphere(&origin, &Vector3::new(0.0, 0.0, 1.0), 4.0).is_none());

        // From inside the sphere the exit point is returned
        let inside = intersect_ray_with_sphere(&Vector3::zeros(), &Vector3::x(), 4.0).unwrap();
        assert_relative_eq!(inside, Vector3::new(4.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_sample_pixels() {
        let resolution = Resolution {
            width: 800,
            height: 600,
        };
        let n = 100;

        let pixels = sample_pixels(&resolution, n);

        let expected_count = (n as f64 * 0.8) as usize..=(n as f64 * 1.2) as usize;
        assert!(
            expected_count.contains(&pixels.len()),
            "Expected around {} pixels, got {}",
            n,
            pixels.len()
        );

        for pixel in &pixels {
            assert!(pixel.x >= 0.0 && pixel.x < 800.0);
            assert!(pixel.y >= 0.0 && pixel.y < 600.0);
        }
    }

    #[test]
    fn test_sample_pixels_single_row() {
        let resolution = Resolution {
            width: 4000,
            height: 1,
        };
        let pixels = sample_pixels(&resolution, 10);
        assert!(!pixels.is_empty());
        assert!(pixels.iter().all(|p| p.y == 0.5));
    }

    #[test]
    fn test_projection_error_statistics() {
        let stats = ProjectionError::from_errors(&[1.0, 3.0, 2.0, 4.0]).unwrap();
        assert_relative_eq!(stats.mean, 2.5);
        assert_relative_eq!(stats.median, 2.5);
        assert_relative_eq!(stats.min, 1.0);
        assert_relative_eq!(stats.max, 4.0);
        assert_relative_eq!(stats.rmse, (30.0f64 / 4.0).sqrt());
        assert_relative_eq!(stats.stddev, 1.25f64.sqrt());

        assert!(matches!(
            ProjectionError::from_errors(&[]),
            Err(CameraModelError::ZeroProjectionPoints)
        ));
    }
}
