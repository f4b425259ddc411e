//! Environmental corrections applied to camera sight rays.
//!
//! Both corrections are pure functions of the camera state and the ray. Each
//! returns the corrected ray together with the rotation that maps the input
//! ray onto it.

use nalgebra::{Unit, UnitQuaternion, Vector3};

use crate::camera::CameraModelError;

/// Mean Earth radius in meters.
pub const DEFAULT_EARTH_RADIUS: f64 = 6_371_000.0;
/// Mean surface elevation above [`DEFAULT_EARTH_RADIUS`] in meters.
pub const DEFAULT_SURFACE_ELEVATION: f64 = 0.0;
/// Speed of light in meters per second.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Atmospheric refraction angle in radians.
///
/// Uses the photogrammetric refraction constant
///
/// `K = [2410 H / (H² - 6H + 250) - 2410 h / (h² - 6h + 250) * (h / H)] * 1e-6`
///
/// with the camera altitude `H` and the reference altitude `h` in kilometers.
/// The angular displacement of a ray `theta` radians off nadir is `K tan(theta)`.
///
/// # Arguments
///
/// * `camera_alt` - Camera altitude above the reference sphere in meters.
/// * `ref_alt` - Ground altitude above the reference sphere in meters.
/// * `theta` - Off-nadir angle of the ray in radians.
pub fn saastamoinen_atmosphere_correction(camera_alt: f64, ref_alt: f64, theta: f64) -> f64 {
    let big_h = camera_alt / 1000.0;
    let small_h = ref_alt / 1000.0;

    let camera_term = 2410.0 * big_h / (big_h * big_h - 6.0 * big_h + 250.0);
    let ground_term =
        2410.0 * small_h / (small_h * small_h - 6.0 * small_h + 250.0) * (small_h / big_h);
    let k = (camera_term - ground_term) * 1e-6;

    k * theta.tan()
}

/// Removes the atmospheric refraction bend from a sight ray.
///
/// Refraction displaces rays away from nadir, so the corrected ray is rotated
/// back toward nadir by [`saastamoinen_atmosphere_correction`]. Rays at or
/// above the horizon are returned unchanged.
///
/// # Errors
///
/// [`CameraModelError::InvalidParams`] if the camera is not above the
/// reference surface.
pub fn apply_atmospheric_refraction_correction(
    cam_ctr: &Vector3<f64>,
    mean_earth_radius: f64,
    mean_surface_elevation: f64,
    ray: &Vector3<f64>,
) -> Result<(Vector3<f64>, UnitQuaternion<f64>), CameraModelError> {
    let dist_from_center = cam_ctr.norm();
    let camera_alt = dist_from_center - mean_earth_radius;
    if camera_alt.is_nan() || camera_alt <= mean_surface_elevation {
        return Err(CameraModelError::InvalidParams(format!(
            "Refraction correction needs the camera above the surface: altitude {camera_alt}, surface elevation {mean_surface_elevation}"
        )));
    }

    let ray = ray.normalize();
    let nadir = -cam_ctr / dist_from_center;
    let theta = ray.dot(&nadir).clamp(-1.0, 1.0).acos();
    if theta >= std::f64::consts::FRAC_PI_2 {
        return Ok((ray, UnitQuaternion::identity()));
    }

    let axis = nadir.cross(&ray);
    if axis.norm() < f64::EPSILON {
        // Looking straight down
        return Ok((ray, UnitQuaternion::identity()));
    }

    let delta = saastamoinen_atmosphere_correction(camera_alt, mean_surface_elevation, theta);
    let rotation = UnitQuaternion::from_axis_angle(&Unit::new_normalize(axis), -delta);

    Ok((rotation * ray, rotation))
}

/// Removes the velocity aberration caused by the camera motion.
///
/// Light seen from the moving camera appears shifted toward the velocity, so
/// the first-order correction is `normalize(ray - cam_vel / c)`.
///
/// # Errors
///
/// [`CameraModelError::InvalidParams`] if the camera center lies inside the
/// reference sphere.
pub fn apply_velocity_aberration_correction(
    cam_ctr: &Vector3<f64>,
    cam_vel: &Vector3<f64>,
    mean_earth_radius: f64,
    ray: &Vector3<f64>,
) -> Result<(Vector3<f64>, UnitQuaternion<f64>), CameraModelError> {
    let dist_from_center = cam_ctr.norm();
    if dist_from_center.is_nan() || dist_from_center <= mean_earth_radius {
        return Err(CameraModelError::InvalidParams(format!(
            "Velocity aberration correction needs the camera outside radius {mean_earth_radius}"
        )));
    }

    let ray = ray.normalize();
    let corrected = (ray - cam_vel / SPEED_OF_LIGHT).normalize();
    let rotation =
        UnitQuaternion::rotation_between(&ray, &corrected).unwrap_or_else(UnitQuaternion::identity);

    Ok((corrected, rotation))
}
