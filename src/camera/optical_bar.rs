//! Implements the optical-bar (panoramic scan) camera model.
//!
//! An optical-bar camera sweeps a narrow slit across the film while the
//! platform moves, so every image column is exposed at a different instant
//! and from a different position. The model in this module maps a pixel to
//! the camera center and sight ray at its exposure instant, and inverts that
//! mapping numerically for world points. It adheres to the [`CameraModel`]
//! trait defined in the parent `camera` module ([`crate::camera`]).
//!
//! Models persist to a line-oriented `VERSION_4` text file (see
//! [`OpticalBarModel::write`]) and to a Kalibr-style YAML document (see
//! [`OpticalBarModel::save_to_yaml`]).

use log::{debug, info};
use nalgebra::{Matrix3, UnitQuaternion, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::{fmt, fs};

use crate::camera::model_file::{RecordReader, RecordWriter};
use crate::camera::{validation, CameraModel, CameraModelError, Resolution};
use crate::corrections::{
    apply_atmospheric_refraction_correction, apply_velocity_aberration_correction,
    DEFAULT_EARTH_RADIUS, DEFAULT_SURFACE_ELEVATION,
};
use crate::geometry::rotation_matrix_to_quaternion;
use crate::optimization::{GroundResidual, NewtonRaphson};

/// Oldest model file version this reader understands.
pub const MODEL_FILE_VERSION: u32 = 4;
/// Type line of the text model file.
pub const MODEL_TYPE: &str = "OPTICAL_BAR";
/// `camera_model` value of the YAML document.
pub const YAML_MODEL_NAME: &str = "optical_bar";

/// Numerical differentiation step of the inverse projection, in pixels.
const POINT_TO_PIXEL_STEP: f64 = 1e-2;
/// Residual threshold of the inverse projection, in ground units.
const POINT_TO_PIXEL_TOLERANCE: f64 = 1e-10;

/// Explicit parameters of an [`OpticalBarModel`].
///
/// Lengths are in meters, angles in radians and times in seconds. Planet
/// constants and correction toggles are not part of the parameter set; they
/// start at their defaults and are changed through setters.
#[derive(Debug, Clone, PartialEq)]
pub struct OpticalBarParams {
    /// Image size in pixels.
    pub resolution: Resolution,
    /// Pixel position of the optical center.
    pub center_loc_pixels: Vector2<f64>,
    /// Physical size of one pixel on the sensor.
    pub pixel_size: f64,
    pub focal_length: f64,
    /// Time for the slit to sweep from the first to the last column.
    pub scan_time: f64,
    /// `true` when column 0 is exposed first.
    pub scan_left_to_right: bool,
    /// Tilt of the camera frame relative to the direction of travel.
    pub forward_tilt_radians: f64,
    /// Camera center at the start of the scan.
    pub initial_position: Vector3<f64>,
    /// Camera-to-world rotation as an axis-angle vector.
    pub initial_orientation: Vector3<f64>,
    /// Platform speed along the camera's tilted y axis.
    pub speed: f64,
    /// Fraction of the image motion compensated by the camera, usually 1.
    pub motion_compensation: f64,
}

/// Represents an optical-bar panoramic camera.
///
/// The swing angle of a pixel is its sensor-plane x coordinate divided by the
/// focal length. The exposure instant grows linearly across the columns in the
/// scan direction, and the camera moves along its velocity in the meantime.
/// Image motion compensation shifts each ray along the sensor y axis in
/// proportion to the ground speed seen at that swing angle.
///
/// # Examples
///
/// ```rust
/// use nalgebra::{Vector2, Vector3};
/// use optical_bar_tools::camera::{CameraModel, OpticalBarModel, OpticalBarParams, Resolution};
/// use optical_bar_tools::corrections::DEFAULT_EARTH_RADIUS;
///
/// let model = OpticalBarModel::new(OpticalBarParams {
///     resolution: Resolution { width: 20000, height: 4000 },
///     center_loc_pixels: Vector2::new(9999.5, 1999.5),
///     pixel_size: 2e-5,
///     focal_length: 0.6096,
///     scan_time: 0.5,
///     scan_left_to_right: true,
///     forward_tilt_radians: 0.0,
///     initial_position: Vector3::new(0.0, 0.0, DEFAULT_EARTH_RADIUS + 180_000.0),
///     // Looking straight down
///     initial_orientation: Vector3::new(std::f64::consts::PI, 0.0, 0.0),
///     speed: 7600.0,
///     motion_compensation: 1.0,
/// })?;
///
/// let ray = model.pixel_to_vector(&Vector2::new(10_000.0, 2_000.0))?;
/// assert!(ray.z < 0.0);
/// # Ok::<(), optical_bar_tools::camera::CameraModelError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OpticalBarModel {
    resolution: Resolution,
    center_loc_pixels: Vector2<f64>,
    pixel_size: f64,
    focal_length: f64,
    scan_time: f64,
    scan_left_to_right: bool,
    forward_tilt_radians: f64,
    initial_position: Vector3<f64>,
    initial_orientation: Vector3<f64>,
    speed: f64,
    motion_compensation: f64,
    mean_earth_radius: f64,
    mean_surface_elevation: f64,
    correct_velocity_aberration: bool,
    correct_atmospheric_refraction: bool,
    /// Derived: swing angle covered per second of scan.
    scan_rate_radians: f64,
}

impl OpticalBarModel {
    /// Creates a new [`OpticalBarModel`] and computes its scan rate.
    ///
    /// The planet constants start at [`DEFAULT_EARTH_RADIUS`] and
    /// [`DEFAULT_SURFACE_ELEVATION`] and both corrections are enabled.
    ///
    /// # Errors
    ///
    /// [`CameraModelError::InvalidParams`] if the image size, pixel size,
    /// focal length or scan time is not positive, or any parameter is not
    /// finite.
    pub fn new(params: OpticalBarParams) -> Result<Self, CameraModelError> {
        let mut model = OpticalBarModel {
            resolution: params.resolution,
            center_loc_pixels: params.center_loc_pixels,
            pixel_size: params.pixel_size,
            focal_length: params.focal_length,
            scan_time: params.scan_time,
            scan_left_to_right: params.scan_left_to_right,
            forward_tilt_radians: params.forward_tilt_radians,
            initial_position: params.initial_position,
            initial_orientation: params.initial_orientation,
            speed: params.speed,
            motion_compensation: params.motion_compensation,
            mean_earth_radius: DEFAULT_EARTH_RADIUS,
            mean_surface_elevation: DEFAULT_SURFACE_ELEVATION,
            correct_velocity_aberration: true,
            correct_atmospheric_refraction: true,
            scan_rate_radians: 0.0,
        };
        model.compute_scan_rate();
        model.validate_params()?;
        Ok(model)
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn center_loc_pixels(&self) -> Vector2<f64> {
        self.center_loc_pixels
    }

    pub fn pixel_size(&self) -> f64 {
        self.pixel_size
    }

    pub fn focal_length(&self) -> f64 {
        self.focal_length
    }

    pub fn scan_time(&self) -> f64 {
        self.scan_time
    }

    pub fn scan_left_to_right(&self) -> bool {
        self.scan_left_to_right
    }

    pub fn forward_tilt_radians(&self) -> f64 {
        self.forward_tilt_radians
    }

    pub fn initial_position(&self) -> Vector3<f64> {
        self.initial_position
    }

    /// Camera-to-world rotation at the start of the scan, as an axis-angle vector.
    pub fn initial_orientation(&self) -> Vector3<f64> {
        self.initial_orientation
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn motion_compensation(&self) -> f64 {
        self.motion_compensation
    }

    pub fn mean_earth_radius(&self) -> f64 {
        self.mean_earth_radius
    }

    pub fn mean_surface_elevation(&self) -> f64 {
        self.mean_surface_elevation
    }

    pub fn correct_velocity_aberration(&self) -> bool {
        self.correct_velocity_aberration
    }

    pub fn correct_atmospheric_refraction(&self) -> bool {
        self.correct_atmospheric_refraction
    }

    pub fn scan_rate_radians(&self) -> f64 {
        self.scan_rate_radians
    }

    // ---------------------------------------------------------------------
    // Setters
    // ---------------------------------------------------------------------

    pub fn set_camera_center(&mut self, position: &Vector3<f64>) {
        self.initial_position = *position;
    }

    /// Sets the camera-to-world rotation from an axis-angle vector.
    pub fn set_camera_pose(&mut self, axis_angle: &Vector3<f64>) {
        self.initial_orientation = *axis_angle;
    }

    pub fn set_correct_velocity_aberration(&mut self, enabled: bool) {
        self.correct_velocity_aberration = enabled;
    }

    pub fn set_correct_atmospheric_refraction(&mut self, enabled: bool) {
        self.correct_atmospheric_refraction = enabled;
    }

    pub fn set_mean_earth_radius(&mut self, radius: f64) {
        self.mean_earth_radius = radius;
    }

    pub fn set_mean_surface_elevation(&mut self, elevation: f64) {
        self.mean_surface_elevation = elevation;
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    pub fn set_motion_compensation(&mut self, factor: f64) {
        self.motion_compensation = factor;
    }

    pub fn set_forward_tilt_radians(&mut self, tilt: f64) {
        self.forward_tilt_radians = tilt;
    }

    pub fn set_scan_left_to_right(&mut self, left_to_right: bool) {
        self.scan_left_to_right = left_to_right;
    }

    pub fn set_resolution(&mut self, resolution: Resolution) -> Result<(), CameraModelError> {
        self.update_geometry(|model| model.resolution = resolution)
    }

    pub fn set_center_loc_pixels(&mut self, center: &Vector2<f64>) -> Result<(), CameraModelError> {
        self.update_geometry(|model| model.center_loc_pixels = *center)
    }

    pub fn set_pixel_size(&mut self, pixel_size: f64) -> Result<(), CameraModelError> {
        self.update_geometry(|model| model.pixel_size = pixel_size)
    }

    pub fn set_focal_length(&mut self, focal_length: f64) -> Result<(), CameraModelError> {
        self.update_geometry(|model| model.focal_length = focal_length)
    }

    pub fn set_scan_time(&mut self, scan_time: f64) -> Result<(), CameraModelError> {
        self.update_geometry(|model| model.scan_time = scan_time)
    }

    /// Applies a change that affects the scan rate, keeping `self` untouched
    /// if the result is invalid.
    fn update_geometry(
        &mut self,
        change: impl FnOnce(&mut Self),
    ) -> Result<(), CameraModelError> {
        let mut staged = self.clone();
        change(&mut staged);
        staged.compute_scan_rate();
        staged.validate_params()?;
        *self = staged;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Scan geometry
    // ---------------------------------------------------------------------

    /// Position of a pixel on the sensor plane, in meters from the optical center.
    pub fn pixel_to_sensor_plane(&self, pixel: &Vector2<f64>) -> Vector2<f64> {
        (pixel - self.center_loc_pixels) * self.pixel_size
    }

    /// Swing angle of a sensor-plane position.
    pub fn sensor_to_alpha(&self, sensor_loc: &Vector2<f64>) -> f64 {
        sensor_loc.x / self.focal_length
    }

    fn compute_scan_rate(&mut self) {
        let first = Vector2::zeros();
        let last = Vector2::new(
            self.resolution.width as f64 - 1.0,
            self.resolution.height as f64 - 1.0,
        );
        let first_alpha = self.sensor_to_alpha(&self.pixel_to_sensor_plane(&first));
        let last_alpha = self.sensor_to_alpha(&self.pixel_to_sensor_plane(&last));
        self.scan_rate_radians = (last_alpha - first_alpha) / self.scan_time;
    }

    /// Seconds between the start of the scan and the exposure of a pixel's column.
    ///
    /// A single-column image is exposed at once.
    pub fn pixel_to_time_delta(&self, pixel: &Vector2<f64>) -> f64 {
        let max_col = self.resolution.width as f64 - 1.0;
        if max_col <= 0.0 {
            return 0.0;
        }
        let fraction = if self.scan_left_to_right {
            pixel.x / max_col
        } else {
            (max_col - pixel.x) / max_col
        };
        fraction * self.scan_time
    }

    /// World-frame velocity of the camera.
    ///
    /// The platform moves along the y axis of the camera frame un-tilted by
    /// the forward tilt.
    pub fn get_velocity(&self, pixel: &Vector2<f64>) -> Vector3<f64> {
        let tilt = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), self.forward_tilt_radians);
        self.camera_pose(pixel) * (tilt * Vector3::new(0.0, self.speed, 0.0))
    }

    /// Pixel seen by the optical center.
    pub fn image_center(&self) -> Vector2<f64> {
        self.center_loc_pixels
    }

    // ---------------------------------------------------------------------
    // Projection
    // ---------------------------------------------------------------------

    /// Sight ray of a pixel from the scan geometry and image motion
    /// compensation alone.
    ///
    /// # Errors
    ///
    /// [`CameraModelError::NumericalError`] if the motion compensation term is
    /// not finite, which happens when the camera sits on the mean surface or
    /// the image has a single column.
    pub fn pixel_to_vector_uncorrected(
        &self,
        pixel: &Vector2<f64>,
    ) -> Result<Vector3<f64>, CameraModelError> {
        let sensor_loc = self.pixel_to_sensor_plane(pixel);
        let cam_ctr = self.camera_center(pixel);
        let cam_pose = self.camera_pose(pixel);
        let alpha = self.sensor_to_alpha(&sensor_loc);

        let height_above_surface =
            cam_ctr.norm() - (self.mean_surface_elevation + self.mean_earth_radius);

        // Ground speed seen at this swing angle, scaled onto the sensor
        let mut imc = (self.focal_length * self.speed)
            / (height_above_surface * self.scan_rate_radians)
            * alpha.sin()
            * self.motion_compensation;
        if !self.scan_left_to_right {
            imc = -imc;
        }
        if !imc.is_finite() {
            return Err(CameraModelError::NumericalError(format!(
                "Image motion compensation is not finite at pixel {pixel:?}: height above surface {height_above_surface}, scan rate {}",
                self.scan_rate_radians
            )));
        }

        let ray = Vector3::new(
            self.focal_length * alpha.sin(),
            sensor_loc.y + imc,
            self.focal_length * alpha.cos(),
        );
        Ok(cam_pose * ray.normalize())
    }

    fn corrected_ray(&self, pixel: &Vector2<f64>) -> Result<Vector3<f64>, CameraModelError> {
        let mut ray = self.pixel_to_vector_uncorrected(pixel)?;
        let cam_ctr = self.camera_center(pixel);

        if self.correct_atmospheric_refraction {
            (ray, _) = apply_atmospheric_refraction_correction(
                &cam_ctr,
                self.mean_earth_radius,
                self.mean_surface_elevation,
                &ray,
            )?;
        }

        if self.correct_velocity_aberration {
            let cam_vel = self.get_velocity(pixel);
            (ray, _) = apply_velocity_aberration_correction(
                &cam_ctr,
                &cam_vel,
                self.mean_earth_radius,
                &ray,
            )?;
        }

        Ok(ray)
    }

    /// Pixel that observes `point`, searched from an explicit starting pixel.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::ArgumentError`] if `point` is the camera center.
    /// * [`CameraModelError::PixelToRay`] if a ray cannot be formed on the way.
    /// * [`CameraModelError::NumericalError`] if the search does not converge.
    pub fn point_to_pixel_with_guess(
        &self,
        point: &Vector3<f64>,
        guess: &Vector2<f64>,
    ) -> Result<Vector2<f64>, CameraModelError> {
        let residual = GroundResidual::new(self, point, guess)?;
        NewtonRaphson::new(&residual).solve(
            guess,
            &Vector2::zeros(),
            POINT_TO_PIXEL_STEP,
            POINT_TO_PIXEL_TOLERANCE,
        )
    }

    /// Moves the camera by a similarity transform.
    ///
    /// The position and pose at the start of the scan become
    /// `scale * rotation * position + translation` and `rotation * pose`.
    /// Intrinsics, scan timing and planet constants are left alone.
    pub fn apply_transform(
        &mut self,
        rotation: &Matrix3<f64>,
        translation: &Vector3<f64>,
        scale: f64,
    ) {
        let reference = Vector2::zeros();
        let position = self.initial_position;
        let pose = self.camera_pose(&reference);

        let new_position = scale * rotation * position + translation;
        let new_pose = rotation_matrix_to_quaternion(rotation) * pose;

        self.set_camera_center(&new_position);
        self.set_camera_pose(&new_pose.scaled_axis());
    }

    // ---------------------------------------------------------------------
    // Text model files
    // ---------------------------------------------------------------------

    /// Parses the contents of a `VERSION_4` model file.
    ///
    /// Correction toggles are not stored in the file and come back enabled.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::FormatError`] for a missing version line, a wrong
    ///   model type or a malformed record.
    /// * [`CameraModelError::ArgumentError`] for versions before 4.
    /// * [`CameraModelError::InvalidParams`] if the values fail validation.
    pub fn parse(contents: &str) -> Result<Self, CameraModelError> {
        let mut reader = RecordReader::new(contents);
        reader.read_version(MODEL_FILE_VERSION)?;
        reader.expect_type(MODEL_TYPE)?;

        let [width, height] = reader.read_record::<u32, 2>("image_size", "image size")?;
        let [cx, cy] = reader.read_record::<f64, 2>("image_center", "image center")?;
        let pixel_size = reader.read_scalar("pitch", "pixel pitch")?;
        let focal_length = reader.read_scalar("f", "focal length")?;
        let scan_time = reader.read_scalar("scan_time", "scan time")?;
        let forward_tilt_radians = reader.read_scalar("forward_tilt", "forward tilt angle")?;
        let [x, y, z] = reader.read_record::<f64, 3>("iC", "initial position")?;
        let rotation = reader.read_record::<f64, 9>("iR", "initial rotation matrix")?;
        let speed = reader.read_scalar("speed", "speed")?;
        let mean_earth_radius = reader.read_scalar("mean_earth_radius", "mean earth radius")?;
        let mean_surface_elevation =
            reader.read_scalar("mean_surface_elevation", "mean surface elevation")?;
        let motion_compensation =
            reader.read_scalar("motion_compensation_factor", "motion compensation factor")?;
        let scan_left_to_right = !reader
            .next_line()
            .is_some_and(|line| line.contains("scan_dir = left"));

        let rotation = Matrix3::from_row_slice(&rotation);
        validation::validate_finite("Initial rotation matrix", rotation.as_slice())?;
        let initial_orientation = rotation_matrix_to_quaternion(&rotation).scaled_axis();

        let mut model = OpticalBarModel::new(OpticalBarParams {
            resolution: Resolution { width, height },
            center_loc_pixels: Vector2::new(cx, cy),
            pixel_size,
            focal_length,
            scan_time,
            scan_left_to_right,
            forward_tilt_radians,
            initial_position: Vector3::new(x, y, z),
            initial_orientation,
            speed,
            motion_compensation,
        })?;
        model.mean_earth_radius = mean_earth_radius;
        model.mean_surface_elevation = mean_surface_elevation;
        model.validate_params()?;

        Ok(model)
    }

    /// Renders the model in the `VERSION_4` text format.
    pub fn to_file_string(&self) -> String {
        let rotation = self.camera_pose(&Vector2::zeros()).to_rotation_matrix();
        let r = rotation.matrix();
        let scan_dir = if self.scan_left_to_right { "right" } else { "left" };

        let mut writer = RecordWriter::new(MODEL_FILE_VERSION, MODEL_TYPE);
        writer
            .record("image_size", &[self.resolution.width, self.resolution.height])
            .record(
                "image_center",
                &[self.center_loc_pixels.x, self.center_loc_pixels.y],
            )
            .record("pitch", &[self.pixel_size])
            .record("f", &[self.focal_length])
            .record("scan_time", &[self.scan_time])
            .record("forward_tilt", &[self.forward_tilt_radians])
            .record("iC", self.initial_position.as_slice())
            .record(
                "iR",
                &[
                    r[(0, 0)],
                    r[(0, 1)],
                    r[(0, 2)],
                    r[(1, 0)],
                    r[(1, 1)],
                    r[(1, 2)],
                    r[(2, 0)],
                    r[(2, 1)],
                    r[(2, 2)],
                ],
            )
            .record("speed", &[self.speed])
            .record("mean_earth_radius", &[self.mean_earth_radius])
            .record("mean_surface_elevation", &[self.mean_surface_elevation])
            .record("motion_compensation_factor", &[self.motion_compensation])
            .line(&format!("scan_dir = {scan_dir}"));
        writer.finish()
    }

    /// Loads a model file with both corrections enabled.
    pub fn from_file(path: &str) -> Result<Self, CameraModelError> {
        let model = Self::parse(&read_model_file(path)?)?;
        info!("Loaded optical bar model from {path}");
        Ok(model)
    }

    /// Replaces this model with the one stored at `path`.
    ///
    /// The correction toggles of `self` are kept. On any error `self` is left
    /// unchanged.
    pub fn read(&mut self, path: &str) -> Result<(), CameraModelError> {
        let mut model = Self::parse(&read_model_file(path)?)?;
        model.correct_velocity_aberration = self.correct_velocity_aberration;
        model.correct_atmospheric_refraction = self.correct_atmospheric_refraction;
        *self = model;
        info!("Read optical bar model from {path}");
        Ok(())
    }

    /// Writes the model to `path` in the `VERSION_4` text format.
    pub fn write(&self, path: &str) -> Result<(), CameraModelError> {
        fs::write(path, self.to_file_string()).map_err(|e| {
            CameraModelError::FormatError(format!("Could not write model file {path}: {e}"))
        })?;
        debug!("Wrote optical bar model to {path}");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // YAML
    // ---------------------------------------------------------------------

    /// Loads a model from the `cam0` entry of a YAML document.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::FormatError`] if the file cannot be read.
    /// * [`CameraModelError::YamlError`] for malformed YAML or missing fields.
    /// * [`CameraModelError::InvalidParams`] for a different `camera_model` or
    ///   invalid values.
    pub fn load_from_yaml(path: &str) -> Result<Self, CameraModelError> {
        let contents = fs::read_to_string(path)?;
        let doc: YamlDocument = serde_yaml::from_str(&contents)?;
        let cam = doc.cam0;

        if cam.camera_model != YAML_MODEL_NAME {
            return Err(CameraModelError::InvalidParams(format!(
                "Expected camera_model {YAML_MODEL_NAME}, got {}",
                cam.camera_model
            )));
        }

        let mut model = OpticalBarModel::new(OpticalBarParams {
            resolution: Resolution {
                width: cam.resolution[0],
                height: cam.resolution[1],
            },
            center_loc_pixels: Vector2::from(cam.image_center),
            pixel_size: cam.pixel_size,
            focal_length: cam.focal_length,
            scan_time: cam.scan_time,
            scan_left_to_right: cam.scan_left_to_right,
            forward_tilt_radians: cam.forward_tilt,
            initial_position: Vector3::from(cam.initial_position),
            initial_orientation: Vector3::from(cam.initial_orientation),
            speed: cam.speed,
            motion_compensation: cam.motion_compensation_factor,
        })?;
        model.mean_earth_radius = cam.mean_earth_radius;
        model.mean_surface_elevation = cam.mean_surface_elevation;
        model.correct_velocity_aberration = cam.correct_velocity_aberration;
        model.correct_atmospheric_refraction = cam.correct_atmospheric_refraction;
        model.validate_params()?;

        info!("Loaded optical bar model from {path}");
        Ok(model)
    }

    pub fn save_to_yaml(&self, path: &str) -> Result<(), CameraModelError> {
        let doc = YamlDocument {
            cam0: OpticalBarYaml {
                camera_model: YAML_MODEL_NAME.to_string(),
                resolution: [self.resolution.width, self.resolution.height],
                image_center: self.center_loc_pixels.into(),
                pixel_size: self.pixel_size,
                focal_length: self.focal_length,
                scan_time: self.scan_time,
                scan_left_to_right: self.scan_left_to_right,
                forward_tilt: self.forward_tilt_radians,
                initial_position: self.initial_position.into(),
                initial_orientation: self.initial_orientation.into(),
                speed: self.speed,
                motion_compensation_factor: self.motion_compensation,
                mean_earth_radius: self.mean_earth_radius,
                mean_surface_elevation: self.mean_surface_elevation,
                correct_velocity_aberration: self.correct_velocity_aberration,
                correct_atmospheric_refraction: self.correct_atmospheric_refraction,
            },
        };

        let yaml_string = serde_yaml::to_string(&doc)?;
        fs::write(path, yaml_string)?;
        debug!("Wrote optical bar model to {path}");
        Ok(())
    }
}

fn read_model_file(path: &str) -> Result<String, CameraModelError> {
    fs::read_to_string(path).map_err(|e| {
        CameraModelError::FormatError(format!("Could not read model file {path}: {e}"))
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct YamlDocument {
    cam0: OpticalBarYaml,
}

/// On-disk layout of the `cam0` entry.
#[derive(Debug, Serialize, Deserialize)]
struct OpticalBarYaml {
    camera_model: String,
    resolution: [u32; 2],
    image_center: [f64; 2],
    pixel_size: f64,
    focal_length: f64,
    scan_time: f64,
    scan_left_to_right: bool,
    forward_tilt: f64,
    initial_position: [f64; 3],
    /// Axis-angle, radians.
    initial_orientation: [f64; 3],
    speed: f64,
    motion_compensation_factor: f64,
    mean_earth_radius: f64,
    mean_surface_elevation: f64,
    correct_velocity_aberration: bool,
    correct_atmospheric_refraction: bool,
}

impl fmt::Display for OpticalBarModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let on_off = |enabled: bool| if enabled { "on" } else { "off" };
        let p = &self.initial_position;
        let o = &self.initial_orientation;

        writeln!(f, "Optical Bar Model")?;
        writeln!(f, "=================")?;
        writeln!(
            f,
            "{:<36}{} x {}",
            "Image size:", self.resolution.width, self.resolution.height
        )?;
        writeln!(
            f,
            "{:<36}({}, {})",
            "Image center (px):", self.center_loc_pixels.x, self.center_loc_pixels.y
        )?;
        writeln!(f, "{:<36}{}", "Pixel size (m):", self.pixel_size)?;
        writeln!(f, "{:<36}{}", "Focal length (m):", self.focal_length)?;
        writeln!(f, "{:<36}{}", "Scan time (s):", self.scan_time)?;
        writeln!(
            f,
            "{:<36}{}",
            "Scan direction:",
            if self.scan_left_to_right {
                "left to right"
            } else {
                "right to left"
            }
        )?;
        writeln!(f, "{:<36}{}", "Scan rate (rad/s):", self.scan_rate_radians)?;
        writeln!(f, "{:<36}{}", "Forward tilt (rad):", self.forward_tilt_radians)?;
        writeln!(f, "{:<36}({}, {}, {})", "Initial position (m):", p.x, p.y, p.z)?;
        writeln!(f, "{:<36}({}, {}, {})", "Initial orientation (axis-angle):", o.x, o.y, o.z)?;
        writeln!(f, "{:<36}{}", "Speed (m/s):", self.speed)?;
        writeln!(f, "{:<36}{}", "Motion compensation:", self.motion_compensation)?;
        writeln!(f, "{:<36}{}", "Mean earth radius (m):", self.mean_earth_radius)?;
        writeln!(f, "{:<36}{}", "Mean surface elevation (m):", self.mean_surface_elevation)?;
        writeln!(
            f,
            "{:<36}{}",
            "Velocity aberration correction:",
            on_off(self.correct_velocity_aberration)
        )?;
        write!(
            f,
            "{:<36}{}",
            "Atmospheric refraction correction:",
            on_off(self.correct_atmospheric_refraction)
        )
    }
}

impl CameraModel for OpticalBarModel {
    /// Unit sight ray in world coordinates, with the enabled corrections applied.
    ///
    /// Refraction is removed first, then velocity aberration.
    ///
    /// # Errors
    ///
    /// Every failure is reported as [`CameraModelError::PixelToRay`] carrying
    /// the message of the underlying error.
    fn pixel_to_vector(&self, pixel: &Vector2<f64>) -> Result<Vector3<f64>, CameraModelError> {
        self.corrected_ray(pixel)
            .map_err(|e| CameraModelError::PixelToRay(e.to_string()))
    }

    fn camera_center(&self, pixel: &Vector2<f64>) -> Vector3<f64> {
        self.initial_position + self.pixel_to_time_delta(pixel) * self.get_velocity(pixel)
    }

    /// The pose does not change during the scan.
    fn camera_pose(&self, _pixel: &Vector2<f64>) -> UnitQuaternion<f64> {
        UnitQuaternion::from_scaled_axis(self.initial_orientation)
    }

    /// Pixel that observes `point`, searched from the middle of the image.
    fn point_to_pixel(&self, point: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
        let guess = Vector2::new(
            self.resolution.width as f64 / 2.0,
            self.resolution.height as f64 / 2.0,
        );
        self.point_to_pixel_with_guess(point, &guess)
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_resolution(&self.resolution)?;
        validation::validate_positive("Pixel size", self.pixel_size)?;
        validation::validate_positive("Focal length", self.focal_length)?;
        validation::validate_positive("Scan time", self.scan_time)?;
        validation::validate_finite("Image center", self.center_loc_pixels.as_slice())?;
        validation::validate_finite("Initial position", self.initial_position.as_slice())?;
        validation::validate_finite("Initial orientation", self.initial_orientation.as_slice())?;
        validation::validate_finite(
            "Scan parameters",
            &[
                self.forward_tilt_radians,
                self.speed,
                self.motion_compensation,
                self.mean_earth_radius,
                self.mean_surface_elevation,
            ],
        )?;
        Ok(())
    }

    fn get_resolution(&self) -> Resolution {
        self.resolution
    }

    fn type_name(&self) -> &'static str {
        MODEL_TYPE
    }
}
