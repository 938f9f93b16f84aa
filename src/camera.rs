//! Orbit camera producing the shared view and projection matrices.
//!
//! Holding a direction (-1 or 1) makes the logical time run backwards and the
//! camera orbit the origin. Releasing it (direction 0) freezes the camera.

use glam::{Mat4, Vec3};

use crate::config::CameraConfig;

#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    pub distance: f32,
    pub height: f32,
    pub orbit_speed: f32,
    direction: f32,
    logical_time: f32,
    angle: f32,
}

impl OrbitCamera {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            fov_y: config.fov_y,
            near: config.near,
            far: config.far,
            distance: config.distance,
            height: config.height,
            orbit_speed: config.orbit_speed,
            direction: 0.0,
            logical_time: 0.0,
            angle: 0.0,
        }
    }

    /// Set the held direction. Values are clamped to -1..=1.
    pub fn set_direction(&mut self, direction: f32) {
        self.direction = direction.clamp(-1.0, 1.0);
    }

    pub fn direction(&self) -> f32 {
        self.direction
    }

    pub fn logical_time(&self) -> f32 {
        self.logical_time
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Advance by `dt` seconds of wall-clock time.
    pub fn update(&mut self, dt: f32) {
        if self.direction != 0.0 {
            self.logical_time -= dt;
            self.angle -= self.direction * self.orbit_speed * dt;
        }
    }

    pub fn eye(&self) -> Vec3 {
        Vec3::new(
            self.distance * self.angle.sin(),
            self.height,
            self.distance * self.angle.cos(),
        )
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), Vec3::ZERO, Vec3::Y)
    }

    /// Perspective projection with 0..1 depth. `aspect` must be positive.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_camera_does_not_move() {
        let mut camera = OrbitCamera::new(&CameraConfig::default());
        let before = camera.view_matrix();
        camera.update(1.0);
        assert_eq!(camera.view_matrix(), before);
        assert_eq!(camera.logical_time(), 0.0);
    }

    #[test]
    fn test_held_direction_runs_time_backwards() {
        let mut camera = OrbitCamera::new(&CameraConfig::default());
        camera.set_direction(1.0);
        camera.update(0.5);
        assert!((camera.logical_time() + 0.5).abs() < 1e-6);
        assert!(camera.angle() < 0.0);

        camera.set_direction(-1.0);
        camera.update(1.0);
        assert!((camera.logical_time() + 1.5).abs() < 1e-6);
        assert!(camera.angle() > 0.0);
    }

    #[test]
    fn test_direction_is_clamped() {
        let mut camera = OrbitCamera::new(&CameraConfig::default());
        camera.set_direction(5.0);
        assert_eq!(camera.direction(), 1.0);
    }

    #[test]
    fn test_eye_keeps_distance_and_height() {
        let mut camera = OrbitCamera::new(&CameraConfig::default());
        camera.set_direction(1.0);
        camera.update(2.0);
        let eye = camera.eye();
        assert!((Vec3::new(eye.x, 0.0, eye.z).length() - camera.distance).abs() < 1e-4);
        assert_eq!(eye.y, camera.height);
    }

    #[test]
    fn test_origin_is_in_front_of_camera() {
        let camera = OrbitCamera::new(&CameraConfig::default());
        let origin_view = camera.view_matrix().transform_point3(Vec3::ZERO);
        // Right-handed view space looks down -Z.
        assert!(origin_view.z < 0.0);
    }
}
