//! Orbit camera driven by pointer drag and wheel zoom.

use glam::{Mat4, Vec2, Vec3};

use crate::params::{OrbitParams, RenderConfig};

/// Snapshot of the orbit state consumed by the draw step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    /// Distance from the field center (world units)
    pub distance: f32,
    /// Rotation of the particle group about Y (radians)
    pub yaw: f32,
    /// Rotation of the particle group about X (radians)
    pub pitch: f32,
}

/// Pointer/wheel input turned into camera distance and group rotation.
///
/// The camera sits on the +Z axis looking at the origin; drag rotates the
/// particle group rather than the camera.
pub struct OrbitController {
    params: OrbitParams,
    state: CameraState,
    drag_anchor: Option<Vec2>,
}

impl OrbitController {
    pub fn new(params: OrbitParams) -> Self {
        let state = CameraState {
            distance: params.clamp_distance(params.default_distance),
            yaw: 0.0,
            pitch: 0.0,
        };
        Self {
            params,
            state,
            drag_anchor: None,
        }
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_anchor.is_some()
    }

    pub fn on_drag_start(&mut self, x: f32, y: f32) {
        self.drag_anchor = Some(Vec2::new(x, y));
    }

    /// Rotate by the pointer delta since the last event; ignored when not dragging
    pub fn on_drag_move(&mut self, x: f32, y: f32) {
        let Some(anchor) = self.drag_anchor else {
            return;
        };
        let pointer = Vec2::new(x, y);
        let delta = pointer - anchor;

        self.state.yaw += delta.x * self.params.drag_sensitivity;
        self.state.pitch += delta.y * self.params.drag_sensitivity;
        self.drag_anchor = Some(pointer);
    }

    pub fn on_drag_end(&mut self) {
        self.drag_anchor = None;
    }

    /// Zoom by a wheel delta (positive moves away)
    pub fn on_scroll(&mut self, delta_y: f32) {
        if !delta_y.is_finite() {
            return;
        }
        let distance = self.state.distance + delta_y * self.params.scroll_sensitivity;
        self.state.distance = self.params.clamp_distance(distance);
    }

    pub fn reset(&mut self) {
        self.state = CameraState {
            distance: self.params.clamp_distance(self.params.default_distance),
            yaw: 0.0,
            pitch: 0.0,
        };
    }

    /// Per-frame idle spin, suppressed while the user is dragging
    pub fn advance_auto_yaw(&mut self) {
        if !self.is_dragging() {
            self.state.yaw += self.params.auto_yaw_per_frame;
        }
    }

    pub fn eye(&self) -> Vec3 {
        Vec3::new(0.0, 0.0, self.state.distance)
    }

    /// Rotation applied to the particle group
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_rotation_x(self.state.pitch) * Mat4::from_rotation_y(self.state.yaw)
    }

    /// Create view-projection matrix for rendering
    pub fn view_proj_matrix(&self, render_config: &RenderConfig) -> Mat4 {
        // Always keep Y as up vector (camera never rolls)
        let view = Mat4::look_at_rh(self.eye(), Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(
            render_config.fov_degrees.to_radians(),
            render_config.aspect_ratio(),
            render_config.near_plane,
            render_config.far_plane,
        );

        proj * view
    }
}

impl Default for OrbitController {
    fn default() -> Self {
        Self::new(OrbitParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_drag_rotates_by_delta() {
        let mut orbit = OrbitController::default();
        orbit.on_drag_start(100.0, 100.0);
        orbit.on_drag_move(150.0, 80.0);

        let state = orbit.state();
        assert!((state.yaw - 0.5).abs() < 1e-6);
        assert!((state.pitch + 0.2).abs() < 1e-6);

        // Deltas are relative to the previous pointer position
        orbit.on_drag_move(160.0, 80.0);
        assert!((orbit.state().yaw - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_move_without_drag_is_ignored() {
        let mut orbit = OrbitController::default();
        orbit.on_drag_move(500.0, 500.0);
        assert_eq!(orbit.state().yaw, 0.0);
        assert_eq!(orbit.state().pitch, 0.0);
    }

    #[test]
    fn test_auto_yaw_suppressed_while_dragging() {
        let mut orbit = OrbitController::default();
        orbit.advance_auto_yaw();
        assert!((orbit.state().yaw - 0.005).abs() < 1e-7);

        orbit.on_drag_start(0.0, 0.0);
        orbit.advance_auto_yaw();
        assert!((orbit.state().yaw - 0.005).abs() < 1e-7);

        orbit.on_drag_end();
        orbit.advance_auto_yaw();
        assert!((orbit.state().yaw - 0.010).abs() < 1e-7);
    }

    #[test]
    fn test_scroll_clamps() {
        let mut orbit = OrbitController::default();
        orbit.on_scroll(100.0);
        assert_eq!(orbit.state().distance, 60.0);
        orbit.on_scroll(10_000.0);
        assert_eq!(orbit.state().distance, 100.0);
        orbit.on_scroll(-10_000.0);
        assert_eq!(orbit.state().distance, 10.0);
        orbit.on_scroll(f32::NAN);
        assert_eq!(orbit.state().distance, 10.0);
    }

    #[test]
    fn test_reset() {
        let mut orbit = OrbitController::default();
        orbit.on_drag_start(0.0, 0.0);
        orbit.on_drag_move(30.0, 40.0);
        orbit.on_scroll(-200.0);
        orbit.reset();

        assert_eq!(
            orbit.state(),
            CameraState {
                distance: 50.0,
                yaw: 0.0,
                pitch: 0.0
            }
        );
    }

    #[test]
    fn test_view_proj_matrix_generation() {
        let orbit = OrbitController::default();
        let view_proj = orbit.view_proj_matrix(&RenderConfig::default());

        assert_ne!(view_proj, Mat4::IDENTITY);
        assert_ne!(view_proj, Mat4::ZERO);

        // The field center projects to the middle of the screen
        let center = view_proj.project_point3(Vec3::ZERO);
        assert!(center.x.abs() < 1e-5);
        assert!(center.y.abs() < 1e-5);
    }

    #[test]
    fn test_model_matrix_is_rotation() {
        let mut orbit = OrbitController::default();
        orbit.on_drag_start(0.0, 0.0);
        orbit.on_drag_move(157.079_63, 0.0);

        // Quarter turn about Y maps +X onto -Z
        let rotated = orbit.model_matrix().transform_point3(Vec3::X);
        assert!(rotated.x.abs() < 1e-4);
        assert!((rotated.z + 1.0).abs() < 1e-4);
    }

    proptest! {
        #[test]
        fn prop_distance_stays_in_range(deltas in proptest::collection::vec(-5000.0f32..5000.0, 0..64)) {
            let mut orbit = OrbitController::default();
            for delta in deltas {
                orbit.on_scroll(delta);
                let distance = orbit.state().distance;
                prop_assert!((10.0..=100.0).contains(&distance));
            }
        }
    }
}
