//! Orbit camera configuration.

/// Orbit camera parameters (pointer-driven rotation + wheel zoom)
#[derive(Debug, Clone)]
pub struct OrbitParams {
    /// Distance from the field center when reset (world units)
    pub default_distance: f32,

    /// Closest allowed zoom (world units)
    pub min_distance: f32,

    /// Farthest allowed zoom (world units)
    pub max_distance: f32,

    /// Rotation per pixel of pointer drag (radians)
    pub drag_sensitivity: f32,

    /// Distance change per wheel delta unit
    pub scroll_sensitivity: f32,

    /// Yaw added every frame while not dragging (radians)
    pub auto_yaw_per_frame: f32,
}

impl Default for OrbitParams {
    fn default() -> Self {
        Self {
            default_distance: 50.0,
            min_distance: 10.0,
            max_distance: 100.0,
            drag_sensitivity: 0.01,
            scroll_sensitivity: 0.1,
            auto_yaw_per_frame: 0.005,
        }
    }
}

impl OrbitParams {
    pub fn clamp_distance(&self, distance: f32) -> f32 {
        distance.clamp(self.min_distance, self.max_distance)
    }
}
