use crate::params::VisualizationMode;

/// Layout the particle field is arranged into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeState {
    Ambient,
    Sphere,
    Cylinder,
    Crystal,
}

impl ShapeState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ambient => "ambient",
            Self::Sphere => "sphere",
            Self::Cylinder => "cylinder",
            Self::Crystal => "crystal",
        }
    }
}

/// Total level at or below which the field drifts in its ambient layout
pub const AMBIENT_THRESHOLD: f32 = 0.1;

const ACTIVE_SHAPES: [ShapeState; 3] = [ShapeState::Sphere, ShapeState::Cylinder, ShapeState::Crystal];

/// Pick the shape for this frame from the overall audio level.
///
/// Recomputed from scratch every frame; the mode does not influence the choice.
pub fn current_shape(_mode: VisualizationMode, total: f32) -> ShapeState {
    if total.is_nan() || total <= AMBIENT_THRESHOLD {
        return ShapeState::Ambient;
    }
    let slot = (total * 3.0).floor() as usize % ACTIVE_SHAPES.len();
    ACTIVE_SHAPES[slot]
}
