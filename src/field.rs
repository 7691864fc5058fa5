//! Procedural particle field: shape selection, placement, color and the
//! proximity graph used for connection lines.

mod color;
mod connections;
mod particles;
mod shape;

pub use color::hsl_to_rgb;
pub use connections::{segment_vertices, ConnectionGraph, LineVertex};
pub use particles::{ParticleField, ParticleInstance};
pub use shape::{current_shape, ShapeState};
