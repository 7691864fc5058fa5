//! Pulsefield library - audio-reactive 3D particle field

pub mod audio;
pub mod camera;
pub mod cancel;
pub mod error;
pub mod field;
pub mod params;
pub mod render_loop;
pub mod rendering;
