//! Particle position and color buffers with per-shape placement.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use std::f32::consts::PI;

use super::color::hsl_to_rgb;
use super::shape::ShapeState;
use crate::audio::{AudioSample, FrequencyBands};
use crate::error::Result;
use crate::params::{audio_constants::WAVEFORM_CENTER, validate_density, VisualizationMode};

/// Per-instance data uploaded for each particle quad
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ParticleInstance {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

/// Flat xyz/rgb buffers for N particles.
///
/// Both buffers are always exactly 3N long. `update` rewrites them in place;
/// a new field is allocated only when the particle count or shape changes.
#[derive(Debug, Clone)]
pub struct ParticleField {
    positions: Vec<f32>,
    colors: Vec<f32>,
    shape: Option<ShapeState>,
}

impl ParticleField {
    /// Zeroed buffers for `count` particles
    pub fn allocate(count: usize) -> Result<Self> {
        validate_density(count)?;
        log::debug!("Allocating particle field: {} particles", count);

        Ok(Self {
            positions: vec![0.0; count * 3],
            colors: vec![0.0; count * 3],
            shape: None,
        })
    }

    pub fn count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn colors(&self) -> &[f32] {
        &self.colors
    }

    /// Shape laid out by the last `update`, if any
    pub fn shape(&self) -> Option<ShapeState> {
        self.shape
    }

    pub fn position(&self, index: usize) -> Vec3 {
        Vec3::from_slice(&self.positions[index * 3..index * 3 + 3])
    }

    /// Whether the field must be reallocated before laying out `shape` with `count` particles
    pub fn needs_rebuild(&self, count: usize, shape: ShapeState) -> bool {
        self.count() != count || self.shape.is_some_and(|current| current != shape)
    }

    /// Lay out every particle for `shape` at time `t` (seconds) and recolor.
    ///
    /// In waveform mode, cylinder and crystal heights follow `waveform`.
    pub fn update(
        &mut self,
        shape: ShapeState,
        bands: &FrequencyBands,
        t: f32,
        mode: VisualizationMode,
        waveform: &AudioSample,
        color_intensity: u32,
    ) {
        let n = self.count();
        let nf = n as f32;

        for i in 0..n {
            let fi = i as f32;
            let mut position = match shape {
                ShapeState::Ambient => ambient(fi, t),
                ShapeState::Sphere => sphere(fi, nf, bands.bass),
                ShapeState::Cylinder => cylinder(i, nf, bands.mid),
                ShapeState::Crystal => crystal(fi, nf),
            };

            if mode == VisualizationMode::Waveform
                && matches!(shape, ShapeState::Cylinder | ShapeState::Crystal)
                && !waveform.is_empty()
            {
                let index = (fi / nf * waveform.len() as f32).floor() as usize;
                let value = waveform.get_or(index, WAVEFORM_CENTER);
                position.y += (value as f32 - WAVEFORM_CENTER as f32) * 0.1;
            }

            let color = particle_color(fi, nf, bands.total, color_intensity);

            self.positions[i * 3..i * 3 + 3].copy_from_slice(&position.to_array());
            self.colors[i * 3..i * 3 + 3].copy_from_slice(&color);
        }

        self.shape = Some(shape);
    }

    /// Positions and colors interleaved for upload
    pub fn instances(&self) -> impl ExactSizeIterator<Item = ParticleInstance> + '_ {
        self.positions
            .chunks_exact(3)
            .zip(self.colors.chunks_exact(3))
            .map(|(p, c)| ParticleInstance {
                position: [p[0], p[1], p[2]],
                color: [c[0], c[1], c[2]],
            })
    }
}

fn ambient(i: f32, t: f32) -> Vec3 {
    let radius = 20.0 + 5.0 * (t + 0.1 * i).sin();
    let angle = 0.5 * t + 0.1 * i;
    Vec3::new(
        angle.cos() * radius,
        10.0 * (t + 0.05 * i).sin(),
        angle.sin() * radius,
    )
}

// Golden-spiral distribution over the sphere surface
fn sphere(i: f32, n: f32, bass: f32) -> Vec3 {
    let phi = (-1.0 + 2.0 * i / n).clamp(-1.0, 1.0).acos();
    let theta = (n * PI).sqrt() * phi;
    let r = 15.0 + 10.0 * bass;
    Vec3::new(
        r * theta.cos() * phi.sin(),
        r * phi.cos(),
        r * theta.sin() * phi.sin(),
    )
}

fn cylinder(i: usize, n: f32, mid: f32) -> Vec3 {
    let angle = 2.0 * PI * i as f32 / n;
    let height = ((i % 50) as f32 / 50.0) * 30.0 - 15.0;
    let r = 12.0 + 8.0 * mid;
    Vec3::new(angle.cos() * r, height, angle.sin() * r)
}

// Ten stacked rings: radii shrink toward the middle layer then widen again
fn crystal(i: f32, n: f32) -> Vec3 {
    let layer = (i / (n / 10.0)).floor();
    let step = (layer + 4.0) * 0.8;
    let angle = (i % step) * (2.0 * PI / step);
    let (r, height) = if layer < 5.0 {
        ((5.0 - layer) * 3.0, 2.0 * layer - 10.0)
    } else {
        ((layer - 4.0) * 2.0, 2.0 * (10.0 - layer) - 10.0)
    };
    Vec3::new(angle.cos() * r, height, angle.sin() * r)
}

fn particle_color(i: f32, n: f32, total: f32, color_intensity: u32) -> [f32; 3] {
    let hue = 190.0 + 20.0 * i / n;
    let base = (color_intensity as f32).max(50.0);
    let shimmer = total * (100.0 - base) * 1.5;
    let lightness = (base + shimmer).min(90.0);
    hsl_to_rgb(hue, 1.0, lightness / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldError;
    use proptest::prelude::*;

    fn bands(bass: f32, mid: f32, total: f32) -> FrequencyBands {
        FrequencyBands {
            bass,
            mid,
            treble: 0.0,
            total,
        }
    }

    fn silent_waveform() -> AudioSample {
        AudioSample::silence(VisualizationMode::Waveform, 128)
    }

    #[test]
    fn test_allocate_bounds() {
        assert!(matches!(ParticleField::allocate(0), Err(FieldError::Validation(_))));
        assert!(matches!(ParticleField::allocate(49), Err(FieldError::Validation(_))));
        assert!(matches!(ParticleField::allocate(2001), Err(FieldError::Validation(_))));

        let field = ParticleField::allocate(50).unwrap();
        assert_eq!(field.count(), 50);
        assert_eq!(field.positions().len(), 150);
        assert_eq!(field.colors().len(), 150);
        assert!(field.positions().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_sphere_first_particle_at_south_pole() {
        let mut field = ParticleField::allocate(800).unwrap();
        field.update(
            ShapeState::Sphere,
            &bands(0.5, 0.0, 0.5),
            0.0,
            VisualizationMode::Spectrum,
            &silent_waveform(),
            70,
        );

        let p = field.position(0);
        assert!(p.x.abs() < 1e-4);
        assert!((p.y + 20.0).abs() < 1e-4);
        assert!(p.z.abs() < 1e-4);
    }

    #[test]
    fn test_cylinder_heights_and_radius() {
        let mut field = ParticleField::allocate(100).unwrap();
        field.update(
            ShapeState::Cylinder,
            &bands(0.0, 1.0, 0.5),
            0.0,
            VisualizationMode::Spectrum,
            &silent_waveform(),
            70,
        );

        let first = field.position(0);
        assert!((first.x - 20.0).abs() < 1e-4);
        assert!((first.y + 15.0).abs() < 1e-4);
        // Index 25 is halfway up the height cycle
        assert!(field.position(25).y.abs() < 1e-4);
    }

    #[test]
    fn test_crystal_layers() {
        let mut field = ParticleField::allocate(100).unwrap();
        field.update(
            ShapeState::Crystal,
            &FrequencyBands::default(),
            0.0,
            VisualizationMode::Spectrum,
            &silent_waveform(),
            70,
        );

        // Layer 0: radius 15 at height -10; particle 0 sits at angle 0
        let p0 = field.position(0);
        assert!((p0.x - 15.0).abs() < 1e-4);
        assert!((p0.y + 10.0).abs() < 1e-4);

        // Layer 9: radius 10 at height -8
        let p90 = field.position(90);
        assert!((Vec3::new(p90.x, 0.0, p90.z).length() - 10.0).abs() < 1e-3);
        assert!((p90.y + 8.0).abs() < 1e-4);
    }

    fn assert_near(actual: Vec3, expected: Vec3) {
        assert!(
            actual.distance(expected) < 1e-3,
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }

    #[test]
    fn test_ambient_orbit_values() {
        let mut field = ParticleField::allocate(100).unwrap();
        field.update(
            ShapeState::Ambient,
            &FrequencyBands::default(),
            1.2,
            VisualizationMode::Spectrum,
            &silent_waveform(),
            70,
        );

        // radius 20 + 5 sin(1.5), angle 0.9, height 10 sin(1.35)
        assert_near(field.position(3), Vec3::new(15.532463, 9.757234, 19.573362));
    }

    #[test]
    fn test_crystal_ring_angles() {
        let mut field = ParticleField::allocate(100).unwrap();
        field.update(
            ShapeState::Crystal,
            &FrequencyBands::default(),
            0.0,
            VisualizationMode::Spectrum,
            &silent_waveform(),
            70,
        );

        // Layer 1, step 4: 13 mod 4 = 1, a quarter turn on the radius-12 ring
        assert_near(field.position(13), Vec3::new(0.0, -8.0, 12.0));
        // Layer 2, step 4.8: 23 mod 4.8 = 3.8 on the radius-9 ring
        assert_near(field.position(23), Vec3::new(2.329371, -6.0, -8.693332));
    }

    #[test]
    fn test_waveform_offsets_crystal_height() {
        let mut field = ParticleField::allocate(100).unwrap();
        let ramp = AudioSample::new((0..128).map(|k| (k * 2) as u8).collect());
        field.update(
            ShapeState::Crystal,
            &FrequencyBands::default(),
            0.0,
            VisualizationMode::Waveform,
            &ramp,
            70,
        );

        // Particle 13 reads sample floor(13 / 100 * 128) = 16, value 32
        assert_near(field.position(13), Vec3::new(0.0, -8.0 - 9.6, 12.0));
        // Particle 0 reads value 0
        assert_near(field.position(0), Vec3::new(15.0, -10.0 - 12.8, 0.0));
    }

    #[test]
    fn test_color_hue_and_lightness() {
        let mut field = ParticleField::allocate(100).unwrap();
        field.update(
            ShapeState::Ambient,
            &bands(0.0, 0.0, 0.2),
            0.0,
            VisualizationMode::Spectrum,
            &silent_waveform(),
            70,
        );

        // Lightness 70 + 0.2 * 30 * 1.5 = 79%, hue 190 + 20 * 10 / 100
        let expected = hsl_to_rgb(192.0, 1.0, 0.79);
        let rgb = &field.colors()[30..33];
        for (actual, expected) in rgb.iter().zip(expected) {
            assert!((actual - expected).abs() < 1e-4);
        }
        assert!((rgb[0] - 0.58).abs() < 1e-3);
        assert!((rgb[1] - 0.916).abs() < 1e-3);
        assert!((rgb[2] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_waveform_offsets_cylinder_height() {
        let mut spectrum_field = ParticleField::allocate(128).unwrap();
        let mut waveform_field = ParticleField::allocate(128).unwrap();
        let waveform = AudioSample::new(vec![228; 128]);

        spectrum_field.update(
            ShapeState::Cylinder,
            &FrequencyBands::default(),
            0.0,
            VisualizationMode::Spectrum,
            &waveform,
            70,
        );
        waveform_field.update(
            ShapeState::Cylinder,
            &FrequencyBands::default(),
            0.0,
            VisualizationMode::Waveform,
            &waveform,
            70,
        );

        for i in 0..128 {
            let dy = waveform_field.position(i).y - spectrum_field.position(i).y;
            assert!((dy - 10.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_waveform_ignored_for_sphere() {
        let mut field = ParticleField::allocate(100).unwrap();
        let loud = AudioSample::new(vec![255; 128]);
        field.update(
            ShapeState::Sphere,
            &bands(0.5, 0.0, 0.5),
            0.0,
            VisualizationMode::Waveform,
            &loud,
            70,
        );
        assert!((field.position(0).y + 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_lightness_capped() {
        let mut field = ParticleField::allocate(50).unwrap();
        field.update(
            ShapeState::Ambient,
            &bands(1.0, 1.0, 1.0),
            0.0,
            VisualizationMode::Spectrum,
            &silent_waveform(),
            10,
        );
        // base 50, shimmer 75: lightness capped at 90%, so some channel stays below 1
        for rgb in field.colors().chunks_exact(3) {
            assert!(rgb.iter().any(|&c| c < 1.0));
            assert!(rgb.iter().all(|&c| (0.0..=1.0).contains(&c)));
        }
    }

    #[test]
    fn test_needs_rebuild() {
        let mut field = ParticleField::allocate(100).unwrap();
        assert!(!field.needs_rebuild(100, ShapeState::Sphere));
        assert!(field.needs_rebuild(200, ShapeState::Sphere));

        field.update(
            ShapeState::Sphere,
            &FrequencyBands::default(),
            0.0,
            VisualizationMode::Spectrum,
            &silent_waveform(),
            70,
        );
        assert!(!field.needs_rebuild(100, ShapeState::Sphere));
        assert!(field.needs_rebuild(100, ShapeState::Crystal));
    }

    #[test]
    fn test_instances_interleave() {
        let mut field = ParticleField::allocate(60).unwrap();
        field.update(
            ShapeState::Ambient,
            &FrequencyBands::default(),
            1.5,
            VisualizationMode::Spectrum,
            &silent_waveform(),
            70,
        );
        let instances: Vec<ParticleInstance> = field.instances().collect();
        assert_eq!(instances.len(), 60);
        assert_eq!(instances[7].position, field.position(7).to_array());
        assert_eq!(instances[7].color, [field.colors()[21], field.colors()[22], field.colors()[23]]);
    }

    fn any_shape() -> impl Strategy<Value = ShapeState> {
        prop_oneof![
            Just(ShapeState::Ambient),
            Just(ShapeState::Sphere),
            Just(ShapeState::Cylinder),
            Just(ShapeState::Crystal),
        ]
    }

    proptest! {
        #[test]
        fn prop_update_is_finite(
            n in 50usize..=2000,
            shape in any_shape(),
            level in 0.0f32..=1.0,
            t in 0.0f32..1000.0,
            waveform_mode in any::<bool>(),
            intensity in 10u32..=100,
            wave in proptest::collection::vec(any::<u8>(), 0..=128),
        ) {
            let mut field = ParticleField::allocate(n).unwrap();
            let mode = if waveform_mode { VisualizationMode::Waveform } else { VisualizationMode::Spectrum };
            field.update(shape, &bands(level, level, level), t, mode, &AudioSample::new(wave), intensity);

            prop_assert_eq!(field.positions().len(), 3 * n);
            prop_assert_eq!(field.colors().len(), 3 * n);
            prop_assert!(field.positions().iter().all(|v| v.is_finite()));
            prop_assert!(field.colors().iter().all(|c| (0.0..=1.0).contains(c)));
        }
    }
}
