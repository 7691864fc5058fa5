//! Sparse proximity graph between particles, drawn as line segments.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::params::ConnectionParams;

/// Vertex of a connection line segment
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

/// Index pairs closer than the distance threshold
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionGraph {
    pub pairs: Vec<(usize, usize)>,
    /// Candidate pairs whose distance was measured
    pub candidates_evaluated: usize,
}

impl ConnectionGraph {
    /// Sample pairs on a strided grid and keep the close ones.
    ///
    /// `positions` is the flat xyz buffer; only indices that are multiples of
    /// the stride participate, and each looks at most `window` indices ahead.
    pub fn build(positions: &[f32], params: &ConnectionParams) -> Self {
        let mut graph = Self::default();
        graph.rebuild(positions, params);
        graph
    }

    /// Same as `build`, reusing this graph's storage
    pub fn rebuild(&mut self, positions: &[f32], params: &ConnectionParams) {
        self.clear();
        let n = positions.len() / 3;
        if params.stride == 0 || n < params.stride {
            return;
        }

        let point = |i: usize| Vec3::from_slice(&positions[i * 3..i * 3 + 3]);

        for i in (0..n).step_by(params.stride) {
            let a = point(i);
            let end = (i + params.window).min(n);
            for j in (i + params.stride..end).step_by(params.stride) {
                self.candidates_evaluated += 1;
                if a.distance(point(j)) < params.max_distance {
                    self.pairs.push((i, j));
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
        self.candidates_evaluated = 0;
    }
}

/// Expand pairs into a line list, each endpoint carrying its particle's color
pub fn segment_vertices<'a>(
    graph: &'a ConnectionGraph,
    positions: &'a [f32],
    colors: &'a [f32],
) -> impl Iterator<Item = LineVertex> + 'a {
    let vertex = move |i: usize| LineVertex {
        position: [positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2]],
        color: [colors[i * 3], colors[i * 3 + 1], colors[i * 3 + 2]],
    };

    graph
        .pairs
        .iter()
        .flat_map(move |&(i, j)| [vertex(i), vertex(j)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn line_of_points(n: usize, spacing: f32) -> Vec<f32> {
        (0..n).flat_map(|i| [i as f32 * spacing, 0.0, 0.0]).collect()
    }

    #[test]
    fn test_too_few_particles_is_empty() {
        let graph = ConnectionGraph::build(&line_of_points(9, 0.0), &ConnectionParams::default());
        assert!(graph.is_empty());
        assert_eq!(graph.candidates_evaluated, 0);
    }

    #[test]
    fn test_coincident_points_connect_within_window() {
        let graph = ConnectionGraph::build(&line_of_points(100, 0.0), &ConnectionParams::default());

        assert_eq!(&graph.pairs[..4], &[(0, 10), (0, 20), (0, 30), (0, 40)]);
        assert!(!graph.pairs.contains(&(0, 50)));
        assert_eq!(graph.candidates_evaluated, graph.len());
        assert!(graph.candidates_evaluated <= ConnectionParams::default().candidate_bound(100));
    }

    #[test]
    fn test_distance_threshold_is_exclusive() {
        // Points 10 indices apart are exactly 15 units apart
        let graph = ConnectionGraph::build(&line_of_points(100, 1.5), &ConnectionParams::default());
        assert!(graph.is_empty());
        assert!(graph.candidates_evaluated > 0);

        let graph = ConnectionGraph::build(&line_of_points(100, 1.4), &ConnectionParams::default());
        assert!(graph.pairs.iter().all(|&(i, j)| j - i == 10));
        assert!(!graph.is_empty());
    }

    #[test]
    fn test_segment_vertices_follow_pairs() {
        let positions = line_of_points(20, 0.5);
        let colors: Vec<f32> = (0..60).map(|v| v as f32 / 60.0).collect();
        let graph = ConnectionGraph::build(&positions, &ConnectionParams::default());
        assert_eq!(graph.pairs, vec![(0, 10)]);

        let vertices: Vec<LineVertex> = segment_vertices(&graph, &positions, &colors).collect();
        assert_eq!(vertices.len(), 2);
        assert_eq!(vertices[1].position, [5.0, 0.0, 0.0]);
        assert_eq!(vertices[1].color, [colors[30], colors[31], colors[32]]);
    }

    #[test]
    fn test_rebuild_replaces_previous_pairs() {
        let params = ConnectionParams::default();
        let mut graph = ConnectionGraph::build(&line_of_points(100, 0.0), &params);
        assert!(!graph.is_empty());

        let spread = line_of_points(100, 50.0);
        graph.rebuild(&spread, &params);
        assert_eq!(graph, ConnectionGraph::build(&spread, &params));
        assert!(graph.is_empty());
        assert!(graph.candidates_evaluated > 0);
    }

    proptest! {
        #[test]
        fn prop_graph_respects_bound_and_threshold(
            coords in proptest::collection::vec(-40.0f32..40.0, 150..=6000),
        ) {
            let params = ConnectionParams::default();
            let positions = &coords[..coords.len() / 3 * 3];
            let n = positions.len() / 3;
            let graph = ConnectionGraph::build(positions, &params);

            prop_assert!(graph.candidates_evaluated <= params.candidate_bound(n));
            for &(i, j) in &graph.pairs {
                prop_assert!(i < j && j < n);
                let a = Vec3::from_slice(&positions[i * 3..i * 3 + 3]);
                let b = Vec3::from_slice(&positions[j * 3..j * 3 + 3]);
                prop_assert!(a.distance(b) < params.max_distance);
            }
        }
    }
}
