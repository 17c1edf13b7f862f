//! Mesh fragment lookup - the fast path for node positions.

use glam::DVec3;

use super::DataService;
use crate::types::Level2Id;

/// Mesh vertex nearest to the centroid of a fragment.
///
/// Non-finite vertices are ignored. Returns `None` for an empty or fully
/// degenerate fragment.
pub fn representative_vertex(vertices: &[DVec3]) -> Option<DVec3> {
  let mut sum = DVec3::ZERO;
  let mut count = 0usize;
  for v in vertices.iter().filter(|v| v.is_finite()) {
    sum += *v;
    count += 1;
  }
  if count == 0 {
    return None;
  }
  let centroid = sum / count as f64;

  vertices
    .iter()
    .filter(|v| v.is_finite())
    .copied()
    .min_by(|a, b| {
      a.distance_squared(centroid)
        .total_cmp(&b.distance_squared(centroid))
    })
}

/// Representative-vertex lookup over a [`DataService`].
///
/// A missing fragment and a failed request are both reported as `None`:
/// missing fragments are routine for nearly every neuron, and either way the
/// caller falls back to the segmentation.
pub struct MeshFragmentLookup<'a, S: DataService + ?Sized> {
  service: &'a S,
}

impl<'a, S: DataService + ?Sized> MeshFragmentLookup<'a, S> {
  pub fn new(service: &'a S) -> Self {
    Self { service }
  }

  /// Representative position of the node's mesh fragment, if any.
  pub fn try_get_vertex(&self, node: Level2Id) -> Option<DVec3> {
    match self.service.mesh_fragment(node) {
      Ok(Some(vertices)) => {
        let vertex = representative_vertex(&vertices);
        if vertex.is_none() {
          tracing::debug!(%node, "mesh fragment has no usable vertices");
        }
        vertex
      }
      Ok(None) => None,
      Err(err) => {
        tracing::debug!(%node, error = %err, "mesh fragment request failed");
        None
      }
    }
  }
}
