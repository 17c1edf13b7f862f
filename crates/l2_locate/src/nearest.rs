//! Closest level-2 node of an object to an arbitrary point.
//!
//! Used to anchor a point of interest (a soma location, a synapse) onto the
//! level-2 graph of one root object: the mip-0 segmentation around the point
//! is searched for the nearest voxel belonging to the root, and that voxel's
//! supervoxel is mapped to its level-2 parent.

use glam::{DVec3, I64Vec3};

use crate::chunkgraph::VoxelBox;
use crate::error::{ConfigError, LocateError, ServiceError};
use crate::service::DataService;
use crate::types::{Level2Id, SupervoxelId};

/// Default search radius in physical units.
pub const DEFAULT_SEARCH_RADIUS: f64 = 200.0;

/// Result of [`closest_level2`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NearestLevel2 {
  pub node: Level2Id,
  /// Supervoxel of the closest voxel.
  pub supervoxel: SupervoxelId,
  /// Physical center of the closest voxel.
  pub position: DVec3,
  /// Physical distance from the query point to `position`.
  pub distance: f64,
}

/// Find the level-2 node of `root_id` closest to `point`.
///
/// `point` is given in units of `point_resolution` (for example voxel
/// coordinates of an annotation layer); `radius` is physical, and bounds the
/// mip-0 region downloaded around the point.
pub fn closest_level2<S: DataService + ?Sized>(
  service: &S,
  point: DVec3,
  point_resolution: DVec3,
  root_id: u64,
  radius: f64,
) -> Result<NearestLevel2, LocateError> {
  for (axis, value) in point_resolution.to_array().into_iter().enumerate() {
    if !value.is_finite() || value <= 0.0 {
      return Err(ConfigError::InvalidResolution { axis, value }.into());
    }
  }
  let native = service
    .native_resolution()
    .ok_or(ConfigError::ResolutionNotInferable)?;

  let target = point * point_resolution;
  let center = (target / native).floor().as_i64vec3();
  let half = (DVec3::splat(radius.max(0.0)) / native).floor().as_i64vec3();

  let mut bbox = VoxelBox::around(center, half);
  if let Some(bounds) = service.volume_bounds(0) {
    bbox = bbox
      .intersection(&bounds)
      .ok_or(LocateError::NothingNearPoint { root_id })?;
  }

  let chunk = service.download_renumbered(&bbox, 0)?;
  let candidates = &chunk.table()[1..];
  let roots = service.roots_of(candidates)?;
  if roots.len() != candidates.len() {
    return Err(
      ServiceError::Malformed(format!(
        "{} roots for {} supervoxels",
        roots.len(),
        candidates.len()
      ))
      .into(),
    );
  }
  let members: Vec<SupervoxelId> = candidates
    .iter()
    .zip(&roots)
    .filter(|(_, &root)| root == root_id)
    .map(|(&sv, _)| sv)
    .collect();
  tracing::debug!(
    root_id,
    candidates = candidates.len(),
    members = members.len(),
    "searching around point"
  );

  let mask = chunk.local_mask(&members);
  let mut best: Option<(f64, I64Vec3, u32)> = None;
  for (index, &label) in chunk.labels().iter().enumerate() {
    if !mask[label as usize] {
      continue;
    }
    let voxel = chunk.bbox().voxel_at(index);
    let distance = ((voxel.as_dvec3() + DVec3::splat(0.5)) * native).distance(target);
    if best.map_or(true, |(closest, _, _)| distance < closest) {
      best = Some((distance, voxel, label));
    }
  }

  let (distance, voxel, label) = best.ok_or(LocateError::NothingNearPoint { root_id })?;
  let supervoxel = chunk
    .global_id(label)
    .ok_or(LocateError::NothingNearPoint { root_id })?;
  let node = service.level2_of(supervoxel)?;

  Ok(NearestLevel2 {
    node,
    supervoxel,
    position: (voxel.as_dvec3() + DVec3::splat(0.5)) * native,
    distance,
  })
}
