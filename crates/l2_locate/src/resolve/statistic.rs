//! Representative voxel selection for the segmentation fallback.

use glam::{DVec3, I64Vec3};
use serde::{Deserialize, Serialize};

/// How matched voxels collapse into one representative point.
///
/// All statistics work on voxel centers. `NearestToCentroid` and `FirstMatch`
/// always return the center of a matched voxel, so the point is guaranteed to
/// lie inside the object; `Median` and `Centroid` may land outside concave or
/// fragmented shapes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoxelStatistic {
  /// Matched voxel closest to the centroid of all matches.
  #[default]
  NearestToCentroid,
  /// Component-wise median of the matches.
  Median,
  /// Mean of the matches.
  Centroid,
  /// First match in x-fastest scan order.
  FirstMatch,
}

impl VoxelStatistic {
  /// Representative voxel center, in voxel units of the matches' mip.
  ///
  /// Returns `None` when `voxels` is empty.
  pub fn representative(&self, voxels: &[I64Vec3]) -> Option<DVec3> {
    let first = voxels.first()?;
    let center = match self {
      VoxelStatistic::FirstMatch => first.as_dvec3(),
      VoxelStatistic::Centroid => centroid(voxels),
      VoxelStatistic::Median => median(voxels),
      VoxelStatistic::NearestToCentroid => {
        let mean = centroid(voxels);
        voxels
          .iter()
          .map(|v| v.as_dvec3())
          .min_by(|a, b| a.distance_squared(mean).total_cmp(&b.distance_squared(mean)))
          .unwrap_or(mean)
      }
    };
    Some(center + DVec3::splat(0.5))
  }
}

fn centroid(voxels: &[I64Vec3]) -> DVec3 {
  let sum = voxels.iter().fold(DVec3::ZERO, |acc, v| acc + v.as_dvec3());
  sum / voxels.len() as f64
}

fn median(voxels: &[I64Vec3]) -> DVec3 {
  let axis = |pick: fn(&I64Vec3) -> i64| {
    let mut values: Vec<i64> = voxels.iter().map(pick).collect();
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
      (values[mid - 1] + values[mid]) as f64 * 0.5
    } else {
      values[mid] as f64
    }
  };
  DVec3::new(axis(|v| v.x), axis(|v| v.y), axis(|v| v.z))
}
