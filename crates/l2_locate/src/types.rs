//! Core value types shared by every localization stage.

use std::fmt;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Global supervoxel id in the base segmentation. 0 is background.
pub type SupervoxelId = u64;

/// Supervoxels agglomerated into one level-2 node.
///
/// Most level-2 nodes hold only a handful of supervoxels, so the list stays
/// inline for the common case.
pub type SupervoxelSet = SmallVec<[SupervoxelId; 8]>;

/// Level-2 node id from the chunked segmentation graph.
///
/// Opaque to this crate except for the chunk coordinates packed into its
/// high bits (see [`ChunkGraphMeta`](crate::chunkgraph::ChunkGraphMeta)).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Level2Id(pub u64);

impl Level2Id {
  pub fn new(raw: u64) -> Self {
    Self(raw)
  }

  /// Get the raw id value.
  pub fn raw(&self) -> u64 {
    self.0
  }
}

impl From<u64> for Level2Id {
  fn from(raw: u64) -> Self {
    Self(raw)
  }
}

impl fmt::Display for Level2Id {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Why a node ended without a position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnresolvedReason {
  /// No mesh fragment and segmentation fallback was disabled.
  FallbackDisabled,
  /// The segmentation chunk could not be downloaded at `mip`.
  ChunkUnavailable { mip: u32, message: String },
  /// The node's supervoxel ids could not be looked up.
  SupervoxelLookupFailed { message: String },
  /// Mip 0 held no voxel of the node's supervoxels.
  DataInconsistency,
  /// The batch was aborted before this node was started.
  Cancelled,
}

impl fmt::Display for UnresolvedReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      UnresolvedReason::FallbackDisabled => write!(f, "mesh fragment missing and fallback disabled"),
      UnresolvedReason::ChunkUnavailable { mip, message } => {
        write!(f, "chunk unavailable at mip {mip}: {message}")
      }
      UnresolvedReason::SupervoxelLookupFailed { message } => {
        write!(f, "supervoxel lookup failed: {message}")
      }
      UnresolvedReason::DataInconsistency => write!(f, "no matching voxel at mip 0"),
      UnresolvedReason::Cancelled => write!(f, "cancelled before start"),
    }
  }
}

/// How a node's position was obtained.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ResolutionMethod {
  /// Representative vertex of the node's mesh fragment.
  Mesh,
  /// Representative voxel found by scanning the segmentation at `mip`.
  SegmentationFallback { mip: u32 },
  /// Center of the owning chunk, substituted for an otherwise unresolved node.
  ChunkCenter { reason: UnresolvedReason },
  /// No position; the entry carries the NaN sentinel.
  Unresolved { reason: UnresolvedReason },
}

impl ResolutionMethod {
  /// True for positions taken from actual mesh or voxel data.
  #[inline]
  pub fn is_resolved(&self) -> bool {
    matches!(
      self,
      ResolutionMethod::Mesh | ResolutionMethod::SegmentationFallback { .. }
    )
  }

  /// Mip level used by the segmentation fallback, if it was used.
  #[inline]
  pub fn fallback_mip(&self) -> Option<u32> {
    match self {
      ResolutionMethod::SegmentationFallback { mip } => Some(*mip),
      _ => None,
    }
  }

  /// Reason the node could not be resolved from data, if any.
  pub fn unresolved_reason(&self) -> Option<&UnresolvedReason> {
    match self {
      ResolutionMethod::ChunkCenter { reason } | ResolutionMethod::Unresolved { reason } => {
        Some(reason)
      }
      _ => None,
    }
  }
}

/// Per-node result, produced once and never mutated afterwards except by the
/// report's rounding pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolvedPosition {
  pub node: Level2Id,
  /// Physical coordinate, or NaN on every axis when unresolved.
  #[serde(with = "nan_position")]
  pub position: DVec3,
  pub method: ResolutionMethod,
}

impl ResolvedPosition {
  pub fn new(node: Level2Id, position: DVec3, method: ResolutionMethod) -> Self {
    Self {
      node,
      position,
      method,
    }
  }

  /// Unresolved entry carrying the NaN sentinel.
  pub fn unresolved(node: Level2Id, reason: UnresolvedReason) -> Self {
    Self {
      node,
      position: DVec3::NAN,
      method: ResolutionMethod::Unresolved { reason },
    }
  }

  /// True when the entry has no position.
  #[inline]
  pub fn is_unresolved(&self) -> bool {
    matches!(self.method, ResolutionMethod::Unresolved { .. })
  }

  /// True if any coordinate is NaN.
  #[inline]
  pub fn has_nan(&self) -> bool {
    self.position.is_nan()
  }
}

impl PartialEq for ResolvedPosition {
  fn eq(&self, other: &Self) -> bool {
    let same_axis = |a: f64, b: f64| a == b || (a.is_nan() && b.is_nan());
    self.node == other.node
      && self.method == other.method
      && same_axis(self.position.x, other.position.x)
      && same_axis(self.position.y, other.position.y)
      && same_axis(self.position.z, other.position.z)
  }
}

/// Serializes NaN positions as `null` since JSON has no NaN.
mod nan_position {
  use glam::DVec3;
  use serde::{Deserialize, Deserializer, Serialize, Serializer};

  pub fn serialize<S: Serializer>(position: &DVec3, serializer: S) -> Result<S::Ok, S::Error> {
    let value = if position.is_nan() {
      None
    } else {
      Some(position.to_array())
    };
    value.serialize(serializer)
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DVec3, D::Error> {
    let value = Option::<[f64; 3]>::deserialize(deserializer)?;
    Ok(value.map(DVec3::from_array).unwrap_or(DVec3::NAN))
  }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
