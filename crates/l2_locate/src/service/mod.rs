//! Remote segmented-volume service boundary.
//!
//! The engine never talks to the network itself. Callers implement
//! [`DataService`] over whatever client they use; the implementation carries
//! its own session/authentication state, built by the caller, and the engine
//! only ever borrows it immutably. The same handle is shared read-only by every
//! worker thread, hence the `Sync` bound.
//!
//! ```text
//!             ┌──────────────────────────────┐
//!             │ DataService (caller-owned)   │
//!             │  session / token / client    │
//!             └──┬──────────┬─────────┬──────┘
//!   mesh_fragment│          │download │supervoxels
//!                ▼          ▼         ▼
//!        MeshFragmentLookup  fetch   PositionResolver
//! ```

pub mod mesh;

use glam::DVec3;

use crate::chunkgraph::{ChunkGraphMeta, VoxelBox};
use crate::error::{ServiceError, ServiceResult};
use crate::fetch::{renumber, SegmentationChunk};
use crate::types::{Level2Id, SupervoxelId, SupervoxelSet};

pub use mesh::{representative_vertex, MeshFragmentLookup};

/// Raw downloaded segmentation: one global supervoxel id per voxel, x-fastest.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelBlock {
  /// Region covered by `labels`, at the mip it was downloaded at.
  pub bbox: VoxelBox,
  pub labels: Vec<SupervoxelId>,
}

impl LabelBlock {
  pub fn new(bbox: VoxelBox, labels: Vec<SupervoxelId>) -> Self {
    Self { bbox, labels }
  }
}

/// Remote data service consumed by the localization engine.
pub trait DataService: Sync {
  /// Chunked-graph id layout and mip ladder of the segmentation.
  fn chunkgraph_meta(&self) -> &ChunkGraphMeta;

  /// Physical size of a mip-0 voxel, if the volume metadata reports one.
  fn native_resolution(&self) -> Option<DVec3>;

  /// Number of mip levels of the segmentation.
  fn mip_count(&self) -> u32 {
    self.chunkgraph_meta().mip_count()
  }

  /// Physical voxel size at `mip`, `None` beyond the ladder or without a
  /// native resolution.
  fn mip_resolution(&self, mip: u32) -> Option<DVec3> {
    let meta = self.chunkgraph_meta();
    if mip >= meta.mip_count() {
      return None;
    }
    Some(self.native_resolution()? * meta.downsample(mip).as_dvec3())
  }

  /// Valid voxel region at `mip`; downloads are clipped to it when known.
  fn volume_bounds(&self, _mip: u32) -> Option<VoxelBox> {
    None
  }

  /// Whether mesh fragments exist at all for this dataset.
  fn has_meshes(&self) -> bool {
    true
  }

  /// Vertices of a node's mesh fragment, `None` if no fragment exists.
  fn mesh_fragment(&self, node: Level2Id) -> ServiceResult<Option<Vec<DVec3>>>;

  /// Supervoxels agglomerated into a level-2 node.
  fn supervoxels(&self, node: Level2Id) -> ServiceResult<SupervoxelSet>;

  /// Download raw supervoxel labels for `bbox` at `mip`.
  fn download(&self, bbox: &VoxelBox, mip: u32) -> ServiceResult<LabelBlock>;

  /// Download and renumber to compact local labels.
  ///
  /// Services able to renumber server-side should override this to avoid
  /// materializing the raw 64-bit labels.
  fn download_renumbered(&self, bbox: &VoxelBox, mip: u32) -> ServiceResult<SegmentationChunk> {
    let block = self.download(bbox, mip)?;
    renumber(block, mip)
  }

  /// Root ids of the given supervoxels, in the same order.
  fn roots_of(&self, _supervoxels: &[SupervoxelId]) -> ServiceResult<Vec<u64>> {
    Err(ServiceError::Unsupported("roots_of"))
  }

  /// Level-2 parent of a supervoxel.
  fn level2_of(&self, _supervoxel: SupervoxelId) -> ServiceResult<Level2Id> {
    Err(ServiceError::Unsupported("level2_of"))
  }
}
