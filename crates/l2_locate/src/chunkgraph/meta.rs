//! ChunkGraphMeta - node id layout and chunk/voxel coordinate mapping.

use glam::{DVec3, I64Vec3, UVec3};

use super::{ChunkCoord, VoxelBox};
use crate::types::Level2Id;

/// Bits reserved for the layer id at the top of every node id.
pub const LAYER_ID_BITS: u32 = 8;

/// Layer of level-2 nodes in the chunked graph.
pub const LEVEL2_LAYER: u8 = 2;

/// Chunked-graph layout needed to map node ids to voxel regions.
///
/// A node id packs, from most to least significant bits:
///
/// ```text
/// | layer (8) | x (spatial_bits) | y (spatial_bits) | z (spatial_bits) | segment |
/// ```
///
/// Mip levels are described by integer downsample factors relative to mip 0.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkGraphMeta {
  /// Bits per axis for chunk coordinates at the level-2 layer.
  pub spatial_bits: u32,

  /// Chunk extent in mip-0 voxels.
  pub chunk_size: UVec3,

  /// Mip-0 voxel position of chunk (0, 0, 0).
  pub voxel_offset: I64Vec3,

  /// Per-mip downsample factors; index 0 is always (1, 1, 1).
  pub downsample_factors: Vec<UVec3>,
}

impl ChunkGraphMeta {
  /// Layout with a single mip level.
  pub fn new(spatial_bits: u32, chunk_size: UVec3, voxel_offset: I64Vec3) -> Self {
    debug_assert!(
      LAYER_ID_BITS + 3 * spatial_bits < 64,
      "spatial bits leave no room for segment ids"
    );
    Self {
      spatial_bits,
      chunk_size,
      voxel_offset,
      downsample_factors: vec![UVec3::ONE],
    }
  }

  /// Replace the mip ladder with explicit downsample factors.
  ///
  /// An empty list or one not starting at (1, 1, 1) gets mip 0 prepended.
  /// Zero components are raised to 1.
  pub fn with_downsample_factors(mut self, factors: Vec<UVec3>) -> Self {
    let mut factors: Vec<UVec3> = factors
      .into_iter()
      .map(|factor| factor.max(UVec3::ONE))
      .collect();
    if factors.first() != Some(&UVec3::ONE) {
      factors.insert(0, UVec3::ONE);
    }
    self.downsample_factors = factors;
    self
  }

  /// Derive downsample factors from per-mip physical resolutions.
  pub fn with_mip_resolutions(self, resolutions: &[DVec3]) -> Self {
    let Some(base) = resolutions.first().copied() else {
      return self;
    };
    let factors = resolutions
      .iter()
      .map(|res| {
        let ratio = (*res / base).round().max(DVec3::ONE);
        UVec3::new(ratio.x as u32, ratio.y as u32, ratio.z as u32)
      })
      .collect();
    self.with_downsample_factors(factors)
  }

  /// Number of mip levels available.
  #[inline]
  pub fn mip_count(&self) -> u32 {
    self.downsample_factors.len() as u32
  }

  /// Coarsest available mip.
  #[inline]
  pub fn coarsest_mip(&self) -> u32 {
    self.mip_count().saturating_sub(1)
  }

  /// Downsample factor of `mip` relative to mip 0.
  ///
  /// Mips beyond the ladder are a caller error; they map to the coarsest level.
  #[inline]
  pub fn downsample(&self, mip: u32) -> UVec3 {
    debug_assert!(mip < self.mip_count(), "mip {mip} beyond available levels");
    self
      .downsample_factors
      .get(mip as usize)
      .or(self.downsample_factors.last())
      .copied()
      .unwrap_or(UVec3::ONE)
  }

  // ---------------------------------------------------------------------------
  // Id layout
  // ---------------------------------------------------------------------------

  #[inline]
  fn spatial_mask(&self) -> u64 {
    (1u64 << self.spatial_bits) - 1
  }

  #[inline]
  fn segment_bits(&self) -> u32 {
    64 - LAYER_ID_BITS - 3 * self.spatial_bits
  }

  /// Layer encoded in the top bits of a node id.
  #[inline]
  pub fn layer_of(&self, node: Level2Id) -> u8 {
    (node.raw() >> (64 - LAYER_ID_BITS)) as u8
  }

  /// True when the id belongs to the level-2 layer.
  #[inline]
  pub fn is_level2(&self, node: Level2Id) -> bool {
    self.layer_of(node) == LEVEL2_LAYER
  }

  /// Chunk coordinates of a node.
  pub fn chunk_coord(&self, node: Level2Id) -> ChunkCoord {
    let raw = node.raw();
    let mask = self.spatial_mask();
    let x_shift = 64 - LAYER_ID_BITS - self.spatial_bits;
    let y_shift = x_shift - self.spatial_bits;
    let z_shift = y_shift - self.spatial_bits;
    ChunkCoord {
      x: ((raw >> x_shift) & mask) as u32,
      y: ((raw >> y_shift) & mask) as u32,
      z: ((raw >> z_shift) & mask) as u32,
    }
  }

  /// Segment part of a node id (unique within its chunk).
  #[inline]
  pub fn segment_of(&self, node: Level2Id) -> u64 {
    node.raw() & ((1u64 << self.segment_bits()) - 1)
  }

  /// Pack layer, chunk coordinates and segment into a node id.
  pub fn make_id(&self, layer: u8, chunk: ChunkCoord, segment: u64) -> Level2Id {
    let mask = self.spatial_mask();
    let x_shift = 64 - LAYER_ID_BITS - self.spatial_bits;
    let y_shift = x_shift - self.spatial_bits;
    let z_shift = y_shift - self.spatial_bits;
    let raw = ((layer as u64) << (64 - LAYER_ID_BITS))
      | ((chunk.x as u64 & mask) << x_shift)
      | ((chunk.y as u64 & mask) << y_shift)
      | ((chunk.z as u64 & mask) << z_shift)
      | (segment & ((1u64 << self.segment_bits()) - 1));
    Level2Id(raw)
  }

  // ---------------------------------------------------------------------------
  // Voxel space
  // ---------------------------------------------------------------------------

  /// Voxel region of a chunk at mip 0.
  #[inline]
  pub fn chunk_box_mip0(&self, chunk: ChunkCoord) -> VoxelBox {
    let size = self.chunk_size.as_i64vec3();
    VoxelBox::from_min_size(self.voxel_offset + chunk.as_i64vec3() * size, size)
  }

  /// Voxel region of a chunk at `mip`.
  ///
  /// The mip-0 box is scaled down by the downsample factor, flooring the
  /// minimum and ceiling the maximum so partial voxels stay covered.
  pub fn chunk_box(&self, chunk: ChunkCoord, mip: u32) -> VoxelBox {
    let base = self.chunk_box_mip0(chunk);
    let factor = self.downsample(mip).as_i64vec3();
    let min = I64Vec3::new(
      base.min.x.div_euclid(factor.x),
      base.min.y.div_euclid(factor.y),
      base.min.z.div_euclid(factor.z),
    );
    let max = I64Vec3::new(
      ceil_div(base.max.x, factor.x),
      ceil_div(base.max.y, factor.y),
      ceil_div(base.max.z, factor.z),
    );
    VoxelBox::new(min, max)
  }

  /// Owning chunk of a node and its voxel region at `mip`.
  pub fn chunk_of(&self, node: Level2Id, mip: u32) -> (ChunkCoord, VoxelBox) {
    let chunk = self.chunk_coord(node);
    (chunk, self.chunk_box(chunk, mip))
  }

  /// Center of the node's chunk in mip-0 voxel units.
  #[inline]
  pub fn chunk_center_mip0(&self, node: Level2Id) -> DVec3 {
    self.chunk_box_mip0(self.chunk_coord(node)).center()
  }

  /// Center of a voxel at `mip`, expressed in mip-0 voxel units.
  #[inline]
  pub fn voxel_center_mip0(&self, voxel: I64Vec3, mip: u32) -> DVec3 {
    (voxel.as_dvec3() + DVec3::splat(0.5)) * self.downsample(mip).as_dvec3()
  }
}

#[inline]
fn ceil_div(value: i64, divisor: i64) -> i64 {
  -((-value).div_euclid(divisor))
}

#[cfg(test)]
#[path = "meta_test.rs"]
mod meta_test;
