//! Test utilities.
//!
//! Provides an in-memory [`DataService`] with sparse mip-0 labels, scripted
//! mesh fragments and failures, and call counters so tests can assert which
//! paths a resolution touched.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use glam::{DVec3, I64Vec3, UVec3};

use crate::chunkgraph::{ChunkCoord, ChunkGraphMeta, VoxelBox, LEVEL2_LAYER};
use crate::dispatch::AbortHandle;
use crate::error::{ServiceError, ServiceResult};
use crate::service::{DataService, LabelBlock};
use crate::types::{Level2Id, SupervoxelId, SupervoxelSet};

/// Chunk edge length used by [`MockService::new`].
pub const CHUNK: i64 = 16;

/// Mip-0 resolution reported by [`MockService::new`].
pub const NATIVE_RES: DVec3 = DVec3::new(4.0, 4.0, 40.0);

// =============================================================================
// Mock service
// =============================================================================

/// In-memory segmentation service.
///
/// Coarser mips are produced by strided sampling of the mip-0 labels, so a
/// single voxel at odd x or y disappears at mip 1 and above, the way very
/// small supervoxels vanish in real downsampled segmentations.
pub struct MockService {
  meta: ChunkGraphMeta,
  native_resolution: Option<DVec3>,
  bounds_mip0: Option<VoxelBox>,
  has_meshes: bool,
  meshes: HashMap<Level2Id, Vec<DVec3>>,
  supervoxels: HashMap<Level2Id, SupervoxelSet>,
  voxels: HashMap<I64Vec3, SupervoxelId>,
  roots: HashMap<SupervoxelId, u64>,
  level2: HashMap<SupervoxelId, Level2Id>,
  failing_chunks: HashSet<ChunkCoord>,
  failing_meshes: HashSet<Level2Id>,
  truncated_roots: bool,
  reported_mip_count: Option<u32>,
  abort_on_mesh_call: Option<(usize, AbortHandle)>,
  mesh_calls: AtomicUsize,
  download_calls: AtomicUsize,
  downloads: Mutex<Vec<(VoxelBox, u32)>>,
}

impl MockService {
  /// 16³ chunks, mips 0..=2 with (2, 2, 1) and (4, 4, 1) downsampling,
  /// 4×4×40 native resolution.
  pub fn new() -> Self {
    let meta = ChunkGraphMeta::new(10, UVec3::splat(CHUNK as u32), I64Vec3::ZERO)
      .with_downsample_factors(vec![UVec3::ONE, UVec3::new(2, 2, 1), UVec3::new(4, 4, 1)]);
    Self {
      meta,
      native_resolution: Some(NATIVE_RES),
      bounds_mip0: None,
      has_meshes: true,
      meshes: HashMap::new(),
      supervoxels: HashMap::new(),
      voxels: HashMap::new(),
      roots: HashMap::new(),
      level2: HashMap::new(),
      failing_chunks: HashSet::new(),
      failing_meshes: HashSet::new(),
      truncated_roots: false,
      reported_mip_count: None,
      abort_on_mesh_call: None,
      mesh_calls: AtomicUsize::new(0),
      download_calls: AtomicUsize::new(0),
      downloads: Mutex::new(Vec::new()),
    }
  }

  /// Level-2 node id in `chunk`.
  pub fn node(&self, chunk: ChunkCoord, segment: u64) -> Level2Id {
    self.meta.make_id(LEVEL2_LAYER, chunk, segment)
  }

  pub fn with_mesh(mut self, node: Level2Id, vertices: Vec<DVec3>) -> Self {
    self.meshes.insert(node, vertices);
    self
  }

  pub fn with_supervoxels(mut self, node: Level2Id, supervoxels: &[SupervoxelId]) -> Self {
    self.supervoxels.insert(node, supervoxels.iter().copied().collect());
    self
  }

  /// Label one mip-0 voxel.
  pub fn with_voxel(mut self, voxel: I64Vec3, supervoxel: SupervoxelId) -> Self {
    self.voxels.insert(voxel, supervoxel);
    self
  }

  /// Label every mip-0 voxel of a box.
  pub fn with_filled_box(mut self, bbox: VoxelBox, supervoxel: SupervoxelId) -> Self {
    for index in 0..bbox.volume() as usize {
      self.voxels.insert(bbox.voxel_at(index), supervoxel);
    }
    self
  }

  pub fn with_failing_chunk(mut self, chunk: ChunkCoord) -> Self {
    self.failing_chunks.insert(chunk);
    self
  }

  pub fn with_failing_mesh(mut self, node: Level2Id) -> Self {
    self.failing_meshes.insert(node);
    self
  }

  pub fn with_root(mut self, supervoxel: SupervoxelId, root: u64) -> Self {
    self.roots.insert(supervoxel, root);
    self
  }

  pub fn with_level2(mut self, supervoxel: SupervoxelId, node: Level2Id) -> Self {
    self.level2.insert(supervoxel, node);
    self
  }

  pub fn with_bounds(mut self, bounds_mip0: VoxelBox) -> Self {
    self.bounds_mip0 = Some(bounds_mip0);
    self
  }

  /// Answer root lookups with one root fewer than asked for.
  pub fn with_truncated_roots(mut self) -> Self {
    self.truncated_roots = true;
    self
  }

  /// Replace the chunk graph layout, keeping every scripted label.
  pub fn with_meta(mut self, meta: ChunkGraphMeta) -> Self {
    self.meta = meta;
    self
  }

  /// Report `count` mips from [`DataService::mip_count`] regardless of the
  /// chunk graph's own ladder.
  pub fn with_reported_mip_count(mut self, count: u32) -> Self {
    self.reported_mip_count = Some(count);
    self
  }

  /// Trip `abort` during the `call`-th mesh request (1-based).
  pub fn with_abort_on_mesh_call(mut self, call: usize, abort: AbortHandle) -> Self {
    self.abort_on_mesh_call = Some((call, abort));
    self
  }

  pub fn without_meshes(mut self) -> Self {
    self.has_meshes = false;
    self
  }

  pub fn without_native_resolution(mut self) -> Self {
    self.native_resolution = None;
    self
  }

  /// Number of mesh fragment requests received.
  pub fn mesh_count(&self) -> usize {
    self.mesh_calls.load(Ordering::SeqCst)
  }

  /// Number of segmentation downloads received (including failed ones).
  pub fn download_count(&self) -> usize {
    self.download_calls.load(Ordering::SeqCst)
  }

  /// Mips of successful downloads, in request order.
  pub fn downloaded_mips(&self) -> Vec<u32> {
    self.downloads.lock().unwrap().iter().map(|(_, mip)| *mip).collect()
  }

  fn label_at(&self, voxel: I64Vec3, mip: u32) -> SupervoxelId {
    let factor = self.meta.downsample(mip).as_i64vec3();
    self.voxels.get(&(voxel * factor)).copied().unwrap_or(0)
  }
}

impl Default for MockService {
  fn default() -> Self {
    Self::new()
  }
}

impl DataService for MockService {
  fn chunkgraph_meta(&self) -> &ChunkGraphMeta {
    &self.meta
  }

  fn native_resolution(&self) -> Option<DVec3> {
    self.native_resolution
  }

  fn mip_count(&self) -> u32 {
    self.reported_mip_count.unwrap_or_else(|| self.meta.mip_count())
  }

  fn volume_bounds(&self, mip: u32) -> Option<VoxelBox> {
    let bounds = self.bounds_mip0?;
    let factor = self.meta.downsample(mip).as_i64vec3();
    Some(VoxelBox::new(bounds.min / factor, bounds.max / factor))
  }

  fn has_meshes(&self) -> bool {
    self.has_meshes
  }

  fn mesh_fragment(&self, node: Level2Id) -> ServiceResult<Option<Vec<DVec3>>> {
    let call = self.mesh_calls.fetch_add(1, Ordering::SeqCst) + 1;
    if let Some((at, abort)) = &self.abort_on_mesh_call {
      if call == *at {
        abort.abort();
      }
    }
    if self.failing_meshes.contains(&node) {
      return Err(ServiceError::Request(format!("mesh server timeout for {node}")));
    }
    Ok(self.meshes.get(&node).cloned())
  }

  fn supervoxels(&self, node: Level2Id) -> ServiceResult<SupervoxelSet> {
    self
      .supervoxels
      .get(&node)
      .cloned()
      .ok_or_else(|| ServiceError::NotFound(format!("node {node}")))
  }

  fn download(&self, bbox: &VoxelBox, mip: u32) -> ServiceResult<LabelBlock> {
    self.download_calls.fetch_add(1, Ordering::SeqCst);
    let failing = self
      .failing_chunks
      .iter()
      .any(|chunk| self.meta.chunk_box(*chunk, mip).intersection(bbox).is_some());
    if failing {
      return Err(ServiceError::Request("segmentation server unavailable".into()));
    }

    let labels = (0..bbox.volume() as usize)
      .map(|index| self.label_at(bbox.voxel_at(index), mip))
      .collect();
    self.downloads.lock().unwrap().push((*bbox, mip));
    Ok(LabelBlock::new(*bbox, labels))
  }

  fn roots_of(&self, supervoxels: &[SupervoxelId]) -> ServiceResult<Vec<u64>> {
    let mut roots: Vec<u64> = supervoxels
      .iter()
      .map(|sv| self.roots.get(sv).copied().unwrap_or(0))
      .collect();
    if self.truncated_roots {
      roots.pop();
    }
    Ok(roots)
  }

  fn level2_of(&self, supervoxel: SupervoxelId) -> ServiceResult<Level2Id> {
    self
      .level2
      .get(&supervoxel)
      .copied()
      .ok_or_else(|| ServiceError::NotFound(format!("supervoxel {supervoxel}")))
  }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Service with `count` nodes laid out one per chunk along x.
///
/// Even-indexed nodes have a mesh fragment at their chunk center; odd-indexed
/// nodes only exist in the segmentation, as a 2×2×2 block at the chunk origin.
/// Returns the service and node ids in creation order.
pub fn populated_service(count: usize) -> (MockService, Vec<Level2Id>) {
  let mut service = MockService::new();
  let mut nodes = Vec::with_capacity(count);
  for i in 0..count {
    let chunk = ChunkCoord::new(i as u32, 0, 0);
    let node = service.node(chunk, 1);
    let supervoxel = 1000 + i as SupervoxelId;
    let origin = service.meta.chunk_box_mip0(chunk).min;
    service = service
      .with_supervoxels(node, &[supervoxel])
      .with_filled_box(VoxelBox::from_min_size(origin, I64Vec3::splat(2)), supervoxel);
    if i % 2 == 0 {
      let center = service.meta.chunk_center_mip0(node) * NATIVE_RES;
      service = service.with_mesh(node, vec![center]);
    }
    nodes.push(node);
  }
  (service, nodes)
}
