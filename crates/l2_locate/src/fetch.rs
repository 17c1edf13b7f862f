//! Segmentation chunk fetcher.
//!
//! Downloads the voxel region of one chunk at one mip and renumbers the global
//! 64-bit supervoxel ids into compact local `u32` labels. Peak memory for a
//! chunk is therefore bounded by its voxel count: the renumbering table holds
//! at most one entry per voxel, however large the global id space is.
//!
//! ```text
//!  raw labels (u64)          local labels (u32)      table
//!  ┌────┬────┬────┐          ┌───┬───┬───┐          0 → 0
//!  │ 0  │ 9e9│ 9e9│   ──►    │ 0 │ 1 │ 1 │          1 → 9e9
//!  │ 7e8│ 0  │ 9e9│          │ 2 │ 0 │ 1 │          2 → 7e8
//!  └────┴────┴────┘          └───┴───┴───┘
//! ```
//!
//! A chunk is owned by the fetch that produced it and dropped as soon as the
//! resolver has scanned it; chunks are never cached across nodes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use glam::I64Vec3;

use crate::chunkgraph::{ChunkCoord, VoxelBox};
use crate::error::{ResolveError, ServiceError, ServiceResult};
use crate::service::{DataService, LabelBlock};
use crate::types::SupervoxelId;

/// Renumbered segmentation of one voxel region at one mip.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentationChunk {
  bbox: VoxelBox,
  mip: u32,
  /// Local label per voxel, x-fastest over `bbox`.
  labels: Vec<u32>,
  /// Local label → global supervoxel id. Entry 0 is always background.
  table: Vec<SupervoxelId>,
}

impl SegmentationChunk {
  /// Assemble a chunk from already renumbered parts.
  ///
  /// Used by services that renumber server-side. Validates that the label
  /// array covers `bbox` and that every label indexes the table.
  pub fn from_parts(
    bbox: VoxelBox,
    mip: u32,
    labels: Vec<u32>,
    table: Vec<SupervoxelId>,
  ) -> ServiceResult<Self> {
    if labels.len() as u64 != bbox.volume() {
      return Err(ServiceError::Malformed(format!(
        "{} labels for a box of {} voxels",
        labels.len(),
        bbox.volume()
      )));
    }
    if table.first() != Some(&0) {
      return Err(ServiceError::Malformed(
        "renumbering table must map local 0 to background".into(),
      ));
    }
    if let Some(bad) = labels.iter().find(|&&l| l as usize >= table.len()) {
      return Err(ServiceError::Malformed(format!(
        "local label {bad} outside table of {} entries",
        table.len()
      )));
    }
    Ok(Self {
      bbox,
      mip,
      labels,
      table,
    })
  }

  #[inline]
  pub fn bbox(&self) -> &VoxelBox {
    &self.bbox
  }

  #[inline]
  pub fn mip(&self) -> u32 {
    self.mip
  }

  #[inline]
  pub fn labels(&self) -> &[u32] {
    &self.labels
  }

  #[inline]
  pub fn table(&self) -> &[SupervoxelId] {
    &self.table
  }

  /// Number of distinct non-background supervoxels present.
  #[inline]
  pub fn distinct_count(&self) -> usize {
    self.table.len() - 1
  }

  /// Global id of a local label.
  #[inline]
  pub fn global_id(&self, local: u32) -> Option<SupervoxelId> {
    self.table.get(local as usize).copied()
  }

  /// Approximate heap footprint in bytes.
  pub fn memory_bytes(&self) -> usize {
    self.labels.len() * std::mem::size_of::<u32>()
      + self.table.len() * std::mem::size_of::<SupervoxelId>()
  }

  /// Per-local-label flag: does the label map to one of `supervoxels`?
  ///
  /// Background never matches.
  pub fn local_mask(&self, supervoxels: &[SupervoxelId]) -> Vec<bool> {
    let mut mask = vec![false; self.table.len()];
    for (local, global) in self.table.iter().enumerate().skip(1) {
      if supervoxels.contains(global) {
        mask[local] = true;
      }
    }
    mask
  }

  /// Absolute voxel coordinates (at this chunk's mip) whose label maps to one
  /// of `supervoxels`, in x-fastest scan order.
  pub fn matching_voxels(&self, supervoxels: &[SupervoxelId]) -> Vec<I64Vec3> {
    let mask = self.local_mask(supervoxels);
    if !mask.iter().any(|&m| m) {
      return Vec::new();
    }
    self
      .labels
      .iter()
      .enumerate()
      .filter(|(_, &label)| mask[label as usize])
      .map(|(index, _)| self.bbox.voxel_at(index))
      .collect()
  }
}

/// Renumber a raw label block into compact local labels.
///
/// Local labels are assigned in first-seen scan order; global 0 (background)
/// is always local 0.
pub fn renumber(block: LabelBlock, mip: u32) -> ServiceResult<SegmentationChunk> {
  let LabelBlock { bbox, labels: raw } = block;
  if raw.len() as u64 != bbox.volume() {
    return Err(ServiceError::Malformed(format!(
      "{} labels for a box of {} voxels",
      raw.len(),
      bbox.volume()
    )));
  }

  let mut lookup: HashMap<SupervoxelId, u32> = HashMap::new();
  lookup.insert(0, 0);
  let mut table: Vec<SupervoxelId> = vec![0];
  let mut labels = Vec::with_capacity(raw.len());

  for global in raw {
    let local = match lookup.get(&global) {
      Some(&local) => local,
      None => {
        let local = u32::try_from(table.len()).map_err(|_| {
          ServiceError::Malformed("more distinct labels than u32 can index".into())
        })?;
        lookup.insert(global, local);
        table.push(global);
        local
      }
    };
    labels.push(local);
  }

  Ok(SegmentationChunk {
    bbox,
    mip,
    labels,
    table,
  })
}

/// Fetches the segmentation of one chunk at a time.
///
/// Holds no chunk data itself, only a counter of downloads issued, so one
/// fetcher is shared by all workers of a batch.
pub struct ChunkFetcher<'a, S: DataService + ?Sized> {
  service: &'a S,
  fetches: AtomicUsize,
}

impl<'a, S: DataService + ?Sized> ChunkFetcher<'a, S> {
  pub fn new(service: &'a S) -> Self {
    Self {
      service,
      fetches: AtomicUsize::new(0),
    }
  }

  /// Download and renumber the voxel region of `chunk` at `mip`.
  ///
  /// Failures are reported as `ChunkUnavailable` and never retried here.
  pub fn fetch(&self, chunk: ChunkCoord, mip: u32) -> Result<SegmentationChunk, ResolveError> {
    let meta = self.service.chunkgraph_meta();
    let mut bbox = meta.chunk_box(chunk, mip);

    if let Some(bounds) = self.service.volume_bounds(mip) {
      bbox = bbox.intersection(&bounds).ok_or_else(|| ResolveError::ChunkUnavailable {
        chunk,
        mip,
        source: ServiceError::NotFound(format!("chunk {chunk} lies outside the volume")),
      })?;
    }

    self.fetches.fetch_add(1, Ordering::Relaxed);
    self
      .service
      .download_renumbered(&bbox, mip)
      .map_err(|source| ResolveError::ChunkUnavailable { chunk, mip, source })
  }

  /// Number of downloads issued so far.
  pub fn fetch_count(&self) -> usize {
    self.fetches.load(Ordering::Relaxed)
  }
}

#[cfg(test)]
#[path = "fetch_test.rs"]
mod fetch_test;
