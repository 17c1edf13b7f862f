//! Per-node position resolution.
//!
//! Each node runs through an explicit state machine until it reaches a
//! terminal state:
//!
//! ```text
//!            ┌─────────────┐  vertex found
//!            │ MeshLookup  │─────────────────────────────► Resolved(Mesh)
//!            └──────┬──────┘
//!     no vertex,    │        no vertex, fallback disabled
//!     fallback on   │─────────────────────────────────────► Unresolved
//!                   ▼
//!         ┌────────────────────┐   ≥1 matching voxel
//!         │ Segmentation(mip)  │───────────────────────────► Resolved(Fallback{mip})
//!         └──┬──────────────┬──┘
//!  no match, │              │ no match at mip 0 / chunk unavailable
//!  mip > 0   ▼              └──────────────────────────────► Unresolved
//!   Segmentation(mip - 1)
//! ```
//!
//! The starting mip is coarse so the common case downloads little; very small
//! supervoxels vanish under downsampling and are caught by escalating toward
//! mip 0.

pub mod statistic;

use glam::DVec3;

use crate::chunkgraph::ChunkCoord;
use crate::error::ResolveError;
use crate::fetch::{ChunkFetcher, SegmentationChunk};
use crate::service::{DataService, MeshFragmentLookup};
use crate::types::{Level2Id, ResolutionMethod, ResolvedPosition, SupervoxelSet, UnresolvedReason};

pub use statistic::VoxelStatistic;

/// Validated, immutable settings shared by every resolver of a batch.
///
/// Produced by [`ResolutionRequest::validate`](crate::config::ResolutionRequest::validate).
#[derive(Clone, Debug, PartialEq)]
pub struct ResolverSettings {
  pub segmentation_fallback: bool,
  /// Mip the fallback starts scanning at.
  pub fallback_mip: u32,
  /// Physical size of a mip-0 voxel used for output coordinates.
  pub resolution: DVec3,
  pub statistic: VoxelStatistic,
  /// Extra attempts for a failed chunk download at the same mip.
  pub fetch_retries: u32,
  pub chunk_center_on_unresolved: bool,
}

/// Resolver state. `Resolved` and `Unresolved` are terminal.
#[derive(Debug)]
enum ResolveState {
  MeshLookup,
  Segmentation { mip: u32 },
  Resolved(ResolvedPosition),
  Unresolved(UnresolvedReason),
}

/// Resolves single nodes against a shared [`DataService`].
///
/// Holds no per-node state; one resolver is shared by all workers of a batch.
pub struct PositionResolver<'a, S: DataService + ?Sized> {
  service: &'a S,
  mesh: MeshFragmentLookup<'a, S>,
  fetcher: ChunkFetcher<'a, S>,
  settings: ResolverSettings,
}

impl<'a, S: DataService + ?Sized> PositionResolver<'a, S> {
  pub fn new(service: &'a S, settings: ResolverSettings) -> Self {
    Self {
      service,
      mesh: MeshFragmentLookup::new(service),
      fetcher: ChunkFetcher::new(service),
      settings,
    }
  }

  #[inline]
  pub fn settings(&self) -> &ResolverSettings {
    &self.settings
  }

  /// Segmentation downloads issued by this resolver so far.
  #[inline]
  pub fn fetch_count(&self) -> usize {
    self.fetcher.fetch_count()
  }

  /// Run one node to a terminal state.
  ///
  /// Never fails: every failure is recorded in the returned entry.
  #[cfg_attr(feature = "spans", tracing::instrument(skip_all, name = "resolve::node", fields(node = node.raw())))]
  pub fn resolve(&self, node: Level2Id) -> ResolvedPosition {
    // Looked up on first use only; nodes with a mesh never need them.
    let mut supervoxels: Option<SupervoxelSet> = None;
    let mut state = ResolveState::MeshLookup;

    loop {
      state = match state {
        ResolveState::MeshLookup => self.lookup_mesh(node),
        ResolveState::Segmentation { mip } => self.scan_segmentation(node, mip, &mut supervoxels),
        ResolveState::Resolved(position) => return position,
        ResolveState::Unresolved(reason) => return self.finish_unresolved(node, reason),
      };
    }
  }

  fn lookup_mesh(&self, node: Level2Id) -> ResolveState {
    if let Some(vertex) = self.mesh.try_get_vertex(node) {
      return ResolveState::Resolved(ResolvedPosition::new(node, vertex, ResolutionMethod::Mesh));
    }
    if self.settings.segmentation_fallback {
      ResolveState::Segmentation {
        mip: self.settings.fallback_mip,
      }
    } else {
      ResolveState::Unresolved(UnresolvedReason::FallbackDisabled)
    }
  }

  fn scan_segmentation(
    &self,
    node: Level2Id,
    mip: u32,
    supervoxels: &mut Option<SupervoxelSet>,
  ) -> ResolveState {
    if supervoxels.is_none() {
      match self.service.supervoxels(node) {
        Ok(set) => *supervoxels = Some(set),
        Err(source) => {
          let err = ResolveError::SupervoxelLookup { node, source };
          tracing::debug!(%node, error = %err, "supervoxel lookup failed");
          return ResolveState::Unresolved(UnresolvedReason::SupervoxelLookupFailed {
            message: error_chain(&err),
          });
        }
      }
    }
    let Some(targets) = supervoxels.as_deref().filter(|set| !set.is_empty()) else {
      return self.inconsistent(node);
    };

    let chunk_coord = self.service.chunkgraph_meta().chunk_coord(node);
    let chunk = match self.fetch_with_retries(chunk_coord, mip) {
      Ok(chunk) => chunk,
      Err(err) => {
        tracing::debug!(%node, mip, error = %err, "chunk fetch failed");
        return ResolveState::Unresolved(UnresolvedReason::ChunkUnavailable {
          mip,
          message: error_chain(&err),
        });
      }
    };

    let matches = chunk.matching_voxels(targets);
    // Chunk is dropped here; only the matched coordinates survive the scan.
    drop(chunk);

    match self.settings.statistic.representative(&matches) {
      Some(center) => {
        let factor = self.service.chunkgraph_meta().downsample(mip).as_dvec3();
        let position = center * factor * self.settings.resolution;
        ResolveState::Resolved(ResolvedPosition::new(
          node,
          position,
          ResolutionMethod::SegmentationFallback { mip },
        ))
      }
      None if mip > 0 => {
        tracing::debug!(%node, from = mip, to = mip - 1, "no match, escalating to finer mip");
        ResolveState::Segmentation { mip: mip - 1 }
      }
      None => self.inconsistent(node),
    }
  }

  fn fetch_with_retries(&self, chunk: ChunkCoord, mip: u32) -> Result<SegmentationChunk, ResolveError> {
    let mut attempt = 0;
    loop {
      match self.fetcher.fetch(chunk, mip) {
        Ok(chunk) => return Ok(chunk),
        Err(err) if attempt < self.settings.fetch_retries => {
          attempt += 1;
          tracing::debug!(%chunk, mip, attempt, error = %err, "retrying chunk fetch");
        }
        Err(err) => return Err(err),
      }
    }
  }

  fn inconsistent(&self, node: Level2Id) -> ResolveState {
    let err = ResolveError::DataInconsistency { node };
    tracing::warn!(%node, "{err}");
    ResolveState::Unresolved(UnresolvedReason::DataInconsistency)
  }

  fn finish_unresolved(&self, node: Level2Id, reason: UnresolvedReason) -> ResolvedPosition {
    if self.settings.chunk_center_on_unresolved && reason != UnresolvedReason::Cancelled {
      let center = self.service.chunkgraph_meta().chunk_center_mip0(node) * self.settings.resolution;
      return ResolvedPosition::new(node, center, ResolutionMethod::ChunkCenter { reason });
    }
    ResolvedPosition::unresolved(node, reason)
  }
}

/// Error message with its source chain, `outer: inner`.
fn error_chain(err: &dyn std::error::Error) -> String {
  let mut message = err.to_string();
  let mut source = err.source();
  while let Some(cause) = source {
    message.push_str(": ");
    message.push_str(&cause.to_string());
    source = cause.source();
  }
  message
}
