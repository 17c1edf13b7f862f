//! Error types.
//!
//! Per-node failures never surface here as `Err`; they are recorded in the
//! report as [`UnresolvedReason`](crate::types::UnresolvedReason). Only
//! configuration problems are raised to the caller before work starts.

use std::path::PathBuf;

use thiserror::Error;

use crate::chunkgraph::ChunkCoord;
use crate::types::Level2Id;

/// Failure reported by the remote data service collaborator.
#[derive(Debug, Error)]
pub enum ServiceError {
  #[error("request failed: {0}")]
  Request(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("malformed response: {0}")]
  Malformed(String),

  #[error("operation not supported by this service: {0}")]
  Unsupported(&'static str),
}

/// Per-node resolution failure inside the resolver.
#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("chunk {chunk} unavailable at mip {mip}")]
  ChunkUnavailable {
    chunk: ChunkCoord,
    mip: u32,
    #[source]
    source: ServiceError,
  },

  #[error("supervoxels of node {node} unavailable")]
  SupervoxelLookup {
    node: Level2Id,
    #[source]
    source: ServiceError,
  },

  #[error("node {node} has no matching voxel at mip 0")]
  DataInconsistency { node: Level2Id },
}

/// Invalid resolution request, raised before any node is dispatched.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("parallelism must be at least 1")]
  ZeroParallelism,

  #[error("fallback mip {requested} is beyond the coarsest available mip {coarsest}")]
  MipOutOfRange { requested: u32, coarsest: u32 },

  #[error("segmentation has no mip levels")]
  NoMipLevels,

  #[error(
    "root_point_resolution was not supplied and the segmentation does not report a mip-0 resolution"
  )]
  ResolutionNotInferable,

  #[error("resolution component {axis} must be finite and positive, got {value}")]
  InvalidResolution { axis: usize, value: f64 },

  #[error("segmentation fallback is disabled and the service provides no meshes")]
  NoResolutionPath,

  #[error("failed to read config file {path}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config TOML")]
  Parse(#[from] toml::de::Error),

  #[error("failed to build worker pool")]
  ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Report persistence failure.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("cache I/O failed for {path}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("cache serialization failed")]
  Serialize(#[from] serde_json::Error),
}

/// Errors from operations outside the batch pipeline (single-point lookups).
#[derive(Debug, Error)]
pub enum LocateError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Service(#[from] ServiceError),

  #[error("no voxel of root {root_id} within the search radius")]
  NothingNearPoint { root_id: u64 },
}

/// Convenience alias for service results.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
