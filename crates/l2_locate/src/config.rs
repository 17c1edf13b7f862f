//! ResolutionRequest - per-call configuration for a localization batch.
//!
//! Requests are plain data: build one with the `with_*` setters or load it
//! from TOML, where every field is optional and falls back to its default:
//!
//! ```toml
//! segmentation_fallback = true
//! fallback_mip = 2
//! root_point_resolution = [4.0, 4.0, 40.0]
//! parallelism = 8
//! nan_rounds = 2
//! save_to_cache = "positions.json"
//! voxel_statistic = "nearest_to_centroid"
//! fetch_retries = 1
//! chunk_center_on_unresolved = false
//! ```
//!
//! Nothing is checked until [`ResolutionRequest::validate`] runs against the
//! service the batch will use.

use std::path::{Path, PathBuf};

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::resolve::{ResolverSettings, VoxelStatistic};
use crate::service::DataService;

/// Configuration of one localization batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolutionRequest {
  /// Scan the segmentation for nodes without a mesh fragment.
  pub segmentation_fallback: bool,

  /// Mip the fallback starts at; escalates toward mip 0 from there.
  pub fallback_mip: u32,

  /// Physical size of a mip-0 voxel for output coordinates.
  /// Inferred from the segmentation metadata when `None`.
  pub root_point_resolution: Option<[f64; 3]>,

  /// Worker threads.
  pub parallelism: usize,

  /// Round resolved coordinates to this many fractional digits.
  /// `None` disables rounding and the unresolved-position warning.
  pub nan_rounds: Option<u32>,

  /// Persist the report here after resolution.
  pub save_to_cache: Option<PathBuf>,

  pub voxel_statistic: VoxelStatistic,

  /// Extra download attempts per chunk before a node is given up.
  pub fetch_retries: u32,

  /// Place unresolved nodes at their chunk center instead of NaN.
  pub chunk_center_on_unresolved: bool,
}

impl Default for ResolutionRequest {
  fn default() -> Self {
    Self {
      segmentation_fallback: true,
      fallback_mip: 2,
      root_point_resolution: None,
      parallelism: 4,
      nan_rounds: Some(2),
      save_to_cache: None,
      voxel_statistic: VoxelStatistic::default(),
      fetch_retries: 1,
      chunk_center_on_unresolved: false,
    }
  }
}

impl ResolutionRequest {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_segmentation_fallback(mut self, enabled: bool) -> Self {
    self.segmentation_fallback = enabled;
    self
  }

  pub fn with_fallback_mip(mut self, mip: u32) -> Self {
    self.fallback_mip = mip;
    self
  }

  pub fn with_root_point_resolution(mut self, resolution: [f64; 3]) -> Self {
    self.root_point_resolution = Some(resolution);
    self
  }

  pub fn with_parallelism(mut self, parallelism: usize) -> Self {
    self.parallelism = parallelism;
    self
  }

  pub fn with_nan_rounds(mut self, digits: Option<u32>) -> Self {
    self.nan_rounds = digits;
    self
  }

  pub fn with_save_to_cache(mut self, path: impl Into<PathBuf>) -> Self {
    self.save_to_cache = Some(path.into());
    self
  }

  pub fn with_voxel_statistic(mut self, statistic: VoxelStatistic) -> Self {
    self.voxel_statistic = statistic;
    self
  }

  pub fn with_fetch_retries(mut self, retries: u32) -> Self {
    self.fetch_retries = retries;
    self
  }

  pub fn with_chunk_center_on_unresolved(mut self, enabled: bool) -> Self {
    self.chunk_center_on_unresolved = enabled;
    self
  }

  /// Parse a request from TOML text.
  pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
    Ok(toml::from_str(content)?)
  }

  /// Load a request from a TOML file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_toml_str(&content)
  }

  /// Check the request against the service and derive resolver settings.
  ///
  /// Runs before any node is dispatched, so a bad request never produces a
  /// partial report.
  pub fn validate<S: DataService + ?Sized>(&self, service: &S) -> Result<ResolverSettings, ConfigError> {
    if self.parallelism == 0 {
      return Err(ConfigError::ZeroParallelism);
    }

    // Download boxes and positions only know the chunk graph's own ladder.
    let mip_count = service.mip_count().min(service.chunkgraph_meta().mip_count());
    if mip_count == 0 {
      return Err(ConfigError::NoMipLevels);
    }

    if self.segmentation_fallback {
      if self.fallback_mip >= mip_count {
        return Err(ConfigError::MipOutOfRange {
          requested: self.fallback_mip,
          coarsest: mip_count - 1,
        });
      }
    } else if !service.has_meshes() {
      return Err(ConfigError::NoResolutionPath);
    }

    let resolution = match self.root_point_resolution {
      Some(resolution) => DVec3::from_array(resolution),
      None => service
        .native_resolution()
        .ok_or(ConfigError::ResolutionNotInferable)?,
    };
    for (axis, value) in resolution.to_array().into_iter().enumerate() {
      if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::InvalidResolution { axis, value });
      }
    }

    Ok(ResolverSettings {
      segmentation_fallback: self.segmentation_fallback,
      fallback_mip: self.fallback_mip,
      resolution,
      statistic: self.voxel_statistic,
      fetch_retries: self.fetch_retries,
      chunk_center_on_unresolved: self.chunk_center_on_unresolved,
    })
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
