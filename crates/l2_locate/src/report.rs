//! ResolutionReport - the ordered result of a localization batch.

use std::fmt;
use std::path::{Path, PathBuf};

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchStats;
use crate::types::{Level2Id, ResolutionMethod, ResolvedPosition};

/// Fractional digits beyond which rounding an `f64` changes nothing.
const MAX_ROUND_DIGITS: u32 = 15;

/// Positions of a batch, one entry per input id, in input order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolutionReport {
  entries: Vec<ResolvedPosition>,
  stats: DispatchStats,
  rounded: bool,
  /// Where the report was persisted, if it was.
  #[serde(skip)]
  cached_to: Option<PathBuf>,
}

impl ResolutionReport {
  pub fn new(entries: Vec<ResolvedPosition>, stats: DispatchStats) -> Self {
    Self {
      entries,
      stats,
      rounded: false,
      cached_to: None,
    }
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  #[inline]
  pub fn entries(&self) -> &[ResolvedPosition] {
    &self.entries
  }

  pub fn iter(&self) -> impl Iterator<Item = &ResolvedPosition> {
    self.entries.iter()
  }

  #[inline]
  pub fn stats(&self) -> &DispatchStats {
    &self.stats
  }

  /// Positions in input order; unresolved entries are NaN.
  pub fn positions(&self) -> Vec<DVec3> {
    self.entries.iter().map(|entry| entry.position).collect()
  }

  /// Ids that ended without a position, in input order.
  ///
  /// Nodes placed at their chunk center have a position and are not listed;
  /// see [`mesh_missing_ids`](Self::mesh_missing_ids).
  pub fn missing_ids(&self) -> Vec<Level2Id> {
    self
      .entries
      .iter()
      .filter(|entry| entry.is_unresolved())
      .map(|entry| entry.node)
      .collect()
  }

  /// Ids not resolved from a mesh fragment, in input order, whatever placed
  /// them afterwards.
  pub fn mesh_missing_ids(&self) -> Vec<Level2Id> {
    self
      .entries
      .iter()
      .filter(|entry| entry.method != ResolutionMethod::Mesh)
      .map(|entry| entry.node)
      .collect()
  }

  /// Entry for `node`. Linear scan; iterate [`entries`](Self::entries) for
  /// bulk access.
  pub fn get(&self, node: Level2Id) -> Option<&ResolvedPosition> {
    self.entries.iter().find(|entry| entry.node == node)
  }

  pub fn unresolved_count(&self) -> usize {
    self.entries.iter().filter(|entry| entry.is_unresolved()).count()
  }

  #[inline]
  pub fn was_rounded(&self) -> bool {
    self.rounded
  }

  #[inline]
  pub fn cached_to(&self) -> Option<&Path> {
    self.cached_to.as_deref()
  }

  pub(crate) fn set_cached_to(&mut self, path: PathBuf) {
    self.cached_to = Some(path);
  }

  /// Round every finite coordinate to `digits` fractional digits.
  ///
  /// NaN coordinates are left as NaN.
  pub fn round_positions(&mut self, digits: u32) {
    self.rounded = true;
    if digits > MAX_ROUND_DIGITS {
      return;
    }
    let scale = 10f64.powi(digits as i32);
    for entry in &mut self.entries {
      entry.position = DVec3::from_array(entry.position.to_array().map(|value| {
        if value.is_finite() {
          (value * scale).round() / scale
        } else {
          value
        }
      }));
    }
  }

  /// Re-scan the entries for NaN positions.
  ///
  /// Checks the actual output rather than the resolver outcomes, so it still
  /// catches NaNs from a mesh vertex or a deserialized report.
  pub fn check_unresolved(&self) -> Option<UnresolvedPositionWarning> {
    let ids: Vec<Level2Id> = self
      .entries
      .iter()
      .filter(|entry| entry.has_nan())
      .map(|entry| entry.node)
      .collect();
    if ids.is_empty() {
      None
    } else {
      Some(UnresolvedPositionWarning {
        total: self.entries.len(),
        ids,
      })
    }
  }

  /// Emit a warning event if any entry still has a NaN position.
  pub fn warn_if_unresolved(&self) -> Option<UnresolvedPositionWarning> {
    let warning = self.check_unresolved()?;
    tracing::warn!(
      unresolved = warning.ids.len(),
      total = warning.total,
      "{warning}"
    );
    Some(warning)
  }
}

impl<'a> IntoIterator for &'a ResolutionReport {
  type Item = &'a ResolvedPosition;
  type IntoIter = std::slice::Iter<'a, ResolvedPosition>;

  fn into_iter(self) -> Self::IntoIter {
    self.entries.iter()
  }
}

/// Some positions are NaN after resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnresolvedPositionWarning {
  /// Nodes whose position is NaN, in input order.
  pub ids: Vec<Level2Id>,
  /// Size of the batch.
  pub total: usize,
}

impl fmt::Display for UnresolvedPositionWarning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    const SHOWN: usize = 5;
    write!(
      f,
      "{} of {} level-2 positions are NaN (",
      self.ids.len(),
      self.total
    )?;
    for (i, id) in self.ids.iter().take(SHOWN).enumerate() {
      if i > 0 {
        write!(f, ", ")?;
      }
      write!(f, "{id}")?;
    }
    if self.ids.len() > SHOWN {
      write!(f, ", ...")?;
    }
    write!(f, ")")
  }
}

#[cfg(test)]
#[path = "report_test.rs"]
mod report_test;
