//! Report persistence.
//!
//! The engine only needs "save this report somewhere and load it back";
//! storage layout belongs to the implementation. [`JsonReportCache`] writes a
//! single JSON document with unresolved positions encoded as `null`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CacheError;
use crate::report::ResolutionReport;

/// Storage for resolution reports.
pub trait ReportCache {
  /// Location reported back through [`ResolutionReport::cached_to`].
  fn location(&self) -> &Path;

  fn save(&self, report: &ResolutionReport) -> Result<(), CacheError>;

  fn load(&self) -> Result<ResolutionReport, CacheError>;
}

/// One JSON file per report.
#[derive(Clone, Debug)]
pub struct JsonReportCache {
  path: PathBuf,
}

impl JsonReportCache {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  fn io_error(&self, source: std::io::Error) -> CacheError {
    CacheError::Io {
      path: self.path.clone(),
      source,
    }
  }
}

impl ReportCache for JsonReportCache {
  fn location(&self) -> &Path {
    &self.path
  }

  /// Write the report, creating parent directories as needed.
  ///
  /// Goes through a sibling temp file and a rename so an interrupted save
  /// never leaves a truncated report behind.
  fn save(&self, report: &ResolutionReport) -> Result<(), CacheError> {
    if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
    }
    let json = serde_json::to_vec_pretty(report)?;
    let tmp = self.path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
    fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
  }

  fn load(&self) -> Result<ResolutionReport, CacheError> {
    let bytes = fs::read(&self.path).map_err(|e| self.io_error(e))?;
    Ok(serde_json::from_slice(&bytes)?)
  }
}

/// Save `report` through `cache`, recording the location on success.
///
/// Failures are logged and swallowed: a report that could not be persisted
/// is still returned to the caller.
pub fn save_best_effort<C: ReportCache + ?Sized>(cache: &C, report: &mut ResolutionReport) {
  match cache.save(report) {
    Ok(()) => {
      tracing::debug!(path = %cache.location().display(), "report cached");
      report.set_cached_to(cache.location().to_path_buf());
    }
    Err(err) => {
      tracing::warn!(path = %cache.location().display(), error = %err, "failed to cache report");
    }
  }
}

#[cfg(test)]
mod tests {
  use glam::DVec3;

  use super::*;
  use crate::dispatch::DispatchStats;
  use crate::types::{Level2Id, ResolutionMethod, ResolvedPosition, UnresolvedReason};

  fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir()
      .join(format!("l2_locate_cache_{}", std::process::id()))
      .join(name)
  }

  fn report() -> ResolutionReport {
    let entries = vec![
      ResolvedPosition::new(Level2Id(1), DVec3::new(8.0, 16.0, 40.0), ResolutionMethod::Mesh),
      ResolvedPosition::unresolved(Level2Id(2), UnresolvedReason::FallbackDisabled),
    ];
    let mut stats = DispatchStats::default();
    stats.mesh = 1;
    stats.unresolved = 1;
    ResolutionReport::new(entries, stats)
  }

  #[test]
  fn test_save_then_load() {
    let path = temp_path("save_then_load.json");
    let cache = JsonReportCache::new(&path);
    let original = report();

    cache.save(&original).unwrap();
    let loaded = cache.load().unwrap();
    fs::remove_file(&path).ok();

    assert_eq!(loaded, original);
    assert!(loaded.entries()[1].position.is_nan());
  }

  #[test]
  fn test_load_missing_is_io_error() {
    let cache = JsonReportCache::new(temp_path("does_not_exist.json"));
    assert!(matches!(cache.load(), Err(CacheError::Io { .. })));
  }

  #[test]
  fn test_load_garbage_is_serialize_error() {
    let path = temp_path("garbage.json");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, b"not json").unwrap();
    let result = JsonReportCache::new(&path).load();
    fs::remove_file(&path).ok();
    assert!(matches!(result, Err(CacheError::Serialize(_))));
  }

  #[test]
  fn test_best_effort_records_location() {
    let path = temp_path("best_effort.json");
    let mut report = report();
    save_best_effort(&JsonReportCache::new(&path), &mut report);
    fs::remove_file(&path).ok();
    assert_eq!(report.cached_to(), Some(path.as_path()));
  }

  #[test]
  fn test_best_effort_failure_keeps_report() {
    // A regular file where a directory is needed.
    let blocker = temp_path("blocker");
    fs::create_dir_all(blocker.parent().unwrap()).unwrap();
    fs::write(&blocker, b"").unwrap();

    let mut report = report();
    save_best_effort(&JsonReportCache::new(blocker.join("report.json")), &mut report);
    fs::remove_file(&blocker).ok();

    assert_eq!(report.cached_to(), None);
    assert_eq!(report.len(), 2);
  }
}
