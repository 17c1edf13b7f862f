use super::*;
use crate::types::{ResolutionMethod, UnresolvedReason};

fn sample_report() -> ResolutionReport {
  let entries = vec![
    ResolvedPosition::new(
      Level2Id(10),
      DVec3::new(1.23456, -7.891, 100.004),
      ResolutionMethod::Mesh,
    ),
    ResolvedPosition::unresolved(Level2Id(11), UnresolvedReason::DataInconsistency),
    ResolvedPosition::new(
      Level2Id(12),
      DVec3::new(0.5, 0.25, 0.125),
      ResolutionMethod::SegmentationFallback { mip: 1 },
    ),
  ];
  ResolutionReport::new(entries, DispatchStats::default())
}

// =========================================================================
// Accessors
// =========================================================================

#[test]
fn test_accessors() {
  let report = sample_report();
  assert_eq!(report.len(), 3);
  assert_eq!(report.unresolved_count(), 1);
  assert_eq!(report.missing_ids(), vec![Level2Id(11)]);
  assert_eq!(report.get(Level2Id(12)).unwrap().method.fallback_mip(), Some(1));
  assert!(report.get(Level2Id(99)).is_none());
  assert!(!report.was_rounded());
  assert_eq!(report.cached_to(), None);

  let positions = report.positions();
  assert_eq!(positions[0], DVec3::new(1.23456, -7.891, 100.004));
  assert!(positions[1].is_nan());
}

#[test]
fn test_mesh_missing_ids_include_chunk_centers() {
  let entries = vec![
    ResolvedPosition::new(Level2Id(20), DVec3::ONE, ResolutionMethod::Mesh),
    ResolvedPosition::new(
      Level2Id(21),
      DVec3::splat(8.0),
      ResolutionMethod::ChunkCenter {
        reason: UnresolvedReason::DataInconsistency,
      },
    ),
    ResolvedPosition::new(
      Level2Id(22),
      DVec3::splat(2.0),
      ResolutionMethod::SegmentationFallback { mip: 0 },
    ),
  ];
  let report = ResolutionReport::new(entries, DispatchStats::default());

  assert!(report.missing_ids().is_empty());
  assert_eq!(report.mesh_missing_ids(), vec![Level2Id(21), Level2Id(22)]);
}

#[test]
fn test_iterates_in_order() {
  let report = sample_report();
  let ids: Vec<u64> = report.iter().map(|entry| entry.node.raw()).collect();
  assert_eq!(ids, vec![10, 11, 12]);
  assert_eq!((&report).into_iter().count(), 3);
}

// =========================================================================
// Rounding
// =========================================================================

#[test]
fn test_round_positions() {
  let mut report = sample_report();
  report.round_positions(2);

  assert!(report.was_rounded());
  let position = report.entries()[0].position;
  assert!((position.x - 1.23).abs() < 1e-12);
  assert!((position.y + 7.89).abs() < 1e-12);
  assert_eq!(position.z, 100.0);
  assert_eq!(report.entries()[2].position, DVec3::new(0.5, 0.25, 0.13));
}

/// Rounding to k digits leaves at most k fractional digits, NaN stays NaN.
#[test]
fn test_rounding_law() {
  let mut report = sample_report();
  report.round_positions(1);

  for entry in report.entries() {
    for value in entry.position.to_array() {
      if value.is_nan() {
        continue;
      }
      let scaled = value * 10.0;
      assert!((scaled - scaled.round()).abs() < 1e-9, "{value}");
    }
  }
  assert!(report.entries()[1].position.is_nan());
  assert_eq!(report.unresolved_count(), 1);
}

#[test]
fn test_round_zero_digits() {
  let mut report = sample_report();
  report.round_positions(0);
  assert_eq!(report.entries()[0].position, DVec3::new(1.0, -8.0, 100.0));
}

#[test]
fn test_excessive_digits_are_noop() {
  let mut report = sample_report();
  let before = report.positions();
  report.round_positions(40);
  assert!(report.was_rounded());
  assert_eq!(report.positions()[0], before[0]);
}

// =========================================================================
// Warning
// =========================================================================

#[test]
fn test_warning_lists_nan_entries() {
  let report = sample_report();
  let warning = report.check_unresolved().unwrap();
  assert_eq!(warning.ids, vec![Level2Id(11)]);
  assert_eq!(warning.total, 3);
  assert_eq!(warning.to_string(), "1 of 3 level-2 positions are NaN (11)");
  assert_eq!(report.warn_if_unresolved(), Some(warning));
}

#[test]
fn test_no_warning_when_all_resolved() {
  let entries = vec![ResolvedPosition::new(
    Level2Id(1),
    DVec3::ONE,
    ResolutionMethod::Mesh,
  )];
  let report = ResolutionReport::new(entries, DispatchStats::default());
  assert_eq!(report.check_unresolved(), None);
  assert_eq!(report.warn_if_unresolved(), None);
}

/// A NaN mesh vertex is caught even though the method says resolved.
#[test]
fn test_warning_rescans_positions() {
  let entries = vec![ResolvedPosition::new(
    Level2Id(1),
    DVec3::new(f64::NAN, 0.0, 0.0),
    ResolutionMethod::Mesh,
  )];
  let report = ResolutionReport::new(entries, DispatchStats::default());
  assert_eq!(report.unresolved_count(), 0);
  assert_eq!(report.check_unresolved().unwrap().ids, vec![Level2Id(1)]);
}

#[test]
fn test_warning_truncates_long_lists() {
  let entries = (0..8)
    .map(|i| ResolvedPosition::unresolved(Level2Id(i), UnresolvedReason::Cancelled))
    .collect();
  let report = ResolutionReport::new(entries, DispatchStats::default());
  assert_eq!(
    report.check_unresolved().unwrap().to_string(),
    "8 of 8 level-2 positions are NaN (0, 1, 2, 3, 4, ...)"
  );
}

// =========================================================================
// Serialization
// =========================================================================

#[test]
fn test_json_keeps_nan_entries() {
  let report = sample_report();
  let json = serde_json::to_string(&report).unwrap();
  let restored: ResolutionReport = serde_json::from_str(&json).unwrap();
  assert_eq!(restored, report);
  assert!(restored.entries()[1].position.is_nan());
}
