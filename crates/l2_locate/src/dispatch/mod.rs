//! Parallel dispatch of node resolution over a bounded worker pool.
//!
//! # Flow
//!
//! ```text
//!  validate request ──► build pool (parallelism threads)
//!                              │
//!         ┌────────────────────┼────────────────────┐
//!         ▼                    ▼                    ▼
//!     worker 0             worker 1    ...      worker N-1
//!   next = cursor++      next = cursor++      next = cursor++
//!   resolve(ids[next])   resolve(ids[next])   resolve(ids[next])
//!         │                    │                    │
//!         └──── (index, ResolvedPosition) via channel ┘
//!                              │
//!                              ▼
//!          slots[index] = result; unfilled slots → Cancelled
//!                              │
//!                              ▼
//!             round ─► cache (best-effort) ─► NaN warning
//! ```
//!
//! Workers pull ids from a shared atomic cursor, so a slow node only delays
//! its own worker. Results carry their input index and are placed by it, so
//! the report order never depends on completion order.

pub mod job;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel as channel;
use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::cache::{save_best_effort, JsonReportCache};
use crate::config::ResolutionRequest;
use crate::error::ConfigError;
use crate::report::ResolutionReport;
use crate::resolve::PositionResolver;
use crate::service::DataService;
use crate::types::{Level2Id, ResolutionMethod, ResolvedPosition, UnresolvedReason};

pub use job::ResolutionJob;

/// Shared flag that stops a batch from starting new nodes.
///
/// Nodes already in flight run to completion; nodes never started are
/// reported as [`UnresolvedReason::Cancelled`].
#[derive(Clone, Debug, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn abort(&self) {
    self.0.store(true, Ordering::Relaxed);
  }

  #[inline]
  pub fn is_aborted(&self) -> bool {
    self.0.load(Ordering::Relaxed)
  }
}

/// Counts by resolution method, plus work done.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
  /// Nodes resolved from a mesh fragment.
  pub mesh: usize,
  /// Nodes resolved by the segmentation fallback, keyed by mip.
  pub fallback_by_mip: BTreeMap<u32, usize>,
  /// Nodes placed at their chunk center.
  pub chunk_center: usize,
  /// Nodes without a position, cancelled ones excluded.
  pub unresolved: usize,
  /// Nodes never started because the batch was aborted.
  pub cancelled: usize,
  /// Segmentation downloads issued.
  pub chunk_fetches: usize,
  /// Wall time of the batch in microseconds.
  pub elapsed_us: u64,
}

impl DispatchStats {
  fn record(&mut self, method: &ResolutionMethod) {
    match method {
      ResolutionMethod::Mesh => self.mesh += 1,
      ResolutionMethod::SegmentationFallback { mip } => {
        *self.fallback_by_mip.entry(*mip).or_default() += 1;
      }
      ResolutionMethod::ChunkCenter { .. } => self.chunk_center += 1,
      ResolutionMethod::Unresolved {
        reason: UnresolvedReason::Cancelled,
      } => self.cancelled += 1,
      ResolutionMethod::Unresolved { .. } => self.unresolved += 1,
    }
  }

  /// Total nodes resolved by the segmentation fallback.
  pub fn fallback_total(&self) -> usize {
    self.fallback_by_mip.values().sum()
  }

  /// Nodes with a position taken from mesh or voxel data.
  pub fn resolved(&self) -> usize {
    self.mesh + self.fallback_total()
  }
}

/// Resolve every node of `nodes` and return positions in input order.
///
/// The request is validated before any work starts; per-node failures never
/// fail the batch and are recorded in the report instead.
pub fn resolve_all<S: DataService + ?Sized>(
  service: &S,
  nodes: &[Level2Id],
  request: &ResolutionRequest,
) -> Result<ResolutionReport, ConfigError> {
  resolve_all_with_abort(service, nodes, request, &AbortHandle::new())
}

/// [`resolve_all`] with an externally controlled abort flag.
#[cfg_attr(feature = "spans", tracing::instrument(skip_all, name = "dispatch::resolve_all", fields(nodes = nodes.len())))]
pub fn resolve_all_with_abort<S: DataService + ?Sized>(
  service: &S,
  nodes: &[Level2Id],
  request: &ResolutionRequest,
  abort: &AbortHandle,
) -> Result<ResolutionReport, ConfigError> {
  let settings = request.validate(service)?;
  let start = Instant::now();
  let resolver = PositionResolver::new(service, settings);

  let mut slots: Vec<Option<ResolvedPosition>> = vec![None; nodes.len()];
  if !nodes.is_empty() {
    let workers = request.parallelism.min(nodes.len());
    let pool = rayon::ThreadPoolBuilder::new()
      .num_threads(workers)
      .thread_name(|i| format!("l2-resolve-{i}"))
      .build()?;

    tracing::debug!(nodes = nodes.len(), workers, "dispatching level-2 nodes");
    let (sender, receiver) = channel::unbounded::<(usize, ResolvedPosition)>();
    let cursor = AtomicUsize::new(0);

    pool.scope(|scope| {
      for _ in 0..workers {
        let sender = sender.clone();
        let (resolver, cursor) = (&resolver, &cursor);
        scope.spawn(move |_| {
          while !abort.is_aborted() {
            let index = cursor.fetch_add(1, Ordering::Relaxed);
            let Some(&node) = nodes.get(index) else {
              break;
            };
            let _ = sender.send((index, resolver.resolve(node)));
          }
        });
      }
    });
    drop(sender);

    for (index, result) in receiver.try_iter() {
      slots[index] = Some(result);
    }
  }

  let entries: Vec<ResolvedPosition> = slots
    .into_iter()
    .zip(nodes)
    .map(|(slot, &node)| {
      slot.unwrap_or_else(|| ResolvedPosition::unresolved(node, UnresolvedReason::Cancelled))
    })
    .collect();

  let mut stats = DispatchStats::default();
  for entry in &entries {
    stats.record(&entry.method);
  }
  stats.chunk_fetches = resolver.fetch_count();
  stats.elapsed_us = start.elapsed().as_micros() as u64;

  tracing::debug!(
    mesh = stats.mesh,
    fallback = stats.fallback_total(),
    unresolved = stats.unresolved,
    cancelled = stats.cancelled,
    chunk_fetches = stats.chunk_fetches,
    elapsed_us = stats.elapsed_us,
    "batch complete"
  );

  Ok(finish(ResolutionReport::new(entries, stats), request))
}

/// Post-processing shared by blocking and background batches.
fn finish(mut report: ResolutionReport, request: &ResolutionRequest) -> ResolutionReport {
  if let Some(digits) = request.nan_rounds {
    report.round_positions(digits);
  }
  if let Some(path) = &request.save_to_cache {
    save_best_effort(&JsonReportCache::new(path), &mut report);
  }
  if request.nan_rounds.is_some() {
    report.warn_if_unresolved();
  }
  report
}
