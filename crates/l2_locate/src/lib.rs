//! l2_locate - representative positions for level-2 chunked-graph nodes
//!
//! A segmented volume is partitioned into supervoxels, and supervoxels are
//! agglomerated into level-2 nodes of a chunked graph. This crate assigns one
//! representative 3D position to each of an arbitrary set of level-2 nodes, as
//! needed for skeletonization and synapse attachment.
//!
//! # Resolution Paths
//!
//! - **Mesh fragment**: the node's mesh vertex nearest the fragment centroid.
//!   Cheap, but fragments are routinely missing or degenerate.
//! - **Segmentation fallback**: download the node's chunk at a coarse mip and
//!   scan for its supervoxels, escalating toward mip 0 when very small
//!   supervoxels vanish under downsampling.
//!
//! Nodes are resolved on a bounded worker pool; per-node failures are
//! recorded in the report instead of failing the batch.
//!
//! # Example
//!
//! ```ignore
//! use l2_locate::{resolve_all, ResolutionRequest};
//!
//! // `service` implements DataService over the caller's client/session.
//! let request = ResolutionRequest::new()
//!     .with_parallelism(8)
//!     .with_fallback_mip(2);
//! let report = resolve_all(&service, &level2_ids, &request)?;
//!
//! for entry in report.iter() {
//!     println!("{} -> {:?} ({:?})", entry.node, entry.position, entry.method);
//! }
//! ```

pub mod cache;
pub mod chunkgraph;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod nearest;
pub mod report;
pub mod resolve;
pub mod service;
pub mod types;

// Re-export commonly used items
pub use cache::{JsonReportCache, ReportCache};
pub use chunkgraph::{ChunkCoord, ChunkGraphMeta, VoxelBox};
pub use config::ResolutionRequest;
pub use dispatch::{resolve_all, resolve_all_with_abort, AbortHandle, DispatchStats, ResolutionJob};
pub use error::{CacheError, ConfigError, LocateError, ResolveError, ServiceError, ServiceResult};
pub use fetch::{renumber, ChunkFetcher, SegmentationChunk};
pub use nearest::{closest_level2, NearestLevel2};
pub use report::{ResolutionReport, UnresolvedPositionWarning};
pub use resolve::{PositionResolver, ResolverSettings, VoxelStatistic};
pub use service::{DataService, LabelBlock, MeshFragmentLookup};
pub use types::{
  Level2Id, ResolutionMethod, ResolvedPosition, SupervoxelId, SupervoxelSet, UnresolvedReason,
};

#[cfg(test)]
pub mod test_utils;
