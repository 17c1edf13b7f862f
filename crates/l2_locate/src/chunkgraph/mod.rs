//! Chunk coordinate mapping for level-2 nodes.
//!
//! Pure functions only: a node id decodes to chunk grid coordinates, and a
//! chunk maps to a voxel region at any mip level. No I/O, so the mapper is
//! freely shared across worker threads.
//!
//! # Mip Convention
//!
//! Mip 0 = full resolution, higher mip = coarser.
//!
//! ```text
//! voxel_at_mip = floor(voxel_at_mip0 / downsample(mip))
//! ```

pub mod bounds;
pub mod coord;
pub mod meta;

// Re-exports
pub use bounds::VoxelBox;
pub use coord::ChunkCoord;
pub use meta::{ChunkGraphMeta, LAYER_ID_BITS, LEVEL2_LAYER};
