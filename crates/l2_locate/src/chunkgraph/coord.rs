//! ChunkCoord - grid position of a chunk in the chunked graph.

use std::fmt;

use glam::I64Vec3;
use serde::{Deserialize, Serialize};

/// Chunk grid coordinates decoded from a node id.
///
/// Coordinates are in chunk units, independent of mip level.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct ChunkCoord {
  pub x: u32,
  pub y: u32,
  pub z: u32,
}

impl ChunkCoord {
  pub fn new(x: u32, y: u32, z: u32) -> Self {
    Self { x, y, z }
  }

  #[inline]
  pub fn as_i64vec3(&self) -> I64Vec3 {
    I64Vec3::new(self.x as i64, self.y as i64, self.z as i64)
  }
}

impl fmt::Display for ChunkCoord {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({}, {}, {})", self.x, self.y, self.z)
  }
}
