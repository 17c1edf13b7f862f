//! Half-open integer voxel box.

use glam::{DVec3, I64Vec3};

/// Axis-aligned voxel region `[min, max)` at some mip level.
///
/// Linear voxel order is x-fastest, matching the layout of downloaded
/// segmentation blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoxelBox {
	/// Minimum corner (inclusive).
	pub min: I64Vec3,
	/// Maximum corner (exclusive).
	pub max: I64Vec3,
}

impl VoxelBox {
	/// Create a new box from min and max corners.
	///
	/// # Panics
	/// Debug-asserts that min <= max on all axes.
	pub fn new(min: I64Vec3, max: I64Vec3) -> Self {
		debug_assert!(
			min.x <= max.x && min.y <= max.y && min.z <= max.z,
			"VoxelBox min must be <= max on all axes"
		);
		Self { min, max }
	}

	/// Create a box from its minimum corner and size.
	pub fn from_min_size(min: I64Vec3, size: I64Vec3) -> Self {
		Self::new(min, min + size)
	}

	/// Box of `2 * half + 1` voxels per axis centered on `center`.
	pub fn around(center: I64Vec3, half: I64Vec3) -> Self {
		Self::new(center - half, center + half + I64Vec3::ONE)
	}

	/// Get the size of the box (max - min).
	#[inline]
	pub fn size(&self) -> I64Vec3 {
		self.max - self.min
	}

	/// Number of voxels in the box.
	#[inline]
	pub fn volume(&self) -> u64 {
		let size = self.size().max(I64Vec3::ZERO);
		(size.x as u64) * (size.y as u64) * (size.z as u64)
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.volume() == 0
	}

	/// Check if the box contains a voxel.
	#[inline]
	pub fn contains(&self, voxel: I64Vec3) -> bool {
		voxel.x >= self.min.x
			&& voxel.x < self.max.x
			&& voxel.y >= self.min.y
			&& voxel.y < self.max.y
			&& voxel.z >= self.min.z
			&& voxel.z < self.max.z
	}

	/// Overlap of two boxes, `None` if they share no voxel.
	pub fn intersection(&self, other: &VoxelBox) -> Option<VoxelBox> {
		let min = self.min.max(other.min);
		let max = self.max.min(other.max);
		if min.x < max.x && min.y < max.y && min.z < max.z {
			Some(VoxelBox { min, max })
		} else {
			None
		}
	}

	/// Geometric center in voxel units.
	#[inline]
	pub fn center(&self) -> DVec3 {
		(self.min.as_dvec3() + self.max.as_dvec3()) * 0.5
	}

	/// Linear x-fastest index of a voxel, `None` outside the box.
	#[inline]
	pub fn linear_index(&self, voxel: I64Vec3) -> Option<usize> {
		if !self.contains(voxel) {
			return None;
		}
		let size = self.size();
		let local = voxel - self.min;
		Some((local.x + size.x * (local.y + size.y * local.z)) as usize)
	}

	/// Absolute voxel coordinate of a linear x-fastest index.
	#[inline]
	pub fn voxel_at(&self, index: usize) -> I64Vec3 {
		let size = self.size();
		let index = index as i64;
		let x = index % size.x;
		let y = (index / size.x) % size.y;
		let z = index / (size.x * size.y);
		self.min + I64Vec3::new(x, y, z)
	}
}
