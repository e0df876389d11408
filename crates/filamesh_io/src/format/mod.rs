//! # Filamesh Binary Format
//!
//! Byte-exact layout of a filamesh buffer. All values are little-endian.
//!
//! ```text
//! Filamesh Buffer:
//! ├── Header (104 bytes)
//! │   ├── "FILAMESH" (8 bytes) - Magic
//! │   ├── Version (4 bytes) - 1
//! │   ├── Part count, bounds (center + half-extent), flags
//! │   ├── Offset/stride pairs: position, tangents, color, uv0, uv1
//! │   └── Vertex count/size, index type/count/size
//! ├── Vertex block (vertex size bytes)
//! ├── Index block (index size bytes)
//! ├── Part table (part count x 44 bytes)
//! ├── Material table - u32 count, then u32 length + UTF-8 + NUL per name
//! └── Morph section (MORPH_TARGETS only) - u32 count, then f32x3 deltas
//! ```
//!
//! An attribute whose offset is `0xFFFF_FFFF` is absent.

mod decoder;
pub(crate) mod normalized;
mod reader;
mod writer;

pub use decoder::{decode, decode_bytes, decode_deferred, DeferredDecode};
pub use writer::{MeshWriter, PartSpec};

use bytemuck::{Pod, Zeroable};

/// Format magic.
pub const MAGIC: [u8; 8] = *b"FILAMESH";

/// Newest format version this crate reads and writes.
pub const VERSION: u32 = 1;

/// Offset value marking an absent vertex attribute.
pub const ABSENT_ATTRIBUTE: u32 = u32::MAX;

/// Size of the fixed header in bytes, magic included.
pub const HEADER_SIZE: usize = MAGIC.len() + std::mem::size_of::<RawHeader>();

/// Size of one part record in bytes.
pub const PART_SIZE: usize = std::mem::size_of::<RawPart>();

/// On-disk header following the magic, field for field.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct RawHeader {
    pub version: u32,
    pub parts: u32,
    pub aabb_center: [f32; 3],
    pub aabb_half_extent: [f32; 3],
    pub flags: u32,
    pub offset_position: u32,
    pub stride_position: u32,
    pub offset_tangents: u32,
    pub stride_tangents: u32,
    pub offset_color: u32,
    pub stride_color: u32,
    pub offset_uv0: u32,
    pub stride_uv0: u32,
    pub offset_uv1: u32,
    pub stride_uv1: u32,
    pub vertex_count: u32,
    pub vertex_size: u32,
    pub index_type: u32,
    pub index_count: u32,
    pub index_size: u32,
}

/// On-disk part record.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct RawPart {
    pub offset: u32,
    pub index_count: u32,
    pub min_index: u32,
    pub max_index: u32,
    pub material_id: u32,
    pub aabb_center: [f32; 3],
    pub aabb_half_extent: [f32; 3],
}

/// Swaps every 32-bit word between file order (little-endian) and host
/// order. A no-op on little-endian hosts; the same call converts in both
/// directions.
pub(crate) fn swap_le<T: Pod>(mut value: T) -> T {
    if cfg!(target_endian = "big") {
        for word in bytemuck::cast_slice_mut::<T, [u8; 4]>(std::slice::from_mut(&mut value)) {
            word.reverse();
        }
    }
    value
}
