//! # Decoded Mesh Description
//!
//! The owned, validated result of decoding a filamesh buffer. Nothing in
//! here borrows from the source bytes: every vertex, index and name has been
//! copied out, so the source buffer may be released as soon as decoding
//! returns.
//!
//! ```text
//! DecodedMesh
//! ├── MeshHeader       - counts, flags, bounds
//! ├── VertexStream     - layout + raw vertex block
//! ├── IndexStream      - u16 or u32 indices, all < vertex count
//! ├── PartDescriptor[] - file order, one per submesh
//! └── MorphTargets     - optional position deltas
//! ```

use bitflags::bitflags;

use half::f16;

use crate::format::normalized::{snorm16_to_f32, unorm8_to_f32};

bitflags! {
    /// Header flag bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MeshFlags: u32 {
        /// Attributes share one interleaved block. Informational: offsets and
        /// strides fully describe the layout either way.
        const INTERLEAVED = 1 << 0;
        /// Texture coordinates are normalized `i16x2` instead of `f16x2`.
        const TEXCOORD_SNORM16 = 1 << 1;
        /// Vertex and index blocks are meshopt-compressed. Never decoded here.
        const COMPRESSION = 1 << 2;
        /// A morph-target section follows the material table.
        const MORPH_TARGETS = 1 << 3;
    }
}

impl MeshFlags {
    /// Flags this decoder knows how to stream.
    pub const SUPPORTED: Self = Self::INTERLEAVED
        .union(Self::TEXCOORD_SNORM16)
        .union(Self::MORPH_TARGETS);
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aabb {
    /// Minimum corner.
    pub min: [f32; 3],
    /// Maximum corner.
    pub max: [f32; 3],
}

impl Aabb {
    /// Builds a box from the center/half-extent pair stored on disk.
    #[must_use]
    pub fn from_center_half_extent(center: [f32; 3], half_extent: [f32; 3]) -> Self {
        Self {
            min: [
                center[0] - half_extent[0],
                center[1] - half_extent[1],
                center[2] - half_extent[2],
            ],
            max: [
                center[0] + half_extent[0],
                center[1] + half_extent[1],
                center[2] + half_extent[2],
            ],
        }
    }

    /// Smallest box containing all `points`, or the default box if empty.
    #[must_use]
    pub fn from_points(points: &[[f32; 3]]) -> Self {
        let Some(first) = points.first() else {
            return Self::default();
        };
        let mut aabb = Self { min: *first, max: *first };
        for p in &points[1..] {
            for axis in 0..3 {
                aabb.min[axis] = aabb.min[axis].min(p[axis]);
                aabb.max[axis] = aabb.max[axis].max(p[axis]);
            }
        }
        aabb
    }

    /// Box center.
    #[must_use]
    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    /// Half of the box size along each axis.
    #[must_use]
    pub fn half_extent(&self) -> [f32; 3] {
        [
            (self.max[0] - self.min[0]) * 0.5,
            (self.max[1] - self.min[1]) * 0.5,
            (self.max[2] - self.min[2]) * 0.5,
        ]
    }
}

/// Width of the entries in the index block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    /// 32-bit indices (on-disk value 0).
    U32,
    /// 16-bit indices (on-disk value 1).
    U16,
}

impl IndexType {
    /// Parses the on-disk discriminant.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::U32),
            1 => Some(Self::U16),
            _ => None,
        }
    }

    /// On-disk discriminant.
    #[must_use]
    pub const fn raw(self) -> u32 {
        match self {
            Self::U32 => 0,
            Self::U16 => 1,
        }
    }

    /// Bytes per index.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::U32 => 4,
            Self::U16 => 2,
        }
    }
}

/// Validated header fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshHeader {
    /// Format version.
    pub version: u32,
    /// Number of vertices in the vertex stream.
    pub vertex_count: u32,
    /// Number of entries in the index stream.
    pub index_count: u32,
    /// Number of part records.
    pub part_count: u32,
    /// Bounds of the whole mesh.
    pub bounds: Aabb,
    /// Layout flags.
    pub flags: MeshFlags,
    /// Index width.
    pub index_type: IndexType,
    /// Size of the vertex block in bytes.
    pub vertex_block_size: u32,
    /// Size of the index block in bytes.
    pub index_block_size: u32,
}

/// What a vertex attribute means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeSemantic {
    /// Object-space position.
    Position,
    /// Tangent frame encoded as a quaternion.
    Tangents,
    /// Vertex color.
    Color,
    /// First texture coordinate set.
    Uv0,
    /// Second texture coordinate set.
    Uv1,
}

/// How an attribute is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeFormat {
    /// Four binary16 floats.
    Half4,
    /// Four signed normalized 16-bit integers.
    Short4Norm,
    /// Four unsigned normalized bytes.
    UByte4Norm,
    /// Two binary16 floats.
    Half2,
    /// Two signed normalized 16-bit integers.
    Short2Norm,
}

impl AttributeFormat {
    /// Bytes per element.
    #[must_use]
    pub const fn size(self) -> u32 {
        match self {
            Self::Half4 | Self::Short4Norm => 8,
            Self::UByte4Norm | Self::Half2 | Self::Short2Norm => 4,
        }
    }

    /// Number of components.
    #[must_use]
    pub const fn components(self) -> usize {
        match self {
            Self::Half4 | Self::Short4Norm | Self::UByte4Norm => 4,
            Self::Half2 | Self::Short2Norm => 2,
        }
    }

    /// Whether integer components are normalized to `[-1, 1]` / `[0, 1]`.
    #[must_use]
    pub const fn is_normalized(self) -> bool {
        matches!(self, Self::Short4Norm | Self::UByte4Norm | Self::Short2Norm)
    }

    /// Decodes one element into `out`, returning the component count.
    fn decode(self, bytes: &[u8], out: &mut [f32; 4]) -> usize {
        let n = self.components();
        for (c, slot) in out.iter_mut().enumerate().take(n) {
            *slot = match self {
                Self::Half4 | Self::Half2 => {
                    f16::from_le_bytes([bytes[c * 2], bytes[c * 2 + 1]]).to_f32()
                }
                Self::Short4Norm | Self::Short2Norm => {
                    snorm16_to_f32(i16::from_le_bytes([bytes[c * 2], bytes[c * 2 + 1]]))
                }
                Self::UByte4Norm => unorm8_to_f32(bytes[c]),
            };
        }
        n
    }
}

/// One attribute inside the vertex block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Attribute meaning.
    pub semantic: AttributeSemantic,
    /// Storage format.
    pub format: AttributeFormat,
    /// Byte offset of the first element.
    pub offset: u32,
    /// Distance in bytes between consecutive elements.
    pub stride: u32,
}

/// Attributes present in a vertex stream, in header order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    pub(crate) fn new(attributes: Vec<VertexAttribute>) -> Self {
        Self { attributes }
    }

    /// Attribute with the given semantic, if present.
    #[must_use]
    pub fn get(&self, semantic: AttributeSemantic) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.semantic == semantic)
    }

    /// Whether an attribute is present.
    #[must_use]
    pub fn has(&self, semantic: AttributeSemantic) -> bool {
        self.get(semantic).is_some()
    }

    /// All present attributes.
    pub fn iter(&self) -> impl Iterator<Item = &VertexAttribute> {
        self.attributes.iter()
    }

    /// Number of present attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether no attribute is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Owned vertex block plus the layout that interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexStream {
    layout: VertexLayout,
    data: Vec<u8>,
    vertex_count: u32,
}

impl VertexStream {
    pub(crate) fn new(layout: VertexLayout, data: Vec<u8>, vertex_count: u32) -> Self {
        Self { layout, data, vertex_count }
    }

    /// Attribute layout.
    #[must_use]
    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Raw vertex block, ready for upload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Raw bytes of one attribute element.
    #[must_use]
    pub fn attribute_bytes(&self, semantic: AttributeSemantic, vertex: u32) -> Option<&[u8]> {
        if vertex >= self.vertex_count {
            return None;
        }
        let attr = self.layout.get(semantic)?;
        // Layout was bounds-checked against the block at decode time.
        let start = attr.offset as usize + attr.stride as usize * vertex as usize;
        self.data.get(start..start + attr.format.size() as usize)
    }

    /// Decodes one attribute element to floats. Unused trailing components
    /// are zero.
    #[must_use]
    pub fn attribute(&self, semantic: AttributeSemantic, vertex: u32) -> Option<[f32; 4]> {
        let attr = self.layout.get(semantic)?;
        let bytes = self.attribute_bytes(semantic, vertex)?;
        let mut out = [0.0; 4];
        attr.format.decode(bytes, &mut out);
        Some(out)
    }

    /// Position of a vertex.
    #[must_use]
    pub fn position(&self, vertex: u32) -> Option<[f32; 3]> {
        self.attribute(AttributeSemantic::Position, vertex)
            .map(|p| [p[0], p[1], p[2]])
    }

    /// All positions, in vertex order.
    #[must_use]
    pub fn positions(&self) -> Vec<[f32; 3]> {
        (0..self.vertex_count).filter_map(|v| self.position(v)).collect()
    }
}

/// Owned index data. Every entry is below the vertex count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexStream {
    /// 16-bit indices.
    U16(Vec<u16>),
    /// 32-bit indices.
    U32(Vec<u32>),
}

impl IndexStream {
    /// Index width.
    #[must_use]
    pub fn index_type(&self) -> IndexType {
        match self {
            Self::U16(_) => IndexType::U16,
            Self::U32(_) => IndexType::U32,
        }
    }

    /// Number of indices.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
        }
    }

    /// Whether the stream is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index at `position`, widened to `u32`.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<u32> {
        match self {
            Self::U16(v) => v.get(position).map(|&i| u32::from(i)),
            Self::U32(v) => v.get(position).copied(),
        }
    }

    /// Iterates indices widened to `u32`.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Raw index block in native byte order, ready for upload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::U16(v) => bytemuck::cast_slice(v),
            Self::U32(v) => bytemuck::cast_slice(v),
        }
    }
}

/// One submesh: a contiguous index range drawn with one material.
#[derive(Debug, Clone, PartialEq)]
pub struct PartDescriptor {
    /// Material name; empty means "use the default material".
    pub material_name: String,
    /// First index of the part in the index stream.
    pub offset: u32,
    /// Number of indices in the part.
    pub index_count: u32,
    /// Smallest vertex index the part references.
    pub min_index: u32,
    /// Largest vertex index the part references.
    pub max_index: u32,
    /// Part-local bounds.
    pub bounds: Aabb,
}

/// Per-vertex position deltas, one block per target.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphTargets {
    target_count: u32,
    vertex_count: u32,
    deltas: Vec<[f32; 3]>,
}

impl MorphTargets {
    pub(crate) fn new(target_count: u32, vertex_count: u32, deltas: Vec<[f32; 3]>) -> Self {
        debug_assert_eq!(deltas.len() as u64, u64::from(target_count) * u64::from(vertex_count));
        Self { target_count, vertex_count, deltas }
    }

    /// Number of targets, as declared by the file.
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.target_count as usize
    }

    /// Deltas of one target, indexed by vertex.
    #[must_use]
    pub fn target(&self, target: usize) -> Option<&[[f32; 3]]> {
        if target >= self.target_count() {
            return None;
        }
        let n = self.vertex_count as usize;
        self.deltas.get(target * n..(target + 1) * n)
    }
}

/// Fully decoded, owned mesh description.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMesh {
    pub(crate) header: MeshHeader,
    pub(crate) vertices: VertexStream,
    pub(crate) indices: IndexStream,
    pub(crate) parts: Vec<PartDescriptor>,
    pub(crate) materials: Vec<String>,
    pub(crate) morph_targets: Option<MorphTargets>,
}

impl DecodedMesh {
    /// Header fields.
    #[must_use]
    pub fn header(&self) -> &MeshHeader {
        &self.header
    }

    /// Vertex stream.
    #[must_use]
    pub fn vertices(&self) -> &VertexStream {
        &self.vertices
    }

    /// Index stream.
    #[must_use]
    pub fn indices(&self) -> &IndexStream {
        &self.indices
    }

    /// Parts in file order.
    #[must_use]
    pub fn parts(&self) -> &[PartDescriptor] {
        &self.parts
    }

    /// Material name table as stored in the file.
    #[must_use]
    pub fn material_names(&self) -> &[String] {
        &self.materials
    }

    /// Morph targets, if the file carried any.
    #[must_use]
    pub fn morph_targets(&self) -> Option<&MorphTargets> {
        self.morph_targets.as_ref()
    }

    /// Mesh bounds.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        self.header.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_center_half_extent_roundtrip() {
        let aabb = Aabb::from_center_half_extent([1.0, 2.0, 3.0], [0.5, 1.0, 2.0]);
        assert_eq!(aabb.min, [0.5, 1.0, 1.0]);
        assert_eq!(aabb.max, [1.5, 3.0, 5.0]);
        assert_eq!(aabb.center(), [1.0, 2.0, 3.0]);
        assert_eq!(aabb.half_extent(), [0.5, 1.0, 2.0]);
    }

    #[test]
    fn test_aabb_from_points() {
        let aabb = Aabb::from_points(&[[0.0, 1.0, -1.0], [2.0, -3.0, 4.0]]);
        assert_eq!(aabb.min, [0.0, -3.0, -1.0]);
        assert_eq!(aabb.max, [2.0, 1.0, 4.0]);
        assert_eq!(Aabb::from_points(&[]), Aabb::default());
    }

    #[test]
    fn test_supported_flags() {
        assert!(MeshFlags::SUPPORTED.contains(MeshFlags::MORPH_TARGETS));
        assert!(!MeshFlags::SUPPORTED.contains(MeshFlags::COMPRESSION));
    }

    #[test]
    fn test_index_stream_widening() {
        let stream = IndexStream::U16(vec![0, 2, 1]);
        assert_eq!(stream.index_type(), IndexType::U16);
        assert_eq!(stream.iter().collect::<Vec<_>>(), vec![0, 2, 1]);
        let native: Vec<u8> = [0u16, 2, 1].iter().flat_map(|i| i.to_ne_bytes()).collect();
        assert_eq!(stream.as_bytes(), native.as_slice());
        assert_eq!(stream.get(3), None);
    }

    #[test]
    fn test_vertex_stream_decodes_half_positions() {
        // One vertex: position (1.0, -2.0, 0.5, 1.0) as f16x4.
        let data = [0x00, 0x3c, 0x00, 0xc0, 0x00, 0x38, 0x00, 0x3c];
        let layout = VertexLayout::new(vec![VertexAttribute {
            semantic: AttributeSemantic::Position,
            format: AttributeFormat::Half4,
            offset: 0,
            stride: 8,
        }]);
        let stream = VertexStream::new(layout, data.to_vec(), 1);
        assert_eq!(stream.position(0), Some([1.0, -2.0, 0.5]));
        assert_eq!(stream.position(1), None);
        assert_eq!(stream.attribute(AttributeSemantic::Color, 0), None);
    }

    #[test]
    fn test_morph_target_slicing() {
        let morph = MorphTargets::new(3, 2, vec![[1.0, 0.0, 0.0]; 6]);
        assert_eq!(morph.target_count(), 3);
        assert_eq!(morph.target(2).map(<[_]>::len), Some(2));
        assert!(morph.target(3).is_none());
    }

    #[test]
    fn test_morph_targets_without_vertices() {
        let morph = MorphTargets::new(4, 0, Vec::new());
        assert_eq!(morph.target_count(), 4);
        assert_eq!(morph.target(3), Some(&[][..]));
        assert!(morph.target(4).is_none());
        assert!(morph.target(usize::MAX).is_none());
    }
}
