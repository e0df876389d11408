//! Filamesh encoder.
//!
//! Produces the exact byte layout the decoder reads. The writer trusts its
//! input: it computes part ranges, bounds and the material table, but never
//! checks that indices or parts make sense, so it can also author broken
//! files for tests.

use bytemuck::Zeroable;
use half::f16;

use crate::mesh::{Aabb, AttributeSemantic, DecodedMesh, IndexType, MeshFlags};

use super::normalized::f32_to_snorm16;
use super::{swap_le, RawHeader, RawPart, ABSENT_ATTRIBUTE, MAGIC, VERSION};

/// One part to encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartSpec {
    /// Material name; empty selects the default material at assembly.
    pub material: String,
    /// First index of the part.
    pub offset: u32,
    /// Number of indices in the part.
    pub index_count: u32,
}

/// Builder that encodes a mesh into a filamesh buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshWriter {
    positions: Vec<[f32; 3]>,
    tangents: Option<Vec<[f32; 4]>>,
    colors: Option<Vec<[u8; 4]>>,
    uv0: Option<Vec<[f32; 2]>>,
    uv1: Option<Vec<[f32; 2]>>,
    snorm_uvs: bool,
    interleaved: bool,
    indices: Vec<u32>,
    index_type: IndexType,
    parts: Vec<PartSpec>,
    morph_targets: Vec<Vec<[f32; 3]>>,
}

/// One attribute across all vertices, already in file encoding.
struct Column {
    semantic: AttributeSemantic,
    size: u32,
    elements: Vec<Vec<u8>>,
}

impl MeshWriter {
    /// Starts a mesh from its positions. Positions are always present.
    #[must_use]
    pub fn new(positions: Vec<[f32; 3]>) -> Self {
        Self {
            positions,
            tangents: None,
            colors: None,
            uv0: None,
            uv1: None,
            snorm_uvs: false,
            interleaved: false,
            indices: Vec::new(),
            index_type: IndexType::U32,
            parts: Vec::new(),
            morph_targets: Vec::new(),
        }
    }

    /// Adds tangent-frame quaternions.
    #[must_use]
    pub fn with_tangents(mut self, tangents: Vec<[f32; 4]>) -> Self {
        self.tangents = Some(tangents);
        self
    }

    /// Adds RGBA8 vertex colors.
    #[must_use]
    pub fn with_colors(mut self, colors: Vec<[u8; 4]>) -> Self {
        self.colors = Some(colors);
        self
    }

    /// Adds the first texture coordinate set.
    #[must_use]
    pub fn with_uv0(mut self, uvs: Vec<[f32; 2]>) -> Self {
        self.uv0 = Some(uvs);
        self
    }

    /// Adds the second texture coordinate set.
    #[must_use]
    pub fn with_uv1(mut self, uvs: Vec<[f32; 2]>) -> Self {
        self.uv1 = Some(uvs);
        self
    }

    /// Stores texture coordinates as normalized `i16` instead of half floats.
    #[must_use]
    pub fn snorm_uvs(mut self) -> Self {
        self.snorm_uvs = true;
        self
    }

    /// Interleaves attributes instead of storing one array per attribute.
    #[must_use]
    pub fn interleaved(mut self) -> Self {
        self.interleaved = true;
        self
    }

    /// Sets the index stream and its on-disk width. Values that do not fit
    /// a 16-bit index are truncated.
    #[must_use]
    pub fn with_indices(mut self, indices: Vec<u32>, index_type: IndexType) -> Self {
        self.indices = indices;
        self.index_type = index_type;
        self
    }

    /// Appends a part drawing `index_count` indices from `offset`.
    #[must_use]
    pub fn with_part(mut self, material: impl Into<String>, offset: u32, index_count: u32) -> Self {
        self.parts.push(PartSpec {
            material: material.into(),
            offset,
            index_count,
        });
        self
    }

    /// Appends a morph target; one position delta per vertex.
    #[must_use]
    pub fn with_morph_target(mut self, deltas: Vec<[f32; 3]>) -> Self {
        self.morph_targets.push(deltas);
        self
    }

    /// Rebuilds a writer from a decoded mesh, so it can be edited and
    /// encoded again.
    #[must_use]
    pub fn from_decoded(mesh: &DecodedMesh) -> Self {
        let vertices = mesh.vertices();
        let count = vertices.vertex_count();
        let column = |semantic: AttributeSemantic| -> Option<Vec<[f32; 4]>> {
            vertices
                .layout()
                .has(semantic)
                .then(|| (0..count).filter_map(|v| vertices.attribute(semantic, v)).collect())
        };
        let uv = |semantic: AttributeSemantic| -> Option<Vec<[f32; 2]>> {
            column(semantic).map(|c| c.iter().map(|a| [a[0], a[1]]).collect())
        };

        let header = mesh.header();
        let parts = mesh
            .parts()
            .iter()
            .map(|p| PartSpec {
                material: p.material_name.clone(),
                offset: p.offset,
                index_count: p.index_count,
            })
            .collect();
        let morph_targets = mesh
            .morph_targets()
            .map(|m| (0..m.target_count()).filter_map(|t| m.target(t)).map(<[_]>::to_vec).collect())
            .unwrap_or_default();

        Self {
            positions: vertices.positions(),
            tangents: column(AttributeSemantic::Tangents),
            colors: vertices.layout().has(AttributeSemantic::Color).then(|| {
                (0..count)
                    .filter_map(|v| vertices.attribute_bytes(AttributeSemantic::Color, v))
                    .map(|b| [b[0], b[1], b[2], b[3]])
                    .collect()
            }),
            uv0: uv(AttributeSemantic::Uv0),
            uv1: uv(AttributeSemantic::Uv1),
            snorm_uvs: header.flags.contains(MeshFlags::TEXCOORD_SNORM16),
            interleaved: header.flags.contains(MeshFlags::INTERLEAVED),
            indices: mesh.indices().iter().collect(),
            index_type: header.index_type,
            parts,
            morph_targets,
        }
    }

    fn columns(&self) -> Vec<Column> {
        let half = |values: &[f32]| -> Vec<u8> {
            values.iter().flat_map(|&v| f16::from_f32(v).to_le_bytes()).collect()
        };
        let snorm = |values: &[f32]| -> Vec<u8> {
            values.iter().flat_map(|&v| f32_to_snorm16(v).to_le_bytes()).collect()
        };
        let uv_column = |semantic, uvs: &Vec<[f32; 2]>| Column {
            semantic,
            size: 4,
            elements: uvs
                .iter()
                .map(|uv| if self.snorm_uvs { snorm(uv) } else { half(uv) })
                .collect(),
        };

        let mut columns = vec![Column {
            semantic: AttributeSemantic::Position,
            size: 8,
            elements: self.positions.iter().map(|p| half(&[p[0], p[1], p[2], 1.0])).collect(),
        }];
        if let Some(tangents) = &self.tangents {
            columns.push(Column {
                semantic: AttributeSemantic::Tangents,
                size: 8,
                elements: tangents.iter().map(|q| snorm(q)).collect(),
            });
        }
        if let Some(colors) = &self.colors {
            columns.push(Column {
                semantic: AttributeSemantic::Color,
                size: 4,
                elements: colors.iter().map(|c| c.to_vec()).collect(),
            });
        }
        if let Some(uvs) = &self.uv0 {
            columns.push(uv_column(AttributeSemantic::Uv0, uvs));
        }
        if let Some(uvs) = &self.uv1 {
            columns.push(uv_column(AttributeSemantic::Uv1, uvs));
        }
        columns
    }

    /// Encodes the mesh.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let vertex_count = self.positions.len() as u32;
        let columns = self.columns();

        // (offset, stride) per column.
        let vertex_stride: u32 = columns.iter().map(|c| c.size).sum();
        let mut placement = Vec::with_capacity(columns.len());
        let mut cursor = 0u32;
        for column in &columns {
            if self.interleaved {
                placement.push((cursor, vertex_stride));
                cursor += column.size;
            } else {
                placement.push((cursor, column.size));
                cursor += column.size * vertex_count;
            }
        }
        let vertex_size = vertex_stride * vertex_count;

        let mut vertex_block = vec![0u8; vertex_size as usize];
        for (column, &(offset, stride)) in columns.iter().zip(&placement) {
            for (v, element) in column.elements.iter().enumerate().take(vertex_count as usize) {
                let start = (offset + stride * v as u32) as usize;
                vertex_block[start..start + element.len()].copy_from_slice(element);
            }
        }

        let index_block: Vec<u8> = match self.index_type {
            IndexType::U16 => self.indices.iter().flat_map(|&i| (i as u16).to_le_bytes()).collect(),
            IndexType::U32 => self.indices.iter().flat_map(|&i| i.to_le_bytes()).collect(),
        };

        let mut flags = MeshFlags::empty();
        flags.set(MeshFlags::INTERLEAVED, self.interleaved);
        flags.set(MeshFlags::TEXCOORD_SNORM16, self.snorm_uvs);
        flags.set(MeshFlags::MORPH_TARGETS, !self.morph_targets.is_empty());

        let bounds = Aabb::from_points(&self.positions);
        let mut header = RawHeader {
            version: VERSION,
            parts: self.parts.len() as u32,
            aabb_center: bounds.center(),
            aabb_half_extent: bounds.half_extent(),
            flags: flags.bits(),
            vertex_count,
            vertex_size,
            index_type: self.index_type.raw(),
            index_count: self.indices.len() as u32,
            index_size: index_block.len() as u32,
            ..RawHeader::zeroed()
        };
        let slots = [
            (AttributeSemantic::Position, &mut header.offset_position, &mut header.stride_position),
            (AttributeSemantic::Tangents, &mut header.offset_tangents, &mut header.stride_tangents),
            (AttributeSemantic::Color, &mut header.offset_color, &mut header.stride_color),
            (AttributeSemantic::Uv0, &mut header.offset_uv0, &mut header.stride_uv0),
            (AttributeSemantic::Uv1, &mut header.offset_uv1, &mut header.stride_uv1),
        ];
        for (semantic, offset, stride) in slots {
            let found = columns.iter().position(|c| c.semantic == semantic);
            match found.map(|i| placement[i]) {
                Some((o, s)) => {
                    *offset = o;
                    *stride = s;
                }
                None => {
                    *offset = ABSENT_ATTRIBUTE;
                    *stride = 0;
                }
            }
        }

        let mut materials: Vec<&str> = Vec::new();
        let mut out = Vec::with_capacity(
            MAGIC.len() + std::mem::size_of::<RawHeader>() + vertex_block.len() + index_block.len(),
        );
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(bytemuck::bytes_of(&swap_le(header)));
        out.extend_from_slice(&vertex_block);
        out.extend_from_slice(&index_block);

        for part in &self.parts {
            let material_id = match materials.iter().position(|m| *m == part.material) {
                Some(id) => id,
                None => {
                    materials.push(&part.material);
                    materials.len() - 1
                }
            };
            let raw = self.raw_part(part, material_id as u32);
            out.extend_from_slice(bytemuck::bytes_of(&swap_le(raw)));
        }

        out.extend_from_slice(&(materials.len() as u32).to_le_bytes());
        for name in materials {
            out.extend_from_slice(&(name.len() as u32).to_le_bytes());
            out.extend_from_slice(name.as_bytes());
            out.push(0);
        }

        if !self.morph_targets.is_empty() {
            out.extend_from_slice(&(self.morph_targets.len() as u32).to_le_bytes());
            for delta in self.morph_targets.iter().flatten() {
                for component in delta {
                    out.extend_from_slice(&component.to_le_bytes());
                }
            }
        }
        out
    }

    fn raw_part(&self, part: &PartSpec, material_id: u32) -> RawPart {
        let start = part.offset as usize;
        let end = start.saturating_add(part.index_count as usize);
        let range = self.indices.get(start..end).unwrap_or(&[]);

        let min_index = range.iter().copied().min().unwrap_or(0);
        let max_index = range.iter().copied().max().unwrap_or(0);
        let points: Vec<[f32; 3]> = range
            .iter()
            .filter_map(|&i| self.positions.get(i as usize).copied())
            .collect();
        let bounds = Aabb::from_points(&points);

        RawPart {
            offset: part.offset,
            index_count: part.index_count,
            min_index,
            max_index,
            material_id,
            aabb_center: bounds.center(),
            aabb_half_extent: bounds.half_extent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{decode_bytes, HEADER_SIZE, PART_SIZE};

    fn quad() -> MeshWriter {
        MeshWriter::new(vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ])
        .with_indices(vec![0, 1, 2, 0, 2, 3], IndexType::U32)
        .with_part("Wood", 0, 3)
        .with_part("Stone", 3, 3)
    }

    #[test]
    fn test_encoded_length() {
        let bytes = quad().encode();
        let materials = 4 + (4 + 4 + 1) + (4 + 5 + 1);
        assert_eq!(bytes.len(), HEADER_SIZE + 4 * 8 + 6 * 4 + 2 * PART_SIZE + materials);
        assert_eq!(&bytes[..8], b"FILAMESH");
    }

    #[test]
    fn test_material_table_is_unique() {
        let bytes = quad().with_part("Wood", 0, 6).encode();
        let mesh = decode_bytes(&bytes).unwrap();
        assert_eq!(mesh.material_names(), ["Wood".to_string(), "Stone".to_string()]);
        assert_eq!(mesh.parts()[2].material_name, "Wood");
    }

    #[test]
    fn test_part_ranges_and_bounds() {
        let mesh = decode_bytes(&quad().encode()).unwrap();
        let stone = &mesh.parts()[1];
        assert_eq!((stone.min_index, stone.max_index), (0, 3));
        assert_eq!(stone.bounds.min, [0.0, 0.0, 0.0]);
        assert_eq!(stone.bounds.max, [1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_interleaved_attributes_roundtrip() {
        let writer = quad()
            .with_colors(vec![[255, 0, 0, 255]; 4])
            .with_uv0(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]])
            .interleaved();
        let mesh = decode_bytes(&writer.encode()).unwrap();
        assert!(mesh.header().flags.contains(MeshFlags::INTERLEAVED));
        let uv = mesh.vertices().attribute(AttributeSemantic::Uv0, 2).unwrap();
        assert_eq!([uv[0], uv[1]], [1.0, 1.0]);
        let color = mesh.vertices().attribute(AttributeSemantic::Color, 3).unwrap();
        assert_eq!(color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(MeshWriter::from_decoded(&mesh), writer);
    }

    #[test]
    fn test_snorm_uvs() {
        let writer = quad().with_uv0(vec![[0.5, -1.0]; 4]).snorm_uvs();
        let mesh = decode_bytes(&writer.encode()).unwrap();
        let uv = mesh.vertices().attribute(AttributeSemantic::Uv0, 0).unwrap();
        assert!((uv[0] - 0.5).abs() < 1e-4);
        assert_eq!(uv[1], -1.0);
    }

    #[test]
    fn test_half_positions_round_ties_to_even() {
        let ulp = 2.0f32.powi(-10);
        let bytes = MeshWriter::new(vec![
            [1.0 + ulp / 2.0, 0.0, 0.0],
            [1.0 + 3.0 * ulp / 2.0, 0.0, 0.0],
            [1.0 + ulp / 4.0, 0.0, 0.0],
        ])
        .with_indices(vec![0, 1, 2], IndexType::U16)
        .with_part("Wood", 0, 3)
        .encode();
        let mesh = decode_bytes(&bytes).unwrap();
        // Halfway cases go to the even mantissa, one below and one above.
        assert_eq!(mesh.vertices().position(0).unwrap()[0], 1.0);
        assert_eq!(mesh.vertices().position(1).unwrap()[0], 1.0 + 2.0 * ulp);
        assert_eq!(mesh.vertices().position(2).unwrap()[0], 1.0);
    }

    #[test]
    fn test_reencode_is_stable() {
        let bytes = quad()
            .with_tangents(vec![[0.0, 0.0, 0.0, 1.0]; 4])
            .with_morph_target(vec![[0.25, 0.0, 0.0]; 4])
            .encode();
        let mesh = decode_bytes(&bytes).unwrap();
        assert_eq!(MeshWriter::from_decoded(&mesh).encode(), bytes);
    }
}
