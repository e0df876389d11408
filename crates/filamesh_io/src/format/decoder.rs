//! Filamesh decoder.
//!
//! Validation runs in a fixed order so that cheap header checks reject bad
//! input before anything is allocated:
//!
//! 1. magic, then version
//! 2. declared sizes against the buffer length
//! 3. flags and attribute layout
//! 4. vertex block copy, index validation
//! 5. part table, material names, morph targets

use tracing::{debug, warn};

use crate::buffer::{PendingRelease, SourceBuffer};
use crate::error::{DecodeError, DecodeResult};
use crate::mesh::{
    Aabb, AttributeFormat, AttributeSemantic, DecodedMesh, IndexStream, IndexType, MeshFlags,
    MeshHeader, MorphTargets, PartDescriptor, VertexAttribute, VertexLayout, VertexStream,
};

use super::reader::ByteReader;
use super::{RawHeader, RawPart, ABSENT_ATTRIBUTE, HEADER_SIZE, MAGIC, PART_SIZE, VERSION};

/// Decodes a filamesh buffer, releasing it once its bytes have been read.
///
/// The release callback fires before this function returns, on success and
/// on every error path.
///
/// # Errors
///
/// Returns a [`DecodeError`] describing the first violation found; no
/// partial mesh is ever returned.
pub fn decode(buffer: SourceBuffer<'_>) -> DecodeResult<DecodedMesh> {
    let result = decode_bytes(buffer.bytes());
    buffer.release();
    result
}

/// Decodes raw bytes that need no release notification.
///
/// # Errors
///
/// See [`decode`].
pub fn decode_bytes(bytes: &[u8]) -> DecodeResult<DecodedMesh> {
    let result = decode_inner(bytes);
    match &result {
        Ok(mesh) => debug!(
            vertices = mesh.header.vertex_count,
            indices = mesh.header.index_count,
            parts = mesh.parts.len(),
            materials = mesh.materials.len(),
            flags = mesh.header.flags.bits(),
            "decoded filamesh"
        ),
        Err(err) => warn!(len = bytes.len(), error = %err, "rejected filamesh buffer"),
    }
    result
}

/// Result of [`decode_deferred`]: the decoded mesh (or error) plus the
/// still-armed release of the source buffer.
#[derive(Debug)]
pub struct DeferredDecode<'a> {
    /// Decode outcome.
    pub result: DecodeResult<DecodedMesh>,
    /// Release to fire once the external resource manager is done.
    pub release: PendingRelease<'a>,
}

/// Decodes a buffer but leaves its release to the caller.
///
/// Decoding copies everything it keeps, so the returned
/// [`PendingRelease`] may fire at any time; this only exists for resource
/// managers that tie the source memory to a later event, such as an upload
/// completing.
#[must_use]
pub fn decode_deferred(buffer: SourceBuffer<'_>) -> DeferredDecode<'_> {
    let result = decode_bytes(buffer.bytes());
    DeferredDecode {
        result,
        release: buffer.defer(),
    }
}

fn decode_inner(bytes: &[u8]) -> DecodeResult<DecodedMesh> {
    let mut reader = ByteReader::new(bytes);

    // 1. Magic and version, before anything else is read. A short buffer
    // is only truncated if what it holds is a prefix of the magic.
    let seen = &bytes[..bytes.len().min(MAGIC.len())];
    if !MAGIC.starts_with(seen) {
        return Err(DecodeError::InvalidFormat(format!(
            "expected magic 'FILAMESH', got '{}'",
            String::from_utf8_lossy(seen)
        )));
    }
    reader.take(MAGIC.len())?;
    let version = reader.peek_u32()?;
    if version == 0 || version > VERSION {
        return Err(DecodeError::InvalidFormat(format!(
            "unsupported version {version} (supported: 1..={VERSION})"
        )));
    }
    let raw: RawHeader = reader.read_record()?;

    // 2. Fixed-size sections must fit in the buffer.
    check_declared_length(&raw, bytes.len())?;

    // 3. Flags and layout.
    let flags = parse_flags(raw.flags)?;
    let index_type = IndexType::from_raw(raw.index_type).ok_or_else(|| {
        DecodeError::UnsupportedLayout(format!("unknown index type {}", raw.index_type))
    })?;
    let layout = parse_layout(&raw, flags)?;
    let index_bytes = u64::from(raw.index_count) * index_type.width() as u64;
    if index_bytes > u64::from(raw.index_size) {
        return Err(DecodeError::UnsupportedLayout(format!(
            "{} indices of {} bytes do not fit in an index block of {} bytes",
            raw.index_count,
            index_type.width(),
            raw.index_size
        )));
    }

    // 4. Geometry.
    let vertex_data = reader.take_u64(u64::from(raw.vertex_size))?.to_vec();
    let index_block = reader.take_u64(u64::from(raw.index_size))?;
    let indices = parse_indices(
        &index_block[..index_bytes as usize],
        index_type,
        raw.vertex_count,
    )?;

    // 5. Parts, names, morph targets.
    let mut raw_parts = Vec::with_capacity(raw.parts as usize);
    for _ in 0..raw.parts {
        raw_parts.push(reader.read_record::<RawPart>()?);
    }
    let materials = read_material_names(&mut reader)?;
    let parts = build_parts(&raw_parts, &materials, raw.index_count, raw.vertex_count)?;

    let morph_targets = if flags.contains(MeshFlags::MORPH_TARGETS) {
        Some(read_morph_targets(&mut reader, raw.vertex_count)?)
    } else {
        None
    };

    if reader.remaining() > 0 {
        debug!(
            consumed = reader.position(),
            trailing = reader.remaining(),
            "ignoring trailing bytes after filamesh data"
        );
    }

    let header = MeshHeader {
        version: raw.version,
        vertex_count: raw.vertex_count,
        index_count: raw.index_count,
        part_count: raw.parts,
        bounds: Aabb::from_center_half_extent(raw.aabb_center, raw.aabb_half_extent),
        flags,
        index_type,
        vertex_block_size: raw.vertex_size,
        index_block_size: raw.index_size,
    };

    Ok(DecodedMesh {
        header,
        vertices: VertexStream::new(layout, vertex_data, raw.vertex_count),
        indices,
        parts,
        materials,
        morph_targets,
    })
}

/// Header, vertex block, index block, part table and the material count
/// word. Variable-length sections are checked as they are read.
fn check_declared_length(raw: &RawHeader, available: usize) -> DecodeResult<()> {
    let required = HEADER_SIZE as u64
        + u64::from(raw.vertex_size)
        + u64::from(raw.index_size)
        + u64::from(raw.parts) * PART_SIZE as u64
        + 4;
    if required > available as u64 {
        return Err(DecodeError::TruncatedBuffer {
            required: usize::try_from(required).unwrap_or(usize::MAX),
            available,
        });
    }
    Ok(())
}

fn parse_flags(bits: u32) -> DecodeResult<MeshFlags> {
    let flags = MeshFlags::from_bits(bits).ok_or_else(|| {
        DecodeError::UnsupportedLayout(format!("unknown flag bits {:#x}", bits & !MeshFlags::all().bits()))
    })?;
    if flags.contains(MeshFlags::COMPRESSION) {
        return Err(DecodeError::UnsupportedLayout(
            "compressed vertex/index blocks are not supported".to_string(),
        ));
    }
    debug_assert!(MeshFlags::SUPPORTED.contains(flags));
    Ok(flags)
}

fn parse_layout(raw: &RawHeader, flags: MeshFlags) -> DecodeResult<VertexLayout> {
    let uv_format = if flags.contains(MeshFlags::TEXCOORD_SNORM16) {
        AttributeFormat::Short2Norm
    } else {
        AttributeFormat::Half2
    };
    let candidates = [
        (AttributeSemantic::Position, AttributeFormat::Half4, raw.offset_position, raw.stride_position),
        (AttributeSemantic::Tangents, AttributeFormat::Short4Norm, raw.offset_tangents, raw.stride_tangents),
        (AttributeSemantic::Color, AttributeFormat::UByte4Norm, raw.offset_color, raw.stride_color),
        (AttributeSemantic::Uv0, uv_format, raw.offset_uv0, raw.stride_uv0),
        (AttributeSemantic::Uv1, uv_format, raw.offset_uv1, raw.stride_uv1),
    ];

    let mut attributes = Vec::with_capacity(candidates.len());
    for (semantic, format, offset, stride) in candidates {
        if offset == ABSENT_ATTRIBUTE {
            continue;
        }
        if stride < format.size() {
            return Err(DecodeError::UnsupportedLayout(format!(
                "{semantic:?} stride {stride} is smaller than its {format:?} element ({} bytes)",
                format.size()
            )));
        }
        if raw.vertex_count > 0 {
            let end = u64::from(offset)
                + u64::from(stride) * u64::from(raw.vertex_count - 1)
                + u64::from(format.size());
            if end > u64::from(raw.vertex_size) {
                return Err(DecodeError::UnsupportedLayout(format!(
                    "{semantic:?} ends at byte {end}, past the {}-byte vertex block",
                    raw.vertex_size
                )));
            }
        }
        attributes.push(VertexAttribute { semantic, format, offset, stride });
    }

    if attributes.first().map(|a| a.semantic) != Some(AttributeSemantic::Position) {
        return Err(DecodeError::UnsupportedLayout(
            "vertex layout has no position attribute".to_string(),
        ));
    }
    Ok(VertexLayout::new(attributes))
}

fn parse_indices(block: &[u8], index_type: IndexType, vertex_count: u32) -> DecodeResult<IndexStream> {
    let check = |position: usize, index: u32| {
        if index < vertex_count {
            Ok(())
        } else {
            Err(DecodeError::CorruptIndexData { position, index, vertex_count })
        }
    };

    match index_type {
        IndexType::U16 => {
            let mut out = Vec::with_capacity(block.len() / 2);
            for (position, chunk) in block.chunks_exact(2).enumerate() {
                let index = u16::from_le_bytes([chunk[0], chunk[1]]);
                check(position, u32::from(index))?;
                out.push(index);
            }
            Ok(IndexStream::U16(out))
        }
        IndexType::U32 => {
            let mut out = Vec::with_capacity(block.len() / 4);
            for (position, chunk) in block.chunks_exact(4).enumerate() {
                let index = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                check(position, index)?;
                out.push(index);
            }
            Ok(IndexStream::U32(out))
        }
    }
}

fn read_material_names(reader: &mut ByteReader<'_>) -> DecodeResult<Vec<String>> {
    let count = reader.read_u32()?;
    // Each name needs at least a length word and a terminator.
    let mut names = Vec::with_capacity((count as usize).min(reader.remaining() / 5));
    for i in 0..count {
        let len = reader.read_u32()?;
        let name = reader.take_u64(u64::from(len))?;
        let terminator = reader.take(1)?;
        if terminator[0] != 0 {
            return Err(DecodeError::InvalidFormat(format!(
                "material name {i} is not NUL-terminated"
            )));
        }
        let name = String::from_utf8(name.to_vec()).map_err(|e| {
            DecodeError::InvalidFormat(format!("material name {i} is not UTF-8: {e}"))
        })?;
        names.push(name);
    }
    Ok(names)
}

fn build_parts(
    raw_parts: &[RawPart],
    materials: &[String],
    index_count: u32,
    vertex_count: u32,
) -> DecodeResult<Vec<PartDescriptor>> {
    raw_parts
        .iter()
        .enumerate()
        .map(|(part, raw)| {
            let corrupt = |reason: String| DecodeError::CorruptPartTable { part, reason };

            if u64::from(raw.offset) + u64::from(raw.index_count) > u64::from(index_count) {
                return Err(corrupt(format!(
                    "index range {}+{} exceeds {index_count} indices",
                    raw.offset, raw.index_count
                )));
            }
            if raw.index_count > 0 && (raw.min_index > raw.max_index || raw.max_index >= vertex_count) {
                return Err(corrupt(format!(
                    "vertex range {}..={} invalid for {vertex_count} vertices",
                    raw.min_index, raw.max_index
                )));
            }
            let material_name = materials
                .get(raw.material_id as usize)
                .cloned()
                .ok_or_else(|| {
                    corrupt(format!(
                        "material id {} outside a table of {} names",
                        raw.material_id,
                        materials.len()
                    ))
                })?;

            Ok(PartDescriptor {
                material_name,
                offset: raw.offset,
                index_count: raw.index_count,
                min_index: raw.min_index,
                max_index: raw.max_index,
                bounds: Aabb::from_center_half_extent(raw.aabb_center, raw.aabb_half_extent),
            })
        })
        .collect()
}

fn read_morph_targets(reader: &mut ByteReader<'_>, vertex_count: u32) -> DecodeResult<MorphTargets> {
    let target_count = reader.read_u32()?;
    let len = u64::from(target_count)
        .checked_mul(u64::from(vertex_count))
        .and_then(|n| n.checked_mul(12))
        .unwrap_or(u64::MAX);
    let block = reader.take_u64(len)?;

    let deltas = block
        .chunks_exact(12)
        .map(|c| {
            let f = |o: usize| f32::from_le_bytes([c[o], c[o + 1], c[o + 2], c[o + 3]]);
            [f(0), f(4), f(8)]
        })
        .collect();
    Ok(MorphTargets::new(target_count, vertex_count, deltas))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::MeshWriter;

    fn triangle() -> Vec<u8> {
        MeshWriter::new(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
            .with_indices(vec![0, 1, 2], IndexType::U16)
            .with_part("Wood", 0, 3)
            .encode()
    }

    #[test]
    fn test_decode_triangle() {
        let mesh = decode_bytes(&triangle()).unwrap();
        assert_eq!(mesh.header().vertex_count, 3);
        assert_eq!(mesh.header().index_count, 3);
        assert_eq!(mesh.indices().iter().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(mesh.parts().len(), 1);
        assert_eq!(mesh.parts()[0].material_name, "Wood");
        assert_eq!(mesh.vertices().position(1), Some([1.0, 0.0, 0.0]));
        assert_eq!(mesh.bounds().max, [1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_bad_magic_fails_first() {
        let mut bytes = triangle();
        bytes[0] = b'X';
        // Break the header counts too: magic must still win.
        bytes[HEADER_SIZE - 4..HEADER_SIZE].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(decode_bytes(&bytes), Err(DecodeError::InvalidFormat(_))));
    }

    #[test]
    fn test_short_foreign_buffer_is_invalid_format() {
        assert!(matches!(decode_bytes(b"glTF"), Err(DecodeError::InvalidFormat(_))));
        assert!(matches!(decode_bytes(b"X"), Err(DecodeError::InvalidFormat(_))));
        // A true prefix of the magic is still a short read.
        assert_eq!(
            decode_bytes(b"FILA").unwrap_err(),
            DecodeError::TruncatedBuffer { required: 8, available: 4 }
        );
        assert!(matches!(decode_bytes(&[]), Err(DecodeError::TruncatedBuffer { .. })));
    }

    #[test]
    fn test_future_version_rejected() {
        let mut bytes = triangle();
        bytes[8..12].copy_from_slice(&2u32.to_le_bytes());
        assert!(matches!(decode_bytes(&bytes), Err(DecodeError::InvalidFormat(_))));
    }

    #[test]
    fn test_every_truncation_is_reported() {
        let bytes = triangle();
        for len in 0..bytes.len() {
            assert!(
                matches!(decode_bytes(&bytes[..len]), Err(DecodeError::TruncatedBuffer { .. })),
                "length {len}"
            );
        }
    }

    #[test]
    fn test_compression_flag_rejected() {
        let mut bytes = triangle();
        bytes[40..44].copy_from_slice(&MeshFlags::COMPRESSION.bits().to_le_bytes());
        assert!(matches!(decode_bytes(&bytes), Err(DecodeError::UnsupportedLayout(_))));
    }

    #[test]
    fn test_parse_flags_rejects_unknown_bits() {
        assert!(parse_flags(0x100).is_err());
        assert_eq!(parse_flags(0b1011), Ok(MeshFlags::SUPPORTED));
    }

    #[test]
    fn test_parse_indices_rejects_out_of_range() {
        let block = [0, 0, 5, 0];
        assert_eq!(
            parse_indices(&block, IndexType::U16, 3),
            Err(DecodeError::CorruptIndexData { position: 1, index: 5, vertex_count: 3 })
        );
    }
}
