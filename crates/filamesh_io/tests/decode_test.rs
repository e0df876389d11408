//! Integration tests for filamesh decoding and source buffer release.

use filamesh_io::format::{HEADER_SIZE, PART_SIZE};
use filamesh_io::{
    decode, decode_bytes, decode_deferred, AttributeSemantic, DecodeError, IndexType, MeshFlags, MeshWriter,
    SourceBuffer,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Byte offset of the flags word.
const FLAGS_OFFSET: usize = 40;
/// Byte offset of the index type word.
const INDEX_TYPE_OFFSET: usize = 92;

fn cube_corners() -> Vec<[f32; 3]> {
    let mut points = Vec::new();
    for z in [-1.0, 1.0] {
        for y in [-1.0, 1.0] {
            for x in [-1.0, 1.0] {
                points.push([x, y, z]);
            }
        }
    }
    points
}

fn cube_writer() -> MeshWriter {
    // Two faces, one per material.
    MeshWriter::new(cube_corners())
        .with_uv0(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]])
        .with_indices(vec![0, 1, 3, 0, 3, 2, 4, 6, 7, 4, 7, 5], IndexType::U16)
        .with_part("Wood", 0, 6)
        .with_part("Stone", 6, 6)
}

fn counted(bytes: &[u8]) -> (SourceBuffer<'_>, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    let buffer = SourceBuffer::with_release(bytes, move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    (buffer, count)
}

fn set_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[test]
fn test_decoded_indices_are_in_range() {
    let mesh = decode_bytes(&cube_writer().encode()).unwrap();
    let vertex_count = mesh.header().vertex_count;
    assert_eq!(vertex_count, 8);
    assert_eq!(mesh.indices().len(), 12);
    assert!(mesh.indices().iter().all(|i| i < vertex_count));
    assert_eq!(mesh.bounds().min, [-1.0, -1.0, -1.0]);
    assert_eq!(mesh.bounds().max, [1.0, 1.0, 1.0]);
}

#[test]
fn test_parts_keep_file_order() {
    let mesh = decode_bytes(&cube_writer().encode()).unwrap();
    let names: Vec<_> = mesh.parts().iter().map(|p| p.material_name.as_str()).collect();
    assert_eq!(names, ["Wood", "Stone"]);
    assert_eq!(mesh.parts()[1].offset, 6);
    assert_eq!(mesh.parts()[1].min_index, 4);
    assert_eq!(mesh.parts()[1].max_index, 7);
}

#[test]
fn test_every_truncation_fails_cleanly() {
    let bytes = cube_writer().with_morph_target(vec![[0.0, 0.5, 0.0]; 8]).encode();
    for len in 0..bytes.len() {
        match decode_bytes(&bytes[..len]) {
            Err(DecodeError::TruncatedBuffer { required, available }) => {
                assert_eq!(available, len);
                assert!(required > len, "length {len}: required {required}");
            }
            other => panic!("length {len}: expected TruncatedBuffer, got {other:?}"),
        }
    }
    assert!(decode_bytes(&bytes).is_ok());
}

#[test]
fn test_oversized_header_counts_are_truncation() {
    let mut bytes = cube_writer().encode();
    // vertex block size
    set_u32(&mut bytes, 88, u32::MAX);
    assert!(matches!(
        decode_bytes(&bytes),
        Err(DecodeError::TruncatedBuffer { .. })
    ));
}

#[test]
fn test_corrupt_magic() {
    let mut bytes = cube_writer().encode();
    bytes[..8].copy_from_slice(b"GLTFMESH");
    assert!(matches!(decode_bytes(&bytes), Err(DecodeError::InvalidFormat(_))));
}

#[test]
fn test_zero_version() {
    let mut bytes = cube_writer().encode();
    set_u32(&mut bytes, 8, 0);
    assert!(matches!(decode_bytes(&bytes), Err(DecodeError::InvalidFormat(_))));
}

#[test]
fn test_unknown_flags_and_index_type() {
    let mut bytes = cube_writer().encode();
    set_u32(&mut bytes, FLAGS_OFFSET, 0x40);
    assert!(matches!(decode_bytes(&bytes), Err(DecodeError::UnsupportedLayout(_))));

    let mut bytes = cube_writer().encode();
    set_u32(&mut bytes, INDEX_TYPE_OFFSET, 7);
    assert!(matches!(decode_bytes(&bytes), Err(DecodeError::UnsupportedLayout(_))));
}

#[test]
fn test_missing_position_is_unsupported() {
    let mut bytes = cube_writer().encode();
    // position offset
    set_u32(&mut bytes, 44, u32::MAX);
    assert!(matches!(decode_bytes(&bytes), Err(DecodeError::UnsupportedLayout(_))));
}

#[test]
fn test_out_of_range_index() {
    let bytes = MeshWriter::new(vec![[0.0; 3]; 3])
        .with_indices(vec![0, 1, 2, 2, 1, 3], IndexType::U32)
        .with_part("", 0, 3)
        .encode();
    assert_eq!(
        decode_bytes(&bytes).unwrap_err(),
        DecodeError::CorruptIndexData { position: 5, index: 3, vertex_count: 3 }
    );
}

#[test]
fn test_part_outside_index_stream() {
    let bytes = MeshWriter::new(vec![[0.0; 3]; 3])
        .with_indices(vec![0, 1, 2], IndexType::U16)
        .with_part("Wood", 0, 3)
        .with_part("Stone", 2, 3)
        .encode();
    assert!(matches!(
        decode_bytes(&bytes),
        Err(DecodeError::CorruptPartTable { part: 1, .. })
    ));
}

#[test]
fn test_part_material_id_outside_table() {
    let mut bytes = cube_writer().encode();
    let vertex_size = 8 * (8 + 4);
    let index_size = 12 * 2;
    let second_part = HEADER_SIZE + vertex_size + index_size + PART_SIZE;
    // material id of the second part
    set_u32(&mut bytes, second_part + 16, 9);
    assert!(matches!(
        decode_bytes(&bytes),
        Err(DecodeError::CorruptPartTable { part: 1, .. })
    ));
}

#[test]
fn test_material_name_without_terminator() {
    let mut bytes = cube_writer().encode();
    // Last byte is the NUL after "Stone".
    let last = bytes.len() - 1;
    bytes[last] = b'!';
    assert!(matches!(decode_bytes(&bytes), Err(DecodeError::InvalidFormat(_))));
}

#[test]
fn test_empty_material_name_is_legal() {
    let bytes = MeshWriter::new(vec![[0.0; 3]; 3])
        .with_indices(vec![0, 1, 2], IndexType::U16)
        .with_part("", 0, 3)
        .encode();
    let mesh = decode_bytes(&bytes).unwrap();
    assert_eq!(mesh.parts()[0].material_name, "");
}

#[test]
fn test_trailing_bytes_are_ignored() {
    let mut bytes = cube_writer().encode();
    bytes.extend_from_slice(&[0xAB; 16]);
    assert_eq!(decode_bytes(&bytes).unwrap().parts().len(), 2);
}

#[test]
fn test_morph_targets_decode() {
    let bytes = cube_writer()
        .with_morph_target(vec![[0.0, 0.5, 0.0]; 8])
        .with_morph_target(vec![[0.25, 0.0, -1.0]; 8])
        .encode();
    let mesh = decode_bytes(&bytes).unwrap();
    assert!(mesh.header().flags.contains(MeshFlags::MORPH_TARGETS));
    let morph = mesh.morph_targets().unwrap();
    assert_eq!(morph.target_count(), 2);
    assert_eq!(morph.target(1).unwrap()[7], [0.25, 0.0, -1.0]);
}

#[test]
fn test_tangents_and_colors() {
    let bytes = cube_writer()
        .with_tangents(vec![[0.0, 0.0, 0.0, 1.0]; 8])
        .with_colors(vec![[0, 128, 255, 255]; 8])
        .encode();
    let mesh = decode_bytes(&bytes).unwrap();
    let tangent = mesh.vertices().attribute(AttributeSemantic::Tangents, 3).unwrap();
    assert_eq!(tangent, [0.0, 0.0, 0.0, 1.0]);
    let color = mesh.vertices().attribute(AttributeSemantic::Color, 0).unwrap();
    assert_eq!(color[2], 1.0);
    assert!(!mesh.vertices().layout().has(AttributeSemantic::Uv1));
}

#[test]
fn test_release_fires_once_on_success() {
    let bytes = cube_writer().encode();
    let (buffer, count) = counted(&bytes);
    assert!(decode(buffer).is_ok());
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_release_fires_once_on_failure() {
    let mut bytes = cube_writer().encode();
    bytes[0] = 0;
    let (buffer, count) = counted(&bytes);
    assert!(decode(buffer).is_err());
    assert_eq!(count.load(Ordering::SeqCst), 1);

    let (buffer, count) = counted(&bytes[..3]);
    assert!(decode(buffer).is_err());
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_release_without_callback() {
    let bytes = cube_writer().encode();
    assert!(decode(SourceBuffer::new(&bytes)).is_ok());
    assert!(decode(SourceBuffer::new(&[])).is_err());
}

#[test]
fn test_deferred_release() {
    let bytes = cube_writer().encode();
    let (buffer, count) = counted(&bytes);
    let deferred = decode_deferred(buffer);
    assert!(deferred.result.is_ok());
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert!(deferred.release.is_armed());

    drop(deferred);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_token_callback() {
    let bytes = cube_writer().encode();
    let released_len = Arc::new(AtomicUsize::new(0));
    let buffer = SourceBuffer::with_token(&bytes, Arc::clone(&released_len), |data, token| {
        token.store(data.len(), Ordering::SeqCst);
    });
    decode(buffer).unwrap();
    assert_eq!(released_len.load(Ordering::SeqCst), bytes.len());
}
