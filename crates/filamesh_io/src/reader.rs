//! # One-Call Loading
//!
//! Decode, release and assemble in a single call, for callers that do not
//! need the intermediate [`DecodedMesh`](crate::mesh::DecodedMesh).
//!
//! ```rust,ignore
//! let bytes = std::fs::read("helmet.filamesh")?;
//! let mut assembler = MeshAssembler::with_defaults(HeadlessBackend::new());
//! let mesh = load_mesh_from_buffer(&mut assembler, SourceBuffer::new(&bytes), &registry, 1)?;
//! ```

use crate::assembler::{AssembledMesh, MaterialSource, MeshAssembler};
use crate::backend::GraphicsBackend;
use crate::buffer::SourceBuffer;
use crate::error::LoadError;
use crate::format::decode;
use crate::registry::MaterialRegistry;

/// Decodes `buffer` and assembles it with materials from `registry`.
///
/// The buffer is released once decoding finishes, before assembly starts,
/// whether or not decoding succeeded.
///
/// # Errors
///
/// Returns [`LoadError::Decode`] or [`LoadError::Assemble`].
pub fn load_mesh_from_buffer<B: GraphicsBackend>(
    assembler: &mut MeshAssembler<B>,
    buffer: SourceBuffer<'_>,
    registry: &MaterialRegistry<B::Material>,
    instance_count: usize,
) -> Result<AssembledMesh<B>, LoadError> {
    let mesh = decode(buffer)?;
    Ok(assembler.assemble(&mesh, MaterialSource::registry(registry), instance_count)?)
}

/// Decodes `buffer` and binds every part to `material`.
///
/// # Errors
///
/// Returns [`LoadError::Decode`] or [`LoadError::Assemble`].
pub fn load_mesh_with_material<B: GraphicsBackend>(
    assembler: &mut MeshAssembler<B>,
    buffer: SourceBuffer<'_>,
    material: B::Material,
    instance_count: usize,
) -> Result<AssembledMesh<B>, LoadError> {
    let mesh = decode(buffer)?;
    Ok(assembler.assemble(&mesh, MaterialSource::Default(material), instance_count)?)
}
