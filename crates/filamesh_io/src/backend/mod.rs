//! # Graphics Backend Boundary
//!
//! The assembler never talks to a GPU directly. Everything that allocates
//! device memory or creates scene objects goes through [`GraphicsBackend`]:
//!
//! ```text
//! MeshAssembler
//!   ├── create_vertex_buffer(&VertexBufferDesc)   once per mesh
//!   ├── create_index_buffer(&IndexBufferDesc)     once per mesh
//!   ├── create_entity(&RenderableDesc)            once per instance
//!   ├── bind_material(&Material)                  once per part per instance
//!   └── destroy_entity(Entity)                    cleanup / teardown
//! ```
//!
//! [`HeadlessBackend`] implements the trait on the CPU for tools, tests and
//! benchmarks.

mod headless;

pub use headless::{EntityId, HeadlessBackend, HeadlessIndexBuffer, HeadlessVertexBuffer, MaterialBinding};

use crate::error::BackendError;
use crate::mesh::{Aabb, IndexType, VertexLayout};

/// Everything needed to create a vertex buffer.
#[derive(Debug, Clone, Copy)]
pub struct VertexBufferDesc<'a> {
    /// Attribute layout of `data`.
    pub layout: &'a VertexLayout,
    /// Number of vertices.
    pub vertex_count: u32,
    /// Raw vertex block.
    pub data: &'a [u8],
}

/// Everything needed to create an index buffer.
#[derive(Debug, Clone, Copy)]
pub struct IndexBufferDesc<'a> {
    /// Index width.
    pub index_type: IndexType,
    /// Number of indices.
    pub index_count: u32,
    /// Raw index block in native byte order.
    pub data: &'a [u8],
}

/// Everything needed to create one renderable entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderableDesc {
    /// Position of the instance in its assembled mesh.
    pub instance: usize,
    /// Number of primitives (parts) the entity will draw.
    pub primitive_count: usize,
    /// Mesh bounds, for culling.
    pub bounds: Aabb,
}

/// Device and scene operations required to assemble meshes.
///
/// Buffer handles are shared by every instance of a mesh and are released
/// when the last instance drops them. Entities must be destroyed explicitly.
pub trait GraphicsBackend {
    /// Vertex buffer handle.
    type VertexBuffer;
    /// Index buffer handle.
    type IndexBuffer;
    /// Renderable entity handle.
    type Entity;
    /// Material-instance handle, as stored in a
    /// [`MaterialRegistry`](crate::registry::MaterialRegistry).
    type Material: Clone;
    /// Per-instance binding of a material to one primitive.
    type MaterialBinding;

    /// Allocates and fills a vertex buffer.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::BufferAllocation`] if the buffer cannot be
    /// created.
    fn create_vertex_buffer(&mut self, desc: &VertexBufferDesc<'_>) -> Result<Self::VertexBuffer, BackendError>;

    /// Allocates and fills an index buffer.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::BufferAllocation`] if the buffer cannot be
    /// created.
    fn create_index_buffer(&mut self, desc: &IndexBufferDesc<'_>) -> Result<Self::IndexBuffer, BackendError>;

    /// Creates a renderable entity.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::EntityCreation`] if no entity can be created.
    fn create_entity(&mut self, desc: &RenderableDesc) -> Result<Self::Entity, BackendError>;

    /// Creates a binding of `material` for one primitive of one instance.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::MaterialBinding`] if the material cannot be
    /// bound.
    fn bind_material(&mut self, material: &Self::Material) -> Result<Self::MaterialBinding, BackendError>;

    /// Destroys an entity created by this backend.
    fn destroy_entity(&mut self, entity: Self::Entity);
}
