//! # Filamesh IO
//!
//! Decoder and material binding for the filamesh binary mesh format.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  SourceBuffer (bytes + release callback)                     │
//! │       ↓ decode                                               │
//! │  DecodedMesh (owned: header, vertices, indices, parts)       │
//! │       ↓ MeshAssembler::assemble + MaterialRegistry           │
//! │  AssembledMesh (shared buffers, N entities, bound materials) │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//!
//! - Untrusted input never panics; every violation is a typed error
//! - The source buffer is released exactly once, on every path
//! - No GPU dependency: devices sit behind [`GraphicsBackend`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use filamesh_io::{decode, HeadlessBackend, MaterialRegistry, MaterialSource, MeshAssembler, SourceBuffer};
//!
//! let mesh = decode(SourceBuffer::new(&bytes))?;
//!
//! let mut registry = MaterialRegistry::new();
//! registry.register("Wood", wood);
//!
//! let mut assembler = MeshAssembler::with_defaults(HeadlessBackend::new());
//! let assembled = assembler.assemble(
//!     &mesh,
//!     MaterialSource::registry_with_fallback(&registry, plain),
//!     4,
//! )?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod assembler;
pub mod backend;
pub mod buffer;
pub mod config;
pub mod error;
pub mod format;
pub mod mesh;
pub mod reader;
pub mod registry;

pub use assembler::{
    AssembledMesh, BoundPrimitive, MaterialSource, MeshAssembler, MeshInstance, RenderableInstances,
    Resolution,
};
pub use backend::{
    EntityId, GraphicsBackend, HeadlessBackend, IndexBufferDesc, RenderableDesc, VertexBufferDesc,
};
pub use buffer::{PendingRelease, SourceBuffer};
pub use config::AssemblerConfig;
pub use error::{AssembleError, AssembleResult, BackendError, ConfigError, DecodeError, DecodeResult, LoadError};
pub use format::{decode, decode_bytes, decode_deferred, DeferredDecode, MeshWriter, PartSpec};
pub use mesh::{
    Aabb, AttributeFormat, AttributeSemantic, DecodedMesh, IndexStream, IndexType, MeshFlags, MeshHeader,
    MorphTargets, PartDescriptor, VertexAttribute, VertexLayout, VertexStream,
};
pub use reader::{load_mesh_from_buffer, load_mesh_with_material};
pub use registry::{MaterialRegistry, DEFAULT_MATERIAL_NAME};
