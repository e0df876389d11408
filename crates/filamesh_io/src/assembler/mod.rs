//! # Mesh Assembly
//!
//! Turns a [`DecodedMesh`] into renderable instances through a
//! [`GraphicsBackend`].
//!
//! ```text
//! DecodedMesh ──┬── vertex block ──► create_vertex_buffer ──┐ Arc, shared
//!               ├── index block  ──► create_index_buffer  ──┤ by every instance
//!               └── parts ─► resolve materials (all first)  │
//!                                      │                    │
//!            for each instance:  create_entity ◄────────────┘
//!                                bind_material × parts
//! ```
//!
//! ## Material resolution
//!
//! With [`MaterialSource::Registry`], each part resolves to the first of:
//!
//! 1. the registry entry named by the part (empty names never match);
//! 2. the registry entry under the configured default key
//!    (`"DefaultMaterial"` unless configured otherwise);
//! 3. the caller-supplied fallback.
//!
//! If none exists the whole call fails with
//! [`AssembleError::NoMaterialAvailable`] before the backend is touched.
//! With [`MaterialSource::Default`] every part gets the given material.

mod instances;

pub use instances::{check_instance_count, RenderableInstances};

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::backend::{GraphicsBackend, IndexBufferDesc, RenderableDesc, VertexBufferDesc};
use crate::config::AssemblerConfig;
use crate::error::{AssembleError, AssembleResult, BackendError};
use crate::mesh::{Aabb, DecodedMesh, PartDescriptor};
use crate::registry::MaterialRegistry;

/// Where part materials come from.
#[derive(Debug, Clone)]
pub enum MaterialSource<'a, M> {
    /// Resolve names against a registry, then fall back.
    Registry {
        /// Name → handle table.
        registry: &'a MaterialRegistry<M>,
        /// Used when neither the part name nor the default key is
        /// registered.
        fallback: Option<M>,
    },
    /// Bind every part to one material.
    Default(M),
}

impl<'a, M> MaterialSource<'a, M> {
    /// Registry resolution without a caller fallback.
    #[must_use]
    pub fn registry(registry: &'a MaterialRegistry<M>) -> Self {
        Self::Registry { registry, fallback: None }
    }

    /// Registry resolution with a caller fallback.
    #[must_use]
    pub fn registry_with_fallback(registry: &'a MaterialRegistry<M>, fallback: M) -> Self {
        Self::Registry {
            registry,
            fallback: Some(fallback),
        }
    }
}

impl<M: Clone> MaterialSource<'_, M> {
    /// Resolves the material of one part.
    ///
    /// Returns the handle and the rule that produced it.
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError::NoMaterialAvailable`] if nothing matches and
    /// no fallback was supplied.
    pub fn resolve(&self, part: usize, name: &str, default_key: &str) -> AssembleResult<(M, Resolution)> {
        match self {
            Self::Default(material) => Ok((material.clone(), Resolution::Default)),
            Self::Registry { registry, fallback } => {
                if let Some(material) = registry.lookup(name) {
                    Ok((material.clone(), Resolution::Named))
                } else if let Some(material) = registry.lookup(default_key) {
                    Ok((material.clone(), Resolution::RegistryDefault))
                } else if let Some(material) = fallback {
                    Ok((material.clone(), Resolution::Fallback))
                } else {
                    Err(AssembleError::NoMaterialAvailable {
                        part,
                        name: name.to_string(),
                    })
                }
            }
        }
    }
}

/// Which rule resolved a part's material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// The part's own name was registered.
    Named,
    /// The registry's default-key entry was used.
    RegistryDefault,
    /// The caller fallback was used.
    Fallback,
    /// The source was a single default material.
    Default,
}

/// One part of one instance, bound to its material.
pub struct BoundPrimitive<B: GraphicsBackend> {
    /// Index of the part in the decoded mesh.
    pub part: usize,
    /// Material name stored for the part.
    pub material_name: String,
    /// First index of the part.
    pub offset: u32,
    /// Number of indices.
    pub index_count: u32,
    /// Smallest referenced vertex.
    pub min_index: u32,
    /// Largest referenced vertex.
    pub max_index: u32,
    /// Part bounds.
    pub bounds: Aabb,
    /// How the material was chosen.
    pub resolution: Resolution,
    /// Resolved material handle.
    pub material: B::Material,
    /// Backend binding owned by this instance.
    pub binding: B::MaterialBinding,
}

/// One renderable instance of an assembled mesh.
pub struct MeshInstance<B: GraphicsBackend> {
    /// Backend entity.
    pub entity: B::Entity,
    /// Vertex buffer shared with every other instance.
    pub vertex_buffer: Arc<B::VertexBuffer>,
    /// Index buffer shared with every other instance.
    pub index_buffer: Arc<B::IndexBuffer>,
    /// Primitives in part order.
    pub primitives: Vec<BoundPrimitive<B>>,
}

/// Result of a successful [`MeshAssembler::assemble`].
pub struct AssembledMesh<B: GraphicsBackend> {
    /// Shared vertex buffer.
    pub vertex_buffer: Arc<B::VertexBuffer>,
    /// Shared index buffer.
    pub index_buffer: Arc<B::IndexBuffer>,
    /// The instances, in creation order.
    pub instances: RenderableInstances<MeshInstance<B>>,
}

impl<B: GraphicsBackend> AssembledMesh<B> {
    /// Number of instances.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Iterates the instance entities.
    pub fn entities(&self) -> impl Iterator<Item = &B::Entity> + '_ {
        self.instances.iter().map(|instance| &instance.entity)
    }
}

impl<B> fmt::Debug for BoundPrimitive<B>
where
    B: GraphicsBackend,
    B::Material: fmt::Debug,
    B::MaterialBinding: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundPrimitive")
            .field("part", &self.part)
            .field("material_name", &self.material_name)
            .field("offset", &self.offset)
            .field("index_count", &self.index_count)
            .field("resolution", &self.resolution)
            .field("material", &self.material)
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

impl<B> fmt::Debug for MeshInstance<B>
where
    B: GraphicsBackend,
    B::Entity: fmt::Debug,
    B::Material: fmt::Debug,
    B::MaterialBinding: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshInstance")
            .field("entity", &self.entity)
            .field("primitives", &self.primitives)
            .finish_non_exhaustive()
    }
}

impl<B> fmt::Debug for AssembledMesh<B>
where
    B: GraphicsBackend,
    B::Entity: fmt::Debug,
    B::Material: fmt::Debug,
    B::MaterialBinding: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssembledMesh")
            .field("instances", &self.instances.as_slice())
            .finish_non_exhaustive()
    }
}

/// Builds renderable instances of decoded meshes on one backend.
#[derive(Debug)]
pub struct MeshAssembler<B> {
    backend: B,
    config: AssemblerConfig,
}

impl<B: GraphicsBackend> MeshAssembler<B> {
    /// Creates an assembler.
    #[must_use]
    pub fn new(backend: B, config: AssemblerConfig) -> Self {
        Self { backend, config }
    }

    /// Creates an assembler with the default configuration.
    #[must_use]
    pub fn with_defaults(backend: B) -> Self {
        Self::new(backend, AssemblerConfig::default())
    }

    /// The backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The backend, mutably.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Unwraps the backend.
    #[must_use]
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Builds `instance_count` instances of `mesh`.
    ///
    /// Geometry is uploaded once and shared; each instance gets its own
    /// entity and one material binding per part.
    ///
    /// # Errors
    ///
    /// - [`AssembleError::InstanceCountInvalid`] if `instance_count` is zero
    ///   or above the configured maximum.
    /// - [`AssembleError::NoMaterialAvailable`] if a part cannot be resolved.
    /// - [`AssembleError::Backend`] if the backend fails; entities created by
    ///   this call are destroyed first.
    ///
    /// Neither of the first two touches the backend.
    pub fn assemble(
        &mut self,
        mesh: &DecodedMesh,
        source: MaterialSource<'_, B::Material>,
        instance_count: usize,
    ) -> AssembleResult<AssembledMesh<B>> {
        check_instance_count(instance_count, self.config.max_instances)?;
        let materials = self.resolve_all(mesh.parts(), &source)?;

        let vertices = mesh.vertices();
        let vertex_buffer = Arc::new(self.backend.create_vertex_buffer(&VertexBufferDesc {
            layout: vertices.layout(),
            vertex_count: vertices.vertex_count(),
            data: vertices.as_bytes(),
        })?);
        let indices = mesh.indices();
        let index_buffer = Arc::new(self.backend.create_index_buffer(&IndexBufferDesc {
            index_type: indices.index_type(),
            index_count: mesh.header().index_count,
            data: indices.as_bytes(),
        })?);

        let mut built: Vec<MeshInstance<B>> = Vec::with_capacity(instance_count);
        for instance in 0..instance_count {
            let desc = RenderableDesc {
                instance,
                primitive_count: mesh.parts().len(),
                bounds: mesh.bounds(),
            };
            match self.build_instance(&desc, mesh.parts(), &materials) {
                Ok((entity, primitives)) => built.push(MeshInstance {
                    entity,
                    vertex_buffer: Arc::clone(&vertex_buffer),
                    index_buffer: Arc::clone(&index_buffer),
                    primitives,
                }),
                Err(err) => {
                    warn!(instance, created = built.len(), error = %err, "mesh assembly failed, destroying instances");
                    for done in built {
                        self.backend.destroy_entity(done.entity);
                    }
                    return Err(err.into());
                }
            }
        }

        debug!(
            instances = instance_count,
            parts = mesh.parts().len(),
            vertices = vertices.vertex_count(),
            "assembled mesh"
        );
        Ok(AssembledMesh {
            vertex_buffer,
            index_buffer,
            instances: RenderableInstances::new(built, self.config.max_instances)?,
        })
    }

    /// Destroys every instance entity of `mesh`. The shared buffers are
    /// released when the last reference to them drops.
    pub fn destroy(&mut self, mesh: AssembledMesh<B>) {
        let count = mesh.instances.len();
        for instance in mesh.instances {
            self.backend.destroy_entity(instance.entity);
        }
        debug!(instances = count, "destroyed assembled mesh");
    }

    fn resolve_all(
        &self,
        parts: &[PartDescriptor],
        source: &MaterialSource<'_, B::Material>,
    ) -> AssembleResult<Vec<(B::Material, Resolution)>> {
        parts
            .iter()
            .enumerate()
            .map(|(index, part)| {
                let resolved = source.resolve(index, &part.material_name, &self.config.default_material_key)?;
                if self.config.trace_material_resolution {
                    trace!(part = index, name = %part.material_name, rule = ?resolved.1, "resolved material");
                }
                Ok(resolved)
            })
            .collect()
    }

    /// Creates one entity and binds every part; destroys the entity again if
    /// a binding fails.
    fn build_instance(
        &mut self,
        desc: &RenderableDesc,
        parts: &[PartDescriptor],
        materials: &[(B::Material, Resolution)],
    ) -> Result<(B::Entity, Vec<BoundPrimitive<B>>), BackendError> {
        let entity = self.backend.create_entity(desc)?;
        let mut primitives = Vec::with_capacity(parts.len());
        for (index, (part, (material, resolution))) in parts.iter().zip(materials).enumerate() {
            let binding = match self.backend.bind_material(material) {
                Ok(binding) => binding,
                Err(err) => {
                    self.backend.destroy_entity(entity);
                    return Err(err);
                }
            };
            primitives.push(BoundPrimitive {
                part: index,
                material_name: part.material_name.clone(),
                offset: part.offset,
                index_count: part.index_count,
                min_index: part.min_index,
                max_index: part.max_index,
                bounds: part.bounds,
                resolution: *resolution,
                material: material.clone(),
                binding,
            });
        }
        Ok((entity, primitives))
    }
}
