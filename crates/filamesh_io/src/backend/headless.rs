//! # Headless Backend
//!
//! CPU-only [`GraphicsBackend`]. Buffers are owned byte copies, entities are
//! generation-tagged slot ids and material bindings are numbered.
//!
//! Entity slots are recycled through a free list. A reused slot gets the next
//! generation, so a stale id never aliases a live entity.

use std::marker::PhantomData;

use tracing::trace;

use crate::error::BackendError;
use crate::mesh::{IndexType, VertexLayout};

use super::{GraphicsBackend, IndexBufferDesc, RenderableDesc, VertexBufferDesc};

/// Identifier of an entity created by [`HeadlessBackend`].
///
/// - Lower 32 bits: slot index
/// - Upper 32 bits: generation of the slot when the entity was created
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Null/invalid entity ID.
    pub const NULL: Self = Self(u64::MAX);

    /// Creates an ID from slot index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Checks if this is the null ID.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

/// Vertex buffer held in host memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessVertexBuffer {
    /// Attribute layout.
    pub layout: VertexLayout,
    /// Number of vertices.
    pub vertex_count: u32,
    /// Copied vertex block.
    pub data: Vec<u8>,
}

/// Index buffer held in host memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessIndexBuffer {
    /// Index width.
    pub index_type: IndexType,
    /// Number of indices.
    pub index_count: u32,
    /// Copied index block.
    pub data: Vec<u8>,
}

/// A material bound to one primitive of one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialBinding<M> {
    /// The bound material handle.
    pub material: M,
    /// Unique, increasing binding number.
    pub binding_id: u64,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    alive: bool,
    desc: Option<RenderableDesc>,
}

/// CPU implementation of [`GraphicsBackend`].
///
/// Optional limits make allocation failures reproducible: an entity
/// capacity makes `create_entity` fail once every slot is alive, and a
/// binding limit makes `bind_material` fail after that many bindings.
#[derive(Debug)]
pub struct HeadlessBackend<M> {
    slots: Vec<Slot>,
    free_indices: Vec<u32>,
    alive_count: usize,
    entity_capacity: Option<usize>,
    binding_limit: Option<u64>,
    bindings_issued: u64,
    buffers_created: usize,
    _material: PhantomData<fn() -> M>,
}

impl<M> Default for HeadlessBackend<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> HeadlessBackend<M> {
    /// Creates a backend without limits.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_indices: Vec::new(),
            alive_count: 0,
            entity_capacity: None,
            binding_limit: None,
            bindings_issued: 0,
            buffers_created: 0,
            _material: PhantomData,
        }
    }

    /// Creates a backend that can hold at most `capacity` live entities.
    #[must_use]
    pub fn with_entity_capacity(capacity: usize) -> Self {
        Self {
            entity_capacity: Some(capacity),
            ..Self::new()
        }
    }

    /// Makes `bind_material` fail once `limit` bindings have been issued.
    #[must_use]
    pub fn with_binding_limit(mut self, limit: u64) -> Self {
        self.binding_limit = Some(limit);
        self
    }

    /// Returns the number of live entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Returns the number of material bindings issued so far.
    #[inline]
    #[must_use]
    pub const fn bindings_issued(&self) -> u64 {
        self.bindings_issued
    }

    /// Returns the number of vertex and index buffers created so far.
    #[inline]
    #[must_use]
    pub const fn buffers_created(&self) -> usize {
        self.buffers_created
    }

    /// Checks if an entity is alive.
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.live_slot(id).is_some()
    }

    /// Description the entity was created with.
    #[must_use]
    pub fn renderable(&self, id: EntityId) -> Option<&RenderableDesc> {
        self.live_slot(id).and_then(|slot| slot.desc.as_ref())
    }

    fn live_slot(&self, id: EntityId) -> Option<&Slot> {
        if id.is_null() {
            return None;
        }
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.alive && slot.generation == id.generation())
    }

    fn spawn(&mut self, desc: RenderableDesc) -> Result<EntityId, BackendError> {
        let index = if let Some(index) = self.free_indices.pop() {
            index
        } else {
            if self.entity_capacity.is_some_and(|cap| self.slots.len() >= cap) {
                return Err(BackendError::EntityCreation(format!(
                    "entity capacity {} exhausted",
                    self.slots.len()
                )));
            }
            let index = u32::try_from(self.slots.len())
                .map_err(|_| BackendError::EntityCreation("entity index space exhausted".to_string()))?;
            self.slots.push(Slot {
                generation: 0,
                alive: false,
                desc: None,
            });
            index
        };

        let slot = &mut self.slots[index as usize];
        slot.generation = slot.generation.wrapping_add(1);
        slot.alive = true;
        slot.desc = Some(desc);
        self.alive_count += 1;
        Ok(EntityId::new(index, slot.generation))
    }
}

impl<M: Clone> GraphicsBackend for HeadlessBackend<M> {
    type VertexBuffer = HeadlessVertexBuffer;
    type IndexBuffer = HeadlessIndexBuffer;
    type Entity = EntityId;
    type Material = M;
    type MaterialBinding = MaterialBinding<M>;

    fn create_vertex_buffer(&mut self, desc: &VertexBufferDesc<'_>) -> Result<HeadlessVertexBuffer, BackendError> {
        self.buffers_created += 1;
        trace!(bytes = desc.data.len(), vertices = desc.vertex_count, "headless vertex buffer");
        Ok(HeadlessVertexBuffer {
            layout: desc.layout.clone(),
            vertex_count: desc.vertex_count,
            data: desc.data.to_vec(),
        })
    }

    fn create_index_buffer(&mut self, desc: &IndexBufferDesc<'_>) -> Result<HeadlessIndexBuffer, BackendError> {
        self.buffers_created += 1;
        trace!(bytes = desc.data.len(), indices = desc.index_count, "headless index buffer");
        Ok(HeadlessIndexBuffer {
            index_type: desc.index_type,
            index_count: desc.index_count,
            data: desc.data.to_vec(),
        })
    }

    fn create_entity(&mut self, desc: &RenderableDesc) -> Result<EntityId, BackendError> {
        self.spawn(*desc)
    }

    fn bind_material(&mut self, material: &M) -> Result<MaterialBinding<M>, BackendError> {
        if self.binding_limit.is_some_and(|limit| self.bindings_issued >= limit) {
            return Err(BackendError::MaterialBinding(format!(
                "binding limit {} reached",
                self.bindings_issued
            )));
        }
        let binding_id = self.bindings_issued;
        self.bindings_issued += 1;
        Ok(MaterialBinding {
            material: material.clone(),
            binding_id,
        })
    }

    fn destroy_entity(&mut self, entity: EntityId) {
        if !self.is_alive(entity) {
            trace!(?entity, "ignoring destroy of stale entity");
            return;
        }
        let slot = &mut self.slots[entity.index() as usize];
        slot.alive = false;
        slot.desc = None;
        self.alive_count -= 1;
        self.free_indices.push(entity.index());
    }
}
