//! Entity handles and entity shells.
//!
//! An [`EntityId`] is a 64-bit handle that packs a *generation* counter in the
//! high 32 bits and a slab *index* in the low 32 bits. The generation is
//! bumped every time a shell goes back to the pool's free list, so handles to
//! a recycled shell are detected as stale.
//!
//! An [`Entity`] is the shell that lives in the pool's slab: a fixed-size
//! component slot array, an owner set, and the listeners for its four event
//! channels. Shells are only mutated through the owning
//! [`Pool`](crate::pool::Pool), which forwards each change to the groups that
//! care about it before notifying the entity's own listeners.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::component::ComponentTypeId;
use crate::event::{EntityListener, ListenerId, Listeners};
use crate::group::GroupId;
use crate::reactive::CollectorId;
use crate::EcsError;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A generational entity identifier.
///
/// Layout: `[generation: u32 | index: u32]`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Construct an `EntityId` from an index and generation.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// The index portion (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// The generation portion (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// Owner
// ---------------------------------------------------------------------------

/// A holder of an entity reference. An entity is recyclable once its owner
/// set is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Owner {
    /// The pool itself, from creation until destruction.
    Pool,
    /// A group the entity is currently a member of.
    Group(GroupId),
    /// A reactive collector holding the entity until its next `collect`.
    Collector(CollectorId),
    /// Caller-defined holder, see [`Pool::retain_entity`](crate::pool::Pool::retain_entity).
    External(u64),
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Notification delivered to an entity's listeners.
#[derive(Debug)]
pub enum EntityEvent<'a> {
    /// A component was attached.
    ComponentAdded {
        /// The entity that changed.
        entity: EntityId,
        /// Type of the attached component.
        type_id: ComponentTypeId,
        /// The attached instance.
        component: &'a dyn Any,
    },
    /// A component was detached. The instance is about to be pooled.
    ComponentRemoved {
        /// The entity that changed.
        entity: EntityId,
        /// Type of the detached component.
        type_id: ComponentTypeId,
        /// The detached instance, before reset.
        component: &'a dyn Any,
    },
    /// A component was swapped for a new instance.
    ComponentReplaced {
        /// The entity that changed.
        entity: EntityId,
        /// Type of the swapped component.
        type_id: ComponentTypeId,
        /// The instance that was swapped out.
        previous: &'a dyn Any,
        /// The instance now attached.
        current: &'a dyn Any,
    },
    /// The last owner released the entity.
    Released {
        /// The entity that became unowned.
        entity: EntityId,
    },
}

/// A structural change produced by an entity mutation, carried from the
/// entity to the pool's group forwarding and back to the entity's listeners.
#[derive(Debug)]
pub(crate) enum ComponentChange {
    Added(ComponentTypeId),
    Removed(ComponentTypeId, Box<dyn Any>),
    Replaced(ComponentTypeId, Box<dyn Any>),
}

impl ComponentChange {
    pub(crate) fn type_id(&self) -> ComponentTypeId {
        match self {
            Self::Added(id) | Self::Removed(id, _) | Self::Replaced(id, _) => *id,
        }
    }

    pub(crate) fn is_replace(&self) -> bool {
        matches!(self, Self::Replaced(..))
    }

    /// The instance that left the entity, if any, ready for the reuse stack.
    pub(crate) fn into_retired(self) -> Option<(ComponentTypeId, Box<dyn Any>)> {
        match self {
            Self::Added(_) => None,
            Self::Removed(id, instance) | Self::Replaced(id, instance) => Some((id, instance)),
        }
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// An entity shell: identity, component slots, owners and listeners.
pub struct Entity {
    id: EntityId,
    creation_index: u32,
    enabled: bool,
    /// One slot per registered component type; never resized.
    components: Vec<Option<Box<dyn Any>>>,
    owners: HashSet<Owner>,
    listeners: Listeners<EntityListener>,
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("creation_index", &self.creation_index)
            .field("enabled", &self.enabled)
            .field("components", &self.component_types())
            .field("owners", &self.owners)
            .finish()
    }
}

impl Entity {
    /// A fresh, inactive shell with `type_count` empty slots.
    pub(crate) fn new(id: EntityId, type_count: usize) -> Self {
        Self {
            id,
            creation_index: 0,
            enabled: false,
            components: (0..type_count).map(|_| None).collect(),
            owners: HashSet::new(),
            listeners: Listeners::new(),
        }
    }

    // -- read access ----------------------------------------------------------

    /// Current handle for this shell.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Creation index assigned when the entity was last created.
    pub fn creation_index(&self) -> u32 {
        self.creation_index
    }

    /// `true` between creation and destruction.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a component of type `id` is attached.
    pub fn has(&self, id: ComponentTypeId) -> bool {
        self.components
            .get(id.index())
            .is_some_and(|slot| slot.is_some())
    }

    /// Whether every one of `ids` is attached.
    pub fn has_all(&self, ids: &[ComponentTypeId]) -> bool {
        ids.iter().all(|&id| self.has(id))
    }

    /// Whether at least one of `ids` is attached.
    pub fn has_any(&self, ids: &[ComponentTypeId]) -> bool {
        ids.iter().any(|&id| self.has(id))
    }

    /// The type-erased component in slot `id`.
    pub fn component(&self, id: ComponentTypeId) -> Option<&dyn Any> {
        self.components.get(id.index())?.as_deref()
    }

    /// The component in slot `id`, downcast to `T`.
    pub fn get<T: 'static>(&self, id: ComponentTypeId) -> Option<&T> {
        self.component(id)?.downcast_ref::<T>()
    }

    /// Attached component types in ascending id order.
    pub fn component_types(&self) -> Vec<ComponentTypeId> {
        self.components
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(idx, _)| ComponentTypeId(idx as u32))
            .collect()
    }

    /// Size of the slot array (the registry's type count).
    pub fn capacity(&self) -> usize {
        self.components.len()
    }

    /// Number of owners currently holding this entity.
    pub fn retain_count(&self) -> usize {
        self.owners.len()
    }

    /// Whether `owner` currently holds this entity.
    pub fn is_owned_by(&self, owner: Owner) -> bool {
        self.owners.contains(&owner)
    }

    /// Current owners, sorted.
    pub fn owners(&self) -> Vec<Owner> {
        let mut owners: Vec<_> = self.owners.iter().copied().collect();
        owners.sort_unstable();
        owners
    }

    // -- lifecycle ------------------------------------------------------------

    /// Bring a free shell to life. The pool becomes its first owner.
    pub(crate) fn activate(&mut self, creation_index: u32) {
        debug_assert!(self.owners.is_empty(), "activating an owned shell");
        self.creation_index = creation_index;
        self.enabled = true;
        self.owners.insert(Owner::Pool);
    }

    /// Detach every component in ascending type order and disable the entity.
    ///
    /// The returned changes must be forwarded by the pool so groups drop the
    /// entity and listeners see each removal.
    pub(crate) fn destroy(&mut self) -> Result<Vec<ComponentChange>, EcsError> {
        self.ensure_enabled()?;
        self.enabled = false;
        let changes = self
            .components
            .iter_mut()
            .enumerate()
            .filter_map(|(idx, slot)| {
                slot.take()
                    .map(|instance| ComponentChange::Removed(ComponentTypeId(idx as u32), instance))
            })
            .collect();
        Ok(changes)
    }

    /// Prepare a released shell for the free list: drop listeners and bump the
    /// generation so outstanding handles go stale.
    pub(crate) fn recycle(&mut self) {
        debug_assert!(self.owners.is_empty(), "recycling an owned shell");
        self.listeners.clear();
        self.id = EntityId::new(self.id.index(), self.id.generation().wrapping_add(1));
    }

    // -- components -----------------------------------------------------------

    pub(crate) fn ensure_enabled(&self) -> Result<(), EcsError> {
        if self.enabled {
            Ok(())
        } else {
            Err(EcsError::EntityNotEnabled { entity: self.id })
        }
    }

    fn ensure_slot(&self, id: ComponentTypeId) -> Result<(), EcsError> {
        if id.index() < self.components.len() {
            Ok(())
        } else {
            Err(EcsError::UnknownComponent {
                name: format!("{id:?}"),
            })
        }
    }

    /// Check that `add(id, ..)` would succeed, without touching anything.
    pub(crate) fn ensure_can_add(&self, id: ComponentTypeId) -> Result<(), EcsError> {
        self.ensure_enabled()?;
        self.ensure_slot(id)?;
        if self.has(id) {
            return Err(EcsError::DuplicateComponent {
                entity: self.id,
                component: id,
            });
        }
        Ok(())
    }

    /// Check that `remove(id)` would succeed, without touching anything.
    pub(crate) fn ensure_can_remove(&self, id: ComponentTypeId) -> Result<(), EcsError> {
        self.ensure_enabled()?;
        self.ensure_slot(id)?;
        if !self.has(id) {
            return Err(EcsError::MissingComponent {
                entity: self.id,
                component: id,
            });
        }
        Ok(())
    }

    pub(crate) fn add(
        &mut self,
        id: ComponentTypeId,
        component: Box<dyn Any>,
    ) -> Result<ComponentChange, EcsError> {
        self.ensure_can_add(id)?;
        self.components[id.index()] = Some(component);
        Ok(ComponentChange::Added(id))
    }

    pub(crate) fn remove(&mut self, id: ComponentTypeId) -> Result<ComponentChange, EcsError> {
        self.ensure_can_remove(id)?;
        match self.components[id.index()].take() {
            Some(instance) => Ok(ComponentChange::Removed(id, instance)),
            None => Err(EcsError::MissingComponent {
                entity: self.id,
                component: id,
            }),
        }
    }

    /// Swap in `component`, adding it if the slot is empty. `None` removes.
    pub(crate) fn replace(
        &mut self,
        id: ComponentTypeId,
        component: Option<Box<dyn Any>>,
    ) -> Result<ComponentChange, EcsError> {
        let Some(component) = component else {
            return self.remove(id);
        };
        self.ensure_enabled()?;
        self.ensure_slot(id)?;
        match self.components[id.index()].replace(component) {
            Some(previous) => Ok(ComponentChange::Replaced(id, previous)),
            None => Ok(ComponentChange::Added(id)),
        }
    }

    // -- ownership ------------------------------------------------------------

    pub(crate) fn retain(&mut self, owner: Owner) -> Result<(), EcsError> {
        if !self.owners.insert(owner) {
            return Err(EcsError::AlreadyRetained {
                entity: self.id,
                owner,
            });
        }
        Ok(())
    }

    /// Drop `owner`. Returns `true` if that emptied the owner set, in which
    /// case the released event has already fired.
    pub(crate) fn release(&mut self, owner: Owner) -> Result<bool, EcsError> {
        if !self.owners.remove(&owner) {
            return Err(EcsError::NotRetained {
                entity: self.id,
                owner,
            });
        }
        if self.owners.is_empty() {
            self.listeners
                .emit(&EntityEvent::Released { entity: self.id });
            return Ok(true);
        }
        Ok(false)
    }

    // -- events ---------------------------------------------------------------

    pub(crate) fn subscribe(&mut self, listener: Box<EntityListener>) -> ListenerId {
        self.listeners.subscribe(listener)
    }

    pub(crate) fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Notify this entity's listeners about a change the pool has already
    /// forwarded to its groups.
    pub(crate) fn emit(&mut self, change: &ComponentChange) {
        if self.listeners.is_empty() {
            return;
        }
        let entity = self.id;
        let event = match change {
            ComponentChange::Added(type_id) => {
                let Some(component) = self.components[type_id.index()].as_deref() else {
                    return;
                };
                EntityEvent::ComponentAdded {
                    entity,
                    type_id: *type_id,
                    component,
                }
            }
            ComponentChange::Removed(type_id, instance) => EntityEvent::ComponentRemoved {
                entity,
                type_id: *type_id,
                component: instance.as_ref(),
            },
            ComponentChange::Replaced(type_id, previous) => {
                let Some(current) = self.components[type_id.index()].as_deref() else {
                    return;
                };
                EntityEvent::ComponentReplaced {
                    entity,
                    type_id: *type_id,
                    previous: previous.as_ref(),
                    current,
                }
            }
        };
        self.listeners.emit(&event);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
