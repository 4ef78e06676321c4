//! Component type registration and metadata.
//!
//! Every component kind a [`Pool`](crate::pool::Pool) manages must be
//! registered in a [`ComponentRegistry`] before the pool is built. Registration
//! produces a [`ComponentTypeId`], the dense index used for entity slot arrays,
//! matcher sets and the pool's type-to-group fan-out.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::EcsError;

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Opaque, lightweight identifier for a registered component type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentTypeId(pub(crate) u32);

impl ComponentTypeId {
    /// Slot index of this type inside an entity's component array.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// A data payload that can be attached to an entity.
///
/// Retired instances are kept in per-type stacks and handed out again by
/// [`Pool::create_component`](crate::pool::Pool::create_component), so every
/// component must be able to return to a pristine state. The default
/// [`reset`](Component::reset) assigns `Default::default()`; override it to
/// keep owned allocations (e.g. clear a `Vec` instead of replacing it).
pub trait Component: Any + Default {
    /// Restore this instance before it is pushed onto the reuse stack.
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Capability flag supplied at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    /// Ordinary component; any number of entities may hold one.
    Data,
    /// Marker expected on at most one live entity. The pool keeps a dedicated
    /// group for it and answers [`Pool::single`](crate::pool::Pool::single).
    Singleton,
}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// Type-erased reset, bound to the concrete type at registration.
type ResetFn = fn(&mut dyn Any);

fn reset_erased<T: Component>(value: &mut dyn Any) {
    if let Some(typed) = value.downcast_mut::<T>() {
        typed.reset();
    }
}

/// Metadata about a registered component type.
#[derive(Clone)]
pub struct ComponentInfo {
    /// Unique ID assigned at registration time.
    pub id: ComponentTypeId,
    /// Human-readable name (supplied by the caller).
    pub name: String,
    /// Singleton capability flag.
    pub kind: ComponentKind,
    /// Rust `TypeId` for runtime type checking.
    pub type_id: TypeId,
    reset: ResetFn,
}

impl ComponentInfo {
    /// Whether this type was registered with [`ComponentKind::Singleton`].
    pub fn is_singleton(&self) -> bool {
        self.kind == ComponentKind::Singleton
    }
}

impl fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Registry mapping Rust types to [`ComponentTypeId`]s and their metadata.
///
/// A type can only be registered once; subsequent registrations of the same
/// Rust `TypeId` return the existing [`ComponentTypeId`]. The registry is
/// handed to [`Pool::new`](crate::pool::Pool::new) and is read-only from then
/// on, which keeps slot-array sizes fixed for the pool's lifetime.
#[derive(Debug, Default, Clone)]
pub struct ComponentRegistry {
    /// TypeId -> ComponentTypeId for dedup.
    by_type: HashMap<TypeId, ComponentTypeId>,
    /// Name -> ComponentTypeId for lookup by display name.
    by_name: HashMap<String, ComponentTypeId>,
    /// Indexed by ComponentTypeId.0.
    infos: Vec<ComponentInfo>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an ordinary component type under the given `name`.
    ///
    /// If the type has already been registered, the existing
    /// [`ComponentTypeId`] is returned and `name` is ignored.
    pub fn register<T: Component>(&mut self, name: &str) -> Result<ComponentTypeId, EcsError> {
        self.register_kind::<T>(name, ComponentKind::Data)
    }

    /// Register a singleton marker type under the given `name`.
    pub fn register_singleton<T: Component>(
        &mut self,
        name: &str,
    ) -> Result<ComponentTypeId, EcsError> {
        self.register_kind::<T>(name, ComponentKind::Singleton)
    }

    /// Register a component type with an explicit [`ComponentKind`].
    pub fn register_kind<T: Component>(
        &mut self,
        name: &str,
        kind: ComponentKind,
    ) -> Result<ComponentTypeId, EcsError> {
        let rust_type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&rust_type_id) {
            return Ok(existing);
        }
        if self.by_name.contains_key(name) {
            return Err(EcsError::DuplicateComponentName {
                name: name.to_owned(),
            });
        }

        let id = ComponentTypeId(self.infos.len() as u32);
        self.infos.push(ComponentInfo {
            id,
            name: name.to_owned(),
            kind,
            type_id: rust_type_id,
            reset: reset_erased::<T>,
        });
        self.by_type.insert(rust_type_id, id);
        self.by_name.insert(name.to_owned(), id);
        Ok(id)
    }

    /// Look up a component type by its Rust `TypeId`.
    pub fn lookup<T: 'static>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Look up a component type by its registered display name.
    pub fn lookup_by_name(&self, name: &str) -> Option<ComponentTypeId> {
        self.by_name.get(name).copied()
    }

    /// Get the [`ComponentInfo`] for a registered component type ID.
    pub fn get_info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.infos.get(id.index())
    }

    /// Display name for `id`, or `"?"` for ids this registry never issued.
    pub fn name(&self, id: ComponentTypeId) -> &str {
        self.get_info(id).map_or("?", |info| info.name.as_str())
    }

    /// Total number of registered component types.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Whether any component types have been registered.
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Every registered type, in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.infos.iter()
    }

    /// Ids of every type registered as [`ComponentKind::Singleton`].
    pub fn singleton_types(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.infos
            .iter()
            .filter(|info| info.is_singleton())
            .map(|info| info.id)
    }

    /// Returns the names of all registered component types, sorted.
    pub fn registered_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }

    /// Run the registered reset for `id` on a retired instance.
    pub(crate) fn reset_instance(&self, id: ComponentTypeId, instance: &mut dyn Any) {
        if let Some(info) = self.get_info(id) {
            (info.reset)(instance);
        }
    }

    /// Check that `component` is an instance of the type registered as `id`.
    pub(crate) fn check_instance(
        &self,
        id: ComponentTypeId,
        component: &dyn Any,
    ) -> Result<(), EcsError> {
        let info = self.get_info(id).ok_or_else(|| EcsError::UnknownComponent {
            name: format!("{id:?}"),
        })?;
        if component.type_id() != info.type_id {
            return Err(EcsError::ComponentTypeMismatch {
                component: info.name.clone(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
