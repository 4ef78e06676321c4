//! The [`Pool`] is the top-level registry. It owns the entity slab, the
//! groups, the collectors and the component reuse stacks, and it is the only
//! path through which entities are mutated.
//!
//! # Change propagation
//!
//! Every component mutation follows the same route, synchronously, before the
//! mutating call returns:
//!
//! 1. the entity shell applies the change (or rejects it without side
//!    effects);
//! 2. the pool forwards the change to every group registered for the
//!    component type, in group creation order; each group updates its own
//!    membership, notifies its listeners, and the pool feeds the collectors
//!    subscribed to that group;
//! 3. the entity's own listeners are notified;
//! 4. a detached instance is reset and pushed onto the reuse stack.
//!
//! # Entity lifecycle
//!
//! `Free → Live` on [`create_entity`](Pool::create_entity), `Live →
//! Destroying` inside [`destroy_entity`](Pool::destroy_entity), then either
//! straight back to `Free` when the pool was the last owner, or `Retained`
//! until the last external owner or collector lets go.

use std::any::Any;
use std::cell::OnceCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::component::{Component, ComponentRegistry, ComponentTypeId};
use crate::component_pool::ComponentPools;
use crate::entity::{ComponentChange, Entity, EntityEvent, EntityId, Owner};
use crate::event::{ListenerId, Listeners, PoolListener};
use crate::group::{Group, GroupChange, GroupEvent, GroupId};
use crate::matcher::Matcher;
use crate::reactive::{Collector, CollectorId};
use crate::EcsError;

// ---------------------------------------------------------------------------
// PoolConfig
// ---------------------------------------------------------------------------

/// Construction-time settings for a [`Pool`].
///
/// Deserializable with every field optional, so hosts can keep it in their
/// own config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Name used in log output.
    pub name: String,
    /// First creation index handed out, and the value
    /// [`Pool::reset_creation_index`] returns to.
    pub start_creation_index: u32,
    /// Number of entity shells to reserve up front.
    pub entity_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "pool".to_owned(),
            start_creation_index: 0,
            entity_capacity: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// PoolEvent
// ---------------------------------------------------------------------------

/// Pool-level lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolEvent {
    /// An entity was created (or a free shell was reactivated).
    EntityCreated(EntityId),
    /// An entity is about to lose its components.
    EntityWillBeDestroyed(EntityId),
    /// An entity was destroyed; it is now recyclable or retained.
    EntityDestroyed(EntityId),
    /// A new group was created for a previously unseen matcher.
    GroupCreated(GroupId),
    /// A group was dissolved by [`Pool::clear_groups`].
    GroupCleared(GroupId),
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Registry owning entity lifecycle, groups, and component reuse for one
/// closed set of component types.
pub struct Pool {
    config: PoolConfig,
    registry: ComponentRegistry,
    /// Entity slab; `EntityId::index` addresses it.
    entities: Vec<Entity>,
    live: HashSet<EntityId>,
    /// Slab indices of recyclable shells (stack).
    free: Vec<u32>,
    /// Destroyed entities still held by a non-pool owner.
    retained: HashSet<EntityId>,
    creation_index: u32,
    /// Live entities in creation order, rebuilt on demand.
    entities_snapshot: OnceCell<Vec<EntityId>>,
    groups: BTreeMap<GroupId, Group>,
    next_group_id: u32,
    groups_by_matcher: HashMap<Matcher, GroupId>,
    /// Fan-out index: component type -> groups whose matcher references it.
    groups_for_type: Vec<Vec<GroupId>>,
    singleton_groups: HashMap<ComponentTypeId, GroupId>,
    collectors: BTreeMap<CollectorId, Collector>,
    next_collector_id: u32,
    component_pools: ComponentPools,
    listeners: Listeners<PoolListener>,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.config.name)
            .field("entity_count", &self.live.len())
            .field("reusable", &self.free.len())
            .field("retained", &self.retained.len())
            .field("group_count", &self.groups.len())
            .finish()
    }
}

impl Pool {
    /// Create a pool for the types in `registry` with default settings.
    pub fn new(registry: ComponentRegistry) -> Self {
        Self::with_config(registry, PoolConfig::default())
    }

    /// Create a pool for the types in `registry`.
    ///
    /// A dedicated group is built for every type registered as a singleton.
    pub fn with_config(registry: ComponentRegistry, config: PoolConfig) -> Self {
        let type_count = registry.len();
        let mut pool = Self {
            creation_index: config.start_creation_index,
            entities: Vec::with_capacity(config.entity_capacity),
            live: HashSet::with_capacity(config.entity_capacity),
            free: Vec::new(),
            retained: HashSet::new(),
            entities_snapshot: OnceCell::new(),
            groups: BTreeMap::new(),
            next_group_id: 0,
            groups_by_matcher: HashMap::new(),
            groups_for_type: vec![Vec::new(); type_count],
            singleton_groups: HashMap::new(),
            collectors: BTreeMap::new(),
            next_collector_id: 0,
            component_pools: ComponentPools::new(type_count),
            listeners: Listeners::new(),
            registry,
            config,
        };
        pool.build_singleton_groups();
        debug!(
            pool = %pool.config.name,
            component_types = type_count,
            singletons = pool.singleton_groups.len(),
            "pool created"
        );
        pool
    }

    fn build_singleton_groups(&mut self) {
        let singletons: Vec<_> = self.registry.singleton_types().collect();
        for type_id in singletons {
            // A fresh matcher over a registered type cannot fail validation.
            if let Ok(group) = self.get_group(&Matcher::all_of([type_id])) {
                self.singleton_groups.insert(type_id, group);
            }
        }
    }

    // -- accessors ------------------------------------------------------------

    /// Component metadata this pool was built with.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Settings this pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Number of live entities.
    pub fn count(&self) -> usize {
        self.live.len()
    }

    /// Whether `entity` is live in this pool.
    pub fn has_entity(&self, entity: EntityId) -> bool {
        self.live.contains(&entity)
    }

    /// Live entities in creation order. Cached until the live set changes.
    pub fn entities(&self) -> &[EntityId] {
        self.entities_snapshot.get_or_init(|| {
            let mut live: Vec<_> = self.live.iter().copied().collect();
            live.sort_by_key(|e| (self.entities[e.index() as usize].creation_index(), *e));
            live
        })
    }

    /// Shells waiting on the free list.
    pub fn reusable_entity_count(&self) -> usize {
        self.free.len()
    }

    /// Destroyed entities still held by an owner other than the pool.
    pub fn retained_entity_count(&self) -> usize {
        self.retained.len()
    }

    /// Total shells ever allocated (live, retained and free).
    pub fn shell_count(&self) -> usize {
        self.entities.len()
    }

    /// Next creation index to be assigned.
    pub fn creation_index(&self) -> u32 {
        self.creation_index
    }

    /// The shell behind `entity`, live or retained.
    pub fn entity(&self, entity: EntityId) -> Result<&Entity, EcsError> {
        let idx = self.slot_of(entity)?;
        Ok(&self.entities[idx])
    }

    fn slot_of(&self, entity: EntityId) -> Result<usize, EcsError> {
        let idx = entity.index() as usize;
        match self.entities.get(idx) {
            Some(shell) if shell.id() == entity => Ok(idx),
            _ => Err(EcsError::StaleEntity { entity }),
        }
    }

    fn type_of<T: 'static>(&self) -> Result<ComponentTypeId, EcsError> {
        self.registry
            .lookup::<T>()
            .ok_or_else(|| EcsError::UnknownComponent {
                name: std::any::type_name::<T>().to_owned(),
            })
    }

    fn check_type(&self, type_id: ComponentTypeId) -> Result<(), EcsError> {
        if type_id.index() < self.registry.len() {
            Ok(())
        } else {
            Err(EcsError::UnknownComponent {
                name: format!("{type_id:?}"),
            })
        }
    }

    // -- events ---------------------------------------------------------------

    /// Listen to pool lifecycle events.
    pub fn subscribe(&mut self, listener: impl FnMut(&PoolEvent) + 'static) -> ListenerId {
        self.listeners.subscribe(Box::new(listener))
    }

    /// Stop a pool listener. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Listen to one entity's component and release events. The listener is
    /// dropped when the shell is recycled.
    pub fn subscribe_entity(
        &mut self,
        entity: EntityId,
        listener: impl FnMut(&EntityEvent<'_>) + 'static,
    ) -> Result<ListenerId, EcsError> {
        let idx = self.slot_of(entity)?;
        Ok(self.entities[idx].subscribe(Box::new(listener)))
    }

    /// Stop an entity listener.
    pub fn unsubscribe_entity(
        &mut self,
        entity: EntityId,
        id: ListenerId,
    ) -> Result<bool, EcsError> {
        let idx = self.slot_of(entity)?;
        Ok(self.entities[idx].unsubscribe(id))
    }

    /// Listen to a group's membership changes.
    pub fn subscribe_group(
        &mut self,
        group: GroupId,
        listener: impl FnMut(&GroupChange) + 'static,
    ) -> Result<ListenerId, EcsError> {
        let group = self
            .groups
            .get_mut(&group)
            .ok_or(EcsError::UnknownGroup { group })?;
        Ok(group.subscribe(Box::new(listener)))
    }

    /// Stop a group listener.
    pub fn unsubscribe_group(&mut self, group: GroupId, id: ListenerId) -> Result<bool, EcsError> {
        let group = self
            .groups
            .get_mut(&group)
            .ok_or(EcsError::UnknownGroup { group })?;
        Ok(group.unsubscribe(id))
    }

    // -- entity lifecycle -----------------------------------------------------

    /// Create an entity, reusing a free shell when one is available.
    pub fn create_entity(&mut self) -> EntityId {
        let idx = match self.free.pop() {
            Some(idx) => idx as usize,
            None => {
                let idx = self.entities.len();
                self.entities
                    .push(Entity::new(EntityId::new(idx as u32, 0), self.registry.len()));
                idx
            }
        };

        let shell = &mut self.entities[idx];
        shell.activate(self.creation_index);
        self.creation_index = self.creation_index.wrapping_add(1);
        let entity = shell.id();

        self.live.insert(entity);
        self.entities_snapshot.take();
        trace!(pool = %self.config.name, entity = %entity, "entity created");
        self.listeners.emit(&PoolEvent::EntityCreated(entity));
        entity
    }

    /// Destroy a live entity.
    ///
    /// Its components are detached in type order (groups drop it as they go),
    /// then the shell is recycled if the pool was its last owner or parked in
    /// the retained set otherwise.
    pub fn destroy_entity(&mut self, entity: EntityId) -> Result<(), EcsError> {
        if !self.live.contains(&entity) {
            return Err(EcsError::EntityNotInPool { entity });
        }
        let idx = entity.index() as usize;
        self.entities[idx].ensure_enabled()?;

        self.live.remove(&entity);
        self.entities_snapshot.take();
        self.listeners
            .emit(&PoolEvent::EntityWillBeDestroyed(entity));

        let changes = self.entities[idx].destroy()?;
        for change in changes {
            self.apply_change(idx, change)?;
        }
        self.listeners.emit(&PoolEvent::EntityDestroyed(entity));

        let shell = &self.entities[idx];
        if shell.is_owned_by(Owner::Pool) && shell.retain_count() == 1 {
            self.entities[idx].release(Owner::Pool)?;
            self.recycle_shell(idx);
        } else {
            self.retained.insert(entity);
            self.entities[idx].release(Owner::Pool)?;
            trace!(
                pool = %self.config.name,
                entity = %entity,
                owners = ?self.entities[idx].owners(),
                "destroyed entity retained"
            );
        }
        Ok(())
    }

    /// Destroy every live entity.
    ///
    /// Fails with [`EcsError::RetainedEntitiesRemain`] if any destroyed entity
    /// is still held by an external owner or collector afterwards. The
    /// destruction itself is not rolled back: the error reports a leak.
    pub fn destroy_all_entities(&mut self) -> Result<(), EcsError> {
        let victims = self.entities().to_vec();
        for entity in victims {
            self.destroy_entity(entity)?;
        }
        if !self.retained.is_empty() {
            let count = self.retained.len();
            warn!(
                pool = %self.config.name,
                count,
                "entities still retained after destroying all entities"
            );
            return Err(EcsError::RetainedEntitiesRemain { count });
        }
        Ok(())
    }

    fn recycle_shell(&mut self, idx: usize) {
        let shell = &mut self.entities[idx];
        let old = shell.id();
        shell.recycle();
        self.free.push(idx as u32);
        trace!(pool = %self.config.name, entity = %old, "entity shell recycled");
    }

    fn on_entity_released(&mut self, idx: usize) {
        let entity = self.entities[idx].id();
        if self.retained.remove(&entity) {
            self.recycle_shell(idx);
        }
    }

    /// Restart creation indices from the configured start value.
    pub fn reset_creation_index(&mut self) {
        self.creation_index = self.config.start_creation_index;
    }

    /// Full reset: deactivate collectors, clear groups, destroy every entity,
    /// restart creation indices and drop every pool listener.
    pub fn reset(&mut self) -> Result<(), EcsError> {
        let pending: usize = self.collectors.values().map(Collector::pending_count).sum();
        if pending > 0 {
            warn!(
                pool = %self.config.name,
                pending,
                "reset drops entities still pending in collectors"
            );
        }
        let collectors: Vec<_> = self.collectors.keys().copied().collect();
        for collector in collectors {
            self.deactivate_collector(collector)?;
        }
        self.clear_groups()?;
        self.destroy_all_entities()?;
        self.reset_creation_index();
        self.listeners.clear();
        debug!(pool = %self.config.name, "pool reset");
        Ok(())
    }

    // -- ownership ------------------------------------------------------------

    /// Hold `entity` on behalf of a caller-defined owner. A destroyed entity
    /// stays out of the free list until every such owner releases it.
    pub fn retain_entity(&mut self, entity: EntityId, owner: u64) -> Result<(), EcsError> {
        let idx = self.slot_of(entity)?;
        self.entities[idx].retain(Owner::External(owner))
    }

    /// Release a hold taken with [`retain_entity`](Self::retain_entity).
    pub fn release_entity(&mut self, entity: EntityId, owner: u64) -> Result<(), EcsError> {
        let idx = self.slot_of(entity)?;
        if self.entities[idx].release(Owner::External(owner))? {
            self.on_entity_released(idx);
        }
        Ok(())
    }

    // -- components -----------------------------------------------------------

    /// Forward a change to groups and collectors, then to the entity's
    /// listeners, then park any detached instance.
    fn apply_change(&mut self, idx: usize, change: ComponentChange) -> Result<(), EcsError> {
        let type_id = change.type_id();
        let entity = self.entities[idx].id();

        // Nothing can subscribe new groups while we dispatch, so iterating by
        // position walks a stable snapshot of the fan-out list.
        let interested = self.groups_for_type[type_id.index()].len();
        for pos in 0..interested {
            let group_id = self.groups_for_type[type_id.index()][pos];
            let Some(group) = self.groups.get_mut(&group_id) else {
                continue;
            };
            let Some(group_change) = group.handle_entity(&mut self.entities[idx], &change)?
            else {
                continue;
            };
            for &(collector_id, trigger) in group.collector_subscriptions() {
                if !trigger.accepts(&group_change) {
                    continue;
                }
                if let Some(collector) = self.collectors.get_mut(&collector_id) {
                    if collector.push(entity) {
                        self.entities[idx].retain(Owner::Collector(collector_id))?;
                    }
                }
            }
        }

        self.entities[idx].emit(&change);
        if let Some((type_id, mut instance)) = change.into_retired() {
            self.registry.reset_instance(type_id, instance.as_mut());
            self.component_pools.release(type_id, instance);
        }
        Ok(())
    }

    /// Attach a type-erased component.
    ///
    /// Fails with [`EcsError::ComponentTypeMismatch`] if `component` is not an
    /// instance of the type registered as `type_id`.
    pub fn add_component(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
        component: Box<dyn Any>,
    ) -> Result<(), EcsError> {
        self.registry.check_instance(type_id, &*component)?;
        let idx = self.slot_of(entity)?;
        let change = self.entities[idx].add(type_id, component)?;
        self.apply_change(idx, change)
    }

    /// Detach the component of `type_id`; the instance goes to the reuse
    /// stack.
    pub fn remove_component(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
    ) -> Result<(), EcsError> {
        self.check_type(type_id)?;
        let idx = self.slot_of(entity)?;
        let change = self.entities[idx].remove(type_id)?;
        self.apply_change(idx, change)
    }

    /// Swap in `component`, adding it if absent. `None` removes the component
    /// and fails with [`EcsError::MissingComponent`] if there is none.
    pub fn replace_component(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
        component: Option<Box<dyn Any>>,
    ) -> Result<(), EcsError> {
        match component.as_deref() {
            Some(instance) => self.registry.check_instance(type_id, instance)?,
            None => self.check_type(type_id)?,
        }
        let idx = self.slot_of(entity)?;
        let change = self.entities[idx].replace(type_id, component)?;
        self.apply_change(idx, change)
    }

    fn acquire<T: Component>(&mut self, type_id: ComponentTypeId) -> Box<T> {
        self.component_pools
            .acquire(type_id)
            .and_then(|instance| instance.downcast::<T>().ok())
            .unwrap_or_default()
    }

    /// A reset instance from the reuse stack, or a fresh default.
    pub fn create_component<T: Component>(&mut self) -> Result<Box<T>, EcsError> {
        let type_id = self.type_of::<T>()?;
        Ok(self.acquire::<T>(type_id))
    }

    /// Attach a pooled `T` initialised by `init`.
    pub fn add_with<T: Component>(
        &mut self,
        entity: EntityId,
        init: impl FnOnce(&mut T),
    ) -> Result<(), EcsError> {
        let type_id = self.type_of::<T>()?;
        let idx = self.slot_of(entity)?;
        self.entities[idx].ensure_can_add(type_id)?;
        let mut component = self.acquire::<T>(type_id);
        init(&mut component);
        let change = self.entities[idx].add(type_id, component)?;
        self.apply_change(idx, change)
    }

    /// Attach `value`. The reuse stack is left alone; use
    /// [`add_with`](Self::add_with) to fill a pooled instance instead.
    pub fn add<T: Component>(&mut self, entity: EntityId, value: T) -> Result<(), EcsError> {
        let type_id = self.type_of::<T>()?;
        let idx = self.slot_of(entity)?;
        let change = self.entities[idx].add(type_id, Box::new(value))?;
        self.apply_change(idx, change)
    }

    /// Replace (or add) a pooled `T` initialised by `init`.
    pub fn replace_with<T: Component>(
        &mut self,
        entity: EntityId,
        init: impl FnOnce(&mut T),
    ) -> Result<(), EcsError> {
        let type_id = self.type_of::<T>()?;
        let idx = self.slot_of(entity)?;
        self.entities[idx].ensure_enabled()?;
        let mut component = self.acquire::<T>(type_id);
        init(&mut component);
        let change = self.entities[idx].replace(type_id, Some(component))?;
        self.apply_change(idx, change)
    }

    /// Replace (or add) the `T` component with `value`. The reuse stack is
    /// left alone; use [`replace_with`](Self::replace_with) to fill a pooled
    /// instance instead.
    pub fn replace<T: Component>(&mut self, entity: EntityId, value: T) -> Result<(), EcsError> {
        let type_id = self.type_of::<T>()?;
        let idx = self.slot_of(entity)?;
        let change = self.entities[idx].replace(type_id, Some(Box::new(value)))?;
        self.apply_change(idx, change)
    }

    /// Detach the `T` component.
    pub fn remove<T: Component>(&mut self, entity: EntityId) -> Result<(), EcsError> {
        let type_id = self.type_of::<T>()?;
        let idx = self.slot_of(entity)?;
        let change = self.entities[idx].remove(type_id)?;
        self.apply_change(idx, change)
    }

    /// The `T` component of `entity`, if both exist.
    pub fn get<T: 'static>(&self, entity: EntityId) -> Option<&T> {
        let type_id = self.registry.lookup::<T>()?;
        self.entity(entity).ok()?.get::<T>(type_id)
    }

    /// Whether `entity` exists and holds a `T`.
    pub fn has<T: 'static>(&self, entity: EntityId) -> bool {
        self.get::<T>(entity).is_some()
    }

    /// The reuse stacks.
    pub fn component_pools(&self) -> &ComponentPools {
        &self.component_pools
    }

    /// Drop pooled instances of one type.
    pub fn clear_component_pool(&mut self, type_id: ComponentTypeId) {
        self.component_pools.clear(type_id);
    }

    /// Drop every pooled instance.
    pub fn clear_component_pools(&mut self) {
        self.component_pools.clear_all();
    }

    // -- groups ---------------------------------------------------------------

    /// The group for `matcher`, created and backfilled on first request.
    ///
    /// Equal matchers always yield the same [`GroupId`].
    pub fn get_group(&mut self, matcher: &Matcher) -> Result<GroupId, EcsError> {
        if let Some(&existing) = self.groups_by_matcher.get(matcher) {
            return Ok(existing);
        }
        let indices = matcher.indices();
        for &type_id in &indices {
            self.check_type(type_id)?;
        }

        let id = GroupId(self.next_group_id);
        self.next_group_id += 1;
        let mut group = Group::new(id, matcher.clone());
        for &entity in &self.live {
            group.handle_entity_silently(&mut self.entities[entity.index() as usize])?;
        }

        debug!(
            pool = %self.config.name,
            group = ?id,
            matcher = %matcher.describe(&self.registry),
            members = group.len(),
            "group created"
        );
        self.groups.insert(id, group);
        self.groups_by_matcher.insert(matcher.clone(), id);
        for type_id in indices {
            self.groups_for_type[type_id.index()].push(id);
        }
        self.listeners.emit(&PoolEvent::GroupCreated(id));
        Ok(id)
    }

    /// Look up a group by handle.
    pub fn group(&self, group: GroupId) -> Result<&Group, EcsError> {
        self.groups
            .get(&group)
            .ok_or(EcsError::UnknownGroup { group })
    }

    /// Number of groups currently maintained.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Dissolve every group: drop their listeners and collector
    /// subscriptions, release their hold on members, and forget the matcher
    /// cache and fan-out index.
    ///
    /// Collectors keep what they already collected but are deactivated, since
    /// they no longer watch anything; handles to dissolved groups fail with
    /// [`EcsError::UnknownGroup`] from now on, including on
    /// [`activate_collector`](Self::activate_collector).
    pub fn clear_groups(&mut self) -> Result<(), EcsError> {
        let groups = std::mem::take(&mut self.groups);
        let count = groups.len();
        for (id, mut group) in groups {
            for entity in group.dissolve() {
                let idx = entity.index() as usize;
                if self.entities[idx].release(Owner::Group(id))? {
                    self.on_entity_released(idx);
                }
            }
            self.listeners.emit(&PoolEvent::GroupCleared(id));
        }
        self.groups_by_matcher.clear();
        self.groups_for_type.iter_mut().for_each(Vec::clear);
        self.singleton_groups.clear();

        let mut detached = 0usize;
        for collector in self.collectors.values_mut() {
            if collector.is_active() && !collector.triggers().is_empty() {
                collector.set_active(false);
                detached += 1;
            }
        }
        debug!(pool = %self.config.name, count, detached, "groups cleared");
        Ok(())
    }

    // -- singletons -----------------------------------------------------------

    /// The entity holding singleton marker `T`, or `None` if nobody does.
    pub fn single<T: 'static>(&mut self) -> Result<Option<EntityId>, EcsError> {
        let type_id = self
            .registry
            .lookup::<T>()
            .ok_or_else(|| EcsError::UnknownSingletonType {
                name: std::any::type_name::<T>().to_owned(),
            })?;
        self.single_by_type(type_id)
    }

    /// [`single`](Self::single) by component type id.
    pub fn single_by_type(
        &mut self,
        type_id: ComponentTypeId,
    ) -> Result<Option<EntityId>, EcsError> {
        let is_singleton = self
            .registry
            .get_info(type_id)
            .is_some_and(|info| info.is_singleton());
        if !is_singleton {
            return Err(EcsError::UnknownSingletonType {
                name: self.registry.name(type_id).to_owned(),
            });
        }
        let group = match self.singleton_groups.get(&type_id).copied() {
            Some(group) => group,
            None => {
                let group = self.get_group(&Matcher::all_of([type_id]))?;
                self.singleton_groups.insert(type_id, group);
                group
            }
        };
        self.group(group)?.single_entity()
    }

    // -- collectors -----------------------------------------------------------

    /// Start collecting entities for the given `(group, event)` triggers.
    pub fn create_collector(
        &mut self,
        triggers: &[(GroupId, GroupEvent)],
    ) -> Result<CollectorId, EcsError> {
        for &(group, _) in triggers {
            self.group(group)?;
        }
        let id = CollectorId(self.next_collector_id);
        self.next_collector_id += 1;
        self.collectors
            .insert(id, Collector::new(id, triggers.to_vec()));
        self.subscribe_collector(id, triggers);
        Ok(id)
    }

    fn subscribe_collector(&mut self, id: CollectorId, triggers: &[(GroupId, GroupEvent)]) {
        for &(group, event) in triggers {
            if let Some(group) = self.groups.get_mut(&group) {
                group.add_collector(id, event);
            }
        }
    }

    /// Look up a collector by handle.
    pub fn collector(&self, collector: CollectorId) -> Result<&Collector, EcsError> {
        self.collectors
            .get(&collector)
            .ok_or(EcsError::UnknownCollector { collector })
    }

    /// Entities waiting in `collector`.
    pub fn pending_count(&self, collector: CollectorId) -> Result<usize, EcsError> {
        Ok(self.collector(collector)?.pending_count())
    }

    /// Take the collector's pending entities, in collection order, and release
    /// its hold on them. Destroyed entities may be among them; check
    /// [`has_entity`](Self::has_entity) before touching them.
    pub fn collect(&mut self, collector: CollectorId) -> Result<Vec<EntityId>, EcsError> {
        let drained = self
            .collectors
            .get_mut(&collector)
            .ok_or(EcsError::UnknownCollector { collector })?
            .drain();
        for &entity in &drained {
            let idx = entity.index() as usize;
            if self.entities[idx].release(Owner::Collector(collector))? {
                self.on_entity_released(idx);
            }
        }
        Ok(drained)
    }

    /// Unsubscribe `collector` from its groups and drop what it holds.
    pub fn deactivate_collector(&mut self, collector: CollectorId) -> Result<(), EcsError> {
        let state = self
            .collectors
            .get_mut(&collector)
            .ok_or(EcsError::UnknownCollector { collector })?;
        state.set_active(false);
        for group in self.groups.values_mut() {
            group.remove_collector(collector);
        }
        let dropped = self.collect(collector)?;
        if !dropped.is_empty() {
            trace!(
                pool = %self.config.name,
                collector = ?collector,
                dropped = dropped.len(),
                "collector deactivated with pending entities"
            );
        }
        Ok(())
    }

    /// Resubscribe a deactivated collector. Fails with
    /// [`EcsError::UnknownGroup`] if one of its groups has been cleared.
    pub fn activate_collector(&mut self, collector: CollectorId) -> Result<(), EcsError> {
        let state = self.collector(collector)?;
        if state.is_active() {
            return Ok(());
        }
        let triggers = state.triggers().to_vec();
        for &(group, _) in &triggers {
            self.group(group)?;
        }
        self.subscribe_collector(collector, &triggers);
        if let Some(state) = self.collectors.get_mut(&collector) {
            state.set_active(true);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
