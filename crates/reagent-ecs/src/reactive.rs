//! Reactive system adapter.
//!
//! A [`Collector`] subscribes to membership changes of one or more groups and
//! accumulates the affected entities in a de-duplicated pending set. Each
//! collected entity is retained ([`Owner::Collector`](crate::entity::Owner))
//! until the next [`Pool::collect`](crate::pool::Pool::collect), so an entity
//! destroyed in between stays out of the free list until the collector lets
//! go of it.
//!
//! [`ReactiveSystemRunner`] binds a [`ReactiveSystem`] to a collector. The
//! surrounding scheduler calls [`ReactiveSystemRunner::execute`] once per tick;
//! when that happens is not this crate's concern.
//!
//! # Example
//!
//! ```
//! use reagent_ecs::prelude::*;
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Health(u32);
//! impl Component for Health {}
//!
//! struct LowHealthAlarm {
//!     health: ComponentTypeId,
//!     seen: Vec<EntityId>,
//! }
//!
//! impl ReactiveSystem for LowHealthAlarm {
//!     fn trigger(&self) -> Vec<(Matcher, GroupEvent)> {
//!         vec![(Matcher::all_of([self.health]), GroupEvent::Added)]
//!     }
//!
//!     fn execute(&mut self, pool: &mut Pool, entities: &[EntityId]) {
//!         for &e in entities {
//!             if pool.get::<Health>(e).is_some_and(|h| h.0 < 10) {
//!                 self.seen.push(e);
//!             }
//!         }
//!     }
//! }
//!
//! let mut registry = ComponentRegistry::new();
//! let health = registry.register::<Health>("health").unwrap();
//! let mut pool = Pool::new(registry);
//!
//! let alarm = LowHealthAlarm { health, seen: Vec::new() };
//! let mut runner = ReactiveSystemRunner::new(&mut pool, alarm).unwrap();
//!
//! let e = pool.create_entity();
//! pool.add(e, Health(100)).unwrap();
//! pool.replace(e, Health(3)).unwrap();
//!
//! assert_eq!(runner.execute(&mut pool).unwrap(), 1);
//! assert_eq!(runner.system().seen, vec![e]);
//! // Nothing pending on the next tick.
//! assert_eq!(runner.execute(&mut pool).unwrap(), 0);
//! ```

use std::collections::HashSet;
use std::fmt;

use crate::entity::EntityId;
use crate::group::{GroupEvent, GroupId};
use crate::matcher::Matcher;
use crate::pool::Pool;
use crate::EcsError;

// ---------------------------------------------------------------------------
// CollectorId
// ---------------------------------------------------------------------------

/// Handle to a collector owned by a [`Pool`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectorId(pub(crate) u32);

impl fmt::Debug for CollectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CollectorId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

/// De-duplicated set of entities touched by group changes since the last
/// collect.
#[derive(Debug)]
pub struct Collector {
    id: CollectorId,
    triggers: Vec<(GroupId, GroupEvent)>,
    /// Collection order, for deterministic `collect` output.
    order: Vec<EntityId>,
    pending: HashSet<EntityId>,
    active: bool,
}

impl Collector {
    pub(crate) fn new(id: CollectorId, triggers: Vec<(GroupId, GroupEvent)>) -> Self {
        Self {
            id,
            triggers,
            order: Vec::new(),
            pending: HashSet::new(),
            active: true,
        }
    }

    /// This collector's handle.
    pub fn id(&self) -> CollectorId {
        self.id
    }

    /// The `(group, event)` pairs this collector watches.
    pub fn triggers(&self) -> &[(GroupId, GroupEvent)] {
        &self.triggers
    }

    /// Whether the collector is currently subscribed to its groups.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Number of entities waiting for the next collect.
    pub fn pending_count(&self) -> usize {
        self.order.len()
    }

    /// Whether `entity` is waiting for the next collect.
    pub fn contains(&self, entity: EntityId) -> bool {
        self.pending.contains(&entity)
    }

    /// Record `entity`. Returns `true` if it was not pending yet, in which case
    /// the caller must retain it on the collector's behalf.
    pub(crate) fn push(&mut self, entity: EntityId) -> bool {
        if self.pending.insert(entity) {
            self.order.push(entity);
            true
        } else {
            false
        }
    }

    /// Take every pending entity in collection order.
    pub(crate) fn drain(&mut self) -> Vec<EntityId> {
        self.pending.clear();
        std::mem::take(&mut self.order)
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

// ---------------------------------------------------------------------------
// ReactiveSystem
// ---------------------------------------------------------------------------

/// A system that runs only for entities whose group membership changed.
pub trait ReactiveSystem {
    /// Groups to watch and which of their changes count as triggers.
    fn trigger(&self) -> Vec<(Matcher, GroupEvent)>;

    /// Extra condition an entity must satisfy at execution time. Entities
    /// collected earlier but no longer matching are skipped.
    fn filter(&self) -> Option<Matcher> {
        None
    }

    /// Handle the collected entities. Called only when at least one entity
    /// passed the filter.
    fn execute(&mut self, pool: &mut Pool, entities: &[EntityId]);
}

/// Drives a [`ReactiveSystem`] from its collector, once per external tick.
pub struct ReactiveSystemRunner<S> {
    system: S,
    collector: CollectorId,
    filter: Option<Matcher>,
    buffer: Vec<EntityId>,
}

impl<S: fmt::Debug> fmt::Debug for ReactiveSystemRunner<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveSystemRunner")
            .field("system", &self.system)
            .field("collector", &self.collector)
            .finish()
    }
}

impl<S: ReactiveSystem> ReactiveSystemRunner<S> {
    /// Resolve the system's trigger groups in `pool` and start collecting.
    pub fn new(pool: &mut Pool, system: S) -> Result<Self, EcsError> {
        let mut triggers = Vec::new();
        for (matcher, event) in system.trigger() {
            triggers.push((pool.get_group(&matcher)?, event));
        }
        let collector = pool.create_collector(&triggers)?;
        let filter = system.filter();
        Ok(Self {
            system,
            collector,
            filter,
            buffer: Vec::new(),
        })
    }

    /// The collector feeding this system.
    pub fn collector(&self) -> CollectorId {
        self.collector
    }

    /// The wrapped system.
    pub fn system(&self) -> &S {
        &self.system
    }

    /// The wrapped system, mutably.
    pub fn system_mut(&mut self) -> &mut S {
        &mut self.system
    }

    /// Stop collecting and drop anything pending.
    pub fn deactivate(&mut self, pool: &mut Pool) -> Result<(), EcsError> {
        pool.deactivate_collector(self.collector)
    }

    /// Resume collecting after [`deactivate`](Self::deactivate).
    pub fn activate(&mut self, pool: &mut Pool) -> Result<(), EcsError> {
        pool.activate_collector(self.collector)
    }

    /// Collect pending entities and run the system on the ones still alive and
    /// passing the filter. Returns how many entities the system received.
    pub fn execute(&mut self, pool: &mut Pool) -> Result<usize, EcsError> {
        let collected = pool.collect(self.collector)?;
        self.buffer.clear();
        for entity in collected {
            let keep = match pool.entity(entity) {
                Ok(e) if e.is_enabled() => self.filter.as_ref().map_or(true, |m| m.matches(e)),
                _ => false,
            };
            if keep {
                self.buffer.push(entity);
            }
        }
        if self.buffer.is_empty() {
            return Ok(0);
        }
        let entities = std::mem::take(&mut self.buffer);
        self.system.execute(pool, &entities);
        let count = entities.len();
        self.buffer = entities;
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
