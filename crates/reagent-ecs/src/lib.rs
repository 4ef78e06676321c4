//! Reagent ECS -- reactive Entity Component System runtime core.
//!
//! Entities are shells holding at most one component per registered type.
//! A [`Pool`](pool::Pool) owns every entity and keeps a set of
//! [`Group`](group::Group)s, each the live set of entities satisfying a
//! [`Matcher`](matcher::Matcher), up to date incrementally: every component
//! add, replace or remove is forwarded synchronously to the groups interested
//! in that component type. Reactive systems consume the resulting membership
//! changes through [`Collector`](reactive::Collector)s.
//!
//! Entity handles are generational, and detached component instances are
//! reset and reused.
//!
//! # Quick Start
//!
//! ```
//! use reagent_ecs::prelude::*;
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Position { x: f32, y: f32 }
//! impl Component for Position {}
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Velocity { dx: f32, dy: f32 }
//! impl Component for Velocity {}
//!
//! let mut registry = ComponentRegistry::new();
//! let position = registry.register::<Position>("position").unwrap();
//! let velocity = registry.register::<Velocity>("velocity").unwrap();
//! let mut pool = Pool::new(registry);
//!
//! let movers = pool.get_group(&Matcher::all_of([position, velocity])).unwrap();
//!
//! let e = pool.create_entity();
//! pool.add(e, Position { x: 0.0, y: 0.0 }).unwrap();
//! assert!(pool.group(movers).unwrap().is_empty());
//!
//! pool.add(e, Velocity { dx: 1.0, dy: 0.0 }).unwrap();
//! assert_eq!(pool.group(movers).unwrap().entities(), &[e]);
//! assert_eq!(pool.get::<Position>(e), Some(&Position { x: 0.0, y: 0.0 }));
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod component_pool;
pub mod entity;
pub mod event;
pub mod group;
pub mod matcher;
pub mod pool;
pub mod reactive;

use component::ComponentTypeId;
use entity::{EntityId, Owner};
use group::GroupId;
use reactive::CollectorId;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
///
/// Every failing operation leaves the pool exactly as it was, with one
/// exception: [`EcsError::RetainedEntitiesRemain`] is reported after the
/// entities have already been destroyed.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity already holds a component of this type.
    #[error("entity {entity} already has component {component:?}")]
    DuplicateComponent {
        entity: EntityId,
        component: ComponentTypeId,
    },

    /// The entity holds no component of this type.
    #[error("entity {entity} has no component {component:?}")]
    MissingComponent {
        entity: EntityId,
        component: ComponentTypeId,
    },

    /// The entity is not live in this pool.
    #[error("entity {entity} is not live in this pool")]
    EntityNotInPool { entity: EntityId },

    /// Destroyed entities are still held by owners other than the pool.
    #[error("{count} destroyed entities are still retained")]
    RetainedEntitiesRemain { count: usize },

    /// `single` was asked about a type not registered as a singleton.
    #[error("component '{name}' is not registered as a singleton")]
    UnknownSingletonType { name: String },

    /// A singleton group holds more than one entity.
    #[error("singleton group {group:?} holds {count} entities")]
    AmbiguousSingleton { group: GroupId, count: usize },

    /// The handle's generation does not match the shell (recycled or never
    /// allocated).
    #[error("entity {entity} does not exist (stale or never allocated)")]
    StaleEntity { entity: EntityId },

    /// The entity has been destroyed and no longer accepts component changes.
    #[error("entity {entity} is not enabled")]
    EntityNotEnabled { entity: EntityId },

    /// The owner already holds this entity.
    #[error("entity {entity} is already retained by {owner:?}")]
    AlreadyRetained { entity: EntityId, owner: Owner },

    /// The owner does not hold this entity.
    #[error("entity {entity} is not retained by {owner:?}")]
    NotRetained { entity: EntityId, owner: Owner },

    /// A component type was referenced that has not been registered.
    #[error("component type '{name}' not registered")]
    UnknownComponent { name: String },

    /// A type-erased instance does not match the registered type.
    #[error("instance is not a '{component}' component")]
    ComponentTypeMismatch { component: String },

    /// Another type is already registered under this name.
    #[error("component name '{name}' is already registered")]
    DuplicateComponentName { name: String },

    /// The group handle is unknown (never created, or dissolved).
    #[error("group {group:?} does not exist")]
    UnknownGroup { group: GroupId },

    /// The collector handle is unknown.
    #[error("collector {collector:?} does not exist")]
    UnknownCollector { collector: CollectorId },
}

/// Shorthand for results carrying an [`EcsError`].
pub type Result<T> = std::result::Result<T, EcsError>;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{
        Component, ComponentInfo, ComponentKind, ComponentRegistry, ComponentTypeId,
    };
    pub use crate::component_pool::ComponentPools;
    pub use crate::entity::{Entity, EntityEvent, EntityId, Owner};
    pub use crate::event::ListenerId;
    pub use crate::group::{Group, GroupChange, GroupEvent, GroupId};
    pub use crate::matcher::Matcher;
    pub use crate::pool::{Pool, PoolConfig, PoolEvent};
    pub use crate::reactive::{Collector, CollectorId, ReactiveSystem, ReactiveSystemRunner};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    // -- test component types -----------------------------------------------

    #[derive(Debug, Default, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {}

    #[derive(Debug, Default, PartialEq)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }
    impl Component for Velocity {}

    #[derive(Debug, Default, PartialEq)]
    struct IsDead;
    impl Component for IsDead {}

    #[derive(Debug, Default, PartialEq)]
    struct Player;
    impl Component for Player {}

    struct Types {
        position: ComponentTypeId,
        velocity: ComponentTypeId,
        dead: ComponentTypeId,
        player: ComponentTypeId,
    }

    fn setup_pool() -> (Pool, Types) {
        let mut registry = ComponentRegistry::new();
        let types = Types {
            position: registry.register::<Position>("position").unwrap(),
            velocity: registry.register::<Velocity>("velocity").unwrap(),
            dead: registry.register::<IsDead>("is_dead").unwrap(),
            player: registry.register_singleton::<Player>("player").unwrap(),
        };
        (Pool::new(registry), types)
    }

    // -- group maintenance --------------------------------------------------

    #[test]
    fn moving_alive_group_tracks_component_changes() {
        let (mut pool, t) = setup_pool();
        let moving = pool
            .get_group(&Matcher::all_of([t.position, t.velocity]).none_of([t.dead]))
            .unwrap();

        let e = pool.create_entity();
        pool.add(e, Position::default()).unwrap();
        pool.add(e, Velocity { dx: 1.0, dy: 0.0 }).unwrap();
        assert!(pool.group(moving).unwrap().contains(e));

        pool.add(e, IsDead).unwrap();
        assert!(!pool.group(moving).unwrap().contains(e));

        pool.remove::<IsDead>(e).unwrap();
        assert!(pool.group(moving).unwrap().contains(e));

        pool.destroy_entity(e).unwrap();
        assert!(pool.group(moving).unwrap().is_empty());
    }

    #[test]
    fn equal_matchers_share_a_group() {
        let (mut pool, t) = setup_pool();
        let a = pool
            .get_group(&Matcher::all_of([t.velocity, t.position]))
            .unwrap();
        let b = pool
            .get_group(&Matcher::all_of([t.position, t.velocity, t.position]))
            .unwrap();
        assert_eq!(a, b);
        // One singleton group for `Player`, plus this one.
        assert_eq!(pool.group_count(), 2);
    }

    #[test]
    fn group_listeners_see_membership_changes() {
        let (mut pool, t) = setup_pool();
        let group = pool.get_group(&Matcher::all_of([t.position])).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        pool.subscribe_group(group, move |change| sink.borrow_mut().push(*change))
            .unwrap();

        let e = pool.create_entity();
        pool.add(e, Position::default()).unwrap();
        pool.replace(e, Position { x: 1.0, y: 1.0 }).unwrap();
        pool.remove::<Position>(e).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                GroupChange::EntityAdded { group, entity: e },
                GroupChange::EntityUpdated { group, entity: e },
                GroupChange::EntityRemoved { group, entity: e },
            ]
        );
    }

    #[test]
    fn entity_listeners_fire_after_groups_update() {
        let (mut pool, t) = setup_pool();
        let group = pool.get_group(&Matcher::all_of([t.position])).unwrap();
        let e = pool.create_entity();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        pool.subscribe_entity(e, move |event| {
            let tag = match event {
                EntityEvent::ComponentAdded { .. } => "added",
                EntityEvent::ComponentRemoved { .. } => "removed",
                EntityEvent::ComponentReplaced { .. } => "replaced",
                EntityEvent::Released { .. } => "released",
            };
            sink.borrow_mut().push(tag);
        })
        .unwrap();

        pool.add(e, Position::default()).unwrap();
        assert!(pool.group(group).unwrap().contains(e));
        pool.replace(e, Position { x: 2.0, y: 0.0 }).unwrap();
        pool.destroy_entity(e).unwrap();

        assert_eq!(*seen.borrow(), vec!["added", "replaced", "removed", "released"]);
    }

    #[test]
    fn replace_with_none_removes() {
        let (mut pool, t) = setup_pool();
        let e = pool.create_entity();
        pool.add(e, Velocity::default()).unwrap();
        pool.replace_component(e, t.velocity, None).unwrap();
        assert!(!pool.has::<Velocity>(e));
        assert!(matches!(
            pool.replace_component(e, t.velocity, None),
            Err(EcsError::MissingComponent { .. })
        ));
    }

    // -- lifecycle ----------------------------------------------------------

    #[test]
    fn destroyed_entity_rejects_changes() {
        let (mut pool, _) = setup_pool();
        let e = pool.create_entity();
        pool.retain_entity(e, 1).unwrap();
        pool.destroy_entity(e).unwrap();

        let err = pool.add(e, Position::default()).unwrap_err();
        assert!(matches!(err, EcsError::EntityNotEnabled { .. }));
        assert_eq!(pool.retained_entity_count(), 1);

        pool.release_entity(e, 1).unwrap();
        assert_eq!(pool.retained_entity_count(), 0);
        assert_eq!(pool.reusable_entity_count(), 1);
    }

    #[test]
    fn destroy_all_reports_retained_entities() {
        let (mut pool, _) = setup_pool();
        let kept = pool.create_entity();
        pool.create_entity();
        pool.retain_entity(kept, 9).unwrap();

        let err = pool.destroy_all_entities().unwrap_err();
        assert!(matches!(err, EcsError::RetainedEntitiesRemain { count: 1 }));
        assert_eq!(pool.count(), 0);

        pool.release_entity(kept, 9).unwrap();
        pool.destroy_all_entities().unwrap();
        assert_eq!(pool.reusable_entity_count(), 2);
    }

    // -- singletons ---------------------------------------------------------

    #[test]
    fn singleton_lookup() {
        let (mut pool, _) = setup_pool();
        assert_eq!(pool.single::<Player>().unwrap(), None);

        let hero = pool.create_entity();
        pool.add(hero, Player).unwrap();
        assert_eq!(pool.single::<Player>().unwrap(), Some(hero));

        let impostor = pool.create_entity();
        pool.add(impostor, Player).unwrap();
        assert!(matches!(
            pool.single::<Player>(),
            Err(EcsError::AmbiguousSingleton { count: 2, .. })
        ));

        assert!(matches!(
            pool.single::<Position>(),
            Err(EcsError::UnknownSingletonType { .. })
        ));
    }

    #[test]
    fn singleton_group_is_rebuilt_after_clear() {
        let (mut pool, t) = setup_pool();
        let hero = pool.create_entity();
        pool.add(hero, Player).unwrap();
        pool.clear_groups().unwrap();
        assert_eq!(pool.group_count(), 0);

        assert_eq!(pool.single_by_type(t.player).unwrap(), Some(hero));
        assert_eq!(pool.group_count(), 1);
    }

    // -- reactive -----------------------------------------------------------

    struct DeathWatch {
        is_dead: ComponentTypeId,
        dead: Vec<EntityId>,
    }

    impl DeathWatch {
        fn new(t: &Types) -> Self {
            Self {
                is_dead: t.dead,
                dead: Vec::new(),
            }
        }
    }

    impl ReactiveSystem for DeathWatch {
        fn trigger(&self) -> Vec<(Matcher, GroupEvent)> {
            vec![(Matcher::all_of([self.is_dead]), GroupEvent::Added)]
        }

        fn execute(&mut self, _pool: &mut Pool, entities: &[EntityId]) {
            self.dead.extend_from_slice(entities);
        }
    }

    #[test]
    fn collector_retains_destroyed_entities_until_collected() {
        let (mut pool, t) = setup_pool();
        let mut runner = ReactiveSystemRunner::new(&mut pool, DeathWatch::new(&t)).unwrap();

        let e = pool.create_entity();
        pool.add(e, IsDead).unwrap();
        pool.destroy_entity(e).unwrap();
        assert_eq!(pool.retained_entity_count(), 1);
        assert_eq!(pool.pending_count(runner.collector()).unwrap(), 1);

        // Destroyed entities are dropped before the system runs.
        assert_eq!(runner.execute(&mut pool).unwrap(), 0);
        assert!(runner.system().dead.is_empty());
        assert_eq!(pool.retained_entity_count(), 0);
        assert_eq!(pool.reusable_entity_count(), 1);
    }

    #[test]
    fn deactivated_runner_collects_nothing() {
        let (mut pool, t) = setup_pool();
        let mut runner = ReactiveSystemRunner::new(&mut pool, DeathWatch::new(&t)).unwrap();
        runner.deactivate(&mut pool).unwrap();

        let e = pool.create_entity();
        pool.add(e, IsDead).unwrap();
        assert_eq!(runner.execute(&mut pool).unwrap(), 0);

        runner.activate(&mut pool).unwrap();
        pool.remove::<IsDead>(e).unwrap();
        pool.add(e, IsDead).unwrap();
        assert_eq!(runner.execute(&mut pool).unwrap(), 1);
        assert_eq!(runner.system().dead, vec![e]);
    }
}
