//! Incrementally maintained entity sets.
//!
//! A [`Group`] holds exactly the live entities that satisfy its [`Matcher`].
//! It is filled once from the pool's live set when it is created and from
//! then on updated only through [`Group::handle_entity`], which the pool calls
//! for every component change on a type the matcher references. Members are
//! retained by the group ([`Owner::Group`]) for as long as they belong to it.

use std::cell::OnceCell;
use std::collections::HashSet;
use std::fmt;

use crate::entity::{ComponentChange, Entity, EntityId, Owner};
use crate::event::{GroupListener, ListenerId, Listeners};
use crate::matcher::Matcher;
use crate::reactive::CollectorId;
use crate::EcsError;

// ---------------------------------------------------------------------------
// GroupId
// ---------------------------------------------------------------------------

/// Handle to a group owned by a [`Pool`](crate::pool::Pool).
///
/// Ids are never reused within a pool, so a handle kept across
/// [`Pool::clear_groups`](crate::pool::Pool::clear_groups) fails cleanly with
/// [`EcsError::UnknownGroup`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub(crate) u32);

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Membership change reported by a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupChange {
    /// The entity started matching.
    EntityAdded {
        /// Reporting group.
        group: GroupId,
        /// The new member.
        entity: EntityId,
    },
    /// The entity stopped matching (or was destroyed).
    EntityRemoved {
        /// Reporting group.
        group: GroupId,
        /// The former member.
        entity: EntityId,
    },
    /// A member had one of the matcher's components replaced.
    EntityUpdated {
        /// Reporting group.
        group: GroupId,
        /// The member whose payload changed.
        entity: EntityId,
    },
}

impl GroupChange {
    /// The entity the change is about.
    pub fn entity(&self) -> EntityId {
        match *self {
            Self::EntityAdded { entity, .. }
            | Self::EntityRemoved { entity, .. }
            | Self::EntityUpdated { entity, .. } => entity,
        }
    }

    /// The group that reported the change.
    pub fn group(&self) -> GroupId {
        match *self {
            Self::EntityAdded { group, .. }
            | Self::EntityRemoved { group, .. }
            | Self::EntityUpdated { group, .. } => group,
        }
    }
}

/// Which membership changes a collector reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupEvent {
    /// Entities entering the group, or members whose matched component was
    /// replaced.
    Added,
    /// Entities leaving the group.
    Removed,
    /// Any membership change.
    AddedOrRemoved,
}

impl GroupEvent {
    /// Whether a collector triggered on `self` should collect for `change`.
    pub fn accepts(self, change: &GroupChange) -> bool {
        match (self, change) {
            (Self::AddedOrRemoved, _) => true,
            (Self::Added, GroupChange::EntityAdded { .. } | GroupChange::EntityUpdated { .. }) => {
                true
            }
            (Self::Removed, GroupChange::EntityRemoved { .. }) => true,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

/// The live set of entities satisfying one [`Matcher`].
pub struct Group {
    id: GroupId,
    matcher: Matcher,
    entities: HashSet<EntityId>,
    /// Sorted copy of `entities`, rebuilt on demand after membership changes.
    snapshot: OnceCell<Vec<EntityId>>,
    listeners: Listeners<GroupListener>,
    collectors: Vec<(CollectorId, GroupEvent)>,
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("id", &self.id)
            .field("matcher", &self.matcher)
            .field("count", &self.entities.len())
            .finish()
    }
}

impl Group {
    pub(crate) fn new(id: GroupId, matcher: Matcher) -> Self {
        Self {
            id,
            matcher,
            entities: HashSet::new(),
            snapshot: OnceCell::new(),
            listeners: Listeners::new(),
            collectors: Vec::new(),
        }
    }

    /// This group's handle.
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// The predicate this group maintains.
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the group has no members.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Whether `entity` is a member.
    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains(&entity)
    }

    /// Members sorted by handle. The slice is cached until membership changes.
    pub fn entities(&self) -> &[EntityId] {
        self.snapshot.get_or_init(|| {
            let mut members: Vec<_> = self.entities.iter().copied().collect();
            members.sort_unstable();
            members
        })
    }

    /// The only member of a group expected to hold at most one entity.
    pub fn single_entity(&self) -> Result<Option<EntityId>, EcsError> {
        match self.entities.len() {
            0 => Ok(None),
            1 => Ok(self.entities.iter().next().copied()),
            count => Err(EcsError::AmbiguousSingleton {
                group: self.id,
                count,
            }),
        }
    }

    fn qualifies(&self, entity: &Entity) -> bool {
        entity.is_enabled() && self.matcher.matches(entity)
    }

    fn insert(&mut self, entity: &mut Entity) -> Result<(), EcsError> {
        entity.retain(Owner::Group(self.id))?;
        self.entities.insert(entity.id());
        self.snapshot.take();
        Ok(())
    }

    fn evict(&mut self, entity: &mut Entity) -> Result<(), EcsError> {
        self.entities.remove(&entity.id());
        self.snapshot.take();
        // The pool still owns anything a group can hold, so this never empties
        // the owner set.
        entity.release(Owner::Group(self.id))?;
        Ok(())
    }

    /// Backfill: add `entity` if it matches, without firing events.
    pub(crate) fn handle_entity_silently(&mut self, entity: &mut Entity) -> Result<(), EcsError> {
        if !self.contains(entity.id()) && self.qualifies(entity) {
            self.insert(entity)?;
        }
        Ok(())
    }

    /// Re-evaluate `entity` after `change` and update membership.
    ///
    /// Fires this group's listeners and returns the membership change, if
    /// any, so the pool can feed subscribed collectors.
    pub(crate) fn handle_entity(
        &mut self,
        entity: &mut Entity,
        change: &ComponentChange,
    ) -> Result<Option<GroupChange>, EcsError> {
        let was_member = self.contains(entity.id());
        let matches = self.qualifies(entity);
        let group = self.id;
        let id = entity.id();

        let outcome = match (was_member, matches) {
            (false, true) => {
                self.insert(entity)?;
                Some(GroupChange::EntityAdded { group, entity: id })
            }
            (true, true) if change.is_replace() => {
                Some(GroupChange::EntityUpdated { group, entity: id })
            }
            (true, false) => {
                self.evict(entity)?;
                Some(GroupChange::EntityRemoved { group, entity: id })
            }
            _ => None,
        };

        if let Some(group_change) = &outcome {
            self.listeners.emit(group_change);
        }
        Ok(outcome)
    }

    // -- subscriptions --------------------------------------------------------

    pub(crate) fn subscribe(&mut self, listener: Box<GroupListener>) -> ListenerId {
        self.listeners.subscribe(listener)
    }

    pub(crate) fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub(crate) fn add_collector(&mut self, collector: CollectorId, trigger: GroupEvent) {
        self.collectors.push((collector, trigger));
    }

    pub(crate) fn remove_collector(&mut self, collector: CollectorId) {
        self.collectors.retain(|(id, _)| *id != collector);
    }

    pub(crate) fn collector_subscriptions(&self) -> &[(CollectorId, GroupEvent)] {
        &self.collectors
    }

    /// Drop listeners and collector subscriptions and hand back the members
    /// so the pool can release the group's ownership.
    pub(crate) fn dissolve(&mut self) -> Vec<EntityId> {
        self.listeners.clear();
        self.collectors.clear();
        self.snapshot.take();
        self.entities.drain().collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
