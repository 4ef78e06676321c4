//! Component-membership predicates.
//!
//! A [`Matcher`] combines three sets of component types: every type in the
//! all-set must be present, at least one type of the any-set must be present
//! (when the any-set is non-empty), and no type of the none-set may be present.
//!
//! Sets are stored sorted and de-duplicated, so structurally identical
//! matchers compare and hash equal regardless of the order their types were
//! listed in. The [`Pool`](crate::pool::Pool) relies on this to hand out
//! exactly one [`Group`](crate::group::Group) per distinct predicate.

use serde::{Deserialize, Serialize};

use crate::component::{ComponentRegistry, ComponentTypeId};
use crate::entity::Entity;

fn normalize(types: impl IntoIterator<Item = ComponentTypeId>) -> Vec<ComponentTypeId> {
    let mut ids: Vec<_> = types.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// An immutable predicate over the component types an entity holds.
///
/// A matcher whose all-set and any-set are both empty matches no entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawMatcher")]
pub struct Matcher {
    all: Vec<ComponentTypeId>,
    any: Vec<ComponentTypeId>,
    none: Vec<ComponentTypeId>,
}

/// Wire form of a [`Matcher`]; sets may arrive unsorted or with repeats.
#[derive(Default, Deserialize)]
#[serde(default)]
struct RawMatcher {
    all: Vec<ComponentTypeId>,
    any: Vec<ComponentTypeId>,
    none: Vec<ComponentTypeId>,
}

impl From<RawMatcher> for Matcher {
    fn from(raw: RawMatcher) -> Self {
        Self {
            all: normalize(raw.all),
            any: normalize(raw.any),
            none: normalize(raw.none),
        }
    }
}

impl Matcher {
    /// Entities holding every one of `types`.
    pub fn all_of(types: impl IntoIterator<Item = ComponentTypeId>) -> Self {
        Self {
            all: normalize(types),
            any: Vec::new(),
            none: Vec::new(),
        }
    }

    /// Entities holding at least one of `types`.
    pub fn any_of(types: impl IntoIterator<Item = ComponentTypeId>) -> Self {
        Self {
            all: Vec::new(),
            any: normalize(types),
            none: Vec::new(),
        }
    }

    /// Additionally require at least one of `types`.
    pub fn and_any_of(self, types: impl IntoIterator<Item = ComponentTypeId>) -> Self {
        Self {
            any: normalize(self.any.into_iter().chain(types)),
            ..self
        }
    }

    /// Additionally exclude entities holding any of `types`.
    pub fn none_of(self, types: impl IntoIterator<Item = ComponentTypeId>) -> Self {
        Self {
            none: normalize(self.none.into_iter().chain(types)),
            ..self
        }
    }

    /// The all-set, sorted.
    pub fn all(&self) -> &[ComponentTypeId] {
        &self.all
    }

    /// The any-set, sorted.
    pub fn any(&self) -> &[ComponentTypeId] {
        &self.any
    }

    /// The none-set, sorted.
    pub fn none(&self) -> &[ComponentTypeId] {
        &self.none
    }

    /// Sorted union of every type this matcher references.
    ///
    /// A change to any of these types may flip the predicate, so the pool
    /// registers the matcher's group under each of them.
    pub fn indices(&self) -> Vec<ComponentTypeId> {
        normalize(
            self.all
                .iter()
                .chain(&self.any)
                .chain(&self.none)
                .copied(),
        )
    }

    /// Evaluate the predicate against an entity's current components.
    pub fn matches(&self, entity: &Entity) -> bool {
        self.matches_types(|id| entity.has(id))
    }

    /// Evaluate the predicate against a membership oracle.
    pub fn matches_types(&self, has: impl Fn(ComponentTypeId) -> bool) -> bool {
        if self.all.is_empty() && self.any.is_empty() {
            return false;
        }
        self.all.iter().all(|&id| has(id))
            && (self.any.is_empty() || self.any.iter().any(|&id| has(id)))
            && !self.none.iter().any(|&id| has(id))
    }

    /// Human-readable form using registered display names, e.g.
    /// `AllOf(position, velocity).NoneOf(dead)`.
    pub fn describe(&self, registry: &ComponentRegistry) -> String {
        let names = |ids: &[ComponentTypeId]| -> String {
            ids.iter()
                .map(|&id| registry.name(id))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut parts = Vec::with_capacity(3);
        if !self.all.is_empty() {
            parts.push(format!("AllOf({})", names(&self.all)));
        }
        if !self.any.is_empty() {
            parts.push(format!("AnyOf({})", names(&self.any)));
        }
        if !self.none.is_empty() {
            parts.push(format!("NoneOf({})", names(&self.none)));
        }
        parts.join(".")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
