//! Per-type stacks of retired component instances.
//!
//! Removing or replacing a component parks the detached box here instead of
//! dropping it; [`Pool::create_component`](crate::pool::Pool::create_component)
//! pops from the matching stack before falling back to a fresh allocation.
//! This layer does no type checking: callers push only instances of the type
//! they name, already reset.

use std::any::Any;

use crate::component::ComponentTypeId;

/// Reuse stacks indexed by [`ComponentTypeId`].
#[derive(Debug, Default)]
pub struct ComponentPools {
    stacks: Vec<Vec<Box<dyn Any>>>,
}

impl ComponentPools {
    /// Create empty stacks for `type_count` component types.
    pub fn new(type_count: usize) -> Self {
        Self {
            stacks: (0..type_count).map(|_| Vec::new()).collect(),
        }
    }

    /// Pop a retired instance of `id`, if one is available.
    pub fn acquire(&mut self, id: ComponentTypeId) -> Option<Box<dyn Any>> {
        self.stacks.get_mut(id.index())?.pop()
    }

    /// Push a detached instance of `id` for later reuse.
    pub fn release(&mut self, id: ComponentTypeId, instance: Box<dyn Any>) {
        let idx = id.index();
        if idx >= self.stacks.len() {
            self.stacks.resize_with(idx + 1, Vec::new);
        }
        self.stacks[idx].push(instance);
    }

    /// Number of instances waiting for reuse for `id`.
    pub fn len(&self, id: ComponentTypeId) -> usize {
        self.stacks.get(id.index()).map_or(0, Vec::len)
    }

    /// Total number of pooled instances across all types.
    pub fn total(&self) -> usize {
        self.stacks.iter().map(Vec::len).sum()
    }

    /// Drop every pooled instance of `id`.
    pub fn clear(&mut self, id: ComponentTypeId) {
        if let Some(stack) = self.stacks.get_mut(id.index()) {
            stack.clear();
        }
    }

    /// Drop every pooled instance.
    pub fn clear_all(&mut self) {
        self.stacks.iter_mut().for_each(Vec::clear);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
