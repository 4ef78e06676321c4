//! Listener lists for synchronous, in-call-stack event dispatch.
//!
//! Pools, entities and groups each own a [`Listeners`] list per event type.
//! Dispatch walks the list in subscription order. Listeners receive a shared
//! reference to the event only, so they cannot re-enter the pool while it is
//! dispatching.

use std::fmt;

use crate::entity::EntityEvent;
use crate::group::GroupChange;
use crate::pool::PoolEvent;

/// Handle returned by `subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Listener on an entity's component and release channels.
pub type EntityListener = dyn FnMut(&EntityEvent<'_>);
/// Listener on a group's membership channels.
pub type GroupListener = dyn FnMut(&GroupChange);
/// Listener on a pool's lifecycle channels.
pub type PoolListener = dyn FnMut(&PoolEvent);

/// Ordered list of boxed callbacks of type `F`.
pub struct Listeners<F: ?Sized> {
    next_id: u64,
    entries: Vec<(ListenerId, Box<F>)>,
}

impl<F: ?Sized> Listeners<F> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    /// Append a listener; it fires after every listener already present.
    pub fn subscribe(&mut self, listener: Box<F>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    /// Remove a listener. Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != id);
        self.entries.len() != before
    }

    /// Drop every listener.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of subscribed listeners.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no listener is subscribed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<F: ?Sized> Default for Listeners<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> fmt::Debug for Listeners<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}

impl Listeners<EntityListener> {
    pub(crate) fn emit(&mut self, event: &EntityEvent<'_>) {
        for (_, listener) in &mut self.entries {
            listener(event);
        }
    }
}

impl Listeners<GroupListener> {
    pub(crate) fn emit(&mut self, event: &GroupChange) {
        for (_, listener) in &mut self.entries {
            listener(event);
        }
    }
}

impl Listeners<PoolListener> {
    pub(crate) fn emit(&mut self, event: &PoolEvent) {
        for (_, listener) in &mut self.entries {
            listener(event);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::GroupId;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn fires_in_subscription_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut listeners: Listeners<PoolListener> = Listeners::new();
        for tag in ["first", "second", "third"] {
            let log = Rc::clone(&log);
            listeners.subscribe(Box::new(move |_event: &PoolEvent| log.borrow_mut().push(tag)));
        }
        listeners.emit(&PoolEvent::GroupCreated(GroupId(0)));
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn unsubscribe_removes_only_that_listener() {
        let hits = Rc::new(RefCell::new(0));
        let mut listeners: Listeners<PoolListener> = Listeners::new();
        let h1 = Rc::clone(&hits);
        let a = listeners.subscribe(Box::new(move |_: &PoolEvent| *h1.borrow_mut() += 1));
        let h2 = Rc::clone(&hits);
        listeners.subscribe(Box::new(move |_: &PoolEvent| *h2.borrow_mut() += 10));

        assert!(listeners.unsubscribe(a));
        assert!(!listeners.unsubscribe(a));
        listeners.emit(&PoolEvent::GroupCleared(GroupId(3)));
        assert_eq!(*hits.borrow(), 10);
        assert_eq!(listeners.len(), 1);
    }
}
