//! # Sub Collection — Mutation-Safe Sub List of One Main
//!
//! Each Main owns one [`SubCollection`]. It is the sole owner of the Main's
//! Subs; everything else refers to them by [`SubId`].
//!
//! ```text
//! slots:          SubId → Sub        every attached sub, active or pending
//! active:         [SubId]            what dispatch iterates, priority order
//! pending_add:    [SubId]            staged by live add, positioned by priority
//! pending_remove: [SubId]            staged by remove / destroy
//! ```
//!
//! Add and remove never touch `active` directly. The queues are applied by
//! [`flush`](SubCollection::flush) at the start of the Main's next cycle,
//! before any callback of that cycle runs, so a cycle always iterates the list
//! as it was when the cycle started.
//!
//! ## Flush
//!
//! 1. Removals: for each staged id still in `active`, fire
//!    `before_sub_removed`, drop it from `active`, release the Sub.
//! 2. Additions: append each staged Sub to `active` and fire
//!    `after_sub_added`. Subs destroyed while pending are released instead.
//! 3. Sort `active` by (priority, insertion order) and clear both queues.
//!
//! A Sub staged for removal while still pending add is not in `active` yet, so
//! step 1 skips it and step 2 activates it: the active set after a flush is
//! `(previous − removed) ∪ added`.

use std::collections::HashMap;

use super::behaviour::{Behaviour, downcast_ref};
use super::id::SubId;
use super::lifecycle::MainHooks;
use super::sub_entity::Sub;

#[derive(Default)]
pub(crate) struct SubCollection {
    slots: HashMap<SubId, Sub>,
    active: Vec<SubId>,
    pending_add: Vec<SubId>,
    pending_remove: Vec<SubId>,
    next_seq: u64,
}

/// What a flush released, so the store can forget the ids.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct FlushOutcome {
    pub released: Vec<SubId>,
}

impl SubCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Skip past `n` orders already handed out by a builder.
    pub fn reserve_seq(&mut self, n: u64) {
        self.next_seq = self.next_seq.max(n);
    }

    /// Place an authored sub straight into the active list. Only used while
    /// the owning Main initializes; call [`sort_active`](Self::sort_active)
    /// once all are in.
    pub fn insert_active(&mut self, sub: Sub) {
        self.active.push(sub.id);
        self.slots.insert(sub.id, sub);
    }

    /// Stage a live-added sub for activation at the next flush.
    pub fn insert_pending(&mut self, sub: Sub) {
        let id = sub.id;
        sub.priority.stage(&mut self.pending_add, id);
        self.slots.insert(id, sub);
    }

    /// Stage `id` for removal. Returns `false` if it is not attached here.
    pub fn stage_remove(&mut self, id: SubId) -> bool {
        if !self.slots.contains_key(&id) {
            return false;
        }
        if !self.pending_remove.contains(&id) {
            self.pending_remove.push(id);
        }
        true
    }

    pub fn flush(&mut self, hooks: &mut MainHooks) -> FlushOutcome {
        let mut outcome = FlushOutcome::default();
        if self.pending_remove.is_empty() && self.pending_add.is_empty() {
            return outcome;
        }

        for id in std::mem::take(&mut self.pending_remove) {
            let Some(pos) = self.active.iter().position(|a| *a == id) else {
                continue;
            };
            hooks.before_sub_removed.fire(id);
            self.active.remove(pos);
            self.slots.remove(&id);
            outcome.released.push(id);
        }

        for id in std::mem::take(&mut self.pending_add) {
            let destroyed = match self.slots.get(&id) {
                Some(sub) => sub.state.is_destroyed(),
                None => continue,
            };
            if destroyed {
                self.slots.remove(&id);
                outcome.released.push(id);
                continue;
            }
            self.active.push(id);
            hooks.after_sub_added.fire(id);
        }

        self.sort_active();
        outcome
    }

    /// Order `active` by priority, ties by insertion order.
    pub fn sort_active(&mut self) {
        let slots = &self.slots;
        self.active
            .sort_by_key(|id| slots.get(id).map(Sub::order_key).unwrap_or((i32::MAX, u64::MAX)));
    }

    pub fn active(&self) -> &[SubId] {
        &self.active
    }

    pub fn pending_add(&self) -> &[SubId] {
        &self.pending_add
    }

    pub fn pending_remove(&self) -> &[SubId] {
        &self.pending_remove
    }

    pub fn get(&self, id: SubId) -> Option<&Sub> {
        self.slots.get(&id)
    }

    pub fn get_mut(&mut self, id: SubId) -> Option<&mut Sub> {
        self.slots.get_mut(&id)
    }

    /// Active, not destroyed, subs whose behaviour is a `T`. Matches on the
    /// type recorded at attach time, so a sub whose behaviour is running is
    /// still found.
    fn active_of<T: Behaviour>(&self) -> impl Iterator<Item = &Sub> {
        self.active
            .iter()
            .filter_map(|id| self.slots.get(id))
            .filter(|sub| !sub.state.is_destroyed() && sub.is_of::<T>())
    }

    pub fn first_of<T: Behaviour>(&self) -> Option<SubId> {
        self.active_of::<T>().next().map(|sub| sub.id)
    }

    pub fn all_of<T: Behaviour>(&self) -> Vec<SubId> {
        self.active_of::<T>().map(|sub| sub.id).collect()
    }

    /// First `T` sub that is attached, active or pending, and not destroyed.
    pub fn first_attached_of<T: Behaviour>(&self) -> Option<SubId> {
        self.active.iter().chain(self.pending_add.iter()).copied().find(|id| {
            self.slots
                .get(id)
                .is_some_and(|sub| !sub.state.is_destroyed() && sub.is_of::<T>())
        })
    }

    pub fn behaviour<T: Behaviour>(&self, id: SubId) -> Option<&T> {
        self.slots
            .get(&id)
            .and_then(|sub| sub.behaviour.as_deref())
            .and_then(downcast_ref::<T>)
    }

    /// Every attached sub in dispatch order: active first, then pending.
    pub fn attached(&self) -> Vec<SubId> {
        self.active
            .iter()
            .chain(self.pending_add.iter())
            .copied()
            .collect()
    }

    /// Take ownership of every sub, for release with the owning Main.
    pub fn drain(&mut self) -> Vec<Sub> {
        let order = self.attached();
        self.active.clear();
        self.pending_add.clear();
        self.pending_remove.clear();
        let mut subs: Vec<Sub> = order.iter().filter_map(|id| self.slots.remove(id)).collect();
        subs.extend(self.slots.drain().map(|(_, sub)| sub));
        subs
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::entity::id::{EntityId, MainId};
    use crate::entity::lifecycle::LifecycleState;
    use crate::entity::sub_entity::{Priority, SubDesc};

    struct Marker;
    impl Behaviour for Marker {}

    struct Other;
    impl Behaviour for Other {}

    fn id(index: u32) -> SubId {
        SubId(EntityId {
            index,
            generation: 0,
        })
    }

    fn main_id() -> MainId {
        MainId(EntityId {
            index: 999,
            generation: 0,
        })
    }

    fn sub(collection: &mut SubCollection, index: u32, priority: i32) -> Sub {
        let seq = collection.next_seq();
        let desc = SubDesc::new(Marker).priority(Priority::new(priority).unwrap());
        Sub::attach(id(index), main_id(), seq, desc)
    }

    fn recording_hooks() -> (MainHooks, Rc<RefCell<Vec<String>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = MainHooks::default();
        let l = log.clone();
        hooks.after_sub_added.add(move |id| l.borrow_mut().push(format!("+{}", id.0.index)));
        let l = log.clone();
        hooks.before_sub_removed.add(move |id| l.borrow_mut().push(format!("-{}", id.0.index)));
        (hooks, log)
    }

    #[test]
    fn pending_is_invisible_until_flush() {
        let mut c = SubCollection::new();
        let s = sub(&mut c, 1, 1);
        c.insert_pending(s);
        assert!(c.active().is_empty());
        assert_eq!(c.first_of::<Marker>(), None);

        let (mut hooks, log) = recording_hooks();
        c.flush(&mut hooks);
        assert_eq!(c.active(), &[id(1)]);
        assert_eq!(c.first_of::<Marker>(), Some(id(1)));
        assert_eq!(*log.borrow(), vec!["+1"]);
    }

    #[test]
    fn priority_order_after_flush() {
        let mut c = SubCollection::new();
        for (index, priority) in [(3, 3), (1, 1), (2, 2)] {
            let s = sub(&mut c, index, priority);
            c.insert_pending(s);
        }
        c.flush(&mut MainHooks::default());
        assert_eq!(c.active(), &[id(1), id(2), id(3)]);
    }

    #[test]
    fn ties_keep_insertion_order_across_flushes() {
        let mut c = SubCollection::new();
        let a = sub(&mut c, 1, 4);
        c.insert_pending(a);
        c.flush(&mut MainHooks::default());

        let b = sub(&mut c, 2, 4);
        let early = sub(&mut c, 3, 2);
        c.insert_pending(b);
        c.insert_pending(early);
        c.flush(&mut MainHooks::default());

        assert_eq!(c.active(), &[id(3), id(1), id(2)]);
    }

    #[test]
    fn removal_waits_for_flush_and_fires_hook_first() {
        let mut c = SubCollection::new();
        let s = sub(&mut c, 1, 1);
        c.insert_pending(s);
        let (mut hooks, log) = recording_hooks();
        c.flush(&mut hooks);

        assert!(c.stage_remove(id(1)));
        assert_eq!(c.active(), &[id(1)]);

        let outcome = c.flush(&mut hooks);
        assert!(c.active().is_empty());
        assert!(c.get(id(1)).is_none());
        assert_eq!(outcome.released, vec![id(1)]);
        assert_eq!(*log.borrow(), vec!["+1", "-1"]);
    }

    #[test]
    fn removes_before_adds() {
        let mut c = SubCollection::new();
        let old = sub(&mut c, 1, 1);
        c.insert_pending(old);
        c.flush(&mut MainHooks::default());

        let new = sub(&mut c, 2, 1);
        c.insert_pending(new);
        c.stage_remove(id(1));

        let (mut hooks, log) = recording_hooks();
        c.flush(&mut hooks);
        assert_eq!(*log.borrow(), vec!["-1", "+2"]);
        assert_eq!(c.active(), &[id(2)]);
    }

    #[test]
    fn destroyed_while_pending_is_never_activated() {
        let mut c = SubCollection::new();
        let s = sub(&mut c, 1, 1);
        c.insert_pending(s);
        c.get_mut(id(1)).unwrap().state = LifecycleState::Destroyed;
        c.stage_remove(id(1));

        let (mut hooks, log) = recording_hooks();
        let outcome = c.flush(&mut hooks);
        assert!(c.active().is_empty());
        assert_eq!(outcome.released, vec![id(1)]);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn stage_remove_of_unknown_is_false() {
        let mut c = SubCollection::new();
        assert!(!c.stage_remove(id(42)));
    }

    #[test]
    fn typed_lookup_filters_by_type() {
        let mut c = SubCollection::new();
        let m = sub(&mut c, 1, 1);
        c.insert_pending(m);
        let seq = c.next_seq();
        let o = Sub::attach(id(2), main_id(), seq, SubDesc::new(Other).priority(Priority::new(2).unwrap()));
        c.insert_pending(o);
        c.flush(&mut MainHooks::default());

        assert_eq!(c.all_of::<Marker>(), vec![id(1)]);
        assert_eq!(c.first_of::<Other>(), Some(id(2)));
        assert!(c.behaviour::<Other>(id(2)).is_some());
        assert!(c.behaviour::<Marker>(id(2)).is_none());
    }

    #[test]
    fn drain_returns_active_then_pending() {
        let mut c = SubCollection::new();
        let a = sub(&mut c, 1, 1);
        c.insert_pending(a);
        c.flush(&mut MainHooks::default());
        let b = sub(&mut c, 2, 1);
        c.insert_pending(b);

        let ids: Vec<SubId> = c.drain().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![id(1), id(2)]);
        assert!(c.attached().is_empty());
    }
}
