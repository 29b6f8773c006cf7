//! Sub entities: a part attached to exactly one Main.

use std::any::{Any, TypeId};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::behaviour::Behaviour;
use super::id::{MainId, SubId};
use super::lifecycle::{ChannelSet, EntityHooks, LifecycleState};
use crate::error::ConfigurationError;

/// Invocation priority of a Sub within its Main: 1 runs first, 15 last.
///
/// Authoring tools may leave it [`UNASSIGNED`](Priority::UNASSIGNED) (-1);
/// such subs run after every assigned one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Priority(i32);

impl Priority {
    pub const MIN: i32 = 1;
    pub const MAX: i32 = 15;
    pub const UNASSIGNED: Priority = Priority(-1);

    pub fn new(value: i32) -> Result<Self, ConfigurationError> {
        if (Self::MIN..=Self::MAX).contains(&value) || value == Self::UNASSIGNED.0 {
            Ok(Priority(value))
        } else {
            Err(ConfigurationError::PriorityOutOfRange(value))
        }
    }

    pub fn get(self) -> i32 {
        self.0
    }

    pub fn is_assigned(self) -> bool {
        self != Self::UNASSIGNED
    }

    /// Ordering key for the active list.
    pub(crate) fn sort_key(self) -> i32 {
        if self.is_assigned() { self.0 } else { Self::MAX + 1 }
    }

    /// Insert `item` into a staging queue: at index `priority - 1`, or at the
    /// end when the queue is shorter than `priority`.
    pub(crate) fn stage<T>(self, queue: &mut Vec<T>, item: T) {
        let slot = if self.is_assigned() { self.0 as usize } else { usize::MAX };
        if queue.len() < slot {
            queue.push(item);
        } else {
            queue.insert(slot - 1, item);
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::UNASSIGNED
    }
}

impl TryFrom<i32> for Priority {
    type Error = ConfigurationError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Priority::new(value)
    }
}

impl From<Priority> for i32 {
    fn from(p: Priority) -> i32 {
        p.0
    }
}

impl fmt::Debug for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_assigned() {
            write!(f, "Priority({})", self.0)
        } else {
            f.write_str("Priority(unassigned)")
        }
    }
}

/// A Sub that has not been attached yet.
pub struct SubDesc {
    pub(crate) behaviour: Box<dyn Behaviour>,
    pub(crate) priority: Priority,
    pub(crate) root: bool,
    pub(crate) hooks: EntityHooks<SubId>,
}

impl SubDesc {
    pub fn new(behaviour: impl Behaviour) -> Self {
        Self {
            behaviour: Box::new(behaviour),
            priority: Priority::UNASSIGNED,
            root: false,
            hooks: EntityHooks::default(),
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// The Sub lives on its Main's root object, so destroying its game object
    /// destroys the whole Main.
    pub fn on_root(mut self) -> Self {
        self.root = true;
        self
    }

    /// Hooks to install before the Sub is initialized.
    pub fn hooks_mut(&mut self) -> &mut EntityHooks<SubId> {
        &mut self.hooks
    }
}

/// An attached Sub, owned by its Main's collection.
pub struct Sub {
    pub(crate) id: SubId,
    pub(crate) main: MainId,
    pub(crate) priority: Priority,
    /// Insertion order within the owning collection; breaks priority ties.
    pub(crate) seq: u64,
    pub(crate) root: bool,
    pub(crate) state: LifecycleState,
    pub(crate) channels: ChannelSet,
    /// Concrete type of `behaviour`, kept while the behaviour is lifted out.
    kind: TypeId,
    /// `None` while one of its methods is running.
    pub(crate) behaviour: Option<Box<dyn Behaviour>>,
    pub(crate) hooks: EntityHooks<SubId>,
}

impl Sub {
    pub(crate) fn attach(id: SubId, main: MainId, seq: u64, desc: SubDesc) -> Self {
        let behaviour: &dyn Any = desc.behaviour.as_ref();
        let kind = behaviour.type_id();
        Self {
            id,
            main,
            priority: desc.priority,
            seq,
            root: desc.root,
            state: LifecycleState::Initialized,
            channels: ChannelSet::NONE,
            kind,
            behaviour: Some(desc.behaviour),
            hooks: desc.hooks,
        }
    }

    pub fn id(&self) -> SubId {
        self.id
    }

    /// Back-reference to the owning Main.
    pub fn main(&self) -> MainId {
        self.main
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn channels(&self) -> ChannelSet {
        self.channels
    }

    pub fn is_root(&self) -> bool {
        self.root
    }

    pub(crate) fn order_key(&self) -> (i32, u64) {
        (self.priority.sort_key(), self.seq)
    }

    pub(crate) fn is_of<T: Behaviour>(&self) -> bool {
        self.kind == TypeId::of::<T>()
    }
}

impl fmt::Debug for Sub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sub")
            .field("id", &self.id)
            .field("main", &self.main)
            .field("priority", &self.priority)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
