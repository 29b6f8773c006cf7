//! # Lifecycle — States, Hooks and Scene Affinity
//!
//! Mains and Subs share one state machine:
//!
//! ```text
//!  MainBuilder ──initialize──► Initialized ──► Enabled ⇄ Disabled
//!  (uninitialized)                                 │         │
//!                                                  └────┬────┘
//!                                                       ▼
//!                                                   Destroyed
//! ```
//!
//! The uninitialized state is a separate type ([`MainBuilder`]), so an
//! operation before initialization, or a second initialization, cannot be
//! written at all. `Initialized` is only observable from inside `init`
//! callbacks; once they return the entity is `Enabled`.
//!
//! [`MainBuilder`]: super::MainBuilder

use std::fmt;

use serde::{Deserialize, Serialize};

use super::id::{MainId, SubId};
use crate::schedule::Channel;

/// Where an entity is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Identity bound, `init` running.
    Initialized,
    Enabled,
    Disabled,
    /// Terminal.
    Destroyed,
}

impl LifecycleState {
    pub fn is_enabled(self) -> bool {
        self == LifecycleState::Enabled
    }

    pub fn is_destroyed(self) -> bool {
        self == LifecycleState::Destroyed
    }
}

/// How `enable_this` / `disable_this` change the participation flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnableSemantics {
    /// Enable sets the flag, disable clears it. Repeating a call is a no-op
    /// apart from firing the hook again.
    #[default]
    Set,
    /// Both calls flip the flag, so two enables in a row leave the entity
    /// disabled. Kept for content authored against the legacy behaviour.
    Toggle,
}

impl EnableSemantics {
    /// The new participation flag after a request to become `requested`.
    pub fn resolve(self, current: bool, requested: bool) -> bool {
        match self {
            EnableSemantics::Set => requested,
            EnableSemantics::Toggle => !current,
        }
    }
}

/// A list of listeners fired with an argument of type `A`.
pub struct Hook<A> {
    listeners: Vec<Box<dyn FnMut(A)>>,
}

impl<A: Copy> Hook<A> {
    pub fn add(&mut self, listener: impl FnMut(A) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub(crate) fn fire(&mut self, arg: A) {
        for listener in &mut self.listeners {
            listener(arg);
        }
    }
}

impl<A> Default for Hook<A> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }
}

impl<A> fmt::Debug for Hook<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hook({} listeners)", self.listeners.len())
    }
}

/// Hooks every entity has, fired with the entity's own id.
#[derive(Debug)]
pub struct EntityHooks<Id> {
    pub after_enabled: Hook<Id>,
    pub after_disabled: Hook<Id>,
    pub before_destroyed: Hook<Id>,
}

impl<Id> Default for EntityHooks<Id> {
    fn default() -> Self {
        Self {
            after_enabled: Hook::default(),
            after_disabled: Hook::default(),
            before_destroyed: Hook::default(),
        }
    }
}

/// Hooks a Main carries on top of the shared ones.
#[derive(Debug, Default)]
pub struct MainHooks {
    pub lifecycle: EntityHooks<MainId>,
    /// Fired at flush time, right after a sub joins the active list.
    pub after_sub_added: Hook<SubId>,
    /// Fired at flush time, right before a sub leaves the active list.
    pub before_sub_removed: Hook<SubId>,
    /// Fired for outside observers when the main is destroyed, after its
    /// subs and before its own `before_destroyed`.
    pub before_main_destroyed: Hook<MainId>,
}

/// The channels an entity takes part in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ChannelSet([bool; 3]);

impl ChannelSet {
    pub const NONE: ChannelSet = ChannelSet([false; 3]);
    pub const ALL: ChannelSet = ChannelSet([true; 3]);

    pub fn insert(&mut self, channel: Channel) -> bool {
        !std::mem::replace(&mut self.0[channel.index()], true)
    }

    pub fn remove(&mut self, channel: Channel) -> bool {
        std::mem::replace(&mut self.0[channel.index()], false)
    }

    pub fn contains(self, channel: Channel) -> bool {
        self.0[channel.index()]
    }

    pub fn is_empty(self) -> bool {
        self == Self::NONE
    }

    pub fn iter(self) -> impl Iterator<Item = Channel> {
        Channel::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Channel> for ChannelSet {
    fn from_iter<I: IntoIterator<Item = Channel>>(iter: I) -> Self {
        let mut set = ChannelSet::NONE;
        for channel in iter {
            set.insert(channel);
        }
        set
    }
}

/// Opaque scene tag restricting where a Main may exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneMarker {
    /// May be initialized in any scene.
    #[default]
    All,
    Named(String),
}

impl SceneMarker {
    pub fn named(name: impl Into<String>) -> Self {
        SceneMarker::Named(name.into())
    }

    /// Whether an entity carrying this marker may live in `scene`.
    pub fn allows(&self, scene: &SceneMarker) -> bool {
        *self == SceneMarker::All || self == scene
    }
}

impl fmt::Display for SceneMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneMarker::All => f.write_str("*"),
            SceneMarker::Named(name) => f.write_str(name),
        }
    }
}

/// What a Main is initialized against. Built by the host's scene management.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneContext {
    scene: SceneMarker,
}

impl SceneContext {
    pub fn new(scene: SceneMarker) -> Self {
        Self { scene }
    }

    pub fn scene(&self) -> &SceneMarker {
        &self.scene
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn set_semantics_are_idempotent() {
        let s = EnableSemantics::Set;
        assert!(s.resolve(true, true));
        assert!(s.resolve(false, true));
        assert!(!s.resolve(false, false));
    }

    #[test]
    fn toggle_semantics_flip() {
        let s = EnableSemantics::Toggle;
        assert!(!s.resolve(true, true));
        assert!(s.resolve(false, false));
    }

    #[test]
    fn hook_fires_every_listener_in_order() {
        let total = Rc::new(Cell::new(0));
        let mut hook = Hook::<u32>::default();
        let t = total.clone();
        hook.add(move |n| t.set(t.get() * 10 + n));
        let t = total.clone();
        hook.add(move |n| t.set(t.get() * 10 + n + 1));

        hook.fire(1);
        assert_eq!(total.get(), 12);
        assert_eq!(hook.len(), 2);
    }

    #[test]
    fn channel_set_basics() {
        let mut set = ChannelSet::NONE;
        assert!(set.insert(Channel::PostStep));
        assert!(!set.insert(Channel::PostStep));
        assert!(set.contains(Channel::PostStep));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Channel::PostStep]);
        assert!(set.remove(Channel::PostStep));
        assert!(set.is_empty());

        let all: ChannelSet = Channel::ALL.into_iter().collect();
        assert_eq!(all, ChannelSet::ALL);
    }

    #[test]
    fn scene_marker_affinity() {
        let demo = SceneMarker::named("demo");
        assert!(SceneMarker::All.allows(&demo));
        assert!(demo.allows(&demo));
        assert!(!demo.allows(&SceneMarker::named("menu")));
        assert!(!demo.allows(&SceneMarker::All));
    }

    #[test]
    fn scene_marker_from_json() {
        let m: SceneMarker = serde_json::from_str(r#"{ "named": "demo" }"#).unwrap();
        assert_eq!(m, SceneMarker::named("demo"));
        let all: SceneMarker = serde_json::from_str(r#""all""#).unwrap();
        assert_eq!(all, SceneMarker::All);
    }
}
