//! Main entities: the composite root owning a set of Subs.

use std::fmt;

use super::behaviour::Behaviour;
use super::collection::SubCollection;
use super::id::MainId;
use super::lifecycle::{ChannelSet, LifecycleState, MainHooks, SceneMarker};
use super::sub_entity::SubDesc;
use crate::schedule::Subscription;

/// An uninitialized Main.
///
/// Collects everything authored before the Main goes live: its behaviour,
/// scene restriction, starting subs and hooks. Hand it to
/// [`World::initialize`](crate::world::World::initialize) to bind its
/// identity.
pub struct MainBuilder {
    pub(crate) behaviour: Box<dyn Behaviour>,
    pub(crate) scene: SceneMarker,
    /// Starting subs, positioned by priority as they are staged.
    pub(crate) starting: Vec<(u64, SubDesc)>,
    pub(crate) hooks: MainHooks,
}

impl MainBuilder {
    pub fn new(behaviour: impl Behaviour) -> Self {
        Self {
            behaviour: Box::new(behaviour),
            scene: SceneMarker::All,
            starting: Vec::new(),
            hooks: MainHooks::default(),
        }
    }

    /// Restrict which scene this Main may be initialized in.
    pub fn scene(mut self, scene: SceneMarker) -> Self {
        self.scene = scene;
        self
    }

    /// Stage an authored Sub. It is initialized together with the Main and
    /// goes straight into the active list.
    pub fn with_sub(mut self, sub: SubDesc) -> Self {
        self.stage_sub(sub);
        self
    }

    pub fn stage_sub(&mut self, sub: SubDesc) {
        let order = self.starting.len() as u64;
        let priority = sub.priority;
        priority.stage(&mut self.starting, (order, sub));
    }

    pub fn hooks_mut(&mut self) -> &mut MainHooks {
        &mut self.hooks
    }

    pub fn starting_len(&self) -> usize {
        self.starting.len()
    }
}

/// A live Main.
pub struct Main {
    pub(crate) id: MainId,
    pub(crate) scene: SceneMarker,
    pub(crate) state: LifecycleState,
    /// `None` while one of its methods is running.
    pub(crate) behaviour: Option<Box<dyn Behaviour>>,
    pub(crate) subs: SubCollection,
    /// Channels this Main asked to run on.
    pub(crate) channels: ChannelSet,
    /// Scheduler handles, once the subscription has been applied.
    pub(crate) subscriptions: [Option<Subscription>; 3],
    pub(crate) hooks: MainHooks,
}

impl Main {
    pub(crate) fn new(id: MainId, scene: SceneMarker, behaviour: Box<dyn Behaviour>, hooks: MainHooks) -> Self {
        Self {
            id,
            scene,
            state: LifecycleState::Initialized,
            behaviour: Some(behaviour),
            subs: SubCollection::new(),
            channels: ChannelSet::NONE,
            subscriptions: [None; 3],
            hooks,
        }
    }

    pub fn id(&self) -> MainId {
        self.id
    }

    pub fn scene(&self) -> &SceneMarker {
        &self.scene
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn channels(&self) -> ChannelSet {
        self.channels
    }

    pub fn hooks_mut(&mut self) -> &mut MainHooks {
        &mut self.hooks
    }
}

impl fmt::Debug for Main {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Main")
            .field("id", &self.id)
            .field("scene", &self.scene)
            .field("state", &self.state)
            .field("active_subs", &self.subs.active().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::sub_entity::Priority;

    struct Nop;
    impl Behaviour for Nop {}

    #[test]
    fn starting_subs_are_positioned_by_priority() {
        let p = |v| Priority::new(v).unwrap();
        let builder = MainBuilder::new(Nop)
            .with_sub(SubDesc::new(Nop).priority(p(5)))
            .with_sub(SubDesc::new(Nop).priority(p(1)));

        let priorities: Vec<i32> = builder.starting.iter().map(|(_, s)| s.priority.get()).collect();
        assert_eq!(priorities, vec![1, 5]);
        // Authoring order is kept for tie breaking.
        let orders: Vec<u64> = builder.starting.iter().map(|(o, _)| *o).collect();
        assert_eq!(orders, vec![1, 0]);
    }

    #[test]
    fn default_scene_is_unrestricted() {
        let builder = MainBuilder::new(Nop);
        assert_eq!(builder.scene, SceneMarker::All);
        assert_eq!(builder.starting_len(), 0);
    }
}
