//! # Entities — The Live Graph of Mains and Their Subs
//!
//! [`Entities`] owns every live [`Main`]; each Main owns its Subs through its
//! collection. Subs are found by id through a non-owning `SubId → MainId`
//! index, which is the only back-reference in the graph.
//!
//! ```text
//! Entities
//!  ├─ mains:  MainId → Main ─┬─ behaviour
//!  │                         ├─ hooks
//!  │                         └─ subs: SubCollection ─ SubId → Sub
//!  ├─ owners: SubId → MainId
//!  └─ commands: scheduler changes waiting to be applied
//! ```
//!
//! ## Calling Behaviours
//!
//! A behaviour method receives a [`Context`] holding `&mut Entities`, so it
//! can add subs, destroy things, or look at other mains. To make that
//! possible the behaviour is lifted out of its slot for the duration of the
//! call and put back afterwards. If its entity was destroyed in the meantime
//! there is nowhere to put it back and it is dropped.
//!
//! ## Scheduler Changes
//!
//! `Entities` is the context scheduler callbacks run against, so it cannot
//! reach the scheduler itself while a step is running. Subscriptions and
//! unsubscriptions are queued as commands and applied by the
//! [`World`](crate::world::World) once the current operation or step
//! returns. A Main destroyed mid-step is skipped by its pending callback,
//! which finds no Main to run.

use std::collections::HashMap;

use super::behaviour::{Behaviour, downcast_mut, downcast_ref, run_channel};
use super::context::{Context, This};
use super::id::{EntityAllocator, MainId, SubId};
use super::lifecycle::{EnableSemantics, EntityHooks, LifecycleState, MainHooks, SceneContext};
use super::main_entity::{Main, MainBuilder};
use super::sub_entity::{Priority, Sub, SubDesc};
use crate::error::{ConfigurationError, LifecycleMisuse, Result};
use crate::schedule::{Channel, Subscription, UpdateScheduler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SchedulerCommand {
    Subscribe { main: MainId, channel: Channel },
    Unsubscribe(Subscription),
}

#[derive(Debug, Clone, Copy)]
enum Call {
    Init,
    Channel(Channel),
}

pub struct Entities {
    allocator: EntityAllocator,
    mains: HashMap<MainId, Main>,
    owners: HashMap<SubId, MainId>,
    commands: Vec<SchedulerCommand>,
    semantics: EnableSemantics,
}

impl Entities {
    pub fn new(semantics: EnableSemantics) -> Self {
        Self {
            allocator: EntityAllocator::new(),
            mains: HashMap::new(),
            owners: HashMap::new(),
            commands: Vec::new(),
            semantics,
        }
    }

    pub fn enable_semantics(&self) -> EnableSemantics {
        self.semantics
    }

    // ── Initialization ───────────────────────────────────────────────

    /// Bring `builder` to life in `context`.
    ///
    /// Binds the Main's identity, attaches and initializes its authored subs
    /// in priority order, then runs the Main's own `init`. A Main whose scene
    /// marker does not allow `context` is rejected and nothing is created.
    pub fn initialize(&mut self, builder: MainBuilder, context: &SceneContext) -> Result<MainId> {
        if !builder.scene.allows(context.scene()) {
            log::error!(
                "main restricted to scene `{}` cannot be initialized in `{}`",
                builder.scene,
                context.scene()
            );
            return Err(ConfigurationError::SceneMismatch {
                required: builder.scene,
                actual: context.scene().clone(),
            }
            .into());
        }

        let MainBuilder {
            behaviour,
            scene,
            starting,
            hooks,
        } = builder;

        let id = MainId(self.allocator.allocate());
        let mut main = Main::new(id, scene, behaviour, hooks);

        let authored = starting.len() as u64;
        for (order, desc) in starting {
            let sub_id = SubId(self.allocator.allocate());
            main.subs.insert_active(Sub::attach(sub_id, id, order, desc));
            self.owners.insert(sub_id, id);
        }
        main.subs.reserve_seq(authored);
        main.subs.sort_active();
        let authored_ids = main.subs.active().to_vec();

        self.mains.insert(id, main);
        log::debug!("{id} initialized with {} authored subs", authored_ids.len());

        for sub in authored_ids {
            if !self.mains.contains_key(&id) {
                // An authored sub's init tore the main down.
                return Ok(id);
            }
            self.call_sub(id, sub, Call::Init);
            self.finish_init_sub(id, sub);
        }

        self.call_main(id, Call::Init);
        if let Some(main) = self.mains.get_mut(&id) {
            if main.state == LifecycleState::Initialized {
                main.state = LifecycleState::Enabled;
            }
        }
        Ok(id)
    }

    fn finish_init_sub(&mut self, main: MainId, sub: SubId) {
        if let Some(s) = self.mains.get_mut(&main).and_then(|m| m.subs.get_mut(sub)) {
            if s.state == LifecycleState::Initialized {
                s.state = LifecycleState::Enabled;
            }
        }
    }

    // ── Sub management ───────────────────────────────────────────────

    /// Attach a new sub to `main` at runtime.
    ///
    /// The sub is initialized immediately but only joins the active list at
    /// the main's next flush, where `after_sub_added` fires.
    pub fn add_sub(&mut self, main: MainId, desc: SubDesc) -> Result<SubId> {
        let Some(m) = self.mains.get_mut(&main) else {
            log::error!("cannot attach a sub to {main}: it is not live");
            return Err(ConfigurationError::UnreachableMain(main).into());
        };

        let id = SubId(self.allocator.allocate());
        let seq = m.subs.next_seq();
        m.subs.insert_pending(Sub::attach(id, main, seq, desc));
        self.owners.insert(id, main);
        log::debug!("{id} staged on {main}");

        self.call_sub(main, id, Call::Init);
        self.finish_init_sub(main, id);
        Ok(id)
    }

    /// The first sub of type `T` attached to `main`, or a new one from
    /// `make`. Subs waiting for the next flush count, and so does a running
    /// `T` sub, so calling this from a `T` returns the
    /// caller instead of adding a second one.
    pub fn add_or_get_sub<T: Behaviour>(
        &mut self,
        main: MainId,
        priority: Priority,
        make: impl FnOnce() -> T,
    ) -> Result<SubId> {
        let existing = self.mains.get(&main).and_then(|m| m.subs.first_attached_of::<T>());
        if let Some(existing) = existing {
            return Ok(existing);
        }
        self.add_sub(main, SubDesc::new(make()).priority(priority))
    }

    /// Stage `sub` for removal at its main's next flush.
    pub fn remove_sub(&mut self, sub: SubId) -> Result<()> {
        let main = self.owner_of(sub)?;
        let staged = self
            .mains
            .get_mut(&main)
            .is_some_and(|m| m.subs.stage_remove(sub));
        if staged {
            log::debug!("{sub} staged for removal from {main}");
            Ok(())
        } else {
            Err(misuse(LifecycleMisuse::DeadSub(sub)))
        }
    }

    // ── Enable / disable ─────────────────────────────────────────────

    pub fn enable_main(&mut self, main: MainId) -> Result<()> {
        self.set_main_enabled(main, true)
    }

    pub fn disable_main(&mut self, main: MainId) -> Result<()> {
        self.set_main_enabled(main, false)
    }

    fn set_main_enabled(&mut self, id: MainId, requested: bool) -> Result<()> {
        let semantics = self.semantics;
        let main = self
            .mains
            .get_mut(&id)
            .ok_or_else(|| misuse(LifecycleMisuse::DeadMain(id)))?;

        let enabled = semantics.resolve(main.state.is_enabled(), requested);
        main.state = if enabled {
            LifecycleState::Enabled
        } else {
            LifecycleState::Disabled
        };
        log::debug!("{id} is now {:?}", main.state);

        let hooks = &mut main.hooks.lifecycle;
        if requested {
            hooks.after_enabled.fire(id);
        } else {
            hooks.after_disabled.fire(id);
        }
        Ok(())
    }

    pub fn enable_sub(&mut self, sub: SubId) -> Result<()> {
        self.set_sub_enabled(sub, true)
    }

    pub fn disable_sub(&mut self, sub: SubId) -> Result<()> {
        self.set_sub_enabled(sub, false)
    }

    fn set_sub_enabled(&mut self, id: SubId, requested: bool) -> Result<()> {
        let semantics = self.semantics;
        let sub = self.live_sub_mut(id)?;

        let enabled = semantics.resolve(sub.state.is_enabled(), requested);
        sub.state = if enabled {
            LifecycleState::Enabled
        } else {
            LifecycleState::Disabled
        };
        log::debug!("{id} is now {:?}", sub.state);

        if requested {
            sub.hooks.after_enabled.fire(id);
        } else {
            sub.hooks.after_disabled.fire(id);
        }
        Ok(())
    }

    /// Enable the game object `sub` lives on: its whole main if the sub sits
    /// on the main's root, otherwise just the sub.
    pub fn enable_game_object(&mut self, sub: SubId) -> Result<()> {
        match self.game_object_main(sub) {
            Some(main) => self.enable_main(main),
            None => self.enable_sub(sub),
        }
    }

    /// Disable the game object `sub` lives on. Same root rule as
    /// [`enable_game_object`](Self::enable_game_object).
    pub fn disable_game_object(&mut self, sub: SubId) -> Result<()> {
        match self.game_object_main(sub) {
            Some(main) => self.disable_main(main),
            None => self.disable_sub(sub),
        }
    }

    /// The main standing for `sub`'s game object. `None` when the sub sits
    /// off the main's root or is not live.
    pub fn game_object_main(&self, sub: SubId) -> Option<MainId> {
        let main = *self.owners.get(&sub)?;
        let s = self.mains.get(&main)?.subs.get(sub)?;
        (s.root && !s.state.is_destroyed()).then_some(main)
    }

    // ── Destruction ──────────────────────────────────────────────────

    /// Destroy `main` and, with it, every attached sub.
    ///
    /// Order: scheduler subscriptions are dropped, each sub's
    /// `before_destroyed` fires, then `before_main_destroyed`, then the main's
    /// own `before_destroyed`, and finally everything is released.
    ///
    /// Subscriptions still held here are only queued for cancellation. Take
    /// them out first with [`take_subscriptions`](Self::take_subscriptions)
    /// to have them gone before any hook fires. A main destroyed mid-step
    /// cannot do that; its callbacks find no main and do nothing until the
    /// step returns and they are cancelled.
    pub fn destroy_main(&mut self, id: MainId) -> Result<()> {
        let mut main = self
            .mains
            .remove(&id)
            .ok_or_else(|| misuse(LifecycleMisuse::DeadMain(id)))?;
        main.state = LifecycleState::Destroyed;

        for subscription in main.subscriptions.iter_mut().filter_map(Option::take) {
            self.commands.push(SchedulerCommand::Unsubscribe(subscription));
        }
        main.channels = Default::default();

        for mut sub in main.subs.drain() {
            if !sub.state.is_destroyed() {
                sub.state = LifecycleState::Destroyed;
                sub.hooks.before_destroyed.fire(sub.id);
            }
            self.owners.remove(&sub.id);
            self.allocator.release(sub.id.0);
        }

        main.hooks.before_main_destroyed.fire(id);
        main.hooks.lifecycle.before_destroyed.fire(id);
        self.allocator.release(id.0);
        log::debug!("{id} destroyed");
        Ok(())
    }

    /// Destroy one sub. It stops running at once and leaves its main's active
    /// list at the next flush.
    pub fn destroy_sub(&mut self, id: SubId) -> Result<()> {
        let main = self.owner_of(id)?;
        let sub = self.live_sub_mut(id)?;
        sub.state = LifecycleState::Destroyed;
        sub.hooks.before_destroyed.fire(id);
        if let Some(m) = self.mains.get_mut(&main) {
            m.subs.stage_remove(id);
        }
        log::debug!("{id} destroyed");
        Ok(())
    }

    /// Destroy the game object `sub` lives on: the whole main if the sub sits
    /// on the main's root, otherwise just the sub.
    pub fn destroy_sub_game_object(&mut self, id: SubId) -> Result<()> {
        match self.game_object_main(id) {
            Some(main) => self.destroy_main(main),
            None => self.destroy_sub(id),
        }
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    /// One update cycle of `main` on `channel`: flush, own logic, then each
    /// active sub subscribed to `channel`, in priority order.
    pub(crate) fn run_cycle(&mut self, id: MainId, channel: Channel) {
        let Some(main) = self.mains.get_mut(&id) else {
            return;
        };

        let outcome = main.subs.flush(&mut main.hooks);
        let enabled = main.state.is_enabled();
        for released in outcome.released {
            self.owners.remove(&released);
            self.allocator.release(released.0);
        }
        if !enabled {
            return;
        }

        self.call_main(id, Call::Channel(channel));

        let Some(active) = self.mains.get(&id).map(|m| m.subs.active().to_vec()) else {
            return;
        };
        for sub in active {
            let runs = match self.mains.get(&id) {
                Some(m) => m
                    .subs
                    .get(sub)
                    .is_some_and(|s| s.state.is_enabled() && s.channels.contains(channel)),
                None => return,
            };
            if runs {
                self.call_sub(id, sub, Call::Channel(channel));
            }
        }
    }

    fn call_main(&mut self, id: MainId, call: Call) {
        let Some(mut behaviour) = self.mains.get_mut(&id).and_then(|m| m.behaviour.take()) else {
            return;
        };
        {
            let mut cx = Context::new(self, This::Main(id));
            invoke(behaviour.as_mut(), call, &mut cx);
        }
        if let Some(main) = self.mains.get_mut(&id) {
            main.behaviour = Some(behaviour);
        }
    }

    /// Runs `call` on `sub` unless it has been destroyed.
    fn call_sub(&mut self, main: MainId, sub: SubId, call: Call) {
        let Some(mut behaviour) = self
            .mains
            .get_mut(&main)
            .and_then(|m| m.subs.get_mut(sub))
            .filter(|s| !s.state.is_destroyed())
            .and_then(|s| s.behaviour.take())
        else {
            return;
        };
        log::trace!("{sub}: {call:?}");
        {
            let mut cx = Context::new(self, This::Sub { main, sub });
            invoke(behaviour.as_mut(), call, &mut cx);
        }
        if let Some(s) = self.mains.get_mut(&main).and_then(|m| m.subs.get_mut(sub)) {
            s.behaviour = Some(behaviour);
        }
    }

    // ── Channel participation ────────────────────────────────────────

    pub(crate) fn subscribe_main(&mut self, id: MainId, channel: Channel) -> Result<()> {
        let main = self
            .mains
            .get_mut(&id)
            .ok_or_else(|| misuse(LifecycleMisuse::DeadMain(id)))?;
        if main.channels.insert(channel) {
            self.commands.push(SchedulerCommand::Subscribe { main: id, channel });
        }
        Ok(())
    }

    pub(crate) fn unsubscribe_main(&mut self, id: MainId, channel: Channel) -> Result<()> {
        let main = self
            .mains
            .get_mut(&id)
            .ok_or_else(|| misuse(LifecycleMisuse::DeadMain(id)))?;
        if main.channels.remove(channel) {
            if let Some(subscription) = main.subscriptions[channel.index()].take() {
                self.commands.push(SchedulerCommand::Unsubscribe(subscription));
            }
        }
        Ok(())
    }

    pub(crate) fn subscribe_sub(&mut self, id: SubId, channel: Channel) -> Result<()> {
        self.live_sub_mut(id)?.channels.insert(channel);
        Ok(())
    }

    pub(crate) fn unsubscribe_sub(&mut self, id: SubId, channel: Channel) -> Result<()> {
        self.live_sub_mut(id)?.channels.remove(channel);
        Ok(())
    }

    /// Detach `main`'s live scheduler subscriptions so the caller can cancel
    /// them right away. Its channel set is left alone.
    pub(crate) fn take_subscriptions(&mut self, main: MainId) -> Vec<Subscription> {
        self.mains
            .get_mut(&main)
            .map(|m| m.subscriptions.iter_mut().filter_map(Option::take).collect())
            .unwrap_or_default()
    }

    /// Apply queued subscription changes to `scheduler`.
    pub(crate) fn apply_commands(&mut self, scheduler: &mut UpdateScheduler<Entities>) {
        for command in std::mem::take(&mut self.commands) {
            match command {
                SchedulerCommand::Subscribe { main, channel } => {
                    let Some(m) = self.mains.get_mut(&main) else {
                        continue;
                    };
                    let slot = &mut m.subscriptions[channel.index()];
                    if !m.channels.contains(channel) || slot.is_some() {
                        continue;
                    }
                    let subscription =
                        scheduler.subscribe(channel, move |entities: &mut Entities| {
                            entities.run_cycle(main, channel)
                        });
                    *slot = Some(subscription);
                    log::debug!("{main} runs on {channel:?} via {:?}", subscription.batch);
                }
                SchedulerCommand::Unsubscribe(subscription) => {
                    scheduler.cancel(subscription);
                }
            }
        }
    }

    pub(crate) fn has_pending_commands(&self) -> bool {
        !self.commands.is_empty()
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn main(&self, id: MainId) -> Option<&Main> {
        self.mains.get(&id)
    }

    pub fn is_live_main(&self, id: MainId) -> bool {
        self.allocator.is_alive(id.0) && self.mains.contains_key(&id)
    }

    pub fn main_count(&self) -> usize {
        self.mains.len()
    }

    /// Mains plus every attached sub, destroyed ones awaiting flush included.
    pub fn entity_count(&self) -> usize {
        self.allocator.alive_count()
    }

    pub fn main_ids(&self) -> impl Iterator<Item = MainId> + '_ {
        self.mains.keys().copied()
    }

    pub fn main_state(&self, id: MainId) -> Option<LifecycleState> {
        self.mains.get(&id).map(Main::state)
    }

    pub fn sub(&self, id: SubId) -> Option<&Sub> {
        let main = self.owners.get(&id)?;
        self.mains.get(main)?.subs.get(id)
    }

    /// Whether `id` is attached and not destroyed.
    pub fn is_live_sub(&self, id: SubId) -> bool {
        self.sub(id).is_some_and(|s| !s.state.is_destroyed())
    }

    pub fn sub_state(&self, id: SubId) -> Option<LifecycleState> {
        self.sub(id).map(Sub::state)
    }

    /// The main's active subs in invocation order. Empty for a dead main.
    pub fn active_subs(&self, main: MainId) -> &[SubId] {
        self.mains.get(&main).map_or(&[], |m| m.subs.active())
    }

    /// Subs added to `main` that are waiting for the next flush.
    pub fn pending_subs(&self, main: MainId) -> &[SubId] {
        self.mains.get(&main).map_or(&[], |m| m.subs.pending_add())
    }

    /// Subs of `main` staged for removal at the next flush.
    pub fn pending_removals(&self, main: MainId) -> &[SubId] {
        self.mains.get(&main).map_or(&[], |m| m.subs.pending_remove())
    }

    /// First active sub of `main` whose behaviour is a `T`, including one
    /// whose behaviour is running.
    pub fn sub_of_type<T: Behaviour>(&self, main: MainId) -> Option<SubId> {
        self.mains.get(&main)?.subs.first_of::<T>()
    }

    /// Every active sub of `main` whose behaviour is a `T`.
    pub fn subs_of_type<T: Behaviour>(&self, main: MainId) -> Vec<SubId> {
        self.mains
            .get(&main)
            .map(|m| m.subs.all_of::<T>())
            .unwrap_or_default()
    }

    /// The behaviour of the first active `T` sub of `main` that is not
    /// running.
    pub fn get_sub<T: Behaviour>(&self, main: MainId) -> Option<&T> {
        let m = self.mains.get(&main)?;
        m.subs
            .all_of::<T>()
            .into_iter()
            .find_map(|id| m.subs.behaviour::<T>(id))
    }

    /// The behaviours of every active `T` sub of `main`.
    pub fn get_subs<T: Behaviour>(&self, main: MainId) -> Vec<&T> {
        let Some(m) = self.mains.get(&main) else {
            return Vec::new();
        };
        m.subs
            .all_of::<T>()
            .into_iter()
            .filter_map(|id| m.subs.behaviour::<T>(id))
            .collect()
    }

    pub fn sub_behaviour<T: Behaviour>(&self, id: SubId) -> Option<&T> {
        let main = self.owners.get(&id)?;
        self.mains.get(main)?.subs.behaviour::<T>(id)
    }

    pub fn sub_behaviour_mut<T: Behaviour>(&mut self, id: SubId) -> Option<&mut T> {
        let main = self.owners.get(&id)?;
        self.mains
            .get_mut(main)?
            .subs
            .get_mut(id)?
            .behaviour
            .as_deref_mut()
            .and_then(downcast_mut::<T>)
    }

    pub fn main_behaviour<T: Behaviour>(&self, id: MainId) -> Option<&T> {
        self.mains
            .get(&id)?
            .behaviour
            .as_deref()
            .and_then(downcast_ref::<T>)
    }

    pub fn main_behaviour_mut<T: Behaviour>(&mut self, id: MainId) -> Option<&mut T> {
        self.mains
            .get_mut(&id)?
            .behaviour
            .as_deref_mut()
            .and_then(downcast_mut::<T>)
    }

    pub fn main_hooks_mut(&mut self, id: MainId) -> Option<&mut MainHooks> {
        self.mains.get_mut(&id).map(Main::hooks_mut)
    }

    pub fn sub_hooks_mut(&mut self, id: SubId) -> Option<&mut EntityHooks<SubId>> {
        let main = self.owners.get(&id)?;
        Some(&mut self.mains.get_mut(main)?.subs.get_mut(id)?.hooks)
    }

    fn owner_of(&self, sub: SubId) -> Result<MainId> {
        self.owners
            .get(&sub)
            .copied()
            .ok_or_else(|| misuse(LifecycleMisuse::DeadSub(sub)))
    }

    fn live_sub_mut(&mut self, id: SubId) -> Result<&mut Sub> {
        let main = self.owner_of(id)?;
        self.mains
            .get_mut(&main)
            .and_then(|m| m.subs.get_mut(id))
            .filter(|s| !s.state.is_destroyed())
            .ok_or_else(|| misuse(LifecycleMisuse::DeadSub(id)))
    }
}

fn invoke(behaviour: &mut dyn Behaviour, call: Call, cx: &mut Context<'_>) {
    match call {
        Call::Init => behaviour.init(cx),
        Call::Channel(channel) => run_channel(behaviour, channel, cx),
    }
}

fn misuse(err: LifecycleMisuse) -> crate::error::Error {
    log::warn!("{err}");
    err.into()
}
