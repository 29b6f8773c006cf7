//! # World — Composition Root
//!
//! [`World`] ties the three moving parts together:
//!
//! ```text
//! World
//!  ├─ singletons: Singletons            templates + live instances
//!  ├─ scheduler:  Shared<Scheduler>     resolved from `singletons`
//!  └─ entities:   Entities              mains, subs, queued scheduler changes
//! ```
//!
//! The tick source calls [`tick`](World::tick) (or [`step`](World::step) per
//! channel). Each step hands `&mut Entities` to the scheduler, whose callbacks
//! run one Main's cycle each.
//!
//! ## When Changes Land
//!
//! Every entity operation on `World` applies the scheduler changes it caused
//! before returning. Changes made from inside a running behaviour are applied
//! when the current step returns, so they show up on the next invocation of
//! the affected channel.
//!
//! # Example
//!
//! ```ignore
//! let mut world = World::new(Config::default())?;
//! let player = world.initialize(
//!     MainBuilder::new(Player::default()).with_sub(SubDesc::new(Health(100))),
//!     &SceneContext::default(),
//! )?;
//! loop {
//!     world.tick();
//! }
//! ```

use std::cell::Ref;

use crate::config::Config;
use crate::entity::{
    Behaviour, Entities, MainBuilder, MainId, Priority, SceneContext, SubDesc, SubId,
};
use crate::error::Result;
use crate::schedule::{Channel, UpdateScheduler};
use crate::singleton::{Shared, Singletons};

/// The scheduler a [`World`] drives.
pub type Scheduler = UpdateScheduler<Entities>;

pub struct World {
    singletons: Singletons,
    scheduler: Shared<Scheduler>,
    entities: Entities,
}

impl World {
    /// Build a world with a fresh registry holding only the scheduler
    /// template from `config.scheduler`.
    pub fn new(config: Config) -> Result<Self> {
        let mut singletons = Singletons::new();
        singletons.register_template::<Scheduler>(config.scheduler.clone());
        Self::with_singletons(singletons, config)
    }

    /// Build a world around a host-supplied registry.
    ///
    /// The registry must carry a template for [`Scheduler`]; it takes
    /// precedence over `config.scheduler`.
    pub fn with_singletons(mut singletons: Singletons, config: Config) -> Result<Self> {
        config.validate()?;
        let scheduler = singletons.get_instance::<Scheduler>()?;
        Ok(Self {
            singletons,
            scheduler,
            entities: Entities::new(config.lifecycle.enable_semantics),
        })
    }

    // ── Ticking ──────────────────────────────────────────────────────

    /// Run every subscriber of `channel` once.
    pub fn step(&mut self, channel: Channel) {
        let mut scheduler = self.scheduler.borrow_mut();
        self.entities.apply_commands(&mut scheduler);
        scheduler.step(channel, &mut self.entities);
        self.entities.apply_commands(&mut scheduler);
    }

    /// `PreStep`, then `Step`, then `PostStep`.
    pub fn tick(&mut self) {
        for channel in Channel::ALL {
            self.step(channel);
        }
    }

    // ── Entity operations ────────────────────────────────────────────

    pub fn initialize(&mut self, builder: MainBuilder, context: &SceneContext) -> Result<MainId> {
        self.apply(|e| e.initialize(builder, context))
    }

    pub fn add_sub(&mut self, main: MainId, desc: SubDesc) -> Result<SubId> {
        self.apply(|e| e.add_sub(main, desc))
    }

    pub fn add_or_get_sub<T: Behaviour>(
        &mut self,
        main: MainId,
        priority: Priority,
        make: impl FnOnce() -> T,
    ) -> Result<SubId> {
        self.apply(|e| e.add_or_get_sub(main, priority, make))
    }

    pub fn remove_sub(&mut self, sub: SubId) -> Result<()> {
        self.apply(|e| e.remove_sub(sub))
    }

    pub fn subscribe_main(&mut self, main: MainId, channel: Channel) -> Result<()> {
        self.apply(|e| e.subscribe_main(main, channel))
    }

    pub fn unsubscribe_main(&mut self, main: MainId, channel: Channel) -> Result<()> {
        self.apply(|e| e.unsubscribe_main(main, channel))
    }

    pub fn enable_main(&mut self, main: MainId) -> Result<()> {
        self.apply(|e| e.enable_main(main))
    }

    pub fn disable_main(&mut self, main: MainId) -> Result<()> {
        self.apply(|e| e.disable_main(main))
    }

    pub fn enable_sub(&mut self, sub: SubId) -> Result<()> {
        self.apply(|e| e.enable_sub(sub))
    }

    pub fn disable_sub(&mut self, sub: SubId) -> Result<()> {
        self.apply(|e| e.disable_sub(sub))
    }

    pub fn enable_game_object(&mut self, sub: SubId) -> Result<()> {
        self.apply(|e| e.enable_game_object(sub))
    }

    pub fn disable_game_object(&mut self, sub: SubId) -> Result<()> {
        self.apply(|e| e.disable_game_object(sub))
    }

    /// Destroy `main` and its subs. Its scheduler subscriptions are gone
    /// before the first destroy hook fires.
    pub fn destroy_main(&mut self, main: MainId) -> Result<()> {
        self.cancel_subscriptions(main);
        self.apply(|e| e.destroy_main(main))
    }

    pub fn destroy_sub(&mut self, sub: SubId) -> Result<()> {
        self.apply(|e| e.destroy_sub(sub))
    }

    pub fn destroy_sub_game_object(&mut self, sub: SubId) -> Result<()> {
        if let Some(main) = self.entities.game_object_main(sub) {
            self.cancel_subscriptions(main);
        }
        self.apply(|e| e.destroy_sub_game_object(sub))
    }

    /// Destroy every Main, then tear the registry down for good.
    ///
    /// Afterwards the registry refuses to build singletons, so no second
    /// scheduler can appear. Entity operations keep working on the scheduler
    /// this world already holds.
    pub fn shutdown(&mut self) {
        let mains: Vec<MainId> = self.entities.main_ids().collect();
        for main in mains {
            if let Err(err) = self.destroy_main(main) {
                log::warn!("{main} could not be destroyed during shutdown: {err}");
            }
        }
        self.singletons.teardown();
        log::debug!("world shut down");
    }

    fn cancel_subscriptions(&mut self, main: MainId) {
        let subscriptions = self.entities.take_subscriptions(main);
        if subscriptions.is_empty() {
            return;
        }
        let mut scheduler = self.scheduler.borrow_mut();
        for subscription in subscriptions {
            scheduler.cancel(subscription);
        }
    }

    fn apply<R>(&mut self, op: impl FnOnce(&mut Entities) -> R) -> R {
        let result = op(&mut self.entities);
        if self.entities.has_pending_commands() {
            let mut scheduler = self.scheduler.borrow_mut();
            self.entities.apply_commands(&mut scheduler);
        }
        result
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn entities(&self) -> &Entities {
        &self.entities
    }

    /// Direct access to the store. Subscription changes made through it are
    /// applied by the next `World` operation or step.
    pub fn entities_mut(&mut self) -> &mut Entities {
        &mut self.entities
    }

    pub fn singletons(&self) -> &Singletons {
        &self.singletons
    }

    pub fn singletons_mut(&mut self) -> &mut Singletons {
        &mut self.singletons
    }

    pub fn scheduler(&self) -> Ref<'_, Scheduler> {
        self.scheduler.borrow()
    }
}
