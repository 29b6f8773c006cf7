//! What a running behaviour sees of the world.

use super::behaviour::Behaviour;
use super::id::{MainId, SubId};
use super::lifecycle::LifecycleState;
use super::store::Entities;
use super::sub_entity::SubDesc;
use crate::error::Result;
use crate::schedule::Channel;

/// The entity whose behaviour is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum This {
    Main(MainId),
    Sub { main: MainId, sub: SubId },
}

/// Passed to every [`Behaviour`] method.
///
/// Operations named `*_this` act on the running entity. Everything else on
/// [`Entities`] is reachable through [`entities_mut`](Self::entities_mut).
/// Subscription changes made here take effect at the next step.
pub struct Context<'a> {
    entities: &'a mut Entities,
    this: This,
}

impl<'a> Context<'a> {
    pub(crate) fn new(entities: &'a mut Entities, this: This) -> Self {
        Self { entities, this }
    }

    pub fn this(&self) -> This {
        self.this
    }

    /// The running Main, or the Main owning the running Sub.
    pub fn main(&self) -> MainId {
        match self.this {
            This::Main(main) | This::Sub { main, .. } => main,
        }
    }

    pub fn this_sub(&self) -> Option<SubId> {
        match self.this {
            This::Main(_) => None,
            This::Sub { sub, .. } => Some(sub),
        }
    }

    pub fn state(&self) -> Option<LifecycleState> {
        match self.this {
            This::Main(main) => self.entities.main_state(main),
            This::Sub { sub, .. } => self.entities.sub_state(sub),
        }
    }

    /// Take part in `channel`.
    ///
    /// A Main gets a scheduler callback for the channel. A Sub is invoked on
    /// the channel whenever its Main runs on it.
    pub fn subscribe(&mut self, channel: Channel) -> Result<()> {
        match self.this {
            This::Main(main) => self.entities.subscribe_main(main, channel),
            This::Sub { sub, .. } => self.entities.subscribe_sub(sub, channel),
        }
    }

    pub fn unsubscribe(&mut self, channel: Channel) -> Result<()> {
        match self.this {
            This::Main(main) => self.entities.unsubscribe_main(main, channel),
            This::Sub { sub, .. } => self.entities.unsubscribe_sub(sub, channel),
        }
    }

    /// Live-add a sub to the running Main.
    pub fn add_sub(&mut self, desc: SubDesc) -> Result<SubId> {
        let main = self.main();
        self.entities.add_sub(main, desc)
    }

    pub fn remove_sub(&mut self, sub: SubId) -> Result<()> {
        self.entities.remove_sub(sub)
    }

    /// First active `T` sub of the running Main. The caller itself is never
    /// returned.
    pub fn get_sub<T: Behaviour>(&self) -> Option<&T> {
        self.entities.get_sub::<T>(self.main())
    }

    pub fn get_subs<T: Behaviour>(&self) -> Vec<&T> {
        self.entities.get_subs::<T>(self.main())
    }

    pub fn get_sub_mut<T: Behaviour>(&mut self) -> Option<&mut T> {
        let id = self
            .entities
            .subs_of_type::<T>(self.main())
            .into_iter()
            .find(|id| self.entities.sub_behaviour::<T>(*id).is_some())?;
        self.entities.sub_behaviour_mut::<T>(id)
    }

    /// The running Main's behaviour. `None` when called from the Main itself.
    pub fn main_behaviour<T: Behaviour>(&self) -> Option<&T> {
        self.entities.main_behaviour::<T>(self.main())
    }

    pub fn main_behaviour_mut<T: Behaviour>(&mut self) -> Option<&mut T> {
        let main = self.main();
        self.entities.main_behaviour_mut::<T>(main)
    }

    pub fn enable_this(&mut self) -> Result<()> {
        match self.this {
            This::Main(main) => self.entities.enable_main(main),
            This::Sub { sub, .. } => self.entities.enable_sub(sub),
        }
    }

    pub fn disable_this(&mut self) -> Result<()> {
        match self.this {
            This::Main(main) => self.entities.disable_main(main),
            This::Sub { sub, .. } => self.entities.disable_sub(sub),
        }
    }

    pub fn destroy_this(&mut self) -> Result<()> {
        match self.this {
            This::Main(main) => self.entities.destroy_main(main),
            This::Sub { sub, .. } => self.entities.destroy_sub(sub),
        }
    }

    /// Enable the game object the running entity lives on. From a Main, or
    /// from a Sub on the Main's root, this enables the Main. From any other
    /// Sub only that Sub.
    pub fn enable_game_object(&mut self) -> Result<()> {
        match self.this {
            This::Main(main) => self.entities.enable_main(main),
            This::Sub { sub, .. } => self.entities.enable_game_object(sub),
        }
    }

    /// Disable the game object the running entity lives on. Same root rule
    /// as [`enable_game_object`](Self::enable_game_object).
    pub fn disable_game_object(&mut self) -> Result<()> {
        match self.this {
            This::Main(main) => self.entities.disable_main(main),
            This::Sub { sub, .. } => self.entities.disable_game_object(sub),
        }
    }

    /// Destroy the game object the running entity lives on.
    ///
    /// From a Main, or from a Sub on the Main's root, this destroys the Main
    /// and all of its subs. From any other Sub only that Sub goes.
    pub fn destroy_game_object(&mut self) -> Result<()> {
        match self.this {
            This::Main(main) => self.entities.destroy_main(main),
            This::Sub { sub, .. } => self.entities.destroy_sub_game_object(sub),
        }
    }

    pub fn entities(&self) -> &Entities {
        &*self.entities
    }

    pub fn entities_mut(&mut self) -> &mut Entities {
        &mut *self.entities
    }
}
