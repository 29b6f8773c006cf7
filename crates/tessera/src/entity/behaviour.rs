//! # Behaviour — The Logic Attached to an Entity
//!
//! Both Mains and Subs carry a boxed [`Behaviour`]. All methods have empty
//! defaults; implement the channels you care about and call
//! [`Context::subscribe`] from `init` to take part in them.
//!
//! ```ignore
//! struct Spinner { turns: u32 }
//!
//! impl Behaviour for Spinner {
//!     fn init(&mut self, cx: &mut Context) {
//!         cx.subscribe(Channel::Step);
//!     }
//!
//!     fn step(&mut self, _cx: &mut Context) {
//!         self.turns += 1;
//!     }
//! }
//! ```
//!
//! While one of these methods runs, the behaviour is lifted out of its slot,
//! so behaviour lookups from inside it never hand back the caller itself. Id
//! lookups by type still count it.

use std::any::Any;

use super::context::Context;
use crate::schedule::Channel;

pub trait Behaviour: Any {
    /// Runs once, right after the entity's identity is bound.
    fn init(&mut self, _cx: &mut Context<'_>) {}

    fn pre_step(&mut self, _cx: &mut Context<'_>) {}

    fn step(&mut self, _cx: &mut Context<'_>) {}

    fn post_step(&mut self, _cx: &mut Context<'_>) {}
}

/// Route `channel` to the matching method.
pub(crate) fn run_channel(behaviour: &mut dyn Behaviour, channel: Channel, cx: &mut Context<'_>) {
    match channel {
        Channel::PreStep => behaviour.pre_step(cx),
        Channel::Step => behaviour.step(cx),
        Channel::PostStep => behaviour.post_step(cx),
    }
}

pub(crate) fn downcast_ref<'a, T: Behaviour>(
    behaviour: &'a (dyn Behaviour + 'static),
) -> Option<&'a T> {
    let any: &dyn Any = behaviour;
    any.downcast_ref::<T>()
}

pub(crate) fn downcast_mut<'a, T: Behaviour>(
    behaviour: &'a mut (dyn Behaviour + 'static),
) -> Option<&'a mut T> {
    let any: &mut dyn Any = behaviour;
    any.downcast_mut::<T>()
}
