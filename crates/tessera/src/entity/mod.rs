//! # Entities — Mains, Subs and Their Lifecycle
//!
//! A **Main** is a composite root. It owns an ordered set of **Subs**, runs
//! its own logic on the channels it subscribes to, and then dispatches to
//! each enabled Sub in priority order.
//!
//! ## Module Overview
//!
//! - [`id`] — Generational ids shared by Mains and Subs
//! - [`lifecycle`] — States, hooks, channel sets and scene affinity
//! - [`behaviour`] — The trait user logic implements
//! - [`context`] — What a running behaviour can reach
//! - [`sub_entity`] — Sub descriptors, priorities and attached Subs
//! - [`main_entity`] — The Main builder and live Mains
//! - `collection` — The mutation-safe sub list of one Main
//! - [`store`] — The live graph, dispatch and destruction cascade
//!
//! ## Comparison
//!
//! | | Here | Archetype ECS (hecs, bevy) |
//! |---|---|---|
//! | Unit of logic | Behaviour on an entity | System over a query |
//! | Composition | Main owns Subs | Components on one entity |
//! | Ordering | Per-Main priority, 1..=15 | Schedule order |
//! | Mutation during update | Queued, applied at next cycle | Commands |

pub mod behaviour;
pub(crate) mod collection;
pub mod context;
pub mod id;
pub mod lifecycle;
pub mod main_entity;
pub mod store;
pub mod sub_entity;

pub use behaviour::Behaviour;
pub use context::{Context, This};
pub use id::{EntityId, MainId, SubId};
pub use lifecycle::{
    ChannelSet, EnableSemantics, EntityHooks, Hook, LifecycleState, MainHooks, SceneContext,
    SceneMarker,
};
pub use main_entity::{Main, MainBuilder};
pub use store::Entities;
pub use sub_entity::{Priority, Sub, SubDesc};
