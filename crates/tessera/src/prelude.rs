//! Convenience re-exports — `use tessera::prelude::*` for the common items.

pub use crate::config::{Config, LifecycleConfig, SchedulerConfig};
pub use crate::entity::{
    Behaviour, ChannelSet, Context, EnableSemantics, Entities, LifecycleState, MainBuilder,
    MainHooks, MainId, Priority, SceneContext, SceneMarker, SubDesc, SubId, This,
};
pub use crate::error::{ConfigurationError, Error, LifecycleMisuse, Result};
pub use crate::schedule::{Channel, Subscription, UpdateScheduler};
pub use crate::singleton::{Shared, Singleton, Singletons};
pub use crate::world::{Scheduler, World};
