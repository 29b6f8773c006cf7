//! # Tessera — Entity Composition and Update Dispatch
//!
//! A small core for composite game objects. A **Main** owns a priority-ordered
//! set of **Subs**; a batched scheduler drives every Main through three
//! channels per tick; a type-keyed registry hands out singletons.
//!
//! ```text
//!  tick ──► PreStep ──► Step ──► PostStep
//!              │
//!              ▼
//!        UpdateScheduler: batch 0 [cb, cb, …] → batch 1 [cb, …] → …
//!                                   │
//!                                   ▼
//!                 Main cycle: flush subs → main logic → subs by priority
//! ```
//!
//! Start with `use tessera::prelude::*` and build a [`World`].

pub mod config;
pub mod entity;
pub mod error;
pub mod prelude;
pub mod schedule;
pub mod singleton;
pub mod world;

pub use config::init_logger;
pub use error::{Error, Result};
pub use world::World;
