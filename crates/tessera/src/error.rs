//! # Errors
//!
//! Two families of failure exist in the core:
//!
//! - [`ConfigurationError`] — the host set something up wrong (no template
//!   for a singleton, a main placed in a scene it is restricted from, a bad
//!   priority). Detected at the point of construction; the offending entity
//!   never enters the live graph.
//! - [`LifecycleMisuse`] — an operation was aimed at an entity that is no
//!   longer live. Logged at warn level where it is detected.
//!
//! Lookup misses (no sub of a type, stale unsubscribe handle) are not errors
//! at all and surface as `None` / empty / `false`.

use std::path::PathBuf;

use thiserror::Error;

use crate::entity::{MainId, SceneMarker, SubId};

/// The host configured something the core cannot honor.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("no singleton template registered for `{type_name}`")]
    MissingTemplate { type_name: &'static str },

    #[error("singleton `{type_name}` requested after the registry was torn down")]
    RegistryClosed { type_name: &'static str },

    #[error("main is restricted to scene `{required}` but was initialized in `{actual}`")]
    SceneMismatch {
        required: SceneMarker,
        actual: SceneMarker,
    },

    #[error("sub cannot reach its main: {0} is not live")]
    UnreachableMain(MainId),

    #[error("priority {0} is outside 1..=15")]
    PriorityOutOfRange(i32),

    #[error("batch capacity must be at least 1")]
    ZeroBatchCapacity,

    #[error("failed to read config `{}`: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// An operation was aimed at an entity outside its live window.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleMisuse {
    #[error("{0} has been destroyed or was never initialized")]
    DeadMain(MainId),

    #[error("{0} has been destroyed or was never attached")]
    DeadSub(SubId),
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleMisuse),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let err = ConfigurationError::MissingTemplate { type_name: "Audio" };
        assert_eq!(err.to_string(), "no singleton template registered for `Audio`");

        let err = ConfigurationError::PriorityOutOfRange(42);
        assert_eq!(err.to_string(), "priority 42 is outside 1..=15");
    }

    #[test]
    fn crate_error_is_transparent() {
        let err: Error = ConfigurationError::ZeroBatchCapacity.into();
        assert_eq!(err.to_string(), "batch capacity must be at least 1");
        assert!(matches!(err, Error::Configuration(_)));
    }
}
