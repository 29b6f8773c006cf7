//! # Singletons — One Live Instance per Type
//!
//! The [`Singletons`] registry maps a type to at most one live instance. It is
//! an explicit object owned by the [`World`](crate::world::World) (or built by
//! the host and injected into it), not hidden global state.
//!
//! ## Templates and Instances
//!
//! ```text
//! templates: HashMap<TypeId, Box<dyn Any>>      one per type, registered by the host
//! instances: HashMap<TypeId, Rc<dyn Any>>       created on first demand, then cached
//! ```
//!
//! [`Singletons::get_instance`] returns the cached instance if there is one.
//! Otherwise it builds one from the registered template, caches it, and only
//! then runs [`Singleton::init`]. Caching before `init` is what makes
//! re-entrant lookups safe: a singleton whose `init` asks for itself (or for
//! another singleton that asks back) receives the instance already under
//! construction instead of recursing forever.
//!
//! Instances are `Rc<RefCell<T>>` so every caller shares the identical
//! instance. A re-entrant caller holds the handle of an instance whose `init`
//! is still running; it must not borrow it until that `init` returns.
//!
//! ## Comparison
//!
//! - **ECS resources** (hecs-style worlds, bevy's `Resource`): the same
//!   type-keyed `Box<dyn Any>` map, but filled eagerly by the host.
//! - Here the host only supplies templates; instances appear lazily.

use std::any::{Any, TypeId, type_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::ConfigurationError;

/// A type with at most one live instance per registry.
pub trait Singleton: Any {
    /// The authoring-time value the live instance is built from.
    type Template: 'static;

    /// Build the live instance from its template.
    fn instantiate(template: &Self::Template) -> Self
    where
        Self: Sized;

    /// One-time initialization, run right after the instance is cached.
    fn init(&mut self, _singletons: &mut Singletons) {}
}

/// Shared handle to a live singleton.
pub type Shared<T> = Rc<RefCell<T>>;

/// Registry of singleton templates and their live instances.
#[derive(Default)]
pub struct Singletons {
    templates: HashMap<TypeId, Box<dyn Any>>,
    instances: HashMap<TypeId, Rc<dyn Any>>,
    /// Creation order, for teardown.
    created: Vec<TypeId>,
    /// Set by `teardown`; no instance is built afterwards.
    closed: bool,
}

impl Singletons {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the template for `T`. Only the first registration per type
    /// counts; later ones are rejected and return `false`.
    pub fn register_template<T: Singleton>(&mut self, template: T::Template) -> bool {
        let key = TypeId::of::<T>();
        if self.templates.contains_key(&key) {
            log::warn!(
                "template for `{}` already registered; ignoring the duplicate",
                type_name::<T>()
            );
            return false;
        }
        self.templates.insert(key, Box::new(template));
        true
    }

    pub fn has_template<T: Singleton>(&self) -> bool {
        self.templates.contains_key(&TypeId::of::<T>())
    }

    /// Return the live instance of `T`, creating it from its template on
    /// first demand.
    pub fn get_instance<T: Singleton>(&mut self) -> Result<Shared<T>, ConfigurationError> {
        let key = TypeId::of::<T>();
        if let Some(live) = self.instances.get(&key).and_then(downcast_live::<T>) {
            return Ok(live);
        }
        if self.closed {
            log::error!(
                "singleton `{}` requested after the registry was torn down",
                type_name::<T>()
            );
            return Err(ConfigurationError::RegistryClosed {
                type_name: type_name::<T>(),
            });
        }

        let template = self
            .templates
            .get(&key)
            .and_then(|t| t.downcast_ref::<T::Template>())
            .ok_or_else(|| {
                log::error!("no template registered for singleton `{}`", type_name::<T>());
                ConfigurationError::MissingTemplate {
                    type_name: type_name::<T>(),
                }
            })?;

        let instance: Shared<T> = Rc::new(RefCell::new(T::instantiate(template)));
        let erased: Rc<dyn Any> = instance.clone();
        self.instances.insert(key, erased);
        self.created.push(key);
        log::info!("created singleton `{}`", type_name::<T>());

        instance.borrow_mut().init(self);
        Ok(instance)
    }

    /// The live instance of `T`, if one has been created. Never constructs.
    pub fn get_live<T: Singleton>(&self) -> Option<Shared<T>> {
        self.instances
            .get(&TypeId::of::<T>())
            .and_then(downcast_live::<T>)
    }

    pub fn is_live<T: Singleton>(&self) -> bool {
        self.instances.contains_key(&TypeId::of::<T>())
    }

    /// Number of live instances.
    pub fn live_count(&self) -> usize {
        self.instances.len()
    }

    /// Whether [`teardown`](Self::teardown) has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Drop every live instance, newest first, and close the registry. Any
    /// later `get_instance` fails with [`ConfigurationError::RegistryClosed`].
    pub fn teardown(&mut self) {
        self.closed = true;
        while let Some(key) = self.created.pop() {
            self.instances.remove(&key);
        }
        log::debug!("singleton registry torn down");
    }
}

fn downcast_live<T: Singleton>(erased: &Rc<dyn Any>) -> Option<Shared<T>> {
    Rc::clone(erased).downcast::<RefCell<T>>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        start: u32,
        inits: u32,
    }

    impl Singleton for Counter {
        type Template = u32;

        fn instantiate(template: &u32) -> Self {
            Counter {
                start: *template,
                inits: 0,
            }
        }

        fn init(&mut self, _singletons: &mut Singletons) {
            self.inits += 1;
        }
    }

    #[test]
    fn same_instance_every_time_and_init_once() {
        let mut singletons = Singletons::new();
        singletons.register_template::<Counter>(7);

        let a = singletons.get_instance::<Counter>().unwrap();
        let b = singletons.get_instance::<Counter>().unwrap();

        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(a.borrow().start, 7);
        assert_eq!(a.borrow().inits, 1);
        assert_eq!(singletons.live_count(), 1);
    }

    #[test]
    fn missing_template_is_a_configuration_error() {
        let mut singletons = Singletons::new();
        let Err(err) = singletons.get_instance::<Counter>() else {
            panic!("built a singleton without a template");
        };
        assert!(matches!(err, ConfigurationError::MissingTemplate { .. }));
        assert!(!singletons.is_live::<Counter>());
    }

    #[test]
    fn duplicate_template_is_rejected() {
        let mut singletons = Singletons::new();
        assert!(singletons.register_template::<Counter>(1));
        assert!(!singletons.register_template::<Counter>(2));
        assert_eq!(singletons.get_instance::<Counter>().unwrap().borrow().start, 1);
    }

    #[test]
    fn get_live_never_constructs() {
        let mut singletons = Singletons::new();
        singletons.register_template::<Counter>(0);
        assert!(singletons.get_live::<Counter>().is_none());
        singletons.get_instance::<Counter>().unwrap();
        assert!(singletons.get_live::<Counter>().is_some());
    }

    /// Asks for itself during init.
    struct SelfReferential {
        saw_self: bool,
    }

    impl Singleton for SelfReferential {
        type Template = ();

        fn instantiate(_: &()) -> Self {
            SelfReferential { saw_self: false }
        }

        fn init(&mut self, singletons: &mut Singletons) {
            self.saw_self = singletons.get_instance::<SelfReferential>().is_ok();
        }
    }

    #[test]
    fn reentrant_lookup_returns_instance_under_construction() {
        let mut singletons = Singletons::new();
        singletons.register_template::<SelfReferential>(());

        let first = singletons.get_instance::<SelfReferential>().unwrap();
        assert!(first.borrow().saw_self);
        assert_eq!(singletons.live_count(), 1);
    }

    /// `Ping` and `Pong` each resolve the other during init.
    struct Ping {
        partner: Option<Shared<Pong>>,
    }
    struct Pong {
        partner: Option<Shared<Ping>>,
    }

    impl Singleton for Ping {
        type Template = ();
        fn instantiate(_: &()) -> Self {
            Ping { partner: None }
        }
        fn init(&mut self, singletons: &mut Singletons) {
            self.partner = singletons.get_instance::<Pong>().ok();
        }
    }

    impl Singleton for Pong {
        type Template = ();
        fn instantiate(_: &()) -> Self {
            Pong { partner: None }
        }
        fn init(&mut self, singletons: &mut Singletons) {
            self.partner = singletons.get_instance::<Ping>().ok();
        }
    }

    #[test]
    fn mutually_dependent_singletons_resolve_without_recursion() {
        let mut singletons = Singletons::new();
        singletons.register_template::<Ping>(());
        singletons.register_template::<Pong>(());

        let ping = singletons.get_instance::<Ping>().unwrap();
        let pong = singletons.get_instance::<Pong>().unwrap();

        assert!(Rc::ptr_eq(ping.borrow().partner.as_ref().unwrap(), &pong));
        assert!(Rc::ptr_eq(pong.borrow().partner.as_ref().unwrap(), &ping));
        assert_eq!(singletons.live_count(), 2);

        // Break the cycle so the test does not leak.
        ping.borrow_mut().partner = None;
    }

    #[test]
    fn teardown_is_final() {
        let mut singletons = Singletons::new();
        singletons.register_template::<Counter>(3);
        let before = singletons.get_instance::<Counter>().unwrap();

        singletons.teardown();
        assert!(singletons.is_closed());
        assert_eq!(singletons.live_count(), 0);
        assert!(singletons.has_template::<Counter>());

        let Err(err) = singletons.get_instance::<Counter>() else {
            panic!("a torn-down registry built a second instance");
        };
        assert!(matches!(err, ConfigurationError::RegistryClosed { .. }));
        assert_eq!(singletons.live_count(), 0);
        assert_eq!(before.borrow().inits, 1);
    }
}
