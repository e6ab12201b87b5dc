//! Minimal dependency container used to build listener objects.
//!
//! Registrations are singleton instances keyed by concrete type and an
//! optional mapping name. A child container sees its own registrations
//! first and falls back to its parent.

use crate::error::ResolutionError;
use crate::event::TypeKey;
use dashmap::DashMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RegistrationKey {
    type_key: TypeKey,
    mapping: Option<String>,
}

impl RegistrationKey {
    fn of<T: 'static>(mapping: Option<&str>) -> Self {
        Self {
            type_key: TypeKey::of::<T>(),
            mapping: mapping.map(str::to_string),
        }
    }
}

type Instance = Arc<dyn Any + Send + Sync>;

/// Thread-safe registry of shared service instances.
///
/// # Examples
///
/// ```rust
/// use rocket_events::DependencyContainer;
/// use std::sync::Arc;
///
/// struct Motd(String);
///
/// let container = Arc::new(DependencyContainer::new());
/// container.register_instance(Arc::new(Motd("welcome".into())));
///
/// let child = container.create_child();
/// assert_eq!(child.resolve::<Motd>().map(|m| m.0.clone()), Ok("welcome".to_string()));
/// ```
#[derive(Default)]
pub struct DependencyContainer {
    registrations: DashMap<RegistrationKey, Instance>,
    parent: Option<Arc<DependencyContainer>>,
}

impl DependencyContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a container that falls back to `self` for missing
    /// registrations.
    pub fn create_child(self: &Arc<Self>) -> DependencyContainer {
        DependencyContainer {
            registrations: DashMap::new(),
            parent: Some(self.clone()),
        }
    }

    /// Registers the default instance of `T`, replacing any previous one.
    pub fn register_instance<T: Send + Sync + 'static>(&self, instance: Arc<T>) {
        self.insert(RegistrationKey::of::<T>(None), instance);
    }

    /// Registers an instance of `T` under a mapping name.
    pub fn register_named_instance<T: Send + Sync + 'static>(
        &self,
        mapping: &str,
        instance: Arc<T>,
    ) {
        self.insert(RegistrationKey::of::<T>(Some(mapping)), instance);
    }

    fn insert(&self, key: RegistrationKey, instance: Instance) {
        debug!(
            "📝 Registered {} (mapping: {:?})",
            key.type_key.name(),
            key.mapping
        );
        self.registrations.insert(key, instance);
    }

    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolutionError> {
        self.lookup(&RegistrationKey::of::<T>(None))
    }

    pub fn resolve_named<T: Send + Sync + 'static>(
        &self,
        mapping: &str,
    ) -> Result<Arc<T>, ResolutionError> {
        self.lookup(&RegistrationKey::of::<T>(Some(mapping)))
    }

    /// Like [`resolve`](Self::resolve), but a missing registration is `None`.
    pub fn try_resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.resolve::<T>().ok()
    }

    pub fn is_registered<T: Send + Sync + 'static>(&self) -> bool {
        self.find(&RegistrationKey::of::<T>(None)).is_some()
    }

    fn find(&self, key: &RegistrationKey) -> Option<Instance> {
        match self.registrations.get(key) {
            Some(instance) => Some(instance.value().clone()),
            None => self.parent.as_ref().and_then(|parent| parent.find(key)),
        }
    }

    fn lookup<T: Send + Sync + 'static>(
        &self,
        key: &RegistrationKey,
    ) -> Result<Arc<T>, ResolutionError> {
        let instance = self.find(key).ok_or_else(|| ResolutionError::NotRegistered {
            type_name: key.type_key.name(),
            mapping: key.mapping.clone(),
        })?;

        instance
            .downcast::<T>()
            .map_err(|_| ResolutionError::TypeMismatch(key.type_key.name()))
    }
}

impl fmt::Debug for DependencyContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyContainer")
            .field("registrations", &self.registrations.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

/// A type that can build itself from a [`DependencyContainer`].
pub trait Resolvable: Sized {
    fn resolve(container: &DependencyContainer) -> Result<Self, ResolutionError>;
}
