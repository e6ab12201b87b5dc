//! Event and emitter value types.
//!
//! An event carries a logical name, an optional reference to the emitter that
//! sent it and the execution target that tells the manager how to run its
//! handlers. Both the event name and the event's concrete Rust type are valid
//! match keys, as are the emitter's name and concrete type.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// How matched handlers run relative to the `emit` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionTarget {
    /// Handlers run one at a time on the emitting thread before `emit` returns
    #[default]
    Synchronous,
    /// Handlers run in match order on a single background task
    Asynchronous,
    /// Handlers run as independent background tasks with a join on completion
    Parallel,
}

impl fmt::Display for ExecutionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionTarget::Synchronous => write!(f, "synchronous"),
            ExecutionTarget::Asynchronous => write!(f, "asynchronous"),
            ExecutionTarget::Parallel => write!(f, "parallel"),
        }
    }
}

/// Runtime type identity used as a match key.
///
/// Equality and hashing only consider the [`TypeId`]; the type name is kept
/// for log output and error messages.
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Returns the key for `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Runtime type access for events and emitters.
///
/// Implemented for every `'static` type, so event and emitter authors never
/// implement it by hand.
pub trait Reflect: Any {
    /// Returns `self` as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns the concrete type of `self`.
    fn type_key(&self) -> TypeKey;
}

impl<T: Any> Reflect for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_key(&self) -> TypeKey {
        TypeKey::of::<T>()
    }
}

/// Anything that can originate events.
///
/// The concrete type is always a valid match key. The name is optional;
/// emitters without a name can only be matched by type.
pub trait Emitter: Reflect + Send + Sync + fmt::Debug {
    /// Logical emitter name used by name-scoped subscriptions.
    fn emitter_name(&self) -> Option<&str> {
        None
    }
}

impl dyn Emitter {
    /// Returns the concrete type of this emitter.
    pub fn emitter_type(&self) -> TypeKey {
        <dyn Emitter as Reflect>::type_key(self)
    }

    /// Downcasts to a concrete emitter type.
    pub fn downcast_ref<M: Emitter>(&self) -> Option<&M> {
        <dyn Emitter as Reflect>::as_any(self).downcast_ref::<M>()
    }
}

/// The fields every event carries: name, sender and execution target.
#[derive(Debug, Clone)]
pub struct EventMeta {
    name: String,
    sender: Option<Arc<dyn Emitter>>,
    execution_target: ExecutionTarget,
}

impl EventMeta {
    /// Creates metadata for a synchronous, system-originated event.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sender: None,
            execution_target: ExecutionTarget::Synchronous,
        }
    }

    pub fn with_sender(mut self, sender: Arc<dyn Emitter>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn with_target(mut self, target: ExecutionTarget) -> Self {
        self.execution_target = target;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sender(&self) -> Option<&Arc<dyn Emitter>> {
        self.sender.as_ref()
    }

    pub fn execution_target(&self) -> ExecutionTarget {
        self.execution_target
    }
}

/// An immutable description of something that happened.
///
/// Concrete event types embed an [`EventMeta`] and expose it through
/// [`Event::meta`]; the remaining accessors are derived from it. Events are
/// shared between handlers as `Arc<dyn Event>` and are never cloned by the
/// manager, so any state a handler is meant to change must use interior
/// mutability.
///
/// # Examples
///
/// ```rust
/// use rocket_events::{Event, EventMeta, ExecutionTarget};
///
/// #[derive(Debug)]
/// struct PlayerChatEvent {
///     meta: EventMeta,
///     message: String,
/// }
///
/// impl Event for PlayerChatEvent {
///     fn meta(&self) -> &EventMeta {
///         &self.meta
///     }
/// }
///
/// let event = PlayerChatEvent {
///     meta: EventMeta::new("PlayerChat").with_target(ExecutionTarget::Asynchronous),
///     message: "hello".to_string(),
/// };
/// assert_eq!(event.name(), "PlayerChat");
/// ```
pub trait Event: Reflect + Send + Sync + fmt::Debug {
    /// Returns the name, sender and execution target of this event.
    fn meta(&self) -> &EventMeta;

    /// Logical event name, matched case-insensitively.
    fn name(&self) -> &str {
        self.meta().name()
    }

    /// The emitter that sent this event, if any.
    fn sender(&self) -> Option<&Arc<dyn Emitter>> {
        self.meta().sender()
    }

    fn execution_target(&self) -> ExecutionTarget {
        self.meta().execution_target()
    }
}

impl dyn Event {
    /// Returns the concrete type of this event.
    pub fn event_type(&self) -> TypeKey {
        <dyn Event as Reflect>::type_key(self)
    }

    /// Downcasts to a concrete event type.
    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        <dyn Event as Reflect>::as_any(self).downcast_ref::<E>()
    }

    pub fn is<E: Event>(&self) -> bool {
        self.downcast_ref::<E>().is_some()
    }
}

/// A named emitter without any state of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedEmitter {
    name: String,
}

impl NamedEmitter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Emitter for NamedEmitter {
    fn emitter_name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

/// General purpose event with a free-form argument map.
///
/// Arguments can be read and written by handlers while the event is in
/// flight, which makes it suitable for request/response style events where
/// the completion callback inspects what the handlers decided.
#[derive(Debug)]
pub struct GenericEvent {
    meta: EventMeta,
    arguments: RwLock<HashMap<String, Value>>,
}

impl GenericEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: EventMeta::new(name),
            arguments: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_sender(mut self, sender: Arc<dyn Emitter>) -> Self {
        self.meta = self.meta.with_sender(sender);
        self
    }

    pub fn with_target(mut self, target: ExecutionTarget) -> Self {
        self.meta = self.meta.with_target(target);
        self
    }

    pub fn with_argument(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.write().insert(key.into(), value.into());
        self
    }

    pub fn argument(&self, key: &str) -> Option<Value> {
        self.arguments.read().get(key).cloned()
    }

    /// Sets or replaces an argument. Returns the previous value.
    pub fn set_argument(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.arguments.write().insert(key.into(), value.into())
    }

    /// Returns a copy of all arguments.
    pub fn arguments(&self) -> HashMap<String, Value> {
        self.arguments.read().clone()
    }
}

impl Event for GenericEvent {
    fn meta(&self) -> &EventMeta {
        &self.meta
    }
}
