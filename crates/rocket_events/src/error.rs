//! Error types shared by the event manager, the listener adapter and the
//! dependency container.

use thiserror::Error;

/// Errors that can occur during event manager operations.
///
/// Subscription bookkeeping errors are returned synchronously to the caller.
/// Handler errors never reach the caller of `emit`; they are logged and
/// counted by the dispatcher instead.
#[derive(Debug, Error)]
pub enum EventError {
    /// A subscription or listener handler declared an empty event name
    #[error("Event name must not be empty")]
    EmptyEventName,
    /// An emitter-scoped subscription declared an empty emitter name
    #[error("Emitter name must not be empty")]
    EmptyEmitterName,
    /// The lifecycle owner already ended and cannot own new subscriptions
    #[error("Lifecycle owner '{0}' is no longer alive")]
    OwnerNotAlive(String),
    /// A handler reported a failure while processing an event
    #[error("Handler execution error: {0}")]
    HandlerExecution(String),
    /// A handler panicked while processing an event
    #[error("Handler panicked: {0}")]
    HandlerPanicked(String),
    /// A typed handler received an event or emitter of another concrete type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    /// The listener object is already registered with this manager
    #[error("Listener {0} is already registered")]
    ListenerAlreadyRegistered(String),
    /// A listener dependency could not be resolved
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    /// The background execution facility is unavailable
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Errors raised by [`DependencyContainer`](crate::DependencyContainer) lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// Nothing is registered for the requested type and mapping name
    #[error("No registration for {type_name} (mapping: {mapping:?})")]
    NotRegistered {
        type_name: &'static str,
        mapping: Option<String>,
    },
    /// The registration exists but holds a value of another type
    #[error("Registration for {0} holds an instance of a different type")]
    TypeMismatch(&'static str),
}
