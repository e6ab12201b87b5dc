//! # Rocket Events
//!
//! A lifecycle-scoped event bus for game server plugins. Emitters publish
//! events; listeners subscribe to the events they care about and are
//! unsubscribed automatically when the lifecycle that owns them ends.
//!
//! ## Core Features
//!
//! - **Four match dimensions**: event name, event type, and either of those
//!   narrowed to an emitter name or emitter type
//! - **Three execution targets**: synchronous, asynchronous and parallel
//!   dispatch, all with the same completion notification contract
//! - **Lifecycle ownership**: every subscription belongs to a
//!   [`LifecycleOwner`] and is removed in bulk with it
//! - **Listener objects**: one object declares many handler methods through a
//!   [`HandlerTable`] and is registered all-or-nothing
//! - **Fault isolation**: handler errors and panics are logged and counted,
//!   never propagated to the emitter
//!
//! ## Quick Start Example
//!
//! ```rust
//! use rocket_events::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), EventError> {
//!     let events = create_event_manager()?;
//!     let plugin = LifecycleOwner::new("motd");
//!
//!     events.subscribe(&plugin, "PlayerConnected", |_emitter, event| {
//!         if let Some(event) = event.downcast_ref::<GenericEvent>() {
//!             event.set_argument("motd", "Welcome!");
//!         }
//!         Ok(())
//!     })?;
//!
//!     let event = GenericEvent::new("PlayerConnected").with_target(ExecutionTarget::Asynchronous);
//!     let done = events
//!         .emit_wait(Arc::new(NamedEmitter::new("server")), Arc::new(event))
//!         .await?;
//!
//!     let motd = done.downcast_ref::<GenericEvent>().and_then(|e| e.argument("motd"));
//!     assert_eq!(motd, Some("Welcome!".into()));
//!
//!     events.end_lifecycle(&plugin);
//!     Ok(())
//! }
//! ```

mod config;
mod container;
mod dispatch;
mod error;
mod event;
mod lifecycle;
mod listener;
mod logging;
mod manager;
mod registry;
mod stats;

pub use config::EventManagerConfig;
pub use container::{DependencyContainer, Resolvable};
pub use dispatch::CompletionCallback;
pub use error::{EventError, ResolutionError};
pub use event::{
    Emitter, Event, EventMeta, ExecutionTarget, GenericEvent, NamedEmitter, Reflect, TypeKey,
};
pub use lifecycle::{LifecycleOwner, OwnerId};
pub use listener::{EventListener, HandlerTable};
pub use logging::{LogLevel, Logger};
pub use manager::EventManager;
pub use registry::{
    EventCallback, ListenerId, MatchKind, Selector, Subscription, SubscriptionId,
    SubscriptionRegistry,
};
pub use stats::EventManagerStats;

use std::sync::Arc;

/// Creates a shared event manager with the default configuration.
///
/// This is the usual entry point for a server; plugins receive a clone of
/// the returned `Arc`.
pub fn create_event_manager() -> Result<Arc<EventManager>, EventError> {
    Ok(Arc::new(EventManager::new()?))
}

/// Creates a shared event manager with a custom configuration.
pub fn create_event_manager_with_config(
    config: EventManagerConfig,
) -> Result<Arc<EventManager>, EventError> {
    Ok(Arc::new(EventManager::with_config(config)?))
}
