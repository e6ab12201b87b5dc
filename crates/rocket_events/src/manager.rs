//! The event manager façade: subscribe, unsubscribe and emit.

use crate::config::EventManagerConfig;
use crate::dispatch::{CompletionCallback, Dispatcher};
use crate::error::EventError;
use crate::event::{Emitter, Event, TypeKey};
use crate::lifecycle::LifecycleOwner;
use crate::registry::{EventCallback, Selector, Subscription, SubscriptionId, SubscriptionRegistry};
use crate::stats::EventManagerStats;
use std::any::type_name;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Lifecycle-scoped event bus.
///
/// Subscriptions are grouped under a [`LifecycleOwner`] and removed in bulk
/// when the owner's lifecycle ends. Dispatch matches each emitted event by
/// name and concrete type, optionally narrowed to an emitter name or emitter
/// type, and runs the matched handlers according to the event's
/// [`ExecutionTarget`](crate::ExecutionTarget).
///
/// # Examples
///
/// ```rust
/// use rocket_events::{EventManager, GenericEvent, LifecycleOwner, NamedEmitter};
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), rocket_events::EventError> {
/// let events = EventManager::new()?;
/// let plugin = LifecycleOwner::new("greeter");
///
/// events.subscribe(&plugin, "PlayerConnected", |_emitter, event| {
///     println!("{} fired", event.name());
///     Ok(())
/// })?;
///
/// let server = Arc::new(NamedEmitter::new("server"));
/// events.emit(server, Arc::new(GenericEvent::new("PlayerConnected")));
/// events.end_lifecycle(&plugin);
/// # Ok(())
/// # }
/// ```
pub struct EventManager {
    registry: SubscriptionRegistry,
    dispatcher: Dispatcher,
    config: EventManagerConfig,
}

impl EventManager {
    /// Creates a manager with the default configuration.
    ///
    /// Background dispatch uses the current Tokio runtime when called from
    /// inside one, otherwise an owned runtime is started.
    pub fn new() -> Result<Self, EventError> {
        Self::with_config(EventManagerConfig::default())
    }

    pub fn with_config(config: EventManagerConfig) -> Result<Self, EventError> {
        let dispatcher = Dispatcher::new(&config)?;
        info!("🚀 Event manager ready");
        Ok(Self {
            registry: SubscriptionRegistry::new(),
            dispatcher,
            config,
        })
    }

    /// Creates a manager that schedules background dispatch on `handle`.
    pub fn with_handle(handle: Handle, config: EventManagerConfig) -> Self {
        Self {
            registry: SubscriptionRegistry::new(),
            dispatcher: Dispatcher::with_handle(handle, &config),
            config,
        }
    }

    pub fn config(&self) -> &EventManagerConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Subscribe
    // ------------------------------------------------------------------

    /// Subscribes to every event with the given name, from any emitter.
    pub fn subscribe<F>(
        &self,
        owner: &LifecycleOwner,
        event_name: &str,
        handler: F,
    ) -> Result<SubscriptionId, EventError>
    where
        F: Fn(&dyn Emitter, &dyn Event) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let selector = Selector::event_name(event_name)?;
        self.registry.add(owner, selector, Arc::new(handler))
    }

    /// Subscribes to every event of concrete type `E`, from any emitter.
    pub fn subscribe_typed<E, F>(
        &self,
        owner: &LifecycleOwner,
        handler: F,
    ) -> Result<SubscriptionId, EventError>
    where
        E: Event,
        F: Fn(&dyn Emitter, &E) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let selector = Selector::event_type(TypeKey::of::<E>());
        self.registry.add(owner, selector, typed_event_callback(handler))
    }

    /// Subscribes to every event of the given concrete type, with an erased
    /// handler.
    pub fn subscribe_type<F>(
        &self,
        owner: &LifecycleOwner,
        event_type: TypeKey,
        handler: F,
    ) -> Result<SubscriptionId, EventError>
    where
        F: Fn(&dyn Emitter, &dyn Event) -> Result<(), EventError> + Send + Sync + 'static,
    {
        self.registry
            .add(owner, Selector::event_type(event_type), Arc::new(handler))
    }

    /// Subscribes to events with the given name sent by the named emitter.
    pub fn subscribe_emitter<F>(
        &self,
        owner: &LifecycleOwner,
        emitter_name: &str,
        event_name: &str,
        handler: F,
    ) -> Result<SubscriptionId, EventError>
    where
        F: Fn(&dyn Emitter, &dyn Event) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let selector = Selector::emitter_name(emitter_name, event_name)?;
        self.registry.add(owner, selector, Arc::new(handler))
    }

    /// Subscribes to events of concrete type `E` sent by emitters of
    /// concrete type `M`.
    pub fn subscribe_emitter_typed<E, M, F>(
        &self,
        owner: &LifecycleOwner,
        handler: F,
    ) -> Result<SubscriptionId, EventError>
    where
        E: Event,
        M: Emitter,
        F: Fn(&M, &E) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let selector = Selector::emitter_type(TypeKey::of::<E>(), TypeKey::of::<M>());
        self.registry
            .add(owner, selector, typed_emitter_callback(handler))
    }

    /// Erased form of [`subscribe_emitter_typed`](Self::subscribe_emitter_typed).
    pub fn subscribe_emitter_type<F>(
        &self,
        owner: &LifecycleOwner,
        event_type: TypeKey,
        emitter_type: TypeKey,
        handler: F,
    ) -> Result<SubscriptionId, EventError>
    where
        F: Fn(&dyn Emitter, &dyn Event) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let selector = Selector::emitter_type(event_type, emitter_type);
        self.registry.add(owner, selector, Arc::new(handler))
    }

    // ------------------------------------------------------------------
    // Unsubscribe
    //
    // Each variant removes only what its subscribe counterpart created.
    // Removing something that is not registered is a no-op returning 0.
    // ------------------------------------------------------------------

    /// Removes every subscription of `owner`, including listener objects.
    pub fn unsubscribe(&self, owner: &LifecycleOwner) -> usize {
        let removed = self.registry.remove_by_owner(owner);
        if removed > 0 {
            debug!("🗑️ Removed {} subscriptions of {}", removed, owner.name());
        }
        removed
    }

    pub fn unsubscribe_event(&self, owner: &LifecycleOwner, event_name: &str) -> usize {
        match Selector::event_name(event_name) {
            Ok(selector) => self.remove_selector(owner, &selector),
            Err(_) => 0,
        }
    }

    pub fn unsubscribe_typed<E: Event>(&self, owner: &LifecycleOwner) -> usize {
        self.unsubscribe_type(owner, TypeKey::of::<E>())
    }

    pub fn unsubscribe_type(&self, owner: &LifecycleOwner, event_type: TypeKey) -> usize {
        self.remove_selector(owner, &Selector::event_type(event_type))
    }

    pub fn unsubscribe_emitter(
        &self,
        owner: &LifecycleOwner,
        emitter_name: &str,
        event_name: &str,
    ) -> usize {
        match Selector::emitter_name(emitter_name, event_name) {
            Ok(selector) => self.remove_selector(owner, &selector),
            Err(_) => 0,
        }
    }

    pub fn unsubscribe_emitter_typed<E: Event, M: Emitter>(&self, owner: &LifecycleOwner) -> usize {
        self.unsubscribe_emitter_type(owner, TypeKey::of::<E>(), TypeKey::of::<M>())
    }

    pub fn unsubscribe_emitter_type(
        &self,
        owner: &LifecycleOwner,
        event_type: TypeKey,
        emitter_type: TypeKey,
    ) -> usize {
        self.remove_selector(owner, &Selector::emitter_type(event_type, emitter_type))
    }

    fn remove_selector(&self, owner: &LifecycleOwner, selector: &Selector) -> usize {
        let removed = self.registry.remove_by_owner_and_selector(owner, selector);
        if removed > 0 {
            debug!(
                "🗑️ Removed {} subscriptions of {} for {}",
                removed,
                owner.name(),
                selector
            );
        }
        removed
    }

    /// Ends the owner's lifecycle and removes everything it subscribed.
    ///
    /// Handlers of this owner that were already matched by an in-flight
    /// dispatch are skipped when `skip_dead_owners` is enabled.
    pub fn end_lifecycle(&self, owner: &LifecycleOwner) -> usize {
        owner.mark_ended();
        let removed = self.registry.remove_by_owner(owner);
        info!(
            "🔌 Lifecycle of {} ended, removed {} subscriptions",
            owner.name(),
            removed
        );
        removed
    }

    // ------------------------------------------------------------------
    // Emit
    // ------------------------------------------------------------------

    /// Dispatches `event` from `emitter` to every matching subscription.
    ///
    /// Handler failures are logged and never returned to the caller.
    pub fn emit(&self, emitter: Arc<dyn Emitter>, event: Arc<dyn Event>) {
        self.dispatch(emitter, event, None);
    }

    /// Like [`emit`](Self::emit), then calls `on_complete` with the same
    /// event once every matched handler has finished.
    pub fn emit_with_completion<F>(
        &self,
        emitter: Arc<dyn Emitter>,
        event: Arc<dyn Event>,
        on_complete: F,
    ) where
        F: FnOnce(Arc<dyn Event>) + Send + 'static,
    {
        self.dispatch(emitter, event, Some(Box::new(on_complete)));
    }

    /// Emits and waits for the completion notification.
    ///
    /// Resolves to the emitted event instance, after any mutations the
    /// handlers made.
    pub async fn emit_wait(
        &self,
        emitter: Arc<dyn Emitter>,
        event: Arc<dyn Event>,
    ) -> Result<Arc<dyn Event>, EventError> {
        let (tx, rx) = oneshot::channel();
        self.emit_with_completion(emitter, event, move |event| {
            // The receiver may have been dropped by a cancelled caller
            let _ = tx.send(event);
        });

        rx.await
            .map_err(|_| EventError::Runtime("Dispatch ended without completing".to_string()))
    }

    fn dispatch(
        &self,
        emitter: Arc<dyn Emitter>,
        event: Arc<dyn Event>,
        on_complete: Option<CompletionCallback>,
    ) {
        let matches = self.registry.find_matches(emitter.as_ref(), event.as_ref());
        self.dispatcher.dispatch(matches, emitter, event, on_complete);
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub(crate) fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn subscription_count(&self) -> usize {
        self.registry.len()
    }

    pub fn subscriptions_of(&self, owner: &LifecycleOwner) -> Vec<Arc<Subscription>> {
        self.registry.subscriptions_of(owner)
    }

    pub fn stats(&self) -> EventManagerStats {
        self.dispatcher
            .counters()
            .snapshot(self.registry.len(), self.registry.listener_count())
    }
}

impl fmt::Debug for EventManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventManager")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}

/// Wraps a handler for a concrete event type in an erased callback.
pub(crate) fn typed_event_callback<E, F>(handler: F) -> EventCallback
where
    E: Event,
    F: Fn(&dyn Emitter, &E) -> Result<(), EventError> + Send + Sync + 'static,
{
    Arc::new(move |emitter: &dyn Emitter, event: &dyn Event| {
        let typed = downcast_event::<E>(event)?;
        handler(emitter, typed)
    })
}

/// Wraps a handler for a concrete event and emitter type in an erased
/// callback.
pub(crate) fn typed_emitter_callback<E, M, F>(handler: F) -> EventCallback
where
    E: Event,
    M: Emitter,
    F: Fn(&M, &E) -> Result<(), EventError> + Send + Sync + 'static,
{
    Arc::new(move |emitter: &dyn Emitter, event: &dyn Event| {
        let typed_event = downcast_event::<E>(event)?;
        let typed_emitter = downcast_emitter::<M>(emitter)?;
        handler(typed_emitter, typed_event)
    })
}

pub(crate) fn downcast_event<E: Event>(event: &dyn Event) -> Result<&E, EventError> {
    event.downcast_ref::<E>().ok_or(EventError::TypeMismatch {
        expected: type_name::<E>(),
        actual: event.event_type().name(),
    })
}

pub(crate) fn downcast_emitter<M: Emitter>(emitter: &dyn Emitter) -> Result<&M, EventError> {
    emitter.downcast_ref::<M>().ok_or(EventError::TypeMismatch {
        expected: type_name::<M>(),
        actual: emitter.emitter_type().name(),
    })
}
