//! Listener objects: one object, many handler methods.
//!
//! A listener type declares its handlers once in a [`HandlerTable`]. When a
//! listener instance is added, every table entry becomes a subscription bound
//! to that instance, all owned by the same lifecycle owner. Removal goes by
//! instance identity, so one owner can host several listener objects and
//! remove them independently.

use crate::container::{DependencyContainer, Resolvable};
use crate::error::EventError;
use crate::event::{Emitter, Event, TypeKey};
use crate::lifecycle::LifecycleOwner;
use crate::manager::{downcast_emitter, downcast_event, EventManager};
use crate::registry::{EventCallback, ListenerId, Selector, SubscriptionId};
use std::any::type_name;
use std::sync::Arc;
use tracing::{info, warn};

type ListenerMethod<L> =
    Arc<dyn Fn(&L, &dyn Emitter, &dyn Event) -> Result<(), EventError> + Send + Sync>;

/// An object whose methods handle events.
///
/// # Examples
///
/// ```rust
/// use rocket_events::{
///     Emitter, EventError, EventListener, EventManager, GenericEvent, HandlerTable,
///     LifecycleOwner,
/// };
/// use std::sync::Arc;
///
/// struct Greeter {
///     greeting: String,
/// }
///
/// impl Greeter {
///     fn on_connected(
///         &self,
///         _emitter: &dyn Emitter,
///         event: &GenericEvent,
///     ) -> Result<(), EventError> {
///         event.set_argument("reply", self.greeting.clone());
///         Ok(())
///     }
/// }
///
/// impl EventListener for Greeter {
///     fn register_handlers(table: &mut HandlerTable<Self>) {
///         table.on::<GenericEvent, _>(Greeter::on_connected);
///     }
/// }
///
/// # fn main() -> Result<(), EventError> {
/// let events = EventManager::new()?;
/// let plugin = LifecycleOwner::new("greeter");
/// let greeter = Arc::new(Greeter { greeting: "welcome".into() });
///
/// events.add_event_listener(&plugin, &greeter)?;
/// assert!(events.is_listener_registered(&greeter));
/// events.remove_event_listener(&greeter);
/// # Ok(())
/// # }
/// ```
pub trait EventListener: Sized + Send + Sync + 'static {
    /// Declares the handler methods of this listener type.
    fn register_handlers(table: &mut HandlerTable<Self>);

    /// Name used in log output.
    fn listener_name(&self) -> &str {
        type_name::<Self>()
    }
}

/// Declarative list of a listener type's handlers.
///
/// Invalid declarations (empty names) are recorded and reported when the
/// listener is added, so nothing is registered for a listener type with a
/// bad table.
pub struct HandlerTable<L> {
    entries: Vec<(Selector, ListenerMethod<L>)>,
    error: Option<EventError>,
}

impl<L: EventListener> HandlerTable<L> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            error: None,
        }
    }

    /// Handles events with the given name from any emitter.
    pub fn on_name<F>(&mut self, event_name: &str, method: F) -> &mut Self
    where
        F: Fn(&L, &dyn Emitter, &dyn Event) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let selector = Selector::event_name(event_name);
        self.push(selector, Arc::new(method))
    }

    /// Handles events of concrete type `E` from any emitter.
    pub fn on<E, F>(&mut self, method: F) -> &mut Self
    where
        E: Event,
        F: Fn(&L, &dyn Emitter, &E) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let selector = Selector::event_type(TypeKey::of::<E>());
        self.push(
            Ok(selector),
            Arc::new(move |listener: &L, emitter: &dyn Emitter, event: &dyn Event| {
                method(listener, emitter, downcast_event::<E>(event)?)
            }),
        )
    }

    /// Handles events with the given name sent by the named emitter.
    pub fn on_emitter_name<F>(
        &mut self,
        emitter_name: &str,
        event_name: &str,
        method: F,
    ) -> &mut Self
    where
        F: Fn(&L, &dyn Emitter, &dyn Event) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let selector = Selector::emitter_name(emitter_name, event_name);
        self.push(selector, Arc::new(method))
    }

    /// Handles events of concrete type `E` sent by emitters of concrete
    /// type `M`.
    pub fn on_emitter<E, M, F>(&mut self, method: F) -> &mut Self
    where
        E: Event,
        M: Emitter,
        F: Fn(&L, &M, &E) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let selector = Selector::emitter_type(TypeKey::of::<E>(), TypeKey::of::<M>());
        self.push(
            Ok(selector),
            Arc::new(move |listener: &L, emitter: &dyn Emitter, event: &dyn Event| {
                method(
                    listener,
                    downcast_emitter::<M>(emitter)?,
                    downcast_event::<E>(event)?,
                )
            }),
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(
        &mut self,
        selector: Result<Selector, EventError>,
        method: ListenerMethod<L>,
    ) -> &mut Self {
        match selector {
            Ok(selector) => self.entries.push((selector, method)),
            Err(e) => {
                if self.error.is_none() {
                    self.error = Some(e);
                }
            }
        }
        self
    }

    /// Binds every declared method to `listener`.
    fn bind(self, listener: &Arc<L>) -> Result<Vec<(Selector, EventCallback)>, EventError> {
        if let Some(e) = self.error {
            return Err(e);
        }

        Ok(self
            .entries
            .into_iter()
            .map(|(selector, method)| {
                let listener = listener.clone();
                let callback: EventCallback =
                    Arc::new(move |emitter: &dyn Emitter, event: &dyn Event| {
                        method(&listener, emitter, event)
                    });
                (selector, callback)
            })
            .collect())
    }
}

impl EventManager {
    /// Registers every handler declared by `L` for this listener instance.
    ///
    /// Either all handlers are subscribed or, on error, none are. Adding the
    /// same instance twice fails with
    /// [`EventError::ListenerAlreadyRegistered`].
    pub fn add_event_listener<L: EventListener>(
        &self,
        owner: &LifecycleOwner,
        listener: &Arc<L>,
    ) -> Result<Vec<SubscriptionId>, EventError> {
        let mut table = HandlerTable::new();
        L::register_handlers(&mut table);

        let name = listener.listener_name().to_string();
        if table.is_empty() {
            warn!("⚠️ Listener {} declares no handlers", name);
        }

        let entries = table.bind(listener)?;
        let ids = self
            .registry()
            .add_listener(owner, ListenerId::of(listener), &name, entries)?;

        info!(
            "👂 Registered listener {} for {} with {} handlers",
            name,
            owner.name(),
            ids.len()
        );
        Ok(ids)
    }

    /// Removes exactly the subscriptions created for this listener instance,
    /// whichever owner they were registered under.
    pub fn remove_event_listener<L: EventListener>(&self, listener: &Arc<L>) -> usize {
        self.registry().remove_by_listener(ListenerId::of(listener))
    }

    pub fn is_listener_registered<L: EventListener>(&self, listener: &Arc<L>) -> bool {
        self.registry().contains_listener(ListenerId::of(listener))
    }

    /// Builds a listener from `container` and registers it.
    ///
    /// A resolution failure is returned before anything is registered.
    pub fn activate_listener<L>(
        &self,
        owner: &LifecycleOwner,
        container: &DependencyContainer,
    ) -> Result<Arc<L>, EventError>
    where
        L: EventListener + Resolvable,
    {
        let listener = Arc::new(L::resolve(container)?);
        self.add_event_listener(owner, &listener)?;
        Ok(listener)
    }
}
