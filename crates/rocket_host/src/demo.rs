//! Demo plugins wired against the event manager.
//!
//! Two lifecycle owners stand in for loaded plugins: a welcome plugin built
//! as a listener object from the dependency container, and a statistics
//! plugin using plain closure subscriptions.

use parking_lot::Mutex;
use rocket_events::{
    DependencyContainer, Emitter, Event, EventError, EventListener, EventManager, EventMeta,
    ExecutionTarget, GenericEvent, HandlerTable, LifecycleOwner, Logger, Resolvable,
    ResolutionError,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The server itself, as an event emitter.
#[derive(Debug)]
pub struct Server {
    name: String,
}

impl Server {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Emitter for Server {
    fn emitter_name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

/// A player joined. Handlers may leave a greeting for the player.
#[derive(Debug)]
pub struct PlayerConnected {
    meta: EventMeta,
    pub player: String,
    greeting: Mutex<Option<String>>,
}

impl PlayerConnected {
    pub fn new(sender: Arc<dyn Emitter>, player: impl Into<String>) -> Self {
        Self {
            meta: EventMeta::new("PlayerConnected")
                .with_sender(sender)
                .with_target(ExecutionTarget::Asynchronous),
            player: player.into(),
            greeting: Mutex::new(None),
        }
    }

    pub fn greeting(&self) -> Option<String> {
        self.greeting.lock().clone()
    }

    pub fn set_greeting(&self, greeting: impl Into<String>) {
        *self.greeting.lock() = Some(greeting.into());
    }
}

impl Event for PlayerConnected {
    fn meta(&self) -> &EventMeta {
        &self.meta
    }
}

/// Periodic server tick, dispatched to all handlers in parallel.
#[derive(Debug)]
pub struct ServerTick {
    meta: EventMeta,
    pub tick: u64,
}

impl ServerTick {
    pub fn new(tick: u64) -> Self {
        Self {
            meta: EventMeta::new("ServerTick").with_target(ExecutionTarget::Parallel),
            tick,
        }
    }
}

impl Event for ServerTick {
    fn meta(&self) -> &EventMeta {
        &self.meta
    }
}

/// Message of the day, registered in the container by the host.
#[derive(Debug, Clone)]
pub struct Motd(pub String);

/// Greets connecting players and says goodbye to leaving ones.
pub struct WelcomeListener {
    motd: Arc<Motd>,
    log: Arc<Logger>,
}

impl WelcomeListener {
    fn on_player_connected(
        &self,
        _server: &Server,
        event: &PlayerConnected,
    ) -> Result<(), EventError> {
        event.set_greeting(format!("{}, {}", self.motd.0, event.player));
        self.log.info(&format!("greeted {}", event.player));
        Ok(())
    }

    fn on_player_disconnected(
        &self,
        _emitter: &dyn Emitter,
        event: &dyn Event,
    ) -> Result<(), EventError> {
        let player = event
            .downcast_ref::<GenericEvent>()
            .and_then(|e| e.argument("player"))
            .ok_or_else(|| EventError::HandlerExecution("disconnect without player".to_string()))?;
        self.log.info(&format!("goodbye {}", player));
        Ok(())
    }
}

impl Resolvable for WelcomeListener {
    fn resolve(container: &DependencyContainer) -> Result<Self, ResolutionError> {
        Ok(Self {
            motd: container.resolve::<Motd>()?,
            log: container
                .try_resolve::<Logger>()
                .unwrap_or_else(|| Arc::new(Logger::new("welcome"))),
        })
    }
}

impl EventListener for WelcomeListener {
    fn register_handlers(table: &mut HandlerTable<Self>) {
        table
            .on_emitter::<PlayerConnected, Server, _>(WelcomeListener::on_player_connected)
            .on_emitter_name(
                "server",
                "PlayerDisconnected",
                WelcomeListener::on_player_disconnected,
            );
    }

    fn listener_name(&self) -> &str {
        "WelcomeListener"
    }
}

/// Running counters kept by the statistics plugin.
#[derive(Debug, Default)]
pub struct TickStats {
    pub ticks: AtomicU64,
    pub connects: AtomicU64,
}

/// The demo plugins loaded into one event manager.
pub struct Plugins {
    pub welcome: LifecycleOwner,
    pub stats: LifecycleOwner,
    pub listener: Arc<WelcomeListener>,
    pub counters: Arc<TickStats>,
}

impl Plugins {
    /// Loads both plugins. Nothing stays registered if either fails.
    ///
    /// The welcome plugin needs a [`Motd`] in `container`; a [`Logger`] is
    /// optional.
    ///
    /// # Errors
    ///
    /// [`EventError::Resolution`] when the container lacks a dependency, or
    /// any registration error from the event manager.
    pub fn load(
        events: &EventManager,
        container: &DependencyContainer,
    ) -> Result<Self, EventError> {
        let welcome = LifecycleOwner::new("welcome");
        let listener = events.activate_listener::<WelcomeListener>(&welcome, container)?;

        let stats = LifecycleOwner::new("stats");
        let counters = Arc::new(TickStats::default());
        if let Err(e) = subscribe_stats(events, &stats, &counters) {
            events.end_lifecycle(&welcome);
            events.end_lifecycle(&stats);
            return Err(e);
        }

        Ok(Self {
            welcome,
            stats,
            listener,
            counters,
        })
    }

    /// Ends both plugin lifecycles and returns how many subscriptions went
    /// with them.
    pub fn unload(&self, events: &EventManager) -> usize {
        events.end_lifecycle(&self.welcome) + events.end_lifecycle(&self.stats)
    }
}

fn subscribe_stats(
    events: &EventManager,
    owner: &LifecycleOwner,
    counters: &Arc<TickStats>,
) -> Result<(), EventError> {
    let ticks = counters.clone();
    events.subscribe_typed::<ServerTick, _>(owner, move |_, tick| {
        ticks.ticks.fetch_max(tick.tick, Ordering::Relaxed);
        Ok(())
    })?;

    let connects = counters.clone();
    events.subscribe(owner, "playerconnected", move |_, _| {
        connects.connects.fetch_add(1, Ordering::Relaxed);
        Ok(())
    })?;
    Ok(())
}
