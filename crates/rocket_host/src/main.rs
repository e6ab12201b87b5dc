//! Rocket host entry point
//!
//! Loads configuration, installs logging, creates the event manager and
//! runs the demo plugins until a shutdown signal arrives.

mod cli;
mod config;
mod demo;
mod logging;
mod signals;

use anyhow::{anyhow, Context, Result};
use cli::CliArgs;
use config::AppConfig;
use demo::{Motd, PlayerConnected, Plugins, Server, ServerTick};
use rocket_events::{
    create_event_manager_with_config, DependencyContainer, Emitter, EventManager, GenericEvent,
    LogLevel, Logger,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let config = load_config(&args).await?;
    logging::setup_logging(&config.logging)?;

    if let Err(e) = run(config, args.once).await {
        error!("❌ Application error: {:?}", e);
        return Err(e);
    }
    Ok(())
}

/// Loads the configuration file and applies CLI overrides.
async fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let mut config = AppConfig::load_from_file(&args.config_path).await?;

    if let Some(level) = &args.log_level {
        config.logging.level = level.parse::<LogLevel>().map_err(|e| anyhow!(e))?;
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    if args.trace_dispatch {
        config.events.trace_dispatch = true;
    }

    config.validate()?;
    Ok(config)
}

async fn run(config: AppConfig, once: bool) -> Result<()> {
    info!("🚀 Rocket host v{}", env!("CARGO_PKG_VERSION"));

    let events = create_event_manager_with_config(config.events.clone())
        .context("Failed to create event manager")?;

    let container = DependencyContainer::new();
    container.register_instance(Arc::new(Motd(config.demo.motd.clone())));
    container.register_instance(Arc::new(Logger::new("welcome")));

    let plugins = Plugins::load(&events, &container).context("Failed to load plugins")?;
    info!("🔌 Plugins loaded: {} subscriptions", events.subscription_count());

    let server: Arc<dyn Emitter> = Arc::new(Server::new("server"));
    let ticker = {
        let events = events.clone();
        let server = server.clone();
        let interval = Duration::from_millis(config.demo.tick_interval_ms);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval);
            let mut tick = 0u64;
            loop {
                interval.tick().await;
                tick += 1;
                events.emit(server.clone(), Arc::new(ServerTick::new(tick)));
            }
        })
    };

    simulate_session(&events, &server, "alice").await?;

    if !once {
        info!("🛑 Press Ctrl+C to shut down");
        let signal = signals::wait_for_shutdown().await?;
        info!("🛑 Stopping after {}", signal);
    }

    info!("🛑 Shutting down");
    ticker.abort();
    let removed = plugins.unload(&events);

    let stats = events.stats();
    info!("📊 Final statistics:");
    info!("  - Subscriptions removed on unload: {}", removed);
    info!("  - Events emitted: {}", stats.events_emitted);
    info!("  - Handlers invoked: {}", stats.handlers_invoked);
    info!("  - Handler failures: {}", stats.handler_failures);
    info!(
        "  - Ticks seen by stats plugin: {}",
        plugins.counters.ticks.load(std::sync::atomic::Ordering::Relaxed)
    );
    Ok(())
}

/// Connects and disconnects one player.
async fn simulate_session(
    events: &EventManager,
    server: &Arc<dyn Emitter>,
    player: &str,
) -> Result<()> {
    let connected = Arc::new(PlayerConnected::new(server.clone(), player));
    let done = events.emit_wait(server.clone(), connected).await?;

    if let Some(greeting) = done
        .downcast_ref::<PlayerConnected>()
        .and_then(|event| event.greeting())
    {
        info!("💬 {} was greeted with: {}", player, greeting);
    }

    let disconnected = GenericEvent::new("PlayerDisconnected")
        .with_sender(server.clone())
        .with_argument("player", player);
    events.emit(server.clone(), Arc::new(disconnected));
    Ok(())
}
