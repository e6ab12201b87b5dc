//! Handler execution for a snapshotted match set.
//!
//! - Synchronous: handlers run in match order on the emitting thread.
//! - Asynchronous: one blocking task runs the handlers in match order, then
//!   the completion callback.
//! - Parallel: one blocking task per handler; a joining task fires the
//!   completion callback once every handler task has finished.
//!
//! Handler failures and panics are contained per handler and never reach the
//! caller of `emit`.

use crate::config::EventManagerConfig;
use crate::error::EventError;
use crate::event::{Emitter, Event, ExecutionTarget};
use crate::registry::Subscription;
use crate::stats::DispatchCounters;
use futures::future::join_all;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, error};

/// Callback fired once all matched handlers of an `emit` have run.
///
/// Receives the same event instance that was emitted.
pub type CompletionCallback = Box<dyn FnOnce(Arc<dyn Event>) + Send + 'static>;

/// Converts a panic payload to a readable message.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Runs matched handlers on the calling thread or on a Tokio runtime.
pub(crate) struct Dispatcher {
    handle: Handle,
    /// Present when no ambient runtime existed at construction time
    owned: Option<Runtime>,
    counters: Arc<DispatchCounters>,
    trace_dispatch: bool,
    skip_dead_owners: bool,
}

impl Dispatcher {
    /// Uses the current Tokio runtime if there is one, otherwise builds a
    /// dedicated multi-threaded runtime.
    pub(crate) fn new(config: &EventManagerConfig) -> Result<Self, EventError> {
        match Handle::try_current() {
            Ok(handle) => Ok(Self::with_handle(handle, config)),
            Err(_) => {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(config.effective_worker_threads())
                    .thread_name(config.thread_name.clone())
                    .enable_all()
                    .build()
                    .map_err(|e| {
                        EventError::Runtime(format!("Failed to build dispatch runtime: {}", e))
                    })?;
                debug!(
                    "Built dispatch runtime with {} workers",
                    config.effective_worker_threads()
                );

                let mut dispatcher = Self::with_handle(runtime.handle().clone(), config);
                dispatcher.owned = Some(runtime);
                Ok(dispatcher)
            }
        }
    }

    pub(crate) fn with_handle(handle: Handle, config: &EventManagerConfig) -> Self {
        Self {
            handle,
            owned: None,
            counters: Arc::new(DispatchCounters::default()),
            trace_dispatch: config.trace_dispatch,
            skip_dead_owners: config.skip_dead_owners,
        }
    }

    pub(crate) fn counters(&self) -> &DispatchCounters {
        &self.counters
    }

    pub(crate) fn dispatch(
        &self,
        matches: Vec<Arc<Subscription>>,
        emitter: Arc<dyn Emitter>,
        event: Arc<dyn Event>,
        on_complete: Option<CompletionCallback>,
    ) {
        self.counters.record_emit();
        let target = event.execution_target();

        if self.trace_dispatch {
            debug!(
                "📤 Emitting {} ({}) to {} handlers",
                event.name(),
                target,
                matches.len()
            );
        }

        if matches.is_empty() {
            complete(on_complete, event);
            return;
        }

        let invoker = Invoker {
            counters: self.counters.clone(),
            trace_dispatch: self.trace_dispatch,
            skip_dead_owners: self.skip_dead_owners,
        };

        match target {
            ExecutionTarget::Synchronous => {
                for subscription in &matches {
                    invoker.invoke(subscription, emitter.as_ref(), event.as_ref());
                }
                complete(on_complete, event);
            }
            ExecutionTarget::Asynchronous => {
                self.handle.spawn_blocking(move || {
                    for subscription in &matches {
                        invoker.invoke(subscription, emitter.as_ref(), event.as_ref());
                    }
                    complete(on_complete, event);
                });
            }
            ExecutionTarget::Parallel => {
                let tasks: Vec<_> = matches
                    .into_iter()
                    .map(|subscription| {
                        let invoker = invoker.clone();
                        let emitter = emitter.clone();
                        let event = event.clone();
                        self.handle.spawn_blocking(move || {
                            invoker.invoke(&subscription, emitter.as_ref(), event.as_ref());
                        })
                    })
                    .collect();

                self.handle.spawn(async move {
                    for result in join_all(tasks).await {
                        if let Err(e) = result {
                            error!("❌ Parallel handler task for {} failed: {}", event.name(), e);
                        }
                    }
                    complete(on_complete, event);
                });
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Some(runtime) = self.owned.take() {
            runtime.shutdown_background();
        }
    }
}

/// Everything a handler invocation needs, cheap to clone into tasks.
#[derive(Clone)]
struct Invoker {
    counters: Arc<DispatchCounters>,
    trace_dispatch: bool,
    skip_dead_owners: bool,
}

impl Invoker {
    fn invoke(&self, subscription: &Subscription, emitter: &dyn Emitter, event: &dyn Event) {
        let owner = subscription.owner();
        if self.skip_dead_owners && !owner.is_alive() {
            debug!(
                "Skipping subscription {} of ended owner {} for {}",
                subscription.id(),
                owner.name(),
                event.name()
            );
            self.counters.record_skip();
            return;
        }

        if self.trace_dispatch {
            debug!(
                "Invoking subscription {} ({}) of {} for {}",
                subscription.id(),
                subscription.selector(),
                owner.name(),
                event.name()
            );
        }

        let result = catch_unwind(AssertUnwindSafe(|| subscription.invoke(emitter, event)))
            .unwrap_or_else(|payload| Err(EventError::HandlerPanicked(panic_message(payload))));

        match result {
            Ok(()) => self.counters.record_success(),
            Err(e) => {
                self.counters.record_failure();
                error!(
                    event = event.name(),
                    owner = owner.name(),
                    listener = subscription.listener_name().unwrap_or("-"),
                    subscription = subscription.id().value(),
                    "❌ Handler failed: {}",
                    e
                );
            }
        }
    }
}

fn complete(on_complete: Option<CompletionCallback>, event: Arc<dyn Event>) {
    let Some(callback) = on_complete else {
        return;
    };

    let name = event.name().to_string();
    if let Err(payload) = catch_unwind(AssertUnwindSafe(move || callback(event))) {
        error!(
            "❌ Completion callback for {} panicked: {}",
            name,
            panic_message(payload)
        );
    }
}
