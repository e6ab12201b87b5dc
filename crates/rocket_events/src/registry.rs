//! Subscription registry.
//!
//! Subscriptions are kept in four parallel indexes, one per match kind, plus
//! an owner index and a listener-object index used for bulk removal. Each
//! subscription sits in exactly one of the four match indexes, so a dispatch
//! never sees it twice. Ids come from a single sequence, and matches from
//! different indexes are merged by id, which keeps registration order across
//! match kinds.
//!
//! All indexes live behind one lock. `find_matches` clones the matching
//! subscriptions out before returning, so callers invoke handlers without
//! holding the lock and handlers may freely subscribe or unsubscribe.

use crate::error::EventError;
use crate::event::{Emitter, Event, TypeKey};
use crate::lifecycle::{LifecycleOwner, OwnerId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

/// Type-erased handler invoked for a matching event.
pub type EventCallback =
    Arc<dyn Fn(&dyn Emitter, &dyn Event) -> Result<(), EventError> + Send + Sync>;

/// Registration sequence number, unique per registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a registered listener object.
///
/// Derived from the address of the listener's `Arc` allocation. The
/// registry keeps a clone of that `Arc` alive inside every callback it
/// created, so the address cannot be reused while the listener is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

impl ListenerId {
    pub fn of<L>(listener: &Arc<L>) -> Self {
        Self(Arc::as_ptr(listener) as *const () as usize)
    }
}

/// Which selector fields a subscription uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    ByEventName,
    ByEventType,
    ByEventNameAndEmitterName,
    ByEventTypeAndEmitterType,
}

/// What a subscription matches on.
///
/// Each variant carries exactly the fields its match kind needs. Names are
/// stored case-folded so equality here is the same comparison dispatch uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    EventName(String),
    EventType(TypeKey),
    EventNameAndEmitterName { event: String, emitter: String },
    EventTypeAndEmitterType { event: TypeKey, emitter: TypeKey },
}

impl Selector {
    /// Selects events by name from any emitter.
    pub fn event_name(event_name: &str) -> Result<Self, EventError> {
        Ok(Self::EventName(fold_event_name(event_name)?))
    }

    /// Selects events by concrete type from any emitter.
    pub fn event_type(event_type: TypeKey) -> Self {
        Self::EventType(event_type)
    }

    /// Selects events by name sent by the named emitter.
    pub fn emitter_name(emitter_name: &str, event_name: &str) -> Result<Self, EventError> {
        let event = fold_event_name(event_name)?;
        if emitter_name.trim().is_empty() {
            return Err(EventError::EmptyEmitterName);
        }
        Ok(Self::EventNameAndEmitterName {
            event,
            emitter: fold(emitter_name),
        })
    }

    /// Selects events by concrete type sent by emitters of a concrete type.
    pub fn emitter_type(event_type: TypeKey, emitter_type: TypeKey) -> Self {
        Self::EventTypeAndEmitterType {
            event: event_type,
            emitter: emitter_type,
        }
    }

    pub fn kind(&self) -> MatchKind {
        match self {
            Selector::EventName(_) => MatchKind::ByEventName,
            Selector::EventType(_) => MatchKind::ByEventType,
            Selector::EventNameAndEmitterName { .. } => MatchKind::ByEventNameAndEmitterName,
            Selector::EventTypeAndEmitterType { .. } => MatchKind::ByEventTypeAndEmitterType,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::EventName(name) => write!(f, "name:{}", name),
            Selector::EventType(event) => write!(f, "type:{}", event),
            Selector::EventNameAndEmitterName { event, emitter } => {
                write!(f, "name:{}@{}", event, emitter)
            }
            Selector::EventTypeAndEmitterType { event, emitter } => {
                write!(f, "type:{}@{}", event, emitter)
            }
        }
    }
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

fn fold_event_name(event_name: &str) -> Result<String, EventError> {
    if event_name.trim().is_empty() {
        return Err(EventError::EmptyEventName);
    }
    Ok(fold(event_name))
}

/// A single registered handler.
pub struct Subscription {
    id: SubscriptionId,
    owner: LifecycleOwner,
    selector: Selector,
    listener: Option<ListenerId>,
    listener_name: Option<String>,
    callback: EventCallback,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn owner(&self) -> &LifecycleOwner {
        &self.owner
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn kind(&self) -> MatchKind {
        self.selector.kind()
    }

    /// The listener object this subscription was created for, if any.
    pub fn listener(&self) -> Option<ListenerId> {
        self.listener
    }

    /// Name of the listener object this subscription was created for.
    pub fn listener_name(&self) -> Option<&str> {
        self.listener_name.as_deref()
    }

    pub(crate) fn invoke(
        &self,
        emitter: &dyn Emitter,
        event: &dyn Event,
    ) -> Result<(), EventError> {
        (self.callback)(emitter, event)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("owner", &self.owner.name())
            .field("selector", &self.selector)
            .field("listener", &self.listener)
            .field("listener_name", &self.listener_name)
            .finish()
    }
}

/// Bookkeeping for one registered listener object.
#[derive(Debug, Clone)]
struct ListenerRecord {
    name: String,
    owner: OwnerId,
    subscriptions: Vec<SubscriptionId>,
}

type Bucket = Vec<Arc<Subscription>>;

#[derive(Default)]
struct Indexes {
    next_id: u64,
    by_name: HashMap<String, Bucket>,
    by_type: HashMap<TypeKey, Bucket>,
    by_name_and_emitter: HashMap<(String, String), Bucket>,
    by_type_and_emitter: HashMap<(TypeKey, TypeKey), Bucket>,
    by_owner: HashMap<OwnerId, Bucket>,
    listeners: HashMap<ListenerId, ListenerRecord>,
    total: usize,
}

impl Indexes {
    fn insert(
        &mut self,
        owner: &LifecycleOwner,
        selector: Selector,
        listener: Option<(ListenerId, &str)>,
        callback: EventCallback,
    ) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let subscription = Arc::new(Subscription {
            id,
            owner: owner.clone(),
            selector,
            listener: listener.map(|(id, _)| id),
            listener_name: listener.map(|(_, name)| name.to_string()),
            callback,
        });

        let bucket = match &subscription.selector {
            Selector::EventName(name) => self.by_name.entry(name.clone()).or_default(),
            Selector::EventType(event) => self.by_type.entry(*event).or_default(),
            Selector::EventNameAndEmitterName { event, emitter } => self
                .by_name_and_emitter
                .entry((event.clone(), emitter.clone()))
                .or_default(),
            Selector::EventTypeAndEmitterType { event, emitter } => self
                .by_type_and_emitter
                .entry((*event, *emitter))
                .or_default(),
        };
        bucket.push(subscription.clone());

        self.by_owner.entry(owner.id()).or_default().push(subscription);
        self.total += 1;
        id
    }

    /// Removes every subscription of `owner` accepted by `filter`.
    fn remove_owned<F>(&mut self, owner: OwnerId, filter: F) -> usize
    where
        F: Fn(&Subscription) -> bool,
    {
        let Some(owned) = self.by_owner.get_mut(&owner) else {
            return 0;
        };

        let (removed, kept): (Bucket, Bucket) = owned.drain(..).partition(|s| filter(&**s));
        if kept.is_empty() {
            self.by_owner.remove(&owner);
        } else {
            *owned = kept;
        }

        for subscription in &removed {
            self.detach(subscription);
        }
        self.total -= removed.len();
        removed.len()
    }

    /// Removes a subscription from its match index and listener record.
    fn detach(&mut self, subscription: &Subscription) {
        let id = subscription.id;
        match &subscription.selector {
            Selector::EventName(name) => remove_from_bucket(&mut self.by_name, name, id),
            Selector::EventType(event) => remove_from_bucket(&mut self.by_type, event, id),
            Selector::EventNameAndEmitterName { event, emitter } => remove_from_bucket(
                &mut self.by_name_and_emitter,
                &(event.clone(), emitter.clone()),
                id,
            ),
            Selector::EventTypeAndEmitterType { event, emitter } => {
                remove_from_bucket(&mut self.by_type_and_emitter, &(*event, *emitter), id)
            }
        }

        if let Some(listener) = subscription.listener {
            if let Some(record) = self.listeners.get_mut(&listener) {
                record.subscriptions.retain(|s| *s != id);
                if record.subscriptions.is_empty() {
                    self.listeners.remove(&listener);
                }
            }
        }
    }
}

fn remove_from_bucket<K>(index: &mut HashMap<K, Bucket>, key: &K, id: SubscriptionId)
where
    K: Eq + Hash,
{
    if let Some(bucket) = index.get_mut(key) {
        bucket.retain(|s| s.id != id);
        if bucket.is_empty() {
            index.remove(key);
        }
    }
}

fn collect<K>(index: &HashMap<K, Bucket>, key: &K, into: &mut Bucket)
where
    K: Eq + Hash,
{
    if let Some(bucket) = index.get(key) {
        into.extend(bucket.iter().cloned());
    }
}

/// Thread-safe multi-index set of subscriptions.
#[derive(Default)]
pub struct SubscriptionRegistry {
    indexes: RwLock<Indexes>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a subscription. Identical selectors are not de-duplicated;
    /// each registration fires independently.
    ///
    /// The owner's alive flag is checked under the write lock. An owner is
    /// marked ended before its subscriptions are removed, so an insert either
    /// lands before that removal or is rejected.
    pub fn add(
        &self,
        owner: &LifecycleOwner,
        selector: Selector,
        callback: EventCallback,
    ) -> Result<SubscriptionId, EventError> {
        let mut indexes = self.indexes.write();
        if !owner.is_alive() {
            return Err(EventError::OwnerNotAlive(owner.name().to_string()));
        }

        let id = indexes.insert(owner, selector, None, callback);
        debug!("📝 Registered subscription {} for {}", id, owner.name());
        Ok(id)
    }

    /// Inserts all handlers of one listener object atomically.
    ///
    /// Either every entry is registered or, on error, none are.
    pub fn add_listener(
        &self,
        owner: &LifecycleOwner,
        listener: ListenerId,
        listener_name: &str,
        entries: Vec<(Selector, EventCallback)>,
    ) -> Result<Vec<SubscriptionId>, EventError> {
        let mut indexes = self.indexes.write();
        if !owner.is_alive() {
            return Err(EventError::OwnerNotAlive(owner.name().to_string()));
        }
        if indexes.listeners.contains_key(&listener) {
            return Err(EventError::ListenerAlreadyRegistered(listener_name.to_string()));
        }
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<SubscriptionId> = entries
            .into_iter()
            .map(|(selector, callback)| {
                indexes.insert(owner, selector, Some((listener, listener_name)), callback)
            })
            .collect();

        indexes.listeners.insert(
            listener,
            ListenerRecord {
                name: listener_name.to_string(),
                owner: owner.id(),
                subscriptions: ids.clone(),
            },
        );
        Ok(ids)
    }

    /// Removes every subscription owned by `owner`, including those created
    /// for listener objects.
    pub fn remove_by_owner(&self, owner: &LifecycleOwner) -> usize {
        self.indexes.write().remove_owned(owner.id(), |_| true)
    }

    /// Removes the subscriptions of `owner` whose selector equals `selector`.
    pub fn remove_by_owner_and_selector(
        &self,
        owner: &LifecycleOwner,
        selector: &Selector,
    ) -> usize {
        self.indexes
            .write()
            .remove_owned(owner.id(), |s| s.selector == *selector)
    }

    /// Removes exactly the subscriptions created for one listener object.
    pub fn remove_by_listener(&self, listener: ListenerId) -> usize {
        let mut indexes = self.indexes.write();
        let Some(record) = indexes.listeners.get(&listener).cloned() else {
            return 0;
        };

        let removed = indexes.remove_owned(record.owner, |s| s.listener == Some(listener));
        indexes.listeners.remove(&listener);
        debug!("🗑️ Removed {} subscriptions of listener {}", removed, record.name);
        removed
    }

    /// Returns every subscription matching the event and emitter, in
    /// registration order.
    ///
    /// The result is a snapshot: later registry changes do not affect it.
    pub fn find_matches(&self, emitter: &dyn Emitter, event: &dyn Event) -> Vec<Arc<Subscription>> {
        let event_name = fold(event.name());
        let event_type = event.event_type();
        let emitter_type = emitter.emitter_type();
        let emitter_name = emitter.emitter_name().map(fold);

        let indexes = self.indexes.read();
        let mut matches = Vec::new();

        collect(&indexes.by_name, &event_name, &mut matches);
        collect(&indexes.by_type, &event_type, &mut matches);
        if let Some(emitter_name) = emitter_name {
            collect(
                &indexes.by_name_and_emitter,
                &(event_name, emitter_name),
                &mut matches,
            );
        }
        collect(
            &indexes.by_type_and_emitter,
            &(event_type, emitter_type),
            &mut matches,
        );
        drop(indexes);

        matches.sort_unstable_by_key(|s| s.id);
        matches
    }

    /// Total number of live subscriptions.
    pub fn len(&self) -> usize {
        self.indexes.read().total
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of registered listener objects.
    pub fn listener_count(&self) -> usize {
        self.indexes.read().listeners.len()
    }

    pub fn contains_listener(&self, listener: ListenerId) -> bool {
        self.indexes.read().listeners.contains_key(&listener)
    }

    /// Returns the subscriptions owned by `owner`, in registration order.
    pub fn subscriptions_of(&self, owner: &LifecycleOwner) -> Vec<Arc<Subscription>> {
        self.indexes
            .read()
            .by_owner
            .get(&owner.id())
            .cloned()
            .unwrap_or_default()
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let indexes = self.indexes.read();
        f.debug_struct("SubscriptionRegistry")
            .field("subscriptions", &indexes.total)
            .field("owners", &indexes.by_owner.len())
            .field("listeners", &indexes.listeners.len())
            .finish()
    }
}
