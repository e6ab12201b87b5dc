//! Lifecycle owners.
//!
//! A lifecycle owner represents a bounded lifetime such as a loaded plugin or
//! module. Every subscription is attached to exactly one owner, and ending the
//! owner's lifecycle removes everything it subscribed. The manager only ever
//! looks at an owner's identity, never at what the owner represents.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for a lifecycle owner.
///
/// Two [`LifecycleOwner`] handles are the same owner exactly when their ids
/// are equal; owners that share a display name are still distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub Uuid);

impl OwnerId {
    /// Creates a new random owner ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct OwnerState {
    id: OwnerId,
    name: String,
    alive: AtomicBool,
}

/// Cheaply cloneable handle to a lifecycle owner.
///
/// Clones share identity and liveness: ending the lifecycle through one
/// handle is observed by all of them.
///
/// # Examples
///
/// ```rust
/// use rocket_events::LifecycleOwner;
///
/// let plugin = LifecycleOwner::new("economy");
/// let same = plugin.clone();
/// assert_eq!(plugin, same);
/// assert_ne!(plugin, LifecycleOwner::new("economy"));
/// ```
#[derive(Clone)]
pub struct LifecycleOwner {
    state: Arc<OwnerState>,
}

impl LifecycleOwner {
    /// Creates a new, alive owner with the given display name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: Arc::new(OwnerState {
                id: OwnerId::new(),
                name: name.into(),
                alive: AtomicBool::new(true),
            }),
        }
    }

    /// Returns the identity of this owner.
    pub fn id(&self) -> OwnerId {
        self.state.id
    }

    /// Returns the display name used in log output.
    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Returns `false` once the owner's lifecycle has ended.
    pub fn is_alive(&self) -> bool {
        self.state.alive.load(Ordering::Acquire)
    }

    /// Marks the lifecycle as ended. Returns `true` if this call ended it.
    pub(crate) fn mark_ended(&self) -> bool {
        self.state.alive.swap(false, Ordering::AcqRel)
    }
}

impl PartialEq for LifecycleOwner {
    fn eq(&self, other: &Self) -> bool {
        self.state.id == other.state.id
    }
}

impl Eq for LifecycleOwner {}

impl Hash for LifecycleOwner {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.state.id.hash(state);
    }
}

impl fmt::Debug for LifecycleOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleOwner")
            .field("id", &self.state.id)
            .field("name", &self.state.name)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl fmt::Display for LifecycleOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.state.name, self.state.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity_and_liveness() {
        let owner = LifecycleOwner::new("chat");
        let clone = owner.clone();

        assert_eq!(owner, clone);
        assert_eq!(owner.id(), clone.id());
        assert!(clone.is_alive());

        assert!(owner.mark_ended());
        assert!(!clone.is_alive());
        // Ending twice reports that it was already ended
        assert!(!clone.mark_ended());
    }

    #[test]
    fn owners_with_same_name_are_distinct() {
        let first = LifecycleOwner::new("chat");
        let second = LifecycleOwner::new("chat");

        assert_ne!(first, second);
        assert_eq!(first.name(), second.name());
    }
}
