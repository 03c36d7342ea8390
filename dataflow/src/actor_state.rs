//! Per-actor state, explicit and validated rather than dynamically
//! trapped.
//!
//! `original_source`'s `actor/actorstate.py` traps arbitrary attribute
//! reads and writes through `__getattr__`/`__setattr__`, routing
//! anything not already known onto an internal dict. That has no Rust
//! analogue (and wouldn't be idiomatic if it did): `ActorState` here
//! holds an explicit `state: HashMap<String, Value>` plus a declared
//! set of managed keys, and every access is checked against it.

use hashbrown::{HashMap, HashSet};
use serde_json::Value;

use dataflow_core::ids::ActorId;

/// Errors from accessing actor state outside its declared managed keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ActorStateError {
    #[error("key is not a managed state key for this actor")]
    UnmanagedKey,
}

/// An actor's persistent state: a value map restricted to a declared
/// set of keys, so migration can snapshot exactly what the actor
/// declared and nothing else.
#[derive(Debug, Clone)]
pub struct ActorState {
    id: ActorId,
    managed_keys: HashSet<String>,
    values: HashMap<String, Value>,
}

impl ActorState {
    #[must_use]
    pub fn new(id: ActorId, managed_keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            id,
            managed_keys: managed_keys.into_iter().collect(),
            values: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> ActorId {
        self.id
    }

    /// # Errors
    /// Returns `ActorStateError::UnmanagedKey` if `key` was not
    /// declared in the managed-keys set this actor was constructed
    /// with.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), ActorStateError> {
        if !self.managed_keys.contains(key) {
            return Err(ActorStateError::UnmanagedKey);
        }
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Snapshot every managed key currently holding a value, for
    /// migration.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.values.clone()
    }

    /// Restore values from a migration snapshot, ignoring any key not
    /// in this actor's managed-keys set (the target actor may have been
    /// redeployed with a narrower managed-keys declaration).
    pub fn restore(&mut self, snapshot: HashMap<String, Value>) {
        for (key, value) in snapshot {
            if self.managed_keys.contains(&key) {
                self.values.insert(key, value);
            }
        }
    }
}
