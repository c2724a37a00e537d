//! API credential pool with rotation.
//!
//! The pool is the single owner of the key list and the active index. All
//! state sits behind one mutex, so the credential an in-flight request
//! reads and the position it records always agree, and a rotation can
//! never interleave with a settings change.
//!
//! Every mutation is handed to a [`PoolPersistence`] before the call
//! returns. Persistence failures are logged and never surface as errors:
//! callers only ever see `Option<Credential>`.
//!
//! A store-backed pool re-reads the persisted state before each operation,
//! so a key added from the CLI while the service runs is picked up instead
//! of being overwritten by the service's next rotation.

use crate::config::ConfigStore;
use std::sync::{Arc, Mutex};

/// One API key plus its 0-based position in the pool.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub value: String,
    pub position: usize,
}

impl Credential {
    /// `AIza…x1Y2` style preview for listings. Short keys are fully masked.
    pub fn masked(&self) -> String {
        mask_key(&self.value)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("position", &self.position)
            .field("value", &"<redacted>")
            .finish()
    }
}

pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

/// Active index for a pool of `len` keys. Anything out of range restarts
/// at the first key, the same place a rotation wraps to.
pub fn clamp_index(index: usize, len: usize) -> usize {
    if index < len {
        index
    } else {
        0
    }
}

/// Pool state as last persisted, possibly by another process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPool {
    pub keys: Vec<String>,
    pub current_index: usize,
    pub rotate_on_quota_error: bool,
}

/// Where pool mutations are written.
pub trait PoolPersistence: Send + Sync {
    /// Latest persisted state. `None` for pools that only live in memory.
    fn load(&self) -> Option<StoredPool> {
        None
    }

    fn persist(&self, keys: &[String], current_index: usize) -> Result<(), String>;
}

/// Reads and writes the `gemini` section of the config file.
impl PoolPersistence for ConfigStore {
    fn load(&self) -> Option<StoredPool> {
        let gemini = self.snapshot().gemini;
        Some(StoredPool {
            keys: gemini.api_keys,
            current_index: gemini.current_key_index,
            rotate_on_quota_error: gemini.auto_rotate_on_quota_error,
        })
    }

    fn persist(&self, keys: &[String], current_index: usize) -> Result<(), String> {
        self.update(|c| {
            c.gemini.api_keys = keys.to_vec();
            c.gemini.current_key_index = current_index;
        })
        .map_err(|e| e.to_string())
    }
}

/// For pools that live only in memory (env-seeded keys, tests).
pub struct NoPersistence;

impl PoolPersistence for NoPersistence {
    fn persist(&self, _keys: &[String], _current_index: usize) -> Result<(), String> {
        Ok(())
    }
}

struct PoolState {
    keys: Vec<String>,
    current: usize,
    rotate_on_quota_error: bool,
}

impl PoolState {
    fn current(&self) -> Option<Credential> {
        self.keys.get(self.current).map(|value| Credential {
            value: value.clone(),
            position: self.current,
        })
    }

    fn clamp(&mut self) {
        self.current = clamp_index(self.current, self.keys.len());
    }
}

pub struct CredentialPool {
    state: Mutex<PoolState>,
    store: Arc<dyn PoolPersistence>,
}

impl CredentialPool {
    pub fn new(
        keys: Vec<String>,
        current_index: usize,
        rotate_on_quota_error: bool,
        store: Arc<dyn PoolPersistence>,
    ) -> Self {
        let mut state = PoolState {
            keys,
            current: current_index,
            rotate_on_quota_error,
        };
        state.clamp();
        Self {
            state: Mutex::new(state),
            store,
        }
    }

    /// Pool without a backing file.
    pub fn in_memory(keys: Vec<String>, rotate_on_quota_error: bool) -> Self {
        Self::new(keys, 0, rotate_on_quota_error, Arc::new(NoPersistence))
    }

    /// Pool loaded from the persisted `gemini` section, writing back into
    /// the same store.
    pub fn from_store(store: Arc<ConfigStore>) -> Self {
        let gemini = store.snapshot().gemini;
        Self::new(
            gemini.api_keys,
            gemini.current_key_index,
            gemini.auto_rotate_on_quota_error,
            store,
        )
    }

    /// Store-backed pool, or, when the config holds no keys, a pool seeded
    /// from `env_key` (the `GEMINI_API_KEY` value) that is never written back.
    pub fn from_store_or_env(store: Arc<ConfigStore>, env_key: Option<String>) -> Self {
        let gemini = store.snapshot().gemini;
        match env_key.map(|k| k.trim().to_string()) {
            Some(key) if gemini.api_keys.is_empty() && !key.is_empty() => {
                log::info!("[CONFIG] No keys in config, using GEMINI_API_KEY from environment");
                Self::in_memory(vec![key], gemini.auto_rotate_on_quota_error)
            }
            _ => Self::from_store(store),
        }
    }

    /// Whether changes to this pool reach the config file.
    pub fn is_persistent(&self) -> bool {
        self.store.load().is_some()
    }

    /// Lock the state and bring it up to date with the store.
    fn lock(&self) -> std::sync::MutexGuard<'_, PoolState> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(stored) = self.store.load() {
            if stored.keys != state.keys {
                log::info!(
                    "[CONFIG] Key list changed on disk ({} -> {} keys), reloading",
                    state.keys.len(),
                    stored.keys.len()
                );
            }
            state.keys = stored.keys;
            state.current = stored.current_index;
            state.rotate_on_quota_error = stored.rotate_on_quota_error;
            state.clamp();
        }
        state
    }

    fn persist(&self, state: &PoolState) {
        if let Err(e) = self.store.persist(&state.keys, state.current) {
            log::warn!("[CONFIG] Failed to persist credential pool: {}", e);
        }
    }

    /// Active credential, or `None` when no keys are configured.
    pub fn current(&self) -> Option<Credential> {
        self.lock().current()
    }

    /// Advance to `(current + 1) mod len`. With fewer than two keys the
    /// index is left alone, which callers read as "nothing else to try".
    pub fn rotate(&self) -> Option<Credential> {
        let mut state = self.lock();
        if state.keys.len() > 1 {
            let from = state.current;
            state.current = (state.current + 1) % state.keys.len();
            log::info!("[ROTATE] Active key position {} -> {}", from, state.current);
            self.persist(&state);
        }
        state.current()
    }

    pub fn len(&self) -> usize {
        self.lock().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().keys.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.lock().current
    }

    pub fn rotate_on_quota_error(&self) -> bool {
        self.lock().rotate_on_quota_error
    }

    /// Every credential in pool order.
    pub fn credentials(&self) -> Vec<Credential> {
        self.lock()
            .keys
            .iter()
            .enumerate()
            .map(|(position, value)| Credential {
                value: value.clone(),
                position,
            })
            .collect()
    }

    /// Append a key; returns its position. Blank input is ignored.
    pub fn add(&self, key: &str) -> Option<usize> {
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        let mut state = self.lock();
        state.keys.push(key.to_string());
        let position = state.keys.len() - 1;
        self.persist(&state);
        log::info!("[CONFIG] Added API key at position {}", position);
        Some(position)
    }

    /// Remove the key at `position`. The active index keeps pointing at the
    /// same key when possible and restarts at the first key otherwise.
    pub fn remove(&self, position: usize) -> Option<Credential> {
        let mut state = self.lock();
        if position >= state.keys.len() {
            return None;
        }
        let value = state.keys.remove(position);
        if position < state.current {
            state.current -= 1;
        }
        state.clamp();
        self.persist(&state);
        log::info!("[CONFIG] Removed API key at position {}", position);
        Some(Credential { value, position })
    }

    /// Move the key at `from` to `to`. The active key stays active.
    pub fn reorder(&self, from: usize, to: usize) -> bool {
        let mut state = self.lock();
        let len = state.keys.len();
        if from >= len || to >= len {
            return false;
        }
        if from != to {
            let key = state.keys.remove(from);
            state.keys.insert(to, key);
            state.current = if state.current == from {
                to
            } else if from < state.current && state.current <= to {
                state.current - 1
            } else if to <= state.current && state.current < from {
                state.current + 1
            } else {
                state.current
            };
            self.persist(&state);
            log::info!("[CONFIG] Moved API key {} -> {}", from, to);
        }
        true
    }

    /// Make `position` the active key.
    pub fn select(&self, position: usize) -> Option<Credential> {
        let mut state = self.lock();
        if position >= state.keys.len() {
            return None;
        }
        state.current = position;
        self.persist(&state);
        state.current()
    }
}
