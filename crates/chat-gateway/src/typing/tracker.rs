//! Typing indicator tracker
//!
//! Each active typing entry owns an expiry timer. Restarting an entry replaces
//! its timer and bumps its generation, so a timer that fires late for an older
//! generation is recognized and ignored.

use chat_core::Snowflake;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Where a user is typing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypingKey {
    Room(String),
    /// Direct conversation, keyed by the counterpart
    Direct(Snowflake),
}

/// Emitted by a timer whose entry ran out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingExpiry {
    pub key: TypingKey,
    pub user_id: Snowflake,
    pub generation: u64,
}

struct TypingEntry {
    generation: u64,
    timer: JoinHandle<()>,
}

/// Active typing entries keyed by (key, user)
pub struct TypingTracker {
    entries: DashMap<(TypingKey, Snowflake), TypingEntry>,
    generation: AtomicU64,
    ttl: Duration,
    expired_tx: mpsc::UnboundedSender<TypingExpiry>,
}

impl TypingTracker {
    /// Create a tracker and the receiving end of its expiry stream
    pub fn new(ttl: Duration) -> (Self, mpsc::UnboundedReceiver<TypingExpiry>) {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();

        let tracker = Self {
            entries: DashMap::new(),
            generation: AtomicU64::new(0),
            ttl,
            expired_tx,
        };

        (tracker, expired_rx)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start or refresh a typing entry
    ///
    /// Returns `true` if the user was not already typing under this key.
    pub fn start(&self, key: TypingKey, user_id: Snowflake) -> bool {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let timer = self.spawn_timer(key.clone(), user_id, generation);

        // A timer reporting before this insert is rejected by `expire`'s generation check
        let previous = self
            .entries
            .insert((key, user_id), TypingEntry { generation, timer });

        match previous {
            Some(old) => {
                old.timer.abort();
                false
            }
            None => true,
        }
    }

    /// Stop a typing entry
    ///
    /// Returns `true` if an entry was removed.
    pub fn stop(&self, key: &TypingKey, user_id: Snowflake) -> bool {
        match self.entries.remove(&(key.clone(), user_id)) {
            Some((_, entry)) => {
                entry.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Apply a timer expiry
    ///
    /// Returns `true` if the entry was still current and has been removed.
    pub fn expire(&self, expiry: &TypingExpiry) -> bool {
        self.entries
            .remove_if(&(expiry.key.clone(), expiry.user_id), |_, entry| {
                entry.generation == expiry.generation
            })
            .is_some()
    }

    /// Remove every entry of a user, returning the keys they were typing under
    pub fn clear_user(&self, user_id: Snowflake) -> Vec<TypingKey> {
        let keys: Vec<TypingKey> = self
            .entries
            .iter()
            .filter(|entry| entry.key().1 == user_id)
            .map(|entry| entry.key().0.clone())
            .collect();

        keys.into_iter()
            .filter(|key| self.stop(key, user_id))
            .collect()
    }

    pub fn is_typing(&self, key: &TypingKey, user_id: Snowflake) -> bool {
        self.entries.contains_key(&(key.clone(), user_id))
    }

    /// Users currently typing under a key
    pub fn typing_in(&self, key: &TypingKey) -> Vec<Snowflake> {
        self.entries
            .iter()
            .filter(|entry| &entry.key().0 == key)
            .map(|entry| entry.key().1)
            .collect()
    }

    /// Cancel all timers and drop every entry
    pub fn clear(&self) {
        for entry in self.entries.iter() {
            entry.timer.abort();
        }
        self.entries.clear();
    }

    fn spawn_timer(&self, key: TypingKey, user_id: Snowflake, generation: u64) -> JoinHandle<()> {
        let ttl = self.ttl;
        let expired_tx = self.expired_tx.clone();

        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let _ = expired_tx.send(TypingExpiry {
                key,
                user_id,
                generation,
            });
        })
    }
}

impl std::fmt::Debug for TypingTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypingTracker")
            .field("active", &self.entries.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}
