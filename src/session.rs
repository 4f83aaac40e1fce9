//! Per-player session registry.
//!
//! The plugin layer that bridges a hosted game-server process to the
//! backend keeps one in-flight state object per connected player (for
//! example, the player's working inventory). That state lives in an
//! explicit registry with a defined lifecycle:
//! - `connect` creates the session when the player joins
//! - `get` / `with` look it up while the player is online
//! - `disconnect` tears it down and returns the final state so the
//!   caller can persist it
//!
//! Lookups of players that never connected (or already disconnected) are
//! typed errors, never silent fallbacks.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;

/// Session lifecycle errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// `connect` was called for a player that already has a session.
    #[error("player '{0}' is already connected")]
    AlreadyConnected(String),

    /// A lookup or disconnect targeted a player with no session.
    #[error("player '{0}' is not connected")]
    NotConnected(String),
}

struct SessionEntry<S> {
    state: Arc<S>,
    connected_at: DateTime<Utc>,
}

/// Registry of per-player session state, keyed by player id.
pub struct SessionRegistry<S> {
    sessions: RwLock<HashMap<String, SessionEntry<S>>>,
}

impl<S> SessionRegistry<S> {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a session for `player_id`. Fails if one already exists;
    /// a stale session must be explicitly disconnected first.
    pub async fn connect(
        &self,
        player_id: impl Into<String>,
        state: S,
    ) -> Result<(), SessionError> {
        let player_id = player_id.into();
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&player_id) {
            return Err(SessionError::AlreadyConnected(player_id));
        }
        sessions.insert(
            player_id,
            SessionEntry {
                state: Arc::new(state),
                connected_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// Returns the session state for a connected player.
    pub async fn get(&self, player_id: &str) -> Result<Arc<S>, SessionError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(player_id)
            .map(|entry| Arc::clone(&entry.state))
            .ok_or_else(|| SessionError::NotConnected(player_id.to_string()))
    }

    /// Runs `f` against the session state for a connected player.
    pub async fn with<T>(
        &self,
        player_id: &str,
        f: impl FnOnce(&S) -> T,
    ) -> Result<T, SessionError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(player_id)
            .map(|entry| f(&entry.state))
            .ok_or_else(|| SessionError::NotConnected(player_id.to_string()))
    }

    /// Returns when the player's session was created.
    pub async fn connected_at(&self, player_id: &str) -> Result<DateTime<Utc>, SessionError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(player_id)
            .map(|entry| entry.connected_at)
            .ok_or_else(|| SessionError::NotConnected(player_id.to_string()))
    }

    /// Tears down the player's session and returns its final state, so
    /// the caller can persist whatever the session accumulated.
    pub async fn disconnect(&self, player_id: &str) -> Result<Arc<S>, SessionError> {
        let mut sessions = self.sessions.write().await;
        sessions
            .remove(player_id)
            .map(|entry| entry.state)
            .ok_or_else(|| SessionError::NotConnected(player_id.to_string()))
    }

    /// Returns true if the player currently has a session.
    pub async fn is_connected(&self, player_id: &str) -> bool {
        self.sessions.read().await.contains_key(player_id)
    }

    /// Returns the number of connected players.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns true if no player is connected.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Returns the ids of all connected players, sorted.
    pub async fn player_ids(&self) -> Vec<String> {
        let sessions = self.sessions.read().await;
        let mut ids: Vec<String> = sessions.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl<S> Default for SessionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}
