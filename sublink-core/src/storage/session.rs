//! Local session state
//!
//! Ephemeral, per-device state: where the user was and how playback was
//! configured. The server progress record stays authoritative for position;
//! this store only fills gaps and carries preferences.
//!
//! Every read goes through one validation path. A record that is stale,
//! fails to decode, or fails a semantic check is removed and reported as
//! absent, so callers fall back to defaults instead of trusting part of it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::kv::KeyValueStore;
use crate::api::ContentId;
use crate::config::{PlaybackConfig, StorageConfig};
use crate::error::{EngineError, Result};

/// Key of the global playback preferences record
pub const PREFERENCES_KEY: &str = "prefs/playback";

/// Clock skew tolerated for records stamped in the future
const MAX_FUTURE_SKEW_SECS: i64 = 300;

pub fn session_key(content_id: &ContentId) -> String {
    format!("session/{}", content_id)
}

/// Persisted projection of playback for one content item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub content_id: ContentId,
    pub current_index: u64,
    pub is_playing: bool,
    pub speed_ms: u64,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(content_id: ContentId, current_index: u64, is_playing: bool, speed_ms: u64) -> Self {
        Self {
            content_id,
            current_index,
            is_playing,
            speed_ms,
            updated_at: Utc::now(),
        }
    }
}

/// Playback preferences shared by all content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackPreferences {
    pub speed_ms: u64,
    pub updated_at: DateTime<Utc>,
}

/// Typed, validated access to session records
#[derive(Clone)]
pub struct SessionStateStore {
    store: Arc<dyn KeyValueStore>,
    freshness: Duration,
    min_speed_ms: u64,
    max_speed_ms: u64,
}

impl SessionStateStore {
    pub fn new(store: Arc<dyn KeyValueStore>, storage: &StorageConfig, playback: &PlaybackConfig) -> Self {
        Self {
            store,
            freshness: storage.freshness(),
            min_speed_ms: playback.min_speed_ms,
            max_speed_ms: playback.max_speed_ms,
        }
    }

    /// Persist state for `content_id`, stamped with the current time
    pub fn save(&self, content_id: &ContentId, state: &SessionState) -> Result<()> {
        let record = SessionState {
            content_id: content_id.clone(),
            updated_at: Utc::now(),
            ..state.clone()
        };
        self.write(&session_key(content_id), &record)
    }

    /// Last saved state, or `None` if absent, stale or invalid
    pub fn load(&self, content_id: &ContentId) -> Option<SessionState> {
        let key = session_key(content_id);
        self.read_validated(&key, |state: &SessionState| {
            if &state.content_id != content_id {
                return Err(Rejection::Invalid(format!(
                    "belongs to content {}",
                    state.content_id
                )));
            }
            self.check_speed(state.speed_ms)?;
            self.check_fresh(state.updated_at)
        })
    }

    /// Forget the saved state for `content_id`
    pub fn clear(&self, content_id: &ContentId) -> Result<()> {
        self.store.remove(&session_key(content_id))
    }

    pub fn save_preferences(&self, speed_ms: u64) -> Result<()> {
        let prefs = PlaybackPreferences {
            speed_ms,
            updated_at: Utc::now(),
        };
        self.write(PREFERENCES_KEY, &prefs)
    }

    pub fn load_preferences(&self) -> Option<PlaybackPreferences> {
        self.read_validated(PREFERENCES_KEY, |prefs: &PlaybackPreferences| {
            self.check_speed(prefs.speed_ms)?;
            self.check_fresh(prefs.updated_at)
        })
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value).map_err(|e| EngineError::StorageCorruption {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.store.set(key, &json)
    }

    fn read_validated<T, F>(&self, key: &str, validate: F) -> Option<T>
    where
        T: DeserializeOwned,
        F: FnOnce(&T) -> std::result::Result<(), Rejection>,
    {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read {}: {}", key, e);
                return None;
            }
        };

        let outcome = serde_json::from_str::<T>(&raw)
            .map_err(|e| Rejection::Invalid(e.to_string()))
            .and_then(|value| validate(&value).map(|_| value));

        match outcome {
            Ok(value) => return Some(value),
            Err(Rejection::Stale(age)) => debug!("Discarding stale {} ({} old)", key, age),
            Err(Rejection::Invalid(reason)) => {
                let err = EngineError::StorageCorruption {
                    key: key.to_string(),
                    reason,
                };
                warn!("{}", err);
            }
        }

        if let Err(e) = self.store.remove(key) {
            warn!("Failed to discard {}: {}", key, e);
        }
        None
    }

    fn check_speed(&self, speed_ms: u64) -> std::result::Result<(), Rejection> {
        if speed_ms < self.min_speed_ms || speed_ms > self.max_speed_ms {
            return Err(Rejection::Invalid(format!(
                "speed {}ms outside {}..={}",
                speed_ms, self.min_speed_ms, self.max_speed_ms
            )));
        }
        Ok(())
    }

    fn check_fresh(&self, updated_at: DateTime<Utc>) -> std::result::Result<(), Rejection> {
        let age = Utc::now() - updated_at;
        if age > self.freshness {
            return Err(Rejection::Stale(age));
        }
        if age < -Duration::seconds(MAX_FUTURE_SKEW_SECS) {
            return Err(Rejection::Invalid(format!("stamped in the future ({})", updated_at)));
        }
        Ok(())
    }
}

/// Why a stored record was not trusted
enum Rejection {
    Stale(Duration),
    Invalid(String),
}
