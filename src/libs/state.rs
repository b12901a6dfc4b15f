//! Update bookkeeping that survives between runs.
//!
//! Only two facts are kept: the last release tag the updater observed and
//! when it last checked. Neither is ever used to skip the content diff; the
//! tag only makes repeated "nothing new" checks cheap to recognize, and the
//! stamp drives the periodic silent check.

use super::data_storage::DataStorage;
use crate::libs::update::UpdateHooks;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io;

pub const STATE_FILE_NAME: &str = "update_state.json";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct UpdateState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_tag: Option<String>,
    /// Kept as text so a hand-edited or corrupted stamp does not make the
    /// whole file unreadable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_check: Option<String>,
}

impl UpdateState {
    pub fn read(storage: &DataStorage) -> io::Result<Self> {
        let path = storage.get_path(STATE_FILE_NAME)?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)?;
        match serde_json::from_str(&text) {
            Ok(state) => Ok(state),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable update state");
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, storage: &DataStorage) -> io::Result<()> {
        let path = storage.get_path(STATE_FILE_NAME)?;
        let file = File::create(path)?;
        serde_json::to_writer_pretty(&file, self).map_err(io::Error::other)
    }

    pub fn last_check_at(&self) -> Option<DateTime<Utc>> {
        let stamp = self.last_check.as_deref()?;
        DateTime::parse_from_rfc3339(stamp).ok().map(|t| t.with_timezone(&Utc))
    }

    pub fn mark_checked(&mut self, at: DateTime<Utc>) {
        self.last_check = Some(at.to_rfc3339());
    }

    /// True when never checked, the stored stamp is unreadable, or
    /// `interval` has passed since the last check.
    pub fn is_check_due(&self, interval: Duration, now: DateTime<Utc>) -> bool {
        match self.last_check_at() {
            Some(at) => now - at >= interval,
            None => true,
        }
    }
}

/// Persists the last seen tag into the data directory.
pub struct StatePersistence {
    storage: DataStorage,
}

impl StatePersistence {
    pub fn new(storage: DataStorage) -> Self {
        Self { storage }
    }

    pub fn record(&self, tag: &str) -> io::Result<()> {
        let mut state = UpdateState::read(&self.storage)?;
        state.last_seen_tag = Some(tag.to_string());
        state.mark_checked(Utc::now());
        state.save(&self.storage)
    }
}

#[async_trait]
impl UpdateHooks for StatePersistence {
    fn persist_last_seen_tag(&self, tag: &str) -> io::Result<()> {
        self.record(tag)
    }
}
