//! In-memory game store and its JSON snapshot.
//!
//! In memory the store is an insertion-ordered map keyed by the numeric app
//! id. On disk it is a string-keyed JSON object (JSON has no integer keys);
//! the conversion happens in [`SnapshotDoc`] and nowhere else.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::model::{GameRecord, StepName, StepStatus};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse snapshot {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("snapshot key {key:?} is not a numeric app id")]
    BadKey { key: String },
    #[error("snapshot entry {key} carries app id {found}")]
    KeyMismatch { key: u32, found: u32 },
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write snapshot {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityStore {
    games: IndexMap<u32, GameRecord>,
    last_updated: Option<DateTime<Utc>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    pub fn contains(&self, app_id: u32) -> bool {
        self.games.contains_key(&app_id)
    }

    pub fn get(&self, app_id: u32) -> Option<&GameRecord> {
        self.games.get(&app_id)
    }

    pub fn get_mut(&mut self, app_id: u32) -> Option<&mut GameRecord> {
        self.games.get_mut(&app_id)
    }

    /// Insert a brand new record. Existing ids are left alone and `false` is returned.
    pub fn insert_new(&mut self, game: GameRecord) -> bool {
        match self.games.entry(game.steam_app_id) {
            indexmap::map::Entry::Occupied(_) => false,
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(game);
                true
            }
        }
    }

    /// Records in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &GameRecord> {
        self.games.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut GameRecord> {
        self.games.values_mut()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.last_updated = Some(at);
    }

    pub fn count_status(&self, step: StepName, status: StepStatus) -> usize {
        self.iter().filter(|g| g.status(step) == status).count()
    }
}

/// Serialized form of the store.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotDoc {
    last_updated: Option<DateTime<Utc>>,
    games: IndexMap<String, GameRecord>,
}

/// Top-level shape only. Older snapshots were written as a bare
/// `{ "<appid>": record }` map with no `games` key.
#[derive(Deserialize)]
struct SnapshotShape {
    #[serde(default)]
    games: Option<IgnoredAny>,
}

impl SnapshotDoc {
    fn from_store(store: &EntityStore) -> Self {
        Self {
            last_updated: store.last_updated,
            games: store
                .games
                .iter()
                .map(|(id, g)| (id.to_string(), g.clone()))
                .collect(),
        }
    }

    fn into_store(self) -> Result<EntityStore, SnapshotError> {
        let mut games = IndexMap::with_capacity(self.games.len());
        for (key, mut game) in self.games {
            let id: u32 = key
                .trim()
                .parse()
                .map_err(|_| SnapshotError::BadKey { key: key.clone() })?;
            if game.steam_app_id != id {
                return Err(SnapshotError::KeyMismatch {
                    key: id,
                    found: game.steam_app_id,
                });
            }
            game.fill_missing_steps();
            games.insert(id, game);
        }
        Ok(EntityStore {
            games,
            last_updated: self.last_updated,
        })
    }
}

/// Location of the durable snapshot. Every save rewrites the whole file.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the store; a missing file is an empty store.
    pub fn load(&self) -> Result<EntityStore, SnapshotError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no snapshot yet; starting empty");
                return Ok(EntityStore::new());
            }
            Err(source) => {
                return Err(SnapshotError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let parse_err = |source| SnapshotError::Parse {
            path: self.path.clone(),
            source,
        };
        let shape: SnapshotShape = serde_json::from_str(&raw).map_err(parse_err)?;
        let doc = if shape.games.is_some() {
            serde_json::from_str::<SnapshotDoc>(&raw).map_err(parse_err)?
        } else {
            SnapshotDoc {
                last_updated: None,
                games: serde_json::from_str(&raw).map_err(parse_err)?,
            }
        };
        let store = doc.into_store()?;
        debug!(path = %self.path.display(), games = store.len(), "snapshot loaded");
        Ok(store)
    }

    /// Stamp `last_updated` and replace the snapshot on disk.
    pub fn save(&self, store: &mut EntityStore) -> Result<(), SnapshotError> {
        store.touch(Utc::now());
        let body = serde_json::to_string_pretty(&SnapshotDoc::from_store(store))?;

        let write_err = |source| SnapshotError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;
        debug!(path = %self.path.display(), games = store.len(), "snapshot saved");
        Ok(())
    }
}
