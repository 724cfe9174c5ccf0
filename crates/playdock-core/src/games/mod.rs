//! Game library storage.
//!
//! Each game belongs to exactly one user. Records live in a sled tree keyed
//! by big-endian game id, so iteration yields games in creation order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::path::Path;
use thiserror::Error;
use validator::Validate;

use crate::types::{GameId, UserId};

/// Game store errors.
#[derive(Error, Debug)]
pub enum GameStoreError {
    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Input rejected before reaching storage.
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// A game in a user's library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    /// Game ID.
    pub id: GameId,
    /// Owning user.
    pub owner_id: UserId,
    /// Title.
    pub name: String,
    /// Genre, e.g. "rpg".
    pub genre: Option<String>,
    /// Platform, e.g. "switch".
    pub platform: Option<String>,
    /// Year of first release.
    pub release_year: Option<u16>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last modified.
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when adding a game.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GameDraft {
    /// Title.
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    /// Genre.
    #[serde(default)]
    #[validate(length(max = 64))]
    pub genre: Option<String>,
    /// Platform.
    #[serde(default)]
    #[validate(length(max = 64))]
    pub platform: Option<String>,
    /// Year of first release.
    #[serde(default)]
    #[validate(range(min = 1950, max = 2100))]
    pub release_year: Option<u16>,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GamePatch {
    /// New title.
    #[serde(default)]
    #[validate(length(min = 1, max = 128))]
    pub name: Option<String>,
    /// New genre.
    #[serde(default)]
    #[validate(length(max = 64))]
    pub genre: Option<String>,
    /// New platform.
    #[serde(default)]
    #[validate(length(max = 64))]
    pub platform: Option<String>,
    /// New release year.
    #[serde(default)]
    #[validate(range(min = 1950, max = 2100))]
    pub release_year: Option<u16>,
}

impl GamePatch {
    fn apply(self, game: &mut Game) {
        if let Some(name) = self.name {
            game.name = name;
        }
        if let Some(genre) = self.genre {
            game.genre = Some(genre);
        }
        if let Some(platform) = self.platform {
            game.platform = Some(platform);
        }
        if let Some(year) = self.release_year {
            game.release_year = Some(year);
        }
        game.updated_at = Utc::now();
    }
}

/// Game store backed by sled.
pub struct GameStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl GameStore {
    /// Open or create a game store at the given path.
    ///
    /// # Errors
    ///
    /// Returns error if database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, GameStoreError> {
        let db = sled::open(path)?;
        Self::with_db(db)
    }

    /// Create a game store sharing an existing sled database.
    ///
    /// # Errors
    ///
    /// Returns error if tree cannot be opened.
    pub fn with_db(db: sled::Db) -> Result<Self, GameStoreError> {
        let tree = db.open_tree("games")?;
        Ok(Self { db, tree })
    }

    /// Add a game to a user's library.
    ///
    /// # Errors
    ///
    /// Returns error if the draft is invalid or storage fails.
    pub fn create(&self, owner_id: UserId, draft: GameDraft) -> Result<Game, GameStoreError> {
        draft.validate()?;

        let id = GameId::new(self.db.generate_id()?);
        let now = Utc::now();
        let game = Game {
            id,
            owner_id,
            name: draft.name,
            genre: draft.genre,
            platform: draft.platform,
            release_year: draft.release_year,
            created_at: now,
            updated_at: now,
        };

        self.tree.insert(id.to_key(), serde_json::to_vec(&game)?)?;
        self.tree.flush()?;

        tracing::debug!(game_id = %id, owner_id = %owner_id, "game created");
        Ok(game)
    }

    /// Get a game by ID regardless of owner.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get(&self, id: GameId) -> Result<Option<Game>, GameStoreError> {
        match self.tree.get(id.to_key())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Get a game only if it belongs to `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get_owned(&self, id: GameId, owner_id: UserId) -> Result<Option<Game>, GameStoreError> {
        Ok(self.get(id)?.filter(|g| g.owner_id == owner_id))
    }

    /// List every game owned by a user.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn list_by_owner(&self, owner_id: UserId) -> Result<Vec<Game>, GameStoreError> {
        let mut games = Vec::new();
        for result in &self.tree {
            let (_, value) = result?;
            let game: Game = serde_json::from_slice(&value)?;
            if game.owner_id == owner_id {
                games.push(game);
            }
        }
        Ok(games)
    }

    /// Update a game owned by `owner_id`.
    ///
    /// Returns the updated game, or `None` if it does not exist or is owned
    /// by someone else.
    ///
    /// # Errors
    ///
    /// Returns error if the patch is invalid or storage fails.
    pub fn update(
        &self,
        id: GameId,
        owner_id: UserId,
        patch: GamePatch,
    ) -> Result<Option<Game>, GameStoreError> {
        patch.validate()?;
        let key = id.to_key();

        let updated = self.tree.transaction(|tx| {
            let Some(raw) = tx.get(key)? else {
                return Ok(None);
            };
            let mut game: Game = serde_json::from_slice(&raw)
                .map_err(|e| ConflictableTransactionError::Abort(GameStoreError::from(e)))?;
            if game.owner_id != owner_id {
                return Ok(None);
            }
            patch.clone().apply(&mut game);

            let value = serde_json::to_vec(&game)
                .map_err(|e| ConflictableTransactionError::Abort(GameStoreError::from(e)))?;
            tx.insert(key.as_slice(), value)?;
            Ok(Some(game))
        });

        let updated = match updated {
            Ok(game) => game,
            Err(TransactionError::Abort(e)) => return Err(e),
            Err(TransactionError::Storage(e)) => return Err(e.into()),
        };
        self.tree.flush()?;
        Ok(updated)
    }

    /// Delete a game.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn delete(&self, id: GameId) -> Result<bool, GameStoreError> {
        let removed = self.tree.remove(id.to_key())?.is_some();
        self.tree.flush()?;
        Ok(removed)
    }

    /// Delete every game owned by a user. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn delete_by_owner(&self, owner_id: UserId) -> Result<usize, GameStoreError> {
        let owned = self.list_by_owner(owner_id)?;
        for game in &owned {
            self.tree.remove(game.id.to_key())?;
        }
        self.tree.flush()?;
        Ok(owned.len())
    }

    /// Count all games.
    #[must_use]
    pub fn count(&self) -> usize {
        self.tree.len()
    }
}
