//! Credential storage.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use playdock_core::UserId;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};

use super::AuthError;
use super::identity::{Identity, Role};

/// Persisted identity records, as seen by the auth flows.
///
/// `insert` must be atomic with respect to concurrent inserts of the same
/// username.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up an identity by username.
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, AuthError>;

    /// Create an identity. Fails with [`AuthError::DuplicateUser`] if the
    /// username is taken.
    async fn insert(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<Identity, AuthError>;
}

/// User store backed by sled.
///
/// Records are stored under `user:<id>` and a `idx:username:<name>` entry
/// maps each username to its id. `meta:admins` holds the admin count so the
/// last admin can never be demoted or deleted.
pub struct UserStore {
    db: sled::Db,
    tree: sled::Tree,
}

const RECORD_PREFIX: &[u8] = b"user:";
const ADMIN_COUNT_KEY: &[u8] = b"meta:admins";

fn record_key(id: UserId) -> Vec<u8> {
    let mut key = RECORD_PREFIX.to_vec();
    key.extend_from_slice(&id.to_key());
    key
}

fn index_key(username: &str) -> Vec<u8> {
    format!("idx:username:{username}").into_bytes()
}

fn decode_id(bytes: &[u8]) -> Result<UserId, AuthError> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| AuthError::StoreUnavailable("Corrupt username index".to_string()))?;
    Ok(UserId::new(u64::from_be_bytes(raw)))
}

fn encode(identity: &Identity) -> Result<Vec<u8>, AuthError> {
    serde_json::to_vec(identity)
        .map_err(|e| AuthError::StoreUnavailable(format!("Serialization error: {e}")))
}

fn decode(bytes: &[u8]) -> Result<Identity, AuthError> {
    serde_json::from_slice(bytes)
        .map_err(|e| AuthError::StoreUnavailable(format!("Deserialization error: {e}")))
}

fn flatten<T>(result: Result<T, TransactionError<AuthError>>) -> Result<T, AuthError> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(e)) => Err(e),
        Err(TransactionError::Storage(e)) => Err(e.into()),
    }
}

impl UserStore {
    /// Open or create a user store at the given path.
    ///
    /// # Errors
    ///
    /// Returns error if database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, AuthError> {
        let db = sled::open(path)
            .map_err(|e| AuthError::StoreUnavailable(format!("Failed to open database: {e}")))?;
        Self::with_db(db)
    }

    /// Create a new user store with an existing sled database.
    ///
    /// # Errors
    ///
    /// Returns error if tree cannot be opened.
    pub fn with_db(db: sled::Db) -> Result<Self, AuthError> {
        let tree = db
            .open_tree("users")
            .map_err(|e| AuthError::StoreUnavailable(format!("Failed to open users tree: {e}")))?;

        let store = Self { db, tree };
        store.init_admin_count()?;
        Ok(store)
    }

    fn init_admin_count(&self) -> Result<(), AuthError> {
        if self.tree.contains_key(ADMIN_COUNT_KEY)? {
            return Ok(());
        }
        let admins = self.list()?.iter().filter(|u| u.role.is_admin()).count() as u64;
        // A concurrent opener may have initialized it first; both counts agree.
        let _ = self.tree.compare_and_swap(
            ADMIN_COUNT_KEY,
            None::<&[u8]>,
            Some(admins.to_be_bytes().to_vec()),
        )?;
        Ok(())
    }

    /// Check if any users exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Count total users.
    #[must_use]
    pub fn count(&self) -> usize {
        self.tree.scan_prefix(RECORD_PREFIX).count()
    }

    /// Atomically create a user.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::DuplicateUser`] if the username is taken, or a
    /// storage error.
    pub fn create(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<Identity, AuthError> {
        let identity = Identity {
            id: UserId::new(self.db.generate_id()?),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: Utc::now(),
        };
        let value = encode(&identity)?;
        let index = index_key(username);
        let record = record_key(identity.id);

        flatten(self.tree.transaction(|tx| {
            if tx.get(&index)?.is_some() {
                return Err(ConflictableTransactionError::Abort(
                    AuthError::DuplicateUser(username.to_string()),
                ));
            }
            if role.is_admin() {
                let admins = admin_count(tx)? + 1;
                tx.insert(ADMIN_COUNT_KEY, admins.to_be_bytes().to_vec())?;
            }
            tx.insert(index.as_slice(), identity.id.to_key().to_vec())?;
            tx.insert(record.as_slice(), value.as_slice())?;
            Ok(())
        }))?;

        self.tree.flush()?;
        Ok(identity)
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get(&self, id: UserId) -> Result<Option<Identity>, AuthError> {
        self.tree
            .get(record_key(id))?
            .map(|v| decode(&v))
            .transpose()
    }

    /// Get a user by username.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get_by_username(&self, username: &str) -> Result<Option<Identity>, AuthError> {
        match self.tree.get(index_key(username))? {
            Some(id_bytes) => self.get(decode_id(&id_bytes)?),
            None => Ok(None),
        }
    }

    /// List all users in creation order.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn list(&self) -> Result<Vec<Identity>, AuthError> {
        self.tree
            .scan_prefix(RECORD_PREFIX)
            .map(|r| {
                let (_, value) = r?;
                decode(&value)
            })
            .collect()
    }

    /// Replace a user's password hash. Returns `false` if the user is absent.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn update_password(&self, id: UserId, password_hash: &str) -> Result<bool, AuthError> {
        let record = record_key(id);

        let updated = flatten(self.tree.transaction(|tx| {
            let Some(raw) = tx.get(&record)? else {
                return Ok(false);
            };
            let mut identity = decode(&raw).map_err(ConflictableTransactionError::Abort)?;
            identity.password_hash = password_hash.to_string();
            let value = encode(&identity).map_err(ConflictableTransactionError::Abort)?;
            tx.insert(record.as_slice(), value)?;
            Ok(true)
        }))?;

        self.tree.flush()?;
        Ok(updated)
    }

    /// Change a user's role. Returns `false` if the user is absent.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::PermissionDenied`] when demoting the last admin.
    pub fn set_role(&self, id: UserId, role: Role) -> Result<bool, AuthError> {
        self.update(id, None, Some(role))
    }

    /// Rename a user, moving the username index entry atomically.
    ///
    /// Returns `false` if the user is absent.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::DuplicateUser`] if the new name is taken.
    pub fn rename(&self, id: UserId, new_username: &str) -> Result<bool, AuthError> {
        self.update(id, Some(new_username), None)
    }

    /// Apply a rename and a role change in a single transaction. Nothing is
    /// written if either part is refused.
    ///
    /// Returns `false` if the user is absent.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::DuplicateUser`] if the new name is taken, or
    /// [`AuthError::PermissionDenied`] when demoting the last admin.
    pub fn update(
        &self,
        id: UserId,
        new_username: Option<&str>,
        role: Option<Role>,
    ) -> Result<bool, AuthError> {
        let record = record_key(id);

        let updated = flatten(self.tree.transaction(|tx| {
            let Some(raw) = tx.get(&record)? else {
                return Ok(false);
            };
            let mut identity = decode(&raw).map_err(ConflictableTransactionError::Abort)?;

            if let Some(role) = role.filter(|r| *r != identity.role) {
                let admins = admin_count(tx)?;
                let admins = if role.is_admin() {
                    admins + 1
                } else if admins <= 1 {
                    return Err(ConflictableTransactionError::Abort(last_admin()));
                } else {
                    admins - 1
                };
                tx.insert(ADMIN_COUNT_KEY, admins.to_be_bytes().to_vec())?;
                identity.role = role;
            }

            if let Some(name) = new_username.filter(|n| *n != identity.username) {
                let new_index = index_key(name);
                if tx.get(&new_index)?.is_some() {
                    return Err(ConflictableTransactionError::Abort(
                        AuthError::DuplicateUser(name.to_string()),
                    ));
                }
                tx.remove(index_key(&identity.username))?;
                tx.insert(new_index, id.to_key().to_vec())?;
                identity.username = name.to_string();
            }

            let value = encode(&identity).map_err(ConflictableTransactionError::Abort)?;
            tx.insert(record.as_slice(), value)?;
            Ok(true)
        }))?;

        self.tree.flush()?;
        Ok(updated)
    }

    /// Delete a user and its username index entry.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::PermissionDenied`] when deleting the last admin,
    /// or a storage error.
    pub fn delete(&self, id: UserId) -> Result<bool, AuthError> {
        let record = record_key(id);

        let removed = flatten(self.tree.transaction(|tx| {
            let Some(raw) = tx.get(&record)? else {
                return Ok(false);
            };
            let identity = decode(&raw).map_err(ConflictableTransactionError::Abort)?;
            if identity.role.is_admin() {
                let admins = admin_count(tx)?;
                if admins <= 1 {
                    return Err(ConflictableTransactionError::Abort(last_admin()));
                }
                tx.insert(ADMIN_COUNT_KEY, (admins - 1).to_be_bytes().to_vec())?;
            }
            tx.remove(index_key(&identity.username))?;
            tx.remove(record.as_slice())?;
            Ok(true)
        }))?;

        self.tree.flush()?;
        Ok(removed)
    }
}

fn last_admin() -> AuthError {
    AuthError::PermissionDenied("Cannot remove the last admin".to_string())
}

fn admin_count(tx: &TransactionalTree) -> Result<u64, ConflictableTransactionError<AuthError>> {
    let Some(raw) = tx.get(ADMIN_COUNT_KEY)? else {
        return Ok(0);
    };
    let raw: [u8; 8] = raw.as_ref().try_into().map_err(|_| {
        ConflictableTransactionError::Abort(AuthError::StoreUnavailable(
            "Corrupt admin counter".to_string(),
        ))
    })?;
    Ok(u64::from_be_bytes(raw))
}

#[async_trait]
impl CredentialStore for UserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, AuthError> {
        self.get_by_username(username)
    }

    async fn insert(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<Identity, AuthError> {
        self.create(username, password_hash, role)
    }
}
