use super::{decode, decode_all, encode, flatten_tx};
use crate::types::{User, UserStatus, UserType};
use crate::{Error, Result};
use sled::transaction::ConflictableTransactionError;
use sled::Transactional;

const EMAIL_TAKEN: &str = "User with this email already exists";
const USERNAME_TAKEN: &str = "User with this username already exists";

/// Users collection with unique email and username indexes
#[derive(Clone)]
pub struct UserStore {
    users: sled::Tree,
    by_email: sled::Tree,
    by_username: sled::Tree,
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

impl UserStore {
    pub(crate) fn open(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            users: db.open_tree("users")?,
            by_email: db.open_tree("users_by_email")?,
            by_username: db.open_tree("users_by_username")?,
        })
    }

    /// Insert a new user, failing with `Conflict` if the email or username is taken
    pub fn insert(&self, user: &User) -> Result<()> {
        let value = encode(user)?;
        let email = email_key(&user.email);

        (&self.users, &self.by_email, &self.by_username)
            .transaction(|(users, by_email, by_username)| {
                if by_email.get(email.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(Error::Conflict(
                        EMAIL_TAKEN.to_string(),
                    )));
                }
                if by_username.get(user.username.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(Error::Conflict(
                        USERNAME_TAKEN.to_string(),
                    )));
                }

                by_email.insert(email.as_bytes(), user.id.as_bytes())?;
                by_username.insert(user.username.as_bytes(), user.id.as_bytes())?;
                users.insert(user.id.as_bytes(), value.as_slice())?;
                Ok(())
            })
            .map_err(flatten_tx)
    }

    pub fn get(&self, id: &str) -> Result<Option<User>> {
        match self.users.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.lookup(&self.by_email, email_key(email).as_bytes())
    }

    pub fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        self.lookup(&self.by_username, username.as_bytes())
    }

    fn lookup(&self, index: &sled::Tree, key: &[u8]) -> Result<Option<User>> {
        match index.get(key)? {
            Some(id) => {
                let id = String::from_utf8(id.to_vec())
                    .map_err(|e| Error::Storage(format!("Corrupt user index entry: {e}")))?;
                self.get(&id)
            }
            None => Ok(None),
        }
    }

    pub fn list(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = decode_all(&self.users)?;
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    pub fn list_by_type(&self, user_type: UserType) -> Result<Vec<User>> {
        let mut users = self.list()?;
        users.retain(|u| u.user_type == user_type);
        Ok(users)
    }

    pub fn list_by_status(&self, status: UserStatus) -> Result<Vec<User>> {
        let mut users = self.list()?;
        users.retain(|u| u.status == status);
        Ok(users)
    }

    /// Replace a stored user, keeping the email and username indexes in step
    pub fn update(&self, user: &User) -> Result<()> {
        let value = encode(user)?;
        let new_email = email_key(&user.email);

        (&self.users, &self.by_email, &self.by_username)
            .transaction(|(users, by_email, by_username)| {
                let old: User = match users.get(user.id.as_bytes())? {
                    Some(bytes) => decode(&bytes).map_err(ConflictableTransactionError::Abort)?,
                    None => {
                        return Err(ConflictableTransactionError::Abort(Error::NotFound(
                            "User not found".to_string(),
                        )))
                    }
                };

                let old_email = email_key(&old.email);
                if old_email != new_email {
                    if by_email.get(new_email.as_bytes())?.is_some() {
                        return Err(ConflictableTransactionError::Abort(Error::Conflict(
                            EMAIL_TAKEN.to_string(),
                        )));
                    }
                    by_email.remove(old_email.as_bytes())?;
                    by_email.insert(new_email.as_bytes(), user.id.as_bytes())?;
                }

                if old.username != user.username {
                    if by_username.get(user.username.as_bytes())?.is_some() {
                        return Err(ConflictableTransactionError::Abort(Error::Conflict(
                            USERNAME_TAKEN.to_string(),
                        )));
                    }
                    by_username.remove(old.username.as_bytes())?;
                    by_username.insert(user.username.as_bytes(), user.id.as_bytes())?;
                }

                users.insert(user.id.as_bytes(), value.as_slice())?;
                Ok(())
            })
            .map_err(flatten_tx)
    }

    /// Remove a user and its index entries, returning what was removed
    pub fn delete(&self, id: &str) -> Result<Option<User>> {
        (&self.users, &self.by_email, &self.by_username)
            .transaction(|(users, by_email, by_username)| {
                let Some(bytes) = users.remove(id.as_bytes())? else {
                    return Ok(None);
                };
                let user: User = decode(&bytes).map_err(ConflictableTransactionError::Abort)?;
                by_email.remove(email_key(&user.email).as_bytes())?;
                by_username.remove(user.username.as_bytes())?;
                Ok(Some(user))
            })
            .map_err(flatten_tx)
    }

    pub fn count(&self) -> usize {
        self.users.len()
    }
}
