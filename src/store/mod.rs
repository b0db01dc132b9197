//! Persistence collaborator for accounts and articles.
//!
//! The core only needs a handful of primitives: look a record up by a unique
//! field or by id, create it, update it and delete it. They are expressed as
//! async traits over plain data structs so that flows and handlers do not
//! depend on a particular database library.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::validation::UniqueLookup;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("unique constraint violated")]
    Conflict,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Stored account. The plaintext password never reaches this struct.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_digest: String,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create an account.
#[derive(Clone, Debug)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_digest: String,
}

/// Unique columns an account can be found by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountKey {
    Username,
    Email,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sanitized article fields. `published: None` keeps the stored value on
/// update and falls back to `true` on create.
#[derive(Clone, Debug, Default)]
pub struct ArticleFields {
    pub title: String,
    pub content: String,
    pub published: Option<bool>,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_account_by(
        &self,
        key: AccountKey,
        value: &str,
    ) -> Result<Option<Account>, StoreError>;

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    /// Insert a new account, returning [`StoreError::Conflict`] when the username
    /// or email is already taken.
    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError>;
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// All articles, newest first.
    async fn list_articles(&self) -> Result<Vec<Article>, StoreError>;

    async fn find_article(&self, id: i64) -> Result<Option<Article>, StoreError>;

    async fn create_article(&self, fields: ArticleFields) -> Result<Article, StoreError>;

    /// Returns `None` when the article does not exist.
    async fn update_article(
        &self,
        id: i64,
        fields: ArticleFields,
    ) -> Result<Option<Article>, StoreError>;

    /// Returns `false` when the article does not exist.
    async fn delete_article(&self, id: i64) -> Result<bool, StoreError>;
}

/// Everything the HTTP layer needs from persistence.
#[async_trait]
pub trait Store: AccountStore + ArticleStore {
    async fn ping(&self) -> Result<(), StoreError>;
}

// Uniqueness checks are plain lookups by the unique column.
#[async_trait]
impl<T: AccountStore + ?Sized> UniqueLookup for T {
    async fn is_taken(&self, key: AccountKey, value: &str) -> Result<bool, StoreError> {
        Ok(self.find_account_by(key, value).await?.is_some())
    }
}
