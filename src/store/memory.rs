//! In-process store used by tests and `--dsn memory://` development runs.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    Account, AccountKey, AccountStore, Article, ArticleFields, ArticleStore, NewAccount, Store,
    StoreError,
};

#[derive(Debug, Default)]
struct Tables {
    accounts: Vec<Account>,
    articles: BTreeMap<i64, Article>,
    last_article_id: i64,
}

/// Keeps records in memory and enforces the same unique constraints as the
/// database schema (username and email).
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_account_by(
        &self,
        key: AccountKey,
        value: &str,
    ) -> Result<Option<Account>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .accounts
            .iter()
            .find(|account| match key {
                AccountKey::Username => account.username == value,
                AccountKey::Email => account.email == value,
            })
            .cloned())
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .accounts
            .iter()
            .find(|account| account.id == id)
            .cloned())
    }

    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut tables = self.tables.write().await;
        let taken = tables.accounts.iter().any(|existing| {
            existing.username == account.username || existing.email == account.email
        });
        if taken {
            return Err(StoreError::Conflict);
        }
        let created = Account {
            id: Uuid::new_v4(),
            username: account.username,
            email: account.email,
            password_digest: account.password_digest,
            created_at: Utc::now(),
        };
        tables.accounts.push(created.clone());
        Ok(created)
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn list_articles(&self) -> Result<Vec<Article>, StoreError> {
        let tables = self.tables.read().await;
        let mut articles: Vec<Article> = tables.articles.values().cloned().collect();
        articles.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(articles)
    }

    async fn find_article(&self, id: i64) -> Result<Option<Article>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.articles.get(&id).cloned())
    }

    async fn create_article(&self, fields: ArticleFields) -> Result<Article, StoreError> {
        let mut tables = self.tables.write().await;
        tables.last_article_id += 1;
        let now = Utc::now();
        let article = Article {
            id: tables.last_article_id,
            title: fields.title,
            content: fields.content,
            published: fields.published.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        tables.articles.insert(article.id, article.clone());
        Ok(article)
    }

    async fn update_article(
        &self,
        id: i64,
        fields: ArticleFields,
    ) -> Result<Option<Article>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(article) = tables.articles.get_mut(&id) else {
            return Ok(None);
        };
        article.title = fields.title;
        article.content = fields.content;
        if let Some(published) = fields.published {
            article.published = published;
        }
        article.updated_at = Utc::now();
        Ok(Some(article.clone()))
    }

    async fn delete_article(&self, id: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.articles.remove(&id).is_some())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
