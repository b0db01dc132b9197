//! `PostgreSQL` implementation of the store traits (schema in `sql/schema.sql`).

use async_trait::async_trait;
use sqlx::{postgres::PgRow, Connection, PgPool, Row};
use tracing::{info_span, Instrument, Span};
use uuid::Uuid;

use super::{
    Account, AccountKey, AccountStore, Article, ArticleFields, ArticleStore, NewAccount, Store,
    StoreError,
};

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_span(operation: &str, statement: &str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn account_from_row(row: &PgRow) -> Result<Account, sqlx::Error> {
    Ok(Account {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_digest: row.try_get("password_digest")?,
        created_at: row.try_get("created_at")?,
    })
}

fn article_from_row(row: &PgRow) -> Result<Article, sqlx::Error> {
    Ok(Article {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        published: row.try_get("published")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl AccountStore for PgStore {
    async fn find_account_by(
        &self,
        key: AccountKey,
        value: &str,
    ) -> Result<Option<Account>, StoreError> {
        // Column names come from a closed enum, never from request input.
        let query = match key {
            AccountKey::Username => {
                "SELECT id, username, email, password_digest, created_at FROM users WHERE username = $1"
            }
            AccountKey::Email => {
                "SELECT id, username, email, password_digest, created_at FROM users WHERE email = $1"
            }
        };
        let row = sqlx::query(query)
            .bind(value)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;
        Ok(row.as_ref().map(account_from_row).transpose()?)
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let query =
            "SELECT id, username, email, password_digest, created_at FROM users WHERE id = $1";
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;
        Ok(row.as_ref().map(account_from_row).transpose()?)
    }

    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let query = r"
            INSERT INTO users (username, email, password_digest)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, password_digest, created_at
        ";
        let row = sqlx::query(query)
            .bind(&account.username)
            .bind(&account.email)
            .bind(&account.password_digest)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    StoreError::Conflict
                } else {
                    StoreError::Database(err)
                }
            })?;
        Ok(account_from_row(&row)?)
    }
}

#[async_trait]
impl ArticleStore for PgStore {
    async fn list_articles(&self) -> Result<Vec<Article>, StoreError> {
        let query = r"
            SELECT id, title, content, published, created_at, updated_at
            FROM articles
            ORDER BY created_at DESC, id DESC
        ";
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;
        Ok(rows
            .iter()
            .map(article_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn find_article(&self, id: i64) -> Result<Option<Article>, StoreError> {
        let query = r"
            SELECT id, title, content, published, created_at, updated_at
            FROM articles
            WHERE id = $1
        ";
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;
        Ok(row.as_ref().map(article_from_row).transpose()?)
    }

    async fn create_article(&self, fields: ArticleFields) -> Result<Article, StoreError> {
        let query = r"
            INSERT INTO articles (title, content, published)
            VALUES ($1, $2, COALESCE($3, TRUE))
            RETURNING id, title, content, published, created_at, updated_at
        ";
        let row = sqlx::query(query)
            .bind(&fields.title)
            .bind(&fields.content)
            .bind(fields.published)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", query))
            .await?;
        Ok(article_from_row(&row)?)
    }

    async fn update_article(
        &self,
        id: i64,
        fields: ArticleFields,
    ) -> Result<Option<Article>, StoreError> {
        let query = r"
            UPDATE articles
            SET title = $2,
                content = $3,
                published = COALESCE($4, published),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, title, content, published, created_at, updated_at
        ";
        let row = sqlx::query(query)
            .bind(id)
            .bind(&fields.title)
            .bind(&fields.content)
            .bind(fields.published)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;
        Ok(row.as_ref().map(article_from_row).transpose()?)
    }

    async fn delete_article(&self, id: i64) -> Result<bool, StoreError> {
        let query = "DELETE FROM articles WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self.pool.acquire().instrument(acquire_span).await?;
        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping().instrument(ping_span).await?;
        Ok(())
    }
}
