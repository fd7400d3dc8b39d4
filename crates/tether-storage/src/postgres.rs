use sqlx::{PgPool, Row};
use tether_core::{LinkStore, OwnedLink, OwnerId, Result, ShortCode, StoreError};

const CREATE_TABLE: &str = include_str!("../ddl/postgres/links.sql");

const INSERT_LINK: &str = "INSERT INTO links (user_id, long_link, short_link) VALUES ($1, $2, $3)";

/// Postgres implementation of the [`LinkStore`] contract.
///
/// The `UNIQUE (long_link)` constraint enforces the one-record-per-content
/// invariant at the storage layer; duplicate detection is a translated
/// unique-violation, not a pre-check. Soft delete is the `is_deleted`
/// column, flipped by a conditional UPDATE and never reverted. Concurrent
/// access relies on the database's own row locking; this type only reuses
/// one connection pool across queries.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a store from an existing connection pool. No schema
    /// bootstrap is performed.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a new connection pool and bootstraps the schema if the
    /// `links` table does not exist yet. The existence probe keeps the
    /// bootstrap a one-time side effect of construction.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = 'links')",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if !exists {
            sqlx::query(CREATE_TABLE)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        }
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[async_trait::async_trait]
impl LinkStore for PgStore {
    async fn get(&self, code: &ShortCode) -> Result<String> {
        // The tombstone flag is read rather than filtered in the WHERE
        // clause: a tombstoned row must come back as Gone, not NotFound.
        let row = sqlx::query("SELECT long_link, is_deleted FROM links WHERE short_link = $1")
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Err(StoreError::NotFound(code.clone()));
        };

        let deleted: bool = row.try_get("is_deleted").map_err(map_sqlx_error)?;
        if deleted {
            return Err(StoreError::Gone(code.clone()));
        }
        row.try_get("long_link").map_err(map_sqlx_error)
    }

    async fn get_by_owner(&self, owner: &OwnerId) -> Result<Vec<OwnedLink>> {
        let rows = sqlx::query(
            "SELECT long_link, short_link FROM links WHERE user_id = $1 AND is_deleted = FALSE",
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut links = Vec::with_capacity(rows.len());
        for row in rows {
            let long_url: String = row.try_get("long_link").map_err(map_sqlx_error)?;
            let short_link: String = row.try_get("short_link").map_err(map_sqlx_error)?;
            links.push(OwnedLink {
                long_url,
                short_code: ShortCode::new_unchecked(short_link),
            });
        }

        if links.is_empty() {
            return Err(StoreError::NoRecords);
        }
        Ok(links)
    }

    async fn write(&self, owner: &OwnerId, long_url: &str) -> Result<ShortCode> {
        let code = ShortCode::derive(long_url);

        let result = sqlx::query(INSERT_LINK)
            .bind(owner.as_str())
            .bind(long_url)
            .bind(code.as_str())
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(code),
            // The generator is deterministic, so the conflicting row holds
            // exactly this code; no read-back needed.
            Err(err) if is_unique_violation(&err) => Err(StoreError::AlreadyExists { code }),
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn batch_write(&self, owner: &OwnerId, long_urls: &[String]) -> Result<Vec<ShortCode>> {
        let codes: Vec<ShortCode> = long_urls.iter().map(ShortCode::derive).collect();

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for (long_url, code) in long_urls.iter().zip(&codes) {
            let result = sqlx::query(INSERT_LINK)
                .bind(owner.as_str())
                .bind(long_url)
                .bind(code.as_str())
                .execute(&mut *tx)
                .await;

            // Any failure drops the transaction un-committed, rolling back
            // every item of the batch.
            match result {
                Ok(_) => {}
                Err(err) if is_unique_violation(&err) => {
                    return Err(StoreError::AlreadyExists { code: code.clone() });
                }
                Err(err) => return Err(map_sqlx_error(err)),
            }
        }
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(codes)
    }

    async fn delete(&self, owner: &OwnerId, code: &ShortCode) -> Result<()> {
        // Matched on owner and code; zero rows affected (unknown code,
        // foreign owner, already tombstoned) is a successful no-op.
        sqlx::query("UPDATE links SET is_deleted = TRUE WHERE user_id = $1 AND short_link = $2")
            .bind(owner.as_str())
            .bind(code.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
