//! Postgres-backed token store.
//!
//! ## Atomicity
//!
//! `find_one_and_delete` is a single `DELETE … RETURNING` whose target row is
//! selected `FOR UPDATE`. Two transactions racing on the same token serialize
//! on the row lock; the second re-evaluates after the first commits, finds the
//! row gone and deletes nothing.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | TokenStoreError |
//! |------------|----------------------|-----------------|
//! | Database (unique violation) | `23505` | `Duplicate` |
//! | Database (other) | Any other | `Storage` |
//! | PoolClosed / other | N/A | `Storage` |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use tracing::instrument;

use clinic_auth::TokenType;
use clinic_core::UserId;

use super::r#trait::{TokenFilter, TokenRecord, TokenStore, TokenStoreError};

const SCHEMA: &str = include_str!("../../migrations/0001_tokens.sql");

const SELECT_ONE: &str = r#"
    SELECT token, user_id, token_type, expires, blacklisted, created_at
    FROM tokens
    WHERE ($1::text IS NULL OR token = $1)
        AND ($2::uuid IS NULL OR user_id = $2)
        AND ($3::text IS NULL OR token_type = $3)
        AND ($4::boolean IS NULL OR blacklisted = $4)
        AND ($5::timestamptz IS NULL OR expires < $5)
    LIMIT 1
"#;

const DELETE_ONE: &str = r#"
    DELETE FROM tokens
    WHERE token = (
        SELECT token
        FROM tokens
        WHERE ($1::text IS NULL OR token = $1)
            AND ($2::uuid IS NULL OR user_id = $2)
            AND ($3::text IS NULL OR token_type = $3)
            AND ($4::boolean IS NULL OR blacklisted = $4)
            AND ($5::timestamptz IS NULL OR expires < $5)
        LIMIT 1
        FOR UPDATE
    )
    RETURNING token, user_id, token_type, expires, blacklisted, created_at
"#;

const DELETE_MANY: &str = r#"
    DELETE FROM tokens
    WHERE ($1::text IS NULL OR token = $1)
        AND ($2::uuid IS NULL OR user_id = $2)
        AND ($3::text IS NULL OR token_type = $3)
        AND ($4::boolean IS NULL OR blacklisted = $4)
        AND ($5::timestamptz IS NULL OR expires < $5)
"#;

/// Postgres-backed [`TokenStore`].
#[derive(Debug, Clone)]
pub struct PostgresTokenStore {
    pool: Arc<PgPool>,
}

impl PostgresTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the `tokens` table and its indexes if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), TokenStoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

fn bind_filter<'q>(
    query: Query<'q, Postgres, PgArguments>,
    filter: &'q TokenFilter,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(filter.token.as_deref())
        .bind(filter.user.map(|u| *u.as_uuid()))
        .bind(filter.token_type.map(|t| t.as_str()))
        .bind(filter.blacklisted)
        .bind(filter.expires_before)
}

fn record_from_row(row: &PgRow) -> Result<TokenRecord, TokenStoreError> {
    let read = |e: sqlx::Error| TokenStoreError::Storage(format!("failed to read token row: {e}"));

    let token_type: String = row.try_get("token_type").map_err(read)?;
    let token_type = token_type
        .parse::<TokenType>()
        .map_err(TokenStoreError::Storage)?;
    let user: uuid::Uuid = row.try_get("user_id").map_err(read)?;
    let expires: DateTime<Utc> = row.try_get("expires").map_err(read)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(read)?;

    Ok(TokenRecord {
        token: row.try_get("token").map_err(read)?,
        user: UserId::from_uuid(user),
        token_type,
        expires,
        blacklisted: row.try_get("blacklisted").map_err(read)?,
        created_at,
    })
}

#[async_trait::async_trait]
impl TokenStore for PostgresTokenStore {
    #[instrument(skip_all, fields(user_id = %record.user, token_type = %record.token_type), err)]
    async fn create(&self, record: TokenRecord) -> Result<(), TokenStoreError> {
        sqlx::query(
            r#"
            INSERT INTO tokens (token, user_id, token_type, expires, blacklisted, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&record.token)
        .bind(record.user.as_uuid())
        .bind(record.token_type.as_str())
        .bind(record.expires)
        .bind(record.blacklisted)
        .bind(record.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create", e))?;
        Ok(())
    }

    #[instrument(skip_all, err)]
    async fn find_one(&self, filter: &TokenFilter) -> Result<Option<TokenRecord>, TokenStoreError> {
        let row = bind_filter(sqlx::query(SELECT_ONE), filter)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_one", e))?;
        row.as_ref().map(record_from_row).transpose()
    }

    #[instrument(skip_all, err)]
    async fn find_one_and_delete(
        &self,
        filter: &TokenFilter,
    ) -> Result<Option<TokenRecord>, TokenStoreError> {
        let row = bind_filter(sqlx::query(DELETE_ONE), filter)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_one_and_delete", e))?;
        row.as_ref().map(record_from_row).transpose()
    }

    #[instrument(skip_all, err)]
    async fn delete_many(&self, filter: &TokenFilter) -> Result<u64, TokenStoreError> {
        if filter.is_unscoped() {
            return Err(TokenStoreError::UnscopedDelete);
        }
        let result = bind_filter(sqlx::query(DELETE_MANY), filter)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_many", e))?;
        Ok(result.rows_affected())
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> TokenStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                TokenStoreError::Duplicate
            } else {
                TokenStoreError::Storage(format!(
                    "database error in {}: {}",
                    operation,
                    db_err.message()
                ))
            }
        }
        sqlx::Error::PoolClosed => {
            TokenStoreError::Storage(format!("connection pool closed in {}", operation))
        }
        _ => TokenStoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}
