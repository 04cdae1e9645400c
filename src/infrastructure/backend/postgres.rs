//! PostgreSQL backend implementation with connection pooling

use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::domain::DomainError;
use crate::domain::backend::{Backend, RawRow};
use crate::domain::entity::{PrimaryKey, TypeTag};

/// PostgreSQL backend configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/objident_cache".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }
}

/// PostgreSQL backend storing entities as JSONB documents in a single
/// `(entity_type, pk, data)` table.
///
/// `fetch_by_primary_keys` compiles to one `pk = ANY($2)` query per type, so
/// the resolver's one-query-per-type batch invariant holds in SQL.
#[derive(Debug)]
pub struct PostgresBackend {
    pool: PgPool,
    table_name: String,
}

impl PostgresBackend {
    pub fn new(pool: PgPool, table_name: impl Into<String>) -> Self {
        Self {
            pool,
            table_name: table_name.into(),
        }
    }

    pub async fn connect(
        config: &PostgresConfig,
        table_name: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(std::time::Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| DomainError::backend(format!("failed to connect to PostgreSQL: {e}")))?;

        Ok(Self::new(pool, table_name))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Ensures the entity table exists
    pub async fn ensure_table(&self) -> Result<(), DomainError> {
        let query = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                entity_type VARCHAR(255) NOT NULL,
                pk VARCHAR(255) NOT NULL,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (entity_type, pk)
            )
            "#,
            self.table_name
        );

        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::backend(format!("failed to create table: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    async fn fetch_by_primary_keys(
        &self,
        tag: &TypeTag,
        pks: &[PrimaryKey],
    ) -> Result<Vec<RawRow>, DomainError> {
        if pks.is_empty() {
            return Ok(Vec::new());
        }

        let canonical: Vec<String> = pks.iter().map(PrimaryKey::canonical).collect();
        let query = format!(
            "SELECT pk, data FROM {} WHERE entity_type = $1 AND pk = ANY($2)",
            self.table_name
        );

        let rows = sqlx::query(&query)
            .bind(tag.as_str())
            .bind(&canonical)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                DomainError::backend(format!("failed to fetch '{tag}' entities: {e}"))
            })?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let pk: String = row.get("pk");
                let data: serde_json::Value = row.get("data");
                RawRow::new(pk, data)
            })
            .collect())
    }

    async fn fetch_by_foreign_key(
        &self,
        tag: &TypeTag,
        fk_field: &str,
        owner: &PrimaryKey,
    ) -> Result<Option<RawRow>, DomainError> {
        // The ->> text comparison matches both numeric and string JSON
        // foreign keys against the owner's canonical form.
        let query = format!(
            "SELECT pk, data FROM {} WHERE entity_type = $1 AND data ->> $2 = $3 LIMIT 1",
            self.table_name
        );

        let result = sqlx::query(&query)
            .bind(tag.as_str())
            .bind(fk_field)
            .bind(owner.canonical())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DomainError::backend(format!(
                    "failed to fetch '{tag}' by foreign key '{fk_field}': {e}"
                ))
            })?;

        Ok(result.map(|row| {
            let pk: String = row.get("pk");
            let data: serde_json::Value = row.get("data");
            RawRow::new(pk, data)
        }))
    }

    async fn upsert(&self, tag: &TypeTag, row: RawRow) -> Result<(), DomainError> {
        let query = format!(
            r#"
            INSERT INTO {} (entity_type, pk, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (entity_type, pk)
            DO UPDATE SET data = $3, updated_at = NOW()
            "#,
            self.table_name
        );

        sqlx::query(&query)
            .bind(tag.as_str())
            .bind(row.primary_key.canonical())
            .bind(&row.data)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::backend(format!("failed to upsert '{tag}' entity: {e}")))?;

        Ok(())
    }

    async fn delete(&self, tag: &TypeTag, pk: &PrimaryKey) -> Result<bool, DomainError> {
        let query = format!(
            "DELETE FROM {} WHERE entity_type = $1 AND pk = $2",
            self.table_name
        );

        let result = sqlx::query(&query)
            .bind(tag.as_str())
            .bind(pk.canonical())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::backend(format!("failed to delete '{tag}' entity: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}
