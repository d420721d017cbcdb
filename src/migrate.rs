//! Versioned schema migrations.
//!
//! Migrations form a linear chain: each one names its predecessor and they
//! are applied strictly in version order. Applied versions are recorded in
//! `schema_migrations`; a migration and its bookkeeping row commit in the
//! same transaction.
//!
//! | Version | Name | Effect |
//! |---------|------|--------|
//! | 1 | `create_document_table` | `uuid-ossp` extension and the `document` table |
//! | 2 | `create_vector_store` | `vector` extension and `data_pg_vector_store` with a fixed-width `embedding` column |
//! | 3 | `add_vector_document_fk` | explicit, indexed `document_id` foreign key on vector rows |

use anyhow::{bail, Result};
use sqlx::{PgPool, Row};
use tracing::info;

use crate::config::Config;
use crate::db;

/// One reversible schema step.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    /// Version this migration builds on; `None` only for the first.
    pub previous: Option<i64>,
    pub up: Vec<String>,
    pub down: Vec<String>,
}

/// Applied/pending state of a migration, as reported by `migrate status`.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationStatus {
    pub version: i64,
    pub name: &'static str,
    pub applied: bool,
}

/// The full migration chain. `dims` fixes the width of the embedding
/// column when migration 2 is first applied; changing it later requires a
/// down/up cycle.
pub fn migrations(dims: usize) -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            name: "create_document_table",
            previous: None,
            up: vec![
                r#"CREATE EXTENSION IF NOT EXISTS "uuid-ossp""#.to_string(),
                r#"
                CREATE TABLE IF NOT EXISTS document (
                    id UUID DEFAULT uuid_generate_v4() NOT NULL,
                    url TEXT NOT NULL,
                    metadata_map JSONB,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    PRIMARY KEY (id),
                    UNIQUE (url)
                )
                "#
                .to_string(),
            ],
            down: vec!["DROP TABLE IF EXISTS document".to_string()],
        },
        Migration {
            version: 2,
            name: "create_vector_store",
            previous: Some(1),
            up: vec![
                "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
                format!(
                    r#"
                    CREATE TABLE IF NOT EXISTS data_pg_vector_store (
                        id UUID DEFAULT uuid_generate_v4() NOT NULL,
                        text VARCHAR NOT NULL,
                        metadata_ JSONB,
                        node_id VARCHAR NOT NULL,
                        embedding VECTOR({}),
                        PRIMARY KEY (id)
                    )
                    "#,
                    dims
                ),
            ],
            down: vec![
                "DROP TABLE IF EXISTS data_pg_vector_store".to_string(),
                "DROP EXTENSION IF EXISTS vector".to_string(),
            ],
        },
        Migration {
            version: 3,
            name: "add_vector_document_fk",
            previous: Some(2),
            up: vec![
                r#"
                ALTER TABLE data_pg_vector_store
                ADD COLUMN IF NOT EXISTS document_id UUID REFERENCES document(id)
                "#
                .to_string(),
                r#"
                UPDATE data_pg_vector_store v
                SET document_id = d.id
                FROM document d
                WHERE v.document_id IS NULL
                  AND v.metadata_->>'db_document_id' = d.id::text
                "#
                .to_string(),
                r#"
                CREATE INDEX IF NOT EXISTS idx_vector_store_document_id
                ON data_pg_vector_store(document_id)
                "#
                .to_string(),
            ],
            down: vec![
                "DROP INDEX IF EXISTS idx_vector_store_document_id".to_string(),
                "ALTER TABLE data_pg_vector_store DROP COLUMN IF EXISTS document_id".to_string(),
            ],
        },
    ]
}

/// Check that versions ascend and each migration names its predecessor.
pub fn validate_chain(migrations: &[Migration]) -> Result<()> {
    let mut previous: Option<i64> = None;
    for m in migrations {
        if m.previous != previous {
            bail!(
                "migration {} ({}) expects predecessor {:?}, found {:?}",
                m.version,
                m.name,
                m.previous,
                previous
            );
        }
        if let Some(p) = previous {
            if m.version <= p {
                bail!("migration versions must ascend: {} after {}", m.version, p);
            }
        }
        previous = Some(m.version);
    }
    Ok(())
}

/// Migrations not yet in `applied`, in apply order.
pub fn pending<'a>(migrations: &'a [Migration], applied: &[i64]) -> Vec<&'a Migration> {
    migrations
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .collect()
}

/// The last `steps` applied migrations, newest first.
pub fn to_revert<'a>(
    migrations: &'a [Migration],
    applied: &[i64],
    steps: usize,
) -> Vec<&'a Migration> {
    migrations
        .iter()
        .rev()
        .filter(|m| applied.contains(&m.version))
        .take(steps)
        .collect()
}

async fn ensure_bookkeeping(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version BIGINT PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn applied_versions(pool: &PgPool) -> Result<Vec<i64>> {
    let rows = sqlx::query("SELECT version FROM schema_migrations ORDER BY version")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(|r| r.get::<i64, _>("version")).collect())
}

/// Apply every pending migration. Returns the versions applied.
pub async fn run_migrations(config: &Config) -> Result<Vec<i64>> {
    let pool = db::connect(config).await?;
    let chain = migrations(config.llm.embedding_dims);
    validate_chain(&chain)?;
    ensure_bookkeeping(&pool).await?;

    let applied = applied_versions(&pool).await?;
    let mut done = Vec::new();

    for m in pending(&chain, &applied) {
        info!(version = m.version, name = m.name, "applying migration");
        let mut tx = pool.begin().await?;
        for stmt in &m.up {
            sqlx::query(stmt).execute(&mut *tx).await?;
        }
        sqlx::query("INSERT INTO schema_migrations (version, name) VALUES ($1, $2)")
            .bind(m.version)
            .bind(m.name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        done.push(m.version);
    }

    pool.close().await;
    Ok(done)
}

/// Revert the most recent `steps` migrations. Returns the versions reverted.
pub async fn revert_migrations(config: &Config, steps: usize) -> Result<Vec<i64>> {
    let pool = db::connect(config).await?;
    let chain = migrations(config.llm.embedding_dims);
    validate_chain(&chain)?;
    ensure_bookkeeping(&pool).await?;

    let applied = applied_versions(&pool).await?;
    let mut done = Vec::new();

    for m in to_revert(&chain, &applied, steps) {
        info!(version = m.version, name = m.name, "reverting migration");
        let mut tx = pool.begin().await?;
        for stmt in &m.down {
            sqlx::query(stmt).execute(&mut *tx).await?;
        }
        sqlx::query("DELETE FROM schema_migrations WHERE version = $1")
            .bind(m.version)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        done.push(m.version);
    }

    pool.close().await;
    Ok(done)
}

pub async fn migration_status(config: &Config) -> Result<Vec<MigrationStatus>> {
    let pool = db::connect(config).await?;
    ensure_bookkeeping(&pool).await?;
    let applied = applied_versions(&pool).await?;
    pool.close().await;

    Ok(migrations(config.llm.embedding_dims)
        .into_iter()
        .map(|m| MigrationStatus {
            version: m.version,
            name: m.name,
            applied: applied.contains(&m.version),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_is_linear() {
        validate_chain(&migrations(1536)).unwrap();
    }

    #[test]
    fn test_broken_chain_rejected() {
        let mut chain = migrations(1536);
        chain.swap(1, 2);
        assert!(validate_chain(&chain).is_err());
    }

    #[test]
    fn test_vector_column_uses_configured_dims() {
        let chain = migrations(768);
        let vector = chain.iter().find(|m| m.version == 2).unwrap();
        assert!(vector.up[1].contains("VECTOR(768)"));
        assert!(vector.up[0].contains("CREATE EXTENSION IF NOT EXISTS vector"));
        assert_eq!(vector.down.last().unwrap(), "DROP EXTENSION IF EXISTS vector");
    }

    #[test]
    fn test_pending_in_order() {
        let chain = migrations(1536);
        let versions: Vec<i64> = pending(&chain, &[1]).iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![2, 3]);
        assert!(pending(&chain, &[1, 2, 3]).is_empty());
    }

    #[test]
    fn test_revert_newest_first() {
        let chain = migrations(1536);
        let versions: Vec<i64> = to_revert(&chain, &[1, 2, 3], 2)
            .iter()
            .map(|m| m.version)
            .collect();
        assert_eq!(versions, vec![3, 2]);
        assert!(to_revert(&chain, &[], 1).is_empty());
    }
}
