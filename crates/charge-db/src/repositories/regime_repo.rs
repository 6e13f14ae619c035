//! Regime lookups

use crate::store::PgLedgerTx;
use async_trait::async_trait;
use charge_core::{models::Regime, traits::RegimeRepository, AppError, AppResult};
use chrono::{DateTime, Utc};
use tracing::{debug, error, instrument};
use uuid::Uuid;

#[async_trait]
impl RegimeRepository for PgLedgerTx {
    #[instrument(skip(self))]
    async fn find_regime(&mut self, id: Uuid) -> AppResult<Option<Regime>> {
        debug!("Finding regime by id: {}", id);

        let row = sqlx::query_as::<sqlx::Postgres, RegimeRow>(
            r#"
            SELECT id, slug, name, created_at, updated_at
            FROM regimes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| {
            error!("Database error finding regime {}: {}", id, e);
            AppError::Database(format!("Failed to find regime: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_regime_by_slug(&mut self, slug: &str) -> AppResult<Option<Regime>> {
        debug!("Finding regime by slug: {}", slug);

        let row = sqlx::query_as::<sqlx::Postgres, RegimeRow>(
            r#"
            SELECT id, slug, name, created_at, updated_at
            FROM regimes
            WHERE slug = $1
            "#,
        )
        .bind(slug.to_lowercase())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| {
            error!("Database error finding regime {}: {}", slug, e);
            AppError::Database(format!("Failed to find regime: {}", e))
        })?;

        Ok(row.map(Into::into))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RegimeRow {
    id: Uuid,
    slug: String,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RegimeRow> for Regime {
    fn from(row: RegimeRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
