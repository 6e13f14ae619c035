//! Regime resolution

use charge_core::{
    models::Regime,
    traits::{LedgerStore, RegimeRepository},
    AppError, AppResult,
};
use std::sync::Arc;
use tracing::{instrument, warn};

pub struct RegimeService<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> RegimeService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Resolve a regime from the slug in the request path
    #[instrument(skip(self))]
    pub async fn find_by_slug(&self, slug: &str) -> AppResult<Regime> {
        let mut tx = self.store.begin().await?;
        let regime = tx.find_regime_by_slug(slug).await?;

        regime.ok_or_else(|| {
            warn!("Unknown regime {}", slug);
            AppError::RegimeNotFound(slug.to_string())
        })
    }
}
