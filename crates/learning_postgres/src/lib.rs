//! PostgreSQL adapter for the review learning service.

mod rows;
pub mod store;

use anyhow::Context;
use sqlx::PgPool;

pub use store::{PgDecisionSource, PgLearningEventStore};

/// All Postgres adapters sharing one pool.
pub struct PgStores {
    pub events: PgLearningEventStore,
    pub decisions: PgDecisionSource,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self {
            events: PgLearningEventStore::new(pool.clone()),
            decisions: PgDecisionSource::new(pool),
        }
    }
}

/// Apply the bundled schema migrations.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .context("failed to run database migrations")?;
    Ok(())
}
