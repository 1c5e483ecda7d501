use sqlx::migrate::Migrator;
use sqlx::PgPool;

use crate::store::StoreError;

static MIGRATOR: Migrator = sqlx::migrate!("postgres/migrations");

/// Bring the schema up to date. Already applied migrations are skipped.
pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    MIGRATOR.run(pool).await?;
    tracing::info!(known = MIGRATOR.iter().count(), "schema migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use apiflow_core::error::{Classify, ErrorKind};
    use sqlx::migrate::MigrateError;

    use super::*;

    #[test]
    fn migration_failures_are_internal() {
        let err = StoreError::from(MigrateError::VersionMissing(3));
        assert!(matches!(err, StoreError::Migrate(_)));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn embedded_migrations_are_ordered() {
        let versions: Vec<i64> = MIGRATOR.iter().map(|m| m.version).collect();
        assert!(!versions.is_empty());
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
    }
}
