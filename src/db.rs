use log::info;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::Config;

pub async fn connect(config: &Config) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect_with(config.database.clone())
        .await?;

    if config.run_migrations {
        info!("Applying database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
    }

    Ok(pool)
}

/// A pool that only connects on first use. Handlers that never reach the
/// database can be exercised without a running server.
#[cfg(test)]
pub(crate) fn lazy_pool(config: &Config) -> PgPool {
    PgPoolOptions::new()
        .max_connections(1)
        .connect_lazy_with(config.database.clone())
}
