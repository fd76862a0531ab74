use crate::config::DatabaseConfig;
use rocket::fairing::AdHoc;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

/// The pool is created lazily so the application (and its tests) can ignite
/// without a reachable database; connections are established on first use.
fn init_pool(db_config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .min_connections(db_config.min_connections)
        .acquire_timeout(Duration::from_secs(db_config.acquire_timeout))
        .idle_timeout(Duration::from_secs(30))
        .max_lifetime(Duration::from_secs(1800))
        .connect_lazy(&db_config.url)
}

pub fn stage_db(db_config: DatabaseConfig) -> AdHoc {
    AdHoc::try_on_ignite("Postgres (sqlx)", |rocket| async move {
        match init_pool(&db_config) {
            Ok(pool) => {
                if db_config.run_migrations {
                    match sqlx::migrate!().run(&pool).await {
                        Ok(()) => tracing::info!("Database migrations applied"),
                        Err(e) => {
                            tracing::warn!("Could not run migrations (database unavailable?): {}", e);
                        }
                    }
                }
                tracing::info!("Database pool initialized");
                Ok(rocket.manage(pool))
            }
            Err(e) => {
                tracing::error!("Failed to initialize database pool: {}", e);
                Err(rocket)
            }
        }
    })
}
