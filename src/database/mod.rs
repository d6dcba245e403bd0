//! SeaORM-based database implementation
//!
//! Database-agnostic access with support for SQLite, PostgreSQL, and MySQL.

use sea_orm::{ConnectOptions, Database as SeaOrmDatabase, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::errors::{SchedulerError, SchedulerResult};

pub mod migrations;
pub mod repositories;

/// Database connection manager
#[derive(Clone)]
pub struct Database {
    connection: Arc<DatabaseConnection>,
}

impl Database {
    /// Open a connection pool against the configured database URL
    pub async fn connect(config: &DatabaseConfig) -> SchedulerResult<Self> {
        info!("Connecting to database at {}", config.url);

        let mut connect_options = ConnectOptions::new(&config.url);
        connect_options
            .max_connections(config.max_connections.unwrap_or(10))
            .min_connections(1)
            .connect_timeout(Duration::from_secs(5))
            .acquire_timeout(Duration::from_secs(3))
            .idle_timeout(Duration::from_secs(600))
            .sqlx_logging(false);

        let connection = SeaOrmDatabase::connect(connect_options)
            .await
            .map_err(SchedulerError::Database)?;

        debug!("Database connection established successfully");

        Ok(Self {
            connection: Arc::new(connection),
        })
    }

    /// Shared connection handle for repositories
    pub fn connection(&self) -> &Arc<DatabaseConnection> {
        &self.connection
    }

    /// Apply all pending migrations
    pub async fn migrate(&self) -> SchedulerResult<()> {
        migrations::Migrator::up(self.connection.as_ref(), None)
            .await
            .map_err(SchedulerError::Database)?;
        info!("Database migrations applied");
        Ok(())
    }
}
