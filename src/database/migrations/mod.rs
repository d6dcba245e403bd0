//! SeaORM migrations for multi-database support

use sea_orm_migration::prelude::*;

pub mod m20260110_000001_create_import_jobs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20260110_000001_create_import_jobs::Migration)]
    }
}
