//! SeaORM entity definitions

pub mod import_jobs;
pub mod prelude;
