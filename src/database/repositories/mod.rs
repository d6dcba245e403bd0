//! SeaORM repository implementations

pub mod import_job;

pub use import_job::ImportJobRepository;
