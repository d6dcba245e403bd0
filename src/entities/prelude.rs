pub use super::import_jobs::Entity as ImportJobs;
