//! Chunked background job scheduler for product catalog feed imports.
//!
//! An import job describes a large data feed that must be processed
//! incrementally: work happens in bounded chunks, progress is durable, and
//! continuation is handled by re-enqueueing the next chunk rather than by
//! holding a long-running process. The subsystem is built around:
//!
//! - `database::repositories::ImportJobRepository`: durable job records and
//!   run state (the single source of truth)
//! - `scheduling::ChunkExecutor`: one bounded importer invocation, classified
//!   into an explicit outcome
//! - `scheduling::ChunkDispatcher`: the self-chaining control loop
//! - `scheduling::StuckJobRescuer`: crash recovery for abandoned chains
//! - `scheduling::SchedulePoller`: the periodic due-schedule tick
//!
//! The feed parser and catalog writer are external collaborators consumed
//! through the `scheduling::ChunkImporter` trait; the work queue is consumed
//! through `scheduling::TaskQueue`, with an in-process implementation provided
//! for embedders that do not bring their own.

pub mod config;
pub mod database;
pub mod entities;
pub mod errors;
pub mod models;
pub mod scheduling;
