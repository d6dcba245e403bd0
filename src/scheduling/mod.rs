//! Chunked job scheduling subsystem
//!
//! The engine behind resumable feed imports:
//! - `TaskQueue`: durable delayed-task queue collaborator (with an in-process
//!   implementation for embedders and tests)
//! - `KillSwitch`: out-of-band cooperative abort, checked before every chunk
//! - `ChunkExecutor`: one bounded importer invocation, classified
//! - `ChunkDispatcher`: the self-chaining control loop
//! - `StuckJobRescuer`: restarts chains abandoned by process crashes
//! - `SchedulePoller`: periodic tick that rescues, then starts due jobs
//! - `TaskRunner`: in-process drain loop for the worker-queue transport

pub mod chunk_dispatcher;
pub mod chunk_executor;
pub mod kill_switch;
pub mod poller;
pub mod rescuer;
pub mod task_queue;
pub mod task_runner;
pub mod types;

pub use chunk_dispatcher::{ChunkDispatcher, DispatchOutcome};
pub use chunk_executor::{ChunkExecutor, ChunkImporter, ChunkOutcome};
pub use kill_switch::{AbortSignalStore, FileAbortSignalStore, KillSwitch};
pub use poller::{PollSummary, SchedulePoller};
pub use rescuer::StuckJobRescuer;
pub use task_queue::{InMemoryTaskQueue, TaskQueue};
pub use task_runner::TaskRunner;
pub use types::*;
