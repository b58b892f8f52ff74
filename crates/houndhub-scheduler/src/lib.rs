//! # HoundHub Scheduler
//!
//! The tick machinery: an external timer invokes one tick, the tick selects
//! every due [`houndhub_db::ScheduledTask`], resolves its handler from the
//! [`registry::TaskRegistry`], runs it, logs the outcome, and reschedules.
//!
//! ## Architecture
//! ```text
//! external timer (cron / `houndhub watch`)
//!   └── run_tick(registry, ctx)
//!         ├── due_tasks(now) — is_active, next_run NULL or elapsed, by id
//!         ├── registry lookup — unknown task_type logs an error, tick goes on
//!         ├── handler.execute(ctx, task) → {items_processed, message}
//!         ├── task_logs row per execution (success or error)
//!         └── success only: last_run = now, next_run = calc::next_run_after
//! ```
//!
//! A failed task keeps its old next_run, so it stays due and retries on the
//! following tick. That unbounded retry is the system's only retry mechanism.

pub mod calc;
pub mod registry;
pub mod runner;

pub use registry::{TaskContext, TaskHandler, TaskOutcome, TaskRegistry};
pub use runner::{run_tick, TickSummary};
