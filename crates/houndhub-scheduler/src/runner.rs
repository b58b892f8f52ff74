//! The tick runner — one invocation processes all currently-due tasks.

use houndhub_core::Result;
use houndhub_db::status;

use crate::calc;
use crate::registry::{TaskContext, TaskRegistry};

/// What one tick did, for the caller's log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TickSummary {
    pub tasks_run: usize,
    pub tasks_failed: usize,
}

/// Run one tick at `ctx.now`.
///
/// Per-task failures are logged and the tick continues; only a store-level
/// error propagates out of this function.
pub async fn run_tick(registry: &TaskRegistry, ctx: &TaskContext) -> Result<TickSummary> {
    let due = ctx.db.due_tasks(ctx.now)?;
    tracing::info!("Tick started: {} due task(s)", due.len());

    let mut summary = TickSummary::default();
    for task in due {
        let started = std::time::Instant::now();

        let handler = match registry.get(&task.task_type) {
            Some(h) => h,
            None => {
                tracing::warn!(
                    "Task '{}': no handler registered for type '{}'",
                    task.name,
                    task.task_type
                );
                ctx.db.insert_task_log(
                    task.id,
                    &task.name,
                    status::ERROR,
                    "handler not found",
                    0,
                    0,
                    ctx.now,
                )?;
                summary.tasks_failed += 1;
                continue;
            }
        };

        match handler.execute(ctx, &task).await {
            Ok(outcome) => {
                let elapsed_ms = started.elapsed().as_millis() as i64;
                ctx.db.insert_task_log(
                    task.id,
                    &task.name,
                    status::SUCCESS,
                    &outcome.message,
                    outcome.items_processed,
                    elapsed_ms,
                    ctx.now,
                )?;
                let next = calc::next_run_after(&task.schedule_type, &task.schedule_value, ctx.now);
                ctx.db.record_task_run(task.id, ctx.now, next)?;
                tracing::info!(
                    "Task '{}': {} ({}ms, next run {})",
                    task.name,
                    outcome.message,
                    elapsed_ms,
                    next
                );
                summary.tasks_run += 1;
            }
            Err(e) => {
                let elapsed_ms = started.elapsed().as_millis() as i64;
                // last_run/next_run stay untouched: the task remains due and
                // retries on the next tick.
                ctx.db.insert_task_log(
                    task.id,
                    &task.name,
                    status::ERROR,
                    &e.to_string(),
                    0,
                    elapsed_ms,
                    ctx.now,
                )?;
                tracing::error!("Task '{}' failed: {e}", task.name);
                summary.tasks_failed += 1;
            }
        }
    }

    tracing::info!(
        "Tick complete: {} succeeded, {} failed",
        summary.tasks_run,
        summary.tasks_failed
    );
    Ok(summary)
}
