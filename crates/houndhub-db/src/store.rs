//! SQLite store — schema migration plus every query the engine issues.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings ("...Z", whole
//! seconds) so `scheduled_for <= ?` comparisons are valid lexicographically
//! inside SQL.

use chrono::{DateTime, SecondsFormat, Utc};
use houndhub_core::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::models::*;

/// Format a timestamp for storage.
pub fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a stored timestamp, falling back to now on corruption.
fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_ts_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|d| d.with_timezone(&Utc))
}

const TASK_SELECT: &str = "SELECT id, name, task_type, schedule_type, schedule_value, is_active, last_run, next_run FROM scheduled_tasks";

fn row_to_task(row: &Row) -> rusqlite::Result<ScheduledTask> {
    Ok(ScheduledTask {
        id: row.get(0)?,
        name: row.get(1)?,
        task_type: row.get(2)?,
        schedule_type: row.get(3)?,
        schedule_value: row.get(4)?,
        is_active: row.get::<_, i64>(5)? != 0,
        last_run: parse_ts_opt(row.get(6)?),
        next_run: parse_ts_opt(row.get(7)?),
    })
}

const STEP_SELECT: &str = "SELECT id, workflow_id, step_order, name, delay_type, delay_value, scheduled_date, email_subject, email_body_html, email_body_text, attach_contract_id, attach_form_id, attach_quote_id, attach_invoice_id, booking_type_id, include_booking_link FROM workflow_steps";

fn row_to_step(row: &Row) -> rusqlite::Result<WorkflowStep> {
    Ok(WorkflowStep {
        id: row.get(0)?,
        workflow_id: row.get(1)?,
        step_order: row.get(2)?,
        name: row.get(3)?,
        delay_type: row.get(4)?,
        delay_value: row.get(5)?,
        scheduled_date: parse_ts_opt(row.get(6)?),
        email_subject: row.get(7)?,
        email_body_html: row.get(8)?,
        email_body_text: row.get(9)?,
        attachments: StepAttachments {
            contract_id: row.get(10)?,
            form_id: row.get(11)?,
            quote_id: row.get(12)?,
            invoice_id: row.get(13)?,
            booking_type_id: row.get(14)?,
            include_booking_link: row.get::<_, i64>(15)? != 0,
        },
    })
}

const ENROLLMENT_SELECT: &str = "SELECT id, workflow_id, client_id, enrolled_by, status, enrolled_at, completed_at, cancelled_at FROM workflow_enrollments";

fn row_to_enrollment(row: &Row) -> rusqlite::Result<WorkflowEnrollment> {
    Ok(WorkflowEnrollment {
        id: row.get(0)?,
        workflow_id: row.get(1)?,
        client_id: row.get(2)?,
        enrolled_by: row.get(3)?,
        status: row.get(4)?,
        enrolled_at: parse_ts(&row.get::<_, String>(5)?),
        completed_at: parse_ts_opt(row.get(6)?),
        cancelled_at: parse_ts_opt(row.get(7)?),
    })
}

const EXECUTION_SELECT: &str = "SELECT id, enrollment_id, step_id, scheduled_for, status, executed_at, error_message FROM workflow_step_executions";

fn row_to_execution(row: &Row) -> rusqlite::Result<WorkflowStepExecution> {
    Ok(WorkflowStepExecution {
        id: row.get(0)?,
        enrollment_id: row.get(1)?,
        step_id: row.get(2)?,
        scheduled_for: parse_ts(&row.get::<_, String>(3)?),
        status: row.get(4)?,
        executed_at: parse_ts_opt(row.get(5)?),
        error_message: row.get(6)?,
    })
}

const CLIENT_SELECT: &str = "SELECT id, first_name, last_name, email, phone, created_at FROM clients";

fn row_to_client(row: &Row) -> rusqlite::Result<Client> {
    Ok(Client {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        created_at: parse_ts(&row.get::<_, String>(5)?),
    })
}

const BOOKING_SELECT: &str = "SELECT id, client_id, booking_type_id, starts_at, status, reminder_sent, created_at FROM bookings";

fn row_to_booking(row: &Row) -> rusqlite::Result<Booking> {
    Ok(Booking {
        id: row.get(0)?,
        client_id: row.get(1)?,
        booking_type_id: row.get(2)?,
        starts_at: parse_ts(&row.get::<_, String>(3)?),
        status: row.get(4)?,
        reminder_sent: row.get::<_, i64>(5)? != 0,
        created_at: parse_ts(&row.get::<_, String>(6)?),
    })
}

/// The HoundHub database.
pub struct CrmDb {
    conn: Mutex<Connection>,
}

impl CrmDb {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        // WAL allows a concurrent reader (the admin UI) while a tick writes.
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )?;
        Self::migrate(&conn)?;
        tracing::debug!("Database ready at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run schema migrations.
    fn migrate(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS scheduled_tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                task_type TEXT NOT NULL,
                schedule_type TEXT NOT NULL DEFAULT 'interval',
                schedule_value TEXT NOT NULL DEFAULT '60',
                is_active INTEGER NOT NULL DEFAULT 1,
                last_run TEXT,
                next_run TEXT
            );

            CREATE TABLE IF NOT EXISTS task_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL,
                task_name TEXT NOT NULL,
                status TEXT NOT NULL,
                message TEXT NOT NULL DEFAULT '',
                items_processed INTEGER NOT NULL DEFAULT 0,
                execution_time_ms INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS workflows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS workflow_steps (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workflow_id INTEGER NOT NULL,
                step_order INTEGER NOT NULL,
                name TEXT NOT NULL,
                delay_type TEXT NOT NULL DEFAULT 'immediate',
                delay_value TEXT NOT NULL DEFAULT '',
                scheduled_date TEXT,
                email_subject TEXT NOT NULL DEFAULT '',
                email_body_html TEXT NOT NULL DEFAULT '',
                email_body_text TEXT NOT NULL DEFAULT '',
                attach_contract_id INTEGER,
                attach_form_id INTEGER,
                attach_quote_id INTEGER,
                attach_invoice_id INTEGER,
                booking_type_id INTEGER,
                include_booking_link INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (workflow_id) REFERENCES workflows(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS workflow_enrollments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workflow_id INTEGER NOT NULL,
                client_id INTEGER NOT NULL,
                enrolled_by TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'active',
                enrolled_at TEXT NOT NULL,
                completed_at TEXT,
                cancelled_at TEXT,
                FOREIGN KEY (workflow_id) REFERENCES workflows(id)
            );

            CREATE TABLE IF NOT EXISTS workflow_step_executions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                enrollment_id INTEGER NOT NULL,
                step_id INTEGER NOT NULL,
                scheduled_for TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                executed_at TEXT,
                error_message TEXT,
                FOREIGN KEY (enrollment_id) REFERENCES workflow_enrollments(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS workflow_triggers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workflow_id INTEGER NOT NULL,
                trigger_type TEXT NOT NULL,
                booking_type_id INTEGER,
                form_template_id INTEGER,
                is_active INTEGER NOT NULL DEFAULT 1,
                FOREIGN KEY (workflow_id) REFERENCES workflows(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS clients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL DEFAULT '',
                email TEXT,
                phone TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS bookings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                client_id INTEGER NOT NULL,
                booking_type_id INTEGER NOT NULL,
                starts_at TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'confirmed',
                reminder_sent INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                FOREIGN KEY (client_id) REFERENCES clients(id)
            );

            CREATE TABLE IF NOT EXISTS form_submissions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                client_id INTEGER NOT NULL,
                form_template_id INTEGER NOT NULL,
                submitted_at TEXT NOT NULL,
                FOREIGN KEY (client_id) REFERENCES clients(id)
            );

            CREATE INDEX IF NOT EXISTS idx_executions_due
                ON workflow_step_executions(status, scheduled_for);
            CREATE INDEX IF NOT EXISTS idx_enrollments_lookup
                ON workflow_enrollments(workflow_id, client_id, status);
            CREATE INDEX IF NOT EXISTS idx_task_logs_task
                ON task_logs(task_id);
            ",
        )?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A poisoned lock only means a panic mid-query; the connection is
        // still usable.
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ─── Scheduled tasks ──────────────────────────────────────

    pub fn insert_task(
        &self,
        name: &str,
        task_type: &str,
        schedule_type: &str,
        schedule_value: &str,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO scheduled_tasks (name, task_type, schedule_type, schedule_value)
             VALUES (?1, ?2, ?3, ?4)",
            params![name, task_type, schedule_type, schedule_value],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert a task unless one of the same task_type already exists.
    pub fn ensure_task(
        &self,
        name: &str,
        task_type: &str,
        schedule_type: &str,
        schedule_value: &str,
    ) -> Result<()> {
        self.conn().execute(
            "INSERT INTO scheduled_tasks (name, task_type, schedule_type, schedule_value)
             SELECT ?1, ?2, ?3, ?4
             WHERE NOT EXISTS (SELECT 1 FROM scheduled_tasks WHERE task_type = ?2)",
            params![name, task_type, schedule_type, schedule_value],
        )?;
        Ok(())
    }

    pub fn task_by_id(&self, id: i64) -> Result<Option<ScheduledTask>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("{TASK_SELECT} WHERE id = ?1"))?;
        Ok(stmt.query_row(params![id], row_to_task).optional()?)
    }

    /// Active tasks never run or due at `now`, in stable id order.
    pub fn due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledTask>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{TASK_SELECT} WHERE is_active = 1 AND (next_run IS NULL OR next_run <= ?1) ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![ts(now)], row_to_task)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Persist a successful run: last_run and the recomputed next_run.
    pub fn record_task_run(
        &self,
        task_id: i64,
        last_run: DateTime<Utc>,
        next_run: DateTime<Utc>,
    ) -> Result<()> {
        self.conn().execute(
            "UPDATE scheduled_tasks SET last_run = ?1, next_run = ?2 WHERE id = ?3",
            params![ts(last_run), ts(next_run), task_id],
        )?;
        Ok(())
    }

    /// Soft-disable (or re-enable) a task.
    pub fn set_task_active(&self, task_id: i64, active: bool) -> Result<()> {
        self.conn().execute(
            "UPDATE scheduled_tasks SET is_active = ?1 WHERE id = ?2",
            params![active as i64, task_id],
        )?;
        Ok(())
    }

    pub fn task_count(&self) -> Result<i64> {
        let conn = self.conn();
        Ok(conn.query_row("SELECT COUNT(*) FROM scheduled_tasks", [], |r| r.get(0))?)
    }

    // ─── Task logs ──────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub fn insert_task_log(
        &self,
        task_id: i64,
        task_name: &str,
        status: &str,
        message: &str,
        items_processed: i64,
        execution_time_ms: i64,
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO task_logs (task_id, task_name, status, message, items_processed, execution_time_ms, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                task_id,
                task_name,
                status,
                message,
                items_processed,
                execution_time_ms,
                ts(created_at)
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn recent_task_logs(&self, limit: usize) -> Result<Vec<TaskLog>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, task_id, task_name, status, message, items_processed, execution_time_ms, created_at
             FROM task_logs ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(TaskLog {
                id: row.get(0)?,
                task_id: row.get(1)?,
                task_name: row.get(2)?,
                status: row.get(3)?,
                message: row.get(4)?,
                items_processed: row.get(5)?,
                execution_time_ms: row.get(6)?,
                created_at: parse_ts(&row.get::<_, String>(7)?),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn task_logs_for(&self, task_id: i64) -> Result<Vec<TaskLog>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, task_id, task_name, status, message, items_processed, execution_time_ms, created_at
             FROM task_logs WHERE task_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![task_id], |row| {
            Ok(TaskLog {
                id: row.get(0)?,
                task_id: row.get(1)?,
                task_name: row.get(2)?,
                status: row.get(3)?,
                message: row.get(4)?,
                items_processed: row.get(5)?,
                execution_time_ms: row.get(6)?,
                created_at: parse_ts(&row.get::<_, String>(7)?),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ─── Workflows & steps ──────────────────────────────────────

    pub fn insert_workflow(&self, name: &str, is_active: bool) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO workflows (name, is_active) VALUES (?1, ?2)",
            params![name, is_active as i64],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn workflow_by_id(&self, id: i64) -> Result<Option<Workflow>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, name, is_active FROM workflows WHERE id = ?1")?;
        Ok(stmt
            .query_row(params![id], |row| {
                Ok(Workflow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    is_active: row.get::<_, i64>(2)? != 0,
                })
            })
            .optional()?)
    }

    pub fn set_workflow_active(&self, id: i64, active: bool) -> Result<()> {
        self.conn().execute(
            "UPDATE workflows SET is_active = ?1 WHERE id = ?2",
            params![active as i64, id],
        )?;
        Ok(())
    }

    pub fn insert_step(&self, seed: &WorkflowStepSeed) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO workflow_steps (workflow_id, step_order, name, delay_type, delay_value,
                 scheduled_date, email_subject, email_body_html, email_body_text,
                 attach_contract_id, attach_form_id, attach_quote_id, attach_invoice_id,
                 booking_type_id, include_booking_link)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                seed.workflow_id,
                seed.step_order,
                seed.name,
                seed.delay_type,
                seed.delay_value,
                seed.scheduled_date.map(ts),
                seed.email_subject,
                seed.email_body_html,
                seed.email_body_text,
                seed.attachments.contract_id,
                seed.attachments.form_id,
                seed.attachments.quote_id,
                seed.attachments.invoice_id,
                seed.attachments.booking_type_id,
                seed.attachments.include_booking_link as i64,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Steps of a workflow in step_order.
    pub fn steps_for_workflow(&self, workflow_id: i64) -> Result<Vec<WorkflowStep>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{STEP_SELECT} WHERE workflow_id = ?1 ORDER BY step_order, id"
        ))?;
        let rows = stmt.query_map(params![workflow_id], row_to_step)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ─── Enrollments ──────────────────────────────────────

    pub fn has_active_enrollment(&self, workflow_id: i64, client_id: i64) -> Result<bool> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM workflow_enrollments
             WHERE workflow_id = ?1 AND client_id = ?2 AND status = 'active'",
            params![workflow_id, client_id],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn insert_enrollment(
        &self,
        workflow_id: i64,
        client_id: i64,
        enrolled_by: &str,
        enrolled_at: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO workflow_enrollments (workflow_id, client_id, enrolled_by, status, enrolled_at)
             VALUES (?1, ?2, ?3, 'active', ?4)",
            params![workflow_id, client_id, enrolled_by, ts(enrolled_at)],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn enrollment_by_id(&self, id: i64) -> Result<Option<WorkflowEnrollment>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("{ENROLLMENT_SELECT} WHERE id = ?1"))?;
        Ok(stmt.query_row(params![id], row_to_enrollment).optional()?)
    }

    /// active → completed. No-op when the enrollment already left `active`.
    pub fn complete_enrollment(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "UPDATE workflow_enrollments SET status = 'completed', completed_at = ?1
             WHERE id = ?2 AND status = 'active'",
            params![ts(at), id],
        )?;
        Ok(())
    }

    /// active → cancelled. Returns false when no active enrollment matched.
    pub fn cancel_enrollment(&self, id: i64, at: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn().execute(
            "UPDATE workflow_enrollments SET status = 'cancelled', cancelled_at = ?1
             WHERE id = ?2 AND status = 'active'",
            params![ts(at), id],
        )?;
        Ok(changed > 0)
    }

    // ─── Step executions ──────────────────────────────────────

    pub fn insert_step_execution(
        &self,
        enrollment_id: i64,
        step_id: i64,
        scheduled_for: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO workflow_step_executions (enrollment_id, step_id, scheduled_for, status)
             VALUES (?1, ?2, ?3, 'pending')",
            params![enrollment_id, step_id, ts(scheduled_for)],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn executions_for_enrollment(
        &self,
        enrollment_id: i64,
    ) -> Result<Vec<WorkflowStepExecution>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{EXECUTION_SELECT} WHERE enrollment_id = ?1 ORDER BY scheduled_for, id"
        ))?;
        let rows = stmt.query_map(params![enrollment_id], row_to_execution)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Due pending executions whose enrollment and workflow are both active,
    /// joined with step content and recipient.
    pub fn due_step_executions(&self, now: DateTime<Utc>) -> Result<Vec<DueStepExecution>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT e.id, e.enrollment_id, e.step_id, e.scheduled_for,
                    s.name, s.email_subject, s.email_body_html, s.email_body_text,
                    s.attach_contract_id, s.attach_form_id, s.attach_quote_id, s.attach_invoice_id,
                    s.booking_type_id, s.include_booking_link,
                    w.name, c.id, c.first_name, c.last_name, c.email
             FROM workflow_step_executions e
             JOIN workflow_enrollments en ON en.id = e.enrollment_id
             JOIN workflows w ON w.id = en.workflow_id
             JOIN workflow_steps s ON s.id = e.step_id
             JOIN clients c ON c.id = en.client_id
             WHERE e.status = 'pending' AND e.scheduled_for <= ?1
               AND en.status = 'active' AND w.is_active = 1
             ORDER BY e.scheduled_for, e.id",
        )?;
        let rows = stmt.query_map(params![ts(now)], |row| {
            let first: String = row.get(16)?;
            let last: String = row.get(17)?;
            Ok(DueStepExecution {
                execution_id: row.get(0)?,
                enrollment_id: row.get(1)?,
                step_id: row.get(2)?,
                scheduled_for: parse_ts(&row.get::<_, String>(3)?),
                step_name: row.get(4)?,
                email_subject: row.get(5)?,
                email_body_html: row.get(6)?,
                email_body_text: row.get(7)?,
                attachments: StepAttachments {
                    contract_id: row.get(8)?,
                    form_id: row.get(9)?,
                    quote_id: row.get(10)?,
                    invoice_id: row.get(11)?,
                    booking_type_id: row.get(12)?,
                    include_booking_link: row.get::<_, i64>(13)? != 0,
                },
                workflow_name: row.get(14)?,
                client_id: row.get(15)?,
                client_name: format!("{} {}", first, last).trim().to_string(),
                client_email: row.get(18)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Claim a pending execution before dispatching it. Returns false when
    /// another invocation already owns the row — the caller must skip it.
    pub fn claim_step_execution(&self, id: i64) -> Result<bool> {
        let changed = self.conn().execute(
            "UPDATE workflow_step_executions SET status = 'processing'
             WHERE id = ?1 AND status = 'pending'",
            params![id],
        )?;
        Ok(changed > 0)
    }

    pub fn complete_step_execution(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "UPDATE workflow_step_executions SET status = 'completed', executed_at = ?1
             WHERE id = ?2",
            params![ts(at), id],
        )?;
        Ok(())
    }

    pub fn fail_step_execution(&self, id: i64, message: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE workflow_step_executions SET status = 'failed', error_message = ?1
             WHERE id = ?2",
            params![message, id],
        )?;
        Ok(())
    }

    /// Cancel every still-pending execution of an enrollment. Completed and
    /// failed rows are immutable history.
    pub fn cancel_pending_executions(&self, enrollment_id: i64) -> Result<usize> {
        let changed = self.conn().execute(
            "UPDATE workflow_step_executions SET status = 'cancelled'
             WHERE enrollment_id = ?1 AND status = 'pending'",
            params![enrollment_id],
        )?;
        Ok(changed)
    }

    /// Executions still standing between an enrollment and completion:
    /// pending, claimed, or failed.
    pub fn open_execution_count(&self, enrollment_id: i64) -> Result<i64> {
        let conn = self.conn();
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM workflow_step_executions
             WHERE enrollment_id = ?1 AND status IN ('pending', 'processing', 'failed')",
            params![enrollment_id],
            |r| r.get(0),
        )?)
    }

    // ─── Triggers ──────────────────────────────────────

    pub fn insert_trigger(
        &self,
        workflow_id: i64,
        trigger_type: &str,
        booking_type_id: Option<i64>,
        form_template_id: Option<i64>,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO workflow_triggers (workflow_id, trigger_type, booking_type_id, form_template_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![workflow_id, trigger_type, booking_type_id, form_template_id],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn active_triggers_for_booking_type(
        &self,
        booking_type_id: i64,
    ) -> Result<Vec<WorkflowTrigger>> {
        self.active_triggers(
            trigger_type::APPOINTMENT_BOOKING,
            "booking_type_id",
            booking_type_id,
        )
    }

    pub fn active_triggers_for_form(&self, form_template_id: i64) -> Result<Vec<WorkflowTrigger>> {
        self.active_triggers(
            trigger_type::FORM_SUBMISSION,
            "form_template_id",
            form_template_id,
        )
    }

    fn active_triggers(
        &self,
        trigger_type: &str,
        ref_column: &str,
        ref_id: i64,
    ) -> Result<Vec<WorkflowTrigger>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, workflow_id, trigger_type, booking_type_id, form_template_id, is_active
             FROM workflow_triggers
             WHERE trigger_type = ?1 AND {ref_column} = ?2 AND is_active = 1
             ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![trigger_type, ref_id], |row| {
            Ok(WorkflowTrigger {
                id: row.get(0)?,
                workflow_id: row.get(1)?,
                trigger_type: row.get(2)?,
                booking_type_id: row.get(3)?,
                form_template_id: row.get(4)?,
                is_active: row.get::<_, i64>(5)? != 0,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ─── Clients, bookings, form submissions ──────────────────────────────

    pub fn insert_client(
        &self,
        first_name: &str,
        last_name: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO clients (first_name, last_name, email, phone, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![first_name, last_name, email, phone, ts(Utc::now())],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn client_by_id(&self, id: i64) -> Result<Option<Client>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("{CLIENT_SELECT} WHERE id = ?1"))?;
        Ok(stmt.query_row(params![id], row_to_client).optional()?)
    }

    pub fn insert_booking(
        &self,
        client_id: i64,
        booking_type_id: i64,
        starts_at: DateTime<Utc>,
        status: &str,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO bookings (client_id, booking_type_id, starts_at, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![client_id, booking_type_id, ts(starts_at), status, ts(Utc::now())],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn booking_by_id(&self, id: i64) -> Result<Option<Booking>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("{BOOKING_SELECT} WHERE id = ?1"))?;
        Ok(stmt.query_row(params![id], row_to_booking).optional()?)
    }

    /// Confirmed bookings starting inside [from, until] that have not been
    /// reminded yet, with their clients.
    pub fn bookings_needing_reminder(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<(Booking, Client)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT b.id, b.client_id, b.booking_type_id, b.starts_at, b.status, b.reminder_sent, b.created_at,
                    c.id, c.first_name, c.last_name, c.email, c.phone, c.created_at
             FROM bookings b
             JOIN clients c ON c.id = b.client_id
             WHERE b.status = 'confirmed' AND b.reminder_sent = 0
               AND b.starts_at >= ?1 AND b.starts_at <= ?2
             ORDER BY b.starts_at, b.id",
        )?;
        let rows = stmt.query_map(params![ts(from), ts(until)], |row| {
            Ok((
                Booking {
                    id: row.get(0)?,
                    client_id: row.get(1)?,
                    booking_type_id: row.get(2)?,
                    starts_at: parse_ts(&row.get::<_, String>(3)?),
                    status: row.get(4)?,
                    reminder_sent: row.get::<_, i64>(5)? != 0,
                    created_at: parse_ts(&row.get::<_, String>(6)?),
                },
                Client {
                    id: row.get(7)?,
                    first_name: row.get(8)?,
                    last_name: row.get(9)?,
                    email: row.get(10)?,
                    phone: row.get(11)?,
                    created_at: parse_ts(&row.get::<_, String>(12)?),
                },
            ))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn mark_reminder_sent(&self, booking_id: i64) -> Result<()> {
        self.conn().execute(
            "UPDATE bookings SET reminder_sent = 1 WHERE id = ?1",
            params![booking_id],
        )?;
        Ok(())
    }

    pub fn insert_form_submission(
        &self,
        client_id: i64,
        form_template_id: i64,
        submitted_at: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO form_submissions (client_id, form_template_id, submitted_at)
             VALUES (?1, ?2, ?3)",
            params![client_id, form_template_id, ts(submitted_at)],
        )?;
        Ok(conn.last_insert_rowid())
    }
}
