//! The workflow step executor — a task handler that sweeps due step
//! executions and dispatches their emails.

use async_trait::async_trait;
use houndhub_core::Result;
use houndhub_db::ScheduledTask;
use houndhub_notify::OutboundEmail;
use houndhub_scheduler::{TaskContext, TaskHandler, TaskOutcome};

use crate::template;

/// Executes due workflow steps. Registered under [`Self::TASK_TYPE`].
pub struct WorkflowStepTask;

impl WorkflowStepTask {
    pub const TASK_TYPE: &'static str = "workflow_steps";
}

#[async_trait]
impl TaskHandler for WorkflowStepTask {
    async fn execute(&self, ctx: &TaskContext, _task: &ScheduledTask) -> Result<TaskOutcome> {
        let due = ctx.db.due_step_executions(ctx.now)?;
        let mut sent = 0i64;
        let mut failed = 0i64;

        for row in due {
            // Claim before dispatch. Losing the claim means an overlapping
            // invocation owns the row — skip, never double-send.
            if !ctx.db.claim_step_execution(row.execution_id)? {
                continue;
            }

            let email = match row.client_email.as_deref() {
                Some(e) if !e.is_empty() => e.to_string(),
                _ => {
                    // Won't resolve without a human editing the client record,
                    // so this is terminal rather than retried.
                    ctx.db
                        .fail_step_execution(row.execution_id, "no email found")?;
                    tracing::warn!(
                        "Step execution {}: client {} has no email",
                        row.execution_id,
                        row.client_id
                    );
                    failed += 1;
                    continue;
                }
            };

            let vars = [
                ("client_name", row.client_name.as_str()),
                ("workflow_name", row.workflow_name.as_str()),
                ("step_name", row.step_name.as_str()),
                ("business_name", ctx.config.business_name.as_str()),
            ];
            let links = template::attachment_links(&ctx.config.portal_base_url, &row.attachments);
            let mail = OutboundEmail {
                to: email,
                to_name: Some(row.client_name.clone()),
                subject: template::render(&row.email_subject, &vars),
                html_body: template::append_links_html(
                    &template::render(&row.email_body_html, &vars),
                    &links,
                ),
                text_body: template::append_links_text(
                    &template::render(&row.email_body_text, &vars),
                    &links,
                ),
            };

            let outcome = ctx.mailer.send(&mail).await;
            if outcome.success {
                ctx.db.complete_step_execution(row.execution_id, ctx.now)?;
                sent += 1;
                // Last step out the door completes the whole enrollment.
                if ctx.db.open_execution_count(row.enrollment_id)? == 0 {
                    ctx.db.complete_enrollment(row.enrollment_id, ctx.now)?;
                    tracing::info!("Enrollment {} completed", row.enrollment_id);
                }
            } else {
                // The enrollment stays active; the failed step is not retried
                // here and needs an external re-trigger.
                ctx.db
                    .fail_step_execution(row.execution_id, &outcome.message)?;
                tracing::warn!(
                    "Step execution {} dispatch failed: {}",
                    row.execution_id,
                    outcome.message
                );
                failed += 1;
            }
        }

        let message = if failed == 0 {
            format!("Sent {sent} step email(s)")
        } else {
            format!("Sent {sent} step email(s), {failed} failed")
        };
        Ok(TaskOutcome::new(sent + failed, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use houndhub_core::HoundHubConfig;
    use houndhub_db::{CrmDb, StepAttachments, WorkflowStepSeed};
    use houndhub_notify::MemoryMailer;
    use std::sync::Arc;

    use crate::enrollment::{enroll, EnrollOutcome};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()
    }

    struct Fixture {
        db: Arc<CrmDb>,
        mailer: Arc<MemoryMailer>,
        config: Arc<HoundHubConfig>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                db: Arc::new(CrmDb::open_in_memory().unwrap()),
                mailer: Arc::new(MemoryMailer::new()),
                config: Arc::new(HoundHubConfig::default()),
            }
        }

        fn ctx(&self, now: DateTime<Utc>) -> TaskContext {
            TaskContext {
                db: self.db.clone(),
                mailer: self.mailer.clone(),
                config: self.config.clone(),
                now,
            }
        }

        fn steps_task(&self) -> houndhub_db::ScheduledTask {
            let id = self
                .db
                .insert_task("Workflow Steps", WorkflowStepTask::TASK_TYPE, "interval", "15")
                .unwrap();
            self.db.task_by_id(id).unwrap().unwrap()
        }
    }

    fn welcome_workflow(db: &CrmDb, subject: &str) -> i64 {
        let wf = db.insert_workflow("Puppy Start", true).unwrap();
        let mut step = WorkflowStepSeed::new(wf, 1, "welcome", "immediate", "");
        step.email_subject = subject.to_string();
        step.email_body_html = "<p>Hi {client_name}, welcome to {workflow_name}!</p>".to_string();
        step.email_body_text = "Hi {client_name}, welcome to {workflow_name}!".to_string();
        db.insert_step(&step).unwrap();
        wf
    }

    #[tokio::test]
    async fn test_due_step_sends_and_completes_enrollment() {
        let fx = Fixture::new();
        let wf = welcome_workflow(&fx.db, "Welcome from {business_name}");
        let client = fx
            .db
            .insert_client("Ada", "Lovelace", Some("ada@example.com"), None)
            .unwrap();
        let EnrollOutcome::Enrolled { enrollment_id } =
            enroll(&fx.db, wf, client, "admin", t0()).unwrap()
        else {
            panic!("expected enrollment");
        };

        let ctx = fx.ctx(t0());
        let task = fx.steps_task();
        let outcome = WorkflowStepTask.execute(&ctx, &task).await.unwrap();
        assert_eq!(outcome.items_processed, 1);
        assert_eq!(outcome.message, "Sent 1 step email(s)");

        let sent = fx.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ada@example.com");
        assert_eq!(sent[0].subject, "Welcome from HoundHub Dog Training");
        assert!(sent[0].html_body.contains("Hi Ada Lovelace, welcome to Puppy Start!"));

        let execs = fx.db.executions_for_enrollment(enrollment_id).unwrap();
        assert_eq!(execs[0].status, "completed");
        assert_eq!(execs[0].executed_at, Some(t0()));

        // Single-step workflow: the enrollment rolls up to completed.
        let enrollment = fx.db.enrollment_by_id(enrollment_id).unwrap().unwrap();
        assert_eq!(enrollment.status, "completed");
        assert_eq!(enrollment.completed_at, Some(t0()));
    }

    #[tokio::test]
    async fn test_future_steps_wait() {
        let fx = Fixture::new();
        let wf = fx.db.insert_workflow("Slow", true).unwrap();
        fx.db
            .insert_step(&WorkflowStepSeed::new(wf, 1, "later", "after_enrollment", "1 day"))
            .unwrap();
        let client = fx
            .db
            .insert_client("Ada", "Lovelace", Some("ada@example.com"), None)
            .unwrap();
        enroll(&fx.db, wf, client, "admin", t0()).unwrap();

        let ctx = fx.ctx(t0());
        let task = fx.steps_task();
        let outcome = WorkflowStepTask.execute(&ctx, &task).await.unwrap();
        assert_eq!(outcome.items_processed, 0);
        assert_eq!(fx.mailer.sent_count(), 0);

        // A tick after the delay elapses picks it up.
        let ctx = fx.ctx(t0() + Duration::days(1));
        let outcome = WorkflowStepTask.execute(&ctx, &task).await.unwrap();
        assert_eq!(outcome.items_processed, 1);
        assert_eq!(fx.mailer.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_email_fails_terminally() {
        let fx = Fixture::new();
        let wf = welcome_workflow(&fx.db, "Welcome");
        let client = fx.db.insert_client("Ada", "Lovelace", None, None).unwrap();
        let EnrollOutcome::Enrolled { enrollment_id } =
            enroll(&fx.db, wf, client, "admin", t0()).unwrap()
        else {
            panic!("expected enrollment");
        };

        let ctx = fx.ctx(t0());
        let task = fx.steps_task();
        let outcome = WorkflowStepTask.execute(&ctx, &task).await.unwrap();
        assert_eq!(outcome.message, "Sent 0 step email(s), 1 failed");
        assert_eq!(fx.mailer.sent_count(), 0);

        let execs = fx.db.executions_for_enrollment(enrollment_id).unwrap();
        assert_eq!(execs[0].status, "failed");
        assert_eq!(execs[0].error_message.as_deref(), Some("no email found"));
        assert!(execs[0].executed_at.is_none());

        // Terminal: the next tick does not pick the row up again.
        let outcome = WorkflowStepTask.execute(&ctx, &task).await.unwrap();
        assert_eq!(outcome.items_processed, 0);

        // A failed step keeps the enrollment active.
        let enrollment = fx.db.enrollment_by_id(enrollment_id).unwrap().unwrap();
        assert_eq!(enrollment.status, "active");
    }

    #[tokio::test]
    async fn test_dispatch_failure_marks_failed_and_keeps_enrollment() {
        let fx = Fixture::new();
        let wf = welcome_workflow(&fx.db, "Welcome");
        let client = fx
            .db
            .insert_client("Ada", "Lovelace", Some("ada@example.com"), None)
            .unwrap();
        let EnrollOutcome::Enrolled { enrollment_id } =
            enroll(&fx.db, wf, client, "admin", t0()).unwrap()
        else {
            panic!("expected enrollment");
        };

        fx.mailer.fail_with("550 mailbox unavailable");
        let ctx = fx.ctx(t0());
        let task = fx.steps_task();
        WorkflowStepTask.execute(&ctx, &task).await.unwrap();

        let execs = fx.db.executions_for_enrollment(enrollment_id).unwrap();
        assert_eq!(execs[0].status, "failed");
        assert_eq!(
            execs[0].error_message.as_deref(),
            Some("550 mailbox unavailable")
        );
        let enrollment = fx.db.enrollment_by_id(enrollment_id).unwrap().unwrap();
        assert_eq!(enrollment.status, "active");
    }

    #[tokio::test]
    async fn test_claimed_row_is_skipped() {
        let fx = Fixture::new();
        let wf = welcome_workflow(&fx.db, "Welcome");
        let client = fx
            .db
            .insert_client("Ada", "Lovelace", Some("ada@example.com"), None)
            .unwrap();
        let EnrollOutcome::Enrolled { enrollment_id } =
            enroll(&fx.db, wf, client, "admin", t0()).unwrap()
        else {
            panic!("expected enrollment");
        };

        // Simulate an overlapping invocation that already claimed the row.
        let execs = fx.db.executions_for_enrollment(enrollment_id).unwrap();
        fx.db.claim_step_execution(execs[0].id).unwrap();

        let ctx = fx.ctx(t0());
        let task = fx.steps_task();
        let outcome = WorkflowStepTask.execute(&ctx, &task).await.unwrap();
        assert_eq!(outcome.items_processed, 0);
        assert_eq!(fx.mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_attachment_links_rendered_into_body() {
        let fx = Fixture::new();
        let wf = fx.db.insert_workflow("Billing", true).unwrap();
        let mut step = WorkflowStepSeed::new(wf, 1, "invoice", "immediate", "");
        step.email_body_html = "<p>Your invoice is ready.</p>".to_string();
        step.email_body_text = "Your invoice is ready.".to_string();
        step.attachments = StepAttachments {
            invoice_id: Some(42),
            ..Default::default()
        };
        fx.db.insert_step(&step).unwrap();

        let client = fx
            .db
            .insert_client("Ada", "Lovelace", Some("ada@example.com"), None)
            .unwrap();
        enroll(&fx.db, wf, client, "admin", t0()).unwrap();

        let ctx = fx.ctx(t0());
        let task = fx.steps_task();
        WorkflowStepTask.execute(&ctx, &task).await.unwrap();

        let sent = fx.mailer.sent();
        assert_eq!(sent[0].html_body.matches("/invoices/").count(), 1);
        assert_eq!(sent[0].html_body.matches("/contracts/").count(), 0);
        assert_eq!(sent[0].html_body.matches("/forms/").count(), 0);
        assert_eq!(sent[0].html_body.matches("/quotes/").count(), 0);
        assert!(sent[0].text_body.contains("/invoices/42/pay"));
    }

    #[tokio::test]
    async fn test_multi_step_completion_requires_all_steps() {
        let fx = Fixture::new();
        let wf = fx.db.insert_workflow("Two Step", true).unwrap();
        fx.db
            .insert_step(&WorkflowStepSeed::new(wf, 1, "first", "immediate", ""))
            .unwrap();
        fx.db
            .insert_step(&WorkflowStepSeed::new(wf, 2, "second", "after_previous", "1 day"))
            .unwrap();
        let client = fx
            .db
            .insert_client("Ada", "Lovelace", Some("ada@example.com"), None)
            .unwrap();
        let EnrollOutcome::Enrolled { enrollment_id } =
            enroll(&fx.db, wf, client, "admin", t0()).unwrap()
        else {
            panic!("expected enrollment");
        };

        let task = fx.steps_task();
        WorkflowStepTask.execute(&fx.ctx(t0()), &task).await.unwrap();
        let enrollment = fx.db.enrollment_by_id(enrollment_id).unwrap().unwrap();
        assert_eq!(enrollment.status, "active");

        WorkflowStepTask
            .execute(&fx.ctx(t0() + Duration::days(1)), &task)
            .await
            .unwrap();
        let enrollment = fx.db.enrollment_by_id(enrollment_id).unwrap().unwrap();
        assert_eq!(enrollment.status, "completed");
        assert_eq!(fx.mailer.sent_count(), 2);
    }
}
