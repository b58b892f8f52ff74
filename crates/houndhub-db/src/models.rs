//! Data model for everything the automation engine persists or reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status strings shared across tables.
pub mod status {
    // Scheduled task log rows
    pub const SUCCESS: &str = "success";
    pub const ERROR: &str = "error";

    // Workflow enrollments
    pub const ACTIVE: &str = "active";
    pub const COMPLETED: &str = "completed";
    pub const CANCELLED: &str = "cancelled";

    // Workflow step executions. `processing` is the transient claimed state
    // between the due-row selection and the dispatch outcome.
    pub const PENDING: &str = "pending";
    pub const PROCESSING: &str = "processing";
    pub const FAILED: &str = "failed";
}

/// Schedule type strings for scheduled tasks.
pub mod schedule {
    pub const HOURLY: &str = "hourly";
    pub const DAILY: &str = "daily";
    pub const WEEKLY: &str = "weekly";
    pub const INTERVAL: &str = "interval";
}

/// Delay type strings for workflow steps.
pub mod delay_type {
    pub const IMMEDIATE: &str = "immediate";
    pub const AFTER_ENROLLMENT: &str = "after_enrollment";
    pub const AFTER_PREVIOUS: &str = "after_previous";
    pub const SPECIFIC_DATE: &str = "specific_date";
}

/// Trigger type strings for workflow triggers.
pub mod trigger_type {
    pub const APPOINTMENT_BOOKING: &str = "appointment_booking";
    pub const FORM_SUBMISSION: &str = "form_submission";
}

/// A recurring job the tick runner executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: i64,
    pub name: String,
    /// Registry key resolving to a handler.
    pub task_type: String,
    /// hourly, daily, weekly, or interval.
    pub schedule_type: String,
    /// Free-form: "HH:MM", "weekday HH:MM", or minutes.
    pub schedule_value: String,
    pub is_active: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
}

/// One row per task execution — append-only audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLog {
    pub id: i64,
    pub task_id: i64,
    pub task_name: String,
    pub status: String,
    pub message: String,
    pub items_processed: i64,
    pub execution_time_ms: i64,
    pub created_at: DateTime<Utc>,
}

/// A multi-step email campaign clients are enrolled into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
}

/// Optional call-to-action attachments on a workflow step.
/// Each link type is independent of the others.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepAttachments {
    pub contract_id: Option<i64>,
    pub form_id: Option<i64>,
    pub quote_id: Option<i64>,
    pub invoice_id: Option<i64>,
    pub booking_type_id: Option<i64>,
    pub include_booking_link: bool,
}

/// One ordered step of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: i64,
    pub workflow_id: i64,
    pub step_order: i64,
    pub name: String,
    pub delay_type: String,
    pub delay_value: String,
    /// Only meaningful for delay_type = specific_date.
    pub scheduled_date: Option<DateTime<Utc>>,
    pub email_subject: String,
    pub email_body_html: String,
    pub email_body_text: String,
    pub attachments: StepAttachments,
}

/// Fields needed to create a workflow step.
#[derive(Debug, Clone)]
pub struct WorkflowStepSeed {
    pub workflow_id: i64,
    pub step_order: i64,
    pub name: String,
    pub delay_type: String,
    pub delay_value: String,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub email_subject: String,
    pub email_body_html: String,
    pub email_body_text: String,
    pub attachments: StepAttachments,
}

impl WorkflowStepSeed {
    /// A minimal step with no attachments — the common case in tests and seeds.
    pub fn new(workflow_id: i64, step_order: i64, name: &str, delay_type: &str, delay_value: &str) -> Self {
        Self {
            workflow_id,
            step_order,
            name: name.to_string(),
            delay_type: delay_type.to_string(),
            delay_value: delay_value.to_string(),
            scheduled_date: None,
            email_subject: format!("{name} from {{business_name}}"),
            email_body_html: String::new(),
            email_body_text: String::new(),
            attachments: StepAttachments::default(),
        }
    }
}

/// One client's traversal of one workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEnrollment {
    pub id: i64,
    pub workflow_id: i64,
    pub client_id: i64,
    pub enrolled_by: String,
    pub status: String,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// The scheduled, trackable unit of work for one step of one enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStepExecution {
    pub id: i64,
    pub enrollment_id: i64,
    pub step_id: i64,
    pub scheduled_for: DateTime<Utc>,
    pub status: String,
    pub executed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// Declarative rule: when event X references entity Y, auto-enroll the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTrigger {
    pub id: i64,
    pub workflow_id: i64,
    pub trigger_type: String,
    pub booking_type_id: Option<i64>,
    pub form_template_id: Option<i64>,
    pub is_active: bool,
}

/// CRM client record — the engine reads these for recipients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// A training session booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub client_id: i64,
    pub booking_type_id: i64,
    pub starts_at: DateTime<Utc>,
    pub status: String,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
}

/// A submitted intake/waiver form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSubmission {
    pub id: i64,
    pub client_id: i64,
    pub form_template_id: i64,
    pub submitted_at: DateTime<Utc>,
}

/// Joined row the workflow step executor consumes: a due pending execution
/// with its step content, workflow name, and recipient.
#[derive(Debug, Clone)]
pub struct DueStepExecution {
    pub execution_id: i64,
    pub enrollment_id: i64,
    pub step_id: i64,
    pub scheduled_for: DateTime<Utc>,
    pub step_name: String,
    pub email_subject: String,
    pub email_body_html: String,
    pub email_body_text: String,
    pub attachments: StepAttachments,
    pub workflow_name: String,
    pub client_id: i64,
    pub client_name: String,
    pub client_email: Option<String>,
}
