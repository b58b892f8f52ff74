//! # HoundHub Workflow
//!
//! The multi-step campaign engine. A client is enrolled into a workflow —
//! manually or via a trigger — and every step's due time is computed up front
//! as a `workflow_step_executions` row. The step executor (a registered task
//! handler) sweeps due rows each tick and dispatches the step's email.
//!
//! ## Architecture
//! ```text
//! booking / form submission ──► triggers ──► enroll()
//! admin action ──────────────────────────► enroll() / cancel()
//!
//! enroll(): one pass over steps in order
//!   immediate          → now
//!   after_enrollment   → now + delay
//!   after_previous     → previous *computed* time + delay
//!   specific_date      → the step's date
//!
//! tick ──► WorkflowStepTask: claim → render → dispatch → complete/fail
//!      └─► BookingReminderTask: sweep upcoming sessions
//! ```

pub mod enrollment;
pub mod executor;
pub mod reminders;
pub mod template;
pub mod triggers;

pub use enrollment::{cancel, enroll, EnrollOutcome};
pub use executor::WorkflowStepTask;
pub use reminders::BookingReminderTask;
pub use triggers::{on_appointment_booked, on_form_submitted};
