//! Trigger evaluation — business events that auto-enroll clients.

use chrono::{DateTime, Utc};
use houndhub_core::Result;
use houndhub_db::{Booking, CrmDb, FormSubmission};

use crate::enrollment::{enroll, EnrollOutcome};

/// A booking came in: enroll its client into every workflow with an active
/// trigger on this booking type. Already-enrolled clients are left alone.
/// Returns the number of new enrollments.
pub fn on_appointment_booked(db: &CrmDb, booking: &Booking, now: DateTime<Utc>) -> Result<usize> {
    let triggers = db.active_triggers_for_booking_type(booking.booking_type_id)?;
    let mut enrolled = 0;
    for trigger in triggers {
        match enroll(
            db,
            trigger.workflow_id,
            booking.client_id,
            "trigger:appointment_booking",
            now,
        )? {
            EnrollOutcome::Enrolled { .. } => enrolled += 1,
            EnrollOutcome::AlreadyEnrolled => {}
        }
    }
    if enrolled > 0 {
        tracing::info!(
            "Booking {} enrolled client {} into {} workflow(s)",
            booking.id,
            booking.client_id,
            enrolled
        );
    }
    Ok(enrolled)
}

/// A form was submitted: same as bookings, keyed by form template.
pub fn on_form_submitted(
    db: &CrmDb,
    submission: &FormSubmission,
    now: DateTime<Utc>,
) -> Result<usize> {
    let triggers = db.active_triggers_for_form(submission.form_template_id)?;
    let mut enrolled = 0;
    for trigger in triggers {
        match enroll(
            db,
            trigger.workflow_id,
            submission.client_id,
            "trigger:form_submission",
            now,
        )? {
            EnrollOutcome::Enrolled { .. } => enrolled += 1,
            EnrollOutcome::AlreadyEnrolled => {}
        }
    }
    Ok(enrolled)
}
