//! Workflow enrollment — entry and exit of a client's traversal.

use chrono::{DateTime, Duration, Utc};
use houndhub_core::{parse_delay, HoundHubError, Result};
use houndhub_db::{delay_type, CrmDb};

/// Result of an enrollment attempt. Already being enrolled is an expected
/// outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollOutcome {
    Enrolled { enrollment_id: i64 },
    AlreadyEnrolled,
}

/// Enroll a client into a workflow and precompute every step's due time.
///
/// Step due times are computed in one pass over the steps in order:
/// - `immediate`: the enrollment time.
/// - `after_enrollment`: enrollment time + delay.
/// - `after_previous`: the previous step's *computed* time + delay (or the
///   enrollment time for the first step). Chaining off computed times keeps
///   the cadence fixed even when an earlier send runs late.
/// - `specific_date`: the step's fixed date, or the enrollment time when
///   none is set.
pub fn enroll(
    db: &CrmDb,
    workflow_id: i64,
    client_id: i64,
    enrolled_by: &str,
    now: DateTime<Utc>,
) -> Result<EnrollOutcome> {
    if db.workflow_by_id(workflow_id)?.is_none() {
        return Err(HoundHubError::Workflow(format!(
            "workflow {workflow_id} not found"
        )));
    }
    if db.has_active_enrollment(workflow_id, client_id)? {
        return Ok(EnrollOutcome::AlreadyEnrolled);
    }

    let enrollment_id = db.insert_enrollment(workflow_id, client_id, enrolled_by, now)?;
    let steps = db.steps_for_workflow(workflow_id)?;

    let mut previous = now;
    for step in &steps {
        let scheduled_for = match step.delay_type.as_str() {
            delay_type::IMMEDIATE => now,
            delay_type::AFTER_ENROLLMENT => now + Duration::minutes(parse_delay(&step.delay_value)),
            delay_type::AFTER_PREVIOUS => {
                previous + Duration::minutes(parse_delay(&step.delay_value))
            }
            delay_type::SPECIFIC_DATE => step.scheduled_date.unwrap_or(now),
            _ => now,
        };
        db.insert_step_execution(enrollment_id, step.id, scheduled_for)?;
        previous = scheduled_for;
    }

    tracing::info!(
        "Enrolled client {} into workflow {} ({} step(s))",
        client_id,
        workflow_id,
        steps.len()
    );
    Ok(EnrollOutcome::Enrolled { enrollment_id })
}

/// Cancel an active enrollment: the enrollment goes to `cancelled` and every
/// still-pending step execution with it. Completed and failed executions are
/// history and stay untouched. Returns how many executions were cancelled.
pub fn cancel(db: &CrmDb, enrollment_id: i64, now: DateTime<Utc>) -> Result<usize> {
    if !db.cancel_enrollment(enrollment_id, now)? {
        return Err(HoundHubError::Workflow(format!(
            "no active enrollment {enrollment_id}"
        )));
    }
    let cancelled = db.cancel_pending_executions(enrollment_id)?;
    tracing::info!(
        "Cancelled enrollment {} ({} pending step(s) dropped)",
        enrollment_id,
        cancelled
    );
    Ok(cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use houndhub_db::WorkflowStepSeed;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()
    }

    fn three_step_workflow(db: &CrmDb) -> i64 {
        let wf = db.insert_workflow("Puppy Start", true).unwrap();
        db.insert_step(&WorkflowStepSeed::new(wf, 1, "welcome", "immediate", ""))
            .unwrap();
        db.insert_step(&WorkflowStepSeed::new(wf, 2, "check-in", "after_previous", "1 day"))
            .unwrap();
        db.insert_step(&WorkflowStepSeed::new(wf, 3, "follow-up", "after_previous", "2 days"))
            .unwrap();
        wf
    }

    #[test]
    fn test_after_previous_chains_cumulatively() {
        let db = CrmDb::open_in_memory().unwrap();
        let wf = three_step_workflow(&db);
        let client = db.insert_client("Ada", "Lovelace", None, None).unwrap();

        let outcome = enroll(&db, wf, client, "admin", t0()).unwrap();
        let EnrollOutcome::Enrolled { enrollment_id } = outcome else {
            panic!("expected enrollment");
        };

        let execs = db.executions_for_enrollment(enrollment_id).unwrap();
        assert_eq!(execs.len(), 3);
        assert_eq!(execs[0].scheduled_for, t0());
        assert_eq!(execs[1].scheduled_for, t0() + Duration::days(1));
        // Cumulative: 1 day + 2 days off the *computed* chain, not 2 days
        // off the enrollment time.
        assert_eq!(execs[2].scheduled_for, t0() + Duration::days(3));
    }

    #[test]
    fn test_double_enroll_is_structured_noop() {
        let db = CrmDb::open_in_memory().unwrap();
        let wf = three_step_workflow(&db);
        let client = db.insert_client("Ada", "Lovelace", None, None).unwrap();

        let first = enroll(&db, wf, client, "admin", t0()).unwrap();
        let EnrollOutcome::Enrolled { enrollment_id } = first else {
            panic!("expected enrollment");
        };
        let second = enroll(&db, wf, client, "admin", t0()).unwrap();
        assert_eq!(second, EnrollOutcome::AlreadyEnrolled);

        // No duplicate execution rows appeared.
        assert_eq!(db.executions_for_enrollment(enrollment_id).unwrap().len(), 3);
    }

    #[test]
    fn test_reenroll_after_cancel_is_allowed() {
        let db = CrmDb::open_in_memory().unwrap();
        let wf = three_step_workflow(&db);
        let client = db.insert_client("Ada", "Lovelace", None, None).unwrap();

        let EnrollOutcome::Enrolled { enrollment_id } =
            enroll(&db, wf, client, "admin", t0()).unwrap()
        else {
            panic!("expected enrollment");
        };
        cancel(&db, enrollment_id, t0()).unwrap();

        // The uniqueness invariant covers *active* enrollments only.
        let again = enroll(&db, wf, client, "admin", t0()).unwrap();
        assert!(matches!(again, EnrollOutcome::Enrolled { .. }));
    }

    #[test]
    fn test_delay_variants() {
        let db = CrmDb::open_in_memory().unwrap();
        let wf = db.insert_workflow("Mixed", true).unwrap();
        let fixed = Utc.with_ymd_and_hms(2026, 4, 1, 10, 0, 0).unwrap();
        db.insert_step(&WorkflowStepSeed::new(wf, 1, "later", "after_enrollment", "2 hours"))
            .unwrap();
        let mut dated = WorkflowStepSeed::new(wf, 2, "dated", "specific_date", "");
        dated.scheduled_date = Some(fixed);
        db.insert_step(&dated).unwrap();
        // No date on a specific_date step falls back to the enrollment time.
        db.insert_step(&WorkflowStepSeed::new(wf, 3, "dateless", "specific_date", ""))
            .unwrap();

        let client = db.insert_client("Ada", "Lovelace", None, None).unwrap();
        let EnrollOutcome::Enrolled { enrollment_id } =
            enroll(&db, wf, client, "admin", t0()).unwrap()
        else {
            panic!("expected enrollment");
        };

        let execs = db.executions_for_enrollment(enrollment_id).unwrap();
        let mut times: Vec<DateTime<Utc>> = execs.iter().map(|e| e.scheduled_for).collect();
        times.sort();
        assert_eq!(times, vec![t0(), t0() + Duration::hours(2), fixed]);
    }

    #[test]
    fn test_cancel_preserves_history() {
        let db = CrmDb::open_in_memory().unwrap();
        let wf = three_step_workflow(&db);
        let client = db.insert_client("Ada", "Lovelace", None, None).unwrap();
        let EnrollOutcome::Enrolled { enrollment_id } =
            enroll(&db, wf, client, "admin", t0()).unwrap()
        else {
            panic!("expected enrollment");
        };

        // First step already went out.
        let execs = db.executions_for_enrollment(enrollment_id).unwrap();
        db.claim_step_execution(execs[0].id).unwrap();
        db.complete_step_execution(execs[0].id, t0()).unwrap();

        let cancelled = cancel(&db, enrollment_id, t0() + Duration::hours(1)).unwrap();
        assert_eq!(cancelled, 2);

        let execs = db.executions_for_enrollment(enrollment_id).unwrap();
        assert_eq!(execs[0].status, "completed");
        assert_eq!(execs[0].executed_at, Some(t0()));
        assert_eq!(execs[1].status, "cancelled");
        assert_eq!(execs[2].status, "cancelled");

        let enrollment = db.enrollment_by_id(enrollment_id).unwrap().unwrap();
        assert_eq!(enrollment.status, "cancelled");
        assert_eq!(enrollment.cancelled_at, Some(t0() + Duration::hours(1)));
    }

    #[test]
    fn test_cancel_twice_errors() {
        let db = CrmDb::open_in_memory().unwrap();
        let wf = three_step_workflow(&db);
        let client = db.insert_client("Ada", "Lovelace", None, None).unwrap();
        let EnrollOutcome::Enrolled { enrollment_id } =
            enroll(&db, wf, client, "admin", t0()).unwrap()
        else {
            panic!("expected enrollment");
        };

        cancel(&db, enrollment_id, t0()).unwrap();
        assert!(cancel(&db, enrollment_id, t0()).is_err());
    }

    #[test]
    fn test_enroll_unknown_workflow_errors() {
        let db = CrmDb::open_in_memory().unwrap();
        let client = db.insert_client("Ada", "Lovelace", None, None).unwrap();
        assert!(enroll(&db, 999, client, "admin", t0()).is_err());
    }
}
