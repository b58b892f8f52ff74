//! Booking reminder sweep — a task handler that emails clients ahead of
//! their upcoming training sessions.

use async_trait::async_trait;
use chrono::Duration;
use houndhub_core::Result;
use houndhub_db::ScheduledTask;
use houndhub_notify::OutboundEmail;
use houndhub_scheduler::{TaskContext, TaskHandler, TaskOutcome};

use crate::template;

const REMINDER_SUBJECT: &str = "Reminder: your upcoming session with {business_name}";
const REMINDER_HTML: &str = "<p>Hi {client_name},</p>\
<p>This is a friendly reminder that your training session is coming up on {session_time}.</p>\
<p>See you and your dog there!</p>\
<p>— {business_name}</p>";
const REMINDER_TEXT: &str = "Hi {client_name},\n\n\
This is a friendly reminder that your training session is coming up on {session_time}.\n\n\
See you and your dog there!\n\n\
— {business_name}";

/// Sends reminders for confirmed bookings starting inside the configured
/// lead window. Registered under [`Self::TASK_TYPE`].
pub struct BookingReminderTask;

impl BookingReminderTask {
    pub const TASK_TYPE: &'static str = "booking_reminders";
}

#[async_trait]
impl TaskHandler for BookingReminderTask {
    async fn execute(&self, ctx: &TaskContext, _task: &ScheduledTask) -> Result<TaskOutcome> {
        let until = ctx.now + Duration::hours(ctx.config.reminders.lead_hours);
        let due = ctx.db.bookings_needing_reminder(ctx.now, until)?;

        let mut sent = 0i64;
        let mut skipped = 0i64;
        for (booking, client) in due {
            let email = match client.email.as_deref() {
                Some(e) if !e.is_empty() => e.to_string(),
                _ => {
                    tracing::warn!(
                        "Booking {}: client {} has no email, skipping reminder",
                        booking.id,
                        client.id
                    );
                    skipped += 1;
                    continue;
                }
            };

            let client_name = client.full_name();
            let session_time = booking.starts_at.format("%Y-%m-%d %H:%M UTC").to_string();
            let vars = [
                ("client_name", client_name.as_str()),
                ("session_time", session_time.as_str()),
                ("business_name", ctx.config.business_name.as_str()),
            ];
            let mail = OutboundEmail {
                to: email,
                to_name: Some(client_name.clone()),
                subject: template::render(REMINDER_SUBJECT, &vars),
                html_body: template::render(REMINDER_HTML, &vars),
                text_body: template::render(REMINDER_TEXT, &vars),
            };

            let outcome = ctx.mailer.send(&mail).await;
            if outcome.success {
                ctx.db.mark_reminder_sent(booking.id)?;
                sent += 1;
            } else {
                // reminder_sent stays unset, so the next sweep retries.
                tracing::warn!(
                    "Booking {} reminder dispatch failed: {}",
                    booking.id,
                    outcome.message
                );
            }
        }

        let message = if skipped == 0 {
            format!("Sent {sent} reminder(s)")
        } else {
            format!("Sent {sent} reminder(s), skipped {skipped} without email")
        };
        Ok(TaskOutcome::new(sent, message))
    }
}
