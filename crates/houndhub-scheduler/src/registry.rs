//! Task handler registry.
//!
//! Task types resolve to handlers through an explicit registration call made
//! at startup. Adding a task type means registering a handler, nothing more.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use houndhub_core::{HoundHubConfig, Result};
use houndhub_db::{CrmDb, ScheduledTask};
use houndhub_notify::Mailer;
use std::collections::HashMap;
use std::sync::Arc;

/// What a handler hands back after a run.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub items_processed: i64,
    pub message: String,
}

impl TaskOutcome {
    pub fn new(items_processed: i64, message: impl Into<String>) -> Self {
        Self {
            items_processed,
            message: message.into(),
        }
    }
}

/// Everything a handler gets to work with: the store, the dispatcher, the
/// startup configuration, and the tick timestamp.
pub struct TaskContext {
    pub db: Arc<CrmDb>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<HoundHubConfig>,
    pub now: DateTime<Utc>,
}

/// One scheduled job's executable logic.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn execute(&self, ctx: &TaskContext, task: &ScheduledTask) -> Result<TaskOutcome>;
}

/// Maps task_type strings to handlers.
#[derive(Default)]
pub struct TaskRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, task_type: &str, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(task_type.to_string(), handler);
    }

    pub fn get(&self, task_type: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(task_type).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
