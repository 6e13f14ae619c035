//! Background task runner
//!
//! Deletion and rebilling copies are submitted here instead of being awaited
//! by the request. A task that fails is reported to the notifier with its
//! context and the error; it is never retried or re-raised.

use charge_core::{traits::Notifier, AppResult};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error};

#[derive(Clone)]
pub struct TaskRunner {
    notifier: Arc<dyn Notifier>,
    permits: Arc<Semaphore>,
}

impl TaskRunner {
    /// Create a runner allowing at most `limit` tasks to run at once
    pub fn new(notifier: Arc<dyn Notifier>, limit: usize) -> Self {
        Self {
            notifier,
            permits: Arc::new(Semaphore::new(limit.max(1))),
        }
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Spawn `task` on the runtime
    ///
    /// `context` identifies the entities involved and is forwarded to the
    /// notifier, with an `error` field added, if the task fails.
    pub fn submit<F>(&self, name: &'static str, context: Value, task: F) -> JoinHandle<()>
    where
        F: Future<Output = AppResult<()>> + Send + 'static,
    {
        let notifier = Arc::clone(&self.notifier);
        let permits = Arc::clone(&self.permits);

        tokio::spawn(async move {
            // The semaphore is never closed, so acquiring only waits
            let _permit = permits.acquire_owned().await.ok();
            debug!(task = name, context = %context, "Background task started");

            match task.await {
                Ok(()) => {
                    notifier.info(&format!("{} completed", name));
                }
                Err(e) => {
                    error!(task = name, context = %context, "Background task failed: {}", e);

                    let mut context = context;
                    match context.as_object_mut() {
                        Some(fields) => {
                            fields.insert("error".to_string(), json!(e.to_string()));
                        }
                        None => context = json!({ "context": context, "error": e.to_string() }),
                    }
                    notifier.error(&format!("Error in {}", name), context);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::RecordingNotifier;
    use charge_core::AppError;

    #[tokio::test]
    async fn test_failure_is_forwarded_with_context() {
        let notifier = Arc::new(RecordingNotifier::new());
        let runner = TaskRunner::new(notifier.clone(), 2);

        runner
            .submit("delete_invoice", json!({ "invoiceId": "i-1" }), async {
                Err(AppError::Internal("boom".to_string()))
            })
            .await
            .unwrap();

        let errors = notifier.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "Error in delete_invoice");
        assert_eq!(errors[0].1["invoiceId"], "i-1");
        assert!(errors[0].1["error"].as_str().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_success_is_reported_as_info() {
        let notifier = Arc::new(RecordingNotifier::new());
        let runner = TaskRunner::new(notifier.clone(), 0);

        runner
            .submit("rebill_invoice", Value::Null, async { Ok(()) })
            .await
            .unwrap();

        assert!(notifier.errors().is_empty());
        assert_eq!(notifier.infos(), vec!["rebill_invoice completed".to_string()]);
    }
}
