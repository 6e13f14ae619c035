//! Notifier implementations

use charge_core::traits::Notifier;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{error, info};

/// Notifier that writes to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn info(&self, message: &str) {
        info!(target: "charge::notifier", "{}", message);
    }

    fn error(&self, message: &str, context: Value) {
        error!(target: "charge::notifier", context = %context, "{}", message);
    }
}

/// Notifier that keeps every message in memory
///
/// Useful wherever a caller needs to inspect what background work reported.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    infos: Mutex<Vec<String>>,
    errors: Mutex<Vec<(String, Value)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn infos(&self) -> Vec<String> {
        self.infos.lock().clone()
    }

    pub fn errors(&self) -> Vec<(String, Value)> {
        self.errors.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn info(&self, message: &str) {
        self.infos.lock().push(message.to_string());
    }

    fn error(&self, message: &str, context: Value) {
        self.errors.lock().push((message.to_string(), context));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recording_notifier_keeps_messages() {
        let notifier = RecordingNotifier::new();
        notifier.info("done");
        notifier.error("failed", json!({ "billRunId": "abc" }));

        assert_eq!(notifier.infos(), vec!["done".to_string()]);
        let errors = notifier.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].1["billRunId"], "abc");
    }
}
