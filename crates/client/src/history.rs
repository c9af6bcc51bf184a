//! In-memory record of endpoint calls made on behalf of a tracked execution.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// One recorded endpoint call.
#[derive(Debug, Clone, Serialize)]
pub struct CallRecord {
    pub endpoint: String,
    pub method: String,
    pub request: Value,
    pub response: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

/// Shared, clearable log of calls issued by a tracker, newest first.
#[derive(Debug, Clone, Default)]
pub struct CallHistory {
    entries: Arc<Mutex<Vec<CallRecord>>>,
}

impl CallHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, endpoint: &str, method: &str, request: Value, response: Option<Value>) {
        let record = CallRecord {
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            request,
            response,
            timestamp: Utc::now(),
        };

        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(0, record);
        }
    }

    /// Snapshot of recorded calls, newest first.
    pub fn entries(&self) -> Vec<CallRecord> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
