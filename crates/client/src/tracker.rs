//! Submit-and-poll protocol driver for asynchronous executions.
//!
//! One tracker drives one execution at a time: it posts a trigger request,
//! takes the `executionId` from the response, and polls the check endpoint
//! until a terminal status is observed. The tracker owns at most one poll
//! task; it is cancelled on terminal states, on re-submission, on
//! [`ExecutionTracker::cancel`], and on drop.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client::ApiClient;
use crate::config::TrackerConfig;
use crate::history::CallHistory;
use crate::notify::{Notification, NotificationSink};
use crate::trigger::TriggerPayload;

/// Lifecycle phase of the tracked execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    Idle,
    Submitting,
    Polling,
    Succeeded,
    Failed,
}

impl ExecutionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Observable state of the tracked execution.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    pub phase: ExecutionPhase,

    /// Identifier minted by the trigger endpoint, once known.
    pub execution_id: Option<String>,

    /// Output payload, once terminally successful.
    pub output: Option<Value>,

    /// Failure message, once terminally failed.
    pub error: Option<String>,
}

impl ExecutionState {
    fn idle() -> Self {
        Self {
            phase: ExecutionPhase::Idle,
            execution_id: None,
            output: None,
            error: None,
        }
    }
}

/// Result of classifying one check response against the backend vocabulary.
#[derive(Debug, Clone, PartialEq)]
enum CheckOutcome {
    Succeeded(Value),
    Failed(String),
    Pending(String),
}

fn classify_check(config: &TrackerConfig, data: &Value) -> CheckOutcome {
    let status = data.get("status").and_then(|v| v.as_str()).unwrap_or("");

    if config.success_statuses.iter().any(|s| s == status) {
        let output = config
            .output_fields
            .iter()
            .find_map(|field| data.get(field))
            .cloned()
            .unwrap_or_else(|| data.clone());
        return CheckOutcome::Succeeded(output);
    }

    if config.failure_statuses.iter().any(|s| s == status) {
        let cause = config
            .cause_fields
            .iter()
            .find_map(|field| data.get(field))
            .map(|value| match value.as_str() {
                Some(s) => s.to_string(),
                None => value.to_string(),
            })
            .unwrap_or_else(|| "Unknown error".to_string());
        return CheckOutcome::Failed(cause);
    }

    // RUNNING and anything unrecognized both mean "keep polling".
    let label = if status.is_empty() { "pending" } else { status };
    CheckOutcome::Pending(label.to_string())
}

struct TrackerInner {
    client: ApiClient,
    config: TrackerConfig,
    sink: Box<dyn NotificationSink>,
    history: CallHistory,
    state_tx: watch::Sender<ExecutionState>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl TrackerInner {
    fn state(&self) -> ExecutionState {
        self.state_tx.borrow().clone()
    }

    fn set_state(&self, state: ExecutionState) {
        self.state_tx.send_replace(state);
    }

    fn succeed(&self, output: Value) -> ExecutionState {
        let mut state = self.state();
        state.phase = ExecutionPhase::Succeeded;
        state.output = Some(output);
        self.set_state(state.clone());
        state
    }

    fn fail(&self, message: String) -> ExecutionState {
        let mut state = self.state();
        state.phase = ExecutionPhase::Failed;
        state.error = Some(message);
        self.set_state(state.clone());
        state
    }

    /// One status check: record it, classify it, apply the transition.
    /// Returns the final state once a terminal outcome is reached.
    async fn check_once(&self, execution_id: &str) -> Option<ExecutionState> {
        let path = format!("{}?executionId={}", self.config.check_path, execution_id);
        let response = self.client.get(&path).await;
        self.history
            .record(&path, "GET", Value::Null, response.data.clone());

        if !response.success {
            let message = response
                .error
                .clone()
                .unwrap_or_else(|| "Failed to check execution status".to_string());
            self.sink.publish(Notification::error(message.clone()));
            return Some(self.fail(message));
        }

        let data = response.data.unwrap_or(Value::Null);
        match classify_check(&self.config, &data) {
            CheckOutcome::Succeeded(output) => {
                self.sink
                    .publish(Notification::success("Execution completed successfully"));
                Some(self.succeed(output))
            }
            CheckOutcome::Failed(cause) => {
                let message = format!("Execution failed: {}", cause);
                self.sink.publish(Notification::error(message.clone()));
                Some(self.fail(message))
            }
            CheckOutcome::Pending(label) => {
                tracing::debug!(
                    execution_id = %execution_id,
                    status = %label,
                    "Execution still in progress"
                );
                None
            }
        }
    }
}

/// Drives the trigger → poll → terminate protocol for one execution at a time.
pub struct ExecutionTracker {
    inner: Arc<TrackerInner>,
}

impl ExecutionTracker {
    pub fn new(
        client: ApiClient,
        config: TrackerConfig,
        sink: impl NotificationSink + 'static,
    ) -> Self {
        let (state_tx, _) = watch::channel(ExecutionState::idle());

        Self {
            inner: Arc::new(TrackerInner {
                client,
                config,
                sink: Box::new(sink),
                history: CallHistory::new(),
                state_tx,
                poll_task: Mutex::new(None),
            }),
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> ExecutionState {
        self.inner.state()
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ExecutionState> {
        self.inner.state_tx.subscribe()
    }

    /// Record of endpoint calls made for the current and past submissions.
    pub fn history(&self) -> &CallHistory {
        &self.inner.history
    }

    /// Submit a trigger request and start tracking the resulting execution.
    ///
    /// Any poll task from a previous submission is cancelled first. The first
    /// status check happens immediately after a successful trigger; later
    /// checks run on the configured interval until a terminal status.
    pub async fn submit(&self, payload: TriggerPayload) -> ExecutionState {
        self.cancel();
        self.inner.set_state(ExecutionState {
            phase: ExecutionPhase::Submitting,
            execution_id: None,
            output: None,
            error: None,
        });

        let body = match serde_json::to_value(&payload) {
            Ok(body) => body,
            Err(e) => {
                let message = format!("Failed to encode trigger payload: {}", e);
                self.inner.sink.publish(Notification::error(message.clone()));
                return self.inner.fail(message);
            }
        };

        let trigger_path = self.inner.config.trigger_path.clone();
        let response = self.inner.client.post(&trigger_path, body.clone()).await;
        self.inner
            .history
            .record(&trigger_path, "POST", body, response.data.clone());

        if !response.success {
            let message = response
                .error
                .clone()
                .unwrap_or_else(|| format!("Request failed with status {}", response.status));
            self.inner.sink.publish(Notification::error(message.clone()));
            return self.inner.fail(message);
        }

        let execution_id = response
            .data
            .as_ref()
            .and_then(|d| d.get("executionId"))
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        let Some(execution_id) = execution_id else {
            // A 2xx response without an executionId is a submission failure.
            let message = "Trigger response did not include an executionId".to_string();
            self.inner.sink.publish(Notification::error(message.clone()));
            return self.inner.fail(message);
        };

        self.inner.sink.publish(Notification::success(format!(
            "Trigger initiated with ID: {}",
            execution_id
        )));
        self.inner.set_state(ExecutionState {
            phase: ExecutionPhase::Polling,
            execution_id: Some(execution_id.clone()),
            output: None,
            error: None,
        });

        // Check immediately; only schedule the poll task if still running.
        if let Some(terminal) = self.inner.check_once(&execution_id).await {
            return terminal;
        }
        self.spawn_poll_task(execution_id);

        self.state()
    }

    fn spawn_poll_task(&self, execution_id: String) {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(inner.config.poll_interval).await;
                if inner.check_once(&execution_id).await.is_some() {
                    break;
                }
            }
        });

        if let Ok(mut slot) = self.inner.poll_task.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
    }

    /// Stop any active poll task. Safe to call in any phase.
    pub fn cancel(&self) {
        if let Ok(mut slot) = self.inner.poll_task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }

    /// Wait until the current execution reaches a terminal phase.
    pub async fn wait_until_terminal(&self) -> ExecutionState {
        let mut rx = self.subscribe();
        loop {
            let state = rx.borrow_and_update().clone();
            if state.phase.is_terminal() {
                return state;
            }
            if rx.changed().await.is_err() {
                return self.state();
            }
        }
    }
}

impl Drop for ExecutionTracker {
    fn drop(&mut self) {
        self.cancel();
    }
}
