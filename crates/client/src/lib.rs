//! Execflow client library.
//!
//! Client-side protocol for an opaque asynchronous execution service:
//! - HTTP client with uniform response classification and fixed-delay retry
//! - Trigger payload construction with local input validation
//! - Execution tracker driving the submit → poll → terminate state machine
//! - Notification sink abstraction for surfacing transitions
//! - In-memory call history of the requests made per submission

pub mod client;
pub mod config;
pub mod error;
pub mod history;
pub mod notify;
pub mod tracker;
pub mod trigger;

pub use client::{ApiClient, ApiResponse, Method, RequestOptions};
pub use config::{ClientConfig, TrackerConfig};
pub use error::ValidationError;
pub use history::{CallHistory, CallRecord};
pub use notify::{LogSink, MemorySink, Notification, NotificationKind, NotificationSink};
pub use tracker::{ExecutionPhase, ExecutionState, ExecutionTracker};
pub use trigger::{ProcessType, TriggerPayload};
