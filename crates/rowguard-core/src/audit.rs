//! Denial audit trail.
//!
//! Every denial the engine produces is recorded as one [`DenialEvent`].
//! Sinks are fire-and-forget: a sink that fails to write never changes the
//! decision that was already made.

use crate::error::Denial;
use crate::principal::Principal;
use rowguard_common::RowKey;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// One recorded denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenialEvent {
    /// Unique event ID
    pub id: String,
    /// Event timestamp (RFC 3339)
    pub time: String,
    /// Caller user id, or "none"
    pub principal: String,
    pub entity: String,
    pub operation: String,
    /// Key of the targeted row, when there was one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    pub kind: String,
    pub reason_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DenialEvent {
    pub fn from_denial(principal: &Principal, denial: &Denial, target: Option<RowKey>) -> Self {
        Self {
            id: format!("evt_denial_{}", uuid::Uuid::new_v4()),
            time: chrono::Utc::now().to_rfc3339(),
            principal: principal.to_string(),
            entity: denial.entity.as_str().to_string(),
            operation: denial.operation.as_str().to_string(),
            target: target.map(|k| k.to_string()),
            rule: denial.rule.map(str::to_string),
            kind: denial.kind.as_str().to_string(),
            reason_code: denial.reason_code.to_string(),
            detail: denial.detail.clone(),
        }
    }
}

/// Receives denial events.
pub trait DenialSink: Send + Sync {
    fn record(&self, event: &DenialEvent);
}

/// Writes each denial as a structured `warn!` on the `rowguard::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDenialSink;

impl DenialSink for TracingDenialSink {
    fn record(&self, event: &DenialEvent) {
        warn!(
            target: "rowguard::audit",
            event_id = %event.id,
            principal = %event.principal,
            entity = %event.entity,
            operation = %event.operation,
            target_row = event.target.as_deref().unwrap_or("-"),
            rule = event.rule.as_deref().unwrap_or("-"),
            kind = %event.kind,
            reason_code = %event.reason_code,
            detail = event.detail.as_deref().unwrap_or(""),
            "access denied"
        );
    }
}

/// Appends denials to a file, one JSON object per line.
pub struct FileDenialSink {
    file: Mutex<File>,
}

impl FileDenialSink {
    pub fn new(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl DenialSink for FileDenialSink {
    fn record(&self, event: &DenialEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            if let Ok(mut f) = self.file.lock() {
                let _ = writeln!(f, "{}", json);
            }
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDenialSink;

impl DenialSink for NullDenialSink {
    fn record(&self, _event: &DenialEvent) {}
}

/// Keeps events in memory (for tests and in-process inspection).
#[derive(Debug, Default)]
pub struct MemoryDenialSink {
    events: Mutex<Vec<DenialEvent>>,
}

impl MemoryDenialSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DenialEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl DenialSink for MemoryDenialSink {
    fn record(&self, event: &DenialEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Forwards each event to every inner sink, in order.
#[derive(Clone, Default)]
pub struct FanoutDenialSink {
    sinks: Vec<Arc<dyn DenialSink>>,
}

impl FanoutDenialSink {
    pub fn new(sinks: Vec<Arc<dyn DenialSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn DenialSink>) {
        self.sinks.push(sink);
    }
}

impl DenialSink for FanoutDenialSink {
    fn record(&self, event: &DenialEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}
