//! Engine configuration.
//!
//! ```yaml
//! lookup_timeout_ms: 2000
//! busy_timeout_ms: 5000
//! audit:
//!   sink: file
//!   path: /var/log/rowguard/denials.ndjson
//! ```

use crate::audit::{DenialSink, FileDenialSink, NullDenialSink, TracingDenialSink};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Budget for all relationship lookups of one guarded operation. The
    /// clock starts once the operation holds the write lock, so lock waits
    /// are bounded by `busy_timeout_ms` alone.
    pub lookup_timeout_ms: u64,

    /// How long a writer waits on a locked database.
    pub busy_timeout_ms: u64,

    pub audit: AuditConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookup_timeout_ms: DEFAULT_LOOKUP_TIMEOUT_MS,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            audit: AuditConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct AuditConfig {
    pub sink: AuditSinkKind,
    /// Required when `sink` is `file`.
    pub path: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    #[default]
    Tracing,
    File,
    None,
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: EngineConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.lookup_timeout_ms == 0 {
            return Err("lookup_timeout_ms must be greater than zero".to_string());
        }
        if self.busy_timeout_ms == 0 {
            return Err("busy_timeout_ms must be greater than zero".to_string());
        }
        if self.audit.sink == AuditSinkKind::File && self.audit.path.is_none() {
            return Err("audit.path is required when audit.sink is 'file'".to_string());
        }
        Ok(())
    }

    /// Create the configured denial sink.
    pub fn build_sink(&self) -> anyhow::Result<Arc<dyn DenialSink>> {
        let sink: Arc<dyn DenialSink> = match self.audit.sink {
            AuditSinkKind::Tracing => Arc::new(TracingDenialSink),
            AuditSinkKind::None => Arc::new(NullDenialSink),
            AuditSinkKind::File => {
                let path = self
                    .audit
                    .path
                    .as_deref()
                    .context("audit.path is required when audit.sink is 'file'")?;
                let sink = FileDenialSink::new(path)
                    .with_context(|| format!("failed to open audit log {}", path.display()))?;
                Arc::new(sink)
            }
        };
        Ok(sink)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Deadline for lookups started now.
    pub fn lookup_deadline(&self) -> Instant {
        Instant::now() + self.lookup_timeout()
    }
}
