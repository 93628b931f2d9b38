//! No-op test agent: echoes its key/value parameters back as output.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use peridot_core::{JobConfig, KeyValue};

use crate::error::PayloadError;
use crate::payload::Payload;

/// How long the nop agent pretends to work by default.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

/// Payload that formats the job's key/value pairs after a fixed delay.
#[derive(Debug, Clone)]
pub struct NopPayload {
    delay: Duration,
}

impl NopPayload {
    /// Create a nop payload that waits `delay` before completing.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for NopPayload {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY)
    }
}

/// Format key/value pairs as `key => value` lines.
pub fn format_kvs(kvs: &[KeyValue]) -> String {
    kvs.iter()
        .map(|kv| format!("{} => {}", kv.key, kv.value))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Payload for NopPayload {
    type Plan = String;

    fn agent_type(&self) -> &'static str {
        "nop"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["nop".to_string()]
    }

    fn validate(&self, config: &JobConfig) -> Result<String, PayloadError> {
        Ok(format_kvs(&config.kvs))
    }

    async fn execute(
        &self,
        output: String,
        cancel: CancellationToken,
    ) -> Result<String, PayloadError> {
        debug!(delay = ?self.delay, "nop sleeping");
        tokio::select! {
            _ = cancel.cancelled() => Err(PayloadError::Cancelled),
            _ = tokio::time::sleep(self.delay) => Ok(output),
        }
    }
}
