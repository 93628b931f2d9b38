//! Converters between proto types and domain types.

use crate::pb;
use peridot_core::{
    AggregateStatus, AgentIdentity, CancelStatus, CodeInput, HealthStatus, JobConfig, KeyValue,
    RunStatus,
};

// ============================================================================
// Status enum conversions
// ============================================================================

impl From<RunStatus> for pb::JobRunStatus {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Startup => pb::JobRunStatus::Startup,
            RunStatus::Running => pb::JobRunStatus::Running,
            RunStatus::Stopped => pb::JobRunStatus::Stopped,
        }
    }
}


impl From<HealthStatus> for pb::JobHealthStatus {
    fn from(status: HealthStatus) -> Self {
        match status {
            HealthStatus::Ok => pb::JobHealthStatus::Ok,
            HealthStatus::Error => pb::JobHealthStatus::Error,
        }
    }
}


impl From<CancelStatus> for pb::JobCancelStatus {
    fn from(status: CancelStatus) -> Self {
        match status {
            CancelStatus::NoCancel => pb::JobCancelStatus::NoCancel,
            CancelStatus::CancelRequested => pb::JobCancelStatus::CancelRequested,
            CancelStatus::Cancelled => pb::JobCancelStatus::Cancelled,
        }
    }
}


// ============================================================================
// JobConfig conversions
// ============================================================================

impl From<pb::CodeInput> for CodeInput {
    fn from(proto: pb::CodeInput) -> Self {
        CodeInput {
            source: proto.source,
            paths: proto.paths,
        }
    }
}

impl From<CodeInput> for pb::CodeInput {
    fn from(input: CodeInput) -> Self {
        pb::CodeInput {
            source: input.source,
            paths: input.paths,
        }
    }
}

impl From<pb::JobConfig> for JobConfig {
    fn from(proto: pb::JobConfig) -> Self {
        JobConfig {
            code_inputs: proto.code_inputs.into_iter().map(Into::into).collect(),
            spdx_output_dir: proto.spdx_output_dir,
            code_output_dir: proto.code_output_dir,
            kvs: proto
                .jkvs
                .into_iter()
                .map(|kv| KeyValue {
                    key: kv.key,
                    value: kv.value,
                })
                .collect(),
        }
    }
}

impl From<JobConfig> for pb::JobConfig {
    fn from(config: JobConfig) -> Self {
        pb::JobConfig {
            code_inputs: config.code_inputs.into_iter().map(Into::into).collect(),
            spdx_output_dir: config.spdx_output_dir,
            code_output_dir: config.code_output_dir,
            jkvs: config
                .kvs
                .into_iter()
                .map(|kv| pb::JobKv {
                    key: kv.key,
                    value: kv.value,
                })
                .collect(),
        }
    }
}

// ============================================================================
// Report conversions
// ============================================================================

impl From<&AgentIdentity> for pb::DescribeReport {
    fn from(identity: &AgentIdentity) -> Self {
        pb::DescribeReport {
            name: identity.name.clone(),
            r#type: identity.agent_type.clone(),
            agent_config: identity.agent_config.clone(),
            capabilities: identity.capabilities.clone(),
        }
    }
}

impl From<&AggregateStatus> for pb::StatusReport {
    fn from(status: &AggregateStatus) -> Self {
        let mut report = pb::StatusReport {
            time_started: status.started.timestamp(),
            time_finished: status.finished.map_or(0, |t| t.timestamp()),
            output_messages: status.output_messages.clone(),
            error_messages: status.error_messages.clone(),
            ..Default::default()
        };
        report.set_run_status(status.run.into());
        report.set_health_status(status.health.into());
        report.set_cancel_status(status.cancel.into());
        report
    }
}
