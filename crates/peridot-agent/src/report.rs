//! Report encoder: maps job state onto the two outbound message shapes.

use peridot_core::{AggregateStatus, AgentIdentity};
use peridot_proto::pb::agent_msg::Am;
use peridot_proto::pb::{AgentMsg, DescribeReport, StatusReport};

/// Build the describe report for this agent.
pub fn describe_report(identity: &AgentIdentity) -> DescribeReport {
    identity.into()
}

/// Build a status report from a snapshot of the aggregate status.
pub fn status_report(status: &AggregateStatus) -> StatusReport {
    status.into()
}

/// Wrap a describe report for the wire.
pub fn describe_msg(identity: &AgentIdentity) -> AgentMsg {
    AgentMsg {
        am: Some(Am::Describe(describe_report(identity))),
    }
}

/// Wrap a status report for the wire.
pub fn status_msg(status: &AggregateStatus) -> AgentMsg {
    AgentMsg {
        am: Some(Am::Status(status_report(status))),
    }
}
