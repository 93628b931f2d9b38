//! Messages exchanged between the tasks of one job.

use peridot_core::{AggregateStatus, JobConfig};

/// A controller request, as translated by the receiver.
#[derive(Debug, Clone, PartialEq)]
pub enum InternalRequest {
    Describe,
    Start(JobConfig),
    Status,
    Cancel,
}

/// A report the coordinator wants the sender to write.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportRequest {
    DescribeWanted,
    StatusWanted(AggregateStatus),
}
