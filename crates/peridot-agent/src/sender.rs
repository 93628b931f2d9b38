//! Sender: the only writer of the controller stream.

use std::sync::Arc;

use tokio::sync::mpsc;
use tonic::Status;
use tracing::{debug, warn};

use peridot_core::{AggregateStatus, AgentIdentity, JobId};
use peridot_proto::pb::AgentMsg;

use crate::error::TransportError;
use crate::messages::ReportRequest;
use crate::report;

/// Reports requested but not yet written.
///
/// Independent dirty flags rather than a queue: several status triggers that
/// arrive together collapse into the newest snapshot.
#[derive(Debug, Default)]
struct Pending {
    describe_wanted: bool,
    status_wanted: Option<AggregateStatus>,
}

impl Pending {
    fn mark(&mut self, request: ReportRequest) {
        match request {
            ReportRequest::DescribeWanted => self.describe_wanted = true,
            ReportRequest::StatusWanted(status) => self.status_wanted = Some(status),
        }
    }
}

/// Write reports until the coordinator closes the report channel or a write
/// fails.
///
/// `recv` keeps yielding requests that were queued before the channel was
/// closed, so every report in flight at shutdown is still written. A write
/// failure is terminal; dropping `rpt_rx` then makes further coordinator
/// sends fail fast instead of blocking.
pub async fn run_sender(
    job_id: JobId,
    identity: Arc<AgentIdentity>,
    mut rpt_rx: mpsc::Receiver<ReportRequest>,
    outbound: mpsc::Sender<Result<AgentMsg, Status>>,
) {
    let mut pending = Pending::default();

    while let Some(request) = rpt_rx.recv().await {
        pending.mark(request);
        while let Ok(request) = rpt_rx.try_recv() {
            pending.mark(request);
        }

        if let Err(e) = flush(&job_id, &identity, &mut pending, &outbound).await {
            warn!(job_id = %job_id, error = %e, "Failed to send report, sender stopping");
            break;
        }
    }

    debug!(job_id = %job_id, "Sender exiting");
}

async fn flush(
    job_id: &JobId,
    identity: &AgentIdentity,
    pending: &mut Pending,
    outbound: &mpsc::Sender<Result<AgentMsg, Status>>,
) -> Result<(), TransportError> {
    if std::mem::take(&mut pending.describe_wanted) {
        debug!(job_id = %job_id, "Sending describe report");
        write(outbound, report::describe_msg(identity)).await?;
    }
    if let Some(status) = pending.status_wanted.take() {
        debug!(
            job_id = %job_id,
            run = ?status.run,
            health = ?status.health,
            "Sending status report"
        );
        write(outbound, report::status_msg(&status)).await?;
    }
    Ok(())
}

async fn write(
    outbound: &mpsc::Sender<Result<AgentMsg, Status>>,
    msg: AgentMsg,
) -> Result<(), TransportError> {
    outbound
        .send(Ok(msg))
        .await
        .map_err(|_| TransportError::Closed)
}
