//! Task runner: drives one payload through validate -> run -> stop.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use peridot_core::{JobConfig, JobId, StatusUpdate};

use crate::error::PayloadError;
use crate::payload::Payload;

const FALLBACK_ERROR: &str = "job failed without an error message";

/// Run `payload` for one job.
///
/// The runner owns `status_tx`: it sends at most one Running update and
/// exactly one terminal update, and dropping `status_tx` on return is what
/// tells the coordinator no further updates will arrive.
pub async fn run_task<P: Payload>(
    job_id: JobId,
    payload: Arc<P>,
    config: JobConfig,
    cancel: CancellationToken,
    status_tx: mpsc::Sender<StatusUpdate>,
) {
    let agent_type = payload.agent_type();

    let plan = match payload.validate(&config) {
        Ok(plan) => plan,
        Err(e) => {
            warn!(job_id = %job_id, agent = agent_type, error = %e, "Job configuration rejected");
            send_update(&job_id, &status_tx, failure_update(e)).await;
            return;
        }
    };

    if cancel.is_cancelled() {
        info!(job_id = %job_id, "Job cancelled before it started running");
        send_update(&job_id, &status_tx, failure_update(PayloadError::Cancelled)).await;
        return;
    }

    info!(job_id = %job_id, agent = agent_type, "Job running");
    send_update(&job_id, &status_tx, StatusUpdate::running()).await;

    let update = match payload.execute(plan, cancel).await {
        Ok(output) => {
            info!(job_id = %job_id, output_len = output.len(), "Job completed");
            StatusUpdate::stopped(output)
        }
        Err(e) => {
            warn!(job_id = %job_id, error = %e, "Job failed");
            failure_update(e)
        }
    };
    send_update(&job_id, &status_tx, update).await;

    debug!(job_id = %job_id, "Task runner exiting");
    drop(status_tx);
}

fn failure_update(error: PayloadError) -> StatusUpdate {
    let mut message = error.to_string();
    if message.is_empty() {
        message = FALLBACK_ERROR.to_string();
    }
    match error {
        PayloadError::Cancelled => StatusUpdate::cancelled(message),
        _ => StatusUpdate::failed(message),
    }
}

async fn send_update(job_id: &JobId, tx: &mpsc::Sender<StatusUpdate>, update: StatusUpdate) {
    if tx.send(update).await.is_err() {
        warn!(job_id = %job_id, "Failed to send status update - coordinator gone");
    }
}
