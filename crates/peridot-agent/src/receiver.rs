//! Receiver: the only reader of the controller stream.

use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tracing::{debug, info, warn};

use peridot_core::{JobConfig, JobId};
use peridot_proto::pb::controller_msg::Cm;
use peridot_proto::pb::ControllerMsg;

use crate::error::TransportError;
use crate::messages::InternalRequest;

/// Read controller messages until the stream ends, a read fails, or
/// `shutdown` fires.
///
/// The receiver owns `req_tx`; returning drops it, which is how the
/// coordinator learns that the controller is gone.
pub async fn run_receiver<S>(
    job_id: JobId,
    mut inbound: S,
    req_tx: mpsc::Sender<InternalRequest>,
    shutdown: CancellationToken,
) where
    S: Stream<Item = Result<ControllerMsg, Status>> + Unpin,
{
    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!(job_id = %job_id, "Receiver shutting down");
                break;
            }
            next = inbound.next() => next,
        };

        let msg = match next {
            Some(Ok(msg)) => msg,
            Some(Err(status)) => {
                let e = TransportError::Read(status);
                warn!(job_id = %job_id, error = %e, "Stream error");
                break;
            }
            None => {
                info!(job_id = %job_id, "Controller closed the stream");
                break;
            }
        };

        let Some(request) = translate(msg) else {
            debug!(job_id = %job_id, "Ignoring unrecognized controller message");
            continue;
        };
        debug!(job_id = %job_id, request = ?request, "Received controller request");

        if req_tx.send(request).await.is_err() {
            break;
        }
    }

    debug!(job_id = %job_id, "Receiver exiting");
}

/// Translate one wire message into an internal request.
///
/// Returns `None` for messages this agent does not understand, including
/// oneof variants added by newer controllers.
pub fn translate(msg: ControllerMsg) -> Option<InternalRequest> {
    match msg.cm? {
        Cm::Describe(_) => Some(InternalRequest::Describe),
        Cm::Start(start) => {
            let config = start.config.map(JobConfig::from).unwrap_or_default();
            Some(InternalRequest::Start(config))
        }
        Cm::Status(_) => Some(InternalRequest::Status),
        Cm::Cancel(_) => Some(InternalRequest::Cancel),
    }
}
