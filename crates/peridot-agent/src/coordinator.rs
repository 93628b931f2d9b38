//! Job coordinator: the per-stream state machine.
//!
//! One coordinator runs per controller stream. It spawns the receiver and
//! sender, spawns the task runner on Start, and is the only place where the
//! aggregate job status is mutated.
//!
//! Channel ownership:
//! - requests (receiver -> coordinator): the receiver owns the sender half.
//! - status updates (runner -> coordinator): the runner owns the sender half
//!   once spawned; until then the coordinator holds it and drops it on exit.
//! - reports (coordinator -> sender task): the coordinator owns the sender
//!   half and drops it last, after every other channel has been drained.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tracing::{debug, info, warn};

use peridot_core::{AggregateStatus, AgentIdentity, JobConfig, JobId, StatusUpdate};
use peridot_proto::pb::{AgentMsg, ControllerMsg};

use crate::messages::{InternalRequest, ReportRequest};
use crate::payload::Payload;
use crate::receiver::run_receiver;
use crate::runner::run_task;
use crate::sender::run_sender;

/// Capacity of the internal channels. One slot keeps every hand-off a
/// rendezvous as far as tokio's bounded channels allow.
const CHANNEL_CAPACITY: usize = 1;

/// Handles one controller stream from Startup to Stopped.
pub struct JobCoordinator<P: Payload> {
    job_id: JobId,
    identity: Arc<AgentIdentity>,
    payload: Arc<P>,
}

impl<P: Payload> JobCoordinator<P> {
    /// Create a coordinator for a new stream.
    pub fn new(identity: Arc<AgentIdentity>, payload: Arc<P>) -> Self {
        Self {
            job_id: JobId::generate(),
            identity,
            payload,
        }
    }

    /// The identifier used in this job's log lines.
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Run the job until the stream closes or the job stops, and every
    /// channel has been drained.
    ///
    /// `inbound` is the controller's message stream; `outbound` feeds the
    /// response stream. The response stream ends when this returns.
    pub async fn run<S>(self, inbound: S, outbound: mpsc::Sender<Result<AgentMsg, Status>>)
    where
        S: Stream<Item = Result<ControllerMsg, Status>> + Unpin + Send + 'static,
    {
        let job_id = self.job_id.clone();
        info!(job_id = %job_id, agent = %self.identity.name, "New job stream");

        let shutdown = CancellationToken::new();
        let (rpt_tx, rpt_rx) = mpsc::channel::<ReportRequest>(CHANNEL_CAPACITY);
        let (status_tx, mut status_rx) = mpsc::channel::<StatusUpdate>(CHANNEL_CAPACITY);
        let (req_tx, mut req_rx) = mpsc::channel::<InternalRequest>(CHANNEL_CAPACITY);

        // Kept only to observe the controller going away.
        let stream_closed = outbound.clone();

        let sender = tokio::spawn(run_sender(
            job_id.clone(),
            self.identity.clone(),
            rpt_rx,
            outbound,
        ));
        let receiver = tokio::spawn(run_receiver(
            job_id.clone(),
            inbound,
            req_tx,
            shutdown.clone(),
        ));

        let mut job = JobState {
            job_id: job_id.clone(),
            payload: self.payload,
            status: AggregateStatus::new(Utc::now()),
            rpt_tx,
            status_tx: Some(status_tx),
            runner: None,
            job_cancel: shutdown.child_token(),
        };
        let mut updates_open = true;

        loop {
            tokio::select! {
                _ = stream_closed.closed() => {
                    info!(job_id = %job_id, "Controller stream closed");
                    break;
                }
                update = status_rx.recv(), if updates_open => match update {
                    Some(update) => {
                        if job.apply_update(update).await {
                            info!(job_id = %job_id, health = ?job.status.health, "Job stopped");
                            break;
                        }
                    }
                    None => updates_open = false,
                },
                request = req_rx.recv() => match request {
                    Some(request) => job.handle_request(request).await,
                    None => {
                        info!(job_id = %job_id, "Controller reads closed");
                        break;
                    }
                },
            }
        }

        // Stop the receiver and ask a running payload to wrap up.
        shutdown.cancel();

        // Close the status channel if it was never handed off, otherwise wait
        // for the runner to close it. Updates that arrive meanwhile are still
        // applied and reported.
        drop(job.status_tx.take());
        if updates_open {
            while let Some(update) = status_rx.recv().await {
                job.apply_update(update).await;
            }
        }

        while let Some(request) = req_rx.recv().await {
            debug!(job_id = %job_id, request = ?request, "Ignoring request during shutdown");
        }

        if let Some(runner) = job.runner.take() {
            if let Err(e) = runner.await {
                warn!(job_id = %job_id, error = %e, "Task runner panicked");
            }
        }
        if let Err(e) = receiver.await {
            warn!(job_id = %job_id, error = %e, "Receiver panicked");
        }

        // Closing the report channel lets the sender flush what is left.
        drop(job);
        if let Err(e) = sender.await {
            warn!(job_id = %job_id, error = %e, "Sender panicked");
        }

        info!(job_id = %job_id, "Job stream finished");
    }
}

/// Mutable state of one job, touched only from the coordinator's loop.
struct JobState<P: Payload> {
    job_id: JobId,
    payload: Arc<P>,
    status: AggregateStatus,
    rpt_tx: mpsc::Sender<ReportRequest>,
    status_tx: Option<mpsc::Sender<StatusUpdate>>,
    runner: Option<JoinHandle<()>>,
    job_cancel: CancellationToken,
}

impl<P: Payload> JobState<P> {
    async fn handle_request(&mut self, request: InternalRequest) {
        match request {
            InternalRequest::Describe => self.request_report(ReportRequest::DescribeWanted).await,
            InternalRequest::Start(config) => self.start(config).await,
            InternalRequest::Status => self.report_status().await,
            InternalRequest::Cancel => self.cancel().await,
        }
    }

    async fn start(&mut self, config: JobConfig) {
        if self.runner.is_some() {
            warn!(job_id = %self.job_id, "Rejecting Start: this stream already has a job");
            self.report_status().await;
            return;
        }
        let Some(status_tx) = self.status_tx.take() else {
            warn!(job_id = %self.job_id, "Rejecting Start: status channel already closed");
            self.report_status().await;
            return;
        };

        info!(
            job_id = %self.job_id,
            code_inputs = config.code_inputs.len(),
            kvs = config.kvs.len(),
            "Starting task runner"
        );
        self.runner = Some(tokio::spawn(run_task(
            self.job_id.clone(),
            self.payload.clone(),
            config,
            self.job_cancel.clone(),
            status_tx,
        )));
    }

    async fn cancel(&mut self) {
        let active = self.runner.is_some() && !self.status.is_stopped();
        if active && !self.job_cancel.is_cancelled() {
            info!(job_id = %self.job_id, "Cancel requested");
            if let Err(e) = self.status.apply(&StatusUpdate::cancel_requested()) {
                warn!(job_id = %self.job_id, error = %e, "Failed to record cancel request");
            }
            self.job_cancel.cancel();
        } else {
            debug!(job_id = %self.job_id, "Cancel ignored: no running job");
        }
        self.report_status().await;
    }

    /// Apply an update and report it. Returns true if the job is now stopped.
    async fn apply_update(&mut self, update: StatusUpdate) -> bool {
        if let Err(e) = self.status.apply(&update) {
            warn!(job_id = %self.job_id, error = %e, "Discarding status update");
            return self.status.is_stopped();
        }
        debug!(
            job_id = %self.job_id,
            run = ?self.status.run,
            health = ?self.status.health,
            "Status updated"
        );
        self.report_status().await;
        self.status.is_stopped()
    }

    async fn report_status(&mut self) {
        self.request_report(ReportRequest::StatusWanted(self.status.clone()))
            .await;
    }

    async fn request_report(&self, request: ReportRequest) {
        if self.rpt_tx.send(request).await.is_err() {
            debug!(job_id = %self.job_id, "Sender gone, report dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use peridot_core::CodeInput;
    use peridot_proto::pb::agent_msg::Am;
    use peridot_proto::pb::controller_msg::Cm;
    use peridot_proto::pb::{
        CancelReq, DescribeReq, JobCancelStatus, JobHealthStatus, JobRunStatus, StartReq,
        StatusReport, StatusReq,
    };
    use tokio_stream::wrappers::ReceiverStream;

    use crate::error::PayloadError;
    use crate::payload::{IdSearcherPayload, NopPayload};

    /// Payload that runs until cancelled, counting how many runners it saw.
    struct BlockingPayload {
        started: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Payload for BlockingPayload {
        type Plan = ();

        fn agent_type(&self) -> &'static str {
            "blocking"
        }

        fn capabilities(&self) -> Vec<String> {
            Vec::new()
        }

        fn validate(&self, _config: &JobConfig) -> Result<(), PayloadError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn execute(&self, _plan: (), cancel: CancellationToken) -> Result<String, PayloadError> {
            cancel.cancelled().await;
            Err(PayloadError::Cancelled)
        }
    }

    struct Harness {
        wire_tx: Option<mpsc::Sender<Result<ControllerMsg, Status>>>,
        out_rx: mpsc::Receiver<Result<AgentMsg, Status>>,
        handle: JoinHandle<()>,
    }

    impl Harness {
        fn start<P: Payload>(payload: P) -> Self {
            let (wire_tx, wire_rx) = mpsc::channel(8);
            let (out_tx, out_rx) = mpsc::channel(8);
            let identity = Arc::new(payload.identity("test-agent", ""));
            let coordinator = JobCoordinator::new(identity, Arc::new(payload));
            let handle = tokio::spawn(coordinator.run(ReceiverStream::new(wire_rx), out_tx));
            Self {
                wire_tx: Some(wire_tx),
                out_rx,
                handle,
            }
        }

        async fn send(&self, cm: Cm) {
            let tx = self.wire_tx.as_ref().unwrap();
            tx.send(Ok(ControllerMsg { cm: Some(cm) })).await.unwrap();
        }

        fn close_writes(&mut self) {
            self.wire_tx = None;
        }

        async fn next(&mut self) -> Option<Am> {
            self.out_rx.recv().await.map(|msg| msg.unwrap().am.unwrap())
        }

        async fn next_status(&mut self) -> StatusReport {
            match self.next().await {
                Some(Am::Status(report)) => report,
                other => panic!("Expected status report, got {:?}", other),
            }
        }

        /// Collect status reports until the stream ends.
        async fn remaining_statuses(&mut self) -> Vec<StatusReport> {
            let mut reports = Vec::new();
            while let Some(am) = self.next().await {
                if let Am::Status(report) = am {
                    reports.push(report);
                }
            }
            reports
        }

        async fn finish(self) {
            tokio::time::timeout(Duration::from_secs(5), self.handle)
                .await
                .expect("coordinator did not finish")
                .unwrap();
        }
    }

    fn start_msg(config: JobConfig) -> Cm {
        Cm::Start(StartReq {
            config: Some(config.into()),
        })
    }

    fn assert_monotonic(reports: &[StatusReport]) {
        let ranks: Vec<i32> = reports.iter().map(|r| r.run_status).collect();
        assert!(ranks.windows(2).all(|w| w[0] <= w[1]), "run status regressed: {:?}", ranks);
        let stopped = reports
            .iter()
            .filter(|r| r.run_status() == JobRunStatus::Stopped)
            .count();
        assert!(stopped <= 1, "more than one Stopped report");
    }

    #[tokio::test]
    async fn test_missing_code_inputs_fails_without_running() {
        let mut harness = Harness::start(IdSearcherPayload::default());
        harness.send(start_msg(JobConfig::new().with_spdx_output_dir("/tmp/out"))).await;

        let reports = harness.remaining_statuses().await;
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.run_status(), JobRunStatus::Stopped);
        assert_eq!(report.health_status(), JobHealthStatus::Error);
        assert_eq!(report.error_messages, "no primary codeInputs specified");
        assert!(report.output_messages.is_empty());
        assert_ne!(report.time_started, 0);
        assert_ne!(report.time_finished, 0);

        harness.finish().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_nop_job_reports_running_then_output() {
        let mut harness = Harness::start(NopPayload::default());
        let config = JobConfig::new().with_kv("a", "1").with_kv("b", "2");
        harness.send(start_msg(config)).await;

        let running = harness.next_status().await;
        assert_eq!(running.run_status(), JobRunStatus::Running);
        assert_eq!(running.time_finished, 0);

        let mut reports = vec![running];
        reports.extend(harness.remaining_statuses().await);
        assert_monotonic(&reports);

        let last = reports.last().unwrap();
        assert_eq!(last.run_status(), JobRunStatus::Stopped);
        assert_eq!(last.health_status(), JobHealthStatus::Ok);
        assert_eq!(last.output_messages, "a => 1\nb => 2");
        assert!(last.error_messages.is_empty());
        assert_ne!(last.time_finished, 0);

        harness.finish().await;
    }

    #[tokio::test]
    async fn test_status_before_start() {
        let mut harness = Harness::start(NopPayload::default());
        harness.send(Cm::Status(StatusReq {})).await;

        let report = harness.next_status().await;
        assert_eq!(report.run_status(), JobRunStatus::Startup);
        assert_eq!(report.health_status(), JobHealthStatus::Ok);
        assert_eq!(report.cancel_status(), JobCancelStatus::NoCancel);
        assert_eq!(report.time_finished, 0);

        harness.close_writes();
        assert!(harness.next().await.is_none());
        harness.finish().await;
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let started = Arc::new(AtomicUsize::new(0));
        let mut harness = Harness::start(BlockingPayload {
            started: started.clone(),
        });

        harness.send(start_msg(JobConfig::new())).await;
        harness.send(start_msg(JobConfig::new().with_kv("again", "yes"))).await;
        harness.send(Cm::Status(StatusReq {})).await;

        // Requests are handled in order, so both Starts have been seen by
        // the time the cancel is.
        harness.send(Cm::Cancel(CancelReq {})).await;
        let reports = harness.remaining_statuses().await;
        assert_monotonic(&reports);
        assert_eq!(started.load(Ordering::SeqCst), 1);

        let stopped = reports
            .iter()
            .filter(|r| r.run_status() == JobRunStatus::Stopped)
            .count();
        assert_eq!(stopped, 1);

        harness.finish().await;
    }

    #[tokio::test]
    async fn test_describe_is_identical_across_lifecycle() {
        let mut harness = Harness::start(NopPayload::new(Duration::ZERO));

        harness.send(Cm::Describe(DescribeReq {})).await;
        let first = match harness.next().await {
            Some(Am::Describe(report)) => report,
            other => panic!("Expected describe report, got {:?}", other),
        };
        assert_eq!(first.name, "test-agent");
        assert_eq!(first.r#type, "nop");

        harness.send(start_msg(JobConfig::new())).await;
        harness.send(Cm::Describe(DescribeReq {})).await;

        let mut describes = Vec::new();
        while let Some(am) = harness.next().await {
            if let Am::Describe(report) = am {
                describes.push(report);
            }
        }
        assert!(describes.iter().all(|d| *d == first));

        harness.finish().await;
    }

    #[tokio::test]
    async fn test_cancel_request_stops_job() {
        let started = Arc::new(AtomicUsize::new(0));
        let mut harness = Harness::start(BlockingPayload { started });

        harness.send(start_msg(JobConfig::new())).await;
        assert_eq!(harness.next_status().await.run_status(), JobRunStatus::Running);

        harness.send(Cm::Cancel(CancelReq {})).await;
        let reports = harness.remaining_statuses().await;
        assert_monotonic(&reports);

        let last = reports.last().unwrap();
        assert_eq!(last.run_status(), JobRunStatus::Stopped);
        assert_eq!(last.health_status(), JobHealthStatus::Error);
        assert_eq!(last.cancel_status(), JobCancelStatus::Cancelled);
        assert_eq!(last.error_messages, "job cancelled");

        harness.finish().await;
    }

    #[tokio::test]
    async fn test_terminal_report_survives_controller_half_close() {
        let started = Arc::new(AtomicUsize::new(0));
        let mut harness = Harness::start(BlockingPayload { started });

        harness.send(start_msg(JobConfig::new())).await;
        assert_eq!(harness.next_status().await.run_status(), JobRunStatus::Running);

        // Closing the controller's side cancels the job; the Stopped update
        // it produces during shutdown must still be delivered.
        harness.close_writes();
        let reports = harness.remaining_statuses().await;
        let last = reports.last().expect("terminal report was dropped");
        assert_eq!(last.run_status(), JobRunStatus::Stopped);
        assert_eq!(last.cancel_status(), JobCancelStatus::Cancelled);

        harness.finish().await;
    }

    #[tokio::test]
    async fn test_controller_gone_does_not_deadlock() {
        let started = Arc::new(AtomicUsize::new(0));
        let mut harness = Harness::start(BlockingPayload {
            started: started.clone(),
        });

        harness.send(start_msg(JobConfig::new())).await;
        assert_eq!(harness.next_status().await.run_status(), JobRunStatus::Running);

        let Harness {
            wire_tx,
            out_rx,
            handle,
        } = harness;
        drop(out_rx);

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("coordinator did not finish")
            .unwrap();
        assert_eq!(started.load(Ordering::SeqCst), 1);
        drop(wire_tx);
    }

    #[tokio::test]
    async fn test_unknown_message_is_ignored() {
        let mut harness = Harness::start(NopPayload::new(Duration::ZERO));
        let tx = harness.wire_tx.as_ref().unwrap().clone();
        tx.send(Ok(ControllerMsg { cm: None })).await.unwrap();
        harness.send(Cm::Status(StatusReq {})).await;

        let report = harness.next_status().await;
        assert_eq!(report.run_status(), JobRunStatus::Startup);

        drop(tx);
        harness.close_writes();
        assert!(harness.next().await.is_none());
        harness.finish().await;
    }

    #[tokio::test]
    async fn test_primary_input_without_paths() {
        let mut harness = Harness::start(IdSearcherPayload::default());
        let config = JobConfig::new()
            .with_code_input(CodeInput::new("primary", Vec::<String>::new()))
            .with_spdx_output_dir("/tmp/out");
        harness.send(start_msg(config)).await;

        let report = harness.next_status().await;
        assert_eq!(report.run_status(), JobRunStatus::Stopped);
        assert_eq!(
            report.error_messages,
            "no codeInput paths specified for primary source"
        );
        assert!(harness.next().await.is_none());
        harness.finish().await;
    }

    #[tokio::test]
    async fn test_primary_input_with_empty_path() {
        let mut harness = Harness::start(IdSearcherPayload::default());
        let config = JobConfig::new()
            .with_code_input(CodeInput::new("primary", [""]))
            .with_spdx_output_dir("/tmp/out");
        harness.send(start_msg(config)).await;

        // Rejected before the job is reported as running.
        let report = harness.next_status().await;
        assert_eq!(report.run_status(), JobRunStatus::Stopped);
        assert_eq!(report.health_status(), JobHealthStatus::Error);
        assert_eq!(report.error_messages, "no primary codeInputs specified");
        assert!(harness.next().await.is_none());
        harness.finish().await;
    }
}
