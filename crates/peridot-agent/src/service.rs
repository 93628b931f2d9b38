//! Agent gRPC service and server bootstrap.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tonic::transport::Server;
use tonic::{Request, Response, Status, Streaming};
use tracing::{info, info_span, warn, Instrument};

use peridot_core::AgentIdentity;
use peridot_proto::pb::{AgentMsg, ControllerMsg};
use peridot_proto::{Agent, AgentServer};

use crate::config::Config;
use crate::coordinator::JobCoordinator;
use crate::error::ServeError;
use crate::payload::Payload;

/// Buffer between the sender task and the transport.
const OUTBOUND_BUFFER: usize = 8;

/// Agent service: one job coordinator per `NewJob` stream.
pub struct AgentServiceImpl<P: Payload> {
    identity: Arc<AgentIdentity>,
    payload: Arc<P>,
}

impl<P: Payload> AgentServiceImpl<P> {
    pub fn new(name: &str, agent_config: &str, payload: P) -> Self {
        Self {
            identity: Arc::new(payload.identity(name, agent_config)),
            payload: Arc::new(payload),
        }
    }

    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    /// Convert into a tonic server.
    pub fn into_server(self) -> AgentServer<Self> {
        AgentServer::new(self)
    }
}

#[tonic::async_trait]
impl<P: Payload> Agent for AgentServiceImpl<P> {
    type NewJobStream =
        Pin<Box<dyn tokio_stream::Stream<Item = Result<AgentMsg, Status>> + Send>>;

    async fn new_job(
        &self,
        request: Request<Streaming<ControllerMsg>>,
    ) -> Result<Response<Self::NewJobStream>, Status> {
        let inbound = request.into_inner();
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);

        let coordinator = JobCoordinator::new(self.identity.clone(), self.payload.clone());
        let span = info_span!("job", job_id = %coordinator.job_id());
        tokio::spawn(coordinator.run(inbound, tx).instrument(span));

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }
}

/// Run an agent server for `payload` until Ctrl-C.
pub async fn serve<P: Payload>(config: Config, payload: P) -> Result<(), ServeError> {
    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .map_err(|source| ServeError::InvalidAddr {
            addr: config.bind_addr.clone(),
            source,
        })?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind {
            addr: config.bind_addr.clone(),
            source,
        })?;

    let service = AgentServiceImpl::new(&config.name, &config.agent_config, payload);
    info!(
        addr = %addr,
        name = %service.identity().name,
        agent_type = %service.identity().agent_type,
        "Agent listening"
    );

    serve_with_listener(listener, service, shutdown_signal()).await?;
    info!("Agent stopped");
    Ok(())
}

/// Serve on an already bound listener until `shutdown` completes.
pub async fn serve_with_listener<P, F>(
    listener: TcpListener,
    service: AgentServiceImpl<P>,
    shutdown: F,
) -> Result<(), ServeError>
where
    P: Payload,
    F: Future<Output = ()> + Send,
{
    Server::builder()
        .add_service(service.into_server())
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
