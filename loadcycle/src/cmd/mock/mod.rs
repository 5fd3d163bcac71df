use std::{convert::Infallible, sync::Arc, time::Duration};

use rama::{
    Layer as _, Service,
    error::{ErrorContext as _, OpaqueError},
    graceful::ShutdownGuard,
    http::{
        HeaderValue, Request, Response, StatusCode,
        layer::{required_header::AddRequiredResponseHeadersLayer, trace::TraceLayer},
        server::HttpServer,
        service::web::response::IntoResponse,
    },
    layer::TimeoutLayer,
    net::socket::Interface,
    rt::Executor,
    tcp::server::TcpListener,
    telemetry::tracing,
};

use clap::Args;

use crate::{
    config::{MockBehavior, MockConfig},
    utils,
};

#[derive(Debug, Clone, Args)]
/// run a mock target server to send load to
pub struct MockCommand {
    #[clap(flatten)]
    config: MockConfig,

    /// network interface to bind to
    #[arg(
        long,
        short = 'b',
        value_name = "INTERFACE",
        default_value = "127.0.0.1:8080"
    )]
    bind: Interface,
}

impl MockCommand {
    pub fn try_into_parts(self) -> Result<(Interface, MockBehavior), OpaqueError> {
        let behavior = self
            .config
            .try_into_behavior()
            .context("invalid mock configuration")?;
        Ok((self.bind, behavior))
    }
}

pub async fn exec(
    guard: ShutdownGuard,
    bind: Interface,
    behavior: MockBehavior,
) -> Result<(), OpaqueError> {
    let exec = Executor::graceful(guard);
    let tcp_listener = TcpListener::bind(bind, exec.clone())
        .await
        .map_err(OpaqueError::from_boxed)
        .context("bind mock http server")?;

    serve(exec, tcp_listener, behavior).await
}

/// Serve the mock target on an already bound listener.
pub(crate) async fn serve(
    exec: Executor,
    tcp_listener: TcpListener,
    behavior: MockBehavior,
) -> Result<(), OpaqueError> {
    let http_svc = (
        TraceLayer::new_for_http(),
        AddRequiredResponseHeadersLayer::new()
            .with_server_header_value(HeaderValue::from_static(utils::env::user_agent())),
    )
        .into_layer(Arc::new(MockTargetServer::new(behavior)));

    let http_server = HttpServer::auto(exec).service(Arc::new(http_svc));
    let tcp_svc = TimeoutLayer::new(Duration::from_secs(60)).into_layer(http_server);

    let server_addr = tcp_listener
        .local_addr()
        .context("get bound address for mock http server")?;
    tracing::info!(
        ?behavior,
        "mock target server listening on: http://{server_addr}/"
    );

    tcp_listener.serve(tcp_svc).await;

    Ok(())
}

#[derive(Debug)]
struct MockTargetServer {
    behavior: MockBehavior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockOutcome {
    Error,
    Ok,
}

impl MockTargetServer {
    fn new(behavior: MockBehavior) -> Self {
        Self { behavior }
    }

    fn pick_outcome(&self) -> MockOutcome {
        let r: f64 = rand::random();
        if r < self.behavior.error_rate {
            MockOutcome::Error
        } else {
            MockOutcome::Ok
        }
    }

    fn compute_delay(&self) -> Duration {
        let base = self.behavior.latency.as_secs_f64();
        let jitter = self.behavior.jitter.as_secs_f64();

        if jitter == 0.0 {
            return self.behavior.latency;
        }

        let u: f64 = rand::random();
        let delta = (u * jitter * 2.0) - jitter;

        Duration::try_from_secs_f64((base + delta).max(0.0)).unwrap_or(Duration::MAX)
    }
}

impl Service<Request> for MockTargetServer {
    type Output = Response;
    type Error = Infallible;

    async fn serve(&self, req: Request) -> Result<Self::Output, Self::Error> {
        let delay = self.compute_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        Ok(match self.pick_outcome() {
            MockOutcome::Error => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            MockOutcome::Ok => format!("{} {} ok\n", req.method(), req.uri().path()).into_response(),
        })
    }
}
