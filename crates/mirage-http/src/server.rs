//! Listeners for the serving and administrative surfaces.
//!
//! Both accept loops share one shutdown signal. On shutdown they stop
//! accepting, give in-flight connections a bounded grace period, and the
//! pending expiry timers are aborted.

use crate::admin_api::route_request;
use crate::config::Settings;
use crate::service::MirageService;
use anyhow::Context;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Triggers shutdown of a running [`Mirage`].
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        // No receivers left means the server already stopped
        let _ = self.tx.send(());
    }
}

/// A bound Mirage server, ready to run.
pub struct Mirage {
    service: Arc<MirageService>,
    stub_listener: TcpListener,
    admin_listener: TcpListener,
    shutdown_tx: broadcast::Sender<()>,
    stub_shutdown: broadcast::Receiver<()>,
    admin_shutdown: broadcast::Receiver<()>,
    grace: Duration,
}

impl Mirage {
    /// Bind both listeners from process settings.
    pub async fn bind(settings: &Settings) -> anyhow::Result<Self> {
        let service = Arc::new(MirageService::new(settings.selection_resolver()?));

        let stub_addr = (settings.host.as_str(), settings.port);
        let stub_listener = TcpListener::bind(stub_addr)
            .await
            .with_context(|| format!("failed to bind {}:{}", settings.host, settings.port))?;
        let admin_addr = (settings.host.as_str(), settings.admin_port);
        let admin_listener = TcpListener::bind(admin_addr)
            .await
            .with_context(|| format!("failed to bind {}:{}", settings.host, settings.admin_port))?;

        Ok(Self::from_listeners(
            service,
            stub_listener,
            admin_listener,
            settings.shutdown_grace,
        ))
    }

    /// Wrap already-bound listeners.
    pub fn from_listeners(
        service: Arc<MirageService>,
        stub_listener: TcpListener,
        admin_listener: TcpListener,
        grace: Duration,
    ) -> Self {
        let (shutdown_tx, stub_shutdown) = broadcast::channel(1);
        let admin_shutdown = shutdown_tx.subscribe();
        Self {
            service,
            stub_listener,
            admin_listener,
            shutdown_tx,
            stub_shutdown,
            admin_shutdown,
            grace,
        }
    }

    pub fn stub_addr(&self) -> std::io::Result<SocketAddr> {
        self.stub_listener.local_addr()
    }

    pub fn admin_addr(&self) -> std::io::Result<SocketAddr> {
        self.admin_listener.local_addr()
    }

    pub fn service(&self) -> &Arc<MirageService> {
        &self.service
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Serve until the shutdown handle fires.
    pub async fn run(self) -> anyhow::Result<()> {
        let Mirage {
            service,
            stub_listener,
            admin_listener,
            shutdown_tx: _shutdown_tx,
            stub_shutdown,
            admin_shutdown,
            grace,
        } = self;

        info!("Mirage stub server listening on http://{}", stub_listener.local_addr()?);
        info!("Mirage admin API listening on http://{}", admin_listener.local_addr()?);

        let stub_service = Arc::clone(&service);
        let stub = run_accept_loop(
            stub_listener,
            "stub",
            move |req: Request<Incoming>| {
                let service = Arc::clone(&stub_service);
                async move {
                    let (parts, _body) = req.into_parts();
                    service
                        .handle(&parts.method, parts.uri.path(), &parts.headers)
                        .await
                }
            },
            stub_shutdown,
            grace,
        );

        let admin_service = Arc::clone(&service);
        let admin = run_accept_loop(
            admin_listener,
            "admin",
            move |req: Request<Incoming>| {
                let service = Arc::clone(&admin_service);
                async move { route_request(req, service).await }
            },
            admin_shutdown,
            grace,
        );

        tokio::join!(stub, admin);
        service.shutdown();
        info!("Mirage stopped");
        Ok(())
    }
}

/// Accept connections until `shutdown` fires, then drain them for at most `grace`.
pub async fn run_accept_loop<H, Fut>(
    listener: TcpListener,
    surface: &'static str,
    handler: H,
    mut shutdown: broadcast::Receiver<()>,
    grace: Duration,
) where
    H: Fn(Request<Incoming>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response<Full<Bytes>>> + Send + 'static,
{
    let graceful = GracefulShutdown::new();

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let handler = handler.clone();
                        let service = service_fn(move |req| {
                            let response = handler(req);
                            async move { Ok::<_, Infallible>(response.await) }
                        });
                        let connection = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service);
                        let connection = graceful.watch(connection);
                        tokio::spawn(async move {
                            if let Err(e) = connection.await {
                                debug!("{} connection error from {}: {}", surface, peer, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("{} accept error: {}", surface, e);
                    }
                }
            }
            _ = shutdown.recv() => {
                info!("{} listener shutting down", surface);
                break;
            }
        }
    }

    drop(listener);
    tokio::select! {
        _ = graceful.shutdown() => {
            debug!("{} connections drained", surface);
        }
        _ = tokio::time::sleep(grace) => {
            warn!("{} connections still open after {:?}, closing", surface, grace);
        }
    }
}
