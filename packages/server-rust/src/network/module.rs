//! Network module with deferred startup lifecycle.
//!
//! Implements the deferred startup pattern: `new()` creates resources,
//! `start()` binds the TCP listener, and `serve()` starts accepting
//! connections. This separation lets the binary bind the port and report
//! it before the cache services begin taking traffic.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    clear_cache_handler, employees_handler, health_handler, job_status_handler, liveness_handler,
    readiness_handler, refresh_handler, AppState,
};
use super::middleware::{build_http_layers, track_in_flight};
use super::shutdown::ShutdownController;
use crate::progress::ProgressLog;
use crate::service::ReadPath;
use crate::storage::PageCache;
use crate::traits::JobQueue;

/// The cache services exposed over HTTP.
#[derive(Clone)]
pub struct ServiceHandles {
    pub read_path: Arc<ReadPath>,
    pub jobs: Arc<dyn JobQueue>,
    pub progress: Arc<ProgressLog>,
    pub cache: Arc<PageCache>,
    pub job_name: Arc<str>,
}

/// Manages the HTTP server lifecycle.
///
/// Follows the deferred startup pattern:
/// 1. `new()` -- allocates shared state (shutdown controller)
/// 2. `start()` -- binds TCP listener to the configured address
/// 3. `serve()` -- begins accepting connections until shutdown is signalled
pub struct NetworkModule {
    config: NetworkConfig,
    services: ServiceHandles,
    listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// Creates a new network module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, services: ServiceHandles) -> Self {
        Self {
            config,
            services,
            listener: None,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    /// Returns a shared reference to the shutdown controller.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// Routes:
    /// - `GET /employees?page=N` -- one page of employees
    /// - `POST /jobs/refresh` -- queue a cache refresh
    /// - `GET /jobs/status` -- latest refresh progress event
    /// - `DELETE /cache` -- drop all cached pages
    /// - `GET /health` -- detailed health JSON
    /// - `GET /health/live` -- Kubernetes liveness probe
    /// - `GET /health/ready` -- Kubernetes readiness probe
    pub fn build_router(&self) -> Router {
        let services = self.services.clone();
        let state = AppState {
            read_path: services.read_path,
            jobs: services.jobs,
            progress: services.progress,
            cache: services.cache,
            job_name: services.job_name,
            shutdown: Arc::clone(&self.shutdown),
            start_time: Instant::now(),
        };

        let layers = build_http_layers(&self.config);

        Router::new()
            .route("/employees", get(employees_handler))
            .route("/jobs/refresh", post(refresh_handler))
            .route("/jobs/status", get(job_status_handler))
            .route("/cache", delete(clear_cache_handler))
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .layer(axum::middleware::from_fn_with_state(
                Arc::clone(&self.shutdown),
                track_in_flight,
            ))
            .layer(layers)
            .with_state(state)
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which may differ from the configured
    /// port when port 0 is used (OS-assigned ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!(host = %self.config.host, port, "TCP listener bound");

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves requests until the shutdown future resolves.
    ///
    /// When it does, the health state moves to Draining, new work is turned
    /// away, and in-flight requests get up to `drain_timeout` to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server hits
    /// a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;
        let router = self.build_router();
        let shutdown_ctrl = self.shutdown;
        let drain_timeout = self.config.drain_timeout;

        let signal_ctrl = Arc::clone(&shutdown_ctrl);
        let signal = async move {
            shutdown.await;
            info!("shutdown signal received, draining");
            signal_ctrl.trigger_shutdown();
        };

        // Transition to Ready so readiness probes pass.
        shutdown_ctrl.set_ready();
        info!("serving HTTP");

        axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await?;

        shutdown_ctrl.trigger_shutdown();
        if shutdown_ctrl.wait_for_drain(drain_timeout).await {
            info!("all requests drained");
        } else {
            warn!(
                in_flight = shutdown_ctrl.in_flight_count(),
                "drain timeout expired with requests remaining"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::network::HealthState;
    use crate::service::REFRESH_JOB_NAME;
    use crate::testutil::{Fixture, RecordingQueue};

    fn module(fx: &Fixture, queue: Arc<RecordingQueue>) -> NetworkModule {
        let services = ServiceHandles {
            read_path: Arc::new(fx.read_path(10)),
            jobs: queue,
            progress: fx.log.clone(),
            cache: fx.cache.clone(),
            job_name: Arc::from(REFRESH_JOB_NAME),
        };
        let config = NetworkConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..NetworkConfig::default()
        };
        NetworkModule::new(config, services)
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn new_creates_module_without_binding() {
        let fx = Fixture::new(0);
        let module = module(&fx, Arc::new(RecordingQueue::default()));
        assert!(module.listener.is_none());
    }

    #[test]
    fn shutdown_controller_returns_shared_arc() {
        let fx = Fixture::new(0);
        let module = module(&fx, Arc::new(RecordingQueue::default()));
        let s1 = module.shutdown_controller();
        let s2 = module.shutdown_controller();
        assert!(Arc::ptr_eq(&s1, &s2));
    }

    #[tokio::test]
    async fn employees_route_returns_listing() {
        let fx = Fixture::new(25);
        let router = module(&fx, Arc::new(RecordingQueue::default())).build_router();

        let response = router
            .oneshot(request(Method::GET, "/employees?page=3"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["page"], 3);
        assert_eq!(json["source"], "postgresql");
        assert_eq!(json["employees"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn refresh_route_accepts_empty_post() {
        let fx = Fixture::new(0);
        let queue = Arc::new(RecordingQueue::default());
        let router = module(&fx, queue.clone()).build_router();

        let response = router
            .oneshot(request(Method::POST, "/jobs/refresh"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(queue.taken().len(), 1);
    }

    #[tokio::test]
    async fn refresh_route_parses_json_body() {
        let fx = Fixture::new(0);
        let queue = Arc::new(RecordingQueue::default());
        let router = module(&fx, queue.clone()).build_router();

        let request = Request::builder()
            .method(Method::POST)
            .uri("/jobs/refresh")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"start_after":1000}"#))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            queue.taken(),
            vec![crate::service::WarmerTask::Refresh {
                start_after: Some(1000),
                batch_size: None
            }]
        );
    }

    #[tokio::test]
    async fn delete_cache_route_returns_no_content() {
        let fx = Fixture::new(0);
        fx.cache.set_page(1, &Vec::new()).unwrap();
        let router = module(&fx, Arc::new(RecordingQueue::default())).build_router();

        let response = router
            .oneshot(request(Method::DELETE, "/cache"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(fx.cache.cached_pages().unwrap().is_empty());
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let fx = Fixture::new(0);
        let mut module = module(&fx, Arc::new(RecordingQueue::default()));
        let port = module.start().await.unwrap();
        assert!(port > 0, "OS-assigned port should be > 0");
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    async fn serve_without_start_is_an_error() {
        let fx = Fixture::new(0);
        let module = module(&fx, Arc::new(RecordingQueue::default()));
        let err = module.serve(std::future::pending::<()>()).await.unwrap_err();
        assert!(err.to_string().contains("start()"));
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown_signal() {
        let fx = Fixture::new(0);
        let mut module = module(&fx, Arc::new(RecordingQueue::default()));
        let shutdown = module.shutdown_controller();
        module.start().await.unwrap();

        module.serve(async {}).await.unwrap();

        assert_eq!(shutdown.health_state(), HealthState::Stopped);
    }
}
