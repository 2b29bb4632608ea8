//! Test server harness for E2E testing
//!
//! Provides `TestCoordinatorServer` for spawning real coordinator instances in
//! tests.

use coordinator_service::actors::{ActorMetrics, CoordinatorHandle};
use coordinator_service::clock::{SharedClock, SystemClock};
use coordinator_service::config::Config;
use coordinator_service::observability::HealthState;
use coordinator_service::routes::{self, AppState};
use coordinator_service::storage::{memory_factory, StorageFactory};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Bearer secret every test server is configured with.
pub const TEST_SECRET: &str = "test-coordinator-secret";

/// Overrides for a test server.
pub struct TestServerOptions {
    storage_factory: StorageFactory,
    clock: SharedClock,
    vars: HashMap<String, String>,
}

impl Default for TestServerOptions {
    fn default() -> Self {
        Self {
            storage_factory: memory_factory(),
            clock: Arc::new(SystemClock),
            vars: HashMap::from([
                ("COORDINATOR_AUTH_SECRET".to_string(), TEST_SECRET.to_string()),
                ("COORDINATOR_BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
                ("COORDINATOR_ID".to_string(), "coord-test".to_string()),
            ]),
        }
    }
}

impl TestServerOptions {
    /// Storage used for every key-space the server spawns.
    pub fn with_storage_factory(mut self, factory: StorageFactory) -> Self {
        self.storage_factory = factory;
        self
    }

    /// Clock shared by every key-space actor.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Set a `COORDINATOR_*` configuration variable.
    pub fn with_var(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name.to_string(), value.to_string());
        self
    }
}

/// Test harness for spawning the coordinator in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> Result<(), anyhow::Error> {
///     let server = TestCoordinatorServer::spawn().await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestCoordinatorServer {
    addr: SocketAddr,
    config: Config,
    coordinator: CoordinatorHandle,
    health: Arc<HealthState>,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestCoordinatorServer {
    /// Spawn a server with in-memory storage and the system clock.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(TestServerOptions::default()).await
    }

    /// Spawn a server with overrides.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Mark itself ready
    /// - Start the HTTP server in the background
    pub async fn spawn_with(options: TestServerOptions) -> Result<Self, anyhow::Error> {
        let config = Config::from_vars(&options.vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let coordinator = CoordinatorHandle::new(
            config.coordinator_settings(),
            options.storage_factory,
            options.clock,
            ActorMetrics::new(),
        );
        let health = Arc::new(HealthState::new());

        let state = Arc::new(
            AppState::new(&config, coordinator.clone(), Arc::clone(&health))
                .map_err(|e| anyhow::anyhow!("Failed to build app state: {}", e))?,
        );

        // The recorder is not installed globally, so tests can spawn as many
        // servers as they like.
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();
        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        health.set_ready();

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            coordinator,
            health,
            client: reqwest::Client::new(),
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn secret(&self) -> &'static str {
        TEST_SECRET
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle to the server's actor system.
    pub fn coordinator(&self) -> &CoordinatorHandle {
        &self.coordinator
    }

    pub fn health(&self) -> &HealthState {
        &self.health
    }

    /// Authenticated `POST /v1/actions`.
    pub async fn post_action(&self, body: &Value) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .client
            .post(format!("{}/v1/actions", self.url()))
            .bearer_auth(TEST_SECRET)
            .json(body)
            .send()
            .await?)
    }

    /// Authenticated `POST /v1/keyspaces/{keyspace}/actions`.
    pub async fn post_action_in(
        &self,
        keyspace: &str,
        body: &Value,
    ) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .client
            .post(format!("{}/v1/keyspaces/{}/actions", self.url(), keyspace))
            .bearer_auth(TEST_SECRET)
            .json(body)
            .send()
            .await?)
    }

    /// `POST /v1/actions` with a raw body and an optional bearer.
    pub async fn post_raw(
        &self,
        body: impl Into<reqwest::Body>,
        bearer: Option<&str>,
    ) -> Result<reqwest::Response, anyhow::Error> {
        let mut request = self
            .client
            .post(format!("{}/v1/actions", self.url()))
            .header("content-type", "application/json")
            .body(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }
}

impl Drop for TestCoordinatorServer {
    fn drop(&mut self) {
        // Abort the HTTP server task and stop the actors so nothing outlives
        // the test.
        self._handle.abort();
        self.coordinator.cancel();
    }
}
