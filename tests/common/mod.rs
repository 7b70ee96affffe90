//! Common test utilities for integration tests.

pub mod fixtures;

use serde_json::Value;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use triage::config::TriageConfig;
use triage::server::Server;
use triage::shutdown::ShutdownCoordinator;
use triage::storage::PredictionStore;

/// Temporary artifact and database locations.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub artifact_path: PathBuf,
    pub db_path: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let artifact_path = temp_dir.path().join("health_risk_complete.json");
        let db_path = temp_dir.path().join("Health_Risk.db");

        Self {
            temp_dir,
            artifact_path,
            db_path,
        }
    }

    /// Writes a bundle to the artifact path.
    pub fn write_bundle(&self, bundle: &Value) {
        std::fs::write(&self.artifact_path, bundle.to_string()).expect("Failed to write bundle");
    }

    /// Configuration pointing at this environment.
    pub fn config(&self) -> TriageConfig {
        let mut config = TriageConfig::default();
        config.server.bind_addr = "127.0.0.1:0".parse().unwrap();
        config.server.shutdown_timeout = Duration::from_secs(5);
        config.storage.path = self.db_path.clone();
        config.artifact.path = self.artifact_path.clone();
        config
    }

    /// A second connection to the test database.
    pub fn store(&self) -> PredictionStore {
        PredictionStore::open(&self.db_path).expect("Failed to open test database")
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// A server running on an ephemeral port.
pub struct TestServer {
    pub env: TestEnv,
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    coordinator: ShutdownCoordinator,
    handle: JoinHandle<triage::Result<()>>,
}

impl TestServer {
    /// Starts a server on the fixture bundle.
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Starts a server on the fixture bundle after adjusting the configuration.
    pub async fn start_with(adjust: impl FnOnce(&mut TriageConfig)) -> Self {
        let env = TestEnv::new();
        env.write_bundle(&fixtures::bundle());

        let mut config = env.config();
        adjust(&mut config);

        let server = Server::initialize(&config).expect("Failed to initialize server");
        let listener = tokio::net::TcpListener::bind(config.server.bind_addr)
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().unwrap();

        let coordinator = ShutdownCoordinator::with_timeout(config.server.shutdown_timeout);
        let handle = tokio::spawn(server.serve(listener, coordinator.clone()));

        assert!(
            wait_for_server(&addr.to_string(), 5).await,
            "server did not become ready"
        );

        Self {
            env,
            addr,
            client: reqwest::Client::new(),
            coordinator,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Posts a JSON body to `/predict`.
    pub async fn predict(&self, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url("/predict"))
            .json(body)
            .send()
            .await
            .expect("request failed")
    }

    /// Triggers graceful shutdown and waits for the serve loop to return.
    pub async fn stop(self) -> triage::Result<()> {
        self.coordinator.shutdown();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("server did not stop")
            .expect("server task panicked")
    }
}

/// Wait for a server to be ready by polling its health endpoint.
pub async fn wait_for_server(addr: &str, timeout_secs: u64) -> bool {
    let client = reqwest::Client::new();
    let start = std::time::Instant::now();
    let timeout = Duration::from_secs(timeout_secs);

    while start.elapsed() < timeout {
        if let Ok(response) = client.get(format!("http://{}/health", addr)).send().await {
            if response.status().is_success() {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
