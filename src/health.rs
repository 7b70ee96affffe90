//! Health checks for the triage service.
//!
//! Reports the loaded artifact and the storage connection as separate components.

use crate::service::PredictionService;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::warn;

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    /// Convert to HTTP status code.
    pub fn to_status_code(&self) -> u16 {
        match self {
            HealthStatus::Healthy => 200,
            HealthStatus::Unhealthy => 503,
        }
    }

    /// Combine two statuses (worst wins).
    pub fn combine(&self, other: &HealthStatus) -> HealthStatus {
        match (self, other) {
            (HealthStatus::Healthy, HealthStatus::Healthy) => HealthStatus::Healthy,
            _ => HealthStatus::Unhealthy,
        }
    }
}

/// Individual component health check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

impl ComponentHealth {
    pub fn healthy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Healthy,
            message: None,
            latency_ms: None,
            details: BTreeMap::new(),
        }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
            latency_ms: None,
            details: BTreeMap::new(),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency_ms = Some(latency.as_millis() as u64);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.details.insert(key.into(), value.to_string());
        self
    }
}

/// Full health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: Vec<ComponentHealth>,
    /// RFC 3339 time of the check.
    pub timestamp: String,
}

impl HealthResponse {
    pub fn new(version: impl Into<String>, start_time: Instant) -> Self {
        Self {
            status: HealthStatus::Healthy,
            version: version.into(),
            uptime_seconds: start_time.elapsed().as_secs(),
            components: Vec::new(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Add a component check; the overall status is the worst seen.
    pub fn add_component(&mut self, component: ComponentHealth) {
        self.status = self.status.combine(&component.status);
        self.components.push(component);
    }

    pub fn component(&self, name: &str) -> Option<&ComponentHealth> {
        self.components.iter().find(|c| c.name == name)
    }
}

/// Runs both component checks. Blocks on the storage mutex.
pub fn check(service: &PredictionService, start_time: Instant) -> HealthResponse {
    let mut response = HealthResponse::new(crate::VERSION, start_time);

    let summary = service.bundle().summary();
    response.add_component(
        ComponentHealth::healthy("artifact")
            .with_detail("model", &summary.model_kind)
            .with_detail("features", summary.feature_count)
            .with_detail("classes", summary.classes.join(",")),
    );

    let started = Instant::now();
    let storage = match service.ping_storage() {
        Ok(()) => ComponentHealth::healthy("storage"),
        Err(e) => {
            warn!(error = %e, "Storage health check failed");
            ComponentHealth::unhealthy("storage", "storage unavailable")
        }
    };
    response.add_component(storage.with_latency(started.elapsed()));

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactBundle;
    use crate::config::UnknownCategoryPolicy;
    use crate::error::{Result, TriageError};
    use crate::storage::{RecordBatch, RecordSink};
    use serde_json::json;
    use std::sync::Arc;

    /// Sink whose connection is gone.
    struct DownSink;

    impl RecordSink for DownSink {
        fn ensure_schema(&self) -> Result<()> {
            Ok(())
        }

        fn append(&self, batch: RecordBatch<'_>) -> Result<Vec<i64>> {
            Err(TriageError::write_failed(batch.stream().table_name(), "disk I/O error"))
        }

        fn ping(&self) -> Result<()> {
            Err(TriageError::PersistenceRead(
                "unable to open database file: /var/lib/triage/Health_Risk.db".into(),
            ))
        }
    }

    fn service(sink: Arc<dyn RecordSink>) -> PredictionService {
        let bundle = ArtifactBundle::from_value(json!({
            "model": {
                "type": "linear",
                "classes": ["high", "low"],
                "coefficients": [[1.0]],
                "intercepts": [0.0]
            },
            "encoders": {},
            "scaler": {"type": "identity"},
            "feature_order": ["age"]
        }))
        .unwrap();
        PredictionService::new(Arc::new(bundle), sink, UnknownCategoryPolicy::Missing, false)
    }

    #[test]
    fn test_check_storage_down() {
        let response = check(&service(Arc::new(DownSink)), Instant::now());

        assert_eq!(response.status, HealthStatus::Unhealthy);
        assert_eq!(response.status.to_status_code(), 503);
        assert_eq!(
            response.component("artifact").unwrap().status,
            HealthStatus::Healthy
        );

        let storage = response.component("storage").unwrap();
        assert_eq!(storage.status, HealthStatus::Unhealthy);
        assert_eq!(storage.message.as_deref(), Some("storage unavailable"));
        assert!(storage.latency_ms.is_some());
    }

    #[test]
    fn test_check_storage_up() {
        let store = crate::storage::PredictionStore::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        let response = check(&service(Arc::new(store)), Instant::now());

        assert_eq!(response.status, HealthStatus::Healthy);
        assert_eq!(response.status.to_status_code(), 200);
        assert_eq!(response.component("artifact").unwrap().details["features"], "1");
    }

    #[test]
    fn test_health_status_combine() {
        assert_eq!(
            HealthStatus::Healthy.combine(&HealthStatus::Healthy),
            HealthStatus::Healthy
        );
        assert_eq!(
            HealthStatus::Healthy.combine(&HealthStatus::Unhealthy),
            HealthStatus::Unhealthy
        );
        assert_eq!(HealthStatus::Unhealthy.to_status_code(), 503);
    }

    #[test]
    fn test_health_response_aggregation() {
        let mut response = HealthResponse::new("1.0.0", Instant::now());
        response.add_component(ComponentHealth::healthy("artifact"));
        assert_eq!(response.status, HealthStatus::Healthy);

        response.add_component(ComponentHealth::unhealthy("storage", "database is locked"));
        assert_eq!(response.status, HealthStatus::Unhealthy);
        assert_eq!(
            response.component("storage").unwrap().message.as_deref(),
            Some("database is locked")
        );
    }

    #[test]
    fn test_serialization_skips_empty() {
        let json = serde_json::to_value(ComponentHealth::healthy("storage")).unwrap();
        assert_eq!(json, serde_json::json!({"name": "storage", "status": "healthy"}));
    }
}
