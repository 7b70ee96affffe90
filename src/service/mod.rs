//! Prediction orchestration.
//!
//! One call to [`PredictionService::predict`] runs the whole request path:
//! audit the raw record, transform, score, record the result. The audit write is
//! best-effort; a failure to record the result is surfaced as
//! [`TriageError::PersistenceWrite`] on the `Predicts` stream. A record the
//! reject policy refuses is turned away before anything is written.

use crate::artifact::ArtifactBundle;
use crate::config::UnknownCategoryPolicy;
use crate::error::{Result, TriageError};
use crate::storage::{RecordBatch, RecordSink};
use crate::transform::FeatureTransformer;
use crate::types::{FeatureRecord, PredictionResult, RecordStream};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Transformer, model and sink wired together for one bundle.
#[derive(Clone)]
pub struct PredictionService {
    bundle: Arc<ArtifactBundle>,
    transformer: FeatureTransformer,
    sink: Arc<dyn RecordSink>,
    decode_target: bool,
}

impl PredictionService {
    pub fn new(
        bundle: Arc<ArtifactBundle>,
        sink: Arc<dyn RecordSink>,
        policy: UnknownCategoryPolicy,
        decode_target: bool,
    ) -> Self {
        let transformer = FeatureTransformer::new(bundle.clone(), policy);
        Self {
            bundle,
            transformer,
            sink,
            decode_target,
        }
    }

    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }

    pub fn transformer(&self) -> &FeatureTransformer {
        &self.transformer
    }

    /// Storage liveness, for health checks.
    pub fn ping_storage(&self) -> Result<()> {
        self.sink.ping()
    }

    /// Scores one record and records both the input and the outcome.
    pub fn predict(&self, record: &FeatureRecord) -> Result<PredictionResult> {
        self.transformer.check(record)?;

        if let Err(e) = self.sink.append(RecordBatch::Features(std::slice::from_ref(record))) {
            warn!(error = %e, "Failed to record submission, continuing with prediction");
        }

        let vector = self.transformer.transform(record)?;
        debug!(width = vector.len(), unmapped = vector.unmapped.len(), "Record transformed");

        let class = self.bundle.model.predict(&vector.values)?;
        let label = self.label_for(class);
        let result = PredictionResult::new(label);

        self.sink
            .append(RecordBatch::Predicts(std::slice::from_ref(&result)))
            .map_err(|e| match e {
                e @ TriageError::PersistenceWrite { .. } => e,
                other => TriageError::write_failed(RecordStream::Predicts.table_name(), other),
            })?;

        info!(prediction = %result, "Prediction served");
        Ok(result)
    }

    fn label_for(&self, class: &str) -> String {
        if self.decode_target {
            if let Some(name) = self.bundle.encoders.decode_target(class) {
                return name.to_string();
            }
        }
        class.to_string()
    }
}

impl std::fmt::Debug for PredictionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionService")
            .field("model", &self.bundle.model.kind())
            .field("features", &self.transformer.width())
            .field("policy", &self.transformer.policy())
            .field("decode_target", &self.decode_target)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PredictionStore;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Sink that can be told to fail one stream.
    #[derive(Default)]
    struct FlakySink {
        fail: Option<RecordStream>,
        written: Mutex<Vec<RecordStream>>,
    }

    impl FlakySink {
        fn failing(stream: RecordStream) -> Self {
            Self {
                fail: Some(stream),
                ..Default::default()
            }
        }
    }

    impl RecordSink for FlakySink {
        fn ensure_schema(&self) -> Result<()> {
            Ok(())
        }

        fn append(&self, batch: RecordBatch<'_>) -> Result<Vec<i64>> {
            let stream = batch.stream();
            if self.fail == Some(stream) {
                return Err(TriageError::write_failed(stream.table_name(), "disk I/O error"));
            }
            self.written.lock().push(stream);
            Ok(vec![1])
        }

        fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    fn bundle() -> Arc<ArtifactBundle> {
        // age decides: older than 50 is "1" (high), else "0" (low)
        let value = json!({
            "model": {
                "type": "linear",
                "classes": [0, 1],
                "coefficients": [[1.0, 0.0, 0.0]],
                "intercepts": [-50.0]
            },
            "encoders": {
                "exercise": {"low": 0, "regular": 1},
                "profession": {"doctor": 0, "engineer": 1},
                "target": {"high": 1, "low": 0}
            },
            "scaler": {"type": "identity"},
            "feature_order": ["age", "exercise", "profession_engineer"]
        });
        Arc::new(ArtifactBundle::from_value(value).unwrap())
    }

    fn record(age: i64) -> FeatureRecord {
        FeatureRecord {
            age,
            weight: 80,
            height: 180,
            exercise: "regular".into(),
            sleep: 7.0,
            sugar_intake: "low".into(),
            smoking: "no".into(),
            alcohol: "no".into(),
            married: "no".into(),
            profession: "engineer".into(),
            bmi: 24.7,
        }
    }

    fn service(sink: Arc<dyn RecordSink>) -> PredictionService {
        PredictionService::new(bundle(), sink, UnknownCategoryPolicy::Missing, false)
    }

    #[test]
    fn test_predict_records_both_streams() {
        let store = Arc::new(PredictionStore::open_in_memory().unwrap());
        store.ensure_schema().unwrap();
        let svc = service(store.clone());

        let result = svc.predict(&record(64)).unwrap();
        assert_eq!(result.label, "1");

        assert_eq!(store.features().unwrap()[0].record, record(64));
        assert_eq!(store.predictions().unwrap()[0].predict, "1");
    }

    #[test]
    fn test_decode_target() {
        let sink = Arc::new(FlakySink::default());
        let svc = PredictionService::new(bundle(), sink, UnknownCategoryPolicy::Missing, true);
        assert_eq!(svc.predict(&record(64)).unwrap().label, "high");
        assert_eq!(svc.predict(&record(20)).unwrap().label, "low");
    }

    #[test]
    fn test_audit_failure_still_predicts() {
        let sink = Arc::new(FlakySink::failing(RecordStream::Features));
        let svc = service(sink.clone());

        let result = svc.predict(&record(30)).unwrap();
        assert_eq!(result.label, "0");
        assert_eq!(*sink.written.lock(), vec![RecordStream::Predicts]);
    }

    #[test]
    fn test_result_failure_is_surfaced() {
        let sink = Arc::new(FlakySink::failing(RecordStream::Predicts));
        let svc = service(sink.clone());

        match svc.predict(&record(30)).unwrap_err() {
            TriageError::PersistenceWrite { stream, .. } => assert_eq!(stream, "Predicts"),
            other => panic!("expected write error, got {:?}", other),
        }
        assert_eq!(*sink.written.lock(), vec![RecordStream::Features]);
    }

    #[test]
    fn test_unknown_category_unscorable() {
        let sink = Arc::new(FlakySink::default());
        let svc = service(sink.clone());

        let mut r = record(30);
        r.exercise = "sometimes".into();
        assert!(matches!(svc.predict(&r), Err(TriageError::Scoring(_))));
        // The submission is audited before scoring; no outcome is recorded.
        assert_eq!(*sink.written.lock(), vec![RecordStream::Features]);
    }

    #[test]
    fn test_rejected_record_writes_nothing() {
        let sink = Arc::new(FlakySink::default());
        let svc = PredictionService::new(bundle(), sink.clone(), UnknownCategoryPolicy::Reject, false);

        let mut r = record(30);
        r.exercise = "sometimes".into();
        assert!(matches!(svc.predict(&r), Err(TriageError::UnknownCategory { .. })));
        assert!(sink.written.lock().is_empty());

        svc.predict(&record(30)).unwrap();
        assert_eq!(
            *sink.written.lock(),
            vec![RecordStream::Features, RecordStream::Predicts]
        );
    }

    #[test]
    fn test_unknown_category_zero_policy_scores() {
        let sink = Arc::new(FlakySink::default());
        let svc = PredictionService::new(bundle(), sink, UnknownCategoryPolicy::Zero, false);

        let mut r = record(70);
        r.exercise = "sometimes".into();
        assert_eq!(svc.predict(&r).unwrap().label, "1");
    }
}
