//! Integration test: scoring new batches with a trained artifact

use dafu_anomaly::error::{DafuError, ErrorKind};
use dafu_anomaly::export::PipelineArtifact;
use dafu_anomaly::inference::{EngineState, InferenceConfig, StreamInferenceEngine};
use dafu_anomaly::pipeline::{run_scoring_job, PipelineConfig, TrainingPipeline};
use dafu_anomaly::policy::DetectionPolicy;
use polars::prelude::*;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};

fn transactions(n: usize, seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let merchants = ["grocery", "fuel", "travel", "online"];

    let id: Vec<i64> = (0..n as i64).collect();
    let amount: Vec<f64> = (0..n)
        .map(|i| {
            if i % 25 == 0 {
                rng.gen_range(2_000.0..5_000.0)
            } else {
                rng.gen_range(5.0..150.0)
            }
        })
        .collect();
    let hour: Vec<f64> = (0..n)
        .map(|i| if i % 25 == 0 { rng.gen_range(0.0..4.0) } else { rng.gen_range(8.0..22.0) })
        .collect();
    let distance: Vec<Option<f64>> = (0..n)
        .map(|i| if i % 40 == 7 { None } else { Some(rng.gen_range(0.0..30.0)) })
        .collect();
    let merchant: Vec<&str> = (0..n).map(|_| merchants[rng.gen_range(0..merchants.len())]).collect();
    let label: Vec<&str> = (0..n).map(|i| if i % 25 == 0 { "fraud" } else { "legit" }).collect();

    df!(
        "transaction_id" => &id,
        "amount" => &amount,
        "hour" => &hour,
        "distance_km" => &distance,
        "merchant" => &merchant,
        "label" => &label
    )
    .unwrap()
}

/// Ten N(0, 1) features with every tenth row drawn from N(3, 1.5)
fn fraud_dataset(n: usize, seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let inlier = Normal::new(0.0, 1.0).unwrap();
    let outlier = Normal::new(3.0, 1.5).unwrap();

    let mut columns: Vec<Column> = (0..10)
        .map(|f| {
            let values: Vec<f64> = (0..n)
                .map(|i| {
                    if i % 10 == 0 {
                        outlier.sample(&mut rng)
                    } else {
                        inlier.sample(&mut rng)
                    }
                })
                .collect();
            Column::new(format!("f{}", f).into(), values)
        })
        .collect();
    let is_fraud: Vec<i64> = (0..n).map(|i| (i % 10 == 0) as i64).collect();
    columns.push(Column::new("is_fraud".into(), is_fraud));
    DataFrame::new(columns).unwrap()
}

fn train(policy: DetectionPolicy) -> PipelineArtifact {
    let config = PipelineConfig::new()
        .with_label_column("label")
        .with_contamination_levels(vec![0.04, 0.1])
        .with_detection_policy(policy);
    TrainingPipeline::new(config)
        .run(&transactions(500, 11))
        .unwrap()
        .artifact
}

fn engine(policy: DetectionPolicy) -> StreamInferenceEngine {
    StreamInferenceEngine::from_artifact(InferenceConfig::new(), train(policy))
}

// ============================================================================
// Train/serve consistency
// ============================================================================

#[test]
fn test_saved_artifact_scores_like_in_memory() {
    let artifact = train(DetectionPolicy::Classic);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fraud.dafu");
    artifact.save(&path).unwrap();

    let in_memory = StreamInferenceEngine::from_artifact(InferenceConfig::new(), artifact);
    let from_disk = StreamInferenceEngine::load(InferenceConfig::new(), &path).unwrap();

    let batch = transactions(200, 12);
    let a = in_memory.predict(&batch, Some(0.1)).unwrap();
    let b = from_disk.predict(&batch, Some(0.1)).unwrap();
    assert_eq!(a.raw_scores(), b.raw_scores());
    assert_eq!(a.verdicts(), b.verdicts());
}

#[test]
fn test_identifier_and_label_not_required() {
    let engine = engine(DetectionPolicy::Classic);
    let full = transactions(100, 13);
    let trimmed = full.drop("transaction_id").unwrap().drop("label").unwrap();

    let a = engine.predict(&full, None).unwrap();
    let b = engine.predict(&trimmed, None).unwrap();
    assert_eq!(a.raw_scores(), b.raw_scores());
}

#[test]
fn test_missing_feature_column() {
    let engine = engine(DetectionPolicy::Classic);
    let batch = transactions(50, 14).drop("hour").unwrap();

    match engine.predict(&batch, None) {
        Err(DafuError::SchemaMismatch { missing }) => assert_eq!(missing, vec!["hour".to_string()]),
        other => panic!("expected schema mismatch, got {other:?}"),
    }
    assert_eq!(engine.stats().failed_batches, 1);
}

#[test]
fn test_unseen_category_scored_with_warning() {
    let engine = engine(DetectionPolicy::Classic);
    let batch = df!(
        "amount" => &[42.0, 3_100.0],
        "hour" => &[13.0, 2.0],
        "distance_km" => &[Some(3.5), None],
        "merchant" => &["crypto_exchange", "grocery"]
    )
    .unwrap();

    let prediction = engine.predict(&batch, None).unwrap();
    assert_eq!(prediction.results.len(), 2);
    assert_eq!(prediction.unknown_categories.len(), 1);
    assert_eq!(prediction.unknown_categories[0].column, "merchant");
    assert_eq!(prediction.unknown_categories[0].count, 1);
    assert!(!prediction.warnings.is_empty());
}

// ============================================================================
// Policies
// ============================================================================

#[test]
fn test_raw_scores_do_not_depend_on_policy() {
    let classic = engine(DetectionPolicy::Classic);
    let risk = engine(DetectionPolicy::risk_threshold(0.7).unwrap());
    let batch = transactions(150, 15);

    let a = classic.predict(&batch, Some(0.1)).unwrap();
    let b = risk.predict(&batch, Some(0.1)).unwrap();
    assert_eq!(a.raw_scores(), b.raw_scores());
    assert_eq!(a.risk_scores(), b.risk_scores());
}

#[test]
fn test_risk_scores_bounded_on_extreme_batch() {
    let engine = engine(DetectionPolicy::risk_threshold(0.5).unwrap());
    let batch = df!(
        "amount" => &[1e9, -1e9, 60.0],
        "hour" => &[100.0, -50.0, 12.0],
        "distance_km" => &[Some(1e6), Some(0.0), Some(5.0)],
        "merchant" => &["fuel", "travel", "grocery"]
    )
    .unwrap();

    let prediction = engine.predict(&batch, None).unwrap();
    for r in &prediction.results {
        assert!((0.0..=1.0).contains(&r.risk_score), "risk {}", r.risk_score);
    }
}

#[test]
fn test_lower_threshold_flags_superset() {
    let df = fraud_dataset(1000, 16);
    let risk_engine = |threshold: f64| {
        let config = PipelineConfig::new()
            .with_label_column("is_fraud")
            .with_detection_policy(DetectionPolicy::risk_threshold(threshold).unwrap());
        let artifact = TrainingPipeline::new(config).run(&df).unwrap().artifact;
        StreamInferenceEngine::from_artifact(InferenceConfig::new(), artifact)
    };
    let strict = risk_engine(0.9);
    let lenient = risk_engine(0.3);

    let s = strict.predict(&df, None).unwrap().verdicts();
    let l = lenient.predict(&df, None).unwrap().verdicts();
    assert!(s.iter().zip(&l).all(|(&strict, &lenient)| !strict || lenient));

    let flagged = |v: &[bool]| v.iter().filter(|&&x| x).count();
    assert!(
        flagged(&s) < flagged(&l),
        "0.9 flagged {}, 0.3 flagged {}",
        flagged(&s),
        flagged(&l)
    );
}

// ============================================================================
// Engine behaviour
// ============================================================================

#[test]
fn test_streaming_matches_single_batch() {
    let engine = StreamInferenceEngine::from_artifact(
        InferenceConfig::new().with_streaming(64),
        train(DetectionPolicy::Classic),
    );
    let batch = transactions(300, 17);

    let whole = engine.predict(&batch, Some(0.04)).unwrap();
    let chunks: Vec<_> = engine
        .predict_streaming(&batch, Some(0.04))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(chunks.len(), 5);
    let streamed: Vec<f64> = chunks.iter().flat_map(|c| c.raw_scores()).collect();
    assert_eq!(streamed, whole.raw_scores());
    assert_eq!(engine.stats().batches_scored, 6);
    assert_eq!(engine.stats().rows_scored, 600);
}

#[test]
fn test_concurrent_predict_on_shared_engine() {
    let engine = engine(DetectionPolicy::risk_threshold(0.5).unwrap());
    let batch = transactions(250, 22);
    let expected = engine.predict(&batch, Some(0.1)).unwrap();

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| engine.predict(&batch, Some(0.1)).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for prediction in &results {
        assert_eq!(prediction.raw_scores(), expected.raw_scores());
        assert_eq!(prediction.risk_scores(), expected.risk_scores());
        assert_eq!(prediction.verdicts(), expected.verdicts());
    }
    let stats = engine.stats();
    assert_eq!(stats.batches_scored, 9);
    assert_eq!(stats.rows_scored, 9 * 250);
}

#[test]
fn test_concurrent_preprocessing_apply() {
    let artifact = train(DetectionPolicy::Classic);
    let batch = transactions(200, 23);
    let expected = artifact.preprocessing.apply(&batch).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..6)
            .map(|_| scope.spawn(|| artifact.preprocessing.apply(&batch).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().values, expected.values);
        }
    });
}

#[test]
fn test_engine_states() {
    let empty = StreamInferenceEngine::new(InferenceConfig::new());
    assert_eq!(empty.state(), EngineState::Uninitialized);
    assert!(matches!(
        empty.predict(&transactions(10, 18), None),
        Err(DafuError::EngineNotLoaded)
    ));

    let engine = engine(DetectionPolicy::Classic);
    assert_eq!(engine.state(), EngineState::Loaded);
    engine.predict(&transactions(10, 19), None).unwrap();
    assert_eq!(engine.state(), EngineState::Ready);
    assert!(engine.is_ready());
}

#[test]
fn test_unknown_contamination_level() {
    let engine = engine(DetectionPolicy::Classic);
    let err = engine.predict(&transactions(10, 20), Some(0.33)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
}

#[test]
fn test_scoring_job_outcome() {
    let engine = engine(DetectionPolicy::Classic);
    let outcome = run_scoring_job(&engine, &transactions(40, 21), Some(0.1));
    assert!(outcome.is_success());

    let json: serde_json::Value = serde_json::from_str(&outcome.to_json().unwrap()).unwrap();
    assert_eq!(json["result"]["type"], "scoring");
    assert_eq!(json["result"]["prediction"]["summary"]["total"], 40);
}
