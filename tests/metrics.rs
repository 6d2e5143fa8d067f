// tests/metrics.rs
use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use tower::ServiceExt;

use goal_dedup::metrics::Metrics;
use goal_dedup::{DedupConfig, DedupEngine, TeamTable};

// Single test: the Prometheus recorder is process-global.
#[tokio::test]
async fn metrics_endpoint_contains_dedup_series() {
    // engine first, recorder second: the order the service starts in
    let e = DedupEngine::new(Arc::new(TeamTable::builtin().unwrap()), DedupConfig::default());
    let metrics = Metrics::init(300).expect("install recorder");

    let now = Utc::now();
    e.classify("Arsenal [1] - 0 Chelsea - Saka 12'", "https://streamff.co/v/1", now);
    e.classify("Arsenal [1] - 0 Chelsea - B. Saka 12'", "https://streamff.co/v/2", now);
    e.classify("Match Thread: Arsenal vs Chelsea", "https://reddit.com/x", now);

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    assert!(text.contains("# HELP goal_classified_total"), "{text}");
    assert!(text.contains("# HELP goal_dedup_tier_total"), "{text}");
    assert!(text.contains(r#"verdict="novel""#), "{text}");
    assert!(text.contains(r#"verdict="duplicate""#), "{text}");
    assert!(text.contains(r#"tier="scorer""#), "{text}");
    assert!(text.contains("window_retention_secs 300"), "{text}");

    // a second recorder cannot be installed
    assert!(Metrics::init(300).is_err());
}
