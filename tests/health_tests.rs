//! Health verification timing under a paused clock.

use std::sync::Arc;
use std::time::Duration;

use stagehand::application::health::HealthVerifier;
use stagehand::application::shutdown::shutdown_channel;
use stagehand::infrastructure::config::retry::HealthConfig;
use stagehand::testkit::probe::{refused, status, ScriptedProbe};
use stagehand::testkit::process::{process, FakeInspector};

const BASE: &str = "http://127.0.0.1:3000";
const ROOT: &str = "http://127.0.0.1:3000/";

fn verifier(probe: Arc<ScriptedProbe>) -> HealthVerifier {
    let config = HealthConfig::default();
    HealthVerifier::new(
        probe,
        Arc::new(FakeInspector::new().with_owner(3000, process(900, "gunicorn app", None))),
        config.policy(),
        config.health_path,
    )
}

#[tokio::test(start_paused = true)]
async fn refused_root_is_tried_five_times_with_linear_backoff() {
    let probe = Arc::new(ScriptedProbe::new().on("/", vec![refused()]));
    let (_tx, signal) = shutdown_channel();
    let started = tokio::time::Instant::now();

    let healthy = verifier(probe.clone()).verify(BASE, &signal).await.unwrap();
    assert!(!healthy);

    let offsets: Vec<u64> = probe
        .calls()
        .iter()
        .filter(|call| call.url == ROOT)
        .map(|call| (call.at - started).as_secs())
        .collect();
    // Sleeps of 2s, 4s, 6s and 8s between five attempts.
    assert_eq!(offsets, vec![0, 2, 6, 12, 20]);
    assert_eq!(started.elapsed(), Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn healthy_root_on_first_attempt_needs_no_sleep() {
    let probe = Arc::new(
        ScriptedProbe::new()
            .on("/", vec![status(200)])
            .on("/health", vec![status(503)]),
    );
    let (_tx, signal) = shutdown_channel();
    let started = tokio::time::Instant::now();

    assert!(verifier(probe.clone()).verify(BASE, &signal).await.unwrap());
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(probe.calls_to("/").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn auth_rejections_count_as_alive() {
    for code in [302, 401, 403] {
        let probe = Arc::new(ScriptedProbe::new().on("/", vec![status(code)]));
        let (_tx, signal) = shutdown_channel();
        assert!(
            verifier(probe).verify(BASE, &signal).await.unwrap(),
            "{code} should count as alive"
        );
    }
}
