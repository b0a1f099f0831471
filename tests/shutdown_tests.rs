//! Teardown against a real child process.
#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use stagehand::application::launcher::{LaunchRequest, ManagedProcess, ProcessLauncher, ProcessState};
use stagehand::application::policy::HostClass;
use stagehand::application::shutdown::{ShutdownController, TeardownOutcome};
use stagehand::testkit::config::config_in;
use stagehand::testkit::release::CountingRelease;

#[tokio::test]
async fn concurrent_signals_tear_down_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.service.command = "sleep".to_string();
    config.service.args = vec!["30".to_string()];

    let process = ManagedProcess::shared();
    let controller = Arc::new(ShutdownController::new(
        process.clone(),
        Duration::from_secs(5),
    ));
    let release = Arc::new(CountingRelease::new("datastore pool"));
    controller.register_release(release.clone());

    let limits = HostClass::High.baseline();
    let pid = ProcessLauncher::new(config.service.clone())
        .launch(
            &process,
            &controller.signal(),
            LaunchRequest {
                limits: &limits,
                port: 3000,
                extra_env: &[],
            },
        )
        .await
        .unwrap();
    assert!(pid > 0);
    assert_eq!(process.lock().await.state(), ProcessState::Running);

    let (first, second) = tokio::join!(
        controller.teardown("SIGINT"),
        controller.teardown("SIGTERM")
    );
    let mut outcomes = [first, second];
    outcomes.sort_by_key(|outcome| *outcome == TeardownOutcome::AlreadyStarted);
    assert_eq!(
        outcomes,
        [TeardownOutcome::Performed, TeardownOutcome::AlreadyStarted]
    );

    controller.finished().await;
    assert_eq!(release.releases(), 1);
    let guard = process.lock().await;
    assert_eq!(guard.state(), ProcessState::Terminated);
    assert_eq!(guard.pid(), None);
}

#[tokio::test]
async fn launch_is_refused_once_shutdown_started() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.service.command = "sleep".to_string();
    config.service.args = vec!["30".to_string()];

    let process = ManagedProcess::shared();
    let controller = ShutdownController::new(process.clone(), Duration::from_secs(1));
    controller.teardown("test").await;

    let limits = HostClass::High.baseline();
    let result = ProcessLauncher::new(config.service)
        .launch(
            &process,
            &controller.signal(),
            LaunchRequest {
                limits: &limits,
                port: 3000,
                extra_env: &[],
            },
        )
        .await;
    assert!(result.is_err());
    assert_eq!(process.lock().await.state(), ProcessState::Absent);
}
