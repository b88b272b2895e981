// tests/dispatch_scenarios.rs
//
// End-to-end dispatch behaviour with a fake source and a fake runner, on
// Tokio's paused clock.

use std::collections::BTreeSet;
use std::path::PathBuf;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};
use tokio::time::{sleep, Duration};

use tdaemon::fs::mock::MockFileSystem;
use tdaemon::types::RunOutcome;
use tdaemon::watch::notification_paths;
use tdaemon_test_utils::builders::HarnessBuilder;
use tdaemon_test_utils::fake_runner::RunCall;
use tdaemon_test_utils::{init_tracing, with_timeout};

fn subset(apps: &[&str]) -> RunCall {
    RunCall::Subset(
        PathBuf::from("/proj"),
        apps.iter().map(|s| s.to_string()).collect(),
    )
}

fn all() -> RunCall {
    RunCall::All(PathBuf::from("/proj"))
}

#[tokio::test(start_paused = true)]
async fn single_app_change_runs_that_app() {
    init_tracing();
    let mut h = HarnessBuilder::new("/proj").app("app1").app("app2").build();
    h.coordinator.start().unwrap();

    assert!(h.source.emit("/proj/app1/models.py"));
    sleep(Duration::from_millis(1500)).await;

    assert_eq!(h.runs.calls(), vec![subset(&["app1"])]);

    let stats = with_timeout(h.coordinator.stop()).await.unwrap();
    assert_eq!(stats.runs, 1);
    assert_eq!(stats.dispatched, 1);
}

#[tokio::test(start_paused = true)]
async fn changes_in_two_apps_within_window_run_once() {
    init_tracing();
    let mut h = HarnessBuilder::new("/proj").app("app1").app("app2").build();
    h.coordinator.start().unwrap();

    h.source.emit("/proj/app1/models.py");
    sleep(Duration::from_millis(200)).await;
    h.source.emit("/proj/app2/views.py");
    sleep(Duration::from_millis(2000)).await;

    assert_eq!(h.runs.calls(), vec![subset(&["app1", "app2"])]);
    with_timeout(h.coordinator.stop()).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn change_outside_every_app_runs_everything() {
    init_tracing();
    let mut h = HarnessBuilder::new("/proj").app("app1").build();
    h.coordinator.start().unwrap();

    h.source.emit_all(["/proj/app1/models.py", "/proj/settings.py"]);
    sleep(Duration::from_millis(1500)).await;

    assert_eq!(h.runs.calls(), vec![all()]);
    with_timeout(h.coordinator.stop()).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn ignored_file_alone_runs_nothing() {
    init_tracing();
    let mut h = HarnessBuilder::new("/proj").app("app1").build();
    h.coordinator.start().unwrap();

    h.source.emit("/proj/app1/models.pyc");
    h.source.emit("/proj/.git/index");
    sleep(Duration::from_millis(3000)).await;

    assert_eq!(h.runs.call_count(), 0);
    let stats = with_timeout(h.coordinator.stop()).await.unwrap();
    assert_eq!(stats.runs, 0);
    assert_eq!(stats.ignored, 2);
}

#[tokio::test(start_paused = true)]
async fn repeated_paths_collapse_into_one_run() {
    init_tracing();
    let mut h = HarnessBuilder::new("/proj").app("app1").build();
    h.coordinator.start().unwrap();

    for _ in 0..3 {
        h.source.emit("/proj/app1/models.py");
    }
    h.source.emit("/proj/app1/tests.py");
    sleep(Duration::from_millis(1500)).await;

    assert_eq!(h.runs.calls(), vec![subset(&["app1"])]);
    let stats = with_timeout(h.coordinator.stop()).await.unwrap();
    assert_eq!(stats.dispatched, 4);
}

#[tokio::test(start_paused = true)]
async fn changes_during_a_run_wait_for_the_next_cycle() {
    init_tracing();
    let mut h = HarnessBuilder::new("/proj")
        .app("app1")
        .app("app2")
        .coalesce_ms(100)
        .run_delay_ms(5000)
        .build();
    h.coordinator.start().unwrap();

    h.source.emit("/proj/app1/models.py");
    h.runs.wait_for_calls(1).await;
    assert_eq!(h.runs.in_flight(), 1);

    h.source.emit("/proj/app2/views.py");
    sleep(Duration::from_millis(100)).await;
    h.source.emit("/proj/app1/admin.py");

    sleep(Duration::from_millis(12_000)).await;

    assert_eq!(
        h.runs.calls(),
        vec![subset(&["app1"]), subset(&["app1", "app2"])]
    );
    assert_eq!(h.runs.max_in_flight(), 1);
    with_timeout(h.coordinator.stop()).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn pause_holds_changes_until_resume() {
    init_tracing();
    let mut h = HarnessBuilder::new("/proj")
        .app("app1")
        .app("app2")
        .coalesce_ms(100)
        .build();
    h.coordinator.start().unwrap();
    h.coordinator.pause();

    h.source.emit("/proj/app1/models.py");
    sleep(Duration::from_millis(2000)).await;
    assert_eq!(h.runs.call_count(), 0);

    h.source.emit("/proj/app2/views.py");
    h.coordinator.resume();
    sleep(Duration::from_millis(1000)).await;

    assert_eq!(h.runs.calls(), vec![subset(&["app1", "app2"])]);
    with_timeout(h.coordinator.stop()).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn pause_inside_the_window_merges_the_paused_burst() {
    init_tracing();
    let mut h = HarnessBuilder::new("/proj")
        .app("app1")
        .app("app2")
        .coalesce_ms(500)
        .build();
    h.coordinator.start().unwrap();

    h.source.emit("/proj/app1/models.py");
    sleep(Duration::from_millis(100)).await;
    assert!(h.coordinator.toggle_pause());

    h.source.emit("/proj/app2/views.py");
    sleep(Duration::from_millis(3000)).await;
    assert_eq!(h.runs.call_count(), 0);

    assert!(!h.coordinator.toggle_pause());
    sleep(Duration::from_millis(100)).await;

    assert_eq!(h.runs.calls(), vec![subset(&["app1", "app2"])]);
    with_timeout(h.coordinator.stop()).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_runs_do_not_stop_later_cycles() {
    init_tracing();
    let mut h = HarnessBuilder::new("/proj").app("app1").app("app2").build();
    h.runs.push_outcome(RunOutcome::Failed(1));
    h.runs.push_error("manage.py vanished");
    h.coordinator.start().unwrap();

    for path in [
        "/proj/app1/models.py",
        "/proj/app2/views.py",
        "/proj/app1/admin.py",
    ] {
        h.source.emit(path);
        sleep(Duration::from_millis(2000)).await;
    }

    assert_eq!(
        h.runs.calls(),
        vec![subset(&["app1"]), subset(&["app2"]), subset(&["app1"])]
    );
    let stats = with_timeout(h.coordinator.stop()).await.unwrap();
    assert_eq!(stats.runs, 3);
    assert_eq!(stats.failed_runs, 1);
    assert_eq!(stats.runner_errors, 1);
}

#[tokio::test(start_paused = true)]
async fn renaming_a_temp_file_into_place_runs_only_its_app() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("/proj/app2/forms.py");

    let mut h = HarnessBuilder::new("/proj").app("app1").app("app2").build();
    h.coordinator.start().unwrap();

    let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
        .add_path(PathBuf::from("/proj/app1/forms.tmp"))
        .add_path(PathBuf::from("/proj/app2/forms.py"));
    h.source.emit_all(notification_paths(&fs, &event));
    sleep(Duration::from_millis(1500)).await;

    assert_eq!(h.runs.calls(), vec![subset(&["app2"])]);
    with_timeout(h.coordinator.stop()).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn moving_a_package_between_apps_runs_both() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("/proj/app2/pkg/a.py");
    fs.add_file("/proj/app2/pkg/b.py");

    let mut h = HarnessBuilder::new("/proj").app("app1").app("app2").build();
    h.coordinator.start().unwrap();

    let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
        .add_path(PathBuf::from("/proj/app1/pkg"))
        .add_path(PathBuf::from("/proj/app2/pkg"));
    let paths = notification_paths(&fs, &event);
    let expected: BTreeSet<PathBuf> = [
        "/proj/app1/pkg/a.py",
        "/proj/app1/pkg/b.py",
        "/proj/app2/pkg/a.py",
        "/proj/app2/pkg/b.py",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();
    assert_eq!(paths.iter().cloned().collect::<BTreeSet<_>>(), expected);

    h.source.emit_all(paths);
    sleep(Duration::from_millis(1500)).await;

    assert_eq!(h.runs.calls(), vec![subset(&["app1", "app2"])]);
    with_timeout(h.coordinator.stop()).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn ignore_globs_apply_relative_to_root() {
    init_tracing();
    let mut h = HarnessBuilder::new("/proj")
        .app("app1")
        .ignore_glob("**/migrations/**")
        .build();
    h.coordinator.start().unwrap();

    h.source.emit("/proj/app1/migrations/0002_auto.py");
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(h.runs.call_count(), 0);

    h.source.emit("/proj/app1/models.py");
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(h.runs.calls(), vec![subset(&["app1"])]);

    with_timeout(h.coordinator.stop()).await.unwrap();
}
