//! Scheduler mode end to end.

use std::time::Duration;

use tokio::sync::watch;

use backvault_worker::IntervalScheduler;

use crate::helpers::TestEnv;

async fn run_scheduler(env: &TestEnv, filter: Option<Vec<String>>, for_how_long: Duration) {
    let scheduler = IntervalScheduler::from_config(
        env.coordinator(),
        env.pipeline(false),
        &env.config.coordination,
    );
    let (tx, rx) = watch::channel(false);
    let jobs = env.config.jobs.clone();

    let handle = tokio::spawn(async move {
        scheduler.run(&jobs, filter.as_deref(), rx).await;
    });
    tokio::time::sleep(for_how_long).await;
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(15), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_scheduled_job_runs_and_cleans_up() {
    let env = TestEnv::new(
        r#"
[[jobs]]
name = "tick"
type = "command"
command = "echo tick"
every = "1s"

[[jobs]]
name = "manual"
type = "command"
command = "echo manual"
"#,
    )
    .await;

    run_scheduler(&env, None, Duration::from_millis(1500)).await;

    assert!(!env.keys("backups/tick/").await.is_empty());
    assert!(env.keys("backups/manual/").await.is_empty());
    assert!(env.registry_content().trim().is_empty());
    assert!(!env.has_lock_files());
}

#[tokio::test]
async fn test_filter_restricts_scheduled_jobs() {
    let env = TestEnv::new(
        r#"
[[jobs]]
name = "a"
type = "command"
command = "echo a"
every = 60

[[jobs]]
name = "b"
type = "command"
command = "echo b"
every = "1m"
"#,
    )
    .await;

    run_scheduler(
        &env,
        Some(vec!["b".to_string(), "unknown".to_string()]),
        Duration::from_millis(800),
    )
    .await;

    assert!(env.keys("backups/a/").await.is_empty());
    assert_eq!(env.keys("backups/b/").await.len(), 1);
}

#[tokio::test]
async fn test_failing_scheduled_job_keeps_scheduler_alive() {
    let env = TestEnv::new(
        r#"
[[jobs]]
name = "broken"
type = "command"
command = "false"
every = "1s"

[[jobs]]
name = "ok"
type = "command"
command = "echo ok"
every = "1h"
"#,
    )
    .await;

    run_scheduler(&env, None, Duration::from_millis(1500)).await;

    assert_eq!(env.keys("backups/ok/").await.len(), 1);
    assert!(env.registry_content().trim().is_empty());
    assert!(!env.has_lock_files());
}
