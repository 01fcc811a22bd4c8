//! Retention applied after uploads and in retention-only mode.

use std::time::Duration;

use backvault_worker::runner::select_jobs;
use backvault_worker::{OneShotRunner, RetentionEngine, RetentionRunner};

use crate::helpers::{TestEnv, days};

const GREETING_JOB: &str = r#"
[[jobs]]
name = "greeting"
type = "command"
command = "echo hello"
retention = { max_keep = 2 }
"#;

#[tokio::test]
async fn test_max_keep_applies_after_upload() {
    let env = TestEnv::new(GREETING_JOB).await;
    env.seed_object("backups/greeting/20240101-000000-greeting.out", days(3));
    env.seed_object("backups/greeting/20240102-000000-greeting.out", days(2));
    env.seed_object("backups/greeting/20240103-000000-greeting.out", days(1));
    // Outside the job prefix; never touched.
    env.seed_object("backups/greeting-other/old.out", days(30));

    let runner = OneShotRunner::new(env.coordinator(), env.pipeline(false));
    let jobs = select_jobs(&env.config.jobs, None).unwrap();
    assert_eq!(runner.run(&jobs).await.ran, vec!["greeting"]);

    let keys = env.keys("backups/greeting/").await;
    assert_eq!(keys.len(), 2, "kept {keys:?}");
    assert!(keys.contains(&"backups/greeting/20240103-000000-greeting.out".to_string()));
    assert!(!keys.iter().any(|k| k.starts_with("backups/greeting/20240101")));
    assert_eq!(env.keys("backups/greeting-other/").await.len(), 1);
}

#[tokio::test]
async fn test_keep_and_age_rules_are_unioned() {
    let env = TestEnv::new(
        r#"
[defaults]
retention = { max_keep = 10 }

[[jobs]]
name = "site"
type = "command"
command = "echo hi"
retention = { max_age_days = 7 }
"#,
    )
    .await;
    env.seed_object("backups/site/fresh", Duration::from_secs(60));
    env.seed_object("backups/site/week-old", days(8));
    env.seed_object("backups/site/month-old", days(31));

    let runner = RetentionRunner::new(
        env.coordinator(),
        RetentionEngine::new(env.store.clone()),
        &env.config,
    );
    let jobs = select_jobs(&env.config.jobs, None).unwrap();
    let summary = runner.run(&jobs).await;

    assert_eq!(summary.ran, vec!["site"]);
    assert_eq!(env.keys("backups/site/").await, vec!["backups/site/fresh"]);
}

#[tokio::test]
async fn test_retention_only_dry_run_keeps_everything() {
    let env = TestEnv::new(GREETING_JOB).await;
    for (i, age) in [1, 2, 3, 4].into_iter().enumerate() {
        env.seed_object(&format!("backups/greeting/{i}.out"), days(age));
    }

    let runner = RetentionRunner::new(
        env.coordinator(),
        RetentionEngine::new(env.store.clone()),
        &env.config,
    )
    .with_dry_run(true);
    let jobs = select_jobs(&env.config.jobs, None).unwrap();
    runner.run(&jobs).await;

    assert_eq!(env.keys("backups/greeting/").await.len(), 4);
    // Retention-only mode never takes the job lock.
    assert!(!env.has_lock_files());
}

#[tokio::test]
async fn test_retention_only_skips_registered_job() {
    let env = TestEnv::new(GREETING_JOB).await;
    for (i, age) in [1, 2, 3].into_iter().enumerate() {
        env.seed_object(&format!("backups/greeting/{i}.out"), days(age));
    }
    let coordinator = env.coordinator();
    let claim = match coordinator.try_claim("greeting").await {
        backvault_worker::ClaimOutcome::Claimed(claim) => claim,
        other => panic!("expected a claim, got {other:?}"),
    };

    let runner = RetentionRunner::new(
        coordinator.clone(),
        RetentionEngine::new(env.store.clone()),
        &env.config,
    );
    let jobs = select_jobs(&env.config.jobs, None).unwrap();
    let summary = runner.run(&jobs).await;
    assert_eq!(summary.skipped, vec!["greeting"]);
    assert_eq!(env.keys("backups/greeting/").await.len(), 3);

    coordinator.release(claim).await;
    let summary = runner.run(&jobs).await;
    assert_eq!(summary.ran, vec!["greeting"]);
    assert_eq!(env.keys("backups/greeting/").await.len(), 2);
}
