//! One-shot backup runs end to end.

use backvault_worker::OneShotRunner;
use backvault_worker::runner::select_jobs;

use crate::helpers::{self, TestEnv};

#[tokio::test]
async fn test_file_job_uploads_and_releases_claim() {
    let env = TestEnv::with_jobs(|root| {
        let source = root.join("app.conf");
        std::fs::write(&source, "listen = 8080\n").unwrap();
        format!(
            "[[jobs]]\nname = \"conf\"\ntype = \"file\"\nsource = \"{}\"\n",
            source.display()
        )
    })
    .await;

    let runner = OneShotRunner::new(env.coordinator(), env.pipeline(false));
    let jobs = select_jobs(&env.config.jobs, None).unwrap();
    let summary = runner.run(&jobs).await;

    assert_eq!(summary.ran, vec!["conf"]);
    let keys = env.keys("backups/conf/").await;
    assert_eq!(keys.len(), 1);
    assert!(keys[0].ends_with("-app.conf"), "unexpected key {}", keys[0]);
    assert!(env.registry_content().trim().is_empty());
    assert!(!env.has_lock_files());
}

#[tokio::test]
async fn test_command_job_output_is_uploaded() {
    let env = TestEnv::new(
        r#"
[[jobs]]
name = "greeting"
type = "command"
command = "echo hello"
prefix = "cmd"
"#,
    )
    .await;

    let runner = OneShotRunner::new(env.coordinator(), env.pipeline(false));
    let jobs = select_jobs(&env.config.jobs, None).unwrap();
    let summary = runner.run(&jobs).await;
    assert_eq!(summary.ran, vec!["greeting"]);

    let keys = env.keys("cmd/greeting/").await;
    assert_eq!(keys.len(), 1);
    assert!(keys[0].ends_with("-greeting.out"));
    let stored = std::fs::read_to_string(env.path("objects").join(helpers::BUCKET).join(&keys[0]))
        .unwrap();
    assert_eq!(stored.trim(), "hello");
}

#[tokio::test]
async fn test_dry_run_uploads_nothing() {
    let env = TestEnv::new(
        r#"
[[jobs]]
name = "greeting"
type = "command"
command = "echo hello"
"#,
    )
    .await;

    let runner = OneShotRunner::new(env.coordinator(), env.pipeline(true));
    let jobs = select_jobs(&env.config.jobs, None).unwrap();
    let summary = runner.run(&jobs).await;

    assert_eq!(summary.ran, vec!["greeting"]);
    assert!(env.keys("backups/").await.is_empty());
}

#[tokio::test]
async fn test_fresh_foreign_registration_skips_job() {
    let env = TestEnv::new(
        r#"
[[jobs]]
name = "greeting"
type = "command"
command = "echo hello"
"#,
    )
    .await;
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs_f64();
    env.write_registry(&format!("{now}|greeting|abcdef0123456789|4242|other-host\n"));

    let runner = OneShotRunner::new(env.coordinator(), env.pipeline(false));
    let jobs = select_jobs(&env.config.jobs, None).unwrap();
    let summary = runner.run(&jobs).await;

    assert_eq!(summary.skipped, vec!["greeting"]);
    assert!(env.keys("backups/").await.is_empty());
    // The other host's record is left in place.
    assert!(env.registry_content().contains("abcdef0123456789"));
}

#[tokio::test]
async fn test_stale_and_malformed_registry_lines_are_compacted() {
    let env = TestEnv::new(
        r#"
[[jobs]]
name = "greeting"
type = "command"
command = "echo hello"
"#,
    )
    .await;
    env.write_registry("1000.0|greeting|0000000000000000|1|old-host\ngarbage\n");

    let runner = OneShotRunner::new(env.coordinator(), env.pipeline(false));
    let jobs = select_jobs(&env.config.jobs, None).unwrap();
    let summary = runner.run(&jobs).await;

    assert_eq!(summary.ran, vec!["greeting"]);
    assert_eq!(env.keys("backups/greeting/").await.len(), 1);
    assert!(env.registry_content().trim().is_empty());
}

#[tokio::test]
async fn test_failing_job_releases_claim_and_continues() {
    let env = TestEnv::new(
        r#"
[[jobs]]
name = "broken"
type = "command"
command = "false"

[[jobs]]
name = "missing"
type = "file"
source = "/nonexistent/backvault/file"

[[jobs]]
name = "greeting"
type = "command"
command = "echo hello"
"#,
    )
    .await;

    let runner = OneShotRunner::new(env.coordinator(), env.pipeline(false));
    let jobs = select_jobs(&env.config.jobs, None).unwrap();
    let summary = runner.run(&jobs).await;

    assert_eq!(summary.failed, vec!["broken", "missing"]);
    assert_eq!(summary.ran, vec!["greeting"]);
    assert!(env.registry_content().trim().is_empty());
    assert!(!env.has_lock_files());
}

#[tokio::test]
async fn test_unknown_job_names_select_nothing() {
    let env = TestEnv::new(
        r#"
[[jobs]]
name = "greeting"
type = "command"
command = "echo hello"
"#,
    )
    .await;

    let names = vec!["greeting".to_string(), "nope".to_string()];
    let err = select_jobs(&env.config.jobs, Some(&names)).unwrap_err();
    assert!(err.message.contains("nope"));
}
