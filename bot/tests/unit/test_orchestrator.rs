//! Deploy orchestrator tests

use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;

use deploybot::commands::parser::DEPLOY_USAGE;
use deploybot::deploy::fsm::DeployState;
use deploybot::errors::DispatchError;
use deploybot::format::response::ERROR_COLOR;
use deploybot::models::command::Command;
use deploybot::storage::commands::CommandStore;

use crate::common::{user, Harness, HUBOT_APP_ID};

#[tokio::test]
async fn test_deploy_succeeds_quietly_and_stamps_command_id() {
    let harness = Harness::new();
    let command = harness.command("deploy hubot to production").await;

    let execution = harness.orchestrator.run(&command).await.unwrap();

    assert_eq!(execution.state, DeployState::Completed);
    assert!(execution.response.is_empty());
    assert_eq!(
        serde_json::to_value(&execution.response).unwrap(),
        serde_json::json!({})
    );

    let build = execution.build.unwrap();
    assert_eq!(build.command_id, Some(command.id));
    assert_eq!(build.application_id, HUBOT_APP_ID);
    assert_eq!(build.branch, "master");
    assert_eq!(build.repository, "atmos/hubot");

    assert!(harness.stored(&command).await.processed_at.is_some());
    assert!(harness.platform.inner.locks().holder(HUBOT_APP_ID).is_some());

    let reaps = harness.queue.reaps();
    assert_eq!(reaps.len(), 1);
    assert_eq!(reaps[0].0.command_id, Some(command.id));
    assert_eq!(reaps[0].1, 0);
    assert_eq!(reaps[0].2, Duration::from_secs(10));
}

#[tokio::test]
async fn test_deploy_uses_requested_branch() {
    let harness = Harness::new();
    let command = harness.command("deploy hubot/topic to production forced").await;

    let build = harness.orchestrator.run(&command).await.unwrap().build.unwrap();
    assert_eq!(build.branch, "topic");
    assert!(build.forced);
}

#[tokio::test]
async fn test_announced_deploy_names_build() {
    let harness = Harness::with_options(false, true);
    let command = harness.command("deploy hubot").await;

    let execution = harness.orchestrator.run(&command).await.unwrap();
    let build = execution.build.unwrap();
    assert_eq!(
        execution.response.text,
        Some(format!(
            "<@U123> is <{}|deploying> atmos/hubot@master({}) to production.",
            build.dashboard_url,
            &build.sha[..7]
        ))
    );
}

#[tokio::test]
async fn test_unknown_environment_lists_available_environments() {
    let harness = Harness::new();
    let command = harness.command("deploy hubot to mars").await;

    let execution = harness.orchestrator.run(&command).await.unwrap();

    assert_eq!(execution.state, DeployState::Rejected);
    assert_eq!(
        execution.response.text.as_deref(),
        Some("Unable to find an environment called mars. Available environments: production")
    );
    assert!(harness.stored(&command).await.processed_at.is_some());
}

#[tokio::test]
async fn test_unknown_pipeline_is_rejected() {
    let harness = Harness::new();
    let command = harness.command("deploy nope to production").await;

    let execution = harness.orchestrator.run(&command).await.unwrap();
    assert_eq!(execution.state, DeployState::Rejected);
    assert_eq!(
        execution.response.text.as_deref(),
        Some("Unable to find a pipeline called nope")
    );
}

#[tokio::test]
async fn test_multiple_apps_without_hint_are_ambiguous() {
    let harness = Harness::new();
    let command = harness
        .command("deploy pipeline-with-multiple-apps to production")
        .await;

    let execution = harness.orchestrator.run(&command).await.unwrap();

    assert_eq!(execution.state, DeployState::AmbiguousRejected);
    let attachment = &execution.response.attachments[0];
    assert_eq!(
        attachment.text.as_deref(),
        Some(
            "There is more than one app in the pipeline-with-multiple-apps production stage: \
             beeper-production, beeper-production-foo. This is not supported yet."
        )
    );
    assert_eq!(attachment.color.as_deref(), Some(ERROR_COLOR));
    assert!(execution.build.is_none());
}

#[tokio::test]
async fn test_application_hint_resolves_and_submits() {
    let harness = Harness::new();
    let command = harness
        .command("deploy pipeline-with-multiple-apps to production/beeper-production-foo")
        .await;

    let execution = harness.orchestrator.run(&command).await.unwrap();

    assert_eq!(execution.state, DeployState::Completed);
    let build = execution.build.unwrap();
    assert_eq!(build.application_name, "beeper-production-foo");
    assert_eq!(build.branch, "main");
}

#[tokio::test]
async fn test_parse_failure_replies_with_usage() {
    let harness = Harness::new();
    let command = harness.command("deploy to production").await;

    let execution = harness.orchestrator.run(&command).await.unwrap();
    assert_eq!(execution.state, DeployState::Rejected);
    assert_eq!(execution.response.text.as_deref(), Some(DEPLOY_USAGE));
}

#[tokio::test]
async fn test_missing_github_token_asks_to_connect() {
    let harness = Harness::new();
    let mut command = harness.command("deploy hubot to production").await;
    command.user.github_token = None;
    harness.store.insert(command.clone()).await.unwrap();

    let execution = harness.orchestrator.run(&command).await.unwrap();
    assert_eq!(execution.state, DeployState::Rejected);
    assert_eq!(
        execution.response.text.as_deref(),
        Some("You're not authenticated with GitHub yet. <https://github.com/login/oauth/authorize|Fix that>.")
    );
}

#[tokio::test]
async fn test_unconnected_pipeline_links_to_dashboard() {
    let harness = Harness::new();
    let command = harness.command("deploy unconnected").await;

    let execution = harness.orchestrator.run(&command).await.unwrap();
    assert_eq!(execution.state, DeployState::Rejected);
    assert_eq!(
        execution.response.text.as_deref(),
        Some("<https://dashboard.heroku.com/pipelines/7d29da33|Connect your pipeline to GitHub>")
    );
}

#[tokio::test]
async fn test_locked_fresh_command_schedules_retry() {
    let harness = Harness::new();
    harness.hold_hubot_lock();
    let command = harness.command("deploy hubot to production").await;

    let execution = harness.orchestrator.run(&command).await.unwrap();

    assert_eq!(execution.state, DeployState::Retrying);
    assert!(execution.response.is_empty());
    assert_eq!(
        harness.queue.retries(),
        vec![(command.id, Duration::from_secs(2))]
    );
    assert!(harness.stored(&command).await.processed_at.is_none());
}

#[tokio::test]
async fn test_locked_expired_command_replies_locked() {
    let harness = Harness::new();
    harness.hold_hubot_lock();
    let mut command = harness.command("deploy hubot to production").await;
    command.created_at = Utc::now() - chrono::Duration::seconds(60);
    harness.store.insert(command.clone()).await.unwrap();

    let execution = harness.orchestrator.run(&command).await.unwrap();

    assert_eq!(execution.state, DeployState::Errored);
    assert!(harness.queue.retries().is_empty());
    let attachment = &execution.response.attachments[0];
    assert_eq!(
        attachment.text.as_deref(),
        Some("Someone is already deploying to hubot")
    );
    assert_eq!(attachment.color.as_deref(), Some(ERROR_COLOR));
    assert!(harness.stored(&command).await.processed_at.is_some());
}

#[tokio::test]
async fn test_processed_command_is_a_silent_noop() {
    let harness = Harness::new();
    let command = harness.command("deploy hubot to production").await;
    harness
        .store
        .mark_processed(command.id, Utc::now())
        .await
        .unwrap();

    let execution = harness.orchestrator.run(&command).await.unwrap();

    assert_eq!(execution.state, DeployState::ExpiredNoop);
    assert!(execution.response.is_empty());
    assert!(harness.platform.inner.locks().holder(HUBOT_APP_ID).is_none());
}

#[tokio::test]
async fn test_processed_at_is_set_once_across_retries() {
    let harness = Harness::new();
    harness.hold_hubot_lock();
    let command = harness.command("deploy hubot to production").await;

    for _ in 0..3 {
        let execution = harness.orchestrator.run(&command).await.unwrap();
        assert_eq!(execution.state, DeployState::Retrying);
        assert!(harness.stored(&command).await.processed_at.is_none());
    }

    harness.release_hubot_lock();
    let execution = harness.orchestrator.run(&command).await.unwrap();
    assert_eq!(execution.state, DeployState::Completed);
    let processed_at = harness.stored(&command).await.processed_at;
    assert!(processed_at.is_some());

    let execution = harness.orchestrator.run(&command).await.unwrap();
    assert_eq!(execution.state, DeployState::ExpiredNoop);
    assert_eq!(harness.stored(&command).await.processed_at, processed_at);
    assert_eq!(harness.queue.retries().len(), 3);
}

#[tokio::test]
async fn test_concurrent_attempts_reply_once() {
    let harness = Harness::with_options(false, true);
    let command = harness.command("deploy hubot to production").await;

    let attempts = (0..8).map(|_| harness.orchestrator.run(&command));
    let executions: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|execution| execution.unwrap())
        .collect();

    let completed = executions
        .iter()
        .filter(|e| e.state == DeployState::Completed)
        .count();
    assert_eq!(completed, 1);
    assert_eq!(
        executions.iter().filter(|e| !e.response.is_empty()).count(),
        1
    );
    assert!(executions.iter().all(|e| matches!(
        e.state,
        DeployState::Completed | DeployState::Retrying | DeployState::ExpiredNoop
    )));
}

#[tokio::test]
async fn test_conflict_names_repository_and_reason() {
    let harness = Harness::new();
    harness.platform.fail_submit_with(|request| DispatchError::Conflict {
        repository: request.repository.clone(),
        reason: "Conflict: Commit status checks failed for master.".to_string(),
    });
    let command = harness.command("deploy hubot to production").await;

    let execution = harness.orchestrator.run(&command).await.unwrap();

    assert_eq!(execution.state, DeployState::Errored);
    assert_eq!(
        execution.response.attachments[0].text.as_deref(),
        Some(
            "Unable to create GitHub deployments for atmos/hubot: \
             Conflict: Commit status checks failed for master."
        )
    );
    assert!(harness.sink.errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_two_factor_points_to_dashboard() {
    let harness = Harness::new();
    harness
        .platform
        .fail_submit_with(|request| DispatchError::TwoFactorRequired(request.application_name.clone()));
    let command = harness.command("deploy hubot to production 2fa").await;

    let execution = harness.orchestrator.run(&command).await.unwrap();

    assert_eq!(execution.state, DeployState::Errored);
    assert!(execution.response.response_type.is_none());
    assert_eq!(
        execution.response.attachments[0].text.as_deref(),
        Some("<https://dashboard.heroku.com/apps/hubot|hubot> requires a second factor for access.")
    );
}

#[tokio::test]
async fn test_transient_failure_is_reported_and_apologised_for() {
    let harness = Harness::new();
    harness
        .platform
        .fail_submit_with(|_| DispatchError::Transient("502 Bad Gateway".to_string()));
    let command = harness.command("deploy hubot to production").await;

    let execution = harness.orchestrator.run(&command).await.unwrap();

    assert_eq!(execution.state, DeployState::Errored);
    assert_eq!(
        execution.response.text.as_deref(),
        Some("Unable to fetch deployment info for hubot.")
    );
    assert_eq!(harness.sink.errors.lock().unwrap().len(), 1);
    assert!(harness.stored(&command).await.processed_at.is_some());
}

#[tokio::test]
async fn test_strict_mode_propagates_unexpected_errors() {
    let harness = Harness::with_options(true, false);
    harness.platform.fail_pipelines();
    let command = harness.command("deploy hubot to production").await;

    let result = harness.orchestrator.run(&command).await;

    assert!(matches!(result, Err(DispatchError::Transient(_))));
    assert!(harness.sink.errors.lock().unwrap().is_empty());
    assert!(harness.stored(&command).await.processed_at.is_none());
}

#[tokio::test]
async fn test_unstored_command_is_reported_without_deploying() {
    let harness = Harness::new();
    let command = Command::new("deploy hubot to production", "ops", "T123", user());

    let execution = harness.orchestrator.run(&command).await.unwrap();

    assert_eq!(execution.state, DeployState::Errored);
    assert!(execution.build.is_none());
    assert_eq!(
        execution.response.text.as_deref(),
        Some("Unable to fetch deployment info for hubot.")
    );
    assert_eq!(harness.sink.errors.lock().unwrap().len(), 1);
    assert!(harness.platform.inner.locks().holder(HUBOT_APP_ID).is_none());
    assert!(harness.queue.reaps().is_empty());
}

#[tokio::test]
async fn test_unstored_command_propagates_in_strict_mode() {
    let harness = Harness::with_options(true, false);
    let command = Command::new("deploy hubot to production", "ops", "T123", user());

    let result = harness.orchestrator.run(&command).await;

    assert!(matches!(result, Err(DispatchError::Internal(_))));
    assert!(harness.sink.errors.lock().unwrap().is_empty());
    assert!(harness.platform.inner.locks().holder(HUBOT_APP_ID).is_none());
}
