//! Reply payload builders

use std::time::Duration;

use chrono::{DateTime, Utc};

use chat_api::{Attachment, Field, Response, ResponseType};
use platform_api::{BuildRequest, BuildStatus, Pipeline, Release};

use crate::errors::DispatchError;
use crate::format::time::{format_duration, time_ago_in_words};

/// Accent for informational attachments
pub const COLOR: &str = "#6567a5";

/// Accent for error attachments
pub const ERROR_COLOR: &str = "#f00";

/// Dashboard and account links embedded in replies
#[derive(Debug, Clone)]
pub struct Links {
    pub dashboard_url: String,
    pub github_auth_url: String,
}

impl Links {
    pub fn app_url(&self, application: &str) -> String {
        format!("{}/apps/{}", self.dashboard_url.trim_end_matches('/'), application)
    }

    pub fn pipeline_url(&self, pipeline_id: &str) -> String {
        format!(
            "{}/pipelines/{}",
            self.dashboard_url.trim_end_matches('/'),
            pipeline_id
        )
    }
}

/// Plain in-channel text reply
pub fn response_for(text: impl Into<String>) -> Response {
    Response {
        response_type: Some(ResponseType::InChannel),
        text: Some(text.into()),
        attachments: Vec::new(),
    }
}

/// In-channel reply with a single red attachment
pub fn error_response_for(text: impl Into<String>) -> Response {
    Response {
        response_type: Some(ResponseType::InChannel),
        text: None,
        attachments: vec![Attachment {
            color: Some(ERROR_COLOR.to_string()),
            ..Attachment::text(text)
        }],
    }
}

/// Points the user at the dashboard to clear a second factor
pub fn second_factor_response(links: &Links, application: &str) -> Response {
    Response {
        response_type: None,
        text: None,
        attachments: vec![Attachment::text(format!(
            "<{}|{}> requires a second factor for access.",
            links.app_url(application),
            application
        ))],
    }
}

/// Usage text for one or more commands
pub fn help_response(lines: &[String]) -> Response {
    response_for(lines.join("\n"))
}

/// Reply for an error the requester can act on; `None` for unexpected errors
pub fn domain_error_response(err: &DispatchError, links: &Links) -> Option<Response> {
    let response = match err {
        DispatchError::PipelineNotFound(_)
        | DispatchError::EnvironmentNotFound { .. }
        | DispatchError::ApplicationNotFound { .. }
        | DispatchError::Parse(_) => response_for(err.to_string()),
        DispatchError::AmbiguousApplication { .. }
        | DispatchError::Locked(_)
        | DispatchError::Conflict { .. } => error_response_for(err.to_string()),
        DispatchError::TwoFactorRequired(application) => {
            second_factor_response(links, application)
        }
        DispatchError::RepositoryNotConnected(pipeline_id) => response_for(format!(
            "<{}|Connect your pipeline to GitHub>",
            links.pipeline_url(pipeline_id)
        )),
        DispatchError::GithubNotConnected => response_for(format!(
            "You're not authenticated with GitHub yet. <{}|Fix that>.",
            links.github_auth_url
        )),
        _ => return None,
    };
    Some(response)
}

/// Announcement that a build was accepted
pub fn deploying_message(build: &BuildRequest, user_id: &str) -> Response {
    response_for(format!(
        "<@{}> is <{}|deploying> {}@{}({}) to {}.",
        user_id,
        build.dashboard_url,
        build.repository,
        build.branch,
        build.short_sha(),
        build.environment
    ))
}

/// Report for a finished build; `None` while it is still pending
pub fn deployment_complete_message(
    build: &BuildRequest,
    status: &BuildStatus,
    user_id: &str,
    elapsed: Duration,
) -> Option<Response> {
    let (url, suffix) = match status {
        BuildStatus::Pending => return None,
        BuildStatus::Succeeded { target_url } => (target_url, "was successful"),
        BuildStatus::Failed { target_url } => (target_url, "failed"),
    };

    Some(response_for(format!(
        "<@{}>'s <{}|{}> deployment of {}@{}({}) {}. {}",
        user_id,
        url,
        build.environment,
        build.repository,
        build.branch,
        build.short_sha(),
        suffix,
        format_duration(elapsed)
    )))
}

/// `You can deploy: a, b.`
pub fn pipeline_list_response(pipelines: &[Pipeline]) -> Response {
    let mut names: Vec<&str> = pipelines.iter().map(|p| p.name.as_str()).collect();
    names.sort_unstable();
    response_for(format!("You can deploy: {}.", names.join(", ")))
}

/// Stages and applications of one pipeline
pub fn pipeline_info_response(pipeline: &Pipeline, links: &Links) -> Response {
    let fields = pipeline
        .environments
        .iter()
        .map(|(environment, applications)| Field {
            title: environment.clone(),
            value: applications
                .iter()
                .map(|app| app.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            short: true,
        })
        .collect();

    let repository = pipeline
        .repository
        .as_ref()
        .map(|repo| format!("{}@{}", repo.name_with_owner, repo.default_branch))
        .unwrap_or_else(|| "Not connected to GitHub".to_string());

    Response {
        response_type: Some(ResponseType::InChannel),
        text: None,
        attachments: vec![Attachment {
            text: Some(repository),
            pretext: Some(format!(
                "{} - default environment {}",
                pipeline.name, pipeline.default_environment
            )),
            fallback: Some(format!("Pipeline info for {}", pipeline.name)),
            title: Some(pipeline.name.clone()),
            title_link: Some(links.pipeline_url(&pipeline.id)),
            fields,
            color: Some(COLOR.to_string()),
        }],
    }
}

/// `Recent releases for APP` with one attachment per release
pub fn recent_releases_response(
    application: &str,
    releases: &[Release],
    now: DateTime<Utc>,
) -> Response {
    Response {
        response_type: Some(ResponseType::InChannel),
        text: Some(format!("Recent releases for {}", application)),
        attachments: releases
            .iter()
            .map(|release| {
                Attachment::text(format!(
                    "v{} - {} - {} - {}",
                    release.version,
                    release.description,
                    release.user.email,
                    time_ago_in_words(release.created_at, now)
                ))
            })
            .collect(),
    }
}

/// Detail card for one release
pub fn release_info_response(application: &str, release: &Release, now: DateTime<Utc>) -> Response {
    let app_url = format!("https://{}.herokuapp.com", application);
    Response {
        response_type: None,
        text: None,
        attachments: vec![Attachment {
            text: Some(release.description.clone()),
            pretext: Some(format!("{} - v{}", application, release.version)),
            fallback: Some(format!(
                "Heroku release for {} - v{}",
                application, release.version
            )),
            title: Some(app_url.clone()),
            title_link: Some(app_url),
            fields: vec![
                Field {
                    title: "By".to_string(),
                    value: release.user.email.clone(),
                    short: true,
                },
                Field {
                    title: "When".to_string(),
                    value: time_ago_in_words(release.created_at, now),
                    short: true,
                },
            ],
            color: Some(COLOR.to_string()),
        }],
    }
}
