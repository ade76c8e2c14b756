//! Chat command text parsing
//!
//! Deploy grammar:
//!
//! ```text
//! deploy <pipeline>[/<branch>] [to <environment>[/<application>]] [forced|!] [2fa]
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::DispatchError;

/// Usage line for the deploy command
pub const DEPLOY_USAGE: &str =
    "deploy <pipeline>[/<branch>] to <environment>[/<application>] [forced] - deploy <pipeline>";

/// Structured form of a `deploy` command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDeployRequest {
    pub pipeline_name: String,

    /// Falls back to the pipeline's default branch when absent
    pub branch: Option<String>,

    /// Falls back to the pipeline's default environment when absent
    pub environment: Option<String>,

    /// Disambiguates between several applications in one stage
    pub application: Option<String>,

    pub forced: bool,

    pub second_factor: bool,
}

/// Split the leading `task[:subtask]` word of a command.
///
/// A missing subtask is reported as `default`.
pub fn split_task(text: &str) -> (String, String) {
    let word = text.split_whitespace().next().unwrap_or_default();
    match word.split_once(':') {
        Some((task, subtask)) if !subtask.is_empty() => (task.to_string(), subtask.to_string()),
        Some((task, _)) => (task.to_string(), "default".to_string()),
        None => (word.to_string(), "default".to_string()),
    }
}

/// Parse a `deploy` command
pub fn parse_deploy(text: &str) -> Result<ParsedDeployRequest, DispatchError> {
    let mut tokens = text.split_whitespace();

    match tokens.next() {
        Some(word) if split_task(word).0 == "deploy" => {}
        _ => return Err(parse_error(text, "expected the deploy command")),
    }

    let target = tokens
        .next()
        .ok_or_else(|| parse_error(text, "missing pipeline"))?;
    if target == "to" || is_flag(target) {
        return Err(parse_error(text, "missing pipeline"));
    }
    let (pipeline_name, branch) = split_qualified(target)
        .ok_or_else(|| parse_error(text, "malformed pipeline/branch"))?;

    let mut request = ParsedDeployRequest {
        pipeline_name,
        branch,
        environment: None,
        application: None,
        forced: false,
        second_factor: false,
    };

    let mut seen_environment = false;
    while let Some(token) = tokens.next() {
        match token {
            "to" if !seen_environment => {
                let stage = tokens
                    .next()
                    .filter(|t| !is_flag(t))
                    .ok_or_else(|| parse_error(text, "missing environment after 'to'"))?;
                let (environment, application) = split_qualified(stage)
                    .ok_or_else(|| parse_error(text, "malformed environment/application"))?;
                request.environment = Some(environment);
                request.application = application;
                seen_environment = true;
            }
            "forced" | "!" => request.forced = true,
            "2fa" => request.second_factor = true,
            other => return Err(parse_error(text, &format!("unexpected '{}'", other))),
        }
    }

    Ok(request)
}

/// Value of the `-a APP` / `--app APP` / `--app=APP` argument
pub fn app_argument(text: &str) -> Option<String> {
    let mut tokens = text.split_whitespace();
    while let Some(token) = tokens.next() {
        if let Some(value) = token.strip_prefix("--app=") {
            return non_empty(value);
        }
        if token == "-a" || token == "--app" {
            return tokens.next().and_then(non_empty);
        }
    }
    None
}

/// Release number of `releases:<subtask> [v]N -a APP`
pub fn release_version(text: &str) -> Option<u64> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    match tokens.as_slice() {
        [_, version, flag, ..] if *flag == "-a" || flag.starts_with("--app") => {
            version.trim_start_matches('v').parse().ok()
        }
        _ => None,
    }
}

fn split_qualified(token: &str) -> Option<(String, Option<String>)> {
    match token.split_once('/') {
        Some((head, tail)) if !head.is_empty() && !tail.is_empty() => {
            Some((head.to_string(), Some(tail.to_string())))
        }
        Some(_) => None,
        None => Some((token.to_string(), None)),
    }
}

fn is_flag(token: &str) -> bool {
    matches!(token, "forced" | "!" | "2fa")
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_error(text: &str, reason: &str) -> DispatchError {
    DispatchError::Parse(format!("{}: {}", reason, text.trim()))
}
