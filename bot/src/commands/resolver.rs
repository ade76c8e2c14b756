//! Pipeline resolution
//!
//! Maps a pipeline name, environment and optional application hint to the
//! single application a deploy targets.

use platform_api::{Application, Pipeline};

use crate::errors::DispatchError;

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget<'a> {
    pub pipeline: &'a Pipeline,
    pub environment: String,
    pub application: &'a Application,
}

/// Resolve the application a deploy should target.
///
/// `environment` falls back to the pipeline's default environment.
pub fn resolve<'a>(
    pipelines: &'a [Pipeline],
    pipeline_name: &str,
    environment: Option<&str>,
    application_hint: Option<&str>,
) -> Result<ResolvedTarget<'a>, DispatchError> {
    let pipeline = pipelines
        .iter()
        .find(|p| p.name == pipeline_name)
        .ok_or_else(|| DispatchError::PipelineNotFound(pipeline_name.to_string()))?;

    let environment = environment.unwrap_or(&pipeline.default_environment);
    let applications =
        pipeline
            .applications(environment)
            .ok_or_else(|| DispatchError::EnvironmentNotFound {
                environment: environment.to_string(),
                available: pipeline
                    .environment_names()
                    .into_iter()
                    .map(String::from)
                    .collect(),
            })?;

    let application = match application_hint {
        Some(hint) => applications
            .iter()
            .find(|app| app.name == hint)
            .ok_or_else(|| DispatchError::ApplicationNotFound {
                pipeline: pipeline.name.clone(),
                environment: environment.to_string(),
                application: Some(hint.to_string()),
            })?,
        None => match applications {
            [only] => only,
            [] => {
                return Err(DispatchError::ApplicationNotFound {
                    pipeline: pipeline.name.clone(),
                    environment: environment.to_string(),
                    application: None,
                })
            }
            many => {
                let mut names: Vec<String> = many.iter().map(|app| app.name.clone()).collect();
                names.sort();
                return Err(DispatchError::AmbiguousApplication {
                    pipeline: pipeline.name.clone(),
                    environment: environment.to_string(),
                    applications: names,
                });
            }
        },
    };

    Ok(ResolvedTarget {
        pipeline,
        environment: environment.to_string(),
        application,
    })
}
