//! HTTP deployment platform client

use std::time::Duration;

use async_trait::async_trait;
use http::{header, StatusCode};
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};
use url::Url;

use platform_api::{
    BuildRequest, BuildStatus, ErrorResponse, Pipeline, Release, SubmitBuildRequest,
};

use crate::errors::DispatchError;
use crate::platform::DeploymentPlatform;

/// Platform client speaking JSON over HTTP
pub struct HttpPlatform {
    client: Client,
    base_url: String,
    api_token: Option<SecretString>,
}

impl HttpPlatform {
    pub fn new(
        base_url: &str,
        api_token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, DispatchError> {
        Url::parse(base_url).map_err(|e| DispatchError::ConfigError(e.to_string()))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(header::ACCEPT, "application/json");
        match &self.api_token {
            Some(token) => request.header(
                header::AUTHORIZATION,
                format!("Bearer {}", token.expose_secret()),
            ),
            None => request,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, DispatchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self.authorize(self.client.get(&url)).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP GET failed: {} - {}", status, body);
            return Err(DispatchError::Transient(format!("GET {}: {}", path, status)));
        }

        Ok(response.json().await?)
    }

    async fn post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(StatusCode, String), DispatchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .authorize(self.client.post(&url))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

/// Map a refused submission to the dispatcher's error taxonomy
pub fn classify_submit_failure(
    status: StatusCode,
    body: &str,
    request: &SubmitBuildRequest,
) -> DispatchError {
    let error: ErrorResponse = serde_json::from_str(body).unwrap_or_default();

    match status {
        StatusCode::LOCKED => DispatchError::Locked(request.application_name.clone()),
        StatusCode::CONFLICT => DispatchError::Conflict {
            repository: request.repository.clone(),
            reason: error
                .message
                .unwrap_or_else(|| "Conflict: deployment refused".to_string()),
        },
        StatusCode::FORBIDDEN if error.id.as_deref() == Some("two_factor") => {
            DispatchError::TwoFactorRequired(request.application_name.clone())
        }
        status => DispatchError::Transient(format!(
            "build submission for {} failed: {} {}",
            request.application_name,
            status,
            error.message.unwrap_or_default()
        )),
    }
}

#[async_trait]
impl DeploymentPlatform for HttpPlatform {
    async fn pipelines(&self) -> Result<Vec<Pipeline>, DispatchError> {
        self.get("/pipelines").await
    }

    async fn submit(&self, request: SubmitBuildRequest) -> Result<BuildRequest, DispatchError> {
        let path = format!("/apps/{}/builds", request.application_id);
        let (status, body) = self.post(&path, &request).await?;

        if status.is_success() {
            return Ok(serde_json::from_str(&body)?);
        }

        let err = classify_submit_failure(status, &body, &request);
        warn!("Build submission refused: {}", err);
        Err(err)
    }

    async fn build_status(&self, build: &BuildRequest) -> Result<BuildStatus, DispatchError> {
        self.get(&format!("/builds/{}", build.id)).await
    }

    async fn releases(&self, application: &str) -> Result<Vec<Release>, DispatchError> {
        self.get(&format!("/apps/{}/releases", application)).await
    }

    async fn release_info(
        &self,
        application: &str,
        version: u64,
    ) -> Result<Release, DispatchError> {
        self.get(&format!("/apps/{}/releases/{}", application, version))
            .await
    }
}
