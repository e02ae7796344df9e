// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Registry client
//!
//! `RegistrationClient` is the seam between the heartbeat processor and the
//! network. `HttpRegistrationClient` talks to the registry over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use mesh_config::MeshConfig;
use reqwest::StatusCode;
use tracing::debug;

use crate::error::{MeshError, Result};
use crate::status::ProbeResponse;
use crate::wire::{parse_registration_response, RegistrationRequest, RegistrationResponse};

/// Calls the heartbeat processor makes against the registry
#[async_trait]
pub trait RegistrationClient: Send + Sync {
    /// Initial batched registration
    async fn register(&self, request: &RegistrationRequest) -> Result<RegistrationResponse>;

    /// Full heartbeat: re-declare everything and receive fresh bindings
    async fn heartbeat(&self, request: &RegistrationRequest) -> Result<RegistrationResponse>;

    /// Cheap probe. Transport failures are reported in the response, not as errors.
    async fn fast_heartbeat(&self, agent_id: &str) -> ProbeResponse;

    /// Remove the agent from the registry. An unknown agent counts as removed.
    async fn unregister_agent(&self, agent_id: &str) -> Result<()>;
}

/// Registry client over HTTP
#[derive(Debug, Clone)]
pub struct HttpRegistrationClient {
    http: reqwest::Client,
    base_url: String,
    probe_timeout: Duration,
}

const MAX_ERROR_BODY: usize = 256;

impl HttpRegistrationClient {
    /// # Arguments
    ///
    /// * `base_url` - Registry root, e.g. `http://localhost:8000`
    /// * `request_timeout` - Timeout for registration, heartbeat and deregistration
    /// * `probe_timeout` - Timeout for the fast probe
    pub fn new(base_url: &str, request_timeout: Duration, probe_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| MeshError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            probe_timeout,
        })
    }

    pub fn from_config(config: &MeshConfig) -> Result<Self> {
        Self::new(
            &config.registry.url,
            Duration::from_millis(config.registry.request_timeout_ms),
            Duration::from_millis(config.registry.probe_timeout_ms),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_declaration(
        &self,
        path: &str,
        request: &RegistrationRequest,
    ) -> Result<RegistrationResponse> {
        let response = self.http.post(self.url(path)).json(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        debug!("[REGISTRY] POST {} -> {}", path, status);

        if status.is_server_error() {
            return Err(MeshError::Registry {
                status: status.as_u16(),
                message: truncate(&body),
            });
        }
        if !status.is_success() {
            return Err(MeshError::UnexpectedStatus(status.as_u16()));
        }

        parse_registration_response(&body)
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY).collect()
}

#[async_trait]
impl RegistrationClient for HttpRegistrationClient {
    async fn register(&self, request: &RegistrationRequest) -> Result<RegistrationResponse> {
        self.post_declaration("/agents/register_decorators", request)
            .await
    }

    async fn heartbeat(&self, request: &RegistrationRequest) -> Result<RegistrationResponse> {
        self.post_declaration("/heartbeat_decorators", request).await
    }

    async fn fast_heartbeat(&self, agent_id: &str) -> ProbeResponse {
        let url = self.url(&format!("/heartbeat/{}", agent_id));
        match self
            .http
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(response) => ProbeResponse::Status(response.status().as_u16()),
            Err(e) => ProbeResponse::TransportFailure(e.to_string()),
        }
    }

    async fn unregister_agent(&self, agent_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("/agents/{}", agent_id)))
            .send()
            .await?;
        let status = response.status();

        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(MeshError::Registry {
                status: status.as_u16(),
                message: truncate(&body),
            });
        }
        Err(MeshError::UnexpectedStatus(status.as_u16()))
    }
}
