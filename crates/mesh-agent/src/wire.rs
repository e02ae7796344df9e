// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Registry wire format
//!
//! Registration and full heartbeat share one request body. Responses carry
//! dependency resolutions per function.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capability::RemoteCapability;
use crate::declaration::{DependencySpec, ToolSpec};
use crate::error::{MeshError, Result};

/// Body of `POST /agents/register_decorators` and `POST /heartbeat_decorators`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: AgentMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMetadata {
    pub name: String,
    pub version: String,
    pub namespace: String,
    pub endpoint: String,
    pub tools: Vec<ToolDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub function_name: String,
    pub capability: String,
    pub version: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<DependencyDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyDeclaration {
    pub capability: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl From<&DependencySpec> for DependencyDeclaration {
    fn from(spec: &DependencySpec) -> Self {
        Self {
            capability: spec.capability().to_string(),
            tags: spec.tags().iter().cloned().collect(),
            version: spec.version().map(str::to_string),
        }
    }
}

impl From<&ToolSpec> for ToolDeclaration {
    fn from(tool: &ToolSpec) -> Self {
        Self {
            function_name: tool.function_name().to_string(),
            capability: tool.capability().to_string(),
            version: tool.version().to_string(),
            tags: tool.tags().iter().cloned().collect(),
            dependencies: tool.dependencies().iter().map(Into::into).collect(),
        }
    }
}

/// Registry answer to registration or full heartbeat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub dependencies_resolved: Vec<FunctionResolution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResolution {
    pub function_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<ResolvedDependency>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDependency {
    pub capability: String,
    pub status: ResolutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_tool_info: Option<ToolInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    Resolved,
    Unresolved,
}

/// Where a resolved capability is served
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub agent_id: String,
    pub endpoint: String,
    pub function_name: String,
}

/// (function, capability) pair a binding applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingSlot {
    pub function: String,
    pub capability: String,
}

impl BindingSlot {
    pub fn new(function: impl Into<String>, capability: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            capability: capability.into(),
        }
    }
}

/// Resolutions reported by the registry; `None` means unresolved
pub type ResolvedBindings = BTreeMap<BindingSlot, Option<RemoteCapability>>;

impl RegistrationResponse {
    pub const SUCCESS: &'static str = "success";

    pub fn is_success(&self) -> bool {
        self.status == Self::SUCCESS
    }

    /// Per-function bindings
    ///
    /// # Errors
    ///
    /// `MeshError::ContractViolation` when a dependency is marked resolved
    /// without provider details.
    pub fn bindings(&self) -> Result<ResolvedBindings> {
        let mut bindings = ResolvedBindings::new();
        for function in &self.dependencies_resolved {
            for dependency in &function.dependencies {
                let slot = BindingSlot::new(&function.function_name, &dependency.capability);
                let value = match (dependency.status, &dependency.mcp_tool_info) {
                    (ResolutionStatus::Resolved, Some(info)) => Some(RemoteCapability::new(
                        &dependency.capability,
                        &info.agent_id,
                        &info.endpoint,
                        &info.function_name,
                    )),
                    (ResolutionStatus::Resolved, None) => {
                        return Err(MeshError::ContractViolation(format!(
                            "'{}' of '{}' marked resolved without mcp_tool_info",
                            dependency.capability, function.function_name
                        )));
                    }
                    (ResolutionStatus::Unresolved, _) => None,
                };
                bindings.insert(slot, value);
            }
        }
        Ok(bindings)
    }
}

/// Decode a registration or heartbeat response body
///
/// # Errors
///
/// - `MeshError::ContractViolation` if the body is not the expected JSON
/// - `MeshError::Rejected` if the registry reports a non-success status
pub fn parse_registration_response(body: &str) -> Result<RegistrationResponse> {
    let response: RegistrationResponse = serde_json::from_str(body)
        .map_err(|e| MeshError::ContractViolation(format!("malformed registry response: {}", e)))?;

    if !response.is_success() {
        return Err(MeshError::Rejected(
            response
                .message
                .clone()
                .unwrap_or_else(|| format!("status '{}'", response.status)),
        ));
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let tool = ToolSpec::new("greet")
            .with_tag("demo")
            .depends_on(DependencySpec::new("date_service").with_version(">=1.0"));
        let request = RegistrationRequest {
            agent_id: "hello-1a2b3c4d".to_string(),
            timestamp: "2024-01-20T10:00:00Z".parse().unwrap(),
            metadata: AgentMetadata {
                name: "hello".to_string(),
                version: "1.0.0".to_string(),
                namespace: "default".to_string(),
                endpoint: "http://localhost:8080".to_string(),
                tools: vec![ToolDeclaration::from(&tool)],
            },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["timestamp"], "2024-01-20T10:00:00Z");
        assert_eq!(value["metadata"]["tools"][0]["function_name"], "greet");
        assert_eq!(value["metadata"]["tools"][0]["capability"], "greet");
        assert_eq!(
            value["metadata"]["tools"][0]["dependencies"][0],
            json!({"capability": "date_service", "tags": [], "version": ">=1.0"})
        );
    }

    #[test]
    fn test_bindings_from_response() {
        let body = json!({
            "status": "success",
            "dependencies_resolved": [{
                "function_name": "greet",
                "capability": "greet",
                "dependencies": [
                    {"capability": "date_service", "status": "resolved",
                     "mcp_tool_info": {"agent_id": "clock-1", "endpoint": "http://clock:9000", "function_name": "today"}},
                    {"capability": "weather", "status": "unresolved"}
                ]
            }]
        })
        .to_string();

        let response = parse_registration_response(&body).unwrap();
        let bindings = response.bindings().unwrap();

        let date = bindings[&BindingSlot::new("greet", "date_service")].as_ref().unwrap();
        assert_eq!(date.agent_id, "clock-1");
        assert_eq!(date.function_name, "today");
        assert!(bindings[&BindingSlot::new("greet", "weather")].is_none());
    }

    #[test]
    fn test_resolved_without_tool_info_is_contract_violation() {
        let body = json!({
            "status": "success",
            "dependencies_resolved": [{
                "function_name": "greet",
                "dependencies": [{"capability": "date_service", "status": "resolved"}]
            }]
        })
        .to_string();

        let err = parse_registration_response(&body).unwrap().bindings().unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_malformed_body_is_contract_violation() {
        let err = parse_registration_response("<html>oops</html>").unwrap_err();
        assert!(err.is_contract_violation());

        let err = parse_registration_response(r#"{"status":"success","dependencies_resolved":[{"function_name":"f","dependencies":[{"capability":"x","status":"maybe"}]}]}"#)
            .unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_non_success_status_is_rejected() {
        let err = parse_registration_response(r#"{"status":"error","message":"namespace locked"}"#)
            .unwrap_err();
        assert!(matches!(err, MeshError::Rejected(ref m) if m == "namespace locked"));
        assert!(err.is_retryable());
    }
}
