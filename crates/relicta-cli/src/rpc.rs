//! In-process wire adapter: `{action, inputs}` requests over the service.
//!
//! The adapter owns an optional service; driving an unconfigured adapter
//! answers `configuration_error` instead of panicking, which hosting
//! processes rely on during partial startup.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use relicta_core::{Actor, BumpKind, CancelToken, TrustLevel};
use release::ReleaseRun;

use crate::service::ReleaseService;

/// One wire request.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    /// Method name: `plan`, `bump`, `notes`, `approve`, `publish`,
    /// `get_status` (case-insensitive).
    pub action: String,
    /// Method inputs.
    #[serde(default)]
    pub inputs: Value,
}

/// One wire response.
#[derive(Debug, Clone, Serialize, Default)]
pub struct RpcResponse {
    /// Run state after the action, or `error`.
    pub state: String,
    /// Run identity, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_id: Option<String>,
    /// Next version, when chosen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Decision kind, for actions that evaluate governance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,
    /// Error kinds, empty on success.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl RpcResponse {
    fn from_run(run: &ReleaseRun) -> Self {
        Self {
            state: run.state.as_str().to_string(),
            release_id: Some(run.id.clone()),
            version: run.version_next.as_ref().map(ToString::to_string),
            decision: None,
            errors: Vec::new(),
        }
    }

    fn error(kind: impl Into<String>) -> Self {
        Self { state: "error".into(), errors: vec![kind.into()], ..Self::default() }
    }
}

/// The adapter.
pub struct RpcAdapter {
    service: Option<ReleaseService>,
}

impl RpcAdapter {
    /// Adapter over a wired service.
    #[must_use]
    pub fn new(service: ReleaseService) -> Self {
        Self { service: Some(service) }
    }

    /// Adapter with no service; every request answers
    /// `configuration_error`.
    #[must_use]
    pub const fn unconfigured() -> Self {
        Self { service: None }
    }

    /// Dispatch one request.
    #[must_use]
    pub fn handle(&self, request: &RpcRequest, cancel: &CancelToken) -> RpcResponse {
        let Some(service) = &self.service else {
            return RpcResponse::error("configuration_error");
        };
        let actor = request
            .inputs
            .get("actor")
            .and_then(Value::as_str)
            .map_or_else(default_actor, |id| Actor::human(id, id, TrustLevel::Basic));

        let outcome = match request.action.to_lowercase().as_str() {
            "plan" => {
                let base = request.inputs.get("base_ref").and_then(Value::as_str);
                service.plan(&actor, base, cancel).map(|run| RpcResponse::from_run(&run))
            }
            "bump" => {
                let kind = request
                    .inputs
                    .get("bump")
                    .and_then(Value::as_str)
                    .and_then(BumpKind::parse);
                service.bump(&actor, kind, cancel).map(|run| RpcResponse::from_run(&run))
            }
            "notes" => service.notes(&actor, cancel).map(|run| RpcResponse::from_run(&run)),
            "approve" => {
                let justification = request
                    .inputs
                    .get("justification")
                    .and_then(Value::as_str)
                    .unwrap_or("approved via rpc");
                service.approve(&actor, justification, cancel).map(|(run, evaluation)| {
                    let mut response = RpcResponse::from_run(&run);
                    response.decision = Some(evaluation.decision.kind.as_str().to_string());
                    response
                })
            }
            "publish" => service.publish(&actor, cancel).map(|run| RpcResponse::from_run(&run)),
            "get_status" | "status" => {
                let id = request.inputs.get("release_id").and_then(Value::as_str);
                service.status(id, cancel).map(|run| RpcResponse::from_run(&run))
            }
            other => return RpcResponse::error(format!("unknown_action:{other}")),
        };

        outcome.unwrap_or_else(|e| RpcResponse::error(e.to_string()))
    }
}

fn default_actor() -> Actor {
    Actor::human("local", "local operator", TrustLevel::Basic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noop::{LoggingStepExecutor, StaticInspector, TemplateNoteGenerator};
    use serde_json::json;
    use tempfile::tempdir;

    fn request(action: &str, inputs: Value) -> RpcRequest {
        RpcRequest { action: action.into(), inputs }
    }

    #[test]
    fn unconfigured_adapter_reports_configuration_error() {
        let adapter = RpcAdapter::unconfigured();
        let response = adapter.handle(&request("plan", json!({})), &CancelToken::new());
        assert_eq!(response.state, "error");
        assert_eq!(response.errors, vec!["configuration_error"]);
    }

    #[test]
    fn unknown_action_is_reported() {
        let dir = tempdir().unwrap();
        let service = ReleaseService::open(
            dir.path(),
            Box::new(StaticInspector::default()),
            Box::new(TemplateNoteGenerator),
            Box::new(LoggingStepExecutor),
        )
        .unwrap();
        let adapter = RpcAdapter::new(service);
        let response = adapter.handle(&request("transmogrify", json!({})), &CancelToken::new());
        assert!(response.errors[0].starts_with("unknown_action"));
    }

    #[test]
    fn plan_through_publish_over_rpc() {
        let dir = tempdir().unwrap();
        let service = ReleaseService::open(
            dir.path(),
            Box::new(StaticInspector::default()),
            Box::new(TemplateNoteGenerator),
            Box::new(LoggingStepExecutor),
        )
        .unwrap();
        let adapter = RpcAdapter::new(service);
        let cancel = CancelToken::new();

        let planned = adapter.handle(&request("plan", json!({})), &cancel);
        assert_eq!(planned.state, "planned");
        let release_id = planned.release_id.clone().unwrap();

        let bumped = adapter.handle(&request("bump", json!({"bump": "minor"})), &cancel);
        assert_eq!(bumped.state, "versioned");
        assert!(bumped.version.is_some());

        adapter.handle(&request("notes", json!({})), &cancel);
        let approved = adapter.handle(&request("approve", json!({"actor": "alice"})), &cancel);
        assert_eq!(approved.state, "approved");
        assert!(approved.decision.is_some());

        let published = adapter.handle(&request("publish", json!({})), &cancel);
        assert_eq!(published.state, "published");

        let status =
            adapter.handle(&request("get_status", json!({"release_id": release_id})), &cancel);
        assert_eq!(status.state, "published");
    }
}
