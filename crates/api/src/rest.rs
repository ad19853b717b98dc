//! HTTP client for the platform's file endpoints.
//!
//! Every operation is a `POST {instance}{api_path}/{op}` with a JSON body and a
//! bearer token. Error bodies follow the platform convention: either a list of
//! `{message, errorCode}` objects or a single `{message}` object.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use filex_core::{Connection, EntityId, ExplorerQuery, ListResponse, PicklistOption, UserOption};
use metrics::{counter, histogram};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::{BackendError, BackendResult, FileBackend};

pub const DEFAULT_API_PATH: &str = "/services/apexrest/filex";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestConfig {
    pub instance_url: String,
    pub access_token: Option<String>,
    pub api_path: String,
    pub timeout_secs: u64,
}

impl RestConfig {
    pub fn new(instance_url: impl Into<String>) -> Self {
        Self {
            instance_url: instance_url.into(),
            access_token: None,
            api_path: DEFAULT_API_PATH.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Reads `FILEX_INSTANCE_URL` (required), `FILEX_ACCESS_TOKEN`, `FILEX_API_PATH`
    /// and `FILEX_HTTP_TIMEOUT_SECS`.
    pub fn from_env() -> anyhow::Result<Self> {
        let instance_url = std::env::var("FILEX_INSTANCE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("FILEX_INSTANCE_URL is not set"))?;
        let timeout_secs = match std::env::var("FILEX_HTTP_TIMEOUT_SECS") {
            Ok(s) => s.trim().parse::<u64>().with_context(|| format!("FILEX_HTTP_TIMEOUT_SECS: invalid value {:?}", s))?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };
        Ok(Self {
            instance_url,
            access_token: std::env::var("FILEX_ACCESS_TOKEN").ok().filter(|s| !s.is_empty()),
            api_path: std::env::var("FILEX_API_PATH").unwrap_or_else(|_| DEFAULT_API_PATH.to_string()),
            timeout_secs,
        })
    }

    /// Host part of the instance URL, used to tell internal links from external ones.
    pub fn host(&self) -> &str {
        let rest = self.instance_url.split("://").nth(1).unwrap_or(&self.instance_url);
        rest.split(['/', ':']).next().unwrap_or(rest)
    }

    pub fn endpoint(&self, op: &str) -> String {
        let base = self.instance_url.trim_end_matches('/');
        let path = self.api_path.trim_matches('/');
        if path.is_empty() {
            format!("{}/{}", base, op)
        } else {
            format!("{}/{}/{}", base, path, op)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorItem {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Many(Vec<ErrorItem>),
    One(ErrorItem),
}

/// Map a non-success response to a `BackendError`, keeping the platform's message.
pub(crate) fn parse_error_body(status: u16, body: &str) -> BackendError {
    let item = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody::Many(items)) => items.into_iter().next(),
        Ok(ErrorBody::One(item)) => Some(item),
        Err(_) => None,
    };
    let (message, code) = match item {
        Some(ErrorItem { message, error_code }) => (message.filter(|m| !m.is_empty()), error_code),
        None => (None, None),
    };
    match (status, message) {
        (404, Some(m)) => BackendError::NotFound(m),
        (_, message) => BackendError::Rejected { code: code.or_else(|| Some(format!("HTTP_{}", status))), message },
    }
}

pub struct RestBackend {
    cfg: RestConfig,
    client: reqwest::Client,
}

impl RestBackend {
    pub fn new(cfg: RestConfig) -> BackendResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self { cfg, client })
    }

    pub fn config(&self) -> &RestConfig { &self.cfg }

    async fn post(&self, op: &str, body: &serde_json::Value) -> BackendResult<String> {
        let url = self.cfg.endpoint(op);
        let t0 = Instant::now();
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = &self.cfg.access_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|e| {
            counter!("filex_api_errors_total", 1u64);
            warn!(op, error = %e, "api: transport failure");
            BackendError::Transport(e.to_string())
        })?;
        let status = response.status();
        let text = response.text().await.map_err(|e| BackendError::Transport(e.to_string()))?;
        histogram!("filex_api_call_ms", t0.elapsed().as_secs_f64() * 1000.0);
        if !status.is_success() {
            counter!("filex_api_errors_total", 1u64);
            let err = parse_error_body(status.as_u16(), &text);
            warn!(op, status = status.as_u16(), error = %err, "api: call failed");
            return Err(err);
        }
        info!(op, took_ms = %t0.elapsed().as_millis(), "api: call ok");
        Ok(text)
    }

    async fn call<T: DeserializeOwned>(&self, op: &str, body: serde_json::Value) -> BackendResult<T> {
        let text = self.post(op, &body).await?;
        serde_json::from_str(&text).map_err(|e| {
            debug!(op, body = %text, "api: undecodable response");
            BackendError::Decode(format!("{}: {}", op, e))
        })
    }

    /// For operations whose response body carries nothing we need.
    async fn call_unit(&self, op: &str, body: serde_json::Value) -> BackendResult<()> {
        self.post(op, &body).await.map(|_| ())
    }
}

#[async_trait::async_trait]
impl FileBackend for RestBackend {
    async fn list_entities(&self, query: &ExplorerQuery) -> BackendResult<ListResponse> {
        let body = serde_json::to_value(query.outgoing()).map_err(|e| BackendError::Decode(e.to_string()))?;
        self.call("getOrgFiles", body).await
    }

    async fn delete_entities(&self, ids: &[EntityId]) -> BackendResult<()> {
        self.call_unit("deleteFiles", json!({ "contentDocumentIds": ids })).await
    }

    async fn share_entity(&self, id: &EntityId, user_id: &str) -> BackendResult<()> {
        self.call_unit("shareWithUser", json!({ "contentDocumentId": id, "userId": user_id })).await
    }

    async fn share_entities_bulk(&self, ids: &[EntityId], user_id: &str) -> BackendResult<()> {
        self.call_unit("bulkShareWithUser", json!({ "contentDocumentIds": ids, "userId": user_id })).await
    }

    async fn reassign_owner(&self, id: &EntityId, new_owner_id: &str) -> BackendResult<()> {
        self.call_unit("reassignFileOwner", json!({ "contentDocumentId": id, "newOwnerId": new_owner_id })).await
    }

    async fn reassign_owner_bulk(&self, ids: &[EntityId], new_owner_id: &str) -> BackendResult<()> {
        self.call_unit("bulkReassignFileOwner", json!({ "contentDocumentIds": ids, "newOwnerId": new_owner_id })).await
    }

    async fn list_active_users(&self) -> BackendResult<Vec<UserOption>> {
        self.call("getActiveUsers", json!({})).await
    }

    async fn list_entity_connections(&self, id: &EntityId) -> BackendResult<Vec<Connection>> {
        self.call("getFileConnections", json!({ "contentDocumentId": id })).await
    }

    async fn list_file_types(&self) -> BackendResult<Vec<PicklistOption>> {
        self.call("getFileTypes", json!({})).await
    }

    async fn list_file_owners(&self) -> BackendResult<Vec<PicklistOption>> {
        self.call("getFileOwners", json!({})).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slashes() {
        let mut cfg = RestConfig::new("https://acme.my.salesforce.com/");
        assert_eq!(cfg.endpoint("getOrgFiles"), "https://acme.my.salesforce.com/services/apexrest/filex/getOrgFiles");
        cfg.api_path = "/custom/".into();
        assert_eq!(cfg.endpoint("deleteFiles"), "https://acme.my.salesforce.com/custom/deleteFiles");
        cfg.api_path = String::new();
        assert_eq!(cfg.endpoint("x"), "https://acme.my.salesforce.com/x");
    }

    #[test]
    fn host_strips_scheme_port_and_path() {
        assert_eq!(RestConfig::new("https://acme.my.salesforce.com:443/x").host(), "acme.my.salesforce.com");
        assert_eq!(RestConfig::new("localhost").host(), "localhost");
    }

    #[test]
    fn platform_error_list_is_read() {
        let err = parse_error_body(400, r#"[{"message":"insufficient access rights on object id","errorCode":"INSUFFICIENT_ACCESS"}]"#);
        assert_eq!(
            err,
            BackendError::Rejected {
                code: Some("INSUFFICIENT_ACCESS".into()),
                message: Some("insufficient access rights on object id".into())
            }
        );
        assert_eq!(err.user_message(), "insufficient access rights on object id");
    }

    #[test]
    fn single_object_and_not_found() {
        let err = parse_error_body(404, r#"{"message":"file not found"}"#);
        assert_eq!(err, BackendError::NotFound("file not found".into()));
    }

    #[test]
    fn unreadable_body_falls_back_to_generic_text() {
        let err = parse_error_body(502, "<html>bad gateway</html>");
        assert_eq!(err, BackendError::Rejected { code: Some("HTTP_502".into()), message: None });
        assert_eq!(err.user_message(), crate::GENERIC_ERROR_MESSAGE);
    }

    #[test]
    fn list_request_uses_normalized_camel_case_query() {
        let mut q = ExplorerQuery::default();
        q.filters.insert("fileType".into(), "PDF".into());
        q.filters.insert("ownerId".into(), "".into());
        let out = q.outgoing();
        let v = serde_json::to_value(&out).unwrap();
        assert_eq!(v["pageSize"], 25);
        assert_eq!(v["sortBy"], "CreatedDate");
        assert_eq!(v["sortDirection"], "DESC");
        assert_eq!(v["filters"], json!({"fileType": "PDF"}));
    }
}
