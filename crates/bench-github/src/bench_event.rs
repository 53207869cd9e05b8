use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ISSUE_COMMENT_EVENT: &str = "issue_comment";

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Public struct `WebhookUser` used across bench bot components.
pub struct WebhookUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Public struct `WebhookRepository` used across bench bot components.
pub struct WebhookRepository {
    pub name: String,
    pub owner: WebhookUser,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Public struct `WebhookInstallation` used across bench bot components.
pub struct WebhookInstallation {
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Public struct `WebhookIssue` used across bench bot components.
pub struct WebhookIssue {
    pub number: u64,
    #[serde(default)]
    pub pull_request: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Public struct `WebhookComment` used across bench bot components.
pub struct WebhookComment {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<WebhookUser>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Subset of the GitHub `issue_comment` webhook payload read by the bot.
pub struct IssueCommentPayload {
    pub action: String,
    pub issue: WebhookIssue,
    pub comment: WebhookComment,
    pub repository: WebhookRepository,
    #[serde(default)]
    pub installation: Option<WebhookInstallation>,
}

/// Immutable snapshot of one `issue_comment` delivery.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub owner: String,
    pub repo: String,
    pub issue_number: u64,
    pub comment_body: String,
    pub installation_id: Option<u64>,
    pub action: String,
    pub has_pull_request: bool,
    pub raw_payload: Value,
}

impl TriggerEvent {
    pub fn from_payload_value(raw_payload: Value) -> Result<Self> {
        let payload: IssueCommentPayload = serde_json::from_value(raw_payload.clone())
            .context("failed to decode issue_comment webhook payload")?;
        Ok(Self::from_payload(payload, raw_payload))
    }

    pub fn from_payload(payload: IssueCommentPayload, raw_payload: Value) -> Self {
        Self {
            owner: payload.repository.owner.login,
            repo: payload.repository.name,
            issue_number: payload.issue.number,
            comment_body: payload.comment.body.unwrap_or_default(),
            // An id of zero never identifies a real installation.
            installation_id: payload
                .installation
                .map(|installation| installation.id)
                .filter(|id| *id > 0),
            action: payload.action,
            has_pull_request: payload.issue.pull_request.is_some(),
            raw_payload,
        }
    }

    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

#[cfg(test)]
mod tests {
    use super::TriggerEvent;
    use serde_json::json;

    fn sample_payload() -> serde_json::Value {
        json!({
            "action": "created",
            "issue": {
                "number": 42,
                "pull_request": {"url": "https://api.github.com/repos/acme/node/pulls/42"}
            },
            "comment": {"id": 7, "body": "/bench runtime pallet_balances", "user": {"login": "alice"}},
            "repository": {"name": "node", "owner": {"login": "acme"}},
            "installation": {"id": 99}
        })
    }

    #[test]
    fn unit_trigger_event_reads_core_fields() {
        let event = TriggerEvent::from_payload_value(sample_payload()).expect("event");
        assert_eq!(event.owner, "acme");
        assert_eq!(event.repo, "node");
        assert_eq!(event.issue_number, 42);
        assert_eq!(event.comment_body, "/bench runtime pallet_balances");
        assert_eq!(event.installation_id, Some(99));
        assert_eq!(event.action, "created");
        assert!(event.has_pull_request);
        assert_eq!(event.repo_slug(), "acme/node");
    }

    #[test]
    fn functional_trigger_event_marks_plain_issues_and_missing_installation() {
        let mut payload = sample_payload();
        payload["issue"]
            .as_object_mut()
            .expect("issue object")
            .remove("pull_request");
        payload
            .as_object_mut()
            .expect("payload object")
            .remove("installation");
        let event = TriggerEvent::from_payload_value(payload).expect("event");
        assert!(!event.has_pull_request);
        assert_eq!(event.installation_id, None);
    }

    #[test]
    fn regression_trigger_event_treats_zero_installation_and_null_body_as_absent() {
        let mut payload = sample_payload();
        payload["installation"] = json!({"id": 0});
        payload["comment"]["body"] = serde_json::Value::Null;
        let event = TriggerEvent::from_payload_value(payload).expect("event");
        assert_eq!(event.installation_id, None);
        assert_eq!(event.comment_body, "");
    }

    #[test]
    fn regression_trigger_event_rejects_payload_without_repository() {
        let error = TriggerEvent::from_payload_value(json!({"action": "created"}))
            .expect_err("missing fields should fail");
        assert!(error
            .to_string()
            .contains("failed to decode issue_comment webhook payload"));
    }
}
