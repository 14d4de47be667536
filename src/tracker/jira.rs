//! Jira REST client implementation
//!
//! Creates issues through the v3 REST API. Jira requires the description in
//! Atlassian Document Format, so the plain-text description is wrapped in a
//! single-paragraph document.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::tracker::{IssueTracker, TrackerConnection, TrackerError};

/// Issue type created for every synced item
const ISSUE_TYPE: &str = "Story";

/// Configuration for the Jira client
#[derive(Debug, Clone)]
pub struct JiraTrackerConfig {
    pub timeout: Duration,
}

impl Default for JiraTrackerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

/// Jira API client
pub struct JiraTracker {
    client: Client,
}

impl JiraTracker {
    /// Create a new Jira client.
    pub fn new(config: JiraTrackerConfig) -> Result<Self, TrackerError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client })
    }

    /// Normalize the configured domain into the issue-creation URL.
    fn issue_url(domain: &str) -> String {
        let with_scheme = if domain.starts_with("http") {
            domain.to_string()
        } else {
            format!("https://{}", domain)
        };
        format!("{}/rest/api/3/issue", with_scheme.trim_end_matches('/'))
    }

    /// Build the creation payload with an ADF description.
    fn build_payload(conn: &TrackerConnection, summary: &str, description: &str) -> Value {
        let text = if description.is_empty() { summary } else { description };
        json!({
            "fields": {
                "project": { "key": conn.project },
                "summary": summary,
                "description": {
                    "type": "doc",
                    "version": 1,
                    "content": [
                        {
                            "type": "paragraph",
                            "content": [{ "type": "text", "text": text }]
                        }
                    ]
                },
                "issuetype": { "name": ISSUE_TYPE }
            }
        })
    }
}

#[async_trait]
impl IssueTracker for JiraTracker {
    async fn create_issue(
        &self,
        conn: &TrackerConnection,
        summary: &str,
        description: &str,
    ) -> Result<String, TrackerError> {
        let payload = Self::build_payload(conn, summary, description);

        let response = self
            .client
            .post(Self::issue_url(&conn.domain))
            .basic_auth(&conn.email, Some(&conn.token))
            .header("Accept", "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TrackerError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| TrackerError::InvalidResponse(e.to_string()))?;
        body["key"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| TrackerError::InvalidResponse("missing issue key".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> TrackerConnection {
        TrackerConnection {
            domain: "example.atlassian.net".to_string(),
            email: "dev@example.com".to_string(),
            token: "t".to_string(),
            project: "PROJ".to_string(),
        }
    }

    #[test]
    fn test_issue_url_adds_scheme() {
        assert_eq!(
            JiraTracker::issue_url("example.atlassian.net"),
            "https://example.atlassian.net/rest/api/3/issue"
        );
    }

    #[test]
    fn test_issue_url_keeps_scheme_and_strips_slash() {
        assert_eq!(
            JiraTracker::issue_url("http://jira.local:8080/"),
            "http://jira.local:8080/rest/api/3/issue"
        );
    }

    #[test]
    fn test_build_payload_shape() {
        let payload = JiraTracker::build_payload(&connection(), "short summary", "full text");
        assert_eq!(payload["fields"]["project"]["key"], "PROJ");
        assert_eq!(payload["fields"]["summary"], "short summary");
        assert_eq!(payload["fields"]["issuetype"]["name"], "Story");
        assert_eq!(payload["fields"]["description"]["type"], "doc");
        assert_eq!(
            payload["fields"]["description"]["content"][0]["content"][0]["text"],
            "full text"
        );
    }

    #[test]
    fn test_build_payload_empty_description_uses_summary() {
        let payload = JiraTracker::build_payload(&connection(), "summary only", "");
        assert_eq!(
            payload["fields"]["description"]["content"][0]["content"][0]["text"],
            "summary only"
        );
    }
}
