//! Issue endpoints.

use super::shape::ListEnvelope;
use super::{json_body, require_credential, segment, with_query, ApiClient, Credential, HttpMethod};
use crate::data::{CreateIssuePayload, Issue, IssueQuery, IssueStatus, Page, UpdateIssuePayload};
use crate::error::ClientResult;
use serde_json::json;

/// Issues reported by the signed-in citizen.
///
/// Without a credential this is an empty list, not an error.
pub async fn list_mine(client: &ApiClient, credential: Option<&Credential>) -> ClientResult<Vec<Issue>> {
    let Some(credential) = credential else {
        return Ok(Vec::new());
    };

    let raw = client.call_listing("/issues/mine", Some(credential)).await?;

    Ok(ListEnvelope::classify(raw).into_items())
}

/// Build the `/issues` listing path. `ALL` filters are left out.
pub fn list_all_path(query: &IssueQuery) -> String {
    let mut params = vec![
        ("page", query.page.max(1).to_string()),
        ("pageSize", query.page_size.max(1).to_string()),
    ];

    if let Some(status) = query.status.value() {
        params.push(("status", status.as_str().to_string()));
    }
    if let Some(priority) = query.priority.value() {
        params.push(("priority", priority.as_str().to_string()));
    }

    with_query("/issues", &params)
}

/// All issues, filtered and paged, normalized from whatever shape the server sends.
pub async fn list_all(
    client: &ApiClient,
    credential: Option<&Credential>,
    query: &IssueQuery,
) -> ClientResult<Page<Issue>> {
    let credential = require_credential(credential, "view issues")?;

    let raw = client.call_listing(&list_all_path(query), Some(credential)).await?;

    Ok(ListEnvelope::classify(raw).into_page(query.page.max(1), query.page_size.max(1)))
}

pub async fn create(
    client: &ApiClient,
    credential: Option<&Credential>,
    payload: &CreateIssuePayload,
) -> ClientResult<Issue> {
    let credential = require_credential(credential, "create an issue")?;

    client
        .call_json(HttpMethod::Post, "/issues", Some(credential), Some(json_body(payload)?))
        .await
}

pub async fn get(client: &ApiClient, credential: Option<&Credential>, issue_id: &str) -> ClientResult<Issue> {
    let credential = require_credential(credential, "view an issue")?;

    client
        .call_json(
            HttpMethod::Get,
            &format!("/issues/{}", segment(issue_id)),
            Some(credential),
            None,
        )
        .await
}

pub async fn update(
    client: &ApiClient,
    credential: Option<&Credential>,
    issue_id: &str,
    payload: &UpdateIssuePayload,
) -> ClientResult<Issue> {
    let credential = require_credential(credential, "update an issue")?;

    client
        .call_json(
            HttpMethod::Patch,
            &format!("/issues/{}", segment(issue_id)),
            Some(credential),
            Some(json_body(payload)?),
        )
        .await
}

pub async fn update_status(
    client: &ApiClient,
    credential: Option<&Credential>,
    issue_id: &str,
    status: IssueStatus,
) -> ClientResult<()> {
    let credential = require_credential(credential, "update an issue")?;

    client
        .call_no_content(
            HttpMethod::Patch,
            &format!("/issues/{}/status", segment(issue_id)),
            Some(credential),
            Some(json!({ "status": status })),
        )
        .await
}
