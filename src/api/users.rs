//! User management endpoints (admin only on the server side).

use super::shape::ListEnvelope;
use super::{require_credential, segment, with_query, ApiClient, Credential, HttpMethod};
use crate::data::{Page, UserQuery, UserRole, UserSummary};
use crate::error::ClientResult;
use serde_json::json;

pub async fn list(
    client: &ApiClient,
    credential: Option<&Credential>,
    query: &UserQuery,
) -> ClientResult<Page<UserSummary>> {
    let credential = require_credential(credential, "view users")?;

    let page = query.page.max(1);
    let page_size = query.page_size.max(1);
    let path = with_query(
        "/users",
        &[("page", page.to_string()), ("pageSize", page_size.to_string())],
    );

    let raw = client.call_listing(&path, Some(credential)).await?;

    Ok(ListEnvelope::classify(raw).into_page(page, page_size))
}

pub async fn update_role(
    client: &ApiClient,
    credential: Option<&Credential>,
    user_id: &str,
    role: UserRole,
) -> ClientResult<()> {
    let credential = require_credential(credential, "update user roles")?;

    client
        .call_no_content(
            HttpMethod::Patch,
            &format!("/users/{}/role", segment(user_id)),
            Some(credential),
            Some(json!({ "role": role })),
        )
        .await
}
