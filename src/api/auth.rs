//! `POST /auth/login`.

use super::{ApiClient, HttpMethod};
use crate::error::{ClientError, ClientResult};
use crate::session::Session;
use serde_json::json;

/// Exchange email and password for a bearer token and identity.
pub async fn login(client: &ApiClient, email: &str, password: &str) -> ClientResult<Session> {
    let body = json!({ "email": email, "password": password });

    let session: Session = client
        .call_json(HttpMethod::Post, "/auth/login", None, Some(body))
        .await?;

    if session.access_token.is_blank() {
        return Err(ClientError::MalformedResponse(
            "POST /auth/login: empty access token".to_string(),
        ));
    }

    Ok(session)
}
