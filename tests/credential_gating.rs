//! Tests for credential checks
//!
//! Every protected operation must fail locally, before anything is sent,
//! when there is no credential. Listing one's own issues is the exception:
//! it quietly returns nothing.

mod test_utils;
use test_utils::*;

use civiclink::cache::{IssueCollection, UserCollection};
use civiclink::data::{
    CreateIssuePayload, IssuePriority, IssueQuery, IssueStatus, UpdateIssuePayload, UserQuery, UserRole,
};
use civiclink::error::ClientError;
use civiclink::views::{DispatcherBoard, Gate, LoadOutcome};
use pretty_assertions::assert_eq;

fn payload() -> CreateIssuePayload {
    CreateIssuePayload {
        title: "Graffiti".to_string(),
        description: "On the library wall".to_string(),
        priority: IssuePriority::Low,
        latitude: 49.0,
        longitude: -123.0,
    }
}

#[tokio::test]
async fn test_issue_operations_require_credential() {
    let harness = signed_out().await;
    let issues = IssueCollection::new(harness.client());

    assert_eq!(
        issues.create(None, &payload()).await.unwrap_err(),
        ClientError::unauthenticated("create an issue")
    );
    assert_eq!(
        issues.get(None, "i-1").await.unwrap_err(),
        ClientError::unauthenticated("view an issue")
    );
    assert_eq!(
        issues
            .update(None, "i-1", &UpdateIssuePayload::default())
            .await
            .unwrap_err(),
        ClientError::unauthenticated("update an issue")
    );
    assert_eq!(
        issues
            .update_status(None, "i-1", IssueStatus::Closed)
            .await
            .unwrap_err(),
        ClientError::unauthenticated("update an issue")
    );
    assert_eq!(
        issues.list_all(None, &IssueQuery::default()).await.unwrap_err(),
        ClientError::unauthenticated("view issues")
    );

    assert_eq!(harness.transport.calls(), 0);
}

#[tokio::test]
async fn test_user_operations_require_credential() {
    let harness = signed_out().await;
    let users = UserCollection::new(harness.client());

    let err = users
        .update_role(None, "u-1", UserRole::Admin)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "You must be logged in to update user roles.");
    assert!(err.is_local());

    assert_eq!(
        users.list(None, &UserQuery::default()).await.unwrap_err(),
        ClientError::unauthenticated("view users")
    );

    assert_eq!(harness.transport.calls(), 0);
}

#[tokio::test]
async fn test_own_issues_without_credential_are_empty() {
    let harness = signed_out().await;
    let issues = IssueCollection::new(harness.client());

    assert!(issues.list_mine(None).await.unwrap().is_empty());
    assert_eq!(harness.transport.calls(), 0);
}

#[tokio::test]
async fn test_signed_out_board_never_fetches() {
    let harness = signed_out().await;
    let board = DispatcherBoard::new(harness.session.clone(), 20);

    assert_eq!(board.refresh().await, LoadOutcome::Gated(Gate::SignInRequired));
    assert_eq!(
        board.change_status("i-1", IssueStatus::Open).await.unwrap_err(),
        ClientError::unauthenticated("update an issue")
    );
    assert_eq!(harness.transport.calls(), 0);
}
