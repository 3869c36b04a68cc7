//! Tests for stale refresh suppression
//!
//! When an older listing request resolves after a newer one, the newer
//! result must stay on screen. Closing a view suppresses whatever is still
//! in flight, and a failed refresh keeps the previous list.

mod test_utils;
use test_utils::*;

use civiclink::api::HttpMethod;
use civiclink::cache::RefreshOutcome;
use civiclink::data::{Filter, IssuePriority, IssueStatus, UserRole};
use civiclink::views::{AdminUsers, DispatcherBoard, LoadOutcome};
use pretty_assertions::assert_eq;
use serde_json::json;

fn ids(board: &DispatcherBoard) -> Vec<String> {
    board.rows().into_iter().map(|r| r.issue.id).collect()
}

#[tokio::test]
async fn test_older_refresh_cannot_clobber_newer() {
    let harness = signed_in(UserRole::Dispatcher).await;
    let release_older = harness.transport.respond_held(
        HttpMethod::Get,
        "status=OPEN",
        200,
        json!({ "data": [issue_json("i-open", "OPEN", "HIGH")], "total": 1 }),
    );
    harness.transport.respond_json(
        HttpMethod::Get,
        "status=RESOLVED",
        200,
        json!({ "items": [issue_json("i-done", "RESOLVED", "LOW")], "total": 9 }),
    );

    let board = DispatcherBoard::new(harness.session.clone(), 20);

    board.set_status_filter(Filter::Only(IssueStatus::Open));
    let older = board.refresh();
    board.set_status_filter(Filter::Only(IssueStatus::Resolved));
    let newer = board.refresh();

    let (older, newer) = futures::join!(older, async {
        let outcome = newer.await;
        release_older.send(()).unwrap();
        outcome
    });

    assert_eq!(older, LoadOutcome::Refreshed(RefreshOutcome::Superseded));
    assert_eq!(newer, LoadOutcome::Refreshed(RefreshOutcome::Applied));

    assert_eq!(ids(&board), vec!["i-done".to_string()]);
    assert_eq!(board.total(), 9);
    assert_eq!(board.query().status, Filter::Only(IssueStatus::Resolved));
    assert_eq!(board.total_label(), "Showing 1 of 9 issues");
    assert!(!board.is_loading());
    assert_eq!(harness.transport.calls(), 2);
}

#[tokio::test]
async fn test_filter_change_resets_page() {
    let harness = signed_in(UserRole::Admin).await;
    let board = DispatcherBoard::new(harness.session.clone(), 20);

    board.set_page(3);
    assert_eq!(board.query().page, 3);

    let query = board.set_priority_filter(Filter::Only(IssuePriority::High));
    assert_eq!(query.page, 1);
    assert_eq!(query.priority, Filter::Only(IssuePriority::High));

    board.set_page(0);
    assert_eq!(board.query().page, 1);
}

#[tokio::test]
async fn test_unmount_suppresses_in_flight_refresh() {
    let harness = signed_in(UserRole::Dispatcher).await;
    let release = harness.transport.respond_held(
        HttpMethod::Get,
        "/issues?",
        200,
        json!([issue_json("i-1", "OPEN", "LOW")]),
    );
    let board = DispatcherBoard::new(harness.session.clone(), 20);

    let (outcome, ()) = futures::join!(board.refresh(), async {
        board.unmount();
        release.send(()).unwrap();
    });

    assert_eq!(outcome, LoadOutcome::Refreshed(RefreshOutcome::Superseded));
    assert!(board.rows().is_empty());
    assert_eq!(board.total_label(), "No issues found");
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_list() {
    let harness = signed_in(UserRole::Dispatcher).await;
    harness.transport.respond_json(
        HttpMethod::Get,
        "/issues?",
        200,
        json!([issue_json("i-1", "OPEN", "LOW"), issue_json("i-2", "CLOSED", "LOW")]),
    );
    let board = DispatcherBoard::new(harness.session.clone(), 20);
    assert!(board.refresh().await.is_applied());

    harness
        .transport
        .fail_network(HttpMethod::Get, "/issues?", "connection reset");
    let outcome = board.refresh().await;

    assert_eq!(
        outcome.message().as_deref(),
        Some("Network error: connection reset")
    );
    assert_eq!(ids(&board), vec!["i-1".to_string(), "i-2".to_string()]);
    assert_eq!(board.error().as_deref(), Some("Network error: connection reset"));
}

#[tokio::test]
async fn test_user_page_refresh_and_labels() {
    let harness = signed_in(UserRole::Admin).await;
    harness.transport.respond_json(
        HttpMethod::Get,
        "/users?page=2&pageSize=50",
        200,
        json!({ "data": [user_json("u-51", "CITIZEN")], "total": 51, "page": 2 }),
    );
    let users = AdminUsers::new(harness.session.clone(), 50);
    assert_eq!(users.total_label(), "No users found");

    users.set_page(2);
    assert!(users.refresh().await.is_applied());

    assert_eq!(users.rows().len(), 1);
    assert_eq!(users.total_label(), "Showing 1 of 51 users");
}
