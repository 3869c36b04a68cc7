//! Dispatcher board: every issue, filtered and paged, with status actions.

use super::{Gate, LoadOutcome, Screen};
use crate::cache::IssueCollection;
use crate::data::{next_statuses, Filter, Issue, IssuePriority, IssueQuery, IssueStatus};
use crate::error::ClientResult;
use crate::session::SessionStore;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq)]
pub struct BoardRow {
    pub issue: Issue,
    /// Status changes offered from the current status.
    pub next: &'static [IssueStatus],
    /// A status change for this row is in flight.
    pub busy: bool,
}

pub struct DispatcherBoard {
    session: Arc<SessionStore>,
    issues: IssueCollection,
    query: Mutex<IssueQuery>,
}

impl DispatcherBoard {
    pub fn new(session: Arc<SessionStore>, page_size: u32) -> Self {
        let issues = IssueCollection::new(session.client().clone());
        Self {
            session,
            issues,
            query: Mutex::new(IssueQuery {
                page_size,
                ..IssueQuery::default()
            }),
        }
    }

    fn query_mut(&self) -> MutexGuard<'_, IssueQuery> {
        self.query.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn gate(&self) -> Gate {
        Screen::DispatcherBoard.gate(&self.session.snapshot())
    }

    pub fn query(&self) -> IssueQuery {
        *self.query_mut()
    }

    /// Changing a filter always goes back to the first page.
    pub fn set_status_filter(&self, status: Filter<IssueStatus>) -> IssueQuery {
        let mut query = self.query_mut();
        query.status = status;
        query.page = 1;
        *query
    }

    pub fn set_priority_filter(&self, priority: Filter<IssuePriority>) -> IssueQuery {
        let mut query = self.query_mut();
        query.priority = priority;
        query.page = 1;
        *query
    }

    pub fn set_page(&self, page: u32) -> IssueQuery {
        let mut query = self.query_mut();
        query.page = page.max(1);
        *query
    }

    /// Reload with the filters as they are right now.
    ///
    /// The query and ticket are captured when this is called, not when the
    /// future is first polled, so calling it again supersedes this load.
    pub fn refresh(&self) -> impl Future<Output = LoadOutcome> + '_ {
        let query = self.query();
        let started = super::start(Screen::DispatcherBoard, &self.session, || self.issues.begin_refresh());
        async move {
            match started {
                Ok((session, ticket)) => LoadOutcome::Refreshed(
                    self.issues
                        .refresh_all(&ticket, Some(&session.access_token), &query)
                        .await,
                ),
                Err(gate) => LoadOutcome::Gated(gate),
            }
        }
    }

    /// Move an issue to `status`, showing the change before the server confirms it.
    pub async fn change_status(&self, issue_id: &str, status: IssueStatus) -> ClientResult<()> {
        let session = self.gate().into_session("update an issue")?;
        self.issues
            .update_status(Some(&session.access_token), issue_id, status)
            .await
    }

    /// Status of one issue as the server reports it right now.
    pub async fn current_status(&self, issue_id: &str) -> Option<IssueStatus> {
        let session = self.gate().into_session("view an issue").ok()?;
        match self.issues.get(Some(&session.access_token), issue_id).await {
            Ok(issue) => Some(issue.status),
            Err(e) => {
                tracing::debug!("Could not look up issue {}: {}", issue_id, e);
                None
            }
        }
    }

    pub fn rows(&self) -> Vec<BoardRow> {
        let snapshot = self.issues.snapshot();
        snapshot
            .items
            .iter()
            .map(|issue| BoardRow {
                next: next_statuses(issue.status),
                busy: snapshot.is_busy(&issue.id),
                issue: issue.clone(),
            })
            .collect()
    }

    pub fn total(&self) -> u64 {
        self.issues.snapshot().total
    }

    pub fn total_label(&self) -> String {
        let snapshot = self.issues.snapshot();
        if snapshot.total > 0 {
            format!("Showing {} of {} issues", snapshot.items.len(), snapshot.total)
        } else if snapshot.loading {
            String::new()
        } else {
            "No issues found".to_string()
        }
    }

    pub fn is_loading(&self) -> bool {
        self.issues.snapshot().loading
    }

    pub fn error(&self) -> Option<String> {
        self.issues.working_set().error()
    }

    pub fn unmount(&self) {
        self.issues.cancel_refresh();
    }
}
