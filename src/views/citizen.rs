//! Citizen screens: own issues, reporting a new issue, editing an open one.

use super::{LoadOutcome, Screen};
use crate::cache::IssueCollection;
use crate::data::{CreateIssuePayload, Issue, IssuePriority, UpdateIssuePayload};
use crate::error::{ClientError, ClientResult};
use crate::session::SessionStore;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

/// One line of the citizen dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueRow {
    pub issue: Issue,
    /// Only OPEN issues may still be edited by their reporter.
    pub editable: bool,
}

pub struct CitizenDashboard {
    session: Arc<SessionStore>,
    issues: IssueCollection,
}

impl CitizenDashboard {
    pub fn new(session: Arc<SessionStore>) -> Self {
        let issues = IssueCollection::new(session.client().clone());
        Self { session, issues }
    }

    pub fn gate(&self) -> super::Gate {
        Screen::CitizenDashboard.gate(&self.session.snapshot())
    }

    /// Reload the reporter's own issues.
    pub fn refresh(&self) -> impl Future<Output = LoadOutcome> + '_ {
        let started = super::start(Screen::CitizenDashboard, &self.session, || self.issues.begin_refresh());
        async move {
            match started {
                Ok((session, ticket)) => LoadOutcome::Refreshed(
                    self.issues
                        .refresh_mine(&ticket, Some(&session.access_token))
                        .await,
                ),
                Err(gate) => LoadOutcome::Gated(gate),
            }
        }
    }

    pub fn rows(&self) -> Vec<IssueRow> {
        self.issues
            .snapshot()
            .items
            .iter()
            .map(|issue| IssueRow {
                editable: issue.is_editable_by_reporter(),
                issue: issue.clone(),
            })
            .collect()
    }

    pub fn total_label(&self) -> String {
        let snapshot = self.issues.snapshot();
        if snapshot.loading {
            "Loading…".to_string()
        } else if snapshot.items.is_empty() {
            "No issues reported yet".to_string()
        } else {
            format!("Total: {}", snapshot.items.len())
        }
    }

    pub fn error(&self) -> Option<String> {
        self.issues.working_set().error()
    }

    /// Stop applying any refresh still in flight.
    pub fn unmount(&self) {
        self.issues.cancel_refresh();
    }
}

/// Raw form input for creating or editing an issue.
///
/// Coordinates are kept as typed text; they only become numbers once the
/// draft validates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueDraft {
    pub title: String,
    pub description: String,
    pub priority: IssuePriority,
    pub latitude: String,
    pub longitude: String,
}

fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl IssueDraft {
    pub fn from_issue(issue: &Issue) -> Self {
        Self {
            title: issue.title.clone(),
            description: issue.description.clone(),
            priority: issue.priority,
            latitude: issue.latitude.map(|v| v.to_string()).unwrap_or_default(),
            longitude: issue.longitude.map(|v| v.to_string()).unwrap_or_default(),
        }
    }

    /// Check the draft locally and build the outgoing body.
    pub fn validate(&self) -> ClientResult<CreateIssuePayload> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ClientError::validation("Title is required."));
        }

        let description = self.description.trim();
        if description.is_empty() {
            return Err(ClientError::validation("Description is required."));
        }

        let (Some(latitude), Some(longitude)) = (parse_coordinate(&self.latitude), parse_coordinate(&self.longitude))
        else {
            return Err(ClientError::validation(
                "Please enter valid numeric latitude and longitude.",
            ));
        };

        Ok(CreateIssuePayload {
            title: title.to_string(),
            description: description.to_string(),
            priority: self.priority,
            latitude,
            longitude,
        })
    }
}

pub struct CreateIssueView {
    session: Arc<SessionStore>,
    issues: IssueCollection,
}

impl CreateIssueView {
    pub fn new(session: Arc<SessionStore>) -> Self {
        let issues = IssueCollection::new(session.client().clone());
        Self { session, issues }
    }

    pub fn gate(&self) -> super::Gate {
        Screen::IssueCreate.gate(&self.session.snapshot())
    }

    /// Validate and submit. Nothing reaches the network unless the draft is valid.
    pub async fn submit(&self, draft: &IssueDraft) -> ClientResult<Issue> {
        let session = self.gate().into_session("create an issue")?;
        let payload = draft.validate()?;

        self.issues
            .create(Some(&session.access_token), &payload)
            .await
    }
}

pub struct EditIssueView {
    session: Arc<SessionStore>,
    issues: IssueCollection,
    issue_id: String,
    loaded: Mutex<Option<Issue>>,
}

impl EditIssueView {
    pub fn new(session: Arc<SessionStore>, issue_id: impl Into<String>) -> Self {
        let issues = IssueCollection::new(session.client().clone());
        Self {
            session,
            issues,
            issue_id: issue_id.into(),
            loaded: Mutex::new(None),
        }
    }

    pub fn gate(&self) -> super::Gate {
        Screen::IssueEdit.gate(&self.session.snapshot())
    }

    pub fn issue_id(&self) -> &str {
        &self.issue_id
    }

    pub fn issue(&self) -> Option<Issue> {
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fetch the issue and return a draft prefilled from it.
    pub async fn load(&self) -> ClientResult<IssueDraft> {
        let session = self.gate().into_session("view an issue")?;

        let issue = self
            .issues
            .get(Some(&session.access_token), &self.issue_id)
            .await?;
        let draft = IssueDraft::from_issue(&issue);

        *self.loaded.lock().unwrap_or_else(PoisonError::into_inner) = Some(issue);
        Ok(draft)
    }

    /// Validate and send the edited fields.
    ///
    /// Refused locally once the issue has left OPEN.
    pub async fn submit(&self, draft: &IssueDraft) -> ClientResult<Issue> {
        let session = self.gate().into_session("update an issue")?;

        if let Some(issue) = self.issue() {
            if !issue.is_editable_by_reporter() {
                return Err(ClientError::validation(format!(
                    "This issue is {} and can no longer be edited.",
                    issue.status.label()
                )));
            }
        }

        let payload = UpdateIssuePayload::from(draft.validate()?);

        let updated = self
            .issues
            .update(Some(&session.access_token), &self.issue_id, &payload)
            .await?;

        *self.loaded.lock().unwrap_or_else(PoisonError::into_inner) = Some(updated.clone());
        Ok(updated)
    }
}
