//! Issue collection: the issue endpoints plus one view's working set.

use super::{RefreshOutcome, RefreshTicket, Snapshot, WorkingSet};
use crate::api::{self, require_credential, ApiClient, Credential};
use crate::data::{CreateIssuePayload, Issue, IssueQuery, IssueStatus, Page, UpdateIssuePayload};
use crate::error::ClientResult;

#[derive(Debug)]
pub struct IssueCollection {
    client: ApiClient,
    set: WorkingSet<Issue>,
}

impl IssueCollection {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            set: WorkingSet::new(),
        }
    }

    pub fn working_set(&self) -> &WorkingSet<Issue> {
        &self.set
    }

    pub fn snapshot(&self) -> Snapshot<Issue> {
        self.set.snapshot()
    }

    pub fn begin_refresh(&self) -> RefreshTicket {
        self.set.begin_refresh()
    }

    pub fn cancel_refresh(&self) {
        self.set.cancel_refresh()
    }

    // -------------------------------------------------------------------------
    // Remote operations
    // -------------------------------------------------------------------------

    pub async fn list_mine(&self, credential: Option<&Credential>) -> ClientResult<Vec<Issue>> {
        api::issues::list_mine(&self.client, credential).await
    }

    pub async fn list_all(&self, credential: Option<&Credential>, query: &IssueQuery) -> ClientResult<Page<Issue>> {
        api::issues::list_all(&self.client, credential, query).await
    }

    pub async fn create(&self, credential: Option<&Credential>, payload: &CreateIssuePayload) -> ClientResult<Issue> {
        let issue = api::issues::create(&self.client, credential, payload).await?;
        tracing::info!("Created issue {} ({})", issue.id, issue.title);
        Ok(issue)
    }

    pub async fn get(&self, credential: Option<&Credential>, issue_id: &str) -> ClientResult<Issue> {
        api::issues::get(&self.client, credential, issue_id).await
    }

    pub async fn update(
        &self,
        credential: Option<&Credential>,
        issue_id: &str,
        payload: &UpdateIssuePayload,
    ) -> ClientResult<Issue> {
        api::issues::update(&self.client, credential, issue_id, payload).await
    }

    /// Optimistically set an issue's status, rolling back if the server refuses.
    pub async fn update_status(
        &self,
        credential: Option<&Credential>,
        issue_id: &str,
        status: IssueStatus,
    ) -> ClientResult<()> {
        let credential = require_credential(credential, "update an issue")?;

        self.set
            .mutate(
                issue_id,
                |issue| issue.status = status,
                api::issues::update_status(&self.client, Some(credential), issue_id, status),
            )
            .await
    }

    // -------------------------------------------------------------------------
    // Working-set refreshes
    // -------------------------------------------------------------------------

    pub async fn refresh_mine(&self, ticket: &RefreshTicket, credential: Option<&Credential>) -> RefreshOutcome {
        let fetch = async {
            self.list_mine(credential).await.map(|issues| {
                let count = issues.len();
                Page {
                    items: issues,
                    total: count as u64,
                    page: 1,
                    page_size: u32::try_from(count).unwrap_or(u32::MAX),
                }
            })
        };
        self.set.refresh_with(ticket, fetch).await
    }

    pub async fn refresh_all(
        &self,
        ticket: &RefreshTicket,
        credential: Option<&Credential>,
        query: &IssueQuery,
    ) -> RefreshOutcome {
        self.set
            .refresh_with(ticket, self.list_all(credential, query))
            .await
    }
}
