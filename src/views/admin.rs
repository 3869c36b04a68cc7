//! Admin screens: issue statistics and user role management.

use super::{Gate, LoadOutcome, Screen};
use crate::cache::{IssueCollection, RefreshOutcome, UserCollection};
use crate::data::{IssueQuery, IssueStats, UserQuery, UserRole, UserSummary};
use crate::error::ClientResult;
use crate::session::SessionStore;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub struct AdminOverview {
    session: Arc<SessionStore>,
    issues: IssueCollection,
    users: UserCollection,
    page_size: u32,
    users_total: Mutex<Option<u64>>,
}

impl AdminOverview {
    pub fn new(session: Arc<SessionStore>, page_size: u32) -> Self {
        let client = session.client().clone();
        Self {
            session,
            issues: IssueCollection::new(client.clone()),
            users: UserCollection::new(client),
            page_size,
            users_total: Mutex::new(None),
        }
    }

    pub fn gate(&self) -> Gate {
        Screen::AdminOverview.gate(&self.session.snapshot())
    }

    /// Load the first page of issues and the user count side by side.
    ///
    /// Only the issue load decides the outcome; a failed user count just
    /// leaves [`Self::users_total`] empty.
    pub fn refresh(&self) -> impl Future<Output = LoadOutcome> + '_ {
        let issue_query = IssueQuery {
            page: 1,
            page_size: self.page_size,
            ..IssueQuery::default()
        };
        let user_query = UserQuery { page: 1, page_size: 1 };

        let started = super::start(Screen::AdminOverview, &self.session, || {
            self.issues.begin_refresh()
        })
        .map(|(session, ticket)| (session, ticket, self.users.begin_refresh()));

        async move {
            let (session, issue_ticket, user_ticket) = match started {
                Ok(started) => started,
                Err(gate) => return LoadOutcome::Gated(gate),
            };
            let credential = Some(&session.access_token);

            let (issues, users) = futures::join!(
                self.issues.refresh_all(&issue_ticket, credential, &issue_query),
                self.users.refresh(&user_ticket, credential, &user_query),
            );

            match users {
                RefreshOutcome::Applied => {
                    *self.users_total_mut() = Some(self.users.snapshot().total);
                }
                RefreshOutcome::Failed(e) => {
                    tracing::warn!("Could not count users: {}", e);
                    *self.users_total_mut() = None;
                }
                RefreshOutcome::Superseded => {}
            }

            LoadOutcome::Refreshed(issues)
        }
    }

    fn users_total_mut(&self) -> MutexGuard<'_, Option<u64>> {
        self.users_total.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stats(&self) -> IssueStats {
        let snapshot = self.issues.snapshot();
        IssueStats::from_issues(snapshot.total, &snapshot.items)
    }

    pub fn users_total(&self) -> Option<u64> {
        *self.users_total_mut()
    }

    pub fn error(&self) -> Option<String> {
        self.issues.working_set().error()
    }

    pub fn unmount(&self) {
        self.issues.cancel_refresh();
        self.users.cancel_refresh();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    pub user: UserSummary,
    pub busy: bool,
}

pub struct AdminUsers {
    session: Arc<SessionStore>,
    users: UserCollection,
    query: Mutex<UserQuery>,
}

impl AdminUsers {
    pub fn new(session: Arc<SessionStore>, page_size: u32) -> Self {
        let users = UserCollection::new(session.client().clone());
        Self {
            session,
            users,
            query: Mutex::new(UserQuery { page: 1, page_size }),
        }
    }

    pub fn gate(&self) -> Gate {
        Screen::AdminUsers.gate(&self.session.snapshot())
    }

    pub fn query(&self) -> UserQuery {
        *self.query.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_page(&self, page: u32) -> UserQuery {
        let mut query = self.query.lock().unwrap_or_else(PoisonError::into_inner);
        query.page = page.max(1);
        *query
    }

    pub fn refresh(&self) -> impl Future<Output = LoadOutcome> + '_ {
        let query = self.query();
        let started = super::start(Screen::AdminUsers, &self.session, || self.users.begin_refresh());
        async move {
            match started {
                Ok((session, ticket)) => LoadOutcome::Refreshed(
                    self.users
                        .refresh(&ticket, Some(&session.access_token), &query)
                        .await,
                ),
                Err(gate) => LoadOutcome::Gated(gate),
            }
        }
    }

    pub async fn change_role(&self, user_id: &str, role: UserRole) -> ClientResult<()> {
        let session = self.gate().into_session("update user roles")?;
        self.users
            .update_role(Some(&session.access_token), user_id, role)
            .await
    }

    pub fn rows(&self) -> Vec<UserRow> {
        let snapshot = self.users.snapshot();
        snapshot
            .items
            .iter()
            .map(|user| UserRow {
                busy: snapshot.is_busy(&user.id),
                user: user.clone(),
            })
            .collect()
    }

    pub fn total_label(&self) -> String {
        let snapshot = self.users.snapshot();
        if snapshot.loading {
            "Loading users…".to_string()
        } else if snapshot.total > 0 {
            format!("Showing {} of {} users", snapshot.items.len(), snapshot.total)
        } else {
            "No users found".to_string()
        }
    }

    pub fn error(&self) -> Option<String> {
        self.users.working_set().error()
    }

    pub fn unmount(&self) {
        self.users.cancel_refresh();
    }
}
