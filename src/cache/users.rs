//! User collection for the admin user-management view.

use super::{RefreshOutcome, RefreshTicket, Snapshot, WorkingSet};
use crate::api::{self, require_credential, ApiClient, Credential};
use crate::data::{Page, UserQuery, UserRole, UserSummary};
use crate::error::ClientResult;

#[derive(Debug)]
pub struct UserCollection {
    client: ApiClient,
    set: WorkingSet<UserSummary>,
}

impl UserCollection {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            set: WorkingSet::new(),
        }
    }

    pub fn working_set(&self) -> &WorkingSet<UserSummary> {
        &self.set
    }

    pub fn snapshot(&self) -> Snapshot<UserSummary> {
        self.set.snapshot()
    }

    pub fn begin_refresh(&self) -> RefreshTicket {
        self.set.begin_refresh()
    }

    pub fn cancel_refresh(&self) {
        self.set.cancel_refresh()
    }

    pub async fn list(&self, credential: Option<&Credential>, query: &UserQuery) -> ClientResult<Page<UserSummary>> {
        api::users::list(&self.client, credential, query).await
    }

    pub async fn refresh(
        &self,
        ticket: &RefreshTicket,
        credential: Option<&Credential>,
        query: &UserQuery,
    ) -> RefreshOutcome {
        self.set.refresh_with(ticket, self.list(credential, query)).await
    }

    /// Optimistically change a user's role.
    ///
    /// Choosing the role the user already has does nothing: no local write
    /// and no request.
    pub async fn update_role(&self, credential: Option<&Credential>, user_id: &str, role: UserRole) -> ClientResult<()> {
        let credential = require_credential(credential, "update user roles")?;

        if self.set.get(user_id).is_some_and(|user| user.role == role) {
            tracing::debug!("User {} already has role {}, skipping", user_id, role);
            return Ok(());
        }

        self.set
            .mutate(
                user_id,
                |user| user.role = role,
                api::users::update_role(&self.client, Some(credential), user_id, role),
            )
            .await
    }
}
