//! Role-gated screens.
//!
//! Every screen evaluates the same ordered gate before touching the network:
//! session still initializing, then signed out, then wrong role. Only a
//! [`Gate::Granted`] screen fetches data or dispatches actions.

pub mod admin;
pub mod citizen;
pub mod dispatcher;

use crate::cache::{RefreshOutcome, RefreshTicket};
use crate::data::UserRole;
use crate::error::ClientError;
use crate::session::{Session, SessionSnapshot, SessionStore};

pub use admin::{AdminOverview, AdminUsers};
pub use citizen::{CitizenDashboard, CreateIssueView, EditIssueView, IssueDraft};
pub use dispatcher::DispatcherBoard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    CitizenDashboard,
    IssueCreate,
    IssueEdit,
    DispatcherBoard,
    AdminOverview,
    AdminUsers,
}

impl Screen {
    pub fn required_roles(&self) -> &'static [UserRole] {
        match self {
            Self::CitizenDashboard | Self::IssueCreate | Self::IssueEdit => &[UserRole::Citizen],
            Self::DispatcherBoard => &[UserRole::Dispatcher, UserRole::Admin],
            Self::AdminOverview | Self::AdminUsers => &[UserRole::Admin],
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::CitizenDashboard => "My issues",
            Self::IssueCreate => "Report an issue",
            Self::IssueEdit => "Edit issue",
            Self::DispatcherBoard => "Dispatcher board",
            Self::AdminOverview => "Admin overview",
            Self::AdminUsers => "User management",
        }
    }

    pub fn permits(&self, role: UserRole) -> bool {
        self.required_roles().contains(&role)
    }

    /// Evaluate the gate against a session snapshot.
    pub fn gate(&self, snapshot: &SessionSnapshot) -> Gate {
        if snapshot.initializing {
            return Gate::Loading;
        }

        let Some(session) = &snapshot.session else {
            return Gate::SignInRequired;
        };

        if !self.permits(session.user.role) {
            return Gate::Forbidden {
                screen: *self,
                actual: session.user.role,
            };
        }

        Gate::Granted(session.clone())
    }
}

fn audience(role: UserRole) -> &'static str {
    match role {
        UserRole::Citizen => "citizens",
        UserRole::Dispatcher => "dispatchers",
        UserRole::Admin => "administrators",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    Loading,
    SignInRequired,
    Forbidden { screen: Screen, actual: UserRole },
    Granted(Session),
}

impl Gate {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    /// Placeholder text for a screen that may not render, `None` when granted.
    pub fn placeholder(&self) -> Option<String> {
        match self {
            Self::Loading => Some("Loading CivicLink…".to_string()),
            Self::SignInRequired => Some("You must be signed in to access this page.".to_string()),
            Self::Forbidden { screen, actual } => {
                let required = screen
                    .required_roles()
                    .iter()
                    .map(|r| audience(*r))
                    .collect::<Vec<_>>()
                    .join(" or ");
                Some(format!(
                    "You are signed in as {}, but {} is only available to {}.",
                    actual,
                    screen.title().to_lowercase(),
                    required
                ))
            }
            Self::Granted(_) => None,
        }
    }

    /// The session for a granted gate; otherwise the error an action should raise.
    pub fn into_session(self, action: &'static str) -> Result<Session, ClientError> {
        match self {
            Self::Granted(session) => Ok(session),
            Self::Loading | Self::SignInRequired => Err(ClientError::unauthenticated(action)),
            forbidden @ Self::Forbidden { .. } => Err(ClientError::Forbidden(
                forbidden.placeholder().unwrap_or_default(),
            )),
        }
    }
}

/// Result of asking a screen to load its data.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The gate did not pass; nothing was fetched.
    Gated(Gate),
    Refreshed(RefreshOutcome),
}

impl LoadOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Refreshed(RefreshOutcome::Applied))
    }

    /// Text a screen should show instead of (or above) its data.
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Gated(gate) => gate.placeholder(),
            Self::Refreshed(RefreshOutcome::Failed(e)) => Some(e.to_string()),
            Self::Refreshed(_) => None,
        }
    }
}

/// Pass the gate and take a refresh ticket, both before the first await.
///
/// Taking the ticket synchronously is what lets a later refresh supersede
/// this one even if this future has not been polled yet.
pub(crate) fn start(
    screen: Screen,
    session: &SessionStore,
    begin: impl FnOnce() -> RefreshTicket,
) -> Result<(Session, RefreshTicket), Gate> {
    match screen.gate(&session.snapshot()) {
        Gate::Granted(session) => Ok((session, begin())),
        gate => Err(gate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Credential;
    use crate::data::Identity;

    fn snapshot(initializing: bool, role: Option<UserRole>) -> SessionSnapshot {
        SessionSnapshot {
            initializing,
            session: role.map(|role| Session {
                access_token: Credential::new("token"),
                user: Identity {
                    id: "u-1".to_string(),
                    name: Some("Sam".to_string()),
                    email: "sam@example.com".to_string(),
                    role,
                },
            }),
        }
    }

    #[test]
    fn test_initializing_wins_over_everything() {
        let gate = Screen::AdminUsers.gate(&snapshot(true, Some(UserRole::Admin)));
        assert_eq!(gate, Gate::Loading);
        assert_eq!(gate.placeholder().as_deref(), Some("Loading CivicLink…"));
    }

    #[test]
    fn test_signed_out() {
        let gate = Screen::CitizenDashboard.gate(&snapshot(false, None));
        assert_eq!(gate, Gate::SignInRequired);
    }

    #[test]
    fn test_forbidden_names_required_roles() {
        let gate = Screen::DispatcherBoard.gate(&snapshot(false, Some(UserRole::Citizen)));
        assert_eq!(
            gate.placeholder().as_deref(),
            Some("You are signed in as CITIZEN, but dispatcher board is only available to dispatchers or administrators.")
        );

        let gate = Screen::AdminOverview.gate(&snapshot(false, Some(UserRole::Dispatcher)));
        assert!(gate.placeholder().unwrap().ends_with("only available to administrators."));
    }

    #[test]
    fn test_permission_table() {
        use Screen::*;
        use UserRole::*;

        let cases = [
            (CitizenDashboard, [true, false, false]),
            (IssueCreate, [true, false, false]),
            (IssueEdit, [true, false, false]),
            (DispatcherBoard, [false, true, true]),
            (AdminOverview, [false, false, true]),
            (AdminUsers, [false, false, true]),
        ];

        for (screen, expected) in cases {
            let actual = [screen.permits(Citizen), screen.permits(Dispatcher), screen.permits(Admin)];
            assert_eq!(actual, expected, "{:?}", screen);
        }
    }

    #[test]
    fn test_into_session_errors() {
        let err = Gate::SignInRequired.into_session("report an issue").unwrap_err();
        assert_eq!(err, ClientError::unauthenticated("report an issue"));

        let err = Screen::IssueCreate
            .gate(&snapshot(false, Some(UserRole::Admin)))
            .into_session("report an issue")
            .unwrap_err();
        assert!(matches!(err, ClientError::Forbidden(_)));
    }
}
