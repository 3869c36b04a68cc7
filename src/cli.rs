//! Command-line front end: one subcommand per screen action.

use crate::config::Config;
use crate::data::transitions::is_offered;
use crate::data::{Filter, IssuePriority, IssueStatus, UserRole};
use crate::session::SessionStore;
use crate::util::{format_timestamp, Table};
use crate::views::{
    AdminOverview, AdminUsers, CitizenDashboard, CreateIssueView, DispatcherBoard, EditIssueView, Gate,
    IssueDraft, LoadOutcome,
};
use anyhow::{bail, Result};
use clap::Subcommand;
use std::sync::Arc;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and remember the session
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show who is signed in
    Whoami,
    /// List the issues you reported
    Mine,
    /// Report a new issue
    Report {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long, default_value_t = IssuePriority::Medium)]
        priority: IssuePriority,
        #[arg(long, allow_hyphen_values = true)]
        latitude: String,
        #[arg(long, allow_hyphen_values = true)]
        longitude: String,
    },
    /// Edit one of your open issues; omitted fields keep their current value
    Edit {
        issue_id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<IssuePriority>,
        #[arg(long, allow_hyphen_values = true)]
        latitude: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        longitude: Option<String>,
    },
    /// Dispatcher board of all issues
    Board {
        #[arg(long, default_value_t = Filter::All)]
        status: Filter<IssueStatus>,
        #[arg(long, default_value_t = Filter::All)]
        priority: Filter<IssuePriority>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Move an issue to a new status
    SetStatus { issue_id: String, status: IssueStatus },
    /// Issue statistics
    Overview,
    /// List users
    Users {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Change a user's role
    SetRole { user_id: String, role: UserRole },
}

/// Bail with the placeholder text unless the gate passed.
fn ensure_granted(gate: Gate) -> Result<()> {
    match gate.placeholder() {
        Some(message) => bail!(message),
        None => Ok(()),
    }
}

fn ensure_loaded(outcome: LoadOutcome) -> Result<()> {
    match outcome.message() {
        Some(message) => bail!(message),
        None => Ok(()),
    }
}

fn read_password() -> Result<String> {
    use std::io::{self, Write};

    eprint!("Password: ");
    io::stderr().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

pub async fn run(config: &Config, session: Arc<SessionStore>, command: Command) -> Result<()> {
    match command {
        Command::Login { email, password } => {
            let password = match password {
                Some(p) => p,
                None => read_password()?,
            };
            let identity = session.login(email.trim(), &password).await?;
            println!("Signed in as {} ({})", identity.display_name(), identity.role.label());
        }

        Command::Logout => {
            session.logout().await;
            println!("Signed out.");
        }

        Command::Whoami => match session.identity() {
            Some(identity) => println!("{} <{}> {}", identity.display_name(), identity.email, identity.role),
            None => println!("Not signed in."),
        },

        Command::Mine => {
            let view = CitizenDashboard::new(session);
            ensure_loaded(view.refresh().await)?;

            let mut table = Table::new(["ID", "TITLE", "STATUS", "PRIORITY", "CREATED", ""]);
            for row in view.rows() {
                table.push_row([
                    row.issue.id.clone(),
                    row.issue.title.clone(),
                    row.issue.status.label().to_string(),
                    row.issue.priority.label().to_string(),
                    format_timestamp(&row.issue.created_at),
                    if row.editable { String::new() } else { "Locked".to_string() },
                ]);
            }
            if !table.is_empty() {
                println!("{}", table.render());
            }
            println!("{}", view.total_label());
        }

        Command::Report {
            title,
            description,
            priority,
            latitude,
            longitude,
        } => {
            let view = CreateIssueView::new(session);
            ensure_granted(view.gate())?;

            let draft = IssueDraft {
                title,
                description,
                priority,
                latitude,
                longitude,
            };
            let issue = view.submit(&draft).await?;
            println!("Reported issue {} ({})", issue.id, issue.status.label());
        }

        Command::Edit {
            issue_id,
            title,
            description,
            priority,
            latitude,
            longitude,
        } => {
            let view = EditIssueView::new(session, issue_id);
            ensure_granted(view.gate())?;

            let mut draft = view.load().await?;
            if let Some(title) = title {
                draft.title = title;
            }
            if let Some(description) = description {
                draft.description = description;
            }
            if let Some(priority) = priority {
                draft.priority = priority;
            }
            if let Some(latitude) = latitude {
                draft.latitude = latitude;
            }
            if let Some(longitude) = longitude {
                draft.longitude = longitude;
            }

            let issue = view.submit(&draft).await?;
            println!("Updated issue {}", issue.id);
        }

        Command::Board { status, priority, page } => {
            let view = DispatcherBoard::new(session, config.paging.dispatcher_page_size);
            view.set_status_filter(status);
            view.set_priority_filter(priority);
            view.set_page(page);
            ensure_loaded(view.refresh().await)?;

            let mut table = Table::new(["ID", "TITLE", "STATUS", "PRIORITY", "CREATED", "NEXT"]);
            for row in view.rows() {
                let next = row
                    .next
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                table.push_row([
                    row.issue.id.clone(),
                    row.issue.title.clone(),
                    row.issue.status.label().to_string(),
                    row.issue.priority.label().to_string(),
                    format_timestamp(&row.issue.created_at),
                    next,
                ]);
            }
            if !table.is_empty() {
                println!("{}", table.render());
            }
            println!("{}", view.total_label());
        }

        Command::SetStatus { issue_id, status } => {
            let view = DispatcherBoard::new(session, config.paging.dispatcher_page_size);
            ensure_granted(view.gate())?;

            if let Some(current) = view.current_status(&issue_id).await {
                if !is_offered(current, status) {
                    tracing::warn!("{} is not a usual next step from {}", status, current);
                }
            }

            view.change_status(&issue_id, status).await?;
            println!("Issue {} is now {}", issue_id, status.label());
        }

        Command::Overview => {
            let view = AdminOverview::new(session, config.paging.admin_overview_page_size);
            ensure_loaded(view.refresh().await)?;

            let stats = view.stats();
            println!("Total issues: {}", stats.total);
            println!("Active:       {}", stats.active());
            if let Some(users) = view.users_total() {
                println!("Total users:  {}", users);
            }
            if stats.total == 0 {
                println!("No issues found in the current dataset.");
                return Ok(());
            }

            let mut by_status = Table::new(["STATUS", "COUNT"]);
            for status in IssueStatus::all() {
                by_status.push_row([status.label().to_string(), stats.status_count(status).to_string()]);
            }
            println!("\n{}", by_status.render());

            let mut by_priority = Table::new(["PRIORITY", "COUNT"]);
            for priority in IssuePriority::all() {
                by_priority.push_row([priority.label().to_string(), stats.priority_count(priority).to_string()]);
            }
            println!("\n{}", by_priority.render());
        }

        Command::Users { page } => {
            let view = AdminUsers::new(session, config.paging.admin_users_page_size);
            view.set_page(page);
            ensure_loaded(view.refresh().await)?;

            let mut table = Table::new(["ID", "NAME", "EMAIL", "ROLE", "CREATED"]);
            for row in view.rows() {
                table.push_row([
                    row.user.id.clone(),
                    row.user.name.clone().unwrap_or_else(|| "-".to_string()),
                    row.user.email.clone(),
                    row.user.role.as_str().to_string(),
                    format_timestamp(&row.user.created_at),
                ]);
            }
            if !table.is_empty() {
                println!("{}", table.render());
            }
            println!("{}", view.total_label());
        }

        Command::SetRole { user_id, role } => {
            let view = AdminUsers::new(session, config.paging.admin_users_page_size);
            // Load the first page so choosing the current role is recognized locally.
            ensure_loaded(view.refresh().await)?;

            view.change_role(&user_id, role).await?;
            println!("User {} is now {}", user_id, role);
        }
    }

    Ok(())
}
