//! Next-status affordances offered on the dispatcher board.
//!
//! The server owns the real transition rules; this table only decides which
//! buttons a dispatcher sees for a given status.

use super::IssueStatus;

/// Statuses a dispatcher may move an issue to from `current`, in display order.
pub fn next_statuses(current: IssueStatus) -> &'static [IssueStatus] {
    use IssueStatus::*;

    match current {
        Open => &[InProgress, Resolved, Closed],
        InProgress => &[Resolved, Closed],
        Resolved => &[Open, Closed],
        Closed => &[Open],
    }
}

/// Whether `target` is offered as a next step from `current`.
pub fn is_offered(current: IssueStatus, target: IssueStatus) -> bool {
    next_statuses(current).contains(&target)
}
