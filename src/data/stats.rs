//! Aggregate counts shown on the admin overview.

use super::{Issue, IssuePriority, IssueStatus};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueStats {
    /// Total reported by the server, which may exceed the fetched page.
    pub total: u64,
    pub by_status: BTreeMap<IssueStatus, usize>,
    pub by_priority: BTreeMap<IssuePriority, usize>,
}

impl IssueStats {
    pub fn from_issues(total: u64, issues: &[Issue]) -> Self {
        let mut stats = Self {
            total,
            ..Default::default()
        };
        for issue in issues {
            *stats.by_status.entry(issue.status).or_default() += 1;
            *stats.by_priority.entry(issue.priority).or_default() += 1;
        }
        stats
    }

    pub fn status_count(&self, status: IssueStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn priority_count(&self, priority: IssuePriority) -> usize {
        self.by_priority.get(&priority).copied().unwrap_or(0)
    }

    /// Issues still needing attention (open or being worked on).
    pub fn active(&self) -> usize {
        self.status_count(IssueStatus::Open) + self.status_count(IssueStatus::InProgress)
    }
}
