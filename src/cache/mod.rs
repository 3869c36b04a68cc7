//! View-scoped working sets with optimistic mutation and stale-refresh
//! suppression.
//!
//! A [`WorkingSet`] holds the entities a view is showing as a copy-on-write
//! `Arc<Vec<T>>`. Mutations publish a tentative copy immediately and swap
//! the previous `Arc` back if the remote call fails. Refreshes carry a
//! [`RefreshTicket`]; starting a new refresh cancels the previous ticket so a
//! slow, older response can never overwrite a newer one.

pub mod issues;
pub mod users;

use crate::data::{Issue, Page, UserSummary};
use crate::error::{ClientError, ClientResult};
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

pub use issues::IssueCollection;
pub use users::UserCollection;

/// Anything a working set can hold.
pub trait Entity: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
}

impl Entity for Issue {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for UserSummary {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Handle for one refresh invocation.
#[derive(Debug, Clone)]
pub struct RefreshTicket {
    token: CancellationToken,
}

impl RefreshTicket {
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// What happened to a refresh result.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The fetched page replaced the working set.
    Applied,
    /// A newer refresh started (or the view closed) first; the result was dropped.
    Superseded,
    /// The fetch failed; the previous working set was kept.
    Failed(ClientError),
}

impl RefreshOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Point-in-time view of a working set.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub items: Arc<Vec<T>>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub loading: bool,
    pub error: Option<String>,
    pub busy: HashSet<String>,
}

impl<T> Snapshot<T> {
    pub fn is_busy(&self, id: &str) -> bool {
        self.busy.contains(id)
    }
}

#[derive(Debug)]
struct State<T> {
    items: Arc<Vec<T>>,
    total: u64,
    page: u32,
    page_size: u32,
    loading: bool,
    error: Option<String>,
    busy: HashSet<String>,
    current_refresh: Option<CancellationToken>,
    /// Bumped every time a refresh replaces the items.
    generation: u64,
}

#[derive(Debug)]
pub struct WorkingSet<T> {
    state: Mutex<State<T>>,
}

impl<T> Default for WorkingSet<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                items: Arc::new(Vec::new()),
                total: 0,
                page: 1,
                page_size: 0,
                loading: false,
                error: None,
                busy: HashSet::new(),
                current_refresh: None,
                generation: 0,
            }),
        }
    }
}

/// Clears an entity's busy flag however the mutation ends, including when
/// its future is dropped mid-flight.
struct BusyGuard<'a, T> {
    set: &'a WorkingSet<T>,
    id: String,
}

impl<T> Drop for BusyGuard<'_, T> {
    fn drop(&mut self) {
        self.set.lock().busy.remove(&self.id);
    }
}

impl<T> WorkingSet<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Entity> WorkingSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Snapshot<T> {
        let state = self.lock();
        Snapshot {
            items: Arc::clone(&state.items),
            total: state.total,
            page: state.page,
            page_size: state.page_size,
            loading: state.loading,
            error: state.error.clone(),
            busy: state.busy.clone(),
        }
    }

    pub fn items(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.lock().items)
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.lock().items.iter().find(|item| item.id() == id).cloned()
    }

    pub fn is_busy(&self, id: &str) -> bool {
        self.lock().busy.contains(id)
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn clear_error(&self) {
        self.lock().error = None;
    }

    // -------------------------------------------------------------------------
    // Refresh
    // -------------------------------------------------------------------------

    /// Start a refresh, superseding any refresh still in flight.
    pub fn begin_refresh(&self) -> RefreshTicket {
        let token = CancellationToken::new();
        let mut state = self.lock();
        if let Some(previous) = state.current_refresh.replace(token.clone()) {
            previous.cancel();
        }
        state.loading = true;
        state.error = None;
        RefreshTicket { token }
    }

    /// Suppress whatever refresh is in flight, e.g. because the view closed.
    pub fn cancel_refresh(&self) {
        let mut state = self.lock();
        if let Some(previous) = state.current_refresh.take() {
            previous.cancel();
        }
        state.loading = false;
    }

    /// Apply a refresh result unless its ticket was superseded.
    ///
    /// A failed refresh records the message and leaves the items untouched.
    pub fn commit_refresh(&self, ticket: &RefreshTicket, result: ClientResult<Page<T>>) -> RefreshOutcome {
        let mut state = self.lock();

        if ticket.is_cancelled() {
            tracing::debug!("Dropping superseded refresh result");
            return RefreshOutcome::Superseded;
        }

        state.current_refresh = None;
        state.loading = false;

        match result {
            Ok(page) => {
                state.items = Arc::new(page.items);
                state.total = page.total;
                state.page = page.page;
                state.page_size = page.page_size;
                state.error = None;
                state.generation += 1;
                RefreshOutcome::Applied
            }
            Err(e) => {
                state.error = Some(e.to_string());
                RefreshOutcome::Failed(e)
            }
        }
    }

    /// Fetch and commit in one step; the ticket must come from [`Self::begin_refresh`].
    pub async fn refresh_with<Fut>(&self, ticket: &RefreshTicket, fetch: Fut) -> RefreshOutcome
    where
        Fut: Future<Output = ClientResult<Page<T>>>,
    {
        let result = fetch.await;
        self.commit_refresh(ticket, result)
    }

    // -------------------------------------------------------------------------
    // Optimistic mutation
    // -------------------------------------------------------------------------

    /// Apply `apply` to entity `id` right away, then await `remote`.
    ///
    /// On failure the whole working set is restored to the snapshot taken just
    /// before the tentative write, and the error message is recorded. If a
    /// refresh replaced the items while the call was in flight, the newer
    /// items stay as they are.
    pub async fn mutate<F, Fut>(&self, id: &str, apply: F, remote: Fut) -> ClientResult<()>
    where
        F: FnOnce(&mut T),
        Fut: Future<Output = ClientResult<()>>,
    {
        if !self.lock().busy.insert(id.to_string()) {
            return Err(ClientError::Busy(id.to_string()));
        }
        let _busy = BusyGuard {
            set: self,
            id: id.to_string(),
        };

        let (snapshot, generation) = {
            let mut state = self.lock();
            state.error = None;

            let snapshot = Arc::clone(&state.items);
            let mut working = (*snapshot).clone();
            if let Some(item) = working.iter_mut().find(|item| item.id() == id) {
                apply(item);
            }
            state.items = Arc::new(working);
            (snapshot, state.generation)
        };

        let outcome = remote.await;

        if let Err(e) = &outcome {
            let mut state = self.lock();
            if state.generation == generation {
                tracing::warn!("Update of {} failed, rolling back: {}", id, e);
                state.items = snapshot;
            } else {
                tracing::warn!("Update of {} failed after a newer refresh, keeping refreshed items: {}", id, e);
            }
            state.error = Some(e.to_string());
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: String,
        value: u32,
    }

    impl Entity for Item {
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn item(id: &str, value: u32) -> Item {
        Item {
            id: id.to_string(),
            value,
        }
    }

    fn page(items: Vec<Item>) -> Page<Item> {
        let total = items.len() as u64;
        Page {
            items,
            total,
            page: 1,
            page_size: 20,
        }
    }

    #[test]
    fn test_commit_applies_current_ticket() {
        let set = WorkingSet::new();
        let ticket = set.begin_refresh();
        assert!(set.snapshot().loading);

        let outcome = set.commit_refresh(&ticket, Ok(page(vec![item("a", 1)])));
        assert_eq!(outcome, RefreshOutcome::Applied);

        let snapshot = set.snapshot();
        assert!(!snapshot.loading);
        assert_eq!(snapshot.items.as_slice(), &[item("a", 1)]);
        assert_eq!(snapshot.total, 1);
    }

    #[test]
    fn test_newer_ticket_supersedes_older() {
        let set = WorkingSet::new();
        let older = set.begin_refresh();
        let newer = set.begin_refresh();

        assert_eq!(
            set.commit_refresh(&newer, Ok(page(vec![item("new", 2)]))),
            RefreshOutcome::Applied
        );
        assert_eq!(
            set.commit_refresh(&older, Ok(page(vec![item("old", 1)]))),
            RefreshOutcome::Superseded
        );
        assert_eq!(set.items().as_slice(), &[item("new", 2)]);
    }

    #[test]
    fn test_cancel_refresh_drops_result() {
        let set: WorkingSet<Item> = WorkingSet::new();
        let ticket = set.begin_refresh();
        set.cancel_refresh();

        assert_eq!(
            set.commit_refresh(&ticket, Ok(page(vec![item("a", 1)]))),
            RefreshOutcome::Superseded
        );
        assert!(set.items().is_empty());
        assert!(!set.snapshot().loading);
    }

    #[test]
    fn test_failed_refresh_keeps_items() {
        let set = WorkingSet::new();
        let first = set.begin_refresh();
        set.commit_refresh(&first, Ok(page(vec![item("a", 1)])));

        let second = set.begin_refresh();
        let outcome = set.commit_refresh(
            &second,
            Err(ClientError::Remote {
                status: 500,
                message: None,
            }),
        );

        assert!(matches!(outcome, RefreshOutcome::Failed(_)));
        assert_eq!(set.items().as_slice(), &[item("a", 1)]);
        assert_eq!(set.error(), Some("API error (500)".to_string()));
    }

    #[tokio::test]
    async fn test_mutate_success_keeps_tentative_value() {
        let set = WorkingSet::new();
        let ticket = set.begin_refresh();
        set.commit_refresh(&ticket, Ok(page(vec![item("a", 1), item("b", 1)])));

        let result = set.mutate("a", |i| i.value = 7, async { Ok(()) }).await;

        assert!(result.is_ok());
        assert_eq!(set.get("a"), Some(item("a", 7)));
        assert!(!set.is_busy("a"));
    }

    #[tokio::test]
    async fn test_mutate_failure_restores_snapshot() {
        let set = WorkingSet::new();
        let ticket = set.begin_refresh();
        set.commit_refresh(&ticket, Ok(page(vec![item("a", 1), item("b", 1)])));
        let before = set.items();

        let result = set
            .mutate("a", |i| i.value = 7, async {
                Err(ClientError::Network("connection refused".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert!(Arc::ptr_eq(&before, &set.items()));
        assert!(!set.is_busy("a"));
        assert_eq!(set.error(), Some("Network error: connection refused".to_string()));
    }

    #[tokio::test]
    async fn test_failed_mutation_keeps_items_refreshed_meanwhile() {
        let set = WorkingSet::new();
        let ticket = set.begin_refresh();
        set.commit_refresh(&ticket, Ok(page(vec![item("a", 1), item("b", 1)])));

        let result = set
            .mutate("a", |i| i.value = 7, async {
                let ticket = set.begin_refresh();
                set.commit_refresh(&ticket, Ok(page(vec![item("c", 3)])));
                Err(ClientError::Network("timed out".to_string()))
            })
            .await;

        assert!(result.is_err());
        let snapshot = set.snapshot();
        assert_eq!(snapshot.items.as_slice(), &[item("c", 3)]);
        assert_eq!(snapshot.total, 1);
        assert_eq!(snapshot.error, Some("Network error: timed out".to_string()));
        assert!(!set.is_busy("a"));
    }

    #[tokio::test]
    async fn test_busy_flag_visible_while_in_flight() {
        let set = WorkingSet::new();
        let ticket = set.begin_refresh();
        set.commit_refresh(&ticket, Ok(page(vec![item("a", 1)])));

        let result = set
            .mutate("a", |i| i.value = 2, async {
                assert!(set.is_busy("a"));
                assert_eq!(set.get("a"), Some(item("a", 2)));
                Ok(())
            })
            .await;

        assert!(result.is_ok());
        assert!(!set.is_busy("a"));
    }

    #[tokio::test]
    async fn test_second_mutation_of_same_entity_is_rejected() {
        let set = WorkingSet::new();
        let ticket = set.begin_refresh();
        set.commit_refresh(&ticket, Ok(page(vec![item("a", 1)])));

        let result = set
            .mutate("a", |i| i.value = 2, async {
                let nested = set.mutate("a", |i| i.value = 3, async { Ok(()) }).await;
                assert_eq!(nested, Err(ClientError::Busy("a".to_string())));
                Ok(())
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(set.get("a"), Some(item("a", 2)));
    }

    #[tokio::test]
    async fn test_dropped_mutation_clears_busy_flag() {
        let set = WorkingSet::new();
        let ticket = set.begin_refresh();
        set.commit_refresh(&ticket, Ok(page(vec![item("a", 1)])));

        {
            let pending = set.mutate("a", |i| i.value = 2, std::future::pending());
            let mut pending = Box::pin(pending);
            // Poll once so the busy flag is taken, then drop.
            let waker = futures::task::noop_waker();
            let mut cx = std::task::Context::from_waker(&waker);
            assert!(pending.as_mut().poll(&mut cx).is_pending());
            assert!(set.is_busy("a"));
        }

        assert!(!set.is_busy("a"));
    }
}
