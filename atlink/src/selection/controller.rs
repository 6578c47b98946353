//! Runs the selection reducer against a live [`FileIndex`].
//!
//! Every query change cancels the previous search and starts a new debounce
//! timer, so at most one search is doing work at a time and a burst of
//! keystrokes costs one index call. Results come back on a channel tagged
//! with their invocation token; the reducer drops anything that is not the
//! latest.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{AtlinkConfig, ReferenceEncoding};
use crate::index::FileIndex;
use crate::search::{self, FileSearchResult};

use super::state::{
    Commit, ContextSelectionState, Effect, SelectionEvent, SelectorState, reduce,
};

#[derive(Clone, Debug)]
pub struct SelectorConfig {
    /// Quiet period after the last keystroke before the index is queried.
    pub debounce: Duration,
    pub max_results: usize,
    /// How committed references are written into the input.
    pub encoding: ReferenceEncoding,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self::from(&AtlinkConfig::default())
    }
}

impl From<&AtlinkConfig> for SelectorConfig {
    fn from(config: &AtlinkConfig) -> Self {
        Self {
            debounce: config.debounce(),
            max_results: config.max_results,
            encoding: config.reference_encoding,
        }
    }
}

struct SearchOutcome {
    invocation: u64,
    results: Vec<FileSearchResult>,
}

struct PendingSearch {
    invocation: u64,
    cancel: CancellationToken,
}

/// Owns the popup state for one input field.
///
/// `dispatch` must be called from within a tokio runtime; searches are
/// spawned onto it.
pub struct ContextSelector {
    state: SelectorState,
    index: Arc<dyn FileIndex>,
    config: SelectorConfig,
    pending: Option<PendingSearch>,
    results_tx: mpsc::UnboundedSender<SearchOutcome>,
    results_rx: mpsc::UnboundedReceiver<SearchOutcome>,
    subscribers: Vec<mpsc::UnboundedSender<SelectorState>>,
}

impl ContextSelector {
    pub fn new(index: Arc<dyn FileIndex>, config: SelectorConfig) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            state: SelectorState::default(),
            index,
            config,
            pending: None,
            results_tx,
            results_rx,
            subscribers: Vec::new(),
        }
    }

    pub fn state(&self) -> &SelectorState {
        &self.state
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Whether a search is debouncing or running.
    pub fn has_pending_search(&self) -> bool {
        self.pending.is_some()
    }

    /// Receive a copy of the state after every change. Closed receivers are
    /// pruned on the next change.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SelectorState> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Feed one UI event through the reducer and run its effects. Returns the
    /// committed reference when the event confirmed a selection.
    pub fn dispatch(&mut self, event: SelectionEvent) -> Option<Commit> {
        let transition = reduce(&self.state, event);
        let changed = transition.state != self.state;
        self.state = transition.state;

        let mut committed = None;
        for effect in transition.effects {
            match effect {
                Effect::ScheduleSearch { invocation, query } => {
                    self.spawn_search(invocation, Some(query))
                }
                Effect::LoadRecent { invocation } => self.spawn_search(invocation, None),
                Effect::CancelSearch => self.cancel_pending(),
                Effect::Commit(commit) => committed = Some(commit),
            }
        }
        if changed {
            self.notify();
        }
        committed
    }

    /// Wait for the next search to finish and apply it. Returns true if the
    /// results were current and replaced the visible list.
    pub async fn next_results(&mut self) -> bool {
        match self.results_rx.recv().await {
            Some(outcome) => self.apply(outcome),
            None => false,
        }
    }

    /// Apply any results that already arrived without waiting. Returns how
    /// many were current.
    pub fn drain_results(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(outcome) = self.results_rx.try_recv() {
            if self.apply(outcome) {
                applied += 1;
            }
        }
        applied
    }

    fn apply(&mut self, outcome: SearchOutcome) -> bool {
        if self
            .pending
            .as_ref()
            .is_some_and(|p| p.invocation == outcome.invocation)
        {
            self.pending = None;
        }
        let invocation = outcome.invocation;
        let before = self.state.invocation;
        self.dispatch(SelectionEvent::SearchCompleted {
            invocation,
            results: outcome.results,
        });
        invocation == before
            && matches!(self.state.selection, ContextSelectionState::SelectingFile { .. })
    }

    fn notify(&mut self) {
        let state = &self.state;
        self.subscribers.retain(|tx| tx.send(state.clone()).is_ok());
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel.cancel();
        }
    }

    /// `query == None` lists recent files with no debounce.
    fn spawn_search(&mut self, invocation: u64, query: Option<String>) {
        self.cancel_pending();
        let cancel = CancellationToken::new();
        self.pending = Some(PendingSearch {
            invocation,
            cancel: cancel.clone(),
        });

        let index = Arc::clone(&self.index);
        let tx = self.results_tx.clone();
        let debounce = self.config.debounce;
        let max_results = self.config.max_results;

        tokio::spawn(async move {
            let work = async {
                if query.is_some() {
                    tokio::time::sleep(debounce).await;
                }
                if !index.is_index_ready() {
                    tracing::debug!("file index still building; results may be partial");
                }
                let candidates = match &query {
                    Some(q) => index.search_files(q, max_results).await,
                    None => index.recent_files(max_results).await,
                };
                search::search(query.as_deref().unwrap_or(""), &candidates, max_results)
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::trace!("search {invocation} cancelled");
                }
                results = work => {
                    if !cancel.is_cancelled() {
                        let _ = tx.send(SearchOutcome { invocation, results });
                    }
                }
            }
        });
    }
}

impl Drop for ContextSelector {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IndexedFileInfo;
    use std::path::Path;
    use std::sync::Mutex;

    /// Records every query it receives; can be told to stall.
    #[derive(Default)]
    struct RecordingIndex {
        files: Vec<IndexedFileInfo>,
        queries: Mutex<Vec<String>>,
        recent_calls: Mutex<usize>,
        delay: Duration,
        ready: bool,
    }

    impl RecordingIndex {
        fn with_files(names: &[&str]) -> Self {
            let root = Path::new("/w");
            Self {
                files: names
                    .iter()
                    .map(|n| IndexedFileInfo::from_path(root, &root.join(n), false))
                    .collect(),
                ready: true,
                ..Self::default()
            }
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl FileIndex for RecordingIndex {
        async fn search_files(&self, query: &str, max_results: usize) -> Vec<IndexedFileInfo> {
            self.queries.lock().unwrap().push(query.to_string());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            search::search(query, &self.files, max_results)
                .into_iter()
                .map(|r| r.item)
                .collect()
        }

        async fn recent_files(&self, max_results: usize) -> Vec<IndexedFileInfo> {
            *self.recent_calls.lock().unwrap() += 1;
            self.files.iter().take(max_results).cloned().collect()
        }

        fn is_index_ready(&self) -> bool {
            self.ready
        }
    }

    fn selector(index: Arc<RecordingIndex>) -> ContextSelector {
        ContextSelector::new(index, SelectorConfig::default())
    }

    fn open(query: &str) -> SelectionEvent {
        SelectionEvent::OpenInline {
            trigger_index: 0,
            query: query.into(),
        }
    }

    fn names(state: &SelectorState) -> Vec<&str> {
        state.results.iter().map(|r| r.item.name.as_str()).collect()
    }

    // ── debounce ──

    #[tokio::test(start_paused = true)]
    async fn rapid_typing_issues_one_search() {
        let index = Arc::new(RecordingIndex::with_files(&["main.rs", "map.rs", "lib.rs"]));
        let mut sel = selector(index.clone());

        sel.dispatch(open("m"));
        for q in ["ma", "mai", "main"] {
            tokio::time::sleep(Duration::from_millis(50)).await;
            sel.dispatch(SelectionEvent::Input(q.into()));
        }
        assert!(index.queries().is_empty());

        assert!(sel.next_results().await);
        assert_eq!(index.queries(), vec!["main"]);
        assert_eq!(names(sel.state()), vec!["main.rs"]);
        assert!(!sel.state().loading);
        assert!(!sel.has_pending_search());
    }

    #[tokio::test(start_paused = true)]
    async fn search_waits_for_debounce() {
        let index = Arc::new(RecordingIndex::with_files(&["main.rs"]));
        let mut sel = selector(index.clone());
        sel.dispatch(open("main"));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(index.queries().is_empty());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(index.queries(), vec!["main"]);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_query_loads_recent_without_debounce() {
        let index = Arc::new(RecordingIndex::with_files(&["b.rs", "a.rs"]));
        let mut sel = selector(index.clone());
        sel.dispatch(open(""));
        assert!(sel.next_results().await);
        assert_eq!(*index.recent_calls.lock().unwrap(), 1);
        assert!(index.queries().is_empty());
        assert_eq!(names(sel.state()), vec!["b.rs", "a.rs"]);
    }

    // ── cancellation ──

    #[tokio::test(start_paused = true)]
    async fn in_flight_search_is_cancelled_by_new_query() {
        let index = Arc::new(RecordingIndex {
            delay: Duration::from_secs(1),
            ..RecordingIndex::with_files(&["alpha.rs", "abc.rs"])
        });
        let mut sel = selector(index.clone());

        sel.dispatch(open("a"));
        // past the debounce, the slow index call for "a" is running
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(index.queries(), vec!["a"]);

        sel.dispatch(SelectionEvent::Input("ab".into()));
        assert!(sel.next_results().await);
        assert_eq!(index.queries(), vec!["a", "ab"]);
        assert_eq!(names(sel.state()), vec!["abc.rs"]);
        assert_eq!(sel.drain_results(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn escape_cancels_pending_search() {
        let index = Arc::new(RecordingIndex::with_files(&["main.rs"]));
        let mut sel = selector(index.clone());
        sel.dispatch(open("main"));
        sel.dispatch(SelectionEvent::Escape);
        assert!(!sel.has_pending_search());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(index.queries().is_empty());
        assert_eq!(sel.drain_results(), 0);
        assert_eq!(sel.state().selection, ContextSelectionState::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn unready_index_still_answers() {
        let index = Arc::new(RecordingIndex {
            ready: false,
            ..RecordingIndex::with_files(&["main.rs"])
        });
        let mut sel = selector(index);
        sel.dispatch(open("main"));
        assert!(sel.next_results().await);
        assert_eq!(names(sel.state()), vec!["main.rs"]);
    }

    // ── commit ──

    #[tokio::test(start_paused = true)]
    async fn confirm_returns_commit_for_selected_row() {
        let index = Arc::new(RecordingIndex::with_files(&["main.rs", "main_test.rs"]));
        let mut sel = selector(index);
        sel.dispatch(SelectionEvent::OpenInline {
            trigger_index: 4,
            query: "main".into(),
        });
        sel.next_results().await;
        sel.dispatch(SelectionEvent::MoveDown);

        let commit = sel.dispatch(SelectionEvent::Confirm).unwrap();
        assert_eq!(commit.trigger_index, Some(4));
        assert_eq!(
            commit.reference,
            crate::ContextReference::File {
                path: "main_test.rs".into(),
                full_path: "/w/main_test.rs".into(),
            }
        );
        assert!(!sel.state().is_visible());

        let r = commit.apply("fix @main", 9, sel.config().encoding);
        assert_eq!(r.text, "fix [@main_test.rs](file:///w/main_test.rs) ");
    }

    // ── subscribers ──

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_each_change() {
        let index = Arc::new(RecordingIndex::with_files(&["main.rs"]));
        let mut sel = selector(index);
        let mut rx = sel.subscribe();

        sel.dispatch(open("main"));
        sel.next_results().await;
        sel.dispatch(SelectionEvent::Escape);
        // no-op, not published
        sel.dispatch(SelectionEvent::Escape);

        let first = rx.recv().await.unwrap();
        assert!(first.loading);
        let second = rx.recv().await.unwrap();
        assert_eq!(names(&second), vec!["main.rs"]);
        let third = rx.recv().await.unwrap();
        assert!(!third.is_visible());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_subscribers_are_pruned() {
        let index = Arc::new(RecordingIndex::with_files(&[]));
        let mut sel = selector(index);
        drop(sel.subscribe());
        sel.dispatch(SelectionEvent::OpenTypeMenu);
        assert!(sel.subscribers.is_empty());
    }
}
