use std::sync::LazyLock;

use regex::Regex;

use crate::ContextReference;
use crate::search::FileSearchResult;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)(https?|file)://\S+$").expect("context url pattern is valid")
});

/// Whether `url` may be attached as a web reference.
pub fn is_valid_context_url(url: &str) -> bool {
    URL_RE.is_match(url.trim())
}

/// Which popup, if any, is open for an input field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ContextSelectionState {
    #[default]
    Hidden,
    /// Choosing between a file and a web reference.
    SelectingType,
    SelectingFile {
        query: String,
    },
    SelectingWeb {
        url: String,
    },
}

/// Everything the popup needs to draw, plus the search bookkeeping.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectorState {
    pub selection: ContextSelectionState,
    pub results: Vec<FileSearchResult>,
    /// Highlighted row in `results`.
    pub selected: usize,
    /// Byte offset of the inline `@` that opened the popup.
    pub trigger_index: Option<usize>,
    /// Token of the most recent search; only its completion is applied.
    /// Never decreases, including across `Hidden`.
    pub invocation: u64,
    pub loading: bool,
}

impl SelectorState {
    pub fn is_visible(&self) -> bool {
        self.selection != ContextSelectionState::Hidden
    }

    pub fn selected_result(&self) -> Option<&FileSearchResult> {
        self.results.get(self.selected)
    }

    /// Back to `Hidden`, keeping the invocation counter.
    fn hidden(&self) -> Self {
        Self {
            invocation: self.invocation,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SelectionEvent {
    /// `@` typed in the input; opens file search directly.
    OpenInline { trigger_index: usize, query: String },
    /// The explicit "Add Context" action.
    OpenTypeMenu,
    /// Open straight into URL entry.
    OpenWeb,
    ChooseFile,
    ChooseWeb,
    /// The popup's text changed.
    Input(String),
    /// Toggle file search and URL entry, keeping typed text.
    SwitchMode,
    MoveUp,
    MoveDown,
    /// Enter.
    Confirm,
    /// Click on a row.
    ConfirmAt(usize),
    Escape,
    SearchCompleted {
        invocation: u64,
        results: Vec<FileSearchResult>,
    },
}

/// A reference the user picked, and where the inline `@` was (if any).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    pub reference: ContextReference,
    pub trigger_index: Option<usize>,
}

/// Work the controller performs after a transition.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Debounced index search for `query`.
    ScheduleSearch { invocation: u64, query: String },
    /// Immediate recent-files lookup (blank query).
    LoadRecent { invocation: u64 },
    CancelSearch,
    Commit(Commit),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: SelectorState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn unchanged(state: &SelectorState) -> Self {
        Self {
            state: state.clone(),
            effects: Vec::new(),
        }
    }
}

/// Move into file search for `query`, issuing a fresh invocation token.
fn search_for(mut next: SelectorState, query: String) -> Transition {
    next.invocation += 1;
    next.selected = 0;
    next.loading = true;
    let effect = if query.trim().is_empty() {
        Effect::LoadRecent {
            invocation: next.invocation,
        }
    } else {
        Effect::ScheduleSearch {
            invocation: next.invocation,
            query: query.clone(),
        }
    };
    next.selection = ContextSelectionState::SelectingFile { query };
    Transition {
        state: next,
        effects: vec![effect],
    }
}

fn commit(state: &SelectorState, reference: ContextReference) -> Transition {
    Transition {
        state: state.hidden(),
        effects: vec![
            Effect::CancelSearch,
            Effect::Commit(Commit {
                reference,
                trigger_index: state.trigger_index,
            }),
        ],
    }
}

fn with_selection(state: &SelectorState, selection: ContextSelectionState) -> SelectorState {
    SelectorState {
        selection,
        results: Vec::new(),
        selected: 0,
        loading: false,
        ..state.clone()
    }
}

/// The selection state machine. Pure: side effects come back as [`Effect`]s.
pub fn reduce(state: &SelectorState, event: SelectionEvent) -> Transition {
    use ContextSelectionState as S;

    match (&state.selection, event) {
        (
            _,
            SelectionEvent::OpenInline {
                trigger_index,
                query,
            },
        ) => {
            let mut next = with_selection(state, S::Hidden);
            next.trigger_index = Some(trigger_index);
            search_for(next, query)
        }

        (_, SelectionEvent::OpenTypeMenu) => Transition {
            state: SelectorState {
                trigger_index: None,
                ..with_selection(state, S::SelectingType)
            },
            effects: vec![Effect::CancelSearch],
        },

        (S::Hidden | S::SelectingType, SelectionEvent::OpenWeb)
        | (S::SelectingType, SelectionEvent::ChooseWeb) => Transition {
            state: with_selection(state, S::SelectingWeb { url: String::new() }),
            effects: Vec::new(),
        },

        (S::SelectingType, SelectionEvent::ChooseFile) => {
            search_for(with_selection(state, S::Hidden), String::new())
        }

        (S::SelectingFile { .. }, SelectionEvent::Input(text)) => {
            // keep the old rows visible until the new ones land
            search_for(state.clone(), text)
        }

        (S::SelectingWeb { .. }, SelectionEvent::Input(text)) => Transition {
            state: SelectorState {
                selection: S::SelectingWeb { url: text },
                ..state.clone()
            },
            effects: Vec::new(),
        },

        (S::SelectingFile { query }, SelectionEvent::SwitchMode) => Transition {
            state: with_selection(state, S::SelectingWeb { url: query.clone() }),
            effects: vec![Effect::CancelSearch],
        },

        (S::SelectingWeb { url }, SelectionEvent::SwitchMode) => {
            search_for(with_selection(state, S::Hidden), url.clone())
        }

        (S::SelectingFile { .. }, SelectionEvent::MoveUp) if !state.results.is_empty() => {
            let len = state.results.len();
            Transition {
                state: SelectorState {
                    selected: (state.selected % len + len - 1) % len,
                    ..state.clone()
                },
                effects: Vec::new(),
            }
        }

        (S::SelectingFile { .. }, SelectionEvent::MoveDown) if !state.results.is_empty() => {
            let len = state.results.len();
            Transition {
                state: SelectorState {
                    selected: (state.selected + 1) % len,
                    ..state.clone()
                },
                effects: Vec::new(),
            }
        }

        (S::SelectingFile { .. }, SelectionEvent::Confirm) => match state.selected_result() {
            Some(r) => commit(state, ContextReference::from_indexed(&r.item)),
            None => Transition::unchanged(state),
        },

        (S::SelectingFile { .. }, SelectionEvent::ConfirmAt(index)) => {
            match state.results.get(index) {
                Some(r) => commit(state, ContextReference::from_indexed(&r.item)),
                None => Transition::unchanged(state),
            }
        }

        (S::SelectingWeb { url }, SelectionEvent::Confirm) => {
            if is_valid_context_url(url) {
                commit(
                    state,
                    ContextReference::Web {
                        url: url.trim().to_string(),
                        title: None,
                    },
                )
            } else {
                Transition::unchanged(state)
            }
        }

        (
            S::SelectingType | S::SelectingFile { .. } | S::SelectingWeb { .. },
            SelectionEvent::Escape,
        ) => Transition {
            state: state.hidden(),
            effects: vec![Effect::CancelSearch],
        },

        (
            S::SelectingFile { .. },
            SelectionEvent::SearchCompleted {
                invocation,
                results,
            },
        ) if invocation == state.invocation => Transition {
            state: SelectorState {
                results,
                selected: 0,
                loading: false,
                ..state.clone()
            },
            effects: Vec::new(),
        },

        (_, SelectionEvent::SearchCompleted { invocation, .. }) => {
            tracing::debug!(
                "dropping stale search results (invocation {invocation}, latest {})",
                state.invocation
            );
            Transition::unchanged(state)
        }

        _ => Transition::unchanged(state),
    }
}
