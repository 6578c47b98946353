//! The `@` context popup: which mode it is in, what it shows, and what a
//! confirmed choice writes back into the input.
//!
//! [`reduce`] is the pure state machine; [`ContextSelector`] drives it with
//! debounced, cancellable searches.

mod controller;
mod replace;
mod state;

pub use controller::{ContextSelector, SelectorConfig};
pub use replace::{Replacement, replacement_text};
pub use state::{
    Commit, ContextSelectionState, Effect, SelectionEvent, SelectorState, Transition,
    is_valid_context_url, reduce,
};
