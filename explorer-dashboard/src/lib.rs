//! Dashboard front end: view state, renderers and the navigation controller
//! that drives them against the explorer HTTP API.

pub mod api;
pub mod card;
pub mod detail;
pub mod format;
pub mod nav;
pub mod package;
pub mod page;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiError, HttpApiClient};
pub use nav::{Navigator, SelectionUpdate, HIGHLIGHT_DURATION, SEARCH_DEBOUNCE};
pub use page::{render_page, render_screen, Screen};
pub use state::{View, ViewState};
