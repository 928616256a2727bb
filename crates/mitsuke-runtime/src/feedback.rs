//! User-facing feedback strings.

use mitsuke_core::fetch::FetchOutcome;

pub const NOT_LOGGED_IN: &str = "You must be logged in to add anime to your list.";
pub const ADDED: &str = "Anime added to your list!";
pub const ADD_FAILED: &str = "Failed to add anime.";
pub const UPDATED: &str = "Anime updated!";
pub const UPDATE_FAILED: &str = "Failed to update anime.";
pub const REMOVED: &str = "Anime removed from your list.";
pub const REMOVE_FAILED: &str = "Failed to remove anime.";

pub const RATE_LIMITED: &str = "Rate limit exceeded. Please wait a moment and try again.";
pub const NO_RESULTS: &str = "No results found.";
pub const FETCH_FAILED: &str = "Failed to fetch anime. Please try again later.";

/// What a browse or search view should say instead of showing results.
///
/// `None` for results (even empty ones) and for cancelled fetches, which
/// are never reported.
pub fn outcome_message<T>(outcome: &FetchOutcome<T>) -> Option<&'static str> {
    match outcome {
        FetchOutcome::Ready(_) | FetchOutcome::Cancelled => None,
        FetchOutcome::RateLimited => Some(RATE_LIMITED),
        FetchOutcome::NotFound => Some(NO_RESULTS),
        FetchOutcome::Unavailable => Some(FETCH_FAILED),
    }
}
