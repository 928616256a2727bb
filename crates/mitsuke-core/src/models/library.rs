use serde::Serialize;

use super::ListRecord;

/// A list record joined with its cached lookups for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListEntryView {
    pub record: ListRecord,
    /// `None` while the name lookup is still outstanding.
    pub title: Option<String>,
    pub total_episodes: Option<u32>,
}

impl ListEntryView {
    /// Title for display, falling back to the catalog id.
    pub fn display_title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| format!("Anime #{}", self.record.mal_id))
    }

    /// "watched / total" progress, with `?` for unknown parts.
    pub fn progress(&self) -> String {
        let watched = self
            .record
            .episodes_watched
            .map_or_else(|| "?".to_string(), |n| n.to_string());
        let total = self
            .total_episodes
            .map_or_else(|| "?".to_string(), |n| n.to_string());
        format!("{watched} / {total}")
    }
}
