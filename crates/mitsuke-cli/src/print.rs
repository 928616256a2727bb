//! Plain-text rendering for the terminal.

use serde::Serialize;

use mitsuke_api::traits::{CatalogAnime, Profile};
use mitsuke_core::models::ListEntryView;
use mitsuke_runtime::AnimeDetails;

const TITLE_WIDTH: usize = 48;

pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn anime_table(items: &[CatalogAnime]) {
    println!("{:>6}  {:<TITLE_WIDTH$}  {:>5}  {:>4}  TYPE", "ID", "TITLE", "SCORE", "EPS");
    for anime in items {
        println!("{}", anime_line(anime));
    }
}

fn anime_line(anime: &CatalogAnime) -> String {
    format!(
        "{:>6}  {:<TITLE_WIDTH$}  {:>5}  {:>4}  {}",
        anime.mal_id,
        truncate(anime.display_title(), TITLE_WIDTH),
        anime.score.map_or_else(|| "-".to_string(), |s| format!("{s:.2}")),
        anime.episodes.map_or_else(|| "?".to_string(), |n| n.to_string()),
        anime.media_type.as_deref().unwrap_or("-"),
    )
}

pub fn entries(entries: &[ListEntryView]) {
    if entries.is_empty() {
        println!("Your list is empty.");
        return;
    }
    println!(
        "{:>6}  {:<TITLE_WIDTH$}  {:<13}  {:>6}  PROGRESS",
        "RECORD", "TITLE", "STATUS", "RATING"
    );
    for entry in entries {
        println!("{}", entry_line(entry));
    }
}

fn entry_line(entry: &ListEntryView) -> String {
    format!(
        "{:>6}  {:<TITLE_WIDTH$}  {:<13}  {:>6}  {}",
        entry.record.id.to_string(),
        truncate(&entry.display_title(), TITLE_WIDTH),
        entry.record.status.map_or("-", |s| s.as_str()),
        entry
            .record
            .rating
            .map_or_else(|| "-".to_string(), |r| format!("{r:.1}")),
        entry.progress(),
    )
}

pub fn details(details: &AnimeDetails) {
    let anime = &details.catalog;
    println!("{} (#{})", anime.display_title(), anime.mal_id);
    if anime.title_english.is_some() {
        println!("  Original title: {}", anime.title);
    }
    println!("  Type:     {:?}", details.local.anime_type);
    println!("  Episodes: {}", details.local.episodes);
    if let Some(score) = anime.score {
        println!("  Score:    {score:.2}");
    }
    if let Some(aired) = &anime.aired {
        println!("  Aired:    {aired}");
    }
    if let Some(rating) = &anime.rating {
        println!("  Rating:   {rating}");
    }
    if !anime.genres.is_empty() {
        println!("  Genres:   {}", anime.genres.join(", "));
    }
    if let Some(synopsis) = &anime.synopsis {
        println!();
        println!("{synopsis}");
    }
}

pub fn profile(profile: &Profile) {
    println!("Username: {}", profile.username);
    println!("Email:    {}", profile.email);
    println!("Name:     {} {}", profile.first_name, profile.last_name);
}

/// Cut `s` to at most `width` characters, marking the cut with `…`.
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}
