//! Plain-text rendering of the collection and the edit form.

use std::fmt::Write as _;

use time::{OffsetDateTime, UtcOffset};

use crate::application::session::{DraftField, SessionView};
use crate::application::store::{CollectionState, LoadStatus};
use crate::domain::posts::{DISPLAY_TIME_FORMAT, Post};

const INDENT: &str = "    ";

pub fn display_time(at: OffsetDateTime) -> String {
    let at = at.to_offset(UtcOffset::UTC);
    at.format(DISPLAY_TIME_FORMAT)
        .unwrap_or_else(|_| at.to_string())
}

/// The post list with its status line.
pub fn render_collection(state: &CollectionState) -> String {
    let mut out = String::from("Recent posts");

    match &state.status {
        LoadStatus::Loading => out.push_str("\nLoading..."),
        LoadStatus::Failed(reason) => {
            let _ = write!(out, "\n{reason}");
        }
        LoadStatus::Idle | LoadStatus::Ready => {}
    }
    if !state.status.is_loading() && state.items.is_empty() {
        out.push_str("\nNo posts yet!");
    }

    for post in &state.items {
        out.push_str("\n\n");
        out.push_str(&render_post(post));
    }
    out
}

pub fn render_post(post: &Post) -> String {
    let mut out = format!(
        "#{} {}, {}",
        post.id,
        post.author,
        display_time(post.created_at)
    );
    for line in post.content.lines() {
        let _ = write!(out, "\n{INDENT}{line}");
    }
    if let Some(url) = post.image_url.as_deref() {
        let _ = write!(out, "\n{INDENT}Image: {url}");
    }
    if let Some(modified) = post.modified_at.filter(|_| post.was_modified()) {
        let _ = write!(out, "\n{INDENT}Modified: {}", display_time(modified));
    }
    out
}

/// The edit form for the active session.
pub fn render_session(view: &SessionView) -> String {
    let mut out = format!("Edit post #{}", view.target.id);
    for field in [DraftField::Author, DraftField::Content, DraftField::ImageUrl] {
        let value = view.draft.get(field);
        let value = if value.is_empty() { "(empty)" } else { value };
        let _ = write!(out, "\n{INDENT}{:<8} {value}", format!("{field}:"));
    }
    if view.saving {
        out.push_str("\nSaving...");
    }
    out
}
